// src/scoring.rs
//
// Pure grading rules: answer matching, percentages, the retake-over-normal
// grade preference and the promotion average. Handlers feed these with rows
// they already fetched; nothing here touches the database.

use chrono::{DateTime, Utc};

use crate::config::PASS_THRESHOLD;

/// Checks a submitted answer against the stored answer key.
///
/// Multiple-choice and true/false answers match case-insensitively after
/// trimming whitespace. Free-text questions are never auto-scored correct;
/// they would need manual grading, which no path implements.
pub fn answer_is_correct(question_type: &str, correct_answer: Option<&str>, submitted: &str) -> bool {
    match question_type {
        "multiple_choice" | "true_false" => match correct_answer {
            Some(key) => submitted.trim().eq_ignore_ascii_case(key.trim()),
            None => false,
        },
        _ => false,
    }
}

/// Percentage of `earned` over `possible`, 0 when there is nothing to score.
pub fn percentage(earned: f64, possible: f64) -> f64 {
    if possible > 0.0 {
        (earned / possible) * 100.0
    } else {
        0.0
    }
}

pub fn passes(percentage: f64) -> bool {
    percentage >= PASS_THRESHOLD
}

/// One candidate grade for an (exam, enrollment) pair.
#[derive(Debug, Clone, PartialEq)]
pub struct GradeCandidate {
    pub percentage: f64,
    pub retake_window_id: Option<i64>,
    pub completed_at: DateTime<Utc>,
}

/// Picks the grade that counts toward the promotion average: the
/// latest-completed retake grade when any exists, otherwise the normal
/// attempt. Sorting by (has-retake, completion time) and taking the last
/// entry encodes exactly that preference.
pub fn preferred_grade(mut candidates: Vec<GradeCandidate>) -> Option<GradeCandidate> {
    candidates.sort_by_key(|c| (c.retake_window_id.is_some(), c.completed_at));
    candidates.pop()
}

/// Arithmetic mean of the contributing percentages; an enrollment with no
/// graded exams averages 0, not "undefined".
pub fn promotion_average(percentages: &[f64]) -> f64 {
    if percentages.is_empty() {
        return 0.0;
    }
    percentages.iter().sum::<f64>() / percentages.len() as f64
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn at(hour: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2025, 6, 1, hour, 0, 0).unwrap()
    }

    #[test]
    fn multiple_choice_match_ignores_case_and_whitespace() {
        assert!(answer_is_correct("multiple_choice", Some("a"), "  A "));
        assert!(answer_is_correct("true_false", Some("Verdadero"), "verdadero"));
        assert!(!answer_is_correct("multiple_choice", Some("a"), "b"));
    }

    #[test]
    fn free_text_is_never_auto_correct() {
        assert!(!answer_is_correct("free_text", Some("anything"), "anything"));
        assert!(!answer_is_correct("free_text", None, ""));
    }

    #[test]
    fn missing_answer_key_scores_incorrect() {
        assert!(!answer_is_correct("multiple_choice", None, "a"));
    }

    #[test]
    fn percentage_handles_zero_total() {
        assert_eq!(percentage(0.0, 0.0), 0.0);
        assert_eq!(percentage(7.0, 10.0), 70.0);
        assert_eq!(percentage(8.0, 10.0), 80.0);
    }

    #[test]
    fn pass_threshold_is_eighty() {
        assert!(!passes(79.99));
        assert!(passes(80.0));
        assert!(passes(100.0));
    }

    #[test]
    fn retake_grade_beats_normal_grade() {
        let normal = GradeCandidate {
            percentage: 60.0,
            retake_window_id: None,
            completed_at: at(10),
        };
        let retake = GradeCandidate {
            percentage: 90.0,
            retake_window_id: Some(1),
            completed_at: at(8),
        };
        // The retake wins even though it completed earlier in the day.
        let chosen = preferred_grade(vec![normal, retake.clone()]).unwrap();
        assert_eq!(chosen, retake);
    }

    #[test]
    fn latest_retake_wins_among_retakes() {
        let first = GradeCandidate {
            percentage: 50.0,
            retake_window_id: Some(1),
            completed_at: at(9),
        };
        let second = GradeCandidate {
            percentage: 85.0,
            retake_window_id: Some(2),
            completed_at: at(11),
        };
        let chosen = preferred_grade(vec![second.clone(), first]).unwrap();
        assert_eq!(chosen, second);
    }

    #[test]
    fn no_candidates_yields_none() {
        assert_eq!(preferred_grade(vec![]), None);
    }

    #[test]
    fn average_of_no_grades_is_zero() {
        assert_eq!(promotion_average(&[]), 0.0);
        assert!(!passes(promotion_average(&[])));
    }

    #[test]
    fn average_is_arithmetic_mean() {
        assert_eq!(promotion_average(&[70.0, 90.0]), 80.0);
        assert_eq!(promotion_average(&[90.0]), 90.0);
    }
}
