// src/handlers/mod.rs

pub mod auth;
pub mod catalog;
pub mod enrollments;
pub mod exams;
pub mod grades;
pub mod questions;
pub mod retakes;
pub mod scope;
pub mod topics;
pub mod users;
