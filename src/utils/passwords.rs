// src/utils/passwords.rs

use rand::Rng;

/// Word list for autogenerated passwords. Simple, capitalized words so a
/// teacher can read one aloud; the account is flagged to change it on first
/// login.
const WORD_LIST: &[&str] = &[
    "Aguila", "Apostol", "Pastor", "Oveja", "Cordero", "Paloma", "Cruz",
    "Biblia", "Fe", "Amor", "Paz", "Gracia", "Misericordia", "Alabanza",
    "Adoracion", "Oracion", "Cantico", "Salmo", "Profeta", "Sacerdote",
    "Discipulo", "Servidor", "Siervo", "Mensajero", "Angel", "Espiritu",
    "Bautismo", "Comunion", "Iglesia", "Altar", "Templo", "Cristo", "Dios",
    "Senor", "Redentor", "Salvador", "Rey", "Maestro", "Sanctus", "Aleluya",
    "Esperanza", "Caridad", "Humildad", "Sabiduria", "Verdad", "Luz", "Vida",
    "Eterno", "Santo", "Sagrado", "Bendicion", "Promesa", "Alianza", "Pacto",
];

/// Picks a random word from the fixed list.
pub fn generate_password() -> String {
    let idx = rand::thread_rng().gen_range(0..WORD_LIST.len());
    WORD_LIST[idx].to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn generated_password_comes_from_word_list() {
        for _ in 0..20 {
            let password = generate_password();
            assert!(WORD_LIST.contains(&password.as_str()));
        }
    }
}
