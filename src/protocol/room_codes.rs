//! Join-code generation (§4.4: "generates a join code ... retries up to ten
//! times on collision"). Grounded on the teacher's
//! `generate_clean_room_code_with_config`, generalised to draw from the
//! configured alphabet rather than a hard-coded "no confusing characters" set.

use rand::RngExt;

use crate::config::ProtocolConfig;

/// Generate a join code of `config.join_code_length` drawn from
/// `config.join_code_alphabet`.
pub fn generate_join_code(config: &ProtocolConfig) -> String {
    let alphabet: Vec<char> = config.join_code_alphabet.chars().collect();
    if alphabet.is_empty() {
        return String::new();
    }
    let mut rng = rand::rng();
    (0..config.join_code_length)
        .map(|_| {
            let idx = rng.random_range(0..alphabet.len());
            alphabet[idx]
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn generated_code_matches_configured_length_and_alphabet() {
        let config = ProtocolConfig::default();
        let code = generate_join_code(&config);
        assert_eq!(code.len(), config.join_code_length);
        assert!(code
            .chars()
            .all(|c| config.join_code_alphabet.contains(c)));
    }
}
