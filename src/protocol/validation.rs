//! Wire-level input validation, independent of domain/database state.

use crate::config::{ProtocolConfig, RoomConfig};

pub fn validate_join_code_with_config(code: &str, config: &ProtocolConfig) -> Result<(), String> {
    if code.len() != config.join_code_length {
        return Err(format!(
            "join code must be exactly {} characters",
            config.join_code_length
        ));
    }
    if !code.chars().all(|c| config.join_code_alphabet.contains(c)) {
        return Err("join code contains characters outside the configured alphabet".to_string());
    }
    Ok(())
}

pub fn validate_capacity_with_config(capacity: u8, config: &RoomConfig) -> Result<(), String> {
    if capacity < config.min_capacity || capacity > config.max_capacity {
        return Err(format!(
            "capacity must be between {} and {}",
            config.min_capacity, config.max_capacity
        ));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rejects_wrong_length_join_code() {
        let config = ProtocolConfig::default();
        assert!(validate_join_code_with_config("AB", &config).is_err());
    }

    #[test]
    fn rejects_capacity_outside_bounds() {
        let config = RoomConfig::default();
        assert!(validate_capacity_with_config(2, &config).is_err());
        assert!(validate_capacity_with_config(9, &config).is_err());
        assert!(validate_capacity_with_config(5, &config).is_ok());
    }
}
