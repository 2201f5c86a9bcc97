//! Error types shared by configuration loading, account resolution and
//! import remapping.

use std::path::PathBuf;
use thiserror::Error;

/// Configuration error types
///
/// Every variant describes a defect in a static declaration. None of them are
/// transient, so callers surface them instead of retrying.
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("TOML parse error: {0}")]
    TomlError(#[from] toml::de::Error),

    #[error("Missing required field: {0}")]
    MissingField(String),

    #[error("Unknown network: {0}. Declare it under [networks.{0}]")]
    UnknownNetwork(String),

    #[error("Configuration file not found: {}", .0.display())]
    MissingConfigFile(PathBuf),

    #[error("Configuration validation failed: {0}")]
    ValidationError(String),

    #[error("Unknown role: '{role}' is not declared under [named_accounts]")]
    UnknownRole { role: String },

    #[error("Malformed remapping rule on line {line_number}: '{line}' (expected find=replace)")]
    MalformedRule { line_number: usize, line: String },

    #[error("Ambiguous override: role '{role}' declares chain {chain_id} more than once")]
    AmbiguousOverride { role: String, chain_id: u64 },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_malformed_rule_message_carries_line() {
        let err = ConfigError::MalformedRule {
            line_number: 3,
            line: "justtext".to_string(),
        };
        let message = err.to_string();
        assert!(message.contains("justtext"));
        assert!(message.contains("line 3"));
    }

    #[test]
    fn test_ambiguous_override_message() {
        let err = ConfigError::AmbiguousOverride {
            role: "protocolOwner".to_string(),
            chain_id: 1,
        };
        assert_eq!(
            err.to_string(),
            "Ambiguous override: role 'protocolOwner' declares chain 1 more than once"
        );
    }
}
