//! Evaluator configuration.
//!
//! Configuration only affects how values are rendered into descriptions and
//! explanations. It never changes a verdict.

use serde::{Deserialize, Serialize};

/// Errors raised when loading an [`EvalConfig`].
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("invalid evaluator config: {0}")]
    Deserialize(#[from] serde_json::Error),
    #[error("invalid evaluator config: '{field}' must be greater than zero")]
    Zero { field: &'static str },
}

/// Rendering limits for descriptions.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct EvalConfig {
    /// Sequence items shown before the rest is elided.
    pub max_items: usize,
    /// Characters of text shown before the rest is elided.
    pub max_text_len: usize,
}

impl Default for EvalConfig {
    fn default() -> Self {
        EvalConfig {
            max_items: 10,
            max_text_len: 120,
        }
    }
}

impl EvalConfig {
    /// Load from a JSON object. Missing fields take their defaults.
    pub fn from_json(v: &serde_json::Value) -> Result<EvalConfig, ConfigError> {
        let config: EvalConfig = serde_json::from_value(v.clone())?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.max_items == 0 {
            return Err(ConfigError::Zero { field: "max_items" });
        }
        if self.max_text_len == 0 {
            return Err(ConfigError::Zero {
                field: "max_text_len",
            });
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn missing_fields_use_defaults() {
        let config = EvalConfig::from_json(&json!({ "max_items": 3 })).unwrap();
        assert_eq!(config.max_items, 3);
        assert_eq!(config.max_text_len, 120);
    }

    #[test]
    fn zero_limits_are_rejected() {
        let err = EvalConfig::from_json(&json!({ "max_text_len": 0 })).unwrap_err();
        assert!(matches!(err, ConfigError::Zero { field: "max_text_len" }));
    }

    #[test]
    fn unknown_fields_are_rejected() {
        let err = EvalConfig::from_json(&json!({ "colour": true })).unwrap_err();
        assert!(matches!(err, ConfigError::Deserialize(_)));
    }
}
