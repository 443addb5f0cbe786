//! Queue configuration.
//!
//! ```ignore
//! let config = QueueConfig::from_json_str(r#"{ "autoStart": false }"#)?;
//! let queue = TaskQueue::new(config)?;
//! ```

use serde::{Deserialize, Serialize};

use crate::domain::task::json_kind;
use crate::error::QueueError;

/// Environment variable read by [`QueueConfig::from_env`].
pub const AUTO_START_ENV: &str = "TASKLANE_AUTO_START";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct QueueConfig {
    /// Start processing as soon as a task is added (unless paused).
    #[serde(alias = "autoStart", alias = "auto")]
    pub auto_start: bool,
}

impl Default for QueueConfig {
    fn default() -> Self {
        Self { auto_start: true }
    }
}

impl QueueConfig {
    pub fn new(auto_start: bool) -> Self {
        Self { auto_start }
    }

    /// Load from a JSON value. `null` and non-objects are rejected.
    pub fn from_value(value: serde_json::Value) -> Result<Self, QueueError> {
        match value {
            serde_json::Value::Null => Err(QueueError::InvalidConfig(
                "configuration required".to_string(),
            )),
            serde_json::Value::Object(_) => serde_json::from_value(value)
                .map_err(|e| QueueError::InvalidConfig(e.to_string())),
            other => Err(QueueError::InvalidConfig(format!(
                "configuration should be an object, got {}",
                json_kind(&other)
            ))),
        }
    }

    pub fn from_json_str(raw: &str) -> Result<Self, QueueError> {
        let value: serde_json::Value = serde_json::from_str(raw)
            .map_err(|e| QueueError::InvalidConfig(format!("json decode: {e}")))?;
        Self::from_value(value)
    }

    /// Defaults, overridden by `TASKLANE_AUTO_START` when set.
    pub fn from_env() -> Result<Self, QueueError> {
        match std::env::var(AUTO_START_ENV) {
            Ok(raw) => Ok(Self::new(parse_flag(&raw)?)),
            Err(std::env::VarError::NotPresent) => Ok(Self::default()),
            Err(e) => Err(QueueError::InvalidConfig(format!("{AUTO_START_ENV}: {e}"))),
        }
    }
}

fn parse_flag(raw: &str) -> Result<bool, QueueError> {
    match raw.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Ok(true),
        "0" | "false" | "no" | "off" => Ok(false),
        other => Err(QueueError::InvalidConfig(format!(
            "{AUTO_START_ENV} should be a boolean, got {other:?}"
        ))),
    }
}
