//! Session configuration, loaded from RON.
//!
//! ```ron
//! (
//!     success_toast_ms: 1500,
//!     failure_toast_ms: 5000,
//!     backend: Some((program: "python3", args: ["-m", "resedit_backend"])),
//! )
//! ```
//!
//! Every field is optional.

use std::path::Path;
use std::time::Duration;

use resedit_client::BackendCommand;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SessionConfig {
    /// How long success notifications stay up.
    pub success_toast_ms: u64,
    /// How long failure notifications stay up.
    pub failure_toast_ms: u64,
    /// Backend process to launch; `None` when the embedder supplies one.
    pub backend: Option<BackendCommand>,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            success_toast_ms: 1500,
            failure_toast_ms: 5000,
            backend: None,
        }
    }
}

impl SessionConfig {
    pub fn from_ron_str(text: &str) -> Result<Self, ConfigError> {
        Ok(ron::from_str(text)?)
    }

    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let text = std::fs::read_to_string(path)?;
        Self::from_ron_str(&text)
    }

    pub fn success_toast(&self) -> Duration {
        Duration::from_millis(self.success_toast_ms)
    }

    pub fn failure_toast(&self) -> Duration {
        Duration::from_millis(self.failure_toast_ms)
    }
}

/// Error type for config loading.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("RON parse error: {0}")]
    Ron(#[from] ron::error::SpannedError),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_config_uses_defaults() {
        let config = SessionConfig::from_ron_str("()").unwrap();
        assert_eq!(config, SessionConfig::default());
        assert_eq!(config.success_toast(), Duration::from_millis(1500));
        assert_eq!(config.failure_toast(), Duration::from_millis(5000));
    }

    #[test]
    fn test_parse_backend() {
        let config = SessionConfig::from_ron_str(
            r#"(
                failure_toast_ms: 8000,
                backend: Some((program: "python3", args: ["-m", "backend"])),
            )"#,
        )
        .unwrap();
        assert_eq!(config.success_toast_ms, 1500);
        assert_eq!(config.failure_toast_ms, 8000);
        let backend = config.backend.unwrap();
        assert_eq!(backend.program, "python3");
        assert_eq!(backend.args, vec!["-m", "backend"]);
    }

    #[test]
    fn test_parse_error() {
        let err = SessionConfig::from_ron_str("(success_toast_ms: \"soon\")").unwrap_err();
        assert!(matches!(err, ConfigError::Ron(_)));
    }

    #[test]
    fn test_load_from_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("session.ron");
        std::fs::write(&path, "(success_toast_ms: 200)").unwrap();

        let config = SessionConfig::load(&path).unwrap();
        assert_eq!(config.success_toast_ms, 200);

        let missing = SessionConfig::load(dir.path().join("nope.ron")).unwrap_err();
        assert!(matches!(missing, ConfigError::Io(_)));
    }
}
