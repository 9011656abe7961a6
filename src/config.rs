use crate::error::{ConfigError, Result};
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Runtime configuration.
///
/// Everything has a sensible default so the crate works with an empty file
/// (or no file at all). The catalog itself is code-defined and immutable;
/// config only carries tunables the hosting layer may want to adjust.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct Config {
    pub backend: BackendConfig,
    pub speech: SpeechConfig,
    pub scheduling: SchedulingConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct BackendConfig {
    /// Timeout for the submission and listing calls, in milliseconds.
    pub submit_timeout_ms: u64,
    /// Timeout for the identity lookup, which runs during account linking
    /// where the user is already waiting, so it gets a shorter budget.
    pub identity_timeout_ms: u64,
    /// Beneficiary kind code sent with every submission.
    pub beneficiary_kind: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct SpeechConfig {
    /// Locale used when a turn does not carry one.
    pub default_locale: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct SchedulingConfig {
    /// Maximum length of a recurrence window, in days.
    pub max_window_days: i64,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            backend: BackendConfig::default(),
            speech: SpeechConfig::default(),
            scheduling: SchedulingConfig::default(),
        }
    }
}

impl Default for BackendConfig {
    fn default() -> Self {
        Self {
            submit_timeout_ms: 6000,
            identity_timeout_ms: 5500,
            beneficiary_kind: "01".to_string(),
        }
    }
}

impl Default for SpeechConfig {
    fn default() -> Self {
        Self {
            default_locale: "es-ES".to_string(),
        }
    }
}

impl Default for SchedulingConfig {
    fn default() -> Self {
        Self {
            max_window_days: 90,
        }
    }
}

impl Config {
    /// Load configuration from a TOML file.
    pub fn load(path: &Path) -> Result<Self> {
        let raw = std::fs::read_to_string(path).map_err(ConfigError::Io)?;
        let config: Config =
            toml::from_str(&raw).map_err(|e| ConfigError::Load(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    fn validate(&self) -> Result<()> {
        if self.backend.submit_timeout_ms == 0 || self.backend.identity_timeout_ms == 0 {
            return Err(ConfigError::Validation("timeouts must be non-zero".into()).into());
        }
        if self.scheduling.max_window_days <= 0 {
            return Err(ConfigError::Validation("max_window_days must be positive".into()).into());
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::Config;
    use std::io::Write;
    use tempfile::NamedTempFile;

    #[test]
    fn defaults_match_backend_contract() {
        let config = Config::default();
        assert_eq!(config.backend.submit_timeout_ms, 6000);
        assert_eq!(config.backend.identity_timeout_ms, 5500);
        assert_eq!(config.scheduling.max_window_days, 90);
        assert_eq!(config.speech.default_locale, "es-ES");
    }

    #[test]
    fn empty_file_loads_defaults() {
        let file = NamedTempFile::new().unwrap();
        let config = Config::load(file.path()).unwrap();
        assert_eq!(config.backend.submit_timeout_ms, 6000);
    }

    #[test]
    fn partial_file_overrides_only_named_fields() {
        let mut file = NamedTempFile::new().unwrap();
        writeln!(file, "[backend]\nsubmit_timeout_ms = 2500").unwrap();
        let config = Config::load(file.path()).unwrap();
        assert_eq!(config.backend.submit_timeout_ms, 2500);
        assert_eq!(config.backend.identity_timeout_ms, 5500);
    }

    #[test]
    fn zero_timeout_is_rejected() {
        let mut file = NamedTempFile::new().unwrap();
        writeln!(file, "[backend]\nsubmit_timeout_ms = 0").unwrap();
        assert!(Config::load(file.path()).is_err());
    }
}
