use crate::defaults;
use crate::error::{OverscribeError, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Root configuration structure
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
#[serde(default)]
pub struct Config {
    pub segments: SegmentConfig,
    pub transcription: TranscriptionConfig,
    pub credentials: CredentialConfig,
    pub service: ServiceConfig,
}

/// Segment cadence configuration
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct SegmentConfig {
    /// Seconds between segment openings while recording.
    pub tick_interval_secs: u64,
    /// Maximum seconds a single segment may capture.
    pub duration_cap_secs: u64,
    /// Sample rate expected from the capture source.
    pub sample_rate: u32,
}

/// Worker pool and retry configuration
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct TranscriptionConfig {
    /// Number of parallel transcription workers (clamped to 2..=5).
    pub workers: usize,
    /// Retry budget per remote call.
    pub max_retries: u32,
}

/// Credential pool configuration
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct CredentialConfig {
    /// Seconds a rate-limited credential is excluded from selection.
    pub cooldown_secs: u64,
}

/// Remote service configuration
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct ServiceConfig {
    pub base_url: String,
    pub chat_model: String,
    pub transcribe_model: String,
    /// Language hint for transcription.
    pub language: String,
}

impl Default for SegmentConfig {
    fn default() -> Self {
        Self {
            tick_interval_secs: defaults::TICK_INTERVAL.as_secs(),
            duration_cap_secs: defaults::SEGMENT_CAP.as_secs(),
            sample_rate: defaults::SAMPLE_RATE,
        }
    }
}

impl Default for TranscriptionConfig {
    fn default() -> Self {
        Self {
            workers: defaults::WORKERS,
            max_retries: defaults::MAX_RETRIES,
        }
    }
}

impl Default for CredentialConfig {
    fn default() -> Self {
        Self {
            cooldown_secs: defaults::CREDENTIAL_COOLDOWN.as_secs(),
        }
    }
}

impl Default for ServiceConfig {
    fn default() -> Self {
        Self {
            base_url: defaults::API_BASE_URL.to_string(),
            chat_model: defaults::CHAT_MODEL.to_string(),
            transcribe_model: defaults::TRANSCRIBE_MODEL.to_string(),
            language: "en".to_string(),
        }
    }
}

impl SegmentConfig {
    pub fn tick_interval(&self) -> Duration {
        Duration::from_secs(self.tick_interval_secs)
    }

    pub fn duration_cap(&self) -> Duration {
        Duration::from_secs(self.duration_cap_secs)
    }
}

impl CredentialConfig {
    pub fn cooldown(&self) -> Duration {
        Duration::from_secs(self.cooldown_secs)
    }
}

impl Config {
    /// Load configuration from a TOML file.
    ///
    /// Returns an error if the file contains invalid TOML.
    /// Missing fields use default values.
    pub fn load(path: &Path) -> Result<Self> {
        let contents = fs::read_to_string(path)?;
        let config: Config = toml::from_str(&contents)?;
        config.validate()?;
        Ok(config)
    }

    /// Load configuration from a file or return defaults if it doesn't exist.
    ///
    /// Only a missing file falls back to defaults; invalid TOML and invalid
    /// values are real errors.
    pub fn load_or_default(path: &Path) -> Result<Self> {
        match Self::load(path) {
            Ok(config) => Ok(config),
            Err(OverscribeError::Io(e)) if e.kind() == std::io::ErrorKind::NotFound => {
                Ok(Self::default())
            }
            Err(e) => Err(e),
        }
    }

    /// Reject configurations the pipeline cannot run with.
    pub fn validate(&self) -> Result<()> {
        if self.segments.duration_cap_secs <= self.segments.tick_interval_secs {
            return Err(OverscribeError::ConfigInvalidValue {
                key: "segments.duration_cap_secs".to_string(),
                message: format!(
                    "must exceed tick_interval_secs ({}) or coverage has gaps",
                    self.segments.tick_interval_secs
                ),
            });
        }
        if self.segments.tick_interval_secs == 0 {
            return Err(OverscribeError::ConfigInvalidValue {
                key: "segments.tick_interval_secs".to_string(),
                message: "must be positive".to_string(),
            });
        }
        Ok(())
    }

    /// Apply environment variable overrides.
    ///
    /// Supported environment variables:
    /// - OVERSCRIBE_BASE_URL → service.base_url
    /// - OVERSCRIBE_CHAT_MODEL → service.chat_model
    /// - OVERSCRIBE_TRANSCRIBE_MODEL → service.transcribe_model
    /// - OVERSCRIBE_LANGUAGE → service.language
    pub fn with_env_overrides(mut self) -> Self {
        if let Ok(url) = std::env::var("OVERSCRIBE_BASE_URL")
            && !url.is_empty()
        {
            self.service.base_url = url;
        }

        if let Ok(model) = std::env::var("OVERSCRIBE_CHAT_MODEL")
            && !model.is_empty()
        {
            self.service.chat_model = model;
        }

        if let Ok(model) = std::env::var("OVERSCRIBE_TRANSCRIBE_MODEL")
            && !model.is_empty()
        {
            self.service.transcribe_model = model;
        }

        if let Ok(language) = std::env::var("OVERSCRIBE_LANGUAGE")
            && !language.is_empty()
        {
            self.service.language = language;
        }

        self
    }

    /// Worker count clamped to the supported pool size.
    pub fn worker_count(&self) -> usize {
        self.transcription
            .workers
            .clamp(defaults::MIN_WORKERS, defaults::MAX_WORKERS)
    }

    /// Get the default configuration file path.
    ///
    /// Returns ~/.config/overscribe/config.toml on Linux.
    pub fn default_path() -> PathBuf {
        dirs::config_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join("overscribe")
            .join("config.toml")
    }
}

/// Collect API keys from the environment.
///
/// Scans all variables whose name starts with the given prefix, sorted by
/// name so key rotation order is stable across runs.
pub fn credentials_from_env(prefix: &str) -> Result<Vec<String>> {
    let mut pairs: Vec<(String, String)> = std::env::vars()
        .filter(|(name, value)| name.starts_with(prefix) && !value.is_empty())
        .collect();
    pairs.sort_by(|a, b| a.0.cmp(&b.0));

    let keys: Vec<String> = pairs.into_iter().map(|(_, value)| value).collect();
    if keys.is_empty() {
        return Err(OverscribeError::NoCredentials {
            prefix: prefix.to_string(),
        });
    }
    Ok(keys)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use std::sync::Mutex;
    use tempfile::NamedTempFile;

    // Mutex to serialize tests that modify environment variables
    static ENV_LOCK: Mutex<()> = Mutex::new(());

    // SAFETY: These helpers are only used in tests with ENV_LOCK held,
    // ensuring no concurrent access to environment variables.
    fn set_env(key: &str, value: &str) {
        unsafe { std::env::set_var(key, value) }
    }

    fn remove_env(key: &str) {
        unsafe { std::env::remove_var(key) }
    }

    fn clear_overscribe_env() {
        remove_env("OVERSCRIBE_BASE_URL");
        remove_env("OVERSCRIBE_CHAT_MODEL");
        remove_env("OVERSCRIBE_TRANSCRIBE_MODEL");
        remove_env("OVERSCRIBE_LANGUAGE");
    }

    #[test]
    fn test_default_config_has_correct_values() {
        let config = Config::default();

        assert_eq!(config.segments.tick_interval_secs, 12);
        assert_eq!(config.segments.duration_cap_secs, 15);
        assert_eq!(config.segments.sample_rate, 16000);

        assert_eq!(config.transcription.workers, 2);
        assert_eq!(config.transcription.max_retries, 3);

        assert_eq!(config.credentials.cooldown_secs, 300);

        assert_eq!(config.service.chat_model, "llama-3.3-70b-versatile");
        assert_eq!(config.service.transcribe_model, "whisper-large-v3-turbo");
        assert_eq!(config.service.language, "en");
    }

    #[test]
    fn test_load_from_toml_file() {
        let toml_content = r#"
            [segments]
            tick_interval_secs = 10
            duration_cap_secs = 14

            [transcription]
            workers = 4
            max_retries = 5

            [credentials]
            cooldown_secs = 120

            [service]
            chat_model = "llama-3.1-8b-instant"
            language = "de"
        "#;

        let mut temp_file = NamedTempFile::new().unwrap();
        temp_file.write_all(toml_content.as_bytes()).unwrap();

        let config = Config::load(temp_file.path()).unwrap();

        assert_eq!(config.segments.tick_interval_secs, 10);
        assert_eq!(config.segments.duration_cap_secs, 14);
        assert_eq!(config.transcription.workers, 4);
        assert_eq!(config.transcription.max_retries, 5);
        assert_eq!(config.credentials.cooldown_secs, 120);
        assert_eq!(config.service.chat_model, "llama-3.1-8b-instant");
        assert_eq!(config.service.language, "de");
        // Untouched section keeps defaults
        assert_eq!(config.service.transcribe_model, "whisper-large-v3-turbo");
    }

    #[test]
    fn test_load_partial_config_uses_defaults() {
        let toml_content = r#"
            [transcription]
            workers = 3
        "#;

        let mut temp_file = NamedTempFile::new().unwrap();
        temp_file.write_all(toml_content.as_bytes()).unwrap();

        let config = Config::load(temp_file.path()).unwrap();

        assert_eq!(config.transcription.workers, 3);
        assert_eq!(config.transcription.max_retries, 3);
        assert_eq!(config.segments.tick_interval_secs, 12);
    }

    #[test]
    fn test_validate_rejects_cap_not_exceeding_interval() {
        let config = Config {
            segments: SegmentConfig {
                tick_interval_secs: 15,
                duration_cap_secs: 15,
                sample_rate: 16000,
            },
            ..Default::default()
        };

        let result = config.validate();
        assert!(matches!(
            result,
            Err(OverscribeError::ConfigInvalidValue { ref key, .. })
                if key == "segments.duration_cap_secs"
        ));
    }

    #[test]
    fn test_worker_count_clamped() {
        let mut config = Config::default();

        config.transcription.workers = 1;
        assert_eq!(config.worker_count(), 2);

        config.transcription.workers = 9;
        assert_eq!(config.worker_count(), 5);

        config.transcription.workers = 3;
        assert_eq!(config.worker_count(), 3);
    }

    #[test]
    fn test_env_override_models() {
        let _lock = ENV_LOCK.lock().unwrap();
        clear_overscribe_env();

        set_env("OVERSCRIBE_CHAT_MODEL", "mixtral-8x7b");
        set_env("OVERSCRIBE_LANGUAGE", "fr");
        let config = Config::default().with_env_overrides();

        assert_eq!(config.service.chat_model, "mixtral-8x7b");
        assert_eq!(config.service.language, "fr");
        // Not overridden
        assert_eq!(config.service.transcribe_model, "whisper-large-v3-turbo");

        clear_overscribe_env();
    }

    #[test]
    fn test_env_override_empty_string_ignored() {
        let _lock = ENV_LOCK.lock().unwrap();
        clear_overscribe_env();

        set_env("OVERSCRIBE_CHAT_MODEL", "");
        let config = Config::default().with_env_overrides();

        assert_eq!(config.service.chat_model, "llama-3.3-70b-versatile");

        clear_overscribe_env();
    }

    #[test]
    fn test_invalid_toml_returns_error() {
        let invalid_toml = r#"
            [segments
            tick_interval_secs = "broken
        "#;

        let mut temp_file = NamedTempFile::new().unwrap();
        temp_file.write_all(invalid_toml.as_bytes()).unwrap();

        let result = Config::load(temp_file.path());
        assert!(result.is_err());
    }

    #[test]
    fn test_load_or_default_returns_default_for_missing_file() {
        let missing_path = Path::new("/tmp/nonexistent_overscribe_config_12345.toml");
        let config = Config::load_or_default(missing_path).unwrap();
        assert_eq!(config, Config::default());
    }

    #[test]
    fn test_load_or_default_propagates_invalid_toml() {
        let invalid_toml = "not valid = toml =";

        let mut temp_file = NamedTempFile::new().unwrap();
        temp_file.write_all(invalid_toml.as_bytes()).unwrap();

        let result = Config::load_or_default(temp_file.path());
        assert!(result.is_err());
    }

    #[test]
    fn test_default_path_is_xdg_compliant() {
        let path = Config::default_path();
        let path_str = path.to_string_lossy();

        assert!(path_str.contains("overscribe"));
        assert!(path_str.ends_with("config.toml"));
    }

    #[test]
    fn test_credentials_from_env_sorted() {
        let _lock = ENV_LOCK.lock().unwrap();

        set_env("OVERSCRIBE_TEST_KEY_B", "key-b");
        set_env("OVERSCRIBE_TEST_KEY_A", "key-a");

        let keys = credentials_from_env("OVERSCRIBE_TEST_KEY").unwrap();
        assert_eq!(keys, vec!["key-a".to_string(), "key-b".to_string()]);

        remove_env("OVERSCRIBE_TEST_KEY_A");
        remove_env("OVERSCRIBE_TEST_KEY_B");
    }

    #[test]
    fn test_credentials_from_env_missing_is_error() {
        let _lock = ENV_LOCK.lock().unwrap();

        let result = credentials_from_env("OVERSCRIBE_NO_SUCH_PREFIX");
        assert!(matches!(
            result,
            Err(OverscribeError::NoCredentials { ref prefix })
                if prefix == "OVERSCRIBE_NO_SUCH_PREFIX"
        ));
    }

    #[test]
    fn test_credentials_from_env_skips_empty_values() {
        let _lock = ENV_LOCK.lock().unwrap();

        set_env("OVERSCRIBE_EMPTY_KEY_1", "");
        set_env("OVERSCRIBE_EMPTY_KEY_2", "real");

        let keys = credentials_from_env("OVERSCRIBE_EMPTY_KEY").unwrap();
        assert_eq!(keys, vec!["real".to_string()]);

        remove_env("OVERSCRIBE_EMPTY_KEY_1");
        remove_env("OVERSCRIBE_EMPTY_KEY_2");
    }
}
