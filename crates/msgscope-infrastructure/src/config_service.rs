//! Loading `ScopeConfig` from TOML files.

use msgscope_core::config::ScopeConfig;
use msgscope_core::error::{Result, ScopeError};
use std::fs;
use std::path::{Path, PathBuf};

/// Returns the default config location: `~/.config/msgscope/config.toml`
/// (platform config directory elsewhere).
pub fn default_config_path() -> Option<PathBuf> {
    dirs::config_dir().map(|dir| dir.join("msgscope").join("config.toml"))
}

/// Loads the config file at `path`.
///
/// # Returns
///
/// - `Ok(config)`: Parsed config, or defaults if the file is missing or empty
/// - `Err`: The file could not be read or is not valid TOML
pub fn load_config(path: &Path) -> Result<ScopeConfig> {
    if !path.exists() {
        tracing::debug!("Config file {} not found, using defaults", path.display());
        return Ok(ScopeConfig::default());
    }

    let content = fs::read_to_string(path)?;
    if content.trim().is_empty() {
        return Ok(ScopeConfig::default());
    }

    let config: ScopeConfig = toml::from_str(&content)?;
    validate(&config)?;
    Ok(config)
}

/// Loads `path` if given, otherwise the default location.
pub fn load_config_or_default(path: Option<&Path>) -> Result<ScopeConfig> {
    match path {
        Some(path) => load_config(path),
        None => match default_config_path() {
            Some(path) => load_config(&path),
            None => Ok(ScopeConfig::default()),
        },
    }
}

fn validate(config: &ScopeConfig) -> Result<()> {
    if config.stream.page_size == 0 {
        return Err(ScopeError::config("stream.page_size must be > 0"));
    }
    if config.stream.buffer == 0 {
        return Err(ScopeError::config("stream.buffer must be > 0"));
    }
    if config.stream.status_buffer == 0 {
        return Err(ScopeError::config("stream.status_buffer must be > 0"));
    }
    if config.cache.messages_per_session == 0 {
        return Err(ScopeError::config("cache.messages_per_session must be > 0"));
    }
    if config.cache.max_sessions == 0 {
        return Err(ScopeError::config("cache.max_sessions must be > 0"));
    }
    if config.cache.payload_max_weight == 0 {
        return Err(ScopeError::config("cache.payload_max_weight must be > 0"));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use msgscope_core::config::TimestampMode;
    use tempfile::TempDir;

    #[test]
    fn test_missing_file_yields_defaults() {
        let temp_dir = TempDir::new().unwrap();
        let config = load_config(&temp_dir.path().join("config.toml")).unwrap();
        assert_eq!(config, ScopeConfig::default());
    }

    #[test]
    fn test_empty_file_yields_defaults() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("config.toml");
        fs::write(&path, "   \n").unwrap();
        assert_eq!(load_config(&path).unwrap(), ScopeConfig::default());
    }

    #[test]
    fn test_load_values() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("config.toml");
        fs::write(
            &path,
            r#"
            timestamps = "session_relative"

            [cache]
            messages_per_session = 16

            [keys]
            status_channel = "status"
            "#,
        )
        .unwrap();

        let config = load_config(&path).unwrap();
        assert_eq!(config.timestamps, TimestampMode::SessionRelative);
        assert_eq!(config.cache.messages_per_session, 16);
        assert_eq!(config.keys.status_channel, "status");
        assert_eq!(config.keys.session_counter, "numSessions");
    }

    #[test]
    fn test_malformed_toml_is_serialization_error() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("config.toml");
        fs::write(&path, "[stream\npage_size = ").unwrap();

        let err = load_config(&path).unwrap_err();
        assert!(matches!(err, ScopeError::Serialization { .. }));
    }

    #[test]
    fn test_zero_page_size_is_rejected() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("config.toml");
        fs::write(&path, "[stream]\npage_size = 0\n").unwrap();

        assert!(load_config(&path).unwrap_err().is_config());
    }

    #[test]
    fn test_zero_cache_sizes_are_rejected() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("config.toml");
        for field in ["messages_per_session", "max_sessions", "payload_max_weight"] {
            fs::write(&path, format!("[cache]\n{} = 0\n", field)).unwrap();
            let err = load_config(&path).unwrap_err();
            assert!(err.is_config());
            assert!(err.to_string().contains(field));
        }
    }
}
