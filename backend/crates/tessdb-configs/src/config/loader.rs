use super::types::{EngineConfig, StorageBackendKind};
use std::fs;
use std::path::Path;

const VALID_LEVELS: [&str; 5] = ["error", "warn", "info", "debug", "trace"];

impl EngineConfig {
    /// Load configuration from a TOML file
    pub fn from_file<P: AsRef<Path>>(path: P) -> anyhow::Result<Self> {
        let content = fs::read_to_string(path.as_ref())
            .map_err(|e| anyhow::anyhow!("Failed to read config file: {}", e))?;

        Self::from_toml_str(&content)
    }

    /// Parse and validate configuration from TOML text
    pub fn from_toml_str(content: &str) -> anyhow::Result<Self> {
        let config: EngineConfig = toml::from_str(content)
            .map_err(|e| anyhow::anyhow!("Failed to parse config file: {}", e))?;

        config.validate()?;

        Ok(config)
    }

    /// Validate configuration settings
    pub fn validate(&self) -> anyhow::Result<()> {
        if !VALID_LEVELS.contains(&self.logging.level.as_str()) {
            return Err(anyhow::anyhow!(
                "Invalid log level '{}'. Must be one of: {}",
                self.logging.level,
                VALID_LEVELS.join(", ")
            ));
        }

        let valid_formats = ["compact", "json"];
        if !valid_formats.contains(&self.logging.format.as_str()) {
            return Err(anyhow::anyhow!(
                "Invalid log format '{}'. Must be one of: {}",
                self.logging.format,
                valid_formats.join(", ")
            ));
        }

        for (target, level) in &self.logging.targets {
            if !VALID_LEVELS.contains(&level.as_str()) {
                return Err(anyhow::anyhow!(
                    "Invalid log level '{}' for target '{}'. Must be one of: {}",
                    level,
                    target,
                    VALID_LEVELS.join(", ")
                ));
            }
        }

        if self.storage.backend != StorageBackendKind::Memory
            && self.storage.path.trim().is_empty()
        {
            return Err(anyhow::anyhow!("storage.path cannot be empty"));
        }

        // An empty heap store has nothing to read
        if self.storage.backend == StorageBackendKind::Memory && self.storage.read_only {
            return Err(anyhow::anyhow!(
                "storage.read_only cannot be combined with the memory backend"
            ));
        }

        if self.shutdown.executor_await_timeout_ms == 0 {
            return Err(anyhow::anyhow!("executor_await_timeout_ms cannot be 0"));
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_default_config_is_valid() {
        let config = EngineConfig::default();
        assert!(config.validate().is_ok());
        assert!(config.catalog.thread_safe);
        assert!(config.catalog.verify_on_open);
        assert_eq!(config.storage.backend, StorageBackendKind::File);
    }

    #[test]
    fn test_empty_toml_uses_defaults() {
        let config = EngineConfig::from_toml_str("").unwrap();
        assert_eq!(config.logging.level, "info");
        assert_eq!(config.shutdown.executor_await_timeout_ms, 5000);
        assert!(config.shutdown.weak_reference);
    }

    #[test]
    fn test_parse_sections() {
        let config = EngineConfig::from_toml_str(
            r#"
            [storage]
            backend = "memory"

            [catalog]
            thread_safe = false

            [shutdown]
            close_on_exit = true
            weak_reference = false

            [logging]
            level = "debug"
            format = "json"

            [logging.targets]
            tessdb_catalog = "trace"
            "#,
        )
        .unwrap();

        assert_eq!(config.storage.backend, StorageBackendKind::Memory);
        assert!(!config.catalog.thread_safe);
        assert!(config.shutdown.close_on_exit);
        assert!(!config.shutdown.weak_reference);
        assert_eq!(config.logging.targets.get("tessdb_catalog").unwrap(), "trace");
    }

    #[test]
    fn test_invalid_log_level() {
        let err = EngineConfig::from_toml_str("[logging]\nlevel = \"loud\"").unwrap_err();
        assert!(err.to_string().contains("Invalid log level"));
    }

    #[test]
    fn test_invalid_target_level() {
        let err = EngineConfig::from_toml_str("[logging.targets]\nfoo = \"chatty\"").unwrap_err();
        assert!(err.to_string().contains("target 'foo'"));
    }

    #[test]
    fn test_read_only_memory_rejected() {
        let err = EngineConfig::from_toml_str(
            "[storage]\nbackend = \"memory\"\nread_only = true",
        )
        .unwrap_err();
        assert!(err.to_string().contains("read_only"));
    }

    #[test]
    fn test_zero_timeout_rejected() {
        let err =
            EngineConfig::from_toml_str("[shutdown]\nexecutor_await_timeout_ms = 0").unwrap_err();
        assert!(err.to_string().contains("executor_await_timeout_ms"));
    }

    #[test]
    fn test_from_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "[storage]\npath = \"/tmp/x.db\"\nread_only = true").unwrap();
        let config = EngineConfig::from_file(file.path()).unwrap();
        assert_eq!(config.storage.path, "/tmp/x.db");
        assert!(config.storage.read_only);
    }

    #[test]
    fn test_missing_file() {
        let err = EngineConfig::from_file("/definitely/not/here.toml").unwrap_err();
        assert!(err.to_string().contains("Failed to read config file"));
    }
}
