//! Dispatch configuration

use crate::error::{DistributedError, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Configuration for query-context dispatching
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DispatchConfig {
    /// Size in KB a context may reach in memory before spilling to shared storage
    pub memory_limit_kb: usize,
    /// Directory for spilled contexts. Defaults to the coordinator's
    /// location of the database default tablespace.
    pub shared_dir: Option<PathBuf>,
    /// Log every dispatched object
    pub debug_print: bool,
    /// Log every dispatched and rebuilt tuple
    pub debug_print_tuple: bool,
}

impl Default for DispatchConfig {
    fn default() -> Self {
        Self {
            memory_limit_kb: 100 * 1024, // 100 MB
            shared_dir: None,
            debug_print: false,
            debug_print_tuple: false,
        }
    }
}

impl DispatchConfig {
    /// Load a JSON configuration file
    pub fn from_file(path: &Path) -> Result<Self> {
        let contents = std::fs::read_to_string(path)?;
        let config: DispatchConfig = serde_json::from_str(&contents)
            .map_err(|e| DistributedError::SerializationError(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    pub fn save(&self, path: &Path) -> Result<()> {
        let contents = serde_json::to_string_pretty(self)
            .map_err(|e| DistributedError::SerializationError(e.to_string()))?;
        std::fs::write(path, contents)?;
        Ok(())
    }

    pub fn validate(&self) -> Result<()> {
        if self.memory_limit_kb == 0 {
            return Err(DistributedError::InvalidConfig(
                "memory_limit_kb must be greater than zero".to_string(),
            ));
        }
        Ok(())
    }

    pub fn memory_limit_bytes(&self) -> usize {
        self.memory_limit_kb * 1024
    }

    /// Set the in-memory limit in KB
    pub fn with_memory_limit_kb(mut self, kb: usize) -> Self {
        self.memory_limit_kb = kb;
        self
    }

    /// Spill into `dir` instead of the default tablespace location
    pub fn with_shared_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.shared_dir = Some(dir.into());
        self
    }

    pub fn with_debug_print(mut self, enabled: bool) -> Self {
        self.debug_print = enabled;
        self
    }

    pub fn with_debug_print_tuple(mut self, enabled: bool) -> Self {
        self.debug_print_tuple = enabled;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = DispatchConfig::default();
        assert_eq!(config.memory_limit_kb, 100 * 1024);
        assert_eq!(config.memory_limit_bytes(), 100 * 1024 * 1024);
        assert!(config.shared_dir.is_none());
        assert!(!config.debug_print);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_builder_pattern() {
        let config = DispatchConfig::default()
            .with_memory_limit_kb(4)
            .with_shared_dir("/tmp/ctx")
            .with_debug_print(true)
            .with_debug_print_tuple(true);

        assert_eq!(config.memory_limit_bytes(), 4096);
        assert_eq!(config.shared_dir, Some(PathBuf::from("/tmp/ctx")));
        assert!(config.debug_print);
        assert!(config.debug_print_tuple);
    }

    #[test]
    fn test_zero_limit_rejected() {
        let config = DispatchConfig::default().with_memory_limit_kb(0);
        assert!(matches!(
            config.validate(),
            Err(DistributedError::InvalidConfig(_))
        ));
    }

    #[test]
    fn test_file_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("dispatch.json");
        let config = DispatchConfig::default()
            .with_memory_limit_kb(64)
            .with_debug_print(true);
        config.save(&path).unwrap();
        assert_eq!(DispatchConfig::from_file(&path).unwrap(), config);
    }

    #[test]
    fn test_partial_file_uses_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("dispatch.json");
        std::fs::write(&path, r#"{ "memory_limit_kb": 8 }"#).unwrap();
        let config = DispatchConfig::from_file(&path).unwrap();
        assert_eq!(config.memory_limit_kb, 8);
        assert!(!config.debug_print_tuple);
    }
}
