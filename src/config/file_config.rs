//! Configuration file discovery and creation.
//!
//! # Configuration File Format
//!
//! ```toml
//! [models]
//! api_base = "https://api.openai.com/v1"
//! primary_model = "gpt-4o"
//! fallback_model = "gpt-4o-mini"
//! discovery_model = "gpt-4o-mini"
//! request_timeout_secs = 300
//!
//! [providers]
//! structured_endpoint = "http://localhost:8081/search"
//! hidden_city_endpoint = "http://localhost:8082/search"
//! adapter_timeout_secs = 180
//!
//! [budget]
//! structured_cap = 60
//! hidden_city_cap = 60
//! suggested_cap = 100
//! max_candidates = 10
//!
//! [report]
//! downgrade_threshold = 3
//!
//! [transport]
//! proxy = "socks5://127.0.0.1:1080"
//! ca_bundle = "/etc/ssl/corp-root.pem"
//! ```

use std::path::{Path, PathBuf};

use super::{Config, ConfigError};

const LOCAL_CONFIG_NAME: &str = "fare-master.toml";

/// Path of the per-user configuration file
pub fn default_config_path() -> Option<PathBuf> {
    dirs::config_dir().map(|dir| dir.join("fare-master").join("config.toml"))
}

/// Find a configuration file: `./fare-master.toml` first, then the per-user file
pub fn find_config_file() -> Option<PathBuf> {
    let local = PathBuf::from(LOCAL_CONFIG_NAME);
    if local.is_file() {
        return Some(local);
    }

    default_config_path().filter(|path| path.is_file())
}

/// Write the default configuration as TOML, creating parent directories
pub fn write_default_config(path: &Path) -> Result<(), ConfigError> {
    let content = toml::to_string_pretty(&Config::default())?;

    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            std::fs::create_dir_all(parent)?;
        }
    }

    std::fs::write(path, content)?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::load_config;
    use tempfile::tempdir;

    #[test]
    fn test_write_default_config_round_trips() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("nested").join("config.toml");

        write_default_config(&path).unwrap();
        assert!(path.is_file());

        let content = std::fs::read_to_string(&path).unwrap();
        assert!(content.contains("[models]"));
        assert!(!content.contains("api_key"));

        let loaded = load_config(Some(&path)).unwrap();
        assert_eq!(loaded.budget.suggested_cap, 100);
        assert_eq!(loaded.models.primary_model, "gpt-4o");
    }

    #[test]
    fn test_default_config_path_is_namespaced() {
        if let Some(path) = default_config_path() {
            assert!(path.ends_with("fare-master/config.toml"));
        }
    }
}
