//! Directory configuration
//!
//! Settings come from `<config_dir>/hotlines/config.json`, with environment
//! variables taking precedence over the file.

use anyhow::{anyhow, Context, Result};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::env;
use std::path::{Path, PathBuf};

use crate::sheets::url::validate_sheet_url;

// Environment variable names
const ENV_SHEET_URL: &str = "HOTLINES_SHEET_URL";
const ENV_FETCH_KEY: &str = "HOTLINES_FETCH_KEY";
const ENV_CACHE_DIR: &str = "HOTLINES_CACHE_DIR";
const ENV_PORT: &str = "HOTLINES_PORT";

pub const DEFAULT_PORT: u16 = 9820;
pub const DEFAULT_LOGO: &str = "images/bacoor-logo.jpg";
pub const DEFAULT_MESSENGER: &str = "https://m.me/194115273982761";
pub const DEFAULT_SESSION_TTL_SECS: u64 = 3600;

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Published spreadsheet link (any accepted publish/share form).
    pub sheet_url: String,
    /// Shared secret for the manual refresh endpoint. Empty disables it.
    pub fetch_key: String,
    pub cache_dir: PathBuf,
    pub port: u16,
    pub default_logo: String,
    pub messenger_default: String,
    /// Contact name -> Messenger link.
    pub messenger_links: BTreeMap<String, String>,
    pub session_ttl_secs: u64,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            sheet_url: String::new(),
            fetch_key: String::new(),
            cache_dir: default_cache_dir(),
            port: DEFAULT_PORT,
            default_logo: DEFAULT_LOGO.to_string(),
            messenger_default: DEFAULT_MESSENGER.to_string(),
            messenger_links: BTreeMap::new(),
            session_ttl_secs: DEFAULT_SESSION_TTL_SECS,
        }
    }
}

impl Config {
    /// Load from the default config file (if present) and the environment.
    pub fn load() -> Result<Self> {
        let path = Self::default_path()?;
        let mut config = if path.exists() {
            Self::from_file(&path)?
        } else {
            Self::default()
        };
        config.apply_env(|key| env::var(key).ok());
        config.sanitize();
        Ok(config)
    }

    pub fn from_file(path: &Path) -> Result<Self> {
        let raw = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file {}", path.display()))?;
        serde_json::from_str(&raw)
            .with_context(|| format!("Invalid config file {}", path.display()))
    }

    pub fn default_path() -> Result<PathBuf> {
        let config_dir =
            dirs::config_dir().ok_or_else(|| anyhow!("Could not find config directory"))?;
        Ok(config_dir.join("hotlines").join("config.json"))
    }

    /// Overlay environment values. `lookup` is `env::var` outside of tests.
    pub fn apply_env<F>(&mut self, lookup: F)
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(url) = lookup(ENV_SHEET_URL) {
            self.sheet_url = url;
        }
        if let Some(key) = lookup(ENV_FETCH_KEY) {
            self.fetch_key = key;
        }
        if let Some(dir) = lookup(ENV_CACHE_DIR) {
            self.cache_dir = PathBuf::from(dir);
        }
        if let Some(port) = lookup(ENV_PORT) {
            match port.parse() {
                Ok(p) => self.port = p,
                Err(_) => tracing::warn!(value = %port, "ignoring invalid {}", ENV_PORT),
            }
        }
    }

    /// Fail closed on a sheet link from the wrong domain or with a dangerous scheme.
    pub fn sanitize(&mut self) {
        self.sheet_url = self.sheet_url.trim().to_string();
        if !self.sheet_url.is_empty() && !validate_sheet_url(&self.sheet_url) {
            tracing::warn!("configured sheet URL failed validation; treating as unset");
            self.sheet_url.clear();
        }
    }

    pub fn has_sheet_url(&self) -> bool {
        !self.sheet_url.is_empty()
    }

    /// Fetch key with all but the first four characters hidden.
    pub fn masked_fetch_key(&self) -> String {
        if self.fetch_key.is_empty() {
            return "(unset)".to_string();
        }
        let visible: String = self.fetch_key.chars().take(4).collect();
        format!("{}{}", visible, "*".repeat(self.fetch_key.chars().count().saturating_sub(4)))
    }
}

fn default_cache_dir() -> PathBuf {
    dirs::cache_dir()
        .unwrap_or_else(env::temp_dir)
        .join("hotlines")
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    const SHEET: &str = "https://docs.google.com/spreadsheets/d/e/2PACX-abc/pub?gid=0&single=true&output=csv";

    #[test]
    fn test_defaults() {
        let config = Config::default();
        assert_eq!(config.port, DEFAULT_PORT);
        assert_eq!(config.default_logo, DEFAULT_LOGO);
        assert_eq!(config.session_ttl_secs, 3600);
        assert!(!config.has_sheet_url());
    }

    #[test]
    fn test_env_takes_precedence() {
        let mut config = Config {
            sheet_url: "https://docs.google.com/spreadsheets/d/file-id/edit".to_string(),
            ..Config::default()
        };
        let env: HashMap<&str, &str> = [
            (ENV_SHEET_URL, SHEET),
            (ENV_FETCH_KEY, "secret"),
            (ENV_PORT, "8080"),
        ]
        .into_iter()
        .collect();

        config.apply_env(|k| env.get(k).map(|v| v.to_string()));

        assert_eq!(config.sheet_url, SHEET);
        assert_eq!(config.fetch_key, "secret");
        assert_eq!(config.port, 8080);
    }

    #[test]
    fn test_invalid_port_ignored() {
        let mut config = Config::default();
        config.apply_env(|k| (k == ENV_PORT).then(|| "not-a-port".to_string()));
        assert_eq!(config.port, DEFAULT_PORT);
    }

    #[test]
    fn test_sanitize_clears_foreign_domain() {
        let mut config = Config {
            sheet_url: "https://evil.example.com/spreadsheets/d/abc".to_string(),
            ..Config::default()
        };
        config.sanitize();
        assert!(!config.has_sheet_url());
    }

    #[test]
    fn test_sanitize_clears_dangerous_scheme() {
        let mut config = Config {
            sheet_url: format!("{}&x=javascript:alert(1)", SHEET),
            ..Config::default()
        };
        config.sanitize();
        assert!(!config.has_sheet_url());
    }

    #[test]
    fn test_sanitize_keeps_valid_link() {
        let mut config = Config {
            sheet_url: format!("  {}  ", SHEET),
            ..Config::default()
        };
        config.sanitize();
        assert_eq!(config.sheet_url, SHEET);
    }

    #[test]
    fn test_from_file_partial() {
        use std::io::Write;
        use tempfile::NamedTempFile;

        let mut file = NamedTempFile::new().unwrap();
        write!(
            file,
            r#"{{"fetch_key": "k", "messenger_links": {{"PNP": "https://m.me/pnp"}}}}"#
        )
        .unwrap();

        let config = Config::from_file(file.path()).unwrap();
        assert_eq!(config.fetch_key, "k");
        assert_eq!(config.messenger_links.get("PNP").map(String::as_str), Some("https://m.me/pnp"));
        assert_eq!(config.port, DEFAULT_PORT);
    }

    #[test]
    fn test_from_file_ignores_retired_tls_flag() {
        use std::io::Write;
        use tempfile::NamedTempFile;

        let mut file = NamedTempFile::new().unwrap();
        write!(file, r#"{{"fetch_key": "k", "allow_insecure_localhost": true}}"#).unwrap();

        let config = Config::from_file(file.path()).unwrap();
        assert_eq!(config.fetch_key, "k");
        let round_trip = serde_json::to_value(&config).unwrap();
        assert!(round_trip.get("allow_insecure_localhost").is_none());
    }

    #[test]
    fn test_masked_fetch_key() {
        let config = Config {
            fetch_key: "abcdef12".to_string(),
            ..Config::default()
        };
        assert_eq!(config.masked_fetch_key(), "abcd****");
        assert_eq!(Config::default().masked_fetch_key(), "(unset)");
    }
}
