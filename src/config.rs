//! Runtime settings: built-in defaults, an optional TOML file, then CLI flags.

use anyhow::{Context, Result};
use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::time::Duration;

pub const DEFAULT_BASE_URL: &str = "http://localhost:8000";
pub const DEFAULT_TOP_K: u32 = 3;
pub const DEFAULT_TICK_INTERVAL: Duration = Duration::from_millis(800);

#[derive(Debug, Clone, PartialEq)]
pub struct Settings {
    pub base_url: String,
    pub top_k: u32,
    /// Period of the simulated progress ticker.
    pub tick_interval: Duration,
    /// `None` leaves the transport default in place.
    pub request_timeout: Option<Duration>,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            base_url: DEFAULT_BASE_URL.to_string(),
            top_k: DEFAULT_TOP_K,
            tick_interval: DEFAULT_TICK_INTERVAL,
            request_timeout: None,
        }
    }
}

/// Contents of `config.toml`. Every key is optional.
#[derive(Debug, Default, Deserialize, PartialEq)]
#[serde(deny_unknown_fields)]
pub struct FileConfig {
    pub base_url: Option<String>,
    pub top_k: Option<u32>,
    #[serde(default, with = "humantime_serde")]
    pub tick_interval: Option<Duration>,
    #[serde(default, with = "humantime_serde")]
    pub request_timeout: Option<Duration>,
}

/// Values given on the command line; they win over the file.
#[derive(Debug, Default, Clone)]
pub struct Overrides {
    pub base_url: Option<String>,
    pub top_k: Option<u32>,
    pub tick_interval: Option<Duration>,
    pub request_timeout: Option<Duration>,
}

impl Settings {
    pub fn merge(file: FileConfig, cli: Overrides) -> Self {
        let defaults = Settings::default();
        Settings {
            base_url: cli
                .base_url
                .or(file.base_url)
                .unwrap_or(defaults.base_url),
            top_k: cli.top_k.or(file.top_k).unwrap_or(defaults.top_k),
            tick_interval: cli
                .tick_interval
                .or(file.tick_interval)
                .unwrap_or(defaults.tick_interval),
            request_timeout: cli.request_timeout.or(file.request_timeout),
        }
    }

    /// Load settings. An explicit `path` must exist; the default location may be absent.
    pub fn load(path: Option<&Path>, cli: Overrides) -> Result<Self> {
        let file = match path {
            Some(p) => read_file_config(p)?,
            None => match default_config_path() {
                Some(p) if p.exists() => read_file_config(&p)?,
                _ => FileConfig::default(),
            },
        };
        let settings = Settings::merge(file, cli);
        if settings.top_k == 0 {
            anyhow::bail!("top_k must be at least 1");
        }
        if settings.tick_interval.is_zero() {
            anyhow::bail!("tick_interval must be greater than zero");
        }
        Ok(settings)
    }
}

pub fn default_config_path() -> Option<PathBuf> {
    dirs::config_dir().map(|d| d.join("querio").join("config.toml"))
}

fn read_file_config(path: &Path) -> Result<FileConfig> {
    let raw = std::fs::read_to_string(path)
        .with_context(|| format!("read config {}", path.display()))?;
    toml::from_str(&raw).with_context(|| format!("parse config {}", path.display()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cli_beats_file_beats_default() {
        let file = FileConfig {
            base_url: Some("http://file:8000".into()),
            top_k: Some(5),
            tick_interval: None,
            request_timeout: Some(Duration::from_secs(30)),
        };
        let cli = Overrides {
            base_url: Some("http://cli:9000".into()),
            ..Default::default()
        };
        let s = Settings::merge(file, cli);
        assert_eq!(s.base_url, "http://cli:9000");
        assert_eq!(s.top_k, 5);
        assert_eq!(s.tick_interval, DEFAULT_TICK_INTERVAL);
        assert_eq!(s.request_timeout, Some(Duration::from_secs(30)));
    }

    #[test]
    fn parses_humantime_durations() {
        let file: FileConfig = toml::from_str(
            r#"
base_url = "http://example:8000"
tick_interval = "250ms"
request_timeout = "1m"
"#,
        )
        .unwrap();
        assert_eq!(file.tick_interval, Some(Duration::from_millis(250)));
        assert_eq!(file.request_timeout, Some(Duration::from_secs(60)));
    }

    #[test]
    fn unknown_keys_are_rejected() {
        assert!(toml::from_str::<FileConfig>("colour = \"blue\"").is_err());
    }

    #[test]
    fn explicit_missing_file_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let missing = dir.path().join("nope.toml");
        assert!(Settings::load(Some(&missing), Overrides::default()).is_err());
    }

    #[test]
    fn zero_top_k_is_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        std::fs::write(&path, "top_k = 0\n").unwrap();
        assert!(Settings::load(Some(&path), Overrides::default()).is_err());
    }
}
