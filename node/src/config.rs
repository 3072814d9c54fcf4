//! Process configuration: optional config file, then environment variables.

use anyhow::{anyhow, Result};
use config::{Config, Environment, File as ConfigFile};
use std::path::{Path, PathBuf};
use std::time::Duration;

const DEFAULT_LISTEN_ADDR: &str = "0.0.0.0:6969";
const DEFAULT_SEARCH_TIMEOUT: Duration = Duration::from_secs(30);
const DEFAULT_SYNC_INTERVAL: Duration = Duration::from_secs(5);
pub const FALLBACK_DOWNLOAD_DIR: &str = "/downloads/complete";

/// Application configuration
#[derive(Debug, Clone)]
pub struct AppConfig {
    pub config_path: Option<PathBuf>,

    // Backend
    pub slskd_url: String,
    pub slskd_api_key: String,

    // Service
    pub listen_addr: String,
    pub search_timeout: Duration,
    pub sync_interval: Duration,
    /// Unset means: ask slskd, then fall back to [`FALLBACK_DOWNLOAD_DIR`].
    pub download_dir: Option<String>,

    // Logging
    pub log_level: String,
    pub log_format: String,
}

impl AppConfig {
    /// Load from `config_path` (if given) overlaid with the process environment.
    pub fn load(config_path: Option<&Path>) -> Result<Self> {
        let mut builder = Config::builder();

        if let Some(path) = config_path {
            if !path.exists() {
                anyhow::bail!(
                    "Configuration file {} not found (specified via --config)",
                    path.display()
                );
            }
            builder = builder.add_source(ConfigFile::from(path));
        }

        builder = builder.add_source(Environment::default());

        let mut config = Self::from_config(&builder.build()?)?;
        config.config_path = config_path.map(Path::to_path_buf);
        Ok(config)
    }

    pub fn from_config(config: &Config) -> Result<Self> {
        let slskd_url = get_string_value(config, &["slskd_url", "slskd.url"])
            .ok_or_else(|| anyhow!("SLSKD_URL is required"))?;
        let slskd_api_key = get_string_value(config, &["slskd_api_key", "slskd.api_key"])
            .ok_or_else(|| anyhow!("SLSKD_API_KEY is required"))?;

        let listen_addr = get_string_value(config, &["listen_addr", "server.listen_addr"])
            .map(|addr| normalize_listen_addr(&addr))
            .unwrap_or_else(|| DEFAULT_LISTEN_ADDR.to_string());

        let search_timeout =
            get_duration_value(config, &["search_timeout", "search.timeout"], DEFAULT_SEARCH_TIMEOUT)?;
        let sync_interval =
            get_duration_value(config, &["sync_interval", "sync.interval"], DEFAULT_SYNC_INTERVAL)?;

        Ok(Self {
            config_path: None,
            slskd_url,
            slskd_api_key,
            listen_addr,
            search_timeout,
            sync_interval,
            download_dir: get_string_value(config, &["download_dir", "downloads.dir"]),
            log_level: get_string_value(config, &["log_level", "log.level"])
                .unwrap_or_else(|| "info".to_string()),
            log_format: get_string_value(config, &["log_format", "log.format"])
                .unwrap_or_else(|| "pretty".to_string()),
        })
    }

    pub fn validate(&self) -> Result<()> {
        if self.slskd_url.trim().is_empty() {
            anyhow::bail!("SLSKD_URL must not be empty");
        }
        if self.slskd_api_key.trim().is_empty() {
            anyhow::bail!("SLSKD_API_KEY must not be empty");
        }
        if self.search_timeout.is_zero() {
            anyhow::bail!("SEARCH_TIMEOUT must be greater than zero");
        }
        if self.sync_interval.is_zero() {
            anyhow::bail!("SYNC_INTERVAL must be greater than zero");
        }
        if !matches!(self.log_format.as_str(), "pretty" | "json") {
            anyhow::bail!("LOG_FORMAT must be 'pretty' or 'json'");
        }
        Ok(())
    }
}

fn get_string_value(config: &Config, keys: &[&str]) -> Option<String> {
    keys.iter().find_map(|key| {
        config
            .get_string(key)
            .ok()
            .map(|value| value.trim().to_string())
            .filter(|value| !value.is_empty())
    })
}

fn get_duration_value(config: &Config, keys: &[&str], default: Duration) -> Result<Duration> {
    match get_string_value(config, keys) {
        Some(raw) => parse_duration(&raw)
            .ok_or_else(|| anyhow!("invalid duration for {}: {:?}", keys[0].to_uppercase(), raw)),
        None => Ok(default),
    }
}

/// Parse `500ms`, `30s`, `1.5m`, `2h` or a bare number of seconds.
pub fn parse_duration(raw: &str) -> Option<Duration> {
    let raw = raw.trim();
    let split = raw
        .find(|c: char| !(c.is_ascii_digit() || c == '.'))
        .unwrap_or(raw.len());
    let (number, unit) = raw.split_at(split);
    let value: f64 = number.parse().ok()?;
    let seconds = match unit.trim() {
        "" | "s" => value,
        "ms" => value / 1000.0,
        "m" => value * 60.0,
        "h" => value * 3600.0,
        _ => return None,
    };
    Duration::try_from_secs_f64(seconds).ok()
}

/// `:6969` binds every interface, as the bare-port form implies.
fn normalize_listen_addr(addr: &str) -> String {
    if addr.starts_with(':') {
        format!("0.0.0.0{addr}")
    } else {
        addr.to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    fn config_from_toml(contents: &str) -> Result<AppConfig> {
        let mut file = tempfile::Builder::new().suffix(".toml").tempfile()?;
        file.write_all(contents.as_bytes())?;
        let config = Config::builder()
            .add_source(ConfigFile::from(file.path()))
            .build()?;
        AppConfig::from_config(&config)
    }

    #[test]
    fn test_defaults_apply() {
        let config = config_from_toml(
            r#"
            slskd_url = "http://slskd:5030"
            slskd_api_key = "secret"
            "#,
        )
        .unwrap();

        assert_eq!(config.listen_addr, DEFAULT_LISTEN_ADDR);
        assert_eq!(config.search_timeout, Duration::from_secs(30));
        assert_eq!(config.sync_interval, Duration::from_secs(5));
        assert_eq!(config.download_dir, None);
        assert_eq!(config.log_level, "info");
        assert_eq!(config.log_format, "pretty");
        config.validate().unwrap();
    }

    #[test]
    fn test_nested_keys_and_overrides() {
        let config = config_from_toml(
            r#"
            [slskd]
            url = "http://slskd:5030"
            api_key = "secret"

            [server]
            listen_addr = ":7070"

            [search]
            timeout = "45s"

            [downloads]
            dir = "/data/complete"
            "#,
        )
        .unwrap();

        assert_eq!(config.slskd_url, "http://slskd:5030");
        assert_eq!(config.listen_addr, "0.0.0.0:7070");
        assert_eq!(config.search_timeout, Duration::from_secs(45));
        assert_eq!(config.download_dir.as_deref(), Some("/data/complete"));
    }

    #[test]
    fn test_missing_backend_url_is_rejected() {
        let err = config_from_toml(r#"slskd_api_key = "secret""#).unwrap_err();
        assert!(err.to_string().contains("SLSKD_URL"));
    }

    #[test]
    fn test_invalid_timeout_is_rejected() {
        let err = config_from_toml(
            r#"
            slskd_url = "http://slskd:5030"
            slskd_api_key = "secret"
            search_timeout = "soon"
            "#,
        )
        .unwrap_err();
        assert!(err.to_string().contains("SEARCH_TIMEOUT"));
    }

    #[test]
    fn test_validate_rejects_zero_durations() {
        let mut config = config_from_toml(
            r#"
            slskd_url = "http://slskd:5030"
            slskd_api_key = "secret"
            "#,
        )
        .unwrap();
        config.sync_interval = Duration::ZERO;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_parse_duration_forms() {
        assert_eq!(parse_duration("30s"), Some(Duration::from_secs(30)));
        assert_eq!(parse_duration("500ms"), Some(Duration::from_millis(500)));
        assert_eq!(parse_duration("2m"), Some(Duration::from_secs(120)));
        assert_eq!(parse_duration("1h"), Some(Duration::from_secs(3600)));
        assert_eq!(parse_duration("1.5s"), Some(Duration::from_millis(1500)));
        assert_eq!(parse_duration("12"), Some(Duration::from_secs(12)));
        assert_eq!(parse_duration("abc"), None);
        assert_eq!(parse_duration("10 parsecs"), None);
        assert_eq!(parse_duration(""), None);
    }

    #[test]
    fn test_missing_config_file() {
        let err = AppConfig::load(Some(Path::new("/definitely/not/here.toml"))).unwrap_err();
        assert!(err.to_string().contains("not found"));
    }
}
