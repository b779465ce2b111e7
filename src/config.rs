use anyhow::{bail, Context, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::str::FromStr;
use std::time::Duration;
use url::Url;

pub const DEFAULT_PORT: u16 = 3000;
pub const DEFAULT_SWEEP_INTERVAL_SECS: u64 = 300;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    #[default]
    Text,
    Json,
}

impl FromStr for LogFormat {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "text" | "" => Ok(Self::Text),
            "json" => Ok(Self::Json),
            other => bail!("unknown log format '{other}' (expected 'text' or 'json')"),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// Shared secret expected in the `x-api-key` header.
    pub api_key: String,
    /// Downstream app address the issued token is appended to.
    pub redirect_base_url: String,
    #[serde(default = "default_port")]
    pub port: u16,
    /// 0 turns the background sweeper off.
    #[serde(default = "default_sweep_interval_secs")]
    pub sweep_interval_secs: u64,
    #[serde(default)]
    pub log_format: LogFormat,
}

fn default_port() -> u16 {
    DEFAULT_PORT
}

fn default_sweep_interval_secs() -> u64 {
    DEFAULT_SWEEP_INTERVAL_SECS
}

impl Config {
    /// Read configuration from the process environment, loading `.env` first
    /// when one is present.
    pub fn from_env() -> Result<Self> {
        dotenvy::dotenv().ok();
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build a config from an arbitrary variable source.
    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let api_key = lookup("API_KEY").context("API_KEY is not set")?;
        let redirect_base_url =
            lookup("REDIRECT_BASE_URL").context("REDIRECT_BASE_URL is not set")?;
        let port = match lookup("PORT") {
            Some(raw) => raw
                .trim()
                .parse::<u16>()
                .with_context(|| format!("invalid PORT '{raw}'"))?,
            None => DEFAULT_PORT,
        };
        let sweep_interval_secs = match lookup("SWEEP_INTERVAL_SECS") {
            Some(raw) => raw
                .trim()
                .parse::<u64>()
                .with_context(|| format!("invalid SWEEP_INTERVAL_SECS '{raw}'"))?,
            None => DEFAULT_SWEEP_INTERVAL_SECS,
        };
        let log_format = match lookup("LOG_FORMAT") {
            Some(raw) => raw.parse()?,
            None => LogFormat::default(),
        };

        let cfg = Self {
            api_key,
            redirect_base_url,
            port,
            sweep_interval_secs,
            log_format,
        };
        cfg.validate()?;
        Ok(cfg)
    }

    pub fn from_file(path: &str) -> Result<Self> {
        let raw = fs::read_to_string(path).context("reading config file")?;
        let cfg: Config = serde_json::from_str(&raw).context("parsing JSON")?;
        cfg.validate()?;
        Ok(cfg)
    }

    pub fn validate(&self) -> Result<()> {
        if self.api_key.trim().is_empty() {
            bail!("api_key must not be empty");
        }
        self.redirect_url()?;
        Ok(())
    }

    pub fn redirect_url(&self) -> Result<Url> {
        Url::parse(&self.redirect_base_url)
            .with_context(|| format!("invalid redirect base url '{}'", self.redirect_base_url))
    }

    pub fn sweep_interval(&self) -> Option<Duration> {
        (self.sweep_interval_secs > 0).then(|| Duration::from_secs(self.sweep_interval_secs))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;
    use std::io::Write;
    use tempfile::NamedTempFile;

    fn lookup_from(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let vars: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key: &str| vars.get(key).cloned()
    }

    #[test]
    fn test_env_config_defaults() {
        let cfg = Config::from_lookup(lookup_from(&[
            ("API_KEY", "secret"),
            ("REDIRECT_BASE_URL", "https://dash.example.com/app"),
        ]))
        .unwrap();

        assert_eq!(cfg.api_key, "secret");
        assert_eq!(cfg.port, 3000);
        assert_eq!(cfg.sweep_interval(), Some(Duration::from_secs(300)));
        assert_eq!(cfg.log_format, LogFormat::Text);
    }

    #[test]
    fn test_env_config_overrides() {
        let cfg = Config::from_lookup(lookup_from(&[
            ("API_KEY", "secret"),
            ("REDIRECT_BASE_URL", "http://localhost:8501"),
            ("PORT", "8088"),
            ("SWEEP_INTERVAL_SECS", "0"),
            ("LOG_FORMAT", "JSON"),
        ]))
        .unwrap();

        assert_eq!(cfg.port, 8088);
        assert_eq!(cfg.sweep_interval(), None);
        assert_eq!(cfg.log_format, LogFormat::Json);
    }

    #[test]
    fn test_env_config_requires_api_key() {
        let result = Config::from_lookup(lookup_from(&[(
            "REDIRECT_BASE_URL",
            "http://localhost:8501",
        )]));
        assert!(result.is_err());

        let result = Config::from_lookup(lookup_from(&[
            ("API_KEY", "  "),
            ("REDIRECT_BASE_URL", "http://localhost:8501"),
        ]));
        assert!(result.is_err());
    }

    #[test]
    fn test_env_config_rejects_bad_values() {
        assert!(Config::from_lookup(lookup_from(&[
            ("API_KEY", "secret"),
            ("REDIRECT_BASE_URL", "not a url"),
        ]))
        .is_err());

        assert!(Config::from_lookup(lookup_from(&[
            ("API_KEY", "secret"),
            ("REDIRECT_BASE_URL", "http://localhost:8501"),
            ("PORT", "seventy"),
        ]))
        .is_err());

        assert!(Config::from_lookup(lookup_from(&[
            ("API_KEY", "secret"),
            ("REDIRECT_BASE_URL", "http://localhost:8501"),
            ("LOG_FORMAT", "xml"),
        ]))
        .is_err());
    }

    #[test]
    fn test_config_from_file() {
        let mut file = NamedTempFile::new().unwrap();
        writeln!(
            file,
            r#"{{
                "api_key": "file-secret",
                "redirect_base_url": "https://dash.example.com",
                "port": 9000,
                "log_format": "json"
            }}"#
        )
        .unwrap();

        let cfg = Config::from_file(file.path().to_str().unwrap()).unwrap();
        assert_eq!(cfg.api_key, "file-secret");
        assert_eq!(cfg.port, 9000);
        assert_eq!(cfg.sweep_interval_secs, DEFAULT_SWEEP_INTERVAL_SECS);
        assert_eq!(cfg.log_format, LogFormat::Json);
    }

    #[test]
    fn test_config_missing_file() {
        let result = Config::from_file("/nonexistent/path/config.json");
        assert!(result.is_err());
    }

    #[test]
    fn test_config_invalid_json() {
        let mut file = NamedTempFile::new().unwrap();
        writeln!(file, "{{invalid json").unwrap();

        let result = Config::from_file(file.path().to_str().unwrap());
        assert!(result.is_err());
    }
}
