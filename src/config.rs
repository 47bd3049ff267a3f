//! Configuration loader and validator for the digest mailer.
use chrono::{FixedOffset, Local, NaiveTime};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;
use thiserror::Error;

use crate::digest::{ClockFormatter, TimeFormatter};

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
    #[error("YAML parse error: {0}")]
    Parse(#[from] serde_yaml::Error),
    #[error("Invalid configuration: {0}")]
    Invalid(&'static str),
}

/// Root configuration struct mirroring the YAML schema exactly.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Config {
    pub app: App,
    pub dispatch: Dispatch,
    pub email: Email,
}

/// App-level settings.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct App {
    pub data_dir: String,
    /// Local wall-clock time (`HH:MM`) of the daily summary run.
    pub send_at: String,
    /// Offset used to render timeline clock times. Defaults to the server's local zone.
    #[serde(default)]
    pub timezone_offset_minutes: Option<i32>,
}

/// Fan-out settings.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Dispatch {
    pub max_in_flight: usize,
}

/// Email delivery API settings.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Email {
    pub api_key: String,
    pub base_url: String,
    pub timeout_seconds: u64,
    pub senders: Senders,
}

/// `From:` addresses per notification kind.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Senders {
    pub daily: String,
    pub alerts: String,
    pub welcome: String,
}

impl Config {
    /// Ensure required directories exist (creates `app.data_dir` if missing).
    pub fn ensure_dirs(&self) -> Result<(), std::io::Error> {
        if self.app.data_dir.trim().is_empty() {
            return Ok(());
        }
        fs::create_dir_all(&self.app.data_dir)
    }

    /// `DATABASE_URL` when set, otherwise a SQLite file inside `app.data_dir`.
    pub fn database_url(&self) -> String {
        std::env::var("DATABASE_URL")
            .unwrap_or_else(|_| format!("sqlite://{}/chirp.db", self.app.data_dir))
    }

    pub fn send_at(&self) -> Result<NaiveTime, ConfigError> {
        parse_send_at(&self.app.send_at)
    }

    /// The configured timeline offset, if any.
    pub fn clock_offset(&self) -> Option<FixedOffset> {
        self.app
            .timezone_offset_minutes
            .and_then(|m| FixedOffset::east_opt(m * 60))
    }

    /// Timeline clock: the configured offset, otherwise the server's local
    /// zone applied per instant.
    pub fn timeline_formatter(&self) -> Box<dyn TimeFormatter> {
        match self.clock_offset() {
            Some(offset) => Box::new(ClockFormatter::new(offset)),
            None => Box::new(ClockFormatter::new(Local)),
        }
    }
}

fn parse_send_at(raw: &str) -> Result<NaiveTime, ConfigError> {
    NaiveTime::parse_from_str(raw.trim(), "%H:%M")
        .map_err(|_| ConfigError::Invalid("app.send_at must be HH:MM"))
}

/// Load configuration from a YAML file and validate it.
/// - If `path` is None, uses `config.yaml` in the current working directory.
pub fn load(path: Option<&Path>) -> Result<Config, ConfigError> {
    let path = path.unwrap_or_else(|| Path::new("config.yaml"));
    let content = fs::read_to_string(path)?;
    let cfg: Config = serde_yaml::from_str(&content)?;
    validate(&cfg)?;
    Ok(cfg)
}

/// Validate a configuration instance.
pub fn validate(cfg: &Config) -> Result<(), ConfigError> {
    if cfg.app.data_dir.trim().is_empty() {
        return Err(ConfigError::Invalid("app.data_dir must be non-empty"));
    }
    parse_send_at(&cfg.app.send_at)?;
    if let Some(minutes) = cfg.app.timezone_offset_minutes {
        if FixedOffset::east_opt(minutes * 60).is_none() {
            return Err(ConfigError::Invalid(
                "app.timezone_offset_minutes must be within ±24h",
            ));
        }
    }

    if cfg.dispatch.max_in_flight == 0 {
        return Err(ConfigError::Invalid("dispatch.max_in_flight must be > 0"));
    }

    if cfg.email.api_key.trim().is_empty() {
        return Err(ConfigError::Invalid("email.api_key must be non-empty"));
    }
    if reqwest::Url::parse(&cfg.email.base_url).is_err() {
        return Err(ConfigError::Invalid("email.base_url must be a valid URL"));
    }
    if cfg.email.timeout_seconds == 0 {
        return Err(ConfigError::Invalid("email.timeout_seconds must be > 0"));
    }

    let s = &cfg.email.senders;
    if s.daily.trim().is_empty() {
        return Err(ConfigError::Invalid("email.senders.daily must be non-empty"));
    }
    if s.alerts.trim().is_empty() {
        return Err(ConfigError::Invalid("email.senders.alerts must be non-empty"));
    }
    if s.welcome.trim().is_empty() {
        return Err(ConfigError::Invalid("email.senders.welcome must be non-empty"));
    }

    Ok(())
}

/// Example configuration with every key present.
pub fn example() -> &'static str {
    r#"app:
  data_dir: "./data"
  send_at: "07:00"
  timezone_offset_minutes: -300

dispatch:
  max_in_flight: 8

email:
  api_key: "YOUR_RESEND_API_KEY"
  base_url: "https://api.resend.com/"
  timeout_seconds: 30
  senders:
    daily: "ChirpChirp Daily <daily@chirpchirp.example>"
    alerts: "ChirpChirp Alerts <alerts@chirpchirp.example>"
    welcome: "ChirpChirp <hello@chirpchirp.example>"
"#
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{TimeZone, Utc};
    use tempfile::tempdir;

    fn example_config() -> Config {
        serde_yaml::from_str(example()).unwrap()
    }

    #[test]
    fn parse_example_ok() {
        let cfg = example_config();
        validate(&cfg).unwrap();
        assert_eq!(cfg.send_at().unwrap(), NaiveTime::from_hms_opt(7, 0, 0).unwrap());
        assert_eq!(cfg.clock_offset(), Some(FixedOffset::west_opt(5 * 3600).unwrap()));
        let at = Utc.with_ymd_and_hms(2024, 5, 1, 14, 5, 0).unwrap();
        assert_eq!(cfg.timeline_formatter().format(&at), "09:05 AM");
    }

    #[test]
    fn offset_is_optional() {
        let raw = example().replace("  timezone_offset_minutes: -300\n", "");
        let cfg: Config = serde_yaml::from_str(&raw).unwrap();
        assert_eq!(cfg.app.timezone_offset_minutes, None);
        validate(&cfg).unwrap();

        // Without an offset each instant is rendered in the server's local zone.
        assert_eq!(cfg.clock_offset(), None);
        let formatter = cfg.timeline_formatter();
        for at in [
            Utc.with_ymd_and_hms(2024, 1, 15, 6, 45, 0).unwrap(),
            Utc.with_ymd_and_hms(2024, 7, 15, 6, 45, 0).unwrap(),
        ] {
            let expected = at.with_timezone(&Local).format("%I:%M %p").to_string();
            assert_eq!(formatter.format(&at), expected);
        }
    }

    #[test]
    fn invalid_send_at() {
        let mut cfg = example_config();
        cfg.app.send_at = "7am".into();
        let err = validate(&cfg).unwrap_err();
        match err { ConfigError::Invalid(msg) => assert!(msg.contains("send_at")), _ => panic!("wrong error") }
    }

    #[test]
    fn invalid_dispatch_cap() {
        let mut cfg = example_config();
        cfg.dispatch.max_in_flight = 0;
        let err = validate(&cfg).unwrap_err();
        match err { ConfigError::Invalid(msg) => assert!(msg.contains("max_in_flight")), _ => panic!("wrong error") }
    }

    #[test]
    fn invalid_email_settings() {
        let mut cfg = example_config();
        cfg.email.api_key = " ".into();
        let err = validate(&cfg).unwrap_err();
        match err { ConfigError::Invalid(msg) => assert!(msg.contains("api_key")), _ => panic!("wrong error") }

        let mut cfg = example_config();
        cfg.email.base_url = "not a url".into();
        assert!(matches!(validate(&cfg), Err(ConfigError::Invalid(_))));

        let mut cfg = example_config();
        cfg.email.timeout_seconds = 0;
        assert!(matches!(validate(&cfg), Err(ConfigError::Invalid(_))));

        let mut cfg = example_config();
        cfg.email.senders.alerts = "".into();
        let err = validate(&cfg).unwrap_err();
        match err { ConfigError::Invalid(msg) => assert!(msg.contains("senders.alerts")), _ => panic!("wrong error") }
    }

    #[test]
    fn ensure_dirs_creates_data_dir() {
        let td = tempdir().unwrap();
        let data_path = td.path().join("data");
        let mut cfg = example_config();
        cfg.app.data_dir = data_path.to_string_lossy().to_string();
        cfg.ensure_dirs().unwrap();
        assert!(data_path.exists());
    }

    #[test]
    fn load_from_file_ok() {
        let td = tempdir().unwrap();
        let p = td.path().join("config.yaml");
        fs::write(&p, example()).unwrap();
        let cfg = load(Some(&p)).unwrap();
        assert_eq!(cfg.dispatch.max_in_flight, 8);
    }

    #[test]
    fn load_missing_file_is_io_error() {
        let td = tempdir().unwrap();
        let err = load(Some(&td.path().join("missing.yaml"))).unwrap_err();
        assert!(matches!(err, ConfigError::Io(_)));
    }
}
