use std::fs::File;
use std::path::Path;
use std::time::Duration;

use log::{debug, warn};
use reqwest::Url;
use reqwest::header::HeaderValue;
use serde::{Deserialize, Deserializer};

use u50_protocol::protocol::BAUD_RATE;

use crate::error::{Result, TelemetryError};
use crate::scheduler::LoopKind;
use crate::webhook::FieldMap;

pub const DEFAULT_CONFIG_FILE: &str = "u50-telemetry.yml";

/// Port name that asks for USB serial port discovery.
pub const AUTO_PORT: &str = "auto";

fn default_port() -> String {
    if cfg!(target_os = "windows") {
        String::from("COM3")
    } else {
        String::from("/dev/ttyUSB0")
    }
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct SerialConfig {
    /// Device path, or `auto`.
    pub port: String,
    pub baud_rate: u32,
    /// Port read timeout.
    #[serde(with = "humantime_serde")]
    pub timeout: Duration,
    /// Delay between writing a request and reading the reply.
    #[serde(with = "humantime_serde")]
    pub settle: Duration,
}

impl Default for SerialConfig {
    fn default() -> Self {
        Self {
            port: default_port(),
            baud_rate: BAUD_RATE,
            timeout: Duration::from_secs(2),
            settle: Duration::from_millis(500),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct WebhookConfig {
    pub url: String,
    /// Sent verbatim in the `Authorization` header.
    pub authorization: Option<String>,
    #[serde(with = "humantime_serde")]
    pub timeout: Duration,
    pub fields: FieldMap,
}

impl Default for WebhookConfig {
    fn default() -> Self {
        Self {
            url: String::from("http://127.0.0.1:8000/api/series/default/v1"),
            authorization: None,
            timeout: Duration::from_secs(10),
            fields: FieldMap::default(),
        }
    }
}

/// Loop intervals in seconds, kept as entered and validated when a loop starts.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct IntervalsConfig {
    #[serde(deserialize_with = "interval_text")]
    pub collect: String,
    #[serde(deserialize_with = "interval_text")]
    pub webhook: String,
}

impl Default for IntervalsConfig {
    fn default() -> Self {
        Self {
            collect: LoopKind::Collection.default_interval().as_secs().to_string(),
            webhook: LoopKind::Webhook.default_interval().as_secs().to_string(),
        }
    }
}

/// Accept `collect: 5` as well as `collect: "5"`.
fn interval_text<'de, D: Deserializer<'de>>(deserializer: D) -> std::result::Result<String, D::Error> {
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Text {
        Number(f64),
        Text(String),
    }

    Ok(match Text::deserialize(deserializer)? {
        Text::Number(n) => n.to_string(),
        Text::Text(s) => s,
    })
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct Config {
    pub serial: SerialConfig,
    pub webhook: WebhookConfig,
    pub intervals: IntervalsConfig,
}

impl Config {
    /// Load and validate `path`. A missing file yields the defaults.
    pub fn load(path: &Path) -> Result<Self> {
        if !path.exists() {
            warn!("config file {} not found, using defaults", path.display());
            return Ok(Self::default());
        }

        debug!("loading config file from {}", path.display());
        let file = File::open(path)?;
        let config: Config = serde_yaml::from_reader(file)?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        if self.serial.port.trim().is_empty() {
            return Err(TelemetryError::Config("serial.port is empty".into()));
        }
        if self.serial.baud_rate == 0 {
            return Err(TelemetryError::Config("serial.baud_rate must be > 0".into()));
        }

        let url = Url::parse(&self.webhook.url)
            .map_err(|e| TelemetryError::Config(format!("webhook.url: {e}")))?;
        if !matches!(url.scheme(), "http" | "https") {
            return Err(TelemetryError::Config(format!(
                "webhook.url: unsupported scheme {:?}",
                url.scheme()
            )));
        }

        if let Some(auth) = &self.webhook.authorization {
            HeaderValue::from_str(auth)?;
        }
        Ok(())
    }

    pub fn auto_port(&self) -> bool {
        self.serial.port.eq_ignore_ascii_case(AUTO_PORT)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    use u50_protocol::Label;

    use crate::webhook::Slot;

    fn write_config(text: &str) -> tempfile::NamedTempFile {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(text.as_bytes()).unwrap();
        file
    }

    #[test]
    fn test_missing_file_uses_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let config = Config::load(&dir.path().join("absent.yml")).unwrap();
        assert_eq!(config, Config::default());
        assert_eq!(config.serial.baud_rate, 19200);
        assert_eq!(config.serial.timeout, Duration::from_secs(2));
        assert_eq!(config.serial.settle, Duration::from_millis(500));
        assert_eq!(config.webhook.timeout, Duration::from_secs(10));
        assert_eq!(config.intervals.collect, "5");
        assert_eq!(config.intervals.webhook, "30");
    }

    #[test]
    fn test_full_file() {
        let file = write_config(
            r#"
serial:
  port: auto
  baud_rate: 9600
  timeout: 1s
  settle: 250ms
webhook:
  url: https://example.com/api/series/abc/v1
  authorization: "Bearer token"
  timeout: 3s
  fields:
    d1: pH
    d2: 0
intervals:
  collect: 10
  webhook: "2.5"
"#,
        );
        let config = Config::load(file.path()).unwrap();
        assert!(config.auto_port());
        assert_eq!(config.serial.baud_rate, 9600);
        assert_eq!(config.serial.settle, Duration::from_millis(250));
        assert_eq!(config.webhook.authorization.as_deref(), Some("Bearer token"));
        assert_eq!(config.webhook.timeout, Duration::from_secs(3));
        assert_eq!(config.webhook.fields.label(Slot::new(1).unwrap()), Label::Ph);
        assert_eq!(
            config.webhook.fields.label(Slot::new(2).unwrap()),
            Label::Temperature
        );
        assert_eq!(config.intervals.collect, "10");
        assert_eq!(config.intervals.webhook, "2.5");
    }

    #[test]
    fn test_partial_file_keeps_other_defaults() {
        let file = write_config("intervals:\n  webhook: \"60\"\n");
        let config = Config::load(file.path()).unwrap();
        assert_eq!(config.intervals.webhook, "60");
        assert_eq!(config.intervals.collect, "5");
        assert_eq!(config.serial, SerialConfig::default());
    }

    #[test]
    fn test_invalid_interval_text_is_kept() {
        let file = write_config("intervals:\n  collect: abc\n");
        let config = Config::load(file.path()).unwrap();
        assert_eq!(config.intervals.collect, "abc");
    }

    #[test]
    fn test_bad_yaml() {
        let file = write_config("serial: [unclosed\n");
        assert!(matches!(
            Config::load(file.path()).unwrap_err(),
            TelemetryError::Yaml(_)
        ));
    }

    #[test]
    fn test_unknown_key_rejected() {
        let file = write_config("serial:\n  speed: 9600\n");
        assert!(matches!(
            Config::load(file.path()).unwrap_err(),
            TelemetryError::Yaml(_)
        ));
    }

    #[test]
    fn test_bad_field_map_rejected() {
        let file = write_config("webhook:\n  fields:\n    d1: Chlorophyll\n");
        assert!(Config::load(file.path()).is_err());
    }

    #[test]
    fn test_validate_url_scheme() {
        let mut config = Config::default();
        config.webhook.url = "ftp://example.com/upload".into();
        assert!(matches!(config.validate(), Err(TelemetryError::Config(_))));
        config.webhook.url = "not a url".into();
        assert!(matches!(config.validate(), Err(TelemetryError::Config(_))));
    }

    #[test]
    fn test_validate_baud_and_header() {
        let mut config = Config::default();
        config.serial.baud_rate = 0;
        assert!(config.validate().is_err());

        let mut config = Config::default();
        config.webhook.authorization = Some("line\nbreak".into());
        assert!(matches!(
            config.validate(),
            Err(TelemetryError::InvalidHeader(_))
        ));
    }
}
