// ABOUTME: TOML configuration for an ESME transport, with defaults matching common SMSC setups
// ABOUTME: Validates the file once and turns it into the settings a session and its supervisor need

use crate::client::delivery_report::{
    DEFAULT_DELIVERY_REPORT_REGEX, DeliveryReportParser, DeliveryStatus, default_status_mapping,
};
use crate::client::reconnect::ReconnectPolicy;
use crate::client::types::{BindCredentials, BindMode, LongMessageMode, SubmitDefaults};
use crate::datatypes::{DataCodingTable, TextCodec};
use serde::Deserialize;
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::time::Duration;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read {}: {source}", path.display())]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("Invalid TOML: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("{0}")]
    Invalid(String),

    #[error("Invalid delivery_report_regex: {0}")]
    Regex(#[from] regex::Error),
}

/// ESME transport configuration
///
/// Every field has a default, so a file only needs what differs:
///
/// ```toml
/// host = "smsc.example.com"
/// port = 2775
/// system_id = "esme"
/// password = "secret"
/// send_multipart_udh = true
///
/// [data_coding_overrides]
/// 0 = "latin1"
/// ```
///
/// Durations are whole seconds.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct EsmeConfig {
    pub host: String,
    pub port: u16,
    pub system_id: String,
    pub password: String,
    pub system_type: String,
    /// Hex, e.g. "34" for SMPP v3.4
    pub interface_version: String,
    pub service_type: String,
    pub address_range: String,
    pub dest_addr_ton: u8,
    pub dest_addr_npi: u8,
    pub source_addr_ton: u8,
    pub source_addr_npi: u8,
    pub registered_delivery: bool,
    pub smpp_bind_timeout: u64,
    pub smpp_enquire_link_interval: u64,
    pub initial_reconnect_delay: u64,
    pub reconnect_factor: f64,
    /// Defaults to the larger of 45 seconds and the initial delay
    pub reconnect_max_delay: Option<u64>,
    /// Unlimited when absent
    pub reconnect_max_retries: Option<u32>,
    pub reconnect_jitter: f64,
    pub delivery_report_regex: String,
    pub delivery_report_status_mapping: HashMap<String, DeliveryStatus>,
    /// data_coding value (as a string key) to codec
    pub data_coding_overrides: HashMap<String, TextCodec>,
    pub send_long_messages: bool,
    pub send_multipart_sar: bool,
    pub send_multipart_udh: bool,
    pub multipart_ttl: u64,
    pub bind_mode: BindMode,
    /// Shared store for sequence numbers and the unacked window
    pub redis_url: Option<String>,
    pub redis_key_prefix: String,
}

impl Default for EsmeConfig {
    fn default() -> Self {
        EsmeConfig {
            host: "127.0.0.1".to_string(),
            port: 2775,
            system_id: String::new(),
            password: String::new(),
            system_type: String::new(),
            interface_version: "34".to_string(),
            service_type: String::new(),
            address_range: String::new(),
            dest_addr_ton: 0,
            dest_addr_npi: 1,
            source_addr_ton: 0,
            source_addr_npi: 0,
            registered_delivery: true,
            smpp_bind_timeout: 30,
            smpp_enquire_link_interval: 55,
            initial_reconnect_delay: 5,
            reconnect_factor: std::f64::consts::E,
            reconnect_max_delay: None,
            reconnect_max_retries: None,
            reconnect_jitter: 0.119_626_564_72,
            delivery_report_regex: DEFAULT_DELIVERY_REPORT_REGEX.to_string(),
            delivery_report_status_mapping: default_status_mapping(),
            data_coding_overrides: HashMap::new(),
            send_long_messages: false,
            send_multipart_sar: false,
            send_multipart_udh: false,
            multipart_ttl: 3600,
            bind_mode: BindMode::default(),
            redis_url: None,
            redis_key_prefix: String::new(),
        }
    }
}

impl EsmeConfig {
    /// Read, parse and validate a TOML file.
    pub fn load_from_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_toml(&text)
    }

    /// Parse and validate TOML text.
    pub fn from_toml(text: &str) -> Result<Self, ConfigError> {
        let config: EsmeConfig = toml::from_str(text)?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        check_len("system_id", &self.system_id, 15)?;
        check_len("password", &self.password, 8)?;
        check_len("system_type", &self.system_type, 12)?;
        check_len("service_type", &self.service_type, 5)?;
        check_len("address_range", &self.address_range, 40)?;
        self.interface_version_byte()?;

        let long_modes = [
            self.send_long_messages,
            self.send_multipart_sar,
            self.send_multipart_udh,
        ];
        if long_modes.iter().filter(|on| **on).count() > 1 {
            return Err(ConfigError::Invalid(
                "send_long_messages, send_multipart_sar and send_multipart_udh are mutually exclusive"
                    .to_string(),
            ));
        }

        if self.smpp_bind_timeout == 0 || self.smpp_enquire_link_interval == 0 {
            return Err(ConfigError::Invalid(
                "smpp_bind_timeout and smpp_enquire_link_interval must be positive".to_string(),
            ));
        }
        if self.reconnect_factor.is_nan() || self.reconnect_factor < 1.0 {
            return Err(ConfigError::Invalid(format!(
                "reconnect_factor must be at least 1, got {}",
                self.reconnect_factor
            )));
        }
        if self.reconnect_jitter.is_nan() || self.reconnect_jitter < 0.0 {
            return Err(ConfigError::Invalid(format!(
                "reconnect_jitter must not be negative, got {}",
                self.reconnect_jitter
            )));
        }

        self.data_coding_codecs()?;
        regex::Regex::new(&self.delivery_report_regex)?;

        #[cfg(not(feature = "redis-backend"))]
        if self.redis_url.is_some() {
            return Err(ConfigError::Invalid(
                "redis_url needs the redis-backend feature".to_string(),
            ));
        }

        Ok(())
    }

    pub fn address(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }

    pub fn interface_version_byte(&self) -> Result<u8, ConfigError> {
        u8::from_str_radix(&self.interface_version, 16).map_err(|_| {
            ConfigError::Invalid(format!(
                "interface_version {:?} is not a hex byte",
                self.interface_version
            ))
        })
    }

    pub fn bind_credentials(&self) -> Result<BindCredentials, ConfigError> {
        Ok(BindCredentials {
            interface_version: self.interface_version_byte()?,
            ..BindCredentials::new(&self.system_id, &self.password)
                .with_system_type(&self.system_type)
                .with_address_range(&self.address_range)
        })
    }

    pub fn submit_defaults(&self) -> SubmitDefaults {
        SubmitDefaults {
            service_type: self.service_type.clone(),
            source_addr_ton: self.source_addr_ton,
            source_addr_npi: self.source_addr_npi,
            dest_addr_ton: self.dest_addr_ton,
            dest_addr_npi: self.dest_addr_npi,
            registered_delivery: self.registered_delivery,
        }
    }

    pub fn long_message_mode(&self) -> LongMessageMode {
        if self.send_multipart_sar {
            LongMessageMode::Sar
        } else if self.send_multipart_udh {
            LongMessageMode::Udh
        } else if self.send_long_messages {
            LongMessageMode::MessagePayload
        } else {
            LongMessageMode::Reject
        }
    }

    pub fn bind_timeout(&self) -> Duration {
        Duration::from_secs(self.smpp_bind_timeout)
    }

    pub fn enquire_link_interval(&self) -> Duration {
        Duration::from_secs(self.smpp_enquire_link_interval)
    }

    pub fn multipart_ttl(&self) -> Duration {
        Duration::from_secs(self.multipart_ttl)
    }

    pub fn reconnect_policy(&self) -> ReconnectPolicy {
        let initial = Duration::from_secs(self.initial_reconnect_delay);
        let max_delay = self
            .reconnect_max_delay
            .map(Duration::from_secs)
            .unwrap_or_else(|| initial.max(Duration::from_secs(45)));

        ReconnectPolicy::new(initial)
            .with_factor(self.reconnect_factor)
            .with_max_delay(max_delay)
            .with_max_retries(self.reconnect_max_retries)
            .with_jitter(self.reconnect_jitter)
    }

    pub fn data_coding_table(&self) -> Result<DataCodingTable, ConfigError> {
        Ok(DataCodingTable::with_overrides(&self.data_coding_codecs()?))
    }

    pub fn delivery_report_parser(&self) -> Result<DeliveryReportParser, ConfigError> {
        Ok(DeliveryReportParser::new(
            &self.delivery_report_regex,
            self.delivery_report_status_mapping.clone(),
        )?)
    }

    fn data_coding_codecs(&self) -> Result<HashMap<u8, TextCodec>, ConfigError> {
        self.data_coding_overrides
            .iter()
            .map(|(key, codec)| {
                key.trim()
                    .parse::<u8>()
                    .map(|coding| (coding, *codec))
                    .map_err(|_| {
                        ConfigError::Invalid(format!(
                            "data_coding_overrides key {key:?} is not a data_coding value"
                        ))
                    })
            })
            .collect()
    }
}

fn check_len(field: &str, value: &str, max: usize) -> Result<(), ConfigError> {
    if value.len() > max {
        return Err(ConfigError::Invalid(format!(
            "{field} is {} bytes, at most {max} allowed",
            value.len()
        )));
    }
    Ok(())
}

/// Everything a session needs, derived once from [`EsmeConfig`] and shared
/// by every connection the supervisor makes.
#[derive(Debug, Clone)]
pub struct EsmeSettings {
    pub bind_mode: BindMode,
    pub credentials: BindCredentials,
    pub defaults: SubmitDefaults,
    pub long_messages: LongMessageMode,
    pub bind_timeout: Duration,
    pub enquire_link_interval: Duration,
    pub multipart_ttl: Duration,
    pub delivery_reports: DeliveryReportParser,
    pub data_coding: DataCodingTable,
}

impl EsmeSettings {
    pub fn from_config(config: &EsmeConfig) -> Result<Self, ConfigError> {
        config.validate()?;
        Ok(EsmeSettings {
            bind_mode: config.bind_mode,
            credentials: config.bind_credentials()?,
            defaults: config.submit_defaults(),
            long_messages: config.long_message_mode(),
            bind_timeout: config.bind_timeout(),
            enquire_link_interval: config.enquire_link_interval(),
            multipart_ttl: config.multipart_ttl(),
            delivery_reports: config.delivery_report_parser()?,
            data_coding: config.data_coding_table()?,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_file_gives_defaults() {
        let config = EsmeConfig::from_toml("").unwrap();
        assert_eq!(config, EsmeConfig::default());
        assert_eq!(config.bind_timeout(), Duration::from_secs(30));
        assert_eq!(config.enquire_link_interval(), Duration::from_secs(55));
        assert_eq!(config.interface_version_byte().unwrap(), 0x34);
        assert_eq!(config.long_message_mode(), LongMessageMode::Reject);
    }

    #[test]
    fn fields_and_overrides_parse() {
        let config = EsmeConfig::from_toml(
            r#"
            host = "smsc.example.com"
            port = 2776
            system_id = "esme"
            password = "secret"
            bind_mode = "transmitter"
            send_multipart_udh = true
            smpp_bind_timeout = 10

            [data_coding_overrides]
            0 = "latin1"
            8 = "utf-16be"
            "#,
        )
        .unwrap();

        assert_eq!(config.address(), "smsc.example.com:2776");
        assert_eq!(config.bind_mode, BindMode::Transmitter);
        assert_eq!(config.long_message_mode(), LongMessageMode::Udh);
        assert_eq!(config.bind_timeout(), Duration::from_secs(10));

        let table = config.data_coding_table().unwrap();
        assert_eq!(table.codec(0), Some(TextCodec::Latin1));
        assert_eq!(table.codec(1), Some(TextCodec::Ascii));
    }

    #[test]
    fn long_message_flags_are_exclusive() {
        let err = EsmeConfig::from_toml("send_multipart_sar = true\nsend_long_messages = true")
            .unwrap_err();
        assert!(matches!(err, ConfigError::Invalid(_)));
    }

    #[test]
    fn oversized_credentials_are_rejected() {
        let err = EsmeConfig::from_toml("password = \"much-too-long\"").unwrap_err();
        assert!(err.to_string().contains("password"));
    }

    #[test]
    fn bad_regex_and_version_are_rejected() {
        assert!(matches!(
            EsmeConfig::from_toml("delivery_report_regex = \"(unclosed\""),
            Err(ConfigError::Regex(_))
        ));
        assert!(matches!(
            EsmeConfig::from_toml("interface_version = \"zz\""),
            Err(ConfigError::Invalid(_))
        ));
        assert!(matches!(
            EsmeConfig::from_toml("[data_coding_overrides]\nabc = \"ascii\""),
            Err(ConfigError::Invalid(_))
        ));
    }

    #[test]
    fn reconnect_max_delay_defaults_to_at_least_45s() {
        let config = EsmeConfig::from_toml("initial_reconnect_delay = 60").unwrap();
        let policy = config.reconnect_policy();
        assert_eq!(policy.max_delay(), Duration::from_secs(60));

        let policy = EsmeConfig::default().reconnect_policy();
        assert_eq!(policy.max_delay(), Duration::from_secs(45));
        assert_eq!(policy.initial_delay(), Duration::from_secs(5));
    }

    #[test]
    fn missing_file_reports_the_path() {
        let err = EsmeConfig::load_from_file("/nonexistent/esme.toml").unwrap_err();
        assert!(err.to_string().contains("/nonexistent/esme.toml"));
    }

    #[test]
    fn settings_follow_the_config() {
        let config = EsmeConfig {
            system_id: "esme".to_string(),
            send_long_messages: true,
            ..EsmeConfig::default()
        };
        let settings = EsmeSettings::from_config(&config).unwrap();
        assert_eq!(settings.credentials.system_id, "esme");
        assert_eq!(settings.long_messages, LongMessageMode::MessagePayload);
        assert!(settings.defaults.registered_delivery);
    }
}
