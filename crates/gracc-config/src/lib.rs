// SPDX-License-Identifier: MIT OR Apache-2.0
//! Configuration loading, environment overrides, and validation for the
//! grid accounting record collector.
//!
//! Provides [`CollectorConfig`] — the top-level runtime settings — together
//! with TOML loading, `GRACC_…`/`GRACC_AMQP_…` environment-variable
//! overrides, and duration-string parsing for `timeout`, `amqp.retry`, and
//! `amqp.max_retry`.
#![deny(unsafe_code)]
#![warn(missing_docs)]

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;

// ---------------------------------------------------------------------------
// Errors
// ---------------------------------------------------------------------------

/// Errors that can occur during configuration loading or validation.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// The requested configuration file was not found.
    #[error("config file not found: {path}")]
    FileNotFound {
        /// Path that was requested.
        path: String,
    },

    /// The file could not be parsed as valid TOML.
    #[error("failed to parse config: {reason}")]
    ParseError {
        /// Human-readable parse error detail.
        reason: String,
    },

    /// Semantic validation failed (one or more problems).
    #[error("config validation failed: {reasons:?}")]
    ValidationError {
        /// Individual validation failure messages.
        reasons: Vec<String>,
    },
}

// ---------------------------------------------------------------------------
// Duration-string serde helper
// ---------------------------------------------------------------------------

/// Parses the collector's `<number><unit>` duration grammar (`s`, `m`, `h`),
/// e.g. `"60s"`, `"5m"`, `"1h"`. This is distinct from the ISO-8601 grammar
/// `gracc-duration` parses for record fields.
pub fn parse_duration_string(s: &str) -> Result<Duration, String> {
    let s = s.trim();
    if s.is_empty() {
        return Err("empty duration string".to_string());
    }
    let (last_char_idx, _) = s
        .char_indices()
        .last()
        .ok_or_else(|| format!("unrecognised duration value in '{s}'"))?;
    let (number_part, unit) = s.split_at(last_char_idx);
    let multiplier = match unit {
        "s" => 1u64,
        "m" => 60,
        "h" => 3600,
        _ => return Err(format!("unrecognised duration unit in '{s}' (want s, m, or h)")),
    };
    let n: u64 = number_part
        .parse()
        .map_err(|_| format!("unrecognised duration value in '{s}'"))?;
    Ok(Duration::from_secs(n * multiplier))
}

fn format_duration_string(d: Duration) -> String {
    format!("{}s", d.as_secs())
}

mod duration_string {
    use super::{format_duration_string, parse_duration_string};
    use serde::{Deserialize, Deserializer, Serializer};
    use std::time::Duration;

    pub fn serialize<S: Serializer>(val: &Duration, ser: S) -> Result<S::Ok, S::Error> {
        ser.serialize_str(&format_duration_string(*val))
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(de: D) -> Result<Duration, D::Error> {
        let raw = String::deserialize(de)?;
        parse_duration_string(&raw).map_err(serde::de::Error::custom)
    }
}

// ---------------------------------------------------------------------------
// Config types
// ---------------------------------------------------------------------------

/// Top-level runtime configuration for the collector.
#[derive(Debug, Clone, Deserialize, Serialize, JsonSchema, PartialEq)]
pub struct CollectorConfig {
    /// Bind address (empty string binds all interfaces).
    #[serde(default = "default_address")]
    pub address: String,
    /// Bind port.
    #[serde(default = "default_port")]
    pub port: String,
    /// Per-request end-to-end deadline.
    #[serde(default = "default_timeout", with = "duration_string")]
    pub timeout: Duration,
    /// Log level (`error`, `warn`, `info`, `debug`, `trace`).
    #[serde(default = "default_log_level")]
    pub log_level: String,
    /// Initial tokenizer buffer size, in bytes.
    #[serde(default = "default_start_buffer_size")]
    pub start_buffer_size: usize,
    /// Maximum tokenizer buffer size, in bytes; exceeding this is a parse
    /// failure.
    #[serde(default = "default_max_buffer_size")]
    pub max_buffer_size: usize,
    /// Broker connection and publishing settings.
    #[serde(default)]
    pub amqp: AmqpConfig,
}

fn default_address() -> String {
    String::new()
}
fn default_port() -> String {
    "8080".to_string()
}
fn default_timeout() -> Duration {
    Duration::from_secs(60)
}
fn default_log_level() -> String {
    "info".to_string()
}
fn default_start_buffer_size() -> usize {
    4096
}
fn default_max_buffer_size() -> usize {
    1_048_576
}

impl Default for CollectorConfig {
    fn default() -> Self {
        Self {
            address: default_address(),
            port: default_port(),
            timeout: default_timeout(),
            log_level: default_log_level(),
            start_buffer_size: default_start_buffer_size(),
            max_buffer_size: default_max_buffer_size(),
            amqp: AmqpConfig::default(),
        }
    }
}

/// Record serialisation format published to the broker.
#[derive(Debug, Clone, Copy, Deserialize, Serialize, JsonSchema, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum RecordFormat {
    /// Publish the exact bytes the parser captured as `raw`.
    Raw,
    /// Re-marshal the record model back to XML before publishing.
    Xml,
    /// Publish the canonical flattened JSON form.
    Json,
}

impl Default for RecordFormat {
    fn default() -> Self {
        Self::Raw
    }
}

/// Broker connection and publishing configuration.
#[derive(Debug, Clone, Deserialize, Serialize, JsonSchema, PartialEq)]
pub struct AmqpConfig {
    /// Broker hostname.
    #[serde(default = "default_amqp_host")]
    pub host: String,
    /// Broker port.
    #[serde(default = "default_amqp_port")]
    pub port: String,
    /// URI scheme (`amqp` or `amqps`).
    #[serde(default = "default_amqp_scheme")]
    pub scheme: String,
    /// Virtual host.
    #[serde(default = "default_amqp_vhost")]
    pub vhost: String,
    /// Username.
    #[serde(default = "default_amqp_user")]
    pub user: String,
    /// Password.
    #[serde(default = "default_amqp_password")]
    pub password: String,
    /// Record serialisation format.
    #[serde(default)]
    pub format: RecordFormat,
    /// Exchange name.
    #[serde(default = "default_amqp_exchange")]
    pub exchange: String,
    /// Exchange type (`fanout`, `direct`, `topic`, …).
    #[serde(default = "default_amqp_exchange_type")]
    pub exchange_type: String,
    /// Whether the exchange survives broker restarts.
    #[serde(default = "default_true")]
    pub durable: bool,
    /// Whether the exchange is deleted when no longer bound.
    #[serde(default = "default_true")]
    pub auto_delete: bool,
    /// Whether the exchange is internal (not publishable to directly by
    /// other clients).
    #[serde(default)]
    pub internal: bool,
    /// Routing key used for every publish. This value is authoritative
    /// regardless of any routing hint a record's own metadata might carry.
    #[serde(default)]
    pub routing_key: String,
    /// Fixed delay between dial attempts while the connection is down.
    #[serde(default = "default_amqp_retry", with = "duration_string")]
    pub retry: Duration,
    /// Maximum time a publishing worker waits for outstanding confirmations.
    #[serde(default = "default_amqp_max_retry", with = "duration_string")]
    pub max_retry: Duration,
}

fn default_amqp_host() -> String {
    "localhost".to_string()
}
fn default_amqp_port() -> String {
    "5672".to_string()
}
fn default_amqp_scheme() -> String {
    "amqp".to_string()
}
fn default_amqp_vhost() -> String {
    "/".to_string()
}
fn default_amqp_user() -> String {
    "guest".to_string()
}
fn default_amqp_password() -> String {
    "guest".to_string()
}
fn default_amqp_exchange() -> String {
    "gracc.records".to_string()
}
fn default_amqp_exchange_type() -> String {
    "fanout".to_string()
}
fn default_amqp_retry() -> Duration {
    Duration::from_secs(10)
}
fn default_amqp_max_retry() -> Duration {
    Duration::from_secs(300)
}
fn default_true() -> bool {
    true
}

impl Default for AmqpConfig {
    fn default() -> Self {
        Self {
            host: default_amqp_host(),
            port: default_amqp_port(),
            scheme: default_amqp_scheme(),
            vhost: default_amqp_vhost(),
            user: default_amqp_user(),
            password: default_amqp_password(),
            format: RecordFormat::default(),
            exchange: default_amqp_exchange(),
            exchange_type: default_amqp_exchange_type(),
            durable: true,
            auto_delete: true,
            internal: false,
            routing_key: String::new(),
            retry: default_amqp_retry(),
            max_retry: default_amqp_max_retry(),
        }
    }
}

impl AmqpConfig {
    /// Compose the broker connection URI from `{scheme, user, password,
    /// host, port, vhost}`.
    pub fn uri(&self) -> String {
        format!(
            "{}://{}:{}@{}:{}/{}",
            self.scheme,
            self.user,
            self.password,
            self.host,
            self.port,
            self.vhost.trim_start_matches('/'),
        )
    }
}

const VALID_LOG_LEVELS: &[&str] = &["error", "warn", "info", "debug", "trace"];

// ---------------------------------------------------------------------------
// Loading
// ---------------------------------------------------------------------------

/// Load a [`CollectorConfig`] from an optional TOML file path, then apply
/// environment overrides.
///
/// * If `path` is `Some`, reads and parses the file.
/// * If `path` is `None`, starts from [`CollectorConfig::default()`].
pub fn load_config(path: Option<&Path>) -> Result<CollectorConfig, ConfigError> {
    let mut config = match path {
        Some(p) => {
            let content = std::fs::read_to_string(p).map_err(|_| ConfigError::FileNotFound {
                path: p.display().to_string(),
            })?;
            parse_toml(&content)?
        }
        None => CollectorConfig::default(),
    };
    apply_env_overrides(&mut config);
    Ok(config)
}

/// Parse a TOML string into a [`CollectorConfig`].
pub fn parse_toml(content: &str) -> Result<CollectorConfig, ConfigError> {
    toml::from_str::<CollectorConfig>(content).map_err(|e| ConfigError::ParseError {
        reason: e.to_string(),
    })
}

// ---------------------------------------------------------------------------
// Env overrides
// ---------------------------------------------------------------------------

/// Apply environment variable overrides following the `GRACC_…`/
/// `GRACC_AMQP_…` prefix convention.
pub fn apply_env_overrides(config: &mut CollectorConfig) {
    if let Ok(v) = std::env::var("GRACC_ADDRESS") {
        config.address = v;
    }
    if let Ok(v) = std::env::var("GRACC_PORT") {
        config.port = v;
    }
    if let Ok(v) = std::env::var("GRACC_TIMEOUT") {
        if let Ok(d) = parse_duration_string(&v) {
            config.timeout = d;
        }
    }
    if let Ok(v) = std::env::var("GRACC_LOG_LEVEL") {
        config.log_level = v;
    }
    if let Ok(v) = std::env::var("GRACC_START_BUFFER_SIZE") {
        if let Ok(n) = v.parse() {
            config.start_buffer_size = n;
        }
    }
    if let Ok(v) = std::env::var("GRACC_MAX_BUFFER_SIZE") {
        if let Ok(n) = v.parse() {
            config.max_buffer_size = n;
        }
    }
    if let Ok(v) = std::env::var("GRACC_AMQP_HOST") {
        config.amqp.host = v;
    }
    if let Ok(v) = std::env::var("GRACC_AMQP_PORT") {
        config.amqp.port = v;
    }
    if let Ok(v) = std::env::var("GRACC_AMQP_SCHEME") {
        config.amqp.scheme = v;
    }
    if let Ok(v) = std::env::var("GRACC_AMQP_VHOST") {
        config.amqp.vhost = v;
    }
    if let Ok(v) = std::env::var("GRACC_AMQP_USER") {
        config.amqp.user = v;
    }
    if let Ok(v) = std::env::var("GRACC_AMQP_PASSWORD") {
        config.amqp.password = v;
    }
    if let Ok(v) = std::env::var("GRACC_AMQP_EXCHANGE") {
        config.amqp.exchange = v;
    }
    if let Ok(v) = std::env::var("GRACC_AMQP_EXCHANGE_TYPE") {
        config.amqp.exchange_type = v;
    }
    if let Ok(v) = std::env::var("GRACC_AMQP_FORMAT") {
        match v.to_ascii_lowercase().as_str() {
            "raw" => config.amqp.format = RecordFormat::Raw,
            "xml" => config.amqp.format = RecordFormat::Xml,
            "json" => config.amqp.format = RecordFormat::Json,
            other => tracing::warn!(value = other, "unrecognised GRACC_AMQP_FORMAT, ignoring"),
        }
    }
    if let Ok(v) = std::env::var("GRACC_AMQP_DURABLE") {
        if let Ok(b) = v.parse() {
            config.amqp.durable = b;
        }
    }
    if let Ok(v) = std::env::var("GRACC_AMQP_AUTO_DELETE") {
        if let Ok(b) = v.parse() {
            config.amqp.auto_delete = b;
        }
    }
    if let Ok(v) = std::env::var("GRACC_AMQP_INTERNAL") {
        if let Ok(b) = v.parse() {
            config.amqp.internal = b;
        }
    }
    if let Ok(v) = std::env::var("GRACC_AMQP_ROUTING_KEY") {
        config.amqp.routing_key = v;
    }
    if let Ok(v) = std::env::var("GRACC_AMQP_RETRY") {
        if let Ok(d) = parse_duration_string(&v) {
            config.amqp.retry = d;
        }
    }
    if let Ok(v) = std::env::var("GRACC_AMQP_MAX_RETRY") {
        if let Ok(d) = parse_duration_string(&v) {
            config.amqp.max_retry = d;
        }
    }
}

// ---------------------------------------------------------------------------
// Validation
// ---------------------------------------------------------------------------

/// Validate a parsed configuration.
///
/// Returns every problem found at once rather than the first; callers
/// should refuse to start the collector on `Err`.
pub fn validate_config(config: &CollectorConfig) -> Result<(), ConfigError> {
    let mut errors: Vec<String> = Vec::new();

    if !VALID_LOG_LEVELS.contains(&config.log_level.as_str()) {
        errors.push(format!("invalid log_level '{}'", config.log_level));
    }

    if config.start_buffer_size == 0 {
        errors.push("start_buffer_size must be greater than zero".to_string());
    }
    if config.max_buffer_size < config.start_buffer_size {
        errors.push("max_buffer_size must be >= start_buffer_size".to_string());
    }

    if config.timeout.is_zero() {
        errors.push("timeout must be greater than zero".to_string());
    }

    match config.amqp.format {
        RecordFormat::Raw | RecordFormat::Xml | RecordFormat::Json => {}
    }

    if config.amqp.retry.is_zero() {
        errors.push("amqp.retry must be greater than zero".to_string());
    }
    if config.amqp.exchange.trim().is_empty() {
        errors.push("amqp.exchange must not be empty".to_string());
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(ConfigError::ValidationError { reasons: errors })
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    // -- 1. Default config is valid ------------------------------------------

    #[test]
    fn default_config_is_valid() {
        let cfg = CollectorConfig::default();
        validate_config(&cfg).expect("default config should be valid");
    }

    // -- 2. Default config has sensible defaults -----------------------------

    #[test]
    fn default_config_has_sensible_defaults() {
        let cfg = CollectorConfig::default();
        assert_eq!(cfg.port, "8080");
        assert_eq!(cfg.timeout, Duration::from_secs(60));
        assert_eq!(cfg.amqp.host, "localhost");
        assert_eq!(cfg.amqp.port, "5672");
        assert_eq!(cfg.amqp.format, RecordFormat::Raw);
        assert_eq!(cfg.amqp.exchange_type, "fanout");
        assert!(cfg.amqp.auto_delete);
        assert_eq!(cfg.amqp.retry, Duration::from_secs(10));
    }

    // -- 3. Parse valid TOML --------------------------------------------------

    #[test]
    fn parse_valid_toml_string() {
        let toml_str = r#"
            address = "0.0.0.0"
            port = "9090"
            timeout = "30s"
            log_level = "debug"

            [amqp]
            host = "broker.example.org"
            format = "json"
            routing_key = "gracc.osg.raw"
            retry = "5s"
        "#;
        let cfg = parse_toml(toml_str).unwrap();
        assert_eq!(cfg.address, "0.0.0.0");
        assert_eq!(cfg.port, "9090");
        assert_eq!(cfg.timeout, Duration::from_secs(30));
        assert_eq!(cfg.log_level, "debug");
        assert_eq!(cfg.amqp.host, "broker.example.org");
        assert_eq!(cfg.amqp.format, RecordFormat::Json);
        assert_eq!(cfg.amqp.routing_key, "gracc.osg.raw");
        assert_eq!(cfg.amqp.retry, Duration::from_secs(5));
    }

    // -- 4. Invalid TOML gives ParseError -------------------------------------

    #[test]
    fn parse_invalid_toml_gives_parse_error() {
        let err = parse_toml("this is [not valid toml =").unwrap_err();
        assert!(matches!(err, ConfigError::ParseError { .. }));
    }

    // -- 5. Bad duration grammar gives ParseError -----------------------------

    #[test]
    fn bad_duration_grammar_gives_parse_error() {
        let err = parse_toml(r#"timeout = "soon""#).unwrap_err();
        assert!(matches!(err, ConfigError::ParseError { .. }));
    }

    // -- 6. Duration string parsing -------------------------------------------

    #[test]
    fn duration_string_units() {
        assert_eq!(parse_duration_string("60s").unwrap(), Duration::from_secs(60));
        assert_eq!(parse_duration_string("5m").unwrap(), Duration::from_secs(300));
        assert_eq!(parse_duration_string("1h").unwrap(), Duration::from_secs(3600));
        assert!(parse_duration_string("1d").is_err());
        assert!(parse_duration_string("").is_err());
    }

    // -- 7. Validation catches invalid log level ------------------------------

    #[test]
    fn validation_catches_invalid_log_level() {
        let cfg = CollectorConfig {
            log_level: "verbose".into(),
            ..Default::default()
        };
        let err = validate_config(&cfg).unwrap_err();
        assert!(matches!(err, ConfigError::ValidationError { .. }));
    }

    // -- 8. Validation catches zero timeout -----------------------------------

    #[test]
    fn validation_catches_zero_timeout() {
        let cfg = CollectorConfig {
            timeout: Duration::from_secs(0),
            ..Default::default()
        };
        let err = validate_config(&cfg).unwrap_err();
        match err {
            ConfigError::ValidationError { reasons } => {
                assert!(reasons.iter().any(|r| r.contains("timeout")));
            }
            other => panic!("expected ValidationError, got {other:?}"),
        }
    }

    // -- 9. Validation catches max < start buffer size ------------------------

    #[test]
    fn validation_catches_buffer_size_inversion() {
        let cfg = CollectorConfig {
            start_buffer_size: 8192,
            max_buffer_size: 1024,
            ..Default::default()
        };
        let err = validate_config(&cfg).unwrap_err();
        assert!(matches!(err, ConfigError::ValidationError { .. }));
    }

    // -- 10. Validation catches empty exchange --------------------------------

    #[test]
    fn validation_catches_empty_exchange() {
        let mut cfg = CollectorConfig::default();
        cfg.amqp.exchange = "  ".into();
        let err = validate_config(&cfg).unwrap_err();
        assert!(matches!(err, ConfigError::ValidationError { .. }));
    }

    // -- 11. Env overrides apply GRACC_ prefix ---------------------------------

    #[test]
    fn env_overrides_apply() {
        // SAFETY-equivalent: single-threaded test process section; std::env::set_var
        // is process-global but this crate's test harness runs each test in its
        // own thread without shared env mutation elsewhere in this file.
        unsafe {
            std::env::set_var("GRACC_PORT", "7777");
            std::env::set_var("GRACC_AMQP_HOST", "envhost");
            std::env::set_var("GRACC_AMQP_FORMAT", "JSON");
            std::env::set_var("GRACC_AMQP_DURABLE", "false");
            std::env::set_var("GRACC_AMQP_AUTO_DELETE", "false");
            std::env::set_var("GRACC_AMQP_INTERNAL", "true");
        }
        let mut cfg = CollectorConfig::default();
        apply_env_overrides(&mut cfg);
        assert_eq!(cfg.port, "7777");
        assert_eq!(cfg.amqp.host, "envhost");
        assert_eq!(cfg.amqp.format, RecordFormat::Json);
        assert!(!cfg.amqp.durable);
        assert!(!cfg.amqp.auto_delete);
        assert!(cfg.amqp.internal);
        unsafe {
            std::env::remove_var("GRACC_PORT");
            std::env::remove_var("GRACC_AMQP_HOST");
            std::env::remove_var("GRACC_AMQP_FORMAT");
            std::env::remove_var("GRACC_AMQP_DURABLE");
            std::env::remove_var("GRACC_AMQP_AUTO_DELETE");
            std::env::remove_var("GRACC_AMQP_INTERNAL");
        }
    }

    // -- 11b. parse_duration_string rejects a multibyte final char cleanly ----

    #[test]
    fn duration_string_multibyte_suffix_is_clean_error() {
        assert!(parse_duration_string("5µ").is_err());
    }

    // -- 12. URI composition ---------------------------------------------------

    #[test]
    fn amqp_uri_composition() {
        let cfg = AmqpConfig {
            scheme: "amqp".into(),
            user: "u".into(),
            password: "p".into(),
            host: "h".into(),
            port: "5672".into(),
            vhost: "/vh".into(),
            ..Default::default()
        };
        assert_eq!(cfg.uri(), "amqp://u:p@h:5672/vh");
    }

    // -- 13. Load from file on disk --------------------------------------------

    #[test]
    fn load_config_from_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("gracc.toml");
        let mut f = std::fs::File::create(&path).unwrap();
        writeln!(f, "port = \"9999\"\nlog_level = \"warn\"").unwrap();
        let cfg = load_config(Some(&path)).unwrap();
        assert_eq!(cfg.port, "9999");
        assert_eq!(cfg.log_level, "warn");
    }

    // -- 14. Load missing file gives FileNotFound ------------------------------

    #[test]
    fn load_missing_file_gives_file_not_found() {
        let err = load_config(Some(Path::new("/nonexistent/gracc.toml"))).unwrap_err();
        assert!(matches!(err, ConfigError::FileNotFound { .. }));
    }

    // -- 15. Load None path returns default -------------------------------------

    #[test]
    fn load_none_returns_default() {
        let cfg = load_config(None).unwrap();
        assert_eq!(cfg.port, "8080");
    }

    // -- 16. TOML roundtrip ------------------------------------------------------

    #[test]
    fn toml_roundtrip() {
        let cfg = CollectorConfig::default();
        let serialized = toml::to_string(&cfg).unwrap();
        let deserialized: CollectorConfig = toml::from_str(&serialized).unwrap();
        assert_eq!(cfg, deserialized);
    }

    // -- 17. Empty TOML parses to defaults ---------------------------------------

    #[test]
    fn empty_string_toml_parses_to_defaults() {
        let cfg = parse_toml("").unwrap();
        assert_eq!(cfg, CollectorConfig::default());
    }
}
