//! Unified error taxonomy for the grid accounting record collector.
//!
//! Every fallible operation in the collector returns a [`GraccError`]
//! carrying a stable [`ErrorCode`], a human-readable message, an optional
//! cause chain, and arbitrary key-value context. [`ErrorCode::category`]
//! drives the HTTP status mapping at the dispatcher: `RequestError` and
//! `RecordError` map to 400, `AMQPError` to 503, `Internal` to 500.

#![deny(unsafe_code)]
#![warn(missing_docs)]

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

// ---------------------------------------------------------------------------
// ErrorCategory
// ---------------------------------------------------------------------------

/// Broad family an [`ErrorCode`] belongs to; determines the HTTP status the
/// dispatcher writes back to the probe.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorCategory {
    /// Bad client input: missing field, unparseable size, unknown command.
    Request,
    /// Malformed or unclassifiable record within an otherwise valid request.
    Record,
    /// Broker publish/confirm/routing/disconnection failure.
    Amqp,
    /// Unreachable / bug.
    Internal,
}

impl fmt::Display for ErrorCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Request => "request",
            Self::Record => "record",
            Self::Amqp => "amqp",
            Self::Internal => "internal",
        };
        f.write_str(s)
    }
}

// ---------------------------------------------------------------------------
// ErrorCode
// ---------------------------------------------------------------------------

/// Machine-readable, stable error code.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ErrorCode {
    /// A required form field was missing.
    MissingField,
    /// `command` was neither `update` nor `multiupdate`.
    UnknownCommand,
    /// `bundlesize` did not parse as an integer.
    BadBundleSize,
    /// Declared `bundlesize` did not match the parsed record count.
    SizeMismatch,

    /// The tokenizer hit EOF in the middle of a replication triple, or the
    /// caller-specified buffer bound was exceeded.
    MalformedBundle,
    /// Record XML failed to parse.
    MalformedRecord,
    /// Record root element did not match any known record family.
    UnknownRecord,

    /// Opening a channel, entering confirm mode, registering returns, or
    /// declaring the exchange failed.
    BrokerSetupFailed,
    /// A `basic.publish` call failed outright.
    PublishFailed,
    /// The broker returned a message as unroutable.
    MessageReturned,
    /// A publish was nacked by the broker.
    MessageNacked,
    /// `Wait` did not observe every expected confirmation before its
    /// deadline.
    ConfirmTimeout,
    /// The broker connection is not currently `Ready`.
    BrokerUnavailable,

    /// Catch-all for unexpected internal errors.
    Internal,
}

impl ErrorCode {
    /// Returns the broad [`ErrorCategory`] this code belongs to.
    pub fn category(&self) -> ErrorCategory {
        match self {
            Self::MissingField
            | Self::UnknownCommand
            | Self::BadBundleSize
            | Self::SizeMismatch => ErrorCategory::Request,

            Self::MalformedBundle | Self::MalformedRecord | Self::UnknownRecord => {
                ErrorCategory::Record
            }

            Self::BrokerSetupFailed
            | Self::PublishFailed
            | Self::MessageReturned
            | Self::MessageNacked
            | Self::ConfirmTimeout
            | Self::BrokerUnavailable => ErrorCategory::Amqp,

            Self::Internal => ErrorCategory::Internal,
        }
    }

    /// Stable `&'static str` representation (e.g. `"SIZE_MISMATCH"`).
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::MissingField => "MISSING_FIELD",
            Self::UnknownCommand => "UNKNOWN_COMMAND",
            Self::BadBundleSize => "BAD_BUNDLE_SIZE",
            Self::SizeMismatch => "SIZE_MISMATCH",
            Self::MalformedBundle => "MALFORMED_BUNDLE",
            Self::MalformedRecord => "MALFORMED_RECORD",
            Self::UnknownRecord => "UNKNOWN_RECORD",
            Self::BrokerSetupFailed => "BROKER_SETUP_FAILED",
            Self::PublishFailed => "PUBLISH_FAILED",
            Self::MessageReturned => "MESSAGE_RETURNED",
            Self::MessageNacked => "MESSAGE_NACKED",
            Self::ConfirmTimeout => "CONFIRM_TIMEOUT",
            Self::BrokerUnavailable => "BROKER_UNAVAILABLE",
            Self::Internal => "INTERNAL",
        }
    }
}

impl fmt::Display for ErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// ---------------------------------------------------------------------------
// GraccError
// ---------------------------------------------------------------------------

/// Unified collector error.
///
/// # Builder usage
///
/// ```
/// use gracc_error::{GraccError, ErrorCode};
///
/// let err = GraccError::new(ErrorCode::SizeMismatch, "declared 2, parsed 1")
///     .with_context("declared", 2)
///     .with_context("parsed", 1);
/// assert_eq!(err.category().to_string(), "request");
/// ```
pub struct GraccError {
    /// Machine-readable error code.
    pub code: ErrorCode,
    /// Human-readable description.
    pub message: String,
    /// Optional underlying cause.
    pub source: Option<Box<dyn std::error::Error + Send + Sync>>,
    /// Arbitrary structured context for diagnostics / logging.
    pub context: BTreeMap<String, serde_json::Value>,
}

impl GraccError {
    /// Create a new error with the given code and message.
    pub fn new(code: ErrorCode, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
            source: None,
            context: BTreeMap::new(),
        }
    }

    /// Attach a key-value pair to the diagnostic context.
    ///
    /// The value is converted via [`serde_json::to_value`]; if serialisation
    /// fails, the entry is silently skipped.
    pub fn with_context(mut self, key: impl Into<String>, value: impl Serialize) -> Self {
        if let Ok(v) = serde_json::to_value(value) {
            self.context.insert(key.into(), v);
        }
        self
    }

    /// Attach an underlying cause.
    pub fn with_source(mut self, source: impl std::error::Error + Send + Sync + 'static) -> Self {
        self.source = Some(Box::new(source));
        self
    }

    /// Shorthand for `self.code.category()`.
    pub fn category(&self) -> ErrorCategory {
        self.code.category()
    }

    /// The fixed response body text for this error's category, per the HTTP
    /// status table: `RequestError`/`RecordError` prefix the detail message,
    /// `AMQPError` and `Internal` use a fixed body regardless of detail.
    pub fn response_body(&self) -> String {
        match self.category() {
            ErrorCategory::Request => format!("Error handling request: {}", self.message),
            ErrorCategory::Record => format!("Error processing record: {}", self.message),
            ErrorCategory::Amqp => "Service unavailable right now".to_string(),
            ErrorCategory::Internal => "Internal server error".to_string(),
        }
    }
}

impl fmt::Debug for GraccError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut d = f.debug_struct("GraccError");
        d.field("code", &self.code);
        d.field("message", &self.message);
        if let Some(ref src) = self.source {
            d.field("source", &src.to_string());
        }
        if !self.context.is_empty() {
            d.field("context", &self.context);
        }
        d.finish()
    }
}

impl fmt::Display for GraccError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}] {}", self.code.as_str(), self.message)?;
        if !self.context.is_empty() {
            if let Ok(ctx) = serde_json::to_string(&self.context) {
                write!(f, " {ctx}")?;
            }
        }
        Ok(())
    }
}

impl std::error::Error for GraccError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        self.source
            .as_ref()
            .map(|e| e.as_ref() as &(dyn std::error::Error + 'static))
    }
}
