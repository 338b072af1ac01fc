//! Error type definitions for m3u-curator

use thiserror::Error;

/// Top-level application error type
#[derive(Error, Debug)]
pub enum AppError {
    /// Download or staging failures
    #[error("Fetch error: {0}")]
    Fetch(#[from] FetchError),

    /// A filter or transformation pattern failed to compile
    #[error("Rule compilation failed in model '{model}': field '{field}' pattern '{pattern}' - {message}")]
    RuleCompilation {
        model: String,
        field: String,
        pattern: String,
        message: String,
    },

    /// An EXTINF line did not match the attribute grammar
    #[error("Record extraction failed: {line}")]
    RecordExtraction { line: String },

    /// A transformation targeted a field the record does not carry
    #[error("Missing field '{field}' on record with stream {stream}")]
    MissingField { field: String, stream: String },

    /// A programme start/stop attribute is not an XMLTV timestamp
    #[error("Invalid XMLTV timestamp: '{value}'")]
    TimestampParse { value: String },

    /// Configuration errors
    #[error("Configuration error: {message}")]
    Configuration { message: String },

    /// XML reading or writing errors
    #[error("XML error: {0}")]
    Xml(#[from] quick_xml::Error),

    /// Structurally broken XML the reader cannot continue past
    #[error("Malformed XML: {message}")]
    MalformedXml { message: String },

    /// Filesystem errors
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// A model pipeline task panicked or was cancelled
    #[error("Task failed: {0}")]
    TaskJoin(#[from] tokio::task::JoinError),
}

/// Fetch specific errors
#[derive(Error, Debug)]
pub enum FetchError {
    /// The locator is neither a supported URL nor a path
    #[error("Invalid locator: {locator}")]
    InvalidLocator { locator: String },

    /// Non-success HTTP status from the origin
    #[error("HTTP error: {status} - {url}")]
    Http { status: u16, url: String },

    /// Transport level failures
    #[error("Request failed: {0}")]
    Request(#[from] reqwest::Error),

    /// Staging the temporary file or replacing the destination failed
    #[error("Staging failed for {path}: {source}")]
    Staging {
        path: String,
        #[source]
        source: std::io::Error,
    },
}

/// Convenience methods for creating common error types
impl AppError {
    /// Create a rule compilation error
    pub fn rule_compilation<M, F, P, E>(model: M, field: F, pattern: P, message: E) -> Self
    where
        M: Into<String>,
        F: Into<String>,
        P: Into<String>,
        E: Into<String>,
    {
        Self::RuleCompilation {
            model: model.into(),
            field: field.into(),
            pattern: pattern.into(),
            message: message.into(),
        }
    }

    /// Create a record extraction error for the offending line
    pub fn record_extraction<S: Into<String>>(line: S) -> Self {
        Self::RecordExtraction { line: line.into() }
    }

    /// Create a missing field error
    pub fn missing_field<F: Into<String>, S: Into<String>>(field: F, stream: S) -> Self {
        Self::MissingField {
            field: field.into(),
            stream: stream.into(),
        }
    }

    /// Create a timestamp parse error
    pub fn timestamp_parse<S: Into<String>>(value: S) -> Self {
        Self::TimestampParse {
            value: value.into(),
        }
    }

    /// Create a malformed XML error
    pub fn malformed_xml<S: Into<String>>(message: S) -> Self {
        Self::MalformedXml {
            message: message.into(),
        }
    }

    /// Create a configuration error
    pub fn configuration<S: Into<String>>(message: S) -> Self {
        Self::Configuration {
            message: message.into(),
        }
    }
}

impl FetchError {
    /// Create a staging error for the given path
    pub fn staging<P: Into<String>>(path: P, source: std::io::Error) -> Self {
        Self::Staging {
            path: path.into(),
            source,
        }
    }
}
