//! Error types for the codesim-rs library.
//!
//! The taxonomy mirrors how failures are allowed to travel through the
//! similarity pipeline: input and parse failures are captured per pair,
//! delegate failures are absorbed by the composite calculator, and cache
//! storage failures abort a run.

use std::io;

use thiserror::Error;

/// Main result type for codesim operations.
pub type Result<T> = std::result::Result<T, CodesimError>;

/// Error type for all codesim operations.
#[derive(Error, Debug)]
pub enum CodesimError {
    /// An artifact could not be read (missing file, permissions, not a file).
    #[error("Input error for {path}: {message}")]
    Input {
        /// Path of the artifact that could not be read
        path: String,
        /// Error description
        message: String,
        /// Underlying I/O error, when there is one
        #[source]
        source: Option<io::Error>,
    },

    /// Source text does not parse.
    #[error("Parse error in {language}: {message}")]
    Parse {
        /// Language being parsed
        language: String,
        /// Error description
        message: String,
        /// Line number (1-based, if available)
        line: Option<usize>,
        /// Column number (1-based, if available)
        column: Option<usize>,
    },

    /// The external similarity delegate failed.
    #[error("Delegate error ({delegate}): {message}")]
    Delegate {
        /// Delegate name
        delegate: String,
        /// Error description
        message: String,
    },

    /// Comparison cache storage is unavailable.
    #[error("Cache I/O error: {message}")]
    CacheIo {
        /// Error description
        message: String,
        /// Cache entry path involved, if any
        path: Option<String>,
        /// Underlying I/O error
        #[source]
        source: Option<io::Error>,
    },

    /// Generic I/O errors outside artifact and cache handling
    #[error("I/O error: {message}")]
    Io {
        /// Human-readable error message
        message: String,
        /// Underlying I/O error
        #[source]
        source: io::Error,
    },

    /// Configuration errors
    #[error("Configuration error: {message}")]
    Config {
        /// Error description
        message: String,
        /// Configuration field that caused the error
        field: Option<String>,
    },

    /// Validation errors for input data
    #[error("Validation error: {message}")]
    Validation {
        /// Error description
        message: String,
        /// Field or input that failed validation
        field: Option<String>,
    },

    /// Serialization/deserialization errors
    #[error("Serialization error: {message}")]
    Serialization {
        /// Error description
        message: String,
        /// Data type being serialized
        data_type: Option<String>,
        /// Underlying serialization error
        #[source]
        source: Option<Box<dyn std::error::Error + Send + Sync>>,
    },

    /// A unit of work exceeded its time budget
    #[error("Timed out after {seconds}s: {message}")]
    Timeout {
        /// Error description
        message: String,
        /// Budget that was exceeded
        seconds: u64,
    },

    /// Generic internal errors
    #[error("Internal error: {message}")]
    Internal {
        /// Error description
        message: String,
    },
}

impl CodesimError {
    /// Create a new artifact input error
    pub fn input(path: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Input {
            path: path.into(),
            message: message.into(),
            source: None,
        }
    }

    /// Create a new artifact input error wrapping an I/O failure
    pub fn input_io(path: impl Into<String>, source: io::Error) -> Self {
        Self::Input {
            path: path.into(),
            message: source.to_string(),
            source: Some(source),
        }
    }

    /// Create a new parse error
    pub fn parse(language: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Parse {
            language: language.into(),
            message: message.into(),
            line: None,
            column: None,
        }
    }

    /// Create a new parse error with a source position
    pub fn parse_at(
        language: impl Into<String>,
        message: impl Into<String>,
        line: usize,
        column: usize,
    ) -> Self {
        Self::Parse {
            language: language.into(),
            message: message.into(),
            line: Some(line),
            column: Some(column),
        }
    }

    /// Create a new delegate error
    pub fn delegate(delegate: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Delegate {
            delegate: delegate.into(),
            message: message.into(),
        }
    }

    /// Create a new cache I/O error
    pub fn cache_io(message: impl Into<String>, path: impl Into<String>, source: io::Error) -> Self {
        Self::CacheIo {
            message: message.into(),
            path: Some(path.into()),
            source: Some(source),
        }
    }

    /// Create a new I/O error with context
    pub fn io(message: impl Into<String>, source: io::Error) -> Self {
        Self::Io {
            message: message.into(),
            source,
        }
    }

    /// Create a new configuration error
    pub fn config(message: impl Into<String>) -> Self {
        Self::Config {
            message: message.into(),
            field: None,
        }
    }

    /// Create a new configuration error with field context
    pub fn config_field(message: impl Into<String>, field: impl Into<String>) -> Self {
        Self::Config {
            message: message.into(),
            field: Some(field.into()),
        }
    }

    /// Create a new validation error
    pub fn validation(message: impl Into<String>) -> Self {
        Self::Validation {
            message: message.into(),
            field: None,
        }
    }

    /// Create a new timeout error
    pub fn timeout(message: impl Into<String>, seconds: u64) -> Self {
        Self::Timeout {
            message: message.into(),
            seconds,
        }
    }

    /// Create a new internal error
    pub fn internal(message: impl Into<String>) -> Self {
        Self::Internal {
            message: message.into(),
        }
    }

    /// Short label naming the error class, used when an error is embedded
    /// into a similarity record instead of being propagated.
    pub fn kind_label(&self) -> &'static str {
        match self {
            Self::Input { .. } => "InputError",
            Self::Parse { .. } => "ParseError",
            Self::Delegate { .. } => "DelegateError",
            Self::CacheIo { .. } => "CacheIOError",
            Self::Io { .. } => "IoError",
            Self::Config { .. } => "ConfigError",
            Self::Validation { .. } => "ValidationError",
            Self::Serialization { .. } => "SerializationError",
            Self::Timeout { .. } => "TimeoutError",
            Self::Internal { .. } => "InternalError",
        }
    }

    /// Whether this error must abort a batch run.
    pub fn is_fatal(&self) -> bool {
        matches!(self, Self::CacheIo { .. } | Self::Config { .. })
    }
}

impl From<io::Error> for CodesimError {
    fn from(err: io::Error) -> Self {
        Self::io("I/O operation failed", err)
    }
}

impl From<serde_json::Error> for CodesimError {
    fn from(err: serde_json::Error) -> Self {
        Self::Serialization {
            message: format!("JSON serialization failed: {err}"),
            data_type: Some("JSON".to_string()),
            source: Some(Box::new(err)),
        }
    }
}

impl From<serde_yaml::Error> for CodesimError {
    fn from(err: serde_yaml::Error) -> Self {
        Self::Serialization {
            message: format!("YAML serialization failed: {err}"),
            data_type: Some("YAML".to_string()),
            source: Some(Box::new(err)),
        }
    }
}
