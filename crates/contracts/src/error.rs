//! Layered error definitions
//!
//! Categorized by source: config / transport / metadata

use thiserror::Error;

/// Unified error type
#[derive(Debug, Error)]
pub enum ContractError {
    // ===== Configuration Errors =====
    /// Configuration parse error
    #[error("config parse error: {message}")]
    ConfigParse {
        message: String,
        #[source]
        source: Option<Box<dyn std::error::Error + Send + Sync>>,
    },

    /// Configuration validation error
    #[error("config validation error at '{field}': {message}")]
    ConfigValidation { field: String, message: String },

    // ===== Transport Errors =====
    /// Subscription could not be set up
    #[error("transport '{transport}' subscribe error: {message}")]
    Subscribe { transport: String, message: String },

    /// Close control failed
    #[error("transport '{transport}' close error: {message}")]
    Close { transport: String, message: String },

    // ===== Metadata Errors =====
    /// Metadata source could not be read or parsed
    #[error("metadata load error: {message}")]
    MetadataLoad { message: String },

    // ===== General Errors =====
    /// IO error
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    /// Other error
    #[error("{0}")]
    Other(String),
}

impl ContractError {
    /// Create configuration parse error
    pub fn config_parse(message: impl Into<String>) -> Self {
        Self::ConfigParse {
            message: message.into(),
            source: None,
        }
    }

    /// Create configuration validation error
    pub fn config_validation(field: impl Into<String>, message: impl Into<String>) -> Self {
        Self::ConfigValidation {
            field: field.into(),
            message: message.into(),
        }
    }

    /// Create subscribe error
    pub fn subscribe(transport: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Subscribe {
            transport: transport.into(),
            message: message.into(),
        }
    }

    /// Create close error
    pub fn close(transport: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Close {
            transport: transport.into(),
            message: message.into(),
        }
    }

    /// Create metadata load error
    pub fn metadata_load(message: impl Into<String>) -> Self {
        Self::MetadataLoad {
            message: message.into(),
        }
    }
}
