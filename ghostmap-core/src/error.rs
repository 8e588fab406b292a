use ghostmap_scanner::ScanError;
use thiserror::Error;

/// Rejected configuration. Always raised before any request is sent.
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("probe_methods must contain at least one method")]
    EmptyMethods,

    #[error("invalid HTTP method '{0}'")]
    InvalidMethod(String),

    #[error("invalid weight {name} = {value}: must be within 0..=100")]
    InvalidWeight { name: &'static str, value: i32 },

    #[error("invalid value for {field}: {reason}")]
    InvalidValue { field: &'static str, reason: String },

    #[error("failed to read config file {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse config file {path}: {message}")]
    Parse { path: String, message: String },
}

#[derive(Error, Debug)]
pub enum AuditError {
    #[error("configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("scanner error: {0}")]
    Scan(#[from] ScanError),
}

pub type Result<T> = std::result::Result<T, AuditError>;
