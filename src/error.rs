//! Unified error types for testverse

use std::io;
use std::path::PathBuf;
use std::sync::Arc;
use thiserror::Error;

/// Main error type for universe operations
#[derive(Error, Debug)]
pub enum Error {
    // IO errors
    #[error("IO error: {0}")]
    Io(#[from] io::Error),

    // Config errors
    #[error("Failed to read config file '{path}': {source}")]
    ConfigRead { path: PathBuf, source: io::Error },

    #[error("Failed to parse config: {0}")]
    ConfigParse(#[from] toml::de::Error),

    #[error("Config validation failed: {0}")]
    ConfigValidation(String),

    // Tool errors
    #[error("required tools missing: {}", .0.join(", "))]
    MissingDependency(Vec<String>),

    // Switch errors
    #[error("Failed to start virtual switch '{program}': {source}")]
    ProcessSpawn { program: String, source: io::Error },

    // Lifecycle errors
    #[error("Failed to remove universe workspace '{path}': {source}")]
    Teardown {
        path: PathBuf,
        source: Arc<io::Error>,
    },

    #[error("timeout")]
    Timeout,

    #[error("Universe is closed")]
    Closed,

    // Allocation errors
    #[error("Address space exhausted: {0}")]
    AddressExhausted(String),

    #[error("VM '{0}' is already registered")]
    VmAlreadyRegistered(String),
}

/// Result type alias for universe operations
pub type Result<T> = std::result::Result<T, Error>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_missing_dependency_lists_every_tool() {
        let err = Error::MissingDependency(vec!["vde_switch".into(), "qemu-img".into()]);
        assert_eq!(err.to_string(), "required tools missing: vde_switch, qemu-img");
    }

    #[test]
    fn test_teardown_error_is_shareable() {
        let source = Arc::new(io::Error::other("busy"));
        let a = Error::Teardown {
            path: PathBuf::from("/tmp/u"),
            source: source.clone(),
        };
        let b = Error::Teardown {
            path: PathBuf::from("/tmp/u"),
            source,
        };
        assert_eq!(a.to_string(), b.to_string());
    }
}
