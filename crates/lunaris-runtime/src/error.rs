//! Configuration error types.

use std::path::PathBuf;

/// Errors raised while loading [`crate::ScriptOptions`].
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// The configuration file could not be read
    #[error("cannot read {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// The configuration is not valid TOML or has wrong field types
    #[error("invalid configuration: {0}")]
    Parse(#[from] toml::de::Error),
}
