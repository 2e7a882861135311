//! Dragnet Config - Configuration for the dragnet capture service.
//!
//! Loaded from a single TOML file named on the command line. Every section
//! defaults to working values so that a missing file or a bare section
//! header still produces a runnable (plaintext, local) service.

#![deny(unsafe_code)]
#![warn(missing_docs)]
#![deny(clippy::all)]
#![warn(unreachable_pub)]

mod error;
mod types;
mod validate;

use std::path::Path;

pub use error::{ConfigError, ConfigResult};
pub use types::{
    AgentEntry, AgentSection, ApiConfig, BufferSection, ListenSection, LogFormat, LogSection,
    TlsSection,
};

/// Load and validate a configuration file.
///
/// # Errors
///
/// Fails if the file cannot be read, does not parse as TOML, or violates a
/// cross-field invariant.
pub fn load(path: &Path) -> ConfigResult<ApiConfig> {
    let raw = std::fs::read_to_string(path).map_err(|err| ConfigError::Io {
        path: path.display().to_string(),
        source: err,
    })?;
    let config: ApiConfig = toml::from_str(&raw)?;
    validate::validate(&config)?;
    Ok(config)
}

/// The built-in defaults, validated.
///
/// # Errors
///
/// Never fails in practice; kept fallible so defaults go through the same
/// validation as file-loaded configurations.
pub fn default_config() -> ConfigResult<ApiConfig> {
    let config = ApiConfig::default();
    validate::validate(&config)?;
    Ok(config)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_load_reads_and_validates() {
        let dir = tempfile::TempDir::new().unwrap();
        let path = dir.path().join("dragnet.toml");
        std::fs::write(
            &path,
            r#"
            [listen]
            port = 9494

            [buffer]
            size = 200
            upper_limit = 150
            lower_limit = 100
            "#,
        )
        .unwrap();

        let config = load(&path).unwrap();
        assert_eq!(config.listen.port, 9494);
        assert_eq!(config.buffer.size, 200);
    }

    #[test]
    fn test_load_rejects_invalid_invariants() {
        let dir = tempfile::TempDir::new().unwrap();
        let path = dir.path().join("dragnet.toml");
        std::fs::write(
            &path,
            r#"
            [buffer]
            size = 10
            upper_limit = 20
            lower_limit = 5
            "#,
        )
        .unwrap();

        assert!(matches!(
            load(&path),
            Err(ConfigError::Validation { .. })
        ));
    }

    #[test]
    fn test_load_missing_file_is_an_io_error() {
        let path = std::path::Path::new("/nonexistent/dragnet.toml");
        assert!(matches!(load(path), Err(ConfigError::Io { .. })));
    }

    #[test]
    fn test_defaults_are_valid() {
        assert!(default_config().is_ok());
    }
}
