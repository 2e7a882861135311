//! Cross-field configuration validation.

use crate::error::{ConfigError, ConfigResult};
use crate::types::ApiConfig;

/// Validate a deserialized configuration.
///
/// # Errors
///
/// Returns the first violated invariant.
pub(crate) fn validate(config: &ApiConfig) -> ConfigResult<()> {
    validate_listen(config)?;
    validate_buffer(config)?;
    validate_agent(config)?;
    validate_agents(config)?;
    validate_tls(config)?;
    Ok(())
}

fn validate_listen(config: &ApiConfig) -> ConfigResult<()> {
    if config.listen.port == 0 {
        return Err(ConfigError::validation("listen.port", "port must not be 0"));
    }
    if config.listen.address.is_empty() {
        return Err(ConfigError::validation(
            "listen.address",
            "address must not be empty",
        ));
    }
    Ok(())
}

fn validate_buffer(config: &ApiConfig) -> ConfigResult<()> {
    let b = &config.buffer;
    if b.size == 0 {
        return Err(ConfigError::validation("buffer.size", "size must be > 0"));
    }
    if b.upper_limit > b.size {
        return Err(ConfigError::validation(
            "buffer.upper_limit",
            format!(
                "upper_limit ({}) must not exceed size ({})",
                b.upper_limit, b.size
            ),
        ));
    }
    if b.lower_limit >= b.upper_limit {
        return Err(ConfigError::validation(
            "buffer.lower_limit",
            format!(
                "lower_limit ({}) must be below upper_limit ({})",
                b.lower_limit, b.upper_limit
            ),
        ));
    }
    Ok(())
}

fn validate_agent(config: &ApiConfig) -> ConfigResult<()> {
    if config.agent.connect_timeout_secs == 0 {
        return Err(ConfigError::validation(
            "agent.connect_timeout_secs",
            "timeout must be > 0",
        ));
    }
    Ok(())
}

fn validate_agents(config: &ApiConfig) -> ConfigResult<()> {
    for (i, entry) in config.agents.iter().enumerate() {
        if entry.address.is_empty() {
            return Err(ConfigError::validation(
                format!("agents[{i}].address"),
                "address must not be empty",
            ));
        }
    }
    Ok(())
}

fn validate_tls(config: &ApiConfig) -> ConfigResult<()> {
    let Some(tls) = &config.tls else {
        return Ok(());
    };
    for (field, path) in [
        ("tls.certificate", &tls.certificate),
        ("tls.private_key", &tls.private_key),
        ("tls.ca", &tls.ca),
    ] {
        if path.as_os_str().is_empty() {
            return Err(ConfigError::validation(field, "path must not be empty"));
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{BufferSection, TlsSection};

    #[test]
    fn test_defaults_validate() {
        assert!(validate(&ApiConfig::default()).is_ok());
    }

    fn with_buffer(buffer: BufferSection) -> ApiConfig {
        ApiConfig {
            buffer,
            ..ApiConfig::default()
        }
    }

    #[test]
    fn test_buffer_limits_must_be_ordered() {
        let config = with_buffer(BufferSection {
            size: 100,
            upper_limit: 100,
            lower_limit: 99,
        });
        assert!(validate(&config).is_ok());

        let config = with_buffer(BufferSection {
            size: 100,
            upper_limit: 101,
            lower_limit: 99,
        });
        let err = validate(&config).unwrap_err();
        assert!(err.to_string().contains("upper_limit"), "{err}");

        let config = with_buffer(BufferSection {
            size: 100,
            upper_limit: 50,
            lower_limit: 50,
        });
        let err = validate(&config).unwrap_err();
        assert!(err.to_string().contains("lower_limit"), "{err}");
    }

    #[test]
    fn test_zero_port_rejected() {
        let mut config = ApiConfig::default();
        config.listen.port = 0;
        assert!(validate(&config).is_err());
    }

    #[test]
    fn test_empty_tls_path_rejected() {
        let config = ApiConfig {
            tls: Some(TlsSection {
                certificate: "api.crt".into(),
                private_key: String::new().into(),
                ca: "ca.crt".into(),
            }),
            ..ApiConfig::default()
        };
        let err = validate(&config).unwrap_err();
        assert!(err.to_string().contains("tls.private_key"), "{err}");
    }

    #[test]
    fn test_empty_agent_address_rejected() {
        let config = ApiConfig {
            agents: vec![crate::types::AgentEntry {
                address: String::new(),
                identifier: None,
            }],
            ..ApiConfig::default()
        };
        let err = validate(&config).unwrap_err();
        assert!(err.to_string().contains("agents[0]"), "{err}");
    }
}
