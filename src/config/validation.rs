//! Configuration validation.
//!
//! # Responsibilities
//! - Semantic validation (serde handles syntactic)
//! - Validate value ranges (timeouts > 0, ports valid, CIDR prefix)
//! - Check collaborator URLs parse
//!
//! # Design Decisions
//! - Returns all validation errors, not just first
//! - Validation is pure function: DaemonConfig → Result<(), Vec<ValidationError>>
//! - Runs before config is accepted into the system

use std::fmt;

use url::Url;

use crate::config::schema::DaemonConfig;
use crate::topology::NetworkBlock;

/// One failed check: the offending field and what is wrong with it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidationError {
    pub field: &'static str,
    pub message: String,
}

impl ValidationError {
    fn new(field: &'static str, message: impl Into<String>) -> Self {
        Self {
            field,
            message: message.into(),
        }
    }
}

impl fmt::Display for ValidationError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.field, self.message)
    }
}

pub fn validate_config(config: &DaemonConfig) -> Result<(), Vec<ValidationError>> {
    let mut errors = Vec::new();

    let listener = &config.listener;
    if listener.socket_path.as_os_str().is_empty() {
        errors.push(ValidationError::new("listener.socket_path", "must not be empty"));
    }
    if listener.socket_mode > 0o777 {
        errors.push(ValidationError::new(
            "listener.socket_mode",
            format!("{:#o} is not a permission mode", listener.socket_mode),
        ));
    }
    if listener.max_connections == 0 {
        errors.push(ValidationError::new("listener.max_connections", "must be > 0"));
    }
    if listener.read_timeout_secs == 0 {
        errors.push(ValidationError::new("listener.read_timeout_secs", "must be > 0"));
    }
    if listener.write_timeout_secs == 0 {
        errors.push(ValidationError::new("listener.write_timeout_secs", "must be > 0"));
    }
    if listener.max_frame_bytes < crate::protocol::HEADER_LEN {
        errors.push(ValidationError::new(
            "listener.max_frame_bytes",
            format!("must be at least {} bytes", crate::protocol::HEADER_LEN),
        ));
    }

    if let Err(e) = config.network.cidr.parse::<NetworkBlock>() {
        errors.push(ValidationError::new("network.cidr", e.to_string()));
    }
    if config.network.wireguard_port == 0 {
        errors.push(ValidationError::new("network.wireguard_port", "must be non-zero"));
    }

    if config.backends.timeout_secs == 0 {
        errors.push(ValidationError::new("backends.timeout_secs", "must be > 0"));
    }
    let urls = [
        ("backends.vault_url", &config.backends.vault_url),
        ("backends.cloud_url", &config.backends.cloud_url),
        ("backends.automation_url", &config.backends.automation_url),
        ("persistence.config_server_url", &config.persistence.config_server_url),
    ];
    for (field, url) in urls {
        if let Some(url) = url {
            check_url(field, url, &mut errors);
        }
    }

    if config.wireguard.interface.is_empty() || config.wireguard.interface.contains('/') {
        errors.push(ValidationError::new(
            "wireguard.interface",
            "must be a plain interface name",
        ));
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}

fn check_url(field: &'static str, raw: &str, errors: &mut Vec<ValidationError>) {
    match Url::parse(raw) {
        Ok(url) if matches!(url.scheme(), "http" | "https") => {}
        Ok(url) => errors.push(ValidationError::new(
            field,
            format!("unsupported scheme '{}'", url.scheme()),
        )),
        Err(e) => errors.push(ValidationError::new(field, format!("'{raw}': {e}"))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_are_valid() {
        assert_eq!(validate_config(&DaemonConfig::default()), Ok(()));
    }

    #[test]
    fn test_all_errors_reported() {
        let mut config = DaemonConfig::default();
        config.listener.max_connections = 0;
        config.listener.read_timeout_secs = 0;
        config.network.cidr = "10.8.0.0/4".into();
        config.network.wireguard_port = 0;
        config.backends.cloud_url = Some("ftp://cloud.example".into());
        config.backends.vault_url = Some("not a url".into());

        let errors = validate_config(&config).unwrap_err();
        let fields: Vec<_> = errors.iter().map(|e| e.field).collect();
        assert_eq!(
            fields,
            vec![
                "listener.max_connections",
                "listener.read_timeout_secs",
                "network.cidr",
                "network.wireguard_port",
                "backends.vault_url",
                "backends.cloud_url",
            ]
        );
    }
}
