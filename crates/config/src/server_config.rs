//! Reconciliation server configuration section

use crate::validation::{ConfigSection, ValidationError, Validator};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Reconciliation server settings
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct ServerConfig {
    /// Listen address
    pub bind_address: String,

    /// Authoritative store (relative to `app.data_dir` if not absolute)
    pub database_path: PathBuf,

    /// Connection pool size
    pub max_connections: u32,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind_address: "127.0.0.1:8080".to_string(),
            database_path: PathBuf::from("server.db"),
            max_connections: 5,
        }
    }
}

impl ConfigSection for ServerConfig {
    fn validate(&self) -> Result<(), Vec<ValidationError>> {
        let mut results = vec![
            Validator::socket_addr(&self.bind_address, "server.bind_address"),
            Validator::in_range(self.max_connections, 1, 64, "server.max_connections"),
        ];

        if self.database_path.as_os_str().is_empty() {
            results.push(Err(ValidationError::new(
                "server.database_path",
                "must not be empty",
            )));
        }

        Validator::collect_errors(results)
    }

    fn merge(&mut self, other: Self) {
        self.bind_address = other.bind_address;
        self.database_path = other.database_path;
        self.max_connections = other.max_connections;
    }

    fn section_name(&self) -> &'static str {
        "server"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_is_valid() {
        assert!(ServerConfig::default().validate().is_ok());
    }

    #[test]
    fn test_bad_bind_address() {
        let mut config = ServerConfig::default();
        config.bind_address = "everywhere".to_string();
        config.max_connections = 0;
        assert_eq!(config.validate().unwrap_err().len(), 2);
    }
}
