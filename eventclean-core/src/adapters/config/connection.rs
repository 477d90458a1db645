//! Store connection configuration.

use serde::{Deserialize, Serialize};
use std::time::Duration;

use crate::error::EventCleanError;
use crate::security::Credentials;

/// Default PostgreSQL port.
pub const DEFAULT_POSTGRES_PORT: u16 = 5432;

/// Configuration for the backing store connection.
///
/// # Example
/// ```rust
/// use eventclean_core::adapters::ConnectionConfig;
///
/// let config = ConnectionConfig::new("localhost".to_string())
///     .with_port(5432)
///     .with_database("events".to_string())
///     .with_username("analyst".to_string());
///
/// assert!(config.validate().is_ok());
/// ```
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConnectionConfig {
    /// Store host address
    pub host: String,
    /// Optional port number
    pub port: Option<u16>,
    /// Optional database name
    pub database: Option<String>,
    /// Optional username (password handled separately)
    pub username: Option<String>,
    /// Connection acquire timeout
    pub connect_timeout: Duration,
    /// Per-statement timeout
    pub query_timeout: Duration,
    /// Maximum number of connections in pool
    pub max_connections: u32,
}

impl Default for ConnectionConfig {
    fn default() -> Self {
        Self {
            host: "localhost".to_string(),
            port: None,
            database: None,
            username: None,
            connect_timeout: Duration::from_secs(30),
            query_timeout: Duration::from_secs(300),
            max_connections: 4,
        }
    }
}

impl std::fmt::Display for ConnectionConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "ConnectionConfig({}{}{})",
            self.host,
            self.port.map_or_else(String::new, |p| format!(":{}", p)),
            self.database
                .as_ref()
                .map_or_else(String::new, |db| format!("/{}", db))
        )
        // Username and credentials are never displayed
    }
}

impl ConnectionConfig {
    /// Validates connection configuration parameters.
    pub fn validate(&self) -> crate::Result<()> {
        if self.host.is_empty() {
            return Err(EventCleanError::configuration("host cannot be empty"));
        }

        if self.port == Some(0) {
            return Err(EventCleanError::configuration(
                "port must be greater than 0",
            ));
        }

        if self.max_connections == 0 {
            return Err(EventCleanError::configuration(
                "max_connections must be greater than 0",
            ));
        }

        if self.max_connections > 100 {
            return Err(EventCleanError::configuration(
                "max_connections should not exceed 100",
            ));
        }

        if self.connect_timeout.is_zero() {
            return Err(EventCleanError::configuration(
                "connect_timeout must be greater than 0",
            ));
        }

        if self.query_timeout.is_zero() {
            return Err(EventCleanError::configuration(
                "query_timeout must be greater than 0",
            ));
        }

        Ok(())
    }

    /// Creates a new connection config with defaults.
    pub fn new(host: String) -> Self {
        Self {
            host,
            ..Default::default()
        }
    }

    /// Builder method to set port.
    pub fn with_port(mut self, port: u16) -> Self {
        self.port = Some(port);
        self
    }

    /// Builder method to set database.
    pub fn with_database(mut self, database: String) -> Self {
        self.database = Some(database);
        self
    }

    /// Builder method to set username.
    pub fn with_username(mut self, username: String) -> Self {
        self.username = Some(username);
        self
    }

    /// Builds a PostgreSQL URL from these parameters and the credentials.
    ///
    /// The returned string contains the password; pass it straight to the
    /// store factory and log only [`crate::error::redact_database_url`] of it.
    pub fn postgres_url(&self, credentials: &Credentials) -> crate::Result<String> {
        self.validate()?;

        let database = self
            .database
            .as_deref()
            .filter(|db| !db.is_empty())
            .ok_or_else(|| EventCleanError::configuration("database name is required"))?;

        let mut url = url::Url::parse("postgres://localhost").map_err(|e| {
            EventCleanError::configuration(format!("Failed to build store URL: {}", e))
        })?;

        url.set_host(Some(&self.host)).map_err(|e| {
            EventCleanError::configuration(format!("Invalid host '{}': {}", self.host, e))
        })?;
        url.set_port(Some(self.port.unwrap_or(DEFAULT_POSTGRES_PORT)))
            .map_err(|()| EventCleanError::configuration("Invalid port"))?;

        if !credentials.username().is_empty() {
            url.set_username(credentials.username())
                .map_err(|()| EventCleanError::configuration("Invalid username"))?;
        }
        if let Some(password) = credentials.password() {
            url.set_password(Some(password))
                .map_err(|()| EventCleanError::configuration("Invalid password"))?;
        }
        url.set_path(&format!("/{}", database));

        Ok(url.to_string())
    }
}
