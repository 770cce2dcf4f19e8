//! Error types for sshq.
//!
//! Every failure in the pipeline is fatal, but each one is classified so the
//! binary can print a precise message and an actionable hint.

use thiserror::Error;

/// Main error type for sshq.
#[derive(Debug, Error)]
pub enum SshqError {
    /// Invalid or missing command-line configuration.
    #[error("Config error: {message}")]
    Config {
        /// Human-readable error message.
        message: String,
    },

    /// SSH transport failed (dial, handshake or host key).
    #[error("SSH error: {message}")]
    Ssh {
        /// Human-readable error message.
        message: String,
        /// Actionable hint for the user.
        hint: Option<String>,
        /// Optional underlying error source.
        #[source]
        source: Option<Box<dyn std::error::Error + Send + Sync>>,
    },

    /// SSH or database authentication failed.
    #[error("Authentication error: {message}")]
    Authentication {
        /// Human-readable error message.
        message: String,
        /// Actionable hint for the user.
        hint: Option<String>,
    },

    /// The jump host could not open a channel to the target address.
    #[error("Tunnel error: {message}")]
    Tunnel {
        /// Target address that was dialed.
        address: String,
        /// Human-readable error message.
        message: String,
        /// Optional underlying error source.
        #[source]
        source: Option<Box<dyn std::error::Error + Send + Sync>>,
    },

    /// Database connection failed.
    #[error("Connection error: {message}")]
    Connection {
        /// Human-readable error message.
        message: String,
        /// Optional underlying error source.
        #[source]
        source: Option<Box<dyn std::error::Error + Send + Sync>>,
    },

    /// Query execution error with MySQL server details.
    #[error("Query error: {message}")]
    Query {
        /// Server error message.
        message: String,
        /// MySQL error number (e.g., 1064).
        code: Option<u16>,
        /// SQLSTATE (e.g., "42000").
        state: Option<String>,
        /// Actionable hint for the user.
        hint: Option<String>,
    },

    /// A column value could not be coerced to display text.
    #[error("Coercion error: column '{column}' has unsupported type {type_name}")]
    Coercion {
        /// Column name.
        column: String,
        /// Native type reported by the server.
        type_name: String,
    },

    /// Table rendering failed (row shape or output I/O).
    #[error("Render error: {message}")]
    Render {
        /// Human-readable error message.
        message: String,
        /// Optional underlying error source.
        #[source]
        source: Option<Box<dyn std::error::Error + Send + Sync>>,
    },

    /// Releasing a resource (result set, connection, session) failed.
    #[error("Release error: {message}")]
    Release {
        /// Human-readable error message.
        message: String,
        /// Optional underlying error source.
        #[source]
        source: Option<Box<dyn std::error::Error + Send + Sync>>,
    },
}

/// Result alias used across sshq.
pub type SshqResult<T> = Result<T, SshqError>;

impl SshqError {
    // ========== Constructors ==========

    /// Create a new config error.
    pub fn config(message: impl Into<String>) -> Self {
        Self::Config { message: message.into() }
    }

    /// Create a new SSH error with a custom hint.
    pub fn ssh_with_hint(message: impl Into<String>, hint: impl Into<String>) -> Self {
        Self::Ssh { message: message.into(), hint: Some(hint.into()), source: None }
    }

    /// Create a new SSH error with source.
    pub fn ssh_with_source(
        message: impl Into<String>,
        source: impl std::error::Error + Send + Sync + 'static,
    ) -> Self {
        Self::Ssh { message: message.into(), hint: None, source: Some(Box::new(source)) }
    }

    /// Create a new authentication error with custom hint.
    pub fn authentication_with_hint(message: impl Into<String>, hint: impl Into<String>) -> Self {
        Self::Authentication { message: message.into(), hint: Some(hint.into()) }
    }

    /// Create a new tunnel error.
    pub fn tunnel(address: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Tunnel { address: address.into(), message: message.into(), source: None }
    }

    /// Create a new tunnel error with source.
    pub fn tunnel_with_source(
        address: impl Into<String>,
        message: impl Into<String>,
        source: impl std::error::Error + Send + Sync + 'static,
    ) -> Self {
        Self::Tunnel {
            address: address.into(),
            message: message.into(),
            source: Some(Box::new(source)),
        }
    }

    /// Create a new connection error with source.
    pub fn connection_with_source(
        message: impl Into<String>,
        source: impl std::error::Error + Send + Sync + 'static,
    ) -> Self {
        Self::Connection { message: message.into(), source: Some(Box::new(source)) }
    }

    /// Create a new query error.
    pub fn query(message: impl Into<String>, hint: Option<String>) -> Self {
        Self::Query { message: message.into(), code: None, state: None, hint }
    }

    /// Create a new coercion error.
    pub fn coercion(column: impl Into<String>, type_name: impl Into<String>) -> Self {
        Self::Coercion { column: column.into(), type_name: type_name.into() }
    }

    /// Create a new render error.
    pub fn render(message: impl Into<String>) -> Self {
        Self::Render { message: message.into(), source: None }
    }

    /// Create a new release error with source.
    pub fn release_with_source(
        message: impl Into<String>,
        source: impl std::error::Error + Send + Sync + 'static,
    ) -> Self {
        Self::Release { message: message.into(), source: Some(Box::new(source)) }
    }

    /// Classify a MySQL server error by its error number.
    pub fn from_server_error(code: u16, message: String, state: String) -> Self {
        match code {
            // ER_DBACCESS_DENIED_ERROR, ER_ACCESS_DENIED_ERROR, ER_ACCESS_DENIED_NO_PASSWORD_ERROR
            1044 | 1045 | 1698 => SshqError::Authentication {
                message,
                hint: Some("Check --db-user, --db-password and the user's grants".to_string()),
            },
            // ER_BAD_DB_ERROR
            1049 => SshqError::Connection {
                message: format!("{message} (check --db-name)"),
                source: None,
            },
            _ => SshqError::Query { message, code: Some(code), state: Some(state), hint: None },
        }
    }

    // ========== Methods ==========

    /// Get the error category name.
    pub fn category(&self) -> &'static str {
        match self {
            Self::Config { .. } => "Config",
            Self::Ssh { .. } => "SSH",
            Self::Authentication { .. } => "Authentication",
            Self::Tunnel { .. } => "Tunnel",
            Self::Connection { .. } => "Connection",
            Self::Query { .. } => "Query",
            Self::Coercion { .. } => "Coercion",
            Self::Render { .. } => "Render",
            Self::Release { .. } => "Release",
        }
    }

    /// Get actionable hint for the user.
    pub fn hint(&self) -> Option<&str> {
        match self {
            Self::Config { .. } => Some("Run with --help to see the available flags"),
            Self::Ssh { hint, .. } => {
                hint.as_deref().or(Some("Verify the SSH server is running and reachable"))
            }
            Self::Authentication { hint, .. } => hint.as_deref(),
            Self::Tunnel { .. } => {
                Some("Check that the jump host can reach the database and allows TCP forwarding")
            }
            Self::Connection { .. } => Some("Check that the database server is running"),
            Self::Query { hint, .. } => hint.as_deref(),
            Self::Coercion { .. } => Some("Use --db-query-mode=text or cast the column to CHAR"),
            Self::Render { .. } => None,
            Self::Release { .. } => None,
        }
    }

    /// Convert to user-displayable error info.
    pub fn to_error_info(&self) -> ErrorInfo {
        let message = self.to_string();
        let hint = self.hint().map(String::from);

        let technical_detail = match self {
            Self::Query { code, state, .. } => {
                let mut parts = Vec::new();
                if let Some(code) = code {
                    parts.push(format!("Code: {code}"));
                }
                if let Some(state) = state {
                    parts.push(format!("SQLSTATE: {state}"));
                }
                if parts.is_empty() {
                    None
                } else {
                    Some(parts.join("\n"))
                }
            }
            Self::Tunnel { address, .. } => Some(format!("Target: {address}")),
            _ => None,
        };

        ErrorInfo { message, hint, technical_detail }
    }
}

/// User-displayable error information.
#[derive(Debug, Clone)]
pub struct ErrorInfo {
    /// User-friendly message.
    pub message: String,
    /// Actionable suggestion.
    pub hint: Option<String>,
    /// Technical detail printed below the message.
    pub technical_detail: Option<String>,
}

// ========== Error Conversions ==========

/// Convert from mysql_async::Error to SshqError.
impl From<mysql_async::Error> for SshqError {
    fn from(err: mysql_async::Error) -> Self {
        match err {
            mysql_async::Error::Server(server) => {
                SshqError::from_server_error(server.code, server.message, server.state)
            }
            mysql_async::Error::Io(io) => {
                SshqError::connection_with_source(format!("Database I/O error: {io}"), io)
            }
            other => SshqError::connection_with_source(other.to_string(), other),
        }
    }
}

/// Convert from russh::Error to SshqError.
impl From<russh::Error> for SshqError {
    fn from(err: russh::Error) -> Self {
        match err {
            russh::Error::UnknownKey => SshqError::ssh_with_hint(
                "Host key is not present in known_hosts",
                "Add the host with ssh-keyscan, or pass --insecure-skip-host-verify for a trusted jump host",
            ),
            russh::Error::Keys(russh_keys::Error::KeyChanged { line }) => SshqError::ssh_with_hint(
                format!("Host key does not match known_hosts entry on line {line}"),
                "The jump host identity changed; verify it before updating known_hosts",
            ),
            other => SshqError::ssh_with_source(other.to_string(), other),
        }
    }
}

/// Convert from std::io::Error to SshqError.
impl From<std::io::Error> for SshqError {
    fn from(err: std::io::Error) -> Self {
        SshqError::Render {
            message: format!("Failed to write output: {err}"),
            source: Some(Box::new(err)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_category_names() {
        assert_eq!(SshqError::config("x").category(), "Config");
        assert_eq!(SshqError::ssh_with_hint("x", "y").category(), "SSH");
        assert_eq!(SshqError::tunnel("db:3306", "x").category(), "Tunnel");
        assert_eq!(SshqError::coercion("c", "long").category(), "Coercion");
        assert_eq!(SshqError::render("x").category(), "Render");
    }

    #[test]
    fn test_ssh_hint_falls_back_to_default() {
        let io = std::io::Error::new(std::io::ErrorKind::ConnectionRefused, "refused");
        let plain = SshqError::ssh_with_source("refused", io);
        assert_eq!(plain.hint(), Some("Verify the SSH server is running and reachable"));

        let custom = SshqError::ssh_with_hint("unknown key", "add it");
        assert_eq!(custom.hint(), Some("add it"));
    }

    #[test]
    fn test_coercion_message_names_column_and_type() {
        let err = SshqError::coercion("created_at", "datetime");
        assert_eq!(
            err.to_string(),
            "Coercion error: column 'created_at' has unsupported type datetime"
        );
    }

    #[test]
    fn test_server_syntax_error_is_query_error_with_details() {
        let err = SshqError::from_server_error(
            1064,
            "You have an error in your SQL syntax".to_string(),
            "42000".to_string(),
        );
        assert_eq!(err.category(), "Query");

        let info = err.to_error_info();
        assert_eq!(info.message, "Query error: You have an error in your SQL syntax");
        let detail = info.technical_detail.unwrap();
        assert!(detail.contains("Code: 1064"));
        assert!(detail.contains("SQLSTATE: 42000"));
    }

    #[test]
    fn test_server_access_denied_is_authentication_error() {
        let err = SshqError::from_server_error(
            1045,
            "Access denied for user 'app'@'10.0.0.1'".to_string(),
            "28000".to_string(),
        );
        assert_eq!(err.category(), "Authentication");
        assert!(err.hint().unwrap().contains("--db-password"));
    }

    #[test]
    fn test_server_unknown_database_is_connection_error() {
        let err = SshqError::from_server_error(
            1049,
            "Unknown database 'nope'".to_string(),
            "42000".to_string(),
        );
        assert_eq!(err.category(), "Connection");
        assert!(err.to_string().contains("--db-name"));
    }

    #[test]
    fn test_tunnel_error_info_names_target() {
        let info = SshqError::tunnel("10.0.0.5:3306", "connect failed").to_error_info();
        assert_eq!(info.technical_detail.as_deref(), Some("Target: 10.0.0.5:3306"));
    }

    #[test]
    fn test_unknown_host_key_maps_to_ssh_error() {
        let err = SshqError::from(russh::Error::UnknownKey);
        assert_eq!(err.category(), "SSH");
        assert!(err.hint().unwrap().contains("--insecure-skip-host-verify"));
    }

    #[test]
    fn test_io_error_maps_to_render() {
        let err = SshqError::from(std::io::Error::new(std::io::ErrorKind::BrokenPipe, "closed"));
        assert_eq!(err.category(), "Render");
    }
}
