//! Connection parameter models.
//!
//! Everything here is built once at startup from the command line and is
//! read-only afterwards.

use crate::error::{SshqError, SshqResult};
use std::fmt;
use std::path::PathBuf;

/// Default SSH port.
pub const DEFAULT_SSH_PORT: u16 = 22;

/// Default database endpoint, as seen from the jump host.
pub const DEFAULT_DB_HOST: &str = "127.0.0.1:3306";

/// How the jump host's identity is checked during the SSH handshake.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum HostKeyPolicy {
    /// Require the key to be present in `~/.ssh/known_hosts`.
    #[default]
    KnownHosts,
    /// Accept any host key. Only for trusted or ephemeral jump hosts.
    AcceptAny,
}

impl HostKeyPolicy {
    /// Convert to string representation for logging.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::KnownHosts => "known-hosts",
            Self::AcceptAny => "accept-any",
        }
    }
}

/// How the query is sent and how values come back.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum QueryMode {
    /// Text protocol (`COM_QUERY`); every value arrives as bytes.
    #[default]
    Text,
    /// Binary protocol (prepared statement); numeric and temporal columns
    /// arrive typed and cannot be rendered.
    Typed,
}

impl QueryMode {
    /// Convert to string representation.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Text => "text",
            Self::Typed => "typed",
        }
    }
}

/// SSH jump host settings.
#[derive(Clone)]
pub struct SshParams {
    /// SSH server hostname or IP
    pub host: String,
    /// SSH server port (default 22)
    pub port: u16,
    /// SSH username
    pub username: String,
    /// Password fallback; empty means "not supplied"
    pub password: String,
    /// Optional private key file
    pub key_path: Option<PathBuf>,
    /// Passphrase for the private key file
    pub key_passphrase: Option<String>,
    /// Host key verification policy
    pub host_key_policy: HostKeyPolicy,
}

impl SshParams {
    /// Create SSH settings with the default port and no credentials.
    pub fn new(host: impl Into<String>, username: impl Into<String>) -> Self {
        Self {
            host: host.into(),
            port: DEFAULT_SSH_PORT,
            username: username.into(),
            password: String::new(),
            key_path: None,
            key_passphrase: None,
            host_key_policy: HostKeyPolicy::default(),
        }
    }

    /// Set the port.
    pub fn with_port(mut self, port: u16) -> Self {
        self.port = port;
        self
    }

    /// Set the password fallback.
    pub fn with_password(mut self, password: impl Into<String>) -> Self {
        self.password = password.into();
        self
    }

    /// Set a private key file and its optional passphrase.
    pub fn with_key(mut self, path: impl Into<PathBuf>, passphrase: Option<String>) -> Self {
        self.key_path = Some(path.into());
        self.key_passphrase = passphrase;
        self
    }

    /// Set the host key policy.
    pub fn with_host_key_policy(mut self, policy: HostKeyPolicy) -> Self {
        self.host_key_policy = policy;
        self
    }

    /// Whether a password was supplied.
    pub fn has_password(&self) -> bool {
        !self.password.is_empty()
    }

    /// `host:port` of the jump host.
    pub fn address(&self) -> String {
        join_host_port(&self.host, self.port)
    }
}

impl fmt::Debug for SshParams {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SshParams")
            .field("host", &self.host)
            .field("port", &self.port)
            .field("username", &self.username)
            .field("has_password", &self.has_password())
            .field("key_path", &self.key_path)
            .field("host_key_policy", &self.host_key_policy)
            .finish()
    }
}

/// Database endpoint and credentials.
#[derive(Clone)]
pub struct DatabaseParams {
    /// `host:port` of the database, resolved from the jump host
    pub address: String,
    /// Login username
    pub username: String,
    /// Login password
    pub password: String,
    /// Database name
    pub database: String,
}

impl DatabaseParams {
    /// Create database settings with empty credentials.
    pub fn new(address: impl Into<String>) -> Self {
        Self {
            address: address.into(),
            username: String::new(),
            password: String::new(),
            database: String::new(),
        }
    }

    /// Set the login credentials.
    pub fn with_credentials(
        mut self,
        username: impl Into<String>,
        password: impl Into<String>,
    ) -> Self {
        self.username = username.into();
        self.password = password.into();
        self
    }

    /// Set the database name.
    pub fn with_database(mut self, database: impl Into<String>) -> Self {
        self.database = database.into();
        self
    }

    /// Split the address into host and port.
    pub fn host_port(&self) -> SshqResult<(String, u16)> {
        split_host_port(&self.address)
    }

    /// Get the display connection string (without password).
    pub fn display_url(&self) -> String {
        format!("mysql://{}@{}/{}", self.username, self.address, self.database)
    }
}

impl Default for DatabaseParams {
    fn default() -> Self {
        Self::new(DEFAULT_DB_HOST)
    }
}

impl fmt::Debug for DatabaseParams {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DatabaseParams")
            .field("address", &self.address)
            .field("username", &self.username)
            .field("database", &self.database)
            .finish_non_exhaustive()
    }
}

/// Everything one run needs: where to jump, where to connect, what to ask.
#[derive(Debug, Clone)]
pub struct ConnectionParams {
    /// Jump host settings
    pub ssh: SshParams,
    /// Database settings
    pub database: DatabaseParams,
    /// The single query to execute
    pub query: String,
    /// Protocol used for the query
    pub query_mode: QueryMode,
}

impl ConnectionParams {
    /// Bundle the parameters for one run.
    pub fn new(ssh: SshParams, database: DatabaseParams, query: impl Into<String>) -> Self {
        Self { ssh, database, query: query.into(), query_mode: QueryMode::default() }
    }

    /// Set the query mode.
    pub fn with_query_mode(mut self, mode: QueryMode) -> Self {
        self.query_mode = mode;
        self
    }

    /// Validate the parameters before any network activity.
    pub fn validate(&self) -> SshqResult<()> {
        if self.ssh.host.trim().is_empty() {
            return Err(SshqError::config("SSH host is required (--ssh-host)"));
        }
        if self.ssh.port == 0 {
            return Err(SshqError::config("SSH port must be between 1 and 65535"));
        }
        if self.ssh.username.is_empty() {
            return Err(SshqError::config("SSH username is required (--ssh-user)"));
        }
        if self.ssh.key_passphrase.is_some() && self.ssh.key_path.is_none() {
            return Err(SshqError::config("--ssh-key-passphrase requires --ssh-key"));
        }
        self.database.host_port()?;
        if self.query.trim().is_empty() {
            return Err(SshqError::config("Query text is required (--db-query)"));
        }
        Ok(())
    }
}

/// Split `host:port` or `[v6]:port` into its parts.
pub fn split_host_port(address: &str) -> SshqResult<(String, u16)> {
    let invalid = || SshqError::config(format!("Invalid address '{address}', expected host:port"));

    let (host, port) = if let Some(rest) = address.strip_prefix('[') {
        let (host, rest) = rest.split_once(']').ok_or_else(invalid)?;
        (host, rest.strip_prefix(':').ok_or_else(invalid)?)
    } else {
        let (host, port) = address.rsplit_once(':').ok_or_else(invalid)?;
        if host.contains(':') {
            return Err(invalid());
        }
        (host, port)
    };

    if host.is_empty() {
        return Err(invalid());
    }
    let port: u16 = port.parse().map_err(|_| invalid())?;
    if port == 0 {
        return Err(invalid());
    }
    Ok((host.to_string(), port))
}

/// Join a host and port, bracketing IPv6 literals.
pub fn join_host_port(host: &str, port: u16) -> String {
    if host.contains(':') {
        format!("[{host}]:{port}")
    } else {
        format!("{host}:{port}")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn params() -> ConnectionParams {
        ConnectionParams::new(
            SshParams::new("jump.example", "alice"),
            DatabaseParams::default().with_database("test"),
            "SELECT 1 AS x",
        )
    }

    #[test]
    fn test_defaults() {
        let p = params();
        assert_eq!(p.ssh.port, 22);
        assert_eq!(p.database.address, "127.0.0.1:3306");
        assert_eq!(p.ssh.host_key_policy, HostKeyPolicy::KnownHosts);
        assert_eq!(p.query_mode, QueryMode::Text);
        assert!(!p.ssh.has_password());
        assert!(p.validate().is_ok());
    }

    #[test]
    fn test_validate_requires_ssh_host_user_and_query() {
        let mut p = params();
        p.ssh.host = String::new();
        assert!(matches!(p.validate(), Err(SshqError::Config { .. })));

        let mut p = params();
        p.ssh.username = String::new();
        assert!(p.validate().is_err());

        let mut p = params();
        p.query = "   ".to_string();
        assert!(p.validate().is_err());
    }

    #[test]
    fn test_validate_rejects_bad_db_address() {
        let mut p = params();
        p.database.address = "db.internal".to_string();
        assert!(p.validate().is_err());
    }

    #[test]
    fn test_validate_rejects_passphrase_without_key() {
        let mut p = params();
        p.ssh.key_passphrase = Some("secret".to_string());
        assert!(p.validate().is_err());

        p.ssh = p.ssh.with_key("/home/alice/.ssh/id_ed25519", Some("secret".to_string()));
        assert!(p.validate().is_ok());
    }

    #[test]
    fn test_split_host_port() {
        assert_eq!(split_host_port("127.0.0.1:3306").unwrap(), ("127.0.0.1".to_string(), 3306));
        assert_eq!(split_host_port("db.internal:3307").unwrap(), ("db.internal".to_string(), 3307));
        assert_eq!(split_host_port("[::1]:3306").unwrap(), ("::1".to_string(), 3306));
    }

    #[test]
    fn test_split_host_port_rejects_malformed() {
        for bad in ["", "db", ":3306", "db:", "db:notaport", "db:0", "db:70000", "::1:3306", "[::1]"]
        {
            assert!(split_host_port(bad).is_err(), "{bad} should be rejected");
        }
    }

    #[test]
    fn test_join_host_port() {
        assert_eq!(join_host_port("jump.example", 22), "jump.example:22");
        assert_eq!(join_host_port("fe80::1", 2222), "[fe80::1]:2222");
    }

    #[test]
    fn test_debug_hides_secrets() {
        let ssh = SshParams::new("jump", "alice").with_password("hunter2");
        let db = DatabaseParams::default().with_credentials("app", "s3cret");
        let rendered = format!("{ssh:?} {db:?}");
        assert!(!rendered.contains("hunter2"));
        assert!(!rendered.contains("s3cret"));
    }

    #[test]
    fn test_display_url_omits_password() {
        let db = DatabaseParams::new("10.0.0.5:3306")
            .with_credentials("app", "s3cret")
            .with_database("orders");
        assert_eq!(db.display_url(), "mysql://app@10.0.0.5:3306/orders");
    }
}
