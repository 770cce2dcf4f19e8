//! SSH session to the jump host.
//!
//! Authentication tries every available method in a fixed order and stops at
//! the first one the server accepts: agent identities, then a private key
//! file, then the password.

use crate::error::{SshqError, SshqResult};
use crate::models::connection::join_host_port;
use crate::models::{HostKeyPolicy, SshParams};
use crate::services::dialer::SshDialer;
use async_trait::async_trait;
use russh::client;
use russh::{Channel, Disconnect};
use russh_keys::key::{KeyPair, PublicKey};
use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::sync::Mutex;

/// Environment variable naming the agent socket.
pub const AGENT_SOCKET_ENV: &str = "SSH_AUTH_SOCK";

/// SSH client handler for russh.
pub struct ClientHandler {
    host: String,
    port: u16,
    policy: HostKeyPolicy,
}

impl ClientHandler {
    /// Create a handler that checks the server key with `policy`.
    pub fn new(host: impl Into<String>, port: u16, policy: HostKeyPolicy) -> Self {
        Self { host: host.into(), port, policy }
    }
}

#[async_trait]
impl client::Handler for ClientHandler {
    type Error = russh::Error;

    async fn check_server_key(
        &mut self,
        server_public_key: &PublicKey,
    ) -> Result<bool, Self::Error> {
        match self.policy {
            HostKeyPolicy::AcceptAny => {
                tracing::warn!(
                    host = %self.host,
                    port = self.port,
                    key_type = server_public_key.name(),
                    "Accepting SSH host key without verification"
                );
                Ok(true)
            }
            HostKeyPolicy::KnownHosts => {
                let known =
                    russh_keys::check_known_hosts(&self.host, self.port, server_public_key)?;
                if known {
                    tracing::debug!(host = %self.host, "SSH host key found in known_hosts");
                } else {
                    tracing::warn!(
                        host = %self.host,
                        port = self.port,
                        key_type = server_public_key.name(),
                        "SSH host key not found in known_hosts"
                    );
                }
                Ok(known)
            }
        }
    }
}

/// One way of proving identity to the jump host.
#[derive(Clone, PartialEq, Eq)]
pub enum AuthMethod {
    /// Identities offered by a running key agent.
    Agent {
        /// Agent socket path
        socket: PathBuf,
    },
    /// A private key file on disk.
    KeyFile {
        /// Key file path
        path: PathBuf,
        /// Optional passphrase
        passphrase: Option<String>,
    },
    /// A plain password.
    Password(String),
}

impl AuthMethod {
    /// Short name used in logs and errors.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Agent { .. } => "agent",
            Self::KeyFile { .. } => "key",
            Self::Password(_) => "password",
        }
    }
}

impl fmt::Debug for AuthMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Agent { socket } => f.debug_struct("Agent").field("socket", socket).finish(),
            Self::KeyFile { path, passphrase } => f
                .debug_struct("KeyFile")
                .field("path", path)
                .field("has_passphrase", &passphrase.is_some())
                .finish(),
            Self::Password(_) => f.write_str("Password(..)"),
        }
    }
}

/// Agent socket from the environment, if one is advertised.
pub fn agent_socket_from_env() -> Option<PathBuf> {
    std::env::var_os(AGENT_SOCKET_ENV).filter(|s| !s.is_empty()).map(PathBuf::from)
}

/// Build the ordered list of methods to try.
pub fn auth_methods(params: &SshParams, agent_socket: Option<PathBuf>) -> Vec<AuthMethod> {
    let mut methods = Vec::with_capacity(3);
    if let Some(socket) = agent_socket {
        methods.push(AuthMethod::Agent { socket });
    }
    if let Some(path) = &params.key_path {
        methods.push(AuthMethod::KeyFile {
            path: path.clone(),
            passphrase: params.key_passphrase.clone(),
        });
    }
    if params.has_password() {
        methods.push(AuthMethod::Password(params.password.clone()));
    }
    methods
}

/// Something that can attempt SSH user authentication.
///
/// Each method returns `Ok(false)` when the server rejects the credential.
#[async_trait]
pub trait AuthTarget: Send {
    /// Offer every identity held by the agent at `socket`.
    async fn try_agent(&mut self, username: &str, socket: &Path) -> SshqResult<bool>;

    /// Offer a private key loaded from `path`.
    async fn try_key_file(
        &mut self,
        username: &str,
        path: &Path,
        passphrase: Option<&str>,
    ) -> SshqResult<bool>;

    /// Offer a password.
    async fn try_password(&mut self, username: &str, password: &str) -> SshqResult<bool>;
}

/// Try `methods` in order and return the kind of the first accepted one.
///
/// An agent that cannot be reached is skipped; key and password failures
/// other than a plain rejection are fatal.
pub async fn authenticate<T: AuthTarget + ?Sized>(
    target: &mut T,
    username: &str,
    methods: &[AuthMethod],
) -> SshqResult<&'static str> {
    if methods.is_empty() {
        return Err(SshqError::authentication_with_hint(
            "No SSH authentication method available",
            "Start an SSH agent, pass --ssh-key, or pass --ssh-password",
        ));
    }

    for method in methods {
        tracing::debug!(method = method.kind(), username, "Trying SSH authentication method");

        let accepted = match method {
            AuthMethod::Agent { socket } => match target.try_agent(username, socket).await {
                Ok(accepted) => accepted,
                Err(e) => {
                    tracing::debug!(error = %e, "SSH agent unusable, trying next method");
                    false
                }
            },
            AuthMethod::KeyFile { path, passphrase } => {
                target.try_key_file(username, path, passphrase.as_deref()).await?
            }
            AuthMethod::Password(password) => target.try_password(username, password).await?,
        };

        if accepted {
            return Ok(method.kind());
        }
        tracing::debug!(method = method.kind(), "SSH authentication method rejected");
    }

    let tried: Vec<&str> = methods.iter().map(AuthMethod::kind).collect();
    Err(SshqError::authentication_with_hint(
        format!("SSH authentication failed for user '{username}' (tried: {})", tried.join(", ")),
        "Check your SSH username, key and password",
    ))
}

#[async_trait]
impl AuthTarget for client::Handle<ClientHandler> {
    #[cfg(unix)]
    async fn try_agent(&mut self, username: &str, socket: &Path) -> SshqResult<bool> {
        use russh_keys::agent::client::AgentClient;
        use tokio::net::UnixStream;

        let stream = UnixStream::connect(socket).await.map_err(|e| {
            SshqError::authentication_with_hint(
                format!("Failed to connect to SSH agent: {e}"),
                "Ensure your SSH agent is running",
            )
        })?;

        let mut agent = AgentClient::connect(stream);
        let identities = agent.request_identities().await.map_err(|e| {
            SshqError::authentication_with_hint(
                format!("Failed to get identities from SSH agent: {e}"),
                "Ensure your SSH agent has keys loaded",
            )
        })?;

        tracing::debug!(count = identities.len(), "Found identities in SSH agent");

        for identity in identities {
            tracing::debug!(key_type = identity.name(), "Trying SSH agent identity");

            let (returned_agent, auth_result) =
                self.authenticate_future(username, identity, agent).await;
            agent = returned_agent;

            match auth_result {
                Ok(true) => return Ok(true),
                Ok(false) => tracing::debug!("SSH agent key rejected, trying next"),
                Err(e) => tracing::debug!(error = %e, "SSH agent auth error, trying next"),
            }
        }

        Ok(false)
    }

    #[cfg(not(unix))]
    async fn try_agent(&mut self, _username: &str, socket: &Path) -> SshqResult<bool> {
        tracing::debug!(socket = %socket.display(), "SSH agent sockets are only supported on unix");
        Ok(false)
    }

    async fn try_key_file(
        &mut self,
        username: &str,
        path: &Path,
        passphrase: Option<&str>,
    ) -> SshqResult<bool> {
        let key = load_private_key(path, passphrase).await?;

        self.authenticate_publickey(username, key).await.map_err(|e| {
            SshqError::authentication_with_hint(
                format!("SSH key authentication failed: {e}"),
                "Verify your SSH key is valid and authorized on the jump host",
            )
        })
    }

    async fn try_password(&mut self, username: &str, password: &str) -> SshqResult<bool> {
        self.authenticate_password(username, password).await.map_err(|e| {
            SshqError::authentication_with_hint(
                format!("SSH password authentication failed: {e}"),
                "Check your SSH username and password",
            )
        })
    }
}

/// Load a private key from a file.
pub async fn load_private_key(path: &Path, passphrase: Option<&str>) -> SshqResult<Arc<KeyPair>> {
    let key_data = tokio::fs::read(path).await.map_err(|e| {
        SshqError::authentication_with_hint(
            format!("Failed to read SSH key file {}: {e}", path.display()),
            "Check that the key file exists and is readable",
        )
    })?;

    let key = russh_keys::decode_secret_key(&String::from_utf8_lossy(&key_data), passphrase)
        .map_err(|e| {
            let hint = if passphrase.is_some() {
                "Check your key passphrase is correct"
            } else {
                "The key may be encrypted - provide --ssh-key-passphrase"
            };
            SshqError::authentication_with_hint(format!("Failed to decode SSH key: {e}"), hint)
        })?;

    Ok(Arc::new(key))
}

/// The jump host connection, shared between the session and its dialers.
///
/// `None` once the session has been closed.
pub(crate) type SharedHandle = Arc<Mutex<Option<client::Handle<ClientHandler>>>>;

/// An authenticated SSH transport to the jump host.
///
/// Channel opens are serialized through the mutex so the session can back any
/// number of dials.
pub struct SshSession {
    handle: SharedHandle,
    address: String,
    username: String,
}

impl SshSession {
    /// Dial the jump host, verify its key and authenticate.
    pub async fn connect(params: &SshParams) -> SshqResult<Self> {
        let address = params.address();
        tracing::info!(
            address = %address,
            username = %params.username,
            host_key_policy = params.host_key_policy.as_str(),
            "Connecting to SSH jump host"
        );

        if params.host_key_policy == HostKeyPolicy::AcceptAny {
            tracing::warn!("Host key verification is disabled (--insecure-skip-host-verify)");
        }

        let config = Arc::new(client::Config::default());
        let handler = ClientHandler::new(&params.host, params.port, params.host_key_policy);

        let mut handle = client::connect(config, (params.host.as_str(), params.port), handler)
            .await
            .map_err(|e| connect_error(&address, e))?;

        let methods = auth_methods(params, agent_socket_from_env());
        let method = authenticate(&mut handle, &params.username, &methods).await?;

        tracing::info!(
            address = %address,
            username = %params.username,
            method,
            "SSH authentication successful"
        );

        Ok(Self {
            handle: Arc::new(Mutex::new(Some(handle))),
            address,
            username: params.username.clone(),
        })
    }

    /// A dialer that opens channels through this session.
    pub fn dialer(&self) -> SshDialer {
        SshDialer::new(Arc::clone(&self.handle), self.address.clone())
    }

    /// Disconnect from the jump host. Dialers handed out earlier fail afterwards.
    pub async fn close(self) -> SshqResult<()> {
        let Some(handle) = self.handle.lock().await.take() else {
            return Ok(());
        };
        handle
            .disconnect(Disconnect::ByApplication, "", "en")
            .await
            .map_err(|e| SshqError::release_with_source("Failed to close SSH session", e))?;

        tracing::info!(address = %self.address, username = %self.username, "SSH session closed");
        Ok(())
    }
}

impl fmt::Debug for SshSession {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SshSession")
            .field("address", &self.address)
            .field("username", &self.username)
            .finish_non_exhaustive()
    }
}

/// Open a `direct-tcpip` channel to `host:port` as seen from the jump host.
pub(crate) async fn open_direct_tcpip(
    handle: &SharedHandle,
    jump: &str,
    host: &str,
    port: u16,
) -> SshqResult<Channel<client::Msg>> {
    let target = join_host_port(host, port);
    let guard = handle.lock().await;
    let Some(handle) = guard.as_ref() else {
        return Err(SshqError::tunnel(target, format!("SSH session to {jump} is already closed")));
    };

    tracing::debug!(jump, host, port, "Opening direct-tcpip channel");
    handle.channel_open_direct_tcpip(host, u32::from(port), "127.0.0.1", 0).await.map_err(|e| {
        SshqError::tunnel_with_source(
            target,
            format!("Jump host {jump} could not open a channel: {e}"),
            e,
        )
    })
}

/// Attach the jump host address to a handshake failure.
fn connect_error(address: &str, err: russh::Error) -> SshqError {
    match err {
        russh::Error::UnknownKey | russh::Error::Keys(_) => SshqError::from(err),
        other => SshqError::Ssh {
            message: format!("Failed to connect to SSH server {address}: {other}"),
            hint: Some("Verify the SSH server is running and reachable".to_string()),
            source: Some(Box::new(other)),
        },
    }
}
