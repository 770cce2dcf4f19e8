//! Tunneled dialer.
//!
//! A [`Dialer`] turns an address into a bytestream. [`SshDialer`] does it by
//! opening a `direct-tcpip` channel over the jump host session, so the
//! connection originates from the jump host's side of the network.

use crate::error::{SshqError, SshqResult};
use crate::models::connection::split_host_port;
use crate::services::ssh::{open_direct_tcpip, SharedHandle};
use async_trait::async_trait;
use std::fmt;
use std::pin::Pin;
use tokio::io::{AsyncRead, AsyncWrite};

/// Any bidirectional byte stream a database client can run over.
pub trait AsyncStream: AsyncRead + AsyncWrite + Send {}

impl<T: AsyncRead + AsyncWrite + Send + ?Sized> AsyncStream for T {}

/// A dialed connection.
pub type TunnelStream = Pin<Box<dyn AsyncStream>>;

/// Opens bytestreams to `host:port` addresses.
#[async_trait]
pub trait Dialer: Send + Sync {
    /// Connect to `address`.
    async fn dial(&self, address: &str) -> SshqResult<TunnelStream>;
}

/// Dials through an SSH session.
///
/// Every dial fails once the session it came from has been closed.
#[derive(Clone)]
pub struct SshDialer {
    handle: SharedHandle,
    jump: String,
}

impl SshDialer {
    pub(crate) fn new(handle: SharedHandle, jump: String) -> Self {
        Self { handle, jump }
    }
}

impl fmt::Debug for SshDialer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SshDialer").field("jump", &self.jump).finish_non_exhaustive()
    }
}

#[async_trait]
impl Dialer for SshDialer {
    async fn dial(&self, address: &str) -> SshqResult<TunnelStream> {
        let (host, port) = split_host_port(address)
            .map_err(|_| SshqError::tunnel(address, "Address must be host:port"))?;

        let channel = open_direct_tcpip(&self.handle, &self.jump, &host, port).await?;
        tracing::debug!(address, jump = %self.jump, "Tunnel channel open");

        Ok(Box::pin(channel.into_stream()))
    }
}
