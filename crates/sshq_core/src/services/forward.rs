//! Local port forwarding over a [`Dialer`].
//!
//! The MySQL client only connects to TCP addresses, so the dialer is exposed
//! as a loopback listener: every accepted socket is piped into a fresh
//! `dialer.dial(target)` stream until the forward is stopped.

use crate::error::{SshqError, SshqResult};
use crate::services::dialer::Dialer;
use parking_lot::Mutex;
use std::net::{Ipv4Addr, SocketAddr};
use std::sync::Arc;
use tokio::net::{TcpListener, TcpStream};
use tokio::task::{JoinHandle, JoinSet};
use tokio_util::sync::CancellationToken;

/// First dial failure seen by the forward, kept for the caller.
type DialErrorSlot = Arc<Mutex<Option<SshqError>>>;

/// A running loopback forward to one target address.
///
/// Dropping the forward cancels it; [`LocalForward::stop`] also waits for the
/// accept loop and every open pipe to finish.
pub struct LocalForward {
    local_addr: SocketAddr,
    target: String,
    cancel_token: CancellationToken,
    task: Option<JoinHandle<()>>,
    dial_error: DialErrorSlot,
}

impl LocalForward {
    /// Bind `127.0.0.1` on an ephemeral port and start forwarding to `target`.
    pub async fn start(dialer: Arc<dyn Dialer>, target: impl Into<String>) -> SshqResult<Self> {
        let target = target.into();

        let listener = TcpListener::bind((Ipv4Addr::LOCALHOST, 0)).await.map_err(|e| {
            SshqError::tunnel_with_source(
                &target,
                format!("Failed to bind local port for forwarding: {e}"),
                e,
            )
        })?;
        let local_addr = listener.local_addr().map_err(|e| {
            SshqError::tunnel_with_source(&target, "Failed to read forwarding address", e)
        })?;

        let cancel_token = CancellationToken::new();
        let dial_error = DialErrorSlot::default();

        let task = tokio::spawn(run_forward(
            listener,
            dialer,
            target.clone(),
            cancel_token.clone(),
            Arc::clone(&dial_error),
        ));

        tracing::debug!(%local_addr, remote = %target, "Local forward listening");
        Ok(Self { local_addr, target, cancel_token, task: Some(task), dial_error })
    }

    /// Loopback address clients connect to.
    pub fn local_addr(&self) -> SocketAddr {
        self.local_addr
    }

    /// Take the first dial failure, if any pipe failed to reach the target.
    pub fn take_dial_error(&self) -> Option<SshqError> {
        self.dial_error.lock().take()
    }

    /// Stop accepting, close every pipe and wait for the forwarding task.
    pub async fn stop(mut self) -> SshqResult<()> {
        self.cancel_token.cancel();
        if let Some(task) = self.task.take() {
            task.await
                .map_err(|e| SshqError::release_with_source("Local forward task failed", e))?;
        }
        tracing::debug!(
            local_addr = %self.local_addr,
            remote = %self.target,
            "Local forward stopped"
        );
        Ok(())
    }
}

impl Drop for LocalForward {
    fn drop(&mut self) {
        self.cancel_token.cancel();
    }
}

/// Accept loop. Pipes run in a `JoinSet` so they are torn down with the loop.
async fn run_forward(
    listener: TcpListener,
    dialer: Arc<dyn Dialer>,
    target: String,
    cancel_token: CancellationToken,
    dial_error: DialErrorSlot,
) {
    let mut pipes = JoinSet::new();

    loop {
        tokio::select! {
            accepted = listener.accept() => match accepted {
                Ok((local_stream, peer)) => {
                    tracing::debug!(%peer, remote = %target, "Forwarding local connection");
                    pipes.spawn(forward_connection(
                        local_stream,
                        Arc::clone(&dialer),
                        target.clone(),
                        cancel_token.clone(),
                        Arc::clone(&dial_error),
                    ));
                }
                Err(e) => tracing::warn!(error = %e, "Failed to accept forwarded connection"),
            },
            Some(_) = pipes.join_next(), if !pipes.is_empty() => {}
            _ = cancel_token.cancelled() => break,
        }
    }

    pipes.shutdown().await;
}

/// Pipe one accepted socket through a freshly dialed stream.
async fn forward_connection(
    mut local_stream: TcpStream,
    dialer: Arc<dyn Dialer>,
    target: String,
    cancel_token: CancellationToken,
    dial_error: DialErrorSlot,
) {
    let mut remote = match dialer.dial(&target).await {
        Ok(remote) => remote,
        Err(e) => {
            tracing::warn!(error = %e, remote = %target, "Tunnel dial failed");
            let mut slot = dial_error.lock();
            if slot.is_none() {
                *slot = Some(e);
            }
            return;
        }
    };

    tokio::select! {
        copied = tokio::io::copy_bidirectional(&mut local_stream, &mut remote) => match copied {
            Ok((sent, received)) => {
                tracing::debug!(remote = %target, sent, received, "Forwarded connection closed");
            }
            Err(e) => tracing::debug!(error = %e, "Forwarded connection ended with error"),
        },
        _ = cancel_token.cancelled() => {}
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::SshqResult;
    use crate::services::dialer::TunnelStream;
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use tokio::io::{duplex, AsyncReadExt, AsyncWriteExt};

    /// Answers every dial with an in-memory echo server.
    #[derive(Default)]
    struct EchoDialer {
        dialed: Mutex<Vec<String>>,
    }

    #[async_trait]
    impl Dialer for EchoDialer {
        async fn dial(&self, address: &str) -> SshqResult<TunnelStream> {
            self.dialed.lock().push(address.to_string());
            let (client, server) = duplex(1024);
            tokio::spawn(async move {
                let (mut reader, mut writer) = tokio::io::split(server);
                let _ = tokio::io::copy(&mut reader, &mut writer).await;
            });
            Ok(Box::pin(client))
        }
    }

    /// Fails every dial the way an unreachable target does.
    #[derive(Default)]
    struct RefusingDialer {
        attempts: AtomicUsize,
    }

    #[async_trait]
    impl Dialer for RefusingDialer {
        async fn dial(&self, address: &str) -> SshqResult<TunnelStream> {
            self.attempts.fetch_add(1, Ordering::SeqCst);
            Err(SshqError::tunnel(address, "connect failed: no route to host"))
        }
    }

    #[tokio::test]
    async fn test_accepted_socket_is_piped_through_dialer() {
        let dialer = Arc::new(EchoDialer::default());
        let forward = LocalForward::start(dialer.clone(), "db.internal:3306").await.unwrap();
        assert!(forward.local_addr().ip().is_loopback());

        let mut client = TcpStream::connect(forward.local_addr()).await.unwrap();
        client.write_all(b"\x0a5.7.0-greeting").await.unwrap();
        let mut buf = [0u8; 15];
        client.read_exact(&mut buf).await.unwrap();
        assert_eq!(&buf, b"\x0a5.7.0-greeting");

        assert_eq!(*dialer.dialed.lock(), vec!["db.internal:3306".to_string()]);
        assert!(forward.take_dial_error().is_none());
        forward.stop().await.unwrap();
    }

    #[tokio::test]
    async fn test_each_connection_gets_its_own_dial() {
        let dialer = Arc::new(EchoDialer::default());
        let forward = LocalForward::start(dialer.clone(), "db:3306").await.unwrap();

        let mut first = TcpStream::connect(forward.local_addr()).await.unwrap();
        let mut second = TcpStream::connect(forward.local_addr()).await.unwrap();
        second.write_all(b"two").await.unwrap();
        first.write_all(b"one").await.unwrap();

        let mut buf = [0u8; 3];
        first.read_exact(&mut buf).await.unwrap();
        assert_eq!(&buf, b"one");
        second.read_exact(&mut buf).await.unwrap();
        assert_eq!(&buf, b"two");

        assert_eq!(dialer.dialed.lock().len(), 2);
        forward.stop().await.unwrap();
    }

    #[tokio::test]
    async fn test_dial_failure_closes_socket_and_is_kept() {
        let dialer = Arc::new(RefusingDialer::default());
        let forward = LocalForward::start(dialer.clone(), "10.9.9.9:3306").await.unwrap();

        let mut client = TcpStream::connect(forward.local_addr()).await.unwrap();
        let mut buf = [0u8; 1];
        let read = client.read(&mut buf).await.unwrap_or(0);
        assert_eq!(read, 0);

        let err = forward.take_dial_error().unwrap();
        match err {
            SshqError::Tunnel { address, .. } => assert_eq!(address, "10.9.9.9:3306"),
            other => panic!("expected tunnel error, got {other:?}"),
        }
        assert!(forward.take_dial_error().is_none());
        assert_eq!(dialer.attempts.load(Ordering::SeqCst), 1);
        forward.stop().await.unwrap();
    }

    #[tokio::test]
    async fn test_stop_closes_listener() {
        let forward = LocalForward::start(Arc::new(EchoDialer::default()), "db:3306").await.unwrap();
        let addr = forward.local_addr();
        forward.stop().await.unwrap();

        assert!(TcpStream::connect(addr).await.is_err());
    }
}
