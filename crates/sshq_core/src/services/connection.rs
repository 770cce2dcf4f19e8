//! MySQL connection over an injected dialer.

use crate::error::{SshqError, SshqResult};
use crate::models::DatabaseParams;
use crate::services::dialer::Dialer;
use crate::services::forward::LocalForward;
use mysql_async::{Conn, Opts, OptsBuilder};
use std::net::SocketAddr;
use std::sync::Arc;

/// An open MySQL connection whose bytes travel through a dialer.
///
/// The client talks to a loopback [`LocalForward`]; the forward pipes the
/// socket into `dialer.dial(address)`.
pub struct DatabaseConnection {
    conn: Conn,
    forward: LocalForward,
    address: String,
}

impl DatabaseConnection {
    /// Dial `params.address` through `dialer` and run the MySQL handshake over it.
    pub async fn connect(dialer: Arc<dyn Dialer>, params: &DatabaseParams) -> SshqResult<Self> {
        params.host_port()?;

        tracing::debug!(url = %params.display_url(), "Connecting to database through tunnel");
        let forward = LocalForward::start(dialer, &params.address).await?;
        let opts = Self::mysql_opts(params, forward.local_addr());

        let conn = match Conn::new(opts).await {
            Ok(conn) => conn,
            Err(e) => {
                // A failed dial surfaces in the client as a bare EOF; report the dial instead.
                let err = forward
                    .take_dial_error()
                    .unwrap_or_else(|| connect_error(&params.address, e));
                if let Err(stop_err) = forward.stop().await {
                    tracing::debug!(error = %stop_err, "Ignoring forward shutdown failure");
                }
                return Err(err);
            }
        };

        tracing::info!(
            address = %params.address,
            database = %params.database,
            "Successfully connected to the database"
        );
        Ok(Self { conn, forward, address: params.address.clone() })
    }

    /// Client options pointing at the local forward.
    ///
    /// Socket preference is off: the forward is a loopback address, and the
    /// client would otherwise try the server's unix socket on this machine.
    pub fn mysql_opts(params: &DatabaseParams, local_addr: SocketAddr) -> Opts {
        let non_empty = |s: &str| (!s.is_empty()).then(|| s.to_string());

        OptsBuilder::default()
            .ip_or_hostname(local_addr.ip().to_string())
            .tcp_port(local_addr.port())
            .prefer_socket(false)
            .user(non_empty(&params.username))
            .pass(non_empty(&params.password))
            .db_name(non_empty(&params.database))
            .into()
    }

    /// The connected client.
    pub fn conn_mut(&mut self) -> &mut Conn {
        &mut self.conn
    }

    /// Send `COM_QUIT`, then stop the forward.
    pub async fn close(self) -> SshqResult<()> {
        let Self { conn, forward, address } = self;

        let disconnected = conn.disconnect().await.map_err(|e| {
            SshqError::release_with_source("Error when closing database connection", e)
        });
        let stopped = forward.stop().await;
        disconnected?;
        stopped?;

        tracing::debug!(address = %address, "Database connection closed");
        Ok(())
    }
}

/// Attach the database address to a client-side connect failure.
fn connect_error(address: &str, err: mysql_async::Error) -> SshqError {
    match SshqError::from(err) {
        SshqError::Connection { message, source } => SshqError::Connection {
            message: format!("Failed to connect to database at '{address}': {message}"),
            source,
        },
        other => other,
    }
}
