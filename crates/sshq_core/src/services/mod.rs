//! Backend services for sshq.
//!
//! - `ssh` - Jump host session and authentication
//! - `dialer` - Dialer seam and the SSH-backed dialer
//! - `forward` - Loopback listener that pipes sockets through a dialer
//! - `connection` - MySQL connection over a dialed stream
//! - `query` - Query execution and value coercion

pub mod connection;
pub mod dialer;
pub mod forward;
pub mod query;
pub mod ssh;

pub use connection::DatabaseConnection;
pub use dialer::{Dialer, SshDialer, TunnelStream};
pub use forward::LocalForward;
pub use query::{QueryService, ResultSet};
pub use ssh::{AuthMethod, SshSession};
