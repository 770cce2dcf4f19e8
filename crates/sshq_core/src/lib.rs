//! Core types and services for sshq.
//!
//! sshq runs one MySQL query through an SSH jump host and prints the
//! result as an aligned table:
//!
//! - **error**: Error taxonomy with hints
//! - **models**: Connection parameters, query summary, raw column values
//! - **services**: SSH session, tunneled dialer, database connection, query execution
//! - **render**: Column-aligned table writer
//! - **logging**: Structured logging setup

pub mod error;
pub mod logging;
pub mod models;
pub mod render;
pub mod services;

pub use error::{SshqError, SshqResult};
pub use models::{
    ColumnInfo, ConnectionParams, DatabaseParams, HostKeyPolicy, QueryMode, QuerySummary,
    RawValue, SshParams,
};
pub use render::TableWriter;
pub use services::{DatabaseConnection, Dialer, QueryService, SshDialer, SshSession};
