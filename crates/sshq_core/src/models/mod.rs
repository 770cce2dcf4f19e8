//! Data models for sshq.
//!
//! - `connection` - ConnectionParams, SshParams, DatabaseParams, HostKeyPolicy, QueryMode
//! - `query` - ColumnInfo, QuerySummary
//! - `value` - RawValue and its coercion to display text

pub mod connection;
pub mod query;
pub mod value;

pub use connection::{
    ConnectionParams, DatabaseParams, HostKeyPolicy, QueryMode, SshParams, DEFAULT_DB_HOST,
    DEFAULT_SSH_PORT,
};
pub use query::{ColumnInfo, QuerySummary};
pub use value::RawValue;
