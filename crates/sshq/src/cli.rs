//! Command-line flags.

use clap::{ArgAction, Parser, ValueEnum};
use sshq_core::models::{DEFAULT_DB_HOST, DEFAULT_SSH_PORT};
use sshq_core::{ConnectionParams, DatabaseParams, HostKeyPolicy, QueryMode, SshParams};
use std::path::PathBuf;

#[derive(Parser)]
#[command(
    name = "sshq",
    about = "Run one MySQL query through an SSH jump host and print the rows as a table",
    version
)]
pub struct Cli {
    /// SSH jump host name or IP
    #[arg(long, default_value = "")]
    pub ssh_host: String,

    /// SSH jump host port
    #[arg(long, default_value_t = DEFAULT_SSH_PORT)]
    pub ssh_port: u16,

    /// SSH username for the jump host
    #[arg(long, default_value = "")]
    pub ssh_user: String,

    /// SSH password for the jump host; leave empty to rely on the agent or a key
    #[arg(long, env = "SSHQ_SSH_PASSWORD", hide_env_values = true, default_value = "")]
    pub ssh_password: String,

    /// Private key file for the jump host, tried after agent identities
    #[arg(long)]
    pub ssh_key: Option<PathBuf>,

    /// Passphrase for --ssh-key
    #[arg(long, env = "SSHQ_SSH_KEY_PASSPHRASE", hide_env_values = true)]
    pub ssh_key_passphrase: Option<String>,

    /// Accept any SSH host key instead of checking ~/.ssh/known_hosts.
    ///
    /// Only for trusted or ephemeral jump hosts.
    #[arg(long)]
    pub insecure_skip_host_verify: bool,

    /// Database user name
    #[arg(long, default_value = "")]
    pub db_user: String,

    /// Database password
    #[arg(long, env = "SSHQ_DB_PASSWORD", hide_env_values = true, default_value = "")]
    pub db_password: String,

    /// Database host, including port, as reached from the jump host
    #[arg(long, default_value = DEFAULT_DB_HOST)]
    pub db_host: String,

    /// Database name
    #[arg(long, default_value = "")]
    pub db_name: String,

    /// Query to run
    #[arg(long, default_value = "")]
    pub db_query: String,

    /// Protocol used for the query
    #[arg(long, value_enum, default_value_t = QueryModeArg::Text)]
    pub db_query_mode: QueryModeArg,

    /// Increase log verbosity (-v, -vv, -vvv)
    #[arg(short, long, action = ArgAction::Count)]
    pub verbose: u8,
}

/// `--db-query-mode` values.
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum QueryModeArg {
    /// Text protocol; any column type renders
    Text,
    /// Binary protocol; only string and blob columns render
    Typed,
}

impl From<QueryModeArg> for QueryMode {
    fn from(arg: QueryModeArg) -> Self {
        match arg {
            QueryModeArg::Text => QueryMode::Text,
            QueryModeArg::Typed => QueryMode::Typed,
        }
    }
}

impl Cli {
    /// Build the immutable run configuration.
    pub fn to_params(&self) -> ConnectionParams {
        let policy = if self.insecure_skip_host_verify {
            HostKeyPolicy::AcceptAny
        } else {
            HostKeyPolicy::KnownHosts
        };

        let mut ssh = SshParams::new(&self.ssh_host, &self.ssh_user)
            .with_port(self.ssh_port)
            .with_password(&self.ssh_password)
            .with_host_key_policy(policy);
        if let Some(key) = &self.ssh_key {
            ssh = ssh.with_key(key, self.ssh_key_passphrase.clone());
        } else {
            ssh.key_passphrase = self.ssh_key_passphrase.clone();
        }

        let database = DatabaseParams::new(&self.db_host)
            .with_credentials(&self.db_user, &self.db_password)
            .with_database(&self.db_name);

        ConnectionParams::new(ssh, database, &self.db_query).with_query_mode(self.db_query_mode.into())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn test_cli_definition_is_valid() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_defaults() {
        let cli = Cli::try_parse_from(["sshq"]).unwrap();
        assert_eq!(cli.ssh_host, "");
        assert_eq!(cli.ssh_port, 22);
        assert_eq!(cli.db_host, "127.0.0.1:3306");
        assert_eq!(cli.db_query_mode, QueryModeArg::Text);
        assert!(!cli.insecure_skip_host_verify);
        assert_eq!(cli.verbose, 0);
    }

    #[test]
    fn test_scenario_flags_to_params() {
        let cli = Cli::try_parse_from([
            "sshq",
            "--ssh-host=jump.example",
            "--ssh-user=alice",
            "--db-host=10.0.0.7:3307",
            "--db-name=test",
            "--db-query=SELECT 1 AS x",
        ])
        .unwrap();

        let params = cli.to_params();
        assert_eq!(params.ssh.address(), "jump.example:22");
        assert_eq!(params.ssh.username, "alice");
        assert_eq!(params.ssh.host_key_policy, HostKeyPolicy::KnownHosts);
        assert_eq!(params.database.address, "10.0.0.7:3307");
        assert_eq!(params.database.database, "test");
        assert_eq!(params.query, "SELECT 1 AS x");
        assert_eq!(params.query_mode, QueryMode::Text);
        assert!(params.validate().is_ok());
    }

    #[test]
    fn test_security_and_key_flags() {
        let cli = Cli::try_parse_from([
            "sshq",
            "--ssh-host",
            "jump",
            "--ssh-port",
            "2222",
            "--ssh-user",
            "ops",
            "--ssh-key",
            "/home/ops/.ssh/id_ed25519",
            "--insecure-skip-host-verify",
            "--db-query-mode",
            "typed",
            "-vv",
        ])
        .unwrap();
        assert_eq!(cli.verbose, 2);

        let params = cli.to_params();
        assert_eq!(params.ssh.port, 2222);
        assert_eq!(params.ssh.host_key_policy, HostKeyPolicy::AcceptAny);
        assert_eq!(params.ssh.key_path, Some(PathBuf::from("/home/ops/.ssh/id_ed25519")));
        assert_eq!(params.query_mode, QueryMode::Typed);
    }

    #[test]
    fn test_passphrase_without_key_fails_validation() {
        let cli = Cli::try_parse_from([
            "sshq",
            "--ssh-host=jump",
            "--ssh-user=ops",
            "--ssh-key-passphrase=secret",
            "--db-query=SELECT 1",
        ])
        .unwrap();
        assert!(cli.to_params().validate().is_err());
    }

    #[test]
    fn test_rejects_bad_port() {
        assert!(Cli::try_parse_from(["sshq", "--ssh-port", "99999"]).is_err());
    }
}
