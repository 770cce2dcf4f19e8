//! sshq - run one MySQL query through an SSH jump host.

mod app;
mod cli;

use clap::Parser;
use cli::Cli;
use sshq_core::logging::{init_logging, LogConfig};
use sshq_core::SshqError;
use std::process::ExitCode;

#[tokio::main(flavor = "current_thread")]
async fn main() -> ExitCode {
    let cli = Cli::parse();

    init_logging(LogConfig::new().with_verbosity(cli.verbose));
    tracing::debug!(version = env!("CARGO_PKG_VERSION"), "Starting sshq");

    let params = cli.to_params();
    match app::run(&params).await {
        Ok(summary) => {
            tracing::debug!(
                rows = summary.row_count,
                execution_time_ms = summary.execution_time_ms,
                "Done"
            );
            ExitCode::SUCCESS
        }
        Err(e) => {
            report(&e);
            ExitCode::FAILURE
        }
    }
}

/// Print a fatal error to stderr.
fn report(err: &SshqError) {
    tracing::error!(category = err.category(), error = %err, "sshq failed");

    let info = err.to_error_info();
    eprintln!("error: {}", info.message);
    if let Some(detail) = &info.technical_detail {
        for line in detail.lines() {
            eprintln!("  {line}");
        }
    }
    if let Some(hint) = &info.hint {
        eprintln!("hint: {hint}");
    }
}
