//! The query pipeline: jump host session, tunneled database connection,
//! one query, table on stdout.

use sshq_core::{
    ConnectionParams, DatabaseConnection, QueryService, QuerySummary, SshSession, SshqResult,
    TableWriter,
};
use std::future::Future;
use std::io::Write;
use std::sync::Arc;

/// Run the pipeline against stdout.
pub async fn run(params: &ConnectionParams) -> SshqResult<QuerySummary> {
    let stdout = std::io::stdout();
    run_with_output(params, stdout.lock()).await
}

/// Run the pipeline, writing the table to `out`.
///
/// Resources are released in reverse order of acquisition, and each one is
/// released even when a later step failed.
pub async fn run_with_output<W: Write>(params: &ConnectionParams, out: W) -> SshqResult<QuerySummary> {
    params.validate()?;

    let session = SshSession::connect(&params.ssh).await?;
    let result = query_through(&session, params, out).await;
    release_after(result, session.close(), "SSH session").await
}

async fn query_through<W: Write>(
    session: &SshSession,
    params: &ConnectionParams,
    out: W,
) -> SshqResult<QuerySummary> {
    let dialer = Arc::new(session.dialer());
    let mut connection = DatabaseConnection::connect(dialer, &params.database).await?;

    let result = render_query(&mut connection, params, out).await;
    release_after(result, connection.close(), "database connection").await
}

async fn render_query<W: Write>(
    connection: &mut DatabaseConnection,
    params: &ConnectionParams,
    out: W,
) -> SshqResult<QuerySummary> {
    let mut table = TableWriter::new(out);
    let summary =
        QueryService::execute(connection, &params.query, params.query_mode, &mut table).await?;
    table.finish()?;

    if !summary.has_result_set() {
        tracing::info!(rows_affected = summary.rows_affected, "Statement returned no rows");
    }
    Ok(summary)
}

/// Await `close` after `result`. The first error wins: a close failure is
/// only reported when the work itself succeeded.
async fn release_after<T>(
    result: SshqResult<T>,
    close: impl Future<Output = SshqResult<()>>,
    resource: &str,
) -> SshqResult<T> {
    let closed = close.await;
    match (result, closed) {
        (Ok(value), Ok(())) => Ok(value),
        (Ok(_), Err(e)) => Err(e),
        (Err(e), closed) => {
            if let Err(close_err) = closed {
                tracing::debug!(
                    error = %close_err,
                    resource,
                    "Ignoring close failure after earlier error"
                );
            }
            Err(e)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use sshq_core::{DatabaseParams, SshParams, SshqError};
    use std::sync::atomic::{AtomicBool, Ordering};

    fn closer(
        closed: &AtomicBool,
        outcome: SshqResult<()>,
    ) -> impl Future<Output = SshqResult<()>> + '_ {
        async move {
            closed.store(true, Ordering::SeqCst);
            outcome
        }
    }

    fn params(ssh: SshParams) -> ConnectionParams {
        ConnectionParams::new(ssh, DatabaseParams::default(), "SELECT 1 AS x")
    }

    #[tokio::test]
    async fn test_missing_host_fails_before_network() {
        let mut out = Vec::new();
        let err = run_with_output(&params(SshParams::new("", "alice")), &mut out).await.unwrap_err();

        assert!(matches!(err, SshqError::Config { .. }));
        assert!(out.is_empty());
    }

    #[tokio::test]
    async fn test_empty_query_fails_before_network() {
        let params = ConnectionParams::new(
            SshParams::new("jump", "alice"),
            DatabaseParams::default(),
            "   ",
        );
        let err = run_with_output(&params, Vec::new()).await.unwrap_err();
        assert_eq!(err.category(), "Config");
    }

    #[tokio::test]
    async fn test_unreachable_jump_host_is_ssh_error() {
        // Bind then drop to get a local port with nothing listening.
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let port = listener.local_addr().unwrap().port();
        drop(listener);

        let mut out = Vec::new();
        let ssh = SshParams::new("127.0.0.1", "alice").with_port(port);
        let err = run_with_output(&params(ssh), &mut out).await.unwrap_err();

        assert_eq!(err.category(), "SSH");
        assert!(out.is_empty());
    }

    #[tokio::test]
    async fn test_failed_output_still_releases_resource() {
        let closed = AtomicBool::new(false);
        let failed: SshqResult<()> = Err(SshqError::render("Failed to write output: broken pipe"));

        let err = release_after(failed, closer(&closed, Ok(())), "database connection")
            .await
            .unwrap_err();

        assert!(closed.load(Ordering::SeqCst));
        assert_eq!(err.category(), "Render");
    }

    #[tokio::test]
    async fn test_first_error_wins_over_close_failure() {
        let closed = AtomicBool::new(false);
        let failed: SshqResult<()> = Err(SshqError::render("Failed to write output"));
        let close_failure = Err(SshqError::config("close failed"));

        let err = release_after(failed, closer(&closed, close_failure), "SSH session")
            .await
            .unwrap_err();

        assert!(closed.load(Ordering::SeqCst));
        assert_eq!(err.category(), "Render");
    }

    #[tokio::test]
    async fn test_close_failure_reported_after_success() {
        let closed = AtomicBool::new(false);
        let close_failure = Err(SshqError::config("close failed"));

        let err = release_after(Ok(7u64), closer(&closed, close_failure), "SSH session")
            .await
            .unwrap_err();
        assert_eq!(err.category(), "Config");

        let value = release_after(Ok(7u64), closer(&closed, Ok(())), "SSH session").await.unwrap();
        assert_eq!(value, 7);
    }
}
