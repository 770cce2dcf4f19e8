//! Structured logging setup.
//!
//! Logs go to stderr so stdout carries only the rendered table.
//! Filter priority: verbosity flag > SSHQ_LOG > RUST_LOG > build-type default.

use tracing_subscriber::EnvFilter;

/// Logging configuration.
#[derive(Debug, Clone)]
pub struct LogConfig {
    /// Whether stderr is a terminal (enables colors)
    pub is_tty: bool,
    /// Optional custom log filter
    pub log_filter: Option<String>,
}

impl LogConfig {
    /// Create a new logging configuration.
    pub fn new() -> Self {
        Self { is_tty: atty::is(atty::Stream::Stderr), log_filter: None }
    }

    /// Set custom log filter.
    pub fn with_filter(mut self, filter: impl Into<String>) -> Self {
        self.log_filter = Some(filter.into());
        self
    }

    /// Derive the filter from a `-v` count; zero keeps the environment/default filter.
    pub fn with_verbosity(self, verbose: u8) -> Self {
        match verbosity_filter(verbose) {
            Some(filter) => self.with_filter(filter),
            None => self,
        }
    }
}

impl Default for LogConfig {
    fn default() -> Self {
        Self::new()
    }
}

/// Initialize stderr logging with the given configuration.
pub fn init_logging(config: LogConfig) {
    let env_filter = build_env_filter(config.log_filter.as_deref());

    let result = tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_env_filter(env_filter)
        .with_ansi(config.is_tty)
        .with_target(false)
        .with_thread_ids(false)
        .try_init();

    if let Err(e) = result {
        eprintln!("Warning: Failed to initialize logging: {e}");
    }
}

/// Build the environment filter from config or defaults.
fn build_env_filter(custom_filter: Option<&str>) -> EnvFilter {
    if let Some(filter) = custom_filter {
        return EnvFilter::try_new(filter).unwrap_or_else(|_| EnvFilter::new(default_log_filter()));
    }

    EnvFilter::try_from_env("SSHQ_LOG")
        .or_else(|_| EnvFilter::try_from_env("RUST_LOG"))
        .unwrap_or_else(|_| EnvFilter::new(default_log_filter()))
}

/// Map a `-v` count to a filter directive.
pub fn verbosity_filter(verbose: u8) -> Option<&'static str> {
    match verbose {
        0 => None,
        1 => Some("info,sshq=debug,sshq_core=debug,russh=warn,mysql_async=warn"),
        2 => Some("debug,sshq=trace,sshq_core=trace,russh=info,mysql_async=info"),
        _ => Some("trace"),
    }
}

/// Get the default log filter based on build type.
pub fn default_log_filter() -> &'static str {
    #[cfg(debug_assertions)]
    {
        "info,sshq=debug,sshq_core=debug,russh=warn,mysql_async=warn"
    }
    #[cfg(not(debug_assertions))]
    {
        "warn,sshq=info,sshq_core=info,russh=warn,mysql_async=warn"
    }
}
