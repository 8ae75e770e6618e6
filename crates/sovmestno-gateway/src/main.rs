use std::env;

use sovmestno_gateway::config::loader::{DEFAULT_CONFIG_PATH, load_config};
use sovmestno_gateway::{ServerBuilder, shutdown_tracing};

/// How the configuration path was determined.
#[derive(Debug, Clone, Copy)]
enum ConfigSource {
    /// From --config CLI argument
    CliArgument,
    /// From SOVMESTNO_CONFIG environment variable
    EnvironmentVariable,
    /// Default path (sovmestno.toml)
    Default,
}

impl std::fmt::Display for ConfigSource {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::CliArgument => write!(f, "CLI argument (--config)"),
            Self::EnvironmentVariable => write!(f, "environment variable (SOVMESTNO_CONFIG)"),
            Self::Default => write!(f, "default"),
        }
    }
}

#[tokio::main]
async fn main() {
    // Load .env file if present (before anything else)
    if let Err(e) = dotenvy::dotenv() {
        // Not an error if .env doesn't exist - it's optional
        if !matches!(e, dotenvy::Error::Io(ref io_err) if io_err.kind() == std::io::ErrorKind::NotFound)
        {
            eprintln!("Warning: Failed to load .env file: {e}");
        }
    }

    // Initialize tracing early with the default level
    sovmestno_gateway::observability::init_tracing();

    // Parse config path from CLI, environment, or use default
    let (config_path, source) = resolve_config_path();

    let cfg = match load_config(Some(&config_path)) {
        Ok(c) => c,
        Err(e) => {
            tracing::error!(error = %e, "Configuration error");
            eprintln!("Configuration error: {e}");
            std::process::exit(2);
        }
    };

    tracing::info!(
        path = %config_path,
        source = %source,
        version = env!("CARGO_PKG_VERSION"),
        commit = env!("GIT_COMMIT"),
        "Configuration loaded"
    );

    sovmestno_gateway::observability::apply_logging_level(&cfg.logging.level);

    let server = match ServerBuilder::new().with_config(cfg).build() {
        Ok(s) => s,
        Err(e) => {
            tracing::error!(error = %e, "Server initialization failed");
            eprintln!("Server initialization failed: {e}");
            std::process::exit(2);
        }
    };

    let exit_code = match server.run().await {
        Ok(()) => {
            tracing::info!("Server exited");
            0
        }
        Err(err) => {
            tracing::error!(error = %format!("{err:#}"), "Server error");
            eprintln!("Server error: {err:#}");
            1
        }
    };

    shutdown_tracing();
    std::process::exit(exit_code);
}

/// Resolve the configuration file path.
///
/// Priority order:
/// 1. CLI argument: --config <path>
/// 2. Environment variable: SOVMESTNO_CONFIG
/// 3. Default: sovmestno.toml
fn resolve_config_path() -> (String, ConfigSource) {
    // 1. Check CLI: --config <path>
    let mut args = env::args().skip(1);
    while let Some(arg) = args.next() {
        if arg == "--config"
            && let Some(path) = args.next()
        {
            return (path, ConfigSource::CliArgument);
        }
    }

    // 2. Check environment variable
    if let Ok(path) = env::var("SOVMESTNO_CONFIG")
        && !path.is_empty()
    {
        return (path, ConfigSource::EnvironmentVariable);
    }

    // 3. Default to sovmestno.toml
    (DEFAULT_CONFIG_PATH.to_string(), ConfigSource::Default)
}
