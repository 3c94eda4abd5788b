// src/logging.rs
// =============================================================================
// Sets up the tracing subscriber for the binary.
//
// - Logs go to stderr; stdout is reserved for the report (and --json output)
// - RUST_LOG wins when set, e.g. RUST_LOG=link_warden=debug,reqwest=warn
// - Otherwise the level comes from the number of -v flags
// =============================================================================

use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

/// Maps `-v` occurrences to a default filter directive.
pub fn default_directive(verbosity: u8) -> &'static str {
    match verbosity {
        0 => "warn",
        1 => "link_warden=info,warn",
        2 => "link_warden=debug,info",
        _ => "trace",
    }
}

/// Installs the global subscriber. Fails if one is already installed.
pub fn init_logging(verbosity: u8) -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
    let env_filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(default_directive(verbosity)))?;

    let stderr_layer = fmt::layer()
        .with_writer(std::io::stderr)
        .with_target(verbosity >= 2)
        .compact();

    tracing_subscriber::registry()
        .with(env_filter)
        .with(stderr_layer)
        .try_init()?;

    Ok(())
}
