//! Log output setup
//!
//! Logs go to stderr so stdout carries nothing but the JSON payload.

use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

/// Filter used when `RUST_LOG` is not set
pub fn default_directive(verbose: bool) -> &'static str {
    if verbose {
        "newsdesk=debug"
    } else {
        "newsdesk=info"
    }
}

/// Installs the global subscriber; `RUST_LOG` overrides the default filter
pub fn init(verbose: bool) {
    let env_filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(default_directive(verbose)));

    let fmt_layer = fmt::layer().with_writer(std::io::stderr).with_target(false);

    // A subscriber may already be installed when embedded in another program
    let _ = tracing_subscriber::registry()
        .with(env_filter)
        .with(fmt_layer)
        .try_init();
}
