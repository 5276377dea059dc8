// File: src/logging.rs
//
// Diagnostic logging setup. Library code logs through `tracing`; the binary
// installs a stderr subscriber here. `RUST_LOG` takes precedence, otherwise
// `--verbose` enables debug output for this crate.

use std::sync::Once;

static TRACING_INIT: Once = Once::new();

/// Initialize tracing. Safe to call more than once.
pub fn init(verbose: bool) {
    TRACING_INIT.call_once(|| {
        use tracing_subscriber::{fmt, prelude::*, EnvFilter};

        let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| {
            EnvFilter::new(if verbose { "macrocalc=debug" } else { "warn" })
        });

        // A subscriber may already be installed by an embedding program.
        let _ = tracing_subscriber::registry()
            .with(fmt::layer().with_writer(std::io::stderr).with_target(true).with_level(true))
            .with(filter)
            .try_init();
    });
}
