use tracing_subscriber::{fmt, prelude::*, EnvFilter};

/// Default level for this crate's targets when `RUST_LOG` is unset.
fn default_directive(verbose: u8, quiet: bool) -> &'static str {
    match (quiet, verbose) {
        (true, _) => "tract_dvi=warn",
        (false, 0) => "tract_dvi=info",
        (false, 1) => "tract_dvi=debug",
        (false, _) => "tract_dvi=trace",
    }
}

/// Initializes console logging on stderr, leaving stdout for the run summary.
///
/// `RUST_LOG` takes precedence over the `-v`/`-q` defaults. Calling this more
/// than once is a no-op.
pub fn init_logging(verbose: u8, quiet: bool) {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(default_directive(verbose, quiet)));

    let console_layer = fmt::layer().with_writer(std::io::stderr).with_target(false);

    let _ = tracing_subscriber::registry()
        .with(filter)
        .with(console_layer)
        .try_init();
}
