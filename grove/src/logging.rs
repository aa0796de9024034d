//! Diagnostic tracing.
//!
//! Tracing goes to stderr. Command output (trees, listings, per-node
//! results) goes to stdout and does not depend on the log level.

use tracing_subscriber::{EnvFilter, fmt, layer::SubscriberExt, util::SubscriberInitExt};

/// Default filter for a `-v` count.
pub fn default_directive(verbosity: u8) -> &'static str {
    match verbosity {
        0 => "warn",
        1 => "grove=info,warn",
        _ => "grove=debug,info",
    }
}

/// Install the tracing subscriber.
///
/// `RUST_LOG` wins when set; otherwise the filter follows `verbosity`.
/// Output: stderr, compact format.
///
/// # Example
/// ```bash
/// RUST_LOG=grove::loader=debug grove ls -r
/// ```
pub fn init(verbosity: u8) {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(default_directive(verbosity)));

    tracing_subscriber::registry()
        .with(filter)
        .with(fmt::layer().with_writer(std::io::stderr).compact())
        .init();
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn verbosity_raises_grove_level() {
        assert_eq!(default_directive(0), "warn");
        assert!(default_directive(1).starts_with("grove=info"));
        assert!(default_directive(5).starts_with("grove=debug"));
    }
}
