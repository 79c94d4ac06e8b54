//! Stdout logging for benchmark runs.
//!
//! Operator-facing lines are plain `info!` messages that already carry their
//! `BENCHY::` prefix, so the subscriber prints the bare message with no time,
//! level or target in front. That keeps the output parseable by tools that
//! grep for `BENCHY::{LABEL}::Avg Throughput:` and friends.

use tracing_subscriber::EnvFilter;
use tracing_subscriber::fmt::SubscriberBuilder;
use tracing_subscriber::fmt::format::{DefaultFields, Format, Full};

/// Subscriber builder with the bare line format, writing to stdout.
pub fn bare_format() -> SubscriberBuilder<DefaultFields, Format<Full, ()>> {
    tracing_subscriber::fmt()
        .without_time()
        .with_level(false)
        .with_target(false)
        .with_ansi(false)
}

/// Install the stdout subscriber as the global default.
///
/// `RUST_LOG` overrides the default `info` filter; `RUST_LOG=benchy=debug`
/// adds trial lifecycle and profiler region events. Does nothing if a global
/// subscriber is already installed.
pub fn init() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let _ = bare_format().with_env_filter(filter).try_init();
}
