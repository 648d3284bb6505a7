use tracing::Subscriber;
use tracing_subscriber::fmt::MakeWriter;
use tracing_subscriber::{EnvFilter, fmt, prelude::*};

use crate::BoxError;

/// Filter used when `RUST_LOG` is not set.
pub const DEFAULT_FILTER: &str = "info";

/// Read the filter from `RUST_LOG`, falling back to [`DEFAULT_FILTER`].
///
/// `RUST_LOG=spi_core=debug` shows discovery details such as skipped
/// configuration lines.
pub fn env_filter() -> Result<EnvFilter, BoxError> {
    let filter =
        EnvFilter::try_from_default_env().or_else(|_| EnvFilter::try_new(DEFAULT_FILTER))?;
    Ok(filter)
}

/// Build the compact fmt subscriber writing to `writer`.
pub fn subscriber<W>(filter: EnvFilter, writer: W) -> impl Subscriber + Send + Sync + 'static
where
    W: for<'w> MakeWriter<'w> + Send + Sync + 'static,
{
    let fmt_layer = fmt::layer()
        .with_writer(writer)
        .with_target(true)
        .with_thread_ids(true)
        .with_level(true)
        .with_file(true)
        .with_line_number(true)
        .compact();

    tracing_subscriber::registry().with(filter).with(fmt_layer)
}

/// Install the stdout subscriber as the global default.
///
/// Fails if a global subscriber is already set.
pub fn init() -> Result<(), BoxError> {
    subscriber(env_filter()?, std::io::stdout).try_init()?;
    Ok(())
}
