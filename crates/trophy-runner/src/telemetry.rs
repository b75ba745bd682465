//! Tracing setup for the runner.

use anyhow::Result;
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

const DEFAULT_FILTER: &str = "info,trophy_runner=debug,trophy_world=debug";

/// Install the global subscriber. Logs go to stderr so stdout carries only frames.
pub fn init_telemetry(json: bool) -> Result<()> {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| DEFAULT_FILTER.into());

    let (plain, structured) = if json {
        (
            None,
            Some(
                tracing_subscriber::fmt::layer()
                    .json()
                    .with_target(true)
                    .with_writer(std::io::stderr),
            ),
        )
    } else {
        (
            Some(
                tracing_subscriber::fmt::layer()
                    .with_target(true)
                    .with_writer(std::io::stderr),
            ),
            None,
        )
    };

    tracing_subscriber::registry()
        .with(filter)
        .with(plain)
        .with(structured)
        .try_init()?;

    info!(json, "Telemetry initialized");
    Ok(())
}

pub fn shutdown_telemetry() {
    info!("Shutting down telemetry");
}
