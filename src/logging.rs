// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Logging subscriber initialisation.

use std::str::FromStr;

use tracing_subscriber::{
    layer::{Layer, SubscriberExt},
    util::SubscriberInitExt,
    EnvFilter, Registry,
};

/// Default filter when `RUST_LOG` is unset.
const DEFAULT_FILTER: &str = "info,hyper=warn,reqwest=warn";

/// Output format of log events.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, clap::ValueEnum)]
pub enum LogFormat {
    #[default]
    Pretty,
    Json,
}

impl FromStr for LogFormat {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "pretty" => Ok(LogFormat::Pretty),
            "json" => Ok(LogFormat::Json),
            other => Err(format!("unknown log format '{other}'")),
        }
    }
}

#[derive(Debug, thiserror::Error)]
#[error("failed to install log subscriber: {0}")]
pub struct LoggingError(#[from] tracing_subscriber::util::TryInitError);

/// Install the global subscriber. Logs go to stderr so stdout stays usable
/// for command output.
pub fn init(format: LogFormat) -> Result<(), LoggingError> {
    match format {
        LogFormat::Pretty => init_with_layer(
            tracing_subscriber::fmt::layer()
                .compact()
                .with_target(true)
                .with_writer(std::io::stderr),
        ),
        LogFormat::Json => init_with_layer(
            tracing_subscriber::fmt::layer()
                .json()
                .with_current_span(true)
                .with_target(true)
                .with_writer(std::io::stderr),
        ),
    }
}

fn build_env_filter() -> EnvFilter {
    EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(DEFAULT_FILTER))
}

fn init_with_layer<L>(fmt_layer: L) -> Result<(), LoggingError>
where
    L: Layer<Registry> + Send + Sync + 'static,
{
    tracing_subscriber::registry()
        .with(fmt_layer)
        .with(build_env_filter())
        .try_init()?;
    Ok(())
}
