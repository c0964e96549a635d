// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0
//! Logging setup.
//!
//! `RUST_LOG` wins over the configured level. Metrics go through the
//! `metrics` facade; installing an exporter is left to the embedding binary.

use anyhow::Context;

/// Install the global tracing subscriber. `format` is `json` or `compact`
/// (anything else falls back to compact). Fails if one is already set.
pub fn init_logging(level: &str, format: &str) -> anyhow::Result<()> {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .or_else(|_| tracing_subscriber::EnvFilter::try_new(level))
        .context("Failed to create log filter")?;

    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_thread_ids(false)
        .with_file(false)
        .with_line_number(false);

    let result = match format {
        "json" => builder.json().try_init(),
        _ => builder.compact().try_init(),
    };
    result.map_err(|e| anyhow::anyhow!("Failed to install tracing subscriber: {}", e))
}

#[cfg(test)]
mod tests {
    use super::*;

    // only test in this binary that touches the global subscriber
    #[test]
    fn test_init_logging_installs_once() {
        init_logging("debug", "json").unwrap();
        tracing::info!(component = "telemetry", "subscriber installed");

        let second = init_logging("info", "compact");
        assert!(second.is_err());
    }
}
