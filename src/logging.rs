#![forbid(unsafe_code)]

use std::env;

use tracing_subscriber::{EnvFilter, fmt, prelude::*};

const DEFAULT_FILTER: &str = "taskdeck=warn";

/// Installs the global subscriber. Logs go to stderr; `TASKDECK_LOG` takes an
/// `EnvFilter` directive and `TASKDECK_LOG_FORMAT=json` switches to JSON lines.
///
/// With `quiet` set and no `TASKDECK_LOG`, nothing is logged. Used by the
/// full-screen board, where stderr output would tear the display.
pub fn init(quiet: bool) {
    let filter = match EnvFilter::try_from_env("TASKDECK_LOG") {
        Ok(f) => f,
        Err(_) if quiet => EnvFilter::new("off"),
        Err(_) => EnvFilter::new(DEFAULT_FILTER),
    };

    let format = env::var("TASKDECK_LOG_FORMAT").unwrap_or_else(|_| "compact".to_owned());
    let registry = tracing_subscriber::registry().with(filter);

    // A second init (tests, embedding) keeps the first subscriber.
    let _ = match format.as_str() {
        "json" => registry
            .with(fmt::layer().json().with_ansi(false).with_writer(std::io::stderr))
            .try_init(),
        _ => registry
            .with(fmt::layer().compact().with_writer(std::io::stderr))
            .try_init(),
    };
}
