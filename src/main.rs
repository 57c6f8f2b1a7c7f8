#![cfg(not(tarpaulin_include))]

use asset_tracker::app;
use asset_tracker::config::Config;
use std::env;

/// Main entry point for the asset tracker web service
///
/// Reads the configuration from `ASSET_TRACKER_*` environment variables and
/// serves the JSON API. An optional first argument overrides the bind
/// address, e.g. `asset-tracker 0.0.0.0:8080`.
///
/// Logging goes through `env_logger`; set `RUST_LOG` to change the level
/// (default `info`).
#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let mut config = Config::from_env();
    if let Some(bind) = env::args().nth(1) {
        config.bind_addr = bind;
    }
    log::info!(
        "data directory {}, sessions last {}h",
        config.data_dir.display(),
        config.session_hours
    );

    app::run(config).await
}
