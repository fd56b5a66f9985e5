//! Hearth agent binary: the worker entry point.
//!
//! Loads configuration, initializes structured logging, starts the
//! auxiliary health listener on a background task, and runs the agent
//! worker. Startup failures are logged and produce a non-zero exit.

mod config;
mod health;
mod worker;

use tracing_subscriber::EnvFilter;

fn resolve_config_path() -> (Option<String>, &'static str) {
    if let Some(path) = std::env::args()
        .nth(1)
        .filter(|value| !value.trim().is_empty())
    {
        return (Some(path), "cli-arg");
    }

    if let Ok(path) = std::env::var("HEARTH_CONFIG_PATH") {
        if !path.trim().is_empty() {
            return (Some(path), "env-var");
        }
    }

    (None, "default")
}

#[tokio::main]
async fn main() {
    let (resolved_config_path, config_source) = resolve_config_path();
    let selected_config_path = resolved_config_path.as_deref().or(Some("config.toml"));

    // Fatal configuration errors (a missing required variable lists
    // every missing name) abort before any session starts.
    let config = match config::load_config(selected_config_path) {
        Ok(config) => config,
        Err(e) => {
            // Logging is not up yet; this must still reach the operator.
            eprintln!("hearth-agent: {e}");
            std::process::exit(1);
        }
    };

    // Initialize tracing
    let filter =
        EnvFilter::try_new(&config.logging.level).unwrap_or_else(|_| EnvFilter::new("info"));

    if config.logging.json {
        tracing_subscriber::fmt()
            .with_env_filter(filter)
            .json()
            .init();
    } else {
        tracing_subscriber::fmt().with_env_filter(filter).init();
    }

    tracing::info!(
        source = config_source,
        path = selected_config_path.unwrap_or("<none>"),
        "resolved startup configuration path"
    );
    tracing::info!(
        worker_port = config.worker.port,
        health_port = config.worker.health_port,
        livekit_url = config.livekit.url.as_str(),
        "starting hearth agent"
    );

    // Auxiliary health listener on its own task; never fatal.
    tokio::spawn(health::serve(config.worker.health_port));

    if let Err(e) = worker::run(config).await {
        tracing::error!("failed to run hearth agent: {e}");
        std::process::exit(1);
    }

    tracing::info!("hearth agent shut down");
}
