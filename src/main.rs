use std::sync::atomic::AtomicUsize;
use std::sync::Arc;

mod cases;
mod chart;
mod config;
mod handler;
mod http;
mod logger;
mod server;
#[cfg(test)]
mod testing;

use server::{create_reusable_listener, run_server_loop, start_signal_handler, SignalHandler};

const DEFAULT_CONFIG_PATH: &str = "config";

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let config_path = std::env::args()
        .nth(1)
        .unwrap_or_else(|| DEFAULT_CONFIG_PATH.to_string());
    let cfg = config::Config::load_from(&config_path).map_err(|e| {
        eprintln!("[ERROR] Failed to load configuration from '{config_path}': {e}");
        e
    })?;

    let logger = Arc::new(logger::Logger::from_config(&cfg.logging)?);

    let state = Arc::new(config::AppState::new(cfg, Arc::clone(&logger))?);
    if let Err(e) = state.charts.ensure_output_dir() {
        logger.error(
            "charts.output_dir_failed",
            &[
                ("dir", &state.charts.output_dir().display()),
                ("reason", &e),
            ],
        );
        return Err(e.into());
    }
    state.store.log_summary();

    // Tokio runtime sized by `server.workers`
    let mut runtime_builder = tokio::runtime::Builder::new_multi_thread();
    runtime_builder.enable_all();
    if let Some(workers) = state.config.server.workers {
        runtime_builder.worker_threads(workers);
    }
    let runtime = runtime_builder.build()?;

    runtime.block_on(async_main(state))
}

async fn async_main(state: Arc<config::AppState>) -> Result<(), Box<dyn std::error::Error>> {
    let addr = state.config.get_socket_addr()?;
    let listener = create_reusable_listener(addr).map_err(|e| {
        state
            .logger
            .error("server.bind_failed", &[("addr", &addr), ("reason", &e)]);
        e
    })?;

    let signals = Arc::new(SignalHandler::new());
    start_signal_handler(Arc::clone(&signals), Arc::clone(&state.logger));

    state.logger.log_server_start(&addr, &state.config);

    // LocalSet for spawn_local connection tasks
    let local = tokio::task::LocalSet::new();
    local
        .run_until(run_server_loop(
            listener,
            Arc::clone(&state),
            Arc::new(AtomicUsize::new(0)),
            Arc::clone(&signals.shutdown),
        ))
        .await;

    state.logger.log_server_stop();
    Ok(())
}
