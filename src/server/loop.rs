// Server loop module
// Accepts connections until a shutdown is requested, then drains open ones

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use tokio::net::TcpListener;
use tokio::sync::Notify;
use tokio::time::Instant;

use super::connection::accept_connection;
use crate::config::AppState;

const DRAIN_POLL_INTERVAL: Duration = Duration::from_millis(50);

/// Accept loop; returns once `shutdown` is notified and open connections have
/// finished or the write timeout has passed
pub async fn run_server_loop(
    listener: TcpListener,
    state: Arc<AppState>,
    active_connections: Arc<AtomicUsize>,
    shutdown: Arc<Notify>,
) {
    loop {
        tokio::select! {
            accept_result = listener.accept() => {
                match accept_result {
                    Ok((stream, peer_addr)) => {
                        accept_connection(stream, peer_addr, &state, &active_connections);
                    }
                    Err(e) => {
                        state.logger.error("connection.accept_failed", &[("reason", &e)]);
                    }
                }
            }

            () = shutdown.notified() => {
                state.logger.info(
                    "server.shutdown_requested",
                    &[("active", &active_connections.load(Ordering::SeqCst))],
                );
                break;
            }
        }
    }

    // Stop accepting before draining
    drop(listener);

    let deadline = Instant::now() + Duration::from_secs(state.config.performance.write_timeout);
    while active_connections.load(Ordering::SeqCst) > 0 && Instant::now() < deadline {
        tokio::time::sleep(DRAIN_POLL_INTERVAL).await;
    }

    let remaining = active_connections.load(Ordering::SeqCst);
    if remaining > 0 {
        state
            .logger
            .warn("server.drain_incomplete", &[("active", &remaining)]);
    }
}
