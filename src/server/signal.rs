// Signal handling module
//
// - SIGTERM: graceful shutdown
// - SIGINT:  graceful shutdown (Ctrl+C)
//
// Other platforms only get Ctrl+C.

use std::sync::Arc;

use tokio::sync::Notify;

use crate::logger::Logger;

/// Signal handler state
pub struct SignalHandler {
    /// Notified once when a shutdown signal arrives
    pub shutdown: Arc<Notify>,
}

impl SignalHandler {
    pub fn new() -> Self {
        Self {
            shutdown: Arc::new(Notify::new()),
        }
    }

    /// Wake the accept loop
    pub fn request_shutdown(&self, logger: &Logger, signal: &str) {
        logger.info("signal.received", &[("signal", &signal)]);
        // notify_one keeps a permit if the loop is not waiting yet
        self.shutdown.notify_one();
    }
}

impl Default for SignalHandler {
    fn default() -> Self {
        Self::new()
    }
}

/// Start signal handlers (Unix)
#[cfg(unix)]
pub fn start_signal_handler(handler: Arc<SignalHandler>, logger: Arc<Logger>) {
    use tokio::signal::unix::{signal, SignalKind};

    tokio::spawn(async move {
        let (mut sigterm, mut sigint) =
            match (signal(SignalKind::terminate()), signal(SignalKind::interrupt())) {
                (Ok(term), Ok(int)) => (term, int),
                (Err(e), _) | (_, Err(e)) => {
                    logger.error("signal.register_failed", &[("reason", &e)]);
                    return;
                }
            };
        logger.debug("signal.registered", &[("pid", &std::process::id())]);

        tokio::select! {
            _ = sigterm.recv() => handler.request_shutdown(&logger, "SIGTERM"),
            _ = sigint.recv() => handler.request_shutdown(&logger, "SIGINT"),
        }
    });
}

/// Fallback: only Ctrl+C
#[cfg(not(unix))]
pub fn start_signal_handler(handler: Arc<SignalHandler>, logger: Arc<Logger>) {
    tokio::spawn(async move {
        match tokio::signal::ctrl_c().await {
            Ok(()) => handler.request_shutdown(&logger, "CTRL_C"),
            Err(e) => logger.error("signal.register_failed", &[("reason", &e)]),
        }
    });
}
