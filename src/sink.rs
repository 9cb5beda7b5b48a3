//! Error sink for system failures
//!
//! A failing system must not cancel its siblings or abort the tick, so
//! system-body errors are delivered out-of-band: every subscriber gets a
//! channel carrying `(source, error)` pairs, and each delivery is also
//! logged.

use crossbeam::channel::{unbounded, Receiver, Sender};
use parking_lot::Mutex;
use tracing::error;

use crate::error::EcsError;

/// One delivered failure: the name of the failing system or operation plus
/// the error it produced.
#[derive(Debug, Clone)]
pub struct SystemError {
    pub source: String,
    pub error: EcsError,
}

/// Fan-out channel for system failures
pub(crate) struct ErrorSink {
    subscribers: Mutex<Vec<Sender<SystemError>>>,
}

impl ErrorSink {
    pub(crate) fn new() -> Self {
        Self {
            subscribers: Mutex::new(Vec::new()),
        }
    }

    /// Register a new subscriber; every later report is delivered to it.
    pub(crate) fn subscribe(&self) -> Receiver<SystemError> {
        let (tx, rx) = unbounded();
        self.subscribers.lock().push(tx);
        rx
    }

    /// Deliver a failure to all live subscribers, dropping hung-up ones.
    pub(crate) fn report(&self, source: &str, error: EcsError) {
        error!(source, %error, "system failed");
        let mut subscribers = self.subscribers.lock();
        subscribers.retain(|tx| {
            tx.send(SystemError {
                source: source.to_string(),
                error: error.clone(),
            })
            .is_ok()
        });
    }
}
