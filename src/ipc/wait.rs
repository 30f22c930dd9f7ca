use std::future::Future;
use std::io;
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::watch;

use crate::error::{BridgeError, Result};

/// Process-wide exit flag.
///
/// Polled once per loop iteration and also used to interrupt blocking
/// channel waits.
#[derive(Debug, Clone)]
pub struct ExitSignal {
    tx: Arc<watch::Sender<bool>>,
}

impl ExitSignal {
    pub fn new() -> Self {
        let (tx, _rx) = watch::channel(false);
        Self { tx: Arc::new(tx) }
    }

    pub fn request_exit(&self) {
        self.tx.send_replace(true);
    }

    pub fn is_exit_requested(&self) -> bool {
        *self.tx.borrow()
    }

    /// Resolves once an exit has been requested.
    pub async fn requested(&self) {
        let mut rx = self.tx.subscribe();
        // The sender lives in `self`, so the channel cannot close while awaited.
        let _ = rx.wait_for(|exit| *exit).await;
    }
}

impl Default for ExitSignal {
    fn default() -> Self {
        Self::new()
    }
}

/// How long a blocking wait may take and what can interrupt it.
#[derive(Debug, Clone)]
pub struct WaitPolicy {
    pub exit: ExitSignal,
    pub timeout: Option<Duration>,
}

impl WaitPolicy {
    pub fn new(exit: ExitSignal, timeout: Option<Duration>) -> Self {
        Self { exit, timeout }
    }

    /// Unbounded wait, interrupted only by exit.
    pub fn unbounded(exit: ExitSignal) -> Self {
        Self::new(exit, None)
    }
}

/// Run a blocking I/O wait that can be interrupted by an exit request or
/// bounded by the policy's timeout.
pub async fn cancellable<F, T>(what: &'static str, policy: &WaitPolicy, wait: F) -> Result<T>
where
    F: Future<Output = io::Result<T>>,
{
    let bounded = async {
        match policy.timeout {
            Some(after) => match tokio::time::timeout(after, wait).await {
                Ok(result) => result.map_err(|e| BridgeError::io(what, e)),
                Err(_) => Err(BridgeError::TimedOut { what, after }),
            },
            None => wait.await.map_err(|e| BridgeError::io(what, e)),
        }
    };

    tokio::select! {
        biased;
        _ = policy.exit.requested() => Err(BridgeError::Cancelled(what)),
        result = bounded => result,
    }
}
