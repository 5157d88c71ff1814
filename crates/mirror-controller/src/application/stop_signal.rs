//! Session-wide stop signal.
//!
//! A [`StopHandle`] is held by whoever owns the session (the CLI, or
//! [`MirrorSession`](super::session::MirrorSession)); every long-running task
//! holds a cloned [`StopSignal`] and selects on [`StopSignal::stopped`].

use tokio::sync::watch;

/// Sending half. Calling [`StopHandle::stop`] more than once is harmless.
#[derive(Debug)]
pub struct StopHandle {
    tx: watch::Sender<bool>,
}

/// Receiving half, cheap to clone.
#[derive(Debug, Clone)]
pub struct StopSignal {
    rx: watch::Receiver<bool>,
}

/// Creates a connected handle/signal pair.
pub fn stop_pair() -> (StopHandle, StopSignal) {
    let (tx, rx) = watch::channel(false);
    (StopHandle { tx }, StopSignal { rx })
}

impl StopHandle {
    pub fn stop(&self) {
        // Err only means no signal is alive any more.
        let _ = self.tx.send(true);
    }

    pub fn signal(&self) -> StopSignal {
        StopSignal { rx: self.tx.subscribe() }
    }

    pub fn is_stopped(&self) -> bool {
        *self.tx.borrow()
    }
}

impl StopSignal {
    /// A signal that never fires, for one-shot CLI operations.
    pub fn never() -> Self {
        stop_pair().1
    }

    pub fn is_stopped(&self) -> bool {
        *self.rx.borrow()
    }

    /// Resolves once stop has been requested.
    ///
    /// If the handle is dropped without stopping, this never resolves.
    pub async fn stopped(&self) {
        let mut rx = self.rx.clone();
        if rx.wait_for(|stopped| *stopped).await.is_err() {
            std::future::pending::<()>().await;
        }
    }
}
