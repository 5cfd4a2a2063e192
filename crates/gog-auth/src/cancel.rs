//! Cancellation for the login wait.
//!
//! A [`CancelHandle`] is a cloneable flag backed by a `watch` channel. The
//! manage server waits on [`CancelHandle::cancelled`]; the CLI triggers it
//! from Ctrl+C, tests trigger it directly.

use std::sync::Arc;

use tokio::sync::watch;
use tracing::info;

/// Cloneable cancellation flag.
#[derive(Clone)]
pub struct CancelHandle {
    tx: Arc<watch::Sender<bool>>,
    rx: watch::Receiver<bool>,
}

impl Default for CancelHandle {
    fn default() -> Self {
        Self::new()
    }
}

impl CancelHandle {
    pub fn new() -> Self {
        let (tx, rx) = watch::channel(false);
        Self {
            tx: Arc::new(tx),
            rx,
        }
    }

    /// Requests cancellation.
    pub fn cancel(&self) {
        let _ = self.tx.send(true);
    }

    pub fn is_cancelled(&self) -> bool {
        *self.rx.borrow()
    }

    /// Completes once [`cancel`](Self::cancel) has been called.
    pub async fn cancelled(&self) {
        let mut rx = self.rx.clone();
        let closed = rx.wait_for(|cancelled| *cancelled).await.is_err();
        // a closed channel never cancels
        if closed {
            std::future::pending::<()>().await;
        }
    }

    /// Cancels on Ctrl+C.
    pub fn cancel_on_ctrl_c(&self) {
        let handle = self.clone();
        tokio::spawn(async move {
            if tokio::signal::ctrl_c().await.is_ok() {
                info!("received Ctrl+C, cancelling login");
                handle.cancel();
            }
        });
    }
}
