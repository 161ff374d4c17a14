//! Cancellation token shared between a caller and one in-flight request.

use std::sync::Arc;
use tokio::sync::watch;

/// Cloneable cancellation flag. Cancelling is sticky: once set, every clone
/// observes it and every pending `cancelled()` future resolves.
#[derive(Debug, Clone)]
pub struct CancelToken {
    flag: Arc<watch::Sender<bool>>,
}

impl CancelToken {
    pub fn new() -> Self {
        let (tx, _rx) = watch::channel(false);
        Self { flag: Arc::new(tx) }
    }

    /// Abort whatever request holds this token
    pub fn cancel(&self) {
        self.flag.send_replace(true);
    }

    pub fn is_cancelled(&self) -> bool {
        *self.flag.borrow()
    }

    /// Resolves once `cancel` has been called on any clone
    pub async fn cancelled(&self) {
        let mut rx = self.flag.subscribe();
        // The sender lives in `self`, so this only returns once the flag is set
        let _ = rx.wait_for(|cancelled| *cancelled).await;
    }

    /// Whether two handles refer to the same token
    pub fn same_as(&self, other: &CancelToken) -> bool {
        Arc::ptr_eq(&self.flag, &other.flag)
    }
}

impl Default for CancelToken {
    fn default() -> Self {
        Self::new()
    }
}
