//! Single-flight request slot.
//!
//! Owned by the calling UI layer. Starting a new request cancels whatever
//! request was still running, so at most one completion is live per session.

use std::sync::Mutex;
use tracing::debug;

use crate::completion::CancelToken;

#[derive(Debug, Default)]
pub struct RequestSlot {
    current: Mutex<Option<CancelToken>>,
}

impl RequestSlot {
    pub fn new() -> Self {
        Self::default()
    }

    /// Cancel the previous request (if any) and hand out a fresh token
    pub fn begin(&self) -> CancelToken {
        let token = CancelToken::new();
        let previous = self.lock().replace(token.clone());

        if let Some(previous) = previous {
            debug!("Cancelling previous request");
            previous.cancel();
        }
        token
    }

    /// Release the slot if `token` still owns it
    pub fn finish(&self, token: &CancelToken) {
        let mut current = self.lock();
        if current.as_ref().is_some_and(|held| held.same_as(token)) {
            *current = None;
        }
    }

    /// Cancel the active request, if any
    pub fn cancel(&self) -> bool {
        match self.lock().take() {
            Some(token) => {
                token.cancel();
                true
            }
            None => false,
        }
    }

    pub fn is_active(&self) -> bool {
        self.lock().is_some()
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, Option<CancelToken>> {
        // A poisoned slot still holds a usable token
        self.current
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}
