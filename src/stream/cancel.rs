use std::sync::{Arc, Mutex, PoisonError};

pub use tokio_util::sync::CancellationToken;

/// Token of a started request, tagged so only its own `end` clears the slot.
#[derive(Debug, Clone)]
pub struct ActiveRequest {
    id: u64,
    token: CancellationToken,
}

impl ActiveRequest {
    pub fn token(&self) -> &CancellationToken {
        &self.token
    }
}

#[derive(Debug, Default)]
struct Slot {
    next_id: u64,
    active: Option<ActiveRequest>,
}

/// Tracks the one in-flight request of a conversation view.
///
/// Clones share the same slot, so the UI can keep one to cancel whatever
/// request is currently running.
#[derive(Debug, Clone, Default)]
pub struct StreamController {
    slot: Arc<Mutex<Slot>>,
}

impl StreamController {
    pub fn new() -> Self {
        Self::default()
    }

    /// Install a fresh token, cancelling the previous request if any.
    pub fn begin(&self) -> ActiveRequest {
        let mut slot = self.slot.lock().unwrap_or_else(PoisonError::into_inner);
        slot.next_id += 1;
        let request = ActiveRequest {
            id: slot.next_id,
            token: CancellationToken::new(),
        };
        if let Some(previous) = slot.active.replace(request.clone()) {
            if !previous.token.is_cancelled() {
                previous.token.cancel();
                tracing::debug!("cancelled previous in-flight request");
            }
        }
        request
    }

    /// Cancel the active request. Returns false when there was nothing left
    /// to cancel, so calling it again is a no-op.
    pub fn cancel(&self) -> bool {
        let slot = self.slot.lock().unwrap_or_else(PoisonError::into_inner);
        match &slot.active {
            Some(request) if !request.token.is_cancelled() => {
                request.token.cancel();
                true
            }
            _ => false,
        }
    }

    pub fn is_active(&self) -> bool {
        let slot = self.slot.lock().unwrap_or_else(PoisonError::into_inner);
        slot.active
            .as_ref()
            .is_some_and(|request| !request.token.is_cancelled())
    }

    /// Release the slot if it still holds `request`.
    pub fn end(&self, request: &ActiveRequest) {
        let mut slot = self.slot.lock().unwrap_or_else(PoisonError::into_inner);
        if slot.active.as_ref().is_some_and(|r| r.id == request.id) {
            slot.active = None;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[test]
    fn second_cancel_is_a_no_op() {
        let controller = StreamController::new();
        let request = controller.begin();

        assert!(controller.cancel());
        assert!(!controller.cancel());
        assert!(request.token().is_cancelled());
        assert!(!controller.is_active());
    }

    #[tokio::test]
    async fn cancel_wakes_the_waiting_request() {
        let controller = StreamController::new();
        let token = controller.begin().token().clone();
        let handle = tokio::spawn(async move { token.cancelled().await });

        tokio::time::sleep(Duration::from_millis(5)).await;
        controller.cancel();

        tokio::time::timeout(Duration::from_secs(1), handle)
            .await
            .expect("cancelled() should resolve")
            .unwrap();
    }

    #[test]
    fn begin_cancels_the_previous_request() {
        let controller = StreamController::new();
        let first = controller.begin();
        let second = controller.begin();

        assert!(first.token().is_cancelled());
        assert!(!second.token().is_cancelled());
        assert!(controller.is_active());
    }

    #[test]
    fn end_only_releases_its_own_request() {
        let controller = StreamController::new();
        let first = controller.begin();
        let second = controller.begin();

        controller.end(&first);
        assert!(controller.is_active());

        controller.end(&second);
        assert!(!controller.is_active());
        assert!(!controller.cancel());
    }
}
