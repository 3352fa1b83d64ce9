//! `RequestController` (spec §3, §4.4): per-user-request lifecycle,
//! cancellation propagation, and read/write classification.

use kubectl_ai_core::OperationKind;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Mutex;
use tokio_util::sync::CancellationToken;

pub struct RequestController {
    id: String,
    cancel: CancellationToken,
    children: Mutex<Vec<CancellationToken>>,
    operation_kind: Mutex<OperationKind>,
    cancel_requested: AtomicBool,
}

impl RequestController {
    /// Starts a new request derived from the agent's base cancellation
    /// token (spec §4.4: "a context derived from the agent's base context").
    pub fn new(base: &CancellationToken) -> Self {
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            cancel: base.child_token(),
            children: Mutex::new(Vec::new()),
            operation_kind: Mutex::new(OperationKind::Read),
            cancel_requested: AtomicBool::new(false),
        }
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    /// The scoped token passed to the LLM stream and tool invocations.
    pub fn token(&self) -> CancellationToken {
        self.cancel.clone()
    }

    /// A child token derived from this request's scope; registered so a
    /// top-level cancel reaches it too (spec §4.4: "registers its cancel
    /// function with the controller").
    pub fn child_token(&self) -> CancellationToken {
        let child = self.cancel.child_token();
        self.children.lock().unwrap().push(child.clone());
        child
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancel.is_cancelled()
    }

    /// Atomically flips `cancel_requested`; returns `false` if a cancel is
    /// already in flight (spec §4.4: `MarkCancellationPending`).
    pub fn mark_cancellation_pending(&self) -> bool {
        self.cancel_requested
            .compare_exchange(false, true, Ordering::SeqCst, Ordering::SeqCst)
            .is_ok()
    }

    /// Cancels every registered child token, then the main token.
    pub fn cancel(&self) {
        for child in self.children.lock().unwrap().iter() {
            child.cancel();
        }
        self.cancel.cancel();
    }

    pub fn operation_kind(&self) -> OperationKind {
        *self.operation_kind.lock().unwrap()
    }

    /// Latches to `Write` once any dispatched call is non-`"no"` classified
    /// (spec §4.4, open-question resolution).
    pub fn set_operation_kind(&self, kind: OperationKind) {
        let mut current = self.operation_kind.lock().unwrap();
        *current = current.merge(kind);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cancel_pending_only_flips_once() {
        let base = CancellationToken::new();
        let controller = RequestController::new(&base);
        assert!(controller.mark_cancellation_pending());
        assert!(!controller.mark_cancellation_pending());
    }

    #[test]
    fn cancel_propagates_to_children() {
        let base = CancellationToken::new();
        let controller = RequestController::new(&base);
        let child = controller.child_token();
        controller.cancel();
        assert!(child.is_cancelled());
        assert!(controller.is_cancelled());
    }

    #[test]
    fn operation_kind_latches_to_write() {
        let base = CancellationToken::new();
        let controller = RequestController::new(&base);
        assert_eq!(controller.operation_kind(), OperationKind::Read);
        controller.set_operation_kind(OperationKind::Write);
        controller.set_operation_kind(OperationKind::Read);
        assert_eq!(controller.operation_kind(), OperationKind::Write);
    }
}
