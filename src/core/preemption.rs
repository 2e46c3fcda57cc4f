//! Cooperative preemption of a running task.

use tokio_util::sync::CancellationToken;

/// Handle used to request and observe preemption of a task.
///
/// Clones share the same signal. The executor checks it between states and
/// hands it to leaves so they can cancel outstanding external goals.
#[derive(Clone, Debug, Default)]
pub struct Preemption {
    token: CancellationToken,
}

impl Preemption {
    pub fn new() -> Self {
        Self::default()
    }

    /// Request preemption. Idempotent.
    pub fn request(&self) {
        self.token.cancel();
    }

    pub fn is_requested(&self) -> bool {
        self.token.is_cancelled()
    }

    /// Resolves once preemption has been requested.
    pub async fn requested(&self) {
        self.token.cancelled().await;
    }

    /// A handle preempted together with `self`, which can also be preempted
    /// on its own without affecting `self`.
    pub fn child(&self) -> Self {
        Self {
            token: self.token.child_token(),
        }
    }
}
