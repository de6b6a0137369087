use std::collections::HashMap;

use tokio::sync::Mutex;
use tokio_util::sync::CancellationToken;

use crate::domain::UserId;

#[derive(Debug)]
struct TaskState {
    active: bool,
    cancel: CancellationToken,
}

/// Per-user "a check is running" bookkeeping.
///
/// At most one entry per user; no entry means no task. The flag is advisory:
/// `start` never refuses a second submission, it hands back the token that is
/// already registered so a single `/stop` cancels every in-flight check for
/// that user.
///
/// `finish` removes the entry unconditionally. If a stopped check is
/// resubmitted before the stopped one returns, the stopped one's `finish`
/// drops the entry the new check runs under: `/stop` then reports nothing to
/// stop and cannot cancel the new check.
#[derive(Debug, Default)]
pub struct TaskRegistry {
    inner: Mutex<HashMap<UserId, TaskState>>,
}

impl TaskRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Mark `user_id` active and return the cancellation token for its work.
    pub async fn start(&self, user_id: UserId) -> CancellationToken {
        let mut map = self.inner.lock().await;
        let state = map.entry(user_id).or_insert_with(|| TaskState {
            active: true,
            cancel: CancellationToken::new(),
        });
        if state.cancel.is_cancelled() {
            // A stopped task that has not finished yet: new work gets a live token.
            state.cancel = CancellationToken::new();
        }
        state.active = true;
        state.cancel.clone()
    }

    pub async fn is_active(&self, user_id: UserId) -> bool {
        self.inner
            .lock()
            .await
            .get(&user_id)
            .map(|s| s.active)
            .unwrap_or(false)
    }

    /// Clear the active flag and cancel in-flight work.
    ///
    /// Returns whether an entry existed. The entry itself stays until `finish`.
    pub async fn stop(&self, user_id: UserId) -> bool {
        let mut map = self.inner.lock().await;
        let Some(state) = map.get_mut(&user_id) else {
            return false;
        };
        state.active = false;
        state.cancel.cancel();
        true
    }

    /// Remove the entry regardless of its state.
    pub async fn finish(&self, user_id: UserId) {
        self.inner.lock().await.remove(&user_id);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn finish_of_a_stopped_check_drops_its_replacement() {
        let reg = TaskRegistry::new();
        let first = reg.start(UserId(1)).await;
        assert!(reg.stop(UserId(1)).await);
        let second = reg.start(UserId(1)).await;
        assert!(first.is_cancelled());
        assert!(!second.is_cancelled());

        // The stopped check returns and cleans up after the resubmission.
        reg.finish(UserId(1)).await;
        assert!(!reg.stop(UserId(1)).await);
        assert!(!second.is_cancelled());
    }

    #[tokio::test]
    async fn lifecycle_start_stop_finish() {
        let reg = TaskRegistry::new();
        assert!(!reg.is_active(UserId(1)).await);

        let token = reg.start(UserId(1)).await;
        assert!(reg.is_active(UserId(1)).await);
        assert!(!token.is_cancelled());

        assert!(reg.stop(UserId(1)).await);
        assert!(!reg.is_active(UserId(1)).await);
        assert!(token.is_cancelled());

        reg.finish(UserId(1)).await;
        assert!(!reg.stop(UserId(1)).await);
    }

    #[tokio::test]
    async fn stop_without_task_reports_nothing_found() {
        let reg = TaskRegistry::new();
        assert!(!reg.stop(UserId(42)).await);
    }

    #[tokio::test]
    async fn start_is_idempotent_and_shares_the_token() {
        let reg = TaskRegistry::new();
        let a = reg.start(UserId(1)).await;
        let b = reg.start(UserId(1)).await;
        assert!(reg.stop(UserId(1)).await);
        assert!(a.is_cancelled());
        assert!(b.is_cancelled());
    }

    #[tokio::test]
    async fn restart_after_stop_gets_a_live_token() {
        let reg = TaskRegistry::new();
        let old = reg.start(UserId(1)).await;
        reg.stop(UserId(1)).await;
        let new = reg.start(UserId(1)).await;
        assert!(old.is_cancelled());
        assert!(!new.is_cancelled());
        assert!(reg.is_active(UserId(1)).await);
    }

    #[tokio::test]
    async fn finish_is_per_user() {
        let reg = TaskRegistry::new();
        reg.start(UserId(1)).await;
        reg.start(UserId(2)).await;
        reg.finish(UserId(1)).await;
        assert!(!reg.is_active(UserId(1)).await);
        assert!(reg.is_active(UserId(2)).await);
    }
}
