use std::future::Future;
use std::sync::Mutex;
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tracing::debug;

pub(crate) const RECONCILE_DELAY: Duration = Duration::from_millis(500);
/// Documents assembled asynchronously by the agent subsystem need longer
/// before the backend's record is final.
pub(crate) const DOCUMENT_RECONCILE_DELAY: Duration = Duration::from_millis(2500);

const AGENT_URL_SCHEME: &str = "agent://";

pub(crate) fn reconcile_delay(download_url: Option<&str>) -> Duration {
    match download_url {
        Some(url) if url.starts_with(AGENT_URL_SCHEME) => DOCUMENT_RECONCILE_DELAY,
        _ => RECONCILE_DELAY,
    }
}

struct Pending {
    chat_id: i64,
    token: CancellationToken,
}

/// Schedules the deferred history re-fetch that runs after a completion
/// event. At most one reconciliation is pending at a time; scheduling a new
/// one, or switching away from its chat, cancels the old one.
#[derive(Default)]
pub(crate) struct Reconciler {
    pending: Mutex<Option<Pending>>,
}

impl Reconciler {
    /// Runs `job` after `delay` unless cancelled first. The job itself is
    /// responsible for its own failure handling; reconciliation failures
    /// are logged, never surfaced.
    pub(crate) fn schedule<F>(&self, chat_id: i64, delay: Duration, job: F)
    where
        F: Future<Output = ()> + Send + 'static,
    {
        let token = CancellationToken::new();
        let task_token = token.clone();
        if let Some(old) = self
            .pending
            .lock()
            .expect("reconciler lock poisoned")
            .replace(Pending { chat_id, token })
        {
            old.token.cancel();
        }

        tokio::spawn(async move {
            tokio::select! {
                _ = task_token.cancelled() => {
                    debug!(chat_id, "reconciliation cancelled");
                }
                _ = tokio::time::sleep(delay) => {
                    job.await;
                }
            }
        });
    }

    pub(crate) fn cancel(&self) {
        if let Some(pending) = self.pending.lock().expect("reconciler lock poisoned").take() {
            pending.token.cancel();
        }
    }

    /// Cancels the pending reconciliation unless it belongs to `chat_id`.
    /// Used when switching chats: the new chat's history fetch supersedes
    /// any reconciliation still owed to the old one.
    pub(crate) fn cancel_for_other_chats(&self, chat_id: i64) {
        let mut pending = self.pending.lock().expect("reconciler lock poisoned");
        if let Some(p) = pending.as_ref() {
            if p.chat_id != chat_id {
                p.token.cancel();
                *pending = None;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    #[test]
    fn test_delay_selection() {
        assert_eq!(reconcile_delay(None), RECONCILE_DELAY);
        assert_eq!(reconcile_delay(Some("/files/out.pdf")), RECONCILE_DELAY);
        assert_eq!(
            reconcile_delay(Some("agent://documents/17")),
            DOCUMENT_RECONCILE_DELAY
        );
    }

    #[tokio::test(start_paused = true)]
    async fn test_job_runs_after_delay() {
        let reconciler = Reconciler::default();
        let ran = Arc::new(AtomicUsize::new(0));
        let counter = ran.clone();
        reconciler.schedule(1, Duration::from_millis(500), async move {
            counter.fetch_add(1, Ordering::SeqCst);
        });

        tokio::time::sleep(Duration::from_millis(600)).await;
        tokio::task::yield_now().await;
        assert_eq!(ran.load(Ordering::SeqCst), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_rescheduling_cancels_previous() {
        let reconciler = Reconciler::default();
        let ran = Arc::new(AtomicUsize::new(0));

        let first = ran.clone();
        reconciler.schedule(1, Duration::from_millis(500), async move {
            first.fetch_add(1, Ordering::SeqCst);
        });
        let second = ran.clone();
        reconciler.schedule(1, Duration::from_millis(500), async move {
            second.fetch_add(10, Ordering::SeqCst);
        });

        tokio::time::sleep(Duration::from_millis(600)).await;
        tokio::task::yield_now().await;
        assert_eq!(ran.load(Ordering::SeqCst), 10);
    }

    #[tokio::test(start_paused = true)]
    async fn test_cancel_for_other_chats() {
        let reconciler = Reconciler::default();
        let ran = Arc::new(AtomicUsize::new(0));
        let counter = ran.clone();
        reconciler.schedule(1, Duration::from_millis(500), async move {
            counter.fetch_add(1, Ordering::SeqCst);
        });

        // Same chat: the pending reconciliation survives.
        reconciler.cancel_for_other_chats(1);
        // Different chat: cancelled.
        reconciler.cancel_for_other_chats(2);

        tokio::time::sleep(Duration::from_millis(600)).await;
        tokio::task::yield_now().await;
        assert_eq!(ran.load(Ordering::SeqCst), 0);
    }
}
