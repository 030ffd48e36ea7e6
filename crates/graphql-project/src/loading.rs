use std::fmt::Display;
use std::future::Future;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

/// Receives loading progress for display in the client
pub trait LoadingNotifier: Send + Sync {
    fn started(&self, token: u64, title: &str);
    fn completed(&self, token: u64);
    fn show_error(&self, message: &str);
}

/// Ignores all progress
#[derive(Debug, Default, Clone, Copy)]
pub struct NoopLoadingNotifier;

impl LoadingNotifier for NoopLoadingNotifier {
    fn started(&self, _token: u64, _title: &str) {}
    fn completed(&self, _token: u64) {}
    fn show_error(&self, _message: &str) {}
}

/// Wraps long-running work in started/completed notifications.
///
/// Every `started` is matched by exactly one `completed`, including when the
/// work fails or its future is dropped early.
pub struct LoadingHandler {
    notifier: Arc<dyn LoadingNotifier>,
    next_token: AtomicU64,
}

struct Completion<'a> {
    notifier: &'a dyn LoadingNotifier,
    token: u64,
}

impl Drop for Completion<'_> {
    fn drop(&mut self) {
        self.notifier.completed(self.token);
    }
}

impl LoadingHandler {
    #[must_use]
    pub fn new(notifier: Arc<dyn LoadingNotifier>) -> Self {
        Self {
            notifier,
            next_token: AtomicU64::new(0),
        }
    }

    /// Run `task`, showing `title` while it is in progress. Failures are shown
    /// to the user and then returned.
    pub async fn handle<T, E, F>(&self, title: &str, task: F) -> Result<T, E>
    where
        E: Display,
        F: Future<Output = Result<T, E>>,
    {
        let token = self.next_token.fetch_add(1, Ordering::Relaxed) + 1;
        self.notifier.started(token, title);
        let _completion = Completion {
            notifier: self.notifier.as_ref(),
            token,
        };

        task.await.inspect_err(|error| {
            tracing::error!(token, error = %error, "{title} failed");
            self.notifier.show_error(&format!("{title}: {error}"));
        })
    }
}

impl Default for LoadingHandler {
    fn default() -> Self {
        Self::new(Arc::new(NoopLoadingNotifier))
    }
}

impl std::fmt::Debug for LoadingHandler {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LoadingHandler")
            .field("next_token", &self.next_token)
            .finish_non_exhaustive()
    }
}
