use std::collections::HashMap;
use std::future::Future;
use std::hash::Hash;
use std::sync::{Arc, Mutex, PoisonError};
use std::time::{Duration, Instant};
use tokio::sync::OnceCell;

pub const DEFAULT_WINDOW: Duration = Duration::from_millis(100);

struct Entry<V> {
    started: Instant,
    result: Arc<OnceCell<V>>,
}

/// Leading-edge debounce for editor requests.
///
/// The first request for a key runs right away. Identical requests that
/// arrive within `window` of it share its result instead of running again,
/// including while the first one is still in progress.
pub struct Debouncer<K, V> {
    window: Duration,
    entries: Mutex<HashMap<K, Entry<V>>>,
}

impl<K, V> Debouncer<K, V>
where
    K: Eq + Hash,
    V: Clone,
{
    #[must_use]
    pub fn new(window: Duration) -> Self {
        Self {
            window,
            entries: Mutex::new(HashMap::new()),
        }
    }

    pub async fn run<F, Fut>(&self, key: K, request: F) -> V
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = V>,
    {
        let result = {
            let mut entries = self.entries.lock().unwrap_or_else(PoisonError::into_inner);
            entries.retain(|_, entry| entry.started.elapsed() < self.window);
            let entry = entries.entry(key).or_insert_with(|| Entry {
                started: Instant::now(),
                result: Arc::new(OnceCell::new()),
            });
            Arc::clone(&entry.result)
        };

        result.get_or_init(request).await.clone()
    }
}

impl<K, V> Default for Debouncer<K, V>
where
    K: Eq + Hash,
    V: Clone,
{
    fn default() -> Self {
        Self::new(DEFAULT_WINDOW)
    }
}

impl<K, V> std::fmt::Debug for Debouncer<K, V> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Debouncer")
            .field("window", &self.window)
            .finish_non_exhaustive()
    }
}

/// Identity of a positional request against one document version
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct RequestKey {
    pub uri: String,
    pub version: Option<i32>,
    pub position: Option<(u32, u32)>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn counted(calls: &AtomicUsize) -> impl Future<Output = usize> + '_ {
        async move { calls.fetch_add(1, Ordering::SeqCst) + 1 }
    }

    #[tokio::test]
    async fn test_repeated_request_reuses_leading_result() {
        let debouncer = Debouncer::new(Duration::from_secs(60));
        let calls = AtomicUsize::new(0);

        assert_eq!(debouncer.run("hover", || counted(&calls)).await, 1);
        assert_eq!(debouncer.run("hover", || counted(&calls)).await, 1);
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_distinct_keys_run_independently() {
        let debouncer = Debouncer::new(Duration::from_secs(60));
        let calls = AtomicUsize::new(0);

        assert_eq!(debouncer.run("hover", || counted(&calls)).await, 1);
        assert_eq!(debouncer.run("completion", || counted(&calls)).await, 2);
    }

    #[tokio::test]
    async fn test_request_runs_again_after_window() {
        let debouncer = Debouncer::new(Duration::from_millis(20));
        let calls = AtomicUsize::new(0);

        debouncer.run("hover", || counted(&calls)).await;
        tokio::time::sleep(Duration::from_millis(40)).await;
        assert_eq!(debouncer.run("hover", || counted(&calls)).await, 2);
    }

    #[tokio::test]
    async fn test_concurrent_requests_wait_for_leader() {
        let debouncer = Debouncer::new(Duration::from_secs(60));
        let calls = AtomicUsize::new(0);

        let calls_ref = &calls;
        let slow = move || async move {
            tokio::time::sleep(Duration::from_millis(10)).await;
            calls_ref.fetch_add(1, Ordering::SeqCst) + 1
        };
        let (first, second) = tokio::join!(debouncer.run("lens", slow), debouncer.run("lens", slow));

        assert_eq!((first, second), (1, 1));
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }
}
