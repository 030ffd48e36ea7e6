use std::sync::Arc;

/// The user-facing debug channel.
///
/// Schema providers and projects report actionable problems here; the language
/// server forwards them to the client's output panel.
pub trait DebugLog: Send + Sync {
    fn info(&self, message: &str);
    fn warning(&self, message: &str);
    fn error(&self, message: &str);
}

/// Discards every message
#[derive(Debug, Default, Clone, Copy)]
pub struct NoopDebugLog;

impl DebugLog for NoopDebugLog {
    fn info(&self, _message: &str) {}
    fn warning(&self, _message: &str) {}
    fn error(&self, _message: &str) {}
}

/// Forwards messages to `tracing`
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingDebugLog;

impl DebugLog for TracingDebugLog {
    fn info(&self, message: &str) {
        tracing::info!(target: "graphql::debug", "{message}");
    }

    fn warning(&self, message: &str) {
        tracing::warn!(target: "graphql::debug", "{message}");
    }

    fn error(&self, message: &str) {
        tracing::error!(target: "graphql::debug", "{message}");
    }
}

#[must_use]
pub fn noop_log() -> Arc<dyn DebugLog> {
    Arc::new(NoopDebugLog)
}
