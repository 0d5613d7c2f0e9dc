//! Per unit-of-work bundles of hub and aggregators.
//!
//! A [`RuntimeContextManager`] maps an execution key to a [`RuntimeContext`].
//! Contexts are started when a request or job begins and ended when it
//! finishes, which flushes everything the context buffered.

use std::collections::HashMap;
use std::fmt;
use std::panic::{self, AssertUnwindSafe};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::thread;
use std::time::{Duration, Instant};

use crate::utils::panic_message;
use crate::{Hub, LogsAggregator, MetricsAggregator};

/// Resolves the key of the execution context the caller runs in.
///
/// At most one [`RuntimeContext`] is active per key.  Hosts that run several
/// units of work concurrently in one process plug in a resolver that tells
/// them apart.
pub trait ExecutionKeyResolver: Send + Sync {
    /// The key of the calling execution context.
    fn resolve(&self) -> String;
}

impl<F> ExecutionKeyResolver for F
where
    F: Fn() -> String + Send + Sync,
{
    fn resolve(&self) -> String {
        self()
    }
}

/// Resolves the same key everywhere in the process.
#[derive(Debug, Default, Clone, Copy)]
pub struct ProcessKeyResolver;

impl ExecutionKeyResolver for ProcessKeyResolver {
    fn resolve(&self) -> String {
        "process".to_owned()
    }
}

/// Resolves one key per OS thread.
#[derive(Debug, Default, Clone, Copy)]
pub struct ThreadKeyResolver;

impl ExecutionKeyResolver for ThreadKeyResolver {
    fn resolve(&self) -> String {
        format!("{:?}", thread::current().id())
    }
}

/// A hub plus the aggregators of one unit of work.
#[derive(Debug)]
pub struct RuntimeContext {
    key: String,
    hub: Arc<Hub>,
    logs: LogsAggregator,
    metrics: MetricsAggregator,
}

impl RuntimeContext {
    /// The execution key this context was started for.
    pub fn key(&self) -> &str {
        &self.key
    }

    /// The hub of this context.
    pub fn hub(&self) -> &Arc<Hub> {
        &self.hub
    }

    /// Buffered logs of this context.
    pub fn logs(&self) -> &LogsAggregator {
        &self.logs
    }

    /// Buffered metrics of this context.
    pub fn metrics(&self) -> &MetricsAggregator {
        &self.metrics
    }

    /// Runs `f` with this context's hub as the current hub of the thread.
    pub fn run<F: FnOnce() -> R, R>(&self, f: F) -> R {
        Hub::run(self.hub.clone(), f)
    }
}

/// Starts and ends [`RuntimeContext`]s.
///
/// Every context gets a fresh hub forked from the top layer of the base hub,
/// so scope changes inside a unit of work never leak into the next one.
///
/// # Examples
///
/// ```
/// use sentry_pipeline::{Hub, RuntimeContextManager};
///
/// let manager = RuntimeContextManager::new(Hub::main());
/// let context = manager.start_context();
/// context.hub().configure_scope(|scope| scope.set_tag("request", "42"));
/// assert!(manager.end_context(None));
/// assert!(manager.current_context().is_none());
/// ```
pub struct RuntimeContextManager {
    base: Arc<Hub>,
    resolver: Box<dyn ExecutionKeyResolver>,
    contexts: Mutex<HashMap<String, Arc<RuntimeContext>>>,
}

impl fmt::Debug for RuntimeContextManager {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RuntimeContextManager")
            .field("base", &self.base)
            .field("active", &self.lock().len())
            .finish()
    }
}

/// Runs one teardown step, logging instead of propagating its failure.
fn isolated<F: FnOnce() -> bool>(step: &str, key: &str, f: F) -> bool {
    match panic::catch_unwind(AssertUnwindSafe(f)) {
        Ok(true) => true,
        Ok(false) => {
            log::error!(target: "sentry", "[RuntimeContext {}] {} did not complete", key, step);
            false
        }
        Err(payload) => {
            log::error!(
                target: "sentry",
                "[RuntimeContext {}] {} panicked: {}",
                key,
                step,
                panic_message(payload.as_ref())
            );
            false
        }
    }
}

impl RuntimeContextManager {
    /// Creates a manager with one context per process.
    pub fn new(base: Arc<Hub>) -> Self {
        Self::with_resolver(base, ProcessKeyResolver)
    }

    /// Creates a manager resolving execution keys through `resolver`.
    pub fn with_resolver<R: ExecutionKeyResolver + 'static>(base: Arc<Hub>, resolver: R) -> Self {
        RuntimeContextManager {
            base,
            resolver: Box::new(resolver),
            contexts: Mutex::new(HashMap::new()),
        }
    }

    fn lock(&self) -> MutexGuard<'_, HashMap<String, Arc<RuntimeContext>>> {
        self.contexts.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Starts a context for the calling execution key.
    ///
    /// A context still active for the same key is ended first, flushing it
    /// with the client's `shutdown_timeout`.
    pub fn start_context(&self) -> Arc<RuntimeContext> {
        let key = self.resolver.resolve();
        let previous = self.lock().remove(&key);
        if let Some(previous) = previous {
            log::warn!(
                target: "sentry",
                "[RuntimeContext {}] started while still active, ending the previous one",
                key
            );
            Self::teardown(&previous, None);
        }

        let context = Arc::new(RuntimeContext {
            key: key.clone(),
            hub: Arc::new(Hub::new_from_top(&*self.base)),
            logs: LogsAggregator::new(),
            metrics: MetricsAggregator::new(),
        });
        sentry_debug!("[RuntimeContext {}] Started", key);
        self.lock().insert(key, context.clone());
        context
    }

    /// The active context of the calling execution key.
    pub fn current_context(&self) -> Option<Arc<RuntimeContext>> {
        let key = self.resolver.resolve();
        self.lock().get(&key).cloned()
    }

    /// The hub of the active context, or the base hub outside of contexts.
    pub fn current_hub(&self) -> Arc<Hub> {
        self.current_context()
            .map(|context| context.hub.clone())
            .unwrap_or_else(|| self.base.clone())
    }

    /// Ends the context of the calling execution key.
    ///
    /// Buffered logs and metrics are sent and the client is flushed within
    /// `timeout`.  A buffer whose turn comes after the timeout ran out is
    /// dropped instead of sent; a send that already started is not cut
    /// short.  Every step runs even if an earlier one failed; failures are
    /// logged.  Returns `false` if there was no active context or any
    /// step failed.
    pub fn end_context(&self, timeout: Option<Duration>) -> bool {
        let key = self.resolver.resolve();
        let Some(context) = self.lock().remove(&key) else {
            sentry_debug!("[RuntimeContext {}] No active context to end", key);
            return false;
        };
        Self::teardown(&context, timeout)
    }

    /// Runs `f` inside a fresh context that is ended afterwards.
    ///
    /// The context's hub is the current hub of the thread while `f` runs.
    pub fn with_context<F: FnOnce() -> R, R>(&self, timeout: Option<Duration>, f: F) -> R {
        let context = self.start_context();
        let rv = panic::catch_unwind(AssertUnwindSafe(|| context.run(f)));
        self.end_context(timeout);
        match rv {
            Ok(rv) => rv,
            Err(payload) => panic::resume_unwind(payload),
        }
    }

    fn teardown(context: &RuntimeContext, timeout: Option<Duration>) -> bool {
        let key = context.key.as_str();
        let hub = context.hub.as_ref();
        let deadline = timeout.map(|timeout| Instant::now() + timeout);
        let expired = || deadline.is_some_and(|deadline| Instant::now() >= deadline);

        let logs = isolated("logs flush", key, || {
            if expired() {
                return false;
            }
            context.logs.flush(hub);
            true
        });
        let metrics = isolated("metrics flush", key, || {
            if expired() {
                return false;
            }
            context.metrics.flush(hub);
            true
        });
        let client = isolated("client flush", key, || match hub.client() {
            Some(client) => {
                let remaining =
                    deadline.map(|deadline| deadline.saturating_duration_since(Instant::now()));
                client.flush(remaining)
            }
            None => true,
        });

        sentry_debug!("[RuntimeContext {}] Ended", key);
        logs && metrics && client
    }
}

impl Drop for RuntimeContextManager {
    fn drop(&mut self) {
        let contexts = self.contexts.get_mut().unwrap_or_else(PoisonError::into_inner);
        for (_, context) in contexts.drain() {
            Self::teardown(&context, None);
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};

    use super::*;
    use crate::test::{TestTransport, TEST_DSN};
    use crate::ClientOptions;

    #[test]
    fn test_contexts_do_not_share_scope() {
        let manager = RuntimeContextManager::new(Arc::new(Hub::new(None, Default::default())));
        let first = manager.start_context();
        first.hub().with_current_scope_mut(|scope| scope.set_tag("request", "1"));
        manager.end_context(None);

        let second = manager.start_context();
        assert!(!Arc::ptr_eq(first.hub(), second.hub()));
        second
            .hub()
            .with_current_scope(|scope| assert!(scope.tag("request").is_none()));
    }

    #[test]
    fn test_end_without_start() {
        let manager = RuntimeContextManager::new(Arc::new(Hub::new(None, Default::default())));
        assert!(!manager.end_context(None));
        assert!(manager.start_context().key() == "process");
        assert!(manager.end_context(Some(Duration::from_millis(10))));
        assert!(!manager.end_context(None));
    }

    #[test]
    fn test_custom_resolver() {
        static CALLS: AtomicUsize = AtomicUsize::new(0);
        let manager = RuntimeContextManager::with_resolver(
            Arc::new(Hub::new(None, Default::default())),
            || format!("fiber-{}", CALLS.fetch_add(1, Ordering::SeqCst) % 2),
        );
        let a = manager.start_context();
        let b = manager.start_context();
        assert_eq!(a.key(), "fiber-0");
        assert_eq!(b.key(), "fiber-1");
    }

    #[test]
    fn test_expired_timeout_skips_buffer_flushes() {
        let transport = TestTransport::new();
        let options = ClientOptions {
            dsn: Some(TEST_DSN.clone()),
            transport: Some(Arc::new(transport.clone())),
            ..Default::default()
        };
        let hub = Hub::new(Some(Arc::new(options.into())), Default::default());
        let manager = RuntimeContextManager::new(Arc::new(hub));

        let context = manager.start_context();
        context.metrics().count(context.hub(), "jobs.started", 1.0, []);
        assert!(!manager.end_context(Some(Duration::ZERO)));
        assert!(transport.fetch_and_clear_events().is_empty());

        let context = manager.start_context();
        context.metrics().count(context.hub(), "jobs.started", 1.0, []);
        assert!(manager.end_context(Some(Duration::from_secs(5))));
        assert_eq!(transport.fetch_and_clear_events().len(), 1);
    }

    #[test]
    fn test_isolated_step_logs_panics() {
        assert!(!isolated("boom", "test", || panic!("step failed")));
        assert!(!isolated("slow", "test", || false));
        assert!(isolated("fine", "test", || true));
    }
}
