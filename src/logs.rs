//! Buffering of structured logs.

use std::mem;
use std::sync::{Mutex, MutexGuard, PoisonError};

use uuid::Uuid;

use crate::protocol::{Event, Log, LogAttribute, LogLevel};
use crate::Hub;

// Flush when there's 100 items in the buffer
const MAX_ITEMS: usize = 100;

/// Collects [`Log`]s and sends them as a single envelope item.
///
/// Every log is prepared through the client bound to the hub it is added
/// with: the scope's trace is attached, default attributes are filled in and
/// `before_send_log` runs.  The buffer is flushed automatically when it holds
/// 100 logs, and otherwise on [`flush`](Self::flush).
#[derive(Debug, Default)]
pub struct LogsAggregator {
    logs: Mutex<Vec<Log>>,
}

impl LogsAggregator {
    /// Creates an empty aggregator.
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, Vec<Log>> {
        self.logs.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Records a log line.
    ///
    /// Returns `false` when the log was not recorded, because no client is
    /// bound, logs are disabled or `before_send_log` dropped it.
    pub fn add<I>(&self, hub: &Hub, level: LogLevel, message: &str, attributes: I) -> bool
    where
        I: IntoIterator<Item = (String, LogAttribute)>,
    {
        let mut log = Log::new(level, message);
        log.attributes.extend(attributes);

        let prepared = hub.inner.with(|stack| {
            let client = stack.client()?;
            client.prepare_log(log, &stack.scopes().merged_scope())
        });
        let Some(log) = prepared else {
            return false;
        };

        let mut logs = self.lock();
        logs.push(log);
        if logs.len() >= MAX_ITEMS {
            let batch = mem::take(&mut *logs);
            drop(logs);
            Self::send(hub, batch);
        }
        true
    }

    /// The number of buffered logs.
    pub fn len(&self) -> usize {
        self.lock().len()
    }

    /// Whether nothing is buffered.
    pub fn is_empty(&self) -> bool {
        self.lock().is_empty()
    }

    /// Sends all buffered logs through `hub`.
    ///
    /// Returns the id of the envelope event, or `None` if the buffer was
    /// empty or the event was not sent.
    pub fn flush(&self, hub: &Hub) -> Option<Uuid> {
        let batch = mem::take(&mut *self.lock());
        Self::send(hub, batch)
    }

    fn send(hub: &Hub, batch: Vec<Log>) -> Option<Uuid> {
        if batch.is_empty() {
            return None;
        }
        sentry_debug!("[LogsAggregator] Flushing {} logs", batch.len());
        hub.capture_event(Event::logs(batch))
    }
}
