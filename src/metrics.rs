//! Aggregation of trace metrics.

use std::mem;
use std::sync::{Mutex, MutexGuard, PoisonError};

use uuid::Uuid;

use crate::protocol::{Event, LogAttribute, Metric, MetricType};
use crate::Hub;

// Flush when there's 100 data points in the buffer
const MAX_ITEMS: usize = 100;

/// Collects counters, gauges and distributions and sends them as a single
/// envelope item.
///
/// Counters with the same name and attributes are summed and gauges keep
/// their latest value, so only distributions grow the buffer with every
/// call.  Each data point is linked to the trace of the hub's scope.
///
/// # Examples
///
/// ```
/// use sentry_pipeline::{Hub, MetricsAggregator};
///
/// let hub = Hub::current();
/// let metrics = MetricsAggregator::new();
/// metrics.count(&hub, "jobs.done", 1.0, []);
/// metrics.flush(&hub);
/// ```
#[derive(Debug, Default)]
pub struct MetricsAggregator {
    metrics: Mutex<Vec<Metric>>,
}

impl MetricsAggregator {
    /// Creates an empty aggregator.
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, Vec<Metric>> {
        self.metrics.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Increments a counter.
    pub fn count<I>(&self, hub: &Hub, name: &str, value: f64, attributes: I) -> bool
    where
        I: IntoIterator<Item = (String, LogAttribute)>,
    {
        self.record(hub, metric(name, MetricType::Counter, value, attributes))
    }

    /// Sets a gauge.
    pub fn gauge<I>(&self, hub: &Hub, name: &str, value: f64, attributes: I) -> bool
    where
        I: IntoIterator<Item = (String, LogAttribute)>,
    {
        self.record(hub, metric(name, MetricType::Gauge, value, attributes))
    }

    /// Adds a value to a distribution.
    pub fn distribution<I>(&self, hub: &Hub, name: &str, value: f64, attributes: I) -> bool
    where
        I: IntoIterator<Item = (String, LogAttribute)>,
    {
        self.record(hub, metric(name, MetricType::Distribution, value, attributes))
    }

    /// Records a prepared data point, e.g. one carrying a unit.
    ///
    /// Returns `false` without recording anything when the hub has no
    /// client bound.
    pub fn record(&self, hub: &Hub, mut metric: Metric) -> bool {
        let bound = hub.inner.with(|stack| {
            stack.client()?;
            stack.scopes().current().apply_to_metric(&mut metric);
            Some(())
        });
        if bound.is_none() {
            return false;
        }

        let mut metrics = self.lock();
        let existing = metrics.iter_mut().find(|m| {
            m.ty == metric.ty
                && m.ty != MetricType::Distribution
                && m.name == metric.name
                && m.unit == metric.unit
                && m.attributes == metric.attributes
        });
        match existing {
            Some(m) if m.ty == MetricType::Counter => m.value += metric.value,
            Some(m) => *m = metric,
            None => metrics.push(metric),
        }

        if metrics.len() >= MAX_ITEMS {
            let batch = mem::take(&mut *metrics);
            drop(metrics);
            Self::send(hub, batch);
        }
        true
    }

    /// The number of buffered data points.
    pub fn len(&self) -> usize {
        self.lock().len()
    }

    /// Whether nothing is buffered.
    pub fn is_empty(&self) -> bool {
        self.lock().is_empty()
    }

    /// Sends all buffered data points through `hub`.
    pub fn flush(&self, hub: &Hub) -> Option<Uuid> {
        let batch = mem::take(&mut *self.lock());
        Self::send(hub, batch)
    }

    fn send(hub: &Hub, batch: Vec<Metric>) -> Option<Uuid> {
        if batch.is_empty() {
            return None;
        }
        sentry_debug!("[MetricsAggregator] Flushing {} metrics", batch.len());
        hub.capture_event(Event::metrics(batch))
    }
}

fn metric<I>(name: &str, ty: MetricType, value: f64, attributes: I) -> Metric
where
    I: IntoIterator<Item = (String, LogAttribute)>,
{
    let mut metric = Metric::new(name, ty, value);
    metric.attributes.extend(attributes);
    metric
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::protocol::EventType;
    use crate::test::with_captured_events;

    #[test]
    fn test_aggregation() {
        let events = with_captured_events(|| {
            let hub = Hub::current();
            let metrics = MetricsAggregator::new();
            metrics.count(&hub, "jobs", 1.0, []);
            metrics.count(&hub, "jobs", 2.0, []);
            metrics.count(&hub, "jobs", 1.0, [("queue".to_owned(), "low".into())]);
            metrics.gauge(&hub, "depth", 7.0, []);
            metrics.gauge(&hub, "depth", 3.0, []);
            metrics.distribution(&hub, "latency", 0.25, []);
            metrics.distribution(&hub, "latency", 0.5, []);
            assert_eq!(metrics.len(), 5);
            metrics.flush(&hub);
        });

        assert_eq!(events.len(), 1);
        assert_eq!(events[0].ty, EventType::Metric);
        let metrics = &events[0].metrics;
        let values: Vec<_> = metrics.iter().map(|m| (m.name.as_str(), m.value)).collect();
        assert_eq!(
            values,
            [
                ("jobs", 3.0),
                ("jobs", 1.0),
                ("depth", 3.0),
                ("latency", 0.25),
                ("latency", 0.5)
            ]
        );
        assert!(metrics.iter().all(|m| m.trace_id.is_some()));
    }

    #[test]
    fn test_no_client_drops() {
        let hub = Hub::new(None, Default::default());
        let metrics = MetricsAggregator::new();
        assert!(!metrics.count(&hub, "lost", 1.0, []));
        assert!(metrics.flush(&hub).is_none());
    }
}
