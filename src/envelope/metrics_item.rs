use super::{EnvelopeError, Item};
use crate::protocol::Event;

const CONTENT_TYPE: &str = "application/vnd.sentry.items.trace-metric+json";

pub(super) fn to_item(event: &Event) -> Result<Item, EnvelopeError> {
    let items = event
        .metrics
        .iter()
        .map(serde_json::to_value)
        .collect::<Result<Vec<_>, _>>()?;
    Ok(Item::batch("trace_metric", CONTENT_TYPE, items))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::protocol::{Metric, MetricType};

    #[test]
    fn test_metrics_item() {
        let event = Event::metrics(vec![Metric::new("jobs", MetricType::Counter, 1.0)]);
        let item = to_item(&event).unwrap();
        assert_eq!(item.header["type"], "trace_metric");
        assert_eq!(item.header["item_count"], 1);
        assert_eq!(item.body["items"][0]["type"], "counter");
    }
}
