use super::{EnvelopeError, Item};
use crate::protocol::Event;

const CONTENT_TYPE: &str = "application/vnd.sentry.items.log+json";

pub(super) fn to_item(event: &Event) -> Result<Item, EnvelopeError> {
    let items = event
        .logs
        .iter()
        .map(serde_json::to_value)
        .collect::<Result<Vec<_>, _>>()?;
    Ok(Item::batch("log", CONTENT_TYPE, items))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::protocol::{Log, LogLevel};

    #[test]
    fn test_logs_item_counts_entries() {
        let event = Event::logs(vec![
            Log::new(LogLevel::Info, "first"),
            Log::new(LogLevel::Error, "second"),
        ]);
        let item = to_item(&event).unwrap();
        assert_eq!(
            serde_json::to_string(&item.header).unwrap(),
            r#"{"type":"log","item_count":2,"content_type":"application/vnd.sentry.items.log+json"}"#
        );
        assert_eq!(item.body["items"][1]["body"], "second");
    }
}
