use serde_json::to_value;

use super::{event_item, EnvelopeError, Item};
use crate::protocol::{Event, Value};

pub(super) fn to_item(event: &Event) -> Result<Item, EnvelopeError> {
    let mut body = event_item::body(event)?;
    body.insert("type".into(), "transaction".into());
    body.insert("spans".into(), to_value(&event.spans)?);
    Ok(Item::new("transaction", Value::Object(body)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::protocol::Span;

    #[test]
    fn test_transaction_lists_spans() {
        let mut event = Event::transaction();
        event.transaction = Some("GET /".into());
        let item = to_item(&event).unwrap();
        assert_eq!(item.header["type"], "transaction");
        assert_eq!(item.body["type"], "transaction");
        assert_eq!(item.body["spans"], Value::Array(vec![]));

        event.spans.push(Span {
            op: Some("db".into()),
            ..Default::default()
        });
        let item = to_item(&event).unwrap();
        assert_eq!(item.body["spans"][0]["op"], "db");
    }
}
