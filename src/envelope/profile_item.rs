use super::Item;
use crate::protocol::Event;

/// The profile item for a transaction, if it recorded a usable profile.
pub(super) fn to_item(event: &Event) -> Option<Item> {
    let payload = event.profile.as_ref()?.to_payload(event)?;
    Some(Item::new("profile", payload))
}
