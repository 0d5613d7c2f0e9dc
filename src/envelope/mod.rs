//! The wire format of everything sent to Sentry.
//!
//! An envelope is a JSON header line followed by one or more items, each of
//! which is an item header line followed by its body:
//!
//! ```text
//! {"event_id":"…","sent_at":"…","dsn":"…","sdk":{…}}
//! {"type":"event","content_type":"application/json"}
//! {"timestamp":1597790835,"platform":"native","sdk":{…}}
//! ```
//!
//! Item bodies are assembled field by field so that unset values are left out
//! entirely instead of being written as `null` or empty containers.

use std::io::Write;
use std::time::SystemTime;

use thiserror::Error;

use crate::constants::{SDK_NAME, VERSION};
use crate::protocol::{Event, EventType, Map, Value};
use crate::utils::format_sent_at;
use crate::{ClientOptions, Dsn};

mod check_in_item;
mod event_item;
mod logs_item;
mod metrics_item;
mod profile_item;
mod transaction_item;

/// An error raised while turning an [`Event`] into envelope bytes.
#[derive(Debug, Error)]
pub enum EnvelopeError {
    /// A payload could not be encoded as JSON.
    #[error("failed to encode envelope payload")]
    Json(#[from] serde_json::Error),
    /// Writing the envelope failed.
    #[error("failed to write envelope")]
    Io(#[from] std::io::Error),
    /// The event type requires a payload the event does not carry.
    #[error("{0} event is missing its payload")]
    MissingPayload(EventType),
    /// The event type cannot be sent as a standalone envelope.
    #[error("{0} events cannot be serialized on their own")]
    Unsupported(EventType),
}

/// A single envelope item: its header and its JSON body.
#[derive(Debug, Clone, PartialEq)]
pub(crate) struct Item {
    header: Map<String, Value>,
    body: Value,
}

impl Item {
    fn new(ty: &str, body: Value) -> Item {
        let mut header = Map::new();
        header.insert("type".into(), ty.into());
        header.insert("content_type".into(), "application/json".into());
        Item { header, body }
    }

    fn batch(ty: &str, content_type: &str, items: Vec<Value>) -> Item {
        let mut header = Map::new();
        header.insert("type".into(), ty.into());
        header.insert("item_count".into(), items.len().into());
        header.insert("content_type".into(), content_type.into());

        let mut body = Map::new();
        body.insert("items".into(), Value::Array(items));
        Item {
            header,
            body: Value::Object(body),
        }
    }
}

/// Converts events into the envelope byte format.
#[derive(Debug, Clone, Default)]
pub struct PayloadSerializer {
    dsn: Option<Dsn>,
}

impl PayloadSerializer {
    /// Creates a serializer that announces `dsn` in every envelope header.
    pub fn new(dsn: Option<Dsn>) -> Self {
        PayloadSerializer { dsn }
    }

    /// Creates a serializer for the DSN configured on `options`.
    pub fn from_options(options: &ClientOptions) -> Self {
        Self::new(options.dsn.clone())
    }

    /// Serializes `event` into an envelope, stamping it as sent now.
    pub fn serialize(&self, event: &Event) -> Result<Vec<u8>, EnvelopeError> {
        self.serialize_at(event, SystemTime::now())
    }

    /// Serializes `event` into an envelope, stamping it as sent at `sent_at`.
    pub fn serialize_at(&self, event: &Event, sent_at: SystemTime) -> Result<Vec<u8>, EnvelopeError> {
        let mut buf = Vec::new();
        self.to_writer(event, sent_at, &mut buf)?;
        Ok(buf)
    }

    /// Writes the envelope of `event` into the given [`Write`].
    pub fn to_writer<W: Write>(
        &self,
        event: &Event,
        sent_at: SystemTime,
        mut writer: W,
    ) -> Result<(), EnvelopeError> {
        let items = self.items(event)?;

        serde_json::to_writer(&mut writer, &self.header(event, sent_at))?;
        for item in items {
            writeln!(writer)?;
            serde_json::to_writer(&mut writer, &item.header)?;
            writeln!(writer)?;
            serde_json::to_writer(&mut writer, &item.body)?;
        }
        Ok(())
    }

    fn header(&self, event: &Event, sent_at: SystemTime) -> Map<String, Value> {
        let mut header = Map::new();
        header.insert(
            "event_id".into(),
            event.event_id.as_simple().to_string().into(),
        );
        header.insert("sent_at".into(), format_sent_at(&sent_at).into());
        if let Some(dsn) = &self.dsn {
            header.insert("dsn".into(), dsn.to_string().into());
        }

        let mut sdk = Map::new();
        match &event.sdk {
            Some(info) => {
                sdk.insert("name".into(), info.name.as_str().into());
                sdk.insert("version".into(), info.version.as_str().into());
            }
            None => {
                sdk.insert("name".into(), SDK_NAME.into());
                sdk.insert("version".into(), VERSION.into());
            }
        }
        header.insert("sdk".into(), Value::Object(sdk));

        if let Some(dsc) = &event.dynamic_sampling_context {
            if dsc.has_entries() {
                header.insert("trace".into(), Value::Object(dsc.to_json()));
            }
        }
        header
    }

    fn items(&self, event: &Event) -> Result<Vec<Item>, EnvelopeError> {
        Ok(match event.ty {
            EventType::Event => vec![event_item::to_item(event)?],
            EventType::Transaction => {
                let mut items = vec![transaction_item::to_item(event)?];
                if let Some(profile) = profile_item::to_item(event) {
                    items.push(profile);
                }
                items
            }
            EventType::CheckIn => vec![check_in_item::to_item(event)?],
            EventType::Log => vec![logs_item::to_item(event)?],
            EventType::Metric => vec![metrics_item::to_item(event)?],
            ty @ (EventType::Profile | EventType::ProfileChunk | EventType::Attachment) => {
                return Err(EnvelopeError::Unsupported(ty))
            }
        })
    }
}
