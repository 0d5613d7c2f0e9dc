use std::fmt;

use super::{Map, Value};

const SENTRY_PREFIX: &str = "sentry-";

/// Trace-level metadata that downstream services use for sampling decisions.
///
/// Entries keep their insertion order.  Once the context is frozen (because
/// it was propagated or received from upstream) further writes are ignored.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct DynamicSamplingContext {
    entries: Vec<(String, String)>,
    frozen: bool,
}

impl DynamicSamplingContext {
    /// Creates an empty, mutable context.
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets an entry, replacing a previous value under the same key.
    pub fn set(&mut self, key: &str, value: impl Into<String>) {
        if self.frozen {
            return;
        }
        let value = value.into();
        match self.entries.iter_mut().find(|(k, _)| k == key) {
            Some(entry) => entry.1 = value,
            None => self.entries.push((key.to_owned(), value)),
        }
    }

    /// Returns the value of an entry.
    pub fn get(&self, key: &str) -> Option<&str> {
        self.entries
            .iter()
            .find(|(k, _)| k == key)
            .map(|(_, v)| v.as_str())
    }

    /// Whether any entry was set.
    pub fn has_entries(&self) -> bool {
        !self.entries.is_empty()
    }

    /// Prevents further modification.
    pub fn freeze(&mut self) {
        self.frozen = true;
    }

    /// Whether the context was frozen.
    pub fn is_frozen(&self) -> bool {
        self.frozen
    }

    /// Iterates over all entries in insertion order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.entries.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }

    /// The entries as a JSON object for the envelope `trace` header.
    pub fn to_json(&self) -> Map<String, Value> {
        self.iter()
            .map(|(k, v)| (k.to_owned(), Value::from(v)))
            .collect()
    }

    /// Parses the `sentry-` members of a W3C `baggage` header.
    ///
    /// A context received this way is frozen.
    pub fn from_baggage(header: &str) -> Self {
        let mut dsc = DynamicSamplingContext::new();
        for member in header.split(',') {
            let Some((key, value)) = member.trim().split_once('=') else {
                continue;
            };
            if let Some(key) = key.trim().strip_prefix(SENTRY_PREFIX) {
                dsc.set(key, value.trim());
            }
        }
        if dsc.has_entries() {
            dsc.freeze();
        }
        dsc
    }
}

/// Renders the context as the `sentry-` members of a `baggage` header.
impl fmt::Display for DynamicSamplingContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, (key, value)) in self.iter().enumerate() {
            if i > 0 {
                f.write_str(",")?;
            }
            write!(f, "{}{}={}", SENTRY_PREFIX, key, value)?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_entries_keep_order_and_replace() {
        let mut dsc = DynamicSamplingContext::new();
        assert!(!dsc.has_entries());
        dsc.set("trace_id", "abc");
        dsc.set("public_key", "public");
        dsc.set("trace_id", "def");
        assert_eq!(dsc.get("trace_id"), Some("def"));
        assert_eq!(dsc.to_string(), "sentry-trace_id=def,sentry-public_key=public");
        assert_eq!(
            Value::Object(dsc.to_json()).to_string(),
            r#"{"trace_id":"def","public_key":"public"}"#
        );
    }

    #[test]
    fn test_baggage_parsing_freezes() {
        let mut dsc = DynamicSamplingContext::from_baggage(
            "other=1, sentry-trace_id=abc,sentry-sample_rate=0.5,broken",
        );
        assert!(dsc.is_frozen());
        dsc.set("release", "1.0");
        assert_eq!(dsc.get("release"), None);
        assert_eq!(dsc.get("sample_rate"), Some("0.5"));
        assert!(!DynamicSamplingContext::from_baggage("other=1").is_frozen());
    }
}
