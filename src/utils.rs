//! Useful utilities for working with events.

use std::any::Any;
use std::convert::TryFrom;
use std::time::{Duration, SystemTime};

use serde_json::Value;
use time::format_description::well_known::Rfc3339;
use time::OffsetDateTime;
use uuid::Uuid;

/// Creates a random version 4 UUID.
pub(crate) fn random_uuid() -> Uuid {
    uuid::Builder::from_random_bytes(rand::random()).into_uuid()
}

/// Converts a `SystemTime` object into a float timestamp.
pub fn datetime_to_timestamp(st: &SystemTime) -> f64 {
    match st.duration_since(SystemTime::UNIX_EPOCH) {
        Ok(duration) => duration.as_secs_f64(),
        Err(_) => 0.0,
    }
}

/// Converts a float timestamp back into a `SystemTime`.
pub fn timestamp_to_datetime(ts: f64) -> Option<SystemTime> {
    let duration = Duration::try_from_secs_f64(ts).ok()?;
    SystemTime::UNIX_EPOCH.checked_add(duration)
}

/// Renders a timestamp as a JSON number of seconds since the epoch.
///
/// Whole seconds are written as integers, anything else keeps its fraction.
pub(crate) fn timestamp_value(st: &SystemTime) -> Value {
    match st.duration_since(SystemTime::UNIX_EPOCH) {
        Ok(duration) if duration.subsec_nanos() == 0 => Value::from(duration.as_secs()),
        Ok(duration) => Value::from(duration.as_secs_f64()),
        Err(_) => Value::from(0),
    }
}

pub(crate) mod ts_seconds_float {
    use std::time::SystemTime;

    use serde::Serializer;

    pub fn serialize<S: Serializer>(st: &SystemTime, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_f64(super::datetime_to_timestamp(st))
    }
}

/// The message of a panic payload, as passed to `panic!`.
pub(crate) fn panic_message(payload: &(dyn Any + Send)) -> &str {
    if let Some(message) = payload.downcast_ref::<&str>() {
        message
    } else if let Some(message) = payload.downcast_ref::<String>() {
        message
    } else {
        "Box<dyn Any>"
    }
}

/// Seconds since the epoch, saturating at zero.
pub(crate) fn unix_seconds(st: SystemTime) -> u64 {
    st.duration_since(SystemTime::UNIX_EPOCH)
        .map(|duration| duration.as_secs())
        .unwrap_or(0)
}

fn to_offset_datetime(st: &SystemTime) -> Option<OffsetDateTime> {
    st.duration_since(SystemTime::UNIX_EPOCH)
        .ok()
        .and_then(|duration| TryFrom::try_from(duration).ok())
        .and_then(|duration| OffsetDateTime::UNIX_EPOCH.checked_add(duration))
}

/// Formats a `SystemTime` as RFC 3339 in UTC.
pub fn to_rfc3339(st: &SystemTime) -> String {
    to_offset_datetime(st)
        .and_then(|dt| dt.format(&Rfc3339).ok())
        .unwrap_or_default()
}

/// Formats the `sent_at` envelope header: UTC with second precision.
pub(crate) fn format_sent_at(st: &SystemTime) -> String {
    to_offset_datetime(st)
        .and_then(|dt| dt.replace_nanosecond(0).ok())
        .and_then(|dt| dt.format(&Rfc3339).ok())
        .unwrap_or_default()
}

/// Parse the types name from `Debug` output.
///
/// # Examples
///
/// ```
/// use sentry_pipeline::utils::parse_type_from_debug;
///
/// let err = "NaN".parse::<usize>().unwrap_err();
/// assert_eq!(&parse_type_from_debug(&err), "ParseIntError");
/// ```
pub fn parse_type_from_debug<D: std::fmt::Debug + ?Sized>(d: &D) -> String {
    let dbg = format!("{:#?}", d);

    dbg.split(&[' ', '(', '{', '\r', '\n'][..])
        .next()
        .unwrap_or(&dbg)
        .trim()
        .to_owned()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_type_from_debug() {
        use parse_type_from_debug as parse;
        #[derive(Debug)]
        struct MyStruct;
        assert_eq!(&parse(&MyStruct), "MyStruct");

        let err = "NaN".parse::<usize>().unwrap_err();
        assert_eq!(&parse(&err), "ParseIntError");

        let err = crate::ParseDsnError::from(crate::ParseProjectIdError::EmptyValue);
        assert_eq!(&parse(&err), "InvalidProjectId");
    }

    #[test]
    fn test_sent_at_has_second_precision() {
        let st = SystemTime::UNIX_EPOCH + Duration::from_millis(1_597_790_835_250);
        assert_eq!(format_sent_at(&st), "2020-08-18T22:47:15Z");
    }

    #[test]
    fn test_timestamp_value() {
        let whole = SystemTime::UNIX_EPOCH + Duration::from_secs(1_597_790_835);
        assert_eq!(timestamp_value(&whole).to_string(), "1597790835");

        let fractional = SystemTime::UNIX_EPOCH + Duration::from_millis(1_500);
        assert_eq!(timestamp_value(&fractional).to_string(), "1.5");
    }

    #[test]
    fn test_timestamp_roundtrip() {
        let st = timestamp_to_datetime(1_597_790_835.5).unwrap();
        assert_eq!(datetime_to_timestamp(&st), 1_597_790_835.5);
        assert!(timestamp_to_datetime(-1.0).is_none());
    }

    #[test]
    fn test_panic_message() {
        let payload = std::panic::catch_unwind(|| panic!("static")).unwrap_err();
        assert_eq!(panic_message(payload.as_ref()), "static");

        let payload = std::panic::catch_unwind(|| panic!("job {}", 7)).unwrap_err();
        assert_eq!(panic_message(payload.as_ref()), "job 7");

        let payload = std::panic::catch_unwind(|| std::panic::panic_any(7_u8)).unwrap_err();
        assert_eq!(panic_message(payload.as_ref()), "Box<dyn Any>");
    }
}
