use std::borrow::Cow;
use std::ffi::{OsStr, OsString};

use crate::{Dsn, ParseDsnError};

/// Conversion of configuration values into an optional DSN.
///
/// Empty strings, `None` and `()` disable the client; everything else is
/// parsed and may fail with a [`ParseDsnError`].
pub trait IntoDsn {
    /// Converts the value into a `Result<Option<Dsn>, E>`.
    fn into_dsn(self) -> Result<Option<Dsn>, ParseDsnError>;
}

fn parse_non_empty(value: &str) -> Result<Option<Dsn>, ParseDsnError> {
    match value.trim() {
        "" => Ok(None),
        value => value.parse().map(Some),
    }
}

macro_rules! impl_into_dsn_for_text {
    ($($ty:ty => |$value:ident| $as_str:expr;)*) => {
        $(
            impl IntoDsn for $ty {
                fn into_dsn(self) -> Result<Option<Dsn>, ParseDsnError> {
                    let $value = self;
                    parse_non_empty($as_str)
                }
            }
        )*
    };
}

impl_into_dsn_for_text! {
    &'_ str => |value| value;
    String => |value| &value;
    Cow<'_, str> => |value| &value;
    &'_ OsStr => |value| &value.to_string_lossy();
    OsString => |value| &value.to_string_lossy();
}

impl<I: IntoDsn> IntoDsn for Option<I> {
    fn into_dsn(self) -> Result<Option<Dsn>, ParseDsnError> {
        self.map_or(Ok(None), IntoDsn::into_dsn)
    }
}

impl IntoDsn for () {
    fn into_dsn(self) -> Result<Option<Dsn>, ParseDsnError> {
        Ok(None)
    }
}

impl IntoDsn for Dsn {
    fn into_dsn(self) -> Result<Option<Dsn>, ParseDsnError> {
        Ok(Some(self))
    }
}

impl IntoDsn for &'_ Dsn {
    fn into_dsn(self) -> Result<Option<Dsn>, ParseDsnError> {
        Ok(Some(self.clone()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_values_disable() {
        assert!("".into_dsn().unwrap().is_none());
        assert!("  ".into_dsn().unwrap().is_none());
        assert!(().into_dsn().unwrap().is_none());
        assert!(None::<&str>.into_dsn().unwrap().is_none());
    }

    #[test]
    fn test_text_values_parse() {
        let dsn = String::from("https://public@sentry.invalid/1")
            .into_dsn()
            .unwrap()
            .unwrap();
        assert_eq!(dsn.public_key(), "public");

        let os: OsString = "https://public@sentry.invalid/1".into();
        assert_eq!(os.into_dsn().unwrap(), Some(dsn));
        assert!("not a dsn".into_dsn().is_err());
    }
}
