//! The in-memory data model of everything this crate captures.
//!
//! Nested payload pieces (users, breadcrumbs, exceptions, spans, …) carry
//! serde derives that already omit empty fields.  The top-level item bodies
//! are assembled field by field in the [`envelope`](crate::envelope) module.

mod breadcrumb;
mod dsc;
mod event;
mod exception;
mod log;
mod metric;
mod monitor;
mod profile;
mod span;
mod user;

pub use self::breadcrumb::Breadcrumb;
pub use self::dsc::DynamicSamplingContext;
pub use self::event::{
    ClientSdkInfo, ClientSdkPackage, Event, EventType, Level, ParseLevelError,
};
pub use self::exception::{Exception, Frame, Mechanism, Stacktrace};
pub use self::log::{Log, LogAttribute, LogLevel};
pub use self::metric::{Metric, MetricType};
pub use self::monitor::{
    CheckIn, CheckInStatus, MonitorConfig, MonitorIntervalUnit, MonitorSchedule,
    ParseCheckInStatusError,
};
pub use self::profile::{Profile, ProfileFrame, ProfileSample};
pub use self::span::{ParseStatusError, Span, SpanId, SpanStatus, TraceContext, TraceId};
pub use self::user::User;

pub use serde_json::{Map, Value};

/// Arbitrary named context data, e.g. `os`, `runtime` or `trace`.
pub type Context = Map<String, Value>;
