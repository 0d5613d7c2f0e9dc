use std::collections::BTreeMap;
use std::fmt;
use std::str;
use std::time::SystemTime;

use serde::{Deserialize, Serialize};
use thiserror::Error;
use uuid::Uuid;

use super::{
    Breadcrumb, CheckIn, Context, DynamicSamplingContext, Exception, Log, Map, Metric, Profile,
    Span, Stacktrace, User, Value,
};
use crate::utils::{random_uuid, to_rfc3339};

/// The kind of payload an [`Event`] carries.
///
/// Besides selecting the envelope item, this decides which rate limit
/// category guards the event.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EventType {
    /// A regular error or message event.
    #[default]
    Event,
    /// A finished performance transaction.
    Transaction,
    /// A cron monitor check-in.
    CheckIn,
    /// A batch of structured logs.
    Log,
    /// A batch of trace metrics.
    Metric,
    /// A standalone profile.
    Profile,
    /// A continuous profiling chunk.
    ProfileChunk,
    /// A file attachment.
    Attachment,
}

impl EventType {
    /// The envelope item type name.
    pub fn as_str(self) -> &'static str {
        match self {
            EventType::Event => "event",
            EventType::Transaction => "transaction",
            EventType::CheckIn => "check_in",
            EventType::Log => "log",
            EventType::Metric => "trace_metric",
            EventType::Profile => "profile",
            EventType::ProfileChunk => "profile_chunk",
            EventType::Attachment => "attachment",
        }
    }
}

impl fmt::Display for EventType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// An error used when parsing `Level`.
#[derive(Debug, Error)]
#[error("invalid level")]
pub struct ParseLevelError;

/// Represents the level of severity of an event or breadcrumb.
#[derive(Serialize, Deserialize, Debug, Default, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[serde(rename_all = "lowercase")]
pub enum Level {
    /// Indicates very spammy debug information.
    Debug,
    /// Informational messages.
    #[default]
    Info,
    /// A warning.
    Warning,
    /// An error.
    Error,
    /// Similar to error but indicates a critical event that usually causes a shutdown.
    Fatal,
}

impl str::FromStr for Level {
    type Err = ParseLevelError;

    fn from_str(string: &str) -> Result<Level, Self::Err> {
        Ok(match string {
            "debug" => Level::Debug,
            "info" | "log" => Level::Info,
            "warning" => Level::Warning,
            "error" => Level::Error,
            "fatal" => Level::Fatal,
            _ => return Err(ParseLevelError),
        })
    }
}

impl fmt::Display for Level {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match *self {
            Level::Debug => write!(f, "debug"),
            Level::Info => write!(f, "info"),
            Level::Warning => write!(f, "warning"),
            Level::Error => write!(f, "error"),
            Level::Fatal => write!(f, "fatal"),
        }
    }
}

impl Level {
    /// A quick way to check if the level is `info`.
    pub fn is_info(&self) -> bool {
        *self == Level::Info
    }
}

/// Information on the SDK client.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct ClientSdkInfo {
    /// The name of the SDK.
    pub name: String,
    /// The version of the SDK.
    pub version: String,
    /// An optional list of integrations that are enabled in this SDK.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub integrations: Vec<String>,
    /// An optional list of packages that are installed in the SDK's environment.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub packages: Vec<ClientSdkPackage>,
}

/// Represents an installed package relevant to the SDK.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct ClientSdkPackage {
    /// The name of the package installed.
    pub name: String,
    /// The version of the package.
    pub version: String,
}

/// Represents a full event for Sentry.
///
/// Events are created at capture time, enriched by the scope, the
/// integrations and the `before_send` hooks, and handed to the transport
/// by value once they are final.
#[derive(Debug, Clone, PartialEq)]
pub struct Event {
    /// The ID of the event.
    pub event_id: Uuid,
    /// What kind of payload this is.
    pub ty: EventType,
    /// The timestamp of when the event was created.
    pub timestamp: SystemTime,
    /// When the measured operation started (transactions).
    pub start_timestamp: Option<SystemTime>,
    /// The severity; left unset it is decided server side.
    pub level: Option<Level>,
    /// Optionally the name of the logger that created this event.
    pub logger: Option<String>,
    /// The transaction name of the event.
    pub transaction: Option<String>,
    /// Optionally the server (or device) name of this event.
    pub server_name: Option<String>,
    /// A release identifier.
    pub release: Option<String>,
    /// An optional environment identifier.
    pub environment: Option<String>,
    /// A platform identifier for this event.
    pub platform: String,
    /// A message to be sent with the event.
    pub message: Option<String>,
    /// Format parameters of `message`.
    pub message_params: Vec<String>,
    /// The message with the parameters applied.
    pub message_formatted: Option<String>,
    /// Grouping override; empty means server side grouping.
    pub fingerprint: Vec<String>,
    /// Optionally a name to version mapping of installed modules.
    pub modules: BTreeMap<String, String>,
    /// Optional tags to be attached to the event.
    pub tags: BTreeMap<String, String>,
    /// Optional extra information to be sent with the event.
    pub extra: Map<String, Value>,
    /// Optionally user data to be sent along.
    pub user: Option<User>,
    /// Optional contexts.
    pub contexts: BTreeMap<String, Context>,
    /// List of breadcrumbs to send along.
    pub breadcrumbs: Vec<Breadcrumb>,
    /// Optionally HTTP request data to be sent along.
    pub request: Map<String, Value>,
    /// Exceptions to be attached, oldest first.
    pub exception: Vec<Exception>,
    /// A standalone stacktrace.
    pub stacktrace: Option<Stacktrace>,
    /// Finished child spans of a transaction.
    pub spans: Vec<Span>,
    /// SDK metadata.
    pub sdk: Option<ClientSdkInfo>,
    /// The trace metadata sent in the envelope header.
    pub dynamic_sampling_context: Option<DynamicSamplingContext>,
    /// A profile recorded alongside a transaction.
    pub profile: Option<Profile>,
    /// The check-in payload of [`EventType::CheckIn`] events.
    pub check_in: Option<CheckIn>,
    /// The logs of [`EventType::Log`] events.
    pub logs: Vec<Log>,
    /// The metrics of [`EventType::Metric`] events.
    pub metrics: Vec<Metric>,
}

impl Default for Event {
    fn default() -> Self {
        Event {
            event_id: random_uuid(),
            ty: EventType::Event,
            timestamp: SystemTime::now(),
            start_timestamp: None,
            level: None,
            logger: None,
            transaction: None,
            server_name: None,
            release: None,
            environment: None,
            platform: "native".into(),
            message: None,
            message_params: Vec::new(),
            message_formatted: None,
            fingerprint: Vec::new(),
            modules: BTreeMap::new(),
            tags: BTreeMap::new(),
            extra: Map::new(),
            user: None,
            contexts: BTreeMap::new(),
            breadcrumbs: Vec::new(),
            request: Map::new(),
            exception: Vec::new(),
            stacktrace: None,
            spans: Vec::new(),
            sdk: None,
            dynamic_sampling_context: None,
            profile: None,
            check_in: None,
            logs: Vec::new(),
            metrics: Vec::new(),
        }
    }
}

impl Event {
    /// Creates a new error event with the current timestamp and random id.
    pub fn new() -> Event {
        Default::default()
    }

    /// Creates a new, empty transaction event.
    pub fn transaction() -> Event {
        Event {
            ty: EventType::Transaction,
            ..Default::default()
        }
    }

    /// Creates an event carrying a monitor check-in.
    pub fn check_in(check_in: CheckIn) -> Event {
        Event {
            ty: EventType::CheckIn,
            event_id: check_in.check_in_id,
            check_in: Some(check_in),
            ..Default::default()
        }
    }

    /// Creates an event carrying a batch of logs.
    pub fn logs(logs: Vec<Log>) -> Event {
        Event {
            ty: EventType::Log,
            logs,
            ..Default::default()
        }
    }

    /// Creates an event carrying a batch of metrics.
    pub fn metrics(metrics: Vec<Metric>) -> Event {
        Event {
            ty: EventType::Metric,
            metrics,
            ..Default::default()
        }
    }
}

impl fmt::Display for Event {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(
            f,
            "Event(type: {}, id: {}, ts: {})",
            self.ty,
            self.event_id,
            to_rfc3339(&self.timestamp)
        )
    }
}
