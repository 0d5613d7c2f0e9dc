use crate::protocol::{Event, Map, Mechanism, Stacktrace, Value};

/// Additional data handed along with an event through the pipeline.
///
/// A hint is never sent itself.  The client folds its values into the event
/// and every [`EventProcessor`] gets to look at it.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct EventHint {
    /// Extra data merged into the event's `extra` without overwriting it.
    pub extra: Map<String, Value>,
    /// A stacktrace attached to events that carry no exception.
    pub stacktrace: Option<Stacktrace>,
    /// How the captured error was caught.
    pub mechanism: Option<Mechanism>,
}

impl EventHint {
    /// An empty hint.
    pub fn new() -> Self {
        Self::default()
    }

    /// A hint carrying a stacktrace.
    pub fn from_stacktrace(stacktrace: Stacktrace) -> Self {
        EventHint {
            stacktrace: Some(stacktrace),
            ..Default::default()
        }
    }
}

/// A generic Event Processor
///
/// The Event Processor is invoked during different stages of the pipeline.
/// It can add more information to an event, modify existing information, or
/// decide to discard the event altogether, in which case further processing and
/// uploading is skipped.
pub trait EventProcessor: Send + Sync {
    /// Processes an event.
    fn process_event(&self, event: Event, hint: &EventHint) -> Option<Event>;
}

impl<F> EventProcessor for F
where
    F: Fn(Event, &EventHint) -> Option<Event> + Send + Sync,
{
    fn process_event(&self, event: Event, hint: &EventHint) -> Option<Event> {
        self(event, hint)
    }
}
