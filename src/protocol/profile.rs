use std::time::SystemTime;

use serde::Serialize;
use serde_json::json;

use super::{Event, Value};
use crate::utils::to_rfc3339;

/// A single stack frame referenced by profile stacks.
#[derive(Serialize, Debug, Default, Clone, PartialEq, Eq, Hash)]
pub struct ProfileFrame {
    /// The function name, if symbolicated.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub function: Option<String>,
    /// The file the function lives in.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub filename: Option<String>,
    /// The line inside `filename`.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub lineno: Option<u32>,
    /// The raw instruction address.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub instruction_addr: Option<String>,
}

/// One sample of a profile.
#[derive(Serialize, Debug, Clone, PartialEq, Eq)]
pub struct ProfileSample {
    /// Index into [`Profile::stacks`].
    pub stack_id: u32,
    /// The thread that was sampled.
    pub thread_id: String,
    /// Nanoseconds since the profiler started.
    pub elapsed_since_start_ns: u64,
}

/// A sampled profile recorded while a transaction was running.
#[derive(Debug, Clone, PartialEq)]
pub struct Profile {
    /// When the profiler started.
    pub start: SystemTime,
    /// Collected samples.
    pub samples: Vec<ProfileSample>,
    /// Stacks as lists of indices into `frames`, innermost first.
    pub stacks: Vec<Vec<u32>>,
    /// Deduplicated frames.
    pub frames: Vec<ProfileFrame>,
}

impl Default for Profile {
    fn default() -> Self {
        Profile {
            start: SystemTime::now(),
            samples: Vec::new(),
            stacks: Vec::new(),
            frames: Vec::new(),
        }
    }
}

impl Profile {
    /// Minimum samples a profile needs to be worth sending.
    pub const MIN_SAMPLES: usize = 2;

    /// Formats the profile item body for the transaction `event`.
    ///
    /// Returns `None` when fewer than [`Profile::MIN_SAMPLES`] samples were
    /// collected, in which case no profile item is emitted.
    pub fn to_payload(&self, event: &Event) -> Option<Value> {
        if self.samples.len() < Self::MIN_SAMPLES {
            return None;
        }

        let trace_id = event
            .contexts
            .get("trace")
            .and_then(|trace| trace.get("trace_id"))
            .cloned()
            .unwrap_or(Value::Null);

        let mut payload = json!({
            "version": "1",
            "event_id": crate::utils::random_uuid().as_simple().to_string(),
            "platform": event.platform,
            "timestamp": to_rfc3339(&self.start),
            "transaction": {
                "id": event.event_id.as_simple().to_string(),
                "name": event.transaction.as_deref().unwrap_or_default(),
                "trace_id": trace_id,
                "active_thread_id": self.samples[0].thread_id,
            },
            "profile": {
                "samples": self.samples,
                "stacks": self.stacks,
                "frames": self.frames,
            },
        });
        if let Some(object) = payload.as_object_mut() {
            if let Some(release) = &event.release {
                object.insert("release".into(), release.as_str().into());
            }
            if let Some(environment) = &event.environment {
                object.insert("environment".into(), environment.as_str().into());
            }
        }
        Some(payload)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample(stack_id: u32, elapsed: u64) -> ProfileSample {
        ProfileSample {
            stack_id,
            thread_id: "1".into(),
            elapsed_since_start_ns: elapsed,
        }
    }

    #[test]
    fn test_single_sample_has_no_payload() {
        let profile = Profile {
            samples: vec![sample(0, 0)],
            stacks: vec![vec![0]],
            frames: vec![ProfileFrame::default()],
            ..Default::default()
        };
        assert!(profile.to_payload(&Event::transaction()).is_none());
    }

    #[test]
    fn test_payload_references_transaction() {
        let profile = Profile {
            samples: vec![sample(0, 0), sample(0, 10_000_000)],
            stacks: vec![vec![0]],
            frames: vec![ProfileFrame {
                function: Some("main".into()),
                ..Default::default()
            }],
            ..Default::default()
        };
        let mut event = Event::transaction();
        event.transaction = Some("GET /".into());
        event.release = Some("app@1.0".into());

        let payload = profile.to_payload(&event).unwrap();
        assert_eq!(payload["transaction"]["name"], "GET /");
        assert_eq!(
            payload["transaction"]["id"],
            event.event_id.as_simple().to_string()
        );
        assert_eq!(payload["release"], "app@1.0");
        assert_eq!(payload["profile"]["frames"][0]["function"], "main");
        assert!(payload.get("environment").is_none());
    }
}
