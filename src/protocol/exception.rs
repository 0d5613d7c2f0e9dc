use serde::Serialize;

use super::{Map, Value};

/// Represents a frame.
#[derive(Serialize, Default, Clone, Debug, PartialEq)]
pub struct Frame {
    /// The name of the function is known.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub function: Option<String>,
    /// The name of the module the frame is contained in.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub module: Option<String>,
    /// The filename, relative to the project root when known.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub filename: Option<String>,
    /// If known the absolute path.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub abs_path: Option<String>,
    /// The line number if known.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub lineno: Option<u64>,
    /// The column number if known.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub colno: Option<u64>,
    /// The sources of the lines leading up to the current line.
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub pre_context: Vec<String>,
    /// The current line as source.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub context_line: Option<String>,
    /// The sources of the lines after the current line.
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub post_context: Vec<String>,
    /// In-app indicator.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub in_app: Option<bool>,
    /// Optional local variables.
    #[serde(skip_serializing_if = "Map::is_empty")]
    pub vars: Map<String, Value>,
}

/// Represents a stacktrace.
#[derive(Serialize, Debug, Default, Clone, PartialEq)]
pub struct Stacktrace {
    /// The list of frames in the stacktrace, outermost call first.
    pub frames: Vec<Frame>,
}

impl Stacktrace {
    /// Optionally creates a stacktrace from a list of stack frames that
    /// starts with the innermost call.
    pub fn from_frames_reversed(mut frames: Vec<Frame>) -> Option<Stacktrace> {
        if frames.is_empty() {
            None
        } else {
            frames.reverse();
            Some(Stacktrace { frames })
        }
    }
}

/// How an exception was caught.
#[derive(Serialize, Debug, Default, Clone, PartialEq)]
pub struct Mechanism {
    /// The mechanism type identifier.
    #[serde(rename = "type")]
    pub ty: String,
    /// Human readable detail description.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    /// An optional flag indicating whether this exception was handled.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub handled: Option<bool>,
    /// An optional flag indicating a synthetic exception.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub synthetic: Option<bool>,
    /// Additional attributes depending on the mechanism type.
    #[serde(skip_serializing_if = "Map::is_empty")]
    pub data: Map<String, Value>,
}

/// Represents a single exception.
#[derive(Serialize, Debug, Default, Clone, PartialEq)]
pub struct Exception {
    /// The type of the exception.
    #[serde(rename = "type")]
    pub ty: String,
    /// The optional value of the exception.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub value: Option<String>,
    /// An optional module for this exception.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub module: Option<String>,
    /// Optionally the stacktrace.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub stacktrace: Option<Stacktrace>,
    /// The mechanism of the exception.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub mechanism: Option<Mechanism>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_stacktrace_from_reversed_frames() {
        assert!(Stacktrace::from_frames_reversed(vec![]).is_none());

        let frame = |name: &str| Frame {
            function: Some(name.into()),
            ..Default::default()
        };
        let stacktrace =
            Stacktrace::from_frames_reversed(vec![frame("inner"), frame("outer")]).unwrap();
        assert_eq!(stacktrace.frames[0].function.as_deref(), Some("outer"));
        assert_eq!(
            serde_json::to_string(&stacktrace).unwrap(),
            r#"{"frames":[{"function":"outer"},{"function":"inner"}]}"#
        );
    }
}
