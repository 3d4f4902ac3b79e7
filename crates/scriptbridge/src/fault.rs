//! Lua fault capture and diagnostic formatting.
//!
//! Every `mlua::Error` leaving the runtime is reduced to a [`FaultState`]:
//! an optional fault type, an optional fault value and a trace capture.
//! [`FaultState::describe`] renders that triple as one diagnostic string and
//! never fails; missing pieces fall back to fixed sentinel text.

use crate::error::BridgeError;
use std::fmt;

/// Base message when no fault type could be fetched.
pub const UNFETCHABLE_FAULT: &str = "Unfetchable script error";

/// Appended when a traceback exists but no frame could be read from it.
pub const UNPARSEABLE_TRACE: &str = "Unparseable script traceback";

const TRACEBACK_MARKER: &str = "stack traceback:";

/// Where in the execution cycle a fault was raised.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FaultStage {
    Selector,
    Main,
    Injection,
    Extraction,
    Constant,
}

impl fmt::Display for FaultStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            Self::Selector => "selector script",
            Self::Main => "main script",
            Self::Injection => "injection",
            Self::Extraction => "extraction",
            Self::Constant => "constant injection",
        };
        f.write_str(label)
    }
}

/// Traceback captured alongside a fault.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TraceCapture {
    /// The runtime supplied no traceback.
    Absent,
    /// One entry per stack frame, innermost first.
    Frames(Vec<String>),
    /// A traceback was present but yielded no readable frames.
    Unparseable,
}

/// The (type, value, trace) triple of a Lua fault.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FaultState {
    pub fault_type: Option<String>,
    pub fault_value: Option<String>,
    pub trace: TraceCapture,
}

impl Default for FaultState {
    fn default() -> Self {
        Self {
            fault_type: None,
            fault_value: None,
            trace: TraceCapture::Absent,
        }
    }
}

impl FaultState {
    /// Capture the fault triple from an `mlua` error.
    pub fn capture(err: &mlua::Error) -> Self {
        match err {
            mlua::Error::SyntaxError { message, .. } => Self {
                fault_type: Some("SyntaxError".to_string()),
                fault_value: non_empty(message),
                trace: TraceCapture::Absent,
            },
            mlua::Error::RuntimeError(text) => {
                let (value, trace) = split_traceback(text);
                if value.is_none() && trace == TraceCapture::Absent {
                    return Self::default();
                }
                Self {
                    fault_type: Some("RuntimeError".to_string()),
                    fault_value: value,
                    trace,
                }
            }
            mlua::Error::MemoryError(text) => Self {
                fault_type: Some("MemoryError".to_string()),
                fault_value: non_empty(text),
                trace: TraceCapture::Absent,
            },
            mlua::Error::CallbackError { traceback, cause } => {
                let inner = Self::capture(cause);
                let (_, trace) = split_traceback(traceback);
                Self {
                    fault_type: inner.fault_type.or_else(|| Some("CallbackError".to_string())),
                    fault_value: inner.fault_value,
                    trace: match trace {
                        TraceCapture::Absent => inner.trace,
                        other => other,
                    },
                }
            }
            other => Self {
                fault_type: Some("Error".to_string()),
                fault_value: non_empty(&other.to_string()),
                trace: TraceCapture::Absent,
            },
        }
    }

    /// Render the diagnostic string.
    pub fn describe(&self) -> String {
        let mut message = match (&self.fault_type, &self.fault_value) {
            (None, _) => UNFETCHABLE_FAULT.to_string(),
            (Some(kind), Some(value)) => format!("{kind}: {value}"),
            (Some(kind), None) => kind.clone(),
        };

        match &self.trace {
            TraceCapture::Absent => {}
            TraceCapture::Frames(frames) => {
                message.push_str(": ");
                message.push_str(&frames.join("\n"));
            }
            TraceCapture::Unparseable => {
                message.push_str(": ");
                message.push_str(UNPARSEABLE_TRACE);
            }
        }
        message
    }
}

impl fmt::Display for FaultState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.describe())
    }
}

/// Convert an `mlua` error raised at `stage` into the host error.
pub(crate) fn translate(stage: FaultStage, err: &mlua::Error) -> BridgeError {
    let fault = FaultState::capture(err);
    tracing::error!(stage = %stage, fault = %fault, "Error in script");
    BridgeError::RuntimeFault { stage, fault }
}

fn non_empty(text: &str) -> Option<String> {
    let trimmed = text.trim();
    (!trimmed.is_empty()).then(|| trimmed.to_string())
}

/// Split Lua error text into its message and the appended traceback.
///
/// The traceback is the last marker that starts a line; the message itself
/// may mention the marker.
fn split_traceback(text: &str) -> (Option<String>, TraceCapture) {
    let line_marker = format!("\n{TRACEBACK_MARKER}");
    let at = match text.rfind(&line_marker) {
        Some(newline) => newline + 1,
        None if text.starts_with(TRACEBACK_MARKER) => 0,
        None => return (non_empty(text), TraceCapture::Absent),
    };

    let frames: Vec<String> = text[at + TRACEBACK_MARKER.len()..]
        .lines()
        .map(str::trim)
        .filter(|line| !line.is_empty())
        .map(str::to_string)
        .collect();

    let trace = if frames.is_empty() {
        TraceCapture::Unparseable
    } else {
        TraceCapture::Frames(frames)
    };
    (non_empty(&text[..at]), trace)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    #[test]
    fn describe_without_type_uses_sentinel() {
        assert_eq!(FaultState::default().describe(), UNFETCHABLE_FAULT);
    }

    #[test]
    fn describe_sentinel_still_appends_trace() {
        let fault = FaultState {
            trace: TraceCapture::Frames(vec!["a".to_string()]),
            ..FaultState::default()
        };
        assert_eq!(fault.describe(), format!("{UNFETCHABLE_FAULT}: a"));
    }

    #[test]
    fn describe_type_only() {
        let fault = FaultState {
            fault_type: Some("MemoryError".to_string()),
            ..FaultState::default()
        };
        assert_eq!(fault.describe(), "MemoryError");
    }

    #[test]
    fn describe_joins_frames_with_newlines() {
        let fault = FaultState {
            fault_type: Some("RuntimeError".to_string()),
            fault_value: Some("demo:2: boom".to_string()),
            trace: TraceCapture::Frames(vec![
                "[C]: in function 'error'".to_string(),
                "demo:2: in main chunk".to_string(),
            ]),
        };
        assert_eq!(
            fault.describe(),
            "RuntimeError: demo:2: boom: [C]: in function 'error'\ndemo:2: in main chunk"
        );
    }

    #[test]
    fn describe_unparseable_trace_sentinel() {
        let fault = FaultState {
            fault_type: Some("RuntimeError".to_string()),
            fault_value: Some("x".to_string()),
            trace: TraceCapture::Unparseable,
        };
        assert_eq!(fault.describe(), format!("RuntimeError: x: {UNPARSEABLE_TRACE}"));
    }

    #[test]
    fn capture_runtime_error_splits_traceback() {
        let err = mlua::Error::RuntimeError(
            "demo:1: attempt to perform 'n//0'\nstack traceback:\n\t[C]: in ?\n\tdemo:1: in main chunk"
                .to_string(),
        );
        let fault = FaultState::capture(&err);
        assert_eq!(fault.fault_type.as_deref(), Some("RuntimeError"));
        assert_eq!(
            fault.fault_value.as_deref(),
            Some("demo:1: attempt to perform 'n//0'")
        );
        assert_eq!(
            fault.trace,
            TraceCapture::Frames(vec![
                "[C]: in ?".to_string(),
                "demo:1: in main chunk".to_string()
            ])
        );
    }

    #[test]
    fn capture_runtime_error_with_empty_traceback_is_unparseable() {
        let err = mlua::Error::RuntimeError("boom\nstack traceback:\n".to_string());
        let fault = FaultState::capture(&err);
        assert_eq!(fault.trace, TraceCapture::Unparseable);
        assert!(fault.describe().ends_with(UNPARSEABLE_TRACE));
    }

    #[test]
    fn marker_inside_message_is_not_a_traceback() {
        let err = mlua::Error::RuntimeError(
            "m:1: see stack traceback: below\nstack traceback:\n\t[C]: in function 'error'\n\tm:1: in main chunk"
                .to_string(),
        );
        let fault = FaultState::capture(&err);
        assert_eq!(
            fault.fault_value.as_deref(),
            Some("m:1: see stack traceback: below")
        );
        assert_eq!(
            fault.trace,
            TraceCapture::Frames(vec![
                "[C]: in function 'error'".to_string(),
                "m:1: in main chunk".to_string()
            ])
        );
    }

    #[test]
    fn marker_only_inside_message_leaves_trace_absent() {
        let err = mlua::Error::RuntimeError("m:1: see stack traceback: below".to_string());
        let fault = FaultState::capture(&err);
        assert_eq!(
            fault.fault_value.as_deref(),
            Some("m:1: see stack traceback: below")
        );
        assert_eq!(fault.trace, TraceCapture::Absent);
    }

    #[test]
    fn capture_runtime_error_without_traceback() {
        let err = mlua::Error::RuntimeError("plain failure".to_string());
        let fault = FaultState::capture(&err);
        assert_eq!(fault.fault_value.as_deref(), Some("plain failure"));
        assert_eq!(fault.trace, TraceCapture::Absent);
        assert_eq!(fault.describe(), "RuntimeError: plain failure");
    }

    #[test]
    fn capture_empty_runtime_error_is_unfetchable() {
        let fault = FaultState::capture(&mlua::Error::RuntimeError("  ".to_string()));
        assert_eq!(fault, FaultState::default());
    }

    #[test]
    fn capture_syntax_error() {
        let err = mlua::Error::SyntaxError {
            message: "demo:1: unexpected symbol near '='".to_string(),
            incomplete_input: false,
        };
        let fault = FaultState::capture(&err);
        assert_eq!(fault.fault_type.as_deref(), Some("SyntaxError"));
        assert_eq!(fault.trace, TraceCapture::Absent);
        assert!(fault.describe().starts_with("SyntaxError: demo:1:"));
    }

    #[test]
    fn capture_callback_error_uses_cause_and_traceback() {
        let err = mlua::Error::CallbackError {
            traceback: "stack traceback:\n\t[C]: in function 'host_fn'".to_string(),
            cause: Arc::new(mlua::Error::RuntimeError("host refused".to_string())),
        };
        let fault = FaultState::capture(&err);
        assert_eq!(fault.fault_type.as_deref(), Some("RuntimeError"));
        assert_eq!(fault.fault_value.as_deref(), Some("host refused"));
        assert_eq!(
            fault.trace,
            TraceCapture::Frames(vec!["[C]: in function 'host_fn'".to_string()])
        );
    }

    #[test]
    fn translate_wraps_in_runtime_fault() {
        let err = translate(
            FaultStage::Selector,
            &mlua::Error::RuntimeError("nope".to_string()),
        );
        assert_eq!(err.stage(), Some(FaultStage::Selector));
        assert_eq!(
            err.to_string(),
            "Script fault during selector script: RuntimeError: nope"
        );
    }

    #[test]
    fn stage_display() {
        assert_eq!(FaultStage::Extraction.to_string(), "extraction");
        assert_eq!(FaultStage::Constant.to_string(), "constant injection");
    }
}
