//! The condition table: every "agent paused" state the watcher knows how to
//! classify, and what recovering from it looks like.
//!
//! Declaration order defines priority. The tool-limit condition always wins
//! within a tick; the transient rules are then tried top to bottom and the
//! first match stops the scan. Changing the order changes observable click
//! behavior, so new rules go at the bottom unless they must outrank an
//! existing one.

use once_cell::sync::Lazy;
use regex::Regex;
use serde::Serialize;

/// Marker text that cheaply pre-filters candidate nodes for the tool-limit
/// condition before the full pattern runs against the enclosing container.
pub const TOOL_LIMIT_MARKER: &str = "stop the agent after";

/// Fixed alternate phrasing some host versions render instead of the
/// fully-parameterized sentence.
pub const TOOL_LIMIT_ALT_PHRASING: &str = "By default, we stop the agent after";

/// Exact label of the control that resumes a tool-limited conversation.
pub const RESUME_LINK_LABEL: &str = "resume the conversation";

/// "stop the agent after <N> tool calls", case-insensitive.
pub static TOOL_LIMIT_PATTERN: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)stop the agent after \d+ tool calls").expect("tool-limit pattern is valid")
});

/// One known transient-error state: `error_text` appearing anywhere in the
/// chat window means a control containing `button_text` should be clicked.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct TransientRule {
    pub error_text: &'static str,
    pub button_text: &'static str,
    pub description: &'static str,
}

/// Transient provider/connectivity errors, in priority order.
pub static TRANSIENT_RULES: &[TransientRule] = &[
    TransientRule {
        error_text: "We're having trouble connecting to the model provider",
        button_text: "Resume",
        description: "model provider connection error",
    },
    TransientRule {
        error_text: "We're experiencing high demand for",
        button_text: "Try again",
        description: "high demand error",
    },
    TransientRule {
        error_text: "Connection failed. If the problem persists, please check your internet connection",
        button_text: "Try again",
        description: "connection failed error",
    },
];

/// Outcome of one detection tick. Transient; nothing here is persisted.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub enum ScanOutcome {
    /// The toggle is off; the document was not inspected.
    Disabled,
    /// The cooldown window since the last recovery action has not elapsed.
    CoolingDown,
    /// No known stuck condition matched. Normal steady state.
    NoMatch,
    /// A condition's text matched but no corresponding control was found;
    /// the host tree may still be settling, so the next tick retries.
    ControlMissing { description: &'static str },
    /// A condition matched and its recovery control was activated.
    Recovered { description: &'static str },
}

impl ScanOutcome {
    /// Whether this tick performed a recovery click.
    pub fn acted(&self) -> bool {
        matches!(self, ScanOutcome::Recovered { .. })
    }
}
