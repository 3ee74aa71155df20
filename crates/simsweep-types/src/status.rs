//! Per-run status state machine and child-process exit classification.

use serde::{Deserialize, Serialize};

/// Status of a single run in the checkpoint.
///
/// Transitions, each performed under the checkpoint lock:
///
/// - init: absent → `Pending`
/// - claim: `Pending` → `InProgress`
/// - succeed: `InProgress` → `Complete`
/// - fail: `InProgress` → `Pending` (re-dispatchable)
/// - restart repair: `InProgress` → `Pending`
///
/// `Complete` is terminal. A run may oscillate `Pending` ↔ `InProgress`
/// arbitrarily many times before completing.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RunStatus {
    Pending,
    InProgress,
    Complete,
}

impl RunStatus {
    /// Wire token used in the checkpoint file (`-1`, `0`, `1`).
    #[must_use]
    pub fn as_token(self) -> &'static str {
        match self {
            Self::Pending => "-1",
            Self::InProgress => "0",
            Self::Complete => "1",
        }
    }

    /// Parse a checkpoint wire token. Unknown tokens map to `None`;
    /// the store treats them as `Pending` on restore.
    #[must_use]
    pub fn from_token(token: &str) -> Option<Self> {
        match token {
            "-1" => Some(Self::Pending),
            "0" => Some(Self::InProgress),
            "1" => Some(Self::Complete),
            _ => None,
        }
    }

    /// Whether the state machine permits moving from `self` to `next`.
    #[must_use]
    pub fn can_transition_to(self, next: Self) -> bool {
        matches!(
            (self, next),
            (Self::Pending, Self::InProgress)
                | (Self::InProgress, Self::Complete)
                | (Self::InProgress, Self::Pending)
        )
    }
}

impl std::fmt::Display for RunStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_token())
    }
}

/// Classification of one external simulation invocation.
///
/// The exit status is the sole source of truth: exactly 0 is `Success`,
/// any non-zero exit, signal death, or spawn failure is `Failure`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExitClass {
    Success,
    Failure,
}

impl ExitClass {
    #[must_use]
    pub fn is_success(self) -> bool {
        matches!(self, Self::Success)
    }
}
