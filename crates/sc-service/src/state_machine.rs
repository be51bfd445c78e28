//! Session status transition function.
//!
//! Pure: the result depends only on `(status, transition, is_live_stream)`.
//! Every status change in the service goes through [`apply`], called from the
//! session actor; nothing else assigns `CallSession::status`.
//!
//! ```text
//! Call:   Pending --Ring--> Ringing --Accept--> Active --End--> Ended
//!                               \--Reject--> Rejected
//!         Pending|Ringing        --Miss--> Missed
//!         Pending|Ringing        --End---> Ended      (cancel before answer)
//!         Pending|Ringing|Active --Fail--> Failed
//!
//! Room:   Pending --Activate--> Active --End--> Ended
//!         Pending --Miss--> Missed,  Pending|Active --Fail--> Failed
//! ```

use crate::models::SessionStatus;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Input to the state machine.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Transition {
    /// Callee's client acknowledged the incoming call.
    Ring,
    /// Callee answered.
    Accept,
    /// Callee declined.
    Reject,
    /// First participant joined a room.
    Activate,
    /// Hang up, cancel, or reclaim.
    End,
    /// No answer within the timeout.
    Miss,
    /// Irrecoverable error reported by signaling or media transport.
    Fail,
}

impl Transition {
    pub const ALL: [Transition; 7] = [
        Transition::Ring,
        Transition::Accept,
        Transition::Reject,
        Transition::Activate,
        Transition::End,
        Transition::Miss,
        Transition::Fail,
    ];

    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Transition::Ring => "ring",
            Transition::Accept => "accept",
            Transition::Reject => "reject",
            Transition::Activate => "activate",
            Transition::End => "end",
            Transition::Miss => "miss",
            Transition::Fail => "fail",
        }
    }
}

impl fmt::Display for Transition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Rejected transition; carries what was attempted from where.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct InvalidTransition {
    pub from: SessionStatus,
    pub transition: Transition,
}

/// Compute the status reached by applying `transition` to `status`.
///
/// # Errors
///
/// Returns [`InvalidTransition`] when the edge does not exist for the
/// session's mode, including every transition out of a terminal status.
pub fn apply(
    status: SessionStatus,
    transition: Transition,
    is_live_stream: bool,
) -> Result<SessionStatus, InvalidTransition> {
    use SessionStatus::{Active, Ended, Failed, Missed, Pending, Rejected, Ringing};
    use Transition::{Accept, Activate, End, Fail, Miss, Reject, Ring};

    let next = if is_live_stream {
        match (status, transition) {
            (Pending, Activate) => Some(Active),
            (Pending, Miss) => Some(Missed),
            (Pending | Active, End) => Some(Ended),
            (Pending | Active, Fail) => Some(Failed),
            _ => None,
        }
    } else {
        match (status, transition) {
            (Pending, Ring) => Some(Ringing),
            (Ringing, Accept) => Some(Active),
            (Ringing, Reject) => Some(Rejected),
            (Pending | Ringing, Miss) => Some(Missed),
            (Pending | Ringing | Active, End) => Some(Ended),
            (Pending | Ringing | Active, Fail) => Some(Failed),
            _ => None,
        }
    };

    next.ok_or(InvalidTransition {
        from: status,
        transition,
    })
}

/// Whether `transition` is valid from `status`.
#[must_use]
pub fn can_apply(status: SessionStatus, transition: Transition, is_live_stream: bool) -> bool {
    apply(status, transition, is_live_stream).is_ok()
}
