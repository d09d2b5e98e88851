//! Complaint lifecycle: the only place that knows which status moves are legal.
//!
//!   submitted, reopened               -> in_progress   Admin
//!   submitted, in_progress, reopened  -> rejected      Admin, reason required
//!   submitted, in_progress, reopened  -> resolved      Admin, resolve() only
//!   resolved                          -> reopened      original owner
//!
//! Nothing moves back to submitted. Rejected is terminal.

use crate::{
    complaint::ComplaintStatus,
    error::{CoreError, CoreResult},
    role::RoleProfile,
};

/// Which public operation is asking for the move.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Channel {
    Update,
    Resolve,
    Reject,
    Reopen,
}

use ComplaintStatus::*;

pub fn allowed_sources(to: ComplaintStatus) -> &'static [ComplaintStatus] {
    match to {
        InProgress => &[Submitted, Reopened],
        Rejected | Resolved => &[Submitted, InProgress, Reopened],
        Reopened => &[Resolved],
        Submitted => &[],
    }
}

/// Check one requested move. Authorization is checked before state so a
/// caller without rights learns nothing about the complaint's status.
pub fn check_transition(
    from: ComplaintStatus,
    to: ComplaintStatus,
    actor: &RoleProfile,
    owner_id: &str,
    channel: Channel,
) -> CoreResult<()> {
    if to == Resolved && channel != Channel::Resolve {
        return Err(CoreError::conflict(
            "status 'resolved' can only be set through the resolve operation with proof",
        ));
    }

    match to {
        InProgress | Rejected | Resolved if !actor.is_admin() => {
            return Err(CoreError::unauthorized(format!(
                "only admins may move a complaint to '{to}'"
            )));
        }
        Reopened if actor.user_id != owner_id => {
            return Err(CoreError::unauthorized(
                "only the citizen who filed the complaint may reopen it",
            ));
        }
        _ => {}
    }

    if !allowed_sources(to).contains(&from) {
        return Err(CoreError::conflict(format!(
            "cannot move complaint from '{from}' to '{to}'"
        )));
    }
    Ok(())
}
