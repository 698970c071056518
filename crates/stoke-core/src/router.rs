//! Event routing: which realtime notification triggers which re-fetch.
//!
//! The subscription is signal-only. An event says "something changed in
//! this collection", never what the new state is; the router answers with
//! a full, user-filtered re-fetch. No ordering is assumed between the two
//! channels.

use stoke_store::ChangeKind;

/// The two realtime channels a session listens on.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Channel {
    Habits,
    Completions,
}

/// Which cache refresh an event triggers.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RefreshAction {
    Habits,
    Completions,
}

/// Classify a notification's event strings into a refresh action.
///
/// Any create/update/delete on the habits channel refreshes habits. The
/// completions channel refreshes on all three kinds as well: a completion
/// deleted or edited remotely must drop out of the completed-today set, so
/// coverage is not limited to creates. Events that carry no change kind
/// (ping, connection notices) trigger nothing.
pub fn route(channel: Channel, events: &[String]) -> Option<RefreshAction> {
    let changed = events
        .iter()
        .any(|event| ChangeKind::classify(event).is_some());
    if !changed {
        return None;
    }
    Some(match channel {
        Channel::Habits => RefreshAction::Habits,
        Channel::Completions => RefreshAction::Completions,
    })
}
