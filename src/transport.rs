//! Transport traits (spec.md §1, §6.1): the physical transport is treated as
//! two typed streams — public broadcast and targeted point-to-point — and is
//! out of scope for this crate. This module only specifies the seam: the
//! trait the Coordinator talks through, generalized from the teacher
//! crate's `Handler`/`Player` traits (which the game used to narrate events
//! and ask for decisions) to an async broadcast sink plus a typed inbound
//! event queue.
//!
//! Every outbound [`PublicMessage`] already self-describes its intended
//! recipient where relevant (`toUid` on ACKs, snapshot responses, and
//! private effects) — the transport's job is purely delivery, not routing
//! policy, so one `broadcast` method covers both the public and
//! point-to-point cases described in spec.md §6.1.

use crate::protocol::PublicMessage;

/// The Host's outbound sink. A real implementation fans this out to every
/// connected socket; test code can simply record what was sent.
pub trait Transport: Send {
    /// Delivers one message. For messages with a `toUid`, the transport MAY
    /// narrow delivery to that client, but is not required to — clients are
    /// responsible for discarding anything not addressed to them (spec.md
    /// §4.4, §8).
    async fn broadcast(&mut self, message: PublicMessage);
}

/// An in-memory transport for tests: records every message sent, with no
/// actual I/O. Mirrors the teacher crate's `CliHandler`/`CliPlayer` role of
/// providing one concrete trait implementation alongside the trait itself.
#[derive(Debug, Default)]
pub struct RecordingTransport {
    pub sent: Vec<PublicMessage>,
}

impl RecordingTransport {
    pub fn new() -> Self {
        RecordingTransport::default()
    }

    /// All `PrivateEffect` envelopes addressed to `uid`, in send order.
    pub fn private_effects_for<'a>(&'a self, uid: &'a str) -> impl Iterator<Item = &'a crate::protocol::PrivatePayload> {
        self.sent.iter().filter_map(move |msg| match msg {
            PublicMessage::PrivateEffect { to_uid, payload, .. } if to_uid == uid => Some(payload),
            _ => None,
        })
    }

    pub fn last_state_update(&self) -> Option<(&crate::protocol::PublicState, u64)> {
        self.sent.iter().rev().find_map(|msg| match msg {
            PublicMessage::StateUpdate { state, revision } => Some((state, *revision)),
            _ => None,
        })
    }
}

impl Transport for RecordingTransport {
    async fn broadcast(&mut self, message: PublicMessage) {
        self.sent.push(message);
    }
}
