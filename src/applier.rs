//! State Applier (spec.md §4.3's counterpart on the Player side, §7 "Local
//! recovery"): applies revisioned broadcasts, detects gaps and requests a
//! resync, and tracks per-connection liveness (SPEC_FULL.md §3 +D1) the way
//! the teacher crate's `player::cli::CliPlayer` owns a local view it updates
//! in response to `Handler` callbacks rather than mutating the Host's state
//! directly.

use std::time::Duration;

use crate::protocol::{PeerMessage, PrivatePayload, PublicState};
use crate::roles::Role;

/// Timing defaults for the Player-side resync/ack protocol (spec.md §5).
#[derive(Debug, Clone, Copy)]
pub struct ApplierConfig {
    /// How long to wait for a `SEAT_ACTION_REQUEST`'s ack before giving up.
    pub seat_action_ack_timeout: Duration,
    /// How long to wait for a `SNAPSHOT_REQUEST` reply before marking
    /// the connection disconnected.
    pub snapshot_timeout: Duration,
    /// Poll interval while waiting for a reveal the viewer must acknowledge.
    pub reveal_poll_interval: Duration,
    /// Default ceiling on how long to wait for that reveal before giving up.
    pub reveal_ack_timeout: Duration,
}

impl Default for ApplierConfig {
    fn default() -> Self {
        ApplierConfig {
            seat_action_ack_timeout: Duration::from_secs(5),
            snapshot_timeout: Duration::from_secs(10),
            reveal_poll_interval: Duration::from_millis(50),
            reveal_ack_timeout: Duration::from_secs(3),
        }
    }
}

/// The local connection's liveness, tracked Player-side since the Host's
/// authoritative [`crate::state::GameState`] has no notion of connectivity
/// (SPEC_FULL.md §3 +D1 — this decision is recorded in DESIGN.md).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionState {
    Connected,
    /// A snapshot request timed out or the transport reported a failure.
    Disconnected,
}

/// The Player-side derived view of the game. Never mutated by anything but
/// [`Applier::apply`]/[`Applier::apply_private`] — the Host's broadcasts are
/// the only source of truth this holds.
pub struct Applier {
    uid: String,
    seat: Option<i32>,
    state: Option<PublicState>,
    revision: u64,
    connection: ConnectionState,
    pending_reveal: Option<(u64, Role, PrivatePayload)>,
    latest_witch_context: Option<PrivatePayload>,
    rejections: Vec<(String, String)>,
    config: ApplierConfig,
}

impl Applier {
    pub fn new(uid: String, config: ApplierConfig) -> Self {
        Applier {
            uid,
            seat: None,
            state: None,
            revision: 0,
            connection: ConnectionState::Disconnected,
            pending_reveal: None,
            latest_witch_context: None,
            rejections: Vec::new(),
            config,
        }
    }

    /// The witch's most recent `WITCH_CONTEXT` payload (killed seat, whether
    /// a save/poison is currently available), if this is the witch's seat.
    pub fn latest_witch_context(&self) -> Option<&PrivatePayload> {
        self.latest_witch_context.as_ref()
    }

    pub fn uid(&self) -> &str {
        &self.uid
    }

    pub fn state(&self) -> Option<&PublicState> {
        self.state.as_ref()
    }

    pub fn revision(&self) -> u64 {
        self.revision
    }

    pub fn connection(&self) -> ConnectionState {
        self.connection
    }

    pub fn seat(&self) -> Option<i32> {
        self.seat
    }

    pub fn has_pending_reveal_ack(&self) -> bool {
        self.pending_reveal.is_some()
    }

    pub fn rejections(&self) -> &[(String, String)] {
        &self.rejections
    }

    /// Applies one authoritative `STATE_UPDATE`/`SNAPSHOT_RESPONSE`.
    ///
    /// A snapshot (out-of-band reply) always replaces local state
    /// unconditionally; a `STATE_UPDATE` only applies if `revision` is
    /// strictly newer, since the transport gives no ordering guarantee
    /// across messages targeted differently (spec.md §5, §7).
    pub fn apply(&mut self, incoming: PublicState, revision: u64, is_snapshot: bool) -> bool {
        if !is_snapshot && revision <= self.revision && self.state.is_some() {
            log::debug!("dropping stale state update at revision {revision} (have {})", self.revision);
            return false;
        }
        self.seat = incoming.players.iter().find(|(_, slot)| slot.as_ref().is_some_and(|s| s.uid == self.uid)).map(|(&seat, _)| seat);
        self.state = Some(incoming);
        self.revision = revision;
        self.connection = ConnectionState::Connected;
        true
    }

    /// Applies one `PRIVATE_EFFECT` addressed to this UID; drops anything
    /// not addressed here (spec.md §4.4, §8 — clients MUST discard payloads
    /// not meant for them).
    pub fn apply_private(&mut self, to_uid: &str, revision: u64, payload: PrivatePayload) {
        if to_uid != self.uid {
            return;
        }
        match payload {
            PrivatePayload::ActionRejected { action, reason } => {
                self.rejections.push((action, reason));
            }
            PrivatePayload::SeerReveal { .. } | PrivatePayload::RoleReveal { .. } => {
                let role = reveal_role_of(&payload);
                self.pending_reveal = Some((revision, role, payload));
            }
            PrivatePayload::WitchContext { .. } => {
                self.rejections.clear(); // a fresh step begins; stale rejections no longer matter
                self.pending_reveal = None;
                self.latest_witch_context = Some(payload);
            }
        }
    }

    /// The current pending reveal payload, if any, to show the viewer before
    /// they call [`Self::ack_reveal`].
    pub fn pending_reveal(&self) -> Option<&PrivatePayload> {
        self.pending_reveal.as_ref().map(|(_, _, payload)| payload)
    }

    /// Builds the `REVEAL_ACK` message for the currently pending reveal, and
    /// clears it locally (optimistic — if the Host never receives it, a
    /// resubmission on the next `state()` read is up to the caller).
    pub fn ack_reveal(&mut self) -> Option<PeerMessage> {
        let (revision, role, _) = self.pending_reveal.take()?;
        Some(PeerMessage::RevealAck { seat: self.seat?, role, revision })
    }

    /// Marks the connection dead after a snapshot request timed out
    /// (spec.md §7 "transport failures").
    pub fn mark_disconnected(&mut self) {
        self.connection = ConnectionState::Disconnected;
    }

    pub fn config(&self) -> ApplierConfig {
        self.config
    }

    /// Requests a fresh snapshot, e.g. on reconnect or after detecting a
    /// revision gap (SPEC_FULL.md §4.3b: no separate "reconnect" message —
    /// a stale `lastRevision` snapshot request covers this path too).
    pub fn request_snapshot(&self, request_id: String) -> PeerMessage {
        PeerMessage::SnapshotRequest {
            request_id,
            uid: self.uid.clone(),
            last_revision: Some(self.revision),
        }
    }
}

fn reveal_role_of(payload: &PrivatePayload) -> Role {
    match payload {
        PrivatePayload::SeerReveal { .. } => Role::Seer,
        PrivatePayload::RoleReveal { role, .. } => *role,
        _ => unreachable!("reveal_role_of only called for reveal payload variants"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn sample_state(revision_marker: i32) -> PublicState {
        PublicState {
            room_code: "room".into(),
            host_uid: "host".into(),
            status: crate::state::Status::Ongoing,
            template_roles: vec![Role::Seer, Role::Villager],
            players: HashMap::new(),
            current_step_index: revision_marker as usize,
            is_audio_playing: false,
            wolf_vote_status: HashMap::new(),
            nightmare_blocked_seat: None,
            current_night_results: Default::default(),
        }
    }

    #[test]
    fn stale_state_update_is_dropped() {
        let mut applier = Applier::new("u1".into(), ApplierConfig::default());
        assert!(applier.apply(sample_state(5), 5, false));
        assert!(!applier.apply(sample_state(3), 3, false));
        assert_eq!(applier.revision(), 5);
    }

    #[test]
    fn snapshot_always_replaces_regardless_of_revision() {
        let mut applier = Applier::new("u1".into(), ApplierConfig::default());
        applier.apply(sample_state(5), 5, false);
        assert!(applier.apply(sample_state(1), 1, true));
        assert_eq!(applier.revision(), 1);
    }

    #[test]
    fn private_effect_not_addressed_to_us_is_dropped() {
        let mut applier = Applier::new("u1".into(), ApplierConfig::default());
        applier.apply_private("someone_else", 1, PrivatePayload::ActionRejected { action: "x".into(), reason: "y".into() });
        assert!(applier.rejections().is_empty());
    }

    #[test]
    fn reveal_blocks_until_acked() {
        let mut applier = Applier::new("u1".into(), ApplierConfig::default());
        let mut state = sample_state(1);
        state.players.insert(0, Some(crate::protocol::PublicPlayerSlot {
            uid: "u1".into(), seat_number: 0, display_name: None, avatar_url: None, role: Some(Role::Seer), has_viewed_role: true,
        }));
        applier.apply(state, 1, false);
        applier.apply_private("u1", 1, PrivatePayload::SeerReveal { target_seat: 1, result: "好人".into() });

        assert!(applier.has_pending_reveal_ack());
        let ack = applier.ack_reveal().unwrap();
        assert!(matches!(ack, PeerMessage::RevealAck { seat: 0, role: Role::Seer, revision: 1 }));
        assert!(!applier.has_pending_reveal_ack());
    }
}
