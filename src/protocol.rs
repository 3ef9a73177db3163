//! Wire protocol (spec.md §6.1, §6.3, §6.4): the typed discriminated unions
//! carried by the two transport channels, plus the legacy magician swap
//! encoding. Every type here derives `serde::{Serialize, Deserialize}` so a
//! transport can move it over JSON, a websocket frame, or anything else —
//! the wire codec itself is out of scope (spec.md §1).

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use crate::error::ProtocolError;
use crate::roles::Role;
use crate::state::Status;

/// The public snapshot every Player sees (spec.md §6.4). Sensitive targets
/// (exact wolf vote target, reveal results) are never present here — they
/// live only in [`PrivatePayload`] envelopes.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct PublicPlayerSlot {
    pub uid: String,
    pub seat_number: i32,
    pub display_name: Option<String>,
    pub avatar_url: Option<String>,
    pub role: Option<Role>,
    pub has_viewed_role: bool,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct PublicNightResults {
    pub wolf_votes_by_seat: Option<HashMap<i32, i32>>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct PublicState {
    pub room_code: String,
    pub host_uid: String,
    pub status: Status,
    pub template_roles: Vec<Role>,
    pub players: HashMap<i32, Option<PublicPlayerSlot>>,
    pub current_step_index: usize,
    pub is_audio_playing: bool,
    pub wolf_vote_status: HashMap<i32, bool>,
    pub nightmare_blocked_seat: Option<i32>,
    pub current_night_results: PublicNightResults,
}

/// One private "reveal"/rejection payload kind (spec.md §4.4). Psychic,
/// gargoyle, and wolf-robot reveals share an identical shape (a display-name
/// result), unified here as `RoleReveal`; the seer's result is a team label
/// rather than a display name, so it stays its own variant.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "kind")]
pub enum PrivatePayload {
    WitchContext {
        killed_seat: Option<i32>,
        can_save: bool,
        can_poison: bool,
        /// The Night Plan step this context was issued for (spec.md §4.4),
        /// so a reconnecting witch can tell a stale envelope from the
        /// current one without waiting on a fresh `ROLE_TURN`.
        phase: String,
    },
    SeerReveal {
        target_seat: i32,
        result: String,
    },
    RoleReveal {
        role: Role,
        target_seat: i32,
        result: String,
    },
    ActionRejected {
        action: String,
        reason: String,
    },
}

/// `Host -> everyone`. Every variant except `GameRestarted` carries a revision.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "type")]
pub enum PublicMessage {
    StateUpdate {
        state: PublicState,
        revision: u64,
    },
    RoleTurn {
        role: Role,
        pending_seats: Vec<i32>,
        step_id: String,
    },
    NightEnd {
        deaths: Vec<i32>,
    },
    SeatRejected {
        seat: i32,
        request_uid: String,
        reason: String,
    },
    SeatActionAck {
        request_id: String,
        to_uid: String,
        success: bool,
        seat: i32,
        reason: Option<String>,
    },
    SnapshotResponse {
        request_id: String,
        to_uid: String,
        state: PublicState,
        revision: u64,
    },
    GameRestarted {},
    PrivateEffect {
        to_uid: String,
        revision: u64,
        payload: PrivatePayload,
    },
}

/// `sit` or `standup`, carried by `SEAT_ACTION_REQUEST`.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub enum SeatAction {
    Sit,
    Standup,
}

/// `Player -> Host`, point-to-point.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "type")]
pub enum PeerMessage {
    RequestState {
        uid: String,
    },
    Join {
        seat: i32,
        uid: String,
        display_name: Option<String>,
        avatar_url: Option<String>,
    },
    Leave {
        seat: i32,
        uid: String,
    },
    Action {
        seat: i32,
        role: Role,
        target: Option<i32>,
        extra: Option<i32>,
    },
    RevealAck {
        seat: i32,
        role: Role,
        revision: u64,
    },
    WolfVote {
        seat: i32,
        target: i32,
    },
    ViewedRole {
        seat: i32,
    },
    SeatActionRequest {
        request_id: String,
        action: SeatAction,
        seat: i32,
        uid: String,
        display_name: Option<String>,
        avatar_url: Option<String>,
    },
    SnapshotRequest {
        request_id: String,
        uid: String,
        last_revision: Option<u64>,
    },
}

/// Highest seat index the legacy magician encoding can address (spec.md §6.3).
pub const MAGICIAN_ENCODING_MAX_SEAT: i32 = 11;

/// Encodes a magician swap pair for the wire: `first + second * 100`, with
/// the invariant `second >= 1` so the encoded value is always `>= 100`
/// (spec.md §6.3). Panics if `second == 0`, since that would violate the
/// invariant the encoding depends on to be decodable — callers must order
/// the pair so the larger seat goes second, or add 12 conceptually; in
/// practice seats are `[0, 11]` and at least one of any two distinct seats
/// is `>= 1`, so callers should place that one second.
pub fn encode_magician_swap(first: i32, second: i32) -> i32 {
    assert!(second >= 1, "legacy magician encoding requires second >= 1");
    first + second * 100
}

/// Decodes a magician swap target, rejecting the legacy encoding violation
/// (`target < 100`) and any seat outside `[0, 11]` as a protocol error
/// (spec.md §6.3).
pub fn decode_magician_swap(target: i32) -> Result<(i32, i32), ProtocolError> {
    if target < 100 {
        return Err(ProtocolError::InvalidMagicianEncoding { target });
    }
    let second = target / 100;
    let first = target % 100;
    for seat in [first, second] {
        if !(0..=MAGICIAN_ENCODING_MAX_SEAT).contains(&seat) {
            return Err(ProtocolError::SeatOutOfRange {
                seat,
                num_players: (MAGICIAN_ENCODING_MAX_SEAT + 1) as usize,
            });
        }
    }
    Ok((first, second))
}
