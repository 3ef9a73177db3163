//! Game state (spec.md §3.2): the authoritative data model, owned
//! exclusively by the Coordinator. Players hold a derived copy built by the
//! [`crate::applier`] from broadcast snapshots, never this type directly.

use std::collections::{HashMap, HashSet};

use serde::{Deserialize, Serialize};

use crate::roles::Role;

/// Lifecycle status (spec.md §3.2). Monotonic except `Seated <-> Unseated`
/// before role assignment, and `Ended -> Seated` on explicit restart.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Status {
    Unseated,
    Seated,
    Assigned,
    Ready,
    Ongoing,
    Ended,
}

/// One occupied seat.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PlayerSlot {
    pub uid: String,
    pub seat_number: i32,
    pub display_name: Option<String>,
    pub avatar_url: Option<String>,
    pub role: Option<Role>,
    pub has_viewed_role: bool,
    pub is_bot: bool,
}

impl PlayerSlot {
    pub fn new(uid: String, seat_number: i32) -> Self {
        PlayerSlot {
            uid,
            seat_number,
            display_name: None,
            avatar_url: None,
            role: None,
            has_viewed_role: false,
            is_bot: false,
        }
    }
}

/// A recorded night action, as stored in `GameState::actions` (spec.md §3.2).
/// At most one entry per role per night.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum RecordedAction {
    Seat(Option<i32>),
    Swap(i32, i32),
    WolfVote(i32),
    Compound {
        save: Option<i32>,
        poison: Option<i32>,
    },
}

/// Accumulated per-night derived data, published alongside state (spec.md §3.2).
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct NightResults {
    pub wolf_votes_by_seat: HashMap<i32, i32>,
    pub wolf_kill_target: Option<i32>,
}

/// The authoritative game state. Host-only; see spec.md §3.4 "Ownership and lifecycle".
#[derive(Debug, Clone)]
pub struct GameState {
    pub room_code: String,
    pub host_uid: String,
    pub template: Vec<Role>,
    pub status: Status,
    pub players: HashMap<i32, PlayerSlot>,
    pub actions: HashMap<Role, RecordedAction>,
    pub wolf_votes: HashMap<i32, i32>,
    pub current_step_index: usize,
    pub current_night_results: NightResults,
    pub last_night_deaths: Vec<i32>,
    pub is_audio_playing: bool,
    /// `(revision, role)` keys for reveal steps blocking night advance (spec.md §4.3).
    pub pending_reveal_acks: HashSet<(u64, Role)>,
    pub revision: u64,
}

impl GameState {
    pub fn new(room_code: String, host_uid: String, template: Vec<Role>) -> Self {
        GameState {
            room_code,
            host_uid,
            template,
            status: Status::Unseated,
            players: HashMap::new(),
            actions: HashMap::new(),
            wolf_votes: HashMap::new(),
            current_step_index: 0,
            current_night_results: NightResults::default(),
            last_night_deaths: Vec::new(),
            is_audio_playing: false,
            pending_reveal_acks: HashSet::new(),
            revision: 0,
        }
    }

    pub fn num_players(&self) -> usize {
        self.template.len()
    }

    pub fn seat_of_uid(&self, uid: &str) -> Option<i32> {
        self.players
            .values()
            .find(|slot| slot.uid == uid)
            .map(|slot| slot.seat_number)
    }

    pub fn all_seats_occupied(&self) -> bool {
        self.players.len() == self.num_players()
    }

    /// The current seat -> assigned-role map. Only meaningful once roles are dealt.
    pub fn role_map(&self) -> HashMap<i32, Role> {
        self.players
            .iter()
            .filter_map(|(&seat, slot)| slot.role.map(|r| (seat, r)))
            .collect()
    }

    /// The seat -> role map as if the recorded magician swap (if any) had
    /// already happened (spec.md §4.3 "Magician swap"): reveal payloads
    /// read from this, not [`Self::role_map`].
    pub fn effective_role_map(&self) -> HashMap<i32, Role> {
        let mut map = self.role_map();
        if let Some(RecordedAction::Swap(a, b)) = self.actions.get(&Role::Magician) {
            if let (Some(&role_a), Some(&role_b)) = (map.get(a), map.get(b)) {
                map.insert(*a, role_b);
                map.insert(*b, role_a);
            }
        }
        map
    }

    /// The seat nightmare has blocked this night, if any (spec.md §4.3
    /// "Blocking"). `None` if nightmare skipped or hasn't acted yet.
    pub fn nightmare_blocked_seat(&self) -> Option<i32> {
        match self.actions.get(&Role::Nightmare) {
            Some(RecordedAction::Seat(Some(seat))) => Some(*seat),
            _ => None,
        }
    }

    /// Clears every per-night cache. Used by both `startGame` (fresh night)
    /// and `emergencyRestartAndReshuffleRoles` (spec.md §4.3).
    pub fn clear_night_caches(&mut self) {
        self.actions.clear();
        self.wolf_votes.clear();
        self.last_night_deaths.clear();
        self.pending_reveal_acks.clear();
        self.current_night_results = NightResults::default();
        self.current_step_index = 0;
    }

    /// Debug-only invariant checks (I1-I3 from spec.md §3.2). Strict
    /// invariant violations are bugs, not expected conditions (spec.md §7),
    /// so this panics rather than returning a `Result`.
    #[cfg(debug_assertions)]
    pub fn debug_assert_invariants(&self) {
        // I1: every seat's slot.seat_number matches its map key.
        for (&seat, slot) in &self.players {
            assert_eq!(slot.seat_number, seat, "I1 violated: slot at key {seat} claims seat {}", slot.seat_number);
        }
        // I2: at most one slot per UID.
        let mut seen = HashSet::new();
        for slot in self.players.values() {
            assert!(seen.insert(slot.uid.clone()), "I2 violated: uid {} occupies more than one seat", slot.uid);
        }
        // I3: once roles are dealt, every occupied slot has a role and the
        // multiset of assigned roles equals the template.
        if matches!(self.status, Status::Assigned | Status::Ready | Status::Ongoing | Status::Ended) {
            let mut assigned: Vec<Role> = Vec::new();
            for slot in self.players.values() {
                assert!(slot.role.is_some(), "I3 violated: seat {} has no role while status is {:?}", slot.seat_number, self.status);
                assigned.push(slot.role.unwrap());
            }
            let mut template_sorted = self.template.clone();
            let mut assigned_sorted = assigned;
            template_sorted.sort_by_key(role_order_key);
            assigned_sorted.sort_by_key(role_order_key);
            assert_eq!(template_sorted, assigned_sorted, "I3 violated: assigned roles do not match template multiset");
        }
    }
}

fn role_order_key(role: &Role) -> u8 {
    Role::ALL.iter().position(|r| r == role).unwrap_or(255) as u8
}
