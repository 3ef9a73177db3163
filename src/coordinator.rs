//! State Coordinator (Host), spec.md §4.3: owns the authoritative
//! [`GameState`], handles peer messages, drives the [`NightFlowController`],
//! and emits public broadcasts plus private envelopes. This is the largest
//! component in the system (spec.md §2, 35% share) because it is the only
//! place that is allowed to mutate [`GameState`] — every other component in
//! this crate is a pure function or a passive data holder that the
//! Coordinator calls into.
//!
//! Generalizes the teacher crate's `game::run`/`run_with_roles` event loop
//! (which drives `State<P>` through `Signups -> Night -> Day -> Complete` by
//! matching on the current variant and calling into `Player`/`Handler`) to a
//! message-driven actor: one inbound [`PeerMessage`] at a time, fully
//! processed before the next is considered (spec.md §5, "single-threaded
//! cooperative").

use std::collections::HashMap;
use std::time::Duration;

use rand::seq::SliceRandom;

use crate::audio::{self, AudioPlayer};
use crate::death::{self, NightActions, RoleSeatMap};
use crate::error::ResolverError;
use crate::night_flow::{Event, NightFlowController, Phase};
use crate::protocol::{
    PeerMessage, PrivatePayload, PublicMessage, PublicNightResults, PublicPlayerSlot, PublicState,
    SeatAction,
};
use crate::resolver::{self, ActionInput};
use crate::roles::{ActionSchema, NightPlan, Role};
use crate::state::{GameState, PlayerSlot, RecordedAction, Status};
use crate::transport::Transport;
use crate::wolf_vote;

/// Tunable timing constants the Coordinator uses, so they aren't hardcoded
/// magic numbers (SPEC_FULL.md §1 +A3). Values are the spec's own defaults.
#[derive(Debug, Clone, Copy)]
pub struct CoordinatorConfig {
    /// Fixed pause after night-begin audio completes, before the first role
    /// step begins (spec.md §4.3 "Night start", §5 suspension points).
    pub night_begin_pause: Duration,
    /// Safety timeout wrapped around every audio call (spec.md §6.2: "at
    /// least 15s"). Timeout and natural completion are treated identically.
    pub audio_safety_timeout: Duration,
}

impl Default for CoordinatorConfig {
    fn default() -> Self {
        CoordinatorConfig {
            night_begin_pause: Duration::from_secs(5),
            audio_safety_timeout: Duration::from_secs(15),
        }
    }
}

/// The Host-side authoritative coordinator. Generic over the transport and
/// audio subsystem so tests can substitute [`crate::transport::RecordingTransport`]
/// and [`crate::audio::NullAudioPlayer`] (SPEC_FULL.md §1 +A4).
pub struct Coordinator<T: Transport, A: AudioPlayer> {
    state: GameState,
    controller: Option<NightFlowController>,
    transport: T,
    audio: A,
    config: CoordinatorConfig,
}

impl<T: Transport, A: AudioPlayer> Coordinator<T, A> {
    pub fn new(room_code: String, host_uid: String, template: Vec<Role>, transport: T, audio: A, config: CoordinatorConfig) -> Self {
        Coordinator {
            state: GameState::new(room_code, host_uid, template),
            controller: None,
            transport,
            audio,
            config,
        }
    }

    pub fn state(&self) -> &GameState {
        &self.state
    }

    pub fn transport(&self) -> &T {
        &self.transport
    }

    fn seat_in_range(&self, seat: i32) -> bool {
        seat >= 0 && (seat as usize) < self.state.num_players()
    }

    // ---- revision discipline (spec.md §4.3 "Revision discipline") ----

    async fn broadcast_state(&mut self) -> u64 {
        self.state.revision += 1;
        let revision = self.state.revision;
        let public = public_state_from(&self.state);
        self.transport.broadcast(PublicMessage::StateUpdate { state: public, revision }).await;
        revision
    }

    /// Re-sends the current snapshot without bumping the revision. Used for
    /// `REQUEST_STATE`, which (unlike `SNAPSHOT_REQUEST`) carries no
    /// `requestId` to address a targeted reply to.
    async fn resend_current_state(&mut self) {
        let revision = self.state.revision;
        let public = public_state_from(&self.state);
        self.transport.broadcast(PublicMessage::StateUpdate { state: public, revision }).await;
    }

    async fn send_private(&mut self, to_uid: String, revision: u64, payload: PrivatePayload) {
        self.transport.broadcast(PublicMessage::PrivateEffect { to_uid, revision, payload }).await;
    }

    async fn reject_private(&mut self, seat: i32, action: &str, reason: String) {
        if let Some(uid) = self.state.players.get(&seat).map(|slot| slot.uid.clone()) {
            let revision = self.state.revision;
            self.send_private(uid, revision, PrivatePayload::ActionRejected { action: action.to_string(), reason }).await;
        }
    }

    // ---- seat management (spec.md §4.3 "Seat management") ----

    fn try_sit(&mut self, seat: i32, uid: String, display_name: Option<String>, avatar_url: Option<String>) -> Result<(), &'static str> {
        if self.state.players.contains_key(&seat) {
            return Err("seat_taken");
        }
        // I2: defensively clear any other seat already held by this uid.
        self.state.players.retain(|_, slot| slot.uid != uid);
        self.state.players.insert(seat, PlayerSlot {
            uid,
            seat_number: seat,
            display_name,
            avatar_url,
            role: None,
            has_viewed_role: false,
            is_bot: false,
        });
        self.state.status = if self.state.all_seats_occupied() { Status::Seated } else { Status::Unseated };
        Ok(())
    }

    fn try_standup(&mut self, seat: i32, uid: &str) -> Result<(), &'static str> {
        match self.state.players.get(&seat) {
            Some(slot) if slot.uid == uid => {
                self.state.players.remove(&seat);
                self.state.status = Status::Unseated;
                Ok(())
            }
            _ => Err("not_seated"),
        }
    }

    /// The ACK-based seat protocol (spec.md §4.3 "Seat management").
    pub async fn handle_seat_action_request(
        &mut self,
        request_id: String,
        action: SeatAction,
        seat: i32,
        uid: String,
        display_name: Option<String>,
        avatar_url: Option<String>,
    ) {
        if !self.seat_in_range(seat) {
            log::warn!("protocol error: seat {seat} out of range for a {}-player template", self.state.num_players());
            return;
        }
        if !matches!(self.state.status, Status::Unseated | Status::Seated) {
            log::debug!("seat action ignored: status is {:?}, not pre-game", self.state.status);
            return;
        }
        let result = match action {
            SeatAction::Sit => self.try_sit(seat, uid.clone(), display_name, avatar_url),
            SeatAction::Standup => self.try_standup(seat, &uid),
        };
        let (success, reason) = match result {
            Ok(()) => (true, None),
            Err(reason) => (false, Some(reason.to_string())),
        };
        self.transport.broadcast(PublicMessage::SeatActionAck { request_id, to_uid: uid, success, seat, reason }).await;
        if success {
            self.broadcast_state().await;
        }
    }

    /// The plain (un-ACKed) `JOIN` message: rejects via a public `SEAT_REJECTED`.
    pub async fn handle_join(&mut self, seat: i32, uid: String, display_name: Option<String>, avatar_url: Option<String>) {
        if !self.seat_in_range(seat) {
            log::warn!("protocol error: seat {seat} out of range for a {}-player template", self.state.num_players());
            return;
        }
        if !matches!(self.state.status, Status::Unseated | Status::Seated) {
            log::debug!("join ignored: status is {:?}, not pre-game", self.state.status);
            return;
        }
        match self.try_sit(seat, uid.clone(), display_name, avatar_url) {
            Ok(()) => self.broadcast_state().await,
            Err(reason) => {
                self.transport.broadcast(PublicMessage::SeatRejected { seat, request_uid: uid, reason: reason.to_string() }).await;
                return;
            }
        };
    }

    pub async fn handle_leave(&mut self, seat: i32, uid: String) {
        if !matches!(self.state.status, Status::Unseated | Status::Seated) {
            log::debug!("leave ignored: status is {:?}, not pre-game", self.state.status);
            return;
        }
        if self.try_standup(seat, &uid).is_ok() {
            self.broadcast_state().await;
        }
    }

    // ---- role assignment & readiness (spec.md §4.3 "Role assignment") ----

    /// Only valid in `Seated`. Shuffles a copy of the template with a
    /// uniform Fisher-Yates permutation and assigns to occupied seats in
    /// seat order, generalizing the teacher crate's `thread_rng().shuffle`
    /// (an older `rand` API) to `rand` 0.8's `SliceRandom::shuffle`.
    pub async fn assign_roles(&mut self) {
        if self.state.status != Status::Seated {
            log::debug!("assignRoles ignored: status is {:?}, not Seated", self.state.status);
            return;
        }
        let mut roles = self.state.template.clone();
        roles.shuffle(&mut rand::thread_rng());
        let mut seats: Vec<i32> = self.state.players.keys().copied().collect();
        seats.sort_unstable();
        for (seat, role) in seats.into_iter().zip(roles) {
            if let Some(slot) = self.state.players.get_mut(&seat) {
                slot.role = Some(role);
                slot.has_viewed_role = false;
            }
        }
        self.state.status = Status::Assigned;
        self.broadcast_state().await;
    }

    /// `VIEWED_ROLE`. Once every occupied slot has viewed, transitions to `Ready`.
    pub async fn viewed_role(&mut self, seat: i32) {
        if self.state.status != Status::Assigned {
            log::debug!("viewedRole ignored: status is {:?}, not Assigned", self.state.status);
            return;
        }
        let Some(slot) = self.state.players.get_mut(&seat) else {
            log::debug!("viewedRole ignored: seat {seat} is empty");
            return;
        };
        slot.has_viewed_role = true;
        if self.state.players.values().all(|slot| slot.has_viewed_role) {
            self.state.status = Status::Ready;
        }
        self.broadcast_state().await;
    }

    // ---- night start & the per-step loop (spec.md §4.3 "Night start", "Per-step loop") ----

    /// Only valid in `Ready`. See spec.md §5 for the suspension-point shape
    /// this method's `await`s correspond to.
    pub async fn start_game(&mut self) {
        if self.state.status != Status::Ready {
            log::debug!("startGame ignored: status is {:?}, not Ready", self.state.status);
            return;
        }
        let plan = NightPlan::derive(&self.state.template);
        self.controller = Some(NightFlowController::new(plan));
        self.dispatch_controller(Event::StartNight);
        self.state.status = Status::Ongoing;
        self.state.is_audio_playing = true;
        self.broadcast_state().await;

        audio::with_safety_timeout("night_begin", self.config.audio_safety_timeout, self.audio.play_night_begin_audio()).await;
        self.dispatch_controller(Event::NightBeginAudioDone);
        tokio::time::sleep(self.config.night_begin_pause).await;

        self.sync_step_index();
        match self.controller.as_ref().map(NightFlowController::phase) {
            Some(Phase::RoleBeginAudio) => self.enter_step().await,
            Some(Phase::NightEndAudio) => self.finish_night().await,
            _ => {}
        }
    }

    fn dispatch_controller(&mut self, event: Event) {
        let controller = self.controller.as_mut().expect("I4 violated: night flow controller missing while status is Ongoing");
        if let Err(e) = controller.dispatch(event) {
            log::debug!("idempotent no-op: {event:?} rejected in phase {:?} ({e})", controller.phase());
        }
    }

    fn sync_step_index(&mut self) {
        if let Some(controller) = &self.controller {
            self.state.current_step_index = controller.current_step_index();
        }
    }

    fn pending_seats_for_role(&self, role: Role) -> Vec<i32> {
        if role == Role::Wolf {
            let mut seats: Vec<i32> = self.state.players.values()
                .filter(|slot| slot.role.is_some_and(|r| r.spec().participates_in_wolf_vote))
                .filter(|slot| !self.state.wolf_votes.contains_key(&slot.seat_number))
                .map(|slot| slot.seat_number)
                .collect();
            seats.sort_unstable();
            seats
        } else {
            let mut seats: Vec<i32> = self.state.players.values()
                .filter(|slot| slot.role == Some(role))
                .map(|slot| slot.seat_number)
                .collect();
            seats.sort_unstable();
            seats
        }
    }

    fn uid_for_role(&self, role: Role) -> Option<String> {
        self.state.players.values().find(|slot| slot.role == Some(role)).map(|slot| slot.uid.clone())
    }

    /// Announces the step, sends any step-specific private context, plays
    /// role-begin audio, and dispatches into `WaitingForAction`.
    async fn enter_step(&mut self) {
        let Some((role, step_id)) = self.controller.as_ref().and_then(|c| c.current_step()).map(|s| (s.role, s.step_id.clone())) else {
            return;
        };

        let pending_seats = self.pending_seats_for_role(role);
        let phase = step_id.clone();
        self.transport.broadcast(PublicMessage::RoleTurn { role, pending_seats, step_id }).await;

        if role == Role::Witch {
            let killed_seat = self.state.current_night_results.wolf_kill_target;
            let can_save = killed_seat.is_some();
            let can_poison = true;
            if let Some(witch_uid) = self.uid_for_role(Role::Witch) {
                let revision = self.state.revision;
                self.send_private(witch_uid, revision, PrivatePayload::WitchContext { killed_seat, can_save, can_poison, phase }).await;
            }
        }

        audio::with_safety_timeout("role_begin", self.config.audio_safety_timeout, self.audio.play_role_beginning_audio(role)).await;
        self.dispatch_controller(Event::RoleBeginAudioDone);
        self.sync_step_index();
        self.broadcast_state().await;

        // A wolf-meeting step where every voter is already settled (e.g. the
        // sole wolf was nightmare-blocked, see `maybe_finalize_wolf_vote`)
        // must auto-advance: nobody will ever submit a vote to trigger it.
        if role == Role::Wolf {
            self.maybe_finalize_wolf_vote().await;
        }
    }

    async fn advance_after_action(&mut self, role: Role) {
        audio::with_safety_timeout("role_end", self.config.audio_safety_timeout, self.audio.play_role_ending_audio(role)).await;
        self.dispatch_controller(Event::RoleEndAudioDone);
        self.sync_step_index();
        match self.controller.as_ref().map(NightFlowController::phase) {
            Some(Phase::RoleBeginAudio) => self.enter_step().await,
            Some(Phase::NightEndAudio) => self.finish_night().await,
            _ => {}
        }
    }

    async fn finish_night(&mut self) {
        audio::with_safety_timeout("night_end", self.config.audio_safety_timeout, self.audio.play_night_end_audio()).await;
        self.dispatch_controller(Event::NightEndAudioDone);
        let deaths = self.compute_deaths();
        self.state.last_night_deaths = deaths.clone();
        self.state.is_audio_playing = false;
        self.broadcast_state().await;
        self.transport.broadcast(PublicMessage::NightEnd { deaths }).await;
    }

    // ---- action handling (spec.md §4.3 "Receiving an action") ----

    /// `ACTION`. Handles every non-wolf-vote night step (chooseSeat, swap,
    /// compound). Wolf-vote steps are only ever driven by [`Self::handle_wolf_vote`].
    pub async fn handle_action(&mut self, seat: i32, role: Role, target: Option<i32>, extra: Option<i32>) {
        if self.state.status != Status::Ongoing {
            log::debug!("action ignored: status is {:?}, not Ongoing", self.state.status);
            return;
        }
        let Some(controller) = &self.controller else {
            panic!("I4 violated: night flow controller missing while status is Ongoing");
        };
        if controller.phase() != Phase::WaitingForAction {
            log::debug!("action ignored: controller phase is {:?}, not WaitingForAction", controller.phase());
            return;
        }
        let Some(current_role) = controller.current_role() else { return };
        if current_role != role {
            log::debug!("action ignored: role {role:?} is not the current step's role ({current_role:?})");
            return;
        }
        let Some(slot) = self.state.players.get(&seat) else {
            log::debug!("action ignored: seat {seat} is empty");
            return;
        };
        if slot.role != Some(role) {
            log::debug!("action ignored: seat {seat}'s assigned role does not match the claimed role");
            return;
        }
        let actor_uid = slot.uid.clone();

        let schema = controller.current_step().expect("checked above").schema.clone();
        if matches!(schema, ActionSchema::WolfVote { .. }) {
            log::debug!("action ignored: role {role:?} votes via submitWolfVote, not submitAction");
            return;
        }

        if let Some(blocked_seat) = self.state.nightmare_blocked_seat() {
            if blocked_seat == seat && (target.is_some() || extra.is_some()) {
                self.reject_private(seat, "submitAction", ResolverError::NightmareBlocked.to_string()).await;
                return;
            }
        }

        let input = match action_input_from_wire(&schema, target, extra) {
            Ok(input) => input,
            Err(e) => {
                log::warn!("protocol error decoding action for seat {seat}: {e}");
                return;
            }
        };

        let role_map = self.state.role_map();
        match resolver::resolve(&schema, seat, role, &role_map, &input) {
            Err(e) => {
                self.reject_private(seat, "submitAction", e.to_string()).await;
            }
            Ok(effect) => {
                self.state.actions.insert(role, recorded_action_from_effect(&effect));
                if let Some(controller) = self.controller.as_mut() {
                    let _ = controller.record_action(role, target.unwrap_or(-1));
                }

                if crate::roles::is_reveal_role(role) {
                    let revision = self.broadcast_state().await;
                    let payload = self.compute_reveal_payload(role, &effect);
                    self.send_private(actor_uid, revision, payload).await;
                    self.state.pending_reveal_acks.insert((revision, role));
                } else {
                    self.dispatch_controller(Event::ActionSubmitted);
                    self.advance_after_action(role).await;
                }
            }
        }
    }

    fn compute_reveal_payload(&self, role: Role, effect: &ActionInput) -> PrivatePayload {
        let ActionInput::ChooseSeat(Some(target_seat)) = *effect else {
            unreachable!("every reveal role's schema is a mandatory chooseSeat");
        };
        let role_map = self.state.effective_role_map();
        let target_role = role_map[&target_seat];
        match role {
            Role::Seer => PrivatePayload::SeerReveal {
                target_seat,
                result: target_role.spec().seer_team.to_string(),
            },
            Role::Psychic | Role::Gargoyle | Role::WolfRobot => PrivatePayload::RoleReveal {
                role,
                target_seat,
                result: target_role.spec().display_name.to_string(),
            },
            _ => unreachable!("{role:?} is not a reveal role"),
        }
    }

    /// `REVEAL_ACK`. Accepted iff the revision matches, the controller is
    /// still waiting on exactly this role, and the ack key is outstanding.
    pub async fn handle_reveal_ack(&mut self, seat: i32, role: Role, revision: u64) {
        let _ = seat;
        if revision != self.state.revision {
            return; // stale ack, silently dropped
        }
        let Some(controller) = &self.controller else { return };
        if controller.phase() != Phase::WaitingForAction || controller.current_role() != Some(role) {
            return;
        }
        if !self.state.pending_reveal_acks.remove(&(revision, role)) {
            return;
        }
        self.dispatch_controller(Event::ActionSubmitted);
        self.advance_after_action(role).await;
    }

    // ---- wolf meeting vote (spec.md §4.3 "Wolf meeting vote") ----

    pub async fn handle_wolf_vote(&mut self, seat: i32, target: i32) {
        if self.state.status != Status::Ongoing {
            log::debug!("wolf vote ignored: status is {:?}, not Ongoing", self.state.status);
            return;
        }
        let Some(controller) = &self.controller else {
            panic!("I4 violated: night flow controller missing while status is Ongoing");
        };
        if controller.phase() != Phase::WaitingForAction || controller.current_role() != Some(Role::Wolf) {
            log::debug!("wolf vote ignored: not currently the wolf meeting step");
            return;
        }
        let Some(actor_role) = self.state.players.get(&seat).and_then(|slot| slot.role) else {
            log::debug!("wolf vote ignored: seat {seat} is empty");
            return;
        };
        if !actor_role.spec().participates_in_wolf_vote {
            log::debug!("wolf vote ignored: seat {seat}'s role does not participate in the wolf meeting");
            return;
        }

        if self.state.nightmare_blocked_seat() == Some(seat) {
            self.reject_private(seat, "submitWolfVote", ResolverError::NightmareBlocked.to_string()).await;
            return;
        }

        let schema = controller.current_step().expect("checked above").schema.clone();
        let role_map = self.state.role_map();
        match resolver::resolve(&schema, seat, actor_role, &role_map, &ActionInput::WolfVote(target)) {
            Err(e) => {
                self.reject_private(seat, "submitWolfVote", e.to_string()).await;
            }
            Ok(ActionInput::WolfVote(resolved)) => {
                self.state.wolf_votes.insert(seat, resolved);
                self.state.current_night_results.wolf_votes_by_seat.insert(seat, resolved);
                self.broadcast_state().await;
                self.maybe_finalize_wolf_vote().await;
            }
            Ok(_) => unreachable!("wolfVote schema always resolves to ActionInput::WolfVote"),
        }
    }

    /// The seats whose vote is actually required to finalize this meeting:
    /// every participating seat except one nightmare has blocked (a blocked
    /// wolf structurally cannot submit a valid vote, per spec.md §4.3
    /// "Blocking" — `WOLF_VOTE` carries no "skip" shape). This is the
    /// Coordinator's own resolution of how blocking interacts with the
    /// meeting's "everyone voted" gate; spec.md states both rules but not
    /// their intersection (see DESIGN.md).
    fn required_wolf_voters(&self) -> Vec<i32> {
        let blocked = self.state.nightmare_blocked_seat();
        self.state.players.values()
            .filter(|slot| slot.role.is_some_and(|r| r.spec().participates_in_wolf_vote))
            .map(|slot| slot.seat_number)
            .filter(|&seat| Some(seat) != blocked)
            .collect()
    }

    /// Once-guarded: if `actions` already has a wolf entry, finalization has
    /// already run and this is a no-op (spec.md §4.3 "the finalize step
    /// itself is once-guarded").
    async fn maybe_finalize_wolf_vote(&mut self) {
        if self.state.actions.contains_key(&Role::Wolf) {
            return;
        }
        let required = self.required_wolf_voters();
        if !required.iter().all(|seat| self.state.wolf_votes.contains_key(seat)) {
            return;
        }
        let resolved = wolf_vote::resolve(&self.state.wolf_votes);
        let final_target = resolved.unwrap_or(wolf_vote::ABSTAIN);
        self.state.actions.insert(Role::Wolf, RecordedAction::WolfVote(final_target));
        self.state.current_night_results.wolf_kill_target = resolved;
        if let Some(controller) = self.controller.as_mut() {
            let _ = controller.record_action(Role::Wolf, final_target);
        }
        self.dispatch_controller(Event::ActionSubmitted);
        self.advance_after_action(Role::Wolf).await;
    }

    // ---- death computation ----

    fn compute_deaths(&self) -> Vec<i32> {
        let role_map = self.state.role_map();
        let seat_of = |role: Role| role_map.iter().find(|(_, &r)| r == role).map(|(&seat, _)| seat);

        let wolf_kill = match self.state.actions.get(&Role::Wolf) {
            Some(RecordedAction::WolfVote(t)) if *t != wolf_vote::ABSTAIN => Some(*t),
            _ => None,
        };
        let nightmare_blocked_wolf = self.state.nightmare_blocked_seat()
            .and_then(|seat| role_map.get(&seat))
            .is_some_and(|role| role.spec().participates_in_wolf_vote);

        let guard_protect = match self.state.actions.get(&Role::Guard) {
            Some(RecordedAction::Seat(t)) => *t,
            _ => None,
        };
        let (witch_save, witch_poison) = match self.state.actions.get(&Role::Witch) {
            Some(RecordedAction::Compound { save, poison }) => (*save, *poison),
            _ => (None, None),
        };
        let wolf_queen_charm = match self.state.actions.get(&Role::WolfQueen) {
            Some(RecordedAction::Seat(t)) => *t,
            _ => None,
        };
        let dreamcatcher_dream = match self.state.actions.get(&Role::Dreamcatcher) {
            Some(RecordedAction::Seat(t)) => *t,
            _ => None,
        };
        let magician_swap = match self.state.actions.get(&Role::Magician) {
            Some(RecordedAction::Swap(a, b)) => Some((*a, *b)),
            _ => None,
        };

        let actions = NightActions {
            wolf_kill,
            guard_protect,
            witch_save,
            witch_poison,
            wolf_queen_charm,
            dreamcatcher_dream,
            magician_swap,
            nightmare_block: self.state.nightmare_blocked_seat(),
            nightmare_blocked_wolf,
        };
        let roles = RoleSeatMap {
            witch: seat_of(Role::Witch),
            wolf_queen: seat_of(Role::WolfQueen),
            dreamcatcher: seat_of(Role::Dreamcatcher),
            spirit_knight: seat_of(Role::SpiritKnight),
            seer: seat_of(Role::Seer),
            guard: seat_of(Role::Guard),
        };
        death::calculate(&actions, &roles)
    }

    // ---- resync (spec.md §4.3 "Reconnection", §7 "Local recovery") ----

    pub async fn handle_snapshot_request(&mut self, request_id: String, uid: String) {
        let revision = self.state.revision;
        let public = public_state_from(&self.state);
        self.transport.broadcast(PublicMessage::SnapshotResponse { request_id, to_uid: uid, state: public, revision }).await;
    }

    // ---- restart paths (spec.md §4.3 "Emergency restart") ----

    /// Only valid in `Ongoing`. MUST succeed when every player has a role —
    /// it has no other precondition, so it is always safe to call mid-night.
    pub async fn emergency_restart_and_reshuffle_roles(&mut self) {
        if self.state.status != Status::Ongoing {
            log::debug!("emergencyRestart ignored: status is {:?}, not Ongoing", self.state.status);
            return;
        }
        self.reset_for_restart().await;
    }

    /// Explicit restart from `Ended` (spec.md §3.2 "Ended -> Seated on
    /// explicit restart"). Calling this twice in a row is idempotent: the
    /// second call finds `status != Ended` and is a no-op (spec.md §8).
    pub async fn restart_game(&mut self) {
        if self.state.status != Status::Ended {
            log::debug!("restartGame ignored: status is {:?}, not Ended", self.state.status);
            return;
        }
        self.reset_for_restart().await;
    }

    async fn reset_for_restart(&mut self) {
        self.audio.stop().await;
        self.state.clear_night_caches();
        self.controller = None;
        for slot in self.state.players.values_mut() {
            slot.role = None;
            slot.has_viewed_role = false;
        }
        self.state.is_audio_playing = false;
        self.state.status = Status::Seated;
        self.transport.broadcast(PublicMessage::GameRestarted {}).await;
        self.broadcast_state().await;
    }

    /// Teardown hook for deterministic test reset (spec.md §9 "Singletons").
    pub async fn stop(&mut self) {
        self.audio.stop().await;
    }

    /// Teardown hook: drops every seat held by `uid` without announcing a
    /// rejection (the session is gone, not contested).
    pub fn leave_room(&mut self, uid: &str) {
        self.state.players.retain(|_, slot| slot.uid != uid);
    }

    // ---- single entry point for the message-driven actor model ----

    /// Dispatches one inbound [`PeerMessage`] (SPEC_FULL.md §5, "one inbound
    /// queue of typed events; one serial handler"). `assignRoles`,
    /// `startGame`, and the restart paths are Host-driven operations, not
    /// responses to a `PeerMessage`, so they are called directly instead.
    pub async fn handle_peer_message(&mut self, msg: PeerMessage) {
        match msg {
            PeerMessage::RequestState { uid } => {
                let _ = uid;
                self.resend_current_state().await;
            }
            PeerMessage::Join { seat, uid, display_name, avatar_url } => {
                self.handle_join(seat, uid, display_name, avatar_url).await;
            }
            PeerMessage::Leave { seat, uid } => {
                self.handle_leave(seat, uid).await;
            }
            PeerMessage::Action { seat, role, target, extra } => {
                self.handle_action(seat, role, target, extra).await;
            }
            PeerMessage::RevealAck { seat, role, revision } => {
                self.handle_reveal_ack(seat, role, revision).await;
            }
            PeerMessage::WolfVote { seat, target } => {
                self.handle_wolf_vote(seat, target).await;
            }
            PeerMessage::ViewedRole { seat } => {
                self.viewed_role(seat).await;
            }
            PeerMessage::SeatActionRequest { request_id, action, seat, uid, display_name, avatar_url } => {
                self.handle_seat_action_request(request_id, action, seat, uid, display_name, avatar_url).await;
            }
            PeerMessage::SnapshotRequest { request_id, uid, last_revision } => {
                // A stale `lastRevision` gets no special treatment (spec.md
                // SPEC_FULL.md §4.3b): the Host always answers with the
                // current revisioned state, exactly like a fresh request.
                let _ = last_revision;
                self.handle_snapshot_request(request_id, uid).await;
            }
        }
    }
}

fn action_input_from_wire(schema: &ActionSchema, target: Option<i32>, extra: Option<i32>) -> Result<ActionInput, crate::error::ProtocolError> {
    match schema {
        ActionSchema::ChooseSeat { .. } => Ok(ActionInput::ChooseSeat(target)),
        ActionSchema::Swap { .. } => {
            let encoded = target.ok_or(crate::error::ProtocolError::InvalidMagicianEncoding { target: -1 })?;
            let (first, second) = crate::protocol::decode_magician_swap(encoded)?;
            Ok(ActionInput::Swap(first, second))
        }
        ActionSchema::WolfVote { .. } => Ok(ActionInput::WolfVote(target.unwrap_or(wolf_vote::ABSTAIN))),
        ActionSchema::Compound { .. } => Ok(ActionInput::Compound { save: target, poison: extra }),
    }
}

fn recorded_action_from_effect(effect: &ActionInput) -> RecordedAction {
    match *effect {
        ActionInput::ChooseSeat(target) => RecordedAction::Seat(target),
        ActionInput::Swap(a, b) => RecordedAction::Swap(a, b),
        ActionInput::WolfVote(target) => RecordedAction::WolfVote(target),
        ActionInput::Compound { save, poison } => RecordedAction::Compound { save, poison },
    }
}

fn wolf_vote_status(state: &GameState) -> HashMap<i32, bool> {
    state.players.values()
        .filter(|slot| slot.role.is_some_and(|r| r.spec().participates_in_wolf_vote))
        .map(|slot| (slot.seat_number, state.wolf_votes.contains_key(&slot.seat_number)))
        .collect()
}

/// Builds the public snapshot (spec.md §6.4) from the live authoritative
/// state. Sensitive data (exact wolf target, reveal results) never appears
/// here — see [`PrivatePayload`] for that.
fn public_state_from(state: &GameState) -> PublicState {
    let players = (0..state.num_players() as i32)
        .map(|seat| {
            let public_slot = state.players.get(&seat).map(|slot| PublicPlayerSlot {
                uid: slot.uid.clone(),
                seat_number: slot.seat_number,
                display_name: slot.display_name.clone(),
                avatar_url: slot.avatar_url.clone(),
                role: slot.role,
                has_viewed_role: slot.has_viewed_role,
            });
            (seat, public_slot)
        })
        .collect();

    PublicState {
        room_code: state.room_code.clone(),
        host_uid: state.host_uid.clone(),
        status: state.status,
        template_roles: state.template.clone(),
        players,
        current_step_index: state.current_step_index,
        is_audio_playing: state.is_audio_playing,
        wolf_vote_status: wolf_vote_status(state),
        nightmare_blocked_seat: state.nightmare_blocked_seat(),
        current_night_results: PublicNightResults {
            wolf_votes_by_seat: (!state.current_night_results.wolf_votes_by_seat.is_empty())
                .then(|| state.current_night_results.wolf_votes_by_seat.clone()),
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::audio::NullAudioPlayer;
    use crate::transport::RecordingTransport;

    fn new_coordinator(template: Vec<Role>) -> Coordinator<RecordingTransport, NullAudioPlayer> {
        let mut config = CoordinatorConfig::default();
        config.night_begin_pause = Duration::from_millis(1);
        config.audio_safety_timeout = Duration::from_millis(50);
        Coordinator::new("room".into(), "host".into(), template, RecordingTransport::new(), NullAudioPlayer::new(), config)
    }

    async fn seat_everyone(coord: &mut Coordinator<RecordingTransport, NullAudioPlayer>, n: usize) {
        for i in 0..n {
            coord.handle_join(i as i32, format!("uid{i}"), None, None).await;
        }
    }

    #[tokio::test]
    async fn seat_taken_is_rejected_and_does_not_mutate() {
        let mut coord = new_coordinator(vec![Role::Villager, Role::Villager]);
        coord.handle_join(0, "alice".into(), None, None).await;
        coord.handle_join(0, "bob".into(), None, None).await;
        assert_eq!(coord.state().players.get(&0).unwrap().uid, "alice");
        let rejected = coord.transport().sent.iter().any(|m| matches!(m, PublicMessage::SeatRejected { reason, .. } if reason == "seat_taken"));
        assert!(rejected);
    }

    #[tokio::test]
    async fn seating_everyone_flips_status_to_seated() {
        let mut coord = new_coordinator(vec![Role::Villager, Role::Villager]);
        seat_everyone(&mut coord, 2).await;
        assert_eq!(coord.state().status, Status::Seated);
    }

    #[tokio::test]
    async fn assign_roles_deals_the_whole_template() {
        let mut coord = new_coordinator(vec![Role::Seer, Role::Wolf, Role::Villager]);
        seat_everyone(&mut coord, 3).await;
        coord.assign_roles().await;
        assert_eq!(coord.state().status, Status::Assigned);
        let mut dealt: Vec<Role> = coord.state().players.values().map(|s| s.role.unwrap()).collect();
        dealt.sort_by_key(|r| format!("{r:?}"));
        let mut template = vec![Role::Seer, Role::Wolf, Role::Villager];
        template.sort_by_key(|r| format!("{r:?}"));
        assert_eq!(dealt, template);
    }

    #[tokio::test]
    async fn viewing_role_transitions_to_ready_once_everyone_has_viewed() {
        let mut coord = new_coordinator(vec![Role::Villager, Role::Villager]);
        seat_everyone(&mut coord, 2).await;
        coord.assign_roles().await;
        coord.viewed_role(0).await;
        assert_eq!(coord.state().status, Status::Assigned);
        coord.viewed_role(1).await;
        assert_eq!(coord.state().status, Status::Ready);
    }

    /// E2E-1: seer happy path. No wolf-aligned role in this template, so the
    /// Seer's step is the night's only step (no wolf meeting precedes it).
    #[tokio::test]
    async fn seer_reveal_blocks_on_explicit_ack() {
        let mut coord = new_coordinator(vec![Role::Seer, Role::Villager, Role::Villager]);
        seat_everyone(&mut coord, 3).await;
        // force a deterministic deal for the test instead of relying on shuffle
        coord.state.players.get_mut(&0).unwrap().role = Some(Role::Seer);
        coord.state.players.get_mut(&1).unwrap().role = Some(Role::Villager);
        coord.state.players.get_mut(&2).unwrap().role = Some(Role::Villager);
        coord.state.status = Status::Ready;

        coord.start_game().await;
        assert_eq!(coord.state().current_step_index, 0);

        coord.handle_action(0, Role::Seer, Some(1), None).await;

        let revision = coord.state().revision;
        let reveal = coord.transport().private_effects_for("uid0").last().cloned();
        assert_eq!(reveal, Some(PrivatePayload::SeerReveal { target_seat: 1, result: "好人".to_string() }));
        assert!(coord.state().pending_reveal_acks.contains(&(revision, Role::Seer)));

        // no advance without the ack
        coord.handle_reveal_ack(0, Role::Seer, revision - 1).await; // stale, dropped
        assert!(coord.state().pending_reveal_acks.contains(&(revision, Role::Seer)));

        coord.handle_reveal_ack(0, Role::Seer, revision).await;
        assert!(!coord.state().pending_reveal_acks.contains(&(revision, Role::Seer)));
    }

    /// E2E-3/E2E-4: wolf meeting plurality and tie via the public handler.
    #[tokio::test]
    async fn wolf_meeting_finalizes_once_every_voter_has_voted() {
        let mut coord = new_coordinator(vec![Role::Wolf, Role::Wolf, Role::Villager, Role::Villager]);
        seat_everyone(&mut coord, 4).await;
        coord.state.players.get_mut(&0).unwrap().role = Some(Role::Wolf);
        coord.state.players.get_mut(&1).unwrap().role = Some(Role::Wolf);
        coord.state.players.get_mut(&2).unwrap().role = Some(Role::Villager);
        coord.state.players.get_mut(&3).unwrap().role = Some(Role::Villager);
        coord.state.status = Status::Ready;

        coord.start_game().await;
        coord.handle_wolf_vote(0, 2).await;
        coord.handle_wolf_vote(1, 2).await;

        assert_eq!(coord.state().actions.get(&Role::Wolf), Some(&RecordedAction::WolfVote(2)));
        assert_eq!(coord.state().current_night_results.wolf_kill_target, Some(2));
    }

    /// E2E-5: nightmare blocks one of two wolves. The blocked wolf's own vote
    /// is rejected, and the meeting still finalizes on the other wolf's vote
    /// alone (the blocked seat is excluded from the required-voters set).
    #[tokio::test]
    async fn nightmare_block_rejects_the_blocked_seats_action() {
        let mut coord = new_coordinator(vec![Role::Nightmare, Role::Wolf, Role::Wolf, Role::Villager]);
        seat_everyone(&mut coord, 4).await;
        coord.state.players.get_mut(&0).unwrap().role = Some(Role::Nightmare);
        coord.state.players.get_mut(&1).unwrap().role = Some(Role::Wolf);
        coord.state.players.get_mut(&2).unwrap().role = Some(Role::Wolf);
        coord.state.players.get_mut(&3).unwrap().role = Some(Role::Villager);
        coord.state.status = Status::Ready;

        coord.start_game().await; // step 0: nightmare
        coord.handle_action(0, Role::Nightmare, Some(1), None).await; // block seat 1

        // now in the wolf-meeting step; the blocked wolf's vote is rejected
        coord.handle_wolf_vote(1, 3).await;
        let rejected = coord.transport().private_effects_for("uid1").last().cloned();
        assert!(matches!(rejected, Some(PrivatePayload::ActionRejected { action, .. }) if action == "submitWolfVote"));
        assert!(coord.state().actions.get(&Role::Wolf).is_none());

        // the unblocked wolf's vote is the only one required, so it alone finalizes the meeting
        coord.handle_wolf_vote(2, 3).await;
        assert_eq!(coord.state().actions.get(&Role::Wolf), Some(&RecordedAction::WolfVote(3)));
    }

    /// E2E-6: magician swap then seer reveal reads the post-swap map.
    #[tokio::test]
    async fn magician_swap_then_seer_reveal_reads_post_swap_role() {
        let mut coord = new_coordinator(vec![Role::Magician, Role::Seer, Role::Villager, Role::Wolf]);
        seat_everyone(&mut coord, 4).await;
        coord.state.players.get_mut(&0).unwrap().role = Some(Role::Magician);
        coord.state.players.get_mut(&1).unwrap().role = Some(Role::Seer);
        coord.state.players.get_mut(&2).unwrap().role = Some(Role::Villager);
        coord.state.players.get_mut(&3).unwrap().role = Some(Role::Wolf);
        coord.state.status = Status::Ready;

        coord.start_game().await; // step 0: magician (precedes seer per GLOBAL_NIGHT_ORDER)
        coord.handle_action(0, Role::Magician, Some(302), None).await; // encode_magician_swap(2, 3)

        // advances past the wolf meeting (the only other step before seer) automatically once voted
        coord.handle_wolf_vote(3, wolf_vote::ABSTAIN).await;

        coord.handle_action(1, Role::Seer, Some(2), None).await;
        let reveal = coord.transport().private_effects_for("uid1").last().cloned();
        assert_eq!(reveal, Some(PrivatePayload::SeerReveal { target_seat: 2, result: "狼人".to_string() }));
    }

    #[tokio::test]
    async fn restart_game_twice_in_a_row_is_idempotent() {
        let mut coord = new_coordinator(vec![Role::Villager, Role::Villager]);
        seat_everyone(&mut coord, 2).await;
        coord.state.status = Status::Ended;
        coord.restart_game().await;
        let after_first = coord.state().status;
        coord.restart_game().await;
        assert_eq!(coord.state().status, after_first);
        assert_eq!(coord.state().status, Status::Seated);
    }

    #[tokio::test]
    async fn emergency_restart_preserves_seats_and_clears_roles() {
        let mut coord = new_coordinator(vec![Role::Seer, Role::Wolf, Role::Villager]);
        seat_everyone(&mut coord, 3).await;
        coord.assign_roles().await;
        coord.state.status = Status::Ongoing; // simulate startGame without the audio dance
        coord.controller = Some(NightFlowController::new(NightPlan::derive(&coord.state.template)));

        coord.emergency_restart_and_reshuffle_roles().await;

        assert_eq!(coord.state().status, Status::Seated);
        assert_eq!(coord.state().players.len(), 3);
        assert!(coord.state().players.values().all(|s| s.role.is_none()));
    }
}
