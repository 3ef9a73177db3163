//! View-Model Builder (spec.md §4.7): pure, client-side derivations over a
//! [`PublicState`] snapshot. Nothing here mutates anything or performs I/O —
//! generalizing the teacher crate's free-function style in
//! `game::mod::run`/`run_with_roles` (plain functions over a `State`, no
//! method-carrying struct) to a namespace of associated functions, since
//! there is no instance data to hold (SPEC_FULL.md §4.7a).

use std::collections::HashMap;

use crate::protocol::PublicState;
use crate::roles::{ActionSchema, Faction, NightPlan, Role};
use crate::state::Status;

/// One seat as the current viewer should render it.
#[derive(Debug, Clone, PartialEq)]
pub struct SeatViewModel {
    pub seat_number: i32,
    pub occupied: bool,
    pub display_name: Option<String>,
    pub avatar_url: Option<String>,
    /// Only populated for the viewer's own seat, or for any seat once the
    /// viewer can see wolves and that seat holds a wolf-aligned role.
    pub visible_role: Option<Role>,
    pub is_wolf: bool,
    /// This is the viewer's own seat (spec.md §4.7 `isMySpot`).
    pub is_my_spot: bool,
    /// This seat is the one currently selected in the viewer's own UI state
    /// (spec.md §4.7 `isSelected`) — not derivable from [`PublicState`], so
    /// the caller supplies it.
    pub is_selected: bool,
    pub has_viewed_role: bool,
    pub disabled_reason: Option<String>,
    /// Shown before the night starts, once this seat has viewed its role
    /// (spec.md §4.7 `showReadyBadge?`). Always `false` once `wolf_vote_target`
    /// can be populated — the two are mutually exclusive.
    pub show_ready_badge: bool,
    /// This seat's current wolf-meeting vote, visible only to fellow voters
    /// during the meeting (spec.md §4.7 `wolfVoteTarget?`). `None` whenever
    /// `show_ready_badge` is set.
    pub wolf_vote_target: Option<i32>,
}

/// `getRoleStats` projection (spec.md §4.7, SPEC_FULL.md +D2): one row per
/// role present in the template, with how many copies are in it.
#[derive(Debug, Clone, PartialEq)]
pub struct RoleDisplayItem {
    pub role: Role,
    pub faction: Faction,
    pub count: usize,
}

/// The wolf meeting's tally for display (spec.md §4.7 "getWolfVoteSummary"):
/// `voted` counts wolf-vote-participating seats who have voted so far, out
/// of `participating`, the total number of such seats in the dealt template.
/// `text` is the rendered `"X/Y 狼人已投票"` string.
#[derive(Debug, Clone, PartialEq)]
pub struct WolfVoteSummary {
    pub votes_by_seat: HashMap<i32, i32>,
    pub voted: usize,
    pub participating: usize,
    pub all_voted: bool,
    pub text: String,
}

/// What the viewer's own seat should currently be doing.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ActionerState {
    /// Not this viewer's seat's turn; nothing to render as actionable.
    Idle,
    /// It's this seat's turn and an action is expected.
    AwaitingAction,
    /// This seat already acted and is waiting on the rest of the step/night.
    Submitted,
    /// This seat has a pending reveal it must acknowledge before the night continues.
    AwaitingRevealAck,
}

/// `determineActionerState` (spec.md §4.7): whether the viewer is currently
/// an actioner, and whether the viewer should be shown the wolf pack.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ActionerInfo {
    pub state: ActionerState,
    /// True only during a wolf meeting whose schema lets the pack see each
    /// other, and only if the viewer themself participates in the vote.
    pub show_wolves: bool,
}

/// Zero-sized pure-function namespace, matching the "pure, client-side"
/// framing of spec.md §4.7 (SPEC_FULL.md +4.7a).
pub struct ViewModelBuilder;

impl ViewModelBuilder {
    /// Builds the per-seat render model for one viewer.
    ///
    /// `viewer_seat` is `None` for a spectator. `viewer_role` is the role the
    /// Applier has privately learned for its own seat (from a `RoleReveal`/
    /// assignment), since [`PublicState`] never carries anyone's actual role
    /// except in the one case where `spec.md` §6.4 intentionally makes
    /// `role` public (post-game or always-visible configurations) — here we
    /// trust `PublicPlayerSlot::role` whenever it is `Some`, and otherwise
    /// fall back to `viewer_role` for the viewer's own seat only.
    ///
    /// `show_wolves` is the same value [`Self::actioner_state`] computed for
    /// this viewer: whether the current step is a wolf meeting the viewer
    /// participates in (spec.md §4.7). `selected_seat` is the viewer's own
    /// UI selection, threaded through for `is_selected`.
    pub fn build_seats(
        state: &PublicState,
        viewer_seat: Option<i32>,
        viewer_role: Option<Role>,
        show_wolves: bool,
        selected_seat: Option<i32>,
    ) -> Vec<SeatViewModel> {
        let mut seats = Vec::with_capacity(state.template_roles.len());
        for seat in 0..state.template_roles.len() as i32 {
            let slot = state.players.get(&seat).and_then(|s| s.as_ref());
            let public_role = slot.and_then(|s| s.role);
            let is_self = viewer_seat == Some(seat);
            let visible_role = public_role.or_else(|| if is_self { viewer_role } else { None });

            let revealed_to_viewer = is_self
                || public_role.is_some()
                || (show_wolves && visible_role.is_some_and(|r| r.spec().can_see_wolves));
            let rendered_role = if revealed_to_viewer { visible_role } else { None };

            // showReadyBadge is a pre-night readiness indicator; wolfVoteTarget
            // only makes sense once the wolf meeting is under way, so the two
            // can never both apply to the same seat (spec.md §4.7).
            let show_ready_badge = state.status != Status::Ongoing && slot.is_some_and(|s| s.has_viewed_role);
            let wolf_vote_target = if show_ready_badge {
                None
            } else if show_wolves && public_role.is_some_and(|r| r.spec().participates_in_wolf_vote) {
                state.current_night_results.wolf_votes_by_seat.as_ref().and_then(|votes| votes.get(&seat)).copied()
            } else {
                None
            };

            seats.push(SeatViewModel {
                seat_number: seat,
                occupied: slot.is_some(),
                display_name: slot.and_then(|s| s.display_name.clone()),
                avatar_url: slot.and_then(|s| s.avatar_url.clone()),
                visible_role: rendered_role,
                is_wolf: rendered_role.is_some_and(|r| r.spec().can_see_wolves),
                is_my_spot: is_self,
                is_selected: selected_seat == Some(seat),
                has_viewed_role: slot.is_some_and(|s| s.has_viewed_role),
                disabled_reason: Self::disabled_reason(state, seat, viewer_seat),
                show_ready_badge,
                wolf_vote_target,
            });
        }
        seats
    }

    /// Why a seat's action UI should be disabled right now, if at all.
    /// `None` means the seat is currently actionable by its occupant.
    fn disabled_reason(state: &PublicState, seat: i32, viewer_seat: Option<i32>) -> Option<String> {
        if state.status != Status::Ongoing {
            return Some("night has not started".to_string());
        }
        if viewer_seat != Some(seat) {
            return None; // not this viewer's seat to enable/disable
        }
        if state.nightmare_blocked_seat == Some(seat) {
            return Some("blocked by nightmare this night".to_string());
        }
        None
    }

    /// One row per role present in the dealt template, counted.
    pub fn role_stats(state: &PublicState) -> Vec<RoleDisplayItem> {
        let mut counts: HashMap<Role, usize> = HashMap::new();
        for &role in &state.template_roles {
            *counts.entry(role).or_insert(0) += 1;
        }
        let mut items: Vec<RoleDisplayItem> = counts
            .into_iter()
            .map(|(role, count)| RoleDisplayItem { role, faction: role.spec().faction, count })
            .collect();
        items.sort_by_key(|item| item.role.spec().display_name);
        items
    }

    /// The wolf meeting's current tally: `"X/Y 狼人已投票"`, X the number of
    /// wolf-vote-participating seats who have voted, Y the total number of
    /// such seats in the dealt template (spec.md §4.7 "getWolfVoteSummary").
    pub fn wolf_vote_summary(state: &PublicState) -> WolfVoteSummary {
        let votes_by_seat = state.current_night_results.wolf_votes_by_seat.clone().unwrap_or_default();
        let participating = state.template_roles.iter().filter(|r| r.spec().participates_in_wolf_vote).count();
        let voted = state.wolf_vote_status.values().filter(|&&v| v).count();
        let all_voted = participating > 0 && voted >= participating;
        let text = format!("{voted}/{participating} 狼人已投票");
        WolfVoteSummary { votes_by_seat, voted, participating, all_voted, text }
    }

    /// What the viewer's own seat should currently be doing, and whether
    /// they should be shown the wolf pack (spec.md §4.7 "determineActionerState").
    pub fn actioner_state(state: &PublicState, viewer_seat: Option<i32>, viewer_role: Option<Role>, has_pending_reveal_ack: bool) -> ActionerInfo {
        let idle = ActionerInfo { state: ActionerState::Idle, show_wolves: false };
        let Some(seat) = viewer_seat else { return idle };
        if has_pending_reveal_ack {
            return ActionerInfo { state: ActionerState::AwaitingRevealAck, show_wolves: false };
        }
        if state.status != Status::Ongoing {
            return idle;
        }
        let slot_role = state.players.get(&seat).and_then(|s| s.as_ref()).and_then(|s| s.role);
        let role = viewer_role.or(slot_role);

        // The Night Plan's step order is a deterministic function of the
        // dealt template (spec.md §3.3), so the client reconstructs it
        // locally instead of the wire carrying a redundant copy.
        let plan = NightPlan::derive(&state.template_roles);
        let Some(step) = plan.get(state.current_step_index) else { return idle };

        // I see wolves only during a wolf meeting whose schema lets the pack
        // see each other, and only if I myself participate in the vote.
        let show_wolves = matches!(&step.schema, ActionSchema::WolfVote { meeting, .. } if meeting.can_see_each_other)
            && role.is_some_and(|r| r.spec().participates_in_wolf_vote);

        // During a wolf meeting every participating wolf-aligned seat keeps
        // acting (revote allowed), not just the literal `Role::Wolf` holder
        // that the step's nominal role names; non-voting wolves (gargoyle,
        // wolf-robot) never become actioners here (spec.md §4.7).
        let im_actioner = match role {
            Some(r) if r == step.role => true,
            Some(_) if show_wolves => true,
            _ => false,
        };
        if !im_actioner {
            return ActionerInfo { state: ActionerState::Idle, show_wolves };
        }

        let already_voted = state.wolf_vote_status.get(&seat).copied().unwrap_or(false);
        let act_state = if already_voted { ActionerState::Submitted } else { ActionerState::AwaitingAction };
        ActionerInfo { state: act_state, show_wolves }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::protocol::{PublicNightResults, PublicPlayerSlot};

    fn base_state() -> PublicState {
        PublicState {
            room_code: "room".into(),
            host_uid: "host".into(),
            status: Status::Ongoing,
            template_roles: vec![Role::Seer, Role::Wolf, Role::Villager],
            players: HashMap::from([
                (0, Some(PublicPlayerSlot { uid: "a".into(), seat_number: 0, display_name: None, avatar_url: None, role: None, has_viewed_role: true })),
                (1, Some(PublicPlayerSlot { uid: "b".into(), seat_number: 1, display_name: None, avatar_url: None, role: None, has_viewed_role: true })),
                (2, Some(PublicPlayerSlot { uid: "c".into(), seat_number: 2, display_name: None, avatar_url: None, role: None, has_viewed_role: true })),
            ]),
            current_step_index: 0,
            is_audio_playing: false,
            wolf_vote_status: HashMap::new(),
            nightmare_blocked_seat: None,
            current_night_results: PublicNightResults::default(),
        }
    }

    #[test]
    fn own_seat_always_shows_its_role_even_when_not_public() {
        let state = base_state();
        let seats = ViewModelBuilder::build_seats(&state, Some(0), Some(Role::Seer), false, None);
        assert_eq!(seats[0].visible_role, Some(Role::Seer));
        assert_eq!(seats[1].visible_role, None); // not this viewer's seat, no public role
        assert!(seats[0].is_my_spot);
        assert!(!seats[1].is_my_spot);
    }

    #[test]
    fn wolf_ally_can_see_other_wolves() {
        let mut state = base_state();
        state.template_roles = vec![Role::Wolf, Role::Wolf, Role::Villager];
        let seats = ViewModelBuilder::build_seats(&state, Some(0), Some(Role::Wolf), true, None);
        // seat 1's role is not public (role: None) so it can't be derived
        // purely from PublicState in this test; show_wolves only widens
        // visibility for roles already known to the builder via the public
        // slot or the viewer's own seat.
        assert_eq!(seats[0].visible_role, Some(Role::Wolf));
        assert!(seats[0].is_wolf);
    }

    #[test]
    fn seat_view_model_exposes_selection_and_wolf_vote_target() {
        let mut state = base_state();
        state.current_night_results.wolf_votes_by_seat = Some(HashMap::from([(1, 2)]));
        state.players.insert(1, Some(PublicPlayerSlot { uid: "b".into(), seat_number: 1, display_name: None, avatar_url: None, role: Some(Role::Wolf), has_viewed_role: true }));
        let seats = ViewModelBuilder::build_seats(&state, Some(1), Some(Role::Wolf), true, Some(2));
        assert_eq!(seats[1].wolf_vote_target, Some(2));
        assert!(!seats[1].show_ready_badge); // mutually exclusive: the night is already ongoing
        assert!(seats[2].is_selected);
        assert!(!seats[1].is_selected);
    }

    #[test]
    fn ready_badge_and_wolf_vote_target_are_mutually_exclusive() {
        let mut state = base_state();
        state.status = Status::Assigned;
        state.current_night_results.wolf_votes_by_seat = Some(HashMap::from([(1, 2)]));
        let seats = ViewModelBuilder::build_seats(&state, None, None, true, None);
        assert!(seats[1].show_ready_badge);
        assert_eq!(seats[1].wolf_vote_target, None);
    }

    #[test]
    fn role_stats_counts_the_dealt_template() {
        let state = base_state();
        let stats = ViewModelBuilder::role_stats(&state);
        let villager = stats.iter().find(|s| s.role == Role::Villager).unwrap();
        assert_eq!(villager.count, 1);
        assert_eq!(stats.iter().map(|s| s.count).sum::<usize>(), 3);
    }

    #[test]
    fn wolf_vote_summary_reports_completion() {
        // base_state's template has exactly one wolf-vote-participating seat (the Wolf).
        let mut state = base_state();
        state.wolf_vote_status.insert(1, true);
        let summary = ViewModelBuilder::wolf_vote_summary(&state);
        assert_eq!(summary.voted, 1);
        assert_eq!(summary.participating, 1);
        assert!(summary.all_voted);
        assert_eq!(summary.text, "1/1 狼人已投票");
    }

    #[test]
    fn wolf_vote_summary_counts_every_participating_seat() {
        let mut state = base_state();
        state.template_roles = vec![Role::Wolf, Role::WolfQueen, Role::Villager];
        state.wolf_vote_status.insert(0, true);
        let summary = ViewModelBuilder::wolf_vote_summary(&state);
        assert_eq!(summary.participating, 2);
        assert_eq!(summary.voted, 1);
        assert!(!summary.all_voted);
        assert_eq!(summary.text, "1/2 狼人已投票");
    }

    #[test]
    fn actioner_state_tracks_the_current_step() {
        let mut state = base_state();
        state.players.insert(1, Some(PublicPlayerSlot { uid: "b".into(), seat_number: 1, display_name: None, avatar_url: None, role: Some(Role::Wolf), has_viewed_role: true }));
        state.template_roles = vec![Role::Wolf, Role::Seer, Role::Villager];
        state.current_step_index = 0;
        assert_eq!(ViewModelBuilder::actioner_state(&state, Some(1), Some(Role::Wolf), false).state, ActionerState::AwaitingAction);
        assert_eq!(ViewModelBuilder::actioner_state(&state, Some(0), None, false).state, ActionerState::Idle);
    }

    /// A wolf queen doesn't literally hold `Role::Wolf`, but still votes in
    /// the wolf meeting and must see the pack (spec.md §4.7).
    #[test]
    fn wolf_queen_participates_as_actioner_without_holding_the_nominal_role() {
        let mut state = base_state();
        state.template_roles = vec![Role::Wolf, Role::WolfQueen, Role::Villager];
        state.players.insert(1, Some(PublicPlayerSlot { uid: "b".into(), seat_number: 1, display_name: None, avatar_url: None, role: Some(Role::WolfQueen), has_viewed_role: true }));
        state.current_step_index = 0; // the wolf meeting step (nominal role Role::Wolf)

        let info = ViewModelBuilder::actioner_state(&state, Some(1), Some(Role::WolfQueen), false);
        assert_eq!(info.state, ActionerState::AwaitingAction);
        assert!(info.show_wolves);
    }

    /// Non-voting wolf-aligned roles never see the pack or act during the meeting.
    #[test]
    fn non_voting_wolf_role_is_never_shown_the_pack() {
        let mut state = base_state();
        state.template_roles = vec![Role::Wolf, Role::Gargoyle, Role::Villager];
        state.current_step_index = 0; // the wolf meeting step

        let info = ViewModelBuilder::actioner_state(&state, Some(1), Some(Role::Gargoyle), false);
        assert_eq!(info.state, ActionerState::Idle);
        assert!(!info.show_wolves);
    }

    #[test]
    fn pending_reveal_ack_takes_priority_over_step_state() {
        let state = base_state();
        assert_eq!(ViewModelBuilder::actioner_state(&state, Some(0), Some(Role::Seer), true).state, ActionerState::AwaitingRevealAck);
    }
}
