//! Action Resolver (spec.md §4.2): per-schema input validation. Schema
//! constraints are the single source of truth for what's legal; the UI only
//! reads them to disable seats early, but this resolver is what the
//! Coordinator actually trusts (spec.md §4.2, "Contracts the resolver
//! guarantees to the UI layer").

use std::collections::HashMap;

use crate::error::ResolverError;
use crate::roles::{ActionSchema, Constraint, Role};
use crate::wolf_vote::ABSTAIN;

/// A validated or proposed action input. When [`resolve`] returns `Ok`, the
/// returned value is this same shape — the "effect" spec.md §4.2 refers to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ActionInput {
    ChooseSeat(Option<i32>),
    Swap(i32, i32),
    WolfVote(i32),
    Compound {
        save: Option<i32>,
        poison: Option<i32>,
    },
}

fn resolve_choose_seat(
    constraints: &[Constraint],
    allow_skip: bool,
    actor_seat: i32,
    target: Option<i32>,
    role_map: &HashMap<i32, Role>,
) -> Result<Option<i32>, ResolverError> {
    match target {
        None => {
            if allow_skip {
                Ok(None)
            } else {
                Err(ResolverError::SkipNotAllowed)
            }
        }
        Some(t) => {
            if constraints.contains(&Constraint::NotSelf) && t == actor_seat {
                return Err(ResolverError::SelfTarget);
            }
            if !role_map.contains_key(&t) {
                return Err(ResolverError::InvalidTarget);
            }
            Ok(Some(t))
        }
    }
}

/// Validates `input` against `schema` for the given actor, returning the
/// accepted effect or a human-readable rejection reason.
///
/// `role_map` is the seat→role map to validate against — the *post-swap* map
/// when a magician has already acted earlier in the night (spec.md §4.2).
pub fn resolve(
    schema: &ActionSchema,
    actor_seat: i32,
    actor_role: Role,
    role_map: &HashMap<i32, Role>,
    input: &ActionInput,
) -> Result<ActionInput, ResolverError> {
    match (schema, input) {
        (
            ActionSchema::ChooseSeat {
                constraints,
                allow_skip,
            },
            ActionInput::ChooseSeat(target),
        ) => {
            let resolved =
                resolve_choose_seat(constraints, *allow_skip, actor_seat, *target, role_map)?;
            Ok(ActionInput::ChooseSeat(resolved))
        }
        (ActionSchema::Swap { constraints }, ActionInput::Swap(a, b)) => {
            if a == b {
                return Err(ResolverError::SwapSameSeat);
            }
            if !role_map.contains_key(a) || !role_map.contains_key(b) {
                return Err(ResolverError::InvalidTarget);
            }
            if constraints.contains(&Constraint::NotSelf) && (*a == actor_seat || *b == actor_seat)
            {
                return Err(ResolverError::SelfTarget);
            }
            Ok(ActionInput::Swap(*a, *b))
        }
        (ActionSchema::WolfVote { meeting, constraints }, ActionInput::WolfVote(target)) => {
            if *target == ABSTAIN {
                return Ok(ActionInput::WolfVote(ABSTAIN));
            }
            if !role_map.contains_key(target) {
                return Err(ResolverError::InvalidTarget);
            }
            if constraints.contains(&Constraint::NotSelf) && *target == actor_seat {
                return Err(ResolverError::SelfTarget);
            }
            if actor_role == Role::SpiritKnight && *target == actor_seat {
                return Err(ResolverError::SpiritKnightSelfVote);
            }
            let target_role = role_map[target];
            if meeting.forbidden_target_roles.contains(&target_role) {
                return Err(ResolverError::ForbiddenVoteTarget(
                    target_role.spec().display_name.to_string(),
                ));
            }
            Ok(ActionInput::WolfVote(*target))
        }
        (ActionSchema::Compound { steps }, ActionInput::Compound { save, poison }) => {
            let (_, save_schema) = steps.iter().find(|(name, _)| *name == "save").expect("witch schema always has a save step");
            let (_, poison_schema) = steps.iter().find(|(name, _)| *name == "poison").expect("witch schema always has a poison step");

            let (save_constraints, save_skip) = match save_schema {
                ActionSchema::ChooseSeat { constraints, allow_skip } => (*constraints, *allow_skip),
                _ => unreachable!("witch save sub-step is always chooseSeat"),
            };
            let (poison_constraints, poison_skip) = match poison_schema {
                ActionSchema::ChooseSeat { constraints, allow_skip } => (*constraints, *allow_skip),
                _ => unreachable!("witch poison sub-step is always chooseSeat"),
            };

            let resolved_save =
                resolve_choose_seat(save_constraints, save_skip, actor_seat, *save, role_map)?;
            let resolved_poison =
                resolve_choose_seat(poison_constraints, poison_skip, actor_seat, *poison, role_map)?;

            Ok(ActionInput::Compound {
                save: resolved_save,
                poison: resolved_poison,
            })
        }
        _ => Err(ResolverError::InvalidTarget),
    }
}
