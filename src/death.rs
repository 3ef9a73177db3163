//! Death Calculator (spec.md §4.6): a pure function from one night's recorded
//! actions and the seat/role table to the sorted list of seats that die.

use std::collections::HashSet;

/// One night's recorded role actions, already resolved to concrete seats
/// (e.g. the wolf vote has already gone through [`crate::wolf_vote::resolve`]).
#[derive(Debug, Clone, Default)]
pub struct NightActions {
    pub wolf_kill: Option<i32>,
    pub guard_protect: Option<i32>,
    pub witch_save: Option<i32>,
    pub witch_poison: Option<i32>,
    pub wolf_queen_charm: Option<i32>,
    pub dreamcatcher_dream: Option<i32>,
    pub magician_swap: Option<(i32, i32)>,
    pub nightmare_block: Option<i32>,
    pub nightmare_blocked_wolf: bool,
}

/// The seats holding roles whose identity matters to the ordering rules.
#[derive(Debug, Clone, Default)]
pub struct RoleSeatMap {
    pub witch: Option<i32>,
    pub wolf_queen: Option<i32>,
    pub dreamcatcher: Option<i32>,
    pub spirit_knight: Option<i32>,
    pub seer: Option<i32>,
    pub guard: Option<i32>,
}

/// Computes the sorted list of seats that die this night, following the
/// nine ordering rules of spec.md §4.6 exactly.
pub fn calculate(actions: &NightActions, roles: &RoleSeatMap) -> Vec<i32> {
    let mut deaths: HashSet<i32> = HashSet::new();

    // Rule 1: nightmare block nullifies the wolf kill entirely this night.
    let mut tentative = if actions.nightmare_blocked_wolf {
        None
    } else {
        actions.wolf_kill
    };

    // Rule 7 (protection half): the dreamcatcher's dream target is immune to the wolf kill.
    if tentative.is_some() && tentative == actions.dreamcatcher_dream {
        tentative = None;
    }

    // Rule 3: double-saved (guard and witch protect the same seat) always dies.
    let double_saved = match (actions.guard_protect, actions.witch_save) {
        (Some(g), Some(w)) if g == w => Some(g),
        _ => None,
    };

    if let Some(seat) = double_saved {
        deaths.insert(seat);
        if tentative == Some(seat) {
            tentative = None;
        }
    } else if tentative.is_some()
        && (tentative == actions.guard_protect || tentative == actions.witch_save)
    {
        // Rule 4: a lone guard protect or witch save cancels a matching wolf kill.
        tentative = None;
    }
    if let Some(t) = tentative {
        deaths.insert(t);
    }

    // Rule 5: witch poison always applies, except to the witch herself.
    if let Some(p) = actions.witch_poison {
        if Some(p) != roles.witch {
            deaths.insert(p);
        }
    }

    // Rule 6: if the wolf queen dies tonight, her charmed target dies with her.
    if let (Some(wq), Some(charm)) = (roles.wolf_queen, actions.wolf_queen_charm) {
        if deaths.contains(&wq) {
            deaths.insert(charm);
        }
    }

    // Rule 7 (link half): if the dreamcatcher dies tonight, her dream target dies with her,
    // overriding the poison immunity the target might otherwise have had.
    if let (Some(dc), Some(dream)) = (roles.dreamcatcher, actions.dreamcatcher_dream) {
        if deaths.contains(&dc) {
            deaths.insert(dream);
        }
    }

    // Rule 8: magician swap reshuffle. Only reassigns when exactly one of the
    // swapped seats is currently in the death set.
    if let Some((a, b)) = actions.magician_swap {
        let a_in = deaths.contains(&a);
        let b_in = deaths.contains(&b);
        if a_in && !b_in {
            deaths.remove(&a);
            deaths.insert(b);
        } else if b_in && !a_in {
            deaths.remove(&b);
            deaths.insert(a);
        }
    }

    // Rule 9: union, sorted ascending.
    let mut result: Vec<i32> = deaths.into_iter().collect();
    result.sort_unstable();
    result
}

#[cfg(test)]
mod tests {
    use super::*;

    /// E2E-2: wolf kill, guard protect, and witch save all land on seat 3
    /// -> seat 3 dies anyway (同守同救必死).
    #[test]
    fn double_save_dies_anyway() {
        let actions = NightActions {
            wolf_kill: Some(3),
            guard_protect: Some(3),
            witch_save: Some(3),
            ..Default::default()
        };
        assert_eq!(calculate(&actions, &RoleSeatMap::default()), vec![3]);
    }

    #[test]
    fn single_save_cancels_kill() {
        let actions = NightActions {
            wolf_kill: Some(3),
            witch_save: Some(3),
            ..Default::default()
        };
        assert!(calculate(&actions, &RoleSeatMap::default()).is_empty());
    }

    #[test]
    fn plain_wolf_kill_with_no_saves() {
        let actions = NightActions {
            wolf_kill: Some(5),
            ..Default::default()
        };
        assert_eq!(calculate(&actions, &RoleSeatMap::default()), vec![5]);
    }

    /// E2E-5: nightmare blocks the sole wolf -> no death this night.
    #[test]
    fn nightmare_block_nullifies_kill() {
        let actions = NightActions {
            wolf_kill: Some(2),
            nightmare_blocked_wolf: true,
            ..Default::default()
        };
        assert!(calculate(&actions, &RoleSeatMap::default()).is_empty());
    }

    #[test]
    fn poison_applies_alongside_wolf_kill() {
        let actions = NightActions {
            wolf_kill: Some(5),
            witch_poison: Some(7),
            ..Default::default()
        };
        assert_eq!(calculate(&actions, &RoleSeatMap::default()), vec![5, 7]);
    }

    #[test]
    fn poison_immune_against_the_witch_herself() {
        let actions = NightActions {
            witch_poison: Some(4),
            ..Default::default()
        };
        let roles = RoleSeatMap {
            witch: Some(4),
            ..Default::default()
        };
        assert!(calculate(&actions, &roles).is_empty());
    }

    #[test]
    fn wolf_queen_link_pulls_charmed_target_down_with_her() {
        let actions = NightActions {
            wolf_kill: Some(9), // wolf queen is seat 9 and dies tonight
            wolf_queen_charm: Some(2),
            ..Default::default()
        };
        let roles = RoleSeatMap {
            wolf_queen: Some(9),
            ..Default::default()
        };
        assert_eq!(calculate(&actions, &roles), vec![2, 9]);
    }

    #[test]
    fn wolf_queen_link_inert_if_she_survives() {
        let actions = NightActions {
            wolf_kill: Some(1),
            wolf_queen_charm: Some(2),
            ..Default::default()
        };
        let roles = RoleSeatMap {
            wolf_queen: Some(9),
            ..Default::default()
        };
        assert_eq!(calculate(&actions, &roles), vec![1]);
    }

    #[test]
    fn dreamcatcher_dream_target_protected_unless_she_dies() {
        let actions = NightActions {
            wolf_kill: Some(5),
            dreamcatcher_dream: Some(5),
            ..Default::default()
        };
        let roles = RoleSeatMap {
            dreamcatcher: Some(9),
            ..Default::default()
        };
        // dreamcatcher (9) survives, so dream target (5) is protected from the kill.
        assert!(calculate(&actions, &roles).is_empty());
    }

    #[test]
    fn dreamcatcher_death_pulls_dream_target_even_through_poison_immunity() {
        let actions = NightActions {
            wolf_kill: Some(9), // dreamcatcher herself is killed
            dreamcatcher_dream: Some(5),
            ..Default::default()
        };
        let roles = RoleSeatMap {
            dreamcatcher: Some(9),
            ..Default::default()
        };
        assert_eq!(calculate(&actions, &roles), vec![5, 9]);
    }

    /// E2E-6-adjacent: magician swap reshuffles a death when exactly one side landed in the set.
    #[test]
    fn magician_swap_reassigns_single_sided_death() {
        let actions = NightActions {
            wolf_kill: Some(2),
            magician_swap: Some((2, 3)),
            ..Default::default()
        };
        assert_eq!(calculate(&actions, &RoleSeatMap::default()), vec![3]);
    }

    #[test]
    fn magician_swap_inert_when_neither_side_dies() {
        let actions = NightActions {
            wolf_kill: Some(5),
            magician_swap: Some((2, 3)),
            ..Default::default()
        };
        assert_eq!(calculate(&actions, &RoleSeatMap::default()), vec![5]);
    }

    #[test]
    fn magician_swap_inert_when_both_sides_die() {
        let actions = NightActions {
            wolf_kill: Some(2),
            witch_poison: Some(3),
            magician_swap: Some((2, 3)),
            ..Default::default()
        };
        assert_eq!(calculate(&actions, &RoleSeatMap::default()), vec![2, 3]);
    }
}
