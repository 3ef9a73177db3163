//! Wolf Vote Resolver (spec.md §4.5): a pure function mapping each wolf
//! seat's vote to a final kill target, or "empty knife" if there is no
//! unique plurality winner.

use std::collections::HashMap;

/// `-1` is the sentinel for an abstaining ("empty knife") vote.
pub const ABSTAIN: i32 = -1;

/// Resolves a wolf meeting's votes to a single kill target.
///
/// Algorithm (spec.md §4.5): discard abstentions; if none remain, return
/// `None` (empty knife); tally the rest; if more than one target ties for
/// the highest count, return `None`; otherwise return the unique winner.
pub fn resolve(votes: &HashMap<i32, i32>) -> Option<i32> {
    let mut tally: HashMap<i32, u32> = HashMap::new();
    for &target in votes.values() {
        if target == ABSTAIN {
            continue;
        }
        *tally.entry(target).or_insert(0) += 1;
    }
    let max = *tally.values().max()?;
    let mut winners = tally.iter().filter(|&(_, &count)| count == max).map(|(&seat, _)| seat);
    let winner = winners.next()?;
    if winners.next().is_some() {
        None
    } else {
        Some(winner)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn votes(pairs: &[(i32, i32)]) -> HashMap<i32, i32> {
        pairs.iter().copied().collect()
    }

    #[test]
    fn no_votes_is_empty_knife() {
        assert_eq!(resolve(&HashMap::new()), None);
    }

    #[test]
    fn all_abstain_is_empty_knife() {
        assert_eq!(resolve(&votes(&[(0, ABSTAIN), (1, ABSTAIN)])), None);
    }

    /// E2E-3: 3 wolves vote {A:5, B:5, C:7} -> unique plurality winner 5.
    #[test]
    fn unique_plurality_winner() {
        assert_eq!(resolve(&votes(&[(10, 5), (11, 5), (12, 7)])), Some(5));
    }

    /// E2E-4: 2 wolves vote {A:5, B:7} -> tie -> empty knife.
    #[test]
    fn tie_is_empty_knife() {
        assert_eq!(resolve(&votes(&[(10, 5), (11, 7)])), None);
    }

    #[test]
    fn abstentions_do_not_affect_plurality() {
        assert_eq!(resolve(&votes(&[(10, 5), (11, ABSTAIN), (12, 5), (13, 3)])), Some(5));
    }

    #[test]
    fn revote_overwrite_is_just_a_new_map_entry() {
        let mut v = votes(&[(10, 5)]);
        v.insert(10, 6);
        assert_eq!(resolve(&v), Some(6));
    }
}
