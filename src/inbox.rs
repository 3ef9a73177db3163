//! Private Inbox (Player side), spec.md §4.4/§3.4: a revision-keyed,
//! recipient-filtered store of private reveal/rejection payloads.
//!
//! A Player's inbox filters strictly by `toUid == myUid`; everything else is
//! dropped before any use (spec.md §4.4, the anti-cheat invariant tested in
//! §8: "∀ private envelopes e: e.toUid == recipient.myUid holds at the
//! recipient or e is dropped before semantic use").

use std::collections::HashMap;

use crate::protocol::PrivatePayload;
use crate::roles::Role;

/// The discriminator payloads are keyed by, independent of their contents,
/// so the inbox can track "highest revision seen for this kind" even as
/// unrelated public updates bump the revision in between (spec.md §4.4).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PayloadKind {
    WitchContext,
    SeerReveal,
    RoleReveal(Role),
    ActionRejected,
}

impl PayloadKind {
    fn of(payload: &PrivatePayload) -> PayloadKind {
        match payload {
            PrivatePayload::WitchContext { .. } => PayloadKind::WitchContext,
            PrivatePayload::SeerReveal { .. } => PayloadKind::SeerReveal,
            PrivatePayload::RoleReveal { role, .. } => PayloadKind::RoleReveal(*role),
            PrivatePayload::ActionRejected { .. } => PayloadKind::ActionRejected,
        }
    }
}

/// Player-side inbox for one UID.
#[derive(Debug, Clone)]
pub struct Inbox {
    my_uid: String,
    entries: HashMap<(u64, PayloadKind), PrivatePayload>,
    highest_revision: HashMap<PayloadKind, u64>,
}

impl Inbox {
    pub fn new(my_uid: String) -> Self {
        Inbox {
            my_uid,
            entries: HashMap::new(),
            highest_revision: HashMap::new(),
        }
    }

    /// Applies a `PRIVATE_EFFECT` envelope. Returns `true` if it was kept
    /// (addressed to this UID), `false` if it was dropped.
    pub fn receive(&mut self, to_uid: &str, revision: u64, payload: PrivatePayload) -> bool {
        if to_uid != self.my_uid {
            return false;
        }
        let kind = PayloadKind::of(&payload);
        let highest = self.highest_revision.entry(kind).or_insert(0);
        if revision > *highest {
            *highest = revision;
        }
        self.entries.insert((revision, kind), payload);
        true
    }

    /// The freshest payload of a given kind, by the highest revision seen
    /// for that kind — immune to cross-turn contamination from unrelated
    /// revision bumps in between (spec.md §5 "ordering guarantees").
    pub fn latest(&self, kind: PayloadKind) -> Option<&PrivatePayload> {
        let revision = *self.highest_revision.get(&kind)?;
        self.entries.get(&(revision, kind))
    }

    /// Purged on game restart (spec.md §3.4).
    pub fn clear(&mut self) {
        self.entries.clear();
        self.highest_revision.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn drops_envelopes_addressed_to_someone_else() {
        let mut inbox = Inbox::new("me".to_string());
        let kept = inbox.receive(
            "someone-else",
            1,
            PrivatePayload::SeerReveal { target_seat: 0, result: "狼人".into() },
        );
        assert!(!kept);
        assert!(inbox.latest(PayloadKind::SeerReveal).is_none());
    }

    #[test]
    fn keeps_the_freshest_revision_per_kind() {
        let mut inbox = Inbox::new("me".to_string());
        inbox.receive("me", 3, PrivatePayload::SeerReveal { target_seat: 0, result: "好人".into() });
        inbox.receive("me", 1, PrivatePayload::SeerReveal { target_seat: 1, result: "狼人".into() });
        let latest = inbox.latest(PayloadKind::SeerReveal).unwrap();
        assert_eq!(
            latest,
            &PrivatePayload::SeerReveal { target_seat: 0, result: "好人".into() }
        );
    }

    #[test]
    fn immune_to_unrelated_revision_bumps_between_kinds() {
        let mut inbox = Inbox::new("me".to_string());
        inbox.receive("me", 5, PrivatePayload::SeerReveal { target_seat: 0, result: "好人".into() });
        // an unrelated witch-context envelope at a later revision shouldn't disturb the seer reveal
        inbox.receive("me", 9, PrivatePayload::WitchContext { killed_seat: Some(2), can_save: true, can_poison: true, phase: "step-5-Witch".into() });
        let latest = inbox.latest(PayloadKind::SeerReveal).unwrap();
        assert_eq!(
            latest,
            &PrivatePayload::SeerReveal { target_seat: 0, result: "好人".into() }
        );
    }

    #[test]
    fn clear_purges_everything() {
        let mut inbox = Inbox::new("me".to_string());
        inbox.receive("me", 1, PrivatePayload::ActionRejected { action: "submitAction".into(), reason: "x".into() });
        inbox.clear();
        assert!(inbox.latest(PayloadKind::ActionRejected).is_none());
    }
}
