//! Meeting history
//!
//! Symmetric record of which member pairs have already met. Every lookup goes
//! through a normalized `MemberPair`, so the direction of a query never
//! matters and recording the same meeting twice is a no-op.

use std::collections::HashSet;

use shared::{MemberId, MemberPair, MemberSet};

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MeetingHistory {
    pairs: HashSet<MemberPair>,
}

impl MeetingHistory {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_pairs(pairs: impl IntoIterator<Item = MemberPair>) -> Self {
        Self {
            pairs: pairs.into_iter().collect(),
        }
    }

    /// Record that `a` met `b`; returns true if this was not already known
    pub fn record(&mut self, a: MemberId, b: MemberId) -> bool {
        match MemberPair::new(a, b) {
            Some(pair) => self.pairs.insert(pair),
            None => false,
        }
    }

    /// Record every relationship inside a group
    pub fn record_group(&mut self, group: &MemberSet) {
        self.pairs.extend(group.pairs());
    }

    pub fn has_met(&self, a: MemberId, b: MemberId) -> bool {
        MemberPair::new(a, b).is_some_and(|pair| self.pairs.contains(&pair))
    }

    pub fn len(&self) -> usize {
        self.pairs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.pairs.is_empty()
    }

    pub fn pairs(&self) -> impl Iterator<Item = &MemberPair> {
        self.pairs.iter()
    }
}
