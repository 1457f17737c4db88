//! Greedy allocation of the available pool into new groups
//!
//! The allocation is greedy: each member takes the first
//! partner they have never met, and a single leftover member joins the last
//! pair only if they have met neither of its members. Members that cannot be
//! placed stay unmatched until the next round.

use std::collections::VecDeque;

use rand::seq::SliceRandom;
use shared::{MemberId, MemberSet};

use super::history::MeetingHistory;

/// Outcome of allocating one pool
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RoundPlan {
    pub groups: Vec<MemberSet>,
    pub unmatched: Vec<MemberId>,
}

impl RoundPlan {
    pub fn matched_count(&self) -> usize {
        self.groups.iter().map(MemberSet::len).sum()
    }
}

/// Traversal order of the pool for one round
pub trait PoolOrder: Send + Sync {
    fn arrange(&self, pool: &mut Vec<MemberId>);
}

/// Shuffles the pool so nobody is always first in line
#[derive(Debug, Clone, Copy, Default)]
pub struct ShuffledOrder;

impl PoolOrder for ShuffledOrder {
    fn arrange(&self, pool: &mut Vec<MemberId>) {
        pool.shuffle(&mut rand::thread_rng());
    }
}

/// Keeps the order the store returned
#[derive(Debug, Clone, Copy, Default)]
pub struct ListedOrder;

impl PoolOrder for ListedOrder {
    fn arrange(&self, _pool: &mut Vec<MemberId>) {}
}

/// Partition `pool` into groups of 2 (or one trailing group of 3) such that
/// no group contains two members who have met before.
pub fn plan_round(pool: Vec<MemberId>, history: &MeetingHistory) -> RoundPlan {
    let mut working: VecDeque<MemberId> = pool.into();
    let mut plan = RoundPlan::default();

    while working.len() >= 2 {
        let Some(first) = working.pop_front() else {
            break;
        };

        let Some(position) = working
            .iter()
            .position(|candidate| !history.has_met(first, *candidate))
        else {
            plan.unmatched.push(first);
            continue;
        };
        let Some(second) = working.remove(position) else {
            plan.unmatched.push(first);
            continue;
        };

        if working.len() == 1 {
            let leftover = working[0];
            if !history.has_met(first, leftover) && !history.has_met(second, leftover) {
                working.clear();
                push_group(&mut plan, vec![first, second, leftover]);
                break;
            }
        }

        push_group(&mut plan, vec![first, second]);
    }

    plan.unmatched.extend(working);
    plan
}

fn push_group(plan: &mut RoundPlan, ids: Vec<MemberId>) {
    // The pool never repeats a member, so construction cannot fail
    match MemberSet::new(ids.clone()) {
        Ok(group) => plan.groups.push(group),
        Err(_) => plan.unmatched.extend(ids),
    }
}
