//! Core shared types and identifiers

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

use crate::errors::{SharedError, SharedResult};

/// Stable internal identifier of a member (the unit of matching)
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct MemberId(pub i64);

impl fmt::Display for MemberId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Internal identifier of a match record
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct MatchId(pub i64);

impl fmt::Display for MatchId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Platform-native user identifier (e.g. a Slack user id)
#[derive(Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct PlatformUserId(String);

impl PlatformUserId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for PlatformUserId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Platform-native identifier of a communication channel / group
#[derive(Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct ChannelId(String);

impl ChannelId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn is_blank(&self) -> bool {
        self.0.trim().is_empty()
    }
}

impl fmt::Display for ChannelId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// A person eligible for introduction matching
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Member {
    pub id: MemberId,
    /// None for members that were never synced from the platform
    pub platform_id: Option<PlatformUserId>,
    pub name: String,
    pub email: Option<String>,
    pub handle: Option<String>,
    pub is_active: bool,
}

impl Member {
    /// Name used in human-readable announcements
    pub fn display_name(&self) -> String {
        if !self.name.trim().is_empty() {
            return self.name.clone();
        }
        match &self.platform_id {
            Some(platform_id) => format!("User {platform_id}"),
            None => format!("Member {}", self.id),
        }
    }
}

/// The platform's view of a user, as consumed by member sync
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct MemberProfile {
    pub platform_id: PlatformUserId,
    pub name: String,
    pub email: Option<String>,
    pub handle: Option<String>,
    pub is_bot: bool,
    pub deleted: bool,
}

impl MemberProfile {
    /// Only real people with a reachable e-mail take part in matching
    pub fn is_matchable(&self) -> bool {
        !self.is_bot && !self.deleted && self.email.as_deref().is_some_and(|e| !e.trim().is_empty())
    }
}

/// Normalized unordered pair of distinct members (`low < high`)
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct MemberPair {
    low: MemberId,
    high: MemberId,
}

impl MemberPair {
    /// Returns `None` for a self-pair
    pub fn new(a: MemberId, b: MemberId) -> Option<Self> {
        match a.cmp(&b) {
            std::cmp::Ordering::Less => Some(Self { low: a, high: b }),
            std::cmp::Ordering::Greater => Some(Self { low: b, high: a }),
            std::cmp::Ordering::Equal => None,
        }
    }

    pub fn low(&self) -> MemberId {
        self.low
    }

    pub fn high(&self) -> MemberId {
        self.high
    }
}

/// Fixed-arity set of 2 or 3 distinct members, kept sorted
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct MemberSet(Vec<MemberId>);

impl MemberSet {
    pub const MIN_SIZE: usize = 2;
    pub const MAX_SIZE: usize = 3;

    pub fn new(mut ids: Vec<MemberId>) -> SharedResult<Self> {
        if !(Self::MIN_SIZE..=Self::MAX_SIZE).contains(&ids.len()) {
            return Err(SharedError::InvalidGroupSize { size: ids.len() });
        }
        ids.sort();
        if let Some(window) = ids.windows(2).find(|w| w[0] == w[1]) {
            return Err(SharedError::DuplicateMember { member_id: window[0].0 });
        }
        Ok(Self(ids))
    }

    pub fn pair(a: MemberId, b: MemberId) -> SharedResult<Self> {
        Self::new(vec![a, b])
    }

    pub fn triple(a: MemberId, b: MemberId, c: MemberId) -> SharedResult<Self> {
        Self::new(vec![a, b, c])
    }

    pub fn members(&self) -> &[MemberId] {
        &self.0
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn contains(&self, id: MemberId) -> bool {
        self.0.binary_search(&id).is_ok()
    }

    /// Every relationship this group creates
    pub fn pairs(&self) -> Vec<MemberPair> {
        let mut pairs = Vec::with_capacity(3);
        for (i, a) in self.0.iter().enumerate() {
            for b in &self.0[i + 1..] {
                pairs.extend(MemberPair::new(*a, *b));
            }
        }
        pairs
    }
}

impl fmt::Display for MemberSet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let ids: Vec<String> = self.0.iter().map(|id| id.to_string()).collect();
        write!(f, "{{{}}}", ids.join(", "))
    }
}

/// A proposed group for one introduction round
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Match {
    pub id: MatchId,
    pub members: MemberSet,
    pub matched_at: DateTime<Utc>,
    pub met: bool,
    pub is_current: bool,
    pub channel_id: Option<ChannelId>,
    pub met_confirmed_at: Option<DateTime<Utc>>,
}

impl Match {
    /// Empty channel ids left by older workflows count as missing
    pub fn has_channel(&self) -> bool {
        self.channel_id.as_ref().is_some_and(|c| !c.is_blank())
    }
}

/// A group observed on the external platform during one reconciliation run
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExternalGroup {
    pub id: ChannelId,
    pub members: Vec<PlatformUserId>,
}

impl ExternalGroup {
    pub fn new(id: impl Into<String>, members: impl IntoIterator<Item = impl Into<String>>) -> Self {
        Self {
            id: ChannelId::new(id),
            members: members.into_iter().map(|member| PlatformUserId::new(member)).collect(),
        }
    }
}
