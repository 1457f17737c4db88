//! Human-readable content announcing a new match

use chrono::{DateTime, Duration, NaiveTime, Utc};
use shared::Member;
use url::Url;

use crate::error::MatchmakerResult;

const CALENDAR_BASE: &str = "https://calendar.google.com/calendar/render";
const EVENT_DESCRIPTION: &str = "Get to know a fellow member! ☕️";
const EVENT_MINUTES: i64 = 30;
const DAYS_AHEAD: i64 = 2;

/// Who is in the match, as the announcement presents them
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Announcement {
    pub names: Vec<String>,
    pub emails: Vec<String>,
}

impl Announcement {
    pub fn for_members(members: &[Member]) -> Self {
        let names = members.iter().map(Member::display_name).collect();
        let emails = members
            .iter()
            .filter_map(|member| member.email.clone())
            .filter(|email| !email.trim().is_empty())
            .collect();
        Self { names, emails }
    }

    pub fn title(&self) -> String {
        format!("Coffee chat with {}", self.names.join(", "))
    }

    /// Pre-filled calendar invite two days out at 10:00 UTC
    pub fn calendar_url(&self, now: DateTime<Utc>) -> MatchmakerResult<Url> {
        let day = (now + Duration::days(DAYS_AHEAD)).date_naive();
        let start = day.and_time(NaiveTime::from_hms_opt(10, 0, 0).unwrap_or_default()).and_utc();
        let end = start + Duration::minutes(EVENT_MINUTES);
        let dates = format!("{}/{}", start.format("%Y%m%dT%H%M%SZ"), end.format("%Y%m%dT%H%M%SZ"));

        let mut params = vec![
            ("action", "TEMPLATE".to_string()),
            ("text", self.title()),
            ("details", EVENT_DESCRIPTION.to_string()),
            ("dates", dates),
        ];
        if !self.emails.is_empty() {
            params.push(("add", self.emails.join(",")));
        }

        Ok(Url::parse_with_params(CALENDAR_BASE, &params)?)
    }
}
