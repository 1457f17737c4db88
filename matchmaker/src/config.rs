//! Runtime configuration
//!
//! Values come from the process environment, optionally seeded from a `.env`
//! file in the working directory or one of its parents. Variables already set
//! in the environment win over the file.
//!
//! ## Required
//! - `SLACK_BOT_TOKEN`: bot token used for every Slack call
//!
//! ## Optional
//! - `SLACK_CHANNEL_ID`: channel whose members are synced and where round
//!   summaries are posted
//! - `SLACK_BOT_USER_ID`: the bot's own user id; looked up via `auth.test` when unset
//! - `SLACK_API_BASE`: API root (default `https://slack.com/api`)
//! - `MATCHMAKER_DATABASE`: SQLite file (default `./matchmaker.db`)
//! - `MATCHMAKER_REMINDER_DAYS`: age of a match before reminders go out (default 30)
//! - `MATCHMAKER_HTTP_RETRIES`: retries for failed Slack calls (default 2)

use std::path::PathBuf;

use shared::{ChannelId, PlatformUserId};

use crate::error::{MatchmakerError, MatchmakerResult};
use crate::services::DEFAULT_API_BASE;

pub const DEFAULT_DATABASE: &str = "./matchmaker.db";
pub const DEFAULT_REMINDER_DAYS: i64 = 30;
pub const DEFAULT_HTTP_RETRIES: u32 = 2;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MatchmakerConfig {
    pub bot_token: String,
    pub channel_id: Option<ChannelId>,
    pub bot_user_id: Option<PlatformUserId>,
    pub api_base: String,
    pub database: PathBuf,
    pub reminder_days: i64,
    pub http_retries: u32,
}

impl MatchmakerConfig {
    /// Load `.env` (if any) and read the process environment
    pub fn from_env() -> MatchmakerResult<Self> {
        let _ = dotenv::dotenv();
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build from an arbitrary key lookup; blank values count as unset
    pub fn from_lookup<F>(lookup: F) -> MatchmakerResult<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| lookup(key).map(|v| v.trim().to_string()).filter(|v| !v.is_empty());

        let bot_token = get("SLACK_BOT_TOKEN")
            .ok_or_else(|| MatchmakerError::config("SLACK_BOT_TOKEN", "must be set to the bot's OAuth token"))?;

        let reminder_days = match get("MATCHMAKER_REMINDER_DAYS") {
            Some(raw) => parse_number::<i64>("MATCHMAKER_REMINDER_DAYS", &raw)?,
            None => DEFAULT_REMINDER_DAYS,
        };
        if reminder_days < 0 {
            return Err(MatchmakerError::config("MATCHMAKER_REMINDER_DAYS", "must not be negative"));
        }

        let http_retries = match get("MATCHMAKER_HTTP_RETRIES") {
            Some(raw) => parse_number::<u32>("MATCHMAKER_HTTP_RETRIES", &raw)?,
            None => DEFAULT_HTTP_RETRIES,
        };

        Ok(Self {
            bot_token,
            channel_id: get("SLACK_CHANNEL_ID").map(|id| ChannelId::new(id)),
            bot_user_id: get("SLACK_BOT_USER_ID").map(|id| PlatformUserId::new(id)),
            api_base: get("SLACK_API_BASE").unwrap_or_else(|| DEFAULT_API_BASE.to_string()),
            database: get("MATCHMAKER_DATABASE")
                .map(PathBuf::from)
                .unwrap_or_else(|| PathBuf::from(DEFAULT_DATABASE)),
            reminder_days,
            http_retries,
        })
    }

    /// The announcement channel, or a configuration error naming the variable
    pub fn require_channel(&self) -> MatchmakerResult<&ChannelId> {
        self.channel_id
            .as_ref()
            .ok_or_else(|| MatchmakerError::config("SLACK_CHANNEL_ID", "is required for this command"))
    }
}

fn parse_number<T: std::str::FromStr>(field: &str, raw: &str) -> MatchmakerResult<T> {
    raw.parse::<T>()
        .map_err(|_| MatchmakerError::config(field, format!("expected a whole number, got '{raw}'")))
}
