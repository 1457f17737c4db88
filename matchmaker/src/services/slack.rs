//! Slack Web API implementation of the group directory and notifier
//!
//! Every Slack method answers HTTP 200 with an `ok` flag, so the envelope is
//! checked before the payload is decoded. Transport failures, HTTP 429 and
//! 5xx responses are retried a bounded number of times; a `Retry-After`
//! header overrides the linear backoff.

use std::time::Duration;

use async_trait::async_trait;
use chrono::Utc;
use reqwest::StatusCode;
use reqwest::header::{HeaderMap, RETRY_AFTER};
use serde::Deserialize;
use serde::de::DeserializeOwned;
use serde_json::{Value, json};
use shared::{ChannelId, Job, MatchId, MemberProfile, PlatformUserId, job_debug, job_warn};

use crate::core::Announcement;
use crate::error::{MatchmakerError, MatchmakerResult};
use crate::traits::{GroupDirectory, GroupPage, Notifier};

pub const DEFAULT_API_BASE: &str = "https://slack.com/api";

/// Conversation types the bot may have been added to
const CONVERSATION_TYPES: &str = "public_channel,private_channel,mpim,im";
const PAGE_LIMIT: &str = "200";
const RETRY_BACKOFF: Duration = Duration::from_millis(500);
/// Upper bound on a server-requested wait
const MAX_RETRY_AFTER: Duration = Duration::from_secs(60);

#[derive(Deserialize, Default)]
struct ResponseMetadata {
    #[serde(default)]
    next_cursor: Option<String>,
}

#[derive(Deserialize)]
struct ConversationRef {
    id: String,
}

#[derive(Deserialize)]
struct ConversationsList {
    #[serde(default)]
    channels: Vec<ConversationRef>,
    #[serde(default)]
    response_metadata: ResponseMetadata,
}

#[derive(Deserialize)]
struct ConversationMembers {
    #[serde(default)]
    members: Vec<String>,
    #[serde(default)]
    response_metadata: ResponseMetadata,
}

#[derive(Deserialize)]
struct ConversationOpened {
    channel: ConversationRef,
}

#[derive(Deserialize)]
struct AuthIdentity {
    user_id: String,
}

#[derive(Deserialize, Default)]
struct UserProfileFields {
    #[serde(default)]
    email: Option<String>,
    #[serde(default)]
    display_name: Option<String>,
    #[serde(default)]
    real_name: Option<String>,
}

#[derive(Deserialize)]
struct SlackUser {
    id: String,
    #[serde(default)]
    name: String,
    #[serde(default)]
    real_name: Option<String>,
    #[serde(default)]
    is_bot: bool,
    #[serde(default)]
    deleted: bool,
    #[serde(default)]
    profile: UserProfileFields,
}

#[derive(Deserialize)]
struct UserInfo {
    user: SlackUser,
}

impl From<SlackUser> for MemberProfile {
    fn from(user: SlackUser) -> Self {
        let name = user
            .real_name
            .or(user.profile.real_name)
            .filter(|n| !n.trim().is_empty())
            .unwrap_or(user.name);
        MemberProfile {
            platform_id: PlatformUserId::new(user.id),
            name,
            email: user.profile.email,
            handle: user.profile.display_name.filter(|h| !h.trim().is_empty()),
            is_bot: user.is_bot,
            deleted: user.deleted,
        }
    }
}

/// Wait requested by a rate-limited response, in whole seconds
fn retry_after(headers: &HeaderMap) -> Option<Duration> {
    let seconds = headers.get(RETRY_AFTER)?.to_str().ok()?.trim().parse::<u64>().ok()?;
    Some(Duration::from_secs(seconds).min(MAX_RETRY_AFTER))
}

fn next_cursor(metadata: ResponseMetadata) -> Option<String> {
    metadata.next_cursor.filter(|cursor| !cursor.is_empty())
}

/// Slack Web API client
#[derive(Clone)]
pub struct SlackClient {
    base_url: String,
    token: String,
    retries: u32,
    client: reqwest::Client,
}

impl SlackClient {
    pub fn new(token: impl Into<String>) -> MatchmakerResult<Self> {
        Self::with_base_url(token, DEFAULT_API_BASE)
    }

    pub fn with_base_url(token: impl Into<String>, base_url: impl Into<String>) -> MatchmakerResult<Self> {
        let client = reqwest::Client::builder().timeout(Duration::from_secs(30)).build()?;
        Ok(Self {
            base_url: base_url.into().trim_end_matches('/').to_string(),
            token: token.into(),
            retries: 2,
            client,
        })
    }

    pub fn with_retries(mut self, retries: u32) -> Self {
        self.retries = retries;
        self
    }

    fn url(&self, method: &str) -> String {
        format!("{}/{}", self.base_url, method)
    }

    async fn get<T: DeserializeOwned>(&self, method: &str, query: &[(&str, &str)]) -> MatchmakerResult<T> {
        let url = self.url(method);
        let body = self
            .send_with_retry(method, || self.client.get(&url).bearer_auth(&self.token).query(query))
            .await?;
        Self::unwrap_envelope(method, body)
    }

    async fn post<T: DeserializeOwned>(&self, method: &str, payload: &Value) -> MatchmakerResult<T> {
        let url = self.url(method);
        let body = self
            .send_with_retry(method, || self.client.post(&url).bearer_auth(&self.token).json(payload))
            .await?;
        Self::unwrap_envelope(method, body)
    }

    async fn send_with_retry<F>(&self, method: &str, build: F) -> MatchmakerResult<Value>
    where
        F: Fn() -> reqwest::RequestBuilder,
    {
        let mut attempt = 0;
        loop {
            attempt += 1;
            let mut delay = RETRY_BACKOFF * attempt;
            let retryable = match build().send().await {
                Ok(response) => {
                    let status = response.status();
                    if status.is_success() {
                        return Ok(response.json::<Value>().await?);
                    }
                    if status != StatusCode::TOO_MANY_REQUESTS && !status.is_server_error() {
                        return Err(MatchmakerError::platform(method, format!("HTTP {status}")));
                    }
                    if let Some(wait) = retry_after(response.headers()) {
                        delay = wait;
                    }
                    MatchmakerError::platform(method, format!("HTTP {status}"))
                }
                Err(e) => MatchmakerError::from(e),
            };

            if attempt > self.retries {
                return Err(retryable);
            }
            job_warn!(
                Job::current(),
                "Slack {} attempt {} failed ({}), retrying in {:?}",
                method,
                attempt,
                retryable,
                delay
            );
            tokio::time::sleep(delay).await;
        }
    }

    fn unwrap_envelope<T: DeserializeOwned>(method: &str, body: Value) -> MatchmakerResult<T> {
        if !body.get("ok").and_then(Value::as_bool).unwrap_or(false) {
            let error = body
                .get("error")
                .and_then(Value::as_str)
                .unwrap_or("unknown_error")
                .to_string();
            return Err(MatchmakerError::platform(method, error));
        }
        Ok(serde_json::from_value(body)?)
    }

    async fn post_blocks(&self, channel: &ChannelId, text: &str, blocks: Value) -> MatchmakerResult<()> {
        let payload = json!({
            "channel": channel.as_str(),
            "text": text,
            "blocks": blocks,
        });
        let _: Value = self.post("chat.postMessage", &payload).await?;
        Ok(())
    }
}

#[async_trait]
impl GroupDirectory for SlackClient {
    async fn whoami(&self) -> MatchmakerResult<PlatformUserId> {
        let identity: AuthIdentity = self.get("auth.test", &[]).await?;
        Ok(PlatformUserId::new(identity.user_id))
    }

    async fn list_groups(&self, cursor: Option<String>) -> MatchmakerResult<GroupPage> {
        let mut query = vec![("types", CONVERSATION_TYPES), ("limit", PAGE_LIMIT)];
        if let Some(cursor) = cursor.as_deref() {
            query.push(("cursor", cursor));
        }
        let listing: ConversationsList = self.get("conversations.list", &query).await?;
        job_debug!(Job::current(), "Listed {} conversations", listing.channels.len());

        Ok(GroupPage {
            group_ids: listing.channels.into_iter().map(|c| ChannelId::new(c.id)).collect(),
            next_cursor: next_cursor(listing.response_metadata),
        })
    }

    async fn group_members(&self, channel: &ChannelId) -> MatchmakerResult<Vec<PlatformUserId>> {
        let mut members = Vec::new();
        let mut cursor: Option<String> = None;
        loop {
            let mut query = vec![("channel", channel.as_str()), ("limit", PAGE_LIMIT)];
            if let Some(cursor) = cursor.as_deref() {
                query.push(("cursor", cursor));
            }
            let page: ConversationMembers = self.get("conversations.members", &query).await?;
            members.extend(page.members.into_iter().map(|id| PlatformUserId::new(id)));

            cursor = next_cursor(page.response_metadata);
            if cursor.is_none() {
                return Ok(members);
            }
        }
    }

    async fn open_group(&self, members: &[PlatformUserId]) -> MatchmakerResult<ChannelId> {
        let users: Vec<&str> = members.iter().map(PlatformUserId::as_str).collect();
        let opened: ConversationOpened = self
            .post("conversations.open", &json!({ "users": users.join(",") }))
            .await?;
        Ok(ChannelId::new(opened.channel.id))
    }

    async fn user_profile(&self, user: &PlatformUserId) -> MatchmakerResult<MemberProfile> {
        let info: UserInfo = self.get("users.info", &[("user", user.as_str())]).await?;
        Ok(info.user.into())
    }
}

#[async_trait]
impl Notifier for SlackClient {
    async fn announce_match(&self, channel: &ChannelId, announcement: &Announcement) -> MatchmakerResult<()> {
        let calendar_url = announcement.calendar_url(Utc::now())?;
        let text = "A new coffee chat connection begins! ✨ Coordinate your meetup here and enjoy discovering what you have in common.";
        let blocks = json!([
            {
                "type": "section",
                "text": { "type": "mrkdwn", "text": format!("{text}\n\nThe coffee's optional, but the conversation's guaranteed!") }
            },
            {
                "type": "actions",
                "elements": [{
                    "type": "button",
                    "text": { "type": "plain_text", "text": "📅 Schedule a chat", "emoji": true },
                    "url": calendar_url.as_str(),
                    "action_id": "schedule_coffee_chat"
                }]
            }
        ]);
        self.post_blocks(channel, text, blocks).await
    }

    async fn send_reminder(&self, channel: &ChannelId, match_id: MatchId) -> MatchmakerResult<()> {
        let text = "Hey y'all! 👋 New matches are coming soon. Have you had a chance to meet yet? If so, please confirm below!";
        let blocks = json!([
            {
                "type": "section",
                "text": { "type": "mrkdwn", "text": text }
            },
            {
                "type": "actions",
                "elements": [{
                    "type": "button",
                    "text": { "type": "plain_text", "text": "Yes, we met! ☕", "emoji": true },
                    "style": "primary",
                    "value": match_id.to_string(),
                    "action_id": "confirm_meeting"
                }]
            }
        ]);
        self.post_blocks(channel, text, blocks).await
    }

    async fn post_round_summary(&self, channel: &ChannelId, created: usize) -> MatchmakerResult<()> {
        let text = format!("🎉 {created} new coffee chat matches have been created! Check your DMs for introductions.");
        let blocks = json!([
            {
                "type": "section",
                "text": { "type": "mrkdwn", "text": text }
            }
        ]);
        self.post_blocks(channel, &text, blocks).await
    }
}
