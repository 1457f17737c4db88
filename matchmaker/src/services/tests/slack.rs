//! Tests for SlackClient against a local mock server

use serde_json::json;
use shared::{ChannelId, MatchId, PlatformUserId};
use wiremock::matchers::{body_partial_json, header, method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

use crate::core::Announcement;
use crate::error::MatchmakerError;
use crate::services::slack::SlackClient;
use crate::traits::{GroupDirectory, Notifier};

fn client_for(server: &MockServer) -> SlackClient {
    SlackClient::with_base_url("xoxb-test", server.uri()).unwrap().with_retries(1)
}

#[tokio::test]
async fn test_whoami_sends_bearer_token() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/auth.test"))
        .and(header("authorization", "Bearer xoxb-test"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "ok": true, "user_id": "UBOT" })))
        .expect(1)
        .mount(&server)
        .await;

    let me = client_for(&server).whoami().await.unwrap();
    assert_eq!(me, PlatformUserId::new("UBOT"));
}

#[tokio::test]
async fn test_list_groups_returns_cursor() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/conversations.list"))
        .and(query_param("cursor", "page2"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "ok": true,
            "channels": [{ "id": "G3" }],
            "response_metadata": { "next_cursor": "" }
        })))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/conversations.list"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "ok": true,
            "channels": [{ "id": "G1" }, { "id": "G2" }],
            "response_metadata": { "next_cursor": "page2" }
        })))
        .mount(&server)
        .await;

    let client = client_for(&server);
    let first = client.list_groups(None).await.unwrap();
    assert_eq!(first.group_ids, vec![ChannelId::new("G1"), ChannelId::new("G2")]);
    assert_eq!(first.next_cursor.as_deref(), Some("page2"));

    let last = client.list_groups(first.next_cursor).await.unwrap();
    assert_eq!(last.group_ids, vec![ChannelId::new("G3")]);
    assert!(last.next_cursor.is_none(), "Empty cursor marks the last page");
}

#[tokio::test]
async fn test_group_members_follows_pagination() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/conversations.members"))
        .and(query_param("cursor", "next"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "ok": true,
            "members": ["U3"]
        })))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/conversations.members"))
        .and(query_param("channel", "G1"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "ok": true,
            "members": ["U1", "U2"],
            "response_metadata": { "next_cursor": "next" }
        })))
        .mount(&server)
        .await;

    let members = client_for(&server).group_members(&ChannelId::new("G1")).await.unwrap();
    assert_eq!(
        members,
        vec![PlatformUserId::new("U1"), PlatformUserId::new("U2"), PlatformUserId::new("U3")]
    );
}

#[tokio::test]
async fn test_not_ok_envelope_maps_to_platform_error() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/conversations.members"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "ok": false, "error": "channel_not_found" })))
        .mount(&server)
        .await;

    let result = client_for(&server).group_members(&ChannelId::new("GX")).await;
    match result {
        Err(MatchmakerError::Platform { method, error }) => {
            assert_eq!(method, "conversations.members");
            assert_eq!(error, "channel_not_found");
        }
        other => panic!("Expected platform error, got {other:?}"),
    }
}

#[tokio::test]
async fn test_server_errors_are_retried() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/conversations.open"))
        .respond_with(ResponseTemplate::new(503))
        .up_to_n_times(1)
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path("/conversations.open"))
        .and(body_partial_json(json!({ "users": "U1,U2" })))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "ok": true,
            "channel": { "id": "G42" }
        })))
        .expect(1)
        .mount(&server)
        .await;

    let channel = client_for(&server)
        .open_group(&[PlatformUserId::new("U1"), PlatformUserId::new("U2")])
        .await
        .unwrap();
    assert_eq!(channel, ChannelId::new("G42"));
}

#[tokio::test]
async fn test_rate_limit_waits_for_retry_after() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/auth.test"))
        .respond_with(ResponseTemplate::new(429).insert_header("Retry-After", "2"))
        .up_to_n_times(1)
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/auth.test"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "ok": true, "user_id": "UBOT" })))
        .expect(1)
        .mount(&server)
        .await;

    let started = std::time::Instant::now();
    let identity = client_for(&server).whoami().await.unwrap();

    assert_eq!(identity, PlatformUserId::new("UBOT"));
    assert!(
        started.elapsed() >= std::time::Duration::from_secs(2),
        "Retry-After must override the shorter linear backoff"
    );
}

#[tokio::test]
async fn test_client_errors_are_not_retried() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/auth.test"))
        .respond_with(ResponseTemplate::new(401))
        .expect(1)
        .mount(&server)
        .await;

    let result = client_for(&server).whoami().await;
    assert!(matches!(result, Err(MatchmakerError::Platform { .. })));
}

#[tokio::test]
async fn test_user_profile_mapping() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/users.info"))
        .and(query_param("user", "U7"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "ok": true,
            "user": {
                "id": "U7",
                "name": "grace",
                "real_name": "Grace Hopper",
                "is_bot": false,
                "deleted": false,
                "profile": { "email": "grace@example.org", "display_name": "" }
            }
        })))
        .mount(&server)
        .await;

    let profile = client_for(&server).user_profile(&PlatformUserId::new("U7")).await.unwrap();
    assert_eq!(profile.name, "Grace Hopper");
    assert_eq!(profile.email.as_deref(), Some("grace@example.org"));
    assert!(profile.handle.is_none(), "Blank display names are dropped");
    assert!(profile.is_matchable());
}

#[tokio::test]
async fn test_reminder_carries_match_id() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/chat.postMessage"))
        .and(body_partial_json(json!({ "channel": "G9" })))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "ok": true, "ts": "1.0" })))
        .expect(2)
        .mount(&server)
        .await;

    let client = client_for(&server);
    client.send_reminder(&ChannelId::new("G9"), MatchId(17)).await.unwrap();
    client
        .announce_match(
            &ChannelId::new("G9"),
            &Announcement {
                names: vec!["Ada".to_string(), "Grace".to_string()],
                emails: vec![],
            },
        )
        .await
        .unwrap();

    let requests = server.received_requests().await.unwrap();
    let reminder: serde_json::Value = serde_json::from_slice(&requests[0].body).unwrap();
    assert_eq!(reminder["blocks"][1]["elements"][0]["value"], "17");
    assert_eq!(reminder["blocks"][1]["elements"][0]["action_id"], "confirm_meeting");

    let announcement: serde_json::Value = serde_json::from_slice(&requests[1].body).unwrap();
    let url = announcement["blocks"][1]["elements"][0]["url"].as_str().unwrap();
    assert!(url.starts_with("https://calendar.google.com/calendar/render"));
}
