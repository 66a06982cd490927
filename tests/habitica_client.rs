//! HTTP contract tests for `HabiticaClient` against a mock Habitica server.

use habot::adapters::habitica::HabiticaClient;
use habot::domain::{DomainError, ScoreDirection, TaskDraft, TaskType};
use habot::ports::HabiticaGateway;
use habot::shared::config::Credentials;
use serde_json::json;
use std::time::Duration;
use wiremock::matchers::{body_json, header, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn client(server: &MockServer, max_retries: u32) -> HabiticaClient {
    HabiticaClient::new(
        server.uri(),
        Credentials {
            user_id: "bot-uuid".into(),
            api_token: "secret-token".into(),
            client_id: "bot-uuid-habot".into(),
        },
        max_retries,
        Duration::from_millis(10),
    )
}

fn ok(data: serde_json::Value) -> ResponseTemplate {
    ResponseTemplate::new(200).set_body_json(json!({"success": true, "data": data}))
}

// ── Authentication & envelope ─────────────────────────────────────

#[tokio::test]
async fn test_requests_carry_credential_headers() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/api/v3/user"))
        .and(header("x-api-user", "bot-uuid"))
        .and(header("x-api-key", "secret-token"))
        .and(header("x-client", "bot-uuid-habot"))
        .respond_with(ok(json!({
            "id": "bot-uuid",
            "auth": {"local": {"username": "partybot"}},
            "balance": 5
        })))
        .expect(1)
        .mount(&server)
        .await;

    let profile = client(&server, 0).get_user().await.unwrap();
    assert_eq!(profile.login_name, "partybot");
    assert_eq!(profile.gems, 20);
}

#[tokio::test]
async fn test_party_members_decode() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/api/v3/groups/party/members"))
        .respond_with(ok(json!([
            {
                "id": "u1",
                "profile": {"name": "Alice"},
                "auth": {
                    "local": {"username": "alice"},
                    "timestamps": {"created": "2020-02-29T12:00:00.000Z"}
                }
            },
            {
                "id": "u2",
                "profile": {"name": "Bob"},
                "auth": {
                    "local": {"username": "bob"},
                    "timestamps": {
                        "created": "2019-05-01T12:00:00.000Z",
                        "loggedin": "2021-05-01T12:00:00.000Z"
                    }
                }
            }
        ])))
        .mount(&server)
        .await;

    let members = client(&server, 0).get_party_members().await.unwrap();
    assert_eq!(members.len(), 2);
    assert_eq!(members[0].login_name, "alice");
    assert!(members[0].last_login.is_none());
    assert!(members[1].last_login.is_some());
}

#[tokio::test]
async fn test_missing_data_is_unexpected_response() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/api/v3/groups/party"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"success": true})))
        .mount(&server)
        .await;

    let err = client(&server, 0).get_party().await.unwrap_err();
    assert!(matches!(err, DomainError::UnexpectedResponse(_)), "{err:?}");
}

// ── Errors & rate limiting ────────────────────────────────────────

#[tokio::test]
async fn test_api_error_carries_status_and_message() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/api/v3/groups/party/quests/accept"))
        .respond_with(ResponseTemplate::new(404).set_body_json(json!({
            "success": false,
            "error": "NotFound",
            "message": "No quest invitation found."
        })))
        .mount(&server)
        .await;

    match client(&server, 0).accept_quest().await {
        Err(DomainError::Api { status, message }) => {
            assert_eq!(status, 404);
            assert_eq!(message, "No quest invitation found.");
        }
        other => panic!("expected Api error, got {other:?}"),
    }
}

#[tokio::test]
async fn test_rate_limit_is_retried_after_delay() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/api/v3/inbox/messages"))
        .respond_with(ResponseTemplate::new(429).insert_header("retry-after", "0"))
        .up_to_n_times(1)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/api/v3/inbox/messages"))
        .respond_with(ok(json!([{
            "id": "m1",
            "sent": false,
            "ownerId": "bot-uuid",
            "uuid": "u1",
            "text": "ping",
            "timestamp": "2021-06-01T08:00:00.000Z"
        }])))
        .mount(&server)
        .await;

    let inbox = client(&server, 2).get_inbox_messages().await.unwrap();
    assert_eq!(inbox.len(), 1);
    assert_eq!(inbox[0].from_id, "u1");
    assert_eq!(inbox[0].content, "ping");
}

#[tokio::test]
async fn test_rate_limit_gives_up_after_max_retries() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/api/v3/user"))
        .respond_with(ResponseTemplate::new(429))
        .expect(3)
        .mount(&server)
        .await;

    let err = client(&server, 2).get_user().await.unwrap_err();
    assert!(matches!(err, DomainError::RateLimited { attempts: 3 }), "{err:?}");
}

// ── Writes ────────────────────────────────────────────────────────

#[tokio::test]
async fn test_send_private_message_body() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/api/v3/members/send-private-message"))
        .and(body_json(json!({"message": "Pong", "toUserId": "u1"})))
        .respond_with(ok(json!({"message": {"id": "m2"}})))
        .expect(1)
        .mount(&server)
        .await;

    client(&server, 0)
        .send_private_message("u1", "Pong")
        .await
        .unwrap();
}

#[tokio::test]
async fn test_tasks_filtered_locally_and_scored() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/api/v3/tasks/user"))
        .respond_with(ok(json!([
            {"id": "h1", "text": "Send a PM", "type": "habit"},
            {"id": "t1", "text": "Write report", "type": "todo", "completed": false},
            {"id": "d1", "text": "Stretch", "type": "daily"}
        ])))
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path("/api/v3/tasks/h1/score/up"))
        .respond_with(ok(json!({"delta": 1.0})))
        .expect(1)
        .mount(&server)
        .await;

    let client = client(&server, 0);
    let habits = client.get_tasks(Some(TaskType::Habit)).await.unwrap();
    assert_eq!(habits.len(), 1);
    assert_eq!(habits[0].id, "h1");
    assert_eq!(client.get_tasks(None).await.unwrap().len(), 3);
    client.score_task("h1", ScoreDirection::Up).await.unwrap();
}

#[tokio::test]
async fn test_create_task_posts_draft() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/api/v3/tasks/user"))
        .and(body_json(json!({
            "text": "Water plants",
            "type": "daily",
            "notes": "Both windows"
        })))
        .respond_with(ok(json!({
            "id": "new-task",
            "text": "Water plants",
            "type": "daily",
            "notes": "Both windows"
        })))
        .mount(&server)
        .await;

    let task = client(&server, 0)
        .create_user_task(&TaskDraft {
            text: "Water plants".into(),
            task_type: TaskType::Daily,
            notes: Some("Both windows".into()),
        })
        .await
        .unwrap();
    assert_eq!(task.id, "new-task");
}

#[tokio::test]
async fn test_group_challenges_newest_first() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/api/v3/challenges/groups/party-1"))
        .respond_with(ok(json!([
            {
                "id": "old",
                "name": "Sharing Weekend 2021-05-29",
                "shortName": "SW 2021-05-29",
                "group": {"_id": "party-1"},
                "createdAt": "2021-05-25T08:00:00.000Z"
            },
            {
                "id": "new",
                "name": "Sharing Weekend 2021-06-05",
                "shortName": "SW 2021-06-05",
                "group": {"_id": "party-1"},
                "createdAt": "2021-06-01T08:00:00.000Z"
            }
        ])))
        .mount(&server)
        .await;

    let challenges = client(&server, 0)
        .get_group_challenges("party-1")
        .await
        .unwrap();
    assert_eq!(challenges[0].id, "new");
    assert_eq!(challenges[0].group_id, "party-1");
}
