//! Implements HabiticaGateway using reqwest.
//!
//! Handles rate limiting (HTTP 429) by sleeping for the advertised delay and
//! retrying a bounded number of times. Every request carries the bot's
//! credentials in the `x-api-user`, `x-api-key` and `x-client` headers.

use crate::adapters::habitica::mapper::{
    ChallengeDto, ChallengeProgressDto, Envelope, ErrorBody, InboxMessageDto, MemberItemsDto,
    PartyDto, TaskDto, UserDto,
};
use crate::domain::{
    BotProfile, Challenge, ChallengeDraft, ChallengeMember, DomainError, Member, Party,
    PrivateMessage, ScoreDirection, Task, TaskDraft, TaskType,
};
use crate::ports::HabiticaGateway;
use crate::shared::config::Credentials;
use async_trait::async_trait;
use reqwest::header::{HeaderMap, RETRY_AFTER};
use reqwest::{Client, Method, StatusCode};
use serde::de::{DeserializeOwned, IgnoredAny};
use serde_json::{Value, json};
use std::collections::BTreeMap;
use std::time::Duration;
use tracing::{debug, warn};

const API_PREFIX: &str = "/api/v3";

/// Habitica gateway adapter.
pub struct HabiticaClient {
    client: Client,
    base_url: String,
    credentials: Credentials,
    /// Extra attempts after a 429 response.
    max_retries: u32,
    /// Sleep used when a 429 response has no usable Retry-After header.
    default_retry_after: Duration,
}

impl HabiticaClient {
    /// Create a client for `base_url` (e.g. "https://habitica.com").
    pub fn new(
        base_url: impl Into<String>,
        credentials: Credentials,
        max_retries: u32,
        default_retry_after: Duration,
    ) -> Self {
        Self {
            client: Client::new(),
            base_url: base_url.into().trim_end_matches('/').to_string(),
            credentials,
            max_retries,
            default_retry_after,
        }
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}{}", self.base_url, API_PREFIX, path)
    }

    /// Send one request and decode `data` from the response envelope.
    async fn request<T: DeserializeOwned>(
        &self,
        method: Method,
        path: &str,
        body: Option<&Value>,
    ) -> Result<T, DomainError> {
        let url = self.url(path);
        let attempts = self.max_retries + 1;

        for attempt in 1..=attempts {
            let mut req = self
                .client
                .request(method.clone(), &url)
                .header("x-api-user", &self.credentials.user_id)
                .header("x-api-key", &self.credentials.api_token)
                .header("x-client", &self.credentials.client_id);
            if let Some(b) = body {
                req = req.json(b);
            }

            let response = req
                .send()
                .await
                .map_err(|e| DomainError::Http(format!("{} {}: {}", method, path, e)))?;
            let status = response.status();

            if status == StatusCode::TOO_MANY_REQUESTS {
                let wait = retry_after(response.headers()).unwrap_or(self.default_retry_after);
                if attempt < attempts {
                    warn!(attempt, wait_secs = wait.as_secs(), path, "rate limited, sleeping");
                    tokio::time::sleep(wait).await;
                }
                continue;
            }

            if !status.is_success() {
                let text = response.text().await.unwrap_or_default();
                let message = serde_json::from_str::<ErrorBody>(&text)
                    .ok()
                    .and_then(|b| b.message.or(b.error))
                    .unwrap_or_else(|| text.chars().take(200).collect());
                warn!(status = %status, path, %message, "Habitica API returned error");
                return Err(DomainError::Api {
                    status: status.as_u16(),
                    message,
                });
            }

            debug!(%method, path, status = %status, "Habitica request ok");
            let envelope: Envelope<T> = response.json().await.map_err(|e| {
                DomainError::UnexpectedResponse(format!("{} {}: {}", method, path, e))
            })?;
            return envelope.data.ok_or_else(|| {
                DomainError::UnexpectedResponse(format!(
                    "{} {}: no data in response ({})",
                    method,
                    path,
                    envelope.message.unwrap_or_default()
                ))
            });
        }

        Err(DomainError::RateLimited { attempts })
    }

    async fn get<T: DeserializeOwned>(&self, path: &str) -> Result<T, DomainError> {
        self.request(Method::GET, path, None).await
    }

    async fn post<T: DeserializeOwned>(
        &self,
        path: &str,
        body: Option<&Value>,
    ) -> Result<T, DomainError> {
        self.request(Method::POST, path, body).await
    }
}

/// Seconds from a Retry-After header. HTTP-date values are not supported.
fn retry_after(headers: &HeaderMap) -> Option<Duration> {
    headers
        .get(RETRY_AFTER)?
        .to_str()
        .ok()?
        .trim()
        .parse::<u64>()
        .ok()
        .map(Duration::from_secs)
}

fn task_body(task: &TaskDraft) -> Value {
    let mut body = json!({
        "text": task.text,
        "type": task.task_type.as_str(),
    });
    if let Some(notes) = &task.notes {
        body["notes"] = Value::String(notes.clone());
    }
    body
}

#[async_trait]
impl HabiticaGateway for HabiticaClient {
    async fn get_user(&self) -> Result<BotProfile, DomainError> {
        let user: UserDto = self.get("/user").await?;
        Ok(user.into_profile())
    }

    async fn get_party(&self) -> Result<Party, DomainError> {
        let party: PartyDto = self.get("/groups/party").await?;
        Ok(party.into())
    }

    async fn get_party_members(&self) -> Result<Vec<Member>, DomainError> {
        let users: Vec<UserDto> = self
            .get("/groups/party/members?includeAllPublicFields=true")
            .await?;
        users.into_iter().map(UserDto::into_member).collect()
    }

    async fn get_member_quests(&self, user_id: &str) -> Result<BTreeMap<String, u32>, DomainError> {
        let member: MemberItemsDto = self.get(&format!("/members/{}", user_id)).await?;
        Ok(member.quest_counts())
    }

    async fn get_inbox_messages(&self) -> Result<Vec<PrivateMessage>, DomainError> {
        let messages: Vec<InboxMessageDto> = self.get("/inbox/messages").await?;
        Ok(messages.into_iter().map(PrivateMessage::from).collect())
    }

    async fn send_private_message(&self, to_user_id: &str, text: &str) -> Result<(), DomainError> {
        let body = json!({ "message": text, "toUserId": to_user_id });
        let _: IgnoredAny = self
            .post("/members/send-private-message", Some(&body))
            .await?;
        Ok(())
    }

    async fn get_tasks(&self, task_type: Option<TaskType>) -> Result<Vec<Task>, DomainError> {
        // The API filter uses plural names ("habits", "todos") with different
        // semantics for todos, so filter locally instead.
        let tasks: Vec<TaskDto> = self.get("/tasks/user").await?;
        Ok(tasks
            .into_iter()
            .map(Task::from)
            .filter(|t| task_type.is_none_or(|wanted| t.task_type == wanted))
            .collect())
    }

    async fn score_task(&self, task_id: &str, direction: ScoreDirection) -> Result<(), DomainError> {
        let path = format!("/tasks/{}/score/{}", task_id, direction.as_str());
        let _: IgnoredAny = self.post(&path, None).await?;
        Ok(())
    }

    async fn create_user_task(&self, task: &TaskDraft) -> Result<Task, DomainError> {
        let created: TaskDto = self.post("/tasks/user", Some(&task_body(task))).await?;
        Ok(created.into())
    }

    async fn accept_quest(&self) -> Result<(), DomainError> {
        let _: IgnoredAny = self.post("/groups/party/quests/accept", None).await?;
        Ok(())
    }

    async fn get_group_challenges(&self, group_id: &str) -> Result<Vec<Challenge>, DomainError> {
        let challenges: Vec<ChallengeDto> =
            self.get(&format!("/challenges/groups/{}", group_id)).await?;
        let mut challenges: Vec<Challenge> = challenges.into_iter().map(Challenge::from).collect();
        challenges.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(challenges)
    }

    async fn create_challenge(&self, draft: &ChallengeDraft) -> Result<Challenge, DomainError> {
        let body = serde_json::to_value(draft)
            .map_err(|e| DomainError::UnexpectedResponse(e.to_string()))?;
        let created: ChallengeDto = self.post("/challenges", Some(&body)).await?;
        Ok(created.into())
    }

    async fn create_challenge_task(
        &self,
        challenge_id: &str,
        task: &TaskDraft,
    ) -> Result<Task, DomainError> {
        let path = format!("/tasks/challenge/{}", challenge_id);
        let created: TaskDto = self.post(&path, Some(&task_body(task))).await?;
        Ok(created.into())
    }

    async fn get_challenge_members(
        &self,
        challenge_id: &str,
    ) -> Result<Vec<ChallengeMember>, DomainError> {
        let users: Vec<UserDto> = self
            .get(&format!("/challenges/{}/members", challenge_id))
            .await?;
        Ok(users
            .into_iter()
            .map(UserDto::into_challenge_member)
            .collect())
    }

    async fn get_member_challenge_tasks(
        &self,
        challenge_id: &str,
        member_id: &str,
    ) -> Result<Vec<Task>, DomainError> {
        let progress: ChallengeProgressDto = self
            .get(&format!("/challenges/{}/members/{}", challenge_id, member_id))
            .await?;
        Ok(progress.tasks.into_iter().map(Task::from).collect())
    }

    async fn select_challenge_winner(
        &self,
        challenge_id: &str,
        winner_id: &str,
    ) -> Result<(), DomainError> {
        let path = format!("/challenges/{}/selectWinner/{}", challenge_id, winner_id);
        let _: IgnoredAny = self.post(&path, None).await?;
        Ok(())
    }
}
