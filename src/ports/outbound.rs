//! Outbound ports. Application calls into infrastructure.
//!
//! Implemented by adapters.

use crate::domain::{
    BotProfile, Challenge, ChallengeDraft, ChallengeMember, DomainError, EventKind, Member, Party,
    PrivateMessage, ScoreDirection, Task, TaskDraft, TaskType,
};
use chrono::{DateTime, NaiveDate, Utc};
use std::collections::BTreeMap;

/// Habitica REST API gateway. Every call is authenticated as the bot account.
#[async_trait::async_trait]
pub trait HabiticaGateway: Send + Sync {
    /// The bot's own user data.
    async fn get_user(&self) -> Result<BotProfile, DomainError>;

    /// The party the bot belongs to.
    async fn get_party(&self) -> Result<Party, DomainError>;

    /// Current members of the bot's party.
    async fn get_party_members(&self) -> Result<Vec<Member>, DomainError>;

    /// Quest scrolls owned by a member: quest key -> count.
    async fn get_member_quests(&self, user_id: &str) -> Result<BTreeMap<String, u32>, DomainError>;

    /// All messages in the bot's inbox, both received and sent.
    async fn get_inbox_messages(&self) -> Result<Vec<PrivateMessage>, DomainError>;

    async fn send_private_message(&self, to_user_id: &str, text: &str) -> Result<(), DomainError>;

    /// The bot's own tasks, optionally limited to one type.
    async fn get_tasks(&self, task_type: Option<TaskType>) -> Result<Vec<Task>, DomainError>;

    async fn score_task(&self, task_id: &str, direction: ScoreDirection) -> Result<(), DomainError>;

    /// Create a task for the bot itself.
    async fn create_user_task(&self, task: &TaskDraft) -> Result<Task, DomainError>;

    /// Accept the pending party quest invitation.
    async fn accept_quest(&self) -> Result<(), DomainError>;

    /// Challenges belonging to a group, newest first.
    async fn get_group_challenges(&self, group_id: &str) -> Result<Vec<Challenge>, DomainError>;

    async fn create_challenge(&self, draft: &ChallengeDraft) -> Result<Challenge, DomainError>;

    async fn create_challenge_task(
        &self,
        challenge_id: &str,
        task: &TaskDraft,
    ) -> Result<Task, DomainError>;

    async fn get_challenge_members(
        &self,
        challenge_id: &str,
    ) -> Result<Vec<ChallengeMember>, DomainError>;

    /// A participant's copies of the challenge tasks, with completion state.
    async fn get_member_challenge_tasks(
        &self,
        challenge_id: &str,
        member_id: &str,
    ) -> Result<Vec<Task>, DomainError>;

    /// End the challenge and give the prize to `winner_id`.
    async fn select_challenge_winner(
        &self,
        challenge_id: &str,
        winner_id: &str,
    ) -> Result<(), DomainError>;
}

/// Party member table. Refreshed from the API by the party sync.
#[async_trait::async_trait]
pub trait MemberRepo: Send + Sync {
    async fn list_members(&self) -> Result<Vec<Member>, DomainError>;

    /// Insert or replace the row for `member.id`.
    async fn upsert_member(&self, member: &Member) -> Result<(), DomainError>;

    async fn delete_member(&self, user_id: &str) -> Result<(), DomainError>;

    async fn find_by_login_name(&self, login_name: &str) -> Result<Option<Member>, DomainError>;

    async fn find_by_id(&self, user_id: &str) -> Result<Option<Member>, DomainError>;
}

/// Private message table with the reaction-pending flag.
#[async_trait::async_trait]
pub trait MessageRepo: Send + Sync {
    async fn contains_message(&self, message_id: &str) -> Result<bool, DomainError>;

    async fn insert_message(
        &self,
        message: &PrivateMessage,
        reaction_pending: bool,
    ) -> Result<(), DomainError>;

    /// True if a stored message to `to_id` is newer than `after`.
    async fn has_message_to_after(
        &self,
        to_id: &str,
        after: DateTime<Utc>,
    ) -> Result<bool, DomainError>;

    /// Messages still waiting for a reaction, oldest first.
    async fn pending_messages(&self) -> Result<Vec<PrivateMessage>, DomainError>;

    async fn set_reaction_pending(&self, message_id: &str, pending: bool)
    -> Result<(), DomainError>;
}

/// Record of once-per-date actions, keyed by (kind, subject, date).
#[async_trait::async_trait]
pub trait EventLog: Send + Sync {
    async fn is_handled(
        &self,
        kind: EventKind,
        subject_id: &str,
        date: NaiveDate,
    ) -> Result<bool, DomainError>;

    /// Record the action. Recording an already recorded event is a no-op.
    async fn mark_handled(
        &self,
        kind: EventKind,
        subject_id: &str,
        date: NaiveDate,
    ) -> Result<(), DomainError>;
}
