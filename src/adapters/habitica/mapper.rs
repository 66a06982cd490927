//! Habitica JSON shapes and their mapping into domain values.
//!
//! Only the fields the bot reads are declared; everything else is ignored.
//! Habitica sends both `_id` and `id` for most objects, so only `id` is read.

use crate::domain::{
    BotProfile, Challenge, ChallengeMember, DomainError, Member, Party, PartyQuest,
    PrivateMessage, Task, TaskType,
};
use chrono::{DateTime, Utc};
use serde::Deserialize;
use std::collections::BTreeMap;

/// Every Habitica response is wrapped in this envelope.
#[derive(Debug, Deserialize)]
pub struct Envelope<T> {
    #[serde(default)]
    pub success: bool,
    pub data: Option<T>,
    #[serde(default)]
    pub message: Option<String>,
}

/// Error body of a failed request.
#[derive(Debug, Deserialize)]
pub struct ErrorBody {
    #[serde(default)]
    pub error: Option<String>,
    #[serde(default)]
    pub message: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
pub struct ProfileDto {
    #[serde(default)]
    pub name: String,
}

#[derive(Debug, Default, Deserialize)]
pub struct LocalAuthDto {
    #[serde(default)]
    pub username: String,
}

#[derive(Debug, Default, Deserialize)]
pub struct TimestampsDto {
    pub created: Option<DateTime<Utc>>,
    pub loggedin: Option<DateTime<Utc>>,
}

#[derive(Debug, Default, Deserialize)]
pub struct AuthDto {
    #[serde(default)]
    pub local: LocalAuthDto,
    #[serde(default)]
    pub timestamps: TimestampsDto,
}

#[derive(Debug, Deserialize)]
pub struct UserDto {
    pub id: String,
    #[serde(default)]
    pub profile: ProfileDto,
    #[serde(default)]
    pub auth: AuthDto,
    /// Gem balance in dollars: one unit is four gems.
    #[serde(default)]
    pub balance: f64,
}

impl UserDto {
    pub fn into_profile(self) -> BotProfile {
        BotProfile {
            id: self.id,
            login_name: self.auth.local.username,
            gems: (self.balance * 4.0).round().max(0.0) as u32,
        }
    }

    /// Party member view. Members without a creation timestamp cannot be stored.
    pub fn into_member(self) -> Result<Member, DomainError> {
        let created = self
            .auth
            .timestamps
            .created
            .map(|t| t.date_naive())
            .ok_or_else(|| {
                DomainError::UnexpectedResponse(format!("member {} has no creation date", self.id))
            })?;
        Ok(Member {
            id: self.id,
            display_name: self.profile.name,
            login_name: self.auth.local.username,
            created,
            last_login: self.auth.timestamps.loggedin.map(|t| t.date_naive()),
        })
    }

    pub fn into_challenge_member(self) -> ChallengeMember {
        ChallengeMember {
            id: self.id,
            display_name: self.profile.name,
            login_name: self.auth.local.username,
        }
    }
}

#[derive(Debug, Default, Deserialize)]
pub struct QuestDto {
    pub key: Option<String>,
    #[serde(default)]
    pub active: bool,
    #[serde(default)]
    pub members: BTreeMap<String, Option<bool>>,
}

#[derive(Debug, Deserialize)]
pub struct PartyDto {
    pub id: String,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub quest: QuestDto,
}

impl From<PartyDto> for Party {
    fn from(p: PartyDto) -> Self {
        let quest = match p.quest.key {
            Some(key) if !key.is_empty() => Some(PartyQuest {
                key,
                active: p.quest.active,
                members: p.quest.members,
            }),
            _ => None,
        };
        Party {
            id: p.id,
            name: p.name,
            description: p.description,
            quest,
        }
    }
}

#[derive(Debug, Default, Deserialize)]
pub struct ItemsDto {
    #[serde(default)]
    pub quests: BTreeMap<String, i64>,
}

#[derive(Debug, Deserialize)]
pub struct MemberItemsDto {
    #[serde(default)]
    pub items: ItemsDto,
}

impl MemberItemsDto {
    /// Owned quest scrolls. Zero or negative counts are dropped.
    pub fn quest_counts(self) -> BTreeMap<String, u32> {
        self.items
            .quests
            .into_iter()
            .filter(|(_, count)| *count > 0)
            .map(|(key, count)| (key, count as u32))
            .collect()
    }
}

/// Inbox message. `ownerId` is always the bot; `uuid` is the other party.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InboxMessageDto {
    pub id: String,
    #[serde(default)]
    pub sent: bool,
    pub owner_id: String,
    pub uuid: String,
    #[serde(default)]
    pub text: String,
    pub timestamp: DateTime<Utc>,
}

impl From<InboxMessageDto> for PrivateMessage {
    fn from(m: InboxMessageDto) -> Self {
        let (from_id, to_id) = if m.sent {
            (m.owner_id, m.uuid)
        } else {
            (m.uuid, m.owner_id)
        };
        PrivateMessage {
            id: m.id,
            from_id,
            to_id,
            timestamp: m.timestamp,
            content: m.text,
        }
    }
}

#[derive(Debug, Deserialize)]
pub struct TaskDto {
    pub id: String,
    #[serde(default)]
    pub text: String,
    #[serde(rename = "type")]
    pub task_type: TaskType,
    #[serde(default)]
    pub notes: String,
    #[serde(default)]
    pub completed: bool,
}

impl From<TaskDto> for Task {
    fn from(t: TaskDto) -> Self {
        Task {
            id: t.id,
            text: t.text,
            task_type: t.task_type,
            notes: t.notes,
            completed: t.completed,
        }
    }
}

#[derive(Debug, Default, Deserialize)]
pub struct GroupRefDto {
    #[serde(default, rename = "_id")]
    pub id: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChallengeDto {
    pub id: String,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub short_name: String,
    #[serde(default)]
    pub group: GroupRefDto,
    pub created_at: Option<DateTime<Utc>>,
}

impl From<ChallengeDto> for Challenge {
    fn from(c: ChallengeDto) -> Self {
        Challenge {
            id: c.id,
            name: c.name,
            short_name: c.short_name,
            group_id: c.group.id,
            created_at: c.created_at,
        }
    }
}

/// A challenge participant together with their copies of the challenge tasks.
#[derive(Debug, Deserialize)]
pub struct ChallengeProgressDto {
    #[serde(default)]
    pub tasks: Vec<TaskDto>,
}
