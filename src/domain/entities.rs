//! Domain entities. Pure data structures for the core business.
//!
//! No HTTP/DB types here; adapters map into these.

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use crate::domain::calendar;

/// A member of the bot's party, as stored in the `members` table.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Member {
    pub id: String,
    pub display_name: String,
    pub login_name: String,
    /// Account creation date. Its yearly anniversary is the Habitica birthday.
    pub created: NaiveDate,
    pub last_login: Option<NaiveDate>,
}

impl Member {
    /// True if `date` is this member's Habitica birthday (account anniversary).
    pub fn has_birthday_on(&self, date: NaiveDate) -> bool {
        calendar::is_anniversary(self.created, date)
    }
}

/// The account the bot is running as.
#[derive(Debug, Clone)]
pub struct BotProfile {
    pub id: String,
    pub login_name: String,
    pub gems: u32,
}

#[derive(Debug, Clone)]
pub struct Party {
    pub id: String,
    pub name: String,
    pub description: String,
    pub quest: Option<PartyQuest>,
}

/// Quest state of a party. `members` maps user id to acceptance:
/// `Some(true)` accepted, `Some(false)` rejected, `None` not answered yet.
#[derive(Debug, Clone)]
pub struct PartyQuest {
    pub key: String,
    pub active: bool,
    pub members: BTreeMap<String, Option<bool>>,
}

impl PartyQuest {
    /// True if an invitation is out and `user_id` has not answered it.
    pub fn awaits_answer_from(&self, user_id: &str) -> bool {
        !self.active && matches!(self.members.get(user_id), Some(None))
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PrivateMessage {
    pub id: String,
    pub from_id: String,
    pub to_id: String,
    pub timestamp: DateTime<Utc>,
    pub content: String,
}

impl PrivateMessage {
    /// First line of the content, shortened for log output.
    pub fn excerpt(&self) -> String {
        const MAX: usize = 60;
        let first = self.content.lines().next().unwrap_or_default();
        if first.chars().count() <= MAX {
            first.to_string()
        } else {
            format!("{}...", first.chars().take(MAX).collect::<String>())
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TaskType {
    Habit,
    Daily,
    Todo,
    Reward,
}

impl TaskType {
    pub fn as_str(self) -> &'static str {
        match self {
            TaskType::Habit => "habit",
            TaskType::Daily => "daily",
            TaskType::Todo => "todo",
            TaskType::Reward => "reward",
        }
    }
}

impl fmt::Display for TaskType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for TaskType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "habit" => Ok(TaskType::Habit),
            "daily" => Ok(TaskType::Daily),
            "todo" => Ok(TaskType::Todo),
            "reward" => Ok(TaskType::Reward),
            other => Err(format!("Task type `{}` not supported", other)),
        }
    }
}

#[derive(Debug, Clone)]
pub struct Task {
    pub id: String,
    pub text: String,
    pub task_type: TaskType,
    pub notes: String,
    pub completed: bool,
}

/// A task that does not exist yet.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TaskDraft {
    pub text: String,
    #[serde(rename = "type")]
    pub task_type: TaskType,
    #[serde(default)]
    pub notes: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScoreDirection {
    Up,
    Down,
}

impl ScoreDirection {
    pub fn as_str(self) -> &'static str {
        match self {
            ScoreDirection::Up => "up",
            ScoreDirection::Down => "down",
        }
    }
}

#[derive(Debug, Clone)]
pub struct Challenge {
    pub id: String,
    pub name: String,
    pub short_name: String,
    pub group_id: String,
    pub created_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ChallengeDraft {
    pub group: String,
    pub name: String,
    pub short_name: String,
    pub summary: String,
    pub description: String,
    pub prize: u32,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChallengeMember {
    pub id: String,
    pub display_name: String,
    pub login_name: String,
}

impl fmt::Display for ChallengeMember {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "@{}", self.login_name)
    }
}

/// One weekly Sharing Weekend question.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Question {
    pub question: String,
    pub description: String,
    #[serde(default)]
    pub used: bool,
}

impl Question {
    pub fn to_task(&self) -> TaskDraft {
        TaskDraft {
            text: self.question.clone(),
            task_type: TaskType::Todo,
            notes: Some(self.description.clone()),
        }
    }
}

/// Kinds of once-per-date actions recorded in the event log.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EventKind {
    BirthdayReminder,
    ChallengeCreated,
    WinnerAwarded,
}

impl EventKind {
    pub fn as_str(self) -> &'static str {
        match self {
            EventKind::BirthdayReminder => "birthday-reminder",
            EventKind::ChallengeCreated => "challenge-created",
            EventKind::WinnerAwarded => "winner-awarded",
        }
    }
}
