//! In-memory port implementations for use case tests.

use crate::domain::{
    BotProfile, Challenge, ChallengeDraft, ChallengeMember, DomainError, EventKind, Member, Party,
    PrivateMessage, Question, ScoreDirection, Task, TaskDraft, TaskType,
};
use crate::ports::{EventLog, HabiticaGateway, MemberRepo, MessageRepo, QuestionStore};
use chrono::{DateTime, NaiveDate, Utc};
use std::collections::{BTreeMap, BTreeSet};
use std::sync::Mutex;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};

/// Records every write; reads come from the public fields.
pub struct FakeHabitica {
    pub profile: Mutex<BotProfile>,
    pub party: Mutex<Party>,
    pub members: Mutex<Vec<Member>>,
    pub quests: Mutex<BTreeMap<String, BTreeMap<String, u32>>>,
    pub inbox: Mutex<Vec<PrivateMessage>>,
    pub sent: Mutex<Vec<(String, String)>>,
    pub tasks: Mutex<Vec<Task>>,
    pub scored: Mutex<Vec<(String, ScoreDirection)>>,
    pub created_tasks: Mutex<Vec<TaskDraft>>,
    pub quest_accepted: AtomicBool,
    pub challenges: Mutex<Vec<Challenge>>,
    pub created_challenges: Mutex<Vec<ChallengeDraft>>,
    pub challenge_tasks: Mutex<Vec<(String, TaskDraft)>>,
    pub challenge_members: Mutex<Vec<ChallengeMember>>,
    pub progress: Mutex<BTreeMap<String, Vec<Task>>>,
    pub winners: Mutex<Vec<(String, String)>>,
    /// When set, every call fails with an HTTP error.
    pub offline: AtomicBool,
    /// When set, adding tasks to a challenge fails with an API error.
    pub fail_challenge_tasks: AtomicBool,
    pub calls: AtomicUsize,
}

impl FakeHabitica {
    pub fn new(bot_id: &str) -> Self {
        Self {
            profile: Mutex::new(BotProfile {
                id: bot_id.into(),
                login_name: "partybot".into(),
                gems: 0,
            }),
            party: Mutex::new(Party {
                id: "party-1".into(),
                name: "The Party".into(),
                description: String::new(),
                quest: None,
            }),
            members: Mutex::new(Vec::new()),
            quests: Mutex::new(BTreeMap::new()),
            inbox: Mutex::new(Vec::new()),
            sent: Mutex::new(Vec::new()),
            tasks: Mutex::new(Vec::new()),
            scored: Mutex::new(Vec::new()),
            created_tasks: Mutex::new(Vec::new()),
            quest_accepted: AtomicBool::new(false),
            challenges: Mutex::new(Vec::new()),
            created_challenges: Mutex::new(Vec::new()),
            challenge_tasks: Mutex::new(Vec::new()),
            challenge_members: Mutex::new(Vec::new()),
            progress: Mutex::new(BTreeMap::new()),
            winners: Mutex::new(Vec::new()),
            offline: AtomicBool::new(false),
            fail_challenge_tasks: AtomicBool::new(false),
            calls: AtomicUsize::new(0),
        }
    }

    pub fn sent_to(&self, user_id: &str) -> Vec<String> {
        self.sent
            .lock()
            .unwrap()
            .iter()
            .filter(|(to, _)| to == user_id)
            .map(|(_, text)| text.clone())
            .collect()
    }

    fn call(&self) -> Result<(), DomainError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if self.offline.load(Ordering::SeqCst) {
            return Err(DomainError::Http("connection refused".into()));
        }
        Ok(())
    }
}

#[async_trait::async_trait]
impl HabiticaGateway for FakeHabitica {
    async fn get_user(&self) -> Result<BotProfile, DomainError> {
        self.call()?;
        Ok(self.profile.lock().unwrap().clone())
    }

    async fn get_party(&self) -> Result<Party, DomainError> {
        self.call()?;
        Ok(self.party.lock().unwrap().clone())
    }

    async fn get_party_members(&self) -> Result<Vec<Member>, DomainError> {
        self.call()?;
        Ok(self.members.lock().unwrap().clone())
    }

    async fn get_member_quests(&self, user_id: &str) -> Result<BTreeMap<String, u32>, DomainError> {
        self.call()?;
        Ok(self
            .quests
            .lock()
            .unwrap()
            .get(user_id)
            .cloned()
            .unwrap_or_default())
    }

    async fn get_inbox_messages(&self) -> Result<Vec<PrivateMessage>, DomainError> {
        self.call()?;
        Ok(self.inbox.lock().unwrap().clone())
    }

    async fn send_private_message(&self, to_user_id: &str, text: &str) -> Result<(), DomainError> {
        self.call()?;
        self.sent
            .lock()
            .unwrap()
            .push((to_user_id.to_string(), text.to_string()));
        Ok(())
    }

    async fn get_tasks(&self, task_type: Option<TaskType>) -> Result<Vec<Task>, DomainError> {
        self.call()?;
        Ok(self
            .tasks
            .lock()
            .unwrap()
            .iter()
            .filter(|t| task_type.is_none_or(|wanted| t.task_type == wanted))
            .cloned()
            .collect())
    }

    async fn score_task(&self, task_id: &str, direction: ScoreDirection) -> Result<(), DomainError> {
        self.call()?;
        self.scored
            .lock()
            .unwrap()
            .push((task_id.to_string(), direction));
        Ok(())
    }

    async fn create_user_task(&self, task: &TaskDraft) -> Result<Task, DomainError> {
        self.call()?;
        self.created_tasks.lock().unwrap().push(task.clone());
        Ok(Task {
            id: format!("task-{}", self.created_tasks.lock().unwrap().len()),
            text: task.text.clone(),
            task_type: task.task_type,
            notes: task.notes.clone().unwrap_or_default(),
            completed: false,
        })
    }

    async fn accept_quest(&self) -> Result<(), DomainError> {
        self.call()?;
        self.quest_accepted.store(true, Ordering::SeqCst);
        Ok(())
    }

    async fn get_group_challenges(&self, group_id: &str) -> Result<Vec<Challenge>, DomainError> {
        self.call()?;
        let mut challenges: Vec<Challenge> = self
            .challenges
            .lock()
            .unwrap()
            .iter()
            .filter(|c| c.group_id == group_id)
            .cloned()
            .collect();
        challenges.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(challenges)
    }

    async fn create_challenge(&self, draft: &ChallengeDraft) -> Result<Challenge, DomainError> {
        self.call()?;
        self.created_challenges.lock().unwrap().push(draft.clone());
        let challenge = Challenge {
            id: format!("challenge-{}", self.created_challenges.lock().unwrap().len()),
            name: draft.name.clone(),
            short_name: draft.short_name.clone(),
            group_id: draft.group.clone(),
            created_at: Some(Utc::now()),
        };
        self.challenges.lock().unwrap().push(challenge.clone());
        Ok(challenge)
    }

    async fn create_challenge_task(
        &self,
        challenge_id: &str,
        task: &TaskDraft,
    ) -> Result<Task, DomainError> {
        self.call()?;
        if self.fail_challenge_tasks.load(Ordering::SeqCst) {
            return Err(DomainError::Api {
                status: 500,
                message: "task creation failed".into(),
            });
        }
        self.challenge_tasks
            .lock()
            .unwrap()
            .push((challenge_id.to_string(), task.clone()));
        Ok(Task {
            id: format!("ctask-{}", self.challenge_tasks.lock().unwrap().len()),
            text: task.text.clone(),
            task_type: task.task_type,
            notes: task.notes.clone().unwrap_or_default(),
            completed: false,
        })
    }

    async fn get_challenge_members(
        &self,
        _challenge_id: &str,
    ) -> Result<Vec<ChallengeMember>, DomainError> {
        self.call()?;
        Ok(self.challenge_members.lock().unwrap().clone())
    }

    async fn get_member_challenge_tasks(
        &self,
        _challenge_id: &str,
        member_id: &str,
    ) -> Result<Vec<Task>, DomainError> {
        self.call()?;
        Ok(self
            .progress
            .lock()
            .unwrap()
            .get(member_id)
            .cloned()
            .unwrap_or_default())
    }

    async fn select_challenge_winner(
        &self,
        challenge_id: &str,
        winner_id: &str,
    ) -> Result<(), DomainError> {
        self.call()?;
        self.winners
            .lock()
            .unwrap()
            .push((challenge_id.to_string(), winner_id.to_string()));
        Ok(())
    }
}

/// Member, message and event tables in memory.
#[derive(Default)]
pub struct MemoryRepo {
    pub members: Mutex<Vec<Member>>,
    pub messages: Mutex<Vec<(PrivateMessage, bool)>>,
    pub events: Mutex<BTreeSet<(&'static str, String, NaiveDate)>>,
}

#[async_trait::async_trait]
impl MemberRepo for MemoryRepo {
    async fn list_members(&self) -> Result<Vec<Member>, DomainError> {
        Ok(self.members.lock().unwrap().clone())
    }

    async fn upsert_member(&self, member: &Member) -> Result<(), DomainError> {
        let mut members = self.members.lock().unwrap();
        members.retain(|m| m.id != member.id);
        members.push(member.clone());
        Ok(())
    }

    async fn delete_member(&self, user_id: &str) -> Result<(), DomainError> {
        self.members.lock().unwrap().retain(|m| m.id != user_id);
        Ok(())
    }

    async fn find_by_login_name(&self, login_name: &str) -> Result<Option<Member>, DomainError> {
        let login_name = login_name.trim().trim_start_matches('@');
        Ok(self
            .members
            .lock()
            .unwrap()
            .iter()
            .find(|m| m.login_name.eq_ignore_ascii_case(login_name))
            .cloned())
    }

    async fn find_by_id(&self, user_id: &str) -> Result<Option<Member>, DomainError> {
        Ok(self
            .members
            .lock()
            .unwrap()
            .iter()
            .find(|m| m.id == user_id)
            .cloned())
    }
}

#[async_trait::async_trait]
impl MessageRepo for MemoryRepo {
    async fn contains_message(&self, message_id: &str) -> Result<bool, DomainError> {
        Ok(self
            .messages
            .lock()
            .unwrap()
            .iter()
            .any(|(m, _)| m.id == message_id))
    }

    async fn insert_message(
        &self,
        message: &PrivateMessage,
        reaction_pending: bool,
    ) -> Result<(), DomainError> {
        let mut messages = self.messages.lock().unwrap();
        if !messages.iter().any(|(m, _)| m.id == message.id) {
            messages.push((message.clone(), reaction_pending));
        }
        Ok(())
    }

    async fn has_message_to_after(
        &self,
        to_id: &str,
        after: DateTime<Utc>,
    ) -> Result<bool, DomainError> {
        Ok(self
            .messages
            .lock()
            .unwrap()
            .iter()
            .any(|(m, _)| m.to_id == to_id && m.timestamp > after))
    }

    async fn pending_messages(&self) -> Result<Vec<PrivateMessage>, DomainError> {
        let mut pending: Vec<PrivateMessage> = self
            .messages
            .lock()
            .unwrap()
            .iter()
            .filter(|(_, pending)| *pending)
            .map(|(m, _)| m.clone())
            .collect();
        pending.sort_by_key(|m| m.timestamp);
        Ok(pending)
    }

    async fn set_reaction_pending(
        &self,
        message_id: &str,
        pending: bool,
    ) -> Result<(), DomainError> {
        for (m, flag) in self.messages.lock().unwrap().iter_mut() {
            if m.id == message_id {
                *flag = pending;
            }
        }
        Ok(())
    }
}

#[async_trait::async_trait]
impl EventLog for MemoryRepo {
    async fn is_handled(
        &self,
        kind: EventKind,
        subject_id: &str,
        date: NaiveDate,
    ) -> Result<bool, DomainError> {
        Ok(self
            .events
            .lock()
            .unwrap()
            .contains(&(kind.as_str(), subject_id.to_string(), date)))
    }

    async fn mark_handled(
        &self,
        kind: EventKind,
        subject_id: &str,
        date: NaiveDate,
    ) -> Result<(), DomainError> {
        self.events
            .lock()
            .unwrap()
            .insert((kind.as_str(), subject_id.to_string(), date));
        Ok(())
    }
}

#[derive(Default)]
pub struct MemoryQuestions {
    pub questions: Mutex<Vec<Question>>,
}

#[async_trait::async_trait]
impl QuestionStore for MemoryQuestions {
    async fn load(&self) -> Result<Vec<Question>, DomainError> {
        Ok(self.questions.lock().unwrap().clone())
    }

    async fn save(&self, questions: &[Question]) -> Result<(), DomainError> {
        *self.questions.lock().unwrap() = questions.to_vec();
        Ok(())
    }
}

pub fn member(id: &str, login: &str, created: NaiveDate) -> Member {
    Member {
        id: id.into(),
        display_name: format!("{} Display", login),
        login_name: login.into(),
        created,
        last_login: None,
    }
}

pub fn date(y: i32, m: u32, d: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(y, m, d).unwrap()
}
