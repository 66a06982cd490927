//! Quest queue reminders, owned quest scrolls, and joining party quests.

use crate::domain::{DomainError, Member};
use crate::ports::{HabiticaGateway, MemberRepo};
use crate::usecases::messenger::Messenger;
use std::collections::BTreeMap;
use std::sync::Arc;
use tracing::{debug, info};

/// One line of a quest queue: the quest and the login names of its owners.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QueueEntry {
    pub quest: String,
    pub owners: Vec<String>,
}

/// Parse the code block of a `quest-reminders` body.
///
/// Every non-empty line must be `quest; @owner, @owner`. Owners may be left
/// out on the first line only, since that quest gets no reminder.
pub fn parse_queue(body: &str) -> Result<Vec<QueueEntry>, DomainError> {
    let blocks: Vec<&str> = body.split("```").collect();
    if blocks.len() != 3 {
        return Err(DomainError::Validation(
            "The list of reminders to be sent must be given inside a code block \
             (surrounded by three backticks). A code block was not found in the message."
                .into(),
        ));
    }

    let mut entries = Vec::new();
    for line in blocks[1].lines().filter(|l| !l.trim().is_empty()) {
        let fields: Vec<&str> = line.split(';').collect();
        let [quest, owners] = fields.as_slice() else {
            return Err(DomainError::Validation(format!(
                "Each line in the quest queue must be divided into two parts by a semicolon (;), \
                 the first part containing the name of the quest and the latter holding the names \
                 of the participants. Line `{}` did not match this format.",
                line.trim()
            )));
        };
        let quest = quest.trim();
        if quest.is_empty() {
            return Err(DomainError::Validation(format!(
                "Problem in line `{}`: quest name cannot be empty.",
                line.trim()
            )));
        }

        let first_line = entries.is_empty();
        let owners: Vec<String> = if owners.trim().is_empty() {
            Vec::new()
        } else {
            owners
                .split(',')
                .map(|o| o.trim().trim_start_matches('@').to_string())
                .collect()
        };
        if !first_line {
            if owners.is_empty() {
                return Err(DomainError::Validation(format!(
                    "No quest owners listed for quest {}",
                    quest
                )));
            }
            if owners.iter().any(String::is_empty) {
                return Err(DomainError::Validation(format!(
                    "Malformed quest owner list for quest {}",
                    quest
                )));
            }
        }
        entries.push(QueueEntry {
            quest: quest.to_string(),
            owners,
        });
    }

    if entries.is_empty() {
        return Err(DomainError::Validation(
            "The quest queue in the code block is empty.".into(),
        ));
    }
    Ok(entries)
}

/// Reminder text for one owner of `quest`, which follows `previous` in the queue.
pub fn reminder_text(quest: &str, owner_count: usize, previous: &str) -> String {
    let who = match owner_count {
        0 | 1 => "You".to_string(),
        2 => "You (and one other partymember)".to_string(),
        n => format!("You (and {} others)", n - 1),
    };
    format!(
        "{} have a quest coming up in the queue: {}! It comes after {}, so when you notice \
         that {} has ended, please send out the invite for {}.",
        who, quest, previous, previous, quest
    )
}

pub struct QuestService {
    habitica: Arc<dyn HabiticaGateway>,
    members: Arc<dyn MemberRepo>,
    messenger: Arc<Messenger>,
    bot_id: String,
}

impl QuestService {
    pub fn new(
        habitica: Arc<dyn HabiticaGateway>,
        members: Arc<dyn MemberRepo>,
        messenger: Arc<Messenger>,
        bot_id: impl Into<String>,
    ) -> Self {
        Self {
            habitica,
            members,
            messenger,
            bot_id: bot_id.into(),
        }
    }

    /// Validate the queue in `body`, then remind the owners of every quest
    /// after the first. Nothing is sent unless the whole queue is valid.
    ///
    /// Validation problems come back as the reply text.
    pub async fn send_reminders(&self, body: &str) -> Result<String, DomainError> {
        let plan = match self.plan_reminders(body).await {
            Ok(plan) => plan,
            Err(DomainError::Validation(problem)) => {
                return Ok(format!(
                    "A problem was encountered when reading the quest list: {}\n\nNo messages were sent.",
                    problem
                ));
            }
            Err(e) => return Err(e),
        };

        for (recipient, text) in &plan {
            debug!(to = %recipient.login_name, "sending quest reminder");
            self.messenger.send(&recipient.id, text).await?;
        }
        info!(count = plan.len(), "sent quest reminders");
        Ok(format!("Sent out {} quest reminders.", plan.len()))
    }

    /// Every (recipient, text) pair the queue asks for.
    async fn plan_reminders(&self, body: &str) -> Result<Vec<(Member, String)>, DomainError> {
        let entries = parse_queue(body)?;
        let mut plan = Vec::new();
        for pair in entries.windows(2) {
            let (previous, entry) = (&pair[0], &pair[1]);
            for owner in &entry.owners {
                let member = self.members.find_by_login_name(owner).await?.ok_or_else(|| {
                    DomainError::Validation(format!("User @{} not found in the party", owner))
                })?;
                let text = reminder_text(&entry.quest, entry.owners.len(), &previous.quest);
                plan.push((member, text));
            }
        }
        Ok(plan)
    }

    /// Quest scrolls owned by party members, one line per quest.
    pub async fn owned_quests(&self) -> Result<String, DomainError> {
        let mut owners: BTreeMap<String, Vec<String>> = BTreeMap::new();
        for member in self.members.list_members().await? {
            for (quest, count) in self.habitica.get_member_quests(&member.id).await? {
                let owner = if count > 1 {
                    format!("@{} ({})", member.login_name, count)
                } else {
                    format!("@{}", member.login_name)
                };
                owners.entry(quest).or_default().push(owner);
            }
        }
        if owners.is_empty() {
            return Ok("Nobody in the party owns any quests.".to_string());
        }
        Ok(owners
            .iter()
            .map(|(quest, names)| format!("- **{}**: {}", quest, names.join(", ")))
            .collect::<Vec<_>>()
            .join("\n"))
    }

    /// Accept the party's pending quest if the bot has not answered it yet.
    /// Returns true if the quest was accepted.
    pub async fn join_pending_quest(&self) -> Result<bool, DomainError> {
        let party = self.habitica.get_party().await?;
        match party.quest {
            Some(quest) if quest.awaits_answer_from(&self.bot_id) => {
                self.habitica.accept_quest().await?;
                info!(quest = %quest.key, "joined pending quest");
                Ok(true)
            }
            _ => Ok(false),
        }
    }
}
