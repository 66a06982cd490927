//! Reacting to private messages: parse -> check permission -> run handler -> reply.
//!
//! Every pending message gets exactly one reply unless it is a gem-gift
//! notification. Handler failures are logged and answered with an apology.

use crate::domain::command::{self, Command, Parsed, Permission};
use crate::domain::{DomainError, PrivateMessage};
use crate::ports::MemberRepo;
use crate::usecases::account_service::AccountService;
use crate::usecases::birthday_service::BirthdayService;
use crate::usecases::inactive_members::InactiveMembers;
use crate::usecases::inbox_service::InboxService;
use crate::usecases::messenger::Messenger;
use crate::usecases::newsletter_service::NewsletterService;
use crate::usecases::party_sync::PartySync;
use crate::usecases::quest_service::QuestService;
use crate::usecases::sharing_weekend::SharingWeekendService;
use chrono::NaiveDate;
use std::sync::Arc;
use tracing::{debug, error, info, warn};

/// True for the system message Habitica sends when someone gifts gems,
/// e.g. "`Hello bot, Someone has sent you 20 gems!`".
pub fn is_gem_gift(content: &str) -> bool {
    let Some(rest) = content.trim().strip_prefix("`Hello ") else {
        return false;
    };
    let Some((_, tail)) = rest.split_once(" has sent you ") else {
        return false;
    };
    tail.strip_suffix(" gems!`")
        .is_some_and(|n| n.chars().all(|c| c.is_ascii_digit()))
}

/// Services the command handlers delegate to.
pub struct Handlers {
    pub inbox: Arc<InboxService>,
    pub messenger: Arc<Messenger>,
    pub members: Arc<dyn MemberRepo>,
    pub party_sync: Arc<PartySync>,
    pub birthdays: Arc<BirthdayService>,
    pub quests: Arc<QuestService>,
    pub newsletter: Arc<NewsletterService>,
    pub sharing: Arc<SharingWeekendService>,
    pub inactive: Arc<InactiveMembers>,
    pub account: Arc<AccountService>,
}

/// Counts from one pass over pending messages.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct ReactReport {
    pub answered: usize,
    pub ignored: usize,
    pub failed: usize,
}

pub struct CommandDispatcher {
    h: Handlers,
    admin_id: Option<String>,
    birthday_recipient_id: Option<String>,
}

impl CommandDispatcher {
    pub fn new(
        handlers: Handlers,
        admin_id: Option<String>,
        birthday_recipient_id: Option<String>,
    ) -> Self {
        Self {
            h: handlers,
            admin_id,
            birthday_recipient_id,
        }
    }

    /// Reply to every message awaiting a reaction, oldest first.
    /// A message that cannot be answered stays pending for the next run.
    pub async fn react_to_pending(&self, today: NaiveDate) -> Result<ReactReport, DomainError> {
        let mut report = ReactReport::default();
        for msg in self.h.inbox.pending().await? {
            match self.handle_message(&msg, today).await {
                Ok(true) => report.answered += 1,
                Ok(false) => report.ignored += 1,
                Err(e) => {
                    warn!(id = %msg.id, from = %msg.from_id, error = %e, "could not react to message");
                    report.failed += 1;
                }
            }
        }
        if report != ReactReport::default() {
            info!(
                answered = report.answered,
                ignored = report.ignored,
                failed = report.failed,
                "reacted to private messages"
            );
        }
        Ok(report)
    }

    /// Reply to one message and mark it handled. Returns false for ignored messages.
    pub async fn handle_message(
        &self,
        msg: &PrivateMessage,
        today: NaiveDate,
    ) -> Result<bool, DomainError> {
        if is_gem_gift(&msg.content) {
            debug!(id = %msg.id, "gem gift needs no reaction");
            self.h.inbox.mark_handled(&msg.id).await?;
            return Ok(false);
        }
        let reply = self.reply_to(msg, today).await;
        self.h.messenger.send(&msg.from_id, &reply).await?;
        self.h.inbox.mark_handled(&msg.id).await?;
        Ok(true)
    }

    /// The reply text for `msg`. Never fails: errors become apologies.
    pub async fn reply_to(&self, msg: &PrivateMessage, today: NaiveDate) -> String {
        match command::parse(&msg.content) {
            Parsed::Unknown { word } => {
                info!(from = %msg.from_id, word, "unrecognized command");
                self.help_text(Some(word)).await
            }
            Parsed::Known { command, body } => {
                debug!(from = %msg.from_id, %command, "running command");
                match self.run(command, body, &msg.from_id, today).await {
                    Ok(reply) => reply,
                    Err(DomainError::Validation(problem)) => problem,
                    Err(e @ DomainError::IncompleteChallenge { .. }) => e.to_string(),
                    Err(e) => {
                        error!(%command, from = %msg.from_id, error = %e, "command failed");
                        format!(
                            "Something unexpected happened while handling command `{}`. \
                             Contact {} for help.",
                            command,
                            self.admin_mention().await
                        )
                    }
                }
            }
        }
    }

    async fn run(
        &self,
        command: Command,
        body: &str,
        sender_id: &str,
        today: NaiveDate,
    ) -> Result<String, DomainError> {
        if command.needs_member_sync() {
            self.h.party_sync.sync().await?;
        }
        if let Some(refusal) = self.check_permission(command, sender_id).await? {
            debug!(%command, from = sender_id, "permission denied");
            return Ok(refusal);
        }

        match command {
            Command::Ping => Ok("Pong".to_string()),
            Command::Help => Ok(self.help_text(None).await),
            Command::ListBirthdays => self.h.birthdays.reminder_message(today).await,
            Command::SendBirthdayReminder => {
                let recipient = self
                    .birthday_recipient_id
                    .as_deref()
                    .unwrap_or(sender_id);
                match self.h.birthdays.send_reminders(recipient, today).await? {
                    0 => Ok("No new birthdays to remind about today.".to_string()),
                    n => Ok(format!("Sent a birthday reminder naming {} members.", n)),
                }
            }
            Command::CreateChallenge => self.h.sharing.create_next_message(today).await,
            Command::AwardWinner => self.h.sharing.award_winner(today).await,
            Command::SendWinnerMessage => self.h.sharing.winner_message(today).await,
            Command::QuestReminders => self.h.quests.send_reminders(body).await,
            Command::PartyNewsletter => self.h.newsletter.send(sender_id, body).await,
            Command::OwnedQuests => self.h.quests.owned_quests().await,
            Command::CountUnusedQuestions => self.h.sharing.count_unused_questions_message().await,
            Command::AddQuestion => self.h.sharing.add_question(body).await,
            Command::AddTask => self.h.account.add_task(body).await,
            Command::ListInactiveMembers => self.h.inactive.report(today).await,
            Command::GemBalance => self.h.account.gem_balance().await,
        }
    }

    fn is_admin(&self, user_id: &str) -> bool {
        self.admin_id.as_deref() == Some(user_id)
    }

    /// Refusal text if `sender_id` may not run `command`.
    async fn check_permission(
        &self,
        command: Command,
        sender_id: &str,
    ) -> Result<Option<String>, DomainError> {
        let allowed = match command.permission() {
            Permission::Anyone => true,
            Permission::Admin => self.is_admin(sender_id),
            Permission::PartyMember => {
                self.is_admin(sender_id) || self.h.members.find_by_id(sender_id).await?.is_some()
            }
        };
        if allowed {
            return Ok(None);
        }
        let refusal = match command.permission() {
            Permission::Admin => "This command is usable only by administrators. No messages sent.",
            _ => "This command is usable only by people within the party. No messages sent.",
        };
        Ok(Some(refusal.to_string()))
    }

    /// "@login" of the administrator, or a generic description.
    async fn admin_mention(&self) -> String {
        let Some(admin_id) = &self.admin_id else {
            return "the party leader".to_string();
        };
        match self.h.members.find_by_id(admin_id).await {
            Ok(Some(admin)) => format!("@{}", admin.login_name),
            _ => "the administrator".to_string(),
        }
    }

    /// Command listing, prefixed with a note about `unknown` when given.
    async fn help_text(&self, unknown: Option<&str>) -> String {
        let intro = match unknown {
            Some("") => "I did not find a command in your message.\n\n".to_string(),
            Some(word) => format!("Command `{}` not recognized.\n\n", word),
            None => String::new(),
        };
        let commands: Vec<String> = Command::all()
            .map(|c| format!("`{}`: {}", c, c.help()))
            .collect();
        format!(
            "{}I am a bot: not a real human user. If I am misbehaving or you need assistance, \
             please contact {}.\n\nAvailable commands:\n\n{}",
            intro,
            self.admin_mention().await,
            commands.join("\n\n")
        )
    }
}
