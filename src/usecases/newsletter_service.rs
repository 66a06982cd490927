//! Party newsletter: one identical message to every party member.

use crate::domain::DomainError;
use crate::ports::MemberRepo;
use crate::usecases::messenger::Messenger;
use std::sync::Arc;
use tracing::{debug, info, warn};

pub struct NewsletterService {
    members: Arc<dyn MemberRepo>,
    messenger: Arc<Messenger>,
    bot_id: String,
    admin_id: Option<String>,
}

impl NewsletterService {
    pub fn new(
        members: Arc<dyn MemberRepo>,
        messenger: Arc<Messenger>,
        bot_id: impl Into<String>,
        admin_id: Option<String>,
    ) -> Self {
        Self {
            members,
            messenger,
            bot_id: bot_id.into(),
            admin_id,
        }
    }

    /// Newsletter text with the standard footer naming the sender and the administrator.
    pub fn format(content: &str, sender_login: &str, admin_login: &str) -> String {
        format!(
            "{}\n\n---\n\nThis is a party newsletter written by @{} and brought you by the \
             party bot. If you suspect you should not have received this message, please \
             contact @{}.",
            content, sender_login, admin_login
        )
    }

    async fn admin_login(&self) -> Result<String, DomainError> {
        let Some(admin_id) = &self.admin_id else {
            return Ok("the party leader".to_string());
        };
        Ok(self
            .members
            .find_by_id(admin_id)
            .await?
            .map(|m| m.login_name)
            .unwrap_or_else(|| admin_id.clone()))
    }

    /// Send `content` from `sender_id` to all members except the bot.
    /// Returns the reply for the sender.
    pub async fn send(&self, sender_id: &str, content: &str) -> Result<String, DomainError> {
        let Some(sender) = self.members.find_by_id(sender_id).await? else {
            debug!(sender = sender_id, "newsletter request from outside the party");
            return Ok("This command is usable only by people within the party. No messages sent."
                .to_string());
        };
        let content = content.trim();
        if content.is_empty() {
            return Ok("The newsletter is empty. No messages sent.".to_string());
        }

        let text = Self::format(content, &sender.login_name, &self.admin_login().await?);
        let mut recipients = Vec::new();
        for member in self.members.list_members().await? {
            if member.id == self.bot_id {
                continue;
            }
            match self.messenger.send(&member.id, &text).await {
                Ok(()) => recipients.push(member.login_name),
                Err(e @ (DomainError::Spam { .. } | DomainError::UnsplittableMessage { .. })) => {
                    return Err(e);
                }
                Err(e) => warn!(to = %member.login_name, error = %e, "newsletter not delivered"),
            }
        }

        info!(count = recipients.len(), from = %sender.login_name, "sent party newsletter");
        let list: Vec<String> = recipients.iter().map(|n| format!("- @{}", n)).collect();
        Ok(format!(
            "Sent the given newsletter to the following users:\n{}",
            list.join("\n")
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::usecases::fakes::{FakeHabitica, MemoryRepo, date, member};

    fn setup() -> (Arc<FakeHabitica>, NewsletterService) {
        let fake = Arc::new(FakeHabitica::new("bot"));
        let repo = Arc::new(MemoryRepo::default());
        let created = date(2020, 1, 1);
        repo.members.lock().unwrap().extend([
            member("bot", "partybot", created),
            member("admin", "Leader", created),
            member("u1", "alice", created),
        ]);
        let messenger = Arc::new(Messenger::new(fake.clone(), None));
        let service = NewsletterService::new(repo, messenger, "bot", Some("admin".into()));
        (fake, service)
    }

    #[tokio::test]
    async fn test_newsletter_reaches_everyone_but_bot() {
        let (fake, service) = setup();
        let reply = service.send("u1", "# News\nHello!").await.unwrap();

        assert!(reply.contains("- @Leader\n- @alice"));
        assert!(fake.sent_to("bot").is_empty());
        let received = &fake.sent_to("admin")[0];
        assert!(received.starts_with("# News\nHello!\n\n---"));
        assert!(received.contains("written by @alice"));
        assert!(received.contains("please contact @Leader."));
    }

    #[tokio::test]
    async fn test_outsider_cannot_send() {
        let (fake, service) = setup();
        let reply = service.send("stranger", "Buy stuff").await.unwrap();
        assert!(reply.contains("only by people within the party"));
        assert!(fake.sent.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_empty_newsletter_is_not_sent() {
        let (fake, service) = setup();
        let reply = service.send("u1", "  \n ").await.unwrap();
        assert!(reply.contains("empty"));
        assert!(fake.sent.lock().unwrap().is_empty());
    }
}
