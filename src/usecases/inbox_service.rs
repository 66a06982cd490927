//! Inbox use case: fetch private messages -> store unseen ones -> flag those awaiting a reaction.

use crate::domain::{DomainError, PrivateMessage};
use crate::ports::{HabiticaGateway, MessageRepo};
use std::sync::Arc;
use tracing::{debug, info};

pub struct InboxService {
    habitica: Arc<dyn HabiticaGateway>,
    messages: Arc<dyn MessageRepo>,
    bot_id: String,
}

impl InboxService {
    pub fn new(
        habitica: Arc<dyn HabiticaGateway>,
        messages: Arc<dyn MessageRepo>,
        bot_id: impl Into<String>,
    ) -> Self {
        Self {
            habitica,
            messages,
            bot_id: bot_id.into(),
        }
    }

    /// Store inbox messages not seen before. Returns how many were new.
    ///
    /// A received message awaits a reaction unless the bot has already sent
    /// its sender a newer message. The bot's own messages are stored first so
    /// that replies fetched in the same batch count.
    pub async fn fetch_new(&self) -> Result<usize, DomainError> {
        let mut inbox = self.habitica.get_inbox_messages().await?;
        inbox.sort_by_key(|m| m.timestamp);

        let (own, received): (Vec<PrivateMessage>, Vec<PrivateMessage>) = inbox
            .into_iter()
            .partition(|m| m.from_id == self.bot_id);

        let mut new_count = 0usize;
        for msg in &own {
            if self.messages.contains_message(&msg.id).await? {
                continue;
            }
            self.messages.insert_message(msg, false).await?;
            new_count += 1;
        }

        let mut pending_count = 0usize;
        for msg in &received {
            if self.messages.contains_message(&msg.id).await? {
                continue;
            }
            let answered = self
                .messages
                .has_message_to_after(&msg.from_id, msg.timestamp)
                .await?;
            self.messages.insert_message(msg, !answered).await?;
            if !answered {
                debug!(id = %msg.id, from = %msg.from_id, excerpt = %msg.excerpt(), "message awaits reaction");
                pending_count += 1;
            }
            new_count += 1;
        }

        if new_count > 0 {
            info!(new = new_count, pending = pending_count, "fetched private messages");
        }
        Ok(new_count)
    }

    /// Messages awaiting a reaction, oldest first.
    pub async fn pending(&self) -> Result<Vec<PrivateMessage>, DomainError> {
        self.messages.pending_messages().await
    }

    pub async fn mark_handled(&self, message_id: &str) -> Result<(), DomainError> {
        self.messages.set_reaction_pending(message_id, false).await
    }
}
