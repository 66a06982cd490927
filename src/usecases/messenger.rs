//! Outgoing private messages.
//!
//! Long messages are split at newlines into parts of at most
//! `MAX_MESSAGE_LENGTH` characters. More than `MAX_MESSAGE_PARTS` parts is
//! refused outright.

use crate::domain::{DomainError, TaskType};
use crate::ports::HabiticaGateway;
use crate::shared::config::{MAX_MESSAGE_LENGTH, MAX_MESSAGE_PARTS};
use crate::usecases::account_service::tick_task;
use std::sync::Arc;
use tracing::{debug, warn};

/// Split `message` at newlines so that no part exceeds `max_chars` characters.
///
/// The newline a split happens at is dropped. Each part is as long as possible.
/// Blank parts are left out, since Habitica rejects empty messages.
pub fn split_message(message: &str, max_chars: usize) -> Result<Vec<String>, DomainError> {
    let mut parts = Vec::new();
    let mut rest = message;
    while rest.chars().count() > max_chars {
        let Some((limit, ch)) = rest.char_indices().nth(max_chars) else {
            break;
        };
        // A newline at char position <= max_chars leaves a short enough part.
        let split_at = rest[..limit + ch.len_utf8()].rfind('\n');
        let Some(split_at) = split_at else {
            return Err(DomainError::UnsplittableMessage {
                length: rest.chars().count(),
            });
        };
        let part = &rest[..split_at];
        if !part.trim().is_empty() {
            parts.push(part.to_string());
        }
        rest = &rest[split_at + 1..];
    }
    if parts.is_empty() || !rest.trim().is_empty() {
        parts.push(rest.to_string());
    }
    Ok(parts)
}

/// Sends private messages as the bot.
pub struct Messenger {
    habitica: Arc<dyn HabiticaGateway>,
    /// Habit ticked after each successful send.
    pm_sent_habit: Option<String>,
}

impl Messenger {
    pub fn new(habitica: Arc<dyn HabiticaGateway>, pm_sent_habit: Option<String>) -> Self {
        Self {
            habitica,
            pm_sent_habit,
        }
    }

    /// Send `text` to `to_user_id`, split into parts when needed.
    ///
    /// # Errors
    /// `UnsplittableMessage` or `Spam` before anything is sent; API errors from
    /// the part that failed.
    pub async fn send(&self, to_user_id: &str, text: &str) -> Result<(), DomainError> {
        let parts = split_message(text, MAX_MESSAGE_LENGTH)?;
        if parts.len() > MAX_MESSAGE_PARTS {
            return Err(DomainError::Spam { parts: parts.len() });
        }
        for part in &parts {
            self.habitica.send_private_message(to_user_id, part).await?;
        }
        debug!(to = to_user_id, parts = parts.len(), "sent private message");

        if let Some(habit) = &self.pm_sent_habit {
            if let Err(e) = tick_task(self.habitica.as_ref(), habit, TaskType::Habit).await {
                warn!(habit = %habit, error = %e, "could not tick PM sent habit");
            }
        }
        Ok(())
    }
}
