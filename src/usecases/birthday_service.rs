//! Habitica birthdays: members whose account anniversary is today.
//!
//! Reminders are deduplicated per member and date through the event log, so a
//! second run on the same day sends nothing new.

use crate::domain::{DomainError, EventKind, Member};
use crate::ports::{EventLog, MemberRepo};
use crate::usecases::messenger::Messenger;
use chrono::NaiveDate;
use std::sync::Arc;
use tracing::{debug, info};

const NOBODY: &str = "Nobody from the party is celebrating their Habitica birthday today.";

pub struct BirthdayService {
    members: Arc<dyn MemberRepo>,
    events: Arc<dyn EventLog>,
    messenger: Arc<Messenger>,
}

fn format_reminder(revellers: &[Member]) -> String {
    if revellers.is_empty() {
        return NOBODY.to_string();
    }
    let names: Vec<String> = revellers
        .iter()
        .map(|m| format!("- {}", m.display_name))
        .collect();
    format!(
        "The following habiticians are celebrating their Habitica birthdays today:\n{}",
        names.join("\n")
    )
}

impl BirthdayService {
    pub fn new(
        members: Arc<dyn MemberRepo>,
        events: Arc<dyn EventLog>,
        messenger: Arc<Messenger>,
    ) -> Self {
        Self {
            members,
            events,
            messenger,
        }
    }

    /// Members whose Habitica birthday is `date`.
    pub async fn birthdays_on(&self, date: NaiveDate) -> Result<Vec<Member>, DomainError> {
        let mut revellers: Vec<Member> = self
            .members
            .list_members()
            .await?
            .into_iter()
            .filter(|m| m.has_birthday_on(date))
            .collect();
        revellers.sort_by(|a, b| a.display_name.cmp(&b.display_name));
        Ok(revellers)
    }

    /// Birthday list for `date`, or a note that nobody celebrates.
    pub async fn reminder_message(&self, date: NaiveDate) -> Result<String, DomainError> {
        Ok(format_reminder(&self.birthdays_on(date).await?))
    }

    /// Send `recipient` one message naming every member whose birthday is
    /// `date` and who has not been reminded about yet. Returns how many
    /// members the message named; zero means nothing was sent.
    pub async fn send_reminders(
        &self,
        recipient: &str,
        date: NaiveDate,
    ) -> Result<usize, DomainError> {
        let mut uncovered = Vec::new();
        for member in self.birthdays_on(date).await? {
            if self
                .events
                .is_handled(EventKind::BirthdayReminder, &member.id, date)
                .await?
            {
                debug!(member = %member.login_name, %date, "birthday already reminded");
                continue;
            }
            uncovered.push(member);
        }
        if uncovered.is_empty() {
            debug!(%date, "no birthday reminders to send");
            return Ok(0);
        }

        self.messenger
            .send(recipient, &format_reminder(&uncovered))
            .await?;
        for member in &uncovered {
            self.events
                .mark_handled(EventKind::BirthdayReminder, &member.id, date)
                .await?;
        }
        info!(count = uncovered.len(), %date, "sent birthday reminder");
        Ok(uncovered.len())
    }
}
