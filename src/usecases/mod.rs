//! Application use cases. Orchestrate domain logic via ports.

pub mod account_service;
pub mod birthday_service;
pub mod dispatcher;
pub mod inactive_members;
pub mod inbox_service;
pub mod messenger;
pub mod newsletter_service;
pub mod party_sync;
pub mod quest_service;
pub mod scheduled_run;
pub mod sharing_weekend;

#[cfg(test)]
pub mod fakes;

pub use account_service::AccountService;
pub use birthday_service::BirthdayService;
pub use dispatcher::{CommandDispatcher, Handlers};
pub use inactive_members::InactiveMembers;
pub use inbox_service::InboxService;
pub use messenger::Messenger;
pub use newsletter_service::NewsletterService;
pub use party_sync::PartySync;
pub use quest_service::QuestService;
pub use scheduled_run::{RunReport, Schedule, ScheduledRun, StepOutcome};
pub use sharing_weekend::{SharingWeekendService, SharingWeekendSettings};
