//! Core domain layer. No external I/O dependencies.
//!
//! Entities, command vocabulary and date rules live here. Dependencies flow inward.

pub mod calendar;
pub mod command;
pub mod entities;
pub mod errors;

pub use command::{Command, Parsed, Permission};
pub use entities::{
    BotProfile, Challenge, ChallengeDraft, ChallengeMember, EventKind, Member, Party, PartyQuest,
    PrivateMessage, Question, ScoreDirection, Task, TaskDraft, TaskType,
};
pub use errors::DomainError;
