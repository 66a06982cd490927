//! Port traits. API boundaries for the hexagon.
//!
//! Outbound only: use cases call into Habitica, the database and the
//! question file through these traits. Adapters implement them.

pub mod outbound;
pub mod questions;

pub use outbound::{EventLog, HabiticaGateway, MemberRepo, MessageRepo};
pub use questions::QuestionStore;
