//! Habitica REST API adapter.

pub mod client;
pub mod mapper;

pub use client::HabiticaClient;
