//! Adapters: implement ports (Habitica REST API, SQLite, JSON files).

pub mod habitica;
pub mod persistence;
