//! Keeps the member table in line with the party roster.

use crate::domain::DomainError;
use crate::ports::{HabiticaGateway, MemberRepo};
use std::collections::HashMap;
use std::sync::Arc;
use tracing::info;

/// Counts from one sync.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct SyncReport {
    pub added: usize,
    pub updated: usize,
    pub removed: usize,
}

pub struct PartySync {
    habitica: Arc<dyn HabiticaGateway>,
    members: Arc<dyn MemberRepo>,
}

impl PartySync {
    pub fn new(habitica: Arc<dyn HabiticaGateway>, members: Arc<dyn MemberRepo>) -> Self {
        Self { habitica, members }
    }

    /// Insert new members, update changed ones, delete those who left.
    pub async fn sync(&self) -> Result<SyncReport, DomainError> {
        let current = self.habitica.get_party_members().await?;
        let mut stored: HashMap<String, _> = self
            .members
            .list_members()
            .await?
            .into_iter()
            .map(|m| (m.id.clone(), m))
            .collect();

        let mut report = SyncReport::default();
        for member in &current {
            match stored.remove(&member.id) {
                None => {
                    self.members.upsert_member(member).await?;
                    report.added += 1;
                }
                Some(old) if old != *member => {
                    self.members.upsert_member(member).await?;
                    report.updated += 1;
                }
                Some(_) => {}
            }
        }
        for gone in stored.keys() {
            self.members.delete_member(gone).await?;
            report.removed += 1;
        }

        if report != SyncReport::default() {
            info!(
                added = report.added,
                updated = report.updated,
                removed = report.removed,
                "party members synced"
            );
        }
        Ok(report)
    }
}
