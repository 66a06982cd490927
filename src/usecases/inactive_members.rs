//! Party members who have not logged in for a long time.

use crate::domain::{DomainError, Member};
use crate::ports::MemberRepo;
use chrono::{Days, NaiveDate};
use std::sync::Arc;

pub struct InactiveMembers {
    members: Arc<dyn MemberRepo>,
    threshold_days: u64,
    /// Login names never reported, compared case-insensitively.
    allow_list: Vec<String>,
}

impl InactiveMembers {
    pub fn new(members: Arc<dyn MemberRepo>, threshold_days: u64, allow_list: Vec<String>) -> Self {
        Self {
            members,
            threshold_days,
            allow_list,
        }
    }

    /// Members whose last login (or account creation, if never seen) is
    /// more than the threshold before `today`.
    pub async fn inactive(&self, today: NaiveDate) -> Result<Vec<Member>, DomainError> {
        let cutoff = today
            .checked_sub_days(Days::new(self.threshold_days))
            .unwrap_or(NaiveDate::MIN);
        let mut inactive: Vec<Member> = self
            .members
            .list_members()
            .await?
            .into_iter()
            .filter(|m| m.last_login.unwrap_or(m.created) < cutoff)
            .filter(|m| {
                !self
                    .allow_list
                    .iter()
                    .any(|allowed| allowed.eq_ignore_ascii_case(&m.login_name))
            })
            .collect();
        inactive.sort_by_key(|m| m.last_login.unwrap_or(m.created));
        Ok(inactive)
    }

    pub async fn report(&self, today: NaiveDate) -> Result<String, DomainError> {
        let inactive = self.inactive(today).await?;
        if inactive.is_empty() {
            return Ok("No inactive members found!".to_string());
        }
        let lines: Vec<String> = inactive
            .iter()
            .map(|m| match m.last_login {
                Some(login) => format!("- @{} (last login {})", m.login_name, login),
                None => format!("- @{} (no recorded login)", m.login_name),
            })
            .collect();
        Ok(format!(
            "The following party members are inactive:\n{}",
            lines.join("\n")
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::usecases::fakes::{MemoryRepo, date, member};

    #[tokio::test]
    async fn test_inactive_members_respect_threshold_and_allow_list() {
        let repo = Arc::new(MemoryRepo::default());
        let created = date(2019, 1, 1);
        let mut active = member("u1", "active", created);
        active.last_login = Some(date(2021, 5, 1));
        let mut gone = member("u2", "gone", created);
        gone.last_login = Some(date(2021, 1, 1));
        let mut excused = member("u3", "Excused", created);
        excused.last_login = Some(date(2020, 1, 1));
        repo.members
            .lock()
            .unwrap()
            .extend([active, gone, excused]);

        let service = InactiveMembers::new(repo, 90, vec!["excused".into()]);
        let report = service.report(date(2021, 6, 1)).await.unwrap();
        assert_eq!(
            report,
            "The following party members are inactive:\n- @gone (last login 2021-01-01)"
        );
    }

    #[tokio::test]
    async fn test_nobody_inactive() {
        let repo = Arc::new(MemoryRepo::default());
        let service = InactiveMembers::new(repo, 90, Vec::new());
        assert_eq!(
            service.report(date(2021, 6, 1)).await.unwrap(),
            "No inactive members found!"
        );
    }
}
