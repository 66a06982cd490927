//! One bot run: a fixed sequence of independent steps, plus the polling loop.
//!
//! A failing step is logged and the run moves on to the next one.

use crate::domain::DomainError;
use crate::usecases::birthday_service::BirthdayService;
use crate::usecases::dispatcher::CommandDispatcher;
use crate::usecases::inbox_service::InboxService;
use crate::usecases::messenger::Messenger;
use crate::usecases::party_sync::PartySync;
use crate::usecases::quest_service::QuestService;
use crate::usecases::sharing_weekend::SharingWeekendService;
use chrono::{Datelike, NaiveDate, Weekday};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, error, info, warn};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StepOutcome {
    Succeeded,
    /// Nothing to do today.
    Skipped,
    Failed(String),
}

/// Outcome of each step, in execution order.
#[derive(Debug, Default, Clone)]
pub struct RunReport {
    pub steps: Vec<(&'static str, StepOutcome)>,
}

impl RunReport {
    pub fn failed(&self) -> usize {
        self.steps
            .iter()
            .filter(|(_, o)| matches!(o, StepOutcome::Failed(_)))
            .count()
    }

    pub fn succeeded(&self) -> usize {
        self.steps
            .iter()
            .filter(|(_, o)| *o == StepOutcome::Succeeded)
            .count()
    }

    /// A run fails as a whole when something failed and nothing succeeded.
    pub fn is_failure(&self) -> bool {
        self.failed() > 0 && self.succeeded() == 0
    }

    pub fn outcome(&self, step: &str) -> Option<&StepOutcome> {
        self.steps.iter().find(|(s, _)| *s == step).map(|(_, o)| o)
    }

    fn record(&mut self, step: &'static str, result: Result<bool, DomainError>) {
        let outcome = match result {
            Ok(true) => StepOutcome::Succeeded,
            Ok(false) => StepOutcome::Skipped,
            Err(e) => {
                warn!(step, error = %e, "step failed");
                StepOutcome::Failed(e.to_string())
            }
        };
        debug!(step, ?outcome, "step finished");
        self.steps.push((step, outcome));
    }
}

/// Days of the week the weekly challenge steps run on.
#[derive(Debug, Clone, Copy)]
pub struct Schedule {
    pub challenge_creation: Weekday,
    pub winner_award: Weekday,
}

pub struct ScheduledRun {
    inbox: Arc<InboxService>,
    dispatcher: Arc<CommandDispatcher>,
    party_sync: Arc<PartySync>,
    birthdays: Arc<BirthdayService>,
    quests: Arc<QuestService>,
    sharing: Arc<SharingWeekendService>,
    messenger: Arc<Messenger>,
    schedule: Schedule,
    admin_id: Option<String>,
    birthday_recipient_id: Option<String>,
}

impl ScheduledRun {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        inbox: Arc<InboxService>,
        dispatcher: Arc<CommandDispatcher>,
        party_sync: Arc<PartySync>,
        birthdays: Arc<BirthdayService>,
        quests: Arc<QuestService>,
        sharing: Arc<SharingWeekendService>,
        messenger: Arc<Messenger>,
        schedule: Schedule,
        admin_id: Option<String>,
        birthday_recipient_id: Option<String>,
    ) -> Self {
        Self {
            inbox,
            dispatcher,
            party_sync,
            birthdays,
            quests,
            sharing,
            messenger,
            schedule,
            admin_id,
            birthday_recipient_id,
        }
    }

    /// Run every step once for `today`.
    pub async fn run_once(&self, today: NaiveDate) -> RunReport {
        let mut report = RunReport::default();

        report.record("fetch-inbox", self.inbox.fetch_new().await.map(|_| true));
        report.record(
            "react-to-messages",
            self.dispatcher
                .react_to_pending(today)
                .await
                .map(|r| r.answered + r.ignored > 0),
        );
        report.record("sync-party", self.party_sync.sync().await.map(|_| true));
        report.record("birthday-reminders", self.birthday_reminders(today).await);
        report.record("join-quest", self.quests.join_pending_quest().await);
        // Last weekend's winner is drawn before the next challenge exists.
        report.record("award-winner", self.award_winner(today).await);
        report.record("create-challenge", self.create_challenge(today).await);

        info!(
            succeeded = report.succeeded(),
            failed = report.failed(),
            "run complete"
        );
        report
    }

    async fn birthday_reminders(&self, today: NaiveDate) -> Result<bool, DomainError> {
        let Some(recipient) = &self.birthday_recipient_id else {
            debug!("no birthday reminder recipient configured");
            return Ok(false);
        };
        Ok(self.birthdays.send_reminders(recipient, today).await? > 0)
    }

    async fn create_challenge(&self, today: NaiveDate) -> Result<bool, DomainError> {
        if today.weekday() != self.schedule.challenge_creation
            || !self.sharing.creation_due(today).await?
        {
            return Ok(false);
        }
        match self.sharing.create_next_message(today).await {
            Ok(reply) => {
                self.notify_admin(&reply).await;
                Ok(true)
            }
            Err(e) => {
                // Marked as handled: no retry on every poll this week.
                self.sharing.skip_creation(today).await?;
                let problem = match &e {
                    DomainError::Validation(p) => p.clone(),
                    other => other.to_string(),
                };
                self.notify_admin(&format!(
                    "Creating the weekly sharing weekend challenge failed: {}",
                    problem
                ))
                .await;
                Err(e)
            }
        }
    }

    async fn award_winner(&self, today: NaiveDate) -> Result<bool, DomainError> {
        if today.weekday() != self.schedule.winner_award || !self.sharing.award_due(today).await? {
            return Ok(false);
        }
        let reply = match self.sharing.award_winner(today).await {
            Ok(reply) => reply,
            Err(DomainError::Validation(problem)) => problem,
            Err(e) => return Err(e),
        };
        self.notify_admin(&reply).await;
        Ok(true)
    }

    async fn notify_admin(&self, text: &str) {
        let Some(admin) = &self.admin_id else {
            info!(text, "no administrator to notify");
            return;
        };
        if let Err(e) = self.messenger.send(admin, text).await {
            warn!(error = %e, "could not notify administrator");
        }
    }

    /// Repeat `run_once` every `poll_interval` until `max_failures` runs in a
    /// row have failed.
    pub async fn watch(&self, poll_interval: Duration, max_failures: u32) -> Result<(), DomainError> {
        info!(
            poll_secs = poll_interval.as_secs(),
            max_failures, "watching for new messages"
        );
        let mut consecutive_failures = 0u32;
        loop {
            let today = chrono::Local::now().date_naive();
            let report = self.run_once(today).await;
            if report.is_failure() {
                consecutive_failures += 1;
                warn!(consecutive_failures, "run failed");
                if consecutive_failures >= max_failures {
                    error!(consecutive_failures, "too many failing runs, giving up");
                    return Err(DomainError::GaveUp {
                        runs: consecutive_failures,
                    });
                }
            } else {
                consecutive_failures = 0;
            }
            tokio::time::sleep(poll_interval).await;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{Challenge, ChallengeMember, PrivateMessage, Question, Task, TaskType};
    use crate::shared::config::AppConfig;
    use crate::usecases::account_service::AccountService;
    use crate::usecases::dispatcher::Handlers;
    use crate::usecases::fakes::{FakeHabitica, MemoryQuestions, MemoryRepo, date, member};
    use crate::usecases::inactive_members::InactiveMembers;
    use crate::usecases::newsletter_service::NewsletterService;
    use crate::usecases::sharing_weekend::SharingWeekendSettings;
    use chrono::{TimeZone, Utc};
    use std::sync::atomic::Ordering;

    struct Fixture {
        fake: Arc<FakeHabitica>,
        questions: Arc<MemoryQuestions>,
        run: ScheduledRun,
    }

    fn fixture() -> Fixture {
        fixture_with(Schedule {
            challenge_creation: Weekday::Tue,
            winner_award: Weekday::Fri,
        })
    }

    fn fixture_with(schedule: Schedule) -> Fixture {
        let fake = Arc::new(FakeHabitica::new("bot"));
        let repo = Arc::new(MemoryRepo::default());
        let questions = Arc::new(MemoryQuestions::default());
        fake.members.lock().unwrap().extend([
            member("bot", "partybot", date(2019, 3, 1)),
            member("admin", "Leader", date(2019, 3, 1)),
            member("u1", "alice", date(2020, 6, 1)),
        ]);

        let messenger = Arc::new(Messenger::new(fake.clone(), None));
        let inbox = Arc::new(InboxService::new(fake.clone(), repo.clone(), "bot"));
        let party_sync = Arc::new(PartySync::new(fake.clone(), repo.clone()));
        let birthdays = Arc::new(BirthdayService::new(
            repo.clone(),
            repo.clone(),
            messenger.clone(),
        ));
        let quests = Arc::new(QuestService::new(
            fake.clone(),
            repo.clone(),
            messenger.clone(),
            "bot",
        ));
        let sharing = Arc::new(SharingWeekendService::new(
            fake.clone(),
            questions.clone(),
            repo.clone(),
            SharingWeekendSettings {
                name_prefix: "Sharing Weekend".into(),
                summary: "Share".into(),
                description: "Answer".into(),
                static_tasks: Vec::new(),
                seed_weekday: Weekday::Tue,
                winner_picked_habit: None,
            },
        ));
        let dispatcher = Arc::new(CommandDispatcher::new(
            Handlers {
                inbox: inbox.clone(),
                messenger: messenger.clone(),
                members: repo.clone(),
                party_sync: party_sync.clone(),
                birthdays: birthdays.clone(),
                quests: quests.clone(),
                newsletter: Arc::new(NewsletterService::new(
                    repo.clone(),
                    messenger.clone(),
                    "bot",
                    Some("admin".into()),
                )),
                sharing: sharing.clone(),
                inactive: Arc::new(InactiveMembers::new(repo.clone(), 90, Vec::new())),
                account: Arc::new(AccountService::new(fake.clone())),
            },
            Some("admin".into()),
            Some("admin".into()),
        ));
        let run = ScheduledRun::new(
            inbox,
            dispatcher,
            party_sync,
            birthdays,
            quests,
            sharing,
            messenger,
            schedule,
            Some("admin".into()),
            Some("admin".into()),
        );
        Fixture {
            fake,
            questions,
            run,
        }
    }

    #[tokio::test]
    async fn test_run_answers_messages_and_reminds_birthdays() {
        let f = fixture();
        f.fake.inbox.lock().unwrap().push(PrivateMessage {
            id: "m1".into(),
            from_id: "u1".into(),
            to_id: "bot".into(),
            timestamp: Utc.with_ymd_and_hms(2021, 6, 1, 8, 0, 0).unwrap(),
            content: "ping".into(),
        });

        // Tuesday 2021-06-01: alice's first anniversary, creation day without questions.
        let report = f.run.run_once(date(2021, 6, 1)).await;
        assert_eq!(report.outcome("fetch-inbox"), Some(&StepOutcome::Succeeded));
        assert_eq!(report.outcome("react-to-messages"), Some(&StepOutcome::Succeeded));
        assert_eq!(report.outcome("birthday-reminders"), Some(&StepOutcome::Succeeded));
        assert_eq!(report.outcome("join-quest"), Some(&StepOutcome::Skipped));
        assert!(matches!(
            report.outcome("create-challenge"),
            Some(StepOutcome::Failed(_))
        ));
        assert_eq!(report.outcome("award-winner"), Some(&StepOutcome::Skipped));
        assert!(!report.is_failure());

        assert_eq!(f.fake.sent_to("u1"), vec!["Pong".to_string()]);
        let to_admin = f.fake.sent_to("admin");
        assert!(to_admin.iter().any(|t| t.contains("- alice Display")));
        assert!(to_admin.iter().any(|t| t.contains("No unused sharing weekend questions")));

        // Second run the same day: nothing is repeated.
        let before = f.fake.sent.lock().unwrap().len();
        let report = f.run.run_once(date(2021, 6, 1)).await;
        assert_eq!(report.outcome("birthday-reminders"), Some(&StepOutcome::Skipped));
        assert_eq!(report.outcome("create-challenge"), Some(&StepOutcome::Skipped));
        assert_eq!(f.fake.sent.lock().unwrap().len(), before);
    }

    #[tokio::test]
    async fn test_challenge_created_once_per_week() {
        let f = fixture();
        *f.questions.questions.lock().unwrap() = vec![
            Question {
                question: "Books?".into(),
                description: String::new(),
                used: false,
            },
            Question {
                question: "Films?".into(),
                description: String::new(),
                used: false,
            },
        ];

        let report = f.run.run_once(date(2021, 6, 8)).await;
        assert_eq!(report.outcome("create-challenge"), Some(&StepOutcome::Succeeded));
        f.run.run_once(date(2021, 6, 8)).await;
        assert_eq!(f.fake.created_challenges.lock().unwrap().len(), 1);
        assert!(
            f.fake
                .sent_to("admin")
                .iter()
                .any(|t| t.starts_with("A new sharing weekend challenge"))
        );

        // Not a creation day.
        let report = f.run.run_once(date(2021, 6, 9)).await;
        assert_eq!(report.outcome("create-challenge"), Some(&StepOutcome::Skipped));
    }

    /// Last week's challenge with alice as its only completer.
    fn with_completed_challenge(f: &Fixture) {
        f.fake.challenges.lock().unwrap().push(Challenge {
            id: "ch-1".into(),
            name: "Sharing Weekend 2021-06-05".into(),
            short_name: "SW 2021-06-05".into(),
            group_id: "party-1".into(),
            created_at: Some(Utc.with_ymd_and_hms(2021, 6, 1, 8, 0, 0).unwrap()),
        });
        f.fake.challenge_members.lock().unwrap().push(ChallengeMember {
            id: "u1".into(),
            display_name: "Alice".into(),
            login_name: "alice".into(),
        });
        f.fake.progress.lock().unwrap().insert(
            "u1".into(),
            vec![Task {
                id: "t".into(),
                text: "Books?".into(),
                task_type: TaskType::Todo,
                notes: String::new(),
                completed: true,
            }],
        );
    }

    #[tokio::test]
    async fn test_winner_awarded_on_award_day() {
        let f = fixture();
        with_completed_challenge(&f);

        // Friday 2021-06-11.
        let report = f.run.run_once(date(2021, 6, 11)).await;
        assert_eq!(report.outcome("award-winner"), Some(&StepOutcome::Succeeded));
        f.run.run_once(date(2021, 6, 11)).await;
        assert_eq!(
            *f.fake.winners.lock().unwrap(),
            vec![("ch-1".to_string(), "u1".to_string())]
        );
        assert!(
            f.fake
                .sent_to("admin")
                .iter()
                .any(|t| t.contains("the lucky winner of Sharing Weekend 2021-06-05"))
        );
    }

    #[tokio::test]
    async fn test_default_schedule_awards_before_creating() {
        let cfg = AppConfig::default();
        let f = fixture_with(Schedule {
            challenge_creation: cfg.challenge_creation_weekday_or_default(),
            winner_award: cfg.winner_award_weekday_or_default(),
        });
        with_completed_challenge(&f);
        *f.questions.questions.lock().unwrap() = vec![Question {
            question: "Books?".into(),
            description: String::new(),
            used: false,
        }];

        // Tuesday 2021-06-08: award last weekend's challenge, then create the next.
        let report = f.run.run_once(date(2021, 6, 8)).await;
        assert_eq!(report.outcome("award-winner"), Some(&StepOutcome::Succeeded));
        assert_eq!(report.outcome("create-challenge"), Some(&StepOutcome::Succeeded));
        assert_eq!(
            *f.fake.winners.lock().unwrap(),
            vec![("ch-1".to_string(), "u1".to_string())]
        );
        assert_eq!(
            f.fake.created_challenges.lock().unwrap()[0].name,
            "Sharing Weekend 2021-06-12"
        );
        let to_admin = f.fake.sent_to("admin");
        assert!(
            to_admin
                .iter()
                .any(|t| t.contains("the lucky winner of Sharing Weekend 2021-06-05"))
        );

        // Later the same day the new challenge is not awarded.
        let report = f.run.run_once(date(2021, 6, 8)).await;
        assert_eq!(report.outcome("award-winner"), Some(&StepOutcome::Skipped));
        assert_eq!(report.outcome("create-challenge"), Some(&StepOutcome::Skipped));
        assert_eq!(f.fake.winners.lock().unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_offline_run_is_a_failure() {
        let f = fixture();
        f.fake.offline.store(true, Ordering::SeqCst);
        let report = f.run.run_once(date(2021, 6, 2)).await;
        assert!(report.is_failure());
        assert!(matches!(
            report.outcome("fetch-inbox"),
            Some(StepOutcome::Failed(_))
        ));
    }

    #[tokio::test]
    async fn test_watch_gives_up_after_consecutive_failures() {
        let f = fixture();
        f.fake.offline.store(true, Ordering::SeqCst);
        let result = f.run.watch(Duration::from_millis(1), 2).await;
        assert!(matches!(result, Err(DomainError::GaveUp { runs: 2 })));
    }
}
