//! Sharing Weekend: the party's weekly challenge.
//!
//! Creation -> participants complete the todos -> a winner is drawn.
//! The draw uses a PRNG seeded from the challenge id and the most recent
//! seed weekday, so repeating it during the same week gives the same winner.

use crate::domain::calendar::{last_weekday, next_weekday};
use crate::domain::{
    Challenge, ChallengeDraft, ChallengeMember, DomainError, EventKind, Question, TaskDraft,
    TaskType,
};
use crate::ports::{EventLog, HabiticaGateway, QuestionStore};
use crate::usecases::account_service::tick_task;
use chrono::{NaiveDate, Weekday};
use rand::SeedableRng;
use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use std::sync::Arc;
use tracing::{debug, info, warn};

const CHALLENGE_URL: &str = "https://habitica.com/challenges/";

/// Event log subject for weekly challenge creation.
const CREATION_SUBJECT: &str = "sharing-weekend";

/// Challenge texts and schedule.
#[derive(Debug, Clone)]
pub struct SharingWeekendSettings {
    /// Challenge names are `"<prefix> <YYYY-MM-DD>"`.
    pub name_prefix: String,
    pub summary: String,
    pub description: String,
    /// Tasks added to every challenge before the weekly question.
    pub static_tasks: Vec<TaskDraft>,
    pub seed_weekday: Weekday,
    pub winner_picked_habit: Option<String>,
}

/// FNV-1a over `challenge_id:date`.
pub fn draw_seed(challenge_id: &str, date: NaiveDate) -> u64 {
    const OFFSET: u64 = 0xcbf2_9ce4_8422_2325;
    const PRIME: u64 = 0x0000_0100_0000_01b3;
    format!("{}:{}", challenge_id, date)
        .bytes()
        .fold(OFFSET, |hash, b| (hash ^ u64::from(b)).wrapping_mul(PRIME))
}

/// `"Sharing Weekend"` -> `"SW"`.
fn initials(prefix: &str) -> String {
    prefix
        .split_whitespace()
        .filter_map(|w| w.chars().next())
        .flat_map(char::to_uppercase)
        .collect()
}

/// Split an `add-new-question` body into question (first line) and description.
pub fn parse_question(body: &str) -> Result<Question, DomainError> {
    let body = body.trim();
    let (question, description) = body.split_once('\n').unwrap_or((body, ""));
    let question = question.trim();
    if question.is_empty() {
        return Err(DomainError::Validation(
            "The question is missing: write it on the first line after the command.".into(),
        ));
    }
    Ok(Question {
        question: question.to_string(),
        description: description.trim().to_string(),
        used: false,
    })
}

fn unused_questions_message(count: usize) -> String {
    if count == 1 {
        "There is 1 unused sharing weekend question".to_string()
    } else {
        format!("There are {} unused sharing weekend questions", count)
    }
}

fn challenge_url(challenge: &Challenge) -> String {
    format!("{}{}", CHALLENGE_URL, challenge.id)
}

pub struct SharingWeekendService {
    habitica: Arc<dyn HabiticaGateway>,
    questions: Arc<dyn QuestionStore>,
    events: Arc<dyn EventLog>,
    settings: SharingWeekendSettings,
}

impl SharingWeekendService {
    pub fn new(
        habitica: Arc<dyn HabiticaGateway>,
        questions: Arc<dyn QuestionStore>,
        events: Arc<dyn EventLog>,
        settings: SharingWeekendSettings,
    ) -> Self {
        Self {
            habitica,
            questions,
            events,
            settings,
        }
    }

    /// The weekend a challenge created on `today` belongs to.
    pub fn weekend_of(today: NaiveDate) -> NaiveDate {
        next_weekday(today, Weekday::Sat)
    }

    /// True unless a challenge for the weekend of `today` was already created
    /// (or its creation given up on).
    pub async fn creation_due(&self, today: NaiveDate) -> Result<bool, DomainError> {
        let handled = self
            .events
            .is_handled(
                EventKind::ChallengeCreated,
                CREATION_SUBJECT,
                Self::weekend_of(today),
            )
            .await?;
        Ok(!handled)
    }

    /// Record the weekend of `today` as done without creating a challenge.
    pub async fn skip_creation(&self, today: NaiveDate) -> Result<(), DomainError> {
        self.events
            .mark_handled(
                EventKind::ChallengeCreated,
                CREATION_SUBJECT,
                Self::weekend_of(today),
            )
            .await
    }

    /// Name of the challenge for the weekend starting on `weekend`.
    pub fn challenge_name(&self, weekend: NaiveDate) -> String {
        format!("{} {}", self.settings.name_prefix, weekend.format("%Y-%m-%d"))
    }

    /// Create the challenge for the coming weekend with the static tasks and
    /// the first unused question, then mark that question used.
    ///
    /// The weekend counts as handled as soon as the challenge exists, so a
    /// failure while adding tasks never leads to a second challenge.
    pub async fn create_next(&self, today: NaiveDate) -> Result<Challenge, DomainError> {
        let mut questions = self.questions.load().await?;
        let Some(index) = questions.iter().position(|q| !q.used) else {
            return Err(DomainError::Validation(
                "No unused sharing weekend questions left. Add some with `add-new-question`."
                    .into(),
            ));
        };

        let party = self.habitica.get_party().await?;
        let weekend = Self::weekend_of(today);
        let name = self.challenge_name(weekend);
        if self
            .habitica
            .get_group_challenges(&party.id)
            .await?
            .iter()
            .any(|c| c.name == name)
        {
            self.skip_creation(today).await?;
            return Err(DomainError::Validation(format!(
                "The challenge {} already exists.",
                name
            )));
        }

        let draft = ChallengeDraft {
            group: party.id,
            name,
            short_name: format!(
                "{} {}",
                initials(&self.settings.name_prefix),
                weekend.format("%Y-%m-%d")
            ),
            summary: self.settings.summary.clone(),
            description: self.settings.description.clone(),
            prize: 0,
        };
        let challenge = self.habitica.create_challenge(&draft).await?;
        info!(id = %challenge.id, name = %challenge.name, "created sharing weekend challenge");
        self.skip_creation(today).await?;

        if let Err(e) = self.add_tasks(&challenge, &questions[index]).await {
            warn!(id = %challenge.id, error = %e, "challenge left without all of its tasks");
            return Err(DomainError::IncompleteChallenge {
                url: challenge_url(&challenge),
                cause: e.to_string(),
            });
        }

        questions[index].used = true;
        self.questions.save(&questions).await?;
        Ok(challenge)
    }

    async fn add_tasks(&self, challenge: &Challenge, question: &Question) -> Result<(), DomainError> {
        for task in &self.settings.static_tasks {
            self.habitica
                .create_challenge_task(&challenge.id, task)
                .await?;
        }
        self.habitica
            .create_challenge_task(&challenge.id, &question.to_task())
            .await?;
        debug!(
            question = %question.question,
            static_tasks = self.settings.static_tasks.len(),
            "added challenge tasks"
        );
        Ok(())
    }

    /// `create_next` with the reply text for a chat command.
    pub async fn create_next_message(&self, today: NaiveDate) -> Result<String, DomainError> {
        let url = challenge_url(&self.create_next(today).await?);
        Ok(format!(
            "A new sharing weekend challenge is available for joining: [{}]({})",
            url, url
        ))
    }

    /// The challenge whose winner is drawn on `today`: the newest party
    /// challenge named with the configured prefix, skipping the one for a
    /// weekend that has not started yet.
    pub async fn award_candidate(&self, today: NaiveDate) -> Result<Challenge, DomainError> {
        let upcoming = self.challenge_name(Self::weekend_of(today));
        let party = self.habitica.get_party().await?;
        self.habitica
            .get_group_challenges(&party.id)
            .await?
            .into_iter()
            .filter(|c| c.name != upcoming)
            .find(|c| c.name.starts_with(&self.settings.name_prefix))
            .ok_or_else(|| {
                DomainError::NotFound(format!(
                    "no `{}` challenge to award in party {}",
                    self.settings.name_prefix, party.name
                ))
            })
    }

    /// Participants who completed every challenge todo, ordered by id.
    pub async fn completers(
        &self,
        challenge: &Challenge,
    ) -> Result<Vec<ChallengeMember>, DomainError> {
        let mut completers = Vec::new();
        for member in self.habitica.get_challenge_members(&challenge.id).await? {
            let tasks = self
                .habitica
                .get_member_challenge_tasks(&challenge.id, &member.id)
                .await?;
            let mut todos = tasks
                .iter()
                .filter(|t| t.task_type == TaskType::Todo)
                .peekable();
            if todos.peek().is_some() && todos.all(|t| t.completed) {
                completers.push(member);
            }
        }
        completers.sort_by(|a, b| a.id.cmp(&b.id));
        Ok(completers)
    }

    /// Seed date and winner for `challenge` as drawn on `today`.
    pub fn draw_winner(
        &self,
        challenge: &Challenge,
        completers: &[ChallengeMember],
        today: NaiveDate,
    ) -> (NaiveDate, Option<ChallengeMember>) {
        let seed_date = last_weekday(today, self.settings.seed_weekday);
        let mut rng = StdRng::seed_from_u64(draw_seed(&challenge.id, seed_date));
        (seed_date, completers.choose(&mut rng).cloned())
    }

    /// Completer list and the drawn winner of the challenge to award.
    /// Ticks the "winner picked" habit when one is configured.
    pub async fn winner_message(&self, today: NaiveDate) -> Result<String, DomainError> {
        let challenge = self.award_candidate(today).await?;
        let completers = self.completers(&challenge).await?;

        let mut response = if completers.is_empty() {
            format!("Nobody completed all tasks of {}.", challenge.name)
        } else {
            let names: Vec<String> = completers.iter().map(|m| format!("- {}", m)).collect();
            format!(
                "The following participants completed all tasks of {}:\n{}",
                challenge.name,
                names.join("\n")
            )
        };
        match self.draw_winner(&challenge, &completers, today) {
            (seed_date, Some(winner)) => response.push_str(&format!(
                "\n\nThe winner, drawn with the seed date {}, is {}!",
                seed_date, winner
            )),
            (_, None) => {
                response.push_str("\n\nNobody completed the challenge, so winner cannot be chosen.")
            }
        }

        if let Some(habit) = &self.settings.winner_picked_habit {
            if let Err(e) = tick_task(self.habitica.as_ref(), habit, TaskType::Habit).await {
                warn!(habit = %habit, error = %e, "could not tick winner picked habit");
            }
        }
        Ok(response)
    }

    /// True if there is a challenge to award whose winner has not been
    /// handled during the draw week of `today`.
    pub async fn award_due(&self, today: NaiveDate) -> Result<bool, DomainError> {
        let challenge = match self.award_candidate(today).await {
            Ok(c) => c,
            Err(DomainError::NotFound(_)) => return Ok(false),
            Err(e) => return Err(e),
        };
        let seed_date = last_weekday(today, self.settings.seed_weekday);
        let handled = self
            .events
            .is_handled(EventKind::WinnerAwarded, &challenge.id, seed_date)
            .await?;
        Ok(!handled)
    }

    /// Draw the winner of the challenge to award and end it with that winner.
    ///
    /// Each challenge is handled once per draw week; a challenge nobody
    /// completed counts as handled too. A challenge for a weekend that has
    /// not started yet is never awarded.
    pub async fn award_winner(&self, today: NaiveDate) -> Result<String, DomainError> {
        let challenge = self.award_candidate(today).await?;
        let completers = self.completers(&challenge).await?;
        let (seed_date, winner) = self.draw_winner(&challenge, &completers, today);
        if self
            .events
            .is_handled(EventKind::WinnerAwarded, &challenge.id, seed_date)
            .await?
        {
            return Err(DomainError::Validation(format!(
                "The winner of {} has already been handled this week.",
                challenge.name
            )));
        }
        let Some(winner) = winner else {
            self.events
                .mark_handled(EventKind::WinnerAwarded, &challenge.id, seed_date)
                .await?;
            return Err(DomainError::Validation(format!(
                "Nobody completed {}, so no winner can be awarded.",
                challenge.name
            )));
        };
        self.habitica
            .select_challenge_winner(&challenge.id, &winner.id)
            .await?;
        self.events
            .mark_handled(EventKind::WinnerAwarded, &challenge.id, seed_date)
            .await?;
        info!(challenge = %challenge.name, winner = %winner, "awarded challenge winner");
        Ok(format!(
            "Congratulations are in order for {}, the lucky winner of {}!",
            winner, challenge.name
        ))
    }

    pub async fn count_unused_questions(&self) -> Result<usize, DomainError> {
        Ok(self
            .questions
            .load()
            .await?
            .iter()
            .filter(|q| !q.used)
            .count())
    }

    pub async fn count_unused_questions_message(&self) -> Result<String, DomainError> {
        Ok(unused_questions_message(
            self.count_unused_questions().await?,
        ))
    }

    /// Append the question in an `add-new-question` body to the list.
    pub async fn add_question(&self, body: &str) -> Result<String, DomainError> {
        let question = parse_question(body)?;
        let mut questions = self.questions.load().await?;
        if questions
            .iter()
            .any(|q| q.question.eq_ignore_ascii_case(&question.question))
        {
            return Err(DomainError::Validation(format!(
                "The question `{}` is already in the list.",
                question.question
            )));
        }
        let text = question.question.clone();
        questions.push(question);
        self.questions.save(&questions).await?;

        let unused = questions.iter().filter(|q| !q.used).count();
        info!(question = %text, unused, "added sharing weekend question");
        Ok(format!(
            "Added a new sharing weekend question: {}\n\n{}",
            text,
            unused_questions_message(unused)
        ))
    }
}
