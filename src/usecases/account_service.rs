//! The bot's own account: its tasks and its wallet.

use crate::domain::{DomainError, ScoreDirection, TaskDraft, TaskType};
use crate::ports::HabiticaGateway;
use std::sync::Arc;
use tracing::{debug, info};

const ADD_TASK_USAGE: &str = "```\nadd-task [task_type]: [task name]\n\n[task description (optional)]\n```";

/// Score the bot's task of `task_type` whose text contains `text` (case-insensitive).
///
/// An exact text match wins over substring matches.
pub async fn tick_task(
    habitica: &dyn HabiticaGateway,
    text: &str,
    task_type: TaskType,
) -> Result<(), DomainError> {
    let needle = text.to_lowercase();
    let tasks = habitica.get_tasks(Some(task_type)).await?;
    let matching: Vec<_> = tasks
        .iter()
        .filter(|t| t.text.to_lowercase().contains(&needle))
        .collect();

    let task = match matching.as_slice() {
        [] => {
            return Err(DomainError::NotFound(format!(
                "no {} matching `{}`",
                task_type, text
            )));
        }
        [only] => *only,
        many => match many.iter().find(|t| t.text.eq_ignore_ascii_case(text)) {
            Some(exact) => *exact,
            None => {
                return Err(DomainError::Ambiguous(format!(
                    "{} {}s match `{}`",
                    many.len(),
                    task_type,
                    text
                )));
            }
        },
    };

    habitica.score_task(&task.id, ScoreDirection::Up).await?;
    debug!(task = %task.text, "ticked task");
    Ok(())
}

/// Parse `<type>: <text>\n<notes>` from an `add-task` command body.
pub fn parse_task_draft(body: &str) -> Result<TaskDraft, DomainError> {
    let Some((type_part, rest)) = body.split_once(':') else {
        return Err(DomainError::Validation(format!(
            "Task type missing from the command, no new tasks added. Usage:\n\n{}",
            ADD_TASK_USAGE
        )));
    };
    let task_type: TaskType = type_part.parse().map_err(DomainError::Validation)?;

    let (text, notes) = match rest.split_once('\n') {
        Some((text, notes)) => (text.trim(), Some(notes.trim()).filter(|n| !n.is_empty())),
        None => (rest.trim(), None),
    };
    if text.is_empty() {
        return Err(DomainError::Validation(format!(
            "Task name missing from the command, no new tasks added. Usage:\n\n{}",
            ADD_TASK_USAGE
        )));
    }

    Ok(TaskDraft {
        text: text.to_string(),
        task_type,
        notes: notes.map(String::from),
    })
}

/// Bot account operations behind the `add-task` and `gem-balance` commands.
pub struct AccountService {
    habitica: Arc<dyn HabiticaGateway>,
}

impl AccountService {
    pub fn new(habitica: Arc<dyn HabiticaGateway>) -> Self {
        Self { habitica }
    }

    /// Create the task described by an `add-task` body and describe it back.
    pub async fn add_task(&self, body: &str) -> Result<String, DomainError> {
        let draft = parse_task_draft(body)?;
        let created = self.habitica.create_user_task(&draft).await?;
        info!(id = %created.id, task_type = %draft.task_type, "added task for the bot");
        Ok(format!(
            "Added a new task with the following properties:\n\n```\ntype: {}\ntext: {}\nnotes: {}\n```",
            draft.task_type,
            draft.text,
            draft.notes.as_deref().unwrap_or("")
        ))
    }

    pub async fn gem_balance(&self) -> Result<String, DomainError> {
        let profile = self.habitica.get_user().await?;
        Ok(format!("I have {} gems", profile.gems))
    }

    pub async fn tick_task(&self, text: &str, task_type: TaskType) -> Result<(), DomainError> {
        tick_task(self.habitica.as_ref(), text, task_type).await
    }
}
