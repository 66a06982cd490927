//! Question store outbound port. Weekly Sharing Weekend questions.

use crate::domain::{DomainError, Question};

/// Port for the list of weekly questions.
///
/// The list is small and rewritten whole; order is the order questions are used in.
#[async_trait::async_trait]
pub trait QuestionStore: Send + Sync {
    /// Load every question, used or not.
    ///
    /// # Errors
    /// Returns `DomainError::Questions` if the store exists but cannot be parsed.
    async fn load(&self) -> Result<Vec<Question>, DomainError>;

    /// Replace the stored list.
    async fn save(&self, questions: &[Question]) -> Result<(), DomainError>;
}
