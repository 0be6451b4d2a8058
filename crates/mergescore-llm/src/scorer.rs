//! The scoring capability

use crate::error::ScoringError;
use crate::rubric::Prompt;
use crate::score::ScoreRecord;

/// A validated score together with the raw reply it came from
#[derive(Debug, Clone, PartialEq)]
pub struct Scored {
    /// Parsed record
    pub record: ScoreRecord,
    /// Reply text exactly as returned by the service
    pub raw: String,
}

/// Something that can score a merge prompt
///
/// Implementors only provide [`Scorer::complete`]; validation is shared.
pub trait Scorer {
    /// Model identifier; part of every cache key and result row
    fn model(&self) -> &str;

    /// Send `prompt` and return the raw reply text
    ///
    /// # Errors
    ///
    /// Returns a `ScoringError` describing why no reply was obtained.
    fn complete(&self, prompt: &Prompt) -> Result<String, ScoringError>;

    /// Send `prompt` and validate the reply
    ///
    /// # Errors
    ///
    /// Returns the error from [`Scorer::complete`], or `ScoringError::Malformed`
    /// when the reply is not a valid score record.
    fn score(&self, prompt: &Prompt) -> Result<Scored, ScoringError> {
        let raw = self.complete(prompt)?;
        let record = ScoreRecord::from_response(&raw)?;
        Ok(Scored { record, raw })
    }
}

impl<S: Scorer + ?Sized> Scorer for &S {
    fn model(&self) -> &str {
        (**self).model()
    }

    fn complete(&self, prompt: &Prompt) -> Result<String, ScoringError> {
        (**self).complete(prompt)
    }
}

impl<S: Scorer + ?Sized> Scorer for Box<S> {
    fn model(&self) -> &str {
        (**self).model()
    }

    fn complete(&self, prompt: &Prompt) -> Result<String, ScoringError> {
        (**self).complete(prompt)
    }
}
