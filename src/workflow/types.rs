use crate::agent::prompt::retry_notice;
use crate::agent::GeneratedChange;

/// Upper bound on draft/apply rounds for one run.
pub const MAX_PATCH_ATTEMPTS: u32 = 2;

/// One draft/apply round. Each failed round produces the next record
/// rather than mutating this one.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Attempt {
    pub number: u32,
    /// Apply diagnostics from the previous round, fed back to the model.
    pub prior_error: Option<String>,
}

impl Attempt {
    pub fn first() -> Self {
        Self {
            number: 1,
            prior_error: None,
        }
    }

    /// The follow-up round after a failed apply, or `None` when the budget
    /// is spent.
    pub fn next(&self, apply_error: &str) -> Option<Self> {
        if self.number >= MAX_PATCH_ATTEMPTS {
            return None;
        }
        Some(Self {
            number: self.number + 1,
            prior_error: Some(apply_error.to_string()),
        })
    }

    pub fn user_prompt(&self, base_prompt: &str) -> String {
        match self.prior_error.as_deref() {
            Some(error) if !error.is_empty() => format!("{base_prompt}{}", retry_notice(error)),
            _ => base_prompt.to_string(),
        }
    }
}

/// How the draft/apply loop ended, short of a fatal error.
#[derive(Debug)]
pub enum PatchOutcome {
    /// The patch passed the dry run and was applied.
    Applied(GeneratedChange),
    /// The model declined to change anything.
    Empty(GeneratedChange),
}
