use thiserror::Error;

/// Rejections of user actions on restricted apps and the passcode
#[derive(Debug, Error)]
pub enum ActionError {
    /// A passcode is configured but none was given
    #[error("A passcode is required for this action")]
    PasscodeRequired,

    #[error("Incorrect passcode")]
    IncorrectPasscode,

    /// Usage limit input that is not a non-negative whole number of minutes
    #[error("Invalid usage limit '{0}': enter a whole number of minutes")]
    InvalidLimit(String),

    #[error("New passcode and confirmation do not match")]
    PasscodeMismatch,

    #[error("New passcode and confirmation cannot be empty")]
    EmptyPasscode,

    #[error("Current passcode is incorrect")]
    CurrentPasscodeIncorrect,

    #[error("No app is currently blocked")]
    NotBlocked,

    #[error(transparent)]
    Store(#[from] anyhow::Error),
}

impl ActionError {
    /// Whether the user can simply try again with different input
    pub fn is_retryable(&self) -> bool {
        !matches!(self, ActionError::Store(_))
    }
}
