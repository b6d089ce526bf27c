use std::fmt;

use rocket_db_pools::deadpool_redis::redis::RedisError;
use thiserror::Error;
use uuid::Uuid;

/// Problems with what a guest entered. Guest numbers are one-based, as
/// shown on the page.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum FormError {
    #[error("Please enter a name for guest {guest}")]
    MissingName { guest: usize },

    #[error("The name of guest {guest} must be between 2 and 100 characters")]
    NameLength { guest: usize },

    #[error("Please enter an age for guest {guest}")]
    MissingAge { guest: usize },

    #[error("The age of guest {guest} must be between 0 and 120")]
    AgeOutOfRange { guest: usize },

    #[error("The name of guest {guest} cannot be changed")]
    NameLocked { guest: usize },

    #[error("Please choose a theme for guest {guest}")]
    MissingTheme { guest: usize },

    #[error("Please choose a Hogwarts house for guest {guest}")]
    MissingHouse { guest: usize },

    #[error("Please choose Jedi or Sith for guest {guest}")]
    MissingSide { guest: usize },

    #[error("Attendance can no longer be confirmed after {deadline}")]
    DeadlinePassed { deadline: String },

    #[error("There is no guest {guest} on this invitation")]
    UnknownGuest { guest: usize },

    #[error("Guest {guest} is not the guest being edited")]
    NotCurrentGuest { guest: usize },

    #[error("That change is not possible on this step")]
    WrongStep,

    #[error("Please review your answers before sending them")]
    NotConfirming,

    #[error("This invitation has already been answered")]
    AlreadySubmitted,
}

/// The three dependent writes of a submission.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SaveStage {
    Guests,
    Preferences,
    Invitation,
}

impl fmt::Display for SaveStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let stage = match self {
            SaveStage::Guests => "guests",
            SaveStage::Preferences => "preferences",
            SaveStage::Invitation => "invitation status",
        };
        f.write_str(stage)
    }
}

#[derive(Debug, Error)]
pub enum Error {
    #[error("Database error: {0}")]
    Database(#[from] diesel::result::Error),

    #[error("Session store error: {0}")]
    Session(#[from] RedisError),

    #[error("Serialization error: {0}")]
    Json(#[from] serde_json::Error),

    #[error(transparent)]
    Form(#[from] FormError),

    /// A submission stopped part way; earlier stages stay written.
    #[error("Saving {stage} failed: {source}")]
    Save {
        stage: SaveStage,
        #[source]
        source: diesel::result::Error,
    },

    #[error("Invitation {0} not found")]
    InvitationNotFound(Uuid),

    #[error("Guest {0} not found on this invitation")]
    GuestNotFound(Uuid),
}

impl Error {
    /// Text safe to show a guest in a flash message.
    pub fn user_message(&self) -> String {
        match self {
            Error::Form(e) => e.to_string(),
            Error::GuestNotFound(_) => "That guest is not on this invitation".to_string(),
            _ => "Something went wrong while saving. Please try again.".to_string(),
        }
    }
}

pub type Result<T, E = Error> = std::result::Result<T, E>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn form_errors_keep_their_message_for_guests() {
        let err = Error::from(FormError::MissingHouse { guest: 2 });
        assert_eq!(err.user_message(), "Please choose a Hogwarts house for guest 2");
    }

    #[test]
    fn remote_errors_get_a_generic_message() {
        let err = Error::Save {
            stage: SaveStage::Preferences,
            source: diesel::result::Error::NotFound,
        };
        assert_eq!(err.to_string(), "Saving preferences failed: Record not found");
        assert_eq!(
            err.user_message(),
            "Something went wrong while saving. Please try again."
        );
    }
}
