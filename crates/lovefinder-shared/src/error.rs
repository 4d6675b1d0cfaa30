use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum AuthError {
    #[error("Invalid email address")]
    InvalidEmail,

    #[error("Password must be at least {min} characters")]
    WeakPassword { min: usize },

    #[error("Email already in use")]
    EmailAlreadyInUse,

    #[error("Invalid credentials")]
    InvalidCredentials,

    #[error("No principal is signed in")]
    NotSignedIn,

    #[error("Identity backend error: {0}")]
    Backend(String),
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum IdError {
    #[error("Identifier is empty")]
    Empty,

    #[error("Identifier contains a forbidden character: {0:?}")]
    ForbiddenChar(char),

    #[error("Malformed chat id: {0}")]
    MalformedChatId(String),

    #[error("A chat needs two distinct participants")]
    SameParticipant,
}

/// A form or profile section failed validation. Each variant carries the
/// field (or item index) at fault so the UI can point at it.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ValidationError {
    #[error("Field is required: {0}")]
    Required(&'static str),

    #[error("Invalid email address")]
    InvalidEmail,

    #[error("Password must be at least {min} characters")]
    PasswordTooShort { min: usize },

    #[error("Passwords do not match")]
    PasswordMismatch,

    #[error("Profile item {index} is empty")]
    EmptyItem { index: usize },

    #[error("Birthdate must read `day month year`: {0}")]
    InvalidBirthdate(String),
}
