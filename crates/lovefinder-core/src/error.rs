use lovefinder_shared::{AuthError, ChatId, IdError, PrincipalId, ValidationError};
use lovefinder_store::StoreError;
use thiserror::Error;

/// Errors surfaced by the client protocol.
#[derive(Error, Debug)]
pub enum ClientError {
    #[error("No principal is signed in")]
    NotSignedIn,

    #[error("A principal cannot like or skip themselves")]
    SelfInteraction,

    #[error("{principal} is not a participant of chat {chat}")]
    NotParticipant { chat: ChatId, principal: PrincipalId },

    #[error("{principal} has no match with {partner}")]
    NotMatched {
        principal: PrincipalId,
        partner: PrincipalId,
    },

    #[error("Message not found: {0}")]
    MessageNotFound(String),

    #[error("Message is empty")]
    EmptyMessage,

    #[error("Gallery is full (max {max} images)")]
    GalleryFull { max: usize },

    #[error("No gallery image at index {0}")]
    NoSuchImage(usize),

    #[error("Re-authentication failed")]
    ReauthenticationFailed,

    /// The principal's account was deleted (or its deletion just finished).
    #[error("Account has been deleted")]
    AccountDeleted,

    #[error("Invalid input: {0:?}")]
    Validation(Vec<ValidationError>),

    #[error(transparent)]
    Auth(#[from] AuthError),

    #[error(transparent)]
    Id(#[from] IdError),

    #[error(transparent)]
    Store(#[from] StoreError),
}

impl From<ValidationError> for ClientError {
    fn from(e: ValidationError) -> Self {
        ClientError::Validation(vec![e])
    }
}

impl From<serde_json::Error> for ClientError {
    fn from(e: serde_json::Error) -> Self {
        ClientError::Store(StoreError::Serialization(e))
    }
}

impl ClientError {
    /// Text shown to the user in the UI.
    pub fn user_message(&self) -> String {
        match self {
            ClientError::NotSignedIn | ClientError::Auth(AuthError::NotSignedIn) => {
                "Du måste vara inloggad.".into()
            }
            ClientError::SelfInteraction => "Du kan inte gilla dig själv.".into(),
            ClientError::NotParticipant { .. } => "Du är inte med i den här chatten.".into(),
            ClientError::NotMatched { .. } => "Ni har ingen match ännu.".into(),
            ClientError::MessageNotFound(_) => "Meddelandet finns inte längre.".into(),
            ClientError::EmptyMessage => "Meddelandet är tomt.".into(),
            ClientError::GalleryFull { max } => format!("Du kan ha högst {max} bilder."),
            ClientError::NoSuchImage(_) => "Bilden finns inte.".into(),
            ClientError::ReauthenticationFailed => "Fel lösenord, kontot togs inte bort.".into(),
            ClientError::AccountDeleted => "Kontot har tagits bort.".into(),
            ClientError::Validation(errors) => errors
                .iter()
                .map(validation_message)
                .collect::<Vec<_>>()
                .join(" "),
            ClientError::Auth(e) => auth_message(e),
            ClientError::Id(_) => "Ogiltigt användar-id.".into(),
            ClientError::Store(StoreError::FileTooLarge { max, .. }) => {
                format!("Filen är för stor (max {} MB).", max / (1024 * 1024))
            }
            ClientError::Store(StoreError::EmptyFile) => "Filen är tom.".into(),
            ClientError::Store(_) => "Något gick fel, försök igen.".into(),
        }
    }
}

fn auth_message(e: &AuthError) -> String {
    match e {
        AuthError::InvalidEmail => "Ogiltig e-postadress.".into(),
        AuthError::WeakPassword { min } => {
            format!("Lösenordet måste vara minst {min} tecken.")
        }
        AuthError::EmailAlreadyInUse => "E-postadressen används redan.".into(),
        AuthError::InvalidCredentials => "Fel e-post eller lösenord.".into(),
        AuthError::NotSignedIn => "Du måste vara inloggad.".into(),
        AuthError::Backend(_) => "Inloggningen misslyckades, försök igen.".into(),
    }
}

fn validation_message(e: &ValidationError) -> String {
    match e {
        ValidationError::Required("firstName") => "Förnamn krävs.".into(),
        ValidationError::Required("lastName") => "Efternamn krävs.".into(),
        ValidationError::Required(_) => "Fältet krävs.".into(),
        ValidationError::InvalidEmail => "Ogiltig e-postadress.".into(),
        ValidationError::PasswordTooShort { min } => {
            format!("Lösenordet måste vara minst {min} tecken.")
        }
        ValidationError::PasswordMismatch => "Lösenorden matchar inte.".into(),
        ValidationError::EmptyItem { .. } => "Fyll i alla fält.".into(),
        ValidationError::InvalidBirthdate(_) => {
            "Födelsedagen ska skrivas som t.ex. 14 februari 1990.".into()
        }
    }
}

/// Convenience alias used throughout the crate.
pub type Result<T> = std::result::Result<T, ClientError>;
