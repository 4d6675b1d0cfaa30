//! # lovefinder-shared
//!
//! Types shared by the store and the client protocol: principal and chat
//! identifiers, collection names, profile-section helpers and the error
//! enums surfaced to the UI layer.

pub mod constants;
pub mod error;
pub mod profile;
pub mod types;
pub mod validation;

pub use error::{AuthError, IdError, ValidationError};
pub use types::{ChatId, PrincipalId};
