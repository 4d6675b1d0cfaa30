//! Registration and sign-in.

use lovefinder_shared::profile::default_birthday_section;
use lovefinder_shared::validation::RegistrationForm;
use lovefinder_shared::PrincipalId;
use lovefinder_store::{DocumentStore, Fields, FileStore, IdentityProvider, SetOptions, WriteBatch};
use serde_json::json;
use tracing::{info, warn};

use crate::eradication;
use crate::error::{ClientError, Result};
use crate::paths;

/// Validate the form, create the account and write the new principal's
/// profile and directory entry. The new principal is signed in afterwards.
pub async fn register(
    docs: &dyn DocumentStore,
    identity: &dyn IdentityProvider,
    form: &RegistrationForm,
) -> Result<PrincipalId> {
    let errors = form.validate();
    if !errors.is_empty() {
        return Err(ClientError::Validation(errors));
    }

    let display_name = form.display_name();
    let email = form.email.trim();
    let uid = identity.sign_up(email, &form.password, &display_name).await?;

    let batch = WriteBatch::new()
        .set(
            paths::user(&uid)?,
            Fields::new()
                .value("displayName", display_name.as_str())
                .value("email", email)
                .server_timestamp("createdAt")
                .value("birthdaySection", serde_json::to_value(default_birthday_section())?)
                .value("multipleQuestions", json!([]))
                .value("mainInfo", json!([]))
                .value("images", json!([])),
            SetOptions::merge(),
        )
        .set(
            paths::directory_entry(&uid)?,
            Fields::new()
                .value("displayName", display_name.as_str())
                .server_timestamp("createdAt"),
            SetOptions::replace(),
        );
    docs.commit(batch).await?;

    info!(principal = %uid.short(), "Principal registered");
    Ok(uid)
}

/// Sign in. A principal whose account deletion was interrupted gets it
/// finished instead, and the call answers `AccountDeleted`.
pub async fn login(
    docs: &dyn DocumentStore,
    files: &dyn FileStore,
    identity: &dyn IdentityProvider,
    email: &str,
    password: &str,
) -> Result<PrincipalId> {
    let uid = identity.sign_in(email, password).await?;

    if let Some(step) = eradication::pending_step(docs, &uid).await? {
        warn!(principal = %uid.short(), step = %step, "Unfinished account deletion, resuming");
        let report = eradication::resume(docs, files, identity).await?;
        if !report.finished() {
            // The identity could not be removed; do not leave a session on a
            // half-deleted account.
            identity.sign_out().await?;
        }
        return Err(ClientError::AccountDeleted);
    }

    info!(principal = %uid.short(), "Signed in");
    Ok(uid)
}

#[cfg(test)]
mod tests {
    use super::*;
    use lovefinder_shared::AuthError;
    use lovefinder_store::{DocumentIdentityProvider, MemoryDocumentStore, MemoryFileStore};
    use std::sync::Arc;

    fn form(email: &str) -> RegistrationForm {
        RegistrationForm {
            first_name: "Alva".into(),
            last_name: "Berg".into(),
            email: email.into(),
            password: "hemligt".into(),
            confirm_password: "hemligt".into(),
        }
    }

    #[tokio::test]
    async fn register_writes_profile_and_directory() {
        let docs = Arc::new(MemoryDocumentStore::new());
        let identity = DocumentIdentityProvider::new(docs.clone());
        let uid = register(docs.as_ref(), &identity, &form("alva@example.se"))
            .await
            .unwrap();

        let user = docs.get_document(&paths::user(&uid).unwrap()).await.unwrap().unwrap();
        assert_eq!(user.get_str("displayName"), Some("Alva Berg"));
        assert_eq!(user.get("birthdaySection").and_then(|v| v.as_array()).map(Vec::len), Some(9));
        let entry = docs
            .get_document(&paths::directory_entry(&uid).unwrap())
            .await
            .unwrap();
        assert!(entry.is_some());
    }

    #[tokio::test]
    async fn invalid_form_never_reaches_the_provider() {
        let docs = Arc::new(MemoryDocumentStore::new());
        let identity = DocumentIdentityProvider::new(docs.clone());
        let mut bad = form("alva@example.se");
        bad.confirm_password = "annat".into();
        assert!(matches!(
            register(docs.as_ref(), &identity, &bad).await,
            Err(ClientError::Validation(_))
        ));
        assert!(identity.current_principal().is_none());
    }

    #[tokio::test]
    async fn duplicate_email_is_reported() {
        let docs = Arc::new(MemoryDocumentStore::new());
        let identity = DocumentIdentityProvider::new(docs.clone());
        register(docs.as_ref(), &identity, &form("alva@example.se"))
            .await
            .unwrap();
        let err = register(docs.as_ref(), &identity, &form("alva@example.se"))
            .await
            .unwrap_err();
        assert!(matches!(err, ClientError::Auth(AuthError::EmailAlreadyInUse)));
        assert_eq!(err.user_message(), "E-postadressen används redan.");
    }

    #[tokio::test]
    async fn login_checks_credentials() {
        let docs = Arc::new(MemoryDocumentStore::new());
        let files = MemoryFileStore::new("mem://files", 1024);
        let identity = DocumentIdentityProvider::new(docs.clone());
        let uid = register(docs.as_ref(), &identity, &form("alva@example.se"))
            .await
            .unwrap();
        identity.sign_out().await.unwrap();

        assert!(matches!(
            login(docs.as_ref(), &files, &identity, "alva@example.se", "fel!!!").await,
            Err(ClientError::Auth(AuthError::InvalidCredentials))
        ));
        let again = login(docs.as_ref(), &files, &identity, "alva@example.se", "hemligt")
            .await
            .unwrap();
        assert_eq!(again, uid);
    }
}
