//! Identity provider backed by a document store.
//!
//! Accounts live in the private `_accounts` collection, keyed by the BLAKE3
//! hash of the lower-cased email so the address itself is never used as a
//! path segment. Passwords are stored as Argon2id PHC strings.
//! One provider instance holds the session of one client.

use std::sync::{Arc, Mutex, MutexGuard};

use argon2::password_hash::{PasswordHash, PasswordHasher, SaltString};
use argon2::{Algorithm, Argon2, Params, Version};
use async_trait::async_trait;
use rand::RngCore;
use serde::{Deserialize, Serialize};
use subtle::ConstantTimeEq;
use tracing::{debug, info};

use lovefinder_shared::constants::{ACCOUNTS, MIN_PASSWORD_LEN};
use lovefinder_shared::validation::looks_like_email;
use lovefinder_shared::{AuthError, PrincipalId};

use crate::document::Fields;
use crate::error::StoreError;
use crate::path::{CollectionPath, DocumentPath};
use crate::store::DocumentStore;

#[async_trait]
pub trait IdentityProvider: Send + Sync {
    /// Create an account and sign it in.
    async fn sign_up(
        &self,
        email: &str,
        password: &str,
        display_name: &str,
    ) -> Result<PrincipalId, AuthError>;

    async fn sign_in(&self, email: &str, password: &str) -> Result<PrincipalId, AuthError>;

    async fn sign_out(&self) -> Result<(), AuthError>;

    /// Re-prove the signed-in principal's password.
    async fn reauthenticate(&self, password: &str) -> Result<(), AuthError>;

    fn current_principal(&self) -> Option<PrincipalId>;

    /// Remove the signed-in account and end the session.
    async fn delete_current_account(&self) -> Result<(), AuthError>;
}

#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct AccountRecord {
    uid: String,
    email: String,
    display_name: String,
    password_hash: String,
}

#[derive(Debug, Clone)]
struct Session {
    principal: PrincipalId,
    account: DocumentPath,
}

pub struct DocumentIdentityProvider {
    docs: Arc<dyn DocumentStore>,
    session: Mutex<Option<Session>>,
}

fn backend(e: StoreError) -> AuthError {
    AuthError::Backend(e.to_string())
}

fn kdf(e: argon2::password_hash::Error) -> AuthError {
    AuthError::Backend(format!("password hashing: {e}"))
}

fn argon2id(params: Params) -> Argon2<'static> {
    Argon2::new(Algorithm::Argon2id, Version::V0x13, params)
}

fn hash_password(password: &str) -> Result<String, AuthError> {
    let mut salt = [0u8; 16];
    rand::rngs::OsRng.fill_bytes(&mut salt);
    let salt = SaltString::encode_b64(&salt).map_err(kdf)?;
    argon2id(Params::default())
        .hash_password(password.as_bytes(), &salt)
        .map(|hash| hash.to_string())
        .map_err(kdf)
}

/// Re-derive with the stored salt and parameters and compare the outputs.
fn verify(record: &AccountRecord, password: &str) -> bool {
    let Ok(stored) = PasswordHash::new(&record.password_hash) else {
        return false;
    };
    let Ok(params) = Params::try_from(&stored) else {
        return false;
    };
    let (Some(salt), Some(expected)) = (stored.salt, stored.hash) else {
        return false;
    };
    match argon2id(params).hash_password(password.as_bytes(), salt) {
        Ok(PasswordHash { hash: Some(actual), .. }) => {
            actual.as_bytes().ct_eq(expected.as_bytes()).into()
        }
        _ => false,
    }
}

impl DocumentIdentityProvider {
    pub fn new(docs: Arc<dyn DocumentStore>) -> Self {
        Self {
            docs,
            session: Mutex::new(None),
        }
    }

    fn lock(&self) -> MutexGuard<'_, Option<Session>> {
        match self.session.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        }
    }

    fn account_path(email: &str) -> Result<DocumentPath, AuthError> {
        let key = blake3::hash(email.trim().to_lowercase().as_bytes()).to_hex();
        CollectionPath::root(ACCOUNTS)
            .and_then(|c| c.doc(key.as_str()))
            .map_err(backend)
    }

    async fn load(&self, path: &DocumentPath) -> Result<Option<AccountRecord>, AuthError> {
        match self.docs.get_document(path).await.map_err(backend)? {
            Some(doc) => Ok(Some(doc.decode().map_err(backend)?)),
            None => Ok(None),
        }
    }

    fn start_session(&self, record: &AccountRecord, account: DocumentPath) -> Result<PrincipalId, AuthError> {
        let principal =
            PrincipalId::parse(&record.uid).map_err(|e| AuthError::Backend(e.to_string()))?;
        *self.lock() = Some(Session {
            principal: principal.clone(),
            account,
        });
        Ok(principal)
    }

    fn current_session(&self) -> Result<Session, AuthError> {
        self.lock().clone().ok_or(AuthError::NotSignedIn)
    }
}

#[async_trait]
impl IdentityProvider for DocumentIdentityProvider {
    async fn sign_up(
        &self,
        email: &str,
        password: &str,
        display_name: &str,
    ) -> Result<PrincipalId, AuthError> {
        if !looks_like_email(email) {
            return Err(AuthError::InvalidEmail);
        }
        if password.chars().count() < MIN_PASSWORD_LEN {
            return Err(AuthError::WeakPassword {
                min: MIN_PASSWORD_LEN,
            });
        }

        let record = AccountRecord {
            uid: PrincipalId::generate().to_string(),
            email: email.trim().to_string(),
            display_name: display_name.to_string(),
            password_hash: hash_password(password)?,
        };

        let path = Self::account_path(email)?;
        let fields = Fields::from_serializable(&record)
            .map_err(backend)?
            .server_timestamp("createdAt");
        if !self.docs.create_document(&path, fields).await.map_err(backend)? {
            return Err(AuthError::EmailAlreadyInUse);
        }

        info!(uid = %record.uid, "Account created");
        self.start_session(&record, path)
    }

    async fn sign_in(&self, email: &str, password: &str) -> Result<PrincipalId, AuthError> {
        if !looks_like_email(email) {
            return Err(AuthError::InvalidEmail);
        }
        let path = Self::account_path(email)?;
        let record = self
            .load(&path)
            .await?
            .ok_or(AuthError::InvalidCredentials)?;
        if !verify(&record, password) {
            debug!("Password mismatch");
            return Err(AuthError::InvalidCredentials);
        }
        self.start_session(&record, path)
    }

    async fn sign_out(&self) -> Result<(), AuthError> {
        self.lock().take();
        Ok(())
    }

    async fn reauthenticate(&self, password: &str) -> Result<(), AuthError> {
        let session = self.current_session()?;
        let record = self
            .load(&session.account)
            .await?
            .ok_or(AuthError::InvalidCredentials)?;
        if record.uid != session.principal.as_str() || !verify(&record, password) {
            return Err(AuthError::InvalidCredentials);
        }
        Ok(())
    }

    fn current_principal(&self) -> Option<PrincipalId> {
        self.lock().as_ref().map(|s| s.principal.clone())
    }

    async fn delete_current_account(&self) -> Result<(), AuthError> {
        let session = self.current_session()?;
        self.docs
            .delete_document(&session.account)
            .await
            .map_err(backend)?;
        self.lock().take();
        info!(uid = %session.principal, "Account deleted");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::memory::MemoryDocumentStore;

    fn provider(docs: &Arc<MemoryDocumentStore>) -> DocumentIdentityProvider {
        DocumentIdentityProvider::new(docs.clone())
    }

    #[tokio::test]
    async fn sign_up_then_sign_in_from_another_session() {
        let docs = Arc::new(MemoryDocumentStore::new());
        let first = provider(&docs);
        let uid = first
            .sign_up("alva@example.se", "hemligt", "Alva Berg")
            .await
            .unwrap();
        assert_eq!(first.current_principal(), Some(uid.clone()));

        let second = provider(&docs);
        assert_eq!(second.current_principal(), None);
        let again = second.sign_in("ALVA@example.se", "hemligt").await.unwrap();
        assert_eq!(again, uid);
    }

    #[tokio::test]
    async fn rejects_bad_input_and_duplicates() {
        let docs = Arc::new(MemoryDocumentStore::new());
        let p = provider(&docs);
        assert_eq!(
            p.sign_up("not-an-email", "hemligt", "X").await,
            Err(AuthError::InvalidEmail)
        );
        assert_eq!(
            p.sign_up("a@b.se", "123", "X").await,
            Err(AuthError::WeakPassword { min: 6 })
        );
        p.sign_up("a@b.se", "hemligt", "X").await.unwrap();
        assert_eq!(
            p.sign_up("a@b.se", "annat!", "Y").await,
            Err(AuthError::EmailAlreadyInUse)
        );
        assert_eq!(
            p.sign_in("a@b.se", "fel-lösen").await,
            Err(AuthError::InvalidCredentials)
        );
    }

    #[tokio::test]
    async fn passwords_are_stored_as_argon2id_hashes() {
        let docs = Arc::new(MemoryDocumentStore::new());
        let p = provider(&docs);
        p.sign_up("a@b.se", "hemligt", "X").await.unwrap();

        let path = DocumentIdentityProvider::account_path("a@b.se").unwrap();
        let record = p.load(&path).await.unwrap().unwrap();
        assert!(record.password_hash.starts_with("$argon2id$v=19$"), "{}", record.password_hash);
        assert!(!record.password_hash.contains("hemligt"));
        assert!(verify(&record, "hemligt"));
        assert!(!verify(&record, "hemligT"));

        let tampered = AccountRecord {
            password_hash: "not-a-phc-string".into(),
            ..record
        };
        assert!(!verify(&tampered, "hemligt"));
    }

    #[tokio::test]
    async fn reauthenticate_and_delete() {
        let docs = Arc::new(MemoryDocumentStore::new());
        let p = provider(&docs);
        p.sign_up("a@b.se", "hemligt", "X").await.unwrap();

        assert_eq!(
            p.reauthenticate("fel").await,
            Err(AuthError::InvalidCredentials)
        );
        p.reauthenticate("hemligt").await.unwrap();

        p.delete_current_account().await.unwrap();
        assert_eq!(p.current_principal(), None);
        assert_eq!(
            p.sign_in("a@b.se", "hemligt").await,
            Err(AuthError::InvalidCredentials)
        );
        assert_eq!(p.reauthenticate("hemligt").await, Err(AuthError::NotSignedIn));
    }
}
