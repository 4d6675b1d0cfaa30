//! Account deletion as a resumable saga.
//!
//! The saga walks a fixed sequence of steps and records the last completed
//! one in `eradications/{uid}`, so a run that dies halfway is picked up on
//! the principal's next sign-in. The first step tombstones the principal
//! (`active: false`), which hides it from every listing even if a later
//! step leaves residue. Failures on individual documents or files are
//! logged and counted, and the step still advances.

use std::collections::BTreeSet;
use std::fmt;

use lovefinder_shared::constants::RELATION_COLLECTIONS;
use lovefinder_shared::{AuthError, PrincipalId};
use lovefinder_store::{
    DocumentPath, DocumentStore, Fields, FileStore, IdentityProvider, Query, SetOptions,
};
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::error::{ClientError, Result};
use crate::paths;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum EradicationStep {
    Pending,
    Tombstoned,
    SubcollectionsCleared,
    ReferencesCleared,
    DirectoryCleared,
    FilesCleared,
    DocumentDeleted,
    IdentityDeleted,
}

impl EradicationStep {
    pub const ALL: [EradicationStep; 8] = [
        EradicationStep::Pending,
        EradicationStep::Tombstoned,
        EradicationStep::SubcollectionsCleared,
        EradicationStep::ReferencesCleared,
        EradicationStep::DirectoryCleared,
        EradicationStep::FilesCleared,
        EradicationStep::DocumentDeleted,
        EradicationStep::IdentityDeleted,
    ];

    pub fn next(self) -> Option<Self> {
        let pos = Self::ALL.iter().position(|s| *s == self)?;
        Self::ALL.get(pos + 1).copied()
    }

    pub fn as_str(self) -> &'static str {
        match self {
            EradicationStep::Pending => "pending",
            EradicationStep::Tombstoned => "tombstoned",
            EradicationStep::SubcollectionsCleared => "subcollectionsCleared",
            EradicationStep::ReferencesCleared => "referencesCleared",
            EradicationStep::DirectoryCleared => "directoryCleared",
            EradicationStep::FilesCleared => "filesCleared",
            EradicationStep::DocumentDeleted => "documentDeleted",
            EradicationStep::IdentityDeleted => "identityDeleted",
        }
    }
}

impl fmt::Display for EradicationStep {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Persisted progress of one saga.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct SagaRecord {
    step: EradicationStep,
    #[serde(default)]
    failures: usize,
}

/// What an eradication run did.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct EradicationReport {
    pub principal: Option<PrincipalId>,
    /// The step a previous run had reached, if this run resumed one.
    pub resumed_from: Option<EradicationStep>,
    /// Steps completed by this run, in order.
    pub completed: Vec<EradicationStep>,
    /// Documents or files that could not be removed.
    pub failures: Vec<String>,
}

impl EradicationReport {
    /// Everything was removed.
    pub fn is_clean(&self) -> bool {
        self.failures.is_empty()
    }

    pub fn finished(&self) -> bool {
        self.completed.last() == Some(&EradicationStep::IdentityDeleted)
    }
}

pub struct Eradication<'a> {
    docs: &'a dyn DocumentStore,
    files: &'a dyn FileStore,
    identity: &'a dyn IdentityProvider,
    principal: PrincipalId,
    failures: Vec<String>,
}

/// Delete the signed-in principal's account after re-checking `password`.
/// Nothing is touched if the password is wrong.
pub async fn eradicate(
    docs: &dyn DocumentStore,
    files: &dyn FileStore,
    identity: &dyn IdentityProvider,
    password: &str,
) -> Result<EradicationReport> {
    let principal = identity.current_principal().ok_or(ClientError::NotSignedIn)?;
    identity
        .reauthenticate(password)
        .await
        .map_err(|e| match e {
            AuthError::InvalidCredentials => ClientError::ReauthenticationFailed,
            other => ClientError::Auth(other),
        })?;

    info!(principal = %principal.short(), "Eradication started");
    Eradication::new(docs, files, identity, principal).run().await
}

/// The step an unfinished saga for `uid` has reached.
pub async fn pending_step(docs: &dyn DocumentStore, uid: &PrincipalId) -> Result<Option<EradicationStep>> {
    match docs.get_document(&paths::eradication(uid)?).await? {
        Some(doc) => Ok(Some(doc.decode::<SagaRecord>()?.step)),
        None => Ok(None),
    }
}

/// Finish an interrupted saga for the signed-in principal.
pub async fn resume(
    docs: &dyn DocumentStore,
    files: &dyn FileStore,
    identity: &dyn IdentityProvider,
) -> Result<EradicationReport> {
    let principal = identity.current_principal().ok_or(ClientError::NotSignedIn)?;
    info!(principal = %principal.short(), "Resuming eradication");
    Eradication::new(docs, files, identity, principal).run().await
}

impl<'a> Eradication<'a> {
    pub fn new(
        docs: &'a dyn DocumentStore,
        files: &'a dyn FileStore,
        identity: &'a dyn IdentityProvider,
        principal: PrincipalId,
    ) -> Self {
        Self {
            docs,
            files,
            identity,
            principal,
            failures: Vec::new(),
        }
    }

    pub async fn run(mut self) -> Result<EradicationReport> {
        let saga = paths::eradication(&self.principal)?;
        let saved = match self.docs.get_document(&saga).await? {
            Some(doc) => Some(doc.decode::<SagaRecord>()?),
            None => None,
        };
        let mut report = EradicationReport {
            principal: Some(self.principal.clone()),
            resumed_from: saved.as_ref().map(|s| s.step),
            ..Default::default()
        };
        let mut step = match saved {
            Some(record) => record.step,
            None => {
                self.persist(EradicationStep::Pending).await?;
                EradicationStep::Pending
            }
        };

        while let Some(next) = step.next() {
            if next == EradicationStep::IdentityDeleted {
                break;
            }
            self.execute(next).await?;
            report.completed.push(next);
            step = next;
            if let Err(e) = self.persist(step).await {
                warn!(step = %step, error = %e, "Could not record eradication progress");
            }
        }

        // The identity goes last; without it the saga cannot be resumed.
        match self.identity.delete_current_account().await {
            Ok(()) => {
                report.completed.push(EradicationStep::IdentityDeleted);
                if let Err(e) = self.docs.delete_document(&saga).await {
                    warn!(error = %e, "Could not remove eradication record");
                    self.failures.push(saga.to_string());
                }
            }
            Err(e) => {
                warn!(step = %EradicationStep::IdentityDeleted, error = %e, "Eradication step failed");
                self.failures.push(format!("identity:{}", self.principal));
            }
        }

        report.failures = self.failures;
        info!(
            principal = %self.principal.short(),
            steps = report.completed.len(),
            failures = report.failures.len(),
            "Eradication finished"
        );
        Ok(report)
    }

    async fn persist(&self, step: EradicationStep) -> Result<()> {
        self.docs
            .set_document(
                &paths::eradication(&self.principal)?,
                Fields::new()
                    .value("step", step.as_str())
                    .value("failures", self.failures.len() as i64)
                    .server_timestamp("updatedAt"),
                SetOptions::replace(),
            )
            .await?;
        Ok(())
    }

    async fn execute(&mut self, step: EradicationStep) -> Result<()> {
        debug!(step = %step, principal = %self.principal.short(), "Eradication step");
        match step {
            EradicationStep::Tombstoned => self.tombstone().await,
            EradicationStep::SubcollectionsCleared => self.clear_own_relations().await,
            EradicationStep::ReferencesCleared => self.clear_references().await,
            EradicationStep::DirectoryCleared => {
                let entry = paths::directory_entry(&self.principal)?;
                self.delete_doc(&entry, step).await;
                Ok(())
            }
            EradicationStep::FilesCleared => self.clear_files().await,
            EradicationStep::DocumentDeleted => {
                let user = paths::user(&self.principal)?;
                self.delete_doc(&user, step).await;
                Ok(())
            }
            EradicationStep::Pending | EradicationStep::IdentityDeleted => Ok(()),
        }
    }

    /// A failed tombstone aborts the saga: nothing else may run before the
    /// principal is hidden.
    async fn tombstone(&mut self) -> Result<()> {
        self.docs
            .set_document(
                &paths::user(&self.principal)?,
                Fields::new().value("active", false),
                SetOptions::merge(),
            )
            .await
            .map_err(|e| {
                warn!(step = %EradicationStep::Tombstoned, error = %e, "Eradication step failed");
                ClientError::from(e)
            })
    }

    async fn delete_doc(&mut self, path: &DocumentPath, step: EradicationStep) {
        if let Err(e) = self.docs.delete_document(path).await {
            warn!(step = %step, path = %path, error = %e, "Eradication step failed");
            self.failures.push(path.to_string());
        }
    }

    async fn clear_own_relations(&mut self) -> Result<()> {
        for name in RELATION_COLLECTIONS {
            let collection = paths::relation(&self.principal, name)?;
            match self.docs.list_collection(&collection, &Query::new()).await {
                Ok(listed) => {
                    for doc in listed {
                        self.delete_doc(&doc.path, EradicationStep::SubcollectionsCleared)
                            .await;
                    }
                }
                Err(e) => {
                    warn!(collection = %collection, error = %e, "Eradication step failed");
                    self.failures.push(collection.to_string());
                }
            }
        }
        Ok(())
    }

    /// Remove this principal from every other principal's relation
    /// collections. Visits every known principal.
    async fn clear_references(&mut self) -> Result<()> {
        let mut others = BTreeSet::new();
        for collection in [paths::users()?, paths::directory()?] {
            match self.docs.list_collection(&collection, &Query::new()).await {
                Ok(listed) => others.extend(
                    listed
                        .iter()
                        .filter_map(|d| PrincipalId::parse(d.id()).ok()),
                ),
                Err(e) => {
                    warn!(collection = %collection, error = %e, "Eradication step failed");
                    self.failures.push(collection.to_string());
                }
            }
        }
        others.remove(&self.principal);

        for other in &others {
            for name in RELATION_COLLECTIONS {
                let path = paths::relation_doc(other, name, &self.principal)?;
                self.delete_doc(&path, EradicationStep::ReferencesCleared).await;
            }
        }
        debug!(principals = others.len(), "References swept");
        Ok(())
    }

    async fn clear_files(&mut self) -> Result<()> {
        let folders = [
            paths::profile_image_folder(&self.principal),
            paths::gallery_folder(&self.principal),
        ];
        for folder in folders {
            let listed = match self.files.list_folder(&folder).await {
                Ok(listed) => listed,
                Err(e) => {
                    warn!(folder = %folder, error = %e, "Eradication step failed");
                    self.failures.push(folder);
                    continue;
                }
            };
            for file in listed {
                if let Err(e) = self.files.delete(&file).await {
                    warn!(step = %EradicationStep::FilesCleared, path = %file, error = %e, "Eradication step failed");
                    self.failures.push(file);
                }
            }
        }
        Ok(())
    }
}
