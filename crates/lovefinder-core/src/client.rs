//! The client handle the UI layer holds.
//!
//! [`Lovefinder`] bundles the three backend collaborators with the signed-in
//! session. Every operation that acts on behalf of a principal takes it from
//! the identity provider; live views are tied to the session and end when it
//! does.

use std::sync::Arc;

use bytes::Bytes;
use lovefinder_shared::profile::{GalleryImage, InfoItem, TextCard};
use lovefinder_shared::validation::RegistrationForm;
use lovefinder_shared::{ChatId, PrincipalId};
use lovefinder_store::{
    DocumentIdentityProvider, DocumentPath, DocumentStore, FileStore, IdentityProvider,
    LocalFileStore, MemoryDocumentStore, MemoryFileStore, SqliteDocumentStore,
};
use tokio::sync::{broadcast, watch};
use tracing::info;

use crate::auth;
use crate::chat::{self, ChatView};
use crate::config::ClientConfig;
use crate::discovery;
use crate::eradication::{self, EradicationReport};
use crate::error::{ClientError, Result};
use crate::events::{emit_event, ClientEvent};
use crate::likes;
use crate::matching::{self, MatchOutcome};
use crate::models::{Candidate, ChatMessage, GenderFilter, MatchSummary, MessagePayload, Profile};
use crate::nav::NavWatcher;
use crate::overview::{self, MatchesWatcher};
use crate::profile;
use crate::subscription::SessionGuard;

pub struct Lovefinder {
    docs: Arc<dyn DocumentStore>,
    files: Arc<dyn FileStore>,
    identity: Arc<dyn IdentityProvider>,
    config: ClientConfig,
    events: broadcast::Sender<ClientEvent>,
    /// Signed-in principal, watched by live views.
    session: watch::Sender<Option<PrincipalId>>,
}

impl Lovefinder {
    /// Client over the given stores, with accounts kept in `docs`.
    pub fn new(docs: Arc<dyn DocumentStore>, files: Arc<dyn FileStore>, config: ClientConfig) -> Self {
        let identity = Arc::new(DocumentIdentityProvider::new(docs.clone()));
        Self::with_identity(docs, files, identity, config)
    }

    pub fn with_identity(
        docs: Arc<dyn DocumentStore>,
        files: Arc<dyn FileStore>,
        identity: Arc<dyn IdentityProvider>,
        config: ClientConfig,
    ) -> Self {
        let (events, _) = broadcast::channel(config.event_buffer.max(1));
        let (session, _) = watch::channel(identity.current_principal());
        Self {
            docs,
            files,
            identity,
            config,
            events,
            session,
        }
    }

    /// Everything in memory; nothing survives the process.
    pub fn in_memory() -> Self {
        let config = ClientConfig::default();
        let files = Arc::new(MemoryFileStore::new("mem://files", config.max_upload_size));
        Self::new(Arc::new(MemoryDocumentStore::new()), files, config)
    }

    /// Documents in SQLite and files on disk, both under the configured
    /// data directory.
    pub async fn open_local(config: ClientConfig) -> Result<Self> {
        let docs = SqliteDocumentStore::open_at(&config.db_path)?;
        let files = LocalFileStore::new(
            config.files_path.clone(),
            config.download_base_url.clone(),
            config.max_upload_size,
        )
        .await?;
        info!(db = %config.db_path.display(), files = %config.files_path.display(), "Local stores opened");
        Ok(Self::new(Arc::new(docs), Arc::new(files), config))
    }

    pub fn config(&self) -> &ClientConfig {
        &self.config
    }

    pub fn subscribe_events(&self) -> broadcast::Receiver<ClientEvent> {
        self.events.subscribe()
    }

    pub fn current_principal(&self) -> Option<PrincipalId> {
        self.identity.current_principal()
    }

    fn require_principal(&self) -> Result<PrincipalId> {
        self.identity.current_principal().ok_or(ClientError::NotSignedIn)
    }

    fn guard(&self, principal: PrincipalId) -> SessionGuard {
        SessionGuard::new(self.session.subscribe(), principal)
    }

    fn signed_in(&self, principal: &PrincipalId) {
        self.session.send_replace(Some(principal.clone()));
        emit_event(
            &self.events,
            ClientEvent::SignedIn {
                principal: principal.clone(),
            },
        );
    }

    fn ended(&self) -> Option<PrincipalId> {
        self.session.send_replace(None)
    }

    // --- Session ---

    pub async fn register(&self, form: &RegistrationForm) -> Result<PrincipalId> {
        let uid = auth::register(self.docs.as_ref(), self.identity.as_ref(), form).await?;
        self.signed_in(&uid);
        Ok(uid)
    }

    /// Sign in. Fails with `AccountDeleted` if the account's deletion was
    /// unfinished; it is completed as part of the call.
    pub async fn login(&self, email: &str, password: &str) -> Result<PrincipalId> {
        match auth::login(
            self.docs.as_ref(),
            self.files.as_ref(),
            self.identity.as_ref(),
            email,
            password,
        )
        .await
        {
            Ok(uid) => {
                self.signed_in(&uid);
                Ok(uid)
            }
            Err(e) => {
                self.session.send_replace(self.identity.current_principal());
                Err(e)
            }
        }
    }

    /// Sign out. Live views opened for the principal end.
    pub async fn logout(&self) -> Result<()> {
        self.identity.sign_out().await?;
        if let Some(principal) = self.ended() {
            info!(principal = %principal.short(), "Signed out");
            emit_event(&self.events, ClientEvent::SignedOut { principal });
        }
        Ok(())
    }

    /// Delete the signed-in account after re-checking the password.
    pub async fn delete_account(&self, password: &str) -> Result<EradicationReport> {
        let report = eradication::eradicate(
            self.docs.as_ref(),
            self.files.as_ref(),
            self.identity.as_ref(),
            password,
        )
        .await?;
        if report.finished() {
            if let Some(principal) = self.ended() {
                emit_event(&self.events, ClientEvent::AccountDeleted { principal });
            }
        }
        Ok(report)
    }

    // --- Likes and matches ---

    /// Like `to`, creating the match and its chat session if the like is
    /// mutual.
    pub async fn like(&self, to: &PrincipalId) -> Result<MatchOutcome> {
        let me = self.require_principal()?;
        likes::record_like(self.docs.as_ref(), &me, to).await?;
        emit_event(
            &self.events,
            ClientEvent::LikeRecorded {
                from: me.clone(),
                to: to.clone(),
            },
        );

        let outcome = matching::check_and_create_match(self.docs.as_ref(), &me, to).await?;
        if let MatchOutcome::Matched { chat_id, .. } = &outcome {
            emit_event(
                &self.events,
                ClientEvent::MatchCreated {
                    partner: to.clone(),
                    chat_id: chat_id.clone(),
                },
            );
        }
        Ok(outcome)
    }

    pub async fn skip(&self, to: &PrincipalId) -> Result<()> {
        let me = self.require_principal()?;
        likes::record_skip(self.docs.as_ref(), &me, to).await?;
        emit_event(
            &self.events,
            ClientEvent::SkipRecorded {
                from: me,
                to: to.clone(),
            },
        );
        Ok(())
    }

    pub async fn candidates(&self, filter: &GenderFilter) -> Result<Vec<Candidate>> {
        let me = self.require_principal()?;
        discovery::candidates(self.docs.as_ref(), &me, filter).await
    }

    pub async fn admirers(&self) -> Result<Vec<Candidate>> {
        let me = self.require_principal()?;
        discovery::admirers(self.docs.as_ref(), &me).await
    }

    pub async fn matches(&self) -> Result<Vec<MatchSummary>> {
        let me = self.require_principal()?;
        overview::matches(self.docs.as_ref(), &me).await
    }

    pub async fn is_matched(&self, partner: &PrincipalId) -> Result<bool> {
        let me = self.require_principal()?;
        matching::is_matched(self.docs.as_ref(), &me, partner).await
    }

    pub async fn watch_matches(&self) -> Result<MatchesWatcher> {
        let me = self.require_principal()?;
        MatchesWatcher::open(self.docs.clone(), me.clone(), self.guard(me)).await
    }

    pub async fn watch_nav_counters(&self) -> Result<NavWatcher> {
        let me = self.require_principal()?;
        NavWatcher::open(self.docs.as_ref(), &me, self.guard(me.clone())).await
    }

    // --- Chat ---

    fn chat_with(&self, partner: &PrincipalId) -> Result<(PrincipalId, ChatId)> {
        let me = self.require_principal()?;
        let chat_id = ChatId::for_pair(&me, partner)?;
        Ok((me, chat_id))
    }

    /// Open the chat with a matched partner; marks it read.
    pub async fn enter_chat(&self, partner: &PrincipalId) -> Result<ChatView> {
        let me = self.require_principal()?;
        ChatView::open(
            self.docs.clone(),
            self.files.clone(),
            me.clone(),
            partner.clone(),
            self.guard(me),
        )
        .await
    }

    pub async fn messages(&self, partner: &PrincipalId) -> Result<Vec<ChatMessage>> {
        let (_, chat_id) = self.chat_with(partner)?;
        chat::messages(self.docs.as_ref(), &chat_id).await
    }

    pub async fn send_text(&self, partner: &PrincipalId, text: &str) -> Result<DocumentPath> {
        let (me, chat_id) = self.chat_with(partner)?;
        let path = chat::send_message(
            self.docs.as_ref(),
            &chat_id,
            &me,
            MessagePayload::Text(text.to_string()),
        )
        .await?;
        emit_event(&self.events, ClientEvent::MessageSent { chat_id, sender: me });
        Ok(path)
    }

    pub async fn send_image(&self, partner: &PrincipalId, file_name: &str, data: Bytes) -> Result<DocumentPath> {
        let (me, chat_id) = self.chat_with(partner)?;
        let path = chat::send_image(
            self.docs.as_ref(),
            self.files.as_ref(),
            &chat_id,
            &me,
            file_name,
            data,
        )
        .await?;
        emit_event(&self.events, ClientEvent::MessageSent { chat_id, sender: me });
        Ok(path)
    }

    pub async fn toggle_reaction(&self, partner: &PrincipalId, message_id: &str) -> Result<bool> {
        let (me, chat_id) = self.chat_with(partner)?;
        chat::toggle_reaction(self.docs.as_ref(), &chat_id, message_id, &me).await
    }

    pub async fn mark_read(&self, partner: &PrincipalId) -> Result<()> {
        let me = self.require_principal()?;
        chat::mark_read(self.docs.as_ref(), &me, partner).await
    }

    // --- Profile ---

    pub async fn my_profile(&self) -> Result<Option<Profile>> {
        let me = self.require_principal()?;
        profile::profile(self.docs.as_ref(), &me).await
    }

    pub async fn profile(&self, uid: &PrincipalId) -> Result<Option<Profile>> {
        self.require_principal()?;
        profile::profile(self.docs.as_ref(), uid).await
    }

    pub async fn save_birthday_section(&self, items: &[InfoItem]) -> Result<()> {
        let me = self.require_principal()?;
        profile::save_birthday_section(self.docs.as_ref(), &me, items).await
    }

    pub async fn save_activities(&self, cards: &[TextCard]) -> Result<()> {
        let me = self.require_principal()?;
        profile::save_activities(self.docs.as_ref(), &me, cards).await
    }

    pub async fn save_main_info(&self, cards: &[TextCard]) -> Result<()> {
        let me = self.require_principal()?;
        profile::save_main_info(self.docs.as_ref(), &me, cards).await
    }

    pub async fn set_profile_image(&self, file_name: &str, data: Bytes) -> Result<String> {
        let me = self.require_principal()?;
        profile::set_profile_image(self.docs.as_ref(), self.files.as_ref(), &me, file_name, data).await
    }

    pub async fn add_gallery_image(&self, file_name: &str, data: Bytes) -> Result<GalleryImage> {
        let me = self.require_principal()?;
        profile::add_gallery_image(
            self.docs.as_ref(),
            self.files.as_ref(),
            &me,
            self.config.max_gallery_images,
            file_name,
            data,
        )
        .await
    }

    pub async fn remove_gallery_image(&self, index: usize) -> Result<GalleryImage> {
        let me = self.require_principal()?;
        profile::remove_gallery_image(self.docs.as_ref(), self.files.as_ref(), &me, index).await
    }
}
