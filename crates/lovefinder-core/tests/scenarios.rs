//! Several client sessions driving one shared in-memory backend.

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use anyhow::Result;
use bytes::Bytes;
use lovefinder_core::{
    ClientConfig, ClientError, ClientEvent, GenderFilter, Lovefinder, MatchOutcome, MessagePayload,
};
use lovefinder_shared::validation::RegistrationForm;
use lovefinder_shared::{AuthError, ChatId, PrincipalId};
use lovefinder_store::{DocumentStore, FileStore, MemoryDocumentStore, MemoryFileStore};

const PASSWORD: &str = "hemligt";

struct Backend {
    docs: Arc<MemoryDocumentStore>,
    files: Arc<MemoryFileStore>,
}

impl Backend {
    fn new() -> Self {
        Self {
            docs: Arc::new(MemoryDocumentStore::new()),
            files: Arc::new(MemoryFileStore::new("mem://files", 1024 * 1024)),
        }
    }

    fn session(&self) -> Lovefinder {
        let config = ClientConfig::with_data_dir(PathBuf::from("unused"));
        Lovefinder::new(self.docs.clone(), self.files.clone(), config)
    }

    async fn user(&self, first: &str) -> (Lovefinder, PrincipalId) {
        let client = self.session();
        let uid = client
            .register(&RegistrationForm {
                first_name: first.into(),
                last_name: "Test".into(),
                email: email(first),
                password: PASSWORD.into(),
                confirm_password: PASSWORD.into(),
            })
            .await
            .unwrap();
        (client, uid)
    }

    fn chats(&self) -> Vec<String> {
        self.docs
            .paths_under("chats/")
            .into_iter()
            .filter(|p| p.matches('/').count() == 1)
            .collect()
    }

    /// Paths under any principal's relation collections that point at `uid`.
    fn references_to(&self, uid: &PrincipalId) -> Vec<String> {
        let suffix = format!("/{uid}");
        self.docs
            .paths_under("users/")
            .into_iter()
            .filter(|p| p.matches('/').count() == 3 && p.ends_with(&suffix))
            .collect()
    }
}

fn email(first: &str) -> String {
    format!("{}@example.se", first.to_lowercase())
}

#[tokio::test]
async fn like_then_like_back_creates_one_match_and_session() -> Result<()> {
    let backend = Backend::new();
    let (alice, a) = backend.user("Alice").await;
    let (bob, b) = backend.user("Bob").await;
    let mut bob_events = bob.subscribe_events();

    assert_eq!(alice.like(&b).await?, MatchOutcome::NoMatch);
    assert!(alice.matches().await?.is_empty());
    assert!(backend.chats().is_empty());

    let chat_id = ChatId::for_pair(&a, &b)?;
    assert_eq!(
        bob.like(&a).await?,
        MatchOutcome::Matched {
            chat_id: chat_id.clone(),
            session_created: true
        }
    );
    assert!(matches!(bob_events.recv().await?, ClientEvent::LikeRecorded { .. }));
    assert_eq!(
        bob_events.recv().await?,
        ClientEvent::MatchCreated {
            partner: a.clone(),
            chat_id: chat_id.clone()
        }
    );

    let mine = alice.matches().await?;
    assert_eq!(mine.len(), 1);
    assert_eq!(mine[0].partner, b);
    assert_eq!(mine[0].display_name, "Bob Test");
    assert_eq!(bob.matches().await?.len(), 1);
    assert_eq!(backend.chats(), [format!("chats/{chat_id}")]);

    // Liking again only re-confirms the match.
    assert_eq!(
        alice.like(&b).await?,
        MatchOutcome::Matched {
            chat_id,
            session_created: false
        }
    );
    assert_eq!(backend.chats().len(), 1);
    assert_eq!(alice.matches().await?.len(), 1);
    Ok(())
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn simultaneous_mutual_likes_create_one_session() -> Result<()> {
    for _ in 0..10 {
        let backend = Backend::new();
        let (alice, a) = backend.user("Alice").await;
        let (bob, b) = backend.user("Bob").await;
        let (alice, bob) = (Arc::new(alice), Arc::new(bob));

        let left = {
            let (alice, b) = (alice.clone(), b.clone());
            tokio::spawn(async move { alice.like(&b).await })
        };
        let right = {
            let (bob, a) = (bob.clone(), a.clone());
            tokio::spawn(async move { bob.like(&a).await })
        };
        let outcomes = [left.await??, right.await??];

        let created = outcomes
            .iter()
            .filter(|o| {
                matches!(
                    o,
                    MatchOutcome::Matched {
                        session_created: true,
                        ..
                    }
                )
            })
            .count();
        assert_eq!(created, 1, "{outcomes:?}");
        assert_eq!(backend.chats().len(), 1);
        assert_eq!(alice.matches().await?.len(), 1);
        assert_eq!(bob.matches().await?.len(), 1);
    }
    Ok(())
}

#[tokio::test]
async fn skipped_principals_stay_hidden() -> Result<()> {
    let backend = Backend::new();
    let (carol, c) = backend.user("Carol").await;
    let (dave, d) = backend.user("Dave").await;
    let (_erik, e) = backend.user("Erik").await;

    carol.skip(&d).await?;
    dave.like(&c).await?;
    // Liking after skipping does not bring the principal back.
    carol.like(&d).await?;

    let ids: Vec<_> = carol
        .candidates(&GenderFilter::All)
        .await?
        .into_iter()
        .map(|c| c.id)
        .collect();
    assert_eq!(ids, [e]);
    assert!(carol.admirers().await?.is_empty());

    let nav = carol.watch_nav_counters().await?;
    assert_eq!(nav.current().likes, 0);
    Ok(())
}

#[tokio::test]
async fn unread_counter_follows_messages_and_chat_visits() -> Result<()> {
    let backend = Backend::new();
    let (alice, a) = backend.user("Alice").await;
    let (bob, b) = backend.user("Bob").await;
    alice.like(&b).await?;
    bob.like(&a).await?;

    bob.send_text(&a, "Hej Alice!").await?;
    bob.send_text(&a, "Fika?").await?;
    assert_eq!(alice.matches().await?[0].unread_messages, 2);
    assert_eq!(bob.matches().await?[0].unread_messages, 0);

    let mut view = alice.enter_chat(&b).await?;
    assert_eq!(alice.matches().await?[0].unread_messages, 0);
    let shown = view.next_messages().await.unwrap();
    assert_eq!(shown.len(), 2);
    assert_eq!(shown[0].payload, MessagePayload::Text("Hej Alice!".into()));

    bob.send_text(&a, "Kl 15?").await?;
    let shown = tokio::time::timeout(Duration::from_secs(1), view.next_messages())
        .await?
        .unwrap();
    assert_eq!(shown.len(), 3);
    assert!(shown.windows(2).all(|w| w[0].created_at < w[1].created_at));
    assert_eq!(alice.matches().await?[0].unread_messages, 1);
    view.mark_read().await?;
    assert_eq!(alice.matches().await?[0].unread_messages, 0);

    let liked = view.toggle_reaction(&shown[2].id).await?;
    assert!(liked);
    assert_eq!(bob.messages(&a).await?[2].likes, [a.clone()]);
    view.close();

    let (eve, _) = backend.user("Eve").await;
    assert!(matches!(
        eve.send_text(&a, "hallå").await,
        Err(ClientError::NotMatched { .. })
    ));
    Ok(())
}

async fn befriend_everyone(backend: &Backend) -> Result<(Lovefinder, PrincipalId, Lovefinder, PrincipalId, Lovefinder, PrincipalId)> {
    let (alice, a) = backend.user("Alice").await;
    let (bob, b) = backend.user("Bob").await;
    let (carol, c) = backend.user("Carol").await;

    alice.like(&b).await?;
    bob.like(&a).await?;
    carol.like(&a).await?;
    alice.skip(&c).await?;
    bob.send_text(&a, "Hej!").await?;
    alice
        .set_profile_image("jag.png", Bytes::from_static(b"png"))
        .await?;
    alice.add_gallery_image("strand.jpg", Bytes::from_static(b"jpg")).await?;
    Ok((alice, a, bob, b, carol, c))
}

#[tokio::test]
async fn eradication_removes_every_reference() -> Result<()> {
    let backend = Backend::new();
    let (alice, a, bob, _b, carol, _c) = befriend_everyone(&backend).await?;
    assert!(!backend.references_to(&a).is_empty());

    let mut events = alice.subscribe_events();
    let report = alice.delete_account(PASSWORD).await?;
    assert!(report.is_clean(), "{report:?}");
    assert!(report.finished());
    assert_eq!(
        events.recv().await?,
        ClientEvent::AccountDeleted { principal: a.clone() }
    );
    assert!(alice.current_principal().is_none());

    assert!(backend.references_to(&a).is_empty());
    assert!(backend.docs.paths_under(&format!("users/{a}")).is_empty());
    assert!(backend.docs.paths_under(&format!("allUsers/{a}")).is_empty());
    assert!(backend.docs.paths_under("eradications/").is_empty());
    assert!(backend.files.list_folder(&format!("profileImages/{a}")).await?.is_empty());
    assert!(backend.files.list_folder(&format!("user_images/{a}")).await?.is_empty());

    assert!(bob.matches().await?.is_empty());
    assert!(carol.candidates(&GenderFilter::All).await?.iter().all(|c| c.id != a));
    assert!(matches!(
        alice.login(&email("Alice"), PASSWORD).await,
        Err(ClientError::Auth(AuthError::InvalidCredentials))
    ));
    Ok(())
}

#[tokio::test]
async fn eradication_removes_images_uploaded_with_slashes_in_the_name() -> Result<()> {
    let backend = Backend::new();
    let (alice, a) = backend.user("Alice").await;
    let url = alice
        .set_profile_image("album/me.png", Bytes::from_static(b"png"))
        .await?;
    assert!(url.ends_with(&format!("profileImages/{a}/album_me.png")), "{url}");
    assert!(!backend.files.exists(&format!("profileImages/{a}/album/me.png")).await);

    let report = alice.delete_account(PASSWORD).await?;
    assert!(report.is_clean(), "{report:?}");
    assert!(!backend.files.exists(&format!("profileImages/{a}/album_me.png")).await);
    assert!(backend
        .files
        .download_url(&format!("profileImages/{a}/album/me.png"))
        .await
        .is_err());
    assert!(backend.files.list_folder(&format!("profileImages/{a}")).await?.is_empty());
    Ok(())
}

#[tokio::test]
async fn tombstone_hides_principal_when_cleanup_fails() -> Result<()> {
    let backend = Backend::new();
    let (alice, a, bob, b, _carol, _c) = befriend_everyone(&backend).await?;
    backend.docs.fail_writes_under(&format!("users/{b}/"));
    backend.docs.fail_writes_under("allUsers/");
    backend.docs.fail_deletes_under(&format!("users/{a}"));

    let report = alice.delete_account(PASSWORD).await?;
    assert!(report.finished());
    assert!(!report.is_clean());
    assert!(report.failures.iter().any(|f| f.starts_with(&format!("users/{b}/"))));
    assert!(report.failures.contains(&format!("users/{a}")));

    // Residue stays behind, but bob no longer sees alice anywhere.
    assert!(!backend.references_to(&a).is_empty());
    let left = backend.docs.get_document(&lovefinder_store::DocumentPath::parse(&format!("users/{a}"))?).await?;
    assert_eq!(left.and_then(|d| d.get_bool("active")), Some(false));
    assert!(bob.matches().await?.is_empty());
    assert!(bob.admirers().await?.is_empty());
    assert!(bob.candidates(&GenderFilter::All).await?.iter().all(|c| c.id != a));
    Ok(())
}

#[tokio::test]
async fn wrong_password_touches_nothing() -> Result<()> {
    let backend = Backend::new();
    let (alice, a, bob, _b, _carol, _c) = befriend_everyone(&backend).await?;
    let before = backend.docs.paths_under("");

    assert!(matches!(
        alice.delete_account("felaktigt").await,
        Err(ClientError::ReauthenticationFailed)
    ));
    assert_eq!(backend.docs.paths_under(""), before);
    assert_eq!(alice.current_principal(), Some(a));
    assert_eq!(bob.matches().await?.len(), 1);
    Ok(())
}

#[tokio::test]
async fn failed_tombstone_aborts_and_sign_in_finishes_the_deletion() -> Result<()> {
    let backend = Backend::new();
    let (alice, a, bob, _b, _carol, _c) = befriend_everyone(&backend).await?;
    backend.docs.fail_writes_under(&format!("users/{a}"));

    assert!(matches!(
        alice.delete_account(PASSWORD).await,
        Err(ClientError::Store(_))
    ));
    // Nothing was hidden or removed.
    assert_eq!(bob.matches().await?.len(), 1);
    assert_eq!(backend.docs.paths_under(&format!("eradications/{a}")).len(), 1);

    backend.docs.clear_faults();
    alice.logout().await?;
    assert!(matches!(
        alice.login(&email("Alice"), PASSWORD).await,
        Err(ClientError::AccountDeleted)
    ));
    assert!(alice.current_principal().is_none());
    assert!(bob.matches().await?.is_empty());
    assert!(backend.references_to(&a).is_empty());
    assert!(backend.docs.paths_under("eradications/").is_empty());
    Ok(())
}

#[tokio::test]
async fn identity_failure_leaves_the_saga_for_next_sign_in() -> Result<()> {
    let backend = Backend::new();
    let (alice, a, _bob, _b, _carol, _c) = befriend_everyone(&backend).await?;
    backend.docs.fail_writes_under("_accounts/");

    let report = alice.delete_account(PASSWORD).await?;
    assert!(!report.finished());
    assert!(backend.docs.paths_under(&format!("users/{a}")).is_empty());
    assert_eq!(backend.docs.paths_under("eradications/").len(), 1);

    backend.docs.clear_faults();
    alice.logout().await?;
    assert!(matches!(
        alice.login(&email("Alice"), PASSWORD).await,
        Err(ClientError::AccountDeleted)
    ));
    assert!(backend.docs.paths_under("eradications/").is_empty());
    assert!(matches!(
        alice.login(&email("Alice"), PASSWORD).await,
        Err(ClientError::Auth(AuthError::InvalidCredentials))
    ));
    Ok(())
}

#[tokio::test]
async fn sign_out_ends_live_views() -> Result<()> {
    let backend = Backend::new();
    let (alice, a) = backend.user("Alice").await;
    let (bob, b) = backend.user("Bob").await;
    alice.like(&b).await?;
    bob.like(&a).await?;

    let mut nav = alice.watch_nav_counters().await?;
    assert_eq!(nav.current().matches, 1);
    let mut overview = alice.watch_matches().await?;
    assert_eq!(overview.next().await.unwrap()?.len(), 1);
    let mut chat = alice.enter_chat(&b).await?;
    assert!(chat.next_messages().await.unwrap().is_empty());

    alice.logout().await?;
    let wait = Duration::from_secs(1);
    assert!(tokio::time::timeout(wait, nav.next()).await?.is_none());
    assert!(tokio::time::timeout(wait, overview.next()).await?.is_none());
    assert!(tokio::time::timeout(wait, chat.next_messages()).await?.is_none());

    // Bob's session is unaffected.
    assert_eq!(bob.matches().await?.len(), 1);
    Ok(())
}

#[tokio::test]
async fn backend_revoking_access_ends_a_view_quietly() -> Result<()> {
    let backend = Backend::new();
    let (alice, a) = backend.user("Alice").await;
    let (bob, b) = backend.user("Bob").await;
    alice.like(&b).await?;
    bob.like(&a).await?;

    let mut chat = alice.enter_chat(&b).await?;
    assert!(chat.next_messages().await.unwrap().is_empty());
    let chat_id = ChatId::for_pair(&a, &b)?;
    assert_eq!(backend.docs.close_subscriptions_under(&format!("chats/{chat_id}")), 1);
    assert!(chat.next_messages().await.is_none());
    Ok(())
}
