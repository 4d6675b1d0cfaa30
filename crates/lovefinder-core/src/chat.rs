//! Chat sessions between matched principals.
//!
//! A session lives at `chats/{chatId}` and its messages in the `messages`
//! sub-collection, ordered by their server-assigned `createdAt`. Each sent
//! message bumps the unread counter on the recipient's match copy in the
//! same batch.

use std::sync::Arc;

use bytes::Bytes;
use chrono::Utc;
use lovefinder_shared::{ChatId, PrincipalId};
use lovefinder_store::{
    Direction, DocumentPath, DocumentStore, Fields, FileStore, Query, SetOptions, StoreError,
    Subscription, WriteBatch,
};
use serde_json::{json, Value};
use tracing::{debug, info, warn};

use crate::error::{ClientError, Result};
use crate::matching;
use crate::models::{ChatMessage, MessagePayload};
use crate::paths;
use crate::subscription::{next_ok, SessionGuard};

fn message_order() -> Query {
    Query::new().order_by("createdAt", Direction::Ascending)
}

fn to_messages(documents: &[lovefinder_store::Document]) -> Vec<ChatMessage> {
    documents.iter().filter_map(ChatMessage::from_document).collect()
}

/// Live, ordered view of a chat session's messages. Cancelled on drop.
#[derive(Debug)]
pub struct ChatSubscription {
    chat_id: ChatId,
    inner: Subscription,
}

impl ChatSubscription {
    pub fn chat_id(&self) -> &ChatId {
        &self.chat_id
    }

    /// The full message list after the next change; the first call yields
    /// the current contents. `None` once the subscription has ended.
    pub async fn next(&mut self) -> Option<Vec<ChatMessage>> {
        let snapshot = next_ok(&mut self.inner).await?;
        Some(to_messages(&snapshot.documents))
    }

    pub fn cancel(self) {}
}

pub async fn open_session(docs: &dyn DocumentStore, a: &PrincipalId, b: &PrincipalId) -> Result<ChatSubscription> {
    let chat_id = ChatId::for_pair(a, b)?;
    let inner = docs
        .subscribe_collection(&paths::messages(&chat_id)?, message_order())
        .await?;
    debug!(chat = %chat_id, "Chat session opened");
    Ok(ChatSubscription { chat_id, inner })
}

/// One-shot read of a session's messages, oldest first.
pub async fn messages(docs: &dyn DocumentStore, chat_id: &ChatId) -> Result<Vec<ChatMessage>> {
    let listed = docs
        .list_collection(&paths::messages(chat_id)?, &message_order())
        .await?;
    Ok(to_messages(&listed))
}

/// Append a message and bump the recipient's unread counter atomically.
pub async fn send_message(
    docs: &dyn DocumentStore,
    chat_id: &ChatId,
    sender: &PrincipalId,
    payload: MessagePayload,
) -> Result<DocumentPath> {
    let recipient = chat_id
        .partner_of(sender)
        .ok_or_else(|| ClientError::NotParticipant {
            chat: chat_id.clone(),
            principal: sender.clone(),
        })?
        .clone();

    let mut fields = Fields::new()
        .value("senderId", sender.as_str())
        .server_timestamp("createdAt")
        .value("likes", json!([]));
    fields = match payload {
        MessagePayload::Text(text) => {
            if text.trim().is_empty() {
                return Err(ClientError::EmptyMessage);
            }
            fields.value("text", text)
        }
        MessagePayload::Image(url) => fields.value("imageUrl", url),
    };

    let path = paths::messages(chat_id)?.doc(&uuid::Uuid::new_v4().simple().to_string())?;
    let batch = WriteBatch::new()
        .set(path.clone(), fields, SetOptions::replace())
        .update(
            paths::match_copy(&recipient, sender)?,
            Fields::new().increment("unreadMessages", 1),
        );

    match docs.commit(batch).await {
        Ok(_) => {}
        Err(StoreError::NotFound(_)) => {
            return Err(ClientError::NotMatched {
                principal: recipient,
                partner: sender.clone(),
            })
        }
        Err(e) => return Err(e.into()),
    }

    debug!(chat = %chat_id, sender = %sender.short(), "Message sent");
    Ok(path)
}

/// Upload an image into the session's folder and send it as a message.
pub async fn send_image(
    docs: &dyn DocumentStore,
    files: &dyn FileStore,
    chat_id: &ChatId,
    sender: &PrincipalId,
    file_name: &str,
    data: Bytes,
) -> Result<DocumentPath> {
    let recipient = chat_id
        .partner_of(sender)
        .ok_or_else(|| ClientError::NotParticipant {
            chat: chat_id.clone(),
            principal: sender.clone(),
        })?;
    if !matching::is_matched(docs, recipient, sender).await? {
        return Err(ClientError::NotMatched {
            principal: recipient.clone(),
            partner: sender.clone(),
        });
    }

    let path = paths::chat_image_file(chat_id, Utc::now().timestamp_millis(), file_name);
    let stored = files.upload(&path, data).await?;
    let sent = match files.download_url(&stored).await {
        Ok(url) => send_message(docs, chat_id, sender, MessagePayload::Image(url)).await,
        Err(e) => Err(e.into()),
    };
    match sent {
        Ok(message) => {
            info!(chat = %chat_id, path = %stored, "Chat image sent");
            Ok(message)
        }
        Err(e) => {
            // The match can end between the check and the send.
            if let Err(cleanup) = files.delete(&stored).await {
                warn!(path = %stored, error = %cleanup, "Could not remove unsent chat image");
            }
            Err(e)
        }
    }
}

/// Add or remove `principal` from a message's reactions. Returns whether
/// the principal now reacts to it.
///
/// Read-then-write: two participants toggling the same message at once can
/// overwrite each other.
pub async fn toggle_reaction(
    docs: &dyn DocumentStore,
    chat_id: &ChatId,
    message_id: &str,
    principal: &PrincipalId,
) -> Result<bool> {
    if !chat_id.contains(principal) {
        return Err(ClientError::NotParticipant {
            chat: chat_id.clone(),
            principal: principal.clone(),
        });
    }

    let path = paths::messages(chat_id)?.doc(message_id)?;
    let doc = docs
        .get_document(&path)
        .await?
        .ok_or_else(|| ClientError::MessageNotFound(message_id.to_string()))?;

    let mut likes: Vec<Value> = doc
        .get("likes")
        .and_then(Value::as_array)
        .cloned()
        .unwrap_or_default();
    let mine = Value::from(principal.as_str());
    let now_liked = match likes.iter().position(|v| v == &mine) {
        Some(pos) => {
            likes.remove(pos);
            false
        }
        None => {
            likes.push(mine);
            true
        }
    };

    docs.update_document(&path, Fields::new().value("likes", Value::Array(likes)))
        .await?;
    Ok(now_liked)
}

/// Reset `principal`'s unread counter for `partner`.
pub async fn mark_read(docs: &dyn DocumentStore, principal: &PrincipalId, partner: &PrincipalId) -> Result<()> {
    let copy = paths::match_copy(principal, partner)?;
    match docs
        .update_document(&copy, Fields::new().value("unreadMessages", 0))
        .await
    {
        Ok(()) => Ok(()),
        Err(StoreError::NotFound(_)) => Err(ClientError::NotMatched {
            principal: principal.clone(),
            partner: partner.clone(),
        }),
        Err(e) => Err(e.into()),
    }
}

/// An open chat screen.
///
/// Acquired with `Lovefinder::enter_chat`, which marks the conversation read
/// and opens the message subscription. Dropping the view, on any path,
/// releases the subscription; signing out ends it.
pub struct ChatView {
    docs: Arc<dyn DocumentStore>,
    files: Arc<dyn FileStore>,
    principal: PrincipalId,
    partner: PrincipalId,
    subscription: ChatSubscription,
    session: SessionGuard,
}

impl ChatView {
    pub(crate) async fn open(
        docs: Arc<dyn DocumentStore>,
        files: Arc<dyn FileStore>,
        principal: PrincipalId,
        partner: PrincipalId,
        session: SessionGuard,
    ) -> Result<Self> {
        mark_read(docs.as_ref(), &principal, &partner).await?;
        let subscription = open_session(docs.as_ref(), &principal, &partner).await?;
        Ok(Self {
            docs,
            files,
            principal,
            partner,
            subscription,
            session,
        })
    }

    pub fn chat_id(&self) -> &ChatId {
        self.subscription.chat_id()
    }

    pub fn partner(&self) -> &PrincipalId {
        &self.partner
    }

    /// Next refreshed message list; `None` after sign-out or once the
    /// subscription ends.
    pub async fn next_messages(&mut self) -> Option<Vec<ChatMessage>> {
        if !self.session.is_current() {
            return None;
        }
        tokio::select! {
            _ = self.session.ended() => None,
            messages = self.subscription.next() => messages,
        }
    }

    pub async fn send_text(&self, text: &str) -> Result<DocumentPath> {
        send_message(
            self.docs.as_ref(),
            self.chat_id(),
            &self.principal,
            MessagePayload::Text(text.to_string()),
        )
        .await
    }

    pub async fn send_image(&self, file_name: &str, data: Bytes) -> Result<DocumentPath> {
        send_image(
            self.docs.as_ref(),
            self.files.as_ref(),
            self.chat_id(),
            &self.principal,
            file_name,
            data,
        )
        .await
    }

    pub async fn toggle_reaction(&self, message_id: &str) -> Result<bool> {
        toggle_reaction(self.docs.as_ref(), self.chat_id(), message_id, &self.principal).await
    }

    /// Reset the unread counter again, e.g. after new messages were shown.
    pub async fn mark_read(&self) -> Result<()> {
        mark_read(self.docs.as_ref(), &self.principal, &self.partner).await
    }

    pub fn close(self) {}
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::likes::record_like;
    use crate::matching::check_and_create_match;
    use lovefinder_store::{MemoryDocumentStore, MemoryFileStore};

    fn id(s: &str) -> PrincipalId {
        PrincipalId::parse(s).unwrap()
    }

    async fn matched_pair(docs: &MemoryDocumentStore) -> (PrincipalId, PrincipalId, ChatId) {
        let (a, b) = (id("alice"), id("bob"));
        record_like(docs, &a, &b).await.unwrap();
        record_like(docs, &b, &a).await.unwrap();
        check_and_create_match(docs, &b, &a).await.unwrap();
        let chat_id = ChatId::for_pair(&a, &b).unwrap();
        (a, b, chat_id)
    }

    async fn unread(docs: &MemoryDocumentStore, who: &PrincipalId, partner: &PrincipalId) -> i64 {
        docs.get_document(&paths::match_copy(who, partner).unwrap())
            .await
            .unwrap()
            .unwrap()
            .get_i64("unreadMessages")
            .unwrap()
    }

    #[tokio::test]
    async fn send_bumps_partner_unread_and_mark_read_resets() {
        let docs = MemoryDocumentStore::new();
        let (a, b, chat_id) = matched_pair(&docs).await;

        send_message(&docs, &chat_id, &a, MessagePayload::Text("Hej!".into()))
            .await
            .unwrap();
        assert_eq!(unread(&docs, &b, &a).await, 1);
        assert_eq!(unread(&docs, &a, &b).await, 0);

        mark_read(&docs, &b, &a).await.unwrap();
        assert_eq!(unread(&docs, &b, &a).await, 0);
    }

    #[tokio::test]
    async fn subscription_delivers_ascending_order() {
        let docs = MemoryDocumentStore::new();
        let (a, b, chat_id) = matched_pair(&docs).await;

        for (sender, text) in [(&a, "ett"), (&b, "två"), (&a, "tre")] {
            send_message(&docs, &chat_id, sender, MessagePayload::Text(text.into()))
                .await
                .unwrap();
        }

        let mut session = open_session(&docs, &b, &a).await.unwrap();
        let listed = session.next().await.unwrap();
        let texts: Vec<_> = listed
            .iter()
            .map(|m| match &m.payload {
                MessagePayload::Text(t) => t.as_str(),
                MessagePayload::Image(_) => "",
            })
            .collect();
        assert_eq!(texts, ["ett", "två", "tre"]);
        assert!(listed.windows(2).all(|w| w[0].created_at < w[1].created_at));
        assert_eq!(listed, messages(&docs, &chat_id).await.unwrap());
    }

    #[tokio::test]
    async fn reaction_toggle_is_an_involution() {
        let docs = MemoryDocumentStore::new();
        let (a, b, chat_id) = matched_pair(&docs).await;
        let msg = send_message(&docs, &chat_id, &a, MessagePayload::Text("Hej".into()))
            .await
            .unwrap();

        assert!(toggle_reaction(&docs, &chat_id, msg.id(), &b).await.unwrap());
        assert_eq!(messages(&docs, &chat_id).await.unwrap()[0].likes, [b.clone()]);
        assert!(!toggle_reaction(&docs, &chat_id, msg.id(), &b).await.unwrap());
        assert!(messages(&docs, &chat_id).await.unwrap()[0].likes.is_empty());
    }

    #[tokio::test]
    async fn rejects_outsiders_empty_text_and_unmatched_pairs() {
        let docs = MemoryDocumentStore::new();
        let (a, _b, chat_id) = matched_pair(&docs).await;
        let eve = id("eve");

        assert!(matches!(
            send_message(&docs, &chat_id, &eve, MessagePayload::Text("hej".into())).await,
            Err(ClientError::NotParticipant { .. })
        ));
        assert!(matches!(
            send_message(&docs, &chat_id, &a, MessagePayload::Text("   ".into())).await,
            Err(ClientError::EmptyMessage)
        ));

        let lonely = ChatId::for_pair(&a, &eve).unwrap();
        assert!(matches!(
            send_message(&docs, &lonely, &a, MessagePayload::Text("hej".into())).await,
            Err(ClientError::NotMatched { .. })
        ));
        assert!(messages(&docs, &lonely).await.unwrap().is_empty());
        assert!(matches!(
            mark_read(&docs, &a, &eve).await,
            Err(ClientError::NotMatched { .. })
        ));
    }

    #[tokio::test]
    async fn image_message_carries_download_url() {
        let docs = MemoryDocumentStore::new();
        let files = MemoryFileStore::new("mem://files", 1024);
        let (a, _b, chat_id) = matched_pair(&docs).await;

        send_image(&docs, &files, &chat_id, &a, "solnedgång.jpg", Bytes::from_static(b"jpg"))
            .await
            .unwrap();

        let listed = messages(&docs, &chat_id).await.unwrap();
        match &listed[0].payload {
            MessagePayload::Image(url) => {
                assert!(url.starts_with("mem://files/chatImages/alice_bob/"));
                assert!(url.ends_with("_solnedgång.jpg"));
            }
            other => panic!("expected image, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn image_to_unmatched_partner_uploads_nothing() {
        let docs = MemoryDocumentStore::new();
        let files = MemoryFileStore::new("mem://files", 1024);
        let (a, b) = (id("alice"), id("bob"));
        let chat_id = ChatId::for_pair(&a, &b).unwrap();

        let err = send_image(&docs, &files, &chat_id, &a, "hej.jpg", Bytes::from_static(b"jpg"))
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            ClientError::NotMatched { ref principal, ref partner } if *principal == b && *partner == a
        ));
        assert!(files.list_folder("chatImages/alice_bob").await.unwrap().is_empty());
        assert!(messages(&docs, &chat_id).await.unwrap().is_empty());
    }
}
