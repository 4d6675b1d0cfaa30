use lovefinder_shared::{ChatId, PrincipalId};
use serde::Serialize;
use tokio::sync::broadcast;

/// Notifications for the UI layer, delivered on a broadcast channel.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "type", rename_all = "camelCase")]
pub enum ClientEvent {
    SignedIn { principal: PrincipalId },
    SignedOut { principal: PrincipalId },
    LikeRecorded { from: PrincipalId, to: PrincipalId },
    SkipRecorded { from: PrincipalId, to: PrincipalId },
    /// Both directions of a like now exist; the UI shows a match notice.
    MatchCreated { partner: PrincipalId, chat_id: ChatId },
    MessageSent { chat_id: ChatId, sender: PrincipalId },
    AccountDeleted { principal: PrincipalId },
}

impl ClientEvent {
    pub fn name(&self) -> &'static str {
        match self {
            ClientEvent::SignedIn { .. } => "signed-in",
            ClientEvent::SignedOut { .. } => "signed-out",
            ClientEvent::LikeRecorded { .. } => "like-recorded",
            ClientEvent::SkipRecorded { .. } => "skip-recorded",
            ClientEvent::MatchCreated { .. } => "match-created",
            ClientEvent::MessageSent { .. } => "message-sent",
            ClientEvent::AccountDeleted { .. } => "account-deleted",
        }
    }
}

pub fn emit_event(tx: &broadcast::Sender<ClientEvent>, event: ClientEvent) {
    let name = event.name();
    if tx.send(event).is_err() {
        tracing::trace!(event = name, "No event listeners");
    } else {
        tracing::debug!(event = name, "Event emitted");
    }
}
