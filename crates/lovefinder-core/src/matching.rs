//! Turning a pair of likes into a match and a chat session.

use lovefinder_shared::constants::LIKES_GIVEN;
use lovefinder_shared::{ChatId, PrincipalId};
use lovefinder_store::{DocumentStore, Fields, SetOptions, WriteBatch, WriteOutcome};
use serde_json::json;
use tracing::{debug, info};

use crate::error::Result;
use crate::paths;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MatchOutcome {
    /// The other side has not liked back (yet).
    NoMatch,
    Matched {
        chat_id: ChatId,
        /// This call created the chat session; `false` if it already existed.
        session_created: bool,
    },
}

impl MatchOutcome {
    pub fn is_match(&self) -> bool {
        matches!(self, MatchOutcome::Matched { .. })
    }
}

fn match_fields(chat_id: &ChatId) -> Fields {
    let [first, second] = chat_id.participants();
    Fields::new()
        .value("users", json!([first.as_str(), second.as_str()]))
        .value("chatId", chat_id.to_string())
        .server_timestamp("timestamp")
        // Starts the counter at zero without resetting an existing one.
        .increment("unreadMessages", 0)
}

/// Run right after `from` liked `to`. If `to` already likes `from`, write
/// both match copies and create the chat session, all in one batch. Safe
/// to repeat and to race: the session is only ever created once.
pub async fn check_and_create_match(
    docs: &dyn DocumentStore,
    from: &PrincipalId,
    to: &PrincipalId,
) -> Result<MatchOutcome> {
    let reverse = paths::relation_doc(to, LIKES_GIVEN, from)?;
    if docs.get_document(&reverse).await?.is_none() {
        debug!(from = %from.short(), to = %to.short(), "No reverse like");
        return Ok(MatchOutcome::NoMatch);
    }

    let chat_id = ChatId::for_pair(from, to)?;
    let [first, second] = chat_id.participants();
    let batch = WriteBatch::new()
        .set(paths::match_copy(from, to)?, match_fields(&chat_id), SetOptions::merge())
        .set(paths::match_copy(to, from)?, match_fields(&chat_id), SetOptions::merge())
        .create_if_absent(
            paths::chat(&chat_id)?,
            Fields::new()
                .value("participants", json!([first.as_str(), second.as_str()]))
                .server_timestamp("createdAt"),
        );
    let outcomes = docs.commit(batch).await?;
    let session_created = outcomes.get(2) == Some(&WriteOutcome::Written);

    info!(chat = %chat_id, session_created, "Match created");
    Ok(MatchOutcome::Matched {
        chat_id,
        session_created,
    })
}

/// Whether `uid` holds a match copy for `partner`.
pub async fn is_matched(docs: &dyn DocumentStore, uid: &PrincipalId, partner: &PrincipalId) -> Result<bool> {
    Ok(docs.get_document(&paths::match_copy(uid, partner)?).await?.is_some())
}
