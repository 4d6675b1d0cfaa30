//! The viewer's match list, one-shot and live.

use std::sync::Arc;

use futures::future::try_join_all;
use lovefinder_shared::constants::MATCHES;
use lovefinder_shared::{ChatId, PrincipalId};
use lovefinder_store::{Direction, Document, DocumentStore, Query, Subscription};
use tracing::debug;

use crate::error::Result;
use crate::models::{MatchSummary, UserDocument};
use crate::paths;
use crate::subscription::{next_ok, SessionGuard};

fn newest_first() -> Query {
    Query::new().order_by("timestamp", Direction::Descending)
}

/// Join match copies with the partners' profiles. Partners that are gone or
/// tombstoned are left out.
async fn summaries(docs: &dyn DocumentStore, me: &PrincipalId, copies: &[Document]) -> Result<Vec<MatchSummary>> {
    let joined = try_join_all(copies.iter().map(|copy| summary(docs, me, copy))).await?;
    Ok(joined.into_iter().flatten().collect())
}

async fn summary(docs: &dyn DocumentStore, me: &PrincipalId, copy: &Document) -> Result<Option<MatchSummary>> {
    let Ok(partner) = PrincipalId::parse(copy.id()) else {
        return Ok(None);
    };
    let chat_id = match copy.get_str("chatId").map(ChatId::parse) {
        Some(Ok(id)) => id,
        _ => ChatId::for_pair(me, &partner)?,
    };
    let Some(doc) = docs.get_document(&paths::user(&partner)?).await? else {
        debug!(partner = %partner.short(), "Match partner has no profile");
        return Ok(None);
    };
    let user: UserDocument = match doc.decode() {
        Ok(user) => user,
        Err(e) => {
            debug!(partner = %partner.short(), error = %e, "Skipping unreadable profile");
            return Ok(None);
        }
    };
    if !user.is_active() {
        return Ok(None);
    }
    Ok(Some(MatchSummary {
        chat_id,
        display_name: user.display_name,
        profile_image: user.profile_image,
        unread_messages: copy.get_i64("unreadMessages").unwrap_or(0),
        partner,
    }))
}

/// The viewer's matches, newest first.
pub async fn matches(docs: &dyn DocumentStore, me: &PrincipalId) -> Result<Vec<MatchSummary>> {
    let copies = docs
        .list_collection(&paths::relation(me, MATCHES)?, &newest_first())
        .await?;
    summaries(docs, me, &copies).await
}

/// Live match list for the signed-in principal.
pub struct MatchesWatcher {
    docs: Arc<dyn DocumentStore>,
    me: PrincipalId,
    subscription: Subscription,
    session: SessionGuard,
}

impl MatchesWatcher {
    pub(crate) async fn open(docs: Arc<dyn DocumentStore>, me: PrincipalId, session: SessionGuard) -> Result<Self> {
        let subscription = docs
            .subscribe_collection(&paths::relation(&me, MATCHES)?, newest_first())
            .await?;
        Ok(Self {
            docs,
            me,
            subscription,
            session,
        })
    }

    /// The match list after the next change; the first call yields the
    /// current list. `None` after sign-out or once the subscription ends.
    pub async fn next(&mut self) -> Option<Result<Vec<MatchSummary>>> {
        if !self.session.is_current() {
            return None;
        }
        let snapshot = tokio::select! {
            _ = self.session.ended() => return None,
            snapshot = next_ok(&mut self.subscription) => snapshot?,
        };
        Some(summaries(self.docs.as_ref(), &self.me, &snapshot.documents).await)
    }

    pub fn close(self) {}
}
