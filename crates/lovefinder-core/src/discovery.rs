//! Candidate and admirer listings.
//!
//! Tombstoned principals and principals the viewer skipped never show up.

use lovefinder_shared::constants::{LIKES_GIVEN, LIKES_RECEIVED, SKIPPED};
use lovefinder_shared::PrincipalId;
use lovefinder_store::{Direction, DocumentStore, Query};
use tracing::debug;

use crate::error::Result;
use crate::likes::relation_ids;
use crate::models::{Candidate, GenderFilter, UserDocument};
use crate::paths;

/// Every other active principal the viewer has not skipped, filtered by
/// gender, with a flag for those already liked.
pub async fn candidates(docs: &dyn DocumentStore, me: &PrincipalId, filter: &GenderFilter) -> Result<Vec<Candidate>> {
    let liked = relation_ids(docs, me, LIKES_GIVEN).await?;
    let skipped = relation_ids(docs, me, SKIPPED).await?;
    let users = docs.list_collection(&paths::users()?, &Query::new()).await?;

    let mut out = Vec::new();
    for doc in users {
        let Ok(id) = PrincipalId::parse(doc.id()) else {
            continue;
        };
        if &id == me || skipped.contains(&id) {
            continue;
        }
        let user: UserDocument = match doc.decode() {
            Ok(user) => user,
            Err(e) => {
                debug!(principal = %id.short(), error = %e, "Skipping unreadable profile");
                continue;
            }
        };
        if !user.is_active() || !filter.accepts(user.gender().as_deref()) {
            continue;
        }
        let liked = liked.contains(&id);
        out.push(Candidate::new(id, &user, liked));
    }
    Ok(out)
}

/// Principals whose like the viewer received, newest first, minus skipped
/// and tombstoned ones.
pub async fn admirers(docs: &dyn DocumentStore, me: &PrincipalId) -> Result<Vec<Candidate>> {
    let liked = relation_ids(docs, me, LIKES_GIVEN).await?;
    let skipped = relation_ids(docs, me, SKIPPED).await?;
    let received = docs
        .list_collection(
            &paths::relation(me, LIKES_RECEIVED)?,
            &Query::new().order_by("timestamp", Direction::Descending),
        )
        .await?;

    let mut out = Vec::new();
    for like in received {
        let Ok(from) = PrincipalId::parse(like.id()) else {
            continue;
        };
        if skipped.contains(&from) {
            continue;
        }
        let Some(doc) = docs.get_document(&paths::user(&from)?).await? else {
            continue;
        };
        let Ok(user) = doc.decode::<UserDocument>() else {
            continue;
        };
        if !user.is_active() {
            continue;
        }
        let liked = liked.contains(&from);
        out.push(Candidate::new(from, &user, liked));
    }
    Ok(out)
}
