//! Recording likes and skips.
//!
//! A like is kept twice, as `likesGiven/{to}` under the liker and
//! `likesReceived/{from}` under the liked principal. Both copies are written
//! in one batch, keyed by the counterpart so repeating a like only refreshes
//! its timestamp.

use std::collections::BTreeSet;

use lovefinder_shared::constants::{LIKES_GIVEN, LIKES_RECEIVED, SKIPPED};
use lovefinder_shared::PrincipalId;
use lovefinder_store::{DocumentStore, Fields, Query, SetOptions, WriteBatch};
use tracing::info;

use crate::error::{ClientError, Result};
use crate::paths;

pub async fn record_like(docs: &dyn DocumentStore, from: &PrincipalId, to: &PrincipalId) -> Result<()> {
    if from == to {
        return Err(ClientError::SelfInteraction);
    }

    let batch = WriteBatch::new()
        .set(
            paths::relation_doc(to, LIKES_RECEIVED, from)?,
            Fields::new()
                .value("fromUserId", from.as_str())
                .server_timestamp("timestamp"),
            SetOptions::replace(),
        )
        .set(
            paths::relation_doc(from, LIKES_GIVEN, to)?,
            Fields::new()
                .value("toUserId", to.as_str())
                .server_timestamp("timestamp"),
            SetOptions::replace(),
        );
    docs.commit(batch).await?;

    info!(from = %from.short(), to = %to.short(), "Like recorded");
    Ok(())
}

/// Hide `to` from `from`'s listings for good.
pub async fn record_skip(docs: &dyn DocumentStore, from: &PrincipalId, to: &PrincipalId) -> Result<()> {
    if from == to {
        return Err(ClientError::SelfInteraction);
    }

    docs.set_document(
        &paths::relation_doc(from, SKIPPED, to)?,
        Fields::new().server_timestamp("timestamp"),
        SetOptions::replace(),
    )
    .await?;

    info!(from = %from.short(), to = %to.short(), "Skip recorded");
    Ok(())
}

/// Ids of the documents in one of `uid`'s relation collections.
pub async fn relation_ids(
    docs: &dyn DocumentStore,
    uid: &PrincipalId,
    collection: &str,
) -> Result<BTreeSet<PrincipalId>> {
    let listed = docs
        .list_collection(&paths::relation(uid, collection)?, &Query::new())
        .await?;
    Ok(listed
        .iter()
        .filter_map(|d| PrincipalId::parse(d.id()).ok())
        .collect())
}
