//! Live badge counts for the navigation bar.

use std::collections::BTreeSet;

use lovefinder_shared::constants::{LIKES_RECEIVED, MATCHES, SKIPPED};
use lovefinder_shared::PrincipalId;
use lovefinder_store::{DocumentStore, Query, Snapshot, Subscription};

use crate::error::Result;
use crate::models::NavCounters;
use crate::paths;
use crate::subscription::{next_ok, SessionGuard};

fn ids(snapshot: &Snapshot) -> BTreeSet<String> {
    snapshot.ids().into_iter().map(str::to_string).collect()
}

/// Follows the viewer's matches, received likes and skips.
pub struct NavWatcher {
    matches: Subscription,
    received: Subscription,
    skipped: Subscription,
    match_ids: BTreeSet<String>,
    received_ids: BTreeSet<String>,
    skipped_ids: BTreeSet<String>,
    session: SessionGuard,
}

impl NavWatcher {
    /// Subscribe and wait for the initial contents of all three collections.
    pub(crate) async fn open(docs: &dyn DocumentStore, me: &PrincipalId, session: SessionGuard) -> Result<Self> {
        let mut matches = docs
            .subscribe_collection(&paths::relation(me, MATCHES)?, Query::new())
            .await?;
        let mut received = docs
            .subscribe_collection(&paths::relation(me, LIKES_RECEIVED)?, Query::new())
            .await?;
        let mut skipped = docs
            .subscribe_collection(&paths::relation(me, SKIPPED)?, Query::new())
            .await?;

        let match_ids = initial(&mut matches).await?;
        let received_ids = initial(&mut received).await?;
        let skipped_ids = initial(&mut skipped).await?;

        Ok(Self {
            matches,
            received,
            skipped,
            match_ids,
            received_ids,
            skipped_ids,
            session,
        })
    }

    pub fn current(&self) -> NavCounters {
        NavCounters {
            matches: self.match_ids.len(),
            likes: self.received_ids.difference(&self.skipped_ids).count(),
        }
    }

    /// Counters after the next change to any of the collections. `None`
    /// after sign-out or once a subscription ends.
    pub async fn next(&mut self) -> Option<NavCounters> {
        if !self.session.is_current() {
            return None;
        }
        tokio::select! {
            _ = self.session.ended() => return None,
            snapshot = next_ok(&mut self.matches) => self.match_ids = ids(&snapshot?),
            snapshot = next_ok(&mut self.received) => self.received_ids = ids(&snapshot?),
            snapshot = next_ok(&mut self.skipped) => self.skipped_ids = ids(&snapshot?),
        }
        Some(self.current())
    }

    pub fn close(self) {}
}

async fn initial(sub: &mut Subscription) -> Result<BTreeSet<String>> {
    match sub.next_snapshot().await {
        Some(Ok(snapshot)) => Ok(ids(&snapshot)),
        Some(Err(e)) => Err(e.into()),
        None => Ok(BTreeSet::new()),
    }
}
