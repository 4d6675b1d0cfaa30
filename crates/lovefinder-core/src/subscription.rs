//! Lifecycle of live queries held by the client.
//!
//! Every live view owns its store [`Subscription`]s and a [`SessionGuard`];
//! dropping the view releases the subscriptions, and signing out ends the
//! view on its next poll.

use lovefinder_shared::PrincipalId;
use lovefinder_store::{CollectionPath, Snapshot, StoreError, Subscription};
use tokio::sync::watch;
use tracing::{debug, error};

/// Log a subscription failure. Not-found and permission-denied are what a
/// subscriber sees when its principal signs out, so they stay at debug.
pub fn log_subscription_error(collection: &CollectionPath, e: &StoreError) {
    if e.is_expected_on_sign_out() {
        debug!(collection = %collection, error = %e, "Subscription ended");
    } else {
        error!(collection = %collection, error = %e, "Subscription failed");
    }
}

/// Next snapshot, or `None` once the subscription has ended for any reason.
pub async fn next_ok(sub: &mut Subscription) -> Option<Snapshot> {
    match sub.next_snapshot().await? {
        Ok(snapshot) => Some(snapshot),
        Err(e) => {
            log_subscription_error(sub.collection(), &e);
            None
        }
    }
}

/// Resolves once the principal a view was opened for is no longer the
/// signed-in one.
pub struct SessionGuard {
    rx: watch::Receiver<Option<PrincipalId>>,
    principal: PrincipalId,
}

impl SessionGuard {
    pub fn new(rx: watch::Receiver<Option<PrincipalId>>, principal: PrincipalId) -> Self {
        Self { rx, principal }
    }

    pub fn is_current(&self) -> bool {
        self.rx.borrow().as_ref() == Some(&self.principal)
    }

    pub async fn ended(&mut self) {
        loop {
            if self.rx.borrow_and_update().as_ref() != Some(&self.principal) {
                return;
            }
            if self.rx.changed().await.is_err() {
                return;
            }
        }
    }
}
