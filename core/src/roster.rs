/// Buddy roster reconciliation
use crate::host::Host;
use std::sync::Arc;
use tracing::{debug, info};

/// Adds remotely observed identities to the local roster, once each
///
/// Entries are never removed here.
#[derive(Clone)]
pub struct Roster {
    host: Arc<dyn Host>,
}

impl Roster {
    pub fn new(host: Arc<dyn Host>) -> Self {
        Self { host }
    }

    /// Add `handle` and mark it online unless it is already present
    ///
    /// Returns whether the buddy was added.
    pub async fn ensure_buddy(&self, handle: &str) -> bool {
        if handle.is_empty() {
            debug!("Skipping buddy with empty handle");
            return false;
        }
        if self.host.has_buddy(handle).await {
            return false;
        }
        self.host.add_buddy(handle).await;
        self.host.set_buddy_online(handle).await;
        info!("Added buddy {}", handle);
        true
    }
}
