/// Per-account session state and the live-session registry
use crate::host::ConversationId;
use crate::transport::Credentials;
use crate::watermark::Watermark;
use std::collections::HashSet;
use std::sync::Arc;
use tokio::sync::RwLock;
use tracing::debug;
use uuid::Uuid;

pub type SessionId = Uuid;

/// State owned by one account connection
#[derive(Debug, Clone)]
pub struct SessionState {
    pub handle: String,
    pub secret: String,
    pub timeline_watermark: Watermark,
    /// Shared timeline conversation, created on first grouped delivery
    pub group_conversation: Option<ConversationId>,
}

impl SessionState {
    pub fn new(handle: String, secret: String) -> Self {
        Self {
            handle,
            secret,
            timeline_watermark: Watermark::new(),
            group_conversation: None,
        }
    }

    pub fn credentials(&self) -> Credentials {
        Credentials {
            user: self.handle.clone(),
            secret: self.secret.clone(),
        }
    }
}

/// Set of sessions that are still connected
///
/// Written by whoever manages connection lifecycles; the ingestion code only
/// asks for membership.
#[derive(Clone, Default)]
pub struct SessionRegistry {
    live: Arc<RwLock<HashSet<SessionId>>>,
}

impl SessionRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn register(&self, id: SessionId) {
        self.live.write().await.insert(id);
    }

    pub async fn unregister(&self, id: SessionId) -> bool {
        self.live.write().await.remove(&id)
    }

    pub async fn is_live(&self, id: SessionId) -> bool {
        self.live.read().await.contains(&id)
    }

    pub async fn len(&self) -> usize {
        self.live.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.live.read().await.is_empty()
    }
}

/// Membership check every completion handler runs before acting
#[derive(Clone)]
pub struct LivenessGuard {
    registry: SessionRegistry,
    session: SessionId,
}

impl LivenessGuard {
    pub fn new(registry: SessionRegistry, session: SessionId) -> Self {
        Self { registry, session }
    }

    pub fn session(&self) -> SessionId {
        self.session
    }

    /// True while the session may still be mutated; logs discards
    pub async fn admit(&self, what: &str) -> bool {
        let live = self.registry.is_live(self.session).await;
        if !live {
            debug!("Discarding {} completion for ended session {}", what, self.session);
        }
        live
    }
}
