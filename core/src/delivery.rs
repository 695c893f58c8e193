/// Routing of decoded statuses into grouped or direct conversations
use crate::format::{format_message, StripPolicy};
use crate::host::{ConversationId, Host};
use crate::materialize::Status;
use crate::roster::Roster;
use crate::session::SessionState;
use crate::watermark::Watermark;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tokio::sync::RwLock;
use tracing::{debug, info, warn};

/// Title of the shared timeline conversation
pub const TIMELINE_CONVERSATION: &str = "home/timeline";

/// How timeline statuses reach the user
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DeliveryMode {
    /// One shared conversation with every author as participant
    Grouped,
    /// One private message per status
    Direct,
}

pub struct DeliveryRouter {
    host: Arc<dyn Host>,
    roster: Roster,
    mode: DeliveryMode,
    strip: StripPolicy,
}

impl DeliveryRouter {
    pub fn new(host: Arc<dyn Host>, mode: DeliveryMode, strip: StripPolicy) -> Self {
        let roster = Roster::new(host.clone());
        Self {
            host,
            roster,
            mode,
            strip,
        }
    }

    pub fn mode(&self) -> DeliveryMode {
        self.mode
    }

    /// Deliver one page, oldest status first, advancing the watermark
    ///
    /// `seen` is the watermark as it stood before the fetch began; statuses it
    /// covers were delivered by an earlier fetch and are dropped. Older ids on
    /// continuation pages of the same fetch still go out.
    pub async fn deliver_page(
        &self,
        state: &RwLock<SessionState>,
        seen: Watermark,
        mut statuses: Vec<Status>,
    ) {
        // stable, so equal ids keep materialized order
        statuses.sort_by_key(|s| s.id);
        statuses.dedup_by(|a, b| a.id != 0 && a.id == b.id);

        for status in &statuses {
            // the since_id filter is best-effort; the server may resend
            if seen.covers(status.id) {
                debug!("Skipping already delivered status {}", status.id);
                continue;
            }
            match self.mode {
                DeliveryMode::Grouped => self.grouped_deliver(state, status).await,
                DeliveryMode::Direct => self.direct_deliver(state, status).await,
            }
        }
    }

    /// Post into the shared conversation, creating it on first use
    pub async fn grouped_deliver(&self, state: &RwLock<SessionState>, status: &Status) {
        let conversation = self.timeline_conversation(state).await;
        let author = status.author.handle.as_str();

        if author.is_empty() {
            warn!(
                "Message from/to conversation {}@{} (unknown conv/user): {}",
                author, conversation, status.text
            );
            advance_watermark(state, status.id).await;
            return;
        }

        self.roster.ensure_buddy(author).await;
        if !self.host.has_participant(&conversation, author).await {
            self.host.add_participant(&conversation, author).await;
        }

        let text = format_message(&status.text, self.strip, self.host.renders_markup());
        self.host
            .post_to_conversation(&conversation, author, &text, status.sent_at())
            .await;

        advance_watermark(state, status.id).await;
    }

    /// Post as a private message from the author; roster is left alone
    pub async fn direct_deliver(&self, state: &RwLock<SessionState>, status: &Status) {
        let text = format_message(&status.text, self.strip, self.host.renders_markup());
        self.host
            .post_direct(&status.author.handle, &text, status.sent_at())
            .await;

        advance_watermark(state, status.id).await;
    }

    async fn timeline_conversation(&self, state: &RwLock<SessionState>) -> ConversationId {
        let mut state = state.write().await;
        if let Some(existing) = &state.group_conversation {
            return existing.clone();
        }

        let conversation = self.host.create_conversation(TIMELINE_CONVERSATION).await;
        self.host.add_participant(&conversation, &state.handle).await;
        info!("Created {} conversation {}", TIMELINE_CONVERSATION, conversation);
        state.group_conversation = Some(conversation.clone());
        conversation
    }
}

async fn advance_watermark(state: &RwLock<SessionState>, id: u64) {
    let mut state = state.write().await;
    if state.timeline_watermark.observe(id) {
        debug!("Timeline watermark advanced to {}", id);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::host::{HostEvent, MemoryHost};
    use crate::materialize::User;

    fn status(id: u64, handle: &str, text: &str) -> Status {
        Status {
            id,
            created_at: String::new(),
            text: text.to_string(),
            author: User {
                display_name: String::new(),
                handle: handle.to_string(),
            },
        }
    }

    fn state() -> RwLock<SessionState> {
        RwLock::new(SessionState::new("me".to_string(), "secret".to_string()))
    }

    async fn seen(state: &RwLock<SessionState>) -> Watermark {
        state.read().await.timeline_watermark
    }

    #[tokio::test]
    async fn test_grouped_creates_conversation_once() {
        let host = Arc::new(MemoryHost::new());
        let router = DeliveryRouter::new(host.clone(), DeliveryMode::Grouped, StripPolicy::Auto);
        let state = state();

        router
            .deliver_page(&state, seen(&state).await, vec![status(2, "alice", "one"), status(1, "bob", "two")])
            .await;
        router.deliver_page(&state, seen(&state).await, vec![status(3, "alice", "three")]).await;

        assert_eq!(host.conversation_count().await, 1);
        let conv = state.read().await.group_conversation.clone().unwrap();
        assert_eq!(host.participants(&conv).await, vec!["me", "bob", "alice"]);
        assert_eq!(state.read().await.timeline_watermark.get(), Some(3));
    }

    #[tokio::test]
    async fn test_direct_does_not_touch_roster() {
        let host = Arc::new(MemoryHost::new());
        let router = DeliveryRouter::new(host.clone(), DeliveryMode::Direct, StripPolicy::Always);
        let state = state();

        router.deliver_page(&state, seen(&state).await, vec![status(7, "carol", "<b>hi</b>")]).await;

        assert!(host.buddies().await.is_empty());
        assert_eq!(host.conversation_count().await, 0);
        assert_eq!(
            host.events().await,
            vec![HostEvent::DirectMessage {
                from: "carol".to_string(),
                text: "hi".to_string(),
                sent_at: None,
            }]
        );
        assert_eq!(state.read().await.timeline_watermark.get(), Some(7));
    }

    #[tokio::test]
    async fn test_already_seen_ids_are_not_redelivered() {
        let host = Arc::new(MemoryHost::new());
        let router = DeliveryRouter::new(host.clone(), DeliveryMode::Direct, StripPolicy::Never);
        let state = state();

        router.deliver_page(&state, seen(&state).await, vec![status(9, "a", "nine")]).await;
        router
            .deliver_page(&state, seen(&state).await, vec![status(9, "a", "nine"), status(7, "b", "seven"), status(12, "c", "twelve")])
            .await;

        assert_eq!(host.events().await.len(), 2);
        assert_eq!(state.read().await.timeline_watermark.get(), Some(12));
    }

    #[tokio::test]
    async fn test_page_is_delivered_oldest_first() {
        let host = Arc::new(MemoryHost::new());
        let router = DeliveryRouter::new(host.clone(), DeliveryMode::Direct, StripPolicy::Never);
        let state = state();

        router
            .deliver_page(
                &state,
                seen(&state).await,
                vec![status(5, "a", "five"), status(3, "b", "three"), status(9, "c", "nine")],
            )
            .await;

        let texts: Vec<String> = host
            .events()
            .await
            .into_iter()
            .filter_map(|e| match e {
                HostEvent::DirectMessage { text, .. } => Some(text),
                _ => None,
            })
            .collect();
        assert_eq!(texts, vec!["three", "five", "nine"]);
        assert_eq!(state.read().await.timeline_watermark.get(), Some(9));
    }

    #[tokio::test]
    async fn test_older_ids_after_mark_moved_in_same_fetch_are_delivered() {
        let host = Arc::new(MemoryHost::new());
        let router = DeliveryRouter::new(host.clone(), DeliveryMode::Direct, StripPolicy::Never);
        let state = state();
        let before = seen(&state).await;

        router
            .deliver_page(&state, before, vec![status(10, "a", "ten"), status(9, "b", "nine")])
            .await;
        router
            .deliver_page(&state, before, vec![status(8, "c", "eight"), status(7, "d", "seven")])
            .await;

        assert_eq!(host.events().await.len(), 4);
        assert_eq!(state.read().await.timeline_watermark.get(), Some(10));
    }

    #[tokio::test]
    async fn test_grouped_status_without_author_is_not_posted() {
        let host = Arc::new(MemoryHost::new());
        let router = DeliveryRouter::new(host.clone(), DeliveryMode::Grouped, StripPolicy::Never);
        let state = state();

        router
            .deliver_page(&state, seen(&state).await, vec![status(4, "", "orphan")])
            .await;

        let conv = state.read().await.group_conversation.clone().unwrap();
        assert_eq!(host.participants(&conv).await, vec!["me"]);
        assert!(host.buddies().await.is_empty());
        assert!(!host
            .events()
            .await
            .iter()
            .any(|e| matches!(e, HostEvent::GroupMessage { .. })));
        assert_eq!(state.read().await.timeline_watermark.get(), Some(4));
    }
}
