/// Roster/conversation runtime the engine delivers into
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet};
use std::fmt;
use std::sync::Arc;
use tokio::sync::{broadcast, RwLock};
use tracing::warn;
use uuid::Uuid;

/// Handle of a multi-participant conversation created by the host
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ConversationId(pub String);

impl fmt::Display for ConversationId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Everything the engine may ask of the surrounding client
#[async_trait]
pub trait Host: Send + Sync {
    async fn has_buddy(&self, handle: &str) -> bool;

    async fn add_buddy(&self, handle: &str);

    async fn set_buddy_online(&self, handle: &str);

    async fn create_conversation(&self, title: &str) -> ConversationId;

    async fn has_participant(&self, conversation: &ConversationId, handle: &str) -> bool;

    async fn add_participant(&self, conversation: &ConversationId, handle: &str);

    async fn post_to_conversation(
        &self,
        conversation: &ConversationId,
        from: &str,
        text: &str,
        sent_at: Option<DateTime<Utc>>,
    );

    async fn post_direct(&self, from: &str, text: &str, sent_at: Option<DateTime<Utc>>);

    /// Surface an error to the user
    async fn raise_error(&self, message: &str);

    /// Whether the user-facing surface renders markup itself
    fn renders_markup(&self) -> bool;
}

/// Observable effect of a host call
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum HostEvent {
    BuddyAdded { handle: String },
    BuddyOnline { handle: String },
    ConversationCreated { conversation: ConversationId, title: String },
    ParticipantAdded { conversation: ConversationId, handle: String },
    GroupMessage {
        conversation: ConversationId,
        from: String,
        text: String,
        sent_at: Option<DateTime<Utc>>,
    },
    DirectMessage {
        from: String,
        text: String,
        sent_at: Option<DateTime<Utc>>,
    },
    Error { message: String },
}

#[derive(Default)]
struct MemoryState {
    buddies: HashMap<String, bool>,
    conversations: HashMap<ConversationId, Conversation>,
    events: Vec<HostEvent>,
}

#[derive(Debug, Clone)]
struct Conversation {
    title: String,
    participants: Vec<String>,
    members: HashSet<String>,
}

/// In-memory host: records every effect and optionally broadcasts it
#[derive(Clone)]
pub struct MemoryHost {
    state: Arc<RwLock<MemoryState>>,
    renders_markup: bool,
    events_tx: Option<broadcast::Sender<HostEvent>>,
    history_limit: Option<usize>,
}

impl MemoryHost {
    pub fn new() -> Self {
        Self {
            state: Arc::new(RwLock::new(MemoryState::default())),
            renders_markup: false,
            events_tx: None,
            history_limit: None,
        }
    }

    /// Declare that the destination renders markup natively
    pub fn with_markup(mut self, renders_markup: bool) -> Self {
        self.renders_markup = renders_markup;
        self
    }

    /// Fan events out to subscribers as they happen
    pub fn with_broadcast(mut self, capacity: usize) -> Self {
        let (tx, _) = broadcast::channel(capacity);
        self.events_tx = Some(tx);
        self
    }

    /// Keep only the most recent `limit` events in memory
    pub fn with_history_limit(mut self, limit: usize) -> Self {
        self.history_limit = Some(limit);
        self
    }

    pub fn subscribe(&self) -> Option<broadcast::Receiver<HostEvent>> {
        self.events_tx.as_ref().map(|tx| tx.subscribe())
    }

    pub async fn events(&self) -> Vec<HostEvent> {
        self.state.read().await.events.clone()
    }

    pub async fn buddies(&self) -> Vec<String> {
        let mut out: Vec<String> = self.state.read().await.buddies.keys().cloned().collect();
        out.sort();
        out
    }

    pub async fn is_online(&self, handle: &str) -> bool {
        self.state.read().await.buddies.get(handle).copied().unwrap_or(false)
    }

    pub async fn conversation_count(&self) -> usize {
        self.state.read().await.conversations.len()
    }

    pub async fn participants(&self, conversation: &ConversationId) -> Vec<String> {
        self.state
            .read()
            .await
            .conversations
            .get(conversation)
            .map(|c| c.participants.clone())
            .unwrap_or_default()
    }

    pub async fn conversation_title(&self, conversation: &ConversationId) -> Option<String> {
        self.state
            .read()
            .await
            .conversations
            .get(conversation)
            .map(|c| c.title.clone())
    }

    pub async fn errors(&self) -> Vec<String> {
        self.state
            .read()
            .await
            .events
            .iter()
            .filter_map(|e| match e {
                HostEvent::Error { message } => Some(message.clone()),
                _ => None,
            })
            .collect()
    }

    fn record(&self, state: &mut MemoryState, event: HostEvent) {
        if let Some(tx) = &self.events_tx {
            // no subscribers is fine
            let _ = tx.send(event.clone());
        }
        state.events.push(event);
        if let Some(limit) = self.history_limit {
            if state.events.len() > limit {
                let excess = state.events.len() - limit;
                state.events.drain(..excess);
            }
        }
    }
}

impl Default for MemoryHost {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Host for MemoryHost {
    async fn has_buddy(&self, handle: &str) -> bool {
        self.state.read().await.buddies.contains_key(handle)
    }

    async fn add_buddy(&self, handle: &str) {
        let mut state = self.state.write().await;
        if state.buddies.contains_key(handle) {
            return;
        }
        state.buddies.insert(handle.to_string(), false);
        self.record(&mut state, HostEvent::BuddyAdded { handle: handle.to_string() });
    }

    async fn set_buddy_online(&self, handle: &str) {
        let mut state = self.state.write().await;
        if let Some(online) = state.buddies.get_mut(handle) {
            *online = true;
            self.record(&mut state, HostEvent::BuddyOnline { handle: handle.to_string() });
        }
    }

    async fn create_conversation(&self, title: &str) -> ConversationId {
        let id = ConversationId(Uuid::new_v4().to_string());
        let mut state = self.state.write().await;
        state.conversations.insert(
            id.clone(),
            Conversation {
                title: title.to_string(),
                participants: Vec::new(),
                members: HashSet::new(),
            },
        );
        self.record(
            &mut state,
            HostEvent::ConversationCreated {
                conversation: id.clone(),
                title: title.to_string(),
            },
        );
        id
    }

    async fn has_participant(&self, conversation: &ConversationId, handle: &str) -> bool {
        self.state
            .read()
            .await
            .conversations
            .get(conversation)
            .map(|c| c.members.contains(handle))
            .unwrap_or(false)
    }

    async fn add_participant(&self, conversation: &ConversationId, handle: &str) {
        let mut state = self.state.write().await;
        let added = match state.conversations.get_mut(conversation) {
            Some(c) => {
                let fresh = c.members.insert(handle.to_string());
                if fresh {
                    c.participants.push(handle.to_string());
                }
                fresh
            }
            None => {
                warn!("Participant {} for unknown conversation {}", handle, conversation);
                false
            }
        };
        if added {
            self.record(
                &mut state,
                HostEvent::ParticipantAdded {
                    conversation: conversation.clone(),
                    handle: handle.to_string(),
                },
            );
        }
    }

    async fn post_to_conversation(
        &self,
        conversation: &ConversationId,
        from: &str,
        text: &str,
        sent_at: Option<DateTime<Utc>>,
    ) {
        let mut state = self.state.write().await;
        if !state.conversations.contains_key(conversation) {
            warn!(
                "Message from/to conversation {}@{} (unknown conv/user): {}",
                from, conversation, text
            );
            return;
        }
        self.record(
            &mut state,
            HostEvent::GroupMessage {
                conversation: conversation.clone(),
                from: from.to_string(),
                text: text.to_string(),
                sent_at,
            },
        );
    }

    async fn post_direct(&self, from: &str, text: &str, sent_at: Option<DateTime<Utc>>) {
        let mut state = self.state.write().await;
        self.record(
            &mut state,
            HostEvent::DirectMessage {
                from: from.to_string(),
                text: text.to_string(),
                sent_at,
            },
        );
    }

    async fn raise_error(&self, message: &str) {
        let mut state = self.state.write().await;
        self.record(&mut state, HostEvent::Error { message: message.to_string() });
    }

    fn renders_markup(&self) -> bool {
        self.renders_markup
    }
}
