/// Cursor-driven pagination over listing endpoints
use crate::error::{BirdfeedError, Result};
use crate::host::Host;
use crate::materialize::{decode_list, ListKind, ResponseList};
use crate::session::LivenessGuard;
use crate::transport::{ApiRequest, Credentials, Transport};
use crate::xml::{self, XmlNode};
use tracing::{debug, warn};

/// A listing endpoint the engine pages through
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Endpoint {
    /// Used in user-visible errors
    pub label: &'static str,
    pub path: &'static str,
    pub kind: ListKind,
}

pub const FRIENDS_IDS: Endpoint = Endpoint {
    label: "friends",
    path: "/friends/ids.xml",
    kind: ListKind::OpaqueId,
};

pub const HOME_TIMELINE: Endpoint = Endpoint {
    label: "home/timeline",
    path: "/statuses/home_timeline.xml",
    kind: ListKind::Status,
};

pub const STATUSES_FRIENDS: Endpoint = Endpoint {
    label: "friends",
    path: "/statuses/friends.xml",
    kind: ListKind::User,
};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ChainState {
    /// Next fetch goes out with this cursor (None on the first page)
    Ready(Option<u64>),
    Finished,
}

/// One cursor chain; pages are handed out one at a time, never accumulated
///
/// Chains share no state with each other, so several may run for the same
/// session.
pub struct Chain<'a> {
    endpoint: Endpoint,
    transport: &'a dyn Transport,
    host: &'a dyn Host,
    guard: &'a LivenessGuard,
    state: ChainState,
    pages_fetched: usize,
}

impl<'a> Chain<'a> {
    pub fn new(
        endpoint: Endpoint,
        transport: &'a dyn Transport,
        host: &'a dyn Host,
        guard: &'a LivenessGuard,
    ) -> Self {
        Self {
            endpoint,
            transport,
            host,
            guard,
            state: ChainState::Ready(None),
            pages_fetched: 0,
        }
    }

    pub fn pages_fetched(&self) -> usize {
        self.pages_fetched
    }

    pub fn is_finished(&self) -> bool {
        self.state == ChainState::Finished
    }

    /// Fetch and materialize the next page
    ///
    /// `Ok(None)` once the chain has ended, including when the session went
    /// away while the fetch was outstanding. A non-200 completion raises a
    /// user-visible error, ends the chain and returns `TransportFailure`.
    pub async fn next_page(
        &mut self,
        credentials: &Credentials,
        filters: &[(&str, String)],
    ) -> Result<Option<ResponseList>> {
        let cursor = match self.state {
            ChainState::Ready(cursor) => cursor,
            ChainState::Finished => return Ok(None),
        };

        let mut request = ApiRequest::get(self.endpoint.path);
        if let Some(c) = cursor {
            request = request.param("cursor", c.to_string());
        }
        for (key, value) in filters {
            request = request.param(key, value.clone());
        }

        debug!(
            "Fetching {} page {} (cursor {:?}, filters {:?})",
            self.endpoint.label,
            self.pages_fetched + 1,
            cursor,
            filters
        );
        self.pages_fetched += 1;
        let completion = self.transport.issue(request, credentials).await;

        if !self.guard.admit(self.endpoint.label).await {
            self.state = ChainState::Finished;
            return Ok(None);
        }

        let response = match completion {
            Ok(response) => response,
            Err(e) => {
                self.state = ChainState::Finished;
                warn!("Request for {} failed: {}", self.endpoint.label, e);
                self.host
                    .raise_error(&format!("Could not retrieve {}: {}", self.endpoint.label, e))
                    .await;
                return Err(e);
            }
        };

        if !response.is_success() {
            self.state = ChainState::Finished;
            let err = BirdfeedError::TransportFailure {
                endpoint: self.endpoint.label.to_string(),
                status: response.status.as_u16(),
            };
            warn!("{}", err);
            self.host
                .raise_error(&format!(
                    "Could not retrieve {}. HTTP STATUS: {}",
                    self.endpoint.label,
                    response.status.as_u16()
                ))
                .await;
            return Err(err);
        }

        let root = match xml::parse(&response.body) {
            Ok(root) => root,
            Err(e) => {
                warn!("Unreadable {} body, treating as empty: {}", self.endpoint.label, e);
                XmlNode::default()
            }
        };
        let page = decode_list(&root, self.endpoint.kind);

        self.state = match page.next_cursor() {
            Some(next) => ChainState::Ready(Some(next)),
            None => ChainState::Finished,
        };
        debug!(
            "{} page {}: {} items, next cursor {:?}",
            self.endpoint.label,
            self.pages_fetched,
            page.len(),
            page.next_cursor()
        );

        Ok(Some(page))
    }
}
