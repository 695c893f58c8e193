/// Per-account API session: listing chains, timeline polling, posting
use crate::config::AccountConfig;
use crate::delivery::DeliveryRouter;
use crate::error::{BirdfeedError, Result};
use crate::host::Host;
use crate::materialize::ListItems;
use crate::pagination::{Chain, FRIENDS_IDS, HOME_TIMELINE, STATUSES_FRIENDS};
use crate::roster::Roster;
use crate::session::{LivenessGuard, SessionId, SessionRegistry, SessionState};
use crate::transport::{ApiRequest, Transport};
use crate::watermark::Watermark;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::RwLock;
use tokio::time::{interval, sleep, MissedTickBehavior};
use tracing::{debug, error, info, warn};
use uuid::Uuid;

const STATUS_UPDATE_PATH: &str = "/statuses/update.xml";
const DIRECT_MESSAGE_PATH: &str = "/direct_messages/new.xml";

/// One account connection
///
/// Completion handlers run one after another on the caller's task; every one
/// of them checks the registry before touching state or the host.
pub struct TwitterSession {
    id: SessionId,
    config: AccountConfig,
    state: Arc<RwLock<SessionState>>,
    transport: Arc<dyn Transport>,
    host: Arc<dyn Host>,
    guard: LivenessGuard,
    router: DeliveryRouter,
    roster: Roster,
}

impl TwitterSession {
    /// Create a session; the caller registers it as live
    pub fn new(
        config: AccountConfig,
        transport: Arc<dyn Transport>,
        host: Arc<dyn Host>,
        registry: SessionRegistry,
    ) -> Self {
        let id = Uuid::new_v4();
        let state = SessionState::new(config.handle.clone(), config.secret.clone());
        let router = DeliveryRouter::new(host.clone(), config.delivery_mode(), config.strip_html);
        let roster = Roster::new(host.clone());

        info!("Created session {} for {}", id, config.handle);

        Self {
            id,
            config,
            state: Arc::new(RwLock::new(state)),
            transport,
            host,
            guard: LivenessGuard::new(registry, id),
            router,
            roster,
        }
    }

    pub fn id(&self) -> SessionId {
        self.id
    }

    pub fn config(&self) -> &AccountConfig {
        &self.config
    }

    pub async fn watermark(&self) -> Watermark {
        self.state.read().await.timeline_watermark
    }

    pub async fn snapshot(&self) -> SessionState {
        self.state.read().await.clone()
    }

    /// Initial sync after the connection comes up
    pub async fn login(&self) -> Result<()> {
        info!("Logging in {}", self.config.handle);
        if self.config.fetch_friends_on_login {
            self.get_statuses_friends().await?;
        }
        Ok(())
    }

    /// Page through the opaque friend-id listing
    ///
    /// Each page's raw id tokens go to `on_ids`. Returns the number of fetches.
    pub async fn get_friends_ids<F>(&self, mut on_ids: F) -> Result<usize>
    where
        F: FnMut(Vec<String>),
    {
        let credentials = self.state.read().await.credentials();
        let mut chain = Chain::new(FRIENDS_IDS, self.transport.as_ref(), self.host.as_ref(), &self.guard);

        while let Some(page) = chain.next_page(&credentials, &[]).await? {
            if let ListItems::Ids(ids) = page.items {
                debug!("Received {} friend ids", ids.len());
                on_ids(ids);
            }
        }
        Ok(chain.pages_fetched())
    }

    /// Page through full user objects, adding each one as a buddy
    pub async fn get_statuses_friends(&self) -> Result<usize> {
        let credentials = self.state.read().await.credentials();
        let mut chain =
            Chain::new(STATUSES_FRIENDS, self.transport.as_ref(), self.host.as_ref(), &self.guard);

        while let Some(page) = chain.next_page(&credentials, &[]).await? {
            if let ListItems::Users(users) = page.items {
                for user in &users {
                    self.roster.ensure_buddy(&user.handle).await;
                }
            }
        }
        Ok(chain.pages_fetched())
    }

    /// Fetch new home timeline entries and deliver them
    ///
    /// Statuses the watermark covered before this call began count as
    /// delivered; the `since_id` filter follows the live mark per fetch.
    pub async fn get_home_timeline(&self) -> Result<usize> {
        let (credentials, seen) = {
            let state = self.state.read().await;
            (state.credentials(), state.timeline_watermark)
        };
        let mut chain =
            Chain::new(HOME_TIMELINE, self.transport.as_ref(), self.host.as_ref(), &self.guard);

        loop {
            // recomputed per fetch; earlier pages may have moved the mark
            let filters: Vec<(&str, String)> = self
                .state
                .read()
                .await
                .timeline_watermark
                .since_param()
                .into_iter()
                .collect();

            let page = match chain.next_page(&credentials, &filters).await? {
                Some(page) => page,
                None => break,
            };
            if let ListItems::Statuses(statuses) = page.items {
                self.router.deliver_page(&self.state, seen, statuses).await;
            }
        }
        Ok(chain.pages_fetched())
    }

    /// Post a new status
    pub async fn post_status(&self, text: &str) -> Result<()> {
        let request = ApiRequest::post(STATUS_UPDATE_PATH).param("status", text);
        self.post(request, "status update").await
    }

    /// Send a direct message to `screen_name`
    pub async fn send_direct_message(&self, screen_name: &str, text: &str) -> Result<()> {
        let request = ApiRequest::post(DIRECT_MESSAGE_PATH)
            .param("screen_name", screen_name)
            .param("text", text);
        self.post(request, "direct message").await
    }

    async fn post(&self, request: ApiRequest, what: &str) -> Result<()> {
        let credentials = self.state.read().await.credentials();
        let completion = self.transport.issue(request, &credentials).await;

        if !self.guard.admit(what).await {
            return Ok(());
        }

        let response = match completion {
            Ok(response) => response,
            Err(e) => {
                self.host.raise_error(&format!("Could not post {}: {}", what, e)).await;
                return Err(e);
            }
        };

        if !response.is_success() {
            let status = response.status.as_u16();
            self.host
                .raise_error(&format!("Could not post {}... HTTP STATUS: {}", what, status))
                .await;
            self.host.raise_error(&response.body_text()).await;
            return Err(BirdfeedError::TransportFailure {
                endpoint: what.to_string(),
                status,
            });
        }

        debug!("Posted {}", what);
        Ok(())
    }

    /// Poll the home timeline until the session ends or shutdown is set
    pub async fn run_poller(&self, shutdown: Arc<RwLock<bool>>) {
        let mut ticker = interval(self.config.poll_interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);

        loop {
            if *shutdown.read().await {
                break;
            }
            if !self.guard.admit("poll").await {
                break;
            }

            tokio::select! {
                _ = ticker.tick() => {
                    match self.get_home_timeline().await {
                        Ok(pages) => debug!("Timeline poll done ({} fetches)", pages),
                        Err(e @ BirdfeedError::TransportFailure { .. }) => warn!("Timeline poll failed: {}", e),
                        Err(e) => error!("Timeline poll error: {}", e),
                    }
                }
                _ = sleep(Duration::from_millis(250)) => {
                    // Check shutdown periodically
                }
            }
        }

        info!("Poller for session {} stopped", self.id);
    }
}
