use crate::client::{ApiClient, ReqwestTransport, Transport};
use crate::config::WatchConfig;
use crate::errors::ApiError;
use crate::models::{CallSignal, Teleconsultation};
use notify_rust::Notification;
use std::collections::HashSet;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::broadcast;
use tokio::time::{MissedTickBehavior, interval};

pub trait Notifier: Send + Sync {
    fn send_notification(
        &self,
        title: &str,
        body: &str,
        persistent: bool,
    ) -> Result<(), Box<dyn std::error::Error + Send + Sync>>;
}

pub struct DesktopNotifier;

impl Notifier for DesktopNotifier {
    fn send_notification(
        &self,
        title: &str,
        body: &str,
        persistent: bool,
    ) -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
        let mut notification = Notification::new();
        notification
            .summary(title)
            .body(body)
            .appname("dermoai")
            .icon("call-start");

        // Persistent notifications stay until the user dismisses them.
        notification.hint(notify_rust::Hint::Transient(!persistent));

        notification
            .show()
            .map_err(|e| Box::new(std::io::Error::other(e)))?;
        Ok(())
    }
}

/// Watches for teleconsultation requests addressed to the signed-in
/// specialist and raises one desktop notification per new request.
pub struct IncomingCallWatcher<T = ReqwestTransport> {
    client: Arc<ApiClient<T>>,
    notifier: Box<dyn Notifier>,
    interval: Duration,
    persistent: bool,
    seen: HashSet<String>,
}

impl<T: Transport> IncomingCallWatcher<T> {
    pub fn new(client: Arc<ApiClient<T>>, notifier: Box<dyn Notifier>, config: &WatchConfig) -> Self {
        IncomingCallWatcher {
            client,
            notifier,
            interval: Duration::from_secs(config.interval_sec.max(1)),
            persistent: config.persistent_notifications,
            seen: HashSet::new(),
        }
    }

    /// Fetches the incoming list once. Returns how many notifications were
    /// raised.
    pub async fn poll_once(&mut self) -> Result<usize, ApiError> {
        let incoming = self.client.incoming_teleconsultations().await?;
        tracing::debug!("{} incoming teleconsultation request(s)", incoming.len());

        let mut raised = 0;
        for call in incoming.iter().filter(|c| !self.seen.contains(&c.teleconsultation_id)) {
            self.announce(call);
            raised += 1;
        }

        // Only ids still pending are remembered.
        self.seen = incoming
            .into_iter()
            .map(|c| c.teleconsultation_id)
            .collect();
        Ok(raised)
    }

    /// Handles a message pushed on the real-time channel. Returns true when
    /// it announced a new call.
    pub async fn handle_signal(&mut self, payload: &str) -> bool {
        let signal = match CallSignal::parse(payload) {
            Ok(signal) => signal,
            Err(e) => {
                tracing::debug!("Ignoring undecodable call signal: {}", e);
                return false;
            }
        };
        let Some(id) = signal.teleconsultation_id() else {
            return false;
        };
        if self.seen.contains(id) {
            return false;
        }

        match self.client.get_teleconsultation(id).await {
            Ok(call) => {
                self.announce(&call);
                self.seen.insert(call.teleconsultation_id);
                true
            }
            Err(e) => {
                tracing::warn!("Failed to load teleconsultation {}: {}", id, e);
                false
            }
        }
    }

    fn announce(&self, call: &Teleconsultation) {
        let body = match call.consultation_id {
            Some(ref consultation_id) => format!(
                "A practitioner is requesting a video consultation (consultation {}).",
                consultation_id
            ),
            None => "A practitioner is requesting a video consultation.".to_string(),
        };

        tracing::info!("Incoming teleconsultation {}", call.teleconsultation_id);
        if let Err(e) =
            self.notifier
                .send_notification("Incoming teleconsultation", &body, self.persistent)
        {
            tracing::error!("Failed to show notification: {}", e);
        }
    }

    /// Polls until a shutdown signal arrives. Stops early when the session
    /// ends, since every further poll would be rejected.
    pub async fn run_with_shutdown(
        &mut self,
        mut shutdown_rx: broadcast::Receiver<()>,
    ) -> Result<(), ApiError> {
        let mut ticker = interval(self.interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            tokio::select! {
                _ = ticker.tick() => {
                    match self.poll_once().await {
                        Ok(0) => {}
                        Ok(raised) => tracing::debug!("Raised {} call notification(s)", raised),
                        Err(e) if e.is_unauthorized() => {
                            tracing::error!("Watcher stopped, session is no longer valid: {}", e);
                            return Err(e);
                        }
                        Err(e) if e.is_connectivity() => {
                            tracing::warn!("Backend unreachable, will retry: {}", e);
                        }
                        Err(e) => tracing::error!("Failed to fetch incoming calls: {}", e),
                    }
                }
                _ = shutdown_rx.recv() => {
                    tracing::info!("Shutdown signal received, stopping incoming-call watcher");
                    return Ok(());
                }
            }
        }
    }
}
