use std::collections::VecDeque;
use std::fmt;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use tracing::{debug, info, warn};

use learn_core::model::InteractionEvent;

use crate::config::TelemetryConfig;
use crate::error::SinkError;

/// Destination for flushed event batches.
///
/// A batch is delivered as a whole; any error means none of it is
/// considered delivered and the collector will retry it.
#[async_trait]
pub trait EventSink: Send + Sync {
    async fn deliver(&self, batch: &[InteractionEvent]) -> Result<(), SinkError>;
}

//
// ─── HTTP ──────────────────────────────────────────────────────────────────────
//

/// POSTs each batch as a JSON array to the ingestion endpoint.
#[derive(Clone, Debug)]
pub struct HttpSink {
    client: Client,
    endpoint: String,
    token: Option<String>,
}

impl HttpSink {
    #[must_use]
    pub fn new(endpoint: impl Into<String>, token: Option<String>) -> Self {
        Self {
            client: Client::new(),
            endpoint: endpoint.into(),
            token,
        }
    }

    /// `None` when the config carries no endpoint.
    #[must_use]
    pub fn from_config(config: &TelemetryConfig) -> Option<Self> {
        let endpoint = config.endpoint()?;
        Some(Self::new(endpoint, config.token().map(str::to_owned)))
    }

    #[must_use]
    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }
}

#[async_trait]
impl EventSink for HttpSink {
    async fn deliver(&self, batch: &[InteractionEvent]) -> Result<(), SinkError> {
        let mut request = self.client.post(&self.endpoint).json(batch);
        if let Some(token) = &self.token {
            request = request.bearer_auth(token);
        }

        let response = request.send().await?;
        if !response.status().is_success() {
            return Err(SinkError::HttpStatus(response.status()));
        }
        debug!(events = batch.len(), endpoint = %self.endpoint, "batch accepted");
        Ok(())
    }
}

//
// ─── TRACING ───────────────────────────────────────────────────────────────────
//

/// Logs each batch instead of sending it anywhere.
#[derive(Clone, Copy, Debug, Default)]
pub struct TracingSink;

#[async_trait]
impl EventSink for TracingSink {
    async fn deliver(&self, batch: &[InteractionEvent]) -> Result<(), SinkError> {
        for event in batch {
            debug!(
                id = %event.id(),
                kind = event.kind().as_str(),
                session_id = %event.session_id(),
                "event"
            );
        }
        info!(events = batch.len(), "telemetry batch flushed");
        Ok(())
    }
}

//
// ─── FANOUT ────────────────────────────────────────────────────────────────────
//

/// Delivers to a primary sink, then copies successful batches to mirrors.
///
/// Only the primary decides whether a batch counts as delivered, so a
/// retried batch never reaches a mirror twice. Mirror failures are logged.
pub struct FanoutSink {
    primary: Arc<dyn EventSink>,
    mirrors: Vec<Arc<dyn EventSink>>,
}

impl FanoutSink {
    #[must_use]
    pub fn new(primary: Arc<dyn EventSink>) -> Self {
        Self {
            primary,
            mirrors: Vec::new(),
        }
    }

    #[must_use]
    pub fn with_mirror(mut self, mirror: Arc<dyn EventSink>) -> Self {
        self.mirrors.push(mirror);
        self
    }
}

impl fmt::Debug for FanoutSink {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FanoutSink")
            .field("mirrors", &self.mirrors.len())
            .finish_non_exhaustive()
    }
}

#[async_trait]
impl EventSink for FanoutSink {
    async fn deliver(&self, batch: &[InteractionEvent]) -> Result<(), SinkError> {
        self.primary.deliver(batch).await?;
        for mirror in &self.mirrors {
            if let Err(err) = mirror.deliver(batch).await {
                warn!(events = batch.len(), error = %err, "mirror sink rejected batch");
            }
        }
        Ok(())
    }
}

//
// ─── RECORDING ─────────────────────────────────────────────────────────────────
//

#[derive(Debug, Default)]
struct RecordingState {
    batches: Vec<Vec<InteractionEvent>>,
    failures: VecDeque<String>,
    attempts: usize,
}

/// Keeps delivered batches in memory; can be told to fail.
#[derive(Debug, Default)]
pub struct RecordingSink {
    state: Mutex<RecordingState>,
    latency: Option<Duration>,
}

impl RecordingSink {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Sleep this long (tokio time) inside every delivery.
    #[must_use]
    pub fn with_latency(mut self, latency: Duration) -> Self {
        self.latency = Some(latency);
        self
    }

    fn lock(&self) -> MutexGuard<'_, RecordingState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Make the next `count` deliveries fail.
    pub fn fail_next(&self, count: usize) {
        let mut state = self.lock();
        for _ in 0..count {
            state.failures.push_back("injected failure".to_owned());
        }
    }

    #[must_use]
    pub fn batches(&self) -> Vec<Vec<InteractionEvent>> {
        self.lock().batches.clone()
    }

    /// All delivered events in delivery order.
    #[must_use]
    pub fn events(&self) -> Vec<InteractionEvent> {
        self.lock().batches.iter().flatten().cloned().collect()
    }

    /// Deliveries attempted, including failed ones.
    #[must_use]
    pub fn attempts(&self) -> usize {
        self.lock().attempts
    }
}

#[async_trait]
impl EventSink for RecordingSink {
    async fn deliver(&self, batch: &[InteractionEvent]) -> Result<(), SinkError> {
        if let Some(latency) = self.latency {
            tokio::time::sleep(latency).await;
        }

        let mut state = self.lock();
        state.attempts += 1;
        if let Some(reason) = state.failures.pop_front() {
            return Err(SinkError::Rejected(reason));
        }
        state.batches.push(batch.to_vec());
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use learn_core::model::{EventPayload, SessionId};
    use learn_core::time::fixed_now;

    fn event(path: &str) -> InteractionEvent {
        InteractionEvent::new(
            SessionId::generate(),
            EventPayload::PageViewed { path: path.into() },
            fixed_now(),
        )
    }

    #[tokio::test]
    async fn recording_sink_fails_on_demand() {
        let sink = RecordingSink::new();
        sink.fail_next(1);

        let batch = vec![event("/a"), event("/b")];
        assert!(matches!(sink.deliver(&batch).await, Err(SinkError::Rejected(_))));
        assert!(sink.batches().is_empty());

        sink.deliver(&batch).await.unwrap();
        assert_eq!(sink.events(), batch);
        assert_eq!(sink.attempts(), 2);
    }

    #[test]
    fn http_sink_requires_endpoint() {
        assert!(HttpSink::from_config(&TelemetryConfig::default()).is_none());

        let config = TelemetryConfig::default()
            .with_endpoint(Some("http://localhost:9/ingest".into()), None);
        let sink = HttpSink::from_config(&config).unwrap();
        assert_eq!(sink.endpoint(), "http://localhost:9/ingest");
    }

    #[tokio::test]
    async fn fanout_mirrors_only_accepted_batches() {
        let primary = Arc::new(RecordingSink::new());
        let mirror = Arc::new(RecordingSink::new());
        let fanout = FanoutSink::new(Arc::clone(&primary) as Arc<dyn EventSink>)
            .with_mirror(Arc::clone(&mirror) as Arc<dyn EventSink>);

        let batch = vec![event("/a")];
        primary.fail_next(1);
        assert!(fanout.deliver(&batch).await.is_err());
        assert_eq!(mirror.attempts(), 0);

        mirror.fail_next(1);
        fanout.deliver(&batch).await.unwrap();
        fanout.deliver(&batch).await.unwrap();
        assert_eq!(primary.batches().len(), 2);
        assert_eq!(mirror.batches().len(), 1);
    }
}
