use std::collections::VecDeque;
use std::fmt;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use tokio::sync::{Notify, oneshot};
use tokio::task::JoinHandle;
use tokio::time::{Instant, MissedTickBehavior};
use tracing::{debug, info, warn};

use learn_core::Clock;
use learn_core::model::{EventId, EventPayload, InteractionEvent, Session, SessionId, SessionMetadata};

use super::sink::EventSink;
use crate::config::TelemetryConfig;
use crate::error::TelemetryError;

//
// ─── FLUSH REPORT ──────────────────────────────────────────────────────────────
//

/// Outcome of a successful flush.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct FlushReport {
    /// Events confirmed by the sink in this flush.
    pub delivered: usize,
    /// Events still queued after the flush (tracked while it was in flight).
    pub remaining: usize,
}

impl FlushReport {
    #[must_use]
    pub fn empty() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.delivered == 0
    }
}

//
// ─── SHARED STATE ──────────────────────────────────────────────────────────────
//

#[derive(Default)]
struct EventBuffer {
    queued: VecDeque<InteractionEvent>,
    in_flight: usize,
    total: u64,
    delivered: u64,
    /// Set by a failed delivery, cleared by the next successful one. While
    /// set, a full batch does not wake the worker; retries wait for the
    /// flush interval.
    retry_pending: bool,
}

struct Shared {
    session: Mutex<Session>,
    buffer: Mutex<EventBuffer>,
    sink: Arc<dyn EventSink>,
    config: TelemetryConfig,
    clock: Clock,
    batch_ready: Notify,
}

impl Shared {
    fn buffer(&self) -> MutexGuard<'_, EventBuffer> {
        self.buffer.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn session(&self) -> MutexGuard<'_, Session> {
        self.session.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn track(&self, payload: EventPayload) -> EventId {
        // The session lock is held until the event is queued, so ending the
        // session waits for in-progress tracks.
        let session = self.session();
        let session_id = session.id();
        let event = InteractionEvent::new(session_id, payload, self.clock.now());
        let id = event.id();

        if !session.is_active() {
            warn!(kind = event.kind().as_str(), %session_id, "event dropped: session has ended");
            return id;
        }

        let (queued, retry_pending) = {
            let mut buffer = self.buffer();
            buffer.queued.push_back(event);
            buffer.total += 1;
            (buffer.queued.len(), buffer.retry_pending)
        };
        drop(session);

        if queued >= self.config.batch_size() && !retry_pending {
            debug!(queued, "batch size reached");
            self.batch_ready.notify_one();
        }
        id
    }

    async fn flush(&self) -> Result<FlushReport, TelemetryError> {
        let batch: Vec<InteractionEvent> = {
            let mut buffer = self.buffer();
            if buffer.queued.is_empty() {
                return Ok(FlushReport::empty());
            }
            let batch: Vec<InteractionEvent> = buffer.queued.drain(..).collect();
            buffer.in_flight += batch.len();
            batch
        };
        let events = batch.len();
        debug!(events, "flushing telemetry batch");

        let result = self.sink.deliver(&batch).await;

        let mut buffer = self.buffer();
        buffer.in_flight = buffer.in_flight.saturating_sub(events);
        match result {
            Ok(()) => {
                buffer.delivered += events as u64;
                buffer.retry_pending = false;
                Ok(FlushReport {
                    delivered: events,
                    remaining: buffer.queued.len(),
                })
            }
            Err(source) => {
                for event in batch.into_iter().rev() {
                    buffer.queued.push_front(event);
                }
                buffer.retry_pending = true;
                warn!(events, error = %source, "telemetry delivery failed; batch re-queued");
                Err(TelemetryError::Delivery { events, source })
            }
        }
    }
}

//
// ─── HANDLE ────────────────────────────────────────────────────────────────────
//

/// Cheap, clonable access to a running collector.
///
/// Hand one to every collaborator that captures events.
#[derive(Clone)]
pub struct TelemetryHandle {
    shared: Arc<Shared>,
}

impl TelemetryHandle {
    /// Queue an event stamped with the current session and clock time.
    ///
    /// Never blocks beyond a short buffer lock and never fails. Events
    /// tracked after shutdown are dropped with a warning; the returned id
    /// is then never delivered.
    pub fn track_event(&self, payload: EventPayload) -> EventId {
        self.shared.track(payload)
    }

    /// Deliver everything queued right now as one batch.
    ///
    /// # Errors
    ///
    /// Returns `TelemetryError::Delivery` when the sink fails; the batch is
    /// back at the head of the queue in its original order.
    pub async fn flush_events(&self) -> Result<FlushReport, TelemetryError> {
        self.shared.flush().await
    }

    /// Queued plus in-flight events.
    #[must_use]
    pub fn pending_events_count(&self) -> usize {
        let buffer = self.shared.buffer();
        buffer.queued.len() + buffer.in_flight
    }

    /// Events accepted since construction. Never decreases.
    #[must_use]
    pub fn total_events_count(&self) -> u64 {
        self.shared.buffer().total
    }

    #[must_use]
    pub fn delivered_events_count(&self) -> u64 {
        self.shared.buffer().delivered
    }

    #[must_use]
    pub fn session_id(&self) -> SessionId {
        self.shared.session().id()
    }

    #[must_use]
    pub fn session(&self) -> Session {
        self.shared.session().clone()
    }

    #[must_use]
    pub fn is_active(&self) -> bool {
        self.shared.session().is_active()
    }
}

impl fmt::Debug for TelemetryHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TelemetryHandle")
            .field("session_id", &self.session_id())
            .field("pending", &self.pending_events_count())
            .finish_non_exhaustive()
    }
}

//
// ─── COLLECTOR ─────────────────────────────────────────────────────────────────
//

/// Owns the live session, the event buffer and the background flush worker.
///
/// The worker flushes when the flush interval elapses or the queue reaches
/// the batch size, whichever comes first. After a failed delivery only the
/// interval (or a manual flush) retries, until a delivery succeeds again.
/// Flushes from the worker never
/// overlap each other; a manual [`TelemetryHandle::flush_events`] may run
/// alongside, and events are removed from the queue when a batch is taken
/// so no event is in two batches at once.
pub struct TelemetryCollector {
    handle: TelemetryHandle,
    worker: Option<JoinHandle<()>>,
    stop: Option<oneshot::Sender<()>>,
}

impl TelemetryCollector {
    /// Start a session and spawn the flush worker.
    ///
    /// # Panics
    ///
    /// Panics when called outside a Tokio runtime.
    #[must_use]
    pub fn start(
        config: TelemetryConfig,
        sink: Arc<dyn EventSink>,
        metadata: SessionMetadata,
        clock: Clock,
    ) -> Self {
        let session = Session::start(metadata, clock.now());
        info!(
            session_id = %session.id(),
            batch_size = config.batch_size(),
            flush_interval = ?config.flush_interval(),
            "telemetry session started"
        );

        let shared = Arc::new(Shared {
            session: Mutex::new(session),
            buffer: Mutex::new(EventBuffer::default()),
            sink,
            config,
            clock,
            batch_ready: Notify::new(),
        });

        let (stop_tx, stop_rx) = oneshot::channel();
        let worker = tokio::spawn(run_worker(Arc::clone(&shared), stop_rx));

        Self {
            handle: TelemetryHandle { shared },
            worker: Some(worker),
            stop: Some(stop_tx),
        }
    }

    #[must_use]
    pub fn handle(&self) -> TelemetryHandle {
        self.handle.clone()
    }

    pub fn track_event(&self, payload: EventPayload) -> EventId {
        self.handle.track_event(payload)
    }

    /// # Errors
    ///
    /// See [`TelemetryHandle::flush_events`].
    pub async fn flush_events(&self) -> Result<FlushReport, TelemetryError> {
        self.handle.flush_events().await
    }

    #[must_use]
    pub fn pending_events_count(&self) -> usize {
        self.handle.pending_events_count()
    }

    #[must_use]
    pub fn total_events_count(&self) -> u64 {
        self.handle.total_events_count()
    }

    #[must_use]
    pub fn delivered_events_count(&self) -> u64 {
        self.handle.delivered_events_count()
    }

    #[must_use]
    pub fn session_id(&self) -> SessionId {
        self.handle.session_id()
    }

    /// Stop the worker, end the session, then flush what is left.
    ///
    /// Events tracked once shutdown has begun are dropped with a warning and
    /// never counted, so everything accepted goes into the final flush.
    ///
    /// # Errors
    ///
    /// Returns the final flush error, or `TelemetryError::WorkerStopped`
    /// if the worker task had panicked.
    pub async fn shutdown(mut self) -> Result<FlushReport, TelemetryError> {
        if let Some(stop) = self.stop.take() {
            let _ = stop.send(());
        }
        let worker_result = match self.worker.take() {
            Some(worker) => worker.await,
            None => Ok(()),
        };

        self.handle.shared.session().end();
        let flushed = self.handle.flush_events().await;

        let pending = self.handle.pending_events_count();
        if pending > 0 {
            warn!(pending, "telemetry session ended with undelivered events");
        }
        info!(
            session_id = %self.handle.session_id(),
            total = self.handle.total_events_count(),
            delivered = self.handle.delivered_events_count(),
            "telemetry session ended"
        );

        if worker_result.is_err() {
            return Err(TelemetryError::WorkerStopped);
        }
        flushed
    }
}

impl Drop for TelemetryCollector {
    fn drop(&mut self) {
        if let Some(worker) = self.worker.take() {
            worker.abort();
        }
    }
}

impl fmt::Debug for TelemetryCollector {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TelemetryCollector")
            .field("handle", &self.handle)
            .field("worker_running", &self.worker.is_some())
            .finish_non_exhaustive()
    }
}

async fn run_worker(shared: Arc<Shared>, mut stop: oneshot::Receiver<()>) {
    let period = shared.config.flush_interval();
    let mut ticker = tokio::time::interval_at(Instant::now() + period, period);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

    loop {
        let by_size = tokio::select! {
            _ = &mut stop => break,
            _ = ticker.tick() => {
                debug!("flush interval elapsed");
                false
            }
            () = shared.batch_ready.notified() => true,
        };
        if by_size && shared.buffer().retry_pending {
            debug!("batch size trigger ignored until the next interval retry");
            continue;
        }
        // failures are logged and retried on the next interval
        let _ = shared.flush().await;
    }
    debug!("telemetry flush worker stopped");
}

//
// ─── TESTS ─────────────────────────────────────────────────────────────────────
//

#[cfg(test)]
mod tests {
    use super::*;
    use crate::telemetry::RecordingSink;
    use learn_core::time::fixed_clock;
    use std::time::Duration;

    fn page(path: &str) -> EventPayload {
        EventPayload::PageViewed { path: path.into() }
    }

    fn collector(sink: &Arc<RecordingSink>, batch_size: usize) -> TelemetryCollector {
        let config = TelemetryConfig::new(batch_size, Duration::from_secs(60)).unwrap();
        TelemetryCollector::start(
            config,
            Arc::clone(sink) as Arc<dyn EventSink>,
            SessionMetadata::new("learner-1", Some("rust-101".into())),
            fixed_clock(),
        )
    }

    #[tokio::test(start_paused = true)]
    async fn empty_flush_does_not_call_sink() {
        let sink = Arc::new(RecordingSink::new());
        let c = collector(&sink, 10);
        assert_eq!(c.flush_events().await.unwrap(), FlushReport::empty());
        assert_eq!(sink.attempts(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn track_stamps_session_and_counts() {
        let sink = Arc::new(RecordingSink::new());
        let c = collector(&sink, 10);
        let id = c.track_event(page("/lesson/1"));
        c.track_event(page("/lesson/2"));

        assert_eq!(c.pending_events_count(), 2);
        assert_eq!(c.total_events_count(), 2);

        let report = c.flush_events().await.unwrap();
        assert_eq!(report.delivered, 2);
        assert_eq!(c.pending_events_count(), 0);
        assert_eq!(c.delivered_events_count(), 2);

        let events = sink.events();
        assert_eq!(events[0].id(), id);
        assert!(events.iter().all(|e| e.session_id() == c.session_id()));
    }

    #[tokio::test(start_paused = true)]
    async fn failed_flush_requeues_in_order() {
        let sink = Arc::new(RecordingSink::new());
        let c = collector(&sink, 10);
        let first = c.track_event(page("/a"));
        let second = c.track_event(page("/b"));

        sink.fail_next(1);
        assert!(matches!(
            c.flush_events().await,
            Err(TelemetryError::Delivery { events: 2, .. })
        ));
        assert_eq!(c.pending_events_count(), 2);

        let third = c.track_event(page("/c"));
        c.flush_events().await.unwrap();
        let ids: Vec<EventId> = sink.events().iter().map(InteractionEvent::id).collect();
        assert_eq!(ids, vec![first, second, third]);
    }

    #[tokio::test(start_paused = true)]
    async fn events_after_shutdown_are_dropped() {
        let sink = Arc::new(RecordingSink::new());
        let c = collector(&sink, 10);
        let handle = c.handle();
        handle.track_event(page("/a"));

        let report = c.shutdown().await.unwrap();
        assert_eq!(report.delivered, 1);
        assert!(!handle.is_active());

        handle.track_event(page("/late"));
        assert_eq!(handle.total_events_count(), 1);
        assert_eq!(handle.pending_events_count(), 0);
    }
}
