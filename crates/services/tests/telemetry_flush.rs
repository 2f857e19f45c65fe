use std::collections::HashSet;
use std::sync::Arc;
use std::time::Duration;

use learn_core::model::{EventId, EventPayload, InteractionEvent, SessionMetadata};
use learn_core::time::fixed_clock;
use services::{Clock, EventSink, RecordingSink, TelemetryCollector, TelemetryConfig};

fn page(n: usize) -> EventPayload {
    EventPayload::PageViewed { path: format!("/lesson/{n}") }
}

fn start(sink: &Arc<RecordingSink>, batch_size: usize, interval: Duration, clock: Clock) -> TelemetryCollector {
    let config = TelemetryConfig::new(batch_size, interval).unwrap();
    TelemetryCollector::start(
        config,
        Arc::clone(sink) as Arc<dyn EventSink>,
        SessionMetadata::new("learner-7", None),
        clock,
    )
}

fn delivered_ids(sink: &RecordingSink) -> Vec<EventId> {
    sink.events().iter().map(InteractionEvent::id).collect()
}

#[tokio::test(start_paused = true)]
async fn batch_size_triggers_background_flush() {
    let sink = Arc::new(RecordingSink::new());
    let collector = start(&sink, 3, Duration::from_secs(60), fixed_clock());

    collector.track_event(page(1));
    collector.track_event(page(2));
    tokio::time::sleep(Duration::from_millis(10)).await;
    assert!(sink.batches().is_empty());

    collector.track_event(page(3));
    tokio::time::sleep(Duration::from_millis(10)).await;
    assert_eq!(sink.batches().len(), 1);
    assert_eq!(sink.batches()[0].len(), 3);
    assert_eq!(collector.pending_events_count(), 0);
}

#[tokio::test(start_paused = true)]
async fn interval_flushes_partial_batch() {
    let sink = Arc::new(RecordingSink::new());
    let collector = start(&sink, 100, Duration::from_secs(5), fixed_clock());

    collector.track_event(page(1));
    collector.track_event(page(2));

    tokio::time::sleep(Duration::from_secs(4)).await;
    assert_eq!(sink.attempts(), 0);

    tokio::time::sleep(Duration::from_secs(2)).await;
    assert_eq!(sink.events().len(), 2);
    assert_eq!(collector.delivered_events_count(), 2);
}

#[tokio::test(start_paused = true)]
async fn concurrent_flushes_never_send_an_event_twice() {
    let sink = Arc::new(RecordingSink::new().with_latency(Duration::from_secs(1)));
    let collector = start(&sink, 100, Duration::from_secs(600), fixed_clock());
    for n in 0..5 {
        collector.track_event(page(n));
    }

    let (first, second, late) = tokio::join!(
        collector.flush_events(),
        collector.flush_events(),
        async {
            tokio::time::sleep(Duration::from_millis(100)).await;
            collector.track_event(page(99))
        }
    );
    let first = first.unwrap();
    let second = second.unwrap();

    assert_eq!(first.delivered + second.delivered, 5);
    assert_eq!(sink.batches().len(), 1);
    assert!(!delivered_ids(&sink).contains(&late));
    assert_eq!(collector.pending_events_count(), 1);

    collector.flush_events().await.unwrap();
    assert_eq!(delivered_ids(&sink).last(), Some(&late));
}

#[tokio::test(start_paused = true)]
async fn every_tracked_event_is_delivered_exactly_once() {
    let sink = Arc::new(RecordingSink::new());
    let collector = start(&sink, 4, Duration::from_secs(2), fixed_clock());

    let mut tracked = Vec::new();
    for n in 0..50 {
        if n == 10 {
            sink.fail_next(2);
        }
        tracked.push(collector.track_event(page(n)));
        if n % 5 == 0 {
            tokio::time::sleep(Duration::from_millis(500)).await;
        }
    }
    assert_eq!(collector.total_events_count(), 50);

    let handle = collector.handle();
    collector.shutdown().await.unwrap();
    assert_eq!(handle.pending_events_count(), 0);
    assert_eq!(handle.delivered_events_count(), 50);

    let delivered = delivered_ids(&sink);
    let unique: HashSet<EventId> = delivered.iter().copied().collect();
    assert_eq!(delivered.len(), 50);
    assert_eq!(unique, tracked.into_iter().collect::<HashSet<_>>());
    assert!(sink.attempts() > sink.batches().len());
}

#[tokio::test(start_paused = true)]
async fn outage_is_retried_on_the_interval_not_on_every_track() {
    let sink = Arc::new(RecordingSink::new());
    let collector = start(&sink, 2, Duration::from_secs(10), fixed_clock());
    sink.fail_next(3);

    for n in 0..20 {
        collector.track_event(page(n));
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    // one attempt from the first full batch, then silence
    assert_eq!(sink.attempts(), 1);
    assert_eq!(collector.pending_events_count(), 20);

    // interval retries at 10s and 20s still fail
    tokio::time::sleep(Duration::from_secs(25)).await;
    assert_eq!(sink.attempts(), 3);
    assert_eq!(collector.pending_events_count(), 20);

    tokio::time::sleep(Duration::from_secs(6)).await;
    assert_eq!(sink.attempts(), 4);
    assert_eq!(sink.batches().len(), 1);
    assert_eq!(collector.delivered_events_count(), 20);
    assert_eq!(collector.pending_events_count(), 0);

    // size trigger is back once delivery works
    collector.track_event(page(100));
    collector.track_event(page(101));
    tokio::time::sleep(Duration::from_millis(10)).await;
    assert_eq!(sink.batches().len(), 2);
}

#[tokio::test(start_paused = true)]
async fn tracking_during_shutdown_never_strands_events() {
    let sink = Arc::new(RecordingSink::new().with_latency(Duration::from_secs(1)));
    let collector = start(&sink, 100, Duration::from_secs(600), fixed_clock());
    let handle = collector.handle();
    let first = collector.track_event(page(1));

    let (report, late) = tokio::join!(collector.shutdown(), async {
        tokio::time::sleep(Duration::from_millis(100)).await;
        handle.track_event(page(2))
    });

    assert_eq!(report.unwrap().delivered, 1);
    assert!(!handle.is_active());
    assert_eq!(delivered_ids(&sink), vec![first]);
    assert!(!delivered_ids(&sink).contains(&late));
    assert_eq!(handle.pending_events_count(), 0);
    assert_eq!(handle.total_events_count(), handle.delivered_events_count());
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn tracking_from_many_tasks_loses_nothing() {
    let sink = Arc::new(RecordingSink::new());
    let collector = start(&sink, 16, Duration::from_millis(50), Clock::System);

    let mut tasks = Vec::new();
    for worker in 0..4 {
        let handle = collector.handle();
        tasks.push(tokio::spawn(async move {
            (0..250)
                .map(|n| handle.track_event(page(worker * 1_000 + n)))
                .collect::<Vec<_>>()
        }));
    }

    let mut tracked = HashSet::new();
    for task in tasks {
        tracked.extend(task.await.unwrap());
    }
    assert_eq!(collector.total_events_count(), 1_000);

    collector.shutdown().await.unwrap();
    let delivered = delivered_ids(&sink);
    assert_eq!(delivered.len(), 1_000);
    assert_eq!(delivered.into_iter().collect::<HashSet<_>>(), tracked);
}
