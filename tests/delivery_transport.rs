//! Delivery transport regression tests
//!
//! Drive the retry/backoff state machine against a scripted sink with a
//! paused tokio clock, so backoff windows are exact.

mod common;

use common::{batch, region, settle, ScriptedSink, Step};
use pricebook_scanner::transport::{DeliveryTransport, FixedBackoff, KnownRegionCache};
use std::sync::Arc;
use std::time::Duration;
use tokio::runtime::Handle;

fn transport(sink: &Arc<ScriptedSink>) -> Arc<DeliveryTransport> {
    let known = Arc::new(KnownRegionCache::new());
    Arc::new(
        DeliveryTransport::new(sink.clone(), known, Handle::current())
            .with_backoff(Arc::new(FixedBackoff::new(Duration::from_secs(5))))
            .with_max_attempts(5),
    )
}

#[tokio::test(start_paused = true)]
async fn test_delivered_batch_marks_region_known() {
    let sink = Arc::new(ScriptedSink::new());
    let transport = transport(&sink);

    transport.submit(vec![batch(0, 2)]);
    settle().await;

    assert_eq!(sink.attempt_count(), 1);
    assert!(transport.known().is_known_non_empty(&region(0, 0)));
    let stats = transport.stats();
    assert_eq!(stats.delivered, 1);
    assert_eq!(stats.queued, 0);
    assert!(!stats.in_flight);
}

#[tokio::test(start_paused = true)]
async fn test_delivered_empty_batch_marks_region_empty() {
    let sink = Arc::new(ScriptedSink::new());
    let transport = transport(&sink);
    transport.known().mark_non_empty(region(0, 0));

    transport.submit(vec![batch(0, 0)]);
    settle().await;

    assert_eq!(transport.stats().delivered, 1);
    assert!(!transport.known().is_known_non_empty(&region(0, 0)));
}

#[tokio::test(start_paused = true)]
async fn test_failed_send_waits_for_backoff() {
    let sink = Arc::new(ScriptedSink::new().script(&[Step::Fail, Step::Ok]));
    let transport = transport(&sink);

    transport.submit(vec![batch(0, 1)]);
    settle().await;
    assert_eq!(sink.attempt_count(), 1);
    assert_eq!(transport.pending_len(), 1);
    assert!(transport.next_attempt().is_some());

    // Still inside the backoff window
    tokio::time::advance(Duration::from_secs(3)).await;
    transport.on_tick();
    settle().await;
    assert_eq!(sink.attempt_count(), 1);

    tokio::time::advance(Duration::from_secs(3)).await;
    transport.on_tick();
    settle().await;
    assert_eq!(sink.attempt_count(), 2);

    let stats = transport.stats();
    assert_eq!(stats.delivered, 1);
    assert_eq!(stats.retried, 1);
    assert_eq!(stats.consecutive_failures, 0);
    assert_eq!(stats.queued, 0);

    // Same batch both times
    let attempts = sink.attempts();
    assert_eq!(attempts[0].scan_id, attempts[1].scan_id);
}

#[tokio::test(start_paused = true)]
async fn test_batch_dropped_after_five_attempts() {
    let sink = Arc::new(ScriptedSink::new().otherwise(Step::Fail));
    let transport = transport(&sink);

    transport.submit(vec![batch(0, 1)]);
    settle().await;
    for _ in 0..10 {
        tokio::time::advance(Duration::from_secs(6)).await;
        transport.on_tick();
        settle().await;
    }

    assert_eq!(sink.attempt_count(), 5);
    let stats = transport.stats();
    assert_eq!(stats.dropped, 1);
    assert_eq!(stats.retried, 4);
    assert_eq!(stats.queued, 0);
    assert!(!stats.in_flight);
}

#[tokio::test(start_paused = true)]
async fn test_one_request_in_flight() {
    let (sink, gate) = ScriptedSink::gated();
    let sink = Arc::new(sink);
    let transport = transport(&sink);

    transport.submit(vec![batch(0, 1), batch(1, 1), batch(2, 1)]);
    transport.on_tick();
    settle().await;
    assert_eq!(sink.attempt_count(), 1);
    assert!(transport.is_sending());
    assert_eq!(transport.pending_len(), 2);

    gate.add_permits(3);
    settle().await;

    assert_eq!(sink.attempt_count(), 3);
    assert_eq!(sink.max_concurrent_sends(), 1);
    assert_eq!(transport.stats().delivered, 3);

    // FIFO without retries
    let order: Vec<i32> = sink.attempts().iter().map(|b| b.region.chunk_x).collect();
    assert_eq!(order, vec![0, 1, 2]);
}

#[tokio::test(start_paused = true)]
async fn test_completion_after_clear_is_ignored() {
    let (sink, gate) = ScriptedSink::gated();
    let sink = Arc::new(sink);
    let transport = transport(&sink);

    transport.submit(vec![batch(0, 1), batch(1, 1)]);
    settle().await;
    assert!(transport.is_sending());

    let generation = transport.generation();
    transport.clear();
    assert_eq!(transport.generation(), generation + 1);
    assert_eq!(transport.pending_len(), 0);
    assert!(!transport.is_sending());

    gate.add_permits(1);
    settle().await;

    assert_eq!(transport.stats().delivered, 0);
    assert!(transport.known().is_empty());
    assert_eq!(sink.attempt_count(), 1);
}

#[tokio::test(start_paused = true)]
async fn test_panicking_sink_counts_as_failure() {
    let sink = Arc::new(ScriptedSink::new().script(&[Step::Panic, Step::Ok]));
    let transport = transport(&sink);

    transport.submit(vec![batch(0, 1)]);
    settle().await;
    assert_eq!(transport.stats().retried, 1);
    assert!(!transport.is_sending());

    tokio::time::advance(Duration::from_secs(5)).await;
    transport.on_tick();
    settle().await;
    assert_eq!(transport.stats().delivered, 1);
}

#[tokio::test(start_paused = true)]
async fn test_retried_batch_goes_behind_newer_ones() {
    let sink = Arc::new(ScriptedSink::new().script(&[Step::Fail]));
    let transport = transport(&sink);

    transport.submit(vec![batch(0, 1), batch(1, 1)]);
    settle().await;
    // Backoff holds the untried batch too
    assert_eq!(sink.attempt_count(), 1);
    assert_eq!(transport.pending_len(), 2);

    tokio::time::advance(Duration::from_secs(5)).await;
    transport.on_tick();
    settle().await;

    let order: Vec<i32> = sink.attempts().iter().map(|b| b.region.chunk_x).collect();
    assert_eq!(order, vec![0, 1, 0]);
    assert_eq!(transport.stats().delivered, 2);
}

#[tokio::test(start_paused = true)]
async fn test_queued_non_empty_batch_is_known_before_delivery() {
    let (sink, _gate) = ScriptedSink::gated();
    let sink = Arc::new(sink);
    let transport = transport(&sink);

    transport.submit(vec![batch(0, 0), batch(4, 1)]);
    settle().await;
    assert!(transport.known().is_known_non_empty(&region(4, 0)));
    assert!(!transport.known().is_known_non_empty(&region(0, 0)));
}
