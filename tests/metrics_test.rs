//! Metrics emitted by the batch turn path.
//!
//! Uses `metrics_util::debugging::DebuggingRecorder` to capture and assert
//! on emitted metrics without needing a real exporter. Detached tasks run
//! on other threads and are invisible to the local recorder, so every turn
//! here uses an already-titled conversation.

mod common;

use std::time::Duration;

use metrics_util::MetricKind;
use metrics_util::debugging::{DebugValue, DebuggingRecorder};

use byok_gateway::providers::RetryingChatProvider;
use byok_gateway::telemetry;
use byok_gateway::{ChatOptions, ChatProvider, GatewayError, Message, MessageRole, RetryConfig};
use common::*;

type SnapshotVec = Vec<(
    metrics_util::CompositeKey,
    Option<metrics::Unit>,
    Option<metrics::SharedString>,
    DebugValue,
)>;

/// Sum all counter values matching a given metric name.
fn counter_total(snapshot: &SnapshotVec, name: &str) -> u64 {
    snapshot
        .iter()
        .filter(|(key, _, _, _)| key.kind() == MetricKind::Counter && key.key().name() == name)
        .map(|(_, _, _, value)| match value {
            DebugValue::Counter(v) => *v,
            _ => 0,
        })
        .sum()
}

/// Counter value for `name` carrying the label `label = value`.
fn counter_with_label(snapshot: &SnapshotVec, name: &str, label: &str, value: &str) -> u64 {
    snapshot
        .iter()
        .filter(|(key, _, _, _)| {
            key.kind() == MetricKind::Counter
                && key.key().name() == name
                && key
                    .key()
                    .labels()
                    .any(|l| l.key() == label && l.value() == value)
        })
        .map(|(_, _, _, v)| match v {
            DebugValue::Counter(v) => *v,
            _ => 0,
        })
        .sum()
}

fn has_histogram(snapshot: &SnapshotVec, name: &str) -> bool {
    snapshot
        .iter()
        .any(|(key, _, _, _)| key.kind() == MetricKind::Histogram && key.key().name() == name)
}

const PRIOR: &[(MessageRole, &str)] = &[(MessageRole::User, "earlier"), (MessageRole::Assistant, "reply")];

#[tokio::test(flavor = "multi_thread", worker_threads = 1)]
async fn completed_turn_records_outcome_duration_and_tokens() {
    let recorder = DebuggingRecorder::new();
    let snapshotter = recorder.snapshotter();

    let result = metrics::with_local_recorder(&recorder, || {
        tokio::task::block_in_place(|| {
            tokio::runtime::Handle::current().block_on(async {
                let fx = Fixture::new();
                let conv = fx.titled_conversation("alice", PRIOR).await;
                fx.service
                    .handle_turn(turn(&conv.id, "alice", "gpt-4.1-mini", BATCH))
                    .await
            })
        })
    });
    assert!(result.is_ok());

    let snapshot = snapshotter.snapshot().into_vec();
    assert_eq!(
        counter_with_label(&snapshot, telemetry::TURNS_TOTAL, "outcome", "ok"),
        1
    );
    assert!(has_histogram(&snapshot, telemetry::GENERATION_DURATION_SECONDS));
    assert_eq!(counter_total(&snapshot, telemetry::TOKENS_TOTAL), 15);
    assert_eq!(counter_total(&snapshot, telemetry::PROVIDER_FALLBACK_TOTAL), 0);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 1)]
async fn rejected_turn_is_counted_as_rejected() {
    let recorder = DebuggingRecorder::new();
    let snapshotter = recorder.snapshotter();

    let result = metrics::with_local_recorder(&recorder, || {
        tokio::task::block_in_place(|| {
            tokio::runtime::Handle::current().block_on(async {
                let fx = Fixture::new();
                let conv = fx.titled_conversation("alice", PRIOR).await;
                fx.service
                    .handle_turn(turn(&conv.id, "alice", "retired", BATCH))
                    .await
            })
        })
    });
    assert!(result.is_err());

    let snapshot = snapshotter.snapshot().into_vec();
    assert_eq!(
        counter_with_label(&snapshot, telemetry::TURNS_TOTAL, "outcome", "rejected"),
        1
    );
    assert!(!has_histogram(&snapshot, telemetry::GENERATION_DURATION_SECONDS));
}

#[tokio::test(flavor = "multi_thread", worker_threads = 1)]
async fn fallback_is_counted_per_requested_provider() {
    let recorder = DebuggingRecorder::new();
    let snapshotter = recorder.snapshotter();

    let result = metrics::with_local_recorder(&recorder, || {
        tokio::task::block_in_place(|| {
            tokio::runtime::Handle::current().block_on(async {
                let fx = Fixture::new();
                let conv = fx.titled_conversation("alice", PRIOR).await;
                fx.service
                    .handle_turn(turn(&conv.id, "alice", "mystery-model", BATCH))
                    .await
            })
        })
    });
    assert!(result.is_ok());

    let snapshot = snapshotter.snapshot().into_vec();
    assert_eq!(
        counter_with_label(
            &snapshot,
            telemetry::PROVIDER_FALLBACK_TOTAL,
            "requested",
            "mystery"
        ),
        1
    );
}

#[tokio::test(flavor = "multi_thread", worker_threads = 1)]
async fn retries_are_counted_without_the_initial_attempt() {
    let recorder = DebuggingRecorder::new();
    let snapshotter = recorder.snapshotter();

    let result = metrics::with_local_recorder(&recorder, || {
        tokio::task::block_in_place(|| {
            tokio::runtime::Handle::current().block_on(async {
                let upstream = ScriptedProvider::new("scripted", "never");
                upstream.fail_with(|| GatewayError::Http("connection reset".into()));
                let provider = RetryingChatProvider::new(
                    upstream,
                    RetryConfig::new()
                        .max_attempts(3)
                        .initial_delay(Duration::from_millis(1)),
                );
                provider
                    .chat(&[Message::user("hi")], &ChatOptions::new("m"))
                    .await
            })
        })
    });
    assert!(result.is_err());

    let snapshot = snapshotter.snapshot().into_vec();
    assert_eq!(counter_total(&snapshot, telemetry::RETRIES_TOTAL), 2);
}

#[tokio::test]
async fn metrics_are_noop_without_recorder() {
    let fx = Fixture::new();
    let conv = fx.titled_conversation("alice", PRIOR).await;
    fx.service
        .handle_turn(turn(&conv.id, "alice", "gpt-4.1-mini", BATCH))
        .await
        .unwrap();
}
