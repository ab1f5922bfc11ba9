//! End-to-end pipeline tests through the public API: capture source to
//! scheduler to workers to reassembly to the final formatting call and
//! paste sink.

use overscribe::capture::{ChannelFeed, MockCaptureSource, StreamCaptureSource};
use overscribe::clock::MockClock;
use overscribe::pipeline::scheduler::SegmentTiming;
use overscribe::pipeline::sink::CollectSink;
use overscribe::pipeline::types::SessionMode;
use overscribe::remote::credentials::CredentialPool;
use overscribe::remote::retry::{RetryPolicy, RetryingClient};
use overscribe::remote::service::{MockRemoteService, Operation};
use overscribe::session::{SessionController, SessionState};
use std::sync::Arc;
use std::time::Duration;

fn test_policy() -> RetryPolicy {
    RetryPolicy {
        max_retries: 3,
        rate_limit_backoff: Duration::from_millis(1),
        transient_backoff: Duration::from_millis(1),
        acquire_poll: Duration::from_millis(1),
    }
}

fn client_over(
    service: Arc<MockRemoteService>,
    keys: Vec<&str>,
) -> Arc<RetryingClient> {
    let pool = Arc::new(
        CredentialPool::new(
            keys.into_iter().map(String::from).collect(),
            Duration::from_secs(300),
            Arc::new(MockClock::new()),
        )
        .unwrap(),
    );
    Arc::new(RetryingClient::new(service, pool, test_policy()))
}

// One segment opens per start/resume; segment counts stay exact.
fn manual_timing() -> SegmentTiming {
    SegmentTiming {
        tick_interval: Duration::from_secs(60),
        segment_cap: Duration::from_secs(120),
    }
}

fn settle() {
    std::thread::sleep(Duration::from_millis(30));
}

#[test]
fn transcript_is_reassembled_in_segment_order() {
    let service = Arc::new(
        MockRemoteService::new()
            .with_response("alpha")
            .with_response("beta")
            .with_response("gamma")
            .with_response("Alpha beta gamma."),
    );
    let sink = CollectSink::new();
    let mut controller = SessionController::new(
        Arc::new(MockCaptureSource::new()),
        client_over(Arc::clone(&service), vec!["key-1"]),
        Arc::new(sink.clone()),
        manual_timing(),
        2,
        16000,
    );

    controller.start(SessionMode::Transcribe).unwrap();
    settle();
    controller.pause().unwrap();
    settle();
    controller.resume().unwrap();
    settle();
    controller.pause().unwrap();
    settle();
    controller.resume().unwrap();
    settle();

    let pasted = controller.stop_and_process().unwrap();
    assert_eq!(pasted, "Alpha beta gamma.");
    assert_eq!(sink.collected(), vec!["Alpha beta gamma."]);

    // The formatter received the pieces joined in segment order
    assert_eq!(service.text_payloads(), vec!["alpha beta gamma"]);

    // Transcribe per segment, then exactly one Format
    let ops: Vec<Operation> = service.calls().into_iter().map(|(op, _)| op).collect();
    assert_eq!(
        ops,
        vec![
            Operation::Transcribe,
            Operation::Transcribe,
            Operation::Transcribe,
            Operation::Format,
        ]
    );
}

#[test]
fn live_stream_segments_flow_through_to_paste() {
    let (feed_tx, feed) = ChannelFeed::new();
    let source = Arc::new(StreamCaptureSource::new(Box::new(feed), 16000));

    let service = Arc::new(MockRemoteService::new().with_default_response("sound"));
    let sink = CollectSink::new();

    let timing = SegmentTiming {
        tick_interval: Duration::from_millis(40),
        segment_cap: Duration::from_millis(100),
    };
    let mut controller = SessionController::new(
        source,
        client_over(Arc::clone(&service), vec!["key-1"]),
        Arc::new(sink.clone()),
        timing,
        2,
        16000,
    );

    controller.start(SessionMode::Transcribe).unwrap();

    // Feed ~200ms of audio in 20ms chunks, spanning several segments
    for _ in 0..10 {
        feed_tx.send(vec![42i16; 320]).unwrap();
        std::thread::sleep(Duration::from_millis(20));
    }

    let pasted = controller.stop_and_process().unwrap();
    assert_eq!(pasted, "sound");
    assert_eq!(sink.collected(), vec!["sound"]);
    assert_eq!(controller.state(), SessionState::Idle);

    // At least two overlapping segments were transcribed
    let transcribes = service
        .calls()
        .iter()
        .filter(|(op, _)| *op == Operation::Transcribe)
        .count();
    assert!(
        transcribes >= 2,
        "expected several segments, got {}",
        transcribes
    );

    // End the feed before the capture source drops and joins its feeder
    drop(feed_tx);
}

#[test]
fn rate_limited_credential_rotates_to_the_next_key() {
    let service = Arc::new(
        MockRemoteService::new()
            .with_rate_limited()
            .with_response("hello")
            .with_response("Hello."),
    );
    let sink = CollectSink::new();
    let mut controller = SessionController::new(
        Arc::new(MockCaptureSource::new()),
        client_over(Arc::clone(&service), vec!["key-1", "key-2"]),
        Arc::new(sink.clone()),
        manual_timing(),
        2,
        16000,
    );

    controller.start(SessionMode::Transcribe).unwrap();
    settle();

    let pasted = controller.stop_and_process().unwrap();
    assert_eq!(pasted, "Hello.");

    let keys: Vec<String> = service.calls().into_iter().map(|(_, key)| key).collect();
    assert_eq!(keys[0], "key-1");
    assert_eq!(keys[1], "key-2", "retry should use the fresh credential");
}

#[test]
fn cancelled_session_pastes_nothing_and_can_restart() {
    let service = Arc::new(MockRemoteService::new().with_default_response("never"));
    let sink = CollectSink::new();
    let mut controller = SessionController::new(
        Arc::new(MockCaptureSource::new()),
        client_over(Arc::clone(&service), vec!["key-1"]),
        Arc::new(sink.clone()),
        manual_timing(),
        2,
        16000,
    );

    controller.start(SessionMode::Prompt).unwrap();
    controller.cancel().unwrap();

    assert_eq!(controller.state(), SessionState::Idle);
    assert!(sink.collected().is_empty());

    // A new session in the other mode starts cleanly afterwards
    controller.start(SessionMode::Transcribe).unwrap();
    assert_eq!(controller.state(), SessionState::Recording);
    controller.cancel().unwrap();
}
