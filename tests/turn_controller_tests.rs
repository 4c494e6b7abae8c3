use bytes::Bytes;
use futures::future::BoxFuture;
use futures::stream;
use opendoc_chat::api::mock_client::frames;
use opendoc_chat::api::{ByteStream, ChatTransport, MockResponse, MockTail, MockTransport};
use opendoc_chat::config::Config;
use opendoc_chat::error::{ControllerError, TransportError};
use opendoc_chat::runtime::{ControllerState, TurnController, TurnHandle};
use opendoc_chat::state::{Segment, ToolCallStatus, TurnStatus, TurnUpdate};
use opendoc_chat::types::ChatRequest;
use serde_json::json;
use std::sync::Mutex;
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::time::Instant;

async fn collect_updates(handle: &mut TurnHandle) -> Vec<TurnUpdate> {
    let mut updates = Vec::new();
    while let Some(update) = handle.next_update().await {
        updates.push(update);
    }
    updates
}

/// Transport whose single stream is fed by the test, one chunk at a time.
struct ChannelTransport {
    rx: Mutex<Option<mpsc::UnboundedReceiver<Result<Bytes, TransportError>>>>,
}

impl ChannelTransport {
    fn new() -> (Self, mpsc::UnboundedSender<Result<Bytes, TransportError>>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (
            Self {
                rx: Mutex::new(Some(rx)),
            },
            tx,
        )
    }
}

impl ChatTransport for ChannelTransport {
    fn open<'a>(&'a self, _request: &'a ChatRequest) -> BoxFuture<'a, Result<ByteStream, TransportError>> {
        let rx = self.rx.lock().unwrap().take();
        Box::pin(async move {
            let rx = rx.ok_or_else(|| TransportError::Stream("already opened".to_string()))?;
            let stream = stream::unfold(rx, |mut rx| async move {
                rx.recv().await.map(|item| (item, rx))
            });
            Ok(Box::pin(stream) as ByteStream)
        })
    }
}

fn chunk(frame: String) -> Result<Bytes, TransportError> {
    Ok(Bytes::from(format!("{frame}\n\n")))
}

#[tokio::test]
async fn test_text_tool_text_turn_over_transport() {
    let transport = MockTransport::new(vec![MockResponse::frames([
        frames::session("s1"),
        frames::text("Let me check."),
        frames::tool_call_start("t1", "read_file", ""),
        frames::tool_call_args("{\"path\":"),
        frames::tool_call_args("\"a.md\"}"),
        frames::tool_call_end(Some("t1"), None),
        frames::done(),
        frames::text("Done."),
    ])]);
    let controller = TurnController::new(transport.clone(), &Config::default());

    let mut handle = controller.submit("What is in a.md?").unwrap();
    assert_eq!(controller.state(), ControllerState::Streaming);
    let updates = collect_updates(&mut handle).await;
    let turn = handle.wait().await.unwrap();

    assert_eq!(turn.status(), TurnStatus::Complete);
    assert_eq!(controller.state(), ControllerState::Complete);
    assert_eq!(turn.session_id(), Some("s1"));

    let segments: Vec<_> = turn.segments().iter().collect();
    assert_eq!(segments.len(), 3);
    assert!(matches!(segments[0].1, Segment::Text(text) if text.content == "Let me check."));
    let call = turn.tool_call_for(segments[1].0).unwrap();
    assert_eq!(call.status, ToolCallStatus::Done);
    assert_eq!(call.arguments_final, Some(json!({"path": "a.md"})));
    assert!(matches!(segments[2].1, Segment::Text(text) if text.content == "Done."));

    assert_eq!(
        updates.last(),
        Some(&TurnUpdate::Finished {
            status: TurnStatus::Complete,
            diagnostic: None,
        })
    );

    let requests = transport.requests();
    assert_eq!(requests.len(), 1);
    assert_eq!(requests[0].message, "What is in a.md?");
    assert_eq!(requests[0].session_id, None);
    assert_eq!(requests[0].provider, "anthropic");
}

#[tokio::test]
async fn test_session_id_is_echoed_on_next_request() {
    let transport = MockTransport::new(vec![
        MockResponse::frames([frames::session("s1"), frames::text("first")]),
        MockResponse::frames([frames::text("second")]),
    ]);
    let controller = TurnController::new(transport.clone(), &Config::default());

    let turn = controller.submit("one").unwrap().wait().await.unwrap();
    assert_eq!(turn.text(), "first");
    assert_eq!(controller.session_id().as_deref(), Some("s1"));

    let turn = controller.submit("two").unwrap().wait().await.unwrap();
    assert_eq!(turn.text(), "second");

    let requests = transport.requests();
    assert_eq!(requests[0].session_id, None);
    assert_eq!(requests[1].session_id.as_deref(), Some("s1"));

    controller.reset_session();
    assert_eq!(controller.session_id(), None);
}

#[tokio::test]
async fn test_second_submit_while_streaming_is_busy() {
    let transport = MockTransport::new(vec![
        MockResponse::frames([frames::text("thinking")]).then(MockTail::Hang),
        MockResponse::frames([frames::text("again")]),
    ]);
    let controller = TurnController::new(transport, &Config::default());

    let handle = controller.submit("first").unwrap();
    assert!(matches!(controller.submit("second"), Err(ControllerError::Busy)));

    controller.cancel(&handle);
    let turn = handle.wait().await.unwrap();
    assert_eq!(turn.status(), TurnStatus::Cancelled);
    assert_eq!(controller.state(), ControllerState::Cancelled);

    let turn = controller.submit("third").unwrap().wait().await.unwrap();
    assert_eq!(turn.text(), "again");
}

#[tokio::test]
async fn test_empty_message_is_rejected() {
    let controller = TurnController::new(MockTransport::default(), &Config::default());
    assert!(matches!(controller.submit("   "), Err(ControllerError::EmptyMessage)));
    assert_eq!(controller.state(), ControllerState::Idle);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_drained_update_feed_means_controller_settled() {
    const TURNS: usize = 200;
    let responses = (0..TURNS)
        .map(|n| MockResponse::frames([frames::session(&format!("s{n}")), frames::text("ok")]))
        .collect();
    let transport = MockTransport::new(responses);
    let controller = TurnController::new(transport.clone(), &Config::default());

    for n in 0..TURNS {
        let mut handle = controller
            .submit(format!("turn {n}"))
            .unwrap_or_else(|error| panic!("turn {n} rejected: {error}"));
        while handle.next_update().await.is_some() {}

        assert_eq!(controller.state(), ControllerState::Complete, "turn {n}");
        assert_eq!(handle.status(), TurnStatus::Complete, "turn {n}");
        assert_eq!(controller.session_id(), Some(format!("s{n}")), "turn {n}");
    }

    let requests = transport.requests();
    assert_eq!(requests.len(), TURNS);
    assert_eq!(requests[0].session_id, None);
    for n in 1..TURNS {
        assert_eq!(requests[n].session_id, Some(format!("s{}", n - 1)));
    }
}

#[tokio::test(start_paused = true)]
async fn test_cancel_seals_partial_content() {
    let transport = MockTransport::new(vec![MockResponse::frames([
        frames::text("Reading "),
        frames::tool_call_start("t1", "read_file", "{\"path\":\"a"),
    ])
    .then(MockTail::Hang)]);
    let controller = TurnController::new(transport, &Config::default());
    let mut handle = controller.submit("go").unwrap();

    // Wait until the tool call is open before cancelling.
    loop {
        match handle.next_update().await {
            Some(TurnUpdate::SegmentOpened {
                segment: Segment::ToolCall(_),
                ..
            }) => break,
            Some(_) => continue,
            None => panic!("turn ended before tool call opened"),
        }
    }
    handle.cancel();
    handle.cancel();

    let updates = collect_updates(&mut handle).await;
    let turn = handle.wait().await.unwrap();

    assert_eq!(turn.status(), TurnStatus::Cancelled);
    assert_eq!(turn.diagnostic(), None);
    assert_eq!(turn.text(), "Reading ");
    assert_eq!(turn.segments().unsealed_count(), 0);
    assert_eq!(turn.tool_calls().get("t1").unwrap().status, ToolCallStatus::Error);
    assert_eq!(
        updates.last(),
        Some(&TurnUpdate::Finished {
            status: TurnStatus::Cancelled,
            diagnostic: None,
        })
    );
}

#[tokio::test]
async fn test_stream_failure_ends_turn_in_error() {
    let transport = MockTransport::new(vec![
        MockResponse::frames([frames::text("partial")]).then(MockTail::Fail("connection reset".to_string())),
    ]);
    let controller = TurnController::new(transport, &Config::default());

    let turn = controller.submit("go").unwrap().wait().await.unwrap();
    assert_eq!(turn.status(), TurnStatus::Error);
    assert_eq!(turn.diagnostic(), Some("chat stream interrupted: connection reset"));
    assert_eq!(turn.text(), "partial");
    assert_eq!(controller.state(), ControllerState::Error);
}

#[tokio::test]
async fn test_http_failure_uses_server_message() {
    let transport = MockTransport::new(vec![MockResponse::open_error(TransportError::Status {
        status: 500,
        message: "Chat failed".to_string(),
    })]);
    let controller = TurnController::new(transport, &Config::default());

    let mut handle = controller.submit("go").unwrap();
    let updates = collect_updates(&mut handle).await;
    let turn = handle.wait().await.unwrap();

    assert_eq!(turn.status(), TurnStatus::Error);
    assert_eq!(turn.diagnostic(), Some("Chat failed"));
    assert!(turn.segments().is_empty());
    assert_eq!(
        updates,
        vec![TurnUpdate::Finished {
            status: TurnStatus::Error,
            diagnostic: Some("Chat failed".to_string()),
        }]
    );
}

#[tokio::test]
async fn test_server_error_event_stops_reading() {
    let transport = MockTransport::new(vec![MockResponse::frames([
        frames::text("partial answer"),
        frames::error("rate limited"),
        frames::text("ignored"),
    ])]);
    let controller = TurnController::new(transport, &Config::default());

    let turn = controller.submit("go").unwrap().wait().await.unwrap();
    assert_eq!(turn.status(), TurnStatus::Error);
    assert_eq!(turn.diagnostic(), Some("rate limited"));
    assert_eq!(turn.text(), "partial answer");
}

#[tokio::test(start_paused = true)]
async fn test_streaming_text_renders_within_debounce_window() {
    let (transport, tx) = ChannelTransport::new();
    let controller = TurnController::new(transport, &Config::default());
    let mut handle = controller.submit("go").unwrap();

    tx.send(chunk(frames::text("a"))).unwrap();
    assert!(matches!(
        handle.next_update().await,
        Some(TurnUpdate::SegmentOpened { .. })
    ));
    let start = Instant::now();

    for _ in 0..4 {
        tokio::time::sleep(Duration::from_millis(10)).await;
        tx.send(chunk(frames::text("a"))).unwrap();
    }

    match handle.next_update().await {
        Some(TurnUpdate::TextRender { content, .. }) => assert_eq!(content, "aaaaa"),
        other => panic!("expected a debounced render, got {other:?}"),
    }
    let elapsed = Instant::now() - start;
    assert!(elapsed >= Duration::from_millis(50), "rendered early: {elapsed:?}");
    assert!(elapsed < Duration::from_millis(60), "rendered late: {elapsed:?}");

    drop(tx);
    let updates = collect_updates(&mut handle).await;
    assert!(matches!(
        updates.first(),
        Some(TurnUpdate::TextRender { content, .. }) if content == "aaaaa"
    ));
    let turn = handle.wait().await.unwrap();
    assert_eq!(turn.status(), TurnStatus::Complete);
}
