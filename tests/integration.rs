//! Integration tests for wirebridge.
//!
//! Each test runs a full session over in-memory duplex streams and plays
//! both endpoints.

use std::sync::{Arc, Mutex};
use std::time::Duration;

use serde_json::{json, Value};
use tokio::io::{duplex, AsyncReadExt, AsyncWriteExt, DuplexStream};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;

use wirebridge::automation::{AutomationConfig, AutomationController};
use wirebridge::codec::MsgPackCodec;
use wirebridge::config::ReportRule;
use wirebridge::policy::{BoxFuture, Dispatch, Forward, HandlerPolicy, Inject};
use wirebridge::protocol::{build_frame, Frame, Header, Role, StreamBuffer};
use wirebridge::registry::{Message, MessageRegistry};
use wirebridge::sink::ReportingSink;
use wirebridge::{BridgeConfig, BridgeError, Link, Result, Session};

const CHAT: u16 = 861;
const MAP_INFO: u16 = 226;
const QUERY: u16 = 5806;
const LEAVE: u16 = 5501;
const ENTER: u16 = 5001;
const PRICES: u16 = 5752;

fn registry() -> Arc<MessageRegistry> {
    let mut registry = MessageRegistry::new();
    registry
        .register_msgpack(CHAT, "ChatClientMultiMessage")
        .unwrap()
        .register_msgpack(MAP_INFO, "MapComplementaryInformationsDataMessage")
        .unwrap()
        .register_msgpack(QUERY, "ExchangeBidHouseSearchMessage")
        .unwrap()
        .register_msgpack(LEAVE, "LeaveDialogRequestMessage")
        .unwrap()
        .register_msgpack(ENTER, "InteractiveUseRequestMessage")
        .unwrap()
        .register_msgpack(PRICES, "ExchangeTypesItemsExchangerDescriptionForUserMessage")
        .unwrap();
    Arc::new(registry)
}

/// Encode a client-to-server frame.
fn client_frame(id: u16, counter: u32, body: Value) -> Vec<u8> {
    let payload = MsgPackCodec::encode(&body).unwrap();
    build_frame(&Header::new(id, Some(counter), payload.len() as u32), &payload)
}

/// Encode a server-to-client frame.
fn server_frame(id: u16, body: Value) -> Vec<u8> {
    let payload = MsgPackCodec::encode(&body).unwrap();
    build_frame(&Header::new(id, None, payload.len() as u32), &payload)
}

fn chat(counter: u32, content: &str) -> Vec<u8> {
    client_frame(CHAT, counter, json!({"content": content, "channel": 0}))
}

/// Read exactly one frame sent by `origin` from `stream`.
async fn read_frame(stream: &mut DuplexStream, origin: Role) -> Frame {
    let mut buffer = StreamBuffer::new(origin);
    let mut byte = [0u8; 1];
    loop {
        if let Some(frame) = buffer.try_extract_frame() {
            return frame;
        }
        stream.read_exact(&mut byte).await.unwrap();
        buffer.append(&byte);
    }
}

fn body_of(frame: &Frame) -> Value {
    MsgPackCodec::decode(frame.payload()).unwrap()
}

/// Start a session; returns the client and server ends and the task.
fn spawn<P>(policy: P) -> (DuplexStream, DuplexStream, JoinHandle<Result<()>>)
where
    P: HandlerPolicy + 'static,
{
    let (client_side, client) = duplex(64 * 1024);
    let (server_side, server) = duplex(64 * 1024);
    let task = tokio::spawn(Session::new(client_side, server_side, policy).run());
    (client, server, task)
}

/// Forward that remembers every chunk handed to it.
#[derive(Default)]
struct Counting {
    inner: Forward,
    chunks: Arc<Mutex<Vec<(Role, Vec<u8>)>>>,
}

impl HandlerPolicy for Counting {
    fn on_chunk<'a>(
        &'a mut self,
        chunk: &'a [u8],
        origin: Role,
        link: &'a mut Link,
    ) -> BoxFuture<'a, Result<()>> {
        self.chunks.lock().unwrap().push((origin, chunk.to_vec()));
        self.inner.on_chunk(chunk, origin, link)
    }
}

#[tokio::test]
async fn test_forward_relays_in_order_and_closes() {
    let policy = Counting::default();
    let chunks = policy.chunks.clone();
    let (mut client, mut server, task) = spawn(policy);

    let mut relayed = [0u8; 4];
    client.write_all(b"AB").await.unwrap();
    server.read_exact(&mut relayed[..2]).await.unwrap();
    client.write_all(b"CD").await.unwrap();
    server.read_exact(&mut relayed[2..]).await.unwrap();
    assert_eq!(&relayed, b"ABCD");

    drop(client);
    task.await.unwrap().unwrap();

    let mut rest = Vec::new();
    server.read_to_end(&mut rest).await.unwrap();
    assert!(rest.is_empty());

    // the zero-length read reaches nobody
    assert_eq!(
        *chunks.lock().unwrap(),
        vec![(Role::Primary, b"AB".to_vec()), (Role::Primary, b"CD".to_vec())]
    );
}

#[tokio::test]
async fn test_forward_is_byte_identical_under_arbitrary_chunking() {
    let (mut client, mut server, task) = spawn(Forward);

    let upstream: Vec<u8> = (0..5000u32).map(|i| (i * 7 % 251) as u8).collect();
    let downstream: Vec<u8> = (0..3000u32).map(|i| (i * 13 % 241) as u8).collect();

    let mut offset = 0;
    for size in [1, 2, 3, 5, 8, 13, 21, 34, 55, 89].iter().cycle() {
        if offset >= upstream.len() {
            break;
        }
        let end = (offset + size).min(upstream.len());
        client.write_all(&upstream[offset..end]).await.unwrap();
        offset = end;
    }
    server.write_all(&downstream).await.unwrap();

    let mut up = vec![0u8; upstream.len()];
    server.read_exact(&mut up).await.unwrap();
    assert_eq!(up, upstream);

    let mut down = vec![0u8; downstream.len()];
    client.read_exact(&mut down).await.unwrap();
    assert_eq!(down, downstream);

    drop(server);
    task.await.unwrap().unwrap();
}

#[tokio::test]
async fn test_dispatch_skips_unknown_ids_and_decodes_split_frames() {
    let seen = Arc::new(Mutex::new(Vec::new()));
    let sink = seen.clone();
    let policy = Dispatch::new(registry(), move |message: &Message, origin: Role| {
        sink.lock().unwrap().push((message.clone(), origin));
    });
    let (mut client, mut server, task) = spawn(policy);

    let mut stream = server_frame(999, json!("unregistered"));
    stream.extend(server_frame(
        MAP_INFO,
        json!({"subAreaId": 10, "mapId": 153880835}),
    ));
    let (head, tail) = stream.split_at(stream.len() - 3);
    server.write_all(head).await.unwrap();
    server.write_all(tail).await.unwrap();

    let mut relayed = vec![0u8; stream.len()];
    client.read_exact(&mut relayed).await.unwrap();
    assert_eq!(relayed, stream);

    drop(client);
    task.await.unwrap().unwrap();

    let seen = seen.lock().unwrap();
    assert_eq!(seen.len(), 1);
    assert_eq!(seen[0].0.name, "MapComplementaryInformationsDataMessage");
    assert_eq!(seen[0].0.body["mapId"], 153880835);
    assert_eq!(seen[0].1, Role::Secondary);
}

#[tokio::test]
async fn test_dispatch_length_mismatch_ends_session() {
    let calls = Arc::new(Mutex::new(0usize));
    let counter = calls.clone();
    let policy = Dispatch::new(registry(), move |_: &Message, _: Role| {
        *counter.lock().unwrap() += 1;
    });
    let (mut client, mut server, task) = spawn(policy);

    // a valid body followed by two bytes the codec never reads
    let mut payload = MsgPackCodec::encode(&json!({"content": "x"})).unwrap();
    payload.extend_from_slice(&[0xAA, 0xBB]);
    let frame = build_frame(&Header::new(CHAT, Some(1), payload.len() as u32), &payload);
    client.write_all(&frame).await.unwrap();

    let err = task.await.unwrap().unwrap_err();
    match err {
        BridgeError::DecodeInvariant {
            id,
            name,
            declared,
            consumed,
            ..
        } => {
            assert_eq!(id, CHAT);
            assert_eq!(name, "ChatClientMultiMessage");
            assert_eq!(declared, consumed + 2);
        }
        other => panic!("unexpected error: {other}"),
    }
    assert_eq!(*calls.lock().unwrap(), 0);

    // relayed before the check, then both connections closed
    let mut relayed = Vec::new();
    server.read_to_end(&mut relayed).await.unwrap();
    assert_eq!(relayed, frame);
    let mut rest = Vec::new();
    client.read_to_end(&mut rest).await.unwrap();
    assert!(rest.is_empty());
}

#[tokio::test]
async fn test_handle_injections_shift_genuine_counters() {
    let (client_side, mut client) = duplex(64 * 1024);
    let (server_side, mut server) = duplex(64 * 1024);
    let mut session = Session::new(client_side, server_side, Inject::new(registry()));
    let handle = session.inject_handle();
    let task = tokio::spawn(session.run());

    client.write_all(&chat(10, "hello")).await.unwrap();
    assert_eq!(read_frame(&mut server, Role::Primary).await.counter(), Some(10));

    for item in [101, 102, 103] {
        handle
            .send_to_secondary(Message::new(
                "ExchangeBidHouseSearchMessage",
                json!({"genId": item, "follow": true}),
            ))
            .await
            .unwrap();
    }
    for expected in 11..=13 {
        let injected = read_frame(&mut server, Role::Primary).await;
        assert_eq!(injected.id(), QUERY);
        assert_eq!(injected.counter(), Some(expected));
    }

    // the client still believes its next counter is 11
    let genuine = chat(11, "again");
    client.write_all(&genuine).await.unwrap();
    let relayed = read_frame(&mut server, Role::Primary).await;
    assert_eq!(relayed.counter(), Some(14));
    assert_eq!(body_of(&relayed)["content"], "again");

    handle
        .send_to_primary(Message::new(
            "ChatClientMultiMessage",
            json!({"content": "notice", "channel": 0}),
        ))
        .await
        .unwrap();
    let notice = read_frame(&mut client, Role::Secondary).await;
    assert_eq!(body_of(&notice)["content"], "notice");

    drop(client);
    task.await.unwrap().unwrap();
}

#[tokio::test]
async fn test_client_injection_never_splits_server_frame() {
    let (client_side, mut client) = duplex(64 * 1024);
    let (server_side, mut server) = duplex(64 * 1024);
    let mut session = Session::new(client_side, server_side, Inject::new(registry()));
    let handle = session.inject_handle();
    let task = tokio::spawn(session.run());

    let map_info = server_frame(MAP_INFO, json!({"mapId": 153880322, "subAreaId": 1}));
    server.write_all(&map_info[..5]).await.unwrap();
    let mut head = [0u8; 5];
    client.read_exact(&mut head).await.unwrap();

    handle
        .send_to_primary(Message::new(
            "ChatClientMultiMessage",
            json!({"content": "notice", "channel": 0}),
        ))
        .await
        .unwrap();
    server.write_all(&map_info[5..]).await.unwrap();

    let mut rest = vec![0u8; map_info.len() - 5];
    client.read_exact(&mut rest).await.unwrap();
    let mut relayed = head.to_vec();
    relayed.extend_from_slice(&rest);
    assert_eq!(relayed, map_info);

    let notice = read_frame(&mut client, Role::Secondary).await;
    assert_eq!(notice.id(), CHAT);
    assert_eq!(body_of(&notice)["content"], "notice");

    drop(client);
    task.await.unwrap().unwrap();
}

#[tokio::test]
async fn test_dispatch_decodes_binary_fields() {
    let seen = Arc::new(Mutex::new(Vec::new()));
    let sink = seen.clone();
    let policy = Dispatch::new(registry(), move |message: &Message, _: Role| {
        sink.lock().unwrap().push(message.clone());
    });
    let (mut client, mut server, task) = spawn(policy);

    // {"d": bin8 [1, 2]}
    let payload = [0x81, 0xA1, b'd', 0xC4, 0x02, 0x01, 0x02];
    let frame = build_frame(&Header::new(MAP_INFO, None, payload.len() as u32), &payload);
    server.write_all(&frame).await.unwrap();
    let mut relayed = vec![0u8; frame.len()];
    client.read_exact(&mut relayed).await.unwrap();

    drop(client);
    task.await.unwrap().unwrap();

    let seen = seen.lock().unwrap();
    assert_eq!(seen.len(), 1);
    assert_eq!(seen[0].body, json!({"d": [1, 2]}));
}

#[tokio::test(start_paused = true)]
async fn test_automation_worklist_scenario() {
    let automation = AutomationController::new(
        AutomationConfig::new(vec![7, 8, 9]).with_pacing(Duration::from_millis(800)),
        tokio::time::Instant::now(),
    );
    let (mut client, mut server, task) = spawn(Inject::new(registry()).with_automation(automation));
    let step = Duration::from_millis(801);
    let map_info = server_frame(MAP_INFO, json!({"mapId": 1}));

    client.write_all(&chat(1, "start")).await.unwrap();
    assert_eq!(read_frame(&mut server, Role::Primary).await.counter(), Some(1));

    // two queries, then the refresh pair
    let mut injected = Vec::new();
    for frames in [1, 1, 2] {
        tokio::time::advance(step).await;
        server.write_all(&map_info).await.unwrap();
        read_frame(&mut client, Role::Secondary).await;
        for _ in 0..frames {
            injected.push(read_frame(&mut server, Role::Primary).await);
        }
    }

    let summary: Vec<(u16, Option<u32>)> = injected.iter().map(|f| (f.id(), f.counter())).collect();
    assert_eq!(
        summary,
        vec![
            (QUERY, Some(2)),
            (QUERY, Some(3)),
            (LEAVE, Some(4)),
            (ENTER, Some(5)),
        ]
    );
    assert_eq!(body_of(&injected[0])["genId"], 9);
    assert_eq!(body_of(&injected[1])["genId"], 8);

    // stop halts automation; forwarding continues with shifted counters
    client.write_all(&chat(2, "stop")).await.unwrap();
    assert_eq!(read_frame(&mut server, Role::Primary).await.counter(), Some(6));

    tokio::time::advance(step * 3).await;
    server.write_all(&map_info).await.unwrap();
    read_frame(&mut client, Role::Secondary).await;

    drop(client);
    task.await.unwrap().unwrap();

    let mut rest = Vec::new();
    server.read_to_end(&mut rest).await.unwrap();
    assert!(rest.is_empty(), "no action after stop, got {} bytes", rest.len());
}

struct Recording(mpsc::UnboundedSender<(String, Vec<i64>)>);

impl ReportingSink for Recording {
    fn report<'a>(&'a self, identifier: &'a str, values: &'a [i64]) -> BoxFuture<'a, Result<()>> {
        Box::pin(async move {
            let _ = self.0.send((identifier.to_string(), values.to_vec()));
            Ok(())
        })
    }
}

#[tokio::test]
async fn test_configured_inject_reports_responses() {
    let config = BridgeConfig::from_json(r#"{"report": {}, "inject": {"history_capacity": 4}}"#)
        .unwrap();
    assert_eq!(config.report, Some(ReportRule::default()));

    let (reports_tx, mut reports) = mpsc::unbounded_channel();
    let reporting: Arc<dyn ReportingSink> = Arc::new(Recording(reports_tx));
    let policy = Inject::new(registry()).configure(&config, Some(reporting));
    let (mut client, mut server, task) = spawn(policy);

    let response = server_frame(
        PRICES,
        json!({"itemTypeDescriptions": [{"objectGID": 11971, "prices": [120, 1100, 9800]}]}),
    );
    server.write_all(&response).await.unwrap();
    let mut relayed = vec![0u8; response.len()];
    client.read_exact(&mut relayed).await.unwrap();
    assert_eq!(relayed, response);

    let report = tokio::time::timeout(Duration::from_secs(5), reports.recv())
        .await
        .unwrap();
    assert_eq!(report, Some(("11971".to_string(), vec![120, 1100, 9800])));

    drop(server);
    task.await.unwrap().unwrap();

    // the sink worker ends with the session
    assert_eq!(reports.recv().await, None);
}
