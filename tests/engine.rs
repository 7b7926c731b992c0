//! End-to-end engine behaviour with in-process transports and storage.

use std::sync::Arc;
use std::time::Duration;

use parking_lot::Mutex;
use tokio::io::AsyncWriteExt;
use tokio::net::TcpListener;

use athlete_monitor::data::{SessionDocument, SESSION_KEY};
use athlete_monitor::source::{EventSink, TransportHandle};
use athlete_monitor::{
    Confirmation, ConnectionState, Connector, Endpoint, EngineConfig, ExportFormat, MemoryStorage,
    MonitorEngine, MonitorEvent, NetworkConnector, TransportError, TransportEvent,
};

/// Connector whose sessions are driven by the test.
#[derive(Debug, Clone, Default)]
struct ScriptedConnector {
    sinks: Arc<Mutex<Vec<EventSink>>>,
}

impl ScriptedConnector {
    fn current(&self) -> EventSink {
        self.sinks.lock().last().cloned().expect("no session opened")
    }

    fn opened(&self) -> usize {
        self.sinks.lock().len()
    }
}

impl Connector for ScriptedConnector {
    fn open(&self, _endpoint: &Endpoint, sink: EventSink) -> Result<TransportHandle, TransportError> {
        self.sinks.lock().push(sink);
        Ok(TransportHandle::detached())
    }
}

fn reading_json(hr: u32, squats: u32) -> String {
    format!(
        r#"{{"heartRate":{},"spO2":97,"squatCount":{},"postureStatus":"GOOD","fingerDetected":true,"fallDetected":false}}"#,
        hr, squats
    )
}

fn engine_with(storage: &MemoryStorage) -> (MonitorEngine, ScriptedConnector) {
    let connector = ScriptedConnector::default();
    let engine = MonitorEngine::new(
        EngineConfig::default(),
        Box::new(connector.clone()),
        Arc::new(storage.clone()),
    );
    (engine, connector)
}

#[test]
fn buffer_is_fifo_and_bounded() {
    let storage = MemoryStorage::new();
    let (mut engine, _) = engine_with(&storage);

    for i in 0..1001 {
        engine.ingest(&reading_json(60 + i % 40, i)).unwrap();
        assert!(engine.statistics().total_readings <= 1000);
    }

    let stats = engine.statistics();
    assert_eq!(stats.total_readings, 1000);
    assert_eq!(stats.total_readings, engine.session().len());
    // The first reading was evicted; the second is now at the front
    assert_eq!(engine.session().readings().front().unwrap().squat_count, 1.0);
    assert_eq!(stats.max_squat_count, Some(1000.0));
}

#[test]
fn session_survives_restart() {
    let storage = MemoryStorage::new();
    {
        let (mut engine, _) = engine_with(&storage);
        engine.ingest(&reading_json(70, 1)).unwrap();
        engine.ingest(&reading_json(80, 2)).unwrap();
    }

    let (engine, _) = engine_with(&storage);
    assert_eq!(engine.session().len(), 2);
    assert_eq!(engine.statistics().average_heart_rate, Some(75.0));
    // Trend state is not carried over
    assert!(engine.latest().is_none());
}

#[test]
fn json_export_reproduces_persisted_data() {
    let storage = MemoryStorage::new();
    let (mut engine, _) = engine_with(&storage);
    for i in 0..5 {
        engine.ingest(&reading_json(70 + i, i)).unwrap();
    }

    let export = engine.export(ExportFormat::Json).unwrap().unwrap();
    let exported: SessionDocument = serde_json::from_str(&export.contents).unwrap();
    let persisted: SessionDocument =
        serde_json::from_str(&storage.get(SESSION_KEY).unwrap()).unwrap();

    assert_eq!(exported.data, persisted.data);
    assert_eq!(exported.data.len(), 5);
    assert!(persisted.metadata.export_timestamp.is_some());

    let value: serde_json::Value = serde_json::from_str(&export.contents).unwrap();
    assert!(value.get("exportDate").is_some());
    assert!(export.file_name.starts_with("athlete-session-"));
}

#[test]
fn csv_export_of_empty_session_signals_no_data() {
    let storage = MemoryStorage::new();
    let (mut engine, _) = engine_with(&storage);
    assert!(engine.export(ExportFormat::Csv).unwrap().is_none());
}

#[test]
fn quota_failure_truncates_and_warns() {
    // Room for several hundred readings but not a full session
    let storage = MemoryStorage::with_quota(100_000);
    let (mut engine, _) = engine_with(&storage);
    let mut events = engine.subscribe();

    for i in 0..1000 {
        engine.ingest(&reading_json(70, i)).unwrap();
    }

    let warned = std::iter::from_fn(|| events.try_recv().ok())
        .any(|ev| matches!(ev, MonitorEvent::StorageWarning { .. }));
    assert!(warned);
    assert!(engine.session().len() < 1000);
    assert!(storage.get(SESSION_KEY).unwrap().len() <= 100_000);
}

#[test]
fn missing_field_is_dropped_without_panic() {
    let storage = MemoryStorage::new();
    let (mut engine, connector) = engine_with(&storage);
    engine.connect("ws://device:81").unwrap();

    let sink = connector.current();
    sink.send(TransportEvent::Opened);
    sink.send(TransportEvent::Message(
        r#"{"heartRate":70,"spO2":97,"squatCount":1,"postureStatus":"GOOD","fingerDetected":true}"#
            .to_string(),
    ));
    sink.send(TransportEvent::Message(reading_json(70, 1)));
    engine.poll();

    assert_eq!(engine.session().len(), 1);
    assert_eq!(engine.counters().rejected, 1);
}

#[test]
fn clear_persists_empty_session() {
    let storage = MemoryStorage::new();
    let (mut engine, _) = engine_with(&storage);
    engine.ingest(&reading_json(70, 1)).unwrap();

    assert!(engine.clear(Confirmation::Accepted));
    let persisted: SessionDocument =
        serde_json::from_str(&storage.get(SESSION_KEY).unwrap()).unwrap();
    assert!(persisted.data.is_empty());
    assert_eq!(persisted.metadata.total_readings, 0);
    assert_eq!(persisted.metadata.session_start, None);
}

#[tokio::test(start_paused = true)]
async fn reconnects_until_manual_disconnect() {
    let storage = MemoryStorage::new();
    let (mut engine, connector) = engine_with(&storage);
    let mut events = engine.subscribe();

    engine.connect("ws://device:81").unwrap();
    connector.current().send(TransportEvent::Opened);
    engine.step().await;
    assert_eq!(engine.connection_state(), ConnectionState::Connected);

    // Two abnormal closes in a row back off 1s then 2s
    for expected in [1u64, 2] {
        connector.current().send(TransportEvent::Closed(None));
        engine.step().await;
        let before = tokio::time::Instant::now();
        engine.step().await;
        let waited = before.elapsed();
        assert!(waited >= Duration::from_secs(expected));
        assert!(waited < Duration::from_secs(expected) + Duration::from_millis(10));
    }
    assert_eq!(connector.opened(), 3);

    engine.disconnect();
    connector.current().send(TransportEvent::Closed(None));
    engine.poll();
    assert!(!engine.connection().pending_reconnect());
    assert_eq!(engine.connection_state(), ConnectionState::Disconnected);

    let delays: Vec<Duration> = std::iter::from_fn(|| events.try_recv().ok())
        .filter_map(|ev| match ev {
            MonitorEvent::ReconnectScheduled { delay, .. } => Some(delay),
            _ => None,
        })
        .collect();
    assert_eq!(delays, vec![Duration::from_secs(1), Duration::from_secs(2)]);
}

#[tokio::test]
async fn tcp_stream_feeds_the_session() {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();

    tokio::spawn(async move {
        let (mut socket, _) = listener.accept().await.unwrap();
        for i in 0..3 {
            let line = format!("{}\n", reading_json(70 + i, i));
            socket.write_all(line.as_bytes()).await.unwrap();
        }
        socket.write_all(b"not json\n").await.unwrap();
        // Keep the connection open until the test is done
        tokio::time::sleep(Duration::from_secs(5)).await;
    });

    let storage = MemoryStorage::new();
    let mut engine = MonitorEngine::new(
        EngineConfig::default(),
        Box::new(NetworkConnector),
        Arc::new(storage.clone()),
    );
    engine.connect(&format!("tcp://{}", addr)).unwrap();

    tokio::time::timeout(Duration::from_secs(5), async {
        while engine.counters().accepted + engine.counters().dropped() < 4 {
            engine.step().await;
        }
    })
    .await
    .unwrap();

    assert_eq!(engine.connection_state(), ConnectionState::Connected);
    assert_eq!(engine.session().len(), 3);
    assert_eq!(engine.counters().malformed, 1);
    assert!(storage.get(SESSION_KEY).is_some());
}
