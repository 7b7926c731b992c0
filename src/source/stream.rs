//! Network transports.
//!
//! `ws://` endpoints are read as WebSocket text frames; `tcp://` endpoints
//! as newline-delimited JSON. TLS (`wss://`) is not built in and is refused
//! as an unsupported scheme. Each session runs on its own background task
//! and reports through an [`EventSink`].

use futures_util::StreamExt;
use tokio::io::{AsyncBufReadExt, AsyncRead, BufReader};
use tokio::net::TcpStream;
use tokio_tungstenite::tungstenite::Message as WsMessage;
use tracing::debug;

use super::{Connector, Endpoint, EventSink, TransportEvent, TransportHandle};
use crate::error::TransportError;

/// Connector for real network endpoints.
///
/// Must be used from within a tokio runtime context.
#[derive(Debug, Clone, Copy, Default)]
pub struct NetworkConnector;

impl Connector for NetworkConnector {
    fn open(&self, endpoint: &Endpoint, sink: EventSink) -> Result<TransportHandle, TransportError> {
        let runtime = tokio::runtime::Handle::try_current()
            .map_err(|e| TransportError::Runtime(e.to_string()))?;

        let task = match endpoint.scheme() {
            "ws" => runtime.spawn(run_websocket(endpoint.to_string(), sink)),
            "tcp" => runtime.spawn(run_tcp(endpoint.authority(), sink)),
            other => return Err(TransportError::UnsupportedScheme(other.to_string())),
        };

        Ok(TransportHandle::new(task))
    }
}

async fn run_tcp(addr: String, sink: EventSink) {
    debug!("Opening TCP session to {}", addr);
    match TcpStream::connect(&addr).await {
        Ok(stream) => {
            if sink.send(TransportEvent::Opened) {
                pump_lines(stream, &sink).await;
            }
        }
        Err(e) => {
            sink.send(TransportEvent::Error(format!("Connect error: {}", e)));
            sink.send(TransportEvent::Closed(Some(e.to_string())));
        }
    }
}

/// Forward newline-delimited frames from `reader` until EOF or error.
pub(crate) async fn pump_lines<R>(reader: R, sink: &EventSink)
where
    R: AsyncRead + Unpin,
{
    let mut reader = BufReader::new(reader);
    let mut line = String::new();

    loop {
        line.clear();
        match reader.read_line(&mut line).await {
            Ok(0) => {
                sink.send(TransportEvent::Closed(Some("Connection closed".to_string())));
                return;
            }
            Ok(_) => {
                let frame = line.trim();
                if frame.is_empty() {
                    continue;
                }
                if !sink.send(TransportEvent::Message(frame.to_string())) {
                    // Engine dropped
                    return;
                }
            }
            Err(e) => {
                sink.send(TransportEvent::Error(format!("Read error: {}", e)));
                sink.send(TransportEvent::Closed(Some(e.to_string())));
                return;
            }
        }
    }
}

async fn run_websocket(url: String, sink: EventSink) {
    debug!("Opening WebSocket session to {}", url);
    let mut socket = match tokio_tungstenite::connect_async(url.as_str()).await {
        Ok((socket, _response)) => socket,
        Err(e) => {
            sink.send(TransportEvent::Error(format!("WebSocket error: {}", e)));
            sink.send(TransportEvent::Closed(Some(e.to_string())));
            return;
        }
    };

    if !sink.send(TransportEvent::Opened) {
        return;
    }

    while let Some(frame) = socket.next().await {
        let delivered = match frame {
            Ok(WsMessage::Text(text)) => sink.send(TransportEvent::Message(text.to_string())),
            Ok(WsMessage::Binary(bytes)) => sink.send(binary_frame(bytes)),
            Ok(WsMessage::Close(frame)) => {
                let reason = frame
                    .map(|f| f.reason.to_string())
                    .filter(|reason| !reason.is_empty());
                sink.send(TransportEvent::Closed(reason));
                return;
            }
            // Ping/pong are answered by tungstenite itself
            Ok(_) => true,
            Err(e) => {
                sink.send(TransportEvent::Error(format!("WebSocket error: {}", e)));
                sink.send(TransportEvent::Closed(Some(e.to_string())));
                return;
            }
        };
        if !delivered {
            return;
        }
    }

    sink.send(TransportEvent::Closed(None));
}

/// Binary frames must hold UTF-8 text; anything else is passed on as
/// undecodable rather than repaired.
fn binary_frame(bytes: Vec<u8>) -> TransportEvent {
    match String::from_utf8(bytes) {
        Ok(text) => TransportEvent::Message(text),
        Err(e) => TransportEvent::Undecodable(e.to_string()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::source::SessionEvent;
    use std::io::Cursor;
    use tokio::io::AsyncWriteExt;
    use tokio::net::TcpListener;
    use tokio::sync::mpsc;

    fn sink() -> (EventSink, mpsc::UnboundedReceiver<SessionEvent>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (EventSink::new(7, tx), rx)
    }

    fn drain(rx: &mut mpsc::UnboundedReceiver<SessionEvent>) -> Vec<TransportEvent> {
        let mut events = Vec::new();
        while let Ok(ev) = rx.try_recv() {
            assert_eq!(ev.generation, 7);
            events.push(ev.event);
        }
        events
    }

    #[tokio::test]
    async fn pump_lines_forwards_frames_then_closes() {
        let (sink, mut rx) = sink();
        let data = "{\"a\":1}\n\n  {\"b\":2}  \n";
        pump_lines(Cursor::new(data), &sink).await;

        assert_eq!(
            drain(&mut rx),
            vec![
                TransportEvent::Message("{\"a\":1}".to_string()),
                TransportEvent::Message("{\"b\":2}".to_string()),
                TransportEvent::Closed(Some("Connection closed".to_string())),
            ]
        );
    }

    #[tokio::test]
    async fn pump_lines_passes_invalid_frames_through() {
        // Validation happens in the engine, not the transport
        let (sink, mut rx) = sink();
        pump_lines(Cursor::new("not json\n"), &sink).await;
        assert_eq!(drain(&mut rx)[0], TransportEvent::Message("not json".to_string()));
    }

    #[tokio::test]
    async fn unsupported_scheme_fails_to_open() {
        let (sink, _rx) = sink();
        let endpoint = Endpoint::parse("mqtt://localhost:1883").unwrap();
        let result = NetworkConnector.open(&endpoint, sink);
        assert!(matches!(result, Err(TransportError::UnsupportedScheme(s)) if s == "mqtt"));
    }

    #[tokio::test]
    async fn secure_websocket_is_unsupported() {
        let (sink, _rx) = sink();
        let endpoint = Endpoint::parse("wss://device:443").unwrap();
        let result = NetworkConnector.open(&endpoint, sink);
        assert!(matches!(result, Err(TransportError::UnsupportedScheme(s)) if s == "wss"));
    }

    #[test]
    fn binary_frames_are_not_repaired() {
        assert_eq!(
            binary_frame(b"{\"a\":1}".to_vec()),
            TransportEvent::Message("{\"a\":1}".to_string())
        );
        assert!(matches!(
            binary_frame(vec![b'{', 0xff, 0xfe, b'}']),
            TransportEvent::Undecodable(_)
        ));
    }

    #[test]
    fn open_without_runtime_fails() {
        let (sink, _rx) = sink();
        let endpoint = Endpoint::parse("tcp://localhost:9000").unwrap();
        assert!(matches!(
            NetworkConnector.open(&endpoint, sink),
            Err(TransportError::Runtime(_))
        ));
    }

    #[tokio::test]
    async fn tcp_session_delivers_lines() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();

        tokio::spawn(async move {
            let (mut socket, _) = listener.accept().await.unwrap();
            socket.write_all(b"{\"heartRate\":72}\n").await.unwrap();
        });

        let (sink, mut rx) = sink();
        let endpoint = Endpoint::parse(&format!("tcp://{}", addr)).unwrap();
        let _handle = NetworkConnector.open(&endpoint, sink).unwrap();

        let mut events = Vec::new();
        while let Some(ev) = rx.recv().await {
            let closed = matches!(ev.event, TransportEvent::Closed(_));
            events.push(ev.event);
            if closed {
                break;
            }
        }

        assert_eq!(events[0], TransportEvent::Opened);
        assert_eq!(events[1], TransportEvent::Message("{\"heartRate\":72}".to_string()));
        assert!(matches!(events.last(), Some(TransportEvent::Closed(_))));
    }

    #[tokio::test]
    async fn tcp_connect_failure_reports_error_and_close() {
        // Bind then drop to get a port nothing listens on
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        drop(listener);

        let (sink, mut rx) = sink();
        let endpoint = Endpoint::parse(&format!("tcp://{}", addr)).unwrap();
        let _handle = NetworkConnector.open(&endpoint, sink).unwrap();

        let first = rx.recv().await.unwrap().event;
        let second = rx.recv().await.unwrap().event;
        assert!(matches!(first, TransportEvent::Error(_)));
        assert!(matches!(second, TransportEvent::Closed(Some(_))));
    }
}
