//! Stdio server: one JSON request per line in, reply envelopes and pushed
//! output events out.
//!
//! Replies and events share stdout through a single writer task so lines
//! are never interleaved. The registry subscriber only enqueues onto the
//! writer channel, which keeps the host's dispatch path non-blocking.

use std::sync::Arc;

use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::sync::mpsc;

use hatch_pty::{SessionEvent, SessionId, SessionRegistry};

use crate::bridge::Bridge;
use crate::ipc::{ErrorKind, OutputEvent, Reply, RequestEnvelope};

pub async fn run(bridge: Arc<Bridge>, registry: Arc<SessionRegistry>) -> std::io::Result<()> {
    let (tx, mut rx) = mpsc::unbounded_channel::<String>();

    let writer_task = tokio::spawn(async move {
        let mut stdout = tokio::io::stdout();
        while let Some(line) = rx.recv().await {
            if stdout.write_all(line.as_bytes()).await.is_err()
                || stdout.write_all(b"\n").await.is_err()
                || stdout.flush().await.is_err()
            {
                return;
            }
        }
    });

    let event_tx = tx.clone();
    let subscriber = registry.subscribe(move |id, event| {
        if let Some(json) = event_to_json(id, event) {
            let _ = event_tx.send(json);
        }
    });

    let mut reader = BufReader::new(tokio::io::stdin());
    let mut line = String::new();
    loop {
        line.clear();
        let n = reader.read_line(&mut line).await?;
        if n == 0 {
            log::info!("stdin closed, shutting down");
            break;
        }
        let trimmed = line.trim();
        if trimmed.is_empty() {
            continue;
        }

        let reply = match parse_request(trimmed) {
            Ok(envelope) => bridge.handle(envelope),
            Err(reply) => reply,
        };
        match serde_json::to_string(&reply) {
            Ok(json) => {
                let _ = tx.send(json);
            }
            Err(e) => log::error!("failed to encode reply: {e}"),
        }
    }

    registry.unsubscribe(subscriber);
    drop(tx);
    let _ = writer_task.await;
    Ok(())
}

/// Parse one request line, classifying the two failure modes: a line that is
/// not JSON at all is a transport failure, while well-formed JSON that does
/// not decode as a known request (unknown op, wrong field types) is an
/// invalid argument. The client `seq` is echoed whenever it is readable.
fn parse_request(line: &str) -> Result<RequestEnvelope, Reply> {
    let value: serde_json::Value = serde_json::from_str(line).map_err(|e| {
        Reply::error(
            None,
            ErrorKind::TransportFailure,
            format!("unreadable request line: {e}"),
        )
    })?;
    let seq = value.get("seq").and_then(|v| v.as_u64());
    serde_json::from_value(value).map_err(|e| {
        Reply::error(
            seq,
            ErrorKind::InvalidArgument,
            format!("malformed request: {e}"),
        )
    })
}

/// Encode one registry event as a pushed output line.
fn event_to_json(id: SessionId, event: &SessionEvent) -> Option<String> {
    let payload = match event {
        SessionEvent::Data(chunk) => OutputEvent::data(id, chunk),
        SessionEvent::Exited { code } => OutputEvent::exited(id, *code),
    };
    match serde_json::to_string(&payload) {
        Ok(json) => Some(json),
        Err(e) => {
            log::error!("failed to encode output event for session {id}: {e}");
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_non_json_line_is_transport_failure() {
        let reply = parse_request("not json at all").unwrap_err();
        assert!(!reply.ok);
        assert_eq!(reply.error.unwrap().kind, ErrorKind::TransportFailure);
    }

    #[test]
    fn test_wrong_field_type_is_invalid_argument() {
        // Well-formed JSON, but `data` must be a string.
        let reply = parse_request(r#"{"seq":9,"op":"sessions:write","id":1,"data":42}"#)
            .unwrap_err();
        assert_eq!(reply.seq, Some(9));
        assert_eq!(reply.error.unwrap().kind, ErrorKind::InvalidArgument);
    }

    #[test]
    fn test_unknown_op_is_invalid_argument() {
        let reply = parse_request(r#"{"op":"sessions:explode"}"#).unwrap_err();
        assert_eq!(reply.error.unwrap().kind, ErrorKind::InvalidArgument);
    }

    #[test]
    fn test_valid_request_parses() {
        let envelope = parse_request(r#"{"op":"sessions:list"}"#).unwrap();
        assert!(envelope.seq.is_none());
    }

    #[test]
    fn test_data_event_encoding() {
        let json = event_to_json(3, &SessionEvent::Data(b"ok\r\n".to_vec())).unwrap();
        let value: serde_json::Value = serde_json::from_str(&json).unwrap();
        assert_eq!(value["event"], "sessions:output");
        assert_eq!(value["id"], 3);
        assert_eq!(value["data"], "ok\r\n");
    }

    #[test]
    fn test_exit_event_encoding() {
        let json = event_to_json(3, &SessionEvent::Exited { code: None }).unwrap();
        let value: serde_json::Value = serde_json::from_str(&json).unwrap();
        assert_eq!(value["meta"]["exited"], true);
        assert_eq!(value["meta"]["exitCode"], serde_json::Value::Null);
    }
}
