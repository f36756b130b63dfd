//! Incremental decoder for the backend's streamed event framing.
//!
//! The response body is UTF-8 text split into records by a blank line. Each
//! record carries a `data: ` prefix followed by a JSON payload with optional
//! `content` and `sources` fields. Records arrive fragmented across arbitrary
//! chunk boundaries, so the decoder buffers the residual tail between pushes.

use memchr::memmem;
use tracing::debug;

use crate::api::StreamEventPayload;

/// Prefix every recognized record must carry.
const EVENT_PREFIX: &str = "data: ";

/// Blank-line separator between records.
const RECORD_SEPARATOR: &[u8] = b"\n\n";

/// One decoded protocol unit.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StreamEvent {
    /// Full replacement list of citation strings.
    Sources(Vec<String>),
    /// Text fragment to append to the growing response.
    Content(String),
}

#[derive(Debug, Default)]
pub struct SseDecoder {
    buffer: Vec<u8>,
}

impl SseDecoder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Feed one raw chunk and drain every record completed by it.
    ///
    /// Unrecognized or malformed records are dropped without interrupting the
    /// stream; a record carrying both fields yields its sources before its
    /// content delta.
    pub fn push(&mut self, chunk: &[u8]) -> Vec<StreamEvent> {
        self.buffer.extend_from_slice(chunk);

        let mut events = Vec::new();
        while let Some(separator) = memmem::find(&self.buffer, RECORD_SEPARATOR) {
            match std::str::from_utf8(&self.buffer[..separator]) {
                Ok(record) => decode_record(record, &mut events),
                Err(err) => debug!("dropping record with invalid UTF-8: {err}"),
            }
            self.buffer.drain(..separator + RECORD_SEPARATOR.len());
        }
        events
    }

    /// Signal end of stream. A trailing fragment that never saw its separator
    /// is discarded rather than flushed as a record.
    pub fn finish(self) {
        if !self.buffer.is_empty() {
            debug!(
                "discarding {} bytes of incomplete trailing record",
                self.buffer.len()
            );
        }
    }
}

fn decode_record(record: &str, events: &mut Vec<StreamEvent>) {
    let record = record.trim();
    if record.is_empty() {
        return;
    }
    let Some(payload) = record.strip_prefix(EVENT_PREFIX) else {
        debug!("skipping unrecognized frame ({} bytes)", record.len());
        return;
    };
    match serde_json::from_str::<StreamEventPayload>(payload) {
        Ok(payload) => {
            if let Some(sources) = payload.sources {
                events.push(StreamEvent::Sources(sources));
            }
            if let Some(content) = payload.content {
                events.push(StreamEvent::Content(content));
            }
        }
        Err(err) => debug!("dropping malformed record: {err}"),
    }
}
