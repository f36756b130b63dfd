//! Streaming chat consumer.
//!
//! One call to [`stream_chat`] performs exactly one network operation: it
//! posts the request body, consumes the chunked response, folds decoded
//! events into a [`StreamState`], and hands the consumer an updated snapshot
//! after every event. Retry policy, if any, belongs to the caller.

use std::time::Duration;

use bytes::Bytes;
use futures_util::{Stream, StreamExt};
use tokio_util::sync::CancellationToken;

use crate::api::ChatStreamRequest;
use crate::core::errors::StreamError;
use crate::core::sse::{SseDecoder, StreamEvent};
use crate::utils::url::endpoint_url;

/// Endpoint path of the streaming chat completion.
pub const CHAT_STREAM_ENDPOINT: &str = "chatting_v2";

pub struct StreamParams {
    pub client: reqwest::Client,
    pub base_url: String,
    pub request: ChatStreamRequest,
    /// Bound on the wait for the response head and the first body chunk.
    /// Later chunks are not subject to a timeout.
    pub first_byte_timeout: Duration,
    pub cancel_token: CancellationToken,
}

/// Accumulated result of one stream.
///
/// `full_text` only ever grows by appending; `sources` is replaced wholesale
/// whenever a source list arrives. After [`stream_chat`] returns, the state
/// holds whatever had accumulated, whether the stream completed, failed, or
/// was cancelled.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct StreamState {
    pub full_text: String,
    pub sources: Vec<String>,
    pub is_active: bool,
}

impl StreamState {
    /// Fresh state for a new request.
    pub fn begin() -> Self {
        Self {
            full_text: String::new(),
            sources: Vec::new(),
            is_active: true,
        }
    }

    pub fn snapshot(&self) -> StreamSnapshot<'_> {
        StreamSnapshot {
            full_text: &self.full_text,
            sources: &self.sources,
        }
    }

    fn apply(&mut self, event: StreamEvent) {
        match event {
            StreamEvent::Sources(sources) => self.sources = sources,
            StreamEvent::Content(delta) => self.full_text.push_str(&delta),
        }
    }
}

/// Immutable view of the state handed to the consumer on each update.
#[derive(Debug, Clone, Copy)]
pub struct StreamSnapshot<'a> {
    pub full_text: &'a str,
    pub sources: &'a [String],
}

/// Issues per-conversation streams, enforcing single flight: beginning a new
/// stream cancels the previous one and hands out a fresh token together with
/// a monotonically increasing stream id. Stale callbacks can be filtered by
/// comparing ids with [`StreamController::is_current`].
#[derive(Debug, Default)]
pub struct StreamController {
    cancel_token: Option<CancellationToken>,
    current_stream_id: u64,
}

impl StreamController {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn begin(&mut self) -> (CancellationToken, u64) {
        self.cancel();
        self.current_stream_id += 1;
        let token = CancellationToken::new();
        self.cancel_token = Some(token.clone());
        (token, self.current_stream_id)
    }

    /// Abort the active stream, if any. Safe to call repeatedly.
    pub fn cancel(&mut self) {
        if let Some(token) = &self.cancel_token {
            token.cancel();
        }
        self.cancel_token = None;
    }

    pub fn is_current(&self, stream_id: u64) -> bool {
        self.current_stream_id == stream_id
    }

    pub fn is_streaming(&self) -> bool {
        self.cancel_token.is_some()
    }
}

/// Run one streaming chat operation to completion.
///
/// `state` is reset at entry and mutated in place so the caller keeps the
/// partial accumulation when the operation fails or is cancelled. `on_update`
/// fires after every decoded event, including source-only updates, so a UI
/// can stay responsive even while no new text arrives.
pub async fn stream_chat<F>(
    params: StreamParams,
    state: &mut StreamState,
    mut on_update: F,
) -> Result<(), StreamError>
where
    F: FnMut(StreamSnapshot<'_>),
{
    *state = StreamState::begin();

    let response = match open_transport(&params).await {
        Ok(response) => response,
        Err(err) => {
            state.is_active = false;
            return Err(err);
        }
    };

    let byte_stream = response
        .bytes_stream()
        .map(|chunk| chunk.map_err(StreamError::from));
    consume_byte_stream(
        byte_stream,
        params.first_byte_timeout,
        &params.cancel_token,
        state,
        &mut on_update,
    )
    .await
}

/// Open the connection and validate the response head. The timeout covers the
/// wait for the head; the wait for the first body chunk is bounded separately
/// in [`consume_byte_stream`].
async fn open_transport(params: &StreamParams) -> Result<reqwest::Response, StreamError> {
    if params.request.query.trim().is_empty() {
        return Err(StreamError::EmptyQuery);
    }

    let url = endpoint_url(&params.base_url, CHAT_STREAM_ENDPOINT);
    let send = params
        .client
        .post(url)
        .header("Content-Type", "application/json")
        .json(&params.request)
        .send();

    let response = tokio::select! {
        biased;
        _ = params.cancel_token.cancelled() => return Err(StreamError::Cancelled),
        sent = tokio::time::timeout(params.first_byte_timeout, send) => match sent {
            Err(_) => return Err(StreamError::Timeout(params.first_byte_timeout)),
            Ok(Err(err)) => return Err(StreamError::Http(err)),
            Ok(Ok(response)) => response,
        },
    };

    if !response.status().is_success() {
        let status = response.status();
        let body = response
            .text()
            .await
            .unwrap_or_else(|_| "<no body>".to_string());
        return Err(StreamError::Transport { status, body });
    }
    Ok(response)
}

/// Fold the byte stream into `state`, marking it inactive on every exit path.
async fn consume_byte_stream<S, F>(
    mut byte_stream: S,
    first_byte_timeout: Duration,
    cancel_token: &CancellationToken,
    state: &mut StreamState,
    on_update: &mut F,
) -> Result<(), StreamError>
where
    S: Stream<Item = Result<Bytes, StreamError>> + Unpin,
    F: FnMut(StreamSnapshot<'_>),
{
    let outcome = pump_events(
        &mut byte_stream,
        first_byte_timeout,
        cancel_token,
        state,
        on_update,
    )
    .await;
    state.is_active = false;
    outcome
}

async fn pump_events<S, F>(
    byte_stream: &mut S,
    first_byte_timeout: Duration,
    cancel_token: &CancellationToken,
    state: &mut StreamState,
    on_update: &mut F,
) -> Result<(), StreamError>
where
    S: Stream<Item = Result<Bytes, StreamError>> + Unpin,
    F: FnMut(StreamSnapshot<'_>),
{
    let mut decoder = SseDecoder::new();
    let mut awaiting_first = true;

    loop {
        let next = byte_stream.next();
        let chunk = if awaiting_first {
            tokio::select! {
                biased;
                _ = cancel_token.cancelled() => return Err(StreamError::Cancelled),
                next = tokio::time::timeout(first_byte_timeout, next) => match next {
                    Err(_) => return Err(StreamError::Timeout(first_byte_timeout)),
                    Ok(chunk) => chunk,
                },
            }
        } else {
            tokio::select! {
                biased;
                _ = cancel_token.cancelled() => return Err(StreamError::Cancelled),
                chunk = next => chunk,
            }
        };

        let Some(chunk) = chunk else { break };
        let chunk = chunk?;
        awaiting_first = false;

        for event in decoder.push(&chunk) {
            state.apply(event);
            on_update(state.snapshot());
        }
    }

    decoder.finish();
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use futures_util::stream;

    fn ok_chunk(text: &str) -> Result<Bytes, StreamError> {
        Ok(Bytes::copy_from_slice(text.as_bytes()))
    }

    async fn consume(
        chunks: Vec<Result<Bytes, StreamError>>,
        cancel_token: &CancellationToken,
        state: &mut StreamState,
        on_update: &mut impl FnMut(StreamSnapshot<'_>),
    ) -> Result<(), StreamError> {
        consume_byte_stream(
            stream::iter(chunks),
            Duration::from_secs(5),
            cancel_token,
            state,
            on_update,
        )
        .await
    }

    #[test]
    fn content_deltas_concatenate_in_arrival_order() {
        let mut state = StreamState::begin();
        for delta in ["He", "ll", "o"] {
            state.apply(StreamEvent::Content(delta.to_string()));
        }
        assert_eq!(state.full_text, "Hello");
    }

    #[test]
    fn source_list_replaces_rather_than_merges() {
        let mut state = StreamState::begin();
        state.apply(StreamEvent::Sources(vec!["A".into(), "B".into()]));
        state.apply(StreamEvent::Sources(vec!["C".into()]));
        assert_eq!(state.sources, vec!["C".to_string()]);
    }

    #[tokio::test]
    async fn sources_then_content_yields_final_state() {
        let token = CancellationToken::new();
        let mut state = StreamState::begin();
        let mut updates = 0usize;
        let result = consume(
            vec![ok_chunk(
                "data: {\"sources\":[\"A\",\"B\"]}\n\ndata: {\"content\":\"Hi\"}\n\n",
            )],
            &token,
            &mut state,
            &mut |_| updates += 1,
        )
        .await;

        assert!(result.is_ok());
        assert_eq!(state.full_text, "Hi");
        assert_eq!(state.sources, vec!["A".to_string(), "B".to_string()]);
        assert!(!state.is_active);
        assert_eq!(updates, 2);
    }

    #[tokio::test]
    async fn record_split_across_chunks_appends_once() {
        let token = CancellationToken::new();
        let mut state = StreamState::begin();
        let result = consume(
            vec![ok_chunk("data: {\"content\":\"Hel"), ok_chunk("lo\"}\n\n")],
            &token,
            &mut state,
            &mut |_| {},
        )
        .await;

        assert!(result.is_ok());
        assert_eq!(state.full_text, "Hello");
    }

    #[tokio::test]
    async fn malformed_record_does_not_interrupt_accumulation() {
        let token = CancellationToken::new();
        let mut state = StreamState::begin();
        let result = consume(
            vec![
                ok_chunk("data: {\"content\":\"one\"}\n\n"),
                ok_chunk("data: {broken\n\n"),
                ok_chunk("data: {\"content\":\"two\"}\n\n"),
            ],
            &token,
            &mut state,
            &mut |_| {},
        )
        .await;

        assert!(result.is_ok());
        assert_eq!(state.full_text, "onetwo");
    }

    #[tokio::test]
    async fn no_first_byte_within_timeout_fails_with_timeout() {
        let token = CancellationToken::new();
        let mut state = StreamState::begin();
        let mut updates = 0usize;
        let result = consume_byte_stream(
            stream::pending::<Result<Bytes, StreamError>>(),
            Duration::from_millis(20),
            &token,
            &mut state,
            &mut |_| updates += 1,
        )
        .await;

        assert!(matches!(result, Err(StreamError::Timeout(_))));
        assert!(!state.is_active);
        assert!(state.full_text.is_empty());
        assert_eq!(updates, 0);
    }

    #[tokio::test]
    async fn later_chunks_are_not_subject_to_the_timeout() {
        let token = CancellationToken::new();
        let mut state = StreamState::begin();
        let first = stream::iter(vec![ok_chunk("data: {\"content\":\"a\"}\n\n")]);
        let slow = Box::pin(async {
            tokio::time::sleep(Duration::from_millis(60)).await;
            ok_chunk("data: {\"content\":\"b\"}\n\n")
        });
        let chunks = first.chain(stream::once(slow));
        let result = consume_byte_stream(
            Box::pin(chunks),
            Duration::from_millis(30),
            &token,
            &mut state,
            &mut |_| {},
        )
        .await;

        assert!(result.is_ok());
        assert_eq!(state.full_text, "ab");
    }

    #[tokio::test]
    async fn cancellation_stops_callbacks_and_preserves_state() {
        let token = CancellationToken::new();
        let mut state = StreamState::begin();
        let cancel_on_first = token.clone();
        let mut seen = Vec::new();
        let result = consume(
            vec![
                ok_chunk("data: {\"content\":\"kept\"}\n\n"),
                ok_chunk("data: {\"content\":\" dropped\"}\n\n"),
            ],
            &token,
            &mut state,
            &mut |snapshot| {
                seen.push(snapshot.full_text.to_string());
                cancel_on_first.cancel();
            },
        )
        .await;

        assert!(matches!(result, Err(StreamError::Cancelled)));
        assert_eq!(seen, vec!["kept".to_string()]);
        assert_eq!(state.full_text, "kept");
        assert!(!state.is_active);
    }

    #[tokio::test]
    async fn cancelling_twice_has_no_additional_effect() {
        let token = CancellationToken::new();
        token.cancel();
        token.cancel();

        let mut state = StreamState::begin();
        let result = consume(
            vec![ok_chunk("data: {\"content\":\"x\"}\n\n")],
            &token,
            &mut state,
            &mut |_| {},
        )
        .await;

        assert!(matches!(result, Err(StreamError::Cancelled)));
        assert!(state.full_text.is_empty());
    }

    #[tokio::test]
    async fn empty_query_fails_before_any_network_activity() {
        let mut state = StreamState::begin();
        let params = StreamParams {
            client: reqwest::Client::new(),
            base_url: "http://localhost:8040".to_string(),
            request: ChatStreamRequest::new("   "),
            first_byte_timeout: Duration::from_secs(1),
            cancel_token: CancellationToken::new(),
        };
        let result = stream_chat(params, &mut state, |_| {}).await;

        assert!(matches!(result, Err(StreamError::EmptyQuery)));
        assert!(!state.is_active);
    }

    #[tokio::test]
    async fn chunk_error_surfaces_and_keeps_partial_text() {
        let token = CancellationToken::new();
        let mut state = StreamState::begin();
        let result = consume(
            vec![
                ok_chunk("data: {\"content\":\"partial\"}\n\n"),
                Err(StreamError::Decode("torn frame".to_string())),
            ],
            &token,
            &mut state,
            &mut |_| {},
        )
        .await;

        assert!(matches!(result, Err(StreamError::Decode(_))));
        assert_eq!(state.full_text, "partial");
        assert!(!state.is_active);
    }

    #[test]
    fn controller_enforces_single_flight() {
        let mut controller = StreamController::new();
        let (first_token, first_id) = controller.begin();
        let (second_token, second_id) = controller.begin();

        assert!(first_token.is_cancelled());
        assert!(!second_token.is_cancelled());
        assert!(second_id > first_id);
        assert!(controller.is_current(second_id));
        assert!(!controller.is_current(first_id));
    }

    #[test]
    fn controller_cancel_is_idempotent() {
        let mut controller = StreamController::new();
        let (token, _) = controller.begin();
        assert!(controller.is_streaming());
        controller.cancel();
        controller.cancel();
        assert!(token.is_cancelled());
        assert!(!controller.is_streaming());
    }
}
