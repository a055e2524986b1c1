use std::collections::VecDeque;
use std::pin::Pin;
use std::task::{Context, Poll};

use bytes::Bytes;
use futures_util::stream::BoxStream;
use futures_util::{Stream, StreamExt};
use memchr::memchr;
use serde_json::Value;
use tracing::{error, warn};

use crate::models::chat_request::ChatCompletionRequest;
use crate::utils::construct_api_url;

use super::chat_completions::is_success;
use super::{ChatTransport, ProviderConfig, RelayError, UpstreamEventStream};

const DATA_PREFIX: &str = "data:";
const DONE_SENTINEL: &str = "[DONE]";

/// Open a streaming chat completion upstream and hand back the live byte
/// stream. Streaming is forced on regardless of the caller's flag.
///
/// A non-success status never opens a stream: the body is collected, parsed
/// as structured error data, and surfaced as an upstream-status error.
pub async fn open_event_stream<T: ChatTransport>(
    transport: &T,
    provider: &ProviderConfig,
    request: &ChatCompletionRequest,
) -> Result<UpstreamEventStream, RelayError> {
    let api_key = provider
        .api_key
        .as_deref()
        .ok_or(RelayError::MissingApiKey)?;

    let outbound = request.outbound(&provider.default_model, true);
    let body = serde_json::to_string(&outbound)?;
    let url = construct_api_url(&provider.base_url, "chat/completions");

    let mut response = transport.post_json_stream(&url, api_key, body).await?;
    if !is_success(response.status) {
        let status = response.status;
        let body = collect_body(&mut response.bytes).await?;
        error!("Gaia API returned error status {} for stream request", status);
        let details: Value = serde_json::from_slice(&body)?;
        return Err(RelayError::UpstreamStatus { status, details });
    }

    Ok(response)
}

/// Open the upstream event stream and decode it into discrete JSON events.
pub async fn create_streaming_chat_completion<T: ChatTransport>(
    transport: &T,
    provider: &ProviderConfig,
    request: &ChatCompletionRequest,
) -> Result<ChatCompletionStream, RelayError> {
    let upstream = open_event_stream(transport, provider, request).await?;
    Ok(ChatCompletionStream::new(upstream))
}

async fn collect_body(
    bytes: &mut BoxStream<'static, Result<Bytes, RelayError>>,
) -> Result<Vec<u8>, RelayError> {
    let mut buf = Vec::new();
    while let Some(chunk) = bytes.next().await {
        buf.extend_from_slice(&chunk?);
    }
    Ok(buf)
}

/// Incremental decoder for the upstream event stream.
///
/// The state is the pending partial line plus a done flag. Feeding a chunk
/// appends its bytes, splits off every complete line, and retains the
/// remainder for the next chunk, so an event split across chunk boundaries
/// reassembles correctly.
#[derive(Default)]
pub struct EventStreamDecoder {
    buffer: Vec<u8>,
    done: bool,
}

impl EventStreamDecoder {
    pub fn new() -> Self {
        EventStreamDecoder::default()
    }

    /// True once the done sentinel has been seen; later input is ignored.
    pub fn is_done(&self) -> bool {
        self.done
    }

    /// Feed one chunk of bytes, returning the events it completed.
    pub fn feed(&mut self, chunk: &[u8]) -> Vec<Value> {
        let mut events = Vec::new();
        if self.done {
            return events;
        }

        self.buffer.extend_from_slice(chunk);
        while let Some(newline_pos) = memchr(b'\n', &self.buffer) {
            let line = match std::str::from_utf8(&self.buffer[..newline_pos]) {
                Ok(s) => s.trim().to_string(),
                Err(e) => {
                    warn!("Invalid UTF-8 in stream: {}", e);
                    self.buffer.drain(..=newline_pos);
                    continue;
                }
            };
            self.buffer.drain(..=newline_pos);

            if line.is_empty() {
                continue;
            }
            let Some(payload) = line.strip_prefix(DATA_PREFIX) else {
                continue;
            };
            let payload = payload.trim_start();
            if payload == DONE_SENTINEL {
                self.done = true;
                break;
            }
            match serde_json::from_str(payload) {
                Ok(event) => events.push(event),
                Err(e) => {
                    // One malformed line must not terminate the stream.
                    warn!("Error parsing JSON from stream: {}", e);
                }
            }
        }
        events
    }
}

/// Lazy, finite sequence of decoded stream events.
///
/// Pull-based: each poll drives the upstream transport by at most one chunk.
/// Dropping the stream before the done sentinel simply stops pulling;
/// re-issuing the request starts an independent sequence.
pub struct ChatCompletionStream {
    upstream: BoxStream<'static, Result<Bytes, RelayError>>,
    decoder: EventStreamDecoder,
    pending: VecDeque<Value>,
    finished: bool,
}

impl ChatCompletionStream {
    pub fn new(upstream: UpstreamEventStream) -> Self {
        ChatCompletionStream {
            upstream: upstream.bytes,
            decoder: EventStreamDecoder::new(),
            pending: VecDeque::new(),
            finished: false,
        }
    }
}

impl Stream for ChatCompletionStream {
    type Item = Result<Value, RelayError>;

    fn poll_next(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        let this = self.get_mut();
        loop {
            if let Some(event) = this.pending.pop_front() {
                return Poll::Ready(Some(Ok(event)));
            }
            if this.finished || this.decoder.is_done() {
                return Poll::Ready(None);
            }
            match this.upstream.as_mut().poll_next(cx) {
                Poll::Ready(Some(Ok(chunk))) => {
                    let events = this.decoder.feed(&chunk);
                    this.pending.extend(events);
                }
                Poll::Ready(Some(Err(e))) => {
                    this.finished = true;
                    return Poll::Ready(Some(Err(e)));
                }
                Poll::Ready(None) => this.finished = true,
                Poll::Pending => return Poll::Pending,
            }
        }
    }
}
