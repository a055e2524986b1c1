use bytes::Bytes;
use futures_util::StreamExt;
use http::header::{self, HeaderValue};
use http_body_util::{BodyExt, StreamBody};
use hyper::body::Frame;
use hyper::Response;
use uuid::Uuid;

use crate::clients::gaia::stream::open_event_stream;
use crate::clients::gaia::{ChatTransport, RelayError};
use crate::models::chat_request::ChatCompletionRequest;
use crate::services::errors::{report, with_error_handling};

use super::completions::error_context;
use super::{error_response, AppContext, BoxError, RelayBody};

/// Relay one streaming chat completion. On success the upstream event stream
/// is copied to the caller byte for byte, unbuffered; the response is marked
/// as a live event stream. On failure the caller gets the usual JSON error
/// envelope and no stream is opened.
pub async fn handle_stream<T: ChatTransport>(
    context: &AppContext<T>,
    whole_body: Bytes,
) -> Response<RelayBody> {
    let trace_id = Uuid::new_v4().to_string();

    let request = match ChatCompletionRequest::from_json(&String::from_utf8_lossy(&whole_body)) {
        Ok(request) => request,
        Err(e) => {
            let error = RelayError::Decode(e);
            report(
                &context.errors,
                &error,
                Some(error_context("chat_completions_stream", &trace_id)),
            );
            return error_response(&error);
        }
    };

    let result = with_error_handling(
        &context.errors,
        error_context("chat_completions_stream", &trace_id),
        || open_event_stream(&context.transport, &context.provider, &request),
    )
    .await;

    let upstream = match result {
        Ok(upstream) => upstream,
        Err(e) => return error_response(&e),
    };

    let frames = upstream
        .bytes
        .map(|chunk| chunk.map(Frame::data).map_err(|e| Box::new(e) as BoxError));

    let mut response = Response::new(StreamBody::new(frames).boxed_unsync());
    response.headers_mut().insert(
        header::CONTENT_TYPE,
        HeaderValue::from_static("text/event-stream"),
    );
    response.headers_mut().insert(
        header::CACHE_CONTROL,
        HeaderValue::from_static("no-cache"),
    );
    response.headers_mut().insert(
        header::CONNECTION,
        HeaderValue::from_static("keep-alive"),
    );
    response
}
