use std::collections::HashMap;
use std::convert::Infallible;
use std::sync::Arc;

use bytes::Bytes;
use http::header::{self, HeaderValue};
use http_body_util::combinators::UnsyncBoxBody;
use http_body_util::{BodyExt, Full};
use hyper::body::Incoming;
use hyper::{Method, Request, Response, StatusCode};
use serde::Serialize;
use tracing::{error, info};

use crate::clients::gaia::chat_completions::get_node_info;
use crate::clients::gaia::{ChatTransport, HttpTransport, ProviderConfig, RelayError};
use crate::models::ErrorResponse;
use crate::services::errors::{with_error_handling, ErrorStore};

pub mod completions;
pub mod stream;

const DEFAULT_RECENT_ERRORS: usize = 10;

pub type BoxError = Box<dyn std::error::Error + Send + Sync>;
pub type RelayBody = UnsyncBoxBody<Bytes, BoxError>;

/// Everything a request handler needs, shared across connections. The error
/// store lives here so concurrent requests feed one process-wide history.
pub struct AppContext<T: ChatTransport> {
    pub transport: T,
    pub provider: ProviderConfig,
    pub errors: ErrorStore,
}

impl AppContext<HttpTransport> {
    pub fn new() -> Self {
        AppContext {
            transport: HttpTransport::new(),
            provider: ProviderConfig::from_settings(),
            errors: ErrorStore::new(),
        }
    }
}

pub async fn handle<T: ChatTransport>(
    req: Request<Incoming>,
    context: Arc<AppContext<T>>,
) -> Result<Response<RelayBody>, Infallible> {
    info!("Received request: {} {}", req.method(), req.uri().path());

    let method = req.method().clone();
    let path = req.uri().path().to_string();
    let query = req.uri().query().map(str::to_string);

    match (&method, path.as_str()) {
        (&Method::POST, "/v1/chat/completions") => {
            let whole_body = match collect_body(req).await {
                Ok(bytes) => bytes,
                Err(response) => return Ok(response),
            };
            Ok(completions::handle_completion(&context, whole_body).await)
        }

        (&Method::POST, "/v1/chat/completions/stream") => {
            let whole_body = match collect_body(req).await {
                Ok(bytes) => bytes,
                Err(response) => return Ok(response),
            };
            Ok(stream::handle_stream(&context, whole_body).await)
        }

        (&Method::GET, "/v1/node/info") => Ok(handle_node_info(&context).await),

        (&Method::GET, "/v1/errors/recent") => {
            Ok(handle_recent_errors(&context, query.as_deref()))
        }

        (&Method::GET, "/health") => {
            Ok(Response::new(full_body(Bytes::from_static(b"OK"))))
        }

        _ => {
            let mut not_found = Response::new(full_body(Bytes::from_static(b"Not Found")));
            *not_found.status_mut() = StatusCode::NOT_FOUND;
            Ok(not_found)
        }
    }
}

async fn handle_node_info<T: ChatTransport>(context: &AppContext<T>) -> Response<RelayBody> {
    let error_context = HashMap::from([("endpoint".to_string(), "node_info".to_string())]);
    let result = with_error_handling(&context.errors, error_context, || {
        get_node_info(&context.transport, &context.provider)
    })
    .await;

    match result {
        Ok(value) => json_response(StatusCode::OK, &value),
        Err(e) => error_response(&e),
    }
}

fn handle_recent_errors<T: ChatTransport>(
    context: &AppContext<T>,
    query: Option<&str>,
) -> Response<RelayBody> {
    let limit = query
        .and_then(|q| {
            url::form_urlencoded::parse(q.as_bytes())
                .find(|(key, _)| key == "limit")
                .and_then(|(_, value)| value.parse().ok())
        })
        .unwrap_or(DEFAULT_RECENT_ERRORS);
    json_response(StatusCode::OK, &context.errors.recent(limit))
}

async fn collect_body(req: Request<Incoming>) -> Result<Bytes, Response<RelayBody>> {
    match req.into_body().collect().await {
        Ok(collected) => Ok(collected.to_bytes()),
        Err(e) => {
            error!("Error reading request body: {}", e);
            Err(json_response(
                StatusCode::INTERNAL_SERVER_ERROR,
                &ErrorResponse::internal(e.to_string()),
            ))
        }
    }
}

pub fn full_body(bytes: Bytes) -> RelayBody {
    Full::new(bytes).map_err(|never| match never {}).boxed_unsync()
}

pub fn json_response<B: Serialize>(status: StatusCode, body: &B) -> Response<RelayBody> {
    let bytes = serde_json::to_vec(body).unwrap_or_default();
    let mut response = Response::new(full_body(Bytes::from(bytes)));
    *response.status_mut() = status;
    response.headers_mut().insert(
        header::CONTENT_TYPE,
        HeaderValue::from_static("application/json"),
    );
    response
}

/// Map a relay failure to the caller-facing error envelope: the upstream
/// status when there is one, 500 otherwise.
pub fn error_response(error: &RelayError) -> Response<RelayBody> {
    match error {
        RelayError::MissingApiKey => json_response(
            StatusCode::INTERNAL_SERVER_ERROR,
            &ErrorResponse::configuration(),
        ),
        RelayError::UpstreamStatus { status, details } => {
            let code = StatusCode::from_u16(*status)
                .unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
            json_response(code, &ErrorResponse::upstream(*status, details.clone()))
        }
        other => json_response(
            StatusCode::INTERNAL_SERVER_ERROR,
            &ErrorResponse::internal(other.to_string()),
        ),
    }
}
