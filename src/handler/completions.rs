use std::collections::HashMap;

use bytes::Bytes;
use hyper::{Response, StatusCode};
use uuid::Uuid;

use crate::clients::gaia::chat_completions::create_chat_completion;
use crate::clients::gaia::{ChatTransport, RelayError};
use crate::models::chat_request::ChatCompletionRequest;
use crate::services::errors::{report, with_error_handling};

use super::{error_response, json_response, AppContext, RelayBody};

/// Relay one non-streaming chat completion. Success forwards the upstream
/// body as-is; every failure is classified into the error history before it
/// is mapped onto the response.
pub async fn handle_completion<T: ChatTransport>(
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
                Some(error_context("chat_completions", &trace_id)),
            );
            return error_response(&error);
        }
    };

    let result = with_error_handling(
        &context.errors,
        error_context("chat_completions", &trace_id),
        || create_chat_completion(&context.transport, &context.provider, &request),
    )
    .await;

    match result {
        Ok(value) => json_response(StatusCode::OK, &value),
        Err(e) => error_response(&e),
    }
}

pub(super) fn error_context(endpoint: &str, trace_id: &str) -> HashMap<String, String> {
    HashMap::from([
        ("endpoint".to_string(), endpoint.to_string()),
        ("trace_id".to_string(), trace_id.to_string()),
    ])
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clients::gaia::testing::StubTransport;
    use crate::clients::gaia::ProviderConfig;
    use crate::services::errors::{ErrorCategory, ErrorStore};
    use http_body_util::BodyExt;
    use serde_json::Value;

    fn test_context(transport: StubTransport) -> AppContext<StubTransport> {
        AppContext {
            transport,
            provider: ProviderConfig {
                base_url: "https://api.gaianet.ai/v1".to_string(),
                api_key: Some("test-key".to_string()),
                default_model: "gaia-default".to_string(),
            },
            errors: ErrorStore::new(),
        }
    }

    fn chat_body() -> Bytes {
        Bytes::from(r#"{"messages":[{"role":"user","content":"hi"}]}"#)
    }

    async fn body_json(response: Response<RelayBody>) -> Value {
        let bytes = response.into_body().collect().await.unwrap().to_bytes();
        serde_json::from_slice(&bytes).unwrap()
    }

    #[tokio::test]
    async fn success_forwards_the_upstream_body() {
        let context = test_context(StubTransport::replying(
            200,
            r#"{"id":"cmpl-9","choices":[]}"#,
        ));

        let response = handle_completion(&context, chat_body()).await;

        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(
            response.headers()[http::header::CONTENT_TYPE],
            "application/json"
        );
        let body = body_json(response).await;
        assert_eq!(body["id"], "cmpl-9");
    }

    #[tokio::test]
    async fn missing_key_maps_to_configuration_error() {
        let mut context = test_context(StubTransport::replying(200, "{}"));
        context.provider.api_key = None;

        let response = handle_completion(&context, chat_body()).await;

        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
        let body = body_json(response).await;
        assert_eq!(body["error"], "Gaia API key is not configured");
        assert_eq!(context.transport.call_count(), 0);
    }

    #[tokio::test]
    async fn upstream_failure_keeps_its_status_and_details() {
        let context = test_context(StubTransport::replying(
            429,
            r#"{"error":{"message":"slow down"}}"#,
        ));

        let response = handle_completion(&context, chat_body()).await;

        assert_eq!(response.status(), StatusCode::TOO_MANY_REQUESTS);
        let body = body_json(response).await;
        assert_eq!(body["error"], "Gaia API Error: 429");
        assert_eq!(body["details"]["error"]["message"], "slow down");
    }

    #[tokio::test]
    async fn failures_land_in_the_error_history() {
        let context = test_context(StubTransport::replying(401, r#"{"error":"denied"}"#));

        handle_completion(&context, chat_body()).await;

        let recent = context.errors.recent(10);
        assert_eq!(recent.len(), 1);
        assert_eq!(recent[0].category, ErrorCategory::Authentication);
        assert_eq!(
            recent[0].context.as_ref().unwrap().get("endpoint"),
            Some(&"chat_completions".to_string())
        );
    }

    #[tokio::test]
    async fn unparseable_request_body_is_an_internal_error() {
        let context = test_context(StubTransport::replying(200, "{}"));

        let response = handle_completion(&context, Bytes::from("not json")).await;

        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
        let body = body_json(response).await;
        assert_eq!(body["error"], "Internal Server Error");
        assert_eq!(context.transport.call_count(), 0);
        assert_eq!(context.errors.recent(10).len(), 1);
    }
}
