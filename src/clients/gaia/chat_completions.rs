use serde_json::{json, Value};
use tracing::{debug, error};

use crate::models::chat_request::ChatCompletionRequest;
use crate::utils::construct_api_url;

use super::{ChatTransport, ProviderConfig, RelayError, TransportResponse};

/// Send one chat completion request upstream and return the parsed reply.
///
/// The credential check happens before anything touches the network; a
/// missing key is a configuration error, not an upstream one. Non-success
/// statuses are normalized into [`RelayError::UpstreamStatus`] with the
/// parsed (or raw-wrapped) body attached. No retries.
pub async fn create_chat_completion<T: ChatTransport>(
    transport: &T,
    provider: &ProviderConfig,
    request: &ChatCompletionRequest,
) -> Result<Value, RelayError> {
    let api_key = provider
        .api_key
        .as_deref()
        .ok_or(RelayError::MissingApiKey)?;

    let outbound = request.outbound(&provider.default_model, false);
    let body = serde_json::to_string(&outbound)?;
    let url = construct_api_url(&provider.base_url, "chat/completions");

    debug!(
        "Sending chat completion request to {} for model {}",
        url, outbound.model
    );

    let response = transport.post_json(&url, api_key, body).await?;
    if !is_success(response.status) {
        return Err(upstream_error(response));
    }

    let value = serde_json::from_slice(&response.body)?;
    Ok(value)
}

/// Relay the provider's node-info endpoint. Same error normalization as the
/// completion call.
pub async fn get_node_info<T: ChatTransport>(
    transport: &T,
    provider: &ProviderConfig,
) -> Result<Value, RelayError> {
    let api_key = provider
        .api_key
        .as_deref()
        .ok_or(RelayError::MissingApiKey)?;

    let url = construct_api_url(&provider.base_url, "node/info");
    let response = transport.get_json(&url, api_key).await?;
    if !is_success(response.status) {
        return Err(upstream_error(response));
    }

    let value = serde_json::from_slice(&response.body)?;
    Ok(value)
}

pub(super) fn is_success(status: u16) -> bool {
    (200..300).contains(&status)
}

fn upstream_error(response: TransportResponse) -> RelayError {
    let status = response.status;
    let details = parse_error_details(&response.body);
    error!("Gaia API returned error status {}: {}", status, details);
    RelayError::UpstreamStatus { status, details }
}

/// A misbehaving upstream can answer with anything; keep whatever it said.
pub(super) fn parse_error_details(body: &[u8]) -> Value {
    match serde_json::from_slice(body) {
        Ok(value) => value,
        Err(_) => {
            let text = String::from_utf8_lossy(body).to_string();
            if text.is_empty() {
                json!({ "rawError": "No error details available" })
            } else {
                json!({ "rawError": text })
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clients::gaia::testing::StubTransport;
    use crate::models::Message;

    fn provider_with_key() -> ProviderConfig {
        ProviderConfig {
            base_url: "https://api.gaianet.ai/v1".to_string(),
            api_key: Some("test-key".to_string()),
            default_model: "gaia-default".to_string(),
        }
    }

    fn request() -> ChatCompletionRequest {
        ChatCompletionRequest::new(vec![Message {
            role: "user".to_string(),
            content: "hello".to_string(),
        }])
    }

    #[tokio::test]
    async fn missing_api_key_fails_before_any_transport_call() {
        let transport = StubTransport::replying(200, "{}");
        let provider = ProviderConfig {
            api_key: None,
            ..provider_with_key()
        };

        let result = create_chat_completion(&transport, &provider, &request()).await;

        assert!(matches!(result, Err(RelayError::MissingApiKey)));
        assert_eq!(transport.call_count(), 0);
    }

    #[tokio::test]
    async fn success_returns_parsed_upstream_body() {
        let transport = StubTransport::replying(200, r#"{"id":"cmpl-1","choices":[]}"#);

        let value = create_chat_completion(&transport, &provider_with_key(), &request())
            .await
            .unwrap();

        assert_eq!(value["id"], "cmpl-1");
        assert_eq!(transport.call_count(), 1);
    }

    #[tokio::test]
    async fn non_success_with_json_body_carries_parsed_details() {
        let transport = StubTransport::replying(429, r#"{"error":{"message":"rate limited"}}"#);

        let err = create_chat_completion(&transport, &provider_with_key(), &request())
            .await
            .unwrap_err();

        match err {
            RelayError::UpstreamStatus { status, details } => {
                assert_eq!(status, 429);
                assert_eq!(details["error"]["message"], "rate limited");
            }
            other => panic!("expected upstream status error, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn non_success_with_text_body_wraps_raw_error() {
        let transport = StubTransport::replying(502, "Bad Gateway");

        let err = create_chat_completion(&transport, &provider_with_key(), &request())
            .await
            .unwrap_err();

        match err {
            RelayError::UpstreamStatus { status, details } => {
                assert_eq!(status, 502);
                assert_eq!(details["rawError"], "Bad Gateway");
            }
            other => panic!("expected upstream status error, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn non_success_with_empty_body_reports_no_details() {
        let transport = StubTransport::replying(500, "");

        let err = create_chat_completion(&transport, &provider_with_key(), &request())
            .await
            .unwrap_err();

        match err {
            RelayError::UpstreamStatus { details, .. } => {
                assert_eq!(details["rawError"], "No error details available");
            }
            other => panic!("expected upstream status error, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn malformed_success_body_is_a_decode_error() {
        let transport = StubTransport::replying(200, "not json at all");

        let err = create_chat_completion(&transport, &provider_with_key(), &request())
            .await
            .unwrap_err();

        assert!(matches!(err, RelayError::Decode(_)));
    }

    #[tokio::test]
    async fn node_info_relays_parsed_body() {
        let transport = StubTransport::replying(200, r#"{"node":"0xabc","version":"0.4"}"#);

        let value = get_node_info(&transport, &provider_with_key()).await.unwrap();

        assert_eq!(value["node"], "0xabc");
        assert_eq!(transport.call_count(), 1);
    }
}
