//! OpenAI chat-completions adapter for the reasoning model.

use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::debug;

use crate::config::TriageConfig;
use crate::errors::{TriageError, TriageResult};

use super::{parse_oracle_reply, OracleResponse, ReasoningOracle};

/// Instructions sent ahead of the session context on every turn.
const SYSTEM_PROMPT: &str = r#"You are a Kubernetes debugging assistant in an interactive CLI.
You can:
- Answer user questions conversationally
- Request more information by returning an action request
- Or conclude with a final analysis

Action request shape:
{"type": "DESCRIBE_POD" | "LOGS" | "DESCRIBE_DEPLOYMENT" | "GET_CONFIGMAP" | "GET_EVENTS" | "STOP", "namespace": string | null, "name": string | null}
GET_EVENTS needs "namespace". GET_CONFIGMAP, DESCRIBE_POD and DESCRIBE_DEPLOYMENT need "namespace" and "name".
LOGS defaults to the pod under investigation when they are omitted.

Final analysis shape:
{"root_cause": string, "remediation": string}

Always return JSON that matches one of these shapes."#;

/// Chat message
#[derive(Debug, Serialize)]
struct ChatMessage {
    role: &'static str,
    content: String,
}

/// Response format selector
#[derive(Debug, Serialize)]
struct ResponseFormat {
    #[serde(rename = "type")]
    format_type: &'static str,
}

/// Chat-completions request
#[derive(Debug, Serialize)]
struct ChatRequest {
    model: String,
    messages: Vec<ChatMessage>,
    #[serde(skip_serializing_if = "Option::is_none")]
    temperature: Option<f32>,
    response_format: ResponseFormat,
}

#[derive(Debug, Deserialize)]
struct ChoiceMessage {
    content: Option<String>,
}

#[derive(Debug, Deserialize)]
struct Choice {
    message: ChoiceMessage,
}

#[derive(Debug, Deserialize)]
struct ChatResponse {
    choices: Vec<Choice>,
}

#[derive(Debug, Deserialize)]
struct ApiError {
    message: String,
}

#[derive(Debug, Deserialize)]
struct ApiErrorResponse {
    error: ApiError,
}

/// Reasoning model backed by an OpenAI-compatible chat-completions endpoint.
pub struct OpenAiOracle {
    client: Client,
    api_key: String,
    base_url: String,
    model: String,
    temperature: Option<f32>,
}

impl OpenAiOracle {
    /// Build from configuration; fails when the API key is not set.
    pub fn from_config(config: &TriageConfig) -> TriageResult<Self> {
        let api_key = config.api_key()?;
        let client = Client::builder()
            .timeout(Duration::from_secs(config.request_timeout_secs))
            .build()?;
        Ok(Self {
            client,
            api_key,
            base_url: config.api_base_url.clone(),
            model: config.model.clone(),
            temperature: config.temperature,
        })
    }

    fn build_request(&self, context: &str) -> ChatRequest {
        ChatRequest {
            model: self.model.clone(),
            messages: vec![
                ChatMessage {
                    role: "system",
                    content: SYSTEM_PROMPT.to_string(),
                },
                ChatMessage {
                    role: "user",
                    content: context.to_string(),
                },
            ],
            temperature: self.temperature,
            response_format: ResponseFormat {
                format_type: "json_object",
            },
        }
    }
}

#[async_trait]
impl ReasoningOracle for OpenAiOracle {
    async fn run(&self, context: &str) -> TriageResult<OracleResponse> {
        let request = self.build_request(context);
        debug!(model = %self.model, context_len = context.len(), "Calling reasoning model");

        let response = self
            .client
            .post(&self.base_url)
            .bearer_auth(&self.api_key)
            .json(&request)
            .send()
            .await?;

        let status = response.status();
        let body = response.text().await?;

        if !status.is_success() {
            if let Ok(error_response) = serde_json::from_str::<ApiErrorResponse>(&body) {
                return Err(TriageError::Oracle(format!(
                    "API error ({status}): {}",
                    error_response.error.message
                )));
            }
            return Err(TriageError::Oracle(format!("API error ({status}): {body}")));
        }

        let chat: ChatResponse =
            serde_json::from_str(&body).map_err(|e| TriageError::OracleReply {
                reason: format!("failed to decode completion: {e}"),
            })?;
        let content = chat
            .choices
            .into_iter()
            .next()
            .and_then(|choice| choice.message.content)
            .ok_or_else(|| TriageError::OracleReply {
                reason: "completion contained no message content".to_string(),
            })?;

        Ok(parse_oracle_reply(&content))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::oracle::{ActionRequest, ActionType};
    use serde_json::json;
    use wiremock::matchers::{header, method};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn oracle(base_url: String) -> OpenAiOracle {
        OpenAiOracle {
            client: Client::new(),
            api_key: "test-key".to_string(),
            base_url,
            model: "gpt-4o".to_string(),
            temperature: None,
        }
    }

    #[test]
    fn test_request_carries_full_context() {
        let request = oracle("http://unused".to_string()).build_request("Pod a is failing\nUser: why");
        let value = serde_json::to_value(&request).unwrap();
        assert_eq!(value["messages"][0]["role"], "system");
        assert_eq!(value["messages"][1]["content"], "Pod a is failing\nUser: why");
        assert_eq!(value["response_format"]["type"], "json_object");
        assert!(value.get("temperature").is_none());
    }

    #[tokio::test]
    async fn test_run_parses_action() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(header("authorization", "Bearer test-key"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "choices": [{"message": {"content": "{\"type\": \"LOGS\"}"}}]
            })))
            .mount(&server)
            .await;

        let response = oracle(server.uri()).run("context").await.unwrap();
        assert_eq!(
            response,
            OracleResponse::Action(ActionRequest::new(ActionType::Logs))
        );
    }

    #[tokio::test]
    async fn test_run_surfaces_api_error() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(429).set_body_json(json!({
                "error": {"message": "Rate limit reached"}
            })))
            .mount(&server)
            .await;

        let err = oracle(server.uri()).run("context").await.unwrap_err();
        assert!(matches!(err, TriageError::Oracle(ref msg) if msg.contains("Rate limit reached")));
    }

    #[tokio::test]
    async fn test_run_without_content_is_reply_error() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "choices": [{"message": {"content": null}}]
            })))
            .mount(&server)
            .await;

        assert!(matches!(
            oracle(server.uri()).run("context").await,
            Err(TriageError::OracleReply { .. })
        ));
    }
}
