//! OpenAI-compatible chat completions client.

use async_trait::async_trait;
use reqwest::StatusCode;
use serde::{Deserialize, Serialize};

use crate::sources::{CompletionModel, SourceError};
use crate::utils::HttpClient;

/// Text generation over any `/chat/completions` endpoint
#[derive(Debug, Clone)]
pub struct ChatCompletionsModel {
    http: HttpClient,
    api_base: String,
    api_key: Option<String>,
}

impl ChatCompletionsModel {
    pub fn new(http: HttpClient, api_base: impl Into<String>, api_key: Option<String>) -> Self {
        Self {
            http,
            api_base: api_base.into().trim_end_matches('/').to_string(),
            api_key,
        }
    }

    fn endpoint(&self) -> String {
        format!("{}/chat/completions", self.api_base)
    }
}

#[async_trait]
impl CompletionModel for ChatCompletionsModel {
    async fn complete(
        &self,
        system: Option<&str>,
        user: &str,
        model: &str,
    ) -> Result<String, SourceError> {
        let mut messages = Vec::with_capacity(2);
        if let Some(system) = system {
            messages.push(ChatMessage {
                role: "system",
                content: system,
            });
        }
        messages.push(ChatMessage {
            role: "user",
            content: user,
        });

        let body = ChatCompletionRequest { model, messages };

        let mut request = self.http.client().post(self.endpoint()).json(&body);
        if let Some(key) = &self.api_key {
            request = request.bearer_auth(key);
        }

        tracing::debug!("Requesting completion from {} ({} prompt bytes)", model, user.len());
        let response = request.send().await?;

        let status = response.status();
        if !status.is_success() {
            let text = response.text().await.unwrap_or_default();
            return Err(api_error(status, text));
        }

        let parsed: ChatCompletionResponse = response
            .json()
            .await
            .map_err(|e| SourceError::Parse(format!("chat completion response: {}", e)))?;

        parsed
            .choices
            .into_iter()
            .next()
            .and_then(|choice| choice.message.content)
            .ok_or_else(|| SourceError::EmptyResponse(format!("{} returned no choices", model)))
    }
}

#[derive(Serialize)]
struct ChatCompletionRequest<'a> {
    model: &'a str,
    messages: Vec<ChatMessage<'a>>,
}

#[derive(Serialize)]
struct ChatMessage<'a> {
    role: &'static str,
    content: &'a str,
}

#[derive(Deserialize)]
struct ChatCompletionResponse {
    #[serde(default)]
    choices: Vec<Choice>,
}

#[derive(Deserialize)]
struct Choice {
    message: ResponseMessage,
}

#[derive(Deserialize)]
struct ResponseMessage {
    content: Option<String>,
}

#[derive(Deserialize)]
struct ErrorResponse {
    error: ErrorBody,
}

#[derive(Deserialize)]
struct ErrorBody {
    message: String,
}

fn api_error(status: StatusCode, body: String) -> SourceError {
    let message = serde_json::from_str::<ErrorResponse>(&body)
        .map(|wrapper| wrapper.error.message)
        .unwrap_or(body);

    SourceError::Api {
        status: status.as_u16(),
        message,
    }
}
