//! Gemini API key client.

use anyhow::{Context, Result};
use reqwest::header::{HeaderMap, HeaderValue};
use serde_json::{Value, json};

use super::sse::GeminiSseParser;
use crate::config::Config;
use crate::prompts::render_tutor_prompt;
use crate::provider::shared::{USER_AGENT, classify_reqwest_error};
use crate::provider::{
    ChatTurn, ProviderError, ProviderStream, StreamingBackend, resolve_api_key, resolve_base_url,
};
use crate::store::Lesson;

const DEFAULT_BASE_URL: &str = "https://generativelanguage.googleapis.com/v1beta";

/// Gemini API configuration.
#[derive(Debug, Clone)]
pub struct GeminiConfig {
    pub api_key: String,
    pub base_url: String,
    pub model: String,
    pub max_output_tokens: Option<u32>,
}

impl GeminiConfig {
    /// Creates a config from the loaded file config and the environment.
    ///
    /// Authentication resolution order:
    /// 1. `api_key` in `[providers.gemini]`
    /// 2. `GEMINI_API_KEY` environment variable
    ///
    /// Base URL resolution order: `GEMINI_BASE_URL` env var, then config,
    /// then the public Generative Language endpoint.
    pub fn from_env(model: String, config: &Config) -> Result<Self> {
        let gemini = &config.providers.gemini;
        let api_key = resolve_api_key(gemini.api_key.as_deref(), "GEMINI_API_KEY", "gemini")?;
        let base_url = resolve_base_url(
            gemini.base_url.as_deref(),
            "GEMINI_BASE_URL",
            DEFAULT_BASE_URL,
            "Gemini",
        )?;

        Ok(Self {
            api_key,
            base_url,
            model,
            max_output_tokens: config.max_output_tokens,
        })
    }
}

/// Gemini streaming client.
///
/// Holds no conversational state; every call carries its own full history.
pub struct GeminiClient {
    config: GeminiConfig,
    http: reqwest::Client,
}

impl GeminiClient {
    pub fn new(config: GeminiConfig) -> Self {
        Self {
            config,
            http: reqwest::Client::new(),
        }
    }

    async fn open_stream(
        &self,
        lesson: &Lesson,
        history: &[ChatTurn],
        prompt: &str,
    ) -> Result<ProviderStream> {
        use futures_util::StreamExt;

        let system = render_tutor_prompt(lesson)?;
        let request = build_gemini_request(
            history,
            prompt,
            Some(&system),
            self.config.max_output_tokens,
        );
        let url = format!(
            "{}/models/{}:streamGenerateContent?alt=sse",
            self.config.base_url, self.config.model
        );

        tracing::debug!(model = %self.config.model, turns = history.len(), "opening gemini stream");

        let response = self
            .http
            .post(&url)
            .headers(build_headers(&self.config.api_key)?)
            .json(&request)
            .send()
            .await
            .map_err(|e| classify_reqwest_error(&e))?;

        let status = response.status();
        if !status.is_success() {
            let error_body = response.text().await.unwrap_or_default();
            return Err(ProviderError::http_status(status.as_u16(), &error_body).into());
        }

        let parser = GeminiSseParser::new(response.bytes_stream());
        Ok(parser.boxed())
    }
}

impl StreamingBackend for GeminiClient {
    async fn stream_lesson_reply(
        &self,
        lesson: &Lesson,
        history: &[ChatTurn],
        prompt: &str,
    ) -> Result<ProviderStream> {
        self.open_stream(lesson, history, prompt).await
    }
}

/// Builds the `streamGenerateContent` request body.
///
/// The prior history becomes the leading `contents` entries; the new user
/// text rides as the final user turn. The tutor preamble goes into
/// `system_instruction`.
pub fn build_gemini_request(
    history: &[ChatTurn],
    prompt: &str,
    system: Option<&str>,
    max_output_tokens: Option<u32>,
) -> Value {
    let mut contents: Vec<Value> = history
        .iter()
        .map(|turn| {
            json!({
                "role": turn.role,
                "parts": [{"text": turn.text}]
            })
        })
        .collect();
    contents.push(json!({
        "role": "user",
        "parts": [{"text": prompt}]
    }));

    let mut request = json!({
        "contents": contents,
    });

    if let Some(prompt) = system
        && !prompt.trim().is_empty()
    {
        request["system_instruction"] = json!({
            "parts": [{"text": prompt}]
        });
    }

    if let Some(max_output_tokens) = max_output_tokens
        && max_output_tokens > 0
    {
        request["generationConfig"] = json!({
            "maxOutputTokens": max_output_tokens
        });
    }

    request
}

fn build_headers(api_key: &str) -> Result<HeaderMap> {
    let mut headers = HeaderMap::new();
    let key = HeaderValue::from_str(api_key)
        .context("API key contains characters not allowed in an HTTP header")?;
    headers.insert("x-goog-api-key", key);
    headers.insert("accept", HeaderValue::from_static("text/event-stream"));
    headers.insert("content-type", HeaderValue::from_static("application/json"));
    headers.insert("user-agent", HeaderValue::from_static(USER_AGENT));
    Ok(headers)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_request_places_prompt_as_final_user_turn() {
        let history = vec![
            ChatTurn::new("user", "what is photosynthesis?"),
            ChatTurn::new("model", "It converts light to chemical energy."),
        ];

        let request = build_gemini_request(&history, "explain step 1", None, None);

        let contents = request["contents"].as_array().unwrap();
        assert_eq!(contents.len(), 3);
        assert_eq!(contents[0]["role"], "user");
        assert_eq!(contents[1]["role"], "model");
        assert_eq!(contents[2]["role"], "user");
        assert_eq!(contents[2]["parts"][0]["text"], "explain step 1");
    }

    #[test]
    fn test_request_sets_system_instruction_and_max_tokens() {
        let request =
            build_gemini_request(&[], "hi", Some("You are an expert AI tutor."), Some(2048));

        assert_eq!(
            request["system_instruction"]["parts"][0]["text"],
            "You are an expert AI tutor."
        );
        assert_eq!(request["generationConfig"]["maxOutputTokens"], json!(2048));
    }

    #[test]
    fn test_request_omits_empty_system_instruction() {
        let request = build_gemini_request(&[], "hi", Some("   "), None);
        assert!(request.get("system_instruction").is_none());
        assert!(request.get("generationConfig").is_none());
    }

    fn test_lesson() -> Lesson {
        Lesson {
            id: "a".to_string(),
            title: "Photosynthesis".to_string(),
            subject: "Biology".to_string(),
            description: "light-dependent reactions".to_string(),
            created_at: 0,
        }
    }

    #[tokio::test]
    async fn test_stream_lesson_reply_parses_sse() {
        use futures_util::StreamExt;
        use wiremock::matchers::{header, method, path};
        use wiremock::{Mock, MockServer, ResponseTemplate};

        use crate::provider::StreamEvent;

        let server = MockServer::start().await;
        let body = concat!(
            "data: {\"candidates\":[{\"content\":{\"parts\":[{\"text\":\"Step \"}]}}]}\n\n",
            "data: {\"candidates\":[{\"content\":{\"parts\":[{\"text\":\"Step 1: light absorption.\"}]},\"finishReason\":\"STOP\"}]}\n\n",
        );
        Mock::given(method("POST"))
            .and(path("/models/gemini-2.5-flash:streamGenerateContent"))
            .and(header("x-goog-api-key", "test-api-key"))
            .respond_with(ResponseTemplate::new(200).set_body_raw(body, "text/event-stream"))
            .expect(1)
            .mount(&server)
            .await;

        let client = GeminiClient::new(GeminiConfig {
            api_key: "test-api-key".to_string(),
            base_url: server.uri(),
            model: "gemini-2.5-flash".to_string(),
            max_output_tokens: None,
        });

        let stream = client
            .stream_lesson_reply(&test_lesson(), &[], "explain step 1")
            .await
            .unwrap();
        let events: Vec<_> = stream.map(|r| r.unwrap()).collect().await;

        assert_eq!(
            events,
            vec![
                StreamEvent::TextDelta { text: "Step ".to_string() },
                StreamEvent::TextDelta { text: "1: light absorption.".to_string() },
                StreamEvent::Completed { usage: None },
            ]
        );
    }

    #[tokio::test]
    async fn test_api_key_with_header_unsafe_bytes_errors_before_sending() {
        let client = GeminiClient::new(GeminiConfig {
            api_key: "key\nwith-newline".to_string(),
            base_url: "http://127.0.0.1:9".to_string(),
            model: "gemini-2.5-flash".to_string(),
            max_output_tokens: None,
        });

        let error = client
            .stream_lesson_reply(&test_lesson(), &[], "hi")
            .await
            .err()
            .expect("expected an error");
        assert!(error.to_string().contains("API key"));
    }

    #[tokio::test]
    async fn test_stream_lesson_reply_http_error_is_terminal() {
        use wiremock::matchers::method;
        use wiremock::{Mock, MockServer, ResponseTemplate};

        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(429).set_body_string(
                r#"{"error": {"message": "Resource exhausted", "status": "RESOURCE_EXHAUSTED"}}"#,
            ))
            .mount(&server)
            .await;

        let client = GeminiClient::new(GeminiConfig {
            api_key: "test-api-key".to_string(),
            base_url: server.uri(),
            model: "gemini-2.5-flash".to_string(),
            max_output_tokens: None,
        });

        let error = client
            .stream_lesson_reply(&test_lesson(), &[], "hi")
            .await
            .err()
            .expect("expected an error");
        let provider_error = error.downcast_ref::<ProviderError>().unwrap();
        assert_eq!(provider_error.message, "HTTP 429: Resource exhausted");
    }
}
