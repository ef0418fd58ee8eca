use std::{future::Future, time::Duration};

use anyhow::{Context, Result};
use reqwest::Url;
use serde_json::Value;
use thiserror::Error;

const GEMINI_API_BASE: &str = "https://generativelanguage.googleapis.com/v1beta";
pub const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

/// Why a generation attempt produced no usable text.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum GenerateError {
    #[error("provider rate limit hit")]
    RateLimited,
    #[error("provider answered HTTP {0}")]
    Http(u16),
    #[error("provider answered with a non-JSON body")]
    NonJson,
    #[error("provider returned no text")]
    EmptyOutput,
    #[error("provider did not answer in time")]
    Timeout,
    #[error("network error: {0}")]
    Network(String),
}

impl GenerateError {
    /// Stable code recorded in AI logs.
    pub fn code(&self) -> String {
        match self {
            GenerateError::RateLimited => "QUOTA_EXCEEDED".into(),
            GenerateError::Http(status) => format!("HTTP_{status}"),
            GenerateError::NonJson => "NON_JSON_RESPONSE".into(),
            GenerateError::EmptyOutput => "EMPTY_MODEL_OUTPUT".into(),
            GenerateError::Timeout => "TIMEOUT".into(),
            GenerateError::Network(_) => "NETWORK_ERROR".into(),
        }
    }
}

/// Anything that turns a prompt into text with a single attempt.
pub trait TextGenerator: Send + Sync {
    fn generate(&self, prompt: &str) -> impl Future<Output = Result<String, GenerateError>> + Send;
}

/// Client for the `generateContent` endpoint.
pub struct GeminiClient {
    api_key: String,
    model: String,
    base_url: String,
    client: reqwest::Client,
}

impl GeminiClient {
    pub fn new(api_key: impl Into<String>, model: impl Into<String>) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .build()
            .context("failed to build HTTP client")?;
        Ok(Self {
            api_key: api_key.into(),
            model: model.into(),
            base_url: GEMINI_API_BASE.into(),
            client,
        })
    }

    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into();
        self
    }

    pub fn model(&self) -> &str {
        &self.model
    }

    fn endpoint(&self) -> Result<Url, GenerateError> {
        let mut url = Url::parse(&self.base_url)
            .map_err(|err| GenerateError::Network(format!("bad base url: {err}")))?;
        url.path_segments_mut()
            .map_err(|_| GenerateError::Network("base url cannot have a path".into()))?
            .pop_if_empty()
            .push("models")
            .push(&format!("{}:generateContent", self.model));
        url.query_pairs_mut().append_pair("key", &self.api_key);
        Ok(url)
    }
}

impl TextGenerator for GeminiClient {
    fn generate(&self, prompt: &str) -> impl Future<Output = Result<String, GenerateError>> + Send {
        let body = serde_json::json!({ "contents": [{ "parts": [{ "text": prompt }] }] });
        let endpoint = self.endpoint();
        let client = self.client.clone();

        async move {
            let response = client
                .post(endpoint?)
                .json(&body)
                .send()
                .await
                .map_err(transport_error)?;
            let status = response.status().as_u16();
            let raw = response.text().await.map_err(transport_error)?;
            parse_generate_response(status, &raw)
        }
    }
}

fn transport_error(err: reqwest::Error) -> GenerateError {
    if err.is_timeout() {
        GenerateError::Timeout
    } else {
        GenerateError::Network(err.to_string())
    }
}

/// Turns an HTTP status and body into the model's text. The rate-limit status
/// is recognised before the body is looked at.
pub fn parse_generate_response(status: u16, raw: &str) -> Result<String, GenerateError> {
    if status == 429 {
        return Err(GenerateError::RateLimited);
    }
    if !(200..300).contains(&status) {
        return Err(GenerateError::Http(status));
    }
    if raw.trim().is_empty() {
        return Err(GenerateError::EmptyOutput);
    }

    let data: Value = serde_json::from_str(raw).map_err(|_| GenerateError::NonJson)?;
    let text = match data["candidates"][0]["content"]["parts"].as_array() {
        Some(parts) => parts
            .iter()
            .filter_map(|part| part["text"].as_str())
            .collect::<String>(),
        None => data["output"].as_str().unwrap_or_default().to_string(),
    };

    let text = text.trim();
    if text.is_empty() {
        return Err(GenerateError::EmptyOutput);
    }
    Ok(text.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn joins_text_parts_of_first_candidate() {
        let raw = r#"{"candidates":[{"content":{"parts":[{"text":" Nefes al. "},{"inline":1},{"text":"Başla."}]}}]}"#;
        assert_eq!(parse_generate_response(200, raw).unwrap(), "Nefes al. Başla.");
    }

    #[test]
    fn rate_limit_wins_over_body_shape() {
        assert_eq!(
            parse_generate_response(429, "<html>slow down</html>"),
            Err(GenerateError::RateLimited)
        );
    }

    #[test]
    fn classifies_failures() {
        assert_eq!(parse_generate_response(503, "{}"), Err(GenerateError::Http(503)));
        assert_eq!(parse_generate_response(200, "not json"), Err(GenerateError::NonJson));
        assert_eq!(parse_generate_response(200, ""), Err(GenerateError::EmptyOutput));
        assert_eq!(
            parse_generate_response(200, r#"{"candidates":[{"content":{"parts":[]}}]}"#),
            Err(GenerateError::EmptyOutput)
        );
        assert_eq!(parse_generate_response(200, r#"{"output":"düz"}"#).unwrap(), "düz");
    }

    #[test]
    fn endpoint_escapes_model_and_carries_key() {
        let client = GeminiClient::new("k y", "gemini-2.0-flash")
            .unwrap()
            .with_base_url("http://localhost:9/v1beta");
        let url = client.endpoint().unwrap();
        assert_eq!(url.path(), "/v1beta/models/gemini-2.0-flash:generateContent");
        assert_eq!(url.query(), Some("key=k+y"));
    }

    #[test]
    fn error_codes_are_stable() {
        assert_eq!(GenerateError::Http(500).code(), "HTTP_500");
        assert_eq!(GenerateError::RateLimited.code(), "QUOTA_EXCEEDED");
    }
}
