//! LLM summarizer clients.
//!
//! Two provider variants behind one trait: Gemini `generateContent` and
//! Groq's OpenAI-style chat completions. The pipeline treats every failure
//! here as transient; classification stays out of these clients.

use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{debug, info};

const TEMPERATURE: f32 = 0.7;
const MAX_OUTPUT_TOKENS: u32 = 1024;

const GEMINI_BASE_URL: &str = "https://generativelanguage.googleapis.com";
const GROQ_BASE_URL: &str = "https://api.groq.com";

/// Errors from a summarizer call. All of them signal "retry via queue
/// redelivery" to the caller.
#[derive(Debug, Error)]
pub enum SummarizerError {
    #[error("request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("API returned {status}: {body}")]
    Api { status: u16, body: String },

    #[error("API returned no usable text")]
    EmptyResponse,
}

/// Turns a transcript into newsletter-ready text.
#[async_trait]
pub trait Summarizer: Send + Sync {
    async fn summarize(
        &self,
        title: &str,
        channel: &str,
        transcript: &str,
    ) -> Result<String, SummarizerError>;
}

fn build_prompt(title: &str, channel: &str, language: &str, transcript: &str) -> String {
    format!(
        "You are a professional content curator and newsletter writer. \n\
Your goal is to transform YouTube transcripts into clear, structured, and highly readable summaries.\n\
\n\
STRUCTURE REQUIREMENTS:\n\
1. **Title**: Start with a catchy and descriptive headline (relevant to the video).\n\
2. **TL;DR**: A single, impactful sentence summarizing the core value proposition.\n\
3. **Key Takeaways**: A bulleted list of 3-5 main points using bold headers.\n\
4. **Summary**: A brief, conversational paragraph giving more context.\n\
\n\
FORMATTING RULES:\n\
- Use Markdown for structure (headers, bolding, lists).\n\
- Ensure there is double spacing between sections.\n\
- Avoid \"walls of text\"; keep paragraphs short.\n\
- Be written in {language}.\n\
\n\
Video Title: {title}\n\
Channel: {channel}\n\
\n\
Transcript:\n\
{transcript}\n\
\n\
Please provide the newsletter-ready summary in {language}:"
    )
}

// ---------------------------------------------------------------------------
// Gemini
// ---------------------------------------------------------------------------

#[derive(Debug, Serialize)]
struct GeminiRequest {
    contents: Vec<GeminiContent>,
    #[serde(rename = "generationConfig")]
    generation_config: GenerationConfig,
}

#[derive(Debug, Serialize)]
struct GeminiContent {
    parts: Vec<GeminiPart>,
}

#[derive(Debug, Serialize)]
struct GeminiPart {
    text: String,
}

#[derive(Debug, Serialize)]
struct GenerationConfig {
    temperature: f32,
    #[serde(rename = "maxOutputTokens")]
    max_output_tokens: u32,
}

#[derive(Debug, Deserialize)]
struct GeminiResponse {
    #[serde(default)]
    candidates: Vec<GeminiCandidate>,
}

#[derive(Debug, Deserialize)]
struct GeminiCandidate {
    content: GeminiResponseContent,
}

#[derive(Debug, Deserialize)]
struct GeminiResponseContent {
    #[serde(default)]
    parts: Vec<GeminiResponsePart>,
}

#[derive(Debug, Deserialize)]
struct GeminiResponsePart {
    text: String,
}

/// Gemini `generateContent` client.
pub struct GeminiClient {
    client: Client,
    api_key: String,
    model: String,
    language: String,
    base_url: String,
}

impl GeminiClient {
    pub fn new(
        api_key: impl Into<String>,
        model: impl Into<String>,
        language: impl Into<String>,
    ) -> Self {
        Self {
            client: Client::new(),
            api_key: api_key.into(),
            model: model.into(),
            language: language.into(),
            base_url: GEMINI_BASE_URL.to_string(),
        }
    }

    /// Point the client at a different host. Test hook.
    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into();
        self
    }
}

#[async_trait]
impl Summarizer for GeminiClient {
    async fn summarize(
        &self,
        title: &str,
        channel: &str,
        transcript: &str,
    ) -> Result<String, SummarizerError> {
        let prompt = build_prompt(title, channel, &self.language, transcript);
        let url = format!(
            "{}/v1beta/models/{}:generateContent?key={}",
            self.base_url, self.model, self.api_key
        );
        let request = GeminiRequest {
            contents: vec![GeminiContent {
                parts: vec![GeminiPart { text: prompt }],
            }],
            generation_config: GenerationConfig {
                temperature: TEMPERATURE,
                max_output_tokens: MAX_OUTPUT_TOKENS,
            },
        };

        debug!(model = %self.model, "calling Gemini");
        let response = self.client.post(&url).json(&request).send().await?;
        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(SummarizerError::Api {
                status: status.as_u16(),
                body,
            });
        }

        let parsed: GeminiResponse = response.json().await?;
        let text = parsed
            .candidates
            .first()
            .and_then(|c| c.content.parts.first())
            .map(|p| p.text.trim().to_string())
            .unwrap_or_default();
        if text.is_empty() {
            return Err(SummarizerError::EmptyResponse);
        }
        info!(model = %self.model, chars = text.len(), "summary generated");
        Ok(text)
    }
}

// ---------------------------------------------------------------------------
// Groq
// ---------------------------------------------------------------------------

#[derive(Debug, Serialize)]
struct GroqRequest {
    model: String,
    messages: Vec<GroqMessage>,
    temperature: f32,
    max_tokens: u32,
}

#[derive(Debug, Serialize)]
struct GroqMessage {
    role: &'static str,
    content: String,
}

#[derive(Debug, Deserialize)]
struct GroqResponse {
    #[serde(default)]
    choices: Vec<GroqChoice>,
}

#[derive(Debug, Deserialize)]
struct GroqChoice {
    message: GroqResponseMessage,
}

#[derive(Debug, Deserialize)]
struct GroqResponseMessage {
    content: String,
}

/// Groq chat-completions client.
pub struct GroqClient {
    client: Client,
    api_key: String,
    model: String,
    language: String,
    base_url: String,
}

impl GroqClient {
    pub fn new(
        api_key: impl Into<String>,
        model: impl Into<String>,
        language: impl Into<String>,
    ) -> Self {
        Self {
            client: Client::new(),
            api_key: api_key.into(),
            model: model.into(),
            language: language.into(),
            base_url: GROQ_BASE_URL.to_string(),
        }
    }

    /// Point the client at a different host. Test hook.
    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into();
        self
    }
}

#[async_trait]
impl Summarizer for GroqClient {
    async fn summarize(
        &self,
        title: &str,
        channel: &str,
        transcript: &str,
    ) -> Result<String, SummarizerError> {
        let prompt = build_prompt(title, channel, &self.language, transcript);
        let url = format!("{}/openai/v1/chat/completions", self.base_url);
        let request = GroqRequest {
            model: self.model.clone(),
            messages: vec![
                GroqMessage {
                    role: "system",
                    content: "You are a helpful assistant that creates concise, informative summaries."
                        .to_string(),
                },
                GroqMessage {
                    role: "user",
                    content: prompt,
                },
            ],
            temperature: TEMPERATURE,
            max_tokens: MAX_OUTPUT_TOKENS,
        };

        debug!(model = %self.model, "calling Groq");
        let response = self
            .client
            .post(&url)
            .bearer_auth(&self.api_key)
            .json(&request)
            .send()
            .await?;
        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(SummarizerError::Api {
                status: status.as_u16(),
                body,
            });
        }

        let parsed: GroqResponse = response.json().await?;
        let text = parsed
            .choices
            .first()
            .map(|c| c.message.content.trim().to_string())
            .unwrap_or_default();
        if text.is_empty() {
            return Err(SummarizerError::EmptyResponse);
        }
        info!(model = %self.model, chars = text.len(), "summary generated");
        Ok(text)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    #[test]
    fn test_prompt_interpolation() {
        let prompt = build_prompt("My Video", "My Channel", "en", "the transcript");
        assert!(prompt.contains("Video Title: My Video"));
        assert!(prompt.contains("Channel: My Channel"));
        assert!(prompt.contains("the transcript"));
        assert!(prompt.contains("summary in en:"));
    }

    #[tokio::test]
    async fn test_gemini_extracts_candidate_text() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/v1beta/models/test-model:generateContent"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "candidates": [{
                    "content": { "parts": [{ "text": "  The summary.  " }] }
                }]
            })))
            .mount(&server)
            .await;

        let client =
            GeminiClient::new("key", "test-model", "en").with_base_url(server.uri());
        let summary = client.summarize("T", "C", "transcript").await.unwrap();
        assert_eq!(summary, "The summary.");
    }

    #[tokio::test]
    async fn test_gemini_empty_candidates_is_an_error() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "candidates": [] })))
            .mount(&server)
            .await;

        let client =
            GeminiClient::new("key", "test-model", "en").with_base_url(server.uri());
        assert!(matches!(
            client.summarize("T", "C", "x").await,
            Err(SummarizerError::EmptyResponse)
        ));
    }

    #[tokio::test]
    async fn test_gemini_http_error_carries_status() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(503).set_body_string("overloaded"))
            .mount(&server)
            .await;

        let client =
            GeminiClient::new("key", "test-model", "en").with_base_url(server.uri());
        match client.summarize("T", "C", "x").await {
            Err(SummarizerError::Api { status, body }) => {
                assert_eq!(status, 503);
                assert_eq!(body, "overloaded");
            }
            other => panic!("expected Api error, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_groq_extracts_choice_content() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/openai/v1/chat/completions"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "choices": [{ "message": { "content": "Groq summary." } }]
            })))
            .mount(&server)
            .await;

        let client =
            GroqClient::new("key", "llama-3.3-70b-versatile", "en").with_base_url(server.uri());
        let summary = client.summarize("T", "C", "transcript").await.unwrap();
        assert_eq!(summary, "Groq summary.");
    }
}
