//! OpenAI Chat Completions API provider

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use super::CompletionClient;
use crate::{
    error::{Error, Result},
    types::{CompletionRequest, CompletionResponse, Content, Message, Role, Usage},
};

/// Default API endpoint
pub const DEFAULT_BASE_URL: &str = "https://api.openai.com/v1";

/// OpenAI API client
pub struct OpenAIProvider {
    client: reqwest::Client,
    api_key: String,
    organization: Option<String>,
    base_url: String,
}

impl OpenAIProvider {
    /// Create a new OpenAI provider with an API key
    pub fn new(api_key: impl Into<String>) -> Self {
        Self {
            client: reqwest::Client::new(),
            api_key: api_key.into(),
            organization: None,
            base_url: DEFAULT_BASE_URL.to_string(),
        }
    }

    /// Send requests on behalf of an organization
    pub fn with_organization(mut self, organization: impl Into<String>) -> Self {
        self.organization = Some(organization.into());
        self
    }

    /// Point the provider at an OpenAI-compatible endpoint
    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into().trim_end_matches('/').to_string();
        self
    }

    fn headers(&self) -> Result<reqwest::header::HeaderMap> {
        let mut headers = reqwest::header::HeaderMap::new();
        let auth = format!("Bearer {}", self.api_key)
            .parse()
            .map_err(|_| Error::InvalidApiKey)?;
        headers.insert(reqwest::header::AUTHORIZATION, auth);
        if let Some(ref org) = self.organization {
            let value = org
                .parse()
                .map_err(|_| Error::InvalidConfig(format!("bad organization id: {}", org)))?;
            headers.insert("openai-organization", value);
        }
        Ok(headers)
    }
}

#[async_trait]
impl CompletionClient for OpenAIProvider {
    async fn complete(&self, request: &CompletionRequest) -> Result<CompletionResponse> {
        let body = build_request(request);
        let url = format!("{}/chat/completions", self.base_url);

        tracing::debug!(
            model = %request.model,
            messages = request.messages.len(),
            "requesting chat completion"
        );

        let response = self
            .client
            .post(&url)
            .headers(self.headers()?)
            .json(&body)
            .send()
            .await?;

        let status = response.status();
        let text = response.text().await?;
        if !status.is_success() {
            return Err(parse_error(status.as_u16(), &text));
        }

        parse_response(&text)
    }
}

fn build_request(request: &CompletionRequest) -> OpenAIRequest {
    OpenAIRequest {
        model: request.model.clone(),
        messages: request.messages.iter().map(convert_message).collect(),
        temperature: request.temperature,
    }
}

fn convert_message(msg: &Message) -> OpenAIMessage {
    let content = if msg.has_images() {
        MessageContent::Parts(
            msg.content
                .iter()
                .map(|c| match c {
                    Content::Text { text } => ContentPart::Text { text: text.clone() },
                    Content::ImageUrl { url } => ContentPart::ImageUrl {
                        image_url: ImageUrl {
                            url: url.clone(),
                            detail: "auto".to_string(),
                        },
                    },
                })
                .collect(),
        )
    } else {
        MessageContent::Text(msg.text())
    };

    OpenAIMessage {
        role: msg.role.as_str().to_string(),
        content,
    }
}

fn parse_response(body: &str) -> Result<CompletionResponse> {
    let parsed: OpenAIResponse = serde_json::from_str(body)?;

    let choice = parsed
        .choices
        .into_iter()
        .next()
        .ok_or_else(|| Error::UnexpectedResponse("response has no choices".to_string()))?;

    let role = Role::parse(&choice.message.role).unwrap_or(Role::Assistant);
    let usage = parsed
        .usage
        .map(|u| Usage {
            prompt_tokens: u.prompt_tokens,
            completion_tokens: u.completion_tokens,
        })
        .unwrap_or_default();

    tracing::info!(
        prompt_tokens = usage.prompt_tokens,
        completion_tokens = usage.completion_tokens,
        "chat completion usage"
    );

    Ok(CompletionResponse {
        message: Message::new(role, choice.message.content.unwrap_or_default()),
        usage,
    })
}

fn parse_error(status: u16, body: &str) -> Error {
    match serde_json::from_str::<OpenAIErrorBody>(body) {
        Ok(parsed) => {
            let detail = parsed.error;
            let error = Error::api(
                status,
                detail.error_type.unwrap_or_else(|| "unknown".to_string()),
                detail.message,
            );
            match detail.code {
                Some(code) => error.with_code(code),
                None => error,
            }
        }
        Err(_) => Error::api(status, "http_error", body.to_string()),
    }
}

// Request types

#[derive(Debug, Serialize)]
struct OpenAIRequest {
    model: String,
    messages: Vec<OpenAIMessage>,
    #[serde(skip_serializing_if = "Option::is_none")]
    temperature: Option<f32>,
}

#[derive(Debug, Serialize)]
struct OpenAIMessage {
    role: String,
    content: MessageContent,
}

#[derive(Debug, Serialize)]
#[serde(untagged)]
enum MessageContent {
    Text(String),
    Parts(Vec<ContentPart>),
}

#[derive(Debug, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
enum ContentPart {
    Text { text: String },
    ImageUrl { image_url: ImageUrl },
}

#[derive(Debug, Serialize)]
struct ImageUrl {
    url: String,
    detail: String,
}

// Response types

#[derive(Debug, Deserialize)]
struct OpenAIResponse {
    choices: Vec<OpenAIChoice>,
    #[serde(default)]
    usage: Option<OpenAIUsage>,
}

#[derive(Debug, Deserialize)]
struct OpenAIChoice {
    message: OpenAIResponseMessage,
}

#[derive(Debug, Deserialize)]
struct OpenAIResponseMessage {
    role: String,
    content: Option<String>,
}

#[derive(Debug, Deserialize)]
struct OpenAIUsage {
    prompt_tokens: u32,
    completion_tokens: u32,
}

#[derive(Debug, Deserialize)]
struct OpenAIErrorBody {
    error: OpenAIErrorDetail,
}

#[derive(Debug, Deserialize)]
struct OpenAIErrorDetail {
    message: String,
    #[serde(rename = "type", default)]
    error_type: Option<String>,
    #[serde(default)]
    code: Option<String>,
}
