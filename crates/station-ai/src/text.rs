//! Creative concept generation through a chat-completions API.

use reqwest::Client;
use serde::{Deserialize, Serialize};
use station_models::CreativeConcept;
use tracing::{debug, info};

use crate::config::{AiConfig, MarketingLinks};
use crate::error::{AiError, AiResult};
use crate::prompt::{marketing_footer, strip_code_fence, system_prompt, USER_PROMPT};

#[derive(Debug, Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: Vec<Message<'a>>,
    response_format: ResponseFormat,
    temperature: f32,
}

#[derive(Debug, Serialize)]
struct Message<'a> {
    role: &'a str,
    content: &'a str,
}

#[derive(Debug, Serialize)]
struct ResponseFormat {
    #[serde(rename = "type")]
    kind: &'static str,
}

#[derive(Debug, Deserialize)]
struct ChatResponse {
    choices: Vec<Choice>,
}

#[derive(Debug, Deserialize)]
struct Choice {
    message: ChoiceMessage,
}

#[derive(Debug, Deserialize)]
struct ChoiceMessage {
    content: Option<String>,
}

/// Chat-completions client that asks for one [`CreativeConcept`].
#[derive(Clone)]
pub struct TextGenerator {
    http: Client,
    api_key: String,
    endpoint: String,
    model: String,
    links: MarketingLinks,
    system_prompt: String,
}

impl TextGenerator {
    pub fn new(config: &AiConfig) -> AiResult<Self> {
        let http = Client::builder()
            .timeout(config.request_timeout)
            .build()?;

        Ok(Self {
            http,
            api_key: config.text_api_key.clone(),
            endpoint: format!("{}/chat/completions", config.text_base_url.trim_end_matches('/')),
            model: config.text_model.clone(),
            links: config.links.clone(),
            system_prompt: system_prompt(),
        })
    }

    /// Ask for a fresh concept. The description comes back with the
    /// marketing footer appended.
    pub async fn generate_concept(&self) -> AiResult<CreativeConcept> {
        info!(model = %self.model, "Requesting creative concept");

        let request = ChatRequest {
            model: &self.model,
            messages: vec![
                Message {
                    role: "system",
                    content: &self.system_prompt,
                },
                Message {
                    role: "user",
                    content: USER_PROMPT,
                },
            ],
            response_format: ResponseFormat { kind: "json_object" },
            temperature: 0.8,
        };

        let response = self
            .http
            .post(&self.endpoint)
            .bearer_auth(&self.api_key)
            .json(&request)
            .send()
            .await?;

        if !response.status().is_success() {
            let status = response.status().as_u16();
            let body = response.text().await.unwrap_or_default();
            return Err(AiError::Upstream {
                service: "chat-completions",
                status,
                body,
            });
        }

        let chat: ChatResponse = response
            .json()
            .await
            .map_err(|e| AiError::invalid_response(format!("Failed to parse chat response: {}", e)))?;

        let content = chat
            .choices
            .into_iter()
            .next()
            .and_then(|c| c.message.content)
            .ok_or_else(|| AiError::invalid_response("No content in chat response"))?;

        let mut concept = parse_concept(&content)?;
        concept.description.push_str(&marketing_footer(&self.links));

        debug!(reasoning = %concept.concept_reasoning, "Concept reasoning");
        info!(title = %concept.title, "Creative concept chosen");
        Ok(concept)
    }
}

/// Parse and validate the model's JSON answer.
pub fn parse_concept(content: &str) -> AiResult<CreativeConcept> {
    let concept: CreativeConcept = serde_json::from_str(strip_code_fence(content))
        .map_err(|e| AiError::invalid_response(format!("Failed to parse concept JSON: {}", e)))?;
    Ok(concept.checked()?)
}
