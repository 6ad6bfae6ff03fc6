//! OpenRouter chat-completions client that writes a one-line hardware
//! description from a file name.

use async_trait::async_trait;
use autopost_core::config::DescriberConfig;
use autopost_core::contract::Describer;
use serde::{Deserialize, Serialize};
use tracing::{debug, error, warn};

const ENDPOINT: &str = "https://openrouter.ai/api/v1/chat/completions";

#[derive(Debug, Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: Vec<ChatMessage>,
}

#[derive(Debug, Serialize, Deserialize)]
struct ChatMessage {
    role: String,
    content: String,
}

#[derive(Debug, Deserialize)]
struct ChatResponse {
    #[serde(default)]
    choices: Vec<Choice>,
}

#[derive(Debug, Deserialize)]
struct Choice {
    message: ChatMessage,
}

pub fn description_prompt(file_name: &str) -> String {
    format!(
        "You are a hardware and electronics expert. From the name of a schematic or \
         boardview file '{file_name}' for a motherboard, laptop or graphics card, write a \
         precise and clear description of the device it belongs to. Include:\n\
         - Device type (PC, laptop, GPU)\n\
         - Brand\n\
         - Model\n\
         - One notable feature if applicable\n\n\
         The description must be easy to scan for someone looking for quick hardware \
         information and must fit in a single sentence or a very short fact sheet. \
         Do not add irrelevant information."
    )
}

pub struct OpenRouterClient {
    http: reqwest::Client,
    api_key: Option<String>,
    model: String,
}

impl OpenRouterClient {
    pub fn new(http: reqwest::Client, config: &DescriberConfig) -> Self {
        Self {
            http,
            api_key: config.api_key.clone(),
            model: config.model.clone(),
        }
    }

    async fn try_describe(&self, api_key: &str, file_name: &str) -> Result<String, reqwest::Error> {
        let body = ChatRequest {
            model: &self.model,
            messages: vec![ChatMessage {
                role: "user".into(),
                content: description_prompt(file_name),
            }],
        };
        let resp: ChatResponse = self
            .http
            .post(ENDPOINT)
            .bearer_auth(api_key)
            .json(&body)
            .send()
            .await?
            .error_for_status()?
            .json()
            .await?;
        Ok(first_answer(resp))
    }
}

fn first_answer(resp: ChatResponse) -> String {
    resp.choices
        .into_iter()
        .next()
        .map(|c| c.message.content.trim().to_string())
        .unwrap_or_default()
}

#[async_trait]
impl Describer for OpenRouterClient {
    async fn describe(&self, file_name: &str) -> String {
        let Some(api_key) = self.api_key.as_deref() else {
            warn!("OPENROUTER_API_KEY not set, skipping description");
            return String::new();
        };
        match self.try_describe(api_key, file_name).await {
            Ok(text) => {
                debug!(file_name, chars = text.len(), "Got description");
                text
            }
            Err(e) => {
                error!(error = %e, file_name, "OpenRouter request failed");
                String::new()
            }
        }
    }
}
