use anyhow::{Context, Result, anyhow};
use serde::{Deserialize, Serialize};
use std::env;

// --- Provider trait ---

/// A text-generation backend. Each call is stateless; no conversation
/// history is retained between completions.
pub trait AIProvider {
    fn complete(&self, prompt: &str, max_tokens: u32) -> Result<String>;
    #[allow(dead_code)]
    fn model_name(&self) -> &str;
}

#[derive(Debug, Clone)]
pub enum ProviderKind {
    Doubao,
    OpenAI,
}

#[derive(Debug, Clone)]
pub struct ModelSpec {
    pub provider: ProviderKind,
    pub model_id: String,
    pub short_name: String,
}

pub fn resolve_model(name: &str) -> Result<ModelSpec> {
    match name {
        // Doubao via the Volcengine Ark endpoint (requires DOUBAO_API_KEY)
        "doubao" | "doubao-seed" => Ok(ModelSpec {
            provider: ProviderKind::Doubao,
            model_id: "doubao-seed-1-6-250615".to_string(),
            short_name: "doubao".to_string(),
        }),
        "doubao-pro" => Ok(ModelSpec {
            provider: ProviderKind::Doubao,
            model_id: "doubao-1-5-pro-32k-250115".to_string(),
            short_name: "doubao-pro".to_string(),
        }),
        // OpenAI (requires OPENAI_API_KEY)
        "gpt-4o" => Ok(ModelSpec {
            provider: ProviderKind::OpenAI,
            model_id: "gpt-4o".to_string(),
            short_name: "gpt-4o".to_string(),
        }),
        "gpt-4o-mini" | "mini" => Ok(ModelSpec {
            provider: ProviderKind::OpenAI,
            model_id: "gpt-4o-mini".to_string(),
            short_name: "gpt-4o-mini".to_string(),
        }),
        _ => Err(anyhow!(
            "Unknown model '{}'. Available: doubao (default), doubao-pro, gpt-4o, gpt-4o-mini",
            name
        )),
    }
}

pub fn create_provider(spec: &ModelSpec) -> Result<Box<dyn AIProvider>> {
    match spec.provider {
        ProviderKind::Doubao => {
            let provider = DoubaoProvider::new(spec.model_id.clone())?;
            Ok(Box::new(provider))
        }
        ProviderKind::OpenAI => {
            let provider = OpenAIProvider::new(spec.model_id.clone())?;
            Ok(Box::new(provider))
        }
    }
}

// --- Shared chat-completions wire format (Ark is OpenAI-compatible) ---

#[derive(Debug, Serialize)]
struct ChatMessage {
    role: String,
    content: String,
}

#[derive(Debug, Serialize)]
struct ChatRequest {
    model: String,
    max_tokens: u32,
    messages: Vec<ChatMessage>,
}

#[derive(Debug, Deserialize)]
struct ChatResponseMessage {
    content: String,
}

#[derive(Debug, Deserialize)]
struct ChatChoice {
    message: ChatResponseMessage,
}

#[derive(Debug, Deserialize)]
struct ChatResponse {
    choices: Vec<ChatChoice>,
}

fn chat_completion(
    client: &reqwest::blocking::Client,
    url: &str,
    api_key: &str,
    request: &ChatRequest,
) -> Result<String> {
    let response = client
        .post(url)
        .header("Authorization", format!("Bearer {}", api_key))
        .header("Content-Type", "application/json")
        .json(request)
        .send()
        .with_context(|| format!("Failed to send request to {}", url))?;

    if !response.status().is_success() {
        let status = response.status();
        let error_text = response.text().unwrap_or_default();
        return Err(anyhow!(
            "Chat completion request failed with status {}: {}",
            status,
            error_text
        ));
    }

    let api_response: ChatResponse = response
        .json()
        .context("Failed to parse chat completion response")?;

    api_response
        .choices
        .first()
        .map(|choice| choice.message.content.clone())
        .ok_or_else(|| anyhow!("No choices in chat completion response"))
}

// --- Doubao provider ---

const ARK_API_URL: &str = "https://ark.cn-beijing.volces.com/api/v3/chat/completions";

#[derive(Debug)]
pub struct DoubaoProvider {
    api_key: String,
    model_id: String,
    client: reqwest::blocking::Client,
}

impl DoubaoProvider {
    pub fn new(model_id: String) -> Result<Self> {
        let api_key = env::var("DOUBAO_API_KEY").context(
            "DOUBAO_API_KEY environment variable not set. Set it with: export DOUBAO_API_KEY=your-key-here",
        )?;
        let client = reqwest::blocking::Client::new();
        Ok(Self { api_key, model_id, client })
    }
}

impl AIProvider for DoubaoProvider {
    fn complete(&self, prompt: &str, max_tokens: u32) -> Result<String> {
        let request = ChatRequest {
            model: self.model_id.clone(),
            max_tokens,
            messages: vec![ChatMessage {
                role: "user".to_string(),
                content: prompt.to_string(),
            }],
        };
        chat_completion(&self.client, ARK_API_URL, &self.api_key, &request)
    }

    fn model_name(&self) -> &str {
        &self.model_id
    }
}

// --- OpenAI provider ---

const OPENAI_API_URL: &str = "https://api.openai.com/v1/chat/completions";

#[derive(Debug)]
pub struct OpenAIProvider {
    api_key: String,
    model_id: String,
    client: reqwest::blocking::Client,
}

impl OpenAIProvider {
    pub fn new(model_id: String) -> Result<Self> {
        let api_key = env::var("OPENAI_API_KEY").context(
            "OPENAI_API_KEY environment variable not set. Set it with: export OPENAI_API_KEY=your-key-here",
        )?;
        let client = reqwest::blocking::Client::new();
        Ok(Self { api_key, model_id, client })
    }
}

impl AIProvider for OpenAIProvider {
    fn complete(&self, prompt: &str, max_tokens: u32) -> Result<String> {
        let request = ChatRequest {
            model: self.model_id.clone(),
            max_tokens,
            messages: vec![ChatMessage {
                role: "user".to_string(),
                content: prompt.to_string(),
            }],
        };
        chat_completion(&self.client, OPENAI_API_URL, &self.api_key, &request)
    }

    fn model_name(&self) -> &str {
        &self.model_id
    }
}
