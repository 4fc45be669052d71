//! Talks to OpenAI-compatible APIs for chat completions and embeddings.
//! Configured from the environment, see AiConfig::from_env().

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::error::PlotlineError;

fn ai_err(msg: impl Into<String>) -> PlotlineError {
    PlotlineError::AiBackend(msg.into())
}

pub const DEFAULT_LLM_URL: &str = "https://api.openai.com/v1/chat/completions";
pub const DEFAULT_LLM_MODEL: &str = "gpt-4o-2024-08-06";
pub const DEFAULT_ANSWER_MODEL: &str = "gpt-4";
pub const DEFAULT_EMBED_MODEL: &str = "text-embedding-ada-002";

#[derive(Clone)]
pub struct AiConfig {
    pub llm_url: String,
    pub llm_key: String,
    pub llm_model: String,
    pub embed_url: String,
    pub embed_key: String,
    pub embed_model: String,
    pub client: reqwest::Client,
    // Per-component model overrides (fall back to llm_model if None)
    pub evaluate_model: Option<String>,
    pub update_model: Option<String>,
    pub answer_model: Option<String>,
}

impl AiConfig {
    /// Config with default models for the given endpoints.
    /// The client has no request timeout; calls block until the server answers.
    pub fn with_endpoints(llm_url: &str, embed_url: &str, key: &str) -> Self {
        Self {
            llm_url: llm_url.to_string(),
            llm_key: key.to_string(),
            llm_model: DEFAULT_LLM_MODEL.into(),
            embed_url: embed_url.to_string(),
            embed_key: key.to_string(),
            embed_model: DEFAULT_EMBED_MODEL.into(),
            client: reqwest::Client::new(),
            evaluate_model: None,
            update_model: None,
            answer_model: Some(DEFAULT_ANSWER_MODEL.into()),
        }
    }

    pub fn model_for(&self, component: &str) -> &str {
        let m = match component {
            "evaluate" => self.evaluate_model.as_deref(),
            "update" => self.update_model.as_deref(),
            "answer" => self.answer_model.as_deref(),
            _ => None,
        };
        m.unwrap_or(&self.llm_model)
    }

    /// Returns `None` when neither `PLOTLINE_LLM_URL` nor an API key is set.
    pub fn from_env() -> Option<Self> {
        let url_override = std::env::var("PLOTLINE_LLM_URL").ok();
        let llm_key = std::env::var("PLOTLINE_LLM_KEY")
            .or_else(|_| std::env::var("OPENAI_API_KEY"))
            .unwrap_or_default();
        if url_override.is_none() && llm_key.is_empty() {
            return None;
        }
        let llm_url = url_override.unwrap_or_else(|| DEFAULT_LLM_URL.into());
        let embed_url = std::env::var("PLOTLINE_EMBED_URL")
            .unwrap_or_else(|_| derive_embed_url(&llm_url));

        let mut cfg = Self::with_endpoints(&llm_url, &embed_url, &llm_key);
        if let Ok(k) = std::env::var("PLOTLINE_EMBED_KEY") {
            cfg.embed_key = k;
        }
        if let Ok(m) = std::env::var("PLOTLINE_LLM_MODEL") {
            cfg.llm_model = m;
        }
        if let Ok(m) = std::env::var("PLOTLINE_EMBED_MODEL") {
            cfg.embed_model = m;
        }
        cfg.evaluate_model = std::env::var("PLOTLINE_EVALUATE_MODEL").ok();
        cfg.update_model = std::env::var("PLOTLINE_UPDATE_MODEL").ok();
        if let Ok(m) = std::env::var("PLOTLINE_ANSWER_MODEL") {
            cfg.answer_model = Some(m);
        }
        Some(cfg)
    }
}

/// Embeddings live next to chat completions on every OpenAI-compatible server.
pub fn derive_embed_url(llm_url: &str) -> String {
    // Only rewrite if this looks like a chat completions endpoint
    if llm_url.contains("/chat/completions") {
        llm_url.replace("/chat/completions", "/embeddings")
    } else {
        format!("{}/embeddings", llm_url.trim_end_matches('/'))
    }
}

#[derive(Serialize)]
struct ChatRequest {
    model: String,
    messages: Vec<ChatMessage>,
    temperature: f64,
}

#[derive(Serialize, Deserialize, Clone)]
struct ChatMessage {
    role: String,
    content: String,
}

#[derive(Deserialize, Debug, Clone, Default)]
pub struct Usage {
    #[serde(default)]
    pub prompt_tokens: u32,
    #[serde(default)]
    pub completion_tokens: u32,
    #[serde(default)]
    pub total_tokens: u32,
}

pub struct LlmResult {
    pub content: String,
    pub usage: Option<Usage>,
    pub model: String,
    pub duration_ms: u64,
}

impl LlmResult {
    /// Token counts and latency for one finished call.
    pub fn log_usage(&self, call: &str) {
        let usage = self.usage.clone().unwrap_or_default();
        debug!(
            call,
            model = %self.model,
            prompt_tokens = usage.prompt_tokens,
            completion_tokens = usage.completion_tokens,
            duration_ms = self.duration_ms,
            "llm usage"
        );
    }
}

pub struct EmbedResult {
    pub embeddings: Vec<Vec<f32>>,
    pub usage: Option<Usage>,
}

#[derive(Deserialize)]
struct ChatResponse {
    #[serde(default)]
    choices: Vec<ChatChoice>,
    #[serde(default)]
    usage: Option<Usage>,
}

#[derive(Deserialize)]
struct ChatChoice {
    message: ResponseMessage,
}

#[derive(Deserialize)]
struct ResponseMessage {
    #[serde(default)]
    content: Option<String>,
}

/// Send one system + user exchange using the model configured for `component`.
/// The returned content is trimmed.
pub async fn llm_chat_as(
    cfg: &AiConfig,
    component: &str,
    system: &str,
    user: &str,
    temperature: f64,
) -> Result<LlmResult, PlotlineError> {
    let model = cfg.model_for(component).to_string();
    let req = ChatRequest {
        model: model.clone(),
        messages: vec![
            ChatMessage { role: "system".into(), content: system.into() },
            ChatMessage { role: "user".into(), content: user.into() },
        ],
        temperature,
    };

    let mut builder = cfg.client.post(&cfg.llm_url).json(&req);
    if !cfg.llm_key.is_empty() {
        builder = builder.header("Authorization", format!("Bearer {}", cfg.llm_key));
    }

    let start = std::time::Instant::now();
    let resp = builder
        .send()
        .await
        .map_err(|e| ai_err(format!("LLM request failed: {e}")))?;
    if !resp.status().is_success() {
        let status = resp.status();
        let body = resp.text().await.unwrap_or_default();
        return Err(ai_err(format!("LLM returned {status}: {body}")));
    }

    let chat: ChatResponse = resp
        .json()
        .await
        .map_err(|e| ai_err(format!("LLM response parse failed: {e}")))?;
    let duration_ms = start.elapsed().as_millis() as u64;
    let choice = chat
        .choices
        .into_iter()
        .next()
        .ok_or_else(|| ai_err("no choices in LLM response"))?;
    let content = choice
        .message
        .content
        .ok_or_else(|| ai_err("no content in LLM response"))?
        .trim()
        .to_string();
    Ok(LlmResult { content, usage: chat.usage, model, duration_ms })
}

#[derive(Serialize)]
struct EmbedRequest {
    model: String,
    input: Vec<String>,
}

#[derive(Deserialize)]
struct EmbedResponse {
    data: Vec<EmbedData>,
    #[serde(default)]
    usage: Option<Usage>,
}

#[derive(Deserialize)]
struct EmbedData {
    embedding: Vec<f32>,
}

/// Generate embeddings for one or more texts.
pub async fn get_embeddings(
    cfg: &AiConfig,
    texts: &[String],
) -> Result<EmbedResult, PlotlineError> {
    if texts.is_empty() {
        return Ok(EmbedResult { embeddings: vec![], usage: None });
    }

    let req = EmbedRequest {
        model: cfg.embed_model.clone(),
        input: texts.to_vec(),
    };

    let mut builder = cfg.client.post(&cfg.embed_url).json(&req);
    if !cfg.embed_key.is_empty() {
        builder = builder.header("Authorization", format!("Bearer {}", cfg.embed_key));
    }

    let resp = builder
        .send()
        .await
        .map_err(|e| ai_err(format!("embedding request failed: {e}")))?;
    if !resp.status().is_success() {
        let status = resp.status();
        let body = resp.text().await.unwrap_or_default();
        return Err(ai_err(format!("embedding API returned {status}: {body}")));
    }

    let embed_resp: EmbedResponse = resp
        .json()
        .await
        .map_err(|e| ai_err(format!("embedding response parse failed: {e}")))?;

    let embeddings: Vec<Vec<f32>> = embed_resp.data.into_iter().map(|d| d.embedding).collect();
    if embeddings.len() != texts.len() {
        return Err(ai_err(format!(
            "embedding count mismatch: sent {} texts, got {} embeddings",
            texts.len(),
            embeddings.len()
        )));
    }
    Ok(EmbedResult { embeddings, usage: embed_resp.usage })
}

/// Cosine similarity between two vectors.
pub fn cosine_similarity(a: &[f32], b: &[f32]) -> f64 {
    if a.len() != b.len() || a.is_empty() {
        return 0.0;
    }
    let (mut dot, mut na, mut nb) = (0.0f64, 0.0f64, 0.0f64);
    for (x, y) in a.iter().zip(b) {
        let (x, y) = (*x as f64, *y as f64);
        dot += x * y;
        na += x * x;
        nb += y * y;
    }
    let denom = na.sqrt() * nb.sqrt();
    if denom == 0.0 {
        0.0
    } else {
        dot / denom
    }
}
