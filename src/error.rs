#[derive(Debug, thiserror::Error)]
pub enum PlotlineError {
    #[error("AI not configured (set PLOTLINE_LLM_KEY or OPENAI_API_KEY)")]
    AiNotConfigured,

    #[error("AI backend error: {0}")]
    AiBackend(String),

    #[error("validation error: {0}")]
    Validation(String),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("json error: {0}")]
    Json(#[from] serde_json::Error),
}

impl PlotlineError {
    /// Process exit code for a fatal error surfaced from `main`.
    pub fn exit_code(&self) -> i32 {
        match self {
            Self::AiNotConfigured | Self::Validation(_) => 2,
            _ => 1,
        }
    }
}
