use clap::{Parser, ValueEnum};

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum Backend {
    /// Offline echo backend, every capability present.
    Stub,
    /// OpenAI-compatible model server (llama.cpp, vLLM, Ollama).
    Openai,
}

#[derive(Debug, Parser)]
#[command(name = "chakwrite-broker", about = "ChakWrite background broker")]
pub struct Args {
    #[arg(long, env = "CHAKWRITE_BROKER_ADDR", default_value = "127.0.0.1:18470")]
    pub listen_addr: String,

    /// JSON file holding the user configuration.
    #[arg(long, env = "CHAKWRITE_CONFIG_PATH", default_value = "chakwrite-config.json")]
    pub config_path: String,

    #[arg(long, env = "CHAKWRITE_REQUEST_TIMEOUT_MS", default_value_t = 15_000)]
    pub request_timeout_ms: u64,

    #[arg(long, env = "CHAKWRITE_BACKEND", value_enum, default_value_t = Backend::Stub)]
    pub backend: Backend,

    #[arg(long, env = "CHAKWRITE_BACKEND_URL", default_value = "http://127.0.0.1:8080")]
    pub backend_url: String,

    #[arg(long, env = "CHAKWRITE_BACKEND_MODEL", default_value = "local")]
    pub backend_model: String,

    /// dedicated-first | generic-first
    #[arg(long, env = "CHAKWRITE_FALLBACK_ORDER", default_value = "dedicated-first")]
    pub fallback_order: String,

    /// text | json
    #[arg(long, env = "CHAKWRITE_LOG_FORMAT", default_value = "text")]
    pub log_format: String,

    #[arg(long, env = "OTLP_URL")]
    pub otlp_url: Option<String>,

    #[arg(long, env = "OTLP_TOKEN")]
    pub otlp_token: Option<String>,
}
