use clap::Parser;

#[derive(Parser, Debug, Clone)]
#[command(author, version, about, long_about = None)]
pub struct Args {
    // --- Intent Store Args ---
    /// Path to the intents document ({"intents": [{tag, patterns, responses}]}).
    #[arg(long, env = "INTENTS_PATH", default_value = "data/intents.json")]
    pub intents_path: String,

    // --- History Store Args ---
    /// Conversation log backend (sqlite, memory)
    #[arg(long, env = "HISTORY_TYPE", default_value = "sqlite")]
    pub history_type: String,

    /// SQLite database file for the conversation log.
    #[arg(long, env = "DATABASE_PATH", default_value = "./chatbot.db")]
    pub database_path: String,

    /// Default number of records returned by GET /conversations.
    #[arg(long, env = "HISTORY_PAGE_SIZE", default_value = "20")]
    pub history_page_size: usize,

    // --- Chat LLM Provider Args ---
    /// Type of LLM provider for chat completion (openai, ollama)
    #[arg(long, env = "CHAT_LLM_TYPE", default_value = "openai")]
    pub chat_llm_type: String,

    /// Base URL for the Chat LLM provider API (e.g., http://localhost:11434 for Ollama)
    #[arg(long, env = "CHAT_BASE_URL")] // No default, let adapters handle defaults if None
    pub chat_base_url: Option<String>,

    /// API Key for the Chat LLM provider (required for OpenAI)
    #[arg(long, env = "CHAT_API_KEY", default_value = "", hide_env_values = true)]
    pub chat_api_key: String,

    /// Model name for chat completion (e.g., gpt-3.5-turbo, llama3)
    #[arg(long, env = "CHAT_MODEL")] // No default, rely on adapter defaults if None
    pub chat_model: Option<String>,

    /// Request timeout in seconds for LLM calls.
    #[arg(long, env = "CHAT_TIMEOUT_SECS", default_value = "60")]
    pub chat_timeout_secs: u64,

    // --- Reply Args ---
    /// System persona for the HTTP chat endpoint (assistant, villie)
    #[arg(long, env = "PERSONA", default_value = "assistant")]
    pub persona: String,

    /// System persona for interactive sessions (assistant, villie)
    #[arg(long, env = "SESSION_PERSONA", default_value = "villie")]
    pub session_persona: String,

    /// Reply returned when the LLM call fails.
    #[arg(long, env = "FALLBACK_REPLY")]
    pub fallback_reply: Option<String>,

    /// Prefix added to canned intent replies in interactive sessions. Empty disables it.
    #[arg(long, env = "SESSION_REPLY_PREFIX", default_value = "[RESPONSE PROTOCOL ACTIVATED] >> ")]
    pub session_reply_prefix: String,

    // --- Server Args ---
    /// Host address and port for the HTTP API.
    #[arg(long, env = "HTTP_ADDR", default_value = "0.0.0.0:8000")]
    pub http_addr: String,

    /// Host address and port for the interactive WebSocket session server. Disabled when unset.
    #[arg(long, env = "SESSION_ADDR")]
    pub session_addr: Option<String>,

    /// Allowed CORS origin for the HTTP API. "*" allows any origin.
    #[arg(long, env = "CORS_ORIGIN", default_value = "http://localhost:5173")]
    pub cors_origin: String,

    /// Optional API Key required for clients to open an interactive session.
    #[arg(long, env = "SERVER_API_KEY", hide_env_values = true)]
    pub server_api_key: Option<String>,

    /// Maximum new session connections accepted per second.
    #[arg(long, env = "SESSION_CONNECTIONS_PER_SECOND", default_value = "10")]
    pub session_connections_per_second: u32,

    /// Optional path to the TLS certificate file (PEM format). Requires --tls-key-path.
    #[arg(long, env = "TLS_CERT_PATH")]
    pub tls_cert_path: Option<String>,

    /// Optional path to the TLS private key file (PKCS#8 PEM format). Requires --tls-cert-path.
    #[arg(long, env = "TLS_KEY_PATH")]
    pub tls_key_path: Option<String>,

    #[arg(long, env = "ENABLE_TLS", default_value = "false")]
    pub enable_tls: bool,
}
