pub mod cli;
pub mod config;
pub mod dispatcher;
pub mod error;
pub mod history;
pub mod llm;
pub mod models;
pub mod server;
pub mod session;

use cli::Args;
use config::{ load_intents, Persona };
use dispatcher::Dispatcher;
use history::create_conversation_log;
use llm::chat::new_client as new_chat_client;
use llm::{ LlmConfig, LlmType };
use log::{ info, warn };
use server::Server;
use std::error::Error;
use std::sync::Arc;
use std::time::Duration;

fn build_llm_config(args: &Args) -> Result<LlmConfig, Box<dyn Error + Send + Sync>> {
    let llm_type: LlmType = args.chat_llm_type.parse()?;
    let api_key = if !args.chat_api_key.is_empty() { Some(args.chat_api_key.clone()) } else { None };
    Ok(LlmConfig {
        llm_type,
        api_key,
        completion_model: args.chat_model.clone(),
        base_url: args.chat_base_url.clone(),
        timeout: Duration::from_secs(args.chat_timeout_secs),
    })
}

pub async fn run(args: Args) -> Result<(), Box<dyn Error + Send + Sync>> {
    info!("--- Core Configuration ---");
    info!("HTTP Address: {}", args.http_addr);
    info!("Session Address: {}", args.session_addr.as_deref().unwrap_or("disabled"));
    info!("Intents Path: {}", args.intents_path);
    info!("History Store Type: {}", args.history_type);
    if args.history_type.eq_ignore_ascii_case("sqlite") {
        info!("Database Path: {}", args.database_path);
    }
    info!("Chat LLM Type: {}", args.chat_llm_type);
    info!("Persona: {} (sessions: {})", args.persona, args.session_persona);
    info!("TLS Enabled: {}", args.enable_tls);
    info!("-------------------------");

    if rustls::crypto::ring::default_provider().install_default().is_err() {
        warn!("A TLS crypto provider was already installed; keeping it.");
    }

    let intents = Arc::new(load_intents(&args.intents_path)?);
    if intents.is_empty() {
        warn!("Intent store is empty; every message will go to the LLM.");
    }

    let llm_config = build_llm_config(&args)?;
    let chat_client = new_chat_client(&llm_config)?;
    info!(
        "Chat client configured: Type={}, Model={}, BaseURL={}",
        llm_config.llm_type,
        chat_client.get_model(),
        chat_client.get_base_url().as_deref().unwrap_or("adapter default")
    );

    let persona: Persona = args.persona.parse()?;
    let session_persona: Persona = args.session_persona.parse()?;
    let mut api_dispatcher = Dispatcher::new(intents, chat_client, persona.system_prompt());
    if let Some(fallback) = args.fallback_reply.as_deref().filter(|f| !f.trim().is_empty()) {
        api_dispatcher = api_dispatcher.with_fallback(fallback);
    }
    let session_dispatcher = api_dispatcher.with_persona(session_persona.system_prompt());

    let conversation_log = create_conversation_log(&args)?;

    let server = Server::new(args, api_dispatcher, session_dispatcher, conversation_log);
    server.run().await?;

    Ok(())
}
