mod memory;
mod sqlite;

pub use memory::MemoryConversationLog;
pub use sqlite::SqliteConversationLog;

use async_trait::async_trait;
use log::info;
use std::error::Error;
use std::sync::Arc;
use crate::cli::Args;
use crate::error::{ ConfigError, PersistenceError };
use crate::models::chat::ConversationRecord;

/// Append-only record of HTTP chat exchanges.
#[async_trait]
pub trait ConversationLog: Send + Sync {
    async fn record(
        &self,
        user_input: &str,
        bot_response: &str
    ) -> Result<ConversationRecord, PersistenceError>;

    /// Most recent records, newest first.
    async fn recent(&self, limit: usize) -> Result<Vec<ConversationRecord>, PersistenceError>;
}

pub fn create_conversation_log(
    args: &Args
) -> Result<Arc<dyn ConversationLog>, Box<dyn Error + Send + Sync>> {
    match args.history_type.to_lowercase().as_str() {
        "sqlite" => {
            info!("Conversation log will be stored in SQLite at {}", args.database_path);
            Ok(Arc::new(SqliteConversationLog::open(&args.database_path)?))
        }
        "memory" => {
            info!("Conversation log kept in memory; records are lost on exit");
            Ok(Arc::new(MemoryConversationLog::default()))
        }
        other =>
            Err(
                Box::new(
                    ConfigError::Invalid(format!("Unsupported history store type: {}", other))
                )
            ),
    }
}
