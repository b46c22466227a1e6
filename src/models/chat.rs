use chrono::{ DateTime, Local, Utc };
use serde::{ Serialize, Deserialize };

/// Wall-clock format used for transient session history.
pub const SESSION_TIMESTAMP_FORMAT: &str = "%Y%m%d%H%M%S";

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    User,
    Assistant,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChatMessage {
    pub role: Role,
    pub content: String,
    pub timestamp: String,
}

impl ChatMessage {
    pub fn now(role: Role, content: impl Into<String>) -> Self {
        Self {
            role,
            content: content.into(),
            timestamp: Local::now().format(SESSION_TIMESTAMP_FORMAT).to_string(),
        }
    }
}

/// One persisted exchange from the HTTP chat endpoint.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConversationRecord {
    pub id: i64,
    pub user_input: String,
    pub bot_response: String,
    pub timestamp: DateTime<Utc>,
}
