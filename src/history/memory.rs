use async_trait::async_trait;
use chrono::Utc;
use std::sync::Mutex;
use crate::error::PersistenceError;
use crate::history::ConversationLog;
use crate::models::chat::ConversationRecord;

#[derive(Default)]
pub struct MemoryConversationLog {
    records: Mutex<Vec<ConversationRecord>>,
}

#[async_trait]
impl ConversationLog for MemoryConversationLog {
    async fn record(
        &self,
        user_input: &str,
        bot_response: &str
    ) -> Result<ConversationRecord, PersistenceError> {
        let mut records = self.records.lock().map_err(|_| PersistenceError::Poisoned)?;
        let record = ConversationRecord {
            id: (records.len() as i64) + 1,
            user_input: user_input.to_string(),
            bot_response: bot_response.to_string(),
            timestamp: Utc::now(),
        };
        records.push(record.clone());
        Ok(record)
    }

    async fn recent(&self, limit: usize) -> Result<Vec<ConversationRecord>, PersistenceError> {
        let records = self.records.lock().map_err(|_| PersistenceError::Poisoned)?;
        Ok(records.iter().rev().take(limit).cloned().collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn assigns_sequential_ids_and_lists_newest_first() {
        let log = MemoryConversationLog::default();
        log.record("hi", "Hello!").await.unwrap();
        let second = log.record("bye", "See you!").await.unwrap();
        assert_eq!(second.id, 2);

        let recent = log.recent(10).await.unwrap();
        assert_eq!(recent.iter().map(|r| r.id).collect::<Vec<_>>(), vec![2, 1]);
        assert_eq!(log.recent(1).await.unwrap()[0].user_input, "bye");
    }
}
