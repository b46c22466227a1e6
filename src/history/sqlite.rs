use async_trait::async_trait;
use chrono::{ DateTime, SecondsFormat, SubsecRound, Utc };
use log::{ debug, info };
use rusqlite::{ params, Connection, OptionalExtension };
use std::path::Path;
use std::sync::{ Arc, Mutex };
use crate::error::PersistenceError;
use crate::history::ConversationLog;
use crate::models::chat::ConversationRecord;

const MIGRATIONS: &[(&str, &str)] = &[
    ("001_conversations", include_str!("../../migrations/001_conversations.sql")),
];

pub struct SqliteConversationLog {
    db: Arc<Mutex<Connection>>,
}

impl SqliteConversationLog {
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self, PersistenceError> {
        let conn = Connection::open(path)?;
        conn.execute_batch("PRAGMA journal_mode=WAL;")?;
        Self::from_connection(conn)
    }

    pub fn open_in_memory() -> Result<Self, PersistenceError> {
        Self::from_connection(Connection::open_in_memory()?)
    }

    fn from_connection(conn: Connection) -> Result<Self, PersistenceError> {
        conn.execute_batch(
            "CREATE TABLE IF NOT EXISTS _migrations (
                id INTEGER PRIMARY KEY,
                name TEXT NOT NULL UNIQUE,
                applied_at TEXT NOT NULL DEFAULT (datetime('now'))
            );"
        )?;
        run_migrations(&conn)?;
        Ok(Self { db: Arc::new(Mutex::new(conn)) })
    }

    async fn with_conn<T, F>(&self, f: F) -> Result<T, PersistenceError>
        where T: Send + 'static, F: FnOnce(&Connection) -> Result<T, PersistenceError> + Send + 'static
    {
        let db = Arc::clone(&self.db);
        tokio::task
            ::spawn_blocking(move || {
                let conn = db.lock().map_err(|_| PersistenceError::Poisoned)?;
                f(&conn)
            }).await?
    }
}

fn run_migrations(conn: &Connection) -> Result<(), PersistenceError> {
    for (name, sql) in MIGRATIONS {
        let applied: Option<i64> = conn
            .query_row("SELECT id FROM _migrations WHERE name = ?1", params![name], |row| row.get(0))
            .optional()?;
        if applied.is_some() {
            debug!("Migration {} already applied", name);
            continue;
        }
        conn.execute_batch(sql)?;
        conn.execute("INSERT INTO _migrations (name) VALUES (?1)", params![name])?;
        info!("Applied migration {}", name);
    }
    Ok(())
}

fn parse_timestamp(raw: String) -> Result<DateTime<Utc>, PersistenceError> {
    DateTime::parse_from_rfc3339(&raw)
        .map(|ts| ts.with_timezone(&Utc))
        .map_err(|_| PersistenceError::Timestamp(raw))
}

#[async_trait]
impl ConversationLog for SqliteConversationLog {
    async fn record(
        &self,
        user_input: &str,
        bot_response: &str
    ) -> Result<ConversationRecord, PersistenceError> {
        let user_input = user_input.to_string();
        let bot_response = bot_response.to_string();
        self.with_conn(move |conn| {
            let timestamp = Utc::now().trunc_subsecs(3);
            conn.execute(
                "INSERT INTO conversations (user_input, bot_response, timestamp) VALUES (?1, ?2, ?3)",
                params![
                    user_input,
                    bot_response,
                    timestamp.to_rfc3339_opts(SecondsFormat::Millis, true)
                ]
            )?;
            Ok(ConversationRecord {
                id: conn.last_insert_rowid(),
                user_input,
                bot_response,
                timestamp,
            })
        }).await
    }

    async fn recent(&self, limit: usize) -> Result<Vec<ConversationRecord>, PersistenceError> {
        self.with_conn(move |conn| {
            let mut stmt = conn.prepare(
                "SELECT id, user_input, bot_response, timestamp FROM conversations ORDER BY id DESC LIMIT ?1"
            )?;
            let rows = stmt
                .query_map(params![limit as i64], |row| {
                    Ok((
                        row.get::<_, i64>(0)?,
                        row.get::<_, String>(1)?,
                        row.get::<_, String>(2)?,
                        row.get::<_, String>(3)?,
                    ))
                })?
                .collect::<Result<Vec<_>, _>>()?;

            rows.into_iter()
                .map(|(id, user_input, bot_response, raw_ts)| {
                    Ok(ConversationRecord {
                        id,
                        user_input,
                        bot_response,
                        timestamp: parse_timestamp(raw_ts)?,
                    })
                })
                .collect()
        }).await
    }
}
