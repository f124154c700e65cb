//! SQLite-backed chat transcript store.
//!
//! Holds every user message and model reply, grouped by chat id, and
//! answers the two queries the chat client needs: the chat list (titled by
//! each chat's first message) and one chat's history.

mod schema;

use std::path::Path;
use std::sync::Mutex;

use chrono::{SecondsFormat, Utc};
use rusqlite::{Connection, params};
use serde::{Deserialize, Serialize};

use schema::{apply_schema, read_schema_version};

/// A chat in the chat list.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChatSummary {
    #[serde(rename = "Id")]
    pub id: String,
    /// First user message of the chat.
    pub title: String,
}

/// One question/answer pair of a chat's history.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChatExchange {
    pub question: String,
    pub answer: String,
    /// RFC 3339 creation time.
    pub time: String,
}

#[derive(Debug, thiserror::Error)]
pub enum ChatStoreError {
    #[error("SQLite error: {0}")]
    Sqlite(#[from] rusqlite::Error),

    #[error("I/O error: {0}")]
    Io(String),

    #[error("lock poisoned: {0}")]
    Lock(String),
}

impl From<ChatStoreError> for crate::error::BridgeError {
    fn from(e: ChatStoreError) -> Self {
        Self::Store(e.to_string())
    }
}

/// Chat transcript store. Thread-safe via an internal `Mutex<Connection>`.
pub struct ChatStore {
    conn: Mutex<Connection>,
}

impl std::fmt::Debug for ChatStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ChatStore").finish_non_exhaustive()
    }
}

impl ChatStore {
    /// Open (or create) the database at `path`, creating parent directories.
    pub fn open(path: &Path) -> Result<Self, ChatStoreError> {
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent).map_err(|e| ChatStoreError::Io(e.to_string()))?;
        }
        let conn = Connection::open(path)?;
        Self::with_connection(conn)
    }

    /// A private in-memory database.
    pub fn open_in_memory() -> Result<Self, ChatStoreError> {
        Self::with_connection(Connection::open_in_memory()?)
    }

    fn with_connection(conn: Connection) -> Result<Self, ChatStoreError> {
        apply_schema(&conn)?;
        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    /// Schema version stamped in the database.
    pub fn schema_version(&self) -> Result<Option<u32>, ChatStoreError> {
        let conn = self.lock()?;
        Ok(read_schema_version(&conn)?)
    }

    /// Record one exchange and return its message id.
    pub fn save_message(
        &self,
        chat_id: &str,
        user_message: &str,
        bot_reply: &str,
    ) -> Result<i64, ChatStoreError> {
        let conn = self.lock()?;
        let now = Utc::now().to_rfc3339_opts(SecondsFormat::Micros, true);
        conn.execute(
            "INSERT INTO messages (chat_id, user_message, bot_reply, created_at) \
             VALUES (?1, ?2, ?3, ?4)",
            params![chat_id, user_message, bot_reply, now],
        )?;
        Ok(conn.last_insert_rowid())
    }

    /// Every chat, titled by its first message, newest chat id first.
    pub fn list_chats(&self) -> Result<Vec<ChatSummary>, ChatStoreError> {
        let conn = self.lock()?;
        let mut stmt = conn.prepare(
            "WITH ranked AS ( \
                 SELECT chat_id, user_message, \
                        ROW_NUMBER() OVER (PARTITION BY chat_id ORDER BY created_at ASC, id ASC) AS rn \
                 FROM messages \
             ) \
             SELECT chat_id, user_message FROM ranked WHERE rn = 1 ORDER BY chat_id DESC",
        )?;
        let rows = stmt.query_map([], |row| {
            Ok(ChatSummary {
                id: row.get(0)?,
                title: row.get::<_, Option<String>>(1)?.unwrap_or_default(),
            })
        })?;

        let mut chats = Vec::new();
        for r in rows {
            chats.push(r?);
        }
        Ok(chats)
    }

    /// One chat's exchanges in the order they happened.
    pub fn chat_messages(&self, chat_id: &str) -> Result<Vec<ChatExchange>, ChatStoreError> {
        let conn = self.lock()?;
        let mut stmt = conn.prepare(
            "SELECT user_message, bot_reply, created_at FROM messages \
             WHERE chat_id = ?1 ORDER BY created_at ASC, id ASC",
        )?;
        let rows = stmt.query_map(params![chat_id], |row| {
            Ok(ChatExchange {
                question: row.get(0)?,
                answer: row.get(1)?,
                time: row.get(2)?,
            })
        })?;

        let mut messages = Vec::new();
        for r in rows {
            messages.push(r?);
        }
        Ok(messages)
    }

    fn lock(&self) -> Result<std::sync::MutexGuard<'_, Connection>, ChatStoreError> {
        self.conn
            .lock()
            .map_err(|e| ChatStoreError::Lock(e.to_string()))
    }
}
