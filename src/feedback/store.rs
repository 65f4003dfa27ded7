//! SQLite-backed feedback store.
//!
//! One table:
//! - `feedback`: id, owner_id, display_name, contact_email, message, created_at
//!
//! `owner_id` is bound into every query. Callers never pass SQL fragments or
//! see rows they do not own.

use crate::error::{Error, Result};
use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use std::path::Path;

/// Maximum feedback message length, counted in characters.
pub const MAX_MESSAGE_CHARS: usize = 1_000;

/// A single feedback submission.
#[derive(Debug, Clone, serde::Serialize)]
pub struct FeedbackRecord {
    pub id: String,
    pub owner_id: String,
    pub display_name: String,
    pub contact_email: String,
    pub message: String,
    pub created_at: DateTime<Utc>,
}

/// SQLite-backed feedback store.
pub struct FeedbackStore {
    conn: Mutex<rusqlite::Connection>,
}

impl FeedbackStore {
    /// Open (or create) the feedback database at the given path.
    pub fn open(db_path: &Path) -> anyhow::Result<Self> {
        let conn = rusqlite::Connection::open(db_path)?;

        // WAL mode for concurrent reads + crash safety
        conn.execute_batch(
            "PRAGMA journal_mode = WAL;
             PRAGMA synchronous = NORMAL;
             PRAGMA busy_timeout = 5000;",
        )?;

        Self::init_schema(&conn)?;
        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    /// In-memory store (for tests).
    pub fn open_in_memory() -> anyhow::Result<Self> {
        let conn = rusqlite::Connection::open_in_memory()?;
        Self::init_schema(&conn)?;
        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    fn init_schema(conn: &rusqlite::Connection) -> anyhow::Result<()> {
        conn.execute_batch(
            "CREATE TABLE IF NOT EXISTS feedback (
                id TEXT PRIMARY KEY,
                owner_id TEXT NOT NULL,
                display_name TEXT NOT NULL,
                contact_email TEXT NOT NULL,
                message TEXT NOT NULL,
                created_at TEXT NOT NULL
            );
            CREATE INDEX IF NOT EXISTS idx_feedback_owner
                ON feedback(owner_id, created_at DESC);",
        )?;
        Ok(())
    }

    // ── Submission ──────────────────────────────────────────────────

    /// Store one feedback record for the given owner.
    pub fn submit(
        &self,
        owner_id: &str,
        display_name: &str,
        contact_email: &str,
        message: &str,
    ) -> Result<FeedbackRecord> {
        let display_name = display_name.trim();
        if display_name.is_empty() {
            return Err(Error::InvalidInput("display name cannot be empty".into()));
        }
        let contact_email = contact_email.trim();
        if contact_email.is_empty() {
            return Err(Error::InvalidInput("contact email cannot be empty".into()));
        }
        let message = message.trim();
        if message.is_empty() {
            return Err(Error::InvalidInput("message cannot be empty".into()));
        }
        if message.chars().count() > MAX_MESSAGE_CHARS {
            return Err(Error::InvalidInput(format!(
                "message too long (max {MAX_MESSAGE_CHARS} characters)"
            )));
        }

        let record = FeedbackRecord {
            id: uuid::Uuid::new_v4().to_string(),
            owner_id: owner_id.to_string(),
            display_name: display_name.to_string(),
            contact_email: contact_email.to_string(),
            message: message.to_string(),
            created_at: Utc::now(),
        };

        let conn = self.conn.lock();
        conn.execute(
            "INSERT INTO feedback (id, owner_id, display_name, contact_email, message, created_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
            rusqlite::params![
                record.id,
                record.owner_id,
                record.display_name,
                record.contact_email,
                record.message,
                record.created_at.to_rfc3339()
            ],
        )
        .map_err(|e| Error::Internal(e.into()))?;

        Ok(record)
    }

    // ── History ─────────────────────────────────────────────────────

    /// All records belonging to `owner_id`, newest first. An owner with no
    /// records (or an unknown owner) gets an empty list.
    pub fn list_for_owner(&self, owner_id: &str) -> Result<Vec<FeedbackRecord>> {
        let conn = self.conn.lock();
        let mut stmt = conn
            .prepare(
                "SELECT id, owner_id, display_name, contact_email, message, created_at
                 FROM feedback WHERE owner_id = ?1
                 ORDER BY created_at DESC, rowid DESC",
            )
            .map_err(|e| Error::Internal(e.into()))?;

        let rows = stmt
            .query_map(rusqlite::params![owner_id], record_from_row)
            .map_err(|e| Error::Internal(e.into()))?;

        let mut records = Vec::new();
        for row in rows {
            records.push(row.map_err(|e| Error::Internal(e.into()))?);
        }
        Ok(records)
    }
}

fn record_from_row(row: &rusqlite::Row) -> rusqlite::Result<FeedbackRecord> {
    Ok(FeedbackRecord {
        id: row.get(0)?,
        owner_id: row.get(1)?,
        display_name: row.get(2)?,
        contact_email: row.get(3)?,
        message: row.get(4)?,
        created_at: row
            .get::<_, String>(5)
            .ok()
            .and_then(|s| DateTime::parse_from_rfc3339(&s).ok())
            .map(|dt| dt.with_timezone(&Utc))
            .unwrap_or_else(Utc::now),
    })
}

// ── Tests ───────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    fn test_store() -> FeedbackStore {
        FeedbackStore::open_in_memory().unwrap()
    }

    #[test]
    fn submit_and_list_roundtrip() {
        let store = test_store();

        let record = store
            .submit("owner-1", "Test User", "test@example.com", "works great")
            .unwrap();
        assert!(!record.id.is_empty());

        let records = store.list_for_owner("owner-1").unwrap();
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].id, record.id);
        assert_eq!(records[0].message, "works great");
    }

    #[test]
    fn records_are_scoped_to_their_owner() {
        let store = test_store();

        store
            .submit("owner-1", "First", "first@example.com", "from the first")
            .unwrap();
        store
            .submit("owner-2", "Second", "second@example.com", "from the second")
            .unwrap();

        let first = store.list_for_owner("owner-1").unwrap();
        assert_eq!(first.len(), 1);
        assert_eq!(first[0].message, "from the first");

        let second = store.list_for_owner("owner-2").unwrap();
        assert_eq!(second.len(), 1);
        assert_eq!(second[0].message, "from the second");
    }

    #[test]
    fn history_is_newest_first() {
        let store = test_store();

        for n in 1..=3 {
            store
                .submit("owner-1", "Test User", "test@example.com", &format!("note {n}"))
                .unwrap();
        }

        let records = store.list_for_owner("owner-1").unwrap();
        let messages: Vec<&str> = records.iter().map(|r| r.message.as_str()).collect();
        assert_eq!(messages, ["note 3", "note 2", "note 1"]);
    }

    #[test]
    fn unknown_owner_lists_nothing() {
        let store = test_store();
        assert!(store.list_for_owner("nobody").unwrap().is_empty());
    }

    #[test]
    fn message_at_the_limit_is_accepted() {
        let store = test_store();
        let message = "x".repeat(MAX_MESSAGE_CHARS);
        assert!(store
            .submit("owner-1", "Test User", "test@example.com", &message)
            .is_ok());
    }

    #[test]
    fn message_over_the_limit_is_rejected() {
        let store = test_store();
        let message = "x".repeat(MAX_MESSAGE_CHARS + 1);
        let result = store.submit("owner-1", "Test User", "test@example.com", &message);
        assert!(matches!(result, Err(Error::InvalidInput(_))));
    }

    #[test]
    fn limit_counts_characters_not_bytes() {
        let store = test_store();
        // 1000 two-byte characters: within the character limit.
        let message = "é".repeat(MAX_MESSAGE_CHARS);
        assert!(store
            .submit("owner-1", "Test User", "test@example.com", &message)
            .is_ok());
    }

    #[test]
    fn blank_fields_are_rejected() {
        let store = test_store();
        let cases = [
            ("  ", "test@example.com", "hello"),
            ("Test User", "  ", "hello"),
            ("Test User", "test@example.com", "  "),
        ];
        for (name, email, message) in cases {
            let result = store.submit("owner-1", name, email, message);
            assert!(
                matches!(result, Err(Error::InvalidInput(_))),
                "accepted blank field: ({name:?}, {email:?}, {message:?})"
            );
        }
    }

    #[test]
    fn fields_are_trimmed_on_submit() {
        let store = test_store();
        let record = store
            .submit("owner-1", "  Test User  ", " test@example.com ", " hi ")
            .unwrap();
        assert_eq!(record.display_name, "Test User");
        assert_eq!(record.contact_email, "test@example.com");
        assert_eq!(record.message, "hi");
    }
}
