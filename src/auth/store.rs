//! SQLite-backed account store.
//!
//! One table:
//! - `accounts`: id, username (UNIQUE), email (UNIQUE), password_hash,
//!   theme_preference, created_at
//!
//! Uniqueness lives in the UNIQUE constraints, so two racing registrations
//! of the same name resolve inside SQLite: exactly one INSERT succeeds and
//! the loser surfaces as `DuplicateIdentity`. There is no pre-check SELECT.

use crate::auth::password::PasswordHasher;
use crate::error::{Error, Result};
use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use std::path::Path;

/// Maximum username length (characters).
const MAX_USERNAME_CHARS: usize = 64;

/// Minimum password length (characters).
const MIN_PASSWORD_CHARS: usize = 8;

/// A registered account. Carries no password material; digests never leave
/// the `accounts` table.
#[derive(Debug, Clone, serde::Serialize)]
pub struct Account {
    pub id: String,
    pub username: String,
    pub email: String,
    pub theme_preference: Option<String>,
    pub created_at: DateTime<Utc>,
}

/// SQLite-backed credential store.
pub struct AccountStore {
    conn: Mutex<rusqlite::Connection>,
    hasher: PasswordHasher,
}

impl AccountStore {
    /// Open (or create) the account database at the given path.
    pub fn open(db_path: &Path, hasher: PasswordHasher) -> anyhow::Result<Self> {
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
            hasher,
        })
    }

    /// In-memory store (for tests).
    pub fn open_in_memory(hasher: PasswordHasher) -> anyhow::Result<Self> {
        let conn = rusqlite::Connection::open_in_memory()?;
        Self::init_schema(&conn)?;
        Ok(Self {
            conn: Mutex::new(conn),
            hasher,
        })
    }

    fn init_schema(conn: &rusqlite::Connection) -> anyhow::Result<()> {
        conn.execute_batch(
            "CREATE TABLE IF NOT EXISTS accounts (
                id TEXT PRIMARY KEY,
                username TEXT NOT NULL UNIQUE,
                email TEXT NOT NULL UNIQUE,
                password_hash TEXT NOT NULL,
                theme_preference TEXT,
                created_at TEXT NOT NULL
            );",
        )?;
        Ok(())
    }

    // ── Registration ────────────────────────────────────────────────

    /// Create a new account. Validates input, hashes the password, and
    /// lets the UNIQUE constraints arbitrate duplicates.
    pub fn register(&self, username: &str, email: &str, password: &str) -> Result<Account> {
        let username = username.trim();
        if username.is_empty() {
            return Err(Error::InvalidInput("username cannot be empty".into()));
        }
        if username.chars().count() > MAX_USERNAME_CHARS {
            return Err(Error::InvalidInput(format!(
                "username too long (max {MAX_USERNAME_CHARS} characters)"
            )));
        }
        // Usernames never contain '@' and valid emails always do, so a
        // login identifier matches at most one column.
        if username.contains('@') {
            return Err(Error::InvalidInput("username cannot contain '@'".into()));
        }
        let email = email.trim();
        if email.is_empty() {
            return Err(Error::InvalidInput("email cannot be empty".into()));
        }
        if !is_plausible_email(email) {
            return Err(Error::InvalidInput("email address is not valid".into()));
        }
        if password.chars().count() < MIN_PASSWORD_CHARS {
            return Err(Error::InvalidInput(format!(
                "password must be at least {MIN_PASSWORD_CHARS} characters"
            )));
        }

        let id = uuid::Uuid::new_v4().to_string();
        let password_hash = self.hasher.hash(password);
        let created_at = Utc::now();

        let conn = self.conn.lock();
        let result = conn.execute(
            "INSERT INTO accounts (id, username, email, password_hash, theme_preference, created_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
            rusqlite::params![
                id,
                username,
                email,
                password_hash,
                None::<String>,
                created_at.to_rfc3339()
            ],
        );

        match result {
            Ok(_) => Ok(Account {
                id,
                username: username.to_string(),
                email: email.to_string(),
                theme_preference: None,
                created_at,
            }),
            Err(rusqlite::Error::SqliteFailure(err, _))
                if err.code == rusqlite::ErrorCode::ConstraintViolation =>
            {
                Err(Error::DuplicateIdentity)
            }
            Err(e) => Err(Error::Internal(e.into())),
        }
    }

    // ── Authentication ──────────────────────────────────────────────

    /// Authenticate by username or email plus password. Unknown identifier
    /// and wrong password return the same error, and the unknown path burns
    /// a dummy digest computation so its timing is comparable.
    pub fn authenticate(&self, identifier: &str, password: &str) -> Result<Account> {
        let identifier = identifier.trim();

        // Lock scope covers the lookup only; key stretching happens after.
        let row = {
            let conn = self.conn.lock();
            conn.query_row(
                "SELECT id, username, email, theme_preference, created_at, password_hash
                 FROM accounts WHERE username = ?1 OR email = ?1",
                rusqlite::params![identifier],
                |row| Ok((account_from_row(row)?, row.get::<_, String>(5)?)),
            )
        };

        match row {
            Ok((account, stored_digest)) => {
                if !self.hasher.verify(password, &stored_digest) {
                    return Err(Error::InvalidCredentials);
                }
                Ok(account)
            }
            Err(rusqlite::Error::QueryReturnedNoRows) => {
                self.hasher.burn(password);
                Err(Error::InvalidCredentials)
            }
            Err(e) => Err(Error::Internal(e.into())),
        }
    }

    /// Look up an account by id. `Ok(None)` when it does not exist.
    pub fn find_by_id(&self, account_id: &str) -> Result<Option<Account>> {
        let conn = self.conn.lock();
        let row = conn.query_row(
            "SELECT id, username, email, theme_preference, created_at
             FROM accounts WHERE id = ?1",
            rusqlite::params![account_id],
            account_from_row,
        );

        match row {
            Ok(account) => Ok(Some(account)),
            Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
            Err(e) => Err(Error::Internal(e.into())),
        }
    }
}

fn account_from_row(row: &rusqlite::Row) -> rusqlite::Result<Account> {
    Ok(Account {
        id: row.get(0)?,
        username: row.get(1)?,
        email: row.get(2)?,
        theme_preference: row.get(3)?,
        created_at: row
            .get::<_, String>(4)
            .ok()
            .and_then(|s| DateTime::parse_from_rfc3339(&s).ok())
            .map(|dt| dt.with_timezone(&Utc))
            .unwrap_or_else(Utc::now),
    })
}

/// Light shape check: `local@domain.tld`, no whitespace. Anything deeper
/// is the job of a verification email, which is out of scope.
fn is_plausible_email(email: &str) -> bool {
    if email.len() > 254 || email.contains(char::is_whitespace) {
        return false;
    }
    let Some((local, domain)) = email.split_once('@') else {
        return false;
    };
    !local.is_empty()
        && !domain.is_empty()
        && !domain.contains('@')
        && domain.contains('.')
        && !domain.starts_with('.')
        && !domain.ends_with('.')
}

// ── Tests ───────────────────────────────────────────────────────────
