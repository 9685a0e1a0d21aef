//! SQLite-backed persistence for users and notes.
//!
//! Tables:
//! - `users`: user_id, user_name, user_email (unique), password, created_on, last_update
//! - `notes`: note_id, note_title, note_content, owner_id → users, created_on, last_update
//!
//! All note queries filter by `owner_id`; a note id belonging to another
//! owner behaves exactly like a missing id.

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use rusqlite::Connection;
use serde::Serialize;
use std::path::Path;
use thiserror::Error;

/// A registered user. `password_hash` holds the PHC string, never the
/// plaintext, and is skipped on serialization so it cannot leak into a
/// response body.
#[derive(Debug, Clone, Serialize)]
pub struct User {
    pub user_id: String,
    pub user_name: String,
    pub user_email: String,
    #[serde(skip_serializing)]
    pub password_hash: String,
    pub created_on: DateTime<Utc>,
    pub last_update: DateTime<Utc>,
}

/// A private note owned by exactly one user.
#[derive(Debug, Clone, Serialize)]
pub struct Note {
    pub note_id: String,
    pub note_title: String,
    pub note_content: String,
    pub owner_id: String,
    pub created_on: DateTime<Utc>,
    pub last_update: DateTime<Utc>,
}

/// Store-level failures. Duplicate email gets its own variant so callers can
/// map it onto a domain error without matching on SQLite message strings.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("email is already registered")]
    DuplicateEmail,
    #[error("database error: {0}")]
    Db(#[from] rusqlite::Error),
}

/// SQLite-backed user + note store.
pub struct NoteStore {
    conn: Mutex<Connection>,
}

impl NoteStore {
    /// Open (or create) the database at the given path.
    pub fn open(db_path: &Path) -> Result<Self> {
        let conn = Connection::open(db_path)
            .with_context(|| format!("failed to open database at {}", db_path.display()))?;
        Self::init(conn)
    }

    /// In-memory store. Used by tests; nothing survives the process.
    pub fn open_in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory().context("failed to open in-memory database")?;
        Self::init(conn)
    }

    fn init(conn: Connection) -> Result<Self> {
        // WAL mode for concurrent reads + crash safety
        conn.execute_batch(
            "PRAGMA journal_mode = WAL;
             PRAGMA synchronous = NORMAL;
             PRAGMA foreign_keys = ON;",
        )
        .context("failed to set database pragmas")?;

        conn.execute_batch(
            "CREATE TABLE IF NOT EXISTS users (
                user_id TEXT PRIMARY KEY,
                user_name TEXT NOT NULL,
                user_email TEXT NOT NULL UNIQUE,
                password TEXT NOT NULL,
                created_on TEXT NOT NULL,
                last_update TEXT NOT NULL
            );

            CREATE TABLE IF NOT EXISTS notes (
                note_id TEXT PRIMARY KEY,
                note_title TEXT NOT NULL,
                note_content TEXT NOT NULL,
                owner_id TEXT NOT NULL REFERENCES users(user_id),
                created_on TEXT NOT NULL,
                last_update TEXT NOT NULL
            );
            CREATE INDEX IF NOT EXISTS idx_notes_owner ON notes(owner_id);",
        )
        .context("failed to initialize database schema")?;

        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    // ── User operations ─────────────────────────────────────────────

    /// Insert a new user with a freshly generated id.
    /// Fails with [`StoreError::DuplicateEmail`] if the email is taken.
    pub fn create_user(
        &self,
        name: &str,
        email: &str,
        password_hash: &str,
    ) -> std::result::Result<User, StoreError> {
        let now = Utc::now();
        let user = User {
            user_id: uuid::Uuid::new_v4().to_string(),
            user_name: name.to_string(),
            user_email: email.to_string(),
            password_hash: password_hash.to_string(),
            created_on: now,
            last_update: now,
        };

        let conn = self.conn.lock();
        let result = conn.execute(
            "INSERT INTO users (user_id, user_name, user_email, password, created_on, last_update)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
            rusqlite::params![
                user.user_id,
                user.user_name,
                user.user_email,
                user.password_hash,
                user.created_on.to_rfc3339(),
                user.last_update.to_rfc3339(),
            ],
        );

        match result {
            Ok(_) => Ok(user),
            Err(rusqlite::Error::SqliteFailure(err, _))
                if err.code == rusqlite::ErrorCode::ConstraintViolation =>
            {
                Err(StoreError::DuplicateEmail)
            }
            Err(e) => Err(e.into()),
        }
    }

    /// Look up a user by email (the login key). Exact match.
    pub fn find_user_by_email(&self, email: &str) -> std::result::Result<Option<User>, StoreError> {
        let conn = self.conn.lock();
        let row = conn.query_row(
            "SELECT user_id, user_name, user_email, password, created_on, last_update
             FROM users WHERE user_email = ?1",
            rusqlite::params![email],
            user_from_row,
        );

        match row {
            Ok(user) => Ok(Some(user)),
            Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    /// Look up a user by id.
    pub fn find_user_by_id(&self, user_id: &str) -> std::result::Result<Option<User>, StoreError> {
        let conn = self.conn.lock();
        let row = conn.query_row(
            "SELECT user_id, user_name, user_email, password, created_on, last_update
             FROM users WHERE user_id = ?1",
            rusqlite::params![user_id],
            user_from_row,
        );

        match row {
            Ok(user) => Ok(Some(user)),
            Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    // ── Note operations ─────────────────────────────────────────────

    /// Insert a new note for the given owner.
    pub fn create_note(
        &self,
        owner_id: &str,
        title: &str,
        content: &str,
    ) -> std::result::Result<Note, StoreError> {
        let now = Utc::now();
        let note = Note {
            note_id: uuid::Uuid::new_v4().to_string(),
            note_title: title.to_string(),
            note_content: content.to_string(),
            owner_id: owner_id.to_string(),
            created_on: now,
            last_update: now,
        };

        let conn = self.conn.lock();
        conn.execute(
            "INSERT INTO notes (note_id, note_title, note_content, owner_id, created_on, last_update)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
            rusqlite::params![
                note.note_id,
                note.note_title,
                note.note_content,
                note.owner_id,
                note.created_on.to_rfc3339(),
                note.last_update.to_rfc3339(),
            ],
        )?;

        Ok(note)
    }

    /// All notes belonging to the owner, in creation order (oldest first).
    pub fn list_notes(&self, owner_id: &str) -> std::result::Result<Vec<Note>, StoreError> {
        let conn = self.conn.lock();
        let mut stmt = conn.prepare(
            "SELECT note_id, note_title, note_content, owner_id, created_on, last_update
             FROM notes WHERE owner_id = ?1 ORDER BY created_on, note_id",
        )?;
        let notes = stmt
            .query_map(rusqlite::params![owner_id], note_from_row)?
            .collect::<std::result::Result<Vec<_>, _>>()?;
        Ok(notes)
    }

    /// A single note by id, scoped to the owner. `None` if the id does not
    /// exist or belongs to someone else.
    pub fn get_note(
        &self,
        owner_id: &str,
        note_id: &str,
    ) -> std::result::Result<Option<Note>, StoreError> {
        let conn = self.conn.lock();
        read_note(&conn, owner_id, note_id)
    }

    /// Overwrite title/content and refresh `last_update`, preserving
    /// `created_on`. Returns the updated row, or `None` if no note with that
    /// id+owner exists.
    pub fn update_note(
        &self,
        owner_id: &str,
        note_id: &str,
        title: &str,
        content: &str,
    ) -> std::result::Result<Option<Note>, StoreError> {
        let conn = self.conn.lock();
        let changed = conn.execute(
            "UPDATE notes SET note_title = ?1, note_content = ?2, last_update = ?3
             WHERE note_id = ?4 AND owner_id = ?5",
            rusqlite::params![
                title,
                content,
                Utc::now().to_rfc3339(),
                note_id,
                owner_id
            ],
        )?;
        if changed == 0 {
            return Ok(None);
        }
        read_note(&conn, owner_id, note_id)
    }

    /// Remove a note, returning the removed row. Read and delete happen under
    /// one lock guard so the returned record is exactly what was deleted.
    pub fn delete_note(
        &self,
        owner_id: &str,
        note_id: &str,
    ) -> std::result::Result<Option<Note>, StoreError> {
        let conn = self.conn.lock();
        let Some(note) = read_note(&conn, owner_id, note_id)? else {
            return Ok(None);
        };
        conn.execute(
            "DELETE FROM notes WHERE note_id = ?1 AND owner_id = ?2",
            rusqlite::params![note_id, owner_id],
        )?;
        Ok(Some(note))
    }
}

// ── Row mapping ─────────────────────────────────────────────────────

fn read_note(
    conn: &Connection,
    owner_id: &str,
    note_id: &str,
) -> std::result::Result<Option<Note>, StoreError> {
    let row = conn.query_row(
        "SELECT note_id, note_title, note_content, owner_id, created_on, last_update
         FROM notes WHERE note_id = ?1 AND owner_id = ?2",
        rusqlite::params![note_id, owner_id],
        note_from_row,
    );

    match row {
        Ok(note) => Ok(Some(note)),
        Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
        Err(e) => Err(e.into()),
    }
}

fn user_from_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<User> {
    Ok(User {
        user_id: row.get(0)?,
        user_name: row.get(1)?,
        user_email: row.get(2)?,
        password_hash: row.get(3)?,
        created_on: parse_ts(&row.get::<_, String>(4)?),
        last_update: parse_ts(&row.get::<_, String>(5)?),
    })
}

fn note_from_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<Note> {
    Ok(Note {
        note_id: row.get(0)?,
        note_title: row.get(1)?,
        note_content: row.get(2)?,
        owner_id: row.get(3)?,
        created_on: parse_ts(&row.get::<_, String>(4)?),
        last_update: parse_ts(&row.get::<_, String>(5)?),
    })
}

/// Timestamps are RFC 3339 written by this store.
fn parse_ts(raw: &str) -> DateTime<Utc> {
    DateTime::parse_from_rfc3339(raw)
        .map(|dt| dt.with_timezone(&Utc))
        .unwrap_or_else(|_| Utc::now())
}

// ── Tests ───────────────────────────────────────────────────────────
