//! SQLite-backed redirection store.

use std::path::Path;
use std::sync::{Mutex, MutexGuard};

use chrono::{DateTime, Utc};
use rusqlite::{params, Connection, OptionalExtension};
use tracing::info;

use multifeed_types::{ChannelRef, FilterPolicy, OwnerId, Redirection, RedirectionId, Transformation};

use crate::{RedirectionStore, StoreError};

/// Separator for the filter word lists, kept compatible with the legacy
/// database format.
const WORD_SEPARATOR: &str = "<stop_word>";

/// A durable [`RedirectionStore`] backed by SQLite in WAL mode.
///
/// `AUTOINCREMENT` on the redirections table guarantees ids are never
/// reassigned after removal.
pub struct SqliteStore {
    conn: Mutex<Connection>,
}

impl SqliteStore {
    /// Open (or create) the database at the given path.
    ///
    /// Enables WAL mode and creates the schema if it does not exist.
    pub fn open(path: &Path) -> Result<Self, StoreError> {
        let conn = Connection::open(path)
            .map_err(|e| StoreError::Database(format!("failed to open database: {e}")))?;
        Self::init(conn, &path.display().to_string())
    }

    /// Open an in-memory database. Used by tests.
    pub fn open_in_memory() -> Result<Self, StoreError> {
        let conn = Connection::open_in_memory()
            .map_err(|e| StoreError::Database(format!("failed to open database: {e}")))?;
        Self::init(conn, ":memory:")
    }

    fn init(conn: Connection, location: &str) -> Result<Self, StoreError> {
        conn.pragma_update(None, "journal_mode", "WAL")
            .map_err(|e| StoreError::Database(format!("failed to set WAL mode: {e}")))?;

        conn.execute_batch(
            "CREATE TABLE IF NOT EXISTS users (
                chat_id INTEGER PRIMARY KEY,
                username TEXT,
                referral_seed INTEGER NOT NULL,
                created_at TEXT NOT NULL
            );

            CREATE TABLE IF NOT EXISTS redirections (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                owner INTEGER NOT NULL,
                source_chat INTEGER NOT NULL,
                source_ref TEXT NOT NULL,
                source_title TEXT NOT NULL,
                destination_chat INTEGER NOT NULL,
                destination_ref TEXT NOT NULL,
                destination_title TEXT NOT NULL,
                active INTEGER NOT NULL DEFAULT 0,
                created_at TEXT NOT NULL
            );
            CREATE UNIQUE INDEX IF NOT EXISTS idx_owner_pair
                ON redirections(owner, source_chat, destination_chat);
            CREATE INDEX IF NOT EXISTS idx_owner ON redirections(owner);

            CREATE TABLE IF NOT EXISTS filters (
                redirection_id INTEGER PRIMARY KEY,
                audio INTEGER NOT NULL DEFAULT 1,
                video INTEGER NOT NULL DEFAULT 1,
                photo INTEGER NOT NULL DEFAULT 1,
                sticker INTEGER NOT NULL DEFAULT 1,
                document INTEGER NOT NULL DEFAULT 1,
                hashtag INTEGER NOT NULL DEFAULT 1,
                link INTEGER NOT NULL DEFAULT 1,
                contain TEXT,
                not_contain TEXT
            );

            CREATE TABLE IF NOT EXISTS transformations (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                redirection_id INTEGER NOT NULL,
                rank INTEGER NOT NULL,
                old_phrase TEXT NOT NULL,
                new_phrase TEXT NOT NULL
            );
            CREATE INDEX IF NOT EXISTS idx_transformation_redirection
                ON transformations(redirection_id);",
        )
        .map_err(|e| StoreError::Database(format!("failed to create schema: {e}")))?;

        info!(location, "redirection store opened");

        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    fn conn(&self) -> Result<MutexGuard<'_, Connection>, StoreError> {
        self.conn
            .lock()
            .map_err(|_| StoreError::Database("connection mutex poisoned".into()))
    }

    fn load_filter(
        conn: &Connection,
        id: RedirectionId,
    ) -> Result<Option<FilterPolicy>, StoreError> {
        conn.query_row(
            "SELECT audio, video, photo, sticker, document, hashtag, link, contain, not_contain
             FROM filters WHERE redirection_id = ?1",
            params![id.as_i64()],
            |row| {
                Ok(FilterPolicy {
                    audio: row.get(0)?,
                    video: row.get(1)?,
                    photo: row.get(2)?,
                    sticker: row.get(3)?,
                    document: row.get(4)?,
                    hashtag: row.get(5)?,
                    link: row.get(6)?,
                    contain: split_words(row.get::<_, Option<String>>(7)?),
                    not_contain: split_words(row.get::<_, Option<String>>(8)?),
                })
            },
        )
        .optional()
        .map_err(StoreError::from)
    }

    fn load_transformations(
        conn: &Connection,
        id: RedirectionId,
    ) -> Result<Vec<Transformation>, StoreError> {
        let mut stmt = conn.prepare(
            "SELECT id, rank, old_phrase, new_phrase FROM transformations
             WHERE redirection_id = ?1 ORDER BY rank ASC",
        )?;
        let rows = stmt.query_map(params![id.as_i64()], |row| {
            Ok(Transformation {
                id: row.get(0)?,
                rank: row.get(1)?,
                old_phrase: row.get(2)?,
                new_phrase: row.get(3)?,
            })
        })?;
        rows.collect::<Result<Vec<_>, _>>().map_err(StoreError::from)
    }

    fn load_redirection(row: &rusqlite::Row<'_>) -> rusqlite::Result<Redirection> {
        let id = RedirectionId::new(row.get(0)?);
        let created_at: String = row.get(9)?;
        let created_at = DateTime::parse_from_rfc3339(&created_at)
            .map_err(|e| {
                rusqlite::Error::FromSqlConversionFailure(
                    9,
                    rusqlite::types::Type::Text,
                    Box::new(e),
                )
            })?
            .with_timezone(&Utc);

        // Extension data is attached afterwards; rows cannot run nested
        // queries on the same statement.
        Ok(Redirection {
            id,
            owner: OwnerId::new(row.get(1)?),
            source: ChannelRef {
                chat_id: row.get(2)?,
                reference: row.get(3)?,
                title: row.get(4)?,
            },
            destination: ChannelRef {
                chat_id: row.get(5)?,
                reference: row.get(6)?,
                title: row.get(7)?,
            },
            active: row.get(8)?,
            created_at,
            filter: None,
            transformations: Vec::new(),
        })
    }

    fn attach_extensions(
        conn: &Connection,
        mut redirection: Redirection,
    ) -> Result<Redirection, StoreError> {
        redirection.filter = Self::load_filter(conn, redirection.id)?;
        redirection.transformations = Self::load_transformations(conn, redirection.id)?;
        Ok(redirection)
    }
}

const SELECT_COLUMNS: &str = "id, owner, source_chat, source_ref, source_title, \
     destination_chat, destination_ref, destination_title, active, created_at";

impl RedirectionStore for SqliteStore {
    fn create_user(
        &self,
        chat_id: i64,
        username: Option<&str>,
        referral_seed: i64,
    ) -> Result<(), StoreError> {
        let conn = self.conn()?;
        conn.execute(
            "INSERT INTO users (chat_id, username, referral_seed, created_at)
             VALUES (?1, ?2, ?3, ?4)
             ON CONFLICT(chat_id) DO UPDATE SET username = excluded.username",
            params![chat_id, username, referral_seed, Utc::now().to_rfc3339()],
        )?;
        Ok(())
    }

    fn create_redirection(
        &self,
        owner: OwnerId,
        source: &ChannelRef,
        destination: &ChannelRef,
    ) -> Result<Redirection, StoreError> {
        let conn = self.conn()?;
        let created_at = Utc::now();
        conn.execute(
            "INSERT INTO redirections (owner, source_chat, source_ref, source_title,
                 destination_chat, destination_ref, destination_title, active, created_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, 0, ?8)",
            params![
                owner.as_i64(),
                source.chat_id,
                source.reference,
                source.title,
                destination.chat_id,
                destination.reference,
                destination.title,
                created_at.to_rfc3339(),
            ],
        )?;
        let id = RedirectionId::new(conn.last_insert_rowid());

        Ok(Redirection {
            id,
            owner,
            source: source.clone(),
            destination: destination.clone(),
            active: false,
            created_at,
            filter: None,
            transformations: Vec::new(),
        })
    }

    fn find_redirection(
        &self,
        owner: OwnerId,
        id: RedirectionId,
    ) -> Result<Option<Redirection>, StoreError> {
        let conn = self.conn()?;
        let row = conn
            .query_row(
                &format!("SELECT {SELECT_COLUMNS} FROM redirections WHERE owner = ?1 AND id = ?2"),
                params![owner.as_i64(), id.as_i64()],
                |row| Self::load_redirection(row),
            )
            .optional()?;

        match row {
            Some(r) => Ok(Some(Self::attach_extensions(&conn, r)?)),
            None => Ok(None),
        }
    }

    fn find_duplicate(
        &self,
        owner: OwnerId,
        source_chat: i64,
        destination_chat: i64,
    ) -> Result<Option<Redirection>, StoreError> {
        let conn = self.conn()?;
        let row = conn
            .query_row(
                &format!(
                    "SELECT {SELECT_COLUMNS} FROM redirections
                     WHERE owner = ?1 AND source_chat = ?2 AND destination_chat = ?3"
                ),
                params![owner.as_i64(), source_chat, destination_chat],
                |row| Self::load_redirection(row),
            )
            .optional()?;

        match row {
            Some(r) => Ok(Some(Self::attach_extensions(&conn, r)?)),
            None => Ok(None),
        }
    }

    fn set_active(&self, id: RedirectionId, active: bool) -> Result<(), StoreError> {
        let conn = self.conn()?;
        let updated = conn.execute(
            "UPDATE redirections SET active = ?1 WHERE id = ?2",
            params![active, id.as_i64()],
        )?;
        if updated == 0 {
            return Err(StoreError::Gone(id));
        }
        Ok(())
    }

    fn delete_redirection(&self, id: RedirectionId) -> Result<(), StoreError> {
        let conn = self.conn()?;
        conn.execute(
            "DELETE FROM transformations WHERE redirection_id = ?1",
            params![id.as_i64()],
        )?;
        conn.execute(
            "DELETE FROM filters WHERE redirection_id = ?1",
            params![id.as_i64()],
        )?;
        conn.execute("DELETE FROM redirections WHERE id = ?1", params![id.as_i64()])?;
        Ok(())
    }

    fn list_redirections(&self, owner: OwnerId) -> Result<Vec<Redirection>, StoreError> {
        let conn = self.conn()?;
        let mut stmt = conn.prepare(&format!(
            "SELECT {SELECT_COLUMNS} FROM redirections WHERE owner = ?1 ORDER BY id ASC"
        ))?;
        let rows = stmt.query_map(params![owner.as_i64()], |row| {
            Self::load_redirection(row)
        })?;
        let redirections = rows.collect::<Result<Vec<_>, _>>()?;

        redirections
            .into_iter()
            .map(|r| Self::attach_extensions(&conn, r))
            .collect()
    }
}

fn split_words(raw: Option<String>) -> Vec<String> {
    match raw {
        Some(s) if !s.is_empty() => s.split(WORD_SEPARATOR).map(str::to_string).collect(),
        _ => Vec::new(),
    }
}
