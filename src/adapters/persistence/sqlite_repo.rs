//! SQLite-backed bookkeeping via libsql. Implements MemberRepo, MessageRepo and EventLog.
//!
//! One database file (habot.db) in the data directory. Dates are stored as
//! `YYYY-MM-DD` text, message timestamps as milliseconds since the epoch.

use crate::domain::{DomainError, EventKind, Member, PrivateMessage};
use crate::ports::{EventLog, MemberRepo, MessageRepo};
use chrono::{DateTime, NaiveDate, Utc};
use libsql::{Database, Row, params};
use std::path::{Path, PathBuf};
use tracing::{debug, info};

const MEMBERS_TABLE: &str = r#"
CREATE TABLE IF NOT EXISTS members (
    id TEXT PRIMARY KEY,
    displayname TEXT NOT NULL DEFAULT '',
    loginname TEXT NOT NULL,
    created TEXT NOT NULL,
    lastlogin TEXT
)"#;

const MESSAGES_TABLE: &str = r#"
CREATE TABLE IF NOT EXISTS private_messages (
    id TEXT PRIMARY KEY,
    from_id TEXT NOT NULL,
    to_id TEXT NOT NULL,
    timestamp INTEGER NOT NULL,
    content TEXT NOT NULL DEFAULT '',
    reaction_pending INTEGER NOT NULL DEFAULT 0
)"#;
const MESSAGES_INDEX: &str =
    "CREATE INDEX IF NOT EXISTS idx_private_messages_to ON private_messages (to_id, timestamp DESC)";

/// Once-per-date actions. The primary key makes a repeated insert a no-op.
const HANDLED_EVENTS_TABLE: &str = r#"
CREATE TABLE IF NOT EXISTS handled_events (
    kind TEXT NOT NULL,
    subject_id TEXT NOT NULL,
    event_date TEXT NOT NULL,
    handled_at INTEGER NOT NULL,
    PRIMARY KEY (kind, subject_id, event_date)
)"#;

const DATE_FORMAT: &str = "%Y-%m-%d";

/// SQLite repository. The returned repo is safe to share via Arc.
pub struct SqliteRepo {
    db: Database,
    db_path: PathBuf,
}

impl SqliteRepo {
    /// Connect to (or create) `habot.db` in `base_dir` and ensure the schema exists.
    pub async fn connect(base_dir: impl AsRef<Path>) -> Result<Self, DomainError> {
        let base = base_dir.as_ref();
        std::fs::create_dir_all(base).map_err(|e| DomainError::Repo(e.to_string()))?;
        let db_path = base.join("habot.db");
        let path_str = db_path.to_string_lossy();
        let db = libsql::Builder::new_local(path_str.as_ref())
            .build()
            .await
            .map_err(|e| DomainError::Repo(e.to_string()))?;
        let conn = db.connect().map_err(|e| DomainError::Repo(e.to_string()))?;

        // PRAGMA returns a row; query and drain instead of execute.
        let mut wal_rows = conn
            .query("PRAGMA journal_mode=WAL", ())
            .await
            .map_err(|e| DomainError::Repo(format!("WAL pragma failed: {}", e)))?;
        while wal_rows
            .next()
            .await
            .map_err(|e| DomainError::Repo(e.to_string()))?
            .is_some()
        {}

        for ddl in [
            MEMBERS_TABLE,
            MESSAGES_TABLE,
            MESSAGES_INDEX,
            HANDLED_EVENTS_TABLE,
        ] {
            conn.execute(ddl, ())
                .await
                .map_err(|e| DomainError::Repo(e.to_string()))?;
        }

        info!(path = %db_path.display(), "SQLite connected");

        Ok(Self { db, db_path })
    }

    pub fn path(&self) -> &Path {
        &self.db_path
    }

    fn conn(&self) -> Result<libsql::Connection, DomainError> {
        self.db.connect().map_err(|e| DomainError::Repo(e.to_string()))
    }

    async fn query_members(
        &self,
        sql: &str,
        params: impl libsql::params::IntoParams,
    ) -> Result<Vec<Member>, DomainError> {
        let conn = self.conn()?;
        let mut rows = conn
            .query(sql, params)
            .await
            .map_err(|e| DomainError::Repo(e.to_string()))?;
        let mut members = Vec::new();
        while let Some(row) = rows
            .next()
            .await
            .map_err(|e| DomainError::Repo(e.to_string()))?
        {
            members.push(row_to_member(&row)?);
        }
        Ok(members)
    }
}

fn parse_date(value: &str) -> Result<NaiveDate, DomainError> {
    NaiveDate::parse_from_str(value, DATE_FORMAT)
        .map_err(|e| DomainError::Repo(format!("bad date `{}`: {}", value, e)))
}

fn format_date(date: NaiveDate) -> String {
    date.format(DATE_FORMAT).to_string()
}

fn row_to_member(row: &Row) -> Result<Member, DomainError> {
    let id: String = row.get(0).map_err(|e| DomainError::Repo(e.to_string()))?;
    let display_name: String = row.get::<String>(1).unwrap_or_default();
    let login_name: String = row.get(2).map_err(|e| DomainError::Repo(e.to_string()))?;
    let created: String = row.get(3).map_err(|e| DomainError::Repo(e.to_string()))?;
    let last_login: Option<String> = row.get::<String>(4).ok();
    Ok(Member {
        id,
        display_name,
        login_name,
        created: parse_date(&created)?,
        last_login: last_login.as_deref().map(parse_date).transpose()?,
    })
}

fn row_to_message(row: &Row) -> Result<PrivateMessage, DomainError> {
    let id: String = row.get(0).map_err(|e| DomainError::Repo(e.to_string()))?;
    let from_id: String = row.get(1).map_err(|e| DomainError::Repo(e.to_string()))?;
    let to_id: String = row.get(2).map_err(|e| DomainError::Repo(e.to_string()))?;
    let millis: i64 = row.get(3).map_err(|e| DomainError::Repo(e.to_string()))?;
    let content: String = row.get::<String>(4).unwrap_or_default();
    let timestamp = DateTime::<Utc>::from_timestamp_millis(millis)
        .ok_or_else(|| DomainError::Repo(format!("bad timestamp {} for message {}", millis, id)))?;
    Ok(PrivateMessage {
        id,
        from_id,
        to_id,
        timestamp,
        content,
    })
}

#[async_trait::async_trait]
impl MemberRepo for SqliteRepo {
    async fn list_members(&self) -> Result<Vec<Member>, DomainError> {
        self.query_members(
            "SELECT id, displayname, loginname, created, lastlogin FROM members ORDER BY loginname",
            (),
        )
        .await
    }

    async fn upsert_member(&self, member: &Member) -> Result<(), DomainError> {
        let conn = self.conn()?;
        conn.execute(
            r#"
            INSERT INTO members (id, displayname, loginname, created, lastlogin)
            VALUES (?1, ?2, ?3, ?4, ?5)
            ON CONFLICT (id) DO UPDATE SET
                displayname = excluded.displayname,
                loginname = excluded.loginname,
                created = excluded.created,
                lastlogin = excluded.lastlogin
            "#,
            params![
                member.id.as_str(),
                member.display_name.as_str(),
                member.login_name.as_str(),
                format_date(member.created),
                member.last_login.map(format_date)
            ],
        )
        .await
        .map_err(|e| DomainError::Repo(e.to_string()))?;
        Ok(())
    }

    async fn delete_member(&self, user_id: &str) -> Result<(), DomainError> {
        let conn = self.conn()?;
        conn.execute("DELETE FROM members WHERE id = ?1", params![user_id])
            .await
            .map_err(|e| DomainError::Repo(e.to_string()))?;
        Ok(())
    }

    async fn find_by_login_name(&self, login_name: &str) -> Result<Option<Member>, DomainError> {
        let login_name = login_name.trim().trim_start_matches('@');
        let mut found = self
            .query_members(
                r#"
                SELECT id, displayname, loginname, created, lastlogin
                FROM members
                WHERE lower(loginname) = lower(?1)
                "#,
                params![login_name],
            )
            .await?;
        Ok(found.pop())
    }

    async fn find_by_id(&self, user_id: &str) -> Result<Option<Member>, DomainError> {
        let mut found = self
            .query_members(
                "SELECT id, displayname, loginname, created, lastlogin FROM members WHERE id = ?1",
                params![user_id],
            )
            .await?;
        Ok(found.pop())
    }
}

#[async_trait::async_trait]
impl MessageRepo for SqliteRepo {
    async fn contains_message(&self, message_id: &str) -> Result<bool, DomainError> {
        let conn = self.conn()?;
        let mut rows = conn
            .query(
                "SELECT 1 FROM private_messages WHERE id = ?1",
                params![message_id],
            )
            .await
            .map_err(|e| DomainError::Repo(e.to_string()))?;
        Ok(rows
            .next()
            .await
            .map_err(|e| DomainError::Repo(e.to_string()))?
            .is_some())
    }

    async fn insert_message(
        &self,
        message: &PrivateMessage,
        reaction_pending: bool,
    ) -> Result<(), DomainError> {
        let conn = self.conn()?;
        conn.execute(
            r#"
            INSERT INTO private_messages (id, from_id, to_id, timestamp, content, reaction_pending)
            VALUES (?1, ?2, ?3, ?4, ?5, ?6)
            ON CONFLICT (id) DO NOTHING
            "#,
            params![
                message.id.as_str(),
                message.from_id.as_str(),
                message.to_id.as_str(),
                message.timestamp.timestamp_millis(),
                message.content.as_str(),
                reaction_pending as i64
            ],
        )
        .await
        .map_err(|e| DomainError::Repo(e.to_string()))?;
        debug!(id = %message.id, reaction_pending, "stored private message");
        Ok(())
    }

    async fn has_message_to_after(
        &self,
        to_id: &str,
        after: DateTime<Utc>,
    ) -> Result<bool, DomainError> {
        let conn = self.conn()?;
        let mut rows = conn
            .query(
                "SELECT 1 FROM private_messages WHERE to_id = ?1 AND timestamp > ?2 LIMIT 1",
                params![to_id, after.timestamp_millis()],
            )
            .await
            .map_err(|e| DomainError::Repo(e.to_string()))?;
        Ok(rows
            .next()
            .await
            .map_err(|e| DomainError::Repo(e.to_string()))?
            .is_some())
    }

    async fn pending_messages(&self) -> Result<Vec<PrivateMessage>, DomainError> {
        let conn = self.conn()?;
        let mut rows = conn
            .query(
                r#"
                SELECT id, from_id, to_id, timestamp, content
                FROM private_messages
                WHERE reaction_pending = 1
                ORDER BY timestamp ASC
                "#,
                (),
            )
            .await
            .map_err(|e| DomainError::Repo(e.to_string()))?;
        let mut messages = Vec::new();
        while let Some(row) = rows
            .next()
            .await
            .map_err(|e| DomainError::Repo(e.to_string()))?
        {
            messages.push(row_to_message(&row)?);
        }
        Ok(messages)
    }

    async fn set_reaction_pending(
        &self,
        message_id: &str,
        pending: bool,
    ) -> Result<(), DomainError> {
        let conn = self.conn()?;
        conn.execute(
            "UPDATE private_messages SET reaction_pending = ?1 WHERE id = ?2",
            params![pending as i64, message_id],
        )
        .await
        .map_err(|e| DomainError::Repo(e.to_string()))?;
        Ok(())
    }
}

#[async_trait::async_trait]
impl EventLog for SqliteRepo {
    async fn is_handled(
        &self,
        kind: EventKind,
        subject_id: &str,
        date: NaiveDate,
    ) -> Result<bool, DomainError> {
        let conn = self.conn()?;
        let mut rows = conn
            .query(
                r#"
                SELECT 1 FROM handled_events
                WHERE kind = ?1 AND subject_id = ?2 AND event_date = ?3
                "#,
                params![kind.as_str(), subject_id, format_date(date)],
            )
            .await
            .map_err(|e| DomainError::Repo(e.to_string()))?;
        Ok(rows
            .next()
            .await
            .map_err(|e| DomainError::Repo(e.to_string()))?
            .is_some())
    }

    async fn mark_handled(
        &self,
        kind: EventKind,
        subject_id: &str,
        date: NaiveDate,
    ) -> Result<(), DomainError> {
        let conn = self.conn()?;
        conn.execute(
            r#"
            INSERT INTO handled_events (kind, subject_id, event_date, handled_at)
            VALUES (?1, ?2, ?3, ?4)
            ON CONFLICT (kind, subject_id, event_date) DO NOTHING
            "#,
            params![
                kind.as_str(),
                subject_id,
                format_date(date),
                Utc::now().timestamp()
            ],
        )
        .await
        .map_err(|e| DomainError::Repo(e.to_string()))?;
        Ok(())
    }
}
