mod schema;

use std::path::PathBuf;
use std::sync::{Arc, Mutex};

use anyhow::Result;
use chrono::{DateTime, Utc};
use rusqlite::types::Type;
use rusqlite::{Connection, Row};
use uuid::Uuid;

use crate::error::DiscussionError;
use crate::models::*;

const DISCUSSION_COLUMNS: &str =
    "d.id, d.task_comment_id, d.time_started, d.time_completed, d.created_at, d.updated_at";

pub struct Database {
    conn: Arc<Mutex<Connection>>,
}

impl Database {
    pub fn open(path: PathBuf) -> Result<Self> {
        let parent = path
            .parent()
            .ok_or_else(|| anyhow::anyhow!("Database path has no parent directory"))?;
        std::fs::create_dir_all(parent)?;
        let conn = Connection::open(&path)?;
        conn.pragma_update(None, "journal_mode", "WAL")?;
        conn.pragma_update(None, "foreign_keys", "ON")?;
        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
        })
    }

    pub fn open_default() -> Result<Self> {
        let dirs = directories::ProjectDirs::from("", "", "discussion-prompts")
            .ok_or_else(|| anyhow::anyhow!("Could not determine data directory"))?;
        Self::open(dirs.data_dir().join("discussions.db"))
    }

    pub fn open_memory() -> Result<Self> {
        let conn = Connection::open_in_memory()?;
        conn.pragma_update(None, "foreign_keys", "ON")?;
        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
        })
    }

    pub fn migrate(&self) -> Result<()> {
        let conn = self.conn.lock().expect("database lock poisoned");
        schema::run_migrations(&conn)
    }

    // ============================================================
    // Task comment operations
    // ============================================================

    pub fn create_task_comment(&self, input: CreateTaskCommentInput) -> Result<TaskComment> {
        if input.author.trim().is_empty() {
            return Err(DiscussionError::Validation("author must not be empty".to_string()).into());
        }

        let conn = self.conn.lock().expect("database lock poisoned");
        let id = Uuid::new_v4();
        let now = Utc::now();

        conn.execute(
            "INSERT INTO task_comments (id, task_id, author, content, created_at)
             VALUES (?, ?, ?, ?, ?)",
            (
                id.to_string(),
                input.task_id.to_string(),
                &input.author,
                &input.content,
                now.to_rfc3339(),
            ),
        )?;

        Ok(TaskComment {
            id,
            task_id: input.task_id,
            author: input.author,
            content: input.content,
            created_at: now,
        })
    }

    pub fn get_task_comment(&self, id: Uuid) -> Result<Option<TaskComment>> {
        let conn = self.conn.lock().expect("database lock poisoned");
        let mut stmt = conn.prepare(
            "SELECT id, task_id, author, content, created_at
             FROM task_comments WHERE id = ?",
        )?;

        let mut rows = stmt.query([id.to_string()])?;
        if let Some(row) = rows.next()? {
            Ok(Some(task_comment_from_row(row)?))
        } else {
            Ok(None)
        }
    }

    pub fn get_task_comments_by_task(&self, task_id: Uuid) -> Result<Vec<TaskComment>> {
        let conn = self.conn.lock().expect("database lock poisoned");
        let mut stmt = conn.prepare(
            "SELECT id, task_id, author, content, created_at
             FROM task_comments WHERE task_id = ? ORDER BY created_at",
        )?;

        let comments = stmt
            .query_map([task_id.to_string()], task_comment_from_row)?
            .collect::<Result<Vec<_>, _>>()?;

        Ok(comments)
    }

    // ============================================================
    // Discussion comment operations
    // ============================================================

    /// Annotate a task comment as a discussion.
    ///
    /// Fails with [`DiscussionError::Validation`] if the task comment does not
    /// exist or already has a discussion. Nothing is written in either case.
    pub fn create_discussion_comment(&self, task_comment_id: Uuid) -> Result<DiscussionComment> {
        let conn = self.conn.lock().expect("database lock poisoned");

        if !task_comment_exists(&conn, task_comment_id)? {
            return Err(
                DiscussionError::Validation("task comment must exist".to_string()).into(),
            );
        }
        if find_discussion(&conn, "d.task_comment_id = ?", task_comment_id)?.is_some() {
            return Err(already_discussed().into());
        }

        let now = Utc::now();
        let discussion = DiscussionComment {
            id: Uuid::new_v4(),
            task_comment_id,
            state: DiscussionState::NotStarted,
            created_at: now,
            updated_at: now,
        };
        insert_discussion(&conn, &discussion)?;

        Ok(discussion)
    }

    pub fn get_discussion_comment(&self, id: Uuid) -> Result<Option<DiscussionComment>> {
        let conn = self.conn.lock().expect("database lock poisoned");
        find_discussion(&conn, "d.id = ?", id)
    }

    pub fn get_discussion_for_task_comment(
        &self,
        task_comment_id: Uuid,
    ) -> Result<Option<DiscussionComment>> {
        let conn = self.conn.lock().expect("database lock poisoned");
        find_discussion(&conn, "d.task_comment_id = ?", task_comment_id)
    }

    /// All discussions on comments left on a task, oldest first.
    pub fn get_discussions_by_task(&self, task_id: Uuid) -> Result<Vec<DiscussionComment>> {
        let conn = self.conn.lock().expect("database lock poisoned");
        let mut stmt = conn.prepare(&format!(
            "SELECT {} FROM discussion_comments d
             JOIN task_comments c ON c.id = d.task_comment_id
             WHERE c.task_id = ? ORDER BY d.created_at",
            DISCUSSION_COLUMNS
        ))?;

        let discussions = stmt
            .query_map([task_id.to_string()], discussion_from_row)?
            .collect::<Result<Vec<_>, _>>()?;

        Ok(discussions)
    }

    /// Persist a discussion's lifecycle state and bump `updated_at`.
    ///
    /// The owning task comment must still exist.
    pub fn save_discussion_comment(
        &self,
        discussion: &DiscussionComment,
    ) -> Result<DiscussionComment> {
        let conn = self.conn.lock().expect("database lock poisoned");
        write_discussion(&conn, discussion)
    }

    /// Bump `updated_at` without touching the lifecycle timestamps.
    ///
    /// Used after new audio lands for a discussion, so a start or finish
    /// recorded in the meantime is kept.
    pub fn touch_discussion(&self, id: Uuid) -> Result<DiscussionComment> {
        let conn = self.conn.lock().expect("database lock poisoned");

        let discussion =
            find_discussion(&conn, "d.id = ?", id)?.ok_or(DiscussionError::NotFound("Discussion"))?;
        if !task_comment_exists(&conn, discussion.task_comment_id)? {
            return Err(
                DiscussionError::Validation("task comment must exist".to_string()).into(),
            );
        }

        let now = Utc::now();
        conn.execute(
            "UPDATE discussion_comments SET updated_at = ? WHERE id = ?",
            (now.to_rfc3339(), id.to_string()),
        )?;

        Ok(DiscussionComment {
            updated_at: now,
            ..discussion
        })
    }

    /// Record that the student opened the discussion.
    ///
    /// Returns `None` if the discussion does not exist.
    pub fn start_discussion(&self, id: Uuid) -> Result<Option<DiscussionComment>> {
        self.transition(id, |state, now| state.start(now))
    }

    /// Record that the student finished the discussion.
    ///
    /// Returns `None` if the discussion does not exist.
    pub fn finish_discussion(&self, id: Uuid) -> Result<Option<DiscussionComment>> {
        self.transition(id, |state, now| Ok(state.finish(now)))
    }

    /// Load, transition and save under one lock so concurrent transitions
    /// cannot undo each other.
    fn transition<F>(&self, id: Uuid, apply: F) -> Result<Option<DiscussionComment>>
    where
        F: FnOnce(DiscussionState, DateTime<Utc>) -> Result<DiscussionState, DiscussionError>,
    {
        let conn = self.conn.lock().expect("database lock poisoned");
        let Some(mut discussion) = find_discussion(&conn, "d.id = ?", id)? else {
            return Ok(None);
        };

        discussion.state = apply(discussion.state, Utc::now())?;
        write_discussion(&conn, &discussion).map(Some)
    }
}

impl Clone for Database {
    fn clone(&self) -> Self {
        Self {
            conn: self.conn.clone(),
        }
    }
}

fn already_discussed() -> DiscussionError {
    DiscussionError::Validation("task comment already has a discussion".to_string())
}

fn task_comment_exists(conn: &Connection, id: Uuid) -> Result<bool> {
    let count: i64 = conn.query_row(
        "SELECT COUNT(*) FROM task_comments WHERE id = ?",
        [id.to_string()],
        |row| row.get(0),
    )?;
    Ok(count > 0)
}

fn find_discussion(
    conn: &Connection,
    filter: &str,
    key: Uuid,
) -> Result<Option<DiscussionComment>> {
    let mut stmt = conn.prepare(&format!(
        "SELECT {} FROM discussion_comments d WHERE {}",
        DISCUSSION_COLUMNS, filter
    ))?;

    let mut rows = stmt.query([key.to_string()])?;
    if let Some(row) = rows.next()? {
        Ok(Some(discussion_from_row(row)?))
    } else {
        Ok(None)
    }
}

/// Insert a new discussion row. A second discussion for the same task
/// comment is a validation error, not a raw constraint failure.
fn insert_discussion(conn: &Connection, discussion: &DiscussionComment) -> Result<()> {
    let result = conn.execute(
        "INSERT INTO discussion_comments (id, task_comment_id, time_started, time_completed, created_at, updated_at)
         VALUES (?, ?, ?, ?, ?, ?)",
        (
            discussion.id.to_string(),
            discussion.task_comment_id.to_string(),
            discussion.time_started().map(|t| t.to_rfc3339()),
            discussion.time_completed().map(|t| t.to_rfc3339()),
            discussion.created_at.to_rfc3339(),
            discussion.updated_at.to_rfc3339(),
        ),
    );

    match result {
        Ok(_) => Ok(()),
        Err(e) if is_unique_violation(&e) => Err(already_discussed().into()),
        Err(e) => Err(e.into()),
    }
}

fn is_unique_violation(e: &rusqlite::Error) -> bool {
    matches!(
        e,
        rusqlite::Error::SqliteFailure(err, _)
            if err.extended_code == rusqlite::ffi::SQLITE_CONSTRAINT_UNIQUE
    )
}

fn write_discussion(conn: &Connection, discussion: &DiscussionComment) -> Result<DiscussionComment> {
    if !task_comment_exists(conn, discussion.task_comment_id)? {
        return Err(DiscussionError::Validation("task comment must exist".to_string()).into());
    }

    let now = Utc::now();
    let rows = conn.execute(
        "UPDATE discussion_comments
         SET task_comment_id = ?, time_started = ?, time_completed = ?, updated_at = ?
         WHERE id = ?",
        (
            discussion.task_comment_id.to_string(),
            discussion.time_started().map(|t| t.to_rfc3339()),
            discussion.time_completed().map(|t| t.to_rfc3339()),
            now.to_rfc3339(),
            discussion.id.to_string(),
        ),
    )?;

    if rows == 0 {
        return Err(DiscussionError::NotFound("Discussion").into());
    }

    Ok(DiscussionComment {
        updated_at: now,
        ..discussion.clone()
    })
}

fn task_comment_from_row(row: &Row<'_>) -> rusqlite::Result<TaskComment> {
    Ok(TaskComment {
        id: parse_uuid(row.get::<_, String>(0)?),
        task_id: parse_uuid(row.get::<_, String>(1)?),
        author: row.get(2)?,
        content: row.get(3)?,
        created_at: parse_datetime(row, 4)?,
    })
}

fn discussion_from_row(row: &Row<'_>) -> rusqlite::Result<DiscussionComment> {
    Ok(DiscussionComment {
        id: parse_uuid(row.get::<_, String>(0)?),
        task_comment_id: parse_uuid(row.get::<_, String>(1)?),
        state: DiscussionState::from_timestamps(
            parse_optional_datetime(row, 2)?,
            parse_optional_datetime(row, 3)?,
        ),
        created_at: parse_datetime(row, 4)?,
        updated_at: parse_datetime(row, 5)?,
    })
}

fn parse_uuid(s: String) -> Uuid {
    Uuid::parse_str(&s).unwrap_or_else(|_| Uuid::nil())
}

/// Timestamps feed the due date and the lifecycle state, so a malformed one
/// is an error rather than a silent default.
fn parse_datetime(row: &Row<'_>, idx: usize) -> rusqlite::Result<DateTime<Utc>> {
    to_datetime(idx, row.get::<_, String>(idx)?)
}

fn parse_optional_datetime(row: &Row<'_>, idx: usize) -> rusqlite::Result<Option<DateTime<Utc>>> {
    row.get::<_, Option<String>>(idx)?
        .map(|s| to_datetime(idx, s))
        .transpose()
}

fn to_datetime(idx: usize, s: String) -> rusqlite::Result<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(&s)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|e| rusqlite::Error::FromSqlConversionFailure(idx, Type::Text, Box::new(e)))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn setup() -> (Database, TaskComment) {
        let db = Database::open_memory().unwrap();
        db.migrate().unwrap();
        let comment = db
            .create_task_comment(CreateTaskCommentInput {
                task_id: Uuid::new_v4(),
                author: "tutor".to_string(),
                content: String::new(),
            })
            .unwrap();
        (db, comment)
    }

    #[test]
    fn duplicate_insert_is_a_validation_error() {
        let (db, comment) = setup();
        db.create_discussion_comment(comment.id).unwrap();

        let duplicate = DiscussionComment {
            id: Uuid::new_v4(),
            task_comment_id: comment.id,
            state: DiscussionState::NotStarted,
            created_at: Utc::now(),
            updated_at: Utc::now(),
        };
        let conn = db.conn.lock().unwrap();
        let err = insert_discussion(&conn, &duplicate).unwrap_err();

        assert!(matches!(
            err.downcast_ref::<DiscussionError>(),
            Some(DiscussionError::Validation(_))
        ));
    }

    #[test]
    fn malformed_created_at_is_an_error() {
        let (db, comment) = setup();
        let discussion = db.create_discussion_comment(comment.id).unwrap();
        db.conn
            .lock()
            .unwrap()
            .execute(
                "UPDATE discussion_comments SET created_at = 'yesterday' WHERE id = ?",
                [discussion.id.to_string()],
            )
            .unwrap();

        assert!(db.get_discussion_comment(discussion.id).is_err());
    }

    #[test]
    fn malformed_comment_timestamp_is_an_error() {
        let (db, comment) = setup();
        db.conn
            .lock()
            .unwrap()
            .execute(
                "UPDATE task_comments SET created_at = '' WHERE id = ?",
                [comment.id.to_string()],
            )
            .unwrap();

        assert!(db.get_task_comment(comment.id).is_err());
    }
}
