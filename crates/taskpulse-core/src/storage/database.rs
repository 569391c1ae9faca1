//! SQLite-backed local store.
//!
//! Persists tasks, projects, work sessions and the notification
//! delivery log. The pipeline itself never reaches in here; callers
//! read a [`StateSnapshot`] out and feed it to the scorer and triggers.
//!
//! Timestamps are stored as RFC 3339 text, which sorts correctly for
//! the range queries below.

use chrono::{DateTime, Utc};
use rusqlite::types::Type;
use rusqlite::{params, Connection, OptionalExtension};
use uuid::Uuid;

use crate::error::{DatabaseError, Result};
use crate::model::{Project, StateSnapshot, Task, TaskPriority, TaskStatus, WorkSession};
use crate::notify::{DeliveryReceipt, ProactiveNotification};

use super::data_dir;

/// One row of the notification delivery log.
#[derive(Debug, Clone)]
pub struct NotificationLogEntry {
    pub notification_id: String,
    pub kind: String,
    pub category: String,
    pub title: String,
    pub message: String,
    pub created_at: DateTime<Utc>,
    pub delivered_at: DateTime<Utc>,
    pub channel: String,
    pub success: bool,
    pub error: Option<String>,
}

pub struct Database {
    conn: Connection,
}

fn parse_ts(idx: usize, s: &str) -> rusqlite::Result<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(s)
        .map(|t| t.with_timezone(&Utc))
        .map_err(|e| rusqlite::Error::FromSqlConversionFailure(idx, Type::Text, Box::new(e)))
}

fn parse_opt_ts(idx: usize, s: Option<String>) -> rusqlite::Result<Option<DateTime<Utc>>> {
    s.map(|s| parse_ts(idx, &s)).transpose()
}

impl Database {
    /// Get a reference to the underlying SQLite connection.
    pub fn conn(&self) -> &Connection {
        &self.conn
    }

    /// Open the database at `~/.config/taskpulse/taskpulse.db`.
    ///
    /// Creates the database file and schema if they don't exist.
    ///
    /// # Errors
    /// Returns an error if the database cannot be opened or migrated.
    pub fn open() -> Result<Self> {
        let path = data_dir()?.join("taskpulse.db");
        let conn = Connection::open(&path).map_err(|source| DatabaseError::OpenFailed {
            path: path.clone(),
            source,
        })?;
        let db = Self { conn };
        db.migrate()?;
        Ok(db)
    }

    /// Open an in-memory database (for tests).
    pub fn open_memory() -> Result<Self> {
        let conn = Connection::open_in_memory().map_err(|source| DatabaseError::OpenFailed {
            path: ":memory:".into(),
            source,
        })?;
        let db = Self { conn };
        db.migrate()?;
        Ok(db)
    }

    fn migrate(&self) -> Result<()> {
        self.conn
            .execute_batch(
                "CREATE TABLE IF NOT EXISTS tasks (
                    id             TEXT PRIMARY KEY,
                    title          TEXT NOT NULL,
                    status         TEXT NOT NULL,
                    priority       TEXT NOT NULL,
                    due_date       TEXT,
                    created_at     TEXT NOT NULL,
                    updated_at     TEXT NOT NULL,
                    last_worked_at TEXT,
                    project_id     TEXT
                );

                CREATE TABLE IF NOT EXISTS projects (
                    id           TEXT PRIMARY KEY,
                    name         TEXT NOT NULL,
                    active       INTEGER NOT NULL DEFAULT 1,
                    progress_pct INTEGER NOT NULL DEFAULT 0
                );

                CREATE TABLE IF NOT EXISTS work_sessions (
                    id                 TEXT PRIMARY KEY,
                    task_id            TEXT NOT NULL,
                    started_at         TEXT NOT NULL,
                    ended_at           TEXT,
                    duration_minutes   INTEGER NOT NULL DEFAULT 0,
                    productivity_score INTEGER
                );

                CREATE TABLE IF NOT EXISTS notification_log (
                    notification_id TEXT NOT NULL,
                    kind            TEXT NOT NULL,
                    category        TEXT NOT NULL,
                    title           TEXT NOT NULL,
                    message         TEXT NOT NULL,
                    created_at      TEXT NOT NULL,
                    delivered_at    TEXT NOT NULL,
                    channel         TEXT NOT NULL DEFAULT '',
                    success         INTEGER NOT NULL DEFAULT 0,
                    error           TEXT
                );

                CREATE INDEX IF NOT EXISTS idx_tasks_status ON tasks(status);
                CREATE INDEX IF NOT EXISTS idx_sessions_task ON work_sessions(task_id);
                CREATE INDEX IF NOT EXISTS idx_sessions_started ON work_sessions(started_at);
                CREATE INDEX IF NOT EXISTS idx_log_created ON notification_log(created_at);",
            )
            .map_err(|e| DatabaseError::MigrationFailed(e.to_string()))?;
        Ok(())
    }

    pub fn insert_task(&self, task: &Task) -> Result<()> {
        self.conn.execute(
            "INSERT OR REPLACE INTO tasks
             (id, title, status, priority, due_date, created_at, updated_at, last_worked_at, project_id)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)",
            params![
                task.id,
                task.title,
                task.status.as_str(),
                task.priority.as_str(),
                task.due_date.map(|t| t.to_rfc3339()),
                task.created_at.to_rfc3339(),
                task.updated_at.to_rfc3339(),
                task.last_worked_at.map(|t| t.to_rfc3339()),
                task.project_id,
            ],
        )?;
        Ok(())
    }

    pub fn get_task(&self, id: &str) -> Result<Task> {
        let mut stmt = self.conn.prepare(
            "SELECT id, title, status, priority, due_date, created_at, updated_at,
                    last_worked_at, project_id
             FROM tasks WHERE id = ?1",
        )?;
        stmt.query_row(params![id], task_from_row)
            .optional()?
            .ok_or_else(|| DatabaseError::NotFound(format!("task {id}")).into())
    }

    pub fn list_tasks(&self, include_closed: bool) -> Result<Vec<Task>> {
        let sql = if include_closed {
            "SELECT id, title, status, priority, due_date, created_at, updated_at,
                    last_worked_at, project_id
             FROM tasks ORDER BY created_at"
        } else {
            "SELECT id, title, status, priority, due_date, created_at, updated_at,
                    last_worked_at, project_id
             FROM tasks WHERE status IN ('pending', 'in_progress') ORDER BY created_at"
        };
        let mut stmt = self.conn.prepare(sql)?;
        let rows = stmt.query_map([], task_from_row)?;
        Ok(rows.collect::<rusqlite::Result<Vec<_>>>()?)
    }

    /// Update a task's status, refreshing `updated_at`.
    pub fn set_task_status(&self, id: &str, status: TaskStatus, now: DateTime<Utc>) -> Result<()> {
        let changed = self.conn.execute(
            "UPDATE tasks SET status = ?2, updated_at = ?3 WHERE id = ?1",
            params![id, status.as_str(), now.to_rfc3339()],
        )?;
        if changed == 0 {
            return Err(DatabaseError::NotFound(format!("task {id}")).into());
        }
        Ok(())
    }

    pub fn upsert_project(&self, project: &Project) -> Result<()> {
        self.conn.execute(
            "INSERT OR REPLACE INTO projects (id, name, active, progress_pct)
             VALUES (?1, ?2, ?3, ?4)",
            params![project.id, project.name, project.active, project.progress_pct],
        )?;
        Ok(())
    }

    pub fn list_projects(&self) -> Result<Vec<Project>> {
        let mut stmt = self
            .conn
            .prepare("SELECT id, name, active, progress_pct FROM projects ORDER BY name")?;
        let rows = stmt.query_map([], |row| {
            Ok(Project {
                id: row.get(0)?,
                name: row.get(1)?,
                active: row.get(2)?,
                progress_pct: row.get(3)?,
            })
        })?;
        Ok(rows.collect::<rusqlite::Result<Vec<_>>>()?)
    }

    /// Start a session against a task. Fails if the task is unknown.
    pub fn start_session(&self, task_id: &str, now: DateTime<Utc>) -> Result<WorkSession> {
        self.get_task(task_id)?;
        let session = WorkSession {
            id: Uuid::new_v4().to_string(),
            task_id: task_id.to_string(),
            started_at: now,
            ended_at: None,
            duration_minutes: 0,
            productivity_score: None,
        };
        self.conn.execute(
            "INSERT INTO work_sessions (id, task_id, started_at, duration_minutes)
             VALUES (?1, ?2, ?3, 0)",
            params![session.id, session.task_id, session.started_at.to_rfc3339()],
        )?;
        Ok(session)
    }

    /// Close a session, computing its duration and stamping the task's
    /// `last_worked_at`.
    pub fn close_session(
        &self,
        session_id: &str,
        productivity_score: Option<u8>,
        now: DateTime<Utc>,
    ) -> Result<WorkSession> {
        let session = self.get_session(session_id)?;
        if session.is_closed() {
            return Err(DatabaseError::QueryFailed(format!(
                "session {session_id} already closed"
            ))
            .into());
        }
        let duration = (now - session.started_at).num_minutes().max(0);
        self.conn.execute(
            "UPDATE work_sessions
             SET ended_at = ?2, duration_minutes = ?3, productivity_score = ?4
             WHERE id = ?1",
            params![session_id, now.to_rfc3339(), duration, productivity_score],
        )?;
        self.conn.execute(
            "UPDATE tasks SET last_worked_at = ?2 WHERE id = ?1",
            params![session.task_id, now.to_rfc3339()],
        )?;
        self.get_session(session_id)
    }

    pub fn get_session(&self, id: &str) -> Result<WorkSession> {
        let mut stmt = self.conn.prepare(
            "SELECT id, task_id, started_at, ended_at, duration_minutes, productivity_score
             FROM work_sessions WHERE id = ?1",
        )?;
        stmt.query_row(params![id], session_from_row)
            .optional()?
            .ok_or_else(|| DatabaseError::NotFound(format!("session {id}")).into())
    }

    pub fn list_sessions(&self, since: Option<DateTime<Utc>>) -> Result<Vec<WorkSession>> {
        let mut stmt;
        let rows = match since {
            Some(since) => {
                stmt = self.conn.prepare(
                    "SELECT id, task_id, started_at, ended_at, duration_minutes, productivity_score
                     FROM work_sessions WHERE started_at >= ?1 ORDER BY started_at",
                )?;
                stmt.query_map(params![since.to_rfc3339()], session_from_row)?
            }
            None => {
                stmt = self.conn.prepare(
                    "SELECT id, task_id, started_at, ended_at, duration_minutes, productivity_score
                     FROM work_sessions ORDER BY started_at",
                )?;
                stmt.query_map([], session_from_row)?
            }
        };
        Ok(rows.collect::<rusqlite::Result<Vec<_>>>()?)
    }

    /// Append a delivery attempt to the log.
    pub fn log_delivery(
        &self,
        notification: &ProactiveNotification,
        receipt: &DeliveryReceipt,
    ) -> Result<()> {
        self.conn.execute(
            "INSERT INTO notification_log
             (notification_id, kind, category, title, message, created_at,
              delivered_at, channel, success, error)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10)",
            params![
                notification.id,
                notification.kind.as_str(),
                notification.category.as_str(),
                notification.title,
                notification.message,
                notification.created_at.to_rfc3339(),
                receipt.delivered_at.to_rfc3339(),
                receipt.channel,
                receipt.success,
                receipt.error,
            ],
        )?;
        Ok(())
    }

    /// Creation times of logged notifications since `since`, newest last.
    ///
    /// Used to seed the hourly rate limiter after a restart.
    pub fn notifications_created_since(&self, since: DateTime<Utc>) -> Result<Vec<DateTime<Utc>>> {
        let mut stmt = self.conn.prepare(
            "SELECT created_at FROM notification_log
             WHERE created_at >= ?1 ORDER BY created_at",
        )?;
        let rows = stmt.query_map(params![since.to_rfc3339()], |row| {
            let s: String = row.get(0)?;
            parse_ts(0, &s)
        })?;
        Ok(rows.collect::<rusqlite::Result<Vec<_>>>()?)
    }

    pub fn recent_log(&self, limit: u32) -> Result<Vec<NotificationLogEntry>> {
        let mut stmt = self.conn.prepare(
            "SELECT notification_id, kind, category, title, message, created_at,
                    delivered_at, channel, success, error
             FROM notification_log ORDER BY created_at DESC LIMIT ?1",
        )?;
        let rows = stmt.query_map(params![limit], |row| {
            Ok(NotificationLogEntry {
                notification_id: row.get(0)?,
                kind: row.get(1)?,
                category: row.get(2)?,
                title: row.get(3)?,
                message: row.get(4)?,
                created_at: parse_ts(5, &row.get::<_, String>(5)?)?,
                delivered_at: parse_ts(6, &row.get::<_, String>(6)?)?,
                channel: row.get(7)?,
                success: row.get(8)?,
                error: row.get(9)?,
            })
        })?;
        Ok(rows.collect::<rusqlite::Result<Vec<_>>>()?)
    }

    /// Read everything the pipeline consumes in one go.
    pub fn snapshot(&self, now: DateTime<Utc>) -> Result<StateSnapshot> {
        Ok(StateSnapshot {
            tasks: self.list_tasks(true)?,
            sessions: self.list_sessions(None)?,
            projects: self.list_projects()?,
            taken_at: now,
        })
    }
}

fn task_from_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<Task> {
    let status: String = row.get(2)?;
    let priority: String = row.get(3)?;
    Ok(Task {
        id: row.get(0)?,
        title: row.get(1)?,
        status: status.parse().map_err(|e: String| {
            rusqlite::Error::FromSqlConversionFailure(2, Type::Text, e.into())
        })?,
        priority: priority.parse().map_err(|e: String| {
            rusqlite::Error::FromSqlConversionFailure(3, Type::Text, e.into())
        })?,
        due_date: parse_opt_ts(4, row.get(4)?)?,
        created_at: parse_ts(5, &row.get::<_, String>(5)?)?,
        updated_at: parse_ts(6, &row.get::<_, String>(6)?)?,
        last_worked_at: parse_opt_ts(7, row.get(7)?)?,
        project_id: row.get(8)?,
    })
}

fn session_from_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<WorkSession> {
    Ok(WorkSession {
        id: row.get(0)?,
        task_id: row.get(1)?,
        started_at: parse_ts(2, &row.get::<_, String>(2)?)?,
        ended_at: parse_opt_ts(3, row.get(3)?)?,
        duration_minutes: row.get(4)?,
        productivity_score: row.get(5)?,
    })
}
