use std::collections::HashMap;
use std::fs;
use std::path::Path;
use std::time::Duration as StdDuration;

use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use rusqlite::{Connection, ErrorCode, OptionalExtension, Row, Transaction, ffi, params};
use thiserror::Error;
use tracing::{debug, info, warn};

use crate::clock::normalize_tags;
use crate::domain::{Entry, Project, Timer};
use crate::ids;

const BUSY_TIMEOUT: StdDuration = StdDuration::from_millis(5000);
const TIMER_COLLISION_MS: i64 = 1000;

const MIGRATIONS: &[&str] = &[
    r#"
    CREATE TABLE IF NOT EXISTS projects (
        id INTEGER PRIMARY KEY AUTOINCREMENT,
        name TEXT NOT NULL UNIQUE COLLATE NOCASE,
        company TEXT,
        is_hidden INTEGER NOT NULL DEFAULT 0,
        position INTEGER NOT NULL DEFAULT 0,
        created_at INTEGER NOT NULL,
        updated_at INTEGER NOT NULL
    )
    "#,
    r#"
    CREATE TABLE IF NOT EXISTS entries (
        id TEXT PRIMARY KEY,
        project_id INTEGER NOT NULL,
        creator_id INTEGER,
        content TEXT NOT NULL DEFAULT '',
        duration_ms INTEGER NOT NULL DEFAULT 0 CHECK (duration_ms >= 0),
        started_at INTEGER,
        ended_at INTEGER,
        entry_type TEXT NOT NULL DEFAULT 'WORK',
        is_billable INTEGER NOT NULL DEFAULT 0,
        created_at INTEGER NOT NULL,
        updated_at INTEGER NOT NULL,
        FOREIGN KEY(project_id) REFERENCES projects(id) ON DELETE CASCADE
    )
    "#,
    r#"
    CREATE INDEX IF NOT EXISTS idx_entries_project_ended ON entries(project_id, ended_at)
    "#,
    r#"
    CREATE TABLE IF NOT EXISTS entry_tags (
        entry_id TEXT NOT NULL,
        tag TEXT NOT NULL,
        PRIMARY KEY (entry_id, tag),
        FOREIGN KEY(entry_id) REFERENCES entries(id) ON DELETE CASCADE
    )
    "#,
    r#"
    CREATE TABLE IF NOT EXISTS timers (
        project_id INTEGER NOT NULL UNIQUE,
        started_at INTEGER NOT NULL,
        created_at INTEGER NOT NULL,
        updated_at INTEGER NOT NULL,
        FOREIGN KEY(project_id) REFERENCES projects(id) ON DELETE CASCADE
    )
    "#,
];

const ENTRY_COLUMNS: &str = "id, project_id, creator_id, content, duration_ms, started_at, ended_at, \
     entry_type, is_billable, created_at, updated_at";

#[derive(Debug, Error)]
pub enum StorageError {
    #[error("project name cannot be empty")]
    InvalidName,
    #[error("a project named '{0}' already exists")]
    DuplicateName(String),
    #[error("project {0} was not found")]
    ProjectNotFound(i64),
    #[error("entry {0} was not found")]
    EntryNotFound(String),
    #[error("project {0} does not exist")]
    ProjectMissing(i64),
    #[error("database error: {0}")]
    Sqlite(#[from] rusqlite::Error),
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

enum Violation {
    Unique,
    ForeignKey,
}

fn violation(err: &rusqlite::Error) -> Option<Violation> {
    match err {
        rusqlite::Error::SqliteFailure(failure, _) if failure.code == ErrorCode::ConstraintViolation => {
            match failure.extended_code {
                ffi::SQLITE_CONSTRAINT_UNIQUE | ffi::SQLITE_CONSTRAINT_PRIMARYKEY => Some(Violation::Unique),
                ffi::SQLITE_CONSTRAINT_FOREIGNKEY => Some(Violation::ForeignKey),
                _ => None,
            }
        }
        _ => None,
    }
}

/// SQLite-backed repository for projects, entries and timers.
///
/// A single connection is shared behind a mutex, so concurrent callers are
/// serialized at the statement level.
pub struct Store {
    conn: Mutex<Connection>,
}

impl Store {
    pub fn open(path: impl AsRef<Path>) -> Result<Self, StorageError> {
        let path = path.as_ref();
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent)?;
            }
        }

        let conn = Connection::open(path)?;
        conn.pragma_update_and_check(None, "journal_mode", "WAL", |row| row.get::<_, String>(0))?;
        let store = Self::configure(conn)?;
        info!(path = %path.display(), "opened database");
        Ok(store)
    }

    #[cfg(test)]
    pub fn open_in_memory() -> Result<Self, StorageError> {
        Self::configure(Connection::open_in_memory()?)
    }

    fn configure(conn: Connection) -> Result<Self, StorageError> {
        conn.pragma_update(None, "foreign_keys", true)?;
        conn.busy_timeout(BUSY_TIMEOUT)?;

        for sql in MIGRATIONS {
            conn.execute_batch(sql)?;
        }

        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    pub fn close(self) -> Result<(), StorageError> {
        self.conn.into_inner().close().map_err(|(_, err)| StorageError::Sqlite(err))
    }

    pub fn create_project(&self, name: &str) -> Result<Project, StorageError> {
        let name = name.trim();
        if name.is_empty() {
            return Err(StorageError::InvalidName);
        }

        let now = Utc::now();
        let conn = self.conn.lock();
        conn.execute(
            "INSERT INTO projects (name, company, is_hidden, created_at, updated_at)
             VALUES (?1, NULL, 0, ?2, ?2)",
            params![name, now.timestamp_millis()],
        )
        .map_err(|err| match violation(&err) {
            Some(Violation::Unique) => StorageError::DuplicateName(name.to_string()),
            _ => StorageError::Sqlite(err),
        })?;

        let id = conn.last_insert_rowid();
        info!(project_id = id, name, "created project");
        Ok(Project {
            id,
            name: name.to_string(),
            company: None,
            is_hidden: false,
            created_at: from_millis(now.timestamp_millis()),
            updated_at: from_millis(now.timestamp_millis()),
        })
    }

    /// All projects in insertion order.
    pub fn list_projects(&self) -> Result<Vec<Project>, StorageError> {
        let conn = self.conn.lock();
        let mut stmt = conn.prepare(
            "SELECT id, name, company, is_hidden, created_at, updated_at FROM projects ORDER BY id",
        )?;

        let mut rows = stmt.query([])?;
        let mut output = Vec::new();
        while let Some(row) = rows.next()? {
            output.push(project_from_row(row)?);
        }

        debug!(count = output.len(), "listed projects");
        Ok(output)
    }

    pub fn get_project(&self, id: i64) -> Result<Option<Project>, StorageError> {
        let conn = self.conn.lock();
        let project = conn
            .query_row(
                "SELECT id, name, company, is_hidden, created_at, updated_at FROM projects WHERE id = ?1",
                params![id],
                project_from_row,
            )
            .optional()?;
        Ok(project)
    }

    /// Case-insensitive (ASCII) lookup by exact trimmed name.
    pub fn find_project_by_name(&self, name: &str) -> Result<Option<Project>, StorageError> {
        let conn = self.conn.lock();
        let project = conn
            .query_row(
                "SELECT id, name, company, is_hidden, created_at, updated_at FROM projects
                 WHERE name = ?1 COLLATE NOCASE",
                params![name.trim()],
                project_from_row,
            )
            .optional()?;
        Ok(project)
    }

    pub fn rename_project(&self, id: i64, new_name: &str) -> Result<Project, StorageError> {
        let new_name = new_name.trim();
        if new_name.is_empty() {
            return Err(StorageError::InvalidName);
        }

        let now = Utc::now().timestamp_millis();
        {
            let conn = self.conn.lock();
            let changed = conn
                .execute(
                    "UPDATE projects SET name = ?1, updated_at = ?2 WHERE id = ?3",
                    params![new_name, now, id],
                )
                .map_err(|err| match violation(&err) {
                    Some(Violation::Unique) => StorageError::DuplicateName(new_name.to_string()),
                    _ => StorageError::Sqlite(err),
                })?;
            if changed == 0 {
                return Err(StorageError::ProjectNotFound(id));
            }
        }

        info!(project_id = id, name = new_name, "renamed project");
        self.get_project(id)?.ok_or(StorageError::ProjectNotFound(id))
    }

    /// Removes the project; entries, their tags and the timer go with it.
    pub fn delete_project(&self, id: i64) -> Result<(), StorageError> {
        let conn = self.conn.lock();
        let removed = conn.execute("DELETE FROM projects WHERE id = ?1", params![id])?;
        if removed == 0 {
            return Err(StorageError::ProjectNotFound(id));
        }
        info!(project_id = id, "deleted project");
        Ok(())
    }

    /// Re-points every entry of `source_id` at `target_id` and drops the
    /// source project in one transaction. Returns the number of entries moved.
    pub fn merge_projects(&self, source_id: i64, target_id: i64) -> Result<usize, StorageError> {
        let now = Utc::now().timestamp_millis();
        let conn = self.conn.lock();
        let tx = conn.unchecked_transaction()?;
        let moved = tx
            .execute(
                "UPDATE entries SET project_id = ?2, updated_at = ?3 WHERE project_id = ?1",
                params![source_id, target_id, now],
            )
            .map_err(|err| match violation(&err) {
                Some(Violation::ForeignKey) => StorageError::ProjectMissing(target_id),
                _ => StorageError::Sqlite(err),
            })?;
        if tx.execute("DELETE FROM projects WHERE id = ?1", params![source_id])? == 0 {
            return Err(StorageError::ProjectNotFound(source_id));
        }
        tx.commit()?;

        info!(from = source_id, to = target_id, moved, "merged projects");
        Ok(moved)
    }

    /// Inserts a new entry, assigning an id when it has none.
    pub fn save_entry(&self, entry: &mut Entry) -> Result<(), StorageError> {
        let conn = self.conn.lock();
        let tx = conn.unchecked_transaction()?;
        insert_entry(&tx, entry)?;
        tx.commit()?;
        debug!(entry_id = %entry.id, project_id = entry.project_id, "saved entry");
        Ok(())
    }

    pub fn update_entry(&self, entry: &mut Entry) -> Result<(), StorageError> {
        let conn = self.conn.lock();
        let tx = conn.unchecked_transaction()?;

        let now = Utc::now().timestamp_millis();
        let changed = tx
            .execute(
                "UPDATE entries SET
                   project_id = ?2,
                   creator_id = ?3,
                   content = ?4,
                   duration_ms = ?5,
                   started_at = ?6,
                   ended_at = ?7,
                   entry_type = ?8,
                   is_billable = ?9,
                   updated_at = ?10
                 WHERE id = ?1",
                params![
                    entry.id,
                    entry.project_id,
                    entry.creator_id,
                    entry.content,
                    entry.duration_ms.max(0),
                    entry.started_at.map(|at| at.timestamp_millis()),
                    entry.ended_at.map(|at| at.timestamp_millis()),
                    entry.entry_type.as_str(),
                    entry.billable,
                    now,
                ],
            )
            .map_err(|err| match violation(&err) {
                Some(Violation::ForeignKey) => StorageError::ProjectMissing(entry.project_id),
                _ => StorageError::Sqlite(err),
            })?;
        if changed == 0 {
            return Err(StorageError::EntryNotFound(entry.id.clone()));
        }

        entry.tags = replace_tags(&tx, &entry.id, &entry.tags)?;
        tx.commit()?;
        entry.updated_at = from_millis(now);
        debug!(entry_id = %entry.id, "updated entry");
        Ok(())
    }

    pub fn delete_entry(&self, id: &str) -> Result<(), StorageError> {
        let conn = self.conn.lock();
        conn.execute("DELETE FROM entries WHERE id = ?1", params![id])?;
        debug!(entry_id = id, "deleted entry");
        Ok(())
    }

    pub fn get_entry(&self, id: &str) -> Result<Option<Entry>, StorageError> {
        let conn = self.conn.lock();
        let entry = conn
            .query_row(
                &format!("SELECT {ENTRY_COLUMNS} FROM entries WHERE id = ?1"),
                params![id],
                entry_from_row,
            )
            .optional()?;

        let Some(mut entry) = entry else {
            return Ok(None);
        };

        let mut stmt = conn.prepare("SELECT tag FROM entry_tags WHERE entry_id = ?1")?;
        let tags = stmt
            .query_map(params![id], |row| row.get::<_, String>(0))?
            .collect::<Result<Vec<_>, _>>()?;
        entry.tags = normalize_tags(&tags);
        Ok(Some(entry))
    }

    /// Entries of a project, newest `ended_at` first, open-ended ones last.
    pub fn list_entries(&self, project_id: i64) -> Result<Vec<Entry>, StorageError> {
        let conn = self.conn.lock();

        let mut tags_by_entry: HashMap<String, Vec<String>> = HashMap::new();
        {
            let mut stmt = conn.prepare(
                "SELECT t.entry_id, t.tag FROM entry_tags t
                 JOIN entries e ON e.id = t.entry_id
                 WHERE e.project_id = ?1",
            )?;
            let mut rows = stmt.query(params![project_id])?;
            while let Some(row) = rows.next()? {
                tags_by_entry
                    .entry(row.get::<_, String>(0)?)
                    .or_default()
                    .push(row.get(1)?);
            }
        }

        let mut stmt = conn.prepare(&format!(
            "SELECT {ENTRY_COLUMNS} FROM entries WHERE project_id = ?1
             ORDER BY ended_at IS NULL, ended_at DESC, id"
        ))?;
        let mut rows = stmt.query(params![project_id])?;
        let mut output = Vec::new();
        while let Some(row) = rows.next()? {
            let mut entry = entry_from_row(row)?;
            if let Some(tags) = tags_by_entry.get(&entry.id) {
                entry.tags = normalize_tags(tags);
            }
            output.push(entry);
        }

        debug!(project_id, count = output.len(), "listed entries");
        Ok(output)
    }

    /// Starts (or restarts) the timer of a project.
    pub fn upsert_timer(&self, project_id: i64, started_at: DateTime<Utc>) -> Result<Timer, StorageError> {
        let now = Utc::now().timestamp_millis();
        let conn = self.conn.lock();
        conn.execute(
            "INSERT INTO timers (project_id, started_at, created_at, updated_at)
             VALUES (?1, ?2, ?3, ?3)
             ON CONFLICT(project_id) DO UPDATE SET
               started_at = excluded.started_at,
               updated_at = excluded.updated_at",
            params![project_id, started_at.timestamp_millis(), now],
        )
        .map_err(|err| match violation(&err) {
            Some(Violation::ForeignKey) => StorageError::ProjectMissing(project_id),
            _ => StorageError::Sqlite(err),
        })?;

        let timer = conn.query_row(
            "SELECT project_id, started_at, created_at, updated_at FROM timers WHERE project_id = ?1",
            params![project_id],
            timer_from_row,
        )?;
        info!(project_id, started_at = %timer.started_at, "timer started");
        Ok(timer)
    }

    /// The running timer of a project, if any.
    ///
    /// A timer whose start lies within a second of the newest stopped entry's
    /// start is a leftover of an interrupted stop: it is removed and reported
    /// absent. Quick notes never end, so they are not considered.
    pub fn get_timer(&self, project_id: i64) -> Result<Option<Timer>, StorageError> {
        let conn = self.conn.lock();
        let timer = conn
            .query_row(
                "SELECT project_id, started_at, created_at, updated_at FROM timers WHERE project_id = ?1",
                params![project_id],
                timer_from_row,
            )
            .optional()?;

        let Some(timer) = timer else {
            return Ok(None);
        };

        let newest_start = conn
            .query_row(
                "SELECT started_at FROM entries WHERE project_id = ?1 AND ended_at IS NOT NULL
                 ORDER BY ended_at DESC, id LIMIT 1",
                params![project_id],
                |row| row.get::<_, Option<i64>>(0),
            )
            .optional()?
            .flatten();

        if let Some(newest_start) = newest_start {
            if (timer.started_at.timestamp_millis() - newest_start).abs() <= TIMER_COLLISION_MS {
                conn.execute("DELETE FROM timers WHERE project_id = ?1", params![project_id])?;
                warn!(project_id, "removed stale timer that was already logged as an entry");
                return Ok(None);
            }
        }

        Ok(Some(timer))
    }

    pub fn delete_timer(&self, project_id: i64) -> Result<(), StorageError> {
        let conn = self.conn.lock();
        conn.execute("DELETE FROM timers WHERE project_id = ?1", params![project_id])?;
        debug!(project_id, "deleted timer");
        Ok(())
    }

    pub fn list_timers(&self) -> Result<Vec<Timer>, StorageError> {
        let conn = self.conn.lock();
        let mut stmt = conn.prepare(
            "SELECT project_id, started_at, created_at, updated_at FROM timers ORDER BY project_id",
        )?;
        let timers = stmt
            .query_map([], timer_from_row)?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(timers)
    }

    /// Materializes a stopped timer: inserts the entry and removes the
    /// project's timer in one transaction.
    pub fn finish_timer(&self, entry: &mut Entry) -> Result<(), StorageError> {
        let conn = self.conn.lock();
        let tx = conn.unchecked_transaction()?;
        insert_entry(&tx, entry)?;
        tx.execute("DELETE FROM timers WHERE project_id = ?1", params![entry.project_id])?;
        tx.commit()?;
        info!(
            project_id = entry.project_id,
            entry_id = %entry.id,
            duration_ms = entry.duration_ms,
            "timer stopped"
        );
        Ok(())
    }
}

fn insert_entry(tx: &Transaction<'_>, entry: &mut Entry) -> Result<(), StorageError> {
    if entry.id.is_empty() {
        entry.id = ids::uuid();
    }

    let now = Utc::now().timestamp_millis();
    tx.execute(
        "INSERT INTO entries (id, project_id, creator_id, content, duration_ms, started_at, ended_at,
                              entry_type, is_billable, created_at, updated_at)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?10)",
        params![
            entry.id,
            entry.project_id,
            entry.creator_id,
            entry.content,
            entry.duration_ms.max(0),
            entry.started_at.map(|at| at.timestamp_millis()),
            entry.ended_at.map(|at| at.timestamp_millis()),
            entry.entry_type.as_str(),
            entry.billable,
            now,
        ],
    )
    .map_err(|err| match violation(&err) {
        Some(Violation::ForeignKey) => StorageError::ProjectMissing(entry.project_id),
        _ => StorageError::Sqlite(err),
    })?;

    entry.tags = replace_tags(tx, &entry.id, &entry.tags)?;
    entry.created_at = from_millis(now);
    entry.updated_at = from_millis(now);
    Ok(())
}

fn replace_tags(tx: &Transaction<'_>, entry_id: &str, tags: &[String]) -> Result<Vec<String>, StorageError> {
    let tags = normalize_tags(tags);
    tx.execute("DELETE FROM entry_tags WHERE entry_id = ?1", params![entry_id])?;
    for tag in &tags {
        tx.execute(
            "INSERT INTO entry_tags (entry_id, tag) VALUES (?1, ?2)",
            params![entry_id, tag],
        )?;
    }
    Ok(tags)
}

fn project_from_row(row: &Row<'_>) -> rusqlite::Result<Project> {
    Ok(Project {
        id: row.get(0)?,
        name: row.get(1)?,
        company: row.get(2)?,
        is_hidden: row.get(3)?,
        created_at: from_millis(row.get(4)?),
        updated_at: from_millis(row.get(5)?),
    })
}

fn entry_from_row(row: &Row<'_>) -> rusqlite::Result<Entry> {
    Ok(Entry {
        id: row.get(0)?,
        project_id: row.get(1)?,
        creator_id: row.get(2)?,
        content: row.get(3)?,
        duration_ms: row.get(4)?,
        started_at: row.get::<_, Option<i64>>(5)?.map(from_millis),
        ended_at: row.get::<_, Option<i64>>(6)?.map(from_millis),
        entry_type: row.get::<_, String>(7)?.parse().unwrap_or_default(),
        billable: row.get(8)?,
        tags: Vec::new(),
        created_at: from_millis(row.get(9)?),
        updated_at: from_millis(row.get(10)?),
    })
}

fn timer_from_row(row: &Row<'_>) -> rusqlite::Result<Timer> {
    Ok(Timer {
        project_id: row.get(0)?,
        started_at: from_millis(row.get(1)?),
        created_at: from_millis(row.get(2)?),
        updated_at: from_millis(row.get(3)?),
    })
}

fn from_millis(millis: i64) -> DateTime<Utc> {
    DateTime::from_timestamp_millis(millis).unwrap_or_default()
}

#[cfg(test)]
mod tests {
    use chrono::{Duration, TimeZone, Utc};

    use crate::domain::{Entry, EntryType};

    use super::{StorageError, Store};

    fn store() -> Store {
        Store::open_in_memory().expect("in-memory store should open")
    }

    fn entry_at(project_id: i64, content: &str, ended_hour: Option<u32>) -> Entry {
        let mut entry = Entry::new(project_id, content, true);
        if let Some(hour) = ended_hour {
            let ended = Utc.with_ymd_and_hms(2026, 3, 10, hour, 0, 0).unwrap();
            entry.started_at = Some(ended - Duration::minutes(30));
            entry.ended_at = Some(ended);
            entry.duration_ms = Duration::minutes(30).num_milliseconds();
        }
        entry
    }

    #[test]
    fn creates_and_lists_projects_in_insertion_order() {
        let store = store();
        store.create_project("  Beta ").expect("create beta");
        store.create_project("alpha").expect("create alpha");

        let names = store
            .list_projects()
            .expect("list projects")
            .into_iter()
            .map(|project| project.name)
            .collect::<Vec<_>>();
        assert_eq!(names, vec!["Beta".to_string(), "alpha".to_string()]);
    }

    #[test]
    fn rejects_blank_and_duplicate_names() {
        let store = store();
        store.create_project("Client").expect("create project");

        assert!(matches!(store.create_project("   "), Err(StorageError::InvalidName)));
        assert!(matches!(
            store.create_project("client"),
            Err(StorageError::DuplicateName(name)) if name == "client"
        ));
    }

    #[test]
    fn rename_maps_constraints() {
        let store = store();
        let first = store.create_project("First").expect("create first");
        store.create_project("Second").expect("create second");

        assert!(matches!(
            store.rename_project(first.id, "SECOND"),
            Err(StorageError::DuplicateName(_))
        ));
        assert!(matches!(store.rename_project(999, "Other"), Err(StorageError::ProjectNotFound(999))));

        let renamed = store.rename_project(first.id, " Renamed ").expect("rename");
        assert_eq!(renamed.name, "Renamed");
        assert!(renamed.updated_at >= renamed.created_at);
    }

    #[test]
    fn orders_entries_by_end_time_with_open_entries_last() {
        let store = store();
        let project = store.create_project("Ordering").expect("create project");

        let mut quick = entry_at(project.id, "quick note", None);
        quick.started_at = Some(Utc::now());
        let mut early = entry_at(project.id, "early", Some(8));
        let mut late = entry_at(project.id, "late", Some(17));
        for entry in [&mut quick, &mut early, &mut late] {
            store.save_entry(entry).expect("save entry");
        }

        let contents = store
            .list_entries(project.id)
            .expect("list entries")
            .into_iter()
            .map(|entry| entry.content)
            .collect::<Vec<_>>();
        assert_eq!(contents, vec!["late", "early", "quick note"]);
    }

    #[test]
    fn save_entry_assigns_id_and_persists_tags() {
        let store = store();
        let project = store.create_project("Tags").expect("create project");

        let mut entry = entry_at(project.id, "fixed #Bug and #bug in #api", Some(9));
        entry.id.clear();
        store.save_entry(&mut entry).expect("save entry");
        assert_eq!(entry.id.len(), 36);

        let loaded = store.get_entry(&entry.id).expect("get entry").expect("entry exists");
        assert_eq!(loaded.tags, vec!["api".to_string(), "Bug".to_string()]);
        assert_eq!(loaded.entry_type, EntryType::Work);
        assert_eq!(loaded.ended_at, entry.ended_at);
    }

    #[test]
    fn update_replaces_tags_and_checks_references() {
        let store = store();
        let project = store.create_project("Update").expect("create project");
        let mut entry = entry_at(project.id, "#one #two", Some(10));
        store.save_entry(&mut entry).expect("save entry");

        entry.tags = vec!["three".to_string()];
        entry.billable = false;
        store.update_entry(&mut entry).expect("update entry");
        let loaded = store.get_entry(&entry.id).expect("get entry").expect("entry exists");
        assert_eq!(loaded.tags, vec!["three".to_string()]);
        assert!(!loaded.billable);

        entry.project_id = 4242;
        assert!(matches!(store.update_entry(&mut entry), Err(StorageError::ProjectMissing(4242))));

        let mut ghost = entry_at(project.id, "ghost", Some(11));
        assert!(matches!(store.update_entry(&mut ghost), Err(StorageError::EntryNotFound(_))));
    }

    #[test]
    fn save_entry_for_unknown_project_fails() {
        let store = store();
        let mut entry = entry_at(77, "orphan", Some(9));
        assert!(matches!(store.save_entry(&mut entry), Err(StorageError::ProjectMissing(77))));
    }

    #[test]
    fn delete_entry_is_idempotent() {
        let store = store();
        let project = store.create_project("Delete").expect("create project");
        let mut entry = entry_at(project.id, "temp #tag", Some(9));
        store.save_entry(&mut entry).expect("save entry");

        store.delete_entry(&entry.id).expect("first delete");
        store.delete_entry(&entry.id).expect("second delete");
        assert!(store.get_entry(&entry.id).expect("get entry").is_none());
    }

    #[test]
    fn one_timer_per_project() {
        let store = store();
        let project = store.create_project("Timer").expect("create project");
        let first = Utc::now() - Duration::hours(2);
        let second = Utc::now() - Duration::hours(1);

        store.upsert_timer(project.id, first).expect("start");
        store.upsert_timer(project.id, second).expect("restart");

        let timers = store.list_timers().expect("list timers");
        assert_eq!(timers.len(), 1);
        assert_eq!(timers[0].started_at.timestamp_millis(), second.timestamp_millis());

        store.delete_timer(project.id).expect("delete timer");
        store.delete_timer(project.id).expect("delete timer again");
        assert!(store.get_timer(project.id).expect("get timer").is_none());
        assert!(matches!(store.upsert_timer(999, first), Err(StorageError::ProjectMissing(999))));
    }

    #[test]
    fn finish_timer_swaps_timer_for_entry() {
        let store = store();
        let project = store.create_project("Finish").expect("create project");
        let started = Utc::now() - Duration::minutes(5);
        store.upsert_timer(project.id, started).expect("start");

        let mut entry = Entry::new(project.id, "done", true);
        entry.started_at = Some(started);
        entry.ended_at = Some(started + Duration::minutes(5));
        entry.duration_ms = Duration::minutes(5).num_milliseconds();
        store.finish_timer(&mut entry).expect("finish timer");

        assert!(store.list_timers().expect("list timers").is_empty());
        assert_eq!(store.list_entries(project.id).expect("list entries").len(), 1);
    }

    #[test]
    fn stale_timer_matching_newest_entry_is_dropped() {
        let store = store();
        let project = store.create_project("Stale").expect("create project");
        let started = Utc::now() - Duration::minutes(10);

        let mut entry = Entry::new(project.id, "already logged", true);
        entry.started_at = Some(started);
        entry.ended_at = Some(started + Duration::minutes(10));
        entry.duration_ms = Duration::minutes(10).num_milliseconds();
        store.save_entry(&mut entry).expect("save entry");
        store
            .upsert_timer(project.id, started + Duration::milliseconds(400))
            .expect("start timer");

        assert!(store.get_timer(project.id).expect("get timer").is_none());
        assert!(store.list_timers().expect("list timers").is_empty());
    }

    #[test]
    fn timer_started_right_after_a_note_survives() {
        let store = store();
        let project = store.create_project("Noted").expect("create project");
        let now = Utc::now();

        let mut note = Entry::new(project.id, "kickoff", true);
        note.started_at = Some(now);
        store.save_entry(&mut note).expect("save note");
        store
            .upsert_timer(project.id, now + Duration::milliseconds(200))
            .expect("start timer");

        assert!(store.get_timer(project.id).expect("get timer").is_some());
    }

    #[test]
    fn merge_moves_entries_and_drops_source() {
        let store = store();
        let source = store.create_project("Old").expect("create source");
        let target = store.create_project("New").expect("create target");
        for hour in [9, 10] {
            let mut entry = entry_at(source.id, "work #tag", Some(hour));
            store.save_entry(&mut entry).expect("save entry");
        }
        let mut kept = entry_at(target.id, "existing", Some(11));
        store.save_entry(&mut kept).expect("save entry");
        store.upsert_timer(source.id, Utc::now()).expect("start timer");

        assert_eq!(store.merge_projects(source.id, target.id).expect("merge"), 2);
        assert!(store.get_project(source.id).expect("get project").is_none());
        assert!(store.list_timers().expect("list timers").is_empty());
        let entries = store.list_entries(target.id).expect("list entries");
        assert_eq!(entries.len(), 3);
        assert!(entries.iter().all(|entry| entry.project_id == target.id));
        assert_eq!(entries[1].tags, vec!["tag".to_string()]);

        assert!(matches!(
            store.merge_projects(source.id, target.id),
            Err(StorageError::ProjectNotFound(_))
        ));
    }

    #[test]
    fn deleting_project_cascades() {
        let store = store();
        let project = store.create_project("Cascade").expect("create project");
        let mut entry = entry_at(project.id, "work #tag", Some(9));
        store.save_entry(&mut entry).expect("save entry");
        store.upsert_timer(project.id, Utc::now()).expect("start timer");

        store.delete_project(project.id).expect("delete project");
        assert!(store.get_project(project.id).expect("get project").is_none());
        assert!(store.get_entry(&entry.id).expect("get entry").is_none());
        assert!(store.list_timers().expect("list timers").is_empty());
        assert!(matches!(store.delete_project(project.id), Err(StorageError::ProjectNotFound(_))));
    }

    #[test]
    fn opens_database_file_on_disk() {
        let dir = tempfile::tempdir().expect("temp dir");
        let path = dir.path().join("nested").join("timebook.db");
        {
            let store = Store::open(&path).expect("open store");
            store.create_project("Persisted").expect("create project");
            store.close().expect("close store");
        }

        let reopened = Store::open(&path).expect("reopen store");
        let found = reopened
            .find_project_by_name("persisted")
            .expect("find project")
            .expect("project exists");
        assert_eq!(found.name, "Persisted");
    }
}
