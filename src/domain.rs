use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{info, warn};

use crate::clock::{extract_tags, HoursMins};
use crate::ids;
use crate::storage::{StorageError, Store};

#[derive(Debug, Error)]
pub enum DomainError {
    #[error("no running timer for project '{0}'")]
    NoRunningTimer(String),
    #[error("duration cannot be negative")]
    NegativeDuration,
    #[error("cannot move project '{0}' into itself")]
    SameProject(String),
    #[error(transparent)]
    Storage(#[from] StorageError),
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum EntryType {
    #[default]
    Work,
    Chore,
    Fun,
}

impl EntryType {
    pub fn as_str(self) -> &'static str {
        match self {
            EntryType::Work => "WORK",
            EntryType::Chore => "CHORE",
            EntryType::Fun => "FUN",
        }
    }
}

impl fmt::Display for EntryType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for EntryType {
    type Err = String;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_ascii_uppercase().as_str() {
            "WORK" => Ok(EntryType::Work),
            "CHORE" => Ok(EntryType::Chore),
            "FUN" => Ok(EntryType::Fun),
            other => Err(format!("unknown entry type '{other}'")),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Project {
    pub id: i64,
    pub name: String,
    pub company: Option<String>,
    pub is_hidden: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Entry {
    pub id: String,
    pub project_id: i64,
    pub creator_id: Option<i64>,
    pub content: String,
    pub duration_ms: i64,
    pub started_at: Option<DateTime<Utc>>,
    pub ended_at: Option<DateTime<Utc>>,
    pub entry_type: EntryType,
    pub billable: bool,
    pub tags: Vec<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Timer {
    pub project_id: i64,
    pub started_at: DateTime<Utc>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Project {
    /// Creates a project after checking the name against existing ones,
    /// ignoring case.
    pub fn create(store: &Store, name: &str) -> Result<Project, DomainError> {
        let name = name.trim();
        if name.is_empty() {
            return Err(StorageError::InvalidName.into());
        }
        if find_by_name(&store.list_projects()?, name, None).is_some() {
            return Err(StorageError::DuplicateName(name.to_string()).into());
        }
        Ok(store.create_project(name)?)
    }

    /// All projects sorted by lowercase name.
    pub fn list(store: &Store) -> Result<Vec<Project>, DomainError> {
        let mut projects = store.list_projects()?;
        projects.sort_by_cached_key(|project| project.name.to_lowercase());
        Ok(projects)
    }

    pub fn find(store: &Store, name: &str) -> Result<Option<Project>, DomainError> {
        if let Some(project) = store.find_project_by_name(name)? {
            return Ok(Some(project));
        }
        let projects = store.list_projects()?;
        Ok(find_by_name(&projects, name.trim(), None).cloned())
    }

    /// Display key derived from the name.
    pub fn key(&self) -> String {
        ids::project_hash(&self.name)
    }

    pub fn entries(&self, store: &Store) -> Result<Vec<Entry>, DomainError> {
        Ok(store.list_entries(self.id)?)
    }

    /// Starts the timer; a running one is restarted from `now`.
    pub fn start_timer(&self, store: &Store, now: DateTime<Utc>) -> Result<Timer, DomainError> {
        Ok(store.upsert_timer(self.id, now)?)
    }

    pub fn on_clock(&self, store: &Store) -> (bool, Option<Timer>) {
        match store.get_timer(self.id) {
            Ok(timer) => (timer.is_some(), timer),
            Err(err) => {
                warn!(project = %self.name, error = %err, "failed to read timer");
                (false, None)
            }
        }
    }

    pub fn stop_timer(
        &self,
        store: &Store,
        content: &str,
        billable: bool,
        now: DateTime<Utc>,
    ) -> Result<Entry, DomainError> {
        let timer = store
            .get_timer(self.id)?
            .ok_or_else(|| DomainError::NoRunningTimer(self.name.clone()))?;

        let start = timer.started_at;
        let end = now.max(start);
        let mut entry = Entry::new(self.id, content, billable);
        entry.started_at = Some(start);
        entry.ended_at = Some(end);
        entry.duration_ms = (end - start).num_milliseconds();

        store.finish_timer(&mut entry)?;
        Ok(entry)
    }

    /// Discards the running timer without logging anything.
    pub fn cancel_timer(&self, store: &Store) -> Result<(), DomainError> {
        store.delete_timer(self.id)?;
        info!(project = %self.name, "timer cancelled");
        Ok(())
    }

    /// Records a zero-length note at `now`.
    pub fn create_entry(
        &self,
        store: &Store,
        content: &str,
        billable: bool,
        now: DateTime<Utc>,
    ) -> Result<Entry, DomainError> {
        let mut entry = Entry::new(self.id, content, billable);
        entry.started_at = Some(now);
        store.save_entry(&mut entry)?;
        Ok(entry)
    }

    pub fn create_entry_with_duration(
        &self,
        store: &Store,
        content: &str,
        duration: Duration,
        billable: bool,
        now: DateTime<Utc>,
    ) -> Result<Entry, DomainError> {
        if duration < Duration::zero() {
            return Err(DomainError::NegativeDuration);
        }

        let mut entry = Entry::new(self.id, content, billable);
        entry.started_at = Some(now - duration);
        entry.ended_at = Some(now);
        entry.duration_ms = duration.num_milliseconds();
        store.save_entry(&mut entry)?;
        info!(project = %self.name, duration_ms = entry.duration_ms, "logged manual entry");
        Ok(entry)
    }

    /// Renames the project. Returns `false` when the new name only differs in
    /// case (or not at all) from the current one.
    pub fn rename(&mut self, store: &Store, new_name: &str) -> Result<bool, DomainError> {
        let new_name = new_name.trim();
        if new_name.is_empty() {
            return Err(StorageError::InvalidName.into());
        }
        if new_name.to_lowercase() == self.name.to_lowercase() {
            return Ok(false);
        }
        if find_by_name(&store.list_projects()?, new_name, Some(self.id)).is_some() {
            return Err(StorageError::DuplicateName(new_name.to_string()).into());
        }

        *self = store.rename_project(self.id, new_name)?;
        Ok(true)
    }

    pub fn delete(&self, store: &Store) -> Result<(), DomainError> {
        Ok(store.delete_project(self.id)?)
    }

    /// Moves every entry into `target` and deletes this project, timer
    /// included. Returns how many entries moved.
    pub fn merge_into(&self, store: &Store, target: &Project) -> Result<usize, DomainError> {
        if self.id == target.id {
            return Err(DomainError::SameProject(self.name.clone()));
        }
        let moved = store.merge_projects(self.id, target.id)?;
        info!(from = %self.name, to = %target.name, moved, "merged project");
        Ok(moved)
    }
}

fn find_by_name<'a>(projects: &'a [Project], name: &str, except: Option<i64>) -> Option<&'a Project> {
    let wanted = name.to_lowercase();
    projects
        .iter()
        .filter(|project| Some(project.id) != except)
        .find(|project| project.name.to_lowercase() == wanted)
}

impl Entry {
    /// A fresh WORK entry with trimmed content and tags taken from it.
    pub fn new(project_id: i64, content: &str, billable: bool) -> Self {
        Self {
            id: ids::uuid(),
            project_id,
            creator_id: None,
            content: content.trim().to_string(),
            duration_ms: 0,
            started_at: None,
            ended_at: None,
            entry_type: EntryType::Work,
            billable,
            tags: extract_tags(content),
            created_at: DateTime::default(),
            updated_at: DateTime::default(),
        }
    }

    pub fn duration(&self) -> Duration {
        Duration::milliseconds(self.duration_ms)
    }

    pub fn hours_mins(&self) -> HoursMins {
        HoursMins::from_duration(self.duration())
    }

    /// Timestamp the entry is filed under: its end, or its start for notes.
    pub fn logged_at(&self) -> Option<DateTime<Utc>> {
        self.ended_at.or(self.started_at)
    }

    pub fn summary(&self) -> &str {
        self.content
            .lines()
            .next()
            .filter(|line| !line.trim().is_empty())
            .unwrap_or("(no description)")
    }

    /// Replaces the content and re-derives the tags from it.
    pub fn set_content(&mut self, content: &str) {
        self.content = content.trim().to_string();
        self.tags = extract_tags(content);
    }

    pub fn project(&self, store: &Store) -> Result<Option<Project>, DomainError> {
        Ok(store.get_project(self.project_id)?)
    }

    pub fn update(&mut self, store: &Store) -> Result<(), DomainError> {
        Ok(store.update_entry(self)?)
    }

    pub fn delete(&self, store: &Store) -> Result<(), DomainError> {
        Ok(store.delete_entry(&self.id)?)
    }

    /// Reassigns the entry to `target`; on failure the entry keeps its owner.
    pub fn move_to(&mut self, store: &Store, target: &Project) -> Result<(), DomainError> {
        let previous = self.project_id;
        self.project_id = target.id;
        if let Err(err) = store.update_entry(self) {
            self.project_id = previous;
            return Err(err.into());
        }
        info!(entry_id = %self.id, from = previous, to = target.id, "moved entry");
        Ok(())
    }
}

impl Timer {
    pub fn elapsed(&self, now: DateTime<Utc>) -> Duration {
        (now - self.started_at).max(Duration::zero())
    }

    pub fn hours_mins(&self, now: DateTime<Utc>) -> HoursMins {
        HoursMins::from_duration(self.elapsed(now))
    }
}
