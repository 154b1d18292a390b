//! Persistent assistant memory
//!
//! Preferences and user facts live in JSON files; conversation history and
//! tasks live in `SQLite` behind a small connection pool. One store is
//! created per process and shared with the tool closures.

use std::collections::BTreeMap;
use std::path::Path;
use std::sync::{Mutex, MutexGuard, PoisonError};

use chrono::{DateTime, Utc};
use r2d2_sqlite::SqliteConnectionManager;
use serde::{Deserialize, Serialize};

use crate::{Error, Result};

/// Database connection pool
pub type DbPool = r2d2::Pool<SqliteConnectionManager>;

/// Current schema version
const SCHEMA_VERSION: i32 = 1;

/// A stored fact about the user
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FactEntry {
    /// The fact content
    pub content: String,
    /// When it was recorded
    pub added: DateTime<Utc>,
}

/// One saved conversation turn
#[derive(Debug, Clone)]
pub struct ConversationTurn {
    pub timestamp: DateTime<Utc>,
    pub user: String,
    pub assistant: String,
}

/// A task or reminder
#[derive(Debug, Clone)]
pub struct TaskEntry {
    pub id: i64,
    pub task: String,
    pub status: String,
    pub priority: String,
}

#[derive(Debug, Default, Serialize, Deserialize)]
struct Preferences(BTreeMap<String, String>);

#[derive(Debug, Default, Serialize, Deserialize)]
struct UserFacts(BTreeMap<String, Vec<FactEntry>>);

/// Handles all persistent memory for the assistant
pub struct MemoryStore {
    prefs_path: std::path::PathBuf,
    facts_path: std::path::PathBuf,
    prefs: Mutex<Preferences>,
    facts: Mutex<UserFacts>,
    pool: DbPool,
}

impl MemoryStore {
    /// Open (or create) the store under `data_dir`.
    ///
    /// # Errors
    ///
    /// Returns error if the directory cannot be created or the database
    /// cannot be initialized
    pub fn open(data_dir: &Path) -> Result<Self> {
        std::fs::create_dir_all(data_dir)?;

        let prefs_path = data_dir.join("preferences.json");
        let facts_path = data_dir.join("user_facts.json");

        let prefs = load_json(&prefs_path)?;
        let facts = load_json(&facts_path)?;

        let manager = SqliteConnectionManager::file(data_dir.join("conversations.db"));
        let pool = r2d2::Pool::builder()
            .max_size(2)
            .build(manager)
            .map_err(|e| Error::Memory(e.to_string()))?;

        let conn = pool.get().map_err(|e| Error::Memory(e.to_string()))?;
        init_schema(&conn)?;

        tracing::info!(path = %data_dir.display(), "memory store opened");

        Ok(Self {
            prefs_path,
            facts_path,
            prefs: Mutex::new(prefs),
            facts: Mutex::new(facts),
            pool,
        })
    }

    // ---- preferences ----

    /// Look up a preference value
    #[must_use]
    pub fn preference(&self, key: &str) -> Option<String> {
        lock(&self.prefs).0.get(key).cloned()
    }

    /// Set a preference and persist it
    ///
    /// # Errors
    ///
    /// Returns error if the preferences file cannot be written
    pub fn set_preference(&self, key: &str, value: &str) -> Result<()> {
        let mut prefs = lock(&self.prefs);
        prefs.0.insert(key.to_string(), value.to_string());
        save_json(&self.prefs_path, &*prefs)
    }

    // ---- user facts ----

    /// Record a fact under a category
    ///
    /// # Errors
    ///
    /// Returns error if the facts file cannot be written
    pub fn add_fact(&self, category: &str, content: &str) -> Result<()> {
        let mut facts = lock(&self.facts);
        facts
            .0
            .entry(category.to_string())
            .or_default()
            .push(FactEntry {
                content: content.to_string(),
                added: Utc::now(),
            });
        save_json(&self.facts_path, &*facts)
    }

    /// Facts in one category, or across all categories when `None`
    #[must_use]
    pub fn facts(&self, category: Option<&str>) -> Vec<(String, FactEntry)> {
        let facts = lock(&self.facts);
        facts
            .0
            .iter()
            .filter(|(cat, _)| category.is_none_or(|wanted| wanted == cat.as_str()))
            .flat_map(|(cat, entries)| {
                entries.iter().map(move |e| (cat.clone(), e.clone()))
            })
            .collect()
    }

    /// Case-insensitive substring search over fact contents
    #[must_use]
    pub fn search_facts(&self, query: &str) -> Vec<(String, FactEntry)> {
        let needle = query.to_lowercase();
        self.facts(None)
            .into_iter()
            .filter(|(_, e)| e.content.to_lowercase().contains(&needle))
            .collect()
    }

    // ---- conversation history ----

    /// Save one conversation turn
    ///
    /// # Errors
    ///
    /// Returns error if the database write fails
    pub fn save_conversation(
        &self,
        user: &str,
        assistant: &str,
        tools_used: &[String],
        session_id: &str,
    ) -> Result<()> {
        let conn = self.conn()?;
        conn.execute(
            "INSERT INTO conversations (timestamp, user_message, assistant_response, tools_used, session_id)
             VALUES (?1, ?2, ?3, ?4, ?5)",
            rusqlite::params![
                Utc::now().to_rfc3339(),
                user,
                assistant,
                serde_json::to_string(tools_used)?,
                session_id,
            ],
        )?;
        Ok(())
    }

    /// Most recent turns, oldest first
    ///
    /// # Errors
    ///
    /// Returns error if the query fails
    pub fn recent_conversations(&self, limit: usize) -> Result<Vec<ConversationTurn>> {
        let conn = self.conn()?;
        let mut stmt = conn.prepare(
            "SELECT timestamp, user_message, assistant_response
             FROM conversations ORDER BY id DESC LIMIT ?1",
        )?;
        let mut turns = stmt
            .query_map([limit as i64], row_to_turn)?
            .collect::<std::result::Result<Vec<_>, _>>()?;
        turns.reverse();
        Ok(turns)
    }

    /// Substring search over past turns, newest first
    ///
    /// # Errors
    ///
    /// Returns error if the query fails
    pub fn search_conversations(&self, query: &str, limit: usize) -> Result<Vec<ConversationTurn>> {
        let conn = self.conn()?;
        let pattern = format!("%{query}%");
        let mut stmt = conn.prepare(
            "SELECT timestamp, user_message, assistant_response
             FROM conversations
             WHERE user_message LIKE ?1 OR assistant_response LIKE ?1
             ORDER BY id DESC LIMIT ?2",
        )?;
        let turns = stmt
            .query_map(rusqlite::params![pattern, limit as i64], row_to_turn)?
            .collect::<std::result::Result<Vec<_>, _>>()?;
        Ok(turns)
    }

    // ---- tasks ----

    /// Add a task; returns its id
    ///
    /// # Errors
    ///
    /// Returns error if the database write fails
    pub fn add_task(&self, task: &str, priority: &str) -> Result<i64> {
        let conn = self.conn()?;
        conn.execute(
            "INSERT INTO tasks (task, status, created, priority) VALUES (?1, 'pending', ?2, ?3)",
            rusqlite::params![task, Utc::now().to_rfc3339(), priority],
        )?;
        Ok(conn.last_insert_rowid())
    }

    /// Tasks filtered by status (`"all"` lists everything), newest first
    ///
    /// # Errors
    ///
    /// Returns error if the query fails
    pub fn tasks(&self, status: &str) -> Result<Vec<TaskEntry>> {
        let conn = self.conn()?;
        let mut stmt = conn.prepare(
            "SELECT id, task, status, priority FROM tasks
             WHERE ?1 = 'all' OR status = ?1 ORDER BY id DESC",
        )?;
        let tasks = stmt
            .query_map([status], |row| {
                Ok(TaskEntry {
                    id: row.get(0)?,
                    task: row.get(1)?,
                    status: row.get(2)?,
                    priority: row.get(3)?,
                })
            })?
            .collect::<std::result::Result<Vec<_>, _>>()?;
        Ok(tasks)
    }

    /// Mark a task complete; returns false if the id is unknown
    ///
    /// # Errors
    ///
    /// Returns error if the database write fails
    pub fn complete_task(&self, id: i64) -> Result<bool> {
        let conn = self.conn()?;
        let changed = conn.execute(
            "UPDATE tasks SET status = 'completed', completed = ?1 WHERE id = ?2",
            rusqlite::params![Utc::now().to_rfc3339(), id],
        )?;
        Ok(changed > 0)
    }

    // ---- context ----

    /// Short summary of stored context for the system prompt
    #[must_use]
    pub fn context_summary(&self) -> String {
        let mut lines = Vec::new();

        if let Some(name) = self.preference("name") {
            lines.push(format!("User's name: {name}"));
        }

        let interests: Vec<String> = self
            .facts(Some("interests"))
            .into_iter()
            .rev()
            .take(3)
            .map(|(_, e)| e.content)
            .collect();
        if !interests.is_empty() {
            lines.push(format!("Interests: {}", interests.join(", ")));
        }

        if let Ok(pending) = self.tasks("pending") {
            if !pending.is_empty() {
                let items: Vec<String> = pending
                    .iter()
                    .take(3)
                    .map(|t| format!("#{}: {}", t.id, t.task))
                    .collect();
                lines.push(format!("Pending tasks: {}", items.join(", ")));
            }
        }

        if let Ok(recent) = self.recent_conversations(3) {
            if !recent.is_empty() {
                let topics: Vec<String> = recent
                    .iter()
                    .map(|t| t.user.chars().take(50).collect())
                    .collect();
                lines.push(format!("Recent topics: {}", topics.join(", ")));
            }
        }

        if lines.is_empty() {
            "No stored context yet".to_string()
        } else {
            lines.join("\n")
        }
    }

    fn conn(&self) -> Result<r2d2::PooledConnection<SqliteConnectionManager>> {
        self.pool.get().map_err(|e| Error::Memory(e.to_string()))
    }
}

fn row_to_turn(row: &rusqlite::Row<'_>) -> rusqlite::Result<ConversationTurn> {
    let timestamp: String = row.get(0)?;
    Ok(ConversationTurn {
        timestamp: DateTime::parse_from_rfc3339(&timestamp)
            .map(|t| t.with_timezone(&Utc))
            .unwrap_or_else(|_| Utc::now()),
        user: row.get(1)?,
        assistant: row.get(2)?,
    })
}

fn init_schema(conn: &rusqlite::Connection) -> Result<()> {
    let version: i32 = conn
        .query_row("PRAGMA user_version", [], |row| row.get(0))
        .unwrap_or(0);

    if version < 1 {
        conn.execute_batch(
            "CREATE TABLE IF NOT EXISTS conversations (
                 id INTEGER PRIMARY KEY AUTOINCREMENT,
                 timestamp TEXT NOT NULL,
                 user_message TEXT NOT NULL,
                 assistant_response TEXT NOT NULL,
                 tools_used TEXT,
                 session_id TEXT
             );
             CREATE TABLE IF NOT EXISTS tasks (
                 id INTEGER PRIMARY KEY AUTOINCREMENT,
                 task TEXT NOT NULL,
                 status TEXT NOT NULL,
                 created TEXT NOT NULL,
                 completed TEXT,
                 priority TEXT NOT NULL
             );
             PRAGMA user_version = 1;",
        )?;
    }

    tracing::debug!(version = SCHEMA_VERSION, "memory schema ready");
    Ok(())
}

fn load_json<T: Default + for<'de> Deserialize<'de>>(path: &Path) -> Result<T> {
    if !path.exists() {
        return Ok(T::default());
    }
    let content = std::fs::read_to_string(path)?;
    Ok(serde_json::from_str(&content)?)
}

fn save_json<T: Serialize>(path: &Path, value: &T) -> Result<()> {
    std::fs::write(path, serde_json::to_string_pretty(value)?)?;
    Ok(())
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn store() -> (tempfile::TempDir, MemoryStore) {
        let dir = tempfile::tempdir().unwrap();
        let store = MemoryStore::open(dir.path()).unwrap();
        (dir, store)
    }

    #[test]
    fn preferences_roundtrip_and_persist() {
        let (dir, store) = store();
        store.set_preference("name", "Ada").unwrap();
        assert_eq!(store.preference("name").as_deref(), Some("Ada"));

        // Reopen from disk
        drop(store);
        let reopened = MemoryStore::open(dir.path()).unwrap();
        assert_eq!(reopened.preference("name").as_deref(), Some("Ada"));
    }

    #[test]
    fn facts_are_searchable() {
        let (_dir, store) = store();
        store.add_fact("interests", "loves pizza").unwrap();
        store.add_fact("contacts", "sister lives in Oslo").unwrap();

        assert_eq!(store.facts(Some("interests")).len(), 1);
        assert_eq!(store.facts(None).len(), 2);
        let hits = store.search_facts("PIZZA");
        assert_eq!(hits.len(), 1);
        assert_eq!(hits[0].0, "interests");
    }

    #[test]
    fn conversations_are_saved_and_searched() {
        let (_dir, store) = store();
        store
            .save_conversation("what's rust", "a systems language", &[], "s1")
            .unwrap();
        store
            .save_conversation("weather?", "sunny", &["web_search".to_string()], "s1")
            .unwrap();

        let recent = store.recent_conversations(10).unwrap();
        assert_eq!(recent.len(), 2);
        assert_eq!(recent[0].user, "what's rust");

        let hits = store.search_conversations("sunny", 10).unwrap();
        assert_eq!(hits.len(), 1);
    }

    #[test]
    fn task_lifecycle() {
        let (_dir, store) = store();
        let id = store.add_task("water the plants", "medium").unwrap();
        assert_eq!(store.tasks("pending").unwrap().len(), 1);

        assert!(store.complete_task(id).unwrap());
        assert!(store.tasks("pending").unwrap().is_empty());
        assert_eq!(store.tasks("completed").unwrap().len(), 1);
        assert_eq!(store.tasks("all").unwrap().len(), 1);

        assert!(!store.complete_task(9_999).unwrap());
    }

    #[test]
    fn context_summary_mentions_stored_items() {
        let (_dir, store) = store();
        assert_eq!(store.context_summary(), "No stored context yet");

        store.set_preference("name", "Ada").unwrap();
        store.add_fact("interests", "chess").unwrap();
        store.add_task("book flight", "high").unwrap();

        let summary = store.context_summary();
        assert!(summary.contains("Ada"));
        assert!(summary.contains("chess"));
        assert!(summary.contains("book flight"));
    }
}
