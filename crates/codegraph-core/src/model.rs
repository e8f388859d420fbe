//! Core data model: entities, relationships, projects, sessions, cache entries.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// The kinds of code objects the graph stores.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EntityKind {
    File,
    Function,
    Class,
    Variable,
    Import,
}

impl EntityKind {
    pub fn as_str(self) -> &'static str {
        match self {
            EntityKind::File => "file",
            EntityKind::Function => "function",
            EntityKind::Class => "class",
            EntityKind::Variable => "variable",
            EntityKind::Import => "import",
        }
    }
}

impl std::fmt::Display for EntityKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Source languages the parser understands.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Language {
    Python,
    Javascript,
    Typescript,
    Java,
}

impl Language {
    /// Detect the language from a file extension (without the leading dot).
    pub fn from_extension(ext: &str) -> Option<Self> {
        match ext {
            "py" => Some(Language::Python),
            "js" | "jsx" | "mjs" | "cjs" => Some(Language::Javascript),
            "ts" | "tsx" => Some(Language::Typescript),
            "java" => Some(Language::Java),
            _ => None,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Language::Python => "python",
            Language::Javascript => "javascript",
            Language::Typescript => "typescript",
            Language::Java => "java",
        }
    }
}

impl std::fmt::Display for Language {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A deterministically-identified code object.
///
/// Identity is assigned once at extraction time (see `codegraph_parser::id`)
/// and never recomputed by consumers; the fields below are otherwise free to
/// change across re-ingests of the same project.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Entity {
    pub id: String,
    pub project_id: String,
    pub kind: EntityKind,
    pub name: String,
    /// POSIX-normalized, project-relative path.
    pub file_path: String,
    pub start_line: usize,
    pub end_line: usize,
    pub language: Language,
    pub signature: Option<String>,
    pub docstring: Option<String>,
    /// Bounded to 500 chars at extraction time.
    pub body: Option<String>,
    #[serde(default)]
    pub metadata: BTreeMap<String, serde_json::Value>,
}

impl Entity {
    /// Truncates `body` to the stored 500-char cap; used by extractors so
    /// every `Entity` they hand off already satisfies the invariant.
    pub fn truncate_body(text: &str) -> String {
        if text.chars().count() <= 500 {
            text.to_string()
        } else {
            text.chars().take(500).collect()
        }
    }
}

/// The closed set of relationship kinds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum RelationshipKind {
    Defines,
    Calls,
    Imports,
    Extends,
    Implements,
    Uses,
    Tests,
}

impl RelationshipKind {
    pub fn as_str(self) -> &'static str {
        match self {
            RelationshipKind::Defines => "DEFINES",
            RelationshipKind::Calls => "CALLS",
            RelationshipKind::Imports => "IMPORTS",
            RelationshipKind::Extends => "EXTENDS",
            RelationshipKind::Implements => "IMPLEMENTS",
            RelationshipKind::Uses => "USES",
            RelationshipKind::Tests => "TESTS",
        }
    }
}

impl std::fmt::Display for RelationshipKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Prefix used for synthetic nodes standing in for import targets outside
/// the project (`external:<module>`).
pub const EXTERNAL_MODULE_PREFIX: &str = "external:";

pub fn external_module_id(module: &str) -> String {
    format!("{EXTERNAL_MODULE_PREFIX}{module}")
}

pub fn is_external_module_id(id: &str) -> bool {
    id.starts_with(EXTERNAL_MODULE_PREFIX)
}

/// A directed, typed edge between two entities.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Relationship {
    pub source_id: String,
    pub target_id: String,
    pub kind: RelationshipKind,
    #[serde(default)]
    pub metadata: BTreeMap<String, serde_json::Value>,
}

impl Relationship {
    pub fn new(source_id: impl Into<String>, target_id: impl Into<String>, kind: RelationshipKind) -> Self {
        Self {
            source_id: source_id.into(),
            target_id: target_id.into(),
            kind,
            metadata: BTreeMap::new(),
        }
    }

    /// Identity used for de-duplication: (source, target, kind).
    pub fn dedup_key(&self) -> (String, String, RelationshipKind) {
        (self.source_id.clone(), self.target_id.clone(), self.kind)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ProjectStatus {
    Active,
    Deleted,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Project {
    pub id: String,
    pub name: String,
    pub owner_id: String,
    pub created_at: chrono::DateTime<chrono::Utc>,
    pub file_count: usize,
    pub entity_count: usize,
    pub status: ProjectStatus,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SessionStatus {
    Pending,
    Processing,
    Completed,
    Failed,
}

/// Progress-bearing record of one ingestion job. The only cross-process
/// state the core owns — sessions persist through restarts.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Session {
    pub session_id: String,
    pub project_id: String,
    pub status: SessionStatus,
    pub progress: f64,
    pub files_processed: usize,
    pub total_files: usize,
    pub entities_extracted: usize,
    #[serde(default)]
    pub errors: Vec<String>,
    #[serde(default)]
    pub statistics: BTreeMap<String, serde_json::Value>,
    pub created_at: chrono::DateTime<chrono::Utc>,
    pub updated_at: chrono::DateTime<chrono::Utc>,
}

impl Session {
    pub fn new(session_id: impl Into<String>, project_id: impl Into<String>, total_files: usize) -> Self {
        let now = chrono::Utc::now();
        Self {
            session_id: session_id.into(),
            project_id: project_id.into(),
            status: SessionStatus::Pending,
            progress: 0.0,
            files_processed: 0,
            total_files,
            entities_extracted: 0,
            errors: Vec::new(),
            statistics: BTreeMap::new(),
            created_at: now,
            updated_at: now,
        }
    }

    /// Monotonic advance: never moves status backward (pending -> processing
    /// -> completed|failed), and never decreases progress.
    pub fn advance(&mut self, status: SessionStatus, progress: f64) {
        if status_rank(status) >= status_rank(self.status) {
            self.status = status;
        }
        if progress > self.progress {
            self.progress = progress;
        }
        self.updated_at = chrono::Utc::now();
    }

    pub fn record_error(&mut self, error: impl Into<String>) {
        self.errors.push(error.into());
        self.updated_at = chrono::Utc::now();
    }
}

fn status_rank(status: SessionStatus) -> u8 {
    match status {
        SessionStatus::Pending => 0,
        SessionStatus::Processing => 1,
        SessionStatus::Completed | SessionStatus::Failed => 2,
    }
}

/// One cached query result, keyed externally by its fingerprint.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CacheEntry {
    pub value: serde_json::Value,
    pub stored_at: chrono::DateTime<chrono::Utc>,
    pub ttl_seconds: u64,
}

impl CacheEntry {
    pub fn new(value: serde_json::Value, ttl_seconds: u64) -> Self {
        Self {
            value,
            stored_at: chrono::Utc::now(),
            ttl_seconds,
        }
    }

    pub fn is_expired(&self, now: chrono::DateTime<chrono::Utc>) -> bool {
        let age = now.signed_duration_since(self.stored_at);
        age.num_seconds() >= self.ttl_seconds as i64
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn session_advance_never_regresses_status() {
        let mut s = Session::new("s1", "p1", 10);
        s.advance(SessionStatus::Processing, 0.2);
        assert_eq!(s.status, SessionStatus::Processing);
        s.advance(SessionStatus::Pending, 0.1);
        assert_eq!(s.status, SessionStatus::Processing);
        assert_eq!(s.progress, 0.2);
        s.advance(SessionStatus::Completed, 1.0);
        assert_eq!(s.status, SessionStatus::Completed);
    }

    #[test]
    fn cache_entry_expiry() {
        let entry = CacheEntry::new(serde_json::json!({"a": 1}), 0);
        assert!(entry.is_expired(chrono::Utc::now() + chrono::Duration::seconds(1)));
    }

    #[test]
    fn external_module_id_roundtrip() {
        let id = external_module_id("numpy");
        assert_eq!(id, "external:numpy");
        assert!(is_external_module_id(&id));
        assert!(!is_external_module_id("P_function_add_1_abcd"));
    }
}
