//! Core data models used throughout the search service.
//!
//! Three document kinds live in the store — [`CodeChunk`], [`TypeDefinition`],
//! and [`ConversationMemory`] — plus the transient [`ContextBundle`] assembled
//! by the context bundler. The store owns persistence; these types own the
//! wire contract. Property names are camelCase on the wire because the
//! indexed corpus is TypeScript/JavaScript and the feeder writes identifiers
//! as they appear in source.
//!
//! Chunks are immutable in-store: the feeder replaces them by delete+insert,
//! and the core never writes to `CodeChunk` or `TypeDefinition`.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Kind of logical code unit a chunk represents.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ChunkType {
    Function,
    Class,
    Component,
    Hook,
    Service,
    Migration,
}

impl ChunkType {
    pub fn as_str(&self) -> &'static str {
        match self {
            ChunkType::Function => "function",
            ChunkType::Class => "class",
            ChunkType::Component => "component",
            ChunkType::Hook => "hook",
            ChunkType::Service => "service",
            ChunkType::Migration => "migration",
        }
    }
}

impl Default for ChunkType {
    fn default() -> Self {
        ChunkType::Function
    }
}

impl std::str::FromStr for ChunkType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "function" => Ok(ChunkType::Function),
            "class" => Ok(ChunkType::Class),
            "component" => Ok(ChunkType::Component),
            "hook" => Ok(ChunkType::Hook),
            "service" => Ok(ChunkType::Service),
            "migration" => Ok(ChunkType::Migration),
            other => Err(format!("unknown chunk type: {other}")),
        }
    }
}

/// A parsed logical unit of code, written by the feeder.
///
/// Identity is `(project, filePath, name, lineStart)`. Invariants maintained
/// by the feeder: `line_start <= line_end`,
/// `line_count == line_end - line_start + 1`, `dependencies ⊆ imports`, and
/// hooks are named `use…`.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct CodeChunk {
    pub name: String,
    pub content: String,
    /// Project-relative path of the source file.
    pub file_path: String,
    pub project: String,
    pub chunk_type: ChunkType,
    pub language: String,
    pub line_start: i64,
    pub line_end: i64,
    pub line_count: i64,
    pub signature: String,
    /// Doc-comment immediately preceding the chunk.
    pub js_doc: String,
    /// Raw import specifiers of the containing file.
    pub imports: Vec<String>,
    /// Subset of `imports` resolved to project-relative paths.
    pub dependencies: Vec<String>,
    /// Type names referenced by the chunk body.
    pub used_types: Vec<String>,
    pub is_exported: bool,
    pub is_async: bool,
    pub complexity: i64,
    pub last_modified: Option<String>,
    pub git_commit: Option<String>,
}

impl Default for CodeChunk {
    fn default() -> Self {
        Self {
            name: String::new(),
            content: String::new(),
            file_path: String::new(),
            project: String::new(),
            chunk_type: ChunkType::Function,
            language: String::new(),
            line_start: 0,
            line_end: 0,
            line_count: 0,
            signature: String::new(),
            js_doc: String::new(),
            imports: Vec::new(),
            dependencies: Vec::new(),
            used_types: Vec::new(),
            is_exported: false,
            is_async: false,
            complexity: 0,
            last_modified: None,
            git_commit: None,
        }
    }
}

/// Kind of a type definition.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TypeKind {
    Interface,
    Type,
    Enum,
    Const,
}

impl TypeKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            TypeKind::Interface => "interface",
            TypeKind::Type => "type",
            TypeKind::Enum => "enum",
            TypeKind::Const => "const",
        }
    }
}

impl Default for TypeKind {
    fn default() -> Self {
        TypeKind::Interface
    }
}

/// An interface, type alias, enum, or const-type, written by the feeder.
///
/// Identity is `(project, filePath, name)`.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct TypeDefinition {
    pub name: String,
    pub content: String,
    pub file_path: String,
    pub project: String,
    pub type_kind: TypeKind,
    /// Property names declared by the type.
    pub properties: Vec<String>,
    pub extends_types: Vec<String>,
    pub js_doc: String,
    pub is_exported: bool,
    /// Path-heuristic flag set by the feeder for database-layer types.
    pub from_database: bool,
}

/// A summary of a prior agent session.
///
/// Created when an agent saves a session; mutated only by the memory
/// compactor, which deletes originals and inserts one compacted record per
/// project per time window. Never edited in place.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ConversationMemory {
    pub session_id: String,
    pub summary: String,
    /// Short free-form decision statements.
    pub decisions: Vec<String>,
    pub files_modified: Vec<String>,
    /// Project name; `"general"` when the session was not project-scoped.
    pub project: String,
    pub topics: Vec<String>,
    pub timestamp: DateTime<Utc>,
    pub agent_type: String,
    pub model: String,
    pub task_type: String,
    pub cost: f64,
    pub input_tokens: i64,
    pub output_tokens: i64,
    pub parent_session_id: Option<String>,
}

impl Default for ConversationMemory {
    fn default() -> Self {
        Self {
            session_id: String::new(),
            summary: String::new(),
            decisions: Vec::new(),
            files_modified: Vec::new(),
            project: "general".to_string(),
            topics: Vec::new(),
            timestamp: Utc::now(),
            agent_type: String::new(),
            model: String::new(),
            task_type: String::new(),
            cost: 0.0,
            input_tokens: 0,
            output_tokens: 0,
            parent_session_id: None,
        }
    }
}

/// A file-centric context package returned by the context bundler.
///
/// Not persisted. Every chunk carries enough for an implementer to read it
/// back without another lookup: path, name, content, and line range.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ContextBundle {
    pub main_file: BundledFile,
    /// Dependency files, exported symbols only. Paths are distinct from the
    /// main file and from each other.
    pub related_files: Vec<BundledFile>,
    pub types: Vec<BundledType>,
    pub total_lines: i64,
}

/// One file within a [`ContextBundle`], chunks ordered by `lineStart`.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct BundledFile {
    pub path: String,
    pub chunks: Vec<BundledChunk>,
    pub line_count: i64,
}

/// One chunk within a [`BundledFile`].
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct BundledChunk {
    pub name: String,
    #[serde(rename = "type")]
    pub chunk_type: String,
    pub line_start: i64,
    pub line_end: i64,
    pub signature: String,
    pub content: String,
}

/// A type-definition excerpt within a [`ContextBundle`].
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct BundledType {
    pub name: String,
    pub kind: String,
    pub file: String,
    pub content: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_code_chunk_wire_names() {
        let chunk = CodeChunk {
            name: "useAuth".to_string(),
            file_path: "src/hooks/useAuth.ts".to_string(),
            chunk_type: ChunkType::Hook,
            js_doc: "Auth hook".to_string(),
            is_exported: true,
            ..Default::default()
        };
        let value = serde_json::to_value(&chunk).unwrap();
        assert_eq!(value["filePath"], "src/hooks/useAuth.ts");
        assert_eq!(value["chunkType"], "hook");
        assert_eq!(value["jsDoc"], "Auth hook");
        assert_eq!(value["isExported"], true);
    }

    #[test]
    fn test_code_chunk_partial_deserialize() {
        // Store projections may omit fields; the rest must default.
        let value = serde_json::json!({
            "name": "fetchUser",
            "filePath": "src/api/user.ts",
            "lineStart": 10
        });
        let chunk: CodeChunk = serde_json::from_value(value).unwrap();
        assert_eq!(chunk.name, "fetchUser");
        assert_eq!(chunk.line_start, 10);
        assert_eq!(chunk.chunk_type, ChunkType::Function);
        assert!(chunk.dependencies.is_empty());
    }

    #[test]
    fn test_memory_defaults_to_general_project() {
        let value = serde_json::json!({ "sessionId": "s1", "summary": "did things" });
        let memory: ConversationMemory = serde_json::from_value(value).unwrap();
        assert_eq!(memory.project, "general");
    }
}
