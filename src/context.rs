//! File-centric context bundling.
//!
//! Given a file path, assemble a dependency-aware context package: the
//! file's own chunks, one level of imported-from-project dependencies
//! (exported symbols only), and the type definitions the file references.
//! The bundle is what an agent reads before modifying the file, so every
//! chunk carries path, name, content, and line range — no follow-up lookups.
//!
//! Dependency specifiers pass through alias rewriting (`@/` → `src/` by
//! default) and relative-prefix stripping; bare package specifiers resolve
//! to nothing in-project and are dropped. Expansion is one level deep, so
//! import cycles terminate trivially: each file appears at most once.

use std::collections::BTreeMap;

use crate::error::{Error, Result};
use crate::models::{BundledChunk, BundledFile, BundledType, CodeChunk, ContextBundle, TypeDefinition};
use crate::store::{collections, Filter, Store};

/// Chunks fetched for the main file. Files with more parsed units than this
/// are pathological; the bundle takes the first page.
const MAIN_FILE_CHUNK_CAP: usize = 50;
const RELATED_FILE_CHUNK_CAP: usize = 5;
const TYPE_CAP: usize = 20;

#[derive(Debug, Clone)]
pub struct ContextOptions {
    pub project: String,
    pub max_files: usize,
    pub include_types: bool,
    /// Import-path alias map, e.g. `@/` → `src/`.
    pub aliases: BTreeMap<String, String>,
}

impl ContextOptions {
    pub fn new(project: impl Into<String>) -> Self {
        let mut aliases = BTreeMap::new();
        aliases.insert("@/".to_string(), "src/".to_string());
        Self {
            project: project.into(),
            max_files: 10,
            include_types: true,
            aliases,
        }
    }
}

/// Assemble the context bundle for `file_path`.
///
/// # Errors
///
/// `NotFound` when the path has no indexed chunks in the project.
pub async fn build_context(
    store: &dyn Store,
    file_path: &str,
    opts: &ContextOptions,
) -> Result<ContextBundle> {
    // Main file: exact path match.
    let filter = Filter::and(vec![
        Filter::eq("filePath", file_path),
        Filter::eq("project", opts.project.as_str()),
    ]);
    let objects = store
        .filter_fetch(collections::CODE_CHUNK, &filter, MAIN_FILE_CHUNK_CAP, &[])
        .await?;
    if objects.is_empty() {
        return Err(Error::NotFound(format!(
            "no indexed chunks for {file_path} in project {}",
            opts.project
        )));
    }

    let mut main_chunks: Vec<CodeChunk> = Vec::with_capacity(objects.len());
    for object in &objects {
        main_chunks.push(parse_chunk(&object.properties)?);
    }
    main_chunks.sort_by_key(|c| c.line_start);

    // One-level dependency union, insertion-ordered.
    let mut dependencies: Vec<String> = Vec::new();
    let mut used_types: Vec<String> = Vec::new();
    for chunk in &main_chunks {
        for dep in &chunk.dependencies {
            if let Some(normalized) = normalize_specifier(dep, &opts.aliases) {
                if !dependencies.contains(&normalized) {
                    dependencies.push(normalized);
                }
            }
        }
        for ty in &chunk.used_types {
            if !used_types.contains(ty) {
                used_types.push(ty.clone());
            }
        }
    }
    dependencies.truncate(opts.max_files);

    // Related files: exported chunks whose path contains the prefix.
    let mut seen_paths = vec![file_path.to_string()];
    let mut related_files: Vec<BundledFile> = Vec::new();
    for prefix in &dependencies {
        if related_files.len() >= opts.max_files {
            break;
        }
        let filter = Filter::and(vec![
            Filter::eq("project", opts.project.as_str()),
            Filter::like("filePath", prefix),
        ]);
        let objects = store
            .filter_fetch(collections::CODE_CHUNK, &filter, RELATED_FILE_CHUNK_CAP, &[])
            .await?;

        let mut by_path: BTreeMap<String, Vec<CodeChunk>> = BTreeMap::new();
        for object in &objects {
            let chunk = parse_chunk(&object.properties)?;
            if !chunk.is_exported || seen_paths.contains(&chunk.file_path) {
                continue;
            }
            by_path.entry(chunk.file_path.clone()).or_default().push(chunk);
        }

        for (path, mut chunks) in by_path {
            if related_files.len() >= opts.max_files {
                break;
            }
            chunks.sort_by_key(|c| c.line_start);
            seen_paths.push(path.clone());
            related_files.push(bundle_file(path, &chunks));
        }
    }

    // Referenced type definitions.
    let mut types: Vec<BundledType> = Vec::new();
    if opts.include_types && !used_types.is_empty() {
        let filter = Filter::and(vec![
            Filter::eq("project", opts.project.as_str()),
            Filter::contains_any("name", used_types.iter().map(String::as_str)),
        ]);
        let objects = store
            .filter_fetch(collections::TYPE_DEFINITION, &filter, TYPE_CAP, &[])
            .await?;
        for object in &objects {
            let def: TypeDefinition = serde_json::from_value(object.properties.clone())
                .map_err(|e| Error::Schema(format!("malformed type definition: {e}")))?;
            let duplicate = types
                .iter()
                .any(|t| t.name == def.name && t.file == def.file_path);
            if !duplicate {
                types.push(BundledType {
                    name: def.name,
                    kind: def.type_kind.as_str().to_string(),
                    file: def.file_path,
                    content: def.content,
                });
            }
        }
    }

    let main_file = bundle_file(file_path.to_string(), &main_chunks);
    let total_lines = main_file.line_count
        + related_files.iter().map(|f| f.line_count).sum::<i64>()
        + types
            .iter()
            .map(|t| t.content.lines().count() as i64)
            .sum::<i64>();

    Ok(ContextBundle {
        main_file,
        related_files,
        types,
        total_lines,
    })
}

/// Rewrite aliases, strip relative prefixes, and drop anything that does
/// not resolve to an in-project path (third-party packages).
pub fn normalize_specifier(spec: &str, aliases: &BTreeMap<String, String>) -> Option<String> {
    let spec = spec.trim();
    if spec.is_empty() {
        return None;
    }

    for (from, to) in aliases {
        if let Some(rest) = spec.strip_prefix(from.as_str()) {
            let path = format!("{to}{rest}");
            return (!path.is_empty()).then_some(path);
        }
    }

    if spec.starts_with("./") || spec.starts_with("../") {
        let mut rest = spec;
        loop {
            if let Some(stripped) = rest.strip_prefix("./") {
                rest = stripped;
            } else if let Some(stripped) = rest.strip_prefix("../") {
                rest = stripped;
            } else {
                break;
            }
        }
        return (!rest.is_empty()).then(|| rest.to_string());
    }

    // Bare specifier: a third-party package, not a project path.
    None
}

fn parse_chunk(value: &serde_json::Value) -> Result<CodeChunk> {
    serde_json::from_value(value.clone())
        .map_err(|e| Error::Schema(format!("malformed code chunk: {e}")))
}

fn bundle_file(path: String, chunks: &[CodeChunk]) -> BundledFile {
    let line_count = chunks.iter().map(|c| c.line_count).sum();
    BundledFile {
        path,
        chunks: chunks
            .iter()
            .map(|c| BundledChunk {
                name: c.name.clone(),
                chunk_type: c.chunk_type.as_str().to_string(),
                line_start: c.line_start,
                line_end: c.line_end,
                signature: c.signature.clone(),
                content: c.content.clone(),
            })
            .collect(),
        line_count,
    }
}

/// CLI wrapper: build and print a context bundle.
pub async fn run_context(
    store: &dyn Store,
    file_path: &str,
    opts: &ContextOptions,
) -> anyhow::Result<()> {
    let bundle = build_context(store, file_path, opts).await?;

    println!("--- {} ({} lines) ---", bundle.main_file.path, bundle.main_file.line_count);
    for chunk in &bundle.main_file.chunks {
        println!(
            "  {} {} (lines {}-{})",
            chunk.chunk_type, chunk.name, chunk.line_start, chunk.line_end
        );
    }

    if !bundle.related_files.is_empty() {
        println!();
        println!("Related files:");
        for file in &bundle.related_files {
            println!("  {} ({} exported chunks)", file.path, file.chunks.len());
        }
    }

    if !bundle.types.is_empty() {
        println!();
        println!("Types:");
        for ty in &bundle.types {
            println!("  {} {} ({})", ty.kind, ty.name, ty.file);
        }
    }

    println!();
    println!("total lines: {}", bundle.total_lines);
    Ok(())
}
