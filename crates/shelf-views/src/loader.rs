//! Definition documents on disk
//!
//! A document maps view names to definitions. TOML, JSON and YAML are
//! accepted, chosen by file extension:
//!
//! ```toml
//! [views.reading-list]
//! description = "Unread, newest first"
//! select = { visit_count = 0 }
//! order = "added desc"
//!
//! [views.work]
//! union = ["pinned", { select = { tags = { any = ["work", "client"] } } }]
//! ```
//!
//! The `views` table is optional; without it every top-level entry is a
//! view.

use std::path::{Path, PathBuf};

use serde_json::Value as Json;

use crate::error::LoadError;

/// File extensions recognized as definition documents.
pub const DEFINITION_EXTENSIONS: [&str; 4] = ["toml", "json", "yaml", "yml"];

/// Whether `path` has a definition document extension.
pub fn is_definition_file(path: &Path) -> bool {
    path.extension()
        .and_then(|e| e.to_str())
        .map(|e| DEFINITION_EXTENSIONS.contains(&e.to_ascii_lowercase().as_str()))
        .unwrap_or(false)
}

/// Read a document and return its `(name, definition)` entries.
pub fn read_document(path: &Path) -> Result<Vec<(String, Json)>, LoadError> {
    let content = std::fs::read_to_string(path).map_err(|e| LoadError::Io {
        path: path.to_path_buf(),
        message: e.to_string(),
    })?;
    let extension = path
        .extension()
        .and_then(|e| e.to_str())
        .map(str::to_ascii_lowercase)
        .unwrap_or_default();
    let root = parse_document(&content, &extension).map_err(|(kind, message)| kind.error(path, message))?;
    split_views(root).map_err(|message| LoadError::Format {
        path: path.to_path_buf(),
        message,
    })
}

#[derive(Debug, Clone, Copy)]
enum Syntax {
    Toml,
    Json,
    Yaml,
    Unknown,
}

impl Syntax {
    fn error(self, path: &Path, message: String) -> LoadError {
        let path = path.to_path_buf();
        match self {
            Syntax::Toml => LoadError::Toml { path, message },
            Syntax::Json => LoadError::Json { path, message },
            Syntax::Yaml => LoadError::Yaml { path, message },
            Syntax::Unknown => LoadError::Format { path, message },
        }
    }
}

fn parse_document(content: &str, extension: &str) -> Result<Json, (Syntax, String)> {
    match extension {
        "toml" => toml::from_str::<toml::Table>(content)
            .map(|table| toml_to_json(toml::Value::Table(table)))
            .map_err(|e| (Syntax::Toml, e.to_string())),
        "json" => serde_json::from_str(content).map_err(|e| (Syntax::Json, e.to_string())),
        "yaml" | "yml" => serde_yaml::from_str(content).map_err(|e| (Syntax::Yaml, e.to_string())),
        other => Err((Syntax::Unknown, format!("unsupported extension '{}'", other))),
    }
}

fn split_views(root: Json) -> Result<Vec<(String, Json)>, String> {
    let Json::Object(mut map) = root else {
        return Err("expected a table of view definitions".to_string());
    };
    let views = match map.remove("views") {
        Some(Json::Object(views)) => views,
        Some(_) => return Err("'views' must be a table".to_string()),
        None => map,
    };
    Ok(views.into_iter().collect())
}

fn toml_to_json(value: toml::Value) -> Json {
    match value {
        toml::Value::String(s) => Json::String(s),
        toml::Value::Integer(i) => Json::from(i),
        toml::Value::Float(f) => serde_json::Number::from_f64(f)
            .map(Json::Number)
            .unwrap_or(Json::Null),
        toml::Value::Boolean(b) => Json::Bool(b),
        toml::Value::Datetime(dt) => Json::String(dt.to_string()),
        toml::Value::Array(items) => Json::Array(items.into_iter().map(toml_to_json).collect()),
        toml::Value::Table(table) => Json::Object(
            table
                .into_iter()
                .map(|(k, v)| (k, toml_to_json(v)))
                .collect(),
        ),
    }
}

/// Every definition document under `dir`, recursively, in sorted order.
pub fn definition_files(dir: &Path) -> Result<Vec<PathBuf>, LoadError> {
    let mut files = Vec::new();
    collect_files(dir, &mut files)?;
    files.sort();
    Ok(files)
}

fn collect_files(dir: &Path, files: &mut Vec<PathBuf>) -> Result<(), LoadError> {
    let io_err = |e: std::io::Error| LoadError::Io {
        path: dir.to_path_buf(),
        message: e.to_string(),
    };
    for entry in std::fs::read_dir(dir).map_err(io_err)? {
        let path = entry.map_err(io_err)?.path();
        if path.is_dir() {
            collect_files(&path, files)?;
        } else if is_definition_file(&path) {
            files.push(path);
        }
    }
    Ok(())
}
