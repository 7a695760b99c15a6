//! Error types for shelf-views

use std::path::PathBuf;

use shelf_core::StoreError;
use thiserror::Error;

/// Result type alias for view operations
pub type Result<T> = std::result::Result<T, ViewError>;

/// A malformed definition. Raised while parsing or registering, never
/// while evaluating an already-parsed view.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ParseError {
    /// A key is present but its value has the wrong shape
    #[error("invalid '{key}': {message}")]
    Invalid { key: String, message: String },

    /// A required key is absent
    #[error("missing required key '{key}'")]
    Missing { key: String },

    /// A date bound that is neither absolute nor `<N> <unit> ago`
    #[error("invalid date '{value}' in '{key}'")]
    InvalidDate { key: String, value: String },

    /// A `{{ name }}` placeholder with no parameter bound to it
    #[error("unbound parameter '{name}'")]
    UnboundParam { name: String },

    /// Any of the above, attributed to a named view
    #[error("view '{view}': {source}")]
    InView {
        view: String,
        #[source]
        source: Box<ParseError>,
    },
}

impl ParseError {
    pub fn invalid(key: impl Into<String>, message: impl Into<String>) -> Self {
        ParseError::Invalid {
            key: key.into(),
            message: message.into(),
        }
    }

    pub fn missing(key: impl Into<String>) -> Self {
        ParseError::Missing { key: key.into() }
    }

    /// Attribute this error to a view, unless it already is.
    pub fn in_view(self, view: impl Into<String>) -> Self {
        match self {
            err @ ParseError::InView { .. } => err,
            err => ParseError::InView {
                view: view.into(),
                source: Box::new(err),
            },
        }
    }

    /// The view the error was raised in, if known.
    pub fn view(&self) -> Option<&str> {
        match self {
            ParseError::InView { view, .. } => Some(view),
            _ => None,
        }
    }

    /// The offending definition key.
    pub fn key(&self) -> &str {
        match self {
            ParseError::Invalid { key, .. }
            | ParseError::Missing { key }
            | ParseError::InvalidDate { key, .. } => key,
            ParseError::UnboundParam { name } => name,
            ParseError::InView { source, .. } => source.key(),
        }
    }
}

/// Errors loading definition documents from disk.
#[derive(Error, Debug)]
pub enum LoadError {
    #[error("IO error reading {path}: {message}")]
    Io { path: PathBuf, message: String },

    #[error("TOML parse error in {path}: {message}")]
    Toml { path: PathBuf, message: String },

    #[error("JSON parse error in {path}: {message}")]
    Json { path: PathBuf, message: String },

    #[error("YAML parse error in {path}: {message}")]
    Yaml { path: PathBuf, message: String },

    #[error("Unsupported definition document {path}: {message}")]
    Format { path: PathBuf, message: String },
}

/// Main error type for view operations
#[derive(Error, Debug)]
pub enum ViewError {
    /// Malformed definition
    #[error("Parse error: {0}")]
    Parse(#[from] ParseError),

    /// Unknown view name
    #[error("View not found: {0}")]
    NotFound(String),

    /// A reference was evaluated with no registry attached to the context
    #[error("Cannot resolve view '{0}': no registry attached to the context")]
    NoRegistry(String),

    /// Reference chain too deep (usually a cycle)
    #[error("Reference depth exceeded while resolving view '{0}'")]
    RecursionLimit(String),

    /// Registry misuse
    #[error("Invalid operation: {0}")]
    InvalidOperation(String),

    /// Failure reading definition documents
    #[error("Load error: {0}")]
    Load(#[from] LoadError),

    /// Store failure, propagated unchanged
    #[error("Store error: {0}")]
    Store(#[from] StoreError),
}

impl ViewError {
    /// Returns a short, human-readable message suitable for display to the end user.
    #[must_use]
    pub fn user_message(&self) -> String {
        match self {
            Self::Parse(e) => match e.view() {
                Some(view) => format!("View '{}' has an invalid definition at '{}': {}", view, e.key(), e),
                None => format!("Invalid definition at '{}': {}", e.key(), e),
            },
            Self::NotFound(name) => format!("Unknown view: {name}"),
            Self::NoRegistry(name) => format!("View '{name}' cannot be resolved here"),
            Self::RecursionLimit(name) => format!("View '{name}' references itself"),
            Self::InvalidOperation(msg) => msg.clone(),
            Self::Load(e) => format!("Could not load view definitions: {e}"),
            Self::Store(e) => format!("Bookmark store error: {e}"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn in_view_wraps_once() {
        let err = ParseError::missing("from").in_view("inner").in_view("outer");
        assert_eq!(err.view(), Some("inner"));
        assert_eq!(err.key(), "from");
        assert!(err.to_string().contains("view 'inner'"));
    }

    #[test]
    fn user_message_names_view_and_key() {
        let err = ViewError::from(ParseError::invalid("order", "unknown direction 'up'").in_view("mine"));
        let msg = err.user_message();
        assert!(msg.contains("mine"));
        assert!(msg.contains("order"));
    }

    #[test]
    fn store_errors_propagate() {
        let err = ViewError::from(StoreError::Storage("disk full".into()));
        assert!(err.to_string().contains("disk full"));
    }
}
