//! Read-through overlay of per-view field overrides on a bookmark.

use std::borrow::Cow;
use std::collections::BTreeMap;
use std::hash::{Hash, Hasher};
use std::sync::Arc;

use serde::{Serialize, Serializer};
use shelf_core::{extract_host, Bookmark, BookmarkField, BookmarkId, Fields, Value};

/// Reserved override key: drop the bookmark after the current pipeline stage.
pub const HIDDEN_KEY: &str = "is_hidden";

/// A bookmark seen through one view's overrides.
///
/// Lookup order is override, then extra (derived fields), then the
/// original bookmark. The original is shared and never mutated. Equality
/// and hashing use the bookmark id only.
#[derive(Debug, Clone)]
pub struct OverriddenBookmark {
    original: Arc<Bookmark>,
    overrides: BTreeMap<String, Value>,
    extra: BTreeMap<String, Value>,
}

impl OverriddenBookmark {
    pub fn new(original: Arc<Bookmark>) -> Self {
        Self {
            original,
            overrides: BTreeMap::new(),
            extra: BTreeMap::new(),
        }
    }

    pub fn id(&self) -> BookmarkId {
        self.original.id
    }

    /// The unmodified source bookmark.
    pub fn original(&self) -> &Bookmark {
        &self.original
    }

    pub fn shared_original(&self) -> &Arc<Bookmark> {
        &self.original
    }

    pub fn overrides(&self) -> &BTreeMap<String, Value> {
        &self.overrides
    }

    pub fn extra(&self) -> &BTreeMap<String, Value> {
        &self.extra
    }

    pub fn is_overridden(&self, name: &str) -> bool {
        self.overrides.contains_key(name)
    }

    pub fn set_override(&mut self, name: impl Into<String>, value: impl Into<Value>) {
        self.overrides.insert(name.into(), value.into());
    }

    pub fn with_override(mut self, name: impl Into<String>, value: impl Into<Value>) -> Self {
        self.set_override(name, value);
        self
    }

    pub fn set_extra(&mut self, name: impl Into<String>, value: impl Into<Value>) {
        self.extra.insert(name.into(), value.into());
    }

    /// Resolve a field: override, then extra, then original.
    pub fn get(&self, name: &str) -> Value {
        if let Some(v) = self.overrides.get(name).or_else(|| self.extra.get(name)) {
            return v.clone();
        }
        match BookmarkField::parse(name) {
            Some(field) => self.get_field(field),
            None => Value::Null,
        }
    }

    /// Resolve a known bookmark field through the overlay.
    pub fn get_field(&self, field: BookmarkField) -> Value {
        let name = field.as_str();
        if let Some(v) = self.overrides.get(name).or_else(|| self.extra.get(name)) {
            return v.clone();
        }
        match field {
            BookmarkField::Domain if self.is_overridden("url") => {
                extract_host(&self.get_field(BookmarkField::Url).to_string())
                    .map(Value::String)
                    .unwrap_or(Value::Null)
            }
            _ => self.original.field(field),
        }
    }

    /// Tag set after overrides: the `tags` override if present, else the
    /// original tags.
    pub fn effective_tags(&self) -> Vec<String> {
        match self.overrides.get("tags").and_then(Value::as_string_list) {
            Some(tags) => tags,
            None => self.original.tags.clone(),
        }
    }

    pub fn is_hidden(&self) -> bool {
        self.overrides
            .get(HIDDEN_KEY)
            .or_else(|| self.extra.get(HIDDEN_KEY))
            .map(Value::is_truthy)
            .unwrap_or(false)
    }

    /// Render with every override and derived field applied.
    pub fn to_json(&self) -> serde_json::Value {
        let mut obj = serde_json::Map::new();
        for field in BookmarkField::ALL {
            obj.insert(field.as_str().to_string(), self.get_field(field).to_json());
        }
        for (key, value) in self.extra.iter().chain(self.overrides.iter()) {
            if BookmarkField::parse(key).is_none() {
                obj.insert(key.clone(), value.to_json());
            }
        }
        serde_json::Value::Object(obj)
    }
}

impl From<Bookmark> for OverriddenBookmark {
    fn from(bookmark: Bookmark) -> Self {
        Self::new(Arc::new(bookmark))
    }
}

impl From<Arc<Bookmark>> for OverriddenBookmark {
    fn from(bookmark: Arc<Bookmark>) -> Self {
        Self::new(bookmark)
    }
}

impl PartialEq for OverriddenBookmark {
    fn eq(&self, other: &Self) -> bool {
        self.id() == other.id()
    }
}

impl Eq for OverriddenBookmark {}

impl Hash for OverriddenBookmark {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.id().hash(state);
    }
}

impl Serialize for OverriddenBookmark {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        self.to_json().serialize(serializer)
    }
}

impl Fields for OverriddenBookmark {
    fn id(&self) -> BookmarkId {
        self.original.id
    }

    fn value(&self, name: &str) -> Value {
        self.get(name)
    }

    fn tag_list(&self) -> Cow<'_, [String]> {
        if self.overrides.contains_key("tags") {
            Cow::Owned(self.effective_tags())
        } else {
            Cow::Borrowed(&self.original.tags)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    fn source() -> Arc<Bookmark> {
        Arc::new(
            Bookmark::new(1, "https://github.com/a", "Original")
                .with_tags(["rust"])
                .with_stars(1),
        )
    }

    #[test]
    fn lookup_order() {
        let mut ob = OverriddenBookmark::new(source());
        assert_eq!(ob.get("title"), Value::String("Original".into()));

        ob.set_extra("title", "Derived");
        ob.set_extra("score", 7);
        assert_eq!(ob.get("title"), Value::String("Derived".into()));

        ob.set_override("title", "Overridden");
        assert_eq!(ob.get("title"), Value::String("Overridden".into()));
        assert_eq!(ob.get("score"), Value::Int(7));
        assert_eq!(ob.get("nothing"), Value::Null);
    }

    #[test]
    fn never_mutates_original() {
        let src = source();
        let ob = OverriddenBookmark::new(src.clone())
            .with_override("title", "New")
            .with_override("tags", vec!["x".to_string()]);
        assert_eq!(ob.original().title, "Original");
        assert_eq!(ob.original().tags, vec!["rust"]);
        assert_eq!(*src, *ob.original());
        assert_eq!(ob.effective_tags(), vec!["x"]);
        assert_eq!(ob.tag_list().as_ref(), ["x".to_string()]);
    }

    #[test]
    fn identity_is_by_id() {
        let a = OverriddenBookmark::new(source());
        let b = OverriddenBookmark::new(source()).with_override("title", "Other");
        assert_eq!(a, b);
        let set: HashSet<_> = vec![a, b].into_iter().collect();
        assert_eq!(set.len(), 1);
    }

    #[test]
    fn hidden_flag_and_domain() {
        let ob = OverriddenBookmark::new(source());
        assert!(!ob.is_hidden());
        let hidden = ob.clone().with_override(HIDDEN_KEY, true);
        assert!(hidden.is_hidden());

        assert_eq!(ob.get("domain"), Value::String("github.com".into()));
        let moved = ob.with_override("url", "https://gitlab.com/a");
        assert_eq!(moved.get("domain"), Value::String("gitlab.com".into()));
    }

    #[test]
    fn json_includes_overlay() {
        let ob = OverriddenBookmark::new(source())
            .with_override("stars", 5)
            .with_override("note", "read later");
        let json = ob.to_json();
        assert_eq!(json["stars"], serde_json::json!(5));
        assert_eq!(json["title"], serde_json::json!("Original"));
        assert_eq!(json["note"], serde_json::json!("read later"));
    }
}
