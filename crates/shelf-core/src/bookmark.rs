use chrono::{DateTime, Utc};
use lazy_static::lazy_static;
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::borrow::Cow;

use crate::value::Value;

/// Bookmark identifier (the `bookmarks.id` primary key).
pub type BookmarkId = i64;

lazy_static! {
    static ref HOST_RE: Regex =
        Regex::new(r"^[A-Za-z][A-Za-z0-9+.\-]*://(?:[^@/?#]*@)?([^/?#:]+)").unwrap();
}

/// Extract the lowercase host from a `scheme://host/...` URL.
pub fn extract_host(url: &str) -> Option<String> {
    HOST_RE
        .captures(url.trim())
        .and_then(|caps| caps.get(1))
        .map(|m| m.as_str().to_lowercase())
        .filter(|host| !host.is_empty())
}

/// A stored bookmark. Owned by the store; views never mutate it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Bookmark {
    pub id: BookmarkId,
    pub url: String,
    pub title: String,
    pub description: Option<String>,
    pub added: DateTime<Utc>,

    // Classification
    pub stars: i64,
    pub pinned: bool,
    pub archived: bool,
    pub tags: Vec<String>,

    // Health and usage
    pub visit_count: i64,
    pub reachable: Option<bool>,
    pub last_visited: Option<DateTime<Utc>>,
}

impl Bookmark {
    pub fn new(id: BookmarkId, url: impl Into<String>, title: impl Into<String>) -> Self {
        Self {
            id,
            url: url.into(),
            title: title.into(),
            description: None,
            added: Utc::now(),
            stars: 0,
            pinned: false,
            archived: false,
            tags: Vec::new(),
            visit_count: 0,
            reachable: None,
            last_visited: None,
        }
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    pub fn with_added(mut self, added: DateTime<Utc>) -> Self {
        self.added = added;
        self
    }

    pub fn with_stars(mut self, stars: i64) -> Self {
        self.stars = stars;
        self
    }

    pub fn with_pinned(mut self, pinned: bool) -> Self {
        self.pinned = pinned;
        self
    }

    pub fn with_archived(mut self, archived: bool) -> Self {
        self.archived = archived;
        self
    }

    pub fn with_tags<I, S>(mut self, tags: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.tags = tags.into_iter().map(Into::into).collect();
        self
    }

    pub fn with_visits(mut self, visit_count: i64, last_visited: Option<DateTime<Utc>>) -> Self {
        self.visit_count = visit_count;
        self.last_visited = last_visited;
        self
    }

    pub fn with_reachable(mut self, reachable: Option<bool>) -> Self {
        self.reachable = reachable;
        self
    }

    pub fn domain(&self) -> Option<String> {
        extract_host(&self.url)
    }

    /// Read one field as a dynamic value.
    pub fn field(&self, field: BookmarkField) -> Value {
        match field {
            BookmarkField::Id => Value::Int(self.id),
            BookmarkField::Url => Value::String(self.url.clone()),
            BookmarkField::Title => Value::String(self.title.clone()),
            BookmarkField::Description => self.description.clone().into(),
            BookmarkField::Added => Value::DateTime(self.added),
            BookmarkField::Stars => Value::Int(self.stars),
            BookmarkField::Pinned => Value::Bool(self.pinned),
            BookmarkField::Archived => Value::Bool(self.archived),
            BookmarkField::VisitCount => Value::Int(self.visit_count),
            BookmarkField::Reachable => self.reachable.into(),
            BookmarkField::LastVisited => self.last_visited.into(),
            BookmarkField::Tags => Value::from(self.tags.clone()),
            BookmarkField::Domain => self.domain().into(),
        }
    }
}

/// The fixed set of readable bookmark fields.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BookmarkField {
    Id,
    Url,
    Title,
    Description,
    Added,
    Stars,
    Pinned,
    Archived,
    VisitCount,
    Reachable,
    LastVisited,
    Tags,
    Domain,
}

impl BookmarkField {
    pub const ALL: [BookmarkField; 13] = [
        BookmarkField::Id,
        BookmarkField::Url,
        BookmarkField::Title,
        BookmarkField::Description,
        BookmarkField::Added,
        BookmarkField::Stars,
        BookmarkField::Pinned,
        BookmarkField::Archived,
        BookmarkField::VisitCount,
        BookmarkField::Reachable,
        BookmarkField::LastVisited,
        BookmarkField::Tags,
        BookmarkField::Domain,
    ];

    /// Resolve a field name, accepting the common aliases.
    pub fn parse(name: &str) -> Option<Self> {
        let field = match name {
            "id" => BookmarkField::Id,
            "url" => BookmarkField::Url,
            "title" => BookmarkField::Title,
            "description" => BookmarkField::Description,
            "added" => BookmarkField::Added,
            "stars" | "starred" => BookmarkField::Stars,
            "pinned" => BookmarkField::Pinned,
            "archived" => BookmarkField::Archived,
            "visit_count" | "visits" => BookmarkField::VisitCount,
            "reachable" => BookmarkField::Reachable,
            "last_visited" | "visited" => BookmarkField::LastVisited,
            "tags" | "tag" => BookmarkField::Tags,
            "domain" | "host" => BookmarkField::Domain,
            _ => return None,
        };
        Some(field)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            BookmarkField::Id => "id",
            BookmarkField::Url => "url",
            BookmarkField::Title => "title",
            BookmarkField::Description => "description",
            BookmarkField::Added => "added",
            BookmarkField::Stars => "stars",
            BookmarkField::Pinned => "pinned",
            BookmarkField::Archived => "archived",
            BookmarkField::VisitCount => "visit_count",
            BookmarkField::Reachable => "reachable",
            BookmarkField::LastVisited => "last_visited",
            BookmarkField::Tags => "tags",
            BookmarkField::Domain => "domain",
        }
    }

    /// Column in the `bookmarks` table, if the field is stored directly.
    pub fn column(&self) -> Option<&'static str> {
        match self {
            BookmarkField::Tags | BookmarkField::Domain => None,
            other => Some(other.as_str()),
        }
    }

    pub fn is_temporal(&self) -> bool {
        matches!(self, BookmarkField::Added | BookmarkField::LastVisited)
    }

    /// Stored as 0/1 integers but read as `true`/`false` text.
    pub fn is_boolean(&self) -> bool {
        matches!(
            self,
            BookmarkField::Pinned | BookmarkField::Archived | BookmarkField::Reachable
        )
    }
}

/// Anything whose fields a predicate can test: a stored bookmark or a
/// bookmark seen through a view's overlay.
pub trait Fields {
    fn id(&self) -> BookmarkId;

    /// Field value by name; unknown names read as `Value::Null`.
    fn value(&self, name: &str) -> Value;

    /// Effective tag list.
    fn tag_list(&self) -> Cow<'_, [String]>;
}

impl Fields for Bookmark {
    fn id(&self) -> BookmarkId {
        self.id
    }

    fn value(&self, name: &str) -> Value {
        BookmarkField::parse(name)
            .map(|f| self.field(f))
            .unwrap_or(Value::Null)
    }

    fn tag_list(&self) -> Cow<'_, [String]> {
        Cow::Borrowed(&self.tags)
    }
}
