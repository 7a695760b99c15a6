//! Boolean tests over a single bookmark.
//!
//! A [`Predicate`] is an immutable value: build it once, share it, and
//! evaluate it against any [`Fields`] record. Every predicate also has a
//! native-query translation (see [`crate::sql`]); that translation is an
//! optimization only and callers always re-check with `matches`.

use std::collections::BTreeSet;
use std::fmt;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use glob::Pattern;
use regex::Regex;
use shelf_core::{extract_host, BookmarkField, BookmarkId, Fields, Value};

use crate::dates::DateBound;
use crate::error::ParseError;

/// How a tag list is tested against a bookmark's tags.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TagMode {
    /// Every listed tag is present
    All,
    /// At least one listed tag is present
    Any,
    /// No listed tag is present; an empty list means "has no tags at all"
    None,
    /// The first listed tag is a glob matched against every tag
    Match,
}

impl TagMode {
    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "all" => Some(TagMode::All),
            "any" => Some(TagMode::Any),
            "none" => Some(TagMode::None),
            "match" => Some(TagMode::Match),
            _ => None,
        }
    }
}

#[derive(Debug, Clone)]
pub struct TagsPredicate {
    pub tags: Vec<String>,
    pub mode: TagMode,
    pattern: Option<Pattern>,
}

impl TagsPredicate {
    pub fn new<I, S>(tags: I, mode: TagMode) -> Result<Self, ParseError>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let tags: Vec<String> = tags.into_iter().map(Into::into).collect();
        let pattern = match (mode, tags.first()) {
            (TagMode::Match, Some(p)) => Some(compile_glob("tags.match", p)?),
            _ => None,
        };
        Ok(Self { tags, mode, pattern })
    }

    fn matches(&self, record: &dyn Fields) -> bool {
        let have = record.tag_list();
        match self.mode {
            TagMode::All => self.tags.iter().all(|t| have.contains(t)),
            TagMode::Any => self.tags.iter().any(|t| have.contains(t)),
            TagMode::None if self.tags.is_empty() => have.is_empty(),
            TagMode::None => !self.tags.iter().any(|t| have.contains(t)),
            TagMode::Match => match &self.pattern {
                Some(p) => have.iter().any(|t| p.matches(t)),
                None => false,
            },
        }
    }

    pub(crate) fn glob(&self) -> Option<&str> {
        self.pattern.as_ref().map(|p| p.as_str())
    }
}

/// Field comparison operators.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FieldOp {
    Eq,
    Ne,
    Gt,
    Gte,
    Lt,
    Lte,
    Contains,
    Prefix,
    Suffix,
    Matches,
    Regex,
    IsNull,
    IsNotNull,
}

impl FieldOp {
    pub fn parse(s: &str) -> Option<Self> {
        let op = match s {
            "eq" | "=" | "==" => FieldOp::Eq,
            "ne" | "!=" => FieldOp::Ne,
            "gt" | ">" => FieldOp::Gt,
            "gte" | ">=" => FieldOp::Gte,
            "lt" | "<" => FieldOp::Lt,
            "lte" | "<=" => FieldOp::Lte,
            "contains" => FieldOp::Contains,
            "prefix" | "startswith" => FieldOp::Prefix,
            "suffix" | "endswith" => FieldOp::Suffix,
            "matches" | "glob" => FieldOp::Matches,
            "regex" => FieldOp::Regex,
            "is_null" => FieldOp::IsNull,
            "is_not_null" => FieldOp::IsNotNull,
            _ => return None,
        };
        Some(op)
    }
}

#[derive(Debug, Clone)]
enum Matcher {
    Glob(Pattern),
    Regex(Regex),
}

#[derive(Debug, Clone)]
pub struct FieldPredicate {
    pub field: String,
    pub op: FieldOp,
    pub value: Value,
    matcher: Option<Matcher>,
}

impl FieldPredicate {
    pub fn new(field: impl Into<String>, op: FieldOp, value: impl Into<Value>) -> Result<Self, ParseError> {
        let field = field.into();
        let (op, value) = star_flag(&field, op, value.into());
        let matcher = match op {
            FieldOp::Matches => Some(Matcher::Glob(compile_glob(&field, &value.to_string())?)),
            FieldOp::Regex => Some(Matcher::Regex(
                Regex::new(&value.to_string())
                    .map_err(|e| ParseError::invalid(field.clone(), e.to_string()))?,
            )),
            _ => None,
        };
        Ok(Self {
            field,
            op,
            value,
            matcher,
        })
    }

    fn matches(&self, record: &dyn Fields) -> bool {
        use std::cmp::Ordering::*;

        let actual = record.value(&self.field);
        match self.op {
            FieldOp::IsNull => return actual.is_null(),
            FieldOp::IsNotNull => return !actual.is_null(),
            FieldOp::Eq => return actual.loose_eq(&self.value),
            FieldOp::Ne => return !actual.loose_eq(&self.value),
            _ => {}
        }
        if actual.is_null() {
            return false;
        }
        match self.op {
            FieldOp::Gt => actual.loose_cmp(&self.value) == Some(Greater),
            FieldOp::Gte => matches!(actual.loose_cmp(&self.value), Some(Greater | Equal)),
            FieldOp::Lt => actual.loose_cmp(&self.value) == Some(Less),
            FieldOp::Lte => matches!(actual.loose_cmp(&self.value), Some(Less | Equal)),
            FieldOp::Contains => {
                let needle = self.value.to_string().to_lowercase();
                match &actual {
                    Value::Array(items) => items
                        .iter()
                        .any(|item| item.to_string().to_lowercase() == needle),
                    other => other.to_string().to_lowercase().contains(&needle),
                }
            }
            FieldOp::Prefix => actual
                .to_string()
                .to_lowercase()
                .starts_with(&self.value.to_string().to_lowercase()),
            FieldOp::Suffix => actual
                .to_string()
                .to_lowercase()
                .ends_with(&self.value.to_string().to_lowercase()),
            FieldOp::Matches | FieldOp::Regex => match &self.matcher {
                Some(Matcher::Glob(p)) => p.matches(&actual.to_string()),
                Some(Matcher::Regex(re)) => re.is_match(&actual.to_string()),
                None => false,
            },
            FieldOp::Eq | FieldOp::Ne | FieldOp::IsNull | FieldOp::IsNotNull => unreachable!(),
        }
    }
}

/// Which timestamp a temporal predicate reads.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TemporalField {
    Added,
    LastVisited,
}

impl TemporalField {
    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "added" => Some(TemporalField::Added),
            "visited" | "last_visited" => Some(TemporalField::LastVisited),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            TemporalField::Added => "added",
            TemporalField::LastVisited => "last_visited",
        }
    }
}

/// `after` is inclusive, `before` exclusive. A record whose field is
/// missing or unparsable never matches.
#[derive(Debug, Clone, PartialEq)]
pub struct TemporalPredicate {
    pub field: TemporalField,
    pub after: Option<DateBound>,
    pub before: Option<DateBound>,
}

impl TemporalPredicate {
    pub fn new(field: TemporalField) -> Self {
        Self {
            field,
            after: None,
            before: None,
        }
    }

    pub fn after(mut self, bound: DateBound) -> Self {
        self.after = Some(bound);
        self
    }

    pub fn before(mut self, bound: DateBound) -> Self {
        self.before = Some(bound);
        self
    }

    /// `within` sets `after` to the equivalent "ago" bound unless `after`
    /// is already set.
    pub fn within(mut self, bound: DateBound) -> Self {
        if self.after.is_none() {
            self.after = Some(bound);
        }
        self
    }

    /// Build from textual bounds; an unparsable bound is an error.
    pub fn parse(
        field: TemporalField,
        after: Option<&str>,
        before: Option<&str>,
        within: Option<&str>,
    ) -> Result<Self, ParseError> {
        let key = field.as_str();
        let bound = |kind: &str, s: &str, parse: fn(&str) -> Option<DateBound>| {
            parse(s).ok_or_else(|| ParseError::InvalidDate {
                key: format!("{}.{}", key, kind),
                value: s.to_string(),
            })
        };
        let mut pred = Self::new(field);
        if let Some(s) = after {
            pred = pred.after(bound("after", s, DateBound::parse)?);
        }
        if let Some(s) = before {
            pred = pred.before(bound("before", s, DateBound::parse)?);
        }
        if let Some(s) = within {
            pred = pred.within(bound("within", s, DateBound::parse_within)?);
        }
        Ok(pred)
    }

    fn matches(&self, record: &dyn Fields, now: DateTime<Utc>) -> bool {
        let Some(value) = record.value(self.field.as_str()).as_datetime() else {
            return false;
        };
        if let Some(after) = &self.after {
            if value < after.resolve(now) {
                return false;
            }
        }
        if let Some(before) = &self.before {
            if value >= before.resolve(now) {
                return false;
            }
        }
        true
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DomainMode {
    /// Host contains any listed domain (case-insensitive substring)
    Any,
    /// Host contains none of the listed domains
    None,
    /// Host fully matches any listed glob (case-insensitive)
    Match,
}

#[derive(Debug, Clone)]
pub struct DomainPredicate {
    pub domains: Vec<String>,
    pub mode: DomainMode,
    patterns: Vec<Pattern>,
}

impl DomainPredicate {
    pub fn new<I, S>(domains: I, mode: DomainMode) -> Result<Self, ParseError>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let domains: Vec<String> = domains
            .into_iter()
            .map(|d| d.into().to_lowercase())
            .collect();
        let patterns = if mode == DomainMode::Match {
            domains
                .iter()
                .map(|d| compile_glob("domain.match", d))
                .collect::<Result<Vec<_>, _>>()?
        } else {
            Vec::new()
        };
        Ok(Self {
            domains,
            mode,
            patterns,
        })
    }

    fn matches(&self, record: &dyn Fields) -> bool {
        let host = extract_host(&record.value("url").to_string());
        match (self.mode, host) {
            (DomainMode::Any, Some(h)) => self.domains.iter().any(|d| h.contains(d.as_str())),
            (DomainMode::None, Some(h)) => !self.domains.iter().any(|d| h.contains(d.as_str())),
            (DomainMode::Match, Some(h)) => self.patterns.iter().any(|p| p.matches(&h)),
            (DomainMode::None, None) => true,
            (_, None) => false,
        }
    }
}

/// Default fields searched by [`SearchPredicate`].
pub const DEFAULT_SEARCH_FIELDS: [&str; 3] = ["title", "description", "url"];

#[derive(Debug, Clone, PartialEq)]
pub struct SearchPredicate {
    pub query: String,
    pub fields: Vec<String>,
    terms: Vec<String>,
}

impl SearchPredicate {
    pub fn new(query: impl Into<String>) -> Self {
        Self::with_fields(query, DEFAULT_SEARCH_FIELDS.iter().map(|f| f.to_string()))
    }

    pub fn with_fields<I, S>(query: impl Into<String>, fields: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let query = query.into();
        let terms = query
            .split_whitespace()
            .map(|t| t.to_lowercase())
            .collect();
        Self {
            query,
            fields: fields.into_iter().map(Into::into).collect(),
            terms,
        }
    }

    pub fn terms(&self) -> &[String] {
        &self.terms
    }

    fn matches(&self, record: &dyn Fields) -> bool {
        self.fields.iter().any(|field| {
            let text = record.value(field).to_string().to_lowercase();
            self.terms.iter().all(|term| text.contains(term.as_str()))
        })
    }
}

type CustomFn = dyn Fn(&dyn Fields) -> bool + Send + Sync;

/// An arbitrary test supplied by code. Never pushed down.
#[derive(Clone)]
pub struct CustomPredicate {
    pub name: String,
    func: Arc<CustomFn>,
}

impl CustomPredicate {
    pub fn new<F>(name: impl Into<String>, func: F) -> Self
    where
        F: Fn(&dyn Fields) -> bool + Send + Sync + 'static,
    {
        Self {
            name: name.into(),
            func: Arc::new(func),
        }
    }
}

impl fmt::Debug for CustomPredicate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CustomPredicate")
            .field("name", &self.name)
            .finish_non_exhaustive()
    }
}

/// Boolean test over a single bookmark.
#[derive(Debug, Clone)]
pub enum Predicate {
    True,
    False,
    Tags(TagsPredicate),
    Field(FieldPredicate),
    Temporal(TemporalPredicate),
    Domain(DomainPredicate),
    Search(SearchPredicate),
    Ids(BTreeSet<BookmarkId>),

    // Logical
    All(Vec<Predicate>),
    Any(Vec<Predicate>),
    Not(Box<Predicate>),

    Custom(CustomPredicate),
}

impl Predicate {
    /// Test a record using the current wall clock for relative dates.
    pub fn matches(&self, record: &dyn Fields) -> bool {
        self.matches_at(record, Utc::now())
    }

    /// Test a record with a fixed "now".
    pub fn matches_at(&self, record: &dyn Fields, now: DateTime<Utc>) -> bool {
        match self {
            Predicate::True => true,
            Predicate::False => false,
            Predicate::Tags(p) => p.matches(record),
            Predicate::Field(p) => p.matches(record),
            Predicate::Temporal(p) => p.matches(record, now),
            Predicate::Domain(p) => p.matches(record),
            Predicate::Search(p) => p.matches(record),
            Predicate::Ids(ids) => ids.contains(&record.id()),
            Predicate::All(preds) => preds.iter().all(|p| p.matches_at(record, now)),
            Predicate::Any(preds) => preds.iter().any(|p| p.matches_at(record, now)),
            Predicate::Not(p) => !p.matches_at(record, now),
            Predicate::Custom(c) => (c.func)(record),
        }
    }

    // Convenience constructors for the infallible shapes.

    pub fn has_all_tags<I: IntoIterator<Item = S>, S: Into<String>>(tags: I) -> Self {
        Predicate::Tags(TagsPredicate {
            tags: tags.into_iter().map(Into::into).collect(),
            mode: TagMode::All,
            pattern: None,
        })
    }

    pub fn has_any_tag<I: IntoIterator<Item = S>, S: Into<String>>(tags: I) -> Self {
        Predicate::Tags(TagsPredicate {
            tags: tags.into_iter().map(Into::into).collect(),
            mode: TagMode::Any,
            pattern: None,
        })
    }

    pub fn has_no_tags<I: IntoIterator<Item = S>, S: Into<String>>(tags: I) -> Self {
        Predicate::Tags(TagsPredicate {
            tags: tags.into_iter().map(Into::into).collect(),
            mode: TagMode::None,
            pattern: None,
        })
    }

    /// Field comparison. Fails only for a malformed glob or regex.
    pub fn compare(
        field: impl Into<String>,
        op: FieldOp,
        value: impl Into<Value>,
    ) -> Result<Self, ParseError> {
        FieldPredicate::new(field, op, value).map(Predicate::Field)
    }

    pub fn eq(field: impl Into<String>, value: impl Into<Value>) -> Self {
        Self::comparison(field, FieldOp::Eq, value)
    }

    pub fn gt(field: impl Into<String>, value: impl Into<Value>) -> Self {
        Self::comparison(field, FieldOp::Gt, value)
    }

    /// Build an operator that needs no compiled matcher.
    fn comparison(field: impl Into<String>, op: FieldOp, value: impl Into<Value>) -> Self {
        let field = field.into();
        let (op, value) = star_flag(&field, op, value.into());
        Predicate::Field(FieldPredicate {
            field,
            op,
            value,
            matcher: None,
        })
    }

    pub fn search(query: impl Into<String>) -> Self {
        Predicate::Search(SearchPredicate::new(query))
    }

    pub fn ids<I: IntoIterator<Item = BookmarkId>>(ids: I) -> Self {
        Predicate::Ids(ids.into_iter().collect())
    }

    pub fn custom<F>(name: impl Into<String>, func: F) -> Self
    where
        F: Fn(&dyn Fields) -> bool + Send + Sync + 'static,
    {
        Predicate::Custom(CustomPredicate::new(name, func))
    }

    pub fn and(self, other: Predicate) -> Self {
        match self {
            Predicate::All(mut preds) => {
                preds.push(other);
                Predicate::All(preds)
            }
            first => Predicate::All(vec![first, other]),
        }
    }

    pub fn or(self, other: Predicate) -> Self {
        match self {
            Predicate::Any(mut preds) => {
                preds.push(other);
                Predicate::Any(preds)
            }
            first => Predicate::Any(vec![first, other]),
        }
    }

    pub fn negate(self) -> Self {
        Predicate::Not(Box::new(self))
    }
}

impl From<TagsPredicate> for Predicate {
    fn from(p: TagsPredicate) -> Self {
        Predicate::Tags(p)
    }
}

impl From<FieldPredicate> for Predicate {
    fn from(p: FieldPredicate) -> Self {
        Predicate::Field(p)
    }
}

impl From<TemporalPredicate> for Predicate {
    fn from(p: TemporalPredicate) -> Self {
        Predicate::Temporal(p)
    }
}

impl From<DomainPredicate> for Predicate {
    fn from(p: DomainPredicate) -> Self {
        Predicate::Domain(p)
    }
}

impl From<SearchPredicate> for Predicate {
    fn from(p: SearchPredicate) -> Self {
        Predicate::Search(p)
    }
}

/// `stars` doubles as the starred flag: a boolean compares against zero.
fn star_flag(field: &str, op: FieldOp, value: Value) -> (FieldOp, Value) {
    if BookmarkField::parse(field) != Some(BookmarkField::Stars) {
        return (op, value);
    }
    let flag = match value {
        Value::Bool(b) => b,
        other => return (op, other),
    };
    match (op, flag) {
        (FieldOp::Eq, true) | (FieldOp::Ne, false) => (FieldOp::Gt, Value::Int(0)),
        (FieldOp::Eq, false) | (FieldOp::Ne, true) => (FieldOp::Eq, Value::Int(0)),
        _ => (op, Value::Bool(flag)),
    }
}

fn compile_glob(key: &str, pattern: &str) -> Result<Pattern, ParseError> {
    Pattern::new(pattern).map_err(|e| ParseError::invalid(key, format!("bad glob '{}': {}", pattern, e.msg)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dates::DateUnit;
    use shelf_core::{parse_timestamp, Bookmark};

    fn bm(id: i64, tags: &[&str]) -> Bookmark {
        Bookmark::new(id, format!("https://site{}.test/page", id), format!("Page {}", id))
            .with_tags(tags.iter().copied())
    }

    fn now() -> DateTime<Utc> {
        parse_timestamp("2024-06-15 12:00:00").unwrap()
    }

    #[test]
    fn tags_all_any_none() {
        let py = bm(1, &["python", "django"]);
        let dj = bm(2, &["django"]);
        let bare = bm(3, &[]);

        let all = Predicate::has_all_tags(["python"]);
        assert!(all.matches(&py));
        assert!(!all.matches(&dj));

        let any = Predicate::has_any_tag(["python", "rust"]);
        assert!(any.matches(&py));
        assert!(!any.matches(&bare));
        assert!(!Predicate::has_any_tag(Vec::<String>::new()).matches(&py));

        let none = Predicate::has_no_tags(["python"]);
        assert!(!none.matches(&py));
        assert!(none.matches(&dj));

        let untagged = Predicate::has_no_tags(Vec::<String>::new());
        assert!(untagged.matches(&bare));
        assert!(!untagged.matches(&dj));
    }

    #[test]
    fn tags_glob_match() {
        let p: Predicate = TagsPredicate::new(["py*"], TagMode::Match).unwrap().into();
        assert!(p.matches(&bm(1, &["web", "python"])));
        assert!(!p.matches(&bm(2, &["rust"])));
        assert!(TagsPredicate::new(["[unclosed"], TagMode::Match).is_err());
    }

    #[test]
    fn field_operators() {
        let b = bm(1, &[]).with_stars(3).with_description("A Guide To Rust");
        assert!(Predicate::gt("stars", 0).matches(&b));
        assert!(!Predicate::compare("stars", FieldOp::Lt, 3).unwrap().matches(&b));
        assert!(Predicate::compare("stars", FieldOp::Lte, 3).unwrap().matches(&b));
        assert!(Predicate::compare("description", FieldOp::Contains, "guide to").unwrap().matches(&b));
        assert!(Predicate::compare("title", FieldOp::Prefix, "PAGE").unwrap().matches(&b));
        assert!(Predicate::compare("url", FieldOp::Suffix, "/PAGE").unwrap().matches(&b));
        assert!(Predicate::compare("last_visited", FieldOp::IsNull, Value::Null).unwrap().matches(&b));
        assert!(!Predicate::compare("title", FieldOp::IsNull, Value::Null).unwrap().matches(&b));
        assert!(Predicate::compare("stars", FieldOp::Ne, 1).unwrap().matches(&b));

        let glob: Predicate = FieldPredicate::new("url", FieldOp::Matches, "https://site?.test/*")
            .unwrap()
            .into();
        assert!(glob.matches(&b));
        let re: Predicate = FieldPredicate::new("title", FieldOp::Regex, r"^Page \d+$")
            .unwrap()
            .into();
        assert!(re.matches(&b));
        assert!(FieldPredicate::new("title", FieldOp::Regex, "(").is_err());
    }

    #[test]
    fn missing_field_comparisons_fail() {
        let b = bm(1, &[]);
        assert!(!Predicate::gt("last_visited", "2020-01-01").matches(&b));
        assert!(!Predicate::compare("description", FieldOp::Contains, "x").unwrap().matches(&b));
    }

    #[test]
    fn temporal_bounds() {
        let recent = bm(1, &[]).with_added(now() - chrono::Duration::days(3));
        let old = bm(2, &[]).with_added(parse_timestamp("2023-01-01").unwrap());

        let week: Predicate = TemporalPredicate::new(TemporalField::Added)
            .within(DateBound::ago(7, DateUnit::Day))
            .into();
        assert!(week.matches_at(&recent, now()));
        assert!(!week.matches_at(&old, now()));

        let range: Predicate = TemporalPredicate::parse(
            TemporalField::Added,
            Some("2022-06-01"),
            Some("2023-06-01"),
            None,
        )
        .unwrap()
        .into();
        assert!(range.matches_at(&old, now()));
        assert!(!range.matches_at(&recent, now()));
    }

    #[test]
    fn temporal_within_does_not_override_after() {
        let p = TemporalPredicate::new(TemporalField::Added)
            .after(DateBound::ago(1, DateUnit::Day))
            .within(DateBound::ago(30, DateUnit::Day));
        assert_eq!(p.after, Some(DateBound::ago(1, DateUnit::Day)));
    }

    #[test]
    fn temporal_missing_value_never_matches() {
        let never_visited = bm(1, &[]);
        let p: Predicate = TemporalPredicate::new(TemporalField::LastVisited).into();
        assert!(!p.matches_at(&never_visited, now()));
        let err = TemporalPredicate::parse(TemporalField::Added, Some("last tuesday"), None, None)
            .unwrap_err();
        assert!(matches!(err, ParseError::InvalidDate { .. }));
    }

    #[test]
    fn domain_modes() {
        let gh = Bookmark::new(1, "https://GitHub.com/rust-lang", "rust");
        let any: Predicate = DomainPredicate::new(["github"], DomainMode::Any).unwrap().into();
        let none: Predicate = DomainPredicate::new(["github"], DomainMode::None).unwrap().into();
        let glob: Predicate = DomainPredicate::new(["*.com"], DomainMode::Match).unwrap().into();
        let exact: Predicate = DomainPredicate::new(["hub.com"], DomainMode::Match).unwrap().into();
        assert!(any.matches(&gh));
        assert!(!none.matches(&gh));
        assert!(glob.matches(&gh));
        assert!(!exact.matches(&gh));
    }

    #[test]
    fn search_requires_all_terms_in_one_field() {
        let b = Bookmark::new(1, "https://docs.rs/tokio", "Tokio runtime")
            .with_description("Async I/O for Rust");
        assert!(Predicate::search("tokio RUNTIME").matches(&b));
        assert!(Predicate::search("async rust").matches(&b));
        // Terms split across title and description do not match.
        assert!(!Predicate::search("tokio async").matches(&b));
        assert!(Predicate::search("").matches(&b));
        let title_only = Predicate::Search(SearchPredicate::with_fields("docs", ["title"]));
        assert!(!title_only.matches(&b));
    }

    #[test]
    fn compound_vacuous_cases() {
        let b = bm(1, &[]);
        assert!(Predicate::All(vec![]).matches(&b));
        assert!(!Predicate::Any(vec![]).matches(&b));
        assert!(Predicate::False.negate().matches(&b));
        assert!(Predicate::ids([1, 2]).matches(&b));
        assert!(!Predicate::ids([2]).matches(&b));
        let both = Predicate::ids([1]).and(Predicate::True).and(Predicate::False);
        assert!(matches!(&both, Predicate::All(p) if p.len() == 3));
        assert!(!both.matches(&b));
    }

    #[test]
    fn boolean_stars_mean_starred() {
        let starred = bm(1, &[]).with_stars(3);
        let plain = bm(2, &[]);
        let yes = Predicate::eq("starred", true);
        assert!(yes.matches(&starred));
        assert!(!yes.matches(&plain));
        let no = Predicate::compare("stars", FieldOp::Ne, true).unwrap();
        assert!(no.matches(&plain));
        assert!(!no.matches(&starred));
        assert!(Predicate::eq("stars", false).matches(&plain));
        assert!(Predicate::eq("stars", 3).matches(&starred));
    }

    #[test]
    fn compare_compiles_matchers() {
        let b = bm(1, &[]);
        let glob = Predicate::compare("title", FieldOp::Matches, "Page *").unwrap();
        assert!(glob.matches(&b));
        let re = Predicate::compare("title", FieldOp::Regex, "^page").unwrap();
        assert!(!re.matches(&b));
        assert!(Predicate::compare("title", FieldOp::Regex, "(").is_err());
        assert!(Predicate::compare("title", FieldOp::Matches, "[").is_err());
    }

    #[test]
    fn custom_predicate() {
        let p = Predicate::custom("long-title", |r| r.value("title").to_string().len() > 5);
        assert!(p.matches(&bm(1, &[])));
        assert!(format!("{:?}", p).contains("long-title"));
    }
}
