//! Primitive views: selection, ordering, slicing, overrides, grouping.
//!
//! Each primitive can evaluate against a store (starting from every
//! bookmark) or be applied to an already materialized result.

use std::cmp::Ordering;
use std::collections::{BTreeMap, HashMap};

use chrono::{DateTime, Utc};
use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::SeedableRng;
use shelf_core::{BookmarkField, BookmarkStore, Fields, StoreError, Value};
use tracing::{debug, warn};

use crate::context::ViewContext;
use crate::dates::iso_week;
use crate::error::{ParseError, Result};
use crate::overlay::OverriddenBookmark;
use crate::predicate::Predicate;
use crate::result::{GroupedResult, ViewResult};

/// Every bookmark in the store, unfiltered.
pub(crate) fn evaluate_all(store: &dyn BookmarkStore) -> Result<ViewResult> {
    Ok(ViewResult::from_bookmarks(store.all()?))
}

// ---------------------------------------------------------------------------
// Select
// ---------------------------------------------------------------------------

/// Keep bookmarks matching a predicate.
#[derive(Debug, Clone)]
pub struct SelectView {
    pub predicate: Predicate,
}

impl SelectView {
    pub fn new(predicate: Predicate) -> Self {
        Self { predicate }
    }

    /// Query natively when the predicate translates, then re-check every
    /// row in memory. A trivial fragment or a failing native query falls
    /// back to filtering the full set.
    pub fn evaluate(&self, store: &dyn BookmarkStore, ctx: &ViewContext<'_>) -> Result<ViewResult> {
        let now = ctx.now();
        let fragment = self.predicate.to_sql_at(now);
        let candidates = if fragment.is_trivial() {
            debug!("predicate has no native translation, filtering in memory");
            store.all()?
        } else {
            match store.query(&fragment.sql, &fragment.params) {
                Ok(rows) => rows,
                Err(StoreError::Unsupported(_)) => {
                    debug!("store has no native queries, filtering in memory");
                    store.all()?
                }
                Err(e) => {
                    warn!(error = %e, sql = %fragment.sql, "native query failed, filtering in memory");
                    store.all()?
                }
            }
        };
        let matching = candidates
            .into_iter()
            .filter(|b| self.predicate.matches_at(b, now))
            .collect();
        Ok(ViewResult::from_bookmarks(matching))
    }

    pub fn apply(&self, result: ViewResult, ctx: &ViewContext<'_>) -> ViewResult {
        let now = ctx.now();
        result.retain(|b| self.predicate.matches_at(b, now))
    }
}

// ---------------------------------------------------------------------------
// Order
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    Asc,
    Desc,
}

impl Direction {
    pub fn parse(s: &str) -> Option<Self> {
        match s.to_ascii_lowercase().as_str() {
            "asc" | "ascending" => Some(Direction::Asc),
            "desc" | "descending" => Some(Direction::Desc),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NullsPlacement {
    First,
    Last,
}

impl NullsPlacement {
    pub fn parse(s: &str) -> Option<Self> {
        match s.to_ascii_lowercase().as_str() {
            "first" => Some(NullsPlacement::First),
            "last" => Some(NullsPlacement::Last),
            _ => None,
        }
    }
}

/// One sort key. Nulls are placed before direction is considered.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OrderSpec {
    pub field: String,
    pub direction: Direction,
    pub nulls: NullsPlacement,
    pub case_sensitive: bool,
}

impl OrderSpec {
    pub fn asc(field: impl Into<String>) -> Self {
        Self {
            field: field.into(),
            direction: Direction::Asc,
            nulls: NullsPlacement::Last,
            case_sensitive: false,
        }
    }

    pub fn desc(field: impl Into<String>) -> Self {
        Self {
            direction: Direction::Desc,
            ..Self::asc(field)
        }
    }

    pub fn nulls(mut self, nulls: NullsPlacement) -> Self {
        self.nulls = nulls;
        self
    }

    pub fn case_sensitive(mut self, yes: bool) -> Self {
        self.case_sensitive = yes;
        self
    }

    /// Parse `field [asc|desc] [nulls first|last]`.
    pub fn parse(input: &str) -> std::result::Result<Self, ParseError> {
        let words: Vec<&str> = input.split_whitespace().collect();
        let (field, rest) = words
            .split_first()
            .ok_or_else(|| ParseError::invalid("order", "empty sort key"))?;
        let mut spec = Self::asc(*field);
        let mut rest = rest.iter();
        while let Some(word) = rest.next() {
            if let Some(direction) = Direction::parse(word) {
                spec.direction = direction;
            } else if word.eq_ignore_ascii_case("nulls") {
                spec.nulls = rest
                    .next()
                    .and_then(|w| NullsPlacement::parse(w))
                    .ok_or_else(|| ParseError::invalid("order", format!("bad null placement in '{}'", input)))?;
            } else {
                return Err(ParseError::invalid("order", format!("unknown direction '{}'", word)));
            }
        }
        Ok(spec)
    }

    fn compare(&self, a: &OverriddenBookmark, b: &OverriddenBookmark) -> Ordering {
        let (x, y) = (a.get(&self.field), b.get(&self.field));
        match (x.is_null(), y.is_null()) {
            (true, true) => return Ordering::Equal,
            (true, false) => return self.null_side(),
            (false, true) => return self.null_side().reverse(),
            _ => {}
        }
        let ord = match (&x, &y) {
            (Value::String(s), Value::String(t)) if !self.case_sensitive => {
                s.to_lowercase().cmp(&t.to_lowercase())
            }
            _ => x
                .loose_cmp(&y)
                .unwrap_or_else(|| x.kind_rank().cmp(&y.kind_rank())),
        };
        match self.direction {
            Direction::Asc => ord,
            Direction::Desc => ord.reverse(),
        }
    }

    fn null_side(&self) -> Ordering {
        match self.nulls {
            NullsPlacement::First => Ordering::Less,
            NullsPlacement::Last => Ordering::Greater,
        }
    }
}

/// Stable multi-key sort, keys applied left to right.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OrderView {
    pub specs: Vec<OrderSpec>,
}

impl OrderView {
    pub fn new(specs: Vec<OrderSpec>) -> Self {
        Self { specs }
    }

    /// Parse `"field dir, field2 dir2"`.
    pub fn parse(input: &str) -> std::result::Result<Self, ParseError> {
        let specs = input
            .split(',')
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .map(OrderSpec::parse)
            .collect::<std::result::Result<Vec<_>, _>>()?;
        if specs.is_empty() {
            return Err(ParseError::invalid("order", "no sort keys"));
        }
        Ok(Self { specs })
    }

    pub fn apply(&self, result: ViewResult) -> ViewResult {
        result.reorder(|items| {
            items.sort_by(|a, b| {
                self.specs
                    .iter()
                    .map(|spec| spec.compare(a, b))
                    .find(|ord| *ord != Ordering::Equal)
                    .unwrap_or(Ordering::Equal)
            })
        })
    }
}

/// Shuffle. A fixed seed gives the same order for the same input set.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct RandomOrderView {
    pub seed: Option<u64>,
}

impl RandomOrderView {
    pub fn new(seed: Option<u64>) -> Self {
        Self { seed }
    }

    pub fn apply(&self, result: ViewResult) -> ViewResult {
        result.reorder(|items| {
            items.sort_by_key(|b| b.id());
            match self.seed {
                Some(seed) => items.shuffle(&mut StdRng::seed_from_u64(seed)),
                None => items.shuffle(&mut rand::rng()),
            }
        })
    }
}

// ---------------------------------------------------------------------------
// Slicing
// ---------------------------------------------------------------------------

/// Positional window. Slicing a grouped result yields a flat one.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SliceView {
    pub offset: usize,
    pub limit: Option<usize>,
}

impl SliceView {
    pub fn new(offset: usize, limit: Option<usize>) -> Self {
        Self { offset, limit }
    }

    pub fn limit(n: usize) -> Self {
        Self::new(0, Some(n))
    }

    pub fn offset(n: usize) -> Self {
        Self::new(n, None)
    }

    pub fn apply(&self, result: ViewResult) -> ViewResult {
        let mut result = result.flatten();
        let items = std::mem::take(&mut result.bookmarks);
        let window = items.into_iter().skip(self.offset);
        result.bookmarks = match self.limit {
            Some(n) => window.take(n).collect(),
            None => window.collect(),
        };
        result
    }
}

/// First `n` bookmarks.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LimitView(pub usize);

/// Everything after the first `n` bookmarks.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct OffsetView(pub usize);

impl LimitView {
    pub fn apply(&self, result: ViewResult) -> ViewResult {
        SliceView::limit(self.0).apply(result)
    }
}

impl OffsetView {
    pub fn apply(&self, result: ViewResult) -> ViewResult {
        SliceView::offset(self.0).apply(result)
    }
}

// ---------------------------------------------------------------------------
// Override
// ---------------------------------------------------------------------------

/// Add tags to the effective tag set.
pub const TAGS_ADD: &str = "tags_add";
/// Remove tags from the effective tag set.
pub const TAGS_REMOVE: &str = "tags_remove";

/// Field assignments, optionally guarded by a predicate.
#[derive(Debug, Clone)]
pub struct OverrideRule {
    pub guard: Option<Predicate>,
    pub set: BTreeMap<String, Value>,
}

impl OverrideRule {
    pub fn always(set: BTreeMap<String, Value>) -> Self {
        Self { guard: None, set }
    }

    pub fn when(guard: Predicate, set: BTreeMap<String, Value>) -> Self {
        Self {
            guard: Some(guard),
            set,
        }
    }

    fn applies(&self, bookmark: &OverriddenBookmark, now: DateTime<Utc>) -> bool {
        self.guard
            .as_ref()
            .map_or(true, |guard| guard.matches_at(bookmark, now))
    }

    fn apply_to(&self, bookmark: &mut OverriddenBookmark) {
        for (field, value) in &self.set {
            match field.as_str() {
                TAGS_ADD => {
                    let mut tags = bookmark.effective_tags();
                    for tag in value.as_string_list().unwrap_or_default() {
                        if !tags.contains(&tag) {
                            tags.push(tag);
                        }
                    }
                    bookmark.set_override("tags", tags);
                }
                TAGS_REMOVE => {
                    let removed = value.as_string_list().unwrap_or_default();
                    let mut tags = bookmark.effective_tags();
                    tags.retain(|t| !removed.contains(t));
                    bookmark.set_override("tags", tags);
                }
                _ => bookmark.set_override(field.clone(), value.clone()),
            }
        }
    }
}

/// Non-destructive per-view field overrides. Rules run in order and
/// later rules win. Each guard sees the overlay built so far.
#[derive(Debug, Clone)]
pub struct OverrideView {
    pub rules: Vec<OverrideRule>,
}

impl OverrideView {
    pub fn new(rules: Vec<OverrideRule>) -> Self {
        Self { rules }
    }

    pub fn apply(&self, result: ViewResult, ctx: &ViewContext<'_>) -> ViewResult {
        let now = ctx.now();
        result.map(|mut bookmark| {
            for rule in &self.rules {
                if rule.applies(&bookmark, now) {
                    rule.apply_to(&mut bookmark);
                }
            }
            bookmark
        })
    }
}

// ---------------------------------------------------------------------------
// Group
// ---------------------------------------------------------------------------

/// Group key for bookmarks without tags when grouping by tag.
pub const UNTAGGED: &str = "Untagged";
/// Group key for missing or unusable values.
pub const UNKNOWN: &str = "Unknown";
/// Extra field set on each member with its group key.
pub const GROUP_FIELD: &str = "group";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Granularity {
    Year,
    Month,
    Week,
    Day,
}

impl Granularity {
    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "year" => Some(Granularity::Year),
            "month" => Some(Granularity::Month),
            "week" => Some(Granularity::Week),
            "day" => Some(Granularity::Day),
            _ => None,
        }
    }

    fn key_and_label(&self, dt: &DateTime<Utc>) -> (String, String) {
        match self {
            Granularity::Year => {
                let key = dt.format("%Y").to_string();
                (key.clone(), key)
            }
            Granularity::Month => (dt.format("%Y-%m").to_string(), dt.format("%B %Y").to_string()),
            Granularity::Week => {
                let (year, week) = iso_week(dt);
                (format!("{}-W{:02}", year, week), format!("Week {}, {}", week, year))
            }
            Granularity::Day => {
                let key = dt.format("%Y-%m-%d").to_string();
                (key.clone(), key)
            }
        }
    }
}

/// How bookmarks with several tags are grouped.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TagStrategy {
    /// First tag only
    Primary,
    /// A member of every one of its tags' groups
    All,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GroupOrder {
    Asc,
    Desc,
    /// Largest first, ties by key
    Count,
}

impl GroupOrder {
    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "asc" => Some(GroupOrder::Asc),
            "desc" => Some(GroupOrder::Desc),
            "count" => Some(GroupOrder::Count),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GroupSpec {
    pub field: String,
    pub granularity: Granularity,
    pub tag_strategy: TagStrategy,
    pub order: GroupOrder,
    pub min_count: usize,
}

impl GroupSpec {
    pub fn new(field: impl Into<String>) -> Self {
        Self {
            field: field.into(),
            granularity: Granularity::Month,
            tag_strategy: TagStrategy::Primary,
            order: GroupOrder::Asc,
            min_count: 1,
        }
    }

    pub fn granularity(mut self, granularity: Granularity) -> Self {
        self.granularity = granularity;
        self
    }

    pub fn tag_strategy(mut self, strategy: TagStrategy) -> Self {
        self.tag_strategy = strategy;
        self
    }

    pub fn order(mut self, order: GroupOrder) -> Self {
        self.order = order;
        self
    }

    pub fn min_count(mut self, min_count: usize) -> Self {
        self.min_count = min_count;
        self
    }

    /// Every (key, label) this bookmark belongs under.
    fn keys_for(&self, bookmark: &OverriddenBookmark) -> Vec<(String, String)> {
        let field = BookmarkField::parse(&self.field);
        match field {
            Some(BookmarkField::Tags) => {
                let tags = bookmark.tag_list();
                let keys: Vec<&String> = match self.tag_strategy {
                    TagStrategy::Primary => tags.first().into_iter().collect(),
                    TagStrategy::All => {
                        let mut seen = Vec::new();
                        for tag in tags.iter() {
                            if !seen.contains(&tag) {
                                seen.push(tag);
                            }
                        }
                        seen
                    }
                };
                if keys.is_empty() {
                    vec![labelled(UNTAGGED)]
                } else {
                    keys.into_iter().map(|k| labelled(k)).collect()
                }
            }
            Some(f) if f.is_temporal() => vec![match bookmark.get_field(f).as_datetime() {
                Some(dt) => self.granularity.key_and_label(&dt),
                None => labelled(UNKNOWN),
            }],
            _ => {
                let value = bookmark.get(&self.field);
                vec![match value {
                    Value::Null => labelled(UNKNOWN),
                    Value::String(ref s) if s.is_empty() => labelled(UNKNOWN),
                    Value::DateTime(dt) => self.granularity.key_and_label(&dt),
                    other => labelled(&other.to_string()),
                }]
            }
        }
    }
}

fn labelled(key: &str) -> (String, String) {
    (key.to_string(), key.to_string())
}

/// Partition into labeled groups. A grouped input is regrouped from its
/// flat order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GroupView {
    pub spec: GroupSpec,
}

impl GroupView {
    pub fn new(spec: GroupSpec) -> Self {
        Self { spec }
    }

    pub fn by(field: impl Into<String>) -> Self {
        Self::new(GroupSpec::new(field))
    }

    pub fn apply(&self, result: ViewResult) -> ViewResult {
        let metadata = result.metadata.clone();
        let mut groups: Vec<GroupedResult> = Vec::new();
        let mut index: HashMap<String, usize> = HashMap::new();

        for bookmark in result.flatten() {
            for (key, label) in self.spec.keys_for(&bookmark) {
                let mut member = bookmark.clone();
                member.set_extra(GROUP_FIELD, key.as_str());
                let slot = *index.entry(key.clone()).or_insert_with(|| {
                    groups.push(GroupedResult {
                        key,
                        label,
                        bookmarks: Vec::new(),
                    });
                    groups.len() - 1
                });
                groups[slot].bookmarks.push(member);
            }
        }

        groups.retain(|g| g.len() >= self.spec.min_count);
        match self.spec.order {
            GroupOrder::Asc => groups.sort_by(|a, b| a.key.cmp(&b.key)),
            GroupOrder::Desc => groups.sort_by(|a, b| b.key.cmp(&a.key)),
            GroupOrder::Count => {
                groups.sort_by(|a, b| b.len().cmp(&a.len()).then_with(|| a.key.cmp(&b.key)))
            }
        }

        let mut grouped = ViewResult::grouped(groups);
        grouped.metadata = metadata;
        grouped
    }
}
