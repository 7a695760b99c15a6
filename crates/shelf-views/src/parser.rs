//! Declarative definitions to view trees.
//!
//! A definition is a table. If it has a `union`, `intersect`,
//! `difference` or `pipeline` key (checked in that order) it is that
//! composite and nothing else. Otherwise it is a stage list: `extends` (or
//! every bookmark), then whichever of `select`, `order`, `limit`, `offset`,
//! `slice`, `override` and `group` are present, always in that order.
//!
//! ```toml
//! [reading]
//! description = "Unread Rust articles, newest first"
//! params = { tag = "rust" }
//! select = { all = [{ tags = ["{{ tag }}"] }, { visit_count = 0 }] }
//! order = "added desc"
//! limit = 20
//! ```

use std::collections::BTreeMap;

use lazy_static::lazy_static;
use regex::{Captures, Regex};
use serde_json::{Map, Value as Json};
use shelf_core::Value;

use crate::composites::{DifferenceView, IntersectView, RefView, UnionView};
use crate::dates::DateBound;
use crate::error::ParseError;
use crate::predicate::{
    DomainMode, DomainPredicate, FieldOp, FieldPredicate, Predicate, SearchPredicate, TagMode,
    TagsPredicate, TemporalField, TemporalPredicate,
};
use crate::primitives::{
    Direction, Granularity, GroupOrder, GroupSpec, NullsPlacement, OrderSpec, OrderView,
    OverrideRule, RandomOrderView, TagStrategy,
};
use crate::view::View;

type Parsed<T> = std::result::Result<T, ParseError>;

lazy_static! {
    static ref PLACEHOLDER_RE: Regex =
        Regex::new(r"\{\{\s*([A-Za-z_][A-Za-z0-9_]*)\s*\}\}").unwrap();
}

/// Top-level keys holding metadata rather than view structure.
pub const METADATA_KEYS: [&str; 2] = ["description", "params"];

/// Stage keys in evaluation order.
const STAGE_KEYS: [&str; 7] = ["select", "order", "limit", "offset", "slice", "override", "group"];

/// Fields whose bare value in a predicate means equality.
const SHORTHAND_FIELDS: [&str; 6] = ["stars", "starred", "pinned", "archived", "visit_count", "reachable"];

/// Parse one definition with `params` bound to its placeholders.
pub fn parse_definition(definition: &Json, params: &BTreeMap<String, Value>) -> Parsed<View> {
    let body = match definition {
        Json::Object(map) => Json::Object(
            map.iter()
                .filter(|(k, _)| !METADATA_KEYS.contains(&k.as_str()))
                .map(|(k, v)| (k.clone(), v.clone()))
                .collect(),
        ),
        other => other.clone(),
    };
    parse_view(&substitute(&body, params)?)
}

/// Replace `{{ name }}` placeholders. A string that is exactly one
/// placeholder takes the parameter's typed value.
pub fn substitute(json: &Json, params: &BTreeMap<String, Value>) -> Parsed<Json> {
    match json {
        Json::String(s) => substitute_str(s, params),
        Json::Array(items) => items
            .iter()
            .map(|item| substitute(item, params))
            .collect::<Parsed<Vec<_>>>()
            .map(Json::Array),
        Json::Object(map) => map
            .iter()
            .map(|(k, v)| Ok((k.clone(), substitute(v, params)?)))
            .collect::<Parsed<Map<_, _>>>()
            .map(Json::Object),
        other => Ok(other.clone()),
    }
}

fn substitute_str(s: &str, params: &BTreeMap<String, Value>) -> Parsed<Json> {
    let trimmed = s.trim();
    if let Some(caps) = PLACEHOLDER_RE.captures(trimmed) {
        if caps[0].len() == trimmed.len() {
            return params
                .get(&caps[1])
                .map(Value::to_json)
                .ok_or_else(|| ParseError::UnboundParam {
                    name: caps[1].to_string(),
                });
        }
    }
    let mut unbound = None;
    let replaced = PLACEHOLDER_RE.replace_all(s, |caps: &Captures<'_>| match params.get(&caps[1]) {
        Some(value) => value.to_string(),
        None => {
            unbound.get_or_insert_with(|| caps[1].to_string());
            String::new()
        }
    });
    match unbound {
        Some(name) => Err(ParseError::UnboundParam { name }),
        None => Ok(Json::String(replaced.into_owned())),
    }
}

/// Parse a definition table into a view.
pub fn parse_view(definition: &Json) -> Parsed<View> {
    let map = definition
        .as_object()
        .ok_or_else(|| ParseError::invalid("definition", "expected a table"))?;

    if let Some(members) = map.get("union") {
        return parse_members("union", members).map(|views| View::Union(UnionView::new(views)));
    }
    if let Some(members) = map.get("intersect") {
        return parse_members("intersect", members)
            .map(|views| View::Intersect(IntersectView::new(views)));
    }
    if let Some(spec) = map.get("difference") {
        return parse_difference(spec);
    }
    if let Some(stages) = map.get("pipeline") {
        return parse_members("pipeline", stages).map(View::pipeline);
    }
    parse_stages(map)
}

fn parse_stages(map: &Map<String, Json>) -> Parsed<View> {
    if let Some(unknown) = map
        .keys()
        .find(|k| k.as_str() != "extends" && !STAGE_KEYS.contains(&k.as_str()) && !METADATA_KEYS.contains(&k.as_str()))
    {
        return Err(ParseError::invalid(unknown.clone(), "unknown definition key"));
    }

    let mut stages = vec![match map.get("extends") {
        Some(base) => parse_ref("extends", base)?,
        None => View::All,
    }];
    for key in STAGE_KEYS {
        let Some(value) = map.get(key) else { continue };
        let stage = match key {
            "select" => View::select(parse_predicate(value, "select")?),
            "order" => parse_order(value)?,
            "limit" => View::limit(parse_count(value, "limit")?),
            "offset" => View::offset(parse_count(value, "offset")?),
            "slice" => parse_slice(value)?,
            "override" => View::overrides(parse_override(value)?),
            _ => View::group(parse_group(value)?),
        };
        stages.push(stage);
    }

    if stages.len() == 1 {
        return Ok(stages.remove(0));
    }
    // Let the first real stage read the store so selections push down.
    if matches!(stages[0], View::All) {
        stages.remove(0);
    }
    Ok(View::pipeline(stages))
}

// ---------------------------------------------------------------------------
// Composites
// ---------------------------------------------------------------------------

fn parse_members(key: &str, value: &Json) -> Parsed<Vec<View>> {
    let items = value
        .as_array()
        .ok_or_else(|| ParseError::invalid(key, "expected a list of views"))?;
    items
        .iter()
        .enumerate()
        .map(|(i, item)| parse_entry(&format!("{}[{}]", key, i), item))
        .collect()
}

/// A name, a `{ view, params }` reference, or a nested definition.
fn parse_entry(key: &str, value: &Json) -> Parsed<View> {
    match value {
        Json::String(_) => parse_ref(key, value),
        Json::Object(map) if map.contains_key("view") => parse_ref(key, value),
        Json::Object(_) => parse_view(value),
        _ => Err(ParseError::invalid(key, "expected a view name or definition")),
    }
}

fn parse_ref(key: &str, value: &Json) -> Parsed<View> {
    match value {
        Json::String(name) => Ok(View::named(name.clone())),
        Json::Object(map) => {
            let name = map
                .get("view")
                .and_then(Json::as_str)
                .ok_or_else(|| ParseError::missing(format!("{}.view", key)))?;
            let params = match map.get("params") {
                None => BTreeMap::new(),
                Some(Json::Object(p)) => p.iter().map(|(k, v)| (k.clone(), Value::from(v))).collect(),
                Some(_) => return Err(ParseError::invalid(format!("{}.params", key), "expected a table")),
            };
            Ok(View::Ref(RefView::with_params(name, params)))
        }
        _ => Err(ParseError::invalid(key, "expected a view name")),
    }
}

fn parse_difference(value: &Json) -> Parsed<View> {
    let map = value
        .as_object()
        .ok_or_else(|| ParseError::invalid("difference", "expected a table with 'from' and 'exclude'"))?;
    let from = map
        .get("from")
        .ok_or_else(|| ParseError::missing("difference.from"))?;
    let exclude = map
        .get("exclude")
        .ok_or_else(|| ParseError::missing("difference.exclude"))?;
    let primary = parse_entry("difference.from", from)?;
    let excluded = match exclude {
        Json::Array(_) => parse_members("difference.exclude", exclude)?,
        single => vec![parse_entry("difference.exclude", single)?],
    };
    Ok(View::Difference(DifferenceView::new(primary, excluded)))
}

// ---------------------------------------------------------------------------
// Predicates
// ---------------------------------------------------------------------------

/// Parse a predicate table. The first recognized key wins.
pub fn parse_predicate(value: &Json, key: &str) -> Parsed<Predicate> {
    let map = value
        .as_object()
        .ok_or_else(|| ParseError::invalid(key, "expected a predicate table"))?;

    if let Some(items) = map.get("all") {
        return parse_predicate_list(items, &format!("{}.all", key)).map(Predicate::All);
    }
    if let Some(items) = map.get("any") {
        return parse_predicate_list(items, &format!("{}.any", key)).map(Predicate::Any);
    }
    if let Some(inner) = map.get("not") {
        return parse_predicate(inner, &format!("{}.not", key)).map(Predicate::negate);
    }
    if let Some(tags) = map.get("tags") {
        return parse_tags(tags, &format!("{}.tags", key));
    }
    if map.contains_key("field") {
        return parse_explicit_field(map, key);
    }
    for name in ["added", "visited", "last_visited"] {
        if let (Some(spec), Some(field)) = (map.get(name), TemporalField::parse(name)) {
            return parse_temporal(field, spec, &format!("{}.{}", key, name));
        }
    }
    if let Some(domain) = map.get("domain") {
        return parse_domain(domain, &format!("{}.domain", key));
    }
    if let Some(search) = map.get("search") {
        return parse_search(search, &format!("{}.search", key));
    }
    if let Some(ids) = map.get("ids") {
        return parse_ids(ids, &format!("{}.ids", key));
    }
    for name in SHORTHAND_FIELDS {
        if let Some(spec) = map.get(name) {
            return parse_comparison(name, spec, &format!("{}.{}", key, name));
        }
    }
    if map.len() == 1 {
        if let Some((name, spec)) = map.iter().next() {
            return parse_comparison(name, spec, &format!("{}.{}", key, name));
        }
    }
    Err(ParseError::invalid(key, "unrecognized predicate"))
}

fn parse_predicate_list(value: &Json, key: &str) -> Parsed<Vec<Predicate>> {
    let items = value
        .as_array()
        .ok_or_else(|| ParseError::invalid(key, "expected a list of predicates"))?;
    items
        .iter()
        .enumerate()
        .map(|(i, item)| parse_predicate(item, &format!("{}[{}]", key, i)))
        .collect()
}

fn parse_tags(value: &Json, key: &str) -> Parsed<Predicate> {
    match value {
        Json::Array(_) | Json::String(_) => {
            Ok(TagsPredicate::new(string_list(value, key)?, TagMode::All)?.into())
        }
        Json::Object(map) => {
            for (name, mode) in [
                ("all", TagMode::All),
                ("any", TagMode::Any),
                ("none", TagMode::None),
                ("match", TagMode::Match),
            ] {
                if let Some(tags) = map.get(name) {
                    let tags = string_list(tags, &format!("{}.{}", key, name))?;
                    return Ok(TagsPredicate::new(tags, mode)?.into());
                }
            }
            Err(ParseError::invalid(key, "expected one of all, any, none, match"))
        }
        _ => Err(ParseError::invalid(key, "expected a tag list")),
    }
}

fn parse_explicit_field(map: &Map<String, Json>, key: &str) -> Parsed<Predicate> {
    let field = map
        .get("field")
        .and_then(Json::as_str)
        .ok_or_else(|| ParseError::invalid(format!("{}.field", key), "expected a field name"))?;
    let op = match map.get("op") {
        None => FieldOp::Eq,
        Some(op) => parse_op(op, &format!("{}.op", key))?,
    };
    let value = match (map.get("value"), op) {
        (Some(v), _) => Value::from(v),
        (None, FieldOp::IsNull | FieldOp::IsNotNull) => Value::Null,
        (None, _) => return Err(ParseError::missing(format!("{}.value", key))),
    };
    Ok(FieldPredicate::new(field, op, value)?.into())
}

/// `field = value`, `field = { op, value }` or `field = { gt = 5 }`.
fn parse_comparison(field: &str, spec: &Json, key: &str) -> Parsed<Predicate> {
    let Json::Object(map) = spec else {
        return Ok(FieldPredicate::new(field, FieldOp::Eq, Value::from(spec))?.into());
    };
    if let Some(op) = map.get("op") {
        let op = parse_op(op, &format!("{}.op", key))?;
        let value = map.get("value").map(Value::from).unwrap_or(Value::Null);
        if value.is_null() && !matches!(op, FieldOp::IsNull | FieldOp::IsNotNull | FieldOp::Eq | FieldOp::Ne) {
            return Err(ParseError::missing(format!("{}.value", key)));
        }
        return Ok(FieldPredicate::new(field, op, value)?.into());
    }
    let mut entries = map.iter();
    match (entries.next(), entries.next()) {
        (Some((op, value)), None) => {
            let op = FieldOp::parse(op)
                .ok_or_else(|| ParseError::invalid(key, format!("unknown operator '{}'", op)))?;
            Ok(FieldPredicate::new(field, op, Value::from(value))?.into())
        }
        _ => Err(ParseError::invalid(key, "expected { op, value }")),
    }
}

fn parse_op(value: &Json, key: &str) -> Parsed<FieldOp> {
    let name = value
        .as_str()
        .ok_or_else(|| ParseError::invalid(key, "expected an operator name"))?;
    FieldOp::parse(name).ok_or_else(|| ParseError::invalid(key, format!("unknown operator '{}'", name)))
}

fn parse_temporal(field: TemporalField, spec: &Json, key: &str) -> Parsed<Predicate> {
    let predicate = match spec {
        // A bare span ("7 days") reads as `within`, anything else as `after`.
        Json::String(s) if DateBound::parse_within(s).is_some() => {
            TemporalPredicate::parse(field, None, None, Some(s.as_str()))?
        }
        Json::String(s) => TemporalPredicate::parse(field, Some(s.as_str()), None, None)?,
        Json::Object(_) => {
            let after = date_text(spec, "after", key)?;
            let before = date_text(spec, "before", key)?;
            let within = date_text(spec, "within", key)?;
            if after.is_none() && before.is_none() && within.is_none() {
                return Err(ParseError::invalid(key, "expected after, before or within"));
            }
            TemporalPredicate::parse(field, after, before, within)?
        }
        _ => return Err(ParseError::invalid(key, "expected a date range")),
    };
    Ok(predicate.into())
}

fn date_text<'a>(spec: &'a Json, name: &str, key: &str) -> Parsed<Option<&'a str>> {
    match spec.get(name) {
        None => Ok(None),
        Some(Json::String(s)) => Ok(Some(s.as_str())),
        Some(_) => Err(ParseError::invalid(format!("{}.{}", key, name), "expected a date string")),
    }
}

fn parse_domain(value: &Json, key: &str) -> Parsed<Predicate> {
    match value {
        Json::String(_) | Json::Array(_) => {
            Ok(DomainPredicate::new(string_list(value, key)?, DomainMode::Any)?.into())
        }
        Json::Object(map) => {
            for (name, mode) in [
                ("any", DomainMode::Any),
                ("none", DomainMode::None),
                ("match", DomainMode::Match),
            ] {
                if let Some(domains) = map.get(name) {
                    let domains = string_list(domains, &format!("{}.{}", key, name))?;
                    return Ok(DomainPredicate::new(domains, mode)?.into());
                }
            }
            Err(ParseError::invalid(key, "expected one of any, none, match"))
        }
        _ => Err(ParseError::invalid(key, "expected a domain list")),
    }
}

fn parse_search(value: &Json, key: &str) -> Parsed<Predicate> {
    match value {
        Json::String(query) => Ok(Predicate::search(query.clone())),
        Json::Object(map) => {
            let query = map
                .get("query")
                .and_then(Json::as_str)
                .ok_or_else(|| ParseError::missing(format!("{}.query", key)))?;
            let search = match map.get("fields") {
                Some(fields) => SearchPredicate::with_fields(query, string_list(fields, &format!("{}.fields", key))?),
                None => SearchPredicate::new(query),
            };
            Ok(search.into())
        }
        _ => Err(ParseError::invalid(key, "expected a query string")),
    }
}

fn parse_ids(value: &Json, key: &str) -> Parsed<Predicate> {
    let items = value
        .as_array()
        .ok_or_else(|| ParseError::invalid(key, "expected a list of ids"))?;
    let ids = items
        .iter()
        .map(|v| v.as_i64().ok_or_else(|| ParseError::invalid(key, format!("'{}' is not an id", v))))
        .collect::<Parsed<Vec<_>>>()?;
    Ok(Predicate::ids(ids))
}

fn string_list(value: &Json, key: &str) -> Parsed<Vec<String>> {
    match value {
        Json::String(s) => Ok(vec![s.clone()]),
        Json::Array(items) => items
            .iter()
            .map(|v| {
                v.as_str()
                    .map(str::to_string)
                    .ok_or_else(|| ParseError::invalid(key, format!("'{}' is not a string", v)))
            })
            .collect(),
        _ => Err(ParseError::invalid(key, "expected a string or list of strings")),
    }
}

// ---------------------------------------------------------------------------
// Order, slicing, overrides, grouping
// ---------------------------------------------------------------------------

fn parse_order(value: &Json) -> Parsed<View> {
    match value {
        Json::String(s) => View::order(s),
        Json::Array(items) => {
            let specs = items
                .iter()
                .map(|item| match item {
                    Json::String(s) => OrderSpec::parse(s),
                    other => parse_order_spec(other),
                })
                .collect::<Parsed<Vec<_>>>()?;
            if specs.is_empty() {
                return Err(ParseError::invalid("order", "no sort keys"));
            }
            Ok(View::Order(OrderView::new(specs)))
        }
        Json::Object(map) => {
            let random = map.get("random").and_then(Json::as_bool).unwrap_or(false)
                || map.get("field").and_then(Json::as_str) == Some("random");
            if random {
                let seed = match map.get("seed") {
                    None => None,
                    Some(seed) => Some(
                        seed.as_u64()
                            .ok_or_else(|| ParseError::invalid("order.seed", "expected a non-negative integer"))?,
                    ),
                };
                return Ok(View::RandomOrder(RandomOrderView::new(seed)));
            }
            Ok(View::Order(OrderView::new(vec![parse_order_spec(value)?])))
        }
        _ => Err(ParseError::invalid("order", "expected a string, list or table")),
    }
}

fn parse_order_spec(value: &Json) -> Parsed<OrderSpec> {
    let map = value
        .as_object()
        .ok_or_else(|| ParseError::invalid("order", "expected a sort key table"))?;
    let field = map
        .get("field")
        .and_then(Json::as_str)
        .ok_or_else(|| ParseError::missing("order.field"))?;
    let mut spec = OrderSpec::asc(field);
    if let Some(dir) = map.get("direction").or_else(|| map.get("dir")) {
        spec.direction = dir
            .as_str()
            .and_then(Direction::parse)
            .ok_or_else(|| ParseError::invalid("order.direction", format!("unknown direction {}", dir)))?;
    }
    if let Some(nulls) = map.get("nulls") {
        spec.nulls = nulls
            .as_str()
            .and_then(NullsPlacement::parse)
            .ok_or_else(|| ParseError::invalid("order.nulls", "expected 'first' or 'last'"))?;
    }
    if let Some(cs) = map.get("case_sensitive") {
        spec.case_sensitive = cs
            .as_bool()
            .ok_or_else(|| ParseError::invalid("order.case_sensitive", "expected a boolean"))?;
    }
    Ok(spec)
}

fn parse_count(value: &Json, key: &str) -> Parsed<usize> {
    value
        .as_u64()
        .or_else(|| value.as_str().and_then(|s| s.trim().parse().ok()))
        .map(|n| n as usize)
        .ok_or_else(|| ParseError::invalid(key, format!("expected a non-negative integer, got {}", value)))
}

fn parse_slice(value: &Json) -> Parsed<View> {
    match value {
        Json::Object(map) => {
            let offset = map.get("offset").map(|v| parse_count(v, "slice.offset")).transpose()?;
            let limit = map.get("limit").map(|v| parse_count(v, "slice.limit")).transpose()?;
            Ok(View::slice(offset.unwrap_or(0), limit))
        }
        Json::Array(items) if !items.is_empty() && items.len() <= 2 => {
            let offset = parse_count(&items[0], "slice[0]")?;
            let limit = items.get(1).map(|v| parse_count(v, "slice[1]")).transpose()?;
            Ok(View::slice(offset, limit))
        }
        _ => Err(ParseError::invalid("slice", "expected { offset, limit } or [offset, limit]")),
    }
}

fn parse_override(value: &Json) -> Parsed<Vec<OverrideRule>> {
    match value {
        Json::Array(items) => items
            .iter()
            .enumerate()
            .map(|(i, item)| parse_rule(item, &format!("override[{}]", i)))
            .collect(),
        Json::Object(map) if map.contains_key("set") => Ok(vec![parse_rule(value, "override")?]),
        Json::Object(map) => Ok(vec![OverrideRule::always(field_map(map))]),
        _ => Err(ParseError::invalid("override", "expected a rule, list of rules or field table")),
    }
}

fn parse_rule(value: &Json, key: &str) -> Parsed<OverrideRule> {
    let map = value
        .as_object()
        .ok_or_else(|| ParseError::invalid(key, "expected a rule table"))?;
    let set = match map.get("set") {
        Some(Json::Object(fields)) => field_map(fields),
        Some(_) => return Err(ParseError::invalid(format!("{}.set", key), "expected a field table")),
        None => return Err(ParseError::missing(format!("{}.set", key))),
    };
    match map.get("match") {
        Some(guard) => Ok(OverrideRule::when(parse_predicate(guard, &format!("{}.match", key))?, set)),
        None => Ok(OverrideRule::always(set)),
    }
}

fn field_map(map: &Map<String, Json>) -> BTreeMap<String, Value> {
    map.iter().map(|(k, v)| (k.clone(), Value::from(v))).collect()
}

fn parse_group(value: &Json) -> Parsed<GroupSpec> {
    let map = match value {
        Json::String(field) => return Ok(GroupSpec::new(field.clone())),
        Json::Object(map) => map,
        _ => return Err(ParseError::invalid("group", "expected a field name or table")),
    };
    let field = map
        .get("by")
        .or_else(|| map.get("field"))
        .and_then(Json::as_str)
        .ok_or_else(|| ParseError::missing("group.by"))?;
    let mut spec = GroupSpec::new(field);
    if let Some(g) = map.get("granularity") {
        spec.granularity = g
            .as_str()
            .and_then(Granularity::parse)
            .ok_or_else(|| ParseError::invalid("group.granularity", format!("unknown granularity {}", g)))?;
    }
    if let Some(t) = map.get("tags").or_else(|| map.get("tag_strategy")) {
        spec.tag_strategy = match t.as_str() {
            Some("primary") => TagStrategy::Primary,
            Some("all") => TagStrategy::All,
            _ => return Err(ParseError::invalid("group.tags", "expected 'primary' or 'all'")),
        };
    }
    if let Some(o) = map.get("order") {
        spec.order = o
            .as_str()
            .and_then(GroupOrder::parse)
            .ok_or_else(|| ParseError::invalid("group.order", "expected 'asc', 'desc' or 'count'"))?;
    }
    if let Some(n) = map.get("min_count") {
        spec.min_count = parse_count(n, "group.min_count")?;
    }
    Ok(spec)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn parse(def: Json) -> Parsed<View> {
        parse_definition(&def, &BTreeMap::new())
    }

    fn kinds(view: &View) -> Vec<&'static str> {
        match view {
            View::Pipeline(p) => p.stages.iter().map(View::kind).collect(),
            other => vec![other.kind()],
        }
    }

    #[test]
    fn stage_order_is_fixed() {
        let view = parse(json!({
            "group": "domain",
            "limit": 5,
            "override": { "title": "x" },
            "order": "added desc",
            "select": { "pinned": true },
        }))
        .unwrap();
        assert_eq!(kinds(&view), vec!["select", "order", "limit", "override", "group"]);
    }

    #[test]
    fn single_stage_is_unwrapped() {
        assert!(matches!(parse(json!({})).unwrap(), View::All));
        assert!(matches!(parse(json!({ "extends": "starred" })).unwrap(), View::Ref(_)));
        // A lone stage still runs as a pipeline so hidden rows are dropped.
        assert_eq!(kinds(&parse(json!({ "limit": 3 })).unwrap()), vec!["limit"]);
        assert_eq!(
            kinds(&parse(json!({ "extends": "recent", "select": { "stars": 1 } })).unwrap()),
            vec!["ref", "select"]
        );
    }

    #[test]
    fn composite_keys_take_priority() {
        let view = parse(json!({
            "pipeline": ["a", "b"],
            "union": ["starred", { "view": "tagged", "params": { "tag": "rust" } }, { "select": { "ids": [1] } }],
            "limit": 1,
        }))
        .unwrap();
        let View::Union(union) = view else { panic!("expected union") };
        assert_eq!(union.views.len(), 3);
        assert!(matches!(&union.views[1], View::Ref(r) if r.params.get("tag") == Some(&Value::from("rust"))));
        assert!(matches!(&union.views[2], View::Select(_)));
    }

    #[test]
    fn difference_requires_from_and_exclude() {
        let ok = parse(json!({ "difference": { "from": "all", "exclude": ["archived", "broken"] } })).unwrap();
        assert!(matches!(&ok, View::Difference(d) if d.excluded.len() == 2));
        let single = parse(json!({ "difference": { "from": "all", "exclude": "archived" } })).unwrap();
        assert!(matches!(&single, View::Difference(d) if d.excluded.len() == 1));

        let err = parse(json!({ "difference": { "exclude": "archived" } })).unwrap_err();
        assert_eq!(err, ParseError::missing("difference.from"));
        let err = parse(json!({ "difference": { "from": "all" } })).unwrap_err();
        assert_eq!(err, ParseError::missing("difference.exclude"));
    }

    #[test]
    fn predicate_shapes() {
        let cases = [
            json!({ "all": [{ "tags": ["a"] }, { "not": { "archived": true } }] }),
            json!({ "tags": { "any": ["a", "b"] } }),
            json!({ "tags": { "match": "py*" } }),
            json!({ "field": "title", "op": "contains", "value": "rust" }),
            json!({ "field": "description", "op": "is_null" }),
            json!({ "added": { "after": "2024-01-01", "before": "30 days ago" } }),
            json!({ "visited": "7 days" }),
            json!({ "domain": { "none": ["example.com"] } }),
            json!({ "search": { "query": "tokio", "fields": ["title"] } }),
            json!({ "ids": [1, 2] }),
            json!({ "stars": { "op": "gte", "value": 2 } }),
            json!({ "visit_count": { "gt": 5 } }),
            json!({ "title": "Exact" }),
        ];
        for case in cases {
            assert!(parse_predicate(&case, "select").is_ok(), "failed on {}", case);
        }
    }

    #[test]
    fn malformed_predicates_are_errors() {
        let cases = [
            json!({}),
            json!({ "title": "a", "url": "b" }),
            json!({ "tags": 5 }),
            json!({ "tags": { "some": ["a"] } }),
            json!({ "field": "title", "op": "like", "value": "x" }),
            json!({ "field": "title", "op": "gt" }),
            json!({ "stars": { "op": "gt" } }),
            json!({ "ids": ["one"] }),
            json!({ "field": "title", "op": "regex", "value": "(" }),
            json!("stars"),
        ];
        for case in cases {
            assert!(parse_predicate(&case, "select").is_err(), "accepted {}", case);
        }
    }

    #[test]
    fn unparsable_dates_are_rejected() {
        let err = parse(json!({ "select": { "added": { "after": "a while back" } } })).unwrap_err();
        assert!(matches!(err, ParseError::InvalidDate { ref key, .. } if key == "added.after"));

        let err = parse(json!({ "select": { "added": { "after": "1000000 years ago" } } })).unwrap_err();
        assert!(matches!(err, ParseError::InvalidDate { ref value, .. } if value == "1000000 years ago"));
        let err = parse(json!({ "select": { "visited": "9223372036854775807 weeks" } })).unwrap_err();
        assert!(matches!(err, ParseError::InvalidDate { .. }));
    }

    #[test]
    fn order_forms() {
        assert!(matches!(parse_order(&json!("random")).unwrap(), View::RandomOrder(r) if r.seed.is_none()));
        assert!(matches!(
            parse_order(&json!({ "random": true, "seed": 7 })).unwrap(),
            View::RandomOrder(r) if r.seed == Some(7)
        ));
        let View::Order(list) = parse_order(&json!(["stars desc", { "field": "title", "nulls": "first" }])).unwrap()
        else {
            panic!("expected order")
        };
        assert_eq!(list.specs[0], OrderSpec::desc("stars"));
        assert_eq!(list.specs[1], OrderSpec::asc("title").nulls(NullsPlacement::First));
        assert!(parse_order(&json!({ "direction": "desc" })).is_err());
    }

    #[test]
    fn override_forms() {
        assert_eq!(parse_override(&json!({ "title": "x", "pinned": true })).unwrap()[0].set.len(), 2);
        let rules = parse_override(&json!([
            { "set": { "tags_add": ["fav"] }, "match": { "stars": { "gt": 0 } } },
            { "set": { "is_hidden": true }, "match": { "archived": true } },
        ]))
        .unwrap();
        assert_eq!(rules.len(), 2);
        assert!(rules.iter().all(|r| r.guard.is_some()));
        assert!(parse_override(&json!([{ "match": { "archived": true } }])).is_err());
    }

    #[test]
    fn group_forms() {
        assert_eq!(parse_group(&json!("tags")).unwrap(), GroupSpec::new("tags"));
        let spec = parse_group(&json!({
            "by": "added", "granularity": "week", "order": "count", "min_count": 2
        }))
        .unwrap();
        assert_eq!(spec.granularity, Granularity::Week);
        assert_eq!(spec.order, GroupOrder::Count);
        assert_eq!(spec.min_count, 2);
        assert_eq!(parse_group(&json!({ "order": "asc" })).unwrap_err(), ParseError::missing("group.by"));
    }

    #[test]
    fn unknown_keys_are_rejected() {
        let err = parse(json!({ "selct": { "pinned": true } })).unwrap_err();
        assert_eq!(err.key(), "selct");
    }

    #[test]
    fn placeholders() {
        let mut params = BTreeMap::new();
        params.insert("tag".to_string(), Value::from("rust"));
        params.insert("n".to_string(), Value::Int(3));
        let out = substitute(&json!({ "tags": ["{{ tag }}"], "limit": "{{n}}", "title": "about {{tag}}!" }), &params)
            .unwrap();
        assert_eq!(out, json!({ "tags": ["rust"], "limit": 3, "title": "about rust!" }));

        let err = substitute(&json!("{{ missing }}"), &params).unwrap_err();
        assert_eq!(err, ParseError::UnboundParam { name: "missing".into() });
        let err = substitute(&json!("x {{ missing }}"), &params).unwrap_err();
        assert_eq!(err, ParseError::UnboundParam { name: "missing".into() });
    }

    #[test]
    fn metadata_keys_are_ignored() {
        let def = json!({ "description": "d", "params": { "n": 1 }, "limit": "{{ n }}" });
        let mut params = BTreeMap::new();
        params.insert("n".to_string(), Value::Int(1));
        assert_eq!(kinds(&parse_definition(&def, &params).unwrap()), vec!["limit"]);
    }
}
