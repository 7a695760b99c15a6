//! Native-query translation of predicates.
//!
//! Fragments are WHERE clauses over the `bookmarks` table. A fragment
//! always selects a superset of the rows its predicate matches, so a
//! store may return extra rows but never drops a matching one. `exact`
//! marks fragments that select precisely the matching rows; only those can
//! be negated.

use chrono::{DateTime, Utc};
use shelf_core::{format_sql_timestamp, BookmarkField, SqlParam, Value};

use crate::dates::{ceil_second, floor_second};
use crate::predicate::{
    DomainMode, DomainPredicate, FieldOp, FieldPredicate, Predicate, SearchPredicate, TagMode,
    TagsPredicate, TemporalPredicate,
};

const TAUTOLOGY: &str = "1=1";
const CONTRADICTION: &str = "0=1";
const TAGGED_WITH: &str = "bookmarks.id IN (SELECT bt.bookmark_id FROM bookmark_tags bt JOIN tags t ON t.id = bt.tag_id WHERE";

/// Compiled WHERE fragment with bound parameters.
#[derive(Debug, Clone, PartialEq)]
pub struct SqlFragment {
    pub sql: String,
    pub params: Vec<SqlParam>,
    pub exact: bool,
}

impl SqlFragment {
    fn new(sql: impl Into<String>, params: Vec<SqlParam>, exact: bool) -> Self {
        Self {
            sql: sql.into(),
            params,
            exact,
        }
    }

    /// No translation available; matches every row.
    pub fn tautology() -> Self {
        Self::new(TAUTOLOGY, Vec::new(), false)
    }

    fn everything() -> Self {
        Self::new(TAUTOLOGY, Vec::new(), true)
    }

    fn nothing() -> Self {
        Self::new(CONTRADICTION, Vec::new(), true)
    }

    /// Whether querying with this fragment would restrict nothing.
    pub fn is_trivial(&self) -> bool {
        self.sql == TAUTOLOGY
    }
}

impl Predicate {
    /// Native translation using the current wall clock for relative dates.
    pub fn to_sql(&self) -> SqlFragment {
        self.to_sql_at(Utc::now())
    }

    /// Native translation with a fixed "now".
    pub fn to_sql_at(&self, now: DateTime<Utc>) -> SqlFragment {
        match self {
            Predicate::True => SqlFragment::everything(),
            Predicate::False => SqlFragment::nothing(),
            Predicate::Tags(p) => compile_tags(p),
            Predicate::Field(p) => compile_field(p),
            Predicate::Temporal(p) => compile_temporal(p, now),
            Predicate::Domain(p) => compile_domain(p),
            Predicate::Search(p) => compile_search(p),
            Predicate::Ids(ids) => {
                if ids.is_empty() {
                    return SqlFragment::nothing();
                }
                let params: Vec<SqlParam> = ids.iter().map(|id| SqlParam::Int(*id)).collect();
                SqlFragment::new(
                    format!("bookmarks.id IN ({})", placeholders(params.len())),
                    params,
                    true,
                )
            }
            Predicate::All(preds) => {
                let mut parts = Vec::new();
                let mut params = Vec::new();
                let mut exact = true;
                for pred in preds {
                    let frag = pred.to_sql_at(now);
                    exact &= frag.exact;
                    if frag.is_trivial() {
                        continue;
                    }
                    parts.push(frag.sql);
                    params.extend(frag.params);
                }
                if parts.is_empty() {
                    SqlFragment::new(TAUTOLOGY, Vec::new(), exact)
                } else {
                    SqlFragment::new(format!("({})", parts.join(" AND ")), params, exact)
                }
            }
            Predicate::Any(preds) => {
                if preds.is_empty() {
                    return SqlFragment::nothing();
                }
                let mut parts = Vec::new();
                let mut params = Vec::new();
                let mut exact = true;
                for pred in preds {
                    let frag = pred.to_sql_at(now);
                    // One unrestricted branch makes the whole disjunction unrestricted.
                    if frag.is_trivial() {
                        return SqlFragment::new(TAUTOLOGY, Vec::new(), frag.exact);
                    }
                    exact &= frag.exact;
                    parts.push(frag.sql);
                    params.extend(frag.params);
                }
                SqlFragment::new(format!("({})", parts.join(" OR ")), params, exact)
            }
            Predicate::Not(inner) => {
                let frag = inner.to_sql_at(now);
                if !frag.exact {
                    SqlFragment::tautology()
                } else if frag.is_trivial() {
                    SqlFragment::nothing()
                } else {
                    SqlFragment::new(format!("NOT ({})", frag.sql), frag.params, true)
                }
            }
            Predicate::Custom(_) => SqlFragment::tautology(),
        }
    }
}

fn compile_tags(p: &TagsPredicate) -> SqlFragment {
    let names = || p.tags.iter().map(|t| SqlParam::Text(t.clone())).collect::<Vec<_>>();
    match p.mode {
        TagMode::All if p.tags.is_empty() => SqlFragment::everything(),
        TagMode::All => {
            let parts: Vec<String> = p
                .tags
                .iter()
                .map(|_| format!("{} t.name = ?)", TAGGED_WITH))
                .collect();
            SqlFragment::new(format!("({})", parts.join(" AND ")), names(), true)
        }
        TagMode::Any if p.tags.is_empty() => SqlFragment::nothing(),
        TagMode::Any => SqlFragment::new(
            format!("{} t.name IN ({}))", TAGGED_WITH, placeholders(p.tags.len())),
            names(),
            true,
        ),
        TagMode::None if p.tags.is_empty() => SqlFragment::new(
            "bookmarks.id NOT IN (SELECT bookmark_id FROM bookmark_tags)",
            Vec::new(),
            true,
        ),
        TagMode::None => SqlFragment::new(
            format!("NOT {} t.name IN ({}))", TAGGED_WITH, placeholders(p.tags.len())),
            names(),
            true,
        ),
        TagMode::Match => match p.glob() {
            None => SqlFragment::nothing(),
            Some(glob) if native_glob_safe(glob) => SqlFragment::new(
                format!("{} t.name GLOB ?)", TAGGED_WITH),
                vec![SqlParam::Text(glob.to_string())],
                true,
            ),
            Some(_) => SqlFragment::tautology(),
        },
    }
}

/// Column for a field, when it can be compared natively. Timestamps are
/// left to temporal predicates.
fn field_column(field: &str) -> Option<&'static str> {
    BookmarkField::parse(field)
        .filter(|f| !f.is_temporal())
        .and_then(|f| f.column())
}

/// Column for a field whose stored text equals its rendered value.
/// Boolean columns hold 0/1 but render as `true`/`false`.
fn text_column(field: &str) -> Option<&'static str> {
    BookmarkField::parse(field)
        .filter(|f| !f.is_boolean())
        .and_then(|_| field_column(field))
}

fn compile_field(p: &FieldPredicate) -> SqlFragment {
    let Some(col) = field_column(&p.field) else {
        return SqlFragment::tautology();
    };
    if matches!(p.value, Value::Array(_)) {
        return SqlFragment::tautology();
    }
    let param = SqlParam::from(&p.value);
    let (sql, params) = match p.op {
        FieldOp::Eq if p.value.is_null() => (format!("{} IS NULL", col), Vec::new()),
        FieldOp::Ne if p.value.is_null() => (format!("{} IS NOT NULL", col), Vec::new()),
        FieldOp::Eq => (format!("{} = ?", col), vec![param]),
        FieldOp::Ne => (format!("({} IS NULL OR {} != ?)", col, col), vec![param]),
        FieldOp::Gt => (format!("{} > ?", col), vec![param]),
        FieldOp::Gte => (format!("{} >= ?", col), vec![param]),
        FieldOp::Lt => (format!("{} < ?", col), vec![param]),
        FieldOp::Lte => (format!("{} <= ?", col), vec![param]),
        FieldOp::Contains | FieldOp::Prefix | FieldOp::Suffix | FieldOp::Matches
            if text_column(&p.field).is_none() =>
        {
            return SqlFragment::tautology();
        }
        FieldOp::Contains | FieldOp::Prefix | FieldOp::Suffix => {
            let needle = p.value.to_string().to_lowercase();
            // SQLite only folds ASCII case.
            if !needle.is_ascii() {
                return SqlFragment::tautology();
            }
            let pattern = match p.op {
                FieldOp::Contains => format!("%{}%", needle),
                FieldOp::Prefix => format!("{}%", needle),
                _ => format!("%{}", needle),
            };
            (format!("LOWER({}) LIKE ?", col), vec![SqlParam::Text(pattern)])
        }
        FieldOp::Matches => {
            let glob = p.value.to_string();
            if !native_glob_safe(&glob) {
                return SqlFragment::tautology();
            }
            (format!("{} GLOB ?", col), vec![SqlParam::Text(glob)])
        }
        FieldOp::Regex => return SqlFragment::tautology(),
        FieldOp::IsNull => (format!("{} IS NULL", col), Vec::new()),
        FieldOp::IsNotNull => (format!("{} IS NOT NULL", col), Vec::new()),
    };
    SqlFragment::new(sql, params, false)
}

fn compile_temporal(p: &TemporalPredicate, now: DateTime<Utc>) -> SqlFragment {
    let col = p.field.as_str();
    let mut parts = vec![format!("{} IS NOT NULL", col)];
    let mut params = Vec::new();
    // Stored timestamps have whole-second precision.
    if let Some(after) = &p.after {
        parts.push(format!("{} >= ?", col));
        params.push(SqlParam::Text(format_sql_timestamp(&floor_second(after.resolve(now)))));
    }
    if let Some(before) = &p.before {
        parts.push(format!("{} < ?", col));
        params.push(SqlParam::Text(format_sql_timestamp(&ceil_second(before.resolve(now)))));
    }
    SqlFragment::new(format!("({})", parts.join(" AND ")), params, false)
}

fn compile_domain(p: &DomainPredicate) -> SqlFragment {
    match p.mode {
        DomainMode::Any if p.domains.is_empty() => SqlFragment::nothing(),
        DomainMode::Any if p.domains.iter().all(|d| d.is_ascii()) => {
            let parts: Vec<&str> = p.domains.iter().map(|_| "LOWER(url) LIKE ?").collect();
            let params = p
                .domains
                .iter()
                .map(|d| SqlParam::Text(format!("%{}%", d)))
                .collect();
            SqlFragment::new(format!("({})", parts.join(" OR ")), params, false)
        }
        // A URL can mention a domain outside its host, so exclusion and
        // full-host globs are only checked in memory.
        _ => SqlFragment::tautology(),
    }
}

fn compile_search(p: &SearchPredicate) -> SqlFragment {
    let terms = p.terms();
    if terms.is_empty() || p.fields.is_empty() {
        return SqlFragment::tautology();
    }
    if !terms.iter().all(|t| t.is_ascii()) {
        return SqlFragment::tautology();
    }
    let mut groups = Vec::new();
    let mut params = Vec::new();
    for field in &p.fields {
        let Some(col) = text_column(field) else {
            return SqlFragment::tautology();
        };
        let conds: Vec<String> = terms
            .iter()
            .map(|term| {
                params.push(SqlParam::Text(format!("%{}%", term)));
                format!("LOWER(COALESCE({}, '')) LIKE ?", col)
            })
            .collect();
        groups.push(format!("({})", conds.join(" AND ")));
    }
    SqlFragment::new(format!("({})", groups.join(" OR ")), params, false)
}

/// Globs without bracket classes behave the same in SQLite and in memory.
fn native_glob_safe(glob: &str) -> bool {
    !glob.contains('[') && !glob.contains(']')
}

fn placeholders(n: usize) -> String {
    vec!["?"; n].join(", ")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dates::{DateBound, DateUnit};
    use crate::predicate::{DomainPredicate, TemporalField, TemporalPredicate};
    use shelf_core::parse_timestamp;

    fn now() -> DateTime<Utc> {
        parse_timestamp("2024-06-15 12:00:00").unwrap()
    }

    #[test]
    fn tags_compile_to_join() {
        let frag = Predicate::has_all_tags(["python", "web"]).to_sql();
        assert!(frag.sql.contains("bookmark_tags"));
        assert_eq!(frag.sql.matches("t.name = ?").count(), 2);
        assert_eq!(frag.params.len(), 2);
        assert!(frag.exact);

        let untagged = Predicate::has_no_tags(Vec::<String>::new()).to_sql();
        assert!(untagged.sql.contains("NOT IN"));
        assert!(untagged.params.is_empty());
    }

    #[test]
    fn field_aliases_map_to_columns() {
        let frag = Predicate::eq("starred", true).to_sql();
        assert_eq!(frag.sql, "stars > ?");
        assert_eq!(frag.params, vec![SqlParam::Int(0)]);

        let unknown = Predicate::eq("color", "red").to_sql();
        assert!(unknown.is_trivial());
    }

    #[test]
    fn ne_keeps_nulls() {
        let frag = Predicate::compare("description", FieldOp::Ne, "x").unwrap().to_sql();
        assert_eq!(frag.sql, "(description IS NULL OR description != ?)");
    }

    #[test]
    fn contains_is_lowercased_like() {
        let frag = Predicate::compare("title", FieldOp::Contains, "Rust").unwrap().to_sql();
        assert_eq!(frag.sql, "LOWER(title) LIKE ?");
        assert_eq!(frag.params, vec![SqlParam::Text("%rust%".into())]);
    }

    #[test]
    fn temporal_rounds_bounds_outward() {
        let p: Predicate = TemporalPredicate::new(TemporalField::Added)
            .after(DateBound::ago(7, DateUnit::Day))
            .before(DateBound::Absolute(parse_timestamp("2024-06-15T11:00:00.5Z").unwrap()))
            .into();
        let frag = p.to_sql_at(now());
        assert!(frag.sql.contains("added >= ?"));
        assert!(frag.sql.contains("added < ?"));
        assert_eq!(
            frag.params,
            vec![
                SqlParam::Text("2024-06-08 12:00:00".into()),
                SqlParam::Text("2024-06-15 11:00:01".into()),
            ]
        );
    }

    #[test]
    fn compound_pushdown_rules() {
        let custom = Predicate::custom("c", |_| true);

        // AND drops untranslatable children.
        let and = Predicate::gt("stars", 0).and(custom.clone()).to_sql();
        assert_eq!(and.sql, "(stars > ?)");
        assert!(!and.exact);

        // OR with an untranslatable branch cannot restrict anything.
        let or = Predicate::gt("stars", 0).or(custom.clone()).to_sql();
        assert!(or.is_trivial());

        // NOT only over exact fragments.
        let not_custom = custom.negate().to_sql();
        assert!(not_custom.is_trivial());
        let not_tags = Predicate::has_any_tag(["a"]).negate().to_sql();
        assert!(not_tags.sql.starts_with("NOT ("));
        assert_eq!(Predicate::True.negate().to_sql().sql, "0=1");
    }

    #[test]
    fn domain_and_search() {
        let any: Predicate = DomainPredicate::new(["github.com"], DomainMode::Any).unwrap().into();
        assert_eq!(any.to_sql().sql, "(LOWER(url) LIKE ?)");
        let none: Predicate = DomainPredicate::new(["github.com"], DomainMode::None).unwrap().into();
        assert!(none.to_sql().is_trivial());

        let search = Predicate::search("rust async").to_sql();
        assert_eq!(search.params.len(), 6);
        assert!(search.sql.contains(" OR "));
        assert!(Predicate::search("  ").to_sql().is_trivial());
    }

    #[test]
    fn boolean_columns_skip_text_operators() {
        let glob = Predicate::compare("pinned", FieldOp::Matches, "t*").unwrap();
        assert!(glob.to_sql().is_trivial());
        let contains = Predicate::compare("archived", FieldOp::Contains, "true").unwrap();
        assert!(contains.to_sql().is_trivial());
        let search = Predicate::Search(SearchPredicate::with_fields("true", ["title", "reachable"]));
        assert!(search.to_sql().is_trivial());
        assert_eq!(Predicate::eq("pinned", true).to_sql().sql, "pinned = ?");
    }

    #[test]
    fn ids_and_constants() {
        let frag = Predicate::ids([3, 1]).to_sql();
        assert_eq!(frag.sql, "bookmarks.id IN (?, ?)");
        assert_eq!(frag.params, vec![SqlParam::Int(1), SqlParam::Int(3)]);
        assert_eq!(Predicate::ids(Vec::new()).to_sql().sql, "0=1");
        assert!(Predicate::True.to_sql().is_trivial());
    }
}
