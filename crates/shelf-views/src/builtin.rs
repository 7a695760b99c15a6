//! Built-in views registered with every default registry
//!
//! These cover the common bookmark lenses. Users can shadow any of them by
//! registering a view or definition under the same name.

use crate::predicate::Predicate;
use crate::primitives::OrderSpec;
use crate::view::View;

/// A named view compiled into shelf-views.
#[derive(Debug, Clone)]
pub struct BuiltinView {
    pub name: &'static str,
    pub description: &'static str,
    pub view: View,
}

impl BuiltinView {
    fn new(name: &'static str, description: &'static str, view: View) -> Self {
        Self {
            name,
            description,
            view,
        }
    }
}

/// Returns the default builtin views
pub fn builtin_views() -> Vec<BuiltinView> {
    vec![
        all(),
        recent(),
        starred(),
        pinned(),
        archived(),
        unread(),
        popular(),
        broken(),
        untagged(),
    ]
}

pub fn all() -> BuiltinView {
    BuiltinView::new("all", "Every bookmark", View::All)
}

/// The 50 most recently added bookmarks
pub fn recent() -> BuiltinView {
    BuiltinView::new(
        "recent",
        "Most recently added bookmarks",
        View::order_by(vec![OrderSpec::desc("added")]).then(View::limit(50)),
    )
}

/// Starred bookmarks, most stars first, then newest
pub fn starred() -> BuiltinView {
    BuiltinView::new(
        "starred",
        "Starred bookmarks",
        View::select(Predicate::gt("stars", 0))
            .then(View::order_by(vec![OrderSpec::desc("stars"), OrderSpec::desc("added")])),
    )
}

pub fn pinned() -> BuiltinView {
    BuiltinView::new("pinned", "Pinned bookmarks", View::select(Predicate::eq("pinned", true)))
}

pub fn archived() -> BuiltinView {
    BuiltinView::new(
        "archived",
        "Archived bookmarks",
        View::select(Predicate::eq("archived", true)),
    )
}

/// Never visited
pub fn unread() -> BuiltinView {
    BuiltinView::new(
        "unread",
        "Bookmarks never visited",
        View::select(Predicate::eq("visit_count", 0)),
    )
}

/// More than five visits, most visited first
pub fn popular() -> BuiltinView {
    BuiltinView::new(
        "popular",
        "Frequently visited bookmarks",
        View::select(Predicate::gt("visit_count", 5))
            .then(View::order_by(vec![OrderSpec::desc("visit_count")])),
    )
}

/// Failed their last reachability check
pub fn broken() -> BuiltinView {
    BuiltinView::new(
        "broken",
        "Bookmarks whose URL is unreachable",
        View::select(Predicate::eq("reachable", false)),
    )
}

pub fn untagged() -> BuiltinView {
    BuiltinView::new(
        "untagged",
        "Bookmarks without tags",
        View::select(Predicate::has_no_tags(Vec::<String>::new())),
    )
}
