//! The closed set of view kinds and their combinators.

use std::collections::BTreeMap;
use std::ops::{BitAnd, BitOr, Shr, Sub};

use shelf_core::{BookmarkStore, Value};

use crate::composites::{
    ConditionalView, DifferenceView, FlattenView, IntersectView, PipelineView, RefView, UnionView,
};
use crate::context::{Condition, ViewContext};
use crate::error::{ParseError, Result};
use crate::predicate::Predicate;
use crate::primitives::{
    evaluate_all, GroupSpec, GroupView, LimitView, OffsetView, OrderSpec, OrderView,
    OverrideRule, OverrideView, RandomOrderView, SelectView, SliceView,
};
use crate::result::ViewResult;

/// A composable, re-evaluable query over a bookmark store.
///
/// Every kind supports both `evaluate` (read from the store) and `apply`
/// (transform an existing result), so any stage can follow any other in a
/// pipeline.
#[derive(Debug, Clone)]
pub enum View {
    /// Every bookmark, unfiltered
    All,
    Select(SelectView),
    Order(OrderView),
    RandomOrder(RandomOrderView),
    Limit(LimitView),
    Offset(OffsetView),
    Slice(SliceView),
    Override(OverrideView),
    Group(GroupView),

    // Composites
    Pipeline(PipelineView),
    Union(UnionView),
    Intersect(IntersectView),
    Difference(DifferenceView),
    Ref(RefView),
    Conditional(ConditionalView),
    Flatten(FlattenView),
}

impl View {
    /// Evaluate against the store.
    pub fn evaluate(&self, store: &dyn BookmarkStore, ctx: &ViewContext<'_>) -> Result<ViewResult> {
        match self {
            View::All => evaluate_all(store),
            View::Select(v) => v.evaluate(store, ctx),
            View::Order(_)
            | View::RandomOrder(_)
            | View::Limit(_)
            | View::Offset(_)
            | View::Slice(_)
            | View::Override(_)
            | View::Group(_) => self.apply(evaluate_all(store)?, ctx),
            View::Pipeline(v) => v.evaluate(store, ctx),
            View::Union(v) => v.evaluate(store, ctx),
            View::Intersect(v) => v.evaluate(store, ctx),
            View::Difference(v) => v.evaluate(store, ctx),
            View::Ref(v) => v.evaluate(store, ctx),
            View::Conditional(v) => v.evaluate(store, ctx),
            View::Flatten(v) => v.evaluate(store, ctx),
        }
    }

    /// Transform an already materialized result.
    pub fn apply(&self, result: ViewResult, ctx: &ViewContext<'_>) -> Result<ViewResult> {
        match self {
            View::All => Ok(result),
            View::Select(v) => Ok(v.apply(result, ctx)),
            View::Order(v) => Ok(v.apply(result)),
            View::RandomOrder(v) => Ok(v.apply(result)),
            View::Limit(v) => Ok(v.apply(result)),
            View::Offset(v) => Ok(v.apply(result)),
            View::Slice(v) => Ok(v.apply(result)),
            View::Override(v) => Ok(v.apply(result, ctx)),
            View::Group(v) => Ok(v.apply(result)),
            View::Pipeline(v) => v.apply(result, ctx),
            View::Union(v) => v.apply(result, ctx),
            View::Intersect(v) => v.apply(result, ctx),
            View::Difference(v) => v.apply(result, ctx),
            View::Ref(v) => v.apply(result, ctx),
            View::Conditional(v) => v.apply(result, ctx),
            View::Flatten(v) => v.apply(result, ctx),
        }
    }

    /// Evaluate with a fresh context and no registry.
    pub fn run(&self, store: &dyn BookmarkStore) -> Result<ViewResult> {
        self.evaluate(store, &ViewContext::new())
    }

    pub fn kind(&self) -> &'static str {
        match self {
            View::All => "all",
            View::Select(_) => "select",
            View::Order(_) => "order",
            View::RandomOrder(_) => "random",
            View::Limit(_) => "limit",
            View::Offset(_) => "offset",
            View::Slice(_) => "slice",
            View::Override(_) => "override",
            View::Group(_) => "group",
            View::Pipeline(_) => "pipeline",
            View::Union(_) => "union",
            View::Intersect(_) => "intersect",
            View::Difference(_) => "difference",
            View::Ref(_) => "ref",
            View::Conditional(_) => "conditional",
            View::Flatten(_) => "flatten",
        }
    }

    // Constructors

    pub fn select(predicate: impl Into<Predicate>) -> Self {
        View::Select(SelectView::new(predicate.into()))
    }

    /// Parse an order string; the literal `random` gives a shuffle.
    pub fn order(spec: &str) -> std::result::Result<Self, ParseError> {
        if spec.trim().eq_ignore_ascii_case("random") {
            return Ok(View::RandomOrder(RandomOrderView::default()));
        }
        OrderView::parse(spec).map(View::Order)
    }

    pub fn order_by(specs: Vec<OrderSpec>) -> Self {
        View::Order(OrderView::new(specs))
    }

    pub fn random(seed: Option<u64>) -> Self {
        View::RandomOrder(RandomOrderView::new(seed))
    }

    pub fn limit(n: usize) -> Self {
        View::Limit(LimitView(n))
    }

    pub fn offset(n: usize) -> Self {
        View::Offset(OffsetView(n))
    }

    pub fn slice(offset: usize, limit: Option<usize>) -> Self {
        View::Slice(SliceView::new(offset, limit))
    }

    pub fn overrides(rules: Vec<OverrideRule>) -> Self {
        View::Override(OverrideView::new(rules))
    }

    pub fn group(spec: GroupSpec) -> Self {
        View::Group(GroupView::new(spec))
    }

    pub fn pipeline(stages: Vec<View>) -> Self {
        View::Pipeline(PipelineView::new(stages))
    }

    /// A named view resolved at evaluation time.
    pub fn named(name: impl Into<String>) -> Self {
        View::Ref(RefView::new(name))
    }

    pub fn named_with(name: impl Into<String>, params: BTreeMap<String, Value>) -> Self {
        View::Ref(RefView::with_params(name, params))
    }

    pub fn conditional(condition: Condition, if_true: View, if_false: View) -> Self {
        View::Conditional(ConditionalView::new(condition, if_true, if_false))
    }

    // Combinators

    /// Bookmarks from either view, first occurrence wins.
    pub fn union(self, other: View) -> Self {
        match self {
            View::Union(mut u) => {
                u.views.push(other);
                View::Union(u)
            }
            first => View::Union(UnionView::new(vec![first, other])),
        }
    }

    /// Bookmarks in both views, in this view's order.
    pub fn intersect(self, other: View) -> Self {
        match self {
            View::Intersect(mut i) => {
                i.views.push(other);
                View::Intersect(i)
            }
            first => View::Intersect(IntersectView::new(vec![first, other])),
        }
    }

    /// This view without anything `other` produces. Chaining accumulates
    /// exclusions on one difference.
    pub fn difference(self, other: View) -> Self {
        match self {
            View::Difference(mut d) => {
                d.excluded.push(other);
                View::Difference(d)
            }
            primary => View::Difference(DifferenceView::new(primary, vec![other])),
        }
    }

    /// Run `next` over this view's result.
    pub fn then(self, next: View) -> Self {
        match self {
            View::Pipeline(mut p) => {
                p.stages.push(next);
                View::Pipeline(p)
            }
            first => View::pipeline(vec![first, next]),
        }
    }

    pub fn flatten(self) -> Self {
        View::Flatten(FlattenView::new(self))
    }
}

impl Default for View {
    fn default() -> Self {
        View::All
    }
}

impl From<Predicate> for View {
    fn from(predicate: Predicate) -> Self {
        View::select(predicate)
    }
}

impl BitOr for View {
    type Output = View;

    fn bitor(self, rhs: View) -> View {
        self.union(rhs)
    }
}

impl BitAnd for View {
    type Output = View;

    fn bitand(self, rhs: View) -> View {
        self.intersect(rhs)
    }
}

impl Sub for View {
    type Output = View;

    fn sub(self, rhs: View) -> View {
        self.difference(rhs)
    }
}

impl Shr for View {
    type Output = View;

    fn shr(self, rhs: View) -> View {
        self.then(rhs)
    }
}
