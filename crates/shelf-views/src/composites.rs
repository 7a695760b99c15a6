//! Views built from other views.

use std::collections::{BTreeMap, HashSet};
use std::sync::Arc;

use shelf_core::{BookmarkId, BookmarkStore, Value};
use tracing::trace;

use crate::context::{Condition, ViewContext};
use crate::error::{Result, ViewError};
use crate::primitives::evaluate_all;
use crate::result::ViewResult;
use crate::view::View;

/// Sequential stages. Stage 0 reads the store, every later stage is
/// applied to the running result. Hidden bookmarks are dropped after each
/// stage. No stages behaves like `View::All`.
#[derive(Debug, Clone, Default)]
pub struct PipelineView {
    pub stages: Vec<View>,
}

impl PipelineView {
    pub fn new(stages: Vec<View>) -> Self {
        Self { stages }
    }

    pub fn evaluate(&self, store: &dyn BookmarkStore, ctx: &ViewContext<'_>) -> Result<ViewResult> {
        let Some((first, rest)) = self.stages.split_first() else {
            return evaluate_all(store);
        };
        let mut result = first.evaluate(store, ctx)?.visible();
        trace!(stage = 0, kind = first.kind(), count = result.len(), "pipeline stage");
        for (i, stage) in rest.iter().enumerate() {
            result = stage.apply(result, ctx)?.visible();
            trace!(stage = i + 1, kind = stage.kind(), count = result.len(), "pipeline stage");
        }
        Ok(result)
    }

    pub fn apply(&self, result: ViewResult, ctx: &ViewContext<'_>) -> Result<ViewResult> {
        self.stages
            .iter()
            .try_fold(result, |acc, stage| Ok(stage.apply(acc, ctx)?.visible()))
    }
}

/// Every bookmark from any member; the first occurrence of an id wins.
#[derive(Debug, Clone, Default)]
pub struct UnionView {
    pub views: Vec<View>,
}

impl UnionView {
    pub fn new(views: Vec<View>) -> Self {
        Self { views }
    }

    pub fn evaluate(&self, store: &dyn BookmarkStore, ctx: &ViewContext<'_>) -> Result<ViewResult> {
        let results = self
            .views
            .iter()
            .map(|v| v.evaluate(store, ctx))
            .collect::<Result<Vec<_>>>()?;
        Ok(union_of(results))
    }

    pub fn apply(&self, result: ViewResult, ctx: &ViewContext<'_>) -> Result<ViewResult> {
        let results = self
            .views
            .iter()
            .map(|v| v.apply(result.clone(), ctx))
            .collect::<Result<Vec<_>>>()?;
        Ok(union_of(results))
    }
}

fn union_of(results: Vec<ViewResult>) -> ViewResult {
    let mut seen = HashSet::new();
    let merged = results
        .into_iter()
        .flatten()
        .filter(|b| seen.insert(b.id()))
        .collect();
    ViewResult::new(merged)
}

/// Bookmarks present in every member, in the first member's order and
/// with its overlays. No members yields nothing.
#[derive(Debug, Clone, Default)]
pub struct IntersectView {
    pub views: Vec<View>,
}

impl IntersectView {
    pub fn new(views: Vec<View>) -> Self {
        Self { views }
    }

    pub fn evaluate(&self, store: &dyn BookmarkStore, ctx: &ViewContext<'_>) -> Result<ViewResult> {
        let results = self
            .views
            .iter()
            .map(|v| v.evaluate(store, ctx))
            .collect::<Result<Vec<_>>>()?;
        Ok(intersect_of(results))
    }

    pub fn apply(&self, result: ViewResult, ctx: &ViewContext<'_>) -> Result<ViewResult> {
        let results = self
            .views
            .iter()
            .map(|v| v.apply(result.clone(), ctx))
            .collect::<Result<Vec<_>>>()?;
        Ok(intersect_of(results))
    }
}

fn intersect_of(results: Vec<ViewResult>) -> ViewResult {
    let mut results = results.into_iter();
    let Some(first) = results.next() else {
        return ViewResult::default();
    };
    let others: Vec<HashSet<BookmarkId>> = results.map(|r| r.id_set()).collect();
    first.retain(|b| others.iter().all(|ids| ids.contains(&b.id())))
}

/// `primary` minus every id produced by any excluded view.
#[derive(Debug, Clone)]
pub struct DifferenceView {
    pub primary: Box<View>,
    pub excluded: Vec<View>,
}

impl DifferenceView {
    pub fn new(primary: View, excluded: Vec<View>) -> Self {
        Self {
            primary: Box::new(primary),
            excluded,
        }
    }

    pub fn evaluate(&self, store: &dyn BookmarkStore, ctx: &ViewContext<'_>) -> Result<ViewResult> {
        let primary = self.primary.evaluate(store, ctx)?;
        let mut excluded_ids = HashSet::new();
        for view in &self.excluded {
            excluded_ids.extend(view.evaluate(store, ctx)?.ids());
        }
        Ok(primary.retain(|b| !excluded_ids.contains(&b.id())))
    }

    pub fn apply(&self, result: ViewResult, ctx: &ViewContext<'_>) -> Result<ViewResult> {
        let mut excluded_ids = HashSet::new();
        for view in &self.excluded {
            excluded_ids.extend(view.apply(result.clone(), ctx)?.ids());
        }
        let primary = self.primary.apply(result, ctx)?;
        Ok(primary.retain(|b| !excluded_ids.contains(&b.id())))
    }
}

/// A named view resolved through the context's registry at evaluation
/// time, with extra parameters bound.
#[derive(Debug, Clone, PartialEq)]
pub struct RefView {
    pub name: String,
    pub params: BTreeMap<String, Value>,
}

impl RefView {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            params: BTreeMap::new(),
        }
    }

    pub fn with_params(name: impl Into<String>, params: BTreeMap<String, Value>) -> Self {
        Self {
            name: name.into(),
            params,
        }
    }

    fn resolve<'r>(&self, ctx: &ViewContext<'r>) -> Result<(Arc<View>, ViewContext<'r>)> {
        let registry = ctx
            .registry()
            .ok_or_else(|| ViewError::NoRegistry(self.name.clone()))?;
        let inner = ctx.descend(&self.name)?.with_params(&self.params);
        let view = registry.resolve(&self.name, &inner)?;
        Ok((view, inner))
    }

    pub fn evaluate(&self, store: &dyn BookmarkStore, ctx: &ViewContext<'_>) -> Result<ViewResult> {
        let (view, inner) = self.resolve(ctx)?;
        view.evaluate(store, &inner)
    }

    pub fn apply(&self, result: ViewResult, ctx: &ViewContext<'_>) -> Result<ViewResult> {
        let (view, inner) = self.resolve(ctx)?;
        view.apply(result, &inner)
    }
}

/// Picks one branch per evaluation.
#[derive(Debug, Clone)]
pub struct ConditionalView {
    pub condition: Condition,
    pub if_true: Box<View>,
    pub if_false: Box<View>,
}

impl ConditionalView {
    pub fn new(condition: Condition, if_true: View, if_false: View) -> Self {
        Self {
            condition,
            if_true: Box::new(if_true),
            if_false: Box::new(if_false),
        }
    }

    fn branch(&self, ctx: &ViewContext<'_>) -> &View {
        if self.condition.holds(ctx) {
            &*self.if_true
        } else {
            &*self.if_false
        }
    }

    pub fn evaluate(&self, store: &dyn BookmarkStore, ctx: &ViewContext<'_>) -> Result<ViewResult> {
        self.branch(ctx).evaluate(store, ctx)
    }

    pub fn apply(&self, result: ViewResult, ctx: &ViewContext<'_>) -> Result<ViewResult> {
        self.branch(ctx).apply(result, ctx)
    }
}

/// Drops group structure, keeping the concatenated order.
#[derive(Debug, Clone)]
pub struct FlattenView {
    pub source: Box<View>,
}

impl FlattenView {
    pub fn new(source: View) -> Self {
        Self {
            source: Box::new(source),
        }
    }

    pub fn evaluate(&self, store: &dyn BookmarkStore, ctx: &ViewContext<'_>) -> Result<ViewResult> {
        Ok(self.source.evaluate(store, ctx)?.flatten())
    }

    pub fn apply(&self, result: ViewResult, ctx: &ViewContext<'_>) -> Result<ViewResult> {
        Ok(self.source.apply(result, ctx)?.flatten())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::overlay::HIDDEN_KEY;
    use crate::predicate::Predicate;
    use crate::primitives::{GroupView, OverrideRule, OverrideView, SelectView};
    use shelf_core::{Bookmark, MemoryStore};

    fn store() -> MemoryStore {
        (1..=5)
            .map(|i| {
                Bookmark::new(i, format!("https://site{}.test", i), format!("B{}", i))
                    .with_stars(if i % 2 == 1 { 1 } else { 0 })
                    .with_archived(i >= 4)
            })
            .collect()
    }

    fn select(p: Predicate) -> View {
        View::Select(SelectView::new(p))
    }

    #[test]
    fn empty_pipeline_is_all() {
        let s = store();
        let out = PipelineView::default().evaluate(&s, &ViewContext::new()).unwrap();
        assert_eq!(out.ids(), vec![1, 2, 3, 4, 5]);
    }

    #[test]
    fn pipeline_drops_hidden_after_stage() {
        let s = store();
        let mut hide = BTreeMap::new();
        hide.insert(HIDDEN_KEY.to_string(), Value::Bool(true));
        let pipeline = PipelineView::new(vec![
            View::All,
            View::Override(OverrideView::new(vec![OverrideRule::when(Predicate::eq("archived", true), hide)])),
        ]);
        let out = pipeline.evaluate(&s, &ViewContext::new()).unwrap();
        assert_eq!(out.ids(), vec![1, 2, 3]);
    }

    #[test]
    fn union_keeps_first_occurrence() {
        let s = store();
        let mut rename = BTreeMap::new();
        rename.insert("title".to_string(), Value::from("first"));
        let first = PipelineView::new(vec![
            select(Predicate::ids([3])),
            View::Override(OverrideView::new(vec![OverrideRule::always(rename)])),
        ]);
        let union = UnionView::new(vec![View::Pipeline(first), View::All]);
        let out = union.evaluate(&s, &ViewContext::new()).unwrap();
        assert_eq!(out.ids(), vec![3, 1, 2, 4, 5]);
        assert_eq!(out.bookmarks[0].get("title"), Value::from("first"));
    }

    #[test]
    fn intersect_uses_first_order() {
        let s = store();
        let view = IntersectView::new(vec![
            select(Predicate::gt("stars", 0)),
            select(Predicate::ids([5, 3, 2])),
        ]);
        let out = view.evaluate(&s, &ViewContext::new()).unwrap();
        assert_eq!(out.ids(), vec![3, 5]);
        assert!(IntersectView::default().evaluate(&s, &ViewContext::new()).unwrap().is_empty());
    }

    #[test]
    fn difference_removes_every_excluded_id() {
        let s = store();
        let view = DifferenceView::new(
            View::All,
            vec![select(Predicate::eq("archived", true)), select(Predicate::ids([1]))],
        );
        let out = view.evaluate(&s, &ViewContext::new()).unwrap();
        assert_eq!(out.ids(), vec![2, 3]);
    }

    #[test]
    fn ref_without_registry_fails() {
        let s = store();
        let err = RefView::new("starred").evaluate(&s, &ViewContext::new()).unwrap_err();
        assert!(matches!(err, ViewError::NoRegistry(name) if name == "starred"));
    }

    #[test]
    fn conditional_and_flatten() {
        let s = store();
        let view = ConditionalView::new(
            Condition::param("archived_only"),
            select(Predicate::eq("archived", true)),
            View::All,
        );
        let on = ViewContext::new().param("archived_only", true);
        assert_eq!(view.evaluate(&s, &on).unwrap().ids(), vec![4, 5]);
        assert_eq!(view.evaluate(&s, &ViewContext::new()).unwrap().len(), 5);

        let grouped = View::Group(GroupView::by("archived"));
        assert!(grouped.evaluate(&s, &ViewContext::new()).unwrap().is_grouped());
        let flat = FlattenView::new(grouped).evaluate(&s, &ViewContext::new()).unwrap();
        assert!(!flat.is_grouped());
        assert_eq!(flat.ids(), vec![1, 2, 3, 4, 5]);
    }
}
