//! Output of view evaluation.

use std::collections::{BTreeMap, HashSet};
use std::sync::Arc;

use serde::Serialize;
use shelf_core::{Bookmark, BookmarkId};

use crate::overlay::OverriddenBookmark;

/// One labeled partition of a grouped result.
#[derive(Debug, Clone, Serialize)]
pub struct GroupedResult {
    pub key: String,
    pub label: String,
    pub bookmarks: Vec<OverriddenBookmark>,
}

impl GroupedResult {
    pub fn len(&self) -> usize {
        self.bookmarks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bookmarks.is_empty()
    }
}

/// Ordered bookmarks, optionally partitioned into groups.
///
/// When `groups` is present, concatenating the groups in order yields
/// `bookmarks` exactly.
#[derive(Debug, Clone, Default, Serialize)]
pub struct ViewResult {
    pub bookmarks: Vec<OverriddenBookmark>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub groups: Option<Vec<GroupedResult>>,
    #[serde(skip_serializing_if = "BTreeMap::is_empty")]
    pub metadata: BTreeMap<String, serde_json::Value>,
}

impl ViewResult {
    pub fn new(bookmarks: Vec<OverriddenBookmark>) -> Self {
        Self {
            bookmarks,
            groups: None,
            metadata: BTreeMap::new(),
        }
    }

    /// Wrap store output with empty overlays.
    pub fn from_bookmarks(bookmarks: Vec<Bookmark>) -> Self {
        Self::new(
            bookmarks
                .into_iter()
                .map(|b| OverriddenBookmark::new(Arc::new(b)))
                .collect(),
        )
    }

    /// Build a grouped result; the flat list is the groups' concatenation.
    pub fn grouped(groups: Vec<GroupedResult>) -> Self {
        let bookmarks = groups
            .iter()
            .flat_map(|g| g.bookmarks.iter().cloned())
            .collect();
        Self {
            bookmarks,
            groups: Some(groups),
            metadata: BTreeMap::new(),
        }
    }

    pub fn len(&self) -> usize {
        self.bookmarks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bookmarks.is_empty()
    }

    pub fn is_grouped(&self) -> bool {
        self.groups.is_some()
    }

    /// Bookmark ids in result order (duplicates kept).
    pub fn ids(&self) -> Vec<BookmarkId> {
        self.bookmarks.iter().map(|b| b.id()).collect()
    }

    pub fn id_set(&self) -> HashSet<BookmarkId> {
        self.bookmarks.iter().map(|b| b.id()).collect()
    }

    pub fn iter(&self) -> std::slice::Iter<'_, OverriddenBookmark> {
        self.bookmarks.iter()
    }

    pub fn with_metadata(mut self, key: impl Into<String>, value: serde_json::Value) -> Self {
        self.metadata.insert(key.into(), value);
        self
    }

    /// Drop the group structure, keeping the flat order.
    pub fn flatten(mut self) -> Self {
        self.groups = None;
        self
    }

    /// Keep only bookmarks satisfying `keep`; groups are filtered the same
    /// way so the concatenation invariant holds.
    pub fn retain<F>(mut self, mut keep: F) -> Self
    where
        F: FnMut(&OverriddenBookmark) -> bool,
    {
        match self.groups.take() {
            Some(groups) => {
                let groups: Vec<GroupedResult> = groups
                    .into_iter()
                    .map(|mut g| {
                        g.bookmarks.retain(&mut keep);
                        g
                    })
                    .filter(|g| !g.is_empty())
                    .collect();
                self.rebuild(groups)
            }
            None => {
                self.bookmarks.retain(keep);
                self
            }
        }
    }

    /// Transform every member in place of its position. Groups keep their
    /// structure.
    pub fn map<F>(mut self, mut f: F) -> Self
    where
        F: FnMut(OverriddenBookmark) -> OverriddenBookmark,
    {
        match self.groups.take() {
            Some(groups) => {
                let groups = groups
                    .into_iter()
                    .map(|g| GroupedResult {
                        bookmarks: g.bookmarks.into_iter().map(&mut f).collect(),
                        ..g
                    })
                    .collect();
                self.rebuild(groups)
            }
            None => {
                self.bookmarks = self.bookmarks.into_iter().map(f).collect();
                self
            }
        }
    }

    /// Reorder members. For a grouped result each group is reordered on
    /// its own and the group order is kept.
    pub fn reorder<F>(mut self, mut f: F) -> Self
    where
        F: FnMut(&mut Vec<OverriddenBookmark>),
    {
        match self.groups.take() {
            Some(mut groups) => {
                for g in groups.iter_mut() {
                    f(&mut g.bookmarks);
                }
                self.rebuild(groups)
            }
            None => {
                f(&mut self.bookmarks);
                self
            }
        }
    }

    fn rebuild(mut self, groups: Vec<GroupedResult>) -> Self {
        let metadata = std::mem::take(&mut self.metadata);
        let mut result = Self::grouped(groups);
        result.metadata = metadata;
        result
    }

    /// Remove bookmarks whose overlay sets `is_hidden`.
    pub fn visible(self) -> Self {
        self.retain(|b| !b.is_hidden())
    }

    pub fn to_json(&self) -> serde_json::Value {
        serde_json::to_value(self).unwrap_or(serde_json::Value::Null)
    }
}

impl IntoIterator for ViewResult {
    type Item = OverriddenBookmark;
    type IntoIter = std::vec::IntoIter<OverriddenBookmark>;

    fn into_iter(self) -> Self::IntoIter {
        self.bookmarks.into_iter()
    }
}

impl<'a> IntoIterator for &'a ViewResult {
    type Item = &'a OverriddenBookmark;
    type IntoIter = std::slice::Iter<'a, OverriddenBookmark>;

    fn into_iter(self) -> Self::IntoIter {
        self.bookmarks.iter()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::overlay::HIDDEN_KEY;

    fn ob(id: i64) -> OverriddenBookmark {
        Bookmark::new(id, format!("https://{}.test", id), format!("B{}", id)).into()
    }

    #[test]
    fn grouped_concatenates_in_order() {
        let result = ViewResult::grouped(vec![
            GroupedResult {
                key: "b".into(),
                label: "B".into(),
                bookmarks: vec![ob(3), ob(1)],
            },
            GroupedResult {
                key: "a".into(),
                label: "A".into(),
                bookmarks: vec![ob(2)],
            },
        ]);
        assert_eq!(result.ids(), vec![3, 1, 2]);
        assert!(result.is_grouped());
        assert!(!result.clone().flatten().is_grouped());
    }

    #[test]
    fn retain_keeps_groups_consistent() {
        let result = ViewResult::grouped(vec![
            GroupedResult {
                key: "x".into(),
                label: "X".into(),
                bookmarks: vec![ob(1).with_override(HIDDEN_KEY, true)],
            },
            GroupedResult {
                key: "y".into(),
                label: "Y".into(),
                bookmarks: vec![ob(2), ob(3).with_override(HIDDEN_KEY, true)],
            },
        ])
        .visible();
        let groups = result.groups.as_ref().unwrap();
        assert_eq!(groups.len(), 1);
        assert_eq!(groups[0].key, "y");
        assert_eq!(result.ids(), vec![2]);
    }

    #[test]
    fn serializes_with_overlays() {
        let result = ViewResult::new(vec![ob(1).with_override("title", "Renamed")])
            .with_metadata("view", serde_json::json!("mine"));
        let json = result.to_json();
        assert_eq!(json["bookmarks"][0]["title"], serde_json::json!("Renamed"));
        assert_eq!(json["metadata"]["view"], serde_json::json!("mine"));
        assert!(json.get("groups").is_none());
    }
}
