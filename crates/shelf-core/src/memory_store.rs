use crate::bookmark::{Bookmark, BookmarkId};
use crate::store::{BookmarkStore, SqlParam, StoreError};

/// In-memory bookmark store. Has no native query language, so every
/// view over it evaluates in memory.
#[derive(Debug, Clone, Default)]
pub struct MemoryStore {
    bookmarks: Vec<Bookmark>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert a bookmark, keeping the collection ordered by id.
    pub fn insert(&mut self, bookmark: Bookmark) -> Result<BookmarkId, StoreError> {
        match self.bookmarks.binary_search_by_key(&bookmark.id, |b| b.id) {
            Ok(_) => Err(StoreError::AlreadyExists(bookmark.id)),
            Err(pos) => {
                let id = bookmark.id;
                self.bookmarks.insert(pos, bookmark);
                Ok(id)
            }
        }
    }

    pub fn get(&self, id: BookmarkId) -> Option<&Bookmark> {
        self.bookmarks
            .binary_search_by_key(&id, |b| b.id)
            .ok()
            .map(|pos| &self.bookmarks[pos])
    }

    pub fn remove(&mut self, id: BookmarkId) -> Result<Bookmark, StoreError> {
        match self.bookmarks.binary_search_by_key(&id, |b| b.id) {
            Ok(pos) => Ok(self.bookmarks.remove(pos)),
            Err(_) => Err(StoreError::NotFound(id)),
        }
    }

    pub fn len(&self) -> usize {
        self.bookmarks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bookmarks.is_empty()
    }
}

impl FromIterator<Bookmark> for MemoryStore {
    /// Later bookmarks with a duplicate id are dropped.
    fn from_iter<I: IntoIterator<Item = Bookmark>>(iter: I) -> Self {
        let mut store = Self::new();
        for bookmark in iter {
            let _ = store.insert(bookmark);
        }
        store
    }
}

impl BookmarkStore for MemoryStore {
    fn all(&self) -> Result<Vec<Bookmark>, StoreError> {
        Ok(self.bookmarks.clone())
    }

    fn query(&self, _where_clause: &str, _params: &[SqlParam]) -> Result<Vec<Bookmark>, StoreError> {
        Err(StoreError::Unsupported(
            "memory store has no native query language".into(),
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn insert_keeps_id_order() {
        let mut store = MemoryStore::new();
        store.insert(Bookmark::new(3, "https://c.test", "C")).unwrap();
        store.insert(Bookmark::new(1, "https://a.test", "A")).unwrap();
        store.insert(Bookmark::new(2, "https://b.test", "B")).unwrap();
        let ids: Vec<_> = store.all().unwrap().iter().map(|b| b.id).collect();
        assert_eq!(ids, vec![1, 2, 3]);
    }

    #[test]
    fn duplicate_insert_fails() {
        let mut store = MemoryStore::new();
        store.insert(Bookmark::new(1, "https://a.test", "A")).unwrap();
        let err = store.insert(Bookmark::new(1, "https://a.test", "A")).unwrap_err();
        assert!(matches!(err, StoreError::AlreadyExists(1)));
    }

    #[test]
    fn get_and_remove() {
        let mut store: MemoryStore = vec![
            Bookmark::new(1, "https://a.test", "A"),
            Bookmark::new(2, "https://b.test", "B"),
        ]
        .into_iter()
        .collect();
        assert_eq!(store.get(2).map(|b| b.title.as_str()), Some("B"));
        store.remove(2).unwrap();
        assert!(store.get(2).is_none());
        assert!(matches!(store.remove(2), Err(StoreError::NotFound(2))));
        assert_eq!(store.len(), 1);
    }

    #[test]
    fn native_query_is_unsupported() {
        let store = MemoryStore::new();
        let err = store.query("1=1", &[]).unwrap_err();
        assert!(matches!(err, StoreError::Unsupported(_)));
    }
}
