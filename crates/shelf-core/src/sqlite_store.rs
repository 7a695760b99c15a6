use std::path::Path;
use std::sync::Mutex;

use rusqlite::types::Value as SqlValue;
use rusqlite::{params, params_from_iter, Connection};

use crate::bookmark::{Bookmark, BookmarkId};
use crate::store::{BookmarkStore, SqlParam, StoreError};
use crate::value::{format_sql_timestamp, parse_timestamp};

const SELECT_COLUMNS: &str = "SELECT id, url, title, description, added, stars, pinned, archived, visit_count, reachable, last_visited FROM bookmarks";

/// SQLite-backed bookmark store using the `bookmarks` / `tags` /
/// `bookmark_tags` schema that native query fragments are written against.
pub struct SqliteStore {
    conn: Mutex<Connection>,
}

/// Raw row as read from SQLite, before timestamps are parsed.
struct BookmarkRow {
    id: i64,
    url: String,
    title: String,
    description: Option<String>,
    added: String,
    stars: i64,
    pinned: bool,
    archived: bool,
    visit_count: i64,
    reachable: Option<bool>,
    last_visited: Option<String>,
}

impl SqliteStore {
    /// Open (or create) a database at the given path.
    pub fn open(path: &Path) -> Result<Self, StoreError> {
        let conn =
            Connection::open(path).map_err(|e| StoreError::Storage(format!("open: {}", e)))?;
        Self::init_with_connection(conn)
    }

    /// Create an in-memory database (for testing).
    pub fn open_in_memory() -> Result<Self, StoreError> {
        let conn = Connection::open_in_memory()
            .map_err(|e| StoreError::Storage(format!("open_in_memory: {}", e)))?;
        Self::init_with_connection(conn)
    }

    fn init_with_connection(conn: Connection) -> Result<Self, StoreError> {
        Self::init_schema(&conn)?;
        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    fn init_schema(conn: &Connection) -> Result<(), StoreError> {
        conn.execute_batch(
            "
            PRAGMA foreign_keys = ON;

            CREATE TABLE IF NOT EXISTS bookmarks (
                id INTEGER PRIMARY KEY,
                url TEXT NOT NULL,
                title TEXT NOT NULL DEFAULT '',
                description TEXT,
                added TEXT NOT NULL,
                stars INTEGER NOT NULL DEFAULT 0,
                pinned INTEGER NOT NULL DEFAULT 0,
                archived INTEGER NOT NULL DEFAULT 0,
                visit_count INTEGER NOT NULL DEFAULT 0,
                reachable INTEGER,
                last_visited TEXT
            );

            CREATE TABLE IF NOT EXISTS tags (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                name TEXT NOT NULL UNIQUE
            );

            CREATE TABLE IF NOT EXISTS bookmark_tags (
                bookmark_id INTEGER NOT NULL REFERENCES bookmarks(id) ON DELETE CASCADE,
                tag_id INTEGER NOT NULL REFERENCES tags(id) ON DELETE CASCADE,
                position INTEGER NOT NULL DEFAULT 0,
                PRIMARY KEY (bookmark_id, tag_id)
            );

            CREATE INDEX IF NOT EXISTS idx_bookmarks_added ON bookmarks(added);
            CREATE INDEX IF NOT EXISTS idx_bookmarks_stars ON bookmarks(stars);
            CREATE INDEX IF NOT EXISTS idx_bookmark_tags_tag ON bookmark_tags(tag_id);
            ",
        )
        .map_err(|e| StoreError::Storage(format!("init_schema: {}", e)))
    }

    fn lock(&self) -> Result<std::sync::MutexGuard<'_, Connection>, StoreError> {
        self.conn
            .lock()
            .map_err(|e| StoreError::Storage(format!("lock: {}", e)))
    }

    /// Insert a bookmark and its tags.
    pub fn insert(&self, bookmark: &Bookmark) -> Result<BookmarkId, StoreError> {
        let conn = self.lock()?;
        Self::insert_bookmark(&conn, bookmark)?;
        Ok(bookmark.id)
    }

    /// Insert multiple bookmarks atomically.
    pub fn insert_batch(&self, bookmarks: &[Bookmark]) -> Result<Vec<BookmarkId>, StoreError> {
        let mut conn = self.lock()?;
        let tx = conn
            .transaction()
            .map_err(|e| StoreError::Storage(format!("begin: {}", e)))?;
        for bookmark in bookmarks {
            Self::insert_bookmark(&tx, bookmark)?;
        }
        tx.commit()
            .map_err(|e| StoreError::Storage(format!("commit: {}", e)))?;
        Ok(bookmarks.iter().map(|b| b.id).collect())
    }

    fn insert_bookmark(conn: &Connection, bookmark: &Bookmark) -> Result<(), StoreError> {
        conn.execute(
            "INSERT INTO bookmarks (id, url, title, description, added, stars, pinned, archived, visit_count, reachable, last_visited)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11)",
            params![
                bookmark.id,
                bookmark.url,
                bookmark.title,
                bookmark.description,
                format_sql_timestamp(&bookmark.added),
                bookmark.stars,
                bookmark.pinned as i32,
                bookmark.archived as i32,
                bookmark.visit_count,
                bookmark.reachable.map(|r| r as i32),
                bookmark.last_visited.as_ref().map(format_sql_timestamp),
            ],
        )
        .map_err(|e| {
            if let rusqlite::Error::SqliteFailure(ref err, _) = e {
                if err.code == rusqlite::ErrorCode::ConstraintViolation {
                    return StoreError::AlreadyExists(bookmark.id);
                }
            }
            StoreError::Storage(format!("insert: {}", e))
        })?;

        for (position, tag) in bookmark.tags.iter().enumerate() {
            conn.execute("INSERT OR IGNORE INTO tags (name) VALUES (?1)", params![tag])
                .map_err(|e| StoreError::Storage(format!("insert tag: {}", e)))?;
            conn.execute(
                "INSERT OR IGNORE INTO bookmark_tags (bookmark_id, tag_id, position)
                 SELECT ?1, id, ?2 FROM tags WHERE name = ?3",
                params![bookmark.id, position as i64, tag],
            )
            .map_err(|e| StoreError::Storage(format!("link tag: {}", e)))?;
        }
        Ok(())
    }

    fn load(&self, where_clause: &str, params: &[SqlParam]) -> Result<Vec<Bookmark>, StoreError> {
        let conn = self.lock()?;
        let sql = format!("{} WHERE {} ORDER BY id", SELECT_COLUMNS, where_clause);
        let mut stmt = conn
            .prepare(&sql)
            .map_err(|e| StoreError::Storage(format!("prepare: {}", e)))?;
        let rows = stmt
            .query_map(params_from_iter(params.iter().map(param_to_sql)), |row| {
                Ok(BookmarkRow {
                    id: row.get(0)?,
                    url: row.get(1)?,
                    title: row.get(2)?,
                    description: row.get(3)?,
                    added: row.get(4)?,
                    stars: row.get(5)?,
                    pinned: row.get(6)?,
                    archived: row.get(7)?,
                    visit_count: row.get(8)?,
                    reachable: row.get(9)?,
                    last_visited: row.get(10)?,
                })
            })
            .map_err(|e| StoreError::Storage(format!("query: {}", e)))?
            .collect::<Result<Vec<_>, _>>()
            .map_err(|e| StoreError::Storage(format!("row: {}", e)))?;

        let mut bookmarks = Vec::with_capacity(rows.len());
        for raw in rows {
            let tags = Self::tags_for(&conn, raw.id)?;
            bookmarks.push(row_to_bookmark(raw, tags)?);
        }
        Ok(bookmarks)
    }

    fn tags_for(conn: &Connection, id: BookmarkId) -> Result<Vec<String>, StoreError> {
        let mut stmt = conn
            .prepare_cached(
                "SELECT t.name FROM bookmark_tags bt JOIN tags t ON t.id = bt.tag_id
                 WHERE bt.bookmark_id = ?1 ORDER BY bt.position",
            )
            .map_err(|e| StoreError::Storage(format!("prepare tags: {}", e)))?;
        let tags = stmt
            .query_map(params![id], |row| row.get::<_, String>(0))
            .map_err(|e| StoreError::Storage(format!("tags: {}", e)))?
            .collect::<Result<Vec<_>, _>>()
            .map_err(|e| StoreError::Storage(format!("tag row: {}", e)))?;
        Ok(tags)
    }
}

impl BookmarkStore for SqliteStore {
    fn all(&self) -> Result<Vec<Bookmark>, StoreError> {
        self.load("1=1", &[])
    }

    fn query(&self, where_clause: &str, params: &[SqlParam]) -> Result<Vec<Bookmark>, StoreError> {
        self.load(where_clause, params)
    }
}

fn param_to_sql(param: &SqlParam) -> SqlValue {
    match param {
        SqlParam::Null => SqlValue::Null,
        SqlParam::Int(i) => SqlValue::Integer(*i),
        SqlParam::Float(f) => SqlValue::Real(*f),
        SqlParam::Text(s) => SqlValue::Text(s.clone()),
    }
}

fn row_to_bookmark(raw: BookmarkRow, tags: Vec<String>) -> Result<Bookmark, StoreError> {
    let added = parse_timestamp(&raw.added)
        .ok_or_else(|| StoreError::Storage(format!("bad added timestamp: {}", raw.added)))?;
    let last_visited = match raw.last_visited {
        Some(s) => Some(
            parse_timestamp(&s)
                .ok_or_else(|| StoreError::Storage(format!("bad last_visited timestamp: {}", s)))?,
        ),
        None => None,
    };
    Ok(Bookmark {
        id: raw.id,
        url: raw.url,
        title: raw.title,
        description: raw.description,
        added,
        stars: raw.stars,
        pinned: raw.pinned,
        archived: raw.archived,
        tags,
        visit_count: raw.visit_count,
        reachable: raw.reachable,
        last_visited,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn store_with_samples() -> SqliteStore {
        let store = SqliteStore::open_in_memory().unwrap();
        store
            .insert_batch(&[
                Bookmark::new(1, "https://github.com/a", "Alpha")
                    .with_added(parse_timestamp("2024-01-01").unwrap())
                    .with_tags(["python", "django"])
                    .with_stars(3),
                Bookmark::new(2, "https://example.org/b", "Beta")
                    .with_added(parse_timestamp("2024-03-01 08:30:00").unwrap())
                    .with_reachable(Some(false)),
            ])
            .unwrap();
        store
    }

    #[test]
    fn round_trips_bookmarks() {
        let store = store_with_samples();
        let all = store.all().unwrap();
        assert_eq!(all.len(), 2);
        assert_eq!(all[0].tags, vec!["python", "django"]);
        assert_eq!(all[0].stars, 3);
        assert_eq!(all[1].reachable, Some(false));
        assert_eq!(all[1].last_visited, None);
        assert_eq!(
            format_sql_timestamp(&all[1].added),
            "2024-03-01 08:30:00".to_string()
        );
    }

    #[test]
    fn query_with_fragment() {
        let store = store_with_samples();
        let hits = store
            .query("stars > ?", &[SqlParam::Int(0)])
            .unwrap();
        assert_eq!(hits.len(), 1);
        assert_eq!(hits[0].id, 1);
    }

    #[test]
    fn query_through_tag_tables() {
        let store = store_with_samples();
        let hits = store
            .query(
                "bookmarks.id IN (SELECT bt.bookmark_id FROM bookmark_tags bt JOIN tags t ON t.id = bt.tag_id WHERE t.name = ?)",
                &[SqlParam::Text("django".into())],
            )
            .unwrap();
        assert_eq!(hits.iter().map(|b| b.id).collect::<Vec<_>>(), vec![1]);
    }

    #[test]
    fn duplicate_insert_fails() {
        let store = store_with_samples();
        let err = store
            .insert(&Bookmark::new(1, "https://dup.test", "Dup"))
            .unwrap_err();
        assert!(matches!(err, StoreError::AlreadyExists(1)));
    }

    #[test]
    fn bad_fragment_is_storage_error() {
        let store = store_with_samples();
        let err = store.query("no_such_column = 1", &[]).unwrap_err();
        assert!(matches!(err, StoreError::Storage(_)));
    }
}
