//! Shared fixtures for shelf-views integration tests

#![allow(dead_code)]

use chrono::{DateTime, Utc};
use shelf_core::{parse_timestamp, Bookmark, MemoryStore, SqliteStore};

/// Route `tracing` output through the test harness. Set `RUST_LOG` to see it.
pub fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("warn")),
        )
        .with_test_writer()
        .try_init();
}

/// Fixed "now" for relative date bounds.
pub fn now() -> DateTime<Utc> {
    at("2024-06-01 12:00:00")
}

pub fn at(s: &str) -> DateTime<Utc> {
    parse_timestamp(s).unwrap_or_else(|| panic!("bad fixture timestamp: {}", s))
}

/// A small, varied library covering every field the views read.
pub fn library() -> Vec<Bookmark> {
    vec![
        Bookmark::new(1, "https://github.com/rust-lang/rust", "The Rust Programming Language")
            .with_added(at("2024-01-01"))
            .with_tags(["rust", "lang"])
            .with_stars(3)
            .with_visits(12, Some(at("2024-05-30 09:00:00")))
            .with_reachable(Some(true)),
        Bookmark::new(2, "https://docs.python.org/3/", "Python docs")
            .with_added(at("2024-02-10"))
            .with_tags(["python", "docs"])
            .with_description("Official Python documentation"),
        Bookmark::new(3, "https://github.com/django/django", "Django")
            .with_added(at("2024-03-01"))
            .with_tags(["python", "django", "web"])
            .with_stars(1)
            .with_visits(3, Some(at("2024-04-02 18:30:00"))),
        Bookmark::new(4, "https://news.ycombinator.com/", "Hacker News")
            .with_added(at("2024-03-15"))
            .with_visits(40, Some(at("2024-05-31 22:15:00")))
            .with_pinned(true),
        Bookmark::new(5, "http://old.example.org/page", "Old page")
            .with_added(at("2023-11-20"))
            .with_tags(["archive"])
            .with_archived(true)
            .with_reachable(Some(false)),
        Bookmark::new(6, "https://blog.rust-lang.org/", "Rust Blog")
            .with_added(at("2024-05-20"))
            .with_tags(["rust", "news"])
            .with_stars(2)
            .with_visits(6, Some(at("2024-05-25 07:00:00"))),
        Bookmark::new(7, "https://example.com/recipes", "Recipes")
            .with_added(at("2024-05-28"))
            .with_archived(true),
    ]
}

pub fn memory_store() -> MemoryStore {
    library().into_iter().collect()
}

pub fn sqlite_store() -> SqliteStore {
    let store = SqliteStore::open_in_memory().expect("open in-memory store");
    store.insert_batch(&library()).expect("insert fixtures");
    store
}
