//! shelf-core: the bookmark model and the store boundary.
//!
//! Bookmarks are owned by a [`BookmarkStore`]; the view system only reads
//! them. Two stores ship here: [`MemoryStore`] (no native queries) and,
//! behind the `sqlite` feature, [`SqliteStore`].

pub mod bookmark;
pub mod memory_store;
pub mod store;
pub mod value;

#[cfg(feature = "sqlite")]
pub mod sqlite_store;

pub use bookmark::*;
pub use memory_store::MemoryStore;
pub use store::*;
pub use value::*;

#[cfg(feature = "sqlite")]
pub use sqlite_store::SqliteStore;
