//! shelf-views: saved, composable queries over a bookmark collection.
//!
//! A [`View`] is a small tree: primitives (select, order, slice, override,
//! group) and composites (pipeline, union, intersect, difference, named
//! references). Views are built in code with combinators or parsed from
//! TOML/JSON/YAML definitions, and named views live in a [`ViewRegistry`].
//!
//! ```no_run
//! use shelf_core::MemoryStore;
//! use shelf_views::{OrderSpec, Predicate, View, ViewRegistry};
//!
//! let store = MemoryStore::default();
//! let registry = ViewRegistry::with_builtins();
//! let reading = View::named("unread")
//!     .then(View::select(Predicate::has_any_tag(["rust"])))
//!     .then(View::order_by(vec![OrderSpec::desc("added")]));
//! let out = reading.evaluate(&store, &shelf_views::ViewContext::with_registry(&registry));
//! ```

pub mod builtin;
pub mod composites;
pub mod config;
pub mod context;
pub mod dates;
pub mod error;
pub mod loader;
pub mod overlay;
pub mod parser;
pub mod predicate;
pub mod primitives;
pub mod registry;
pub mod result;
pub mod sql;
pub mod view;

pub use builtin::{builtin_views, BuiltinView};
pub use composites::*;
pub use config::ViewsConfig;
pub use context::{Condition, ViewContext, MAX_REFERENCE_DEPTH};
pub use dates::{DateBound, DateUnit};
pub use error::*;
pub use overlay::{OverriddenBookmark, HIDDEN_KEY};
pub use parser::{parse_definition, parse_predicate, parse_view};
pub use predicate::*;
pub use primitives::*;
pub use registry::*;
pub use result::*;
pub use sql::SqlFragment;
pub use view::View;

pub use shelf_core::{Bookmark, BookmarkId, BookmarkStore, Value};
