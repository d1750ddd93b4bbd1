//! # Grappelli
//!
//! Query object and lazy result set layer over pluggable storage engines.
//!
//! A query object encapsulates one reusable query definition: callers chain
//! specification sugar (filters, ordering, joins, grouping), then execute the
//! definition against a repository. Execution goes through a single-entry
//! reuse cache, so an unchanged definition keeps its compiled query and the
//! memoized state of its result set across calls.
//!
//! - **Specifications** (`operation`, `specification`): the replayable
//!   operation log and its fixed-phase dispatcher.
//! - **Query objects** (`query`): fluent definition, reuse cache, pairs
//!   mode, custom query and count-query escape hatches, post-fetch hooks.
//! - **Result sets** (`result_set`): independently memoized total count and
//!   rows, in-place re-paging, page-scoped counts.
//! - **Repositories** (`repository`): the queryable boundary and the
//!   executor surface.
//! - **Backends** (`backends`): SQL (PostgreSQL, MySQL, SQLite dialects via
//!   SeaQuery) and document store adapters.
//!
//! ## Example
//!
//! ```rust,ignore
//! let repo = Repository::new(engine, "users");
//! let mut active = repo
//!     .query()
//!     .filter(Predicate::eq("status", "active"))
//!     .order_by("name", SortDirection::Asc);
//!
//! let total = repo.count(&mut active).await?;
//! if let Fetched::Collection(set) = repo.fetch(&mut active, Hydration::Object).await? {
//!     let page = set.apply_paging(Some(0), Some(20)).rows().await?;
//! }
//! ```

pub mod backends;
pub mod engine;
pub mod error;
pub mod operation;
pub mod query;
pub mod repository;
pub mod result_set;
pub mod specification;
pub mod value;

/// Prelude module for convenient imports
///
/// Imports commonly used types from all modules.
pub mod prelude {
	pub use crate::backends::document::*;
	pub use crate::backends::sql::*;
	pub use crate::engine::*;
	pub use crate::error::*;
	pub use crate::operation::*;
	pub use crate::query::*;
	pub use crate::repository::*;
	pub use crate::result_set::*;
	pub use crate::specification::*;
	pub use crate::value::*;
}

// Re-export top-level commonly used types
pub use engine::{PageWindow, QueryBuilder, QueryEngine, QuerySignature};
pub use error::{QueryError, Result};
pub use operation::{
	FilterOperator, Grouping, Join, JoinKind, JoinOn, Operation, Ordering, Predicate, Projection,
	SortDirection,
};
pub use query::{Fetched, Hydration, PostFetchHook, QueryObject};
pub use repository::{QueryExecutor, Queryable, Repository};
pub use result_set::ResultSet;
pub use specification::QuerySpec;
pub use value::{QueryValue, Row};
