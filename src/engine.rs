//! Storage-engine capability boundary
//!
//! The core of this crate is generic over [`QueryEngine`]: anything that can
//! hand out a builder, compile it into an executable query, count matches,
//! and produce row cursors. Backend adapters live in [`crate::backends`];
//! tests supply in-memory stand-ins.

use std::fmt;

use async_trait::async_trait;

use crate::error::Result;
use crate::operation::{Grouping, Join, Ordering, Predicate, Projection};
use crate::value::Row;

/// Paging window applied at execution time.
///
/// Windows are never baked into a compiled query; the compiled artifact stays
/// unpaged so its signature is stable across re-paging.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct PageWindow {
	pub offset: Option<u64>,
	pub limit: Option<u64>,
}

impl PageWindow {
	pub fn new(offset: Option<u64>, limit: Option<u64>) -> Self {
		Self { offset, limit }
	}

	pub fn unbounded() -> Self {
		Self::default()
	}

	pub fn is_unbounded(&self) -> bool {
		self.offset.is_none() && self.limit.is_none()
	}
}

/// Structural fingerprint of a compiled query.
///
/// Two builds that compile to the same signature denote the same logical
/// query; the query object's reuse cache compares nothing else.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct QuerySignature(String);

impl QuerySignature {
	pub fn new(text: impl Into<String>) -> Self {
		Self(text.into())
	}

	pub fn as_str(&self) -> &str {
		&self.0
	}
}

impl fmt::Display for QuerySignature {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.write_str(&self.0)
	}
}

/// Mutable builder handle a storage engine hands out for one query.
///
/// Every `apply_*` call appends to the statement under construction; `compile`
/// consumes the builder and produces the engine's executable query artifact.
/// `apply_join` must be idempotent on the join alias: re-adding an alias that
/// is already present on the builder is a no-op.
pub trait QueryBuilder: Sized {
	type Compiled;

	fn apply_projection(&mut self, projection: &Projection) -> Result<()>;

	fn apply_predicate(&mut self, predicate: &Predicate) -> Result<()>;

	fn apply_sort(&mut self, ordering: &Ordering) -> Result<()>;

	fn apply_join(&mut self, join: &Join) -> Result<()>;

	fn apply_grouping(&mut self, grouping: &Grouping) -> Result<()>;

	fn compile(self) -> Result<Self::Compiled>;
}

/// Execution capability of one storage backend.
///
/// `count` and `fetch` take the paging window separately from the compiled
/// query; an unbounded window means the full match set.
#[async_trait]
pub trait QueryEngine: Send + Sync {
	type Builder: QueryBuilder<Compiled = Self::Query>;
	type Query: Send + Sync;

	/// Fresh builder scoped to one source (table or collection).
	fn create_builder(&self, source: &str, alias: &str, index_by: Option<&str>) -> Self::Builder;

	/// Pure fingerprint of a compiled query, used for reuse detection.
	fn signature(&self, query: &Self::Query) -> QuerySignature;

	/// Scalar count of records matching the query within the window.
	async fn count(&self, query: &Self::Query, window: &PageWindow) -> Result<u64>;

	/// Materialize the rows matching the query within the window.
	async fn fetch(&self, query: &Self::Query, window: &PageWindow) -> Result<Vec<Row>>;

	/// Fetch at most one row matching the query.
	async fn fetch_one(&self, query: &Self::Query) -> Result<Option<Row>>;
}
