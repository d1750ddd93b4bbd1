//! Lazy, memoizing wrapper around one compiled query
//!
//! A result set defers its two expensive computations, total match count and
//! row materialization, until first use and memoizes each independently.
//! Re-paging invalidates only the row memo: the total count does not depend
//! on the active window, so it survives `apply_paging` untouched.

use std::sync::Arc;

use indexmap::IndexMap;

use crate::engine::{PageWindow, QueryEngine};
use crate::error::{QueryError, Result};
use crate::query::{HookChain, PostFetchHook};
use crate::value::{QueryValue, Row};

/// Lazy result set for one compiled query.
///
/// Created by a query object whenever it builds a query it has not seen
/// before; reused (with its memos) when the same query is built again.
pub struct ResultSet<E: QueryEngine> {
	engine: Arc<E>,
	query: Arc<E::Query>,
	count_query: Option<Arc<E::Query>>,
	hooks: HookChain,
	index_field: Option<String>,
	offset: Option<u64>,
	limit: Option<u64>,
	total_count: Option<u64>,
	rows: Option<Vec<Row>>,
}

impl<E: QueryEngine> ResultSet<E> {
	pub(crate) fn new(
		engine: Arc<E>,
		query: Arc<E::Query>,
		count_query: Option<Arc<E::Query>>,
		hooks: HookChain,
		index_field: Option<String>,
	) -> Self {
		Self {
			engine,
			query,
			count_query,
			hooks,
			index_field,
			offset: None,
			limit: None,
			total_count: None,
			rows: None,
		}
	}

	pub fn offset(&self) -> Option<u64> {
		self.offset
	}

	pub fn limit(&self) -> Option<u64> {
		self.limit
	}

	/// The compiled query this result set materializes.
	pub fn query(&self) -> &Arc<E::Query> {
		&self.query
	}

	fn window(&self) -> PageWindow {
		PageWindow::new(self.offset, self.limit)
	}

	/// Re-page the result set in place.
	///
	/// A call that changes nothing keeps the materialized rows; an actual
	/// change drops them so the next access refetches. The memoized total
	/// count always survives.
	pub fn apply_paging(&mut self, offset: Option<u64>, limit: Option<u64>) -> &mut Self {
		if self.offset != offset || self.limit != limit {
			self.offset = offset;
			self.limit = limit;
			self.rows = None;
		}
		self
	}

	/// Total number of records matching the query, ignoring the window.
	///
	/// Memoized on first call. Runs the count-override query as a scalar
	/// fetch when one was supplied, otherwise the engine's count primitive
	/// with an unbounded window.
	pub async fn total_count(&mut self) -> Result<u64> {
		if let Some(count) = self.total_count {
			return Ok(count);
		}
		let count = match &self.count_query {
			Some(count_query) => scalar_count(self.engine.as_ref(), count_query).await?,
			None => {
				self.engine
					.count(&self.query, &PageWindow::unbounded())
					.await?
			}
		};
		self.total_count = Some(count);
		Ok(count)
	}

	/// Materialized rows for the current window.
	///
	/// Memoized on first call; post-fetch hooks run over the freshly fetched
	/// collection before it is stored. Re-paging and calling again triggers a
	/// fresh fetch.
	pub async fn rows(&mut self) -> Result<&[Row]> {
		if self.rows.is_none() {
			let mut fetched = self.engine.fetch(&self.query, &self.window()).await?;
			self.run_hooks(&mut fetched)?;
			self.rows = Some(fetched);
		}
		Ok(self.rows.as_deref().unwrap_or_default())
	}

	/// Iterate the materialized rows for the current window.
	pub async fn iter(&mut self) -> Result<std::slice::Iter<'_, Row>> {
		Ok(self.rows().await?.iter())
	}

	/// Clone the materialized rows out of the result set.
	pub async fn to_vec(&mut self) -> Result<Vec<Row>> {
		Ok(self.rows().await?.to_vec())
	}

	/// Materialized rows keyed by the query's index field.
	pub async fn to_map(&mut self) -> Result<IndexMap<String, Row>> {
		let Some(index_field) = self.index_field.clone() else {
			return Err(QueryError::Unsupported(
				"keyed access requires an index field on the query object".to_string(),
			));
		};
		let rows = self.rows().await?;
		let mut keyed = IndexMap::with_capacity(rows.len());
		for row in rows {
			let key = row
				.data
				.get(&index_field)
				.ok_or_else(|| QueryError::ColumnNotFound(index_field.clone()))?
				.as_key()?;
			keyed.insert(key, row.clone());
		}
		Ok(keyed)
	}

	/// Number of records in the current page.
	///
	/// Distinct from [`ResultSet::total_count`]: the window applies. The
	/// result must lie within `[0, limit]` when a limit is set; anything else
	/// is a storage-side paging inconsistency.
	pub async fn count(&self) -> Result<u64> {
		let count = self.engine.count(&self.query, &self.window()).await?;
		if let Some(limit) = self.limit
			&& count > limit
		{
			return Err(QueryError::RangeViolation { count, limit });
		}
		Ok(count)
	}

	/// True when the total count does not reach past the current offset.
	pub async fn is_empty(&mut self) -> Result<bool> {
		let total = self.total_count().await?;
		Ok(total <= self.offset.unwrap_or(0))
	}

	/// First matching record.
	///
	/// Re-pages to a single-row window as a side effect.
	pub async fn first(&mut self) -> Result<Option<Row>> {
		self.apply_paging(Some(0), Some(1));
		Ok(self.rows().await?.first().cloned())
	}

	/// Last matching record.
	///
	/// Re-pages to a single-row window at the end as a side effect.
	pub async fn last(&mut self) -> Result<Option<Row>> {
		let total = self.total_count().await?;
		if total == 0 {
			return Ok(None);
		}
		self.apply_paging(Some(total - 1), Some(1));
		Ok(self.rows().await?.first().cloned())
	}

	pub(crate) async fn fetch_unpaged(&self) -> Result<Vec<Row>> {
		self.engine.fetch(&self.query, &PageWindow::unbounded()).await
	}

	pub(crate) async fn fetch_single(&self) -> Result<Option<Row>> {
		self.engine.fetch_one(&self.query).await
	}

	pub(crate) fn run_hooks(&self, rows: &mut [Row]) -> Result<()> {
		let hooks: Vec<PostFetchHook> = self.hooks.read().clone();
		for hook in &hooks {
			hook(rows)?;
		}
		Ok(())
	}
}

/// Execute a count-override query and coerce its scalar result.
///
/// The scalar is read from a `count` column, falling back to the sole column
/// of a one-column row. Non-integer and negative scalars are rejected.
async fn scalar_count<E: QueryEngine>(engine: &E, query: &E::Query) -> Result<u64> {
	let row = engine
		.fetch_one(query)
		.await?
		.ok_or(QueryError::NotFound)?;
	let value = row
		.data
		.get("count")
		.or_else(|| {
			if row.data.len() == 1 {
				row.data.values().next()
			} else {
				None
			}
		})
		.cloned()
		.ok_or_else(|| QueryError::ColumnNotFound("count".to_string()))?;
	match value {
		QueryValue::Int(count) if count >= 0 => Ok(count as u64),
		QueryValue::Int(count) => {
			tracing::warn!(count, "count query returned a negative scalar");
			Err(QueryError::TypeMismatch(format!(
				"Cannot use negative count {}",
				count
			)))
		}
		other => Err(QueryError::TypeMismatch(format!(
			"Cannot convert {:?} to a count",
			other
		))),
	}
}
