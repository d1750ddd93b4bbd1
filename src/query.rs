//! Query objects: encapsulated, replayable query definitions
//!
//! A query object accumulates specification operations and builds a backend
//! query from them on demand. Each build is fingerprinted; when the
//! fingerprint matches the previous build, the cached query and its result
//! set are handed back so memoized counts and rows survive repeated calls.

use std::sync::Arc;

use indexmap::IndexMap;
use parking_lot::RwLock;

use crate::engine::{QueryBuilder, QueryEngine, QuerySignature};
use crate::error::{QueryError, Result};
use crate::operation::{
	Grouping, Join, JoinKind, JoinOn, Operation, Ordering, Predicate, Projection, SortDirection,
};
use crate::repository::Queryable;
use crate::result_set::ResultSet;
use crate::specification::QuerySpec;
use crate::value::{QueryValue, Row};

/// Callback applied to freshly fetched rows before they are handed out.
pub type PostFetchHook = Arc<dyn Fn(&mut [Row]) -> Result<()> + Send + Sync>;

/// Hook chain shared between a query object and the result sets it creates.
pub(crate) type HookChain = Arc<RwLock<Vec<PostFetchHook>>>;

type BuilderFn<E> =
	Box<dyn Fn(<E as QueryEngine>::Builder) -> Result<<E as QueryEngine>::Builder> + Send + Sync>;

/// How [`QueryObject::fetch`] materializes matching records.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Hydration {
	/// Lazy result set with independently memoized count and rows.
	#[default]
	Object,
	/// Eager, un-paged record sequence.
	Array,
}

/// Outcome of [`QueryObject::fetch`], shaped by hydration and pairs mode.
pub enum Fetched<'a, E: QueryEngine> {
	/// Lazy result set bound to the cached query.
	Collection(&'a mut ResultSet<E>),
	/// Eagerly materialized records.
	Records(Vec<Row>),
	/// Ordered key to value mapping.
	Pairs(IndexMap<String, QueryValue>),
}

struct CachedQuery<E: QueryEngine> {
	signature: QuerySignature,
	query: Arc<E::Query>,
	result: ResultSet<E>,
}

/// A reusable query definition bound to one storage engine family.
///
/// Specification sugar consumes and returns `self` for chaining; execution
/// methods take any [`Queryable`] and go through the single-entry reuse
/// cache, so an unchanged definition never rebuilds its result set.
pub struct QueryObject<E: QueryEngine> {
	spec: QuerySpec,
	source_alias: String,
	index_field: Option<String>,
	pairs: Option<(String, String)>,
	hooks: HookChain,
	query_fn: Option<BuilderFn<E>>,
	count_query_fn: Option<BuilderFn<E>>,
	cache: Option<CachedQuery<E>>,
}

impl<E: QueryEngine> Default for QueryObject<E> {
	fn default() -> Self {
		Self::new()
	}
}

impl<E: QueryEngine> QueryObject<E> {
	pub fn new() -> Self {
		Self {
			spec: QuerySpec::new(),
			source_alias: "e".to_string(),
			index_field: None,
			pairs: None,
			hooks: Arc::new(RwLock::new(Vec::new())),
			query_fn: None,
			count_query_fn: None,
			cache: None,
		}
	}

	/// Project a single field.
	pub fn select(mut self, field: impl Into<String>) -> Self {
		self.spec.push(Operation::Select(Projection::new(field)));
		self
	}

	/// Project a field under an output alias.
	pub fn select_as(mut self, field: impl Into<String>, alias: impl Into<String>) -> Self {
		self.spec.push(Operation::Select(Projection::aliased(field, alias)));
		self
	}

	/// Restrict matching records by a predicate.
	pub fn filter(mut self, predicate: Predicate) -> Self {
		self.spec.push(Operation::Filter(predicate));
		self
	}

	/// Order matching records by a field.
	pub fn order_by(mut self, field: impl Into<String>, direction: SortDirection) -> Self {
		self.spec.push(Operation::Order(Ordering::new(field, direction)));
		self
	}

	/// Join a related source under an alias.
	///
	/// Joins are idempotent per alias: the builder skips an alias it has
	/// already added, so sugar methods may join the same relation freely.
	pub fn join(
		mut self,
		kind: JoinKind,
		target: impl Into<String>,
		alias: impl Into<String>,
		local: impl Into<String>,
		foreign: impl Into<String>,
	) -> Self {
		self.spec.push(Operation::Join(Join::new(
			kind,
			target,
			alias,
			JoinOn::new(local, foreign),
		)));
		self
	}

	/// Group matching records by a field.
	pub fn group_by(mut self, field: impl Into<String>) -> Self {
		self.spec.push(Operation::Group(Grouping::new(field)));
		self
	}

	/// Group by a field and project it under an output alias.
	pub fn group_by_as(mut self, field: impl Into<String>, alias: impl Into<String>) -> Self {
		self.spec.push(Operation::Group(Grouping::aliased(field, alias)));
		self
	}

	/// Restrict to the record whose `id` equals the given value.
	pub fn by_id(self, id: impl Into<QueryValue>) -> Self {
		self.filter(Predicate::eq("id", id))
	}

	/// Restrict to records whose `id` is among the given values.
	pub fn by_ids(self, ids: Vec<QueryValue>) -> Self {
		self.filter(Predicate::is_in("id", ids))
	}

	/// Switch `fetch` to pairs mode: a key field to value field mapping.
	///
	/// Pairs output is never paged and bypasses hydration entirely.
	pub fn as_pairs(mut self, key_field: impl Into<String>, value_field: impl Into<String>) -> Self {
		self.pairs = Some((key_field.into(), value_field.into()));
		self
	}

	/// Key result-set map access by the given result column.
	pub fn index_by(mut self, field: impl Into<String>) -> Self {
		self.index_field = Some(field.into());
		self
	}

	/// Override the default `e` alias for the query source.
	pub fn with_source_alias(mut self, alias: impl Into<String>) -> Self {
		self.source_alias = alias.into();
		self
	}

	/// Replace the default specification replay with a custom construction.
	///
	/// The closure receives the fresh builder handle and returns the builder
	/// to compile; accumulated operations are ignored while it is set.
	pub fn with_query(
		mut self,
		build: impl Fn(E::Builder) -> Result<E::Builder> + Send + Sync + 'static,
	) -> Self {
		self.query_fn = Some(Box::new(build));
		self
	}

	/// Supply a dedicated count query.
	///
	/// When set, `count` runs this query as a single-row scalar fetch
	/// instead of the engine's count primitive.
	pub fn with_count_query(
		mut self,
		build: impl Fn(E::Builder) -> Result<E::Builder> + Send + Sync + 'static,
	) -> Self {
		self.count_query_fn = Some(Box::new(build));
		self
	}

	/// Register a post-fetch hook.
	///
	/// Hooks run in registration order whenever a result set materializes
	/// rows and on the single-row slice of `fetch_one`. The chain is shared
	/// live with result sets already handed out.
	pub fn on_post_fetch(&self, hook: impl Fn(&mut [Row]) -> Result<()> + Send + Sync + 'static) {
		self.hooks.write().push(Arc::new(hook));
	}

	/// The accumulated specification operations.
	pub fn spec(&self) -> &QuerySpec {
		&self.spec
	}

	pub fn source_alias(&self) -> &str {
		&self.source_alias
	}

	/// The most recently built query, if any.
	pub fn last_query(&self) -> Option<&Arc<E::Query>> {
		self.cache.as_ref().map(|cached| &cached.query)
	}

	/// The fingerprint of the most recently built query, if any.
	pub fn last_signature(&self) -> Option<&QuerySignature> {
		self.cache.as_ref().map(|cached| &cached.signature)
	}

	/// Total number of records matching the definition.
	///
	/// Delegates to the cached result set, so a count already memoized by an
	/// in-flight fetch is reused instead of issuing a second engine call.
	pub async fn count<Q>(&mut self, queryable: &Q) -> Result<u64>
	where
		Q: Queryable<Engine = E> + ?Sized,
	{
		let cached = self.build_or_reuse(queryable)?;
		cached.result.total_count().await
	}

	/// Fetch matching records in the requested hydration.
	///
	/// Pairs mode takes precedence over hydration and returns an eager,
	/// un-paged mapping. Object hydration borrows the cached lazy result
	/// set; array hydration materializes the full match set without hooks.
	pub async fn fetch<'a, Q>(
		&'a mut self,
		queryable: &Q,
		hydration: Hydration,
	) -> Result<Fetched<'a, E>>
	where
		Q: Queryable<Engine = E> + ?Sized,
	{
		if let Some((key_field, value_field)) = self.pairs.clone() {
			let cached = self.build_or_reuse(queryable)?;
			let rows = cached.result.fetch_unpaged().await?;
			let mut pairs = IndexMap::with_capacity(rows.len());
			for row in &rows {
				let key = row
					.data
					.get(&key_field)
					.ok_or_else(|| QueryError::ColumnNotFound(key_field.clone()))?
					.as_key()?;
				let value = row
					.data
					.get(&value_field)
					.ok_or_else(|| QueryError::ColumnNotFound(value_field.clone()))?
					.clone();
				pairs.insert(key, value);
			}
			return Ok(Fetched::Pairs(pairs));
		}
		let cached = self.build_or_reuse(queryable)?;
		match hydration {
			Hydration::Array => Ok(Fetched::Records(cached.result.fetch_unpaged().await?)),
			Hydration::Object => Ok(Fetched::Collection(&mut cached.result)),
		}
	}

	/// Fetch exactly one matching record.
	///
	/// Zero matches is an error, not a silent absence. The post-fetch hook
	/// chain runs over the single-element slice so hooks observe the same
	/// shape as multi-row fetches.
	pub async fn fetch_one<Q>(&mut self, queryable: &Q) -> Result<Row>
	where
		Q: Queryable<Engine = E> + ?Sized,
	{
		let cached = self.build_or_reuse(queryable)?;
		let row = cached
			.result
			.fetch_single()
			.await?
			.ok_or(QueryError::NotFound)?;
		let mut rows = vec![row];
		cached.result.run_hooks(&mut rows)?;
		rows.pop().ok_or(QueryError::NotFound)
	}

	fn build_query<Q>(&self, queryable: &Q) -> Result<E::Query>
	where
		Q: Queryable<Engine = E> + ?Sized,
	{
		let builder = queryable.create_builder(&self.source_alias, self.index_field.as_deref());
		let builder = match &self.query_fn {
			Some(build) => build(builder)?,
			None => {
				let mut builder = builder;
				self.spec.apply(&mut builder)?;
				builder
			}
		};
		builder.compile()
	}

	fn build_count_query<Q>(&self, queryable: &Q) -> Result<Option<E::Query>>
	where
		Q: Queryable<Engine = E> + ?Sized,
	{
		let Some(build) = &self.count_query_fn else {
			return Ok(None);
		};
		let builder = queryable.create_builder(&self.source_alias, self.index_field.as_deref());
		Ok(Some(build(builder)?.compile()?))
	}

	/// Build the query and return the cache entry for it.
	///
	/// A build whose signature matches the cached one reuses the entry,
	/// memos included. Any other outcome compiles fresh and overwrites the
	/// single cache slot.
	fn build_or_reuse<Q>(&mut self, queryable: &Q) -> Result<&mut CachedQuery<E>>
	where
		Q: Queryable<Engine = E> + ?Sized,
	{
		let query = self.build_query(queryable)?;
		let signature = queryable.engine().signature(&query);
		let cached = match self.cache.take() {
			Some(cached) if cached.signature == signature => cached,
			previous => {
				if previous.is_some() {
					tracing::debug!(signature = %signature, "query changed, replacing cached result set");
				}
				let query = Arc::new(query);
				let count_query = self.build_count_query(queryable)?.map(Arc::new);
				let result = ResultSet::new(
					Arc::clone(queryable.engine()),
					Arc::clone(&query),
					count_query,
					Arc::clone(&self.hooks),
					self.index_field.clone(),
				);
				CachedQuery {
					signature,
					query,
					result,
				}
			}
		};
		Ok(self.cache.insert(cached))
	}
}
