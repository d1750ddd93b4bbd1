//! Repositories and the queryable boundary
//!
//! A queryable supplies the two things a query object cannot know on its
//! own: the engine handle and fresh builder handles rooted at a source.
//! `Repository` is the standard implementation; the executor trait layers
//! the fetch surface on top of any queryable through default methods.

use std::sync::Arc;

use async_trait::async_trait;

use crate::engine::QueryEngine;
use crate::error::Result;
use crate::query::{Fetched, Hydration, QueryObject};
use crate::value::Row;

/// Capability of producing fresh builder handles for one engine.
pub trait Queryable: Send + Sync {
	type Engine: QueryEngine;

	fn engine(&self) -> &Arc<Self::Engine>;

	/// Fresh builder rooted at this queryable's source.
	fn create_builder(
		&self,
		alias: &str,
		index_by: Option<&str>,
	) -> <Self::Engine as QueryEngine>::Builder;
}

/// Execution surface over query objects.
///
/// Every method forwards to the query object with `self` as the queryable,
/// so the whole surface works against any [`Queryable`] stand-in.
#[async_trait]
pub trait QueryExecutor: Queryable + Sized {
	async fn fetch<'a>(
		&self,
		query: &'a mut QueryObject<Self::Engine>,
		hydration: Hydration,
	) -> Result<Fetched<'a, Self::Engine>> {
		query.fetch(self, hydration).await
	}

	async fn fetch_one(&self, query: &mut QueryObject<Self::Engine>) -> Result<Row> {
		query.fetch_one(self).await
	}

	async fn count(&self, query: &mut QueryObject<Self::Engine>) -> Result<u64> {
		query.count(self).await
	}
}

/// Engine-backed access point for one table or collection.
pub struct Repository<E: QueryEngine> {
	engine: Arc<E>,
	source: String,
}

impl<E: QueryEngine> Repository<E> {
	pub fn new(engine: Arc<E>, source: impl Into<String>) -> Self {
		Self {
			engine,
			source: source.into(),
		}
	}

	pub fn source(&self) -> &str {
		&self.source
	}

	/// Fresh query object for this repository's engine family.
	pub fn query(&self) -> QueryObject<E> {
		QueryObject::new()
	}
}

impl<E: QueryEngine> Clone for Repository<E> {
	fn clone(&self) -> Self {
		Self {
			engine: Arc::clone(&self.engine),
			source: self.source.clone(),
		}
	}
}

impl<E: QueryEngine> Queryable for Repository<E> {
	type Engine = E;

	fn engine(&self) -> &Arc<E> {
		&self.engine
	}

	fn create_builder(&self, alias: &str, index_by: Option<&str>) -> E::Builder {
		self.engine.create_builder(&self.source, alias, index_by)
	}
}

#[async_trait]
impl<E: QueryEngine> QueryExecutor for Repository<E> {}
