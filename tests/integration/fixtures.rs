//! Shared fixtures for the integration tests
//!
//! Provides an in-memory engine whose builder assembles a readable textual
//! plan from the replayed operations, and whose execution serves rows from a
//! fixed store while counting engine calls.

use std::sync::Arc;
use std::sync::atomic::AtomicUsize;
use std::sync::atomic::Ordering as AtomicOrdering;

use async_trait::async_trait;
use grappelli::operation::{Grouping, Join, Ordering, Predicate, Projection};
use grappelli::{
	PageWindow, QueryBuilder, QueryEngine, QuerySignature, QueryValue, Repository, Result, Row,
};

/// Builder that records operations as a textual plan.
pub struct PlanBuilder {
	parts: Vec<String>,
	join_aliases: Vec<String>,
}

impl PlanBuilder {
	fn new(source: &str, alias: &str, index_by: Option<&str>) -> Self {
		let mut parts = vec![format!("from {} as {}", source, alias)];
		if let Some(field) = index_by {
			parts.push(format!("index by {}", field));
		}
		Self {
			parts,
			join_aliases: vec![alias.to_string()],
		}
	}
}

impl QueryBuilder for PlanBuilder {
	type Compiled = String;

	fn apply_projection(&mut self, projection: &Projection) -> Result<()> {
		self.parts.push(format!("select {}", projection.field));
		Ok(())
	}

	fn apply_predicate(&mut self, predicate: &Predicate) -> Result<()> {
		self.parts.push(format!("filter {:?}", predicate));
		Ok(())
	}

	fn apply_sort(&mut self, ordering: &Ordering) -> Result<()> {
		self.parts.push(format!("order {}", ordering.field));
		Ok(())
	}

	fn apply_join(&mut self, join: &Join) -> Result<()> {
		if self.join_aliases.contains(&join.alias) {
			return Ok(());
		}
		self.parts.push(format!("join {} as {}", join.target, join.alias));
		self.join_aliases.push(join.alias.clone());
		Ok(())
	}

	fn apply_grouping(&mut self, grouping: &Grouping) -> Result<()> {
		self.parts.push(format!("group {}", grouping.field));
		Ok(())
	}

	fn compile(self) -> Result<String> {
		Ok(self.parts.join("; "))
	}
}

/// In-memory engine over a fixed row store.
///
/// Counts every engine call so tests can assert memoization and reuse.
/// With `page_count_lies` set, the page-scoped count ignores the window,
/// simulating a storage-side paging inconsistency.
pub struct MemoryEngine {
	rows: Vec<Row>,
	pub page_count_lies: bool,
	pub builds: AtomicUsize,
	pub fetch_calls: AtomicUsize,
	pub count_calls: AtomicUsize,
	pub fetch_one_calls: AtomicUsize,
}

impl MemoryEngine {
	pub fn with_rows(rows: Vec<Row>) -> Arc<Self> {
		Arc::new(Self {
			rows,
			page_count_lies: false,
			builds: AtomicUsize::new(0),
			fetch_calls: AtomicUsize::new(0),
			count_calls: AtomicUsize::new(0),
			fetch_one_calls: AtomicUsize::new(0),
		})
	}

	pub fn with_lying_page_count(rows: Vec<Row>) -> Arc<Self> {
		Arc::new(Self {
			rows,
			page_count_lies: true,
			builds: AtomicUsize::new(0),
			fetch_calls: AtomicUsize::new(0),
			count_calls: AtomicUsize::new(0),
			fetch_one_calls: AtomicUsize::new(0),
		})
	}

	pub fn builds(&self) -> usize {
		self.builds.load(AtomicOrdering::SeqCst)
	}

	pub fn fetches(&self) -> usize {
		self.fetch_calls.load(AtomicOrdering::SeqCst)
	}

	pub fn counts(&self) -> usize {
		self.count_calls.load(AtomicOrdering::SeqCst)
	}

	pub fn single_fetches(&self) -> usize {
		self.fetch_one_calls.load(AtomicOrdering::SeqCst)
	}

	fn window_slice(&self, window: &PageWindow) -> Vec<Row> {
		let offset = window.offset.unwrap_or(0) as usize;
		let rows = self.rows.iter().skip(offset);
		match window.limit {
			Some(limit) => rows.take(limit as usize).cloned().collect(),
			None => rows.cloned().collect(),
		}
	}
}

#[async_trait]
impl QueryEngine for MemoryEngine {
	type Builder = PlanBuilder;
	type Query = String;

	fn create_builder(&self, source: &str, alias: &str, index_by: Option<&str>) -> PlanBuilder {
		self.builds.fetch_add(1, AtomicOrdering::SeqCst);
		PlanBuilder::new(source, alias, index_by)
	}

	fn signature(&self, query: &String) -> QuerySignature {
		QuerySignature::new(query.clone())
	}

	async fn count(&self, _query: &String, window: &PageWindow) -> Result<u64> {
		self.count_calls.fetch_add(1, AtomicOrdering::SeqCst);
		if self.page_count_lies {
			return Ok(self.rows.len() as u64);
		}
		Ok(self.window_slice(window).len() as u64)
	}

	async fn fetch(&self, _query: &String, window: &PageWindow) -> Result<Vec<Row>> {
		self.fetch_calls.fetch_add(1, AtomicOrdering::SeqCst);
		Ok(self.window_slice(window))
	}

	async fn fetch_one(&self, _query: &String) -> Result<Option<Row>> {
		self.fetch_one_calls.fetch_add(1, AtomicOrdering::SeqCst);
		Ok(self.rows.first().cloned())
	}
}

pub fn repository(engine: &Arc<MemoryEngine>) -> Repository<MemoryEngine> {
	Repository::new(Arc::clone(engine), "people")
}

pub fn person(id: i64, name: &str) -> Row {
	let mut row = Row::new();
	row.insert("id".to_string(), QueryValue::Int(id));
	row.insert("name".to_string(), QueryValue::String(name.to_string()));
	row
}

pub fn people(count: i64) -> Vec<Row> {
	(1..=count).map(|id| person(id, "person")).collect()
}
