//! End-to-end tests for the SQL adapter behind a repository
//!
//! A recording in-memory driver stands in for a connection pool so the exact
//! SQL rendered for each execution can be asserted.

use std::sync::Arc;

use async_trait::async_trait;
use grappelli::backends::sql::{SqlDialect, SqlDriver, SqlEngine};
use grappelli::{
	Fetched, Hydration, JoinKind, Predicate, QueryExecutor, QueryValue, Repository, Result, Row,
	SortDirection,
};
use parking_lot::Mutex;

use crate::fixtures::people;

struct MemorySqlDriver {
	rows: Vec<Row>,
	executed: Mutex<Vec<String>>,
}

impl MemorySqlDriver {
	fn with_rows(rows: Vec<Row>) -> Arc<Self> {
		Arc::new(Self {
			rows,
			executed: Mutex::new(Vec::new()),
		})
	}

	fn executed(&self) -> Vec<String> {
		self.executed.lock().clone()
	}
}

#[async_trait]
impl SqlDriver for MemorySqlDriver {
	async fn fetch_all(&self, sql: &str, _params: Vec<QueryValue>) -> Result<Vec<Row>> {
		self.executed.lock().push(sql.to_string());
		Ok(self.rows.clone())
	}

	async fn fetch_optional(&self, sql: &str, _params: Vec<QueryValue>) -> Result<Option<Row>> {
		self.executed.lock().push(sql.to_string());
		if sql.starts_with("SELECT COUNT(*)") {
			let mut row = Row::new();
			row.insert("count".to_string(), QueryValue::Int(self.rows.len() as i64));
			return Ok(Some(row));
		}
		Ok(self.rows.first().cloned())
	}
}

fn repository(driver: &Arc<MemorySqlDriver>) -> Repository<SqlEngine> {
	let engine = SqlEngine::new(Arc::clone(driver) as Arc<dyn SqlDriver>, SqlDialect::Postgres);
	Repository::new(Arc::new(engine), "users")
}

/// The active window is rendered into the fetch SQL, not the compiled query
#[tokio::test]
async fn test_collection_fetch_renders_the_window() {
	// Arrange
	let driver = MemorySqlDriver::with_rows(people(2));
	let repo = repository(&driver);
	let mut query = repo.query().filter(Predicate::eq("name", "alice"));

	// Act
	let Fetched::Collection(set) = repo.fetch(&mut query, Hydration::Object).await.unwrap() else {
		panic!("expected a collection");
	};
	set.apply_paging(Some(10), Some(5));
	set.rows().await.unwrap();

	// Assert
	assert_eq!(
		driver.executed(),
		[r#"SELECT "e".* FROM "users" AS "e" WHERE "e"."name" = 'alice' LIMIT 5 OFFSET 10"#]
	);
	assert!(query.last_query().unwrap().sql().ends_with(r#""e"."name" = 'alice'"#));
}

/// The total count wraps the un-paged statement in a COUNT(*) sub-select
#[tokio::test]
async fn test_total_count_wraps_the_unpaged_statement() {
	// Arrange
	let driver = MemorySqlDriver::with_rows(people(2));
	let repo = repository(&driver);
	let mut query = repo.query();
	let Fetched::Collection(set) = repo.fetch(&mut query, Hydration::Object).await.unwrap() else {
		panic!("expected a collection");
	};

	// Act
	let total = set.total_count().await.unwrap();

	// Assert
	assert_eq!(total, 2);
	assert_eq!(
		driver.executed(),
		[r#"SELECT COUNT(*) AS "count" FROM (SELECT "e".* FROM "users" AS "e") AS "matched""#]
	);
}

/// The page-scoped count carries the window into the sub-select
#[tokio::test]
async fn test_page_count_windows_the_subselect() {
	// Arrange
	let driver = MemorySqlDriver::with_rows(people(2));
	let repo = repository(&driver);
	let mut query = repo.query();
	let Fetched::Collection(set) = repo.fetch(&mut query, Hydration::Object).await.unwrap() else {
		panic!("expected a collection");
	};
	set.apply_paging(Some(4), Some(2));

	// Act
	let on_page = set.count().await.unwrap();

	// Assert
	assert_eq!(on_page, 2);
	assert_eq!(
		driver.executed(),
		[r#"SELECT COUNT(*) AS "count" FROM (SELECT "e".* FROM "users" AS "e" LIMIT 2 OFFSET 4) AS "matched""#]
	);
}

/// Single-record fetches append a LIMIT 1 at execution time
#[tokio::test]
async fn test_fetch_one_appends_limit_one() {
	// Arrange
	let driver = MemorySqlDriver::with_rows(people(2));
	let repo = repository(&driver);
	let mut query = repo.query().by_id(1i64);

	// Act
	let row = repo.fetch_one(&mut query).await.unwrap();

	// Assert
	assert_eq!(row.get::<i64>("id").unwrap(), 1);
	assert_eq!(
		driver.executed(),
		[r#"SELECT "e".* FROM "users" AS "e" WHERE "e"."id" = 1 LIMIT 1"#]
	);
}

/// An unchanged definition round-trips the driver exactly once
#[tokio::test]
async fn test_reuse_runs_the_driver_once() {
	// Arrange
	let driver = MemorySqlDriver::with_rows(people(3));
	let repo = repository(&driver);
	let mut query = repo.query().order_by("id", SortDirection::Asc);

	// Act - two executions, one materialization
	let Fetched::Collection(set) = repo.fetch(&mut query, Hydration::Object).await.unwrap() else {
		panic!("expected a collection");
	};
	assert_eq!(set.rows().await.unwrap().len(), 3);
	let Fetched::Collection(set) = repo.fetch(&mut query, Hydration::Object).await.unwrap() else {
		panic!("expected a collection");
	};
	set.rows().await.unwrap();

	// Assert
	assert_eq!(driver.executed().len(), 1);
}

/// Joins and dotted fields render fully qualified columns
#[tokio::test]
async fn test_join_and_qualified_order_render() {
	// Arrange
	let driver = MemorySqlDriver::with_rows(people(1));
	let repo = repository(&driver);
	let mut query = repo
		.query()
		.join(JoinKind::Inner, "posts", "p", "id", "author_id")
		.order_by("p.title", SortDirection::Desc);

	// Act
	let Fetched::Records(records) = repo.fetch(&mut query, Hydration::Array).await.unwrap() else {
		panic!("expected records");
	};

	// Assert
	assert_eq!(records.len(), 1);
	assert_eq!(
		driver.executed(),
		[r#"SELECT "e".* FROM "users" AS "e" INNER JOIN "posts" AS "p" ON "p"."author_id" = "e"."id" ORDER BY "p"."title" DESC"#]
	);
}

/// The index field keys map access and participates in the fingerprint
#[tokio::test]
async fn test_index_by_keys_rows_and_marks_the_signature() {
	// Arrange
	let driver = MemorySqlDriver::with_rows(people(2));
	let repo = repository(&driver);
	let mut query = repo.query().index_by("id");

	// Act
	let Fetched::Collection(set) = repo.fetch(&mut query, Hydration::Object).await.unwrap() else {
		panic!("expected a collection");
	};
	let keyed = set.to_map().await.unwrap();

	// Assert
	assert_eq!(keyed.len(), 2);
	assert!(keyed.contains_key("1"));
	assert!(
		query
			.last_signature()
			.unwrap()
			.as_str()
			.ends_with("INDEX BY id")
	);
}
