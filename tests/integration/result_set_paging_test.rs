//! Integration tests for result set laziness and paging
//!
//! Covers deferred materialization, the two independent memo axes, in-place
//! re-paging, page-scoped counts, and positional access.

use grappelli::{Fetched, Hydration, QueryError, QueryExecutor};
use rstest::rstest;

use crate::fixtures::{MemoryEngine, people, repository};

/// Fetching a collection performs no engine work until it is consumed
#[tokio::test]
async fn test_materialization_is_deferred_until_first_access() {
	// Arrange
	let engine = MemoryEngine::with_rows(people(3));
	let repo = repository(&engine);
	let mut query = repo.query();

	// Act
	let Fetched::Collection(set) = repo.fetch(&mut query, Hydration::Object).await.unwrap() else {
		panic!("expected a collection");
	};

	// Assert - building the query touched no data
	assert_eq!(engine.fetches(), 0);
	assert_eq!(engine.counts(), 0);

	// Act - consumption triggers exactly one fetch and one count
	assert_eq!(set.rows().await.unwrap().len(), 3);
	assert_eq!(set.total_count().await.unwrap(), 3);

	// Assert
	assert_eq!(engine.fetches(), 1);
	assert_eq!(engine.counts(), 1);
}

/// Re-paging drops the row memo only; the total count memo survives
#[tokio::test]
async fn test_repaging_invalidates_rows_but_not_the_total() {
	// Arrange
	let engine = MemoryEngine::with_rows(people(10));
	let repo = repository(&engine);
	let mut query = repo.query();
	let Fetched::Collection(set) = repo.fetch(&mut query, Hydration::Object).await.unwrap() else {
		panic!("expected a collection");
	};
	assert_eq!(set.total_count().await.unwrap(), 10);

	// Act - first page
	set.apply_paging(Some(0), Some(3));
	let first_page = set.rows().await.unwrap().to_vec();

	// Assert
	assert_eq!(first_page.len(), 3);
	assert_eq!(first_page[0].get::<i64>("id").unwrap(), 1);

	// Act - no-op re-page keeps the memoized rows
	set.apply_paging(Some(0), Some(3));
	set.rows().await.unwrap();
	assert_eq!(engine.fetches(), 1);

	// Act - moving the window refetches rows
	set.apply_paging(Some(3), Some(3));
	let second_page = set.rows().await.unwrap().to_vec();

	// Assert
	assert_eq!(second_page[0].get::<i64>("id").unwrap(), 4);
	assert_eq!(set.total_count().await.unwrap(), 10);
	assert_eq!(engine.fetches(), 2);
	assert_eq!(engine.counts(), 1);
}

/// The page-scoped count honors the active window
#[rstest]
#[case(Some(0), Some(4), 4)]
#[case(Some(8), Some(4), 2)]
#[case(None, None, 10)]
#[tokio::test]
async fn test_page_count_reflects_the_window(
	#[case] offset: Option<u64>,
	#[case] limit: Option<u64>,
	#[case] expected: u64,
) {
	// Arrange
	let engine = MemoryEngine::with_rows(people(10));
	let repo = repository(&engine);
	let mut query = repo.query();
	let Fetched::Collection(set) = repo.fetch(&mut query, Hydration::Object).await.unwrap() else {
		panic!("expected a collection");
	};

	// Act
	set.apply_paging(offset, limit);

	// Assert
	assert_eq!(set.count().await.unwrap(), expected);
}

/// A page count outside `[0, limit]` is rejected as an engine inconsistency
#[tokio::test]
async fn test_out_of_window_page_count_is_a_range_violation() {
	// Arrange
	let engine = MemoryEngine::with_lying_page_count(people(20));
	let repo = repository(&engine);
	let mut query = repo.query();
	let Fetched::Collection(set) = repo.fetch(&mut query, Hydration::Object).await.unwrap() else {
		panic!("expected a collection");
	};
	set.apply_paging(Some(0), Some(5));

	// Act
	let result = set.count().await;

	// Assert
	assert!(matches!(
		result,
		Err(QueryError::RangeViolation {
			count: 20,
			limit: 5
		})
	));
}

/// `first` and `last` re-page to single-row windows as a visible side effect
#[tokio::test]
async fn test_first_and_last_repage_to_single_row_windows() {
	// Arrange
	let engine = MemoryEngine::with_rows(people(10));
	let repo = repository(&engine);
	let mut query = repo.query();
	let Fetched::Collection(set) = repo.fetch(&mut query, Hydration::Object).await.unwrap() else {
		panic!("expected a collection");
	};

	// Act & Assert
	let first = set.first().await.unwrap().unwrap();
	assert_eq!(first.get::<i64>("id").unwrap(), 1);
	assert_eq!((set.offset(), set.limit()), (Some(0), Some(1)));

	let last = set.last().await.unwrap().unwrap();
	assert_eq!(last.get::<i64>("id").unwrap(), 10);
	assert_eq!((set.offset(), set.limit()), (Some(9), Some(1)));
}

/// An offset past the end yields an empty page even when records match
#[tokio::test]
async fn test_offset_past_the_end_is_empty() {
	// Arrange
	let engine = MemoryEngine::with_rows(people(3));
	let repo = repository(&engine);
	let mut query = repo.query();
	let Fetched::Collection(set) = repo.fetch(&mut query, Hydration::Object).await.unwrap() else {
		panic!("expected a collection");
	};

	// Act & Assert
	assert!(!set.is_empty().await.unwrap());
	set.apply_paging(Some(5), Some(10));
	assert!(set.is_empty().await.unwrap());
}

/// Keyed access requires an index field and preserves row order
#[tokio::test]
async fn test_to_map_keys_rows_by_the_index_field() {
	// Arrange
	let engine = MemoryEngine::with_rows(people(3));
	let repo = repository(&engine);
	let mut keyed_query = repo.query().index_by("id");
	let Fetched::Collection(set) =
		repo.fetch(&mut keyed_query, Hydration::Object).await.unwrap()
	else {
		panic!("expected a collection");
	};

	// Act
	let keyed = set.to_map().await.unwrap();

	// Assert
	let keys: Vec<&String> = keyed.keys().collect();
	assert_eq!(keys, ["1", "2", "3"]);

	// Arrange - no index field on this definition
	let mut plain_query = repo.query();
	let Fetched::Collection(set) =
		repo.fetch(&mut plain_query, Hydration::Object).await.unwrap()
	else {
		panic!("expected a collection");
	};

	// Act & Assert
	assert!(matches!(
		set.to_map().await,
		Err(QueryError::Unsupported(_))
	));
}
