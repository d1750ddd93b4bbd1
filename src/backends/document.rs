//! Document store adapter
//!
//! Compiles specification operations into JSON selectors using MongoDB
//! operator syntax. Joins, grouping, and projection aliases have no document
//! equivalent and are rejected at build time. Counts go through the driver's
//! native primitive instead of a wrapping query.

use std::sync::Arc;

use async_trait::async_trait;
use serde_json::{Map, Value};

use crate::engine::{PageWindow, QueryBuilder, QueryEngine, QuerySignature};
use crate::error::{QueryError, Result};
use crate::operation::{
	FilterOperator, Grouping, Join, Ordering, Predicate, Projection, SortDirection,
};
use crate::value::{QueryValue, Row};

fn query_value_to_json(value: &QueryValue) -> Value {
	match value {
		QueryValue::Null => Value::Null,
		QueryValue::Bool(b) => Value::Bool(*b),
		QueryValue::Int(i) => Value::from(*i),
		QueryValue::Float(f) => Value::from(*f),
		QueryValue::String(s) => Value::String(s.clone()),
		QueryValue::Bytes(b) => Value::Array(b.iter().map(|byte| Value::from(*byte)).collect()),
		QueryValue::Timestamp(dt) => Value::String(dt.to_rfc3339()),
		QueryValue::Uuid(u) => Value::String(u.to_string()),
	}
}

fn field_term(field: &str, selector: Value) -> Value {
	let mut term = Map::new();
	term.insert(field.to_string(), selector);
	Value::Object(term)
}

fn operator_object(operator: &str, value: Value) -> Value {
	let mut selector = Map::new();
	selector.insert(operator.to_string(), value);
	Value::Object(selector)
}

/// Anchored `$regex` selector for the text operators.
///
/// The match text is escaped, so metacharacters in user input match
/// literally.
fn regex_object(field: &str, operator: FilterOperator, value: &QueryValue) -> Result<Value> {
	let QueryValue::String(text) = value else {
		return Err(QueryError::TypeMismatch(format!(
			"Cannot build a text match on {} from {:?}",
			field, value
		)));
	};
	let escaped = regex::escape(text);
	let pattern = match operator {
		FilterOperator::StartsWith => format!("^{}", escaped),
		FilterOperator::EndsWith => format!("{}$", escaped),
		_ => escaped,
	};
	Ok(operator_object("$regex", Value::String(pattern)))
}

fn predicate_term(predicate: &Predicate) -> Result<Value> {
	match predicate {
		Predicate::Compare {
			field,
			operator,
			value,
		} => {
			let selector = match operator {
				FilterOperator::Eq => query_value_to_json(value),
				FilterOperator::Ne => operator_object("$ne", query_value_to_json(value)),
				FilterOperator::Gt => operator_object("$gt", query_value_to_json(value)),
				FilterOperator::Gte => operator_object("$gte", query_value_to_json(value)),
				FilterOperator::Lt => operator_object("$lt", query_value_to_json(value)),
				FilterOperator::Lte => operator_object("$lte", query_value_to_json(value)),
				FilterOperator::Contains
				| FilterOperator::StartsWith
				| FilterOperator::EndsWith => regex_object(field, *operator, value)?,
			};
			Ok(field_term(field, selector))
		}
		Predicate::In {
			field,
			values,
			negated,
		} => {
			let list = Value::Array(values.iter().map(query_value_to_json).collect());
			let key = if *negated { "$nin" } else { "$in" };
			Ok(field_term(field, operator_object(key, list)))
		}
		Predicate::IsNull { field, negated } => {
			let selector = if *negated {
				operator_object("$ne", Value::Null)
			} else {
				Value::Null
			};
			Ok(field_term(field, selector))
		}
		Predicate::AnyOf(predicates) => {
			let mut terms = Vec::with_capacity(predicates.len());
			for nested in predicates {
				terms.push(predicate_term(nested)?);
			}
			let mut term = Map::new();
			term.insert("$or".to_string(), Value::Array(terms));
			Ok(Value::Object(term))
		}
	}
}

/// Builder that assembles one find selector from specification replays.
///
/// Field names are used bare; source aliases carry no meaning in a document
/// store and are ignored.
pub struct DocumentBuilder {
	collection: String,
	index_by: Option<String>,
	terms: Vec<Value>,
	sort: Vec<(String, SortDirection)>,
	projection: Vec<String>,
}

impl DocumentBuilder {
	pub fn new(collection: &str, index_by: Option<&str>) -> Self {
		Self {
			collection: collection.to_string(),
			index_by: index_by.map(|field| field.to_string()),
			terms: Vec::new(),
			sort: Vec::new(),
			projection: Vec::new(),
		}
	}
}

impl QueryBuilder for DocumentBuilder {
	type Compiled = DocumentQuery;

	fn apply_projection(&mut self, projection: &Projection) -> Result<()> {
		if projection.alias.is_some() {
			return Err(QueryError::Unsupported(
				"projection aliases are not supported by the document backend".to_string(),
			));
		}
		self.projection.push(projection.field.clone());
		Ok(())
	}

	fn apply_predicate(&mut self, predicate: &Predicate) -> Result<()> {
		self.terms.push(predicate_term(predicate)?);
		Ok(())
	}

	fn apply_sort(&mut self, ordering: &Ordering) -> Result<()> {
		self.sort.push((ordering.field.clone(), ordering.direction));
		Ok(())
	}

	fn apply_join(&mut self, _join: &Join) -> Result<()> {
		Err(QueryError::Unsupported(
			"joins are not supported by the document backend".to_string(),
		))
	}

	fn apply_grouping(&mut self, _grouping: &Grouping) -> Result<()> {
		Err(QueryError::Unsupported(
			"grouping is not supported by the document backend".to_string(),
		))
	}

	fn compile(mut self) -> Result<DocumentQuery> {
		let filter = match self.terms.len() {
			0 => Value::Object(Map::new()),
			1 => self.terms.pop().unwrap_or(Value::Object(Map::new())),
			_ => {
				let mut filter = Map::new();
				filter.insert("$and".to_string(), Value::Array(self.terms));
				Value::Object(filter)
			}
		};
		Ok(DocumentQuery {
			collection: self.collection,
			filter,
			sort: self.sort,
			projection: self.projection,
			index_by: self.index_by,
		})
	}
}

/// A compiled, un-paged find against one collection.
#[derive(Debug, Clone)]
pub struct DocumentQuery {
	collection: String,
	filter: Value,
	sort: Vec<(String, SortDirection)>,
	projection: Vec<String>,
	index_by: Option<String>,
}

impl DocumentQuery {
	pub fn collection(&self) -> &str {
		&self.collection
	}

	pub fn filter(&self) -> &Value {
		&self.filter
	}

	pub fn sort(&self) -> &[(String, SortDirection)] {
		&self.sort
	}

	pub fn projection(&self) -> &[String] {
		&self.projection
	}

	pub fn index_by(&self) -> Option<&str> {
		self.index_by.as_deref()
	}
}

/// Row transport between the engine and a concrete document store client.
///
/// The filter arrives in MongoDB operator form; drivers for stores with a
/// different selector dialect translate it on their side.
#[async_trait]
pub trait DocumentDriver: Send + Sync {
	/// Find documents matching the filter.
	///
	/// # Arguments
	///
	/// * `collection` - Collection to search
	/// * `filter` - Selector in MongoDB operator form
	/// * `sort` - Sort keys in application order
	/// * `projection` - Fields to include, empty for whole documents
	/// * `window` - Paging window, unbounded for the full match set
	async fn find(
		&self,
		collection: &str,
		filter: &Value,
		sort: &[(String, SortDirection)],
		projection: &[String],
		window: &PageWindow,
	) -> Result<Vec<Row>>;

	/// Count documents matching the filter within the window.
	async fn count(&self, collection: &str, filter: &Value, window: &PageWindow) -> Result<u64>;
}

/// Query engine over any document store driver.
pub struct DocumentEngine {
	driver: Arc<dyn DocumentDriver>,
}

impl DocumentEngine {
	pub fn new(driver: Arc<dyn DocumentDriver>) -> Self {
		Self { driver }
	}
}

#[async_trait]
impl QueryEngine for DocumentEngine {
	type Builder = DocumentBuilder;
	type Query = DocumentQuery;

	fn create_builder(&self, source: &str, _alias: &str, index_by: Option<&str>) -> DocumentBuilder {
		DocumentBuilder::new(source, index_by)
	}

	fn signature(&self, query: &DocumentQuery) -> QuerySignature {
		let mut text = format!("find {} filter {}", query.collection, query.filter);
		if !query.sort.is_empty() {
			let keys: Vec<String> = query
				.sort
				.iter()
				.map(|(field, direction)| match direction {
					SortDirection::Asc => format!("{} asc", field),
					SortDirection::Desc => format!("{} desc", field),
				})
				.collect();
			text.push_str(&format!(" sort [{}]", keys.join(", ")));
		}
		if !query.projection.is_empty() {
			text.push_str(&format!(" fields [{}]", query.projection.join(", ")));
		}
		if let Some(field) = &query.index_by {
			text.push_str(&format!(" index by {}", field));
		}
		QuerySignature::new(text)
	}

	async fn count(&self, query: &DocumentQuery, window: &PageWindow) -> Result<u64> {
		self.driver
			.count(&query.collection, &query.filter, window)
			.await
	}

	async fn fetch(&self, query: &DocumentQuery, window: &PageWindow) -> Result<Vec<Row>> {
		self.driver
			.find(
				&query.collection,
				&query.filter,
				&query.sort,
				&query.projection,
				window,
			)
			.await
	}

	async fn fetch_one(&self, query: &DocumentQuery) -> Result<Option<Row>> {
		let rows = self
			.driver
			.find(
				&query.collection,
				&query.filter,
				&query.sort,
				&query.projection,
				&PageWindow::new(None, Some(1)),
			)
			.await?;
		Ok(rows.into_iter().next())
	}
}
