//! SQL adapter with dialect support
//!
//! Compiles specification operations into SeaQuery SELECT statements and
//! renders them per dialect. The paging window never enters the compiled
//! statement; it is applied to a clone at execution time. Counts re-derive
//! from the compiled statement by wrapping it in a COUNT(*) sub-select, so
//! joins, grouping, and filters all stay in effect.

use std::collections::HashSet;
use std::sync::Arc;

use async_trait::async_trait;
use sea_query::{
	Alias, Asterisk, Condition, Expr, ExprTrait, Func, JoinType, MysqlQueryBuilder, Order,
	PostgresQueryBuilder, Query, SelectStatement, SqliteQueryBuilder, Value,
};

use crate::engine::{PageWindow, QueryBuilder, QueryEngine, QuerySignature};
use crate::error::{QueryError, Result};
use crate::operation::{
	FilterOperator, Grouping, Join, JoinKind, Ordering, Predicate, Projection, SortDirection,
};
use crate::value::{QueryValue, Row};

/// Supported SQL dialects.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SqlDialect {
	Postgres,
	Mysql,
	Sqlite,
}

/// Convert QueryValue to SeaQuery Value
fn query_value_to_sea_value(qv: &QueryValue) -> Value {
	match qv {
		// BigInt(None) is used for generic NULL values across all dialects
		QueryValue::Null => Value::BigInt(None),
		QueryValue::Bool(b) => Value::Bool(Some(*b)),
		QueryValue::Int(i) => Value::BigInt(Some(*i)),
		QueryValue::Float(f) => Value::Double(Some(*f)),
		QueryValue::String(s) => Value::String(Some(s.clone())),
		QueryValue::Bytes(b) => Value::Bytes(Some(b.clone())),
		QueryValue::Timestamp(dt) => Value::ChronoDateTimeUtc(Some(*dt)),
		QueryValue::Uuid(u) => Value::Uuid(Some(*u)),
	}
}

fn render(statement: &SelectStatement, dialect: SqlDialect) -> String {
	match dialect {
		SqlDialect::Postgres => statement.to_string(PostgresQueryBuilder),
		SqlDialect::Mysql => statement.to_string(MysqlQueryBuilder),
		SqlDialect::Sqlite => statement.to_string(SqliteQueryBuilder),
	}
}

fn like_text(field: &str, value: &QueryValue) -> Result<String> {
	match value {
		QueryValue::String(text) => Ok(text.clone()),
		other => Err(QueryError::TypeMismatch(format!(
			"Cannot build a text match on {} from {:?}",
			field, other
		))),
	}
}

/// Builder that assembles one SELECT statement from specification replays.
///
/// Fields without a dot are qualified with the source alias; a dotted field
/// is taken as an already-qualified `alias.column` reference.
pub struct SqlBuilder {
	dialect: SqlDialect,
	source_alias: String,
	index_by: Option<String>,
	statement: SelectStatement,
	aliases: HashSet<String>,
	projected: bool,
	params: Vec<QueryValue>,
}

impl SqlBuilder {
	pub fn new(dialect: SqlDialect, source: &str, alias: &str, index_by: Option<&str>) -> Self {
		let statement = Query::select()
			.from_as(Alias::new(source), Alias::new(alias))
			.to_owned();
		let mut aliases = HashSet::new();
		aliases.insert(alias.to_string());
		Self {
			dialect,
			source_alias: alias.to_string(),
			index_by: index_by.map(|field| field.to_string()),
			statement,
			aliases,
			projected: false,
			params: Vec::new(),
		}
	}

	/// Direct access to the statement, for custom query construction.
	pub fn statement(&mut self) -> &mut SelectStatement {
		&mut self.statement
	}

	fn column_ref(&self, field: &str) -> (Alias, Alias) {
		match field.split_once('.') {
			Some((table, column)) => (Alias::new(table), Alias::new(column)),
			None => (Alias::new(&self.source_alias), Alias::new(field)),
		}
	}

	fn compare_expr(
		&mut self,
		field: &str,
		operator: FilterOperator,
		value: &QueryValue,
	) -> Result<Expr> {
		let column = Expr::col(self.column_ref(field));
		if matches!(value, QueryValue::Null) {
			return match operator {
				FilterOperator::Eq => Ok(column.is_null()),
				FilterOperator::Ne => Ok(column.is_not_null()),
				other => Err(QueryError::TypeMismatch(format!(
					"Cannot compare {} to NULL with {:?}",
					field, other
				))),
			};
		}
		let expr = match operator {
			FilterOperator::Eq => {
				self.params.push(value.clone());
				column.eq(Expr::val(query_value_to_sea_value(value)))
			}
			FilterOperator::Ne => {
				self.params.push(value.clone());
				column.ne(Expr::val(query_value_to_sea_value(value)))
			}
			FilterOperator::Gt => {
				self.params.push(value.clone());
				column.gt(Expr::val(query_value_to_sea_value(value)))
			}
			FilterOperator::Gte => {
				self.params.push(value.clone());
				column.gte(Expr::val(query_value_to_sea_value(value)))
			}
			FilterOperator::Lt => {
				self.params.push(value.clone());
				column.lt(Expr::val(query_value_to_sea_value(value)))
			}
			FilterOperator::Lte => {
				self.params.push(value.clone());
				column.lte(Expr::val(query_value_to_sea_value(value)))
			}
			FilterOperator::Contains => {
				let pattern = format!("%{}%", like_text(field, value)?);
				self.params.push(QueryValue::String(pattern.clone()));
				column.like(pattern)
			}
			FilterOperator::StartsWith => {
				let pattern = format!("{}%", like_text(field, value)?);
				self.params.push(QueryValue::String(pattern.clone()));
				column.like(pattern)
			}
			FilterOperator::EndsWith => {
				let pattern = format!("%{}", like_text(field, value)?);
				self.params.push(QueryValue::String(pattern.clone()));
				column.like(pattern)
			}
		};
		Ok(expr)
	}

	fn predicate_condition(&mut self, predicate: &Predicate) -> Result<Condition> {
		match predicate {
			Predicate::Compare {
				field,
				operator,
				value,
			} => {
				let expr = self.compare_expr(field, *operator, value)?;
				Ok(Condition::all().add(expr))
			}
			Predicate::In {
				field,
				values,
				negated,
			} => {
				let exprs: Vec<Expr> = values
					.iter()
					.map(|value| Expr::val(query_value_to_sea_value(value)))
					.collect();
				for value in values {
					self.params.push(value.clone());
				}
				let column = Expr::col(self.column_ref(field));
				let expr = if *negated {
					column.is_not_in(exprs)
				} else {
					column.is_in(exprs)
				};
				Ok(Condition::all().add(expr))
			}
			Predicate::IsNull { field, negated } => {
				let column = Expr::col(self.column_ref(field));
				let expr = if *negated {
					column.is_not_null()
				} else {
					column.is_null()
				};
				Ok(Condition::all().add(expr))
			}
			Predicate::AnyOf(predicates) => {
				let mut cond = Condition::any();
				for nested in predicates {
					cond = cond.add(self.predicate_condition(nested)?);
				}
				Ok(cond)
			}
		}
	}
}

impl QueryBuilder for SqlBuilder {
	type Compiled = SqlQuery;

	fn apply_projection(&mut self, projection: &Projection) -> Result<()> {
		let column = self.column_ref(&projection.field);
		match &projection.alias {
			Some(alias) => {
				self.statement.expr_as(Expr::col(column), Alias::new(alias));
			}
			None => {
				self.statement.column(column);
			}
		}
		self.projected = true;
		Ok(())
	}

	fn apply_predicate(&mut self, predicate: &Predicate) -> Result<()> {
		let condition = self.predicate_condition(predicate)?;
		self.statement.cond_where(condition);
		Ok(())
	}

	fn apply_sort(&mut self, ordering: &Ordering) -> Result<()> {
		let column = self.column_ref(&ordering.field);
		let order = match ordering.direction {
			SortDirection::Asc => Order::Asc,
			SortDirection::Desc => Order::Desc,
		};
		self.statement.order_by(column, order);
		Ok(())
	}

	fn apply_join(&mut self, join: &Join) -> Result<()> {
		if self.aliases.contains(&join.alias) {
			return Ok(());
		}
		let kind = match join.kind {
			JoinKind::Inner => JoinType::InnerJoin,
			JoinKind::Left => JoinType::LeftJoin,
		};
		let on = Expr::col((Alias::new(&join.alias), Alias::new(&join.on.foreign)))
			.equals(self.column_ref(&join.on.local));
		self.statement
			.join_as(kind, Alias::new(&join.target), Alias::new(&join.alias), on);
		self.aliases.insert(join.alias.clone());
		Ok(())
	}

	fn apply_grouping(&mut self, grouping: &Grouping) -> Result<()> {
		let column = self.column_ref(&grouping.field);
		if let Some(alias) = &grouping.select_alias {
			self.statement
				.expr_as(Expr::col(column.clone()), Alias::new(alias));
			self.projected = true;
		}
		self.statement.group_by_col(column);
		Ok(())
	}

	fn compile(mut self) -> Result<SqlQuery> {
		if !self.projected {
			self.statement
				.column((Alias::new(&self.source_alias), Asterisk));
		}
		let sql = render(&self.statement, self.dialect);
		Ok(SqlQuery {
			statement: self.statement,
			dialect: self.dialect,
			index_by: self.index_by,
			sql,
			params: self.params,
		})
	}
}

/// A compiled, un-paged SELECT with its rendered SQL and parameter list.
#[derive(Debug, Clone)]
pub struct SqlQuery {
	statement: SelectStatement,
	dialect: SqlDialect,
	index_by: Option<String>,
	sql: String,
	params: Vec<QueryValue>,
}

impl SqlQuery {
	pub fn sql(&self) -> &str {
		&self.sql
	}

	pub fn params(&self) -> &[QueryValue] {
		&self.params
	}

	pub fn index_by(&self) -> Option<&str> {
		self.index_by.as_deref()
	}

	fn windowed_statement(&self, window: &PageWindow) -> SelectStatement {
		let mut statement = self.statement.clone();
		if let Some(limit) = window.limit {
			statement.limit(limit);
		}
		if let Some(offset) = window.offset {
			statement.offset(offset);
		}
		statement
	}

	/// Render the statement with the window applied.
	pub fn windowed_sql(&self, window: &PageWindow) -> String {
		render(&self.windowed_statement(window), self.dialect)
	}
}

/// Row transport between the engine and a concrete connection pool.
#[async_trait]
pub trait SqlDriver: Send + Sync {
	async fn fetch_all(&self, sql: &str, params: Vec<QueryValue>) -> Result<Vec<Row>>;

	async fn fetch_optional(&self, sql: &str, params: Vec<QueryValue>) -> Result<Option<Row>>;
}

/// Query engine over any SQL driver.
pub struct SqlEngine {
	driver: Arc<dyn SqlDriver>,
	dialect: SqlDialect,
}

impl SqlEngine {
	pub fn new(driver: Arc<dyn SqlDriver>, dialect: SqlDialect) -> Self {
		Self { driver, dialect }
	}

	pub fn dialect(&self) -> SqlDialect {
		self.dialect
	}
}

#[async_trait]
impl QueryEngine for SqlEngine {
	type Builder = SqlBuilder;
	type Query = SqlQuery;

	fn create_builder(&self, source: &str, alias: &str, index_by: Option<&str>) -> SqlBuilder {
		SqlBuilder::new(self.dialect, source, alias, index_by)
	}

	fn signature(&self, query: &SqlQuery) -> QuerySignature {
		match &query.index_by {
			Some(field) => QuerySignature::new(format!("{} INDEX BY {}", query.sql, field)),
			None => QuerySignature::new(query.sql.clone()),
		}
	}

	async fn count(&self, query: &SqlQuery, window: &PageWindow) -> Result<u64> {
		let statement = Query::select()
			.expr_as(
				Func::count(Expr::asterisk()),
				Alias::new("count"),
			)
			.from_subquery(query.windowed_statement(window), Alias::new("matched"))
			.to_owned();
		let sql = render(&statement, self.dialect);
		let row = self
			.driver
			.fetch_optional(&sql, query.params.clone())
			.await?
			.ok_or_else(|| QueryError::Engine("count query returned no row".to_string()))?;
		let count: i64 = row.get("count")?;
		if count < 0 {
			return Err(QueryError::TypeMismatch(format!(
				"Cannot use negative count {}",
				count
			)));
		}
		Ok(count as u64)
	}

	async fn fetch(&self, query: &SqlQuery, window: &PageWindow) -> Result<Vec<Row>> {
		let sql = query.windowed_sql(window);
		self.driver.fetch_all(&sql, query.params.clone()).await
	}

	async fn fetch_one(&self, query: &SqlQuery) -> Result<Option<Row>> {
		let sql = query.windowed_sql(&PageWindow::new(None, Some(1)));
		self.driver.fetch_optional(&sql, query.params.clone()).await
	}
}
