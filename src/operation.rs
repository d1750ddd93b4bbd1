//! Deferred query-construction operations
//!
//! Every mutation a query object accumulates is stored as one of these
//! descriptor values and replayed onto a backend builder at build time.
//! Descriptors are immutable once appended and carry no backend-specific
//! state.

use serde::{Deserialize, Serialize};

use crate::value::QueryValue;

/// Scalar comparison operators for [`Predicate::Compare`]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum FilterOperator {
	Eq,
	Ne,
	Gt,
	Gte,
	Lt,
	Lte,
	Contains,
	StartsWith,
	EndsWith,
}

/// Filter condition applied to matching records
#[derive(Debug, Clone, PartialEq)]
pub enum Predicate {
	/// Compare one field against a scalar value
	Compare {
		field: String,
		operator: FilterOperator,
		value: QueryValue,
	},
	/// Membership test against a value list
	In {
		field: String,
		values: Vec<QueryValue>,
		negated: bool,
	},
	/// Null test
	IsNull { field: String, negated: bool },
	/// Disjunction of sub-predicates
	AnyOf(Vec<Predicate>),
}

impl Predicate {
	pub fn compare(
		field: impl Into<String>,
		operator: FilterOperator,
		value: impl Into<QueryValue>,
	) -> Self {
		Predicate::Compare {
			field: field.into(),
			operator,
			value: value.into(),
		}
	}

	pub fn eq(field: impl Into<String>, value: impl Into<QueryValue>) -> Self {
		Self::compare(field, FilterOperator::Eq, value)
	}

	pub fn ne(field: impl Into<String>, value: impl Into<QueryValue>) -> Self {
		Self::compare(field, FilterOperator::Ne, value)
	}

	pub fn gt(field: impl Into<String>, value: impl Into<QueryValue>) -> Self {
		Self::compare(field, FilterOperator::Gt, value)
	}

	pub fn gte(field: impl Into<String>, value: impl Into<QueryValue>) -> Self {
		Self::compare(field, FilterOperator::Gte, value)
	}

	pub fn lt(field: impl Into<String>, value: impl Into<QueryValue>) -> Self {
		Self::compare(field, FilterOperator::Lt, value)
	}

	pub fn lte(field: impl Into<String>, value: impl Into<QueryValue>) -> Self {
		Self::compare(field, FilterOperator::Lte, value)
	}

	pub fn contains(field: impl Into<String>, value: impl Into<QueryValue>) -> Self {
		Self::compare(field, FilterOperator::Contains, value)
	}

	pub fn starts_with(field: impl Into<String>, value: impl Into<QueryValue>) -> Self {
		Self::compare(field, FilterOperator::StartsWith, value)
	}

	pub fn ends_with(field: impl Into<String>, value: impl Into<QueryValue>) -> Self {
		Self::compare(field, FilterOperator::EndsWith, value)
	}

	pub fn is_in(field: impl Into<String>, values: Vec<QueryValue>) -> Self {
		Predicate::In {
			field: field.into(),
			values,
			negated: false,
		}
	}

	pub fn not_in(field: impl Into<String>, values: Vec<QueryValue>) -> Self {
		Predicate::In {
			field: field.into(),
			values,
			negated: true,
		}
	}

	pub fn is_null(field: impl Into<String>) -> Self {
		Predicate::IsNull {
			field: field.into(),
			negated: false,
		}
	}

	pub fn is_not_null(field: impl Into<String>) -> Self {
		Predicate::IsNull {
			field: field.into(),
			negated: true,
		}
	}

	pub fn any_of(predicates: Vec<Predicate>) -> Self {
		Predicate::AnyOf(predicates)
	}
}

/// Sort direction for [`Ordering`]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum SortDirection {
	Asc,
	Desc,
}

/// Sort applied to matching records
#[derive(Debug, Clone, PartialEq)]
pub struct Ordering {
	pub field: String,
	pub direction: SortDirection,
}

impl Ordering {
	pub fn new(field: impl Into<String>, direction: SortDirection) -> Self {
		Self {
			field: field.into(),
			direction,
		}
	}
}

/// Projected field, optionally renamed in the output row
#[derive(Debug, Clone, PartialEq)]
pub struct Projection {
	pub field: String,
	pub alias: Option<String>,
}

impl Projection {
	pub fn new(field: impl Into<String>) -> Self {
		Self {
			field: field.into(),
			alias: None,
		}
	}

	pub fn aliased(field: impl Into<String>, alias: impl Into<String>) -> Self {
		Self {
			field: field.into(),
			alias: Some(alias.into()),
		}
	}
}

/// Join flavor
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum JoinKind {
	Inner,
	Left,
}

/// Column pairing a join matches on: `alias.foreign = source.local`
#[derive(Debug, Clone, PartialEq)]
pub struct JoinOn {
	pub local: String,
	pub foreign: String,
}

impl JoinOn {
	pub fn new(local: impl Into<String>, foreign: impl Into<String>) -> Self {
		Self {
			local: local.into(),
			foreign: foreign.into(),
		}
	}
}

/// Join against another source under a fresh alias
#[derive(Debug, Clone, PartialEq)]
pub struct Join {
	pub kind: JoinKind,
	pub target: String,
	pub alias: String,
	pub on: JoinOn,
}

impl Join {
	pub fn new(
		kind: JoinKind,
		target: impl Into<String>,
		alias: impl Into<String>,
		on: JoinOn,
	) -> Self {
		Self {
			kind,
			target: target.into(),
			alias: alias.into(),
			on,
		}
	}
}

/// Group records by a field, optionally projecting the grouped column
#[derive(Debug, Clone, PartialEq)]
pub struct Grouping {
	pub field: String,
	pub select_alias: Option<String>,
}

impl Grouping {
	pub fn new(field: impl Into<String>) -> Self {
		Self {
			field: field.into(),
			select_alias: None,
		}
	}

	pub fn aliased(field: impl Into<String>, select_alias: impl Into<String>) -> Self {
		Self {
			field: field.into(),
			select_alias: Some(select_alias.into()),
		}
	}
}

/// One deferred unit of query construction
#[derive(Debug, Clone, PartialEq)]
pub enum Operation {
	Select(Projection),
	Join(Join),
	Filter(Predicate),
	Group(Grouping),
	Order(Ordering),
}

/// Replay phase an operation belongs to.
///
/// Joins replay with the projections and groupings replay with the filters;
/// this keeps the relative order a caller appended them in within each phase.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Phase {
	Select,
	Filter,
	Order,
}

impl Operation {
	pub(crate) fn phase(&self) -> Phase {
		match self {
			Operation::Select(_) | Operation::Join(_) => Phase::Select,
			Operation::Filter(_) | Operation::Group(_) => Phase::Filter,
			Operation::Order(_) => Phase::Order,
		}
	}
}
