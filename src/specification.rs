//! Ordered accumulation and replay of query operations

use crate::engine::QueryBuilder;
use crate::error::Result;
use crate::operation::{Operation, Phase};

/// Accumulated query specification.
///
/// Operations are appended by the query object's fluent methods and never
/// removed; every build replays the full list. Replay runs in a fixed phase
/// order (projections and joins, then filters and groupings, then sorts)
/// while preserving append order within each phase.
#[derive(Debug, Clone, Default)]
pub struct QuerySpec {
	operations: Vec<Operation>,
}

impl QuerySpec {
	pub fn new() -> Self {
		Self {
			operations: Vec::new(),
		}
	}

	pub fn push(&mut self, operation: Operation) {
		self.operations.push(operation);
	}

	pub fn operations(&self) -> &[Operation] {
		&self.operations
	}

	pub fn is_empty(&self) -> bool {
		self.operations.is_empty()
	}

	/// Replay every accumulated operation onto the builder.
	pub fn apply<B: QueryBuilder>(&self, builder: &mut B) -> Result<()> {
		for phase in [Phase::Select, Phase::Filter, Phase::Order] {
			for operation in self.operations.iter().filter(|op| op.phase() == phase) {
				match operation {
					Operation::Select(projection) => builder.apply_projection(projection)?,
					Operation::Join(join) => builder.apply_join(join)?,
					Operation::Filter(predicate) => builder.apply_predicate(predicate)?,
					Operation::Group(grouping) => builder.apply_grouping(grouping)?,
					Operation::Order(ordering) => builder.apply_sort(ordering)?,
				}
			}
		}
		Ok(())
	}
}
