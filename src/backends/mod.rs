//! Storage engine adapters
//!
//! Each adapter implements the engine and builder capabilities for one
//! storage family. The SQL adapter compiles to dialect-rendered SELECT
//! statements; the document adapter compiles to JSON selectors.

pub mod document;
pub mod sql;
