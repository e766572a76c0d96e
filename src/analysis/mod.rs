//! Cross-document field analysis: extraction, tree rebuilding, comparison, aggregation,
//! merging and file selection. Everything here is a pure function of its inputs.

pub mod aggregator;
pub mod comparator;
pub mod extractor;
pub mod filter;
pub mod merger;
pub mod tree;
