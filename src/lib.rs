pub mod analysis;
pub mod analysis_result;
pub mod config;
pub mod error;
pub mod field;
pub mod file_reader;
pub mod output;
pub mod reader;

pub use analysis::aggregator::{AggregationResult, aggregate};
pub use analysis::comparator::{ComparisonResult, compare_fields};
pub use analysis::extractor::{extract_document, extract_fields};
pub use analysis::filter::{FilterCondition, matches, select_files};
pub use analysis::merger::{MergedFieldNode, merge_fields};
pub use analysis::tree::{TreeNode, build_tree};
pub use error::FieldScopeError;
pub use field::{FieldRecord, FileFieldSet, remove_prefix_from_name, remove_prefix_from_path};
