//! Assembly of the grouped, sorted catalog tree from search records.

mod builder;


pub use builder::{build_tree, describe, BuildSummary, TreeBuilder};
