//! Transformation module.
//!
//! - Aggregator: records to per-year totals and stacked segments
//! - Joiner: records to one before/after summary per school
//! - Pipeline: loading plus both views in one call

pub mod aggregator;
pub mod joiner;
pub mod pipeline;

pub use aggregator::{aggregate_by_year, category_domain, legend, max_total, stack_segments};
pub use joiner::{available_years, join_schools, BeforePolicy, ComparisonYear, DuplicatePolicy, JoinOptions};
pub use pipeline::*;
