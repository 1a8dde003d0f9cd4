pub mod bucket;
pub mod runner;

pub use bucket::BucketMerger;
pub use runner::{run_merger, MergeStats, MergerError};
