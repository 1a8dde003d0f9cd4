//! Chronological multi-source log merger.
//!
//! Pulls timestamped entries concurrently from several independently-ordered
//! sources and emits them as a single globally sorted stream, using
//! per-source watermarks over coarse time buckets to bound buffering.

pub mod cli;
pub mod config;
pub mod merge;
pub mod pipeline;
pub mod puller;
pub mod sink;
pub mod source;
