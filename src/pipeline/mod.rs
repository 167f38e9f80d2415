//! Shaping and querying of fetched records.
//!
//! - `view::build`: flatten topics, feeds and entries into rows
//! - `QueryPipeline`: lazy, chainable filters over the cached rows
//! - `export`: JSON and CSV snapshots

pub mod export;
mod query;
pub mod view;

pub use query::{QueryPipeline, Search};
