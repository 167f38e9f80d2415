// src/lib.rs

//! Regulatory feed client library
//!
//! Fetches topics, feeds and entries from the feed API, joins them into flat
//! rows, and filters them through a lazily loaded [`pipeline::QueryPipeline`].
//! Full entry bodies are resolved from object storage on demand.

pub mod config;
pub mod error;
pub mod models;
pub mod pipeline;
pub mod services;
pub mod storage;
pub mod utils;

pub use error::{AppError, Result};
