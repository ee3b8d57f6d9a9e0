//! Core library: scanning, similarity lookup, ranking, post resolution, tag
//! fetching and organize planning.

pub mod config;
pub mod metadata;
pub mod models;
pub mod organize;
pub mod pipeline;
pub mod ranker;
pub mod resolver;
pub mod scanner;
pub mod similarity;
pub mod thumbnail;

pub use providers;
