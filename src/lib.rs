//! # Saved Media
//!
//! Downloads media linked from a user's saved posts, plus a bulk
//! downloader for plain link lists.
//!
//! ## Architecture
//!
//! - **models**: Posts and per-post download bookkeeping
//! - **naming**: File-system-safe names from post metadata
//! - **strategy**: Per-host download strategies and the dispatcher
//! - **fetch**: HTTP fetching and unique file placement
//! - **batch**: Sequential batch runner and report
//! - **source**: Where saved posts come from
//! - **links**: Link list and CSV downloads
//! - **config**: Configuration loading and validation

pub mod batch;
pub mod config;
pub mod fetch;
pub mod links;
pub mod models;
pub mod naming;
pub mod source;
pub mod strategy;

pub use models::*;
