//! Core data models for saved posts and their download bookkeeping.

pub(crate) mod post;
mod saved_item;

pub use post::*;
pub use saved_item::*;
