//! Core shared types and logic for Meta Achiever
//!
//! This crate contains:
//! - Data models shared by the sync pipeline, registry and collection tracker
//! - The condition evaluator for custom meta-achievements
//! - Collection progress computation
//! - Error types
//! - The achievement data source trait (with `async` feature)

pub mod models;
pub mod condition;
pub mod collection;
pub mod error;

#[cfg(feature = "async")]
pub mod source;

pub use models::*;
pub use condition::*;
pub use collection::*;
pub use error::*;

#[cfg(feature = "async")]
pub use source::*;
