//! Meta Achiever backend
//!
//! Provides:
//! - SQLite storage for libraries, custom achievements and collections
//! - Steam Web API client and the library sync pipeline
//! - Community sharing and importing of achievements
//! - Collection progress tracking and the activity feed

pub mod config;
pub mod db;
pub mod definitions;
pub mod error;
pub mod registry;
pub mod steam_api;
pub mod sync;
pub mod tracker;
