//! # TubeDigest Common Library
//!
//! Shared code for the TubeDigest service and tools:
//! - Error type used across crates
//! - Configuration loading and data folder resolution
//! - Database initialization and schema
//! - Event types and the broadcast EventBus

pub mod config;
pub mod db;
pub mod error;
pub mod events;

pub use error::{Error, Result};
