//! Utility modules for tubedigest-server

pub mod db_retry;
pub mod duration;

pub use db_retry::retry_on_lock;
pub use duration::{format_duration, parse_iso8601_duration};
