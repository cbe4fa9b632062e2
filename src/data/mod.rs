//! Data layer module
//!
//! Handles all data persistence and caching:
//! - SQLite database operations
//! - Activity cache (volatile)
//! - Embed info cache (volatile)

mod cache;
mod database;
mod models;

pub use cache::{ActivityCache, EmbedInfo, EmbedInfoCache};
pub use database::Database;
pub use models::*;
