//! Persistence: SQLite records and uploaded files

pub mod database;
pub mod files;

pub use database::{Database, QuotaDecision, QuotaKind};
pub use files::FileStore;
