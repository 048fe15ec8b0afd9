//! SQLite backend for the pharmacy engine.
mod sqlite_impl;

pub mod db;
pub use sqlite_impl::SqliteDatabase;
