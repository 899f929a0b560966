//! SQLite backend for the gateway ledger.
mod sqlite_impl;

pub mod db;
pub use sqlite_impl::SqliteDatabase;
