//! The public API of the reconciliation engine.
//!
//! Each API wraps a storage backend and adds the domain rules that the backend should not have to know about.
pub mod account_api;
pub mod history_api;
pub mod matcher;
pub mod reconciliation_api;
pub mod settlement_api;
