//! # Storage contracts
//!
//! This module defines the interfaces that payment gateway database *backends* must provide.
//!
//! * [`MerchantManagement`] onboards and configures merchants and agents, and owns the agent account index.
//! * [`TransactionStore`] creates and queries payins, payouts, withdrawals, payment requests and forwarded SMS.
//! * [`LedgerDatabase`] defines the highest level of behaviour: status changes that move money, applied atomically.
mod ledger_database;
mod merchant_management;
mod transaction_store;

pub use ledger_database::{LedgerDatabase, LedgerError};
pub use merchant_management::MerchantManagement;
pub use transaction_store::TransactionStore;
