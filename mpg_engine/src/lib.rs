//! Mobile-money Payment Gateway engine
//!
//! The engine reconciles the SMS notifications that bKash and Nagad send to agent handsets against the payins and
//! payouts that merchants have requested, and keeps the merchant and agent ledgers in step with every settlement.
//!
//! The library is divided into three main sections:
//! 1. Pure domain logic: the SMS parser and commission calculator ([`mod@helpers`]), the status lifecycles
//!    ([`mod@status_machine`]) and the ledger arithmetic ([`mod@ledger`]). None of these touch storage.
//! 2. Storage contracts ([`mod@traits`]) and the SQLite backend. Backends apply every settlement as a single atomic
//!    database transaction.
//! 3. The engine public API ([`AccountApi`], [`HistoryApi`], [`SettlementApi`] and [`ReconciliationApi`]), which is what
//!    the HTTP server talks to.
pub mod db_types;
pub mod helpers;
pub mod ledger;
pub mod status_machine;
pub mod traits;

mod mpe_api;
#[cfg(feature = "sqlite")]
mod sqlite;

#[cfg(any(feature = "test_utils", test))]
pub mod test_utils;

pub use mpe_api::{
    account_api::AccountApi,
    history_api::HistoryApi,
    matcher::{candidate_accounts, select_candidate, MatchCandidate, MatchResult, MatchWindow, TransactionMatcher},
    reconciliation_api::{ReconciliationApi, SmsForward, SmsOutcome, SMS_SETTLEMENT_AGENT},
    settlement_api::{SettlementApi, SettlementConfig},
};
#[cfg(feature = "sqlite")]
pub use sqlite::SqliteDatabase;
pub use traits::{LedgerDatabase, LedgerError, MerchantManagement, TransactionStore};
