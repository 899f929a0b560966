use mpg_common::Paisa;
use thiserror::Error;

use crate::{
    db_types::{
        CommissionRateError,
        ForwardedSms,
        ForwardedSmsStatus,
        NewForwardedSms,
        NewWithdrawRequest,
        PayinStatus,
        PaymentDetailsError,
        PaymentRequest,
        PaymentRequestStatus,
        Payin,
        Payout,
        PayoutStatus,
        SettlementEvidence,
        WithdrawRequest,
    },
    status_machine::InvalidTransition,
    traits::{MerchantManagement, TransactionStore},
};

#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum LedgerError {
    #[error("{0}")]
    InvalidTransition(#[from] InvalidTransition),
    #[error("Insufficient balance. {requested} was requested, but only {available} is available above the minimum balance")]
    InsufficientBalance { available: Paisa, requested: Paisa },
    #[error("The ledger update could not be completed and was rolled back. {0}")]
    InconsistentLedgerWrite(String),
    #[error("Merchant #{0} does not exist")]
    MerchantNotFound(i64),
    #[error("Agent #{0} does not exist")]
    AgentNotFound(i64),
    #[error("No agent account is registered for {0}")]
    AgentAccountNotFound(String),
    #[error("{0} does not exist")]
    TransactionNotFound(String),
    #[error("Invalid commission rate. {0}")]
    InvalidCommissionRate(String),
    #[error("Invalid amount. {0}")]
    InvalidAmount(String),
    #[error("{0}")]
    InvalidPaymentDetails(#[from] PaymentDetailsError),
    #[error("Invalid request. {0}")]
    InvalidRequest(String),
    #[error("Duplicate reference. {0}")]
    DuplicateReference(String),
    #[error("Database error: {0}")]
    DatabaseError(String),
}

impl From<sqlx::Error> for LedgerError {
    fn from(e: sqlx::Error) -> Self {
        match e.as_database_error() {
            Some(db_err) if db_err.is_unique_violation() => LedgerError::DuplicateReference(db_err.message().to_string()),
            _ => LedgerError::DatabaseError(e.to_string()),
        }
    }
}

impl From<CommissionRateError> for LedgerError {
    fn from(e: CommissionRateError) -> Self {
        LedgerError::InvalidCommissionRate(e.to_string())
    }
}

/// This trait defines the highest level of behaviour for backends supporting the payment gateway ledger.
///
/// Every method that changes a status does so with a compare-and-set against the record's current state, and applies
/// the ledger consequences of the change (see [`crate::ledger`]) in the same atomic database transaction. If any part of
/// a settlement fails, nothing is committed: the record keeps its prior status and no balance changes.
///
/// Callers are expected to consult [`crate::status_machine`] before calling these methods. Backends still report
/// [`LedgerError::InvalidTransition`] if the record is no longer in the state the caller saw, e.g. because a concurrent
/// request settled it first.
#[allow(async_fn_in_trait)]
pub trait LedgerDatabase: Clone + MerchantManagement + TransactionStore {
    /// The URL of the database
    fn url(&self) -> &str;

    /// Moves a pending payin to `completed` and settles it.
    ///
    /// * The payin's received amount, payer account and transaction id are filled in from `evidence`.
    /// * The merchant, the agent operating the payin's agent account, and the agent account counters are updated.
    /// * The deposit commission is appended to the merchant's gateway cost history.
    async fn complete_payin(&self, id: i64, evidence: SettlementEvidence) -> Result<Payin, LedgerError>;

    /// Moves a pending payin to a terminal status without any ledger effect (`rejected`, `expired` or `cancelled`).
    async fn close_payin(&self, id: i64, status: PayinStatus, update_by: Option<String>) -> Result<Payin, LedgerError>;

    /// Moves a pending payout to `success` and settles it.
    async fn complete_payout(&self, id: i64, evidence: SettlementEvidence) -> Result<Payout, LedgerError>;

    /// Moves a pending payout to `rejected` or `reassigned`. No ledger effect.
    async fn close_payout(&self, id: i64, status: PayoutStatus, update_by: Option<String>)
        -> Result<Payout, LedgerError>;

    /// Reserves the withdrawal amount from the merchant balance and records a pending withdrawal request.
    ///
    /// Fails with [`LedgerError::InsufficientBalance`] if the balance would drop below `floor`, in which case nothing
    /// is changed.
    async fn reserve_withdrawal(
        &self,
        request: NewWithdrawRequest,
        floor: Paisa,
    ) -> Result<WithdrawRequest, LedgerError>;

    /// Records the admin's approval of a pending withdrawal. The funds were already reserved.
    async fn approve_withdrawal(&self, id: i64) -> Result<WithdrawRequest, LedgerError>;

    /// Rejects a pending withdrawal and returns the reserved amount to the merchant.
    async fn reject_withdrawal(&self, id: i64) -> Result<WithdrawRequest, LedgerError>;

    /// Moves a pending payment request to `completed` and credits the merchant with its amount.
    async fn complete_payment_request(&self, id: i64) -> Result<PaymentRequest, LedgerError>;

    /// Moves a pending payment request to `failed` or `cancelled`. No ledger effect.
    async fn close_payment_request(
        &self,
        id: i64,
        status: PaymentRequestStatus,
    ) -> Result<PaymentRequest, LedgerError>;

    /// Stores an SMS for manual reconciliation.
    ///
    /// The call is idempotent on the provider transaction id: forwarding the same notification twice returns the
    /// original record, with `false` in the second element.
    async fn insert_forwarded_sms(&self, sms: NewForwardedSms) -> Result<(ForwardedSms, bool), LedgerError>;

    async fn update_forwarded_sms_status(
        &self,
        id: i64,
        status: ForwardedSmsStatus,
    ) -> Result<ForwardedSms, LedgerError>;

    /// Drains and closes all database connections.
    async fn close(&mut self) -> Result<(), LedgerError> {
        Ok(())
    }
}
