use mpg_common::Paisa;

use crate::{
    db_types::{
        ForwardedSms,
        MerchantTransactions,
        NewPayin,
        NewPaymentRequest,
        NewPayout,
        Payin,
        PaymentRequest,
        Payout,
        Provider,
        TransactionRef,
        WithdrawRequest,
        WithdrawStatus,
    },
    traits::LedgerError,
};

/// The `TransactionStore` trait defines behaviour for creating and querying transaction records.
///
/// Nothing in this trait moves money. Status changes with ledger side effects are made through
/// [`crate::traits::LedgerDatabase`].
#[allow(async_fn_in_trait)]
pub trait TransactionStore {
    /// Creates a `pending` payin. The merchant must exist and the agent account must be registered.
    async fn create_payin(&self, payin: NewPayin) -> Result<Payin, LedgerError>;

    async fn fetch_payin(&self, id: i64) -> Result<Option<Payin>, LedgerError>;

    /// Creates a `pending` payout. The merchant must exist and the agent account must be registered.
    async fn create_payout(&self, payout: NewPayout) -> Result<Payout, LedgerError>;

    async fn fetch_payout(&self, id: i64) -> Result<Option<Payout>, LedgerError>;

    /// All pending payins into `agent_account` for exactly `amount`, oldest first.
    async fn fetch_pending_payins(&self, agent_account: &str, amount: Paisa) -> Result<Vec<Payin>, LedgerError>;

    /// All pending payouts from `agent_account` for exactly `amount`, oldest first.
    async fn fetch_pending_payouts(&self, agent_account: &str, amount: Paisa) -> Result<Vec<Payout>, LedgerError>;

    /// Finds the payin or payout that was settled with the given provider transaction id, if any.
    async fn find_transaction_by_external_id(
        &self,
        provider: Provider,
        transaction_id: &str,
    ) -> Result<Option<TransactionRef>, LedgerError>;

    async fn fetch_withdrawal(&self, id: i64) -> Result<Option<WithdrawRequest>, LedgerError>;

    /// Withdrawal requests, newest first, optionally restricted to one status.
    async fn fetch_withdrawals(&self, status: Option<WithdrawStatus>) -> Result<Vec<WithdrawRequest>, LedgerError>;

    /// Creates a `pending` payment request with a unique random reference id.
    async fn create_payment_request(&self, request: NewPaymentRequest) -> Result<PaymentRequest, LedgerError>;

    async fn fetch_payment_request(&self, id: i64) -> Result<Option<PaymentRequest>, LedgerError>;

    async fn fetch_forwarded_sms(&self, id: i64) -> Result<Option<ForwardedSms>, LedgerError>;

    /// Every forwarded SMS, newest first.
    async fn fetch_all_forwarded_sms(&self) -> Result<Vec<ForwardedSms>, LedgerError>;

    async fn fetch_merchant_transactions(&self, merchant_id: i64) -> Result<MerchantTransactions, LedgerError>;
}
