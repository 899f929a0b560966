use std::fmt::Debug;

use crate::{
    db_types::{ForwardedSms, MerchantTransactions, Payin, PaymentRequest, Payout, WithdrawRequest, WithdrawStatus},
    traits::{LedgerError, TransactionStore},
};

/// Read-only access to transaction records for the admin and merchant dashboards.
pub struct HistoryApi<B> {
    db: B,
}

impl<B> Debug for HistoryApi<B> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "HistoryApi")
    }
}

impl<B> HistoryApi<B> {
    pub fn new(db: B) -> Self {
        Self { db }
    }
}

impl<B> HistoryApi<B>
where B: TransactionStore
{
    pub async fn payin(&self, id: i64) -> Result<Payin, LedgerError> {
        self.db.fetch_payin(id).await?.ok_or_else(|| LedgerError::TransactionNotFound(format!("Payin #{id}")))
    }

    pub async fn payout(&self, id: i64) -> Result<Payout, LedgerError> {
        self.db.fetch_payout(id).await?.ok_or_else(|| LedgerError::TransactionNotFound(format!("Payout #{id}")))
    }

    pub async fn payment_request(&self, id: i64) -> Result<PaymentRequest, LedgerError> {
        self.db
            .fetch_payment_request(id)
            .await?
            .ok_or_else(|| LedgerError::TransactionNotFound(format!("Payment request #{id}")))
    }

    /// All withdrawal requests, newest first, optionally only those with the given status.
    pub async fn withdrawals(&self, status: Option<WithdrawStatus>) -> Result<Vec<WithdrawRequest>, LedgerError> {
        self.db.fetch_withdrawals(status).await
    }

    pub async fn forwarded_sms(&self) -> Result<Vec<ForwardedSms>, LedgerError> {
        self.db.fetch_all_forwarded_sms().await
    }

    pub async fn merchant_transactions(&self, merchant_id: i64) -> Result<MerchantTransactions, LedgerError> {
        self.db.fetch_merchant_transactions(merchant_id).await
    }
}
