use std::fmt::Debug;

use log::*;
use mpg_common::Paisa;

use crate::{
    db_types::{
        ForwardedSms,
        ForwardedSmsStatus,
        NewPayin,
        NewPaymentRequest,
        NewPayout,
        NewWithdrawRequest,
        Payin,
        PayinStatus,
        PaymentDetails,
        PaymentRequest,
        PaymentRequestStatus,
        Payout,
        PayoutStatus,
        SettlementEvidence,
        WithdrawRequest,
        WithdrawStatus,
    },
    status_machine::{transition, LedgerEffect, Lifecycle},
    traits::{LedgerDatabase, LedgerError},
};

/// Ledger limits, fixed at start-up.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SettlementConfig {
    /// A withdrawal may never leave the merchant with less than this.
    pub minimum_balance: Paisa,
    /// The smallest withdrawal a merchant may request.
    pub minimum_withdrawal: Paisa,
}

impl Default for SettlementConfig {
    fn default() -> Self {
        Self { minimum_balance: Paisa::from_taka(50_000), minimum_withdrawal: Paisa::from_taka(1_000) }
    }
}

/// `SettlementApi` drives every status change that can move money: admin decisions on payins, payouts, withdrawals and
/// payment requests, and merchant withdrawal requests.
///
/// Every requested change is checked against the status lifecycle before the backend is asked to do anything. Asking
/// for the status a record already has returns the record untouched.
pub struct SettlementApi<B> {
    db: B,
    config: SettlementConfig,
}

impl<B> Debug for SettlementApi<B> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "SettlementApi ({:?})", self.config)
    }
}

impl<B> SettlementApi<B> {
    pub fn new(db: B, config: SettlementConfig) -> Self {
        Self { db, config }
    }

    pub fn config(&self) -> &SettlementConfig {
        &self.config
    }

    pub fn db(&self) -> &B {
        &self.db
    }
}

fn positive(amount: Paisa, what: &str) -> Result<(), LedgerError> {
    if amount.is_negative() || amount.is_zero() {
        Err(LedgerError::InvalidAmount(format!("The {what} amount must be positive, but was {amount}")))
    } else {
        Ok(())
    }
}

impl<B> SettlementApi<B>
where B: LedgerDatabase
{
    pub async fn create_payin(&self, payin: NewPayin) -> Result<Payin, LedgerError> {
        positive(payin.expected_amount, "payin")?;
        self.db.create_payin(payin).await
    }

    pub async fn create_payout(&self, payout: NewPayout) -> Result<Payout, LedgerError> {
        positive(payout.request_amount, "payout")?;
        self.db.create_payout(payout).await
    }

    pub async fn create_payment_request(&self, request: NewPaymentRequest) -> Result<PaymentRequest, LedgerError> {
        positive(request.amount, "payment request")?;
        self.db.create_payment_request(request).await
    }

    /// Moves a payin out of `pending`. Completing it settles the ledger.
    pub async fn update_payin_status(
        &self,
        id: i64,
        status: PayinStatus,
        update_by: Option<String>,
    ) -> Result<Payin, LedgerError> {
        let payin = self.db.fetch_payin(id).await?.ok_or_else(|| LedgerError::TransactionNotFound(format!("Payin #{id}")))?;
        if !needs_change(payin.status, status)? {
            return Ok(payin);
        }
        match status.effect() {
            LedgerEffect::Settle => self.db.complete_payin(id, SettlementEvidence::by_admin(update_by)).await,
            _ => self.db.close_payin(id, status, update_by).await,
        }
    }

    /// Moves a payout out of `pending`. A successful payout settles the ledger.
    pub async fn update_payout_status(
        &self,
        id: i64,
        status: PayoutStatus,
        update_by: Option<String>,
    ) -> Result<Payout, LedgerError> {
        let payout =
            self.db.fetch_payout(id).await?.ok_or_else(|| LedgerError::TransactionNotFound(format!("Payout #{id}")))?;
        if !needs_change(payout.status, status)? {
            return Ok(payout);
        }
        match status.effect() {
            LedgerEffect::Settle => self.db.complete_payout(id, SettlementEvidence::by_admin(update_by)).await,
            _ => self.db.close_payout(id, status, update_by).await,
        }
    }

    /// Reserves the withdrawal amount from the merchant's balance and records the request as `pending`.
    pub async fn request_withdrawal(
        &self,
        merchant_id: i64,
        amount: Paisa,
        payment_details: PaymentDetails,
    ) -> Result<WithdrawRequest, LedgerError> {
        if amount < self.config.minimum_withdrawal {
            return Err(LedgerError::InvalidAmount(format!(
                "The minimum withdrawal is {}, but {amount} was requested",
                self.config.minimum_withdrawal
            )));
        }
        payment_details.validate()?;
        let request = NewWithdrawRequest { merchant_id, amount, payment_details };
        self.db.reserve_withdrawal(request, self.config.minimum_balance).await
    }

    /// Approving a withdrawal only records the decision. Rejecting it returns the reserved amount to the merchant.
    pub async fn update_withdrawal_status(&self, id: i64, status: WithdrawStatus) -> Result<WithdrawRequest, LedgerError> {
        let withdrawal = self
            .db
            .fetch_withdrawal(id)
            .await?
            .ok_or_else(|| LedgerError::TransactionNotFound(format!("Withdrawal request #{id}")))?;
        if !needs_change(withdrawal.status, status)? {
            return Ok(withdrawal);
        }
        match status.effect() {
            LedgerEffect::Compensate => self.db.reject_withdrawal(id).await,
            _ => self.db.approve_withdrawal(id).await,
        }
    }

    /// Completing a payment request credits the merchant with the full amount.
    pub async fn update_payment_request_status(
        &self,
        id: i64,
        status: PaymentRequestStatus,
    ) -> Result<PaymentRequest, LedgerError> {
        let request = self
            .db
            .fetch_payment_request(id)
            .await?
            .ok_or_else(|| LedgerError::TransactionNotFound(format!("Payment request #{id}")))?;
        if !needs_change(request.status, status)? {
            return Ok(request);
        }
        match status.effect() {
            LedgerEffect::Settle => self.db.complete_payment_request(id).await,
            _ => self.db.close_payment_request(id, status).await,
        }
    }

    /// Records an admin's manual reconciliation of a forwarded SMS.
    pub async fn update_forwarded_sms_status(
        &self,
        id: i64,
        status: ForwardedSmsStatus,
    ) -> Result<ForwardedSms, LedgerError> {
        let sms = self
            .db
            .fetch_forwarded_sms(id)
            .await?
            .ok_or_else(|| LedgerError::TransactionNotFound(format!("Forwarded SMS #{id}")))?;
        if !needs_change(sms.status, status)? {
            return Ok(sms);
        }
        self.db.update_forwarded_sms_status(id, status).await
    }
}

/// `Ok(false)` when the record already has the requested status.
fn needs_change<S: Lifecycle>(current: S, requested: S) -> Result<bool, LedgerError> {
    let next = transition(current, requested).map_err(|e| {
        debug!("🧾️ Refusing status change. {e}");
        LedgerError::from(e)
    })?;
    Ok(next != current)
}
