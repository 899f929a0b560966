//! `SqliteDatabase` is a concrete implementation of a payment gateway ledger backend.
//!
//! Unsurprisingly, it uses SQLite as the backend and implements all the traits defined in the [`crate::traits`] module.
//!
//! Every settlement runs in a single SQLite transaction whose first statement is the compare-and-set status update.
//! That first write takes SQLite's write lock, so concurrent settlements queue up behind each other instead of
//! interleaving their read-modify-write sequences.
use std::fmt::Debug;

use log::*;
use mpg_common::Paisa;
use sqlx::{migrate, SqliteConnection, SqlitePool};

use super::db::{
    agents,
    forwarded_sms,
    merchants,
    new_pool,
    payins,
    payment_requests,
    payouts,
    random_hex,
    withdrawals,
};
use crate::{
    db_types::{
        Agent,
        AgentAccount,
        AgentAccountStatus,
        CommissionRate,
        ForwardedSms,
        ForwardedSmsStatus,
        GatewayCostEntry,
        Merchant,
        MerchantTransactions,
        NewAgent,
        NewAgentAccount,
        NewForwardedSms,
        NewMerchant,
        NewPayin,
        NewPaymentRequest,
        NewPayout,
        NewWithdrawRequest,
        Payin,
        PayinStatus,
        PaymentRequest,
        PaymentRequestStatus,
        Payout,
        PayoutStatus,
        Provider,
        SettlementEvidence,
        TransactionRef,
        WithdrawRequest,
        WithdrawStatus,
    },
    ledger::{self, LedgerDelta},
    status_machine::InvalidTransition,
    traits::{LedgerDatabase, LedgerError, MerchantManagement, TransactionStore},
};

const API_KEY_BYTES: usize = 10;
const REFERENCE_ID_BYTES: usize = 16;

#[derive(Clone)]
pub struct SqliteDatabase {
    url: String,
    pool: SqlitePool,
}

impl Debug for SqliteDatabase {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        writeln!(f, "SqliteDatabase ({:?})", self.pool)
    }
}

impl SqliteDatabase {
    /// Opens a connection pool to the database at `url`.
    pub async fn new_with_url(url: &str, max_connections: u32) -> Result<Self, sqlx::Error> {
        trace!("🗃️ Creating new database connection pool with url {url}");
        let pool = new_pool(url, max_connections).await?;
        let url = url.to_string();
        Ok(Self { url, pool })
    }

    /// Applies any outstanding schema migrations.
    pub async fn run_migrations(&self) -> Result<(), sqlx::Error> {
        migrate!("./src/sqlite/migrations").run(&self.pool).await?;
        info!("🗃️ Database migrations complete");
        Ok(())
    }

    /// Returns a reference to the database connection pool.
    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }
}

/// Applies every part of a ledger delta. Any failure leaves the enclosing transaction to be rolled back.
async fn apply_delta(delta: &LedgerDelta, conn: &mut SqliteConnection) -> Result<(), LedgerError> {
    merchants::apply_delta(delta.merchant_id, &delta.merchant, conn).await?;
    if let Some(amount) = delta.gateway_cost_entry() {
        merchants::append_gateway_cost(delta.merchant_id, amount, conn).await?;
    }
    if let Some((agent_id, agent_delta)) = &delta.agent {
        agents::apply_delta(*agent_id, agent_delta, conn).await?;
    }
    if let Some((account_id, account_delta)) = &delta.agent_account {
        agents::apply_account_delta(*account_id, account_delta, conn).await?;
    }
    Ok(())
}

async fn merchant_for_settlement(merchant_id: i64, conn: &mut SqliteConnection) -> Result<Merchant, LedgerError> {
    merchants::fetch_merchant(merchant_id, conn).await?.ok_or(LedgerError::MerchantNotFound(merchant_id))
}

/// The agent account and the agent that operates it.
async fn agent_for_settlement(
    account_number: &str,
    conn: &mut SqliteConnection,
) -> Result<(AgentAccount, Agent), LedgerError> {
    let account = agents::account_by_number(account_number, conn)
        .await?
        .ok_or_else(|| LedgerError::AgentAccountNotFound(account_number.to_string()))?;
    let agent = agents::fetch_agent(account.agent_id, conn).await?.ok_or(LedgerError::AgentNotFound(account.agent_id))?;
    Ok((account, agent))
}

fn log_rollback<T>(what: &str, result: Result<T, LedgerError>) -> Result<T, LedgerError> {
    if let Err(e) = &result {
        error!("🧾️ Settlement of {what} failed and was rolled back. {e}");
    }
    result
}

/// Resolves a compare-and-set status update that did not apply. If the record already holds the requested status,
/// another request got there first and the record is returned as it stands.
fn cas_outcome<T, S>(
    label: String,
    current: Result<Option<T>, sqlx::Error>,
    status_of: impl Fn(&T) -> S,
    to: S,
) -> Result<T, LedgerError>
where
    S: std::fmt::Display + PartialEq,
{
    match current {
        Ok(Some(record)) if status_of(&record) == to => {
            debug!("🗃️ {label} is already {to}");
            Ok(record)
        },
        Ok(Some(record)) => Err(InvalidTransition { from: status_of(&record).to_string(), to: to.to_string() }.into()),
        Ok(None) => Err(LedgerError::TransactionNotFound(label)),
        Err(e) => Err(e.into()),
    }
}

async fn ensure_merchant_exists(merchant_id: i64, conn: &mut SqliteConnection) -> Result<(), LedgerError> {
    match merchants::fetch_merchant(merchant_id, conn).await? {
        Some(_) => Ok(()),
        None => Err(LedgerError::MerchantNotFound(merchant_id)),
    }
}

async fn ensure_agent_account(
    account_number: &str,
    provider: Provider,
    conn: &mut SqliteConnection,
) -> Result<(), LedgerError> {
    match agents::account_by_number(account_number, conn).await? {
        Some(account) if account.provider == provider && account.status == AgentAccountStatus::Active => Ok(()),
        _ => Err(LedgerError::AgentAccountNotFound(format!("{provider} account {account_number}"))),
    }
}

impl MerchantManagement for SqliteDatabase {
    async fn create_merchant(&self, merchant: NewMerchant) -> Result<Merchant, LedgerError> {
        let mut tx = self.pool.begin().await?;
        let api_key = random_hex(API_KEY_BYTES);
        let merchant = merchants::insert_merchant(merchant, &api_key, &mut tx).await?;
        tx.commit().await?;
        info!("🗃️ Merchant #{} ({}) created", merchant.id, merchant.name);
        Ok(merchant)
    }

    async fn fetch_merchant(&self, merchant_id: i64) -> Result<Option<Merchant>, LedgerError> {
        let mut conn = self.pool.acquire().await?;
        Ok(merchants::fetch_merchant(merchant_id, &mut conn).await?)
    }

    async fn fetch_merchant_by_api_key(&self, api_key: &str) -> Result<Option<Merchant>, LedgerError> {
        let mut conn = self.pool.acquire().await?;
        Ok(merchants::fetch_merchant_by_api_key(api_key, &mut conn).await?)
    }

    async fn update_merchant_commissions(
        &self,
        merchant_id: i64,
        deposit_commission: CommissionRate,
        withdraw_commission: CommissionRate,
    ) -> Result<Merchant, LedgerError> {
        let mut tx = self.pool.begin().await?;
        let merchant = merchants::update_commissions(merchant_id, deposit_commission, withdraw_commission, &mut tx)
            .await?
            .ok_or(LedgerError::MerchantNotFound(merchant_id))?;
        tx.commit().await?;
        info!("🗃️ Merchant #{merchant_id} commissions set to {deposit_commission} / {withdraw_commission}");
        Ok(merchant)
    }

    async fn fetch_gateway_cost_history(&self, merchant_id: i64) -> Result<Vec<GatewayCostEntry>, LedgerError> {
        let mut conn = self.pool.acquire().await?;
        Ok(merchants::gateway_cost_history(merchant_id, &mut conn).await?)
    }

    async fn fetch_total_gateway_cost(&self) -> Result<Paisa, LedgerError> {
        let mut conn = self.pool.acquire().await?;
        Ok(merchants::total_gateway_cost(&mut conn).await?)
    }

    async fn create_agent(&self, agent: NewAgent) -> Result<Agent, LedgerError> {
        let mut tx = self.pool.begin().await?;
        let agent = agents::insert_agent(agent, &mut tx).await?;
        tx.commit().await?;
        info!("🗃️ Agent #{} ({}) created", agent.id, agent.name);
        Ok(agent)
    }

    async fn fetch_agent(&self, agent_id: i64) -> Result<Option<Agent>, LedgerError> {
        let mut conn = self.pool.acquire().await?;
        Ok(agents::fetch_agent(agent_id, &mut conn).await?)
    }

    async fn update_agent_commissions(
        &self,
        agent_id: i64,
        deposit_commission: CommissionRate,
        withdraw_commission: CommissionRate,
    ) -> Result<Agent, LedgerError> {
        let mut tx = self.pool.begin().await?;
        let agent = agents::update_commissions(agent_id, deposit_commission, withdraw_commission, &mut tx)
            .await?
            .ok_or(LedgerError::AgentNotFound(agent_id))?;
        tx.commit().await?;
        info!("🗃️ Agent #{agent_id} commissions set to {deposit_commission} / {withdraw_commission}");
        Ok(agent)
    }

    async fn add_agent_account(&self, agent_id: i64, account: NewAgentAccount) -> Result<AgentAccount, LedgerError> {
        let mut tx = self.pool.begin().await?;
        if agents::fetch_agent(agent_id, &mut tx).await?.is_none() {
            return Err(LedgerError::AgentNotFound(agent_id));
        }
        let account = agents::insert_account(agent_id, account, &mut tx).await?;
        tx.commit().await?;
        debug!("🗃️ {} account {} registered for agent #{agent_id}", account.provider, account.account_number);
        Ok(account)
    }

    async fn fetch_agent_accounts(&self, agent_id: i64) -> Result<Vec<AgentAccount>, LedgerError> {
        let mut conn = self.pool.acquire().await?;
        Ok(agents::fetch_accounts(agent_id, &mut conn).await?)
    }

    async fn resolve_agent_account(&self, account_number: &str) -> Result<Option<AgentAccount>, LedgerError> {
        let mut conn = self.pool.acquire().await?;
        Ok(agents::account_by_number(account_number, &mut conn).await?)
    }
}

impl TransactionStore for SqliteDatabase {
    async fn create_payin(&self, payin: NewPayin) -> Result<Payin, LedgerError> {
        let mut tx = self.pool.begin().await?;
        ensure_merchant_exists(payin.merchant_id, &mut tx).await?;
        ensure_agent_account(&payin.agent_account, payin.provider, &mut tx).await?;
        let payin = payins::insert_payin(payin, &mut tx).await?;
        tx.commit().await?;
        debug!("🗃️ Payin #{} of {} into {} created", payin.id, payin.expected_amount, payin.agent_account);
        Ok(payin)
    }

    async fn fetch_payin(&self, id: i64) -> Result<Option<Payin>, LedgerError> {
        let mut conn = self.pool.acquire().await?;
        Ok(payins::fetch_payin(id, &mut conn).await?)
    }

    async fn create_payout(&self, payout: NewPayout) -> Result<Payout, LedgerError> {
        let mut tx = self.pool.begin().await?;
        ensure_merchant_exists(payout.merchant_id, &mut tx).await?;
        ensure_agent_account(&payout.agent_account, payout.provider, &mut tx).await?;
        let payout = payouts::insert_payout(payout, &mut tx).await?;
        tx.commit().await?;
        debug!("🗃️ Payout #{} of {} from {} created", payout.id, payout.request_amount, payout.agent_account);
        Ok(payout)
    }

    async fn fetch_payout(&self, id: i64) -> Result<Option<Payout>, LedgerError> {
        let mut conn = self.pool.acquire().await?;
        Ok(payouts::fetch_payout(id, &mut conn).await?)
    }

    async fn fetch_pending_payins(&self, agent_account: &str, amount: Paisa) -> Result<Vec<Payin>, LedgerError> {
        let mut conn = self.pool.acquire().await?;
        Ok(payins::fetch_pending(agent_account, amount, &mut conn).await?)
    }

    async fn fetch_pending_payouts(&self, agent_account: &str, amount: Paisa) -> Result<Vec<Payout>, LedgerError> {
        let mut conn = self.pool.acquire().await?;
        Ok(payouts::fetch_pending(agent_account, amount, &mut conn).await?)
    }

    async fn find_transaction_by_external_id(
        &self,
        provider: Provider,
        transaction_id: &str,
    ) -> Result<Option<TransactionRef>, LedgerError> {
        let mut conn = self.pool.acquire().await?;
        if let Some(payin) = payins::fetch_by_external_id(provider, transaction_id, &mut conn).await? {
            return Ok(Some(TransactionRef::Payin(payin.id)));
        }
        let payout = payouts::fetch_by_external_id(provider, transaction_id, &mut conn).await?;
        Ok(payout.map(|p| TransactionRef::Payout(p.id)))
    }

    async fn fetch_withdrawal(&self, id: i64) -> Result<Option<WithdrawRequest>, LedgerError> {
        let mut conn = self.pool.acquire().await?;
        Ok(withdrawals::fetch_withdrawal(id, &mut conn).await?)
    }

    async fn fetch_withdrawals(&self, status: Option<WithdrawStatus>) -> Result<Vec<WithdrawRequest>, LedgerError> {
        let mut conn = self.pool.acquire().await?;
        Ok(withdrawals::search_withdrawals(status, &mut conn).await?)
    }

    async fn create_payment_request(&self, request: NewPaymentRequest) -> Result<PaymentRequest, LedgerError> {
        let mut tx = self.pool.begin().await?;
        ensure_merchant_exists(request.merchant_id, &mut tx).await?;
        let reference_id = random_hex(REFERENCE_ID_BYTES);
        let request = payment_requests::insert_payment_request(request, &reference_id, &mut tx).await?;
        tx.commit().await?;
        debug!("🗃️ Payment request {} for {} created", request.reference_id, request.amount);
        Ok(request)
    }

    async fn fetch_payment_request(&self, id: i64) -> Result<Option<PaymentRequest>, LedgerError> {
        let mut conn = self.pool.acquire().await?;
        Ok(payment_requests::fetch_payment_request(id, &mut conn).await?)
    }

    async fn fetch_forwarded_sms(&self, id: i64) -> Result<Option<ForwardedSms>, LedgerError> {
        let mut conn = self.pool.acquire().await?;
        Ok(forwarded_sms::fetch_forwarded_sms(id, &mut conn).await?)
    }

    async fn fetch_all_forwarded_sms(&self) -> Result<Vec<ForwardedSms>, LedgerError> {
        let mut conn = self.pool.acquire().await?;
        Ok(forwarded_sms::fetch_all(&mut conn).await?)
    }

    async fn fetch_merchant_transactions(&self, merchant_id: i64) -> Result<MerchantTransactions, LedgerError> {
        let mut conn = self.pool.acquire().await?;
        if merchants::fetch_merchant(merchant_id, &mut conn).await?.is_none() {
            return Err(LedgerError::MerchantNotFound(merchant_id));
        }
        let payins = payins::fetch_for_merchant(merchant_id, &mut conn).await?;
        let payouts = payouts::fetch_for_merchant(merchant_id, &mut conn).await?;
        let requests = payment_requests::fetch_for_merchant(merchant_id, &mut conn).await?;
        Ok(MerchantTransactions::new(payins, payouts, requests))
    }
}

impl LedgerDatabase for SqliteDatabase {
    fn url(&self) -> &str {
        self.url.as_str()
    }

    async fn complete_payin(&self, id: i64, evidence: SettlementEvidence) -> Result<Payin, LedgerError> {
        let mut tx = self.pool.begin().await?;
        let payin = match payins::complete(id, &evidence, &mut tx).await? {
            Some(p) => p,
            None => {
                let current = payins::fetch_payin(id, &mut tx).await;
                return cas_outcome(format!("Payin #{id}"), current, |p| p.status, PayinStatus::Completed);
            },
        };
        let result = async {
            let merchant = merchant_for_settlement(payin.merchant_id, &mut tx).await?;
            let (account, agent) = agent_for_settlement(&payin.agent_account, &mut tx).await?;
            let delta = ledger::settle_payin(&payin, &merchant, &agent, &account)?;
            apply_delta(&delta, &mut tx).await?;
            Ok(delta)
        }
        .await;
        let delta = log_rollback(&format!("payin #{id}"), result)?;
        tx.commit().await?;
        info!("🧾️ Payin #{id} completed. Merchant #{} balance changed by {}", delta.merchant_id, delta.merchant.balance);
        Ok(payin)
    }

    async fn close_payin(&self, id: i64, status: PayinStatus, update_by: Option<String>) -> Result<Payin, LedgerError> {
        let mut tx = self.pool.begin().await?;
        let payin = match payins::close(id, status, update_by.as_deref(), &mut tx).await? {
            Some(payin) => payin,
            None => {
                let current = payins::fetch_payin(id, &mut tx).await;
                return cas_outcome(format!("Payin #{id}"), current, |p| p.status, status);
            },
        };
        tx.commit().await?;
        info!("🗃️ Payin #{id} is now {status}");
        Ok(payin)
    }

    async fn complete_payout(&self, id: i64, evidence: SettlementEvidence) -> Result<Payout, LedgerError> {
        let mut tx = self.pool.begin().await?;
        let payout = match payouts::complete(id, &evidence, &mut tx).await? {
            Some(p) => p,
            None => {
                let current = payouts::fetch_payout(id, &mut tx).await;
                return cas_outcome(format!("Payout #{id}"), current, |p| p.status, PayoutStatus::Success);
            },
        };
        let result = async {
            let merchant = merchant_for_settlement(payout.merchant_id, &mut tx).await?;
            let (_, agent) = agent_for_settlement(&payout.agent_account, &mut tx).await?;
            let delta = ledger::settle_payout(&payout, &merchant, &agent)?;
            apply_delta(&delta, &mut tx).await?;
            Ok(delta)
        }
        .await;
        let delta = log_rollback(&format!("payout #{id}"), result)?;
        tx.commit().await?;
        info!("🧾️ Payout #{id} succeeded. Merchant #{} balance changed by {}", delta.merchant_id, delta.merchant.balance);
        Ok(payout)
    }

    async fn close_payout(
        &self,
        id: i64,
        status: PayoutStatus,
        update_by: Option<String>,
    ) -> Result<Payout, LedgerError> {
        let mut tx = self.pool.begin().await?;
        let payout = match payouts::close(id, status, update_by.as_deref(), &mut tx).await? {
            Some(payout) => payout,
            None => {
                let current = payouts::fetch_payout(id, &mut tx).await;
                return cas_outcome(format!("Payout #{id}"), current, |p| p.status, status);
            },
        };
        tx.commit().await?;
        info!("🗃️ Payout #{id} is now {status}");
        Ok(payout)
    }

    async fn reserve_withdrawal(
        &self,
        request: NewWithdrawRequest,
        floor: Paisa,
    ) -> Result<WithdrawRequest, LedgerError> {
        let merchant_id = request.merchant_id;
        let amount = request.amount;
        let mut tx = self.pool.begin().await?;
        if !merchants::reserve_balance(merchant_id, amount, floor, &mut tx).await? {
            let merchant = merchant_for_settlement(merchant_id, &mut tx).await?;
            // Reproduce the check to report how much is actually available
            let err = match ledger::reserve_withdrawal(&merchant, amount, floor) {
                Err(e) => e,
                Ok(_) => LedgerError::InconsistentLedgerWrite(format!(
                    "The balance of merchant #{merchant_id} changed while reserving {amount}"
                )),
            };
            return Err(err);
        }
        let withdrawal = withdrawals::insert_withdrawal(request, &mut tx).await?;
        tx.commit().await?;
        info!("🧾️ Withdrawal #{} of {amount} reserved for merchant #{merchant_id}", withdrawal.id);
        Ok(withdrawal)
    }

    async fn approve_withdrawal(&self, id: i64) -> Result<WithdrawRequest, LedgerError> {
        let mut tx = self.pool.begin().await?;
        let withdrawal = match withdrawals::update_status(id, WithdrawStatus::Approved, &mut tx).await? {
            Some(w) => w,
            None => {
                let current = withdrawals::fetch_withdrawal(id, &mut tx).await;
                let label = format!("Withdrawal request #{id}");
                return cas_outcome(label, current, |w| w.status, WithdrawStatus::Approved);
            },
        };
        tx.commit().await?;
        info!("🧾️ Withdrawal #{id} approved");
        Ok(withdrawal)
    }

    async fn reject_withdrawal(&self, id: i64) -> Result<WithdrawRequest, LedgerError> {
        let mut tx = self.pool.begin().await?;
        let withdrawal = match withdrawals::update_status(id, WithdrawStatus::Rejected, &mut tx).await? {
            Some(w) => w,
            None => {
                let current = withdrawals::fetch_withdrawal(id, &mut tx).await;
                let label = format!("Withdrawal request #{id}");
                return cas_outcome(label, current, |w| w.status, WithdrawStatus::Rejected);
            },
        };
        let delta = ledger::release_withdrawal(&withdrawal);
        let result = apply_delta(&delta, &mut tx).await;
        log_rollback(&format!("withdrawal #{id}"), result)?;
        tx.commit().await?;
        info!("🧾️ Withdrawal #{id} rejected. {} returned to merchant #{}", withdrawal.amount, withdrawal.merchant_id);
        Ok(withdrawal)
    }

    async fn complete_payment_request(&self, id: i64) -> Result<PaymentRequest, LedgerError> {
        let mut tx = self.pool.begin().await?;
        let request = match payment_requests::update_status(id, PaymentRequestStatus::Completed, &mut tx).await? {
            Some(r) => r,
            None => {
                let current = payment_requests::fetch_payment_request(id, &mut tx).await;
                let label = format!("Payment request #{id}");
                return cas_outcome(label, current, |r| r.status, PaymentRequestStatus::Completed);
            },
        };
        let result = async {
            let delta = ledger::settle_payment_request(&request)?;
            apply_delta(&delta, &mut tx).await
        }
        .await;
        log_rollback(&format!("payment request #{id}"), result)?;
        tx.commit().await?;
        info!("🧾️ Payment request #{id} completed. {} credited to merchant #{}", request.amount, request.merchant_id);
        Ok(request)
    }

    async fn close_payment_request(
        &self,
        id: i64,
        status: PaymentRequestStatus,
    ) -> Result<PaymentRequest, LedgerError> {
        let mut tx = self.pool.begin().await?;
        let request = match payment_requests::update_status(id, status, &mut tx).await? {
            Some(r) => r,
            None => {
                let current = payment_requests::fetch_payment_request(id, &mut tx).await;
                return cas_outcome(format!("Payment request #{id}"), current, |r| r.status, status);
            },
        };
        tx.commit().await?;
        info!("🗃️ Payment request #{id} is now {status}");
        Ok(request)
    }

    async fn insert_forwarded_sms(&self, sms: NewForwardedSms) -> Result<(ForwardedSms, bool), LedgerError> {
        let mut tx = self.pool.begin().await?;
        let result = forwarded_sms::idempotent_insert(sms, &mut tx).await?;
        tx.commit().await?;
        Ok(result)
    }

    async fn update_forwarded_sms_status(
        &self,
        id: i64,
        status: ForwardedSmsStatus,
    ) -> Result<ForwardedSms, LedgerError> {
        let mut tx = self.pool.begin().await?;
        let sms = match forwarded_sms::update_status(id, status, &mut tx).await? {
            Some(sms) => sms,
            None => {
                let current = forwarded_sms::fetch_forwarded_sms(id, &mut tx).await;
                return cas_outcome(format!("Forwarded SMS #{id}"), current, |s| s.status, status);
            },
        };
        tx.commit().await?;
        Ok(sms)
    }

    async fn close(&mut self) -> Result<(), LedgerError> {
        self.pool.close().await;
        info!("🗃️ Database connections closed");
        Ok(())
    }
}
