//! Ledger arithmetic.
//!
//! The functions in this module compute the balance, commission and gateway cost changes implied by a settlement. They
//! never touch storage. Backends apply the resulting [`LedgerDelta`] as relative updates inside the same database
//! transaction as the status change, so that concurrent settlements on one merchant cannot lose updates.
use log::*;
use mpg_common::Paisa;
use serde::Serialize;

use crate::{
    db_types::{Agent, AgentAccount, Merchant, PaymentRequest, Payin, Payout, WithdrawRequest},
    helpers::{agent_commission, deposit_commission, withdraw_commission},
    traits::LedgerError,
};

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct MerchantDelta {
    pub balance: Paisa,
    pub getwaycost: Paisa,
    pub total_payin: Paisa,
    pub total_payout: Paisa,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct AgentDelta {
    pub balance: Paisa,
    pub providercost: Paisa,
    pub totalpayment: Paisa,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct AgentAccountDelta {
    pub total_order: i64,
    pub total_received: Paisa,
}

/// The complete set of changes one settlement makes to the ledger.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct LedgerDelta {
    pub merchant_id: i64,
    pub merchant: MerchantDelta,
    pub agent: Option<(i64, AgentDelta)>,
    pub agent_account: Option<(i64, AgentAccountDelta)>,
}

impl LedgerDelta {
    fn for_merchant(merchant_id: i64, merchant: MerchantDelta) -> Self {
        Self { merchant_id, merchant, agent: None, agent_account: None }
    }

    /// Any change to the gateway cost must be recorded in the merchant's gateway cost history.
    pub fn gateway_cost_entry(&self) -> Option<Paisa> {
        (!self.merchant.getwaycost.is_zero()).then_some(self.merchant.getwaycost)
    }
}

fn non_negative(amount: Paisa) -> Result<Paisa, LedgerError> {
    if amount.is_negative() {
        Err(LedgerError::InvalidAmount(format!("{amount} is negative")))
    } else {
        Ok(amount)
    }
}

/// A completed payin: the customer paid `expected_amount` into the agent's wallet on the merchant's behalf.
///
/// * The merchant is credited the amount less the deposit commission, which accrues to the gateway cost.
/// * The agent, who now holds the customer's money in their wallet, owes it to the platform, less their own commission.
pub fn settle_payin(
    payin: &Payin,
    merchant: &Merchant,
    agent: &Agent,
    account: &AgentAccount,
) -> Result<LedgerDelta, LedgerError> {
    let amount = non_negative(payin.expected_amount)?;
    let commission = deposit_commission(amount, merchant.deposit_commission);
    let agent_cut = agent_commission(amount, agent.deposit_commission);
    trace!("🧾️ Payin #{} of {amount}: merchant commission {commission}, agent commission {agent_cut}", payin.id);
    Ok(LedgerDelta {
        merchant_id: merchant.id,
        merchant: MerchantDelta {
            balance: amount - commission,
            getwaycost: commission,
            total_payin: amount,
            total_payout: Paisa::default(),
        },
        agent: Some((agent.id, AgentDelta {
            balance: agent_cut - amount,
            providercost: agent_cut,
            totalpayment: amount,
        })),
        agent_account: Some((account.id, AgentAccountDelta { total_order: 1, total_received: amount })),
    })
}

/// A successful payout: the agent sent `sent_amount` (or the requested amount) from their wallet to the payee.
///
/// * The merchant is debited the amount plus the withdraw commission, which accrues to the gateway cost.
/// * The agent is reimbursed for the money they paid out, less their withdraw commission.
pub fn settle_payout(payout: &Payout, merchant: &Merchant, agent: &Agent) -> Result<LedgerDelta, LedgerError> {
    let amount = non_negative(payout.sent_amount.unwrap_or(payout.request_amount))?;
    let commission = withdraw_commission(amount, merchant.withdraw_commission);
    let agent_cut = agent_commission(amount, agent.withdraw_commission);
    trace!("🧾️ Payout #{} of {amount}: merchant commission {commission}, agent commission {agent_cut}", payout.id);
    Ok(LedgerDelta {
        merchant_id: merchant.id,
        merchant: MerchantDelta {
            balance: -(amount + commission),
            getwaycost: commission,
            total_payin: Paisa::default(),
            total_payout: amount,
        },
        agent: Some((agent.id, AgentDelta {
            balance: amount - agent_cut,
            providercost: agent_cut,
            totalpayment: amount,
        })),
        agent_account: None,
    })
}

/// A completed payment request is a flat credit to the merchant. No commission is charged.
pub fn settle_payment_request(request: &PaymentRequest) -> Result<LedgerDelta, LedgerError> {
    let amount = non_negative(request.amount)?;
    Ok(LedgerDelta::for_merchant(request.merchant_id, MerchantDelta { balance: amount, ..Default::default() }))
}

/// Checks that a withdrawal can be reserved without dropping the merchant's balance below `floor`, and returns the
/// debit that reserves it.
pub fn reserve_withdrawal(merchant: &Merchant, amount: Paisa, floor: Paisa) -> Result<LedgerDelta, LedgerError> {
    if amount.is_negative() || amount.is_zero() {
        return Err(LedgerError::InvalidAmount(format!("Withdrawal amount must be positive, but was {amount}")));
    }
    let available = merchant.balance - floor;
    if available < amount {
        debug!("🧾️ Merchant #{} cannot withdraw {amount}. Only {available} is available", merchant.id);
        return Err(LedgerError::InsufficientBalance { available, requested: amount });
    }
    Ok(LedgerDelta::for_merchant(merchant.id, MerchantDelta { balance: -amount, ..Default::default() }))
}

/// A rejected withdrawal returns exactly the reserved amount.
pub fn release_withdrawal(withdrawal: &WithdrawRequest) -> LedgerDelta {
    LedgerDelta::for_merchant(withdrawal.merchant_id, MerchantDelta { balance: withdrawal.amount, ..Default::default() })
}
