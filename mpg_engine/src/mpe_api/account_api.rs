use std::fmt::Debug;

use log::*;
use mpg_common::Paisa;

use crate::{
    db_types::{
        Agent,
        AgentAccount,
        CommissionRate,
        Merchant,
        MerchantWithHistory,
        NewAgent,
        NewAgentAccount,
        NewMerchant,
    },
    traits::{LedgerError, MerchantManagement},
};

/// `AccountApi` onboards merchants and agents and manages their commission rates.
pub struct AccountApi<B> {
    db: B,
}

impl<B> Debug for AccountApi<B> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "AccountApi")
    }
}

impl<B> AccountApi<B> {
    pub fn new(db: B) -> Self {
        Self { db }
    }
}

impl<B> AccountApi<B>
where B: MerchantManagement
{
    pub async fn create_merchant(&self, merchant: NewMerchant) -> Result<Merchant, LedgerError> {
        if merchant.name.trim().is_empty() || merchant.email.trim().is_empty() {
            return Err(LedgerError::InvalidRequest("A merchant needs a name and an email address".into()));
        }
        self.db.create_merchant(merchant).await
    }

    pub async fn merchant(&self, merchant_id: i64) -> Result<Merchant, LedgerError> {
        self.db.fetch_merchant(merchant_id).await?.ok_or(LedgerError::MerchantNotFound(merchant_id))
    }

    /// The merchant together with every gateway cost entry ever recorded against it.
    pub async fn merchant_with_history(&self, merchant_id: i64) -> Result<MerchantWithHistory, LedgerError> {
        let merchant = self.merchant(merchant_id).await?;
        let getwaycost_history = self.db.fetch_gateway_cost_history(merchant_id).await?;
        Ok(MerchantWithHistory { merchant, getwaycost_history })
    }

    pub async fn merchant_by_api_key(&self, api_key: &str) -> Result<Option<Merchant>, LedgerError> {
        self.db.fetch_merchant_by_api_key(api_key).await
    }

    /// Rates are given in percent and must lie in `[0, 100]`.
    pub async fn update_merchant_commissions(
        &self,
        merchant_id: i64,
        deposit_percent: f64,
        withdraw_percent: f64,
    ) -> Result<Merchant, LedgerError> {
        let deposit = CommissionRate::from_percent(deposit_percent)?;
        let withdraw = CommissionRate::from_percent(withdraw_percent)?;
        self.db.update_merchant_commissions(merchant_id, deposit, withdraw).await
    }

    pub async fn total_gateway_cost(&self) -> Result<Paisa, LedgerError> {
        self.db.fetch_total_gateway_cost().await
    }

    pub async fn create_agent(&self, agent: NewAgent) -> Result<Agent, LedgerError> {
        self.db.create_agent(agent).await
    }

    pub async fn agent(&self, agent_id: i64) -> Result<Agent, LedgerError> {
        self.db.fetch_agent(agent_id).await?.ok_or(LedgerError::AgentNotFound(agent_id))
    }

    /// Rates are given in percent and must lie in `[0, 100]`.
    pub async fn update_agent_commissions(
        &self,
        agent_id: i64,
        deposit_percent: f64,
        withdraw_percent: f64,
    ) -> Result<Agent, LedgerError> {
        let deposit = CommissionRate::from_percent(deposit_percent)?;
        let withdraw = CommissionRate::from_percent(withdraw_percent)?;
        self.db.update_agent_commissions(agent_id, deposit, withdraw).await
    }

    /// Registers a wallet account for an agent. Account numbers are unique across all agents.
    pub async fn add_agent_account(&self, agent_id: i64, account: NewAgentAccount) -> Result<AgentAccount, LedgerError> {
        let number = account.account_number.trim().to_string();
        if number.is_empty() {
            return Err(LedgerError::InvalidRequest("An empty account number cannot be registered".into()));
        }
        if let Some(existing) = self.db.resolve_agent_account(&number).await? {
            debug!("🗃️ Account {number} already belongs to agent #{}", existing.agent_id);
            return Err(LedgerError::DuplicateReference(format!("Agent account {number}")));
        }
        let account = NewAgentAccount { account_number: number, provider: account.provider };
        self.db.add_agent_account(agent_id, account).await
    }

    pub async fn agent_accounts(&self, agent_id: i64) -> Result<Vec<AgentAccount>, LedgerError> {
        self.db.fetch_agent_accounts(agent_id).await
    }
}
