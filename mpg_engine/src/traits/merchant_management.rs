use mpg_common::Paisa;

use crate::{
    db_types::{Agent, AgentAccount, CommissionRate, GatewayCostEntry, Merchant, NewAgent, NewAgentAccount, NewMerchant},
    traits::LedgerError,
};

/// The `MerchantManagement` trait defines behaviour for onboarding and configuring merchants and agents.
///
/// It also provides the agent account index, which maps a wallet account number to the agent that operates it. All
/// agent lookups made while reconciling provider SMS go through [`MerchantManagement::resolve_agent_account`].
#[allow(async_fn_in_trait)]
pub trait MerchantManagement {
    /// Creates a merchant with a freshly generated API key and zero balances.
    async fn create_merchant(&self, merchant: NewMerchant) -> Result<Merchant, LedgerError>;

    async fn fetch_merchant(&self, merchant_id: i64) -> Result<Option<Merchant>, LedgerError>;

    async fn fetch_merchant_by_api_key(&self, api_key: &str) -> Result<Option<Merchant>, LedgerError>;

    async fn update_merchant_commissions(
        &self,
        merchant_id: i64,
        deposit_commission: CommissionRate,
        withdraw_commission: CommissionRate,
    ) -> Result<Merchant, LedgerError>;

    /// The gateway cost audit trail for the merchant, oldest entry first.
    async fn fetch_gateway_cost_history(&self, merchant_id: i64) -> Result<Vec<GatewayCostEntry>, LedgerError>;

    /// The gateway cost accumulated across all merchants.
    async fn fetch_total_gateway_cost(&self) -> Result<Paisa, LedgerError>;

    async fn create_agent(&self, agent: NewAgent) -> Result<Agent, LedgerError>;

    async fn fetch_agent(&self, agent_id: i64) -> Result<Option<Agent>, LedgerError>;

    async fn update_agent_commissions(
        &self,
        agent_id: i64,
        deposit_commission: CommissionRate,
        withdraw_commission: CommissionRate,
    ) -> Result<Agent, LedgerError>;

    /// Registers a wallet account for an agent. Account numbers are unique across all agents.
    async fn add_agent_account(&self, agent_id: i64, account: NewAgentAccount) -> Result<AgentAccount, LedgerError>;

    async fn fetch_agent_accounts(&self, agent_id: i64) -> Result<Vec<AgentAccount>, LedgerError>;

    /// Looks up the agent account registered for the given account number.
    async fn resolve_agent_account(&self, account_number: &str) -> Result<Option<AgentAccount>, LedgerError>;
}
