use mockall::mock;
use mpg_common::Paisa;
use mpg_engine::{
    db_types::{
        Agent,
        AgentAccount,
        CommissionRate,
        ForwardedSms,
        GatewayCostEntry,
        Merchant,
        MerchantTransactions,
        NewAgent,
        NewAgentAccount,
        NewMerchant,
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
    LedgerError,
    MerchantManagement,
    TransactionStore,
};

mock! {
    pub MerchantManager {}
    impl MerchantManagement for MerchantManager {
        async fn create_merchant(&self, merchant: NewMerchant) -> Result<Merchant, LedgerError>;
        async fn fetch_merchant(&self, merchant_id: i64) -> Result<Option<Merchant>, LedgerError>;
        async fn fetch_merchant_by_api_key(&self, api_key: &str) -> Result<Option<Merchant>, LedgerError>;
        async fn update_merchant_commissions(&self, merchant_id: i64, deposit_commission: CommissionRate, withdraw_commission: CommissionRate) -> Result<Merchant, LedgerError>;
        async fn fetch_gateway_cost_history(&self, merchant_id: i64) -> Result<Vec<GatewayCostEntry>, LedgerError>;
        async fn fetch_total_gateway_cost(&self) -> Result<Paisa, LedgerError>;
        async fn create_agent(&self, agent: NewAgent) -> Result<Agent, LedgerError>;
        async fn fetch_agent(&self, agent_id: i64) -> Result<Option<Agent>, LedgerError>;
        async fn update_agent_commissions(&self, agent_id: i64, deposit_commission: CommissionRate, withdraw_commission: CommissionRate) -> Result<Agent, LedgerError>;
        async fn add_agent_account(&self, agent_id: i64, account: NewAgentAccount) -> Result<AgentAccount, LedgerError>;
        async fn fetch_agent_accounts(&self, agent_id: i64) -> Result<Vec<AgentAccount>, LedgerError>;
        async fn resolve_agent_account(&self, account_number: &str) -> Result<Option<AgentAccount>, LedgerError>;
    }
}

mock! {
    pub TransactionDb {}
    impl TransactionStore for TransactionDb {
        async fn create_payin(&self, payin: NewPayin) -> Result<Payin, LedgerError>;
        async fn fetch_payin(&self, id: i64) -> Result<Option<Payin>, LedgerError>;
        async fn create_payout(&self, payout: NewPayout) -> Result<Payout, LedgerError>;
        async fn fetch_payout(&self, id: i64) -> Result<Option<Payout>, LedgerError>;
        async fn fetch_pending_payins(&self, agent_account: &str, amount: Paisa) -> Result<Vec<Payin>, LedgerError>;
        async fn fetch_pending_payouts(&self, agent_account: &str, amount: Paisa) -> Result<Vec<Payout>, LedgerError>;
        async fn find_transaction_by_external_id(&self, provider: Provider, transaction_id: &str) -> Result<Option<TransactionRef>, LedgerError>;
        async fn fetch_withdrawal(&self, id: i64) -> Result<Option<WithdrawRequest>, LedgerError>;
        async fn fetch_withdrawals(&self, status: Option<WithdrawStatus>) -> Result<Vec<WithdrawRequest>, LedgerError>;
        async fn create_payment_request(&self, request: NewPaymentRequest) -> Result<PaymentRequest, LedgerError>;
        async fn fetch_payment_request(&self, id: i64) -> Result<Option<PaymentRequest>, LedgerError>;
        async fn fetch_forwarded_sms(&self, id: i64) -> Result<Option<ForwardedSms>, LedgerError>;
        async fn fetch_all_forwarded_sms(&self) -> Result<Vec<ForwardedSms>, LedgerError>;
        async fn fetch_merchant_transactions(&self, merchant_id: i64) -> Result<MerchantTransactions, LedgerError>;
    }
}
