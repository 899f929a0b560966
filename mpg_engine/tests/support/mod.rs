#![allow(dead_code)]
use mpg_engine::{
    db_types::{
        Agent,
        AgentAccount,
        CommissionRate,
        Merchant,
        MobileBankingDetails,
        NewAgent,
        NewAgentAccount,
        NewMerchant,
        NewPaymentRequest,
        Paisa,
        PaymentDetails,
        PaymentRequestStatus,
        Provider,
    },
    test_utils::prepare_env::{prepare_test_env, random_db_path},
    LedgerDatabase,
    MerchantManagement,
    SettlementApi,
    SettlementConfig,
    SqliteDatabase,
};

pub const AGENT_NUMBER: &str = "01712345678";
pub const CUSTOMER_NUMBER: &str = "01898765432";

pub const SCENARIO_SMS: &str = "Cash Out Tk 500 from 01712345678 to 01898765432. Fee Tk 5. Balance Tk 9500. TrxID XYZ1 \
                                at 01/06/2024 10:00";

pub async fn new_database() -> SqliteDatabase {
    let url = random_db_path();
    prepare_test_env(&url).await;
    SqliteDatabase::new_with_url(&url, 5).await.expect("Error creating database")
}

pub fn rate(percent: f64) -> CommissionRate {
    CommissionRate::from_percent(percent).expect("valid rate")
}

/// A merchant paying 2% on deposits and 1% on withdrawals.
pub async fn merchant(db: &SqliteDatabase) -> Merchant {
    let merchant = NewMerchant::new("Shop", "shop@example.com").with_commissions(rate(2.0), rate(1.0));
    db.create_merchant(merchant).await.expect("Error creating merchant")
}

/// Same commissions as [`merchant`], for tests that need several merchants.
pub async fn merchant_with_email(db: &SqliteDatabase, email: &str) -> Merchant {
    let merchant = NewMerchant::new("Shop", email).with_commissions(rate(2.0), rate(1.0));
    db.create_merchant(merchant).await.expect("Error creating merchant")
}

pub fn bkash_details() -> PaymentDetails {
    PaymentDetails::MobileBanking(MobileBankingDetails { provider: "bkash".into(), phone_number: "01712345678".into() })
}

/// An agent earning 1% on deposits and 0.5% on withdrawals, with one active bKash account.
pub async fn agent(db: &SqliteDatabase, number: &str) -> (Agent, AgentAccount) {
    let agent = NewAgent { name: "Agent Rahim".into(), deposit_commission: rate(1.0), withdraw_commission: rate(0.5) };
    let agent = db.create_agent(agent).await.expect("Error creating agent");
    let account = NewAgentAccount { provider: Provider::Bkash, account_number: number.into() };
    let account = db.add_agent_account(agent.id, account).await.expect("Error creating agent account");
    (agent, account)
}

/// Gives the merchant a starting balance by completing a payment request, which is a flat credit.
pub async fn fund_merchant(db: &SqliteDatabase, merchant_id: i64, amount: Paisa) {
    let api = SettlementApi::new(db.clone(), SettlementConfig::default());
    let request = NewPaymentRequest {
        merchant_id,
        email: "payer@example.com".into(),
        name: "Payer".into(),
        amount,
        provider: "bkash".into(),
    };
    let request = api.create_payment_request(request).await.expect("Error creating payment request");
    api.update_payment_request_status(request.id, PaymentRequestStatus::Completed)
        .await
        .expect("Error completing payment request");
}

pub async fn balance(db: &SqliteDatabase, merchant_id: i64) -> Paisa {
    db.fetch_merchant(merchant_id).await.expect("Error fetching merchant").expect("Merchant exists").balance
}

pub async fn shutdown(mut db: SqliteDatabase) {
    db.close().await.expect("Error closing database");
}
