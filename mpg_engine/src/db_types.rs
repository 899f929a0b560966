//! Data types shared between the engine API, the storage traits and the database backends.
use std::{fmt::Display, str::FromStr};

use chrono::{DateTime, Utc};
pub use mpg_common::Paisa;
use serde::{Deserialize, Serialize};
use sqlx::{FromRow, Type};
use thiserror::Error;

#[derive(Debug, Clone, Error, PartialEq, Eq)]
#[error("Conversion error: {0}")]
pub struct ConversionError(pub String);

// Generates a text-backed enum that is stored as lowercase text in the database and on the wire.
macro_rules! text_enum {
    ($(#[$meta:meta])* $name:ident { $($(#[$vmeta:meta])* $variant:ident => $text:literal),+ $(,)? }) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Type)]
        pub enum $name {
            $(
                $(#[$vmeta])*
                #[serde(rename = $text)]
                #[sqlx(rename = $text)]
                $variant,
            )+
        }

        impl $name {
            pub const ALL: &'static [$name] = &[$($name::$variant),+];

            pub fn as_str(&self) -> &'static str {
                match self {
                    $(Self::$variant => $text,)+
                }
            }
        }

        impl Display for $name {
            fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                f.write_str(self.as_str())
            }
        }

        impl FromStr for $name {
            type Err = ConversionError;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                match s.trim().to_ascii_lowercase().as_str() {
                    $($text => Ok(Self::$variant),)+
                    _ => Err(ConversionError(format!("'{s}' is not a valid {}", stringify!($name)))),
                }
            }
        }
    };
}

//--------------------------------------     Enumerations      ---------------------------------------------------------
text_enum! {
    /// The mobile-money providers whose SMS notifications the gateway understands.
    Provider { Bkash => "bkash", Nagad => "nagad" }
}

text_enum! {
    /// `CashOut` moves money from a customer wallet into an agent wallet (a payin). `CashIn` is the reverse (a payout).
    SmsDirection { CashIn => "cash_in", CashOut => "cash_out" }
}

text_enum! {
    PaymentType { P2p => "p2p", P2c => "p2c", Qr => "qr", Checkout => "checkout" }
}

text_enum! {
    PayinStatus {
        Pending => "pending",
        Completed => "completed",
        Rejected => "rejected",
        Expired => "expired",
        Cancelled => "cancelled",
    }
}

text_enum! {
    PayoutStatus { Pending => "pending", Success => "success", Rejected => "rejected", Reassigned => "reassigned" }
}

text_enum! {
    /// The canonical withdrawal lifecycle. Funds are reserved when the request is created, so `Approved` only records
    /// the admin decision, while `Rejected` returns the reserved amount to the merchant.
    WithdrawStatus { Pending => "pending", Approved => "approved", Rejected => "rejected" }
}

text_enum! {
    PaymentRequestStatus {
        Pending => "pending",
        Completed => "completed",
        Failed => "failed",
        Cancelled => "cancelled",
    }
}

text_enum! {
    ForwardedSmsStatus { Arrived => "arrived", Used => "used", Expired => "expired" }
}

text_enum! {
    AgentAccountStatus { Active => "active", Inactive => "inactive", Pending => "pending" }
}

text_enum! {
    PaymentMethod { BankTransfer => "bank_transfer", MobileBanking => "mobile_banking", Upi => "upi" }
}

//--------------------------------------    CommissionRate     ---------------------------------------------------------
#[derive(Debug, Clone, Error, PartialEq)]
#[error("Commission rate must be a percentage between 0 and 100, but was {0}")]
pub struct CommissionRateError(pub f64);

/// A commission percentage, held as basis points (1 bp = 0.01%) so that rates such as 2.5% are exact.
///
/// JSON carries the rate as a percentage number, e.g. `2.5`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Type, Serialize, Deserialize)]
#[sqlx(transparent)]
#[serde(try_from = "f64", into = "f64")]
pub struct CommissionRate(i64);

impl CommissionRate {
    pub const MAX_BASIS_POINTS: i64 = 10_000;

    pub fn from_basis_points(bps: i64) -> Result<Self, CommissionRateError> {
        if (0..=Self::MAX_BASIS_POINTS).contains(&bps) {
            Ok(Self(bps))
        } else {
            #[allow(clippy::cast_precision_loss)]
            Err(CommissionRateError(bps as f64 / 100.0))
        }
    }

    /// Converts a percentage to a rate, rounding to the nearest basis point.
    pub fn from_percent(percent: f64) -> Result<Self, CommissionRateError> {
        if !percent.is_finite() || !(0.0..=100.0).contains(&percent) {
            return Err(CommissionRateError(percent));
        }
        #[allow(clippy::cast_possible_truncation)]
        let bps = (percent * 100.0).round() as i64;
        Self::from_basis_points(bps)
    }

    pub fn basis_points(&self) -> i64 {
        self.0
    }

    pub fn as_percent(&self) -> f64 {
        #[allow(clippy::cast_precision_loss)]
        let pct = self.0 as f64 / 100.0;
        pct
    }
}

impl TryFrom<f64> for CommissionRate {
    type Error = CommissionRateError;

    fn try_from(value: f64) -> Result<Self, Self::Error> {
        Self::from_percent(value)
    }
}

impl From<CommissionRate> for f64 {
    fn from(rate: CommissionRate) -> Self {
        rate.as_percent()
    }
}

impl Display for CommissionRate {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}.{:02}%", self.0 / 100, self.0 % 100)
    }
}

//--------------------------------------       Merchant        ---------------------------------------------------------
#[derive(Debug, Clone, FromRow, Serialize, Deserialize, PartialEq, Eq)]
pub struct Merchant {
    pub id: i64,
    pub name: String,
    pub email: String,
    pub website_url: Option<String>,
    pub api_key: String,
    pub balance: Paisa,
    pub total_payin: Paisa,
    pub total_payout: Paisa,
    /// Accumulated gateway fees owed to the operator. Only ever changed together with a [`GatewayCostEntry`].
    pub getwaycost: Paisa,
    pub deposit_commission: CommissionRate,
    pub withdraw_commission: CommissionRate,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewMerchant {
    pub name: String,
    pub email: String,
    pub website_url: Option<String>,
    #[serde(default)]
    pub deposit_commission: CommissionRate,
    #[serde(default)]
    pub withdraw_commission: CommissionRate,
}

impl NewMerchant {
    pub fn new<S: Into<String>>(name: S, email: S) -> Self {
        Self {
            name: name.into(),
            email: email.into(),
            website_url: None,
            deposit_commission: CommissionRate::default(),
            withdraw_commission: CommissionRate::default(),
        }
    }

    pub fn with_commissions(mut self, deposit: CommissionRate, withdraw: CommissionRate) -> Self {
        self.deposit_commission = deposit;
        self.withdraw_commission = withdraw;
        self
    }
}

/// One entry of the append-only gateway cost audit trail.
#[derive(Debug, Clone, FromRow, Serialize, Deserialize, PartialEq, Eq)]
pub struct GatewayCostEntry {
    pub id: i64,
    pub merchant_id: i64,
    pub amount: Paisa,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize)]
pub struct MerchantWithHistory {
    #[serde(flatten)]
    pub merchant: Merchant,
    pub getwaycost_history: Vec<GatewayCostEntry>,
}

//--------------------------------------     Agent (User)      ---------------------------------------------------------
#[derive(Debug, Clone, FromRow, Serialize, Deserialize, PartialEq, Eq)]
pub struct Agent {
    pub id: i64,
    pub name: String,
    pub balance: Paisa,
    pub providercost: Paisa,
    pub totalpayment: Paisa,
    pub deposit_commission: CommissionRate,
    pub withdraw_commission: CommissionRate,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewAgent {
    pub name: String,
    #[serde(default)]
    pub deposit_commission: CommissionRate,
    #[serde(default)]
    pub withdraw_commission: CommissionRate,
}

#[derive(Debug, Clone, FromRow, Serialize, Deserialize, PartialEq, Eq)]
pub struct AgentAccount {
    pub id: i64,
    pub agent_id: i64,
    pub provider: Provider,
    pub account_number: String,
    pub status: AgentAccountStatus,
    pub total_order: i64,
    pub total_received: Paisa,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewAgentAccount {
    pub provider: Provider,
    pub account_number: String,
}

//--------------------------------------        Payins         ---------------------------------------------------------
#[derive(Debug, Clone, FromRow, Serialize, Deserialize, PartialEq, Eq)]
pub struct Payin {
    pub id: i64,
    pub merchant_id: i64,
    pub agent_account: String,
    pub payer_account: Option<String>,
    pub expected_amount: Paisa,
    pub received_amount: Option<Paisa>,
    pub provider: Provider,
    pub payment_type: PaymentType,
    pub status: PayinStatus,
    pub transaction_id: Option<String>,
    pub update_by: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewPayin {
    pub merchant_id: i64,
    pub agent_account: String,
    pub payer_account: Option<String>,
    pub expected_amount: Paisa,
    pub provider: Provider,
    pub payment_type: PaymentType,
}

impl NewPayin {
    pub fn new<S: Into<String>>(merchant_id: i64, agent_account: S, expected_amount: Paisa, provider: Provider) -> Self {
        Self {
            merchant_id,
            agent_account: agent_account.into(),
            payer_account: None,
            expected_amount,
            provider,
            payment_type: PaymentType::P2p,
        }
    }
}

//--------------------------------------        Payouts        ---------------------------------------------------------
#[derive(Debug, Clone, FromRow, Serialize, Deserialize, PartialEq, Eq)]
pub struct Payout {
    pub id: i64,
    pub merchant_id: i64,
    pub agent_account: String,
    pub payee_account: String,
    pub request_amount: Paisa,
    pub sent_amount: Option<Paisa>,
    pub provider: Provider,
    pub status: PayoutStatus,
    pub transaction_id: Option<String>,
    pub update_by: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewPayout {
    pub merchant_id: i64,
    pub agent_account: String,
    pub payee_account: String,
    pub request_amount: Paisa,
    pub provider: Provider,
}

/// What is known about the real-world money movement when a payin or payout is settled. Fields that are `None` fall
/// back to the values recorded on the transaction itself.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct SettlementEvidence {
    pub update_by: Option<String>,
    pub transaction_id: Option<String>,
    pub counterparty: Option<String>,
    pub amount: Option<Paisa>,
}

impl SettlementEvidence {
    pub fn by_admin<S: Into<String>>(update_by: Option<S>) -> Self {
        Self { update_by: update_by.map(Into::into), ..Default::default() }
    }
}

/// A reference to a payin or a payout.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(tag = "kind", content = "id", rename_all = "snake_case")]
pub enum TransactionRef {
    Payin(i64),
    Payout(i64),
}

impl Display for TransactionRef {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            TransactionRef::Payin(id) => write!(f, "payin #{id}"),
            TransactionRef::Payout(id) => write!(f, "payout #{id}"),
        }
    }
}

//--------------------------------------    Payment details    ---------------------------------------------------------
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct BankTransferDetails {
    pub bank_name: String,
    pub account_number: String,
    pub account_name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub branch_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub routing_number: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct MobileBankingDetails {
    pub provider: String,
    pub phone_number: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct UpiDetails {
    pub upi_id: String,
}

/// Where a merchant wants a withdrawal sent. The payment method selects the shape of the details.
#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
#[serde(tag = "payment_method", content = "payment_details", rename_all = "snake_case")]
pub enum PaymentDetails {
    BankTransfer(BankTransferDetails),
    MobileBanking(MobileBankingDetails),
    Upi(UpiDetails),
}

#[derive(Debug, Clone, Error, PartialEq, Eq)]
#[error("Invalid payment details for {method}: {reason}")]
pub struct PaymentDetailsError {
    pub method: PaymentMethod,
    pub reason: String,
}

impl PaymentDetails {
    /// Builds and validates the details variant for `method` from an untyped JSON payload.
    pub fn from_parts(method: PaymentMethod, details: serde_json::Value) -> Result<Self, PaymentDetailsError> {
        let err = |e: serde_json::Error| PaymentDetailsError { method, reason: e.to_string() };
        let result = match method {
            PaymentMethod::BankTransfer => Self::BankTransfer(serde_json::from_value(details).map_err(err)?),
            PaymentMethod::MobileBanking => Self::MobileBanking(serde_json::from_value(details).map_err(err)?),
            PaymentMethod::Upi => Self::Upi(serde_json::from_value(details).map_err(err)?),
        };
        result.validate()?;
        Ok(result)
    }

    pub fn method(&self) -> PaymentMethod {
        match self {
            PaymentDetails::BankTransfer(_) => PaymentMethod::BankTransfer,
            PaymentDetails::MobileBanking(_) => PaymentMethod::MobileBanking,
            PaymentDetails::Upi(_) => PaymentMethod::Upi,
        }
    }

    /// Checks that every required field is present and non-blank.
    pub fn validate(&self) -> Result<(), PaymentDetailsError> {
        let required: Vec<(&str, &str)> = match self {
            PaymentDetails::BankTransfer(d) => vec![
                ("bank_name", d.bank_name.as_str()),
                ("account_number", d.account_number.as_str()),
                ("account_name", d.account_name.as_str()),
            ],
            PaymentDetails::MobileBanking(d) => {
                vec![("provider", d.provider.as_str()), ("phone_number", d.phone_number.as_str())]
            },
            PaymentDetails::Upi(d) => vec![("upi_id", d.upi_id.as_str())],
        };
        match required.into_iter().find(|(_, v)| v.trim().is_empty()) {
            Some((field, _)) => {
                Err(PaymentDetailsError { method: self.method(), reason: format!("{field} must not be empty") })
            },
            None => Ok(()),
        }
    }

    /// The JSON payload of the variant, without the method tag.
    pub fn details_json(&self) -> String {
        let value = match self {
            PaymentDetails::BankTransfer(d) => serde_json::to_value(d),
            PaymentDetails::MobileBanking(d) => serde_json::to_value(d),
            PaymentDetails::Upi(d) => serde_json::to_value(d),
        };
        value.map(|v| v.to_string()).unwrap_or_else(|_| "{}".to_string())
    }
}

//--------------------------------------  Withdraw requests    ---------------------------------------------------------
#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct WithdrawRequest {
    pub id: i64,
    pub merchant_id: i64,
    pub amount: Paisa,
    #[serde(flatten)]
    pub payment_details: PaymentDetails,
    pub status: WithdrawStatus,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl<'r> FromRow<'r, sqlx::sqlite::SqliteRow> for WithdrawRequest {
    fn from_row(row: &'r sqlx::sqlite::SqliteRow) -> Result<Self, sqlx::Error> {
        use sqlx::Row;
        let method: PaymentMethod = row.try_get("payment_method")?;
        let details: String = row.try_get("payment_details")?;
        let value = serde_json::from_str(&details).map_err(|e| sqlx::Error::Decode(Box::new(e)))?;
        let payment_details =
            PaymentDetails::from_parts(method, value).map_err(|e| sqlx::Error::Decode(Box::new(e)))?;
        Ok(Self {
            id: row.try_get("id")?,
            merchant_id: row.try_get("merchant_id")?,
            amount: row.try_get("amount")?,
            payment_details,
            status: row.try_get("status")?,
            created_at: row.try_get("created_at")?,
            updated_at: row.try_get("updated_at")?,
        })
    }
}

#[derive(Debug, Clone)]
pub struct NewWithdrawRequest {
    pub merchant_id: i64,
    pub amount: Paisa,
    pub payment_details: PaymentDetails,
}

//--------------------------------------   Payment requests    ---------------------------------------------------------
#[derive(Debug, Clone, FromRow, Serialize, Deserialize, PartialEq, Eq)]
pub struct PaymentRequest {
    pub id: i64,
    pub merchant_id: i64,
    pub reference_id: String,
    pub email: String,
    pub name: String,
    pub amount: Paisa,
    pub provider: String,
    pub status: PaymentRequestStatus,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewPaymentRequest {
    pub merchant_id: i64,
    pub email: String,
    pub name: String,
    pub amount: Paisa,
    pub provider: String,
}

//--------------------------------------    Forwarded SMS      ---------------------------------------------------------
#[derive(Debug, Clone, FromRow, Serialize, Deserialize, PartialEq, Eq)]
pub struct ForwardedSms {
    pub id: i64,
    pub provider: String,
    /// The agent account number the forwarding device reported.
    pub agent_number: Option<String>,
    pub text: String,
    pub direction: Option<SmsDirection>,
    pub amount: Option<Paisa>,
    pub from_account: Option<String>,
    pub to_account: Option<String>,
    pub transaction_id: Option<String>,
    pub sms_timestamp: Option<DateTime<Utc>>,
    pub sent_stamp: Option<String>,
    pub received_stamp: Option<String>,
    /// Why the SMS could not be reconciled automatically, if it could not be parsed.
    pub failure_reason: Option<String>,
    pub status: ForwardedSmsStatus,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Default)]
pub struct NewForwardedSms {
    pub provider: String,
    pub agent_number: Option<String>,
    pub text: String,
    pub direction: Option<SmsDirection>,
    pub amount: Option<Paisa>,
    pub from_account: Option<String>,
    pub to_account: Option<String>,
    pub transaction_id: Option<String>,
    pub sms_timestamp: Option<DateTime<Utc>>,
    pub sent_stamp: Option<String>,
    pub received_stamp: Option<String>,
    pub failure_reason: Option<String>,
}

//--------------------------------------  Merchant dashboards  ---------------------------------------------------------
#[derive(Debug, Clone, Default, Serialize, PartialEq, Eq)]
pub struct StatusCount {
    pub status: String,
    pub count: i64,
}

/// Everything a merchant dashboard shows about the merchant's transactions.
#[derive(Debug, Clone, Default, Serialize)]
pub struct MerchantTransactions {
    pub payins: Vec<Payin>,
    pub payouts: Vec<Payout>,
    pub payment_requests: Vec<PaymentRequest>,
    pub payin_counts: Vec<StatusCount>,
    pub payout_counts: Vec<StatusCount>,
}

impl MerchantTransactions {
    pub fn new(payins: Vec<Payin>, payouts: Vec<Payout>, payment_requests: Vec<PaymentRequest>) -> Self {
        let payin_counts = count_by(PayinStatus::ALL, payins.iter().map(|p| p.status));
        let payout_counts = count_by(PayoutStatus::ALL, payouts.iter().map(|p| p.status));
        Self { payins, payouts, payment_requests, payin_counts, payout_counts }
    }
}

fn count_by<S: Display + PartialEq + Copy>(all: &[S], statuses: impl Iterator<Item = S>) -> Vec<StatusCount> {
    let statuses = statuses.collect::<Vec<S>>();
    all.iter()
        .map(|s| {
            #[allow(clippy::cast_possible_wrap)]
            let count = statuses.iter().filter(|x| *x == s).count() as i64;
            StatusCount { status: s.to_string(), count }
        })
        .collect()
}
