use mpg_common::Paisa;
use mpg_engine::{
    db_types::{PaymentDetails, PaymentDetailsError, PaymentMethod, WithdrawStatus},
    SmsForward,
};
use serde::{Deserialize, Serialize};

/// The envelope every JSON route answers with.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ApiResponse<T> {
    pub success: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data: Option<T>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl<T> ApiResponse<T> {
    pub fn success(data: T) -> Self {
        Self { success: true, data: Some(data), error: None }
    }

    /// A failed call that still carries a result, e.g. an SMS that was stored but could not be read.
    pub fn failure_with(data: T, error: String) -> Self {
        Self { success: false, data: Some(data), error: Some(error) }
    }
}

/// The payload posted by the SMS forwarding app running on agent handsets.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CallbackSms {
    /// The sender of the SMS, i.e. the provider name (`bKash`, `NAGAD`).
    pub from: String,
    /// The agent account number of the handset that received the SMS.
    #[serde(default)]
    pub number: Option<String>,
    pub text: String,
    #[serde(default, rename = "sentStamp", alias = "sent_stamp")]
    pub sent_stamp: Option<serde_json::Value>,
    #[serde(default, rename = "receivedStamp", alias = "received_stamp")]
    pub received_stamp: Option<serde_json::Value>,
}

/// Forwarding apps send the stamps either as epoch milliseconds or as strings.
fn stamp_text(value: Option<serde_json::Value>) -> Option<String> {
    match value? {
        serde_json::Value::Null => None,
        serde_json::Value::String(s) => Some(s),
        other => Some(other.to_string()),
    }
}

impl From<CallbackSms> for SmsForward {
    fn from(sms: CallbackSms) -> Self {
        Self {
            provider: sms.from,
            number: sms.number.filter(|n| !n.trim().is_empty()),
            text: sms.text,
            sent_stamp: stamp_text(sms.sent_stamp),
            received_stamp: stamp_text(sms.received_stamp),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StatusUpdate<S> {
    pub status: S,
    #[serde(default, alias = "updateBy")]
    pub update_by: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WithdrawParams {
    /// The merchant id.
    pub merchant: i64,
    pub amount: Paisa,
    #[serde(rename = "paymentMethod", alias = "payment_method")]
    pub payment_method: PaymentMethod,
    #[serde(rename = "paymentDetails", alias = "payment_details")]
    pub payment_details: serde_json::Value,
}

impl WithdrawParams {
    pub fn into_parts(self) -> Result<(i64, Paisa, PaymentDetails), PaymentDetailsError> {
        let details = PaymentDetails::from_parts(self.payment_method, self.payment_details)?;
        Ok((self.merchant, self.amount, details))
    }
}

/// Commission rates in percent.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct CommissionParams {
    pub deposit_commission: f64,
    pub withdraw_commission: f64,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct WithdrawQuery {
    pub status: Option<WithdrawStatus>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TotalGatewayCost {
    pub total_getwaycost: Paisa,
}
