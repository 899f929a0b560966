//! Pure helpers of the reconciliation engine. Nothing in here touches the database.
mod commission;
mod sms_parser;

pub use commission::{agent_commission, commission_for, deposit_commission, withdraw_commission};
pub use sms_parser::{ParsedTransaction, SmsParseError, SmsParser, DEFAULT_UTC_OFFSET_HOURS};
