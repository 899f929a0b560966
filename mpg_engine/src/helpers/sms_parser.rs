//! Turns the free-text notifications that bKash and Nagad send to agent handsets into structured transactions.
//!
//! Both providers use the same sentence structure and differ only in how they label the fee and the transaction id:
//!
//! ```text
//! bKash: Cash Out Tk 500 from 01712345678 to 01898765432. Fee Tk 5. Balance Tk 9500. TrxID XYZ1 at 01/06/2024 10:00
//! Nagad: Cash In Tk 500 from 01712345678 to 01898765432. Comm: Tk 5. Balance: Tk 9500. TxnID: XYZ1 at 01/06/2024 10:00
//! ```
//!
//! Grammars are therefore built from a single template plus a per-provider label table.
use std::sync::OnceLock;

use chrono::{DateTime, FixedOffset, NaiveDateTime, Offset, TimeZone, Utc};
use log::*;
use mpg_common::Paisa;
use regex::{Captures, Regex};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::db_types::{Provider, SmsDirection};

/// Bangladesh Standard Time.
pub const DEFAULT_UTC_OFFSET_HOURS: i32 = 6;
const TIMESTAMP_FORMAT: &str = "%d/%m/%Y %H:%M";

/// (provider, fee label, transaction id label). Labels may be followed by an optional colon in the SMS text.
const PROVIDER_LABELS: [(Provider, &str, &str); 2] = [(Provider::Bkash, "Fee", "TrxID"), (Provider::Nagad, "Comm", "TxnID")];

#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum SmsParseError {
    #[error("The SMS text does not match any known {0} notification format")]
    UnrecognizedFormat(Provider),
    #[error("The SMS is missing a valid value for {0}")]
    MissingField(&'static str),
}

impl SmsParseError {
    /// A short machine-readable reason code.
    pub fn reason(&self) -> &'static str {
        match self {
            SmsParseError::UnrecognizedFormat(_) => "unrecognized-format",
            SmsParseError::MissingField(_) => "missing-field",
        }
    }
}

/// A provider notification, normalised. Every field is populated; a notification that is missing any of them fails to
/// parse.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ParsedTransaction {
    pub provider: Provider,
    pub direction: SmsDirection,
    pub from_account: String,
    pub to_account: String,
    pub amount: Paisa,
    pub fee: Paisa,
    pub balance: Paisa,
    pub transaction_id: String,
    pub timestamp: DateTime<Utc>,
}

#[derive(Debug, Clone, Copy)]
pub struct SmsParser {
    offset: FixedOffset,
}

impl Default for SmsParser {
    fn default() -> Self {
        Self::with_utc_offset_hours(DEFAULT_UTC_OFFSET_HOURS)
    }
}

impl SmsParser {
    pub fn new(offset: FixedOffset) -> Self {
        Self { offset }
    }

    /// Offsets outside of ±23 hours are not meaningful and fall back to UTC.
    pub fn with_utc_offset_hours(hours: i32) -> Self {
        let offset = hours.checked_mul(3600).and_then(FixedOffset::east_opt).unwrap_or_else(|| {
            warn!("📩️ {hours} is not a valid UTC offset. SMS timestamps will be read as UTC");
            Utc.fix()
        });
        Self { offset }
    }

    pub fn offset(&self) -> FixedOffset {
        self.offset
    }

    pub fn parse(&self, text: &str, provider: Provider) -> Result<ParsedTransaction, SmsParseError> {
        let grammar = grammars()
            .iter()
            .find(|(p, _)| *p == provider)
            .map(|(_, re)| re)
            .ok_or(SmsParseError::UnrecognizedFormat(provider))?;
        let caps = grammar.captures(text.trim()).ok_or_else(|| {
            debug!("📩️ SMS does not match the {provider} grammar: {text}");
            SmsParseError::UnrecognizedFormat(provider)
        })?;
        let direction = if normalise_ws(&caps["direction"]).eq_ignore_ascii_case("cash in") {
            SmsDirection::CashIn
        } else {
            SmsDirection::CashOut
        };
        let amount = money(&caps, "amount")?;
        let fee = money(&caps, "fee")?;
        let balance = money(&caps, "balance")?;
        let timestamp = self.timestamp(&caps["timestamp"])?;
        let result = ParsedTransaction {
            provider,
            direction,
            from_account: caps["from"].to_string(),
            to_account: caps["to"].to_string(),
            amount,
            fee,
            balance,
            transaction_id: caps["trx_id"].to_string(),
            timestamp,
        };
        trace!("📩️ Parsed {provider} SMS: {result:?}");
        Ok(result)
    }

    fn timestamp(&self, s: &str) -> Result<DateTime<Utc>, SmsParseError> {
        let naive = NaiveDateTime::parse_from_str(&normalise_ws(s), TIMESTAMP_FORMAT)
            .map_err(|_| SmsParseError::MissingField("timestamp"))?;
        self.offset
            .from_local_datetime(&naive)
            .single()
            .map(|dt| dt.with_timezone(&Utc))
            .ok_or(SmsParseError::MissingField("timestamp"))
    }
}

fn money(caps: &Captures, field: &'static str) -> Result<Paisa, SmsParseError> {
    Paisa::parse_taka(&caps[field]).map_err(|_| SmsParseError::MissingField(field))
}

fn normalise_ws(s: &str) -> String {
    s.split_whitespace().collect::<Vec<_>>().join(" ")
}

fn grammars() -> &'static [(Provider, Regex)] {
    static GRAMMARS: OnceLock<Vec<(Provider, Regex)>> = OnceLock::new();
    GRAMMARS.get_or_init(|| {
        PROVIDER_LABELS
            .iter()
            .filter_map(|(provider, fee, id)| {
                Regex::new(&grammar_pattern(fee, id))
                    .map_err(|e| error!("📩️ The {provider} SMS grammar could not be compiled. {e}"))
                    .ok()
                    .map(|re| (*provider, re))
            })
            .collect()
    })
}

// Numeric captures are deliberately loose so that a garbled number is reported as a missing field rather than as an
// unrecognised message.
fn grammar_pattern(fee_label: &str, id_label: &str) -> String {
    format!(
        r"(?i)^(?P<direction>cash\s+in|cash\s+out)\s+tk\.?\s*(?P<amount>\S+?)\s+from\s+(?P<from>\S+)\s+to\s+(?P<to>\S+?)\.\s+{fee}:?\s*tk\.?\s*(?P<fee>\S+?)\.\s+balance:?\s*tk\.?\s*(?P<balance>\S+?)\.\s+{id}:?\s*(?P<trx_id>\S+)\s+at\s+(?P<timestamp>\S+\s+\S+)$",
        fee = regex::escape(fee_label),
        id = regex::escape(id_label),
    )
}
