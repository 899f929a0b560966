use std::{fmt::Debug, str::FromStr};

use log::*;
use serde::{Deserialize, Serialize};

use crate::{
    db_types::{
        ForwardedSms,
        NewForwardedSms,
        Payin,
        PayinStatus,
        Payout,
        PayoutStatus,
        Provider,
        SettlementEvidence,
        TransactionRef,
    },
    helpers::{ParsedTransaction, SmsParser},
    mpe_api::matcher::{MatchResult, MatchWindow, TransactionMatcher},
    status_machine::InvalidTransition,
    traits::{LedgerDatabase, LedgerError},
};

/// The account recorded as having settled a transaction automatically.
pub const SMS_SETTLEMENT_AGENT: &str = "sms";

/// An SMS as relayed by the forwarding app on an agent handset.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SmsForward {
    /// The provider that sent the SMS, e.g. `bkash`.
    pub provider: String,
    /// The agent account number of the handset.
    pub number: Option<String>,
    pub text: String,
    pub sent_stamp: Option<String>,
    pub received_stamp: Option<String>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum SmsOutcome {
    PayinSettled { payin: Payin },
    PayoutSettled { payout: Payout },
    /// Nothing was pending for this SMS. It has been kept for manual reconciliation.
    Unmatched { forwarded_sms: ForwardedSms },
    AlreadyProcessed { transaction: TransactionRef },
    /// The SMS could not be read. It has been kept for manual reconciliation.
    NeedsReview { forwarded_sms: ForwardedSms, reason: String },
}

/// `ReconciliationApi` turns forwarded provider SMS into settlements.
///
/// Every SMS ends up either settling exactly one pending payin or payout, or stored as a forwarded SMS for an admin to
/// deal with. A settlement and its status change are one atomic unit in the backend.
pub struct ReconciliationApi<B> {
    db: B,
    matcher: TransactionMatcher<B>,
    parser: SmsParser,
}

impl<B> Debug for ReconciliationApi<B> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "ReconciliationApi ({:?}, {:?})", self.matcher, self.parser)
    }
}

impl<B: Clone> ReconciliationApi<B> {
    pub fn new(db: B, parser: SmsParser, window: MatchWindow) -> Self {
        let matcher = TransactionMatcher::new(db.clone(), window);
        Self { db, matcher, parser }
    }
}

impl<B> ReconciliationApi<B>
where B: LedgerDatabase
{
    pub async fn process_sms(&self, sms: SmsForward) -> Result<SmsOutcome, LedgerError> {
        let provider = match Provider::from_str(sms.provider.trim()) {
            Ok(p) => p,
            Err(e) => {
                info!("📩️ SMS from unknown provider '{}' kept for review", sms.provider);
                return self.needs_review(sms, "unknown-provider", e.to_string()).await;
            },
        };
        let parsed = match self.parser.parse(&sms.text, provider) {
            Ok(p) => p,
            Err(e) => {
                info!("📩️ {provider} SMS could not be parsed and was kept for review. {e}");
                return self.needs_review(sms, e.reason(), e.to_string()).await;
            },
        };
        match self.matcher.find_match(&parsed, sms.number.as_deref()).await? {
            MatchResult::AlreadyProcessed(transaction) => Ok(SmsOutcome::AlreadyProcessed { transaction }),
            MatchResult::Unmatched => self.store_unmatched(sms, &parsed).await,
            MatchResult::Matched(tx) => match self.settle(tx, &parsed).await {
                Ok(outcome) => Ok(outcome),
                Err(LedgerError::InvalidTransition(e)) => {
                    // Someone else closed the request between matching and settling
                    warn!("📩️ {tx} was closed before {} could settle it. {e}", parsed.transaction_id);
                    self.store_unmatched(sms, &parsed).await
                },
                Err(LedgerError::DuplicateReference(_)) => {
                    warn!("📩️ {} transaction {} was applied concurrently", provider, parsed.transaction_id);
                    let transaction =
                        self.db.find_transaction_by_external_id(provider, &parsed.transaction_id).await?.unwrap_or(tx);
                    Ok(SmsOutcome::AlreadyProcessed { transaction })
                },
                Err(e) => Err(e),
            },
        }
    }

    async fn settle(&self, tx: TransactionRef, parsed: &ParsedTransaction) -> Result<SmsOutcome, LedgerError> {
        match tx {
            TransactionRef::Payin(id) => {
                let payin = self
                    .db
                    .fetch_payin(id)
                    .await?
                    .ok_or_else(|| LedgerError::TransactionNotFound(format!("Payin #{id}")))?;
                let evidence = evidence_from(parsed, &payin.agent_account);
                let payin = self.db.complete_payin(id, evidence).await?;
                settled_by_this_sms(&payin.transaction_id, parsed, PayinStatus::Completed)?;
                info!("📩️ {} transaction {} settled payin #{id}", parsed.provider, parsed.transaction_id);
                Ok(SmsOutcome::PayinSettled { payin })
            },
            TransactionRef::Payout(id) => {
                let payout = self
                    .db
                    .fetch_payout(id)
                    .await?
                    .ok_or_else(|| LedgerError::TransactionNotFound(format!("Payout #{id}")))?;
                let evidence = evidence_from(parsed, &payout.agent_account);
                let payout = self.db.complete_payout(id, evidence).await?;
                settled_by_this_sms(&payout.transaction_id, parsed, PayoutStatus::Success)?;
                info!("📩️ {} transaction {} settled payout #{id}", parsed.provider, parsed.transaction_id);
                Ok(SmsOutcome::PayoutSettled { payout })
            },
        }
    }

    async fn store_unmatched(&self, sms: SmsForward, parsed: &ParsedTransaction) -> Result<SmsOutcome, LedgerError> {
        let record = NewForwardedSms {
            provider: parsed.provider.to_string(),
            agent_number: sms.number,
            text: sms.text,
            direction: Some(parsed.direction),
            amount: Some(parsed.amount),
            from_account: Some(parsed.from_account.clone()),
            to_account: Some(parsed.to_account.clone()),
            transaction_id: Some(parsed.transaction_id.clone()),
            sms_timestamp: Some(parsed.timestamp),
            sent_stamp: sms.sent_stamp,
            received_stamp: sms.received_stamp,
            failure_reason: None,
        };
        let (forwarded_sms, inserted) = self.db.insert_forwarded_sms(record).await?;
        if inserted {
            info!("📩️ Unmatched {} transaction {} stored as forwarded SMS #{}", parsed.provider, parsed.transaction_id, forwarded_sms.id);
        } else {
            debug!("📩️ {} transaction {} was already stored as forwarded SMS #{}", parsed.provider, parsed.transaction_id, forwarded_sms.id);
        }
        Ok(SmsOutcome::Unmatched { forwarded_sms })
    }

    async fn needs_review(&self, sms: SmsForward, reason: &str, detail: String) -> Result<SmsOutcome, LedgerError> {
        let record = NewForwardedSms {
            provider: sms.provider,
            agent_number: sms.number,
            text: sms.text,
            sent_stamp: sms.sent_stamp,
            received_stamp: sms.received_stamp,
            failure_reason: Some(reason.to_string()),
            ..Default::default()
        };
        let (forwarded_sms, _) = self.db.insert_forwarded_sms(record).await?;
        Ok(SmsOutcome::NeedsReview { forwarded_sms, reason: detail })
    }
}

/// A completion that raced with an admin decision returns the record as the winner left it.
fn settled_by_this_sms<S: std::fmt::Display>(
    recorded: &Option<String>,
    parsed: &ParsedTransaction,
    status: S,
) -> Result<(), LedgerError> {
    if recorded.as_deref() == Some(parsed.transaction_id.as_str()) {
        Ok(())
    } else {
        Err(InvalidTransition { from: status.to_string(), to: status.to_string() }.into())
    }
}

/// The SMS is the evidence: the amount actually moved, the provider reference and the customer's account.
fn evidence_from(parsed: &ParsedTransaction, agent_account: &str) -> SettlementEvidence {
    let counterparty =
        if parsed.from_account == agent_account { parsed.to_account.clone() } else { parsed.from_account.clone() };
    SettlementEvidence {
        update_by: Some(SMS_SETTLEMENT_AGENT.to_string()),
        transaction_id: Some(parsed.transaction_id.clone()),
        counterparty: Some(counterparty),
        amount: Some(parsed.amount),
    }
}
