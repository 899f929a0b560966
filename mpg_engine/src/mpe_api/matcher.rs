//! Decides which pending payin or payout a parsed provider SMS belongs to.
//!
//! A `Cash Out` notification on an agent handset means a customer moved money into the agent's wallet, so it settles a
//! payin. A `Cash In` means the agent sent money out, so it settles a payout.
//!
//! The matcher only ever returns a decision. Acting on it is up to the caller.
use std::fmt::Debug;

use chrono::{DateTime, Duration, Utc};
use log::*;
use serde::Serialize;

use crate::{
    db_types::{AgentAccountStatus, Payin, Payout, SmsDirection, TransactionRef},
    helpers::ParsedTransaction,
    traits::{LedgerError, MerchantManagement, TransactionStore},
};

/// The span of creation times, relative to the SMS timestamp, in which a pending request may be matched.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MatchWindow {
    /// How long before the SMS a request may have been created. `None` places no limit.
    pub lookback: Option<Duration>,
    /// How long after the SMS a request may have been created, to allow for clock skew between handset and server.
    /// `None` places no limit.
    pub skew: Option<Duration>,
}

impl Default for MatchWindow {
    fn default() -> Self {
        Self::from_config(24, 10)
    }
}

impl MatchWindow {
    pub fn new(lookback: Duration, skew: Duration) -> Self {
        Self { lookback: Some(lookback), skew: Some(skew) }
    }

    /// A window of zero hours places no limit on how old a request may be.
    pub fn from_config(window_hours: i64, skew_minutes: i64) -> Self {
        let lookback = (window_hours > 0).then(|| Duration::hours(window_hours));
        Self { lookback, skew: Some(Duration::minutes(skew_minutes.max(0))) }
    }

    pub fn unbounded() -> Self {
        Self { lookback: None, skew: None }
    }

    pub fn contains(&self, sms_time: DateTime<Utc>, created_at: DateTime<Utc>) -> bool {
        let too_early = self.lookback.is_some_and(|lb| created_at < sms_time - lb);
        let too_late = self.skew.is_some_and(|skew| created_at > sms_time + skew);
        !too_early && !too_late
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "result", content = "transaction", rename_all = "snake_case")]
pub enum MatchResult {
    Matched(TransactionRef),
    Unmatched,
    /// The provider transaction id has already settled this transaction.
    AlreadyProcessed(TransactionRef),
}

/// A pending request that can be matched against an SMS.
pub trait MatchCandidate {
    fn transaction_ref(&self) -> TransactionRef;
    fn created_at(&self) -> DateTime<Utc>;
}

impl MatchCandidate for Payin {
    fn transaction_ref(&self) -> TransactionRef {
        TransactionRef::Payin(self.id)
    }

    fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }
}

impl MatchCandidate for Payout {
    fn transaction_ref(&self) -> TransactionRef {
        TransactionRef::Payout(self.id)
    }

    fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }
}

/// Picks the request an SMS settles from a list of pending requests with the right account and amount.
///
/// Requests created outside the window are ignored. Of the remainder, the oldest is served first, with the id breaking
/// ties between requests created in the same instant.
pub fn select_candidate<T: MatchCandidate>(
    candidates: &[T],
    window: &MatchWindow,
    sms_time: DateTime<Utc>,
) -> Option<TransactionRef> {
    let mut eligible = candidates.iter().filter(|c| window.contains(sms_time, c.created_at())).collect::<Vec<_>>();
    eligible.sort_by_key(|c| (c.created_at(), sort_id(c.transaction_ref())));
    if eligible.len() > 1 {
        let refs = eligible.iter().map(|c| c.transaction_ref().to_string()).collect::<Vec<_>>().join(", ");
        warn!("📩️ SMS at {sms_time} matches {} pending requests ({refs}). The oldest is used.", eligible.len());
    }
    eligible.first().map(|c| c.transaction_ref())
}

fn sort_id(r: TransactionRef) -> i64 {
    match r {
        TransactionRef::Payin(id) | TransactionRef::Payout(id) => id,
    }
}

/// The account numbers that may belong to the agent, most likely first.
///
/// The forwarding device reports its own number, which is the strongest hint. Failing that, the receiving side of a
/// cash-out and the sending side of a cash-in are tried before the other side.
pub fn candidate_accounts(parsed: &ParsedTransaction, reported_number: Option<&str>) -> Vec<String> {
    let (first, second) = match parsed.direction {
        SmsDirection::CashOut => (&parsed.to_account, &parsed.from_account),
        SmsDirection::CashIn => (&parsed.from_account, &parsed.to_account),
    };
    let mut numbers = Vec::with_capacity(3);
    for n in reported_number.into_iter().chain([first.as_str(), second.as_str()]) {
        let n = n.trim();
        if !n.is_empty() && !numbers.iter().any(|x: &String| x == n) {
            numbers.push(n.to_string());
        }
    }
    numbers
}

pub struct TransactionMatcher<B> {
    db: B,
    window: MatchWindow,
}

impl<B> Debug for TransactionMatcher<B> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "TransactionMatcher ({:?})", self.window)
    }
}

impl<B> TransactionMatcher<B> {
    pub fn new(db: B, window: MatchWindow) -> Self {
        Self { db, window }
    }

    pub fn window(&self) -> &MatchWindow {
        &self.window
    }
}

impl<B> TransactionMatcher<B>
where B: MerchantManagement + TransactionStore
{
    /// Finds the pending transaction that `parsed` settles.
    ///
    /// `reported_number` is the agent number the forwarding handset claims to be.
    pub async fn find_match(
        &self,
        parsed: &ParsedTransaction,
        reported_number: Option<&str>,
    ) -> Result<MatchResult, LedgerError> {
        if let Some(tx) = self.db.find_transaction_by_external_id(parsed.provider, &parsed.transaction_id).await? {
            info!("📩️ {} transaction {} has already been applied to {tx}", parsed.provider, parsed.transaction_id);
            return Ok(MatchResult::AlreadyProcessed(tx));
        }
        for number in candidate_accounts(parsed, reported_number) {
            let account = match self.db.resolve_agent_account(&number).await? {
                Some(a) if a.status == AgentAccountStatus::Active && a.provider == parsed.provider => a,
                Some(a) => {
                    trace!("📩️ {number} is a {} account with status {}. Skipping", a.provider, a.status);
                    continue;
                },
                None => continue,
            };
            let selected = match parsed.direction {
                SmsDirection::CashOut => {
                    let pending = self.db.fetch_pending_payins(&account.account_number, parsed.amount).await?;
                    select_candidate(&pending, &self.window, parsed.timestamp)
                },
                SmsDirection::CashIn => {
                    let pending = self.db.fetch_pending_payouts(&account.account_number, parsed.amount).await?;
                    select_candidate(&pending, &self.window, parsed.timestamp)
                },
            };
            if let Some(tx) = selected {
                debug!("📩️ {} transaction {} matched {tx} on account {number}", parsed.provider, parsed.transaction_id);
                return Ok(MatchResult::Matched(tx));
            }
        }
        debug!("📩️ No pending request of {} matches {} transaction {}", parsed.amount, parsed.provider, parsed.transaction_id);
        Ok(MatchResult::Unmatched)
    }
}
