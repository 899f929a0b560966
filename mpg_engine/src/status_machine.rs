//! One-way status lifecycles for every transaction kind.
//!
//! Every lifecycle has a single non-terminal state (`pending`, or `arrived` for forwarded SMS). Any terminal state can
//! be reached from it, and nothing can leave a terminal state. Requesting the current state again is an idempotent
//! no-op.
//!
//! The machine is consulted before any ledger work is done. [`Lifecycle::effect`] tells the caller whether an accepted
//! transition settles funds, returns previously reserved funds, or only records a decision.
use std::fmt::Display;

use serde::Serialize;
use thiserror::Error;

use crate::db_types::{ForwardedSmsStatus, PayinStatus, PaymentRequestStatus, PayoutStatus, WithdrawStatus};

#[derive(Debug, Clone, Error, PartialEq, Eq, Serialize)]
#[error("Cannot change status from '{from}' to '{to}'")]
pub struct InvalidTransition {
    pub from: String,
    pub to: String,
}

impl InvalidTransition {
    pub fn new<S: Display>(from: S, to: S) -> Self {
        Self { from: from.to_string(), to: to.to_string() }
    }
}

/// The ledger consequence of entering a state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LedgerEffect {
    /// Status change only.
    None,
    /// Funds move between the merchant, the agent and the gateway.
    Settle,
    /// Funds that were reserved up front are returned.
    Compensate,
}

pub trait Lifecycle: Copy + PartialEq + Display {
    /// The state every record starts in.
    const INITIAL: Self;

    fn is_terminal(&self) -> bool {
        *self != Self::INITIAL
    }

    fn can_transition_to(&self, next: &Self) -> bool {
        !self.is_terminal() && next.is_terminal()
    }

    fn effect(&self) -> LedgerEffect;
}

/// Validates a requested status change.
///
/// Returns the new state if the change is allowed. Asking for the current state is always allowed and changes nothing.
pub fn transition<S: Lifecycle>(current: S, requested: S) -> Result<S, InvalidTransition> {
    if current == requested || current.can_transition_to(&requested) {
        Ok(requested)
    } else {
        Err(InvalidTransition::new(current, requested))
    }
}

impl Lifecycle for PayinStatus {
    const INITIAL: Self = PayinStatus::Pending;

    fn effect(&self) -> LedgerEffect {
        match self {
            PayinStatus::Completed => LedgerEffect::Settle,
            _ => LedgerEffect::None,
        }
    }
}

impl Lifecycle for PayoutStatus {
    const INITIAL: Self = PayoutStatus::Pending;

    fn effect(&self) -> LedgerEffect {
        match self {
            PayoutStatus::Success => LedgerEffect::Settle,
            _ => LedgerEffect::None,
        }
    }
}

impl Lifecycle for WithdrawStatus {
    const INITIAL: Self = WithdrawStatus::Pending;

    fn effect(&self) -> LedgerEffect {
        match self {
            WithdrawStatus::Rejected => LedgerEffect::Compensate,
            _ => LedgerEffect::None,
        }
    }
}

impl Lifecycle for PaymentRequestStatus {
    const INITIAL: Self = PaymentRequestStatus::Pending;

    fn effect(&self) -> LedgerEffect {
        match self {
            PaymentRequestStatus::Completed => LedgerEffect::Settle,
            _ => LedgerEffect::None,
        }
    }
}

impl Lifecycle for ForwardedSmsStatus {
    const INITIAL: Self = ForwardedSmsStatus::Arrived;

    fn effect(&self) -> LedgerEffect {
        LedgerEffect::None
    }
}
