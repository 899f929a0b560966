use mpg_common::Paisa;

use crate::db_types::CommissionRate;

const BASIS_POINTS_PER_UNIT: i128 = CommissionRate::MAX_BASIS_POINTS as i128;

/// Calculates `amount * rate`, rounded half-up to the nearest paisa.
///
/// The rate is assumed to have been validated when it was configured. Non-negative amounts always produce
/// non-negative commissions, and the result never exceeds the amount itself.
pub fn commission_for(amount: Paisa, rate: CommissionRate) -> Paisa {
    let product = i128::from(amount.value()) * i128::from(rate.basis_points());
    let half = BASIS_POINTS_PER_UNIT / 2;
    let rounded = if product >= 0 {
        (product + half) / BASIS_POINTS_PER_UNIT
    } else {
        -((-product + half) / BASIS_POINTS_PER_UNIT)
    };
    let value = i64::try_from(rounded).unwrap_or(if rounded < 0 { i64::MIN } else { i64::MAX });
    Paisa::from(value)
}

/// The gateway's cut of a payin, charged to the merchant.
pub fn deposit_commission(amount: Paisa, merchant_rate: CommissionRate) -> Paisa {
    commission_for(amount, merchant_rate)
}

/// The gateway's cut of a payout, charged to the merchant.
pub fn withdraw_commission(amount: Paisa, merchant_rate: CommissionRate) -> Paisa {
    commission_for(amount, merchant_rate)
}

/// The agent's cut of a transaction handled through one of their wallet accounts.
pub fn agent_commission(amount: Paisa, agent_rate: CommissionRate) -> Paisa {
    commission_for(amount, agent_rate)
}
