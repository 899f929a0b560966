use log::*;
use mpg_common::Paisa;
use sqlx::SqliteConnection;

use crate::{
    db_types::{CommissionRate, GatewayCostEntry, Merchant, NewMerchant},
    ledger::MerchantDelta,
    traits::LedgerError,
};

/// Inserts a new merchant with zero balances.
pub async fn insert_merchant(
    merchant: NewMerchant,
    api_key: &str,
    conn: &mut SqliteConnection,
) -> Result<Merchant, LedgerError> {
    let merchant = sqlx::query_as(
        r#"
            INSERT INTO merchants (name, email, website_url, api_key, deposit_commission, withdraw_commission)
            VALUES ($1, $2, $3, $4, $5, $6)
            RETURNING *;
        "#,
    )
    .bind(merchant.name)
    .bind(merchant.email)
    .bind(merchant.website_url)
    .bind(api_key)
    .bind(merchant.deposit_commission)
    .bind(merchant.withdraw_commission)
    .fetch_one(conn)
    .await?;
    Ok(merchant)
}

pub async fn fetch_merchant(id: i64, conn: &mut SqliteConnection) -> Result<Option<Merchant>, sqlx::Error> {
    sqlx::query_as("SELECT * FROM merchants WHERE id = $1").bind(id).fetch_optional(conn).await
}

pub async fn fetch_merchant_by_api_key(
    api_key: &str,
    conn: &mut SqliteConnection,
) -> Result<Option<Merchant>, sqlx::Error> {
    sqlx::query_as("SELECT * FROM merchants WHERE api_key = $1").bind(api_key).fetch_optional(conn).await
}

pub async fn update_commissions(
    id: i64,
    deposit_commission: CommissionRate,
    withdraw_commission: CommissionRate,
    conn: &mut SqliteConnection,
) -> Result<Option<Merchant>, sqlx::Error> {
    sqlx::query_as(
        r#"
            UPDATE merchants SET deposit_commission = $2, withdraw_commission = $3, updated_at = CURRENT_TIMESTAMP
            WHERE id = $1
            RETURNING *;
        "#,
    )
    .bind(id)
    .bind(deposit_commission)
    .bind(withdraw_commission)
    .fetch_optional(conn)
    .await
}

/// Applies a relative change to the merchant's running totals.
pub async fn apply_delta(
    merchant_id: i64,
    delta: &MerchantDelta,
    conn: &mut SqliteConnection,
) -> Result<(), LedgerError> {
    let result = sqlx::query(
        r#"
            UPDATE merchants SET
                balance = balance + $2,
                getwaycost = getwaycost + $3,
                total_payin = total_payin + $4,
                total_payout = total_payout + $5,
                updated_at = CURRENT_TIMESTAMP
            WHERE id = $1
        "#,
    )
    .bind(merchant_id)
    .bind(delta.balance)
    .bind(delta.getwaycost)
    .bind(delta.total_payin)
    .bind(delta.total_payout)
    .execute(conn)
    .await?;
    if result.rows_affected() == 1 {
        trace!("🗃️ Merchant #{merchant_id} adjusted by {delta:?}");
        Ok(())
    } else {
        Err(LedgerError::InconsistentLedgerWrite(format!("Merchant #{merchant_id} could not be updated")))
    }
}

/// Debits `amount` from the merchant balance, but only if at least `floor` remains afterwards.
///
/// Returns `false` if the merchant does not exist or the balance is too low, in which case nothing changes.
pub async fn reserve_balance(
    merchant_id: i64,
    amount: Paisa,
    floor: Paisa,
    conn: &mut SqliteConnection,
) -> Result<bool, sqlx::Error> {
    let result = sqlx::query(
        r#"
            UPDATE merchants SET balance = balance - $2, updated_at = CURRENT_TIMESTAMP
            WHERE id = $1 AND balance - $2 >= $3
        "#,
    )
    .bind(merchant_id)
    .bind(amount)
    .bind(floor)
    .execute(conn)
    .await?;
    Ok(result.rows_affected() == 1)
}

pub async fn append_gateway_cost(
    merchant_id: i64,
    amount: Paisa,
    conn: &mut SqliteConnection,
) -> Result<GatewayCostEntry, sqlx::Error> {
    let entry: GatewayCostEntry =
        sqlx::query_as("INSERT INTO gateway_cost_history (merchant_id, amount) VALUES ($1, $2) RETURNING *")
            .bind(merchant_id)
            .bind(amount)
            .fetch_one(conn)
            .await?;
    debug!("🗃️ Gateway cost for merchant #{merchant_id} changed by {amount}");
    Ok(entry)
}

pub async fn gateway_cost_history(
    merchant_id: i64,
    conn: &mut SqliteConnection,
) -> Result<Vec<GatewayCostEntry>, sqlx::Error> {
    sqlx::query_as("SELECT * FROM gateway_cost_history WHERE merchant_id = $1 ORDER BY created_at, id")
        .bind(merchant_id)
        .fetch_all(conn)
        .await
}

pub async fn total_gateway_cost(conn: &mut SqliteConnection) -> Result<Paisa, sqlx::Error> {
    let total: i64 = sqlx::query_scalar("SELECT COALESCE(SUM(getwaycost), 0) FROM merchants").fetch_one(conn).await?;
    Ok(Paisa::from(total))
}
