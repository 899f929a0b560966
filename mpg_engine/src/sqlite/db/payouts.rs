use mpg_common::Paisa;
use sqlx::SqliteConnection;

use crate::{
    db_types::{NewPayout, Payout, PayoutStatus, Provider, SettlementEvidence},
    traits::LedgerError,
};

pub async fn insert_payout(payout: NewPayout, conn: &mut SqliteConnection) -> Result<Payout, LedgerError> {
    let payout = sqlx::query_as(
        r#"
            INSERT INTO payouts (merchant_id, agent_account, payee_account, request_amount, provider)
            VALUES ($1, $2, $3, $4, $5)
            RETURNING *;
        "#,
    )
    .bind(payout.merchant_id)
    .bind(payout.agent_account.trim())
    .bind(payout.payee_account.trim())
    .bind(payout.request_amount)
    .bind(payout.provider)
    .fetch_one(conn)
    .await?;
    Ok(payout)
}

pub async fn fetch_payout(id: i64, conn: &mut SqliteConnection) -> Result<Option<Payout>, sqlx::Error> {
    sqlx::query_as("SELECT * FROM payouts WHERE id = $1").bind(id).fetch_optional(conn).await
}

/// Pending payouts from the agent account for the amount, oldest first.
pub async fn fetch_pending(
    agent_account: &str,
    amount: Paisa,
    conn: &mut SqliteConnection,
) -> Result<Vec<Payout>, sqlx::Error> {
    sqlx::query_as(
        r#"
            SELECT * FROM payouts
            WHERE agent_account = $1 AND request_amount = $2 AND status = $3
            ORDER BY created_at, id
        "#,
    )
    .bind(agent_account)
    .bind(amount)
    .bind(PayoutStatus::Pending)
    .fetch_all(conn)
    .await
}

pub async fn fetch_by_external_id(
    provider: Provider,
    transaction_id: &str,
    conn: &mut SqliteConnection,
) -> Result<Option<Payout>, sqlx::Error> {
    sqlx::query_as("SELECT * FROM payouts WHERE provider = $1 AND transaction_id = $2")
        .bind(provider)
        .bind(transaction_id)
        .fetch_optional(conn)
        .await
}

pub async fn fetch_for_merchant(merchant_id: i64, conn: &mut SqliteConnection) -> Result<Vec<Payout>, sqlx::Error> {
    sqlx::query_as("SELECT * FROM payouts WHERE merchant_id = $1 ORDER BY created_at DESC, id DESC")
        .bind(merchant_id)
        .fetch_all(conn)
        .await
}

/// Compare-and-set: moves the payout from `pending` to `success`. `sent_amount` defaults to the requested amount.
pub async fn complete(
    id: i64,
    evidence: &SettlementEvidence,
    conn: &mut SqliteConnection,
) -> Result<Option<Payout>, sqlx::Error> {
    sqlx::query_as(
        r#"
            UPDATE payouts SET
                status = $2,
                sent_amount = COALESCE($3, request_amount),
                transaction_id = COALESCE($4, transaction_id),
                update_by = COALESCE($5, update_by),
                updated_at = CURRENT_TIMESTAMP
            WHERE id = $1 AND status = $6
            RETURNING *;
        "#,
    )
    .bind(id)
    .bind(PayoutStatus::Success)
    .bind(evidence.amount)
    .bind(evidence.transaction_id.as_deref())
    .bind(evidence.update_by.as_deref())
    .bind(PayoutStatus::Pending)
    .fetch_optional(conn)
    .await
}

/// Compare-and-set: moves the payout from `pending` to `status`.
pub async fn close(
    id: i64,
    status: PayoutStatus,
    update_by: Option<&str>,
    conn: &mut SqliteConnection,
) -> Result<Option<Payout>, sqlx::Error> {
    sqlx::query_as(
        r#"
            UPDATE payouts SET status = $2, update_by = COALESCE($3, update_by), updated_at = CURRENT_TIMESTAMP
            WHERE id = $1 AND status = $4
            RETURNING *;
        "#,
    )
    .bind(id)
    .bind(status)
    .bind(update_by)
    .bind(PayoutStatus::Pending)
    .fetch_optional(conn)
    .await
}
