use mpg_common::Paisa;
use sqlx::SqliteConnection;

use crate::{
    db_types::{NewPayin, Payin, PayinStatus, Provider, SettlementEvidence},
    traits::LedgerError,
};

pub async fn insert_payin(payin: NewPayin, conn: &mut SqliteConnection) -> Result<Payin, LedgerError> {
    let payin = sqlx::query_as(
        r#"
            INSERT INTO payins (merchant_id, agent_account, payer_account, expected_amount, provider, payment_type)
            VALUES ($1, $2, $3, $4, $5, $6)
            RETURNING *;
        "#,
    )
    .bind(payin.merchant_id)
    .bind(payin.agent_account.trim())
    .bind(payin.payer_account)
    .bind(payin.expected_amount)
    .bind(payin.provider)
    .bind(payin.payment_type)
    .fetch_one(conn)
    .await?;
    Ok(payin)
}

pub async fn fetch_payin(id: i64, conn: &mut SqliteConnection) -> Result<Option<Payin>, sqlx::Error> {
    sqlx::query_as("SELECT * FROM payins WHERE id = $1").bind(id).fetch_optional(conn).await
}

/// Pending payins for the agent account and amount, oldest first.
pub async fn fetch_pending(
    agent_account: &str,
    amount: Paisa,
    conn: &mut SqliteConnection,
) -> Result<Vec<Payin>, sqlx::Error> {
    sqlx::query_as(
        r#"
            SELECT * FROM payins
            WHERE agent_account = $1 AND expected_amount = $2 AND status = $3
            ORDER BY created_at, id
        "#,
    )
    .bind(agent_account)
    .bind(amount)
    .bind(PayinStatus::Pending)
    .fetch_all(conn)
    .await
}

pub async fn fetch_by_external_id(
    provider: Provider,
    transaction_id: &str,
    conn: &mut SqliteConnection,
) -> Result<Option<Payin>, sqlx::Error> {
    sqlx::query_as("SELECT * FROM payins WHERE provider = $1 AND transaction_id = $2")
        .bind(provider)
        .bind(transaction_id)
        .fetch_optional(conn)
        .await
}

pub async fn fetch_for_merchant(merchant_id: i64, conn: &mut SqliteConnection) -> Result<Vec<Payin>, sqlx::Error> {
    sqlx::query_as("SELECT * FROM payins WHERE merchant_id = $1 ORDER BY created_at DESC, id DESC")
        .bind(merchant_id)
        .fetch_all(conn)
        .await
}

/// Compare-and-set: moves the payin from `pending` to `completed`, recording the settlement evidence.
///
/// Returns `None` if the payin does not exist or is no longer pending.
pub async fn complete(
    id: i64,
    evidence: &SettlementEvidence,
    conn: &mut SqliteConnection,
) -> Result<Option<Payin>, sqlx::Error> {
    sqlx::query_as(
        r#"
            UPDATE payins SET
                status = $2,
                received_amount = COALESCE($3, expected_amount),
                payer_account = COALESCE($4, payer_account),
                transaction_id = COALESCE($5, transaction_id),
                update_by = COALESCE($6, update_by),
                updated_at = CURRENT_TIMESTAMP
            WHERE id = $1 AND status = $7
            RETURNING *;
        "#,
    )
    .bind(id)
    .bind(PayinStatus::Completed)
    .bind(evidence.amount)
    .bind(evidence.counterparty.as_deref())
    .bind(evidence.transaction_id.as_deref())
    .bind(evidence.update_by.as_deref())
    .bind(PayinStatus::Pending)
    .fetch_optional(conn)
    .await
}

/// Compare-and-set: moves the payin from `pending` to `status`.
///
/// Returns `None` if the payin does not exist or is no longer pending.
pub async fn close(
    id: i64,
    status: PayinStatus,
    update_by: Option<&str>,
    conn: &mut SqliteConnection,
) -> Result<Option<Payin>, sqlx::Error> {
    sqlx::query_as(
        r#"
            UPDATE payins SET status = $2, update_by = COALESCE($3, update_by), updated_at = CURRENT_TIMESTAMP
            WHERE id = $1 AND status = $4
            RETURNING *;
        "#,
    )
    .bind(id)
    .bind(status)
    .bind(update_by)
    .bind(PayinStatus::Pending)
    .fetch_optional(conn)
    .await
}
