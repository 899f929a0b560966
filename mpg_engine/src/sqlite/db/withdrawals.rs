use sqlx::{QueryBuilder, Sqlite, SqliteConnection};

use crate::db_types::{NewWithdrawRequest, WithdrawRequest, WithdrawStatus};

pub async fn insert_withdrawal(
    request: NewWithdrawRequest,
    conn: &mut SqliteConnection,
) -> Result<WithdrawRequest, sqlx::Error> {
    sqlx::query_as(
        r#"
            INSERT INTO withdraw_requests (merchant_id, amount, payment_method, payment_details)
            VALUES ($1, $2, $3, $4)
            RETURNING *;
        "#,
    )
    .bind(request.merchant_id)
    .bind(request.amount)
    .bind(request.payment_details.method())
    .bind(request.payment_details.details_json())
    .fetch_one(conn)
    .await
}

pub async fn fetch_withdrawal(id: i64, conn: &mut SqliteConnection) -> Result<Option<WithdrawRequest>, sqlx::Error> {
    sqlx::query_as("SELECT * FROM withdraw_requests WHERE id = $1").bind(id).fetch_optional(conn).await
}

/// Withdrawal requests, newest first, optionally filtered by status.
pub async fn search_withdrawals(
    status: Option<WithdrawStatus>,
    conn: &mut SqliteConnection,
) -> Result<Vec<WithdrawRequest>, sqlx::Error> {
    let mut builder = QueryBuilder::<Sqlite>::new("SELECT * FROM withdraw_requests ");
    if let Some(status) = status {
        builder.push("WHERE status = ");
        builder.push_bind(status);
    }
    builder.push(" ORDER BY created_at DESC, id DESC");
    builder.build_query_as::<WithdrawRequest>().fetch_all(conn).await
}

/// Compare-and-set: moves the request from `pending` to `status`. Returns `None` if the request is no longer pending.
pub async fn update_status(
    id: i64,
    status: WithdrawStatus,
    conn: &mut SqliteConnection,
) -> Result<Option<WithdrawRequest>, sqlx::Error> {
    sqlx::query_as(
        r#"
            UPDATE withdraw_requests SET status = $2, updated_at = CURRENT_TIMESTAMP
            WHERE id = $1 AND status = $3
            RETURNING *;
        "#,
    )
    .bind(id)
    .bind(status)
    .bind(WithdrawStatus::Pending)
    .fetch_optional(conn)
    .await
}
