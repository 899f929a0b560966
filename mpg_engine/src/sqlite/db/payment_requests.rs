use sqlx::SqliteConnection;

use crate::db_types::{NewPaymentRequest, PaymentRequest, PaymentRequestStatus};

pub async fn insert_payment_request(
    request: NewPaymentRequest,
    reference_id: &str,
    conn: &mut SqliteConnection,
) -> Result<PaymentRequest, sqlx::Error> {
    sqlx::query_as(
        r#"
            INSERT INTO payment_requests (merchant_id, reference_id, email, name, amount, provider)
            VALUES ($1, $2, $3, $4, $5, $6)
            RETURNING *;
        "#,
    )
    .bind(request.merchant_id)
    .bind(reference_id)
    .bind(request.email)
    .bind(request.name)
    .bind(request.amount)
    .bind(request.provider)
    .fetch_one(conn)
    .await
}

pub async fn fetch_payment_request(
    id: i64,
    conn: &mut SqliteConnection,
) -> Result<Option<PaymentRequest>, sqlx::Error> {
    sqlx::query_as("SELECT * FROM payment_requests WHERE id = $1").bind(id).fetch_optional(conn).await
}

pub async fn fetch_for_merchant(
    merchant_id: i64,
    conn: &mut SqliteConnection,
) -> Result<Vec<PaymentRequest>, sqlx::Error> {
    sqlx::query_as("SELECT * FROM payment_requests WHERE merchant_id = $1 ORDER BY created_at DESC, id DESC")
        .bind(merchant_id)
        .fetch_all(conn)
        .await
}

/// Compare-and-set: moves the request from `pending` to `status`. Returns `None` if the request is no longer pending.
pub async fn update_status(
    id: i64,
    status: PaymentRequestStatus,
    conn: &mut SqliteConnection,
) -> Result<Option<PaymentRequest>, sqlx::Error> {
    sqlx::query_as(
        r#"
            UPDATE payment_requests SET status = $2, updated_at = CURRENT_TIMESTAMP
            WHERE id = $1 AND status = $3
            RETURNING *;
        "#,
    )
    .bind(id)
    .bind(status)
    .bind(PaymentRequestStatus::Pending)
    .fetch_optional(conn)
    .await
}
