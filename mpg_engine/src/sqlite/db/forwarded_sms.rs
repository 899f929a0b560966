use log::*;
use sqlx::SqliteConnection;

use crate::db_types::{ForwardedSms, ForwardedSmsStatus, NewForwardedSms};

/// Inserts the SMS, returning `false` in the second parameter if an SMS with the same provider transaction id was
/// already stored. In that case the existing record is returned.
pub async fn idempotent_insert(
    sms: NewForwardedSms,
    conn: &mut SqliteConnection,
) -> Result<(ForwardedSms, bool), sqlx::Error> {
    let provider = sms.provider.clone();
    let transaction_id = sms.transaction_id.clone();
    match insert(sms, conn).await? {
        Some(sms) => {
            debug!("🗃️ Forwarded SMS #{} stored", sms.id);
            Ok((sms, true))
        },
        None => {
            let existing = sqlx::query_as("SELECT * FROM forwarded_sms WHERE provider = $1 AND transaction_id = $2")
                .bind(provider)
                .bind(transaction_id)
                .fetch_one(conn)
                .await?;
            Ok((existing, false))
        },
    }
}

async fn insert(sms: NewForwardedSms, conn: &mut SqliteConnection) -> Result<Option<ForwardedSms>, sqlx::Error> {
    sqlx::query_as(
        r#"
            INSERT INTO forwarded_sms (
                provider,
                agent_number,
                text,
                direction,
                amount,
                from_account,
                to_account,
                transaction_id,
                sms_timestamp,
                sent_stamp,
                received_stamp,
                failure_reason
            ) VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12)
            ON CONFLICT DO NOTHING
            RETURNING *;
        "#,
    )
    .bind(sms.provider)
    .bind(sms.agent_number)
    .bind(sms.text)
    .bind(sms.direction)
    .bind(sms.amount)
    .bind(sms.from_account)
    .bind(sms.to_account)
    .bind(sms.transaction_id)
    .bind(sms.sms_timestamp)
    .bind(sms.sent_stamp)
    .bind(sms.received_stamp)
    .bind(sms.failure_reason)
    .fetch_optional(conn)
    .await
}

pub async fn fetch_forwarded_sms(id: i64, conn: &mut SqliteConnection) -> Result<Option<ForwardedSms>, sqlx::Error> {
    sqlx::query_as("SELECT * FROM forwarded_sms WHERE id = $1").bind(id).fetch_optional(conn).await
}

pub async fn fetch_all(conn: &mut SqliteConnection) -> Result<Vec<ForwardedSms>, sqlx::Error> {
    sqlx::query_as("SELECT * FROM forwarded_sms ORDER BY created_at DESC, id DESC").fetch_all(conn).await
}

/// Compare-and-set: moves the SMS from `arrived` to `status`. Returns `None` if it is no longer `arrived`.
pub async fn update_status(
    id: i64,
    status: ForwardedSmsStatus,
    conn: &mut SqliteConnection,
) -> Result<Option<ForwardedSms>, sqlx::Error> {
    sqlx::query_as(
        r#"
            UPDATE forwarded_sms SET status = $2, updated_at = CURRENT_TIMESTAMP
            WHERE id = $1 AND status = $3
            RETURNING *;
        "#,
    )
    .bind(id)
    .bind(status)
    .bind(ForwardedSmsStatus::Arrived)
    .fetch_optional(conn)
    .await
}
