use log::*;
use sqlx::SqliteConnection;

use crate::{
    db_types::{Agent, AgentAccount, CommissionRate, NewAgent, NewAgentAccount},
    ledger::{AgentAccountDelta, AgentDelta},
    traits::LedgerError,
};

pub async fn insert_agent(agent: NewAgent, conn: &mut SqliteConnection) -> Result<Agent, sqlx::Error> {
    sqlx::query_as(
        r#"
            INSERT INTO agents (name, deposit_commission, withdraw_commission) VALUES ($1, $2, $3)
            RETURNING *;
        "#,
    )
    .bind(agent.name)
    .bind(agent.deposit_commission)
    .bind(agent.withdraw_commission)
    .fetch_one(conn)
    .await
}

pub async fn fetch_agent(id: i64, conn: &mut SqliteConnection) -> Result<Option<Agent>, sqlx::Error> {
    sqlx::query_as("SELECT * FROM agents WHERE id = $1").bind(id).fetch_optional(conn).await
}

pub async fn update_commissions(
    id: i64,
    deposit_commission: CommissionRate,
    withdraw_commission: CommissionRate,
    conn: &mut SqliteConnection,
) -> Result<Option<Agent>, sqlx::Error> {
    sqlx::query_as(
        r#"
            UPDATE agents SET deposit_commission = $2, withdraw_commission = $3, updated_at = CURRENT_TIMESTAMP
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

pub async fn apply_delta(agent_id: i64, delta: &AgentDelta, conn: &mut SqliteConnection) -> Result<(), LedgerError> {
    let result = sqlx::query(
        r#"
            UPDATE agents SET
                balance = balance + $2,
                providercost = providercost + $3,
                totalpayment = totalpayment + $4,
                updated_at = CURRENT_TIMESTAMP
            WHERE id = $1
        "#,
    )
    .bind(agent_id)
    .bind(delta.balance)
    .bind(delta.providercost)
    .bind(delta.totalpayment)
    .execute(conn)
    .await?;
    if result.rows_affected() == 1 {
        trace!("🗃️ Agent #{agent_id} adjusted by {delta:?}");
        Ok(())
    } else {
        Err(LedgerError::InconsistentLedgerWrite(format!("Agent #{agent_id} could not be updated")))
    }
}

pub async fn insert_account(
    agent_id: i64,
    account: NewAgentAccount,
    conn: &mut SqliteConnection,
) -> Result<AgentAccount, sqlx::Error> {
    sqlx::query_as(
        r#"
            INSERT INTO agent_accounts (agent_id, provider, account_number) VALUES ($1, $2, $3)
            RETURNING *;
        "#,
    )
    .bind(agent_id)
    .bind(account.provider)
    .bind(account.account_number.trim())
    .fetch_one(conn)
    .await
}

pub async fn fetch_accounts(agent_id: i64, conn: &mut SqliteConnection) -> Result<Vec<AgentAccount>, sqlx::Error> {
    sqlx::query_as("SELECT * FROM agent_accounts WHERE agent_id = $1 ORDER BY id").bind(agent_id).fetch_all(conn).await
}

pub async fn account_by_number(
    account_number: &str,
    conn: &mut SqliteConnection,
) -> Result<Option<AgentAccount>, sqlx::Error> {
    sqlx::query_as("SELECT * FROM agent_accounts WHERE account_number = $1")
        .bind(account_number.trim())
        .fetch_optional(conn)
        .await
}

pub async fn apply_account_delta(
    account_id: i64,
    delta: &AgentAccountDelta,
    conn: &mut SqliteConnection,
) -> Result<(), LedgerError> {
    let result = sqlx::query(
        r#"
            UPDATE agent_accounts SET total_order = total_order + $2, total_received = total_received + $3
            WHERE id = $1
        "#,
    )
    .bind(account_id)
    .bind(delta.total_order)
    .bind(delta.total_received)
    .execute(conn)
    .await?;
    if result.rows_affected() == 1 {
        Ok(())
    } else {
        Err(LedgerError::InconsistentLedgerWrite(format!("Agent account #{account_id} could not be updated")))
    }
}
