//! # SQLite Database methods
//!
//! This module contains "low-level" SQLite database interactions.
//!
//! All these interactions are simple functions (rather than stateful structs) that accept a `&mut SqliteConnection`
//! argument. Callers can obtain a connection from a pool, or open an atomic transaction as the need arises and call
//! through to the functions without any other changes.
use std::{str::FromStr, time::Duration};

use log::info;
use sqlx::{
    sqlite::{SqliteConnectOptions, SqliteJournalMode, SqlitePoolOptions},
    Error as SqlxError,
    SqlitePool,
};

pub mod agents;
pub mod forwarded_sms;
pub mod merchants;
pub mod payins;
pub mod payment_requests;
pub mod payouts;
pub mod withdrawals;

const BUSY_TIMEOUT: Duration = Duration::from_secs(30);

/// Opens a connection pool. The database file is created if it does not exist yet.
///
/// WAL mode lets readers proceed while a settlement holds the write lock. Writers queue behind each other for up to
/// [`BUSY_TIMEOUT`].
pub async fn new_pool(url: &str, max_connections: u32) -> Result<SqlitePool, SqlxError> {
    let options = SqliteConnectOptions::from_str(url)?
        .create_if_missing(true)
        .journal_mode(SqliteJournalMode::Wal)
        .busy_timeout(BUSY_TIMEOUT)
        .foreign_keys(true);
    let pool = SqlitePoolOptions::new().max_connections(max_connections).connect_with(options).await?;
    info!("🗃️ Connection pool for {url} opened with up to {max_connections} connections");
    Ok(pool)
}

/// A random lowercase hex string made from `n_bytes` random bytes.
pub fn random_hex(n_bytes: usize) -> String {
    (0..n_bytes).map(|_| format!("{:02x}", rand::random::<u8>())).collect()
}
