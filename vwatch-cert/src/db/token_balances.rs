//! Token balance queries

use crate::error::Result;
use sqlx::{Pool, Sqlite};

/// One row of the debit audit trail
#[derive(Debug, Clone, PartialEq)]
pub struct LedgerEntry {
    pub owner_id: String,
    pub video_id: String,
    pub tokens: f64,
    pub remaining_balance: f64,
    pub created_at: i64,
}

/// Current balance; `None` when the owner has no row
pub async fn get_balance(db: &Pool<Sqlite>, owner_id: &str) -> Result<Option<f64>> {
    let balance: Option<f64> = sqlx::query_scalar("SELECT balance FROM token_balances WHERE owner_id = ?")
        .bind(owner_id)
        .fetch_optional(db)
        .await?;
    Ok(balance)
}

/// Set an owner's balance (provisioning; the certification engine never credits)
pub async fn set_balance(db: &Pool<Sqlite>, owner_id: &str, balance: f64) -> Result<()> {
    sqlx::query(
        r#"
        INSERT INTO token_balances (owner_id, balance)
        VALUES (?, ?)
        ON CONFLICT(owner_id) DO UPDATE SET balance = excluded.balance, updated_at = CURRENT_TIMESTAMP
        "#,
    )
    .bind(owner_id)
    .bind(balance.max(0.0))
    .execute(db)
    .await?;
    Ok(())
}

/// Deduct `tokens` if and only if the balance covers it
///
/// Returns the remaining balance, or `None` when the balance is
/// insufficient (nothing is deducted). The conditional UPDATE keeps the
/// check and the write in one statement.
pub async fn try_debit(
    db: &Pool<Sqlite>,
    owner_id: &str,
    video_id: &str,
    tokens: f64,
    now_ms: i64,
) -> Result<Option<f64>> {
    let mut tx = db.begin().await?;

    let updated = sqlx::query(
        r#"
        UPDATE token_balances
        SET balance = balance - ?, updated_at = CURRENT_TIMESTAMP
        WHERE owner_id = ? AND balance >= ?
        "#,
    )
    .bind(tokens)
    .bind(owner_id)
    .bind(tokens)
    .execute(&mut *tx)
    .await?;

    if updated.rows_affected() == 0 {
        tx.rollback().await?;
        return Ok(None);
    }

    let remaining: f64 = sqlx::query_scalar("SELECT balance FROM token_balances WHERE owner_id = ?")
        .bind(owner_id)
        .fetch_one(&mut *tx)
        .await?;

    sqlx::query(
        r#"
        INSERT INTO token_ledger_entries (owner_id, video_id, tokens, remaining_balance, created_at)
        VALUES (?, ?, ?, ?, ?)
        "#,
    )
    .bind(owner_id)
    .bind(video_id)
    .bind(tokens)
    .bind(remaining)
    .bind(now_ms)
    .execute(&mut *tx)
    .await?;

    tx.commit().await?;
    Ok(Some(remaining))
}

/// Debit history for an owner, oldest first
pub async fn ledger_entries(db: &Pool<Sqlite>, owner_id: &str) -> Result<Vec<LedgerEntry>> {
    let rows: Vec<(String, String, f64, f64, i64)> = sqlx::query_as(
        r#"
        SELECT owner_id, video_id, tokens, remaining_balance, created_at
        FROM token_ledger_entries
        WHERE owner_id = ?
        ORDER BY id
        "#,
    )
    .bind(owner_id)
    .fetch_all(db)
    .await?;

    Ok(rows
        .into_iter()
        .map(|r| LedgerEntry {
            owner_id: r.0,
            video_id: r.1,
            tokens: r.2,
            remaining_balance: r.3,
            created_at: r.4,
        })
        .collect())
}
