//! Token ledger
//!
//! Debits the video owner's exposure-token balance once per credited view.
//! The debit is all-or-nothing: the balance never goes below zero and an
//! insufficient balance deducts nothing. There is no retry; a missed debit
//! is an accepted loss.

use crate::db;
use crate::error::Result;
use serde::{Deserialize, Serialize};
use sqlx::{Pool, Sqlite};
use std::sync::Arc;
use tracing::{debug, info};
use vwatch_common::time::now_millis;

/// Cost of one credited view as a function of video duration
///
/// Implementations must be deterministic and return a finite,
/// non-negative value.
pub trait CostCurve: Send + Sync {
    fn cost(&self, duration_seconds: u32) -> f64;
}

/// `duration / seconds_per_token` tokens
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LinearCost {
    pub seconds_per_token: f64,
}

impl LinearCost {
    pub fn new(seconds_per_token: f64) -> Self {
        Self { seconds_per_token }
    }
}

impl CostCurve for LinearCost {
    fn cost(&self, duration_seconds: u32) -> f64 {
        if self.seconds_per_token <= 0.0 {
            return 0.0;
        }
        duration_seconds as f64 / self.seconds_per_token
    }
}

/// Why a debit deducted nothing
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DebitRejection {
    InsufficientBalance,
}

/// Result of a debit attempt
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum DebitOutcome {
    Debited {
        tokens_deducted: f64,
        remaining_balance: f64,
    },
    Rejected {
        reason: DebitRejection,
    },
}

impl DebitOutcome {
    pub fn is_success(&self) -> bool {
        matches!(self, DebitOutcome::Debited { .. })
    }
}

/// Wire shape: `{success, tokens_deducted, remaining_balance}` or `{success: false, reason}`
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct DebitResponse {
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tokens_deducted: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub remaining_balance: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reason: Option<DebitRejection>,
}

impl From<DebitOutcome> for DebitResponse {
    fn from(outcome: DebitOutcome) -> Self {
        match outcome {
            DebitOutcome::Debited {
                tokens_deducted,
                remaining_balance,
            } => Self {
                success: true,
                tokens_deducted: Some(tokens_deducted),
                remaining_balance: Some(remaining_balance),
                reason: None,
            },
            DebitOutcome::Rejected { reason } => Self {
                success: false,
                tokens_deducted: None,
                remaining_balance: None,
                reason: Some(reason),
            },
        }
    }
}

#[derive(Clone)]
pub struct TokenLedger {
    pool: Pool<Sqlite>,
    curve: Arc<dyn CostCurve>,
}

impl TokenLedger {
    pub fn new(pool: Pool<Sqlite>, curve: Arc<dyn CostCurve>) -> Self {
        Self { pool, curve }
    }

    /// Cost the curve assigns to a duration, sanitized to a finite non-negative value
    pub fn cost_for(&self, duration_seconds: u32) -> f64 {
        let cost = self.curve.cost(duration_seconds);
        if cost.is_finite() && cost > 0.0 {
            cost
        } else {
            0.0
        }
    }

    /// Debit the owner of `video_id` for one credited view
    ///
    /// `Err` means the ledger could not be reached; rejections are `Ok`.
    pub async fn debit(&self, video_id: &str, owner_id: &str, duration_seconds: u32) -> Result<DebitOutcome> {
        let cost = self.cost_for(duration_seconds);

        if cost == 0.0 {
            debug!("Zero-cost view of {} ({}s); nothing to debit", video_id, duration_seconds);
            return Ok(DebitOutcome::Debited {
                tokens_deducted: 0.0,
                remaining_balance: self.balance(owner_id).await?,
            });
        }

        match db::token_balances::try_debit(&self.pool, owner_id, video_id, cost, now_millis()).await? {
            Some(remaining_balance) => {
                info!(
                    "Debited {:.4} tokens from {} for {} (remaining {:.4})",
                    cost, owner_id, video_id, remaining_balance
                );
                Ok(DebitOutcome::Debited {
                    tokens_deducted: cost,
                    remaining_balance,
                })
            }
            None => Ok(DebitOutcome::Rejected {
                reason: DebitRejection::InsufficientBalance,
            }),
        }
    }

    /// Current balance; owners without a row have zero
    pub async fn balance(&self, owner_id: &str) -> Result<f64> {
        Ok(db::token_balances::get_balance(&self.pool, owner_id)
            .await?
            .unwrap_or(0.0))
    }
}
