//! Ledger data models.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Identifier of a game record in the ledger.
#[derive(Clone, Copy, Debug, Eq, Hash, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct GameId(pub i64);

impl fmt::Display for GameId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Ledger transaction categories. Buy-ins are the only debits; every
/// other type credits a player account.
#[derive(Clone, Copy, Debug, Eq, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TransactionType {
    BuyIn,
    WinPayout,
    WashPayout,
    ForfeitLoss,
    ForfeitPayout,
    AdminAdjust,
}

impl fmt::Display for TransactionType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TransactionType::BuyIn => write!(f, "buy_in"),
            TransactionType::WinPayout => write!(f, "win_payout"),
            TransactionType::WashPayout => write!(f, "wash_payout"),
            TransactionType::ForfeitLoss => write!(f, "forfeit_loss"),
            TransactionType::ForfeitPayout => write!(f, "forfeit_payout"),
            TransactionType::AdminAdjust => write!(f, "admin_adjust"),
        }
    }
}

/// Player token account.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Account {
    pub user_id: i64,
    pub balance: i64,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// One row of the append-only transaction ledger.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LedgerEntry {
    pub id: i64,
    pub game_id: Option<GameId>,
    pub user_id: i64,
    pub tx_type: TransactionType,
    pub amount: i64,
    pub balance_after: i64,
    pub idempotency_key: String,
    pub description: Option<String>,
    pub created_at: DateTime<Utc>,
}

/// A game record as the ledger sees it: created at buy-in time,
/// finalized with an outcome string when the table settles.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GameRecord {
    pub id: GameId,
    pub table_name: String,
    pub buy_in: i64,
    pub outcome: Option<String>,
    pub created_at: DateTime<Utc>,
    pub finished_at: Option<DateTime<Utc>>,
}

/// Lifetime win/loss/wash counters per player.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct PlayerStats {
    pub user_id: i64,
    pub wins: i64,
    pub losses: i64,
    pub washes: i64,
}
