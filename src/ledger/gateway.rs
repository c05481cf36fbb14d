//! The gateway trait the table layer settles tokens through.
//!
//! Tables never touch storage directly; they speak this trait so tests
//! can substitute an in-memory double and the engine stays oblivious to
//! where balances actually live.

use async_trait::async_trait;

use super::{
    errors::LedgerResult,
    models::{Account, GameId, GameRecord, LedgerEntry, PlayerStats, TransactionType},
};
use crate::game::entities::StatOutcome;

#[async_trait]
pub trait LedgerGateway: Send + Sync {
    /// Create a game record and debit every listed player's buy-in in
    /// one atomic step. Either every player is debited and a fresh
    /// [`GameId`] comes back, or no balance moves at all.
    ///
    /// # Errors
    ///
    /// * [`LedgerError::InsufficientBalance`] names the first player
    ///   who cannot cover the buy-in; no one was charged.
    ///
    /// [`LedgerError::InsufficientBalance`]: super::errors::LedgerError::InsufficientBalance
    async fn start_game(
        &self,
        table_name: &str,
        buy_in: i64,
        players: &[(i64, String)],
    ) -> LedgerResult<GameId>;

    /// Append one credit against a running game record. `amount` must
    /// be non-negative; zero-amount entries are allowed so that losses
    /// leave an audit row.
    async fn post_transaction(
        &self,
        game_id: GameId,
        user_id: i64,
        tx_type: TransactionType,
        amount: i64,
        description: &str,
        idempotency_key: &str,
    ) -> LedgerResult<i64>;

    /// Finalize a game record with its outcome text.
    async fn record_outcome(&self, game_id: GameId, outcome: &str) -> LedgerResult<()>;

    /// Bump one player's lifetime win/loss/wash counter.
    async fn record_stat(&self, user_id: i64, outcome: StatOutcome) -> LedgerResult<()>;

    async fn account(&self, user_id: i64) -> LedgerResult<Account>;

    async fn game_record(&self, game_id: GameId) -> LedgerResult<GameRecord>;

    async fn stats(&self, user_id: i64) -> LedgerResult<PlayerStats>;

    /// Most recent ledger rows for a user, newest first.
    async fn entries(&self, user_id: i64, limit: i64) -> LedgerResult<Vec<LedgerEntry>>;
}
