//! PostgreSQL ledger implementation.
#![allow(clippy::needless_raw_string_hashes)]

use async_trait::async_trait;
use sqlx::{PgPool, Postgres, Row, Transaction};
use std::sync::Arc;

use super::{
    errors::{LedgerError, LedgerResult},
    gateway::LedgerGateway,
    models::{Account, GameId, GameRecord, LedgerEntry, PlayerStats, TransactionType},
};
use crate::game::entities::StatOutcome;

/// Ledger manager backed by Postgres. Clone-cheap; the pool is shared.
#[derive(Clone)]
pub struct PgLedger {
    pool: Arc<PgPool>,
    default_balance: i64,
}

impl PgLedger {
    pub fn new(pool: Arc<PgPool>) -> Self {
        let default_balance = std::env::var("DEFAULT_ACCOUNT_BALANCE")
            .ok()
            .and_then(|v| v.parse().ok())
            .unwrap_or(10000);

        Self {
            pool,
            default_balance,
        }
    }

    /// Fetch a player's account, creating it with the default balance
    /// on first sight.
    pub async fn get_or_create_account(&self, user_id: i64) -> LedgerResult<Account> {
        let row = sqlx::query(
            r#"
            INSERT INTO accounts (user_id, balance, updated_at)
            VALUES ($1, $2, NOW())
            ON CONFLICT (user_id) DO UPDATE SET user_id = accounts.user_id
            RETURNING user_id, balance, created_at, updated_at
            "#,
        )
        .bind(user_id)
        .bind(self.default_balance)
        .fetch_one(self.pool.as_ref())
        .await?;

        Ok(account_from_row(&row))
    }

    /// Append one ledger row inside an open transaction.
    async fn create_entry(
        &self,
        tx: &mut Transaction<'_, Postgres>,
        game_id: Option<GameId>,
        user_id: i64,
        tx_type: TransactionType,
        amount: i64,
        balance_after: i64,
        idempotency_key: &str,
        description: Option<String>,
    ) -> LedgerResult<i64> {
        let row = sqlx::query(
            r#"
            INSERT INTO ledger_entries (game_id, user_id, tx_type, amount, balance_after, idempotency_key, description)
            VALUES ($1, $2, $3, $4, $5, $6, $7)
            RETURNING id
            "#,
        )
        .bind(game_id.map(|g| g.0))
        .bind(user_id)
        .bind(tx_type.to_string())
        .bind(amount)
        .bind(balance_after)
        .bind(idempotency_key)
        .bind(description)
        .fetch_one(&mut **tx)
        .await?;

        Ok(row.get("id"))
    }

    /// Atomically debit one account with a balance check, returning the
    /// new balance. Distinguishes a missing account from an
    /// insufficient one.
    async fn debit_checked(
        &self,
        tx: &mut Transaction<'_, Postgres>,
        user_id: i64,
        amount: i64,
    ) -> LedgerResult<i64> {
        let debited = sqlx::query(
            "UPDATE accounts
             SET balance = balance - $1, updated_at = NOW()
             WHERE user_id = $2 AND balance >= $1
             RETURNING balance",
        )
        .bind(amount)
        .bind(user_id)
        .fetch_optional(&mut **tx)
        .await?;

        match debited {
            Some(row) => Ok(row.get("balance")),
            None => {
                let check = sqlx::query("SELECT balance FROM accounts WHERE user_id = $1")
                    .bind(user_id)
                    .fetch_optional(&mut **tx)
                    .await?;
                match check {
                    Some(row) => Err(LedgerError::InsufficientBalance {
                        user_id,
                        available: row.get("balance"),
                        required: amount,
                    }),
                    None => Err(LedgerError::AccountNotFound(user_id)),
                }
            }
        }
    }
}

#[async_trait]
impl LedgerGateway for PgLedger {
    async fn start_game(
        &self,
        table_name: &str,
        buy_in: i64,
        players: &[(i64, String)],
    ) -> LedgerResult<GameId> {
        if buy_in <= 0 {
            return Err(LedgerError::InvalidAmount(buy_in));
        }

        let mut tx = self.pool.begin().await?;

        let game_row = sqlx::query(
            r#"
            INSERT INTO games (table_name, buy_in)
            VALUES ($1, $2)
            RETURNING id
            "#,
        )
        .bind(table_name)
        .bind(buy_in)
        .fetch_one(&mut *tx)
        .await?;
        let game_id = GameId(game_row.get("id"));

        // Debit in user-id order so concurrent starts cannot deadlock
        // on row locks.
        let mut ordered: Vec<&(i64, String)> = players.iter().collect();
        ordered.sort_by_key(|(user_id, _)| *user_id);

        for (user_id, name) in ordered {
            let new_balance = self.debit_checked(&mut tx, *user_id, buy_in).await?;
            self.create_entry(
                &mut tx,
                Some(game_id),
                *user_id,
                TransactionType::BuyIn,
                -buy_in,
                new_balance,
                &format!("buyin_{game_id}_{user_id}"),
                Some(format!("Buy-in for {name} at table {table_name}")),
            )
            .await?;
        }

        tx.commit().await?;
        Ok(game_id)
    }

    async fn post_transaction(
        &self,
        game_id: GameId,
        user_id: i64,
        tx_type: TransactionType,
        amount: i64,
        description: &str,
        idempotency_key: &str,
    ) -> LedgerResult<i64> {
        if amount < 0 {
            return Err(LedgerError::InvalidAmount(amount));
        }

        let mut tx = self.pool.begin().await?;

        let existing = sqlx::query("SELECT id FROM ledger_entries WHERE idempotency_key = $1")
            .bind(idempotency_key)
            .fetch_optional(&mut *tx)
            .await?;
        if existing.is_some() {
            return Err(LedgerError::DuplicateTransaction(idempotency_key.to_string()));
        }

        let current = sqlx::query("SELECT balance FROM accounts WHERE user_id = $1 FOR UPDATE")
            .bind(user_id)
            .fetch_optional(&mut *tx)
            .await?
            .ok_or(LedgerError::AccountNotFound(user_id))?;
        let current_balance: i64 = current.get("balance");

        let new_balance = current_balance
            .checked_add(amount)
            .ok_or(LedgerError::BalanceOverflow)?;

        sqlx::query("UPDATE accounts SET balance = $1, updated_at = NOW() WHERE user_id = $2")
            .bind(new_balance)
            .bind(user_id)
            .execute(&mut *tx)
            .await?;

        self.create_entry(
            &mut tx,
            Some(game_id),
            user_id,
            tx_type,
            amount,
            new_balance,
            idempotency_key,
            Some(description.to_string()),
        )
        .await?;

        tx.commit().await?;
        Ok(new_balance)
    }

    async fn record_outcome(&self, game_id: GameId, outcome: &str) -> LedgerResult<()> {
        let result = sqlx::query(
            "UPDATE games
             SET outcome = $1, finished_at = NOW()
             WHERE id = $2",
        )
        .bind(outcome)
        .bind(game_id.0)
        .execute(self.pool.as_ref())
        .await?;

        if result.rows_affected() == 0 {
            return Err(LedgerError::GameNotFound(game_id));
        }
        Ok(())
    }

    async fn record_stat(&self, user_id: i64, outcome: StatOutcome) -> LedgerResult<()> {
        let (wins, losses, washes) = match outcome {
            StatOutcome::Win => (1, 0, 0),
            StatOutcome::Loss => (0, 1, 0),
            StatOutcome::Wash => (0, 0, 1),
        };

        sqlx::query(
            r#"
            INSERT INTO player_stats (user_id, wins, losses, washes)
            VALUES ($1, $2, $3, $4)
            ON CONFLICT (user_id)
            DO UPDATE SET
                wins = player_stats.wins + EXCLUDED.wins,
                losses = player_stats.losses + EXCLUDED.losses,
                washes = player_stats.washes + EXCLUDED.washes
            "#,
        )
        .bind(user_id)
        .bind(wins)
        .bind(losses)
        .bind(washes)
        .execute(self.pool.as_ref())
        .await?;

        Ok(())
    }

    async fn account(&self, user_id: i64) -> LedgerResult<Account> {
        let row = sqlx::query(
            "SELECT user_id, balance, created_at, updated_at
             FROM accounts
             WHERE user_id = $1",
        )
        .bind(user_id)
        .fetch_optional(self.pool.as_ref())
        .await?
        .ok_or(LedgerError::AccountNotFound(user_id))?;

        Ok(account_from_row(&row))
    }

    async fn game_record(&self, game_id: GameId) -> LedgerResult<GameRecord> {
        let row = sqlx::query(
            "SELECT id, table_name, buy_in, outcome, created_at, finished_at
             FROM games
             WHERE id = $1",
        )
        .bind(game_id.0)
        .fetch_optional(self.pool.as_ref())
        .await?
        .ok_or(LedgerError::GameNotFound(game_id))?;

        Ok(GameRecord {
            id: GameId(row.get("id")),
            table_name: row.get("table_name"),
            buy_in: row.get("buy_in"),
            outcome: row.get("outcome"),
            created_at: row.get::<chrono::NaiveDateTime, _>("created_at").and_utc(),
            finished_at: row
                .get::<Option<chrono::NaiveDateTime>, _>("finished_at")
                .map(|t| t.and_utc()),
        })
    }

    async fn stats(&self, user_id: i64) -> LedgerResult<PlayerStats> {
        let row = sqlx::query(
            "SELECT user_id, wins, losses, washes
             FROM player_stats
             WHERE user_id = $1",
        )
        .bind(user_id)
        .fetch_optional(self.pool.as_ref())
        .await?;

        Ok(row
            .map(|r| PlayerStats {
                user_id: r.get("user_id"),
                wins: r.get("wins"),
                losses: r.get("losses"),
                washes: r.get("washes"),
            })
            .unwrap_or(PlayerStats {
                user_id,
                ..PlayerStats::default()
            }))
    }

    async fn entries(&self, user_id: i64, limit: i64) -> LedgerResult<Vec<LedgerEntry>> {
        let rows = sqlx::query(
            r#"
            SELECT id, game_id, user_id, tx_type, amount, balance_after, idempotency_key, description, created_at
            FROM ledger_entries
            WHERE user_id = $1
            ORDER BY created_at DESC
            LIMIT $2
            "#,
        )
        .bind(user_id)
        .bind(limit)
        .fetch_all(self.pool.as_ref())
        .await?;

        let entries = rows
            .into_iter()
            .map(|row| LedgerEntry {
                id: row.get("id"),
                game_id: row.get::<Option<i64>, _>("game_id").map(GameId),
                user_id: row.get("user_id"),
                tx_type: match row.get::<String, _>("tx_type").as_str() {
                    "buy_in" => TransactionType::BuyIn,
                    "win_payout" => TransactionType::WinPayout,
                    "wash_payout" => TransactionType::WashPayout,
                    "forfeit_loss" => TransactionType::ForfeitLoss,
                    "forfeit_payout" => TransactionType::ForfeitPayout,
                    _ => TransactionType::AdminAdjust,
                },
                amount: row.get("amount"),
                balance_after: row.get("balance_after"),
                idempotency_key: row.get("idempotency_key"),
                description: row.get("description"),
                created_at: row.get::<chrono::NaiveDateTime, _>("created_at").and_utc(),
            })
            .collect();

        Ok(entries)
    }
}

fn account_from_row(row: &sqlx::postgres::PgRow) -> Account {
    Account {
        user_id: row.get("user_id"),
        balance: row.get("balance"),
        created_at: row.get::<chrono::NaiveDateTime, _>("created_at").and_utc(),
        updated_at: row.get::<chrono::NaiveDateTime, _>("updated_at").and_utc(),
    }
}
