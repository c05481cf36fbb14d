//! Token ledger: accounts, game records, and the gateway tables settle
//! through.
//!
//! This module implements:
//! - Append-only transaction ledger with idempotency keys
//! - Atomic all-or-nothing multi-player buy-in at game start
//! - Game records finalized with an outcome string
//! - Lifetime win/loss/wash stats per player
//!
//! ## Example
//!
//! ```no_run
//! use frog_engine::db::Database;
//! use frog_engine::ledger::{LedgerGateway, PgLedger};
//! use std::sync::Arc;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let db = Database::new(&Default::default()).await?;
//!     let ledger = PgLedger::new(Arc::new(db.pool().clone()));
//!
//!     let players = vec![(1, "ana".to_string()), (2, "ben".to_string()), (3, "cal".to_string())];
//!     let game_id = ledger.start_game("lily-pad", 100, &players).await?;
//!     println!("Game {game_id} started, buy-ins collected");
//!
//!     Ok(())
//! }
//! ```

pub mod errors;
pub mod gateway;
pub mod manager;
pub mod models;

pub use errors::{LedgerError, LedgerResult};
pub use gateway::LedgerGateway;
pub use manager::PgLedger;
pub use models::{Account, GameId, GameRecord, LedgerEntry, PlayerStats, TransactionType};
