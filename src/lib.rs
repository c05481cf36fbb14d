//! # Frog Engine
//!
//! An authoritative per-table engine for Frog, a three-handed 36-card
//! bidding and trick-taking game played for tokens.
//!
//! The core is one long-lived state machine per table ([`TableState`]),
//! wrapped in a tokio actor so all mutation is single-writer. Token
//! movements go through a ledger gateway trait with a Postgres
//! implementation.
//!
//! ## Architecture
//!
//! A table moves through twelve phases:
//!
//! - **WaitingForPlayers / ReadyToStart**: seating
//! - **DealingPending**: buy-ins collected, dealer owes a shuffle
//! - **Bidding**: Pass < Frog < Solo < Heart Solo, with the frog
//!   bidder's one-shot upgrade interrupt
//! - **AllPassWidowReveal**: everyone passed; show the widow, redeal
//! - **FrogWidowExchange / TrumpSelection**: contract setup
//! - **Playing / TrickComplete**: eleven tricks with follow-suit and
//!   trump-break rules
//! - **AwaitingNextRound**: scored, waiting for the next deal trigger
//! - **GameOver**: settled, auto-resets shortly after
//!
//! Alongside the phases run three side protocols: insurance (a bidder
//! vs. defenders side bet on three-seat tables), draw-by-agreement
//! votes, and forfeiture timers against disconnected players.
//!
//! ## Core Modules
//!
//! - [`game`]: cards, bidding, insurance, scoring, and the table state
//!   machine
//! - [`table`]: the async actor and its message protocol
//! - [`ledger`]: the token ledger gateway and its Postgres backend
//! - [`db`]: connection pooling
//!
//! ## Example
//!
//! ```
//! use frog_engine::game::{TableState, TimerSettings};
//!
//! // Create a fresh table with a 100-token buy-in
//! let table = TableState::new("lily-pad", 100, TimerSettings::default());
//! ```

/// Core game logic, entities, and the table state machine.
pub mod game;
pub use game::{
    ActionError, Bid, BidAction, Card, ClientView, DrawChoice, Phase, PlayerName, Rank, Suit,
    TableState, TimerSettings,
};

/// Async table actor and message protocol.
pub mod table;
pub use table::{TableActor, TableConfig, TableHandle, TableMessage, TableResponse};

/// Token ledger: accounts, game records, transactions, stats.
pub mod ledger;
pub use ledger::{GameId, LedgerError, LedgerGateway, PgLedger, TransactionType};

/// PostgreSQL connection pooling.
pub mod db;
pub use db::{Database, DatabaseConfig};
