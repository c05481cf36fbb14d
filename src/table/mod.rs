//! Table module: the async actor wrapping one table's state machine.
//!
//! This module implements:
//! - `TableActor`: async actor owning a single Frog table
//! - Message-based communication with tokio channels
//! - Subscriber broadcast of state change notifications
//! - Table configuration
//!
//! ## Architecture
//!
//! Each table runs in a separate Tokio task with an mpsc message inbox
//! and a one-second tick interval that drives the table's deadline
//! timers. Mutation only ever happens on that task; callers get
//! responses over oneshot channels and fresh views on demand.
//!
//! ## Example
//!
//! ```ignore
//! use frog_engine::ledger::PgLedger;
//! use frog_engine::table::{TableActor, TableConfig};
//! use std::sync::Arc;
//!
//! #[tokio::main]
//! async fn main() {
//!     let pool = create_database_pool().await;
//!     let ledger = Arc::new(PgLedger::new(Arc::new(pool)));
//!     let config = TableConfig::default();
//!
//!     let (actor, handle) = TableActor::new(1, config, ledger);
//!
//!     tokio::spawn(actor.run());
//!
//!     // Use handle to send messages
//!     // handle.send(TableMessage::Join { ... }).await;
//! }
//! ```

pub mod actor;
pub mod config;
pub mod messages;

pub use actor::{TableActor, TableHandle};
pub use config::{TableConfig, TableId};
pub use messages::{StateChangeNotification, TableMessage, TableResponse};
