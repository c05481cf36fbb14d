//! Rules and state for the game itself: cards, bidding, insurance,
//! scoring, and the per-table state machine that ties them together.
//! Everything in here is synchronous and deterministic apart from the
//! shuffle; the async world lives in [`crate::table`].

pub mod bidding;
pub mod cards;
pub mod entities;
pub mod insurance;
pub mod scoring;
pub mod state_machine;

pub use bidding::{BidAction, BidError, BidOutcome, BiddingState};
pub use cards::{Card, Deck, ParseCardError, Rank, Suit, CARDS_PER_HAND, DECK_SIZE};
pub use entities::{
    Bid, Contract, DrawChoice, Phase, PlayerName, RoundSummary, Seat, StatOutcome, TimerSettings,
    STARTING_SCORE,
};
pub use insurance::{InsuranceError, InsuranceState};
pub use state_machine::{
    ActionError, ClientView, Effect, LedgerOp, Notification, TableState, MAX_ACTIVE_SEATS,
    MIN_ACTIVE_SEATS,
};
