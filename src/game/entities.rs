//! Shared table entities: players, seats, bids, phases, trick state.

use serde::{Deserialize, Serialize};
use std::{
    collections::HashMap,
    fmt,
    time::{Duration, Instant},
};
use uuid::Uuid;

use super::{
    bidding::BiddingState,
    cards::{Card, Suit},
};

/// Score every participant starts a game with.
pub const STARTING_SCORE: i32 = 120;

/// Synthetic participant added to 3-seat tables. It absorbs one
/// opponent share of every exchange so the bidder always settles
/// against three opponents.
pub const KITTY_NAME: &str = "kitty";

/// Display name of a player, unique per table.
#[derive(Clone, Debug, Eq, Hash, Ord, PartialEq, PartialOrd, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PlayerName(String);

impl PlayerName {
    pub fn new(name: impl Into<String>) -> Self {
        Self(name.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// The placeholder participant of 3-seat tables.
    pub fn kitty() -> Self {
        Self(KITTY_NAME.to_string())
    }
}

impl fmt::Display for PlayerName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<&str> for PlayerName {
    fn from(value: &str) -> Self {
        Self::new(value)
    }
}

/// One seat at the table. Spectators occupy seats too but never enter
/// `active_order` or the scores map.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Seat {
    pub name: PlayerName,
    pub user_id: i64,
    /// Transport session currently attached, if any.
    pub session: Option<Uuid>,
    pub is_spectator: bool,
    pub is_disconnected: bool,
}

/// The fixed bid hierarchy: Frog < Solo < Heart Solo. Passing is an
/// action, not a bid.
#[derive(Clone, Copy, Debug, Eq, Hash, Ord, PartialEq, PartialOrd, Serialize, Deserialize)]
pub enum Bid {
    Frog,
    Solo,
    HeartSolo,
}

impl Bid {
    /// Stake multiplier applied to exchanges and insurance bounds.
    pub fn multiplier(self) -> i32 {
        match self {
            Self::Frog => 1,
            Self::Solo => 2,
            Self::HeartSolo => 3,
        }
    }

    /// Trump fixed by the bid itself, if any. Frog and Heart Solo are
    /// always hearts; Solo lets the bidder choose.
    pub fn fixed_trump(self) -> Option<Suit> {
        match self {
            Self::Frog | Self::HeartSolo => Some(Suit::Hearts),
            Self::Solo => None,
        }
    }
}

impl fmt::Display for Bid {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let repr = match self {
            Self::Frog => "frog",
            Self::Solo => "solo",
            Self::HeartSolo => "heart solo",
        };
        write!(f, "{repr}")
    }
}

/// The settled contract a round is played under.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Contract {
    pub bidder: PlayerName,
    pub bid: Bid,
    pub trump: Suit,
}

/// Interrupt window for the original frog bidder after a later solo bid.
#[derive(Clone, Debug)]
pub struct FrogUpgrade {
    pub frog_bidder: PlayerName,
    pub standing_bidder: PlayerName,
    pub standing_bid: Bid,
}

/// Live trick-play bookkeeping for one round.
#[derive(Clone, Debug, Default)]
pub struct TrickState {
    /// Cards on the table this trick, in play order.
    pub plays: Vec<(PlayerName, Card)>,
    pub lead_suit: Option<Suit>,
    pub trump_broken: bool,
    /// Completed tricks per capturing player.
    pub captured: HashMap<PlayerName, Vec<Vec<Card>>>,
    pub tricks_played: u8,
    /// Most recently completed trick, kept for the linger display.
    pub last_trick: Option<(PlayerName, Vec<(PlayerName, Card)>)>,
}

/// State of one round of trick play.
#[derive(Clone, Debug)]
pub struct PlayState {
    pub contract: Contract,
    pub trick: TrickState,
    /// Index into the round order of the player to act.
    pub turn_idx: usize,
}

/// Table lifecycle phases. Phase-specific payloads ride in the variant,
/// so bidding state cannot be touched during play and vice versa.
#[derive(Debug)]
pub enum Phase {
    WaitingForPlayers,
    ReadyToStart,
    DealingPending,
    Bidding(BiddingState),
    AwaitingFrogUpgrade(FrogUpgrade),
    AllPassWidowReveal,
    FrogWidowExchange(Contract),
    TrumpSelection { bidder: PlayerName, bid: Bid },
    Playing(PlayState),
    TrickComplete(PlayState),
    AwaitingNextRound,
    GameOver,
}

impl Phase {
    /// Stable label sent to clients.
    pub fn label(&self) -> &'static str {
        match self {
            Self::WaitingForPlayers => "Waiting for Players",
            Self::ReadyToStart => "Ready to Start",
            Self::DealingPending => "Dealing Pending",
            Self::Bidding(_) => "Bidding Phase",
            Self::AwaitingFrogUpgrade(_) => "Awaiting Frog Upgrade Decision",
            Self::AllPassWidowReveal => "All Pass Widow Reveal",
            Self::FrogWidowExchange(_) => "Frog Widow Exchange",
            Self::TrumpSelection { .. } => "Trump Selection",
            Self::Playing(_) => "Playing Phase",
            Self::TrickComplete(_) => "Trick Complete",
            Self::AwaitingNextRound => "Awaiting Next Round Trigger",
            Self::GameOver => "Game Over",
        }
    }

    /// Phases during which a game is in progress, i.e. forfeits make
    /// sense and leaving is a disconnection rather than an unseat.
    pub fn is_in_round(&self) -> bool {
        matches!(
            self,
            Self::DealingPending
                | Self::Bidding(_)
                | Self::AwaitingFrogUpgrade(_)
                | Self::AllPassWidowReveal
                | Self::FrogWidowExchange(_)
                | Self::TrumpSelection { .. }
                | Self::Playing(_)
                | Self::TrickComplete(_)
                | Self::AwaitingNextRound
        )
    }

    /// Active trick play, the only window a draw vote may open in.
    pub fn is_active_play(&self) -> bool {
        matches!(self, Self::Playing(_) | Self::TrickComplete(_))
    }
}

/// A player's stance in a draw vote.
#[derive(Clone, Copy, Debug, Eq, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DrawChoice {
    /// End the game and refund every buy-in.
    Wash,
    /// End the game and split the pot by current score.
    Split,
    /// Veto; play on.
    No,
}

/// A running draw vote.
#[derive(Clone, Debug)]
pub struct DrawVote {
    pub requested_by: PlayerName,
    pub votes: HashMap<PlayerName, DrawChoice>,
    /// Players whose vote is awaited (all non-spectators).
    pub expected: Vec<PlayerName>,
    pub deadline: Instant,
}

impl DrawVote {
    pub fn is_complete(&self) -> bool {
        self.expected.iter().all(|p| self.votes.contains_key(p))
    }
}

/// A running forfeit countdown against a disconnected player.
#[derive(Clone, Debug)]
pub struct ForfeitTimer {
    pub target: PlayerName,
    pub armed_by: PlayerName,
    pub deadline: Instant,
}

/// Per-player end-of-game stat bucket.
#[derive(Clone, Copy, Debug, Eq, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StatOutcome {
    Win,
    Loss,
    Wash,
}

/// Immutable summary of a completed round, kept until the next deal.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct RoundSummary {
    pub bidder: PlayerName,
    pub bid: Bid,
    pub trump: Suit,
    pub bidder_points: u32,
    pub defender_points: u32,
    /// Score change per participant, placeholder included.
    pub deltas: HashMap<PlayerName, i32>,
    pub insurance_executed: bool,
    pub round_message: String,
    pub game_over: bool,
}

/// Timer durations, overridable through `TableConfig` so tests can
/// shrink them.
#[derive(Clone, Copy, Debug, Serialize, Deserialize)]
pub struct TimerSettings {
    /// All-pass widow reveal before auto-advancing to the next deal.
    #[serde(with = "duration_secs")]
    pub all_pass_advance: Duration,
    /// Completed-trick display linger.
    #[serde(with = "duration_secs")]
    pub trick_linger: Duration,
    /// Draw vote countdown.
    #[serde(with = "duration_secs")]
    pub draw_vote: Duration,
    /// Forfeit countdown against a disconnected player.
    #[serde(with = "duration_secs")]
    pub forfeit: Duration,
    /// Delay before the table auto-resets after a finished game.
    #[serde(with = "duration_secs")]
    pub post_game_reset: Duration,
}

impl Default for TimerSettings {
    fn default() -> Self {
        Self {
            all_pass_advance: Duration::from_secs(5),
            trick_linger: Duration::from_secs(2),
            draw_vote: Duration::from_secs(30),
            forfeit: Duration::from_secs(120),
            post_game_reset: Duration::from_secs(10),
        }
    }
}

mod duration_secs {
    use serde::{Deserialize, Deserializer, Serialize, Serializer};
    use std::time::Duration;

    pub fn serialize<S: Serializer>(d: &Duration, s: S) -> Result<S::Ok, S::Error> {
        d.as_secs().serialize(s)
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(d: D) -> Result<Duration, D::Error> {
        Ok(Duration::from_secs(u64::deserialize(d)?))
    }
}
