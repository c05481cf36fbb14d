//! Table actor message types.

use tokio::sync::oneshot;
use uuid::Uuid;

use crate::game::{
    cards::{Card, Suit},
    entities::{DrawChoice, PlayerName},
    state_machine::ClientView,
    BidAction,
};

/// Messages that can be sent to a `TableActor`.
#[derive(Debug)]
pub enum TableMessage {
    /// Take a seat (or the spectator gallery)
    Join {
        name: PlayerName,
        user_id: i64,
        session: Uuid,
        as_spectator: bool,
        response: oneshot::Sender<TableResponse>,
    },

    /// Leave the table; mid-game this is treated as a disconnection
    Leave {
        name: PlayerName,
        response: oneshot::Sender<TableResponse>,
    },

    /// Session dropped without an explicit leave
    Disconnect {
        name: PlayerName,
        response: oneshot::Sender<TableResponse>,
    },

    /// Returning session reclaims its seat
    Reconnect {
        name: PlayerName,
        session: Uuid,
        response: oneshot::Sender<TableResponse>,
    },

    /// Collect buy-ins and start the game
    StartGame {
        actor: PlayerName,
        response: oneshot::Sender<TableResponse>,
    },

    /// Dealer shuffles and deals the next round
    Deal {
        actor: PlayerName,
        response: oneshot::Sender<TableResponse>,
    },

    /// Bid or pass
    Bid {
        actor: PlayerName,
        action: BidAction,
        response: oneshot::Sender<TableResponse>,
    },

    /// The frog bidder's upgrade-or-yield decision
    FrogUpgrade {
        actor: PlayerName,
        upgrade: bool,
        response: oneshot::Sender<TableResponse>,
    },

    /// Solo bidder picks a non-heart trump
    ChooseTrump {
        actor: PlayerName,
        trump: Suit,
        response: oneshot::Sender<TableResponse>,
    },

    /// Frog bidder returns three discards after taking the widow
    SubmitDiscards {
        actor: PlayerName,
        discards: Vec<Card>,
        response: oneshot::Sender<TableResponse>,
    },

    PlayCard {
        actor: PlayerName,
        card: Card,
        response: oneshot::Sender<TableResponse>,
    },

    /// Advance from the between-rounds pause to the next deal
    NextRound {
        actor: PlayerName,
        response: oneshot::Sender<TableResponse>,
    },

    /// Move an insurance requirement or offer
    AdjustInsurance {
        actor: PlayerName,
        value: i32,
        response: oneshot::Sender<TableResponse>,
    },

    /// Open a draw vote
    RequestDraw {
        actor: PlayerName,
        response: oneshot::Sender<TableResponse>,
    },

    /// Cast a draw vote
    VoteDraw {
        actor: PlayerName,
        choice: DrawChoice,
        response: oneshot::Sender<TableResponse>,
    },

    /// Arm the forfeit countdown against a disconnected player
    StartForfeitTimer {
        actor: PlayerName,
        target: PlayerName,
        response: oneshot::Sender<TableResponse>,
    },

    /// Concede the game
    Forfeit {
        actor: PlayerName,
        response: oneshot::Sender<TableResponse>,
    },

    /// Per-viewer projection of the table
    GetView {
        viewer: Option<PlayerName>,
        response: oneshot::Sender<ClientView>,
    },

    /// Force the table back to its empty shape (admin only)
    Reset {
        response: oneshot::Sender<TableResponse>,
    },

    /// Close the table (admin only)
    Close {
        response: oneshot::Sender<TableResponse>,
    },

    /// Internal: advance deadline timers (also driven by the actor's
    /// own interval)
    Tick,

    /// Subscribe to state change notifications
    Subscribe {
        user_id: i64,
        sender: tokio::sync::mpsc::Sender<StateChangeNotification>,
    },

    /// Unsubscribe from state change notifications
    Unsubscribe { user_id: i64 },
}

/// Notification pushed to subscribers when the table changes.
#[derive(Debug, Clone)]
pub enum StateChangeNotification {
    /// The table projection changed; fetch a fresh view
    StateChanged,
    /// A player was evicted at game start for lack of funds
    PlayerEvicted(PlayerName),
    /// A ledger call failed and the table fell back to a safe state
    LedgerFailure(String),
}

/// Response from table operations
#[derive(Debug, Clone)]
pub enum TableResponse {
    /// Operation succeeded
    Success,

    /// The engine rejected the action; table state is untouched
    Rejected(String),

    /// The table is closed or otherwise unreachable
    Unavailable(String),
}

impl TableResponse {
    pub fn is_success(&self) -> bool {
        matches!(self, TableResponse::Success)
    }

    /// Get error message if response is an error
    pub fn error_message(&self) -> Option<&str> {
        match self {
            TableResponse::Success => None,
            TableResponse::Rejected(msg) | TableResponse::Unavailable(msg) => Some(msg),
        }
    }
}
