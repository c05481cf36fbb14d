//! Table actor implementation with async message handling.
//!
//! One tokio task owns one [`TableState`]. All mutation funnels through
//! the mpsc inbox, so the engine never needs a lock; ledger calls are
//! awaited inline, which also serializes them with every other action
//! on the table. The engine hands back [`Effect`] lists and the actor
//! is the only code that interprets them.

use std::collections::{HashMap, VecDeque};
use std::sync::Arc;
use std::time::Instant;

use tokio::{
    sync::mpsc,
    time::{interval, Duration},
};

use super::{
    config::{TableConfig, TableId},
    messages::{StateChangeNotification, TableMessage, TableResponse},
};
use crate::{
    game::{
        entities::PlayerName,
        state_machine::{ActionError, Effect, LedgerOp, Notification, TableState},
    },
    ledger::{
        errors::LedgerError,
        gateway::LedgerGateway,
        models::{GameId, TransactionType},
    },
};

/// Table actor handle for sending messages
#[derive(Clone)]
pub struct TableHandle {
    sender: mpsc::Sender<TableMessage>,
    table_id: TableId,
}

impl TableHandle {
    pub fn new(sender: mpsc::Sender<TableMessage>, table_id: TableId) -> Self {
        Self { sender, table_id }
    }

    pub fn table_id(&self) -> TableId {
        self.table_id
    }

    /// Send a message to the table
    pub async fn send(&self, message: TableMessage) -> Result<(), String> {
        self.sender
            .send(message)
            .await
            .map_err(|_| "Table is closed".to_string())
    }
}

/// Table actor managing a single Frog table
pub struct TableActor {
    /// Table ID
    id: TableId,

    /// Table configuration
    config: TableConfig,

    /// The authoritative table state machine
    state: TableState,

    /// Message inbox
    inbox: mpsc::Receiver<TableMessage>,

    /// Ledger gateway for buy-ins and settlements
    ledger: Arc<dyn LedgerGateway>,

    /// Is table closed
    is_closed: bool,

    /// Subscribers for state change notifications
    subscribers: HashMap<i64, mpsc::Sender<StateChangeNotification>>,
}

impl TableActor {
    /// Create a new table actor and its handle.
    pub fn new(
        id: TableId,
        config: TableConfig,
        ledger: Arc<dyn LedgerGateway>,
    ) -> (Self, TableHandle) {
        let (sender, inbox) = mpsc::channel(100);

        let state = TableState::new(config.name.clone(), config.buy_in, config.timers);

        let actor = Self {
            id,
            config,
            state,
            inbox,
            ledger,
            is_closed: false,
            subscribers: HashMap::new(),
        };

        let handle = TableHandle::new(sender, id);

        (actor, handle)
    }

    /// Run the table actor event loop
    pub async fn run(mut self) {
        log::info!("Table {} '{}' starting", self.id, self.config.name);

        let mut tick_interval = interval(Duration::from_secs(1));

        loop {
            tokio::select! {
                Some(message) = self.inbox.recv() => {
                    self.handle_message(message).await;

                    if self.is_closed {
                        break;
                    }
                }

                _ = tick_interval.tick() => {
                    let effects = self.state.tick(Instant::now());
                    self.apply_effects(effects).await;
                }
            }
        }

        log::info!("Table {} '{}' closed", self.id, self.config.name);
    }

    /// Handle a table message
    async fn handle_message(&mut self, message: TableMessage) {
        match message {
            TableMessage::Join {
                name,
                user_id,
                session,
                as_spectator,
                response,
            } => {
                let result = self.state.join(name, user_id, session, as_spectator);
                let reply = self.settle(result).await;
                let _ = response.send(reply);
            }

            TableMessage::Leave { name, response } => {
                let result = self.state.leave(&name);
                let reply = self.settle(result).await;
                let _ = response.send(reply);
            }

            TableMessage::Disconnect { name, response } => {
                let result = self.state.disconnect(&name);
                let reply = self.settle(result).await;
                let _ = response.send(reply);
            }

            TableMessage::Reconnect {
                name,
                session,
                response,
            } => {
                let result = self.state.reconnect(&name, session);
                let reply = self.settle(result).await;
                let _ = response.send(reply);
            }

            TableMessage::StartGame { actor, response } => {
                let result = self.state.start_game(&actor);
                let reply = self.settle(result).await;
                let _ = response.send(reply);
            }

            TableMessage::Deal { actor, response } => {
                let result = self.state.deal(&actor);
                let reply = self.settle(result).await;
                let _ = response.send(reply);
            }

            TableMessage::Bid {
                actor,
                action,
                response,
            } => {
                let result = self.state.bid(&actor, action, Instant::now());
                let reply = self.settle(result).await;
                let _ = response.send(reply);
            }

            TableMessage::FrogUpgrade {
                actor,
                upgrade,
                response,
            } => {
                let result = self.state.decide_frog_upgrade(&actor, upgrade);
                let reply = self.settle(result).await;
                let _ = response.send(reply);
            }

            TableMessage::ChooseTrump {
                actor,
                trump,
                response,
            } => {
                let result = self.state.choose_trump(&actor, trump);
                let reply = self.settle(result).await;
                let _ = response.send(reply);
            }

            TableMessage::SubmitDiscards {
                actor,
                discards,
                response,
            } => {
                let result = self.state.submit_discards(&actor, discards);
                let reply = self.settle(result).await;
                let _ = response.send(reply);
            }

            TableMessage::PlayCard {
                actor,
                card,
                response,
            } => {
                let result = self.state.play_card(&actor, card, Instant::now());
                let reply = self.settle(result).await;
                let _ = response.send(reply);
            }

            TableMessage::NextRound { actor, response } => {
                let result = self.state.request_next_round(&actor);
                let reply = self.settle(result).await;
                let _ = response.send(reply);
            }

            TableMessage::AdjustInsurance {
                actor,
                value,
                response,
            } => {
                let result = self.state.adjust_insurance(&actor, value);
                let reply = self.settle(result).await;
                let _ = response.send(reply);
            }

            TableMessage::RequestDraw { actor, response } => {
                let result = self.state.request_draw(&actor, Instant::now());
                let reply = self.settle(result).await;
                let _ = response.send(reply);
            }

            TableMessage::VoteDraw {
                actor,
                choice,
                response,
            } => {
                let result = self.state.vote_draw(&actor, choice);
                let reply = self.settle(result).await;
                let _ = response.send(reply);
            }

            TableMessage::StartForfeitTimer {
                actor,
                target,
                response,
            } => {
                let result = self.state.start_forfeit_timer(&actor, &target, Instant::now());
                let reply = self.settle(result).await;
                let _ = response.send(reply);
            }

            TableMessage::Forfeit { actor, response } => {
                let result = self.state.forfeit_game(&actor, Instant::now());
                let reply = self.settle(result).await;
                let _ = response.send(reply);
            }

            TableMessage::GetView { viewer, response } => {
                let _ = response.send(self.state.client_view(viewer.as_ref()));
            }

            TableMessage::Reset { response } => {
                let effects = self.state.reset();
                self.apply_effects(effects).await;
                let _ = response.send(TableResponse::Success);
            }

            TableMessage::Close { response } => {
                self.is_closed = true;
                let _ = response.send(TableResponse::Success);
            }

            TableMessage::Tick => {
                let effects = self.state.tick(Instant::now());
                self.apply_effects(effects).await;
            }

            TableMessage::Subscribe { user_id, sender } => {
                self.subscribers.insert(user_id, sender);
                log::debug!("User {} subscribed to table {} state changes", user_id, self.id);
            }

            TableMessage::Unsubscribe { user_id } => {
                self.subscribers.remove(&user_id);
                log::debug!(
                    "User {} unsubscribed from table {} state changes",
                    user_id,
                    self.id
                );
            }
        }
    }

    /// Apply an entry point's outcome: run its effects on success, or
    /// translate the rejection for the caller.
    async fn settle(&mut self, result: Result<Vec<Effect>, ActionError>) -> TableResponse {
        match result {
            Ok(effects) => {
                self.apply_effects(effects).await;
                TableResponse::Success
            }
            Err(ActionError::InternalStateError(msg)) => {
                // Invariant violations force the table back to safety.
                log::error!("Table {}: inconsistent state: {msg}; resetting", self.id);
                let effects = self.state.reset();
                self.apply_effects(effects).await;
                TableResponse::Unavailable("Table was reset".to_string())
            }
            Err(err) => TableResponse::Rejected(err.to_string()),
        }
    }

    /// Interpret effects in order. A ledger effect may produce
    /// follow-up effects (confirmations and fallbacks), which run
    /// before the rest of the original list.
    async fn apply_effects(&mut self, effects: Vec<Effect>) {
        let mut queue: VecDeque<Effect> = effects.into();
        while let Some(effect) = queue.pop_front() {
            match effect {
                Effect::Broadcast(notification) => self.notify_state_change(&notification),
                Effect::Ledger(op) => {
                    let follow_up = self.apply_ledger_op(op).await;
                    for (i, e) in follow_up.into_iter().enumerate() {
                        queue.insert(i, e);
                    }
                }
            }
        }
    }

    async fn apply_ledger_op(&mut self, op: LedgerOp) -> Vec<Effect> {
        match op {
            LedgerOp::StartGame { players } => {
                let roster: Vec<(i64, String)> = players
                    .iter()
                    .map(|(user_id, name)| (*user_id, name.to_string()))
                    .collect();
                match self
                    .ledger
                    .start_game(&self.config.name, self.config.buy_in, &roster)
                    .await
                {
                    Ok(game_id) => {
                        log::info!(
                            "Table {}: game {game_id} started with {} players",
                            self.id,
                            roster.len()
                        );
                        self.state.confirm_start(game_id)
                    }
                    Err(LedgerError::InsufficientBalance { user_id, .. }) => {
                        let broke = players
                            .iter()
                            .find(|(id, _)| *id == user_id)
                            .map(|(_, name)| name.clone())
                            .unwrap_or_else(|| PlayerName::new(format!("user {user_id}")));
                        log::warn!(
                            "Table {}: start aborted, {broke} cannot cover the buy-in",
                            self.id
                        );
                        self.state.fail_start_insufficient(&broke)
                    }
                    Err(err) => {
                        log::error!("Table {}: game start failed: {err}", self.id);
                        self.state.fail_start(err.client_message())
                    }
                }
            }

            LedgerOp::Post {
                user_id,
                tx_type,
                amount,
                description,
            } => {
                match self.state.game_id() {
                    Some(game_id) => {
                        if let Err(err) =
                            self.post(game_id, user_id, tx_type, amount, &description).await
                        {
                            log::error!(
                                "Table {}: failed to post {tx_type} of {amount} for user {user_id}: {err}",
                                self.id
                            );
                        }
                    }
                    None => {
                        log::error!(
                            "Table {}: dropped {tx_type} of {amount} for user {user_id}: no running game record",
                            self.id
                        );
                    }
                }
                Vec::new()
            }

            LedgerOp::SettleDraw { payouts, outcome } => {
                let Some(game_id) = self.state.game_id() else {
                    log::error!("Table {}: draw settlement without a game record", self.id);
                    return self
                        .state
                        .cancel_draw_resolution("No running game record".to_string());
                };
                let mut failed = None;
                for (user_id, tx_type, amount, description) in payouts {
                    if let Err(err) =
                        self.post(game_id, user_id, tx_type, amount, &description).await
                    {
                        failed = Some(err);
                        break;
                    }
                }
                if failed.is_none() {
                    if let Err(err) = self.ledger.record_outcome(game_id, &outcome).await {
                        failed = Some(err);
                    }
                }
                match failed {
                    None => {
                        log::info!("Table {}: game settled as {outcome}", self.id);
                        self.state.confirm_draw_settled(Instant::now())
                    }
                    Some(err) => {
                        log::error!("Table {}: draw settlement failed: {err}", self.id);
                        self.state.cancel_draw_resolution(err.client_message())
                    }
                }
            }

            LedgerOp::Outcome(outcome) => {
                if let Some(game_id) = self.state.game_id() {
                    if let Err(err) = self.ledger.record_outcome(game_id, &outcome).await {
                        log::error!("Table {}: failed to record outcome: {err}", self.id);
                    }
                }
                Vec::new()
            }

            LedgerOp::Stats(stats) => {
                for (user_id, outcome) in stats {
                    if let Err(err) = self.ledger.record_stat(user_id, outcome).await {
                        log::error!(
                            "Table {}: failed to record stat for user {user_id}: {err}",
                            self.id
                        );
                    }
                }
                Vec::new()
            }
        }
    }

    /// Post one credit against the running game record. Idempotency
    /// keys are deterministic per (game, type, user), so a retried
    /// settlement cannot double-pay.
    async fn post(
        &self,
        game_id: GameId,
        user_id: i64,
        tx_type: TransactionType,
        amount: i64,
        description: &str,
    ) -> Result<i64, LedgerError> {
        let key = format!("{tx_type}_{game_id}_{user_id}");
        match self
            .ledger
            .post_transaction(game_id, user_id, tx_type, amount, description, &key)
            .await
        {
            Err(LedgerError::DuplicateTransaction(_)) => {
                // Already landed in a previous attempt.
                Ok(amount)
            }
            other => other,
        }
    }

    /// Broadcast a state change notification to all subscribers
    fn notify_state_change(&mut self, notification: &Notification) {
        let notification = match notification {
            Notification::StateChanged => StateChangeNotification::StateChanged,
            Notification::PlayerEvicted(name) => {
                StateChangeNotification::PlayerEvicted(name.clone())
            }
            Notification::LedgerFailure(msg) => {
                StateChangeNotification::LedgerFailure(msg.clone())
            }
        };
        self.subscribers.retain(|user_id, sender| {
            match sender.try_send(notification.clone()) {
                Ok(()) => true,
                Err(mpsc::error::TrySendError::Full(_)) => {
                    log::warn!("Subscriber {} channel full, dropping notification", user_id);
                    true
                }
                Err(mpsc::error::TrySendError::Closed(_)) => {
                    log::debug!("Subscriber {} disconnected, removing", user_id);
                    false
                }
            }
        });
    }
}
