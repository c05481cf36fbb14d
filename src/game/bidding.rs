//! Turn-ordered auction with the frog-upgrade interrupt.
//!
//! Each active player in turn either passes or names a bid strictly
//! above the current highest. A player who passes is out for the rest
//! of the auction. The auction resolves when everyone has passed, or
//! when all but the standing high bidder have passed.

use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use thiserror::Error;

use super::entities::{Bid, PlayerName};

#[derive(Debug, Error, Eq, PartialEq)]
pub enum BidError {
    #[error("not your turn to bid")]
    NotYourTurn,
    #[error("you have already passed")]
    AlreadyPassed,
    #[error("{attempted} does not beat the standing {standing}")]
    BidTooLow { attempted: Bid, standing: Bid },
}

/// A single auction turn.
#[derive(Clone, Copy, Debug, Eq, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase", tag = "kind", content = "bid")]
pub enum BidAction {
    Pass,
    Bid(Bid),
}

/// What the orchestrator should do after an accepted auction turn.
#[derive(Clone, Debug, Eq, PartialEq)]
pub enum BidOutcome {
    /// Auction continues; next player to act.
    Continue,
    /// Everyone passed without a bid.
    AllPassed,
    /// Auction settled on a winner.
    Won { bidder: PlayerName, bid: Bid },
    /// Settled on a solo, but the opening frog bidder gets one last
    /// chance to upgrade to heart solo.
    AwaitFrogUpgrade {
        frog_bidder: PlayerName,
        standing_bidder: PlayerName,
        standing_bid: Bid,
    },
}

/// Auction state for one round.
#[derive(Clone, Debug)]
pub struct BiddingState {
    /// The round's active players, eldest hand first.
    order: Vec<PlayerName>,
    turn_idx: usize,
    highest: Option<(PlayerName, Bid)>,
    passed: HashSet<PlayerName>,
    /// Set when the opening bid of the auction was a frog.
    original_frog_bidder: Option<PlayerName>,
    /// Set when someone later bid solo over that frog.
    solo_after_frog: bool,
}

impl BiddingState {
    pub fn new(order: Vec<PlayerName>) -> Self {
        Self {
            order,
            turn_idx: 0,
            highest: None,
            passed: HashSet::new(),
            original_frog_bidder: None,
            solo_after_frog: false,
        }
    }

    /// Player whose turn it is, or `None` once the auction is settled.
    pub fn current_turn(&self) -> Option<&PlayerName> {
        if self.is_settled() {
            None
        } else {
            self.order.get(self.turn_idx)
        }
    }

    pub fn highest(&self) -> Option<&(PlayerName, Bid)> {
        self.highest.as_ref()
    }

    pub fn passed(&self) -> &HashSet<PlayerName> {
        &self.passed
    }

    /// Players still able to bid.
    pub fn active_bidders_remaining(&self) -> usize {
        self.order.len() - self.passed.len()
    }

    fn is_settled(&self) -> bool {
        if self.passed.len() == self.order.len() {
            return true;
        }
        self.highest.is_some() && self.passed.len() == self.order.len() - 1
    }

    /// Advance the turn pointer past players who already passed.
    fn advance_turn(&mut self) {
        for _ in 0..self.order.len() {
            self.turn_idx = (self.turn_idx + 1) % self.order.len();
            if !self.passed.contains(&self.order[self.turn_idx]) {
                return;
            }
        }
    }

    /// Apply one auction turn from `actor`.
    pub fn apply(&mut self, actor: &PlayerName, action: BidAction) -> Result<BidOutcome, BidError> {
        if self.passed.contains(actor) {
            return Err(BidError::AlreadyPassed);
        }
        if self.current_turn() != Some(actor) {
            return Err(BidError::NotYourTurn);
        }

        match action {
            BidAction::Pass => {
                self.passed.insert(actor.clone());
            }
            BidAction::Bid(bid) => {
                if let Some((_, standing)) = &self.highest {
                    if bid <= *standing {
                        return Err(BidError::BidTooLow {
                            attempted: bid,
                            standing: *standing,
                        });
                    }
                } else if bid == Bid::Frog {
                    // Opening frog bid arms the upgrade interrupt.
                    self.original_frog_bidder = Some(actor.clone());
                }
                if bid == Bid::Solo
                    && self
                        .original_frog_bidder
                        .as_ref()
                        .is_some_and(|frog| frog != actor)
                {
                    self.solo_after_frog = true;
                }
                self.highest = Some((actor.clone(), bid));
            }
        }

        Ok(self.resolve_or_continue())
    }

    fn resolve_or_continue(&mut self) -> BidOutcome {
        if self.passed.len() == self.order.len() {
            return BidOutcome::AllPassed;
        }
        if let Some((bidder, bid)) = self.highest.clone() {
            if self.passed.len() == self.order.len() - 1 && !self.passed.contains(&bidder) {
                // Standing bidder is the last one in.
                if bid == Bid::Solo && self.solo_after_frog {
                    if let Some(frog_bidder) = self.original_frog_bidder.clone() {
                        if frog_bidder != bidder {
                            return BidOutcome::AwaitFrogUpgrade {
                                frog_bidder,
                                standing_bidder: bidder,
                                standing_bid: bid,
                            };
                        }
                    }
                }
                return BidOutcome::Won { bidder, bid };
            }
        }
        self.advance_turn();
        BidOutcome::Continue
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn players() -> Vec<PlayerName> {
        vec!["ana".into(), "ben".into(), "cal".into()]
    }

    #[test]
    fn all_pass_resolves() {
        let mut bidding = BiddingState::new(players());
        assert_eq!(
            bidding.apply(&"ana".into(), BidAction::Pass).unwrap(),
            BidOutcome::Continue
        );
        assert_eq!(
            bidding.apply(&"ben".into(), BidAction::Pass).unwrap(),
            BidOutcome::Continue
        );
        assert_eq!(
            bidding.apply(&"cal".into(), BidAction::Pass).unwrap(),
            BidOutcome::AllPassed
        );
    }

    #[test]
    fn lone_bid_wins_once_others_pass() {
        let mut bidding = BiddingState::new(players());
        bidding
            .apply(&"ana".into(), BidAction::Bid(Bid::Frog))
            .unwrap();
        bidding.apply(&"ben".into(), BidAction::Pass).unwrap();
        let outcome = bidding.apply(&"cal".into(), BidAction::Pass).unwrap();
        assert_eq!(
            outcome,
            BidOutcome::Won {
                bidder: "ana".into(),
                bid: Bid::Frog,
            }
        );
    }

    #[test]
    fn out_of_turn_bid_rejected() {
        let mut bidding = BiddingState::new(players());
        assert_eq!(
            bidding.apply(&"ben".into(), BidAction::Pass),
            Err(BidError::NotYourTurn)
        );
    }

    #[test]
    fn lower_or_equal_bid_rejected() {
        let mut bidding = BiddingState::new(players());
        bidding
            .apply(&"ana".into(), BidAction::Bid(Bid::Solo))
            .unwrap();
        assert_eq!(
            bidding.apply(&"ben".into(), BidAction::Bid(Bid::Solo)),
            Err(BidError::BidTooLow {
                attempted: Bid::Solo,
                standing: Bid::Solo,
            })
        );
        assert_eq!(
            bidding.apply(&"ben".into(), BidAction::Bid(Bid::Frog)),
            Err(BidError::BidTooLow {
                attempted: Bid::Frog,
                standing: Bid::Solo,
            })
        );
    }

    #[test]
    fn passed_player_cannot_rejoin() {
        let mut bidding = BiddingState::new(players());
        bidding.apply(&"ana".into(), BidAction::Pass).unwrap();
        assert_eq!(
            bidding.apply(&"ana".into(), BidAction::Bid(Bid::Frog)),
            Err(BidError::AlreadyPassed)
        );
    }

    #[test]
    fn solo_over_opening_frog_triggers_upgrade_window() {
        let mut bidding = BiddingState::new(players());
        bidding
            .apply(&"ana".into(), BidAction::Bid(Bid::Frog))
            .unwrap();
        bidding
            .apply(&"ben".into(), BidAction::Bid(Bid::Solo))
            .unwrap();
        bidding.apply(&"cal".into(), BidAction::Pass).unwrap();
        let outcome = bidding.apply(&"ana".into(), BidAction::Pass).unwrap();
        assert_eq!(
            outcome,
            BidOutcome::AwaitFrogUpgrade {
                frog_bidder: "ana".into(),
                standing_bidder: "ben".into(),
                standing_bid: Bid::Solo,
            }
        );
    }

    #[test]
    fn heart_solo_win_skips_upgrade_window() {
        let mut bidding = BiddingState::new(players());
        bidding
            .apply(&"ana".into(), BidAction::Bid(Bid::Frog))
            .unwrap();
        bidding
            .apply(&"ben".into(), BidAction::Bid(Bid::HeartSolo))
            .unwrap();
        bidding.apply(&"cal".into(), BidAction::Pass).unwrap();
        let outcome = bidding.apply(&"ana".into(), BidAction::Pass).unwrap();
        assert_eq!(
            outcome,
            BidOutcome::Won {
                bidder: "ben".into(),
                bid: Bid::HeartSolo,
            }
        );
    }

    #[test]
    fn frog_bidder_raising_themselves_needs_no_window() {
        let mut bidding = BiddingState::new(players());
        bidding
            .apply(&"ana".into(), BidAction::Bid(Bid::Frog))
            .unwrap();
        bidding
            .apply(&"ben".into(), BidAction::Bid(Bid::Solo))
            .unwrap();
        bidding.apply(&"cal".into(), BidAction::Pass).unwrap();
        bidding
            .apply(&"ana".into(), BidAction::Bid(Bid::HeartSolo))
            .unwrap();
        let outcome = bidding.apply(&"ben".into(), BidAction::Pass).unwrap();
        assert_eq!(
            outcome,
            BidOutcome::Won {
                bidder: "ana".into(),
                bid: Bid::HeartSolo,
            }
        );
    }

    #[test]
    fn bidders_remaining_strictly_decreases_on_pass() {
        let mut bidding = BiddingState::new(players());
        assert_eq!(bidding.active_bidders_remaining(), 3);
        bidding.apply(&"ana".into(), BidAction::Pass).unwrap();
        assert_eq!(bidding.active_bidders_remaining(), 2);
        bidding
            .apply(&"ben".into(), BidAction::Bid(Bid::Frog))
            .unwrap();
        assert_eq!(bidding.active_bidders_remaining(), 2);
        bidding.apply(&"cal".into(), BidAction::Pass).unwrap();
        assert_eq!(bidding.active_bidders_remaining(), 1);
    }
}
