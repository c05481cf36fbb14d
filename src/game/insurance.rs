//! Insurance side-bet negotiation for 3-seat tables.
//!
//! The bidder posts a requirement, each defender an offer; all three
//! numbers are independently adjustable at any time during play. The
//! moment the requirement is covered by the sum of offers the deal
//! executes, irrevocably, and replaces card-outcome scoring for the
//! round. This is optimistic matching, not a blind auction: the
//! triggering adjustment can come from either side, mid-trick.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use thiserror::Error;

use super::entities::{Bid, PlayerName};

#[derive(Debug, Error, Eq, PartialEq)]
pub enum InsuranceError {
    #[error("{0} is not part of the insurance negotiation")]
    NotAParty(PlayerName),
    #[error("value {value} outside [{min}, {max}]")]
    OutOfBounds { value: i32, min: i32, max: i32 },
}

/// Result of one accepted adjustment.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum AdjustOutcome {
    /// Value recorded, no agreement yet.
    Updated,
    /// This adjustment crossed the agreement threshold.
    Executed,
    /// Deal already executed; adjustment ignored.
    Ignored,
}

/// The frozen agreement once a deal executes.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ExecutedDeal {
    pub requirement: i32,
    pub offers: HashMap<PlayerName, i32>,
}

impl ExecutedDeal {
    /// What the bidder actually receives: the covered sum of offers.
    pub fn bidder_take(&self) -> i32 {
        self.offers.values().sum()
    }
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct InsuranceState {
    bidder: PlayerName,
    multiplier: i32,
    requirement: i32,
    offers: HashMap<PlayerName, i32>,
    executed: Option<ExecutedDeal>,
}

impl InsuranceState {
    /// Defaults: requirement 120×mult, each defender offers −60×mult,
    /// so no deal can execute before someone moves.
    pub fn new(bidder: PlayerName, defenders: &[PlayerName], bid: Bid) -> Self {
        let multiplier = bid.multiplier();
        let offers = defenders
            .iter()
            .map(|d| (d.clone(), -60 * multiplier))
            .collect();
        Self {
            bidder,
            multiplier,
            requirement: 120 * multiplier,
            offers,
            executed: None,
        }
    }

    pub fn bidder(&self) -> &PlayerName {
        &self.bidder
    }

    pub fn requirement(&self) -> i32 {
        self.requirement
    }

    pub fn offers(&self) -> &HashMap<PlayerName, i32> {
        &self.offers
    }

    pub fn executed(&self) -> Option<&ExecutedDeal> {
        self.executed.as_ref()
    }

    fn offer_sum(&self) -> i32 {
        self.offers.values().sum()
    }

    /// Adjust the actor's own number. Executes the deal if the
    /// agreement threshold is crossed; a settled deal ignores all
    /// further adjustments.
    pub fn adjust(
        &mut self,
        actor: &PlayerName,
        value: i32,
    ) -> Result<AdjustOutcome, InsuranceError> {
        if self.executed.is_some() {
            return Ok(AdjustOutcome::Ignored);
        }

        if *actor == self.bidder {
            let bound = 120 * self.multiplier;
            if value < -bound || value > bound {
                return Err(InsuranceError::OutOfBounds {
                    value,
                    min: -bound,
                    max: bound,
                });
            }
            self.requirement = value;
        } else if self.offers.contains_key(actor) {
            let bound = 60 * self.multiplier;
            if value < -bound || value > bound {
                return Err(InsuranceError::OutOfBounds {
                    value,
                    min: -bound,
                    max: bound,
                });
            }
            self.offers.insert(actor.clone(), value);
        } else {
            return Err(InsuranceError::NotAParty(actor.clone()));
        }

        if self.requirement <= self.offer_sum() {
            self.executed = Some(ExecutedDeal {
                requirement: self.requirement,
                offers: self.offers.clone(),
            });
            return Ok(AdjustOutcome::Executed);
        }
        Ok(AdjustOutcome::Updated)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn setup(bid: Bid) -> InsuranceState {
        InsuranceState::new("ana".into(), &["ben".into(), "cal".into()], bid)
    }

    #[test]
    fn defaults_scale_with_multiplier() {
        let ins = setup(Bid::Solo);
        assert_eq!(ins.requirement(), 240);
        assert_eq!(ins.offers()[&"ben".into()], -120);
        assert!(ins.executed().is_none());
    }

    #[test]
    fn deal_executes_exactly_at_threshold() {
        let mut ins = setup(Bid::Frog);
        assert_eq!(ins.adjust(&"ana".into(), 20).unwrap(), AdjustOutcome::Updated);
        assert_eq!(ins.adjust(&"ben".into(), 10).unwrap(), AdjustOutcome::Updated);
        // 10 + 10 == requirement 20: executes.
        assert_eq!(
            ins.adjust(&"cal".into(), 10).unwrap(),
            AdjustOutcome::Executed
        );
        let deal = ins.executed().unwrap();
        assert_eq!(deal.requirement, 20);
        assert_eq!(deal.bidder_take(), 20);
    }

    #[test]
    fn bidder_side_adjustment_can_trigger() {
        let mut ins = setup(Bid::Frog);
        ins.adjust(&"ben".into(), 30).unwrap();
        ins.adjust(&"cal".into(), 10).unwrap();
        assert_eq!(
            ins.adjust(&"ana".into(), 40).unwrap(),
            AdjustOutcome::Executed
        );
    }

    #[test]
    fn settled_deal_ignores_further_adjustments() {
        let mut ins = setup(Bid::Frog);
        ins.adjust(&"ana".into(), -120).unwrap();
        let frozen = ins.executed().unwrap().clone();
        assert_eq!(ins.adjust(&"ben".into(), 60).unwrap(), AdjustOutcome::Ignored);
        assert_eq!(
            ins.executed().unwrap().bidder_take(),
            frozen.bidder_take()
        );
    }

    #[test]
    fn bounds_enforced_per_role() {
        let mut ins = setup(Bid::HeartSolo);
        assert!(ins.adjust(&"ana".into(), 361).is_err());
        assert!(ins.adjust(&"ana".into(), -361).is_err());
        assert!(ins.adjust(&"ben".into(), 181).is_err());
        assert!(ins.adjust(&"ben".into(), 180).is_ok());
    }

    #[test]
    fn outsiders_rejected() {
        let mut ins = setup(Bid::Frog);
        assert_eq!(
            ins.adjust(&"dee".into(), 0),
            Err(InsuranceError::NotAParty("dee".into()))
        );
    }
}
