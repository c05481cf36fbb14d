//! Round scoring, payout formulas, and game-over detection.
//!
//! All functions here are pure. The orchestrator feeds them a completed
//! round's captured tricks and they hand back score deltas and payout
//! tables; nothing in this module touches table state or the ledger.

use std::collections::HashMap;

use super::{
    cards::{card_points, Card, TOTAL_CARD_POINTS},
    entities::{Contract, PlayerName, RoundSummary},
    insurance::InsuranceState,
};

/// Everything the scoring engine needs from a finished round.
pub struct RoundInput<'a> {
    pub contract: &'a Contract,
    /// Completed tricks per capturing player.
    pub captured: &'a HashMap<PlayerName, Vec<Vec<Card>>>,
    /// The live widow: the bidder's discards after a frog, the
    /// untouched widow otherwise. Scores for the bidder either way.
    pub widow: &'a [Card],
    /// Every score-bearing opponent of the bidder: the defenders plus
    /// the sitting-out dealer or the placeholder participant.
    pub opponents: &'a [PlayerName],
    pub insurance: Option<&'a InsuranceState>,
    /// Scores going into the round.
    pub scores: &'a HashMap<PlayerName, i32>,
}

fn points_captured(captured: &HashMap<PlayerName, Vec<Vec<Card>>>, player: &PlayerName) -> u32 {
    captured
        .get(player)
        .map(|tricks| tricks.iter().map(|t| card_points(t)).sum())
        .unwrap_or(0)
}

/// Score a completed round and produce its immutable summary.
///
/// Card outcome: the bidder's tricks plus the widow against 60. Each
/// opponent settles `(bidder_points - 60) × multiplier` with the
/// bidder. An executed insurance deal replaces the card outcome
/// entirely; the summary then carries a hindsight line comparing the
/// two.
pub fn score_round(input: &RoundInput) -> RoundSummary {
    let contract = input.contract;
    let bidder = &contract.bidder;
    let multiplier = contract.bid.multiplier();

    let bidder_points = points_captured(input.captured, bidder) + card_points(input.widow);
    let defender_points = TOTAL_CARD_POINTS - bidder_points;

    let card_delta = (bidder_points as i32 - 60) * multiplier;

    let mut deltas: HashMap<PlayerName, i32> = HashMap::new();
    let executed = input.insurance.and_then(|i| i.executed());
    let insurance_executed = executed.is_some();

    let round_message = if let Some(deal) = executed {
        let take = deal.bidder_take();
        deltas.insert(bidder.clone(), take);
        for (defender, offer) in &deal.offers {
            deltas.insert(defender.clone(), -offer);
        }
        for opponent in input.opponents {
            deltas.entry(opponent.clone()).or_insert(0);
        }
        format!(
            "insurance deal held: {bidder} takes {take}; cards would have paid {card_delta} per opponent ({bidder_points} to {defender_points})"
        )
    } else {
        deltas.insert(bidder.clone(), card_delta * input.opponents.len() as i32);
        for opponent in input.opponents {
            deltas.insert(opponent.clone(), -card_delta);
        }
        if card_delta == 0 {
            format!("{bidder} took exactly 60: no exchange")
        } else if card_delta > 0 {
            format!(
                "{bidder} made the {} with {bidder_points} points, winning {card_delta} per opponent",
                contract.bid
            )
        } else {
            format!(
                "{bidder} fell short of the {} with {bidder_points} points, paying {} per opponent",
                contract.bid, -card_delta
            )
        }
    };

    let game_over = deltas.iter().any(|(name, delta)| {
        input
            .scores
            .get(name)
            .is_some_and(|score| score + delta <= 0)
    });

    RoundSummary {
        bidder: bidder.clone(),
        bid: contract.bid,
        trump: contract.trump,
        bidder_points,
        defender_points,
        deltas,
        insurance_executed,
        round_message,
        game_over,
    }
}

/// Split `pot` across `weights` proportionally, conserving every token
/// via largest-remainder rounding (leftover goes to the heaviest
/// weight). Non-positive weights take an equal split instead, so a
/// table of losing scores still resolves.
pub fn proportional_split(weights: &[(PlayerName, i64)], pot: i64) -> HashMap<PlayerName, i64> {
    let mut payouts = HashMap::new();
    if weights.is_empty() || pot <= 0 {
        return payouts;
    }

    let total: i64 = weights.iter().map(|(_, w)| (*w).max(0)).sum();
    if total <= 0 {
        let share = pot / weights.len() as i64;
        let mut remainder = pot - share * weights.len() as i64;
        for (name, _) in weights {
            let extra = if remainder > 0 { 1 } else { 0 };
            remainder -= extra;
            payouts.insert(name.clone(), share + extra);
        }
        return payouts;
    }

    let mut distributed = 0;
    for (name, weight) in weights {
        let share = pot * (*weight).max(0) / total;
        distributed += share;
        payouts.insert(name.clone(), share);
    }
    // Remainder to the heaviest weight, ties broken by name for
    // determinism.
    if let Some((top, _)) = weights
        .iter()
        .max_by_key(|(name, w)| ((*w).max(0), std::cmp::Reverse(name.clone())))
    {
        *payouts.entry(top.clone()).or_insert(0) += pot - distributed;
    }
    payouts
}

/// Payouts after a forfeit: every remaining active player gets their
/// buy-in back plus a score-proportional share of the forfeiter's
/// stake.
pub fn forfeit_payout(
    remaining: &[(PlayerName, i32)],
    buy_in: i64,
) -> HashMap<PlayerName, i64> {
    let weights: Vec<(PlayerName, i64)> = remaining
        .iter()
        .map(|(name, score)| (name.clone(), *score as i64))
        .collect();
    let mut payouts = proportional_split(&weights, buy_in);
    for (name, _) in remaining {
        *payouts.entry(name.clone()).or_insert(0) += buy_in;
    }
    payouts
}

/// Payouts for a wash-plus-split draw or a played-out game: the whole
/// pot split proportionally to current score.
pub fn split_payout(scores: &[(PlayerName, i32)], pot: i64) -> HashMap<PlayerName, i64> {
    let weights: Vec<(PlayerName, i64)> = scores
        .iter()
        .map(|(name, score)| (name.clone(), *score as i64))
        .collect();
    proportional_split(&weights, pot)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::game::{
        cards::{Rank, Suit},
        entities::Bid,
    };

    fn card(s: &str) -> Card {
        s.parse().unwrap()
    }

    fn contract(bid: Bid) -> Contract {
        Contract {
            bidder: "ana".into(),
            bid,
            trump: Suit::Hearts,
        }
    }

    fn scores() -> HashMap<PlayerName, i32> {
        [
            ("ana".into(), 120),
            ("ben".into(), 120),
            ("cal".into(), 120),
            (PlayerName::kitty(), 120),
        ]
        .into()
    }

    // One trick worth 25 points for the bidder.
    fn captured_with_bidder_points() -> HashMap<PlayerName, Vec<Vec<Card>>> {
        let mut captured = HashMap::new();
        captured.insert(
            PlayerName::from("ana"),
            vec![vec![card("AH"), card("10H"), card("KH")]],
        );
        captured.insert(
            PlayerName::from("ben"),
            vec![vec![card("AS"), card("10S"), card("KS")]],
        );
        captured
    }

    #[test]
    fn exactly_sixty_is_no_exchange() {
        // Bidder's tricks plus widow worth exactly 60.
        let mut captured = HashMap::new();
        captured.insert(
            PlayerName::from("ana"),
            // A+A+10+10+K+K+Q+Q+J+J = 60
            vec![vec![
                card("AH"),
                card("AS"),
                card("10H"),
                card("10S"),
                card("KH"),
                card("KS"),
                card("QH"),
                card("QS"),
                card("JH"),
                card("JS"),
            ]],
        );
        let scores = scores();
        let contract = contract(Bid::Solo);
        let opponents: Vec<PlayerName> = vec!["ben".into(), "cal".into(), PlayerName::kitty()];
        let summary = score_round(&RoundInput {
            contract: &contract,
            captured: &captured,
            widow: &[card("6C"), card("7C"), card("8C")],
            opponents: &opponents,
            insurance: None,
            scores: &scores,
        });
        assert_eq!(summary.bidder_points, 60);
        assert!(summary.round_message.contains("no exchange"));
        assert!(summary.deltas.values().all(|d| *d == 0));
        assert!(!summary.game_over);
    }

    #[test]
    fn card_outcome_is_zero_sum_and_widow_counts_for_bidder() {
        let captured = captured_with_bidder_points();
        let scores = scores();
        let contract = contract(Bid::Frog);
        let opponents: Vec<PlayerName> = vec!["ben".into(), "cal".into(), PlayerName::kitty()];
        let summary = score_round(&RoundInput {
            contract: &contract,
            captured: &captured,
            // Widow: A + 10 = 21 more bidder points.
            widow: &[card("AD"), card("10D"), card("6D")],
            opponents: &opponents,
            insurance: None,
            scores: &scores,
        });
        assert_eq!(summary.bidder_points, 25 + 21);
        assert_eq!(summary.defender_points, 120 - 46);
        // Bidder lost: 46 - 60 = -14 per opponent.
        assert_eq!(summary.deltas[&"ana".into()], -42);
        assert_eq!(summary.deltas[&"ben".into()], 14);
        assert_eq!(summary.deltas[&PlayerName::kitty()], 14);
        assert_eq!(summary.deltas.values().sum::<i32>(), 0);
    }

    #[test]
    fn multiplier_scales_exchange() {
        let captured = captured_with_bidder_points();
        let scores = scores();
        let contract = contract(Bid::HeartSolo);
        let opponents: Vec<PlayerName> = vec!["ben".into(), "cal".into(), PlayerName::kitty()];
        let summary = score_round(&RoundInput {
            contract: &contract,
            captured: &captured,
            widow: &[],
            opponents: &opponents,
            insurance: None,
            scores: &scores,
        });
        // 25 points, delta (25-60) * 3 = -105 per opponent.
        assert_eq!(summary.deltas[&"ben".into()], 105);
        assert_eq!(summary.deltas[&"ana".into()], -315);
        // Bidder drops to -195: game over.
        assert!(summary.game_over);
    }

    #[test]
    fn executed_insurance_replaces_card_outcome() {
        let captured = captured_with_bidder_points();
        let scores = scores();
        let contract = contract(Bid::Frog);
        let defenders: Vec<PlayerName> = vec!["ben".into(), "cal".into()];
        let opponents: Vec<PlayerName> = vec!["ben".into(), "cal".into(), PlayerName::kitty()];
        let mut insurance =
            InsuranceState::new("ana".into(), &defenders, Bid::Frog);
        insurance.adjust(&"ben".into(), 30).unwrap();
        insurance.adjust(&"cal".into(), 20).unwrap();
        insurance.adjust(&"ana".into(), 50).unwrap();
        assert!(insurance.executed().is_some());

        let summary = score_round(&RoundInput {
            contract: &contract,
            captured: &captured,
            widow: &[],
            opponents: &opponents,
            insurance: Some(&insurance),
            scores: &scores,
        });
        assert!(summary.insurance_executed);
        assert_eq!(summary.deltas[&"ana".into()], 50);
        assert_eq!(summary.deltas[&"ben".into()], -30);
        assert_eq!(summary.deltas[&"cal".into()], -20);
        // Placeholder untouched by an insurance settlement.
        assert_eq!(summary.deltas[&PlayerName::kitty()], 0);
        assert!(summary.round_message.contains("hindsight") || summary.round_message.contains("cards would have paid"));
    }

    #[test]
    fn proportional_split_conserves_pot() {
        let weights: Vec<(PlayerName, i64)> =
            vec![("ana".into(), 87), ("ben".into(), 120), ("cal".into(), 33)];
        for pot in [1, 7, 100, 300, 999] {
            let payouts = proportional_split(&weights, pot);
            assert_eq!(payouts.values().sum::<i64>(), pot, "pot {pot} leaked");
        }
    }

    #[test]
    fn proportional_split_handles_all_nonpositive_scores() {
        let weights: Vec<(PlayerName, i64)> = vec![("ana".into(), 0), ("ben".into(), -5)];
        let payouts = proportional_split(&weights, 101);
        assert_eq!(payouts.values().sum::<i64>(), 101);
    }

    #[test]
    fn forfeit_payout_returns_buy_in_plus_share() {
        let remaining = vec![(PlayerName::from("ana"), 100), (PlayerName::from("ben"), 50)];
        let payouts = forfeit_payout(&remaining, 90);
        // Total: two buy-ins back plus the forfeiter's stake.
        assert_eq!(payouts.values().sum::<i64>(), 3 * 90);
        assert!(payouts[&"ana".into()] > payouts[&"ben".into()]);
        assert_eq!(payouts[&"ana".into()], 90 + 60);
        assert_eq!(payouts[&"ben".into()], 90 + 30);
    }

    #[test]
    fn rank_points_cover_expected_table() {
        assert_eq!(Rank::Ace.points(), 11);
        assert_eq!(Rank::Ten.points(), 10);
        assert_eq!(Rank::King.points(), 4);
        assert_eq!(Rank::Queen.points(), 3);
        assert_eq!(Rank::Jack.points(), 2);
        assert_eq!(Rank::Nine.points(), 0);
    }
}
