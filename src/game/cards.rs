//! Card primitives and pure rule functions.
//!
//! Frog is played with a 36-card deck (six through ace in four suits).
//! Rank strength and card point values are fixed and suit-independent.

use rand::{seq::SliceRandom, thread_rng};
use serde::{de, Deserialize, Deserializer, Serialize, Serializer};
use std::{fmt, str::FromStr};
use thiserror::Error;

/// Number of cards in a full deck.
pub const DECK_SIZE: usize = 36;

/// Cards dealt to each active player.
pub const CARDS_PER_HAND: usize = 11;

/// Sum of `card_points` over the full deck.
pub const TOTAL_CARD_POINTS: u32 = 120;

#[derive(Clone, Copy, Debug, Eq, Hash, Ord, PartialEq, PartialOrd, Serialize, Deserialize)]
pub enum Suit {
    Clubs,
    Spades,
    Diamonds,
    Hearts,
}

impl Suit {
    pub const ALL: [Suit; 4] = [Suit::Clubs, Suit::Spades, Suit::Diamonds, Suit::Hearts];

    fn code(self) -> char {
        match self {
            Self::Clubs => 'C',
            Self::Spades => 'S',
            Self::Diamonds => 'D',
            Self::Hearts => 'H',
        }
    }
}

impl fmt::Display for Suit {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.code())
    }
}

/// Rank strength, declared low to high. The ten outranks the king,
/// as in all ace-eleven point-trick games.
#[derive(Clone, Copy, Debug, Eq, Hash, Ord, PartialEq, PartialOrd)]
pub enum Rank {
    Six,
    Seven,
    Eight,
    Nine,
    Jack,
    Queen,
    King,
    Ten,
    Ace,
}

impl Rank {
    pub const ALL: [Rank; 9] = [
        Rank::Six,
        Rank::Seven,
        Rank::Eight,
        Rank::Nine,
        Rank::Jack,
        Rank::Queen,
        Rank::King,
        Rank::Ten,
        Rank::Ace,
    ];

    /// Card points contributed by this rank. The full deck totals 120.
    pub fn points(self) -> u32 {
        match self {
            Self::Ace => 11,
            Self::Ten => 10,
            Self::King => 4,
            Self::Queen => 3,
            Self::Jack => 2,
            _ => 0,
        }
    }

    fn token(self) -> &'static str {
        match self {
            Self::Six => "6",
            Self::Seven => "7",
            Self::Eight => "8",
            Self::Nine => "9",
            Self::Jack => "J",
            Self::Queen => "Q",
            Self::King => "K",
            Self::Ten => "10",
            Self::Ace => "A",
        }
    }
}

/// A single card, notated as rank token plus suit code (`"AH"`, `"10S"`).
#[derive(Clone, Copy, Debug, Eq, Hash, Ord, PartialEq, PartialOrd)]
pub struct Card {
    pub rank: Rank,
    pub suit: Suit,
}

impl Card {
    pub const fn new(rank: Rank, suit: Suit) -> Self {
        Self { rank, suit }
    }

    pub fn points(self) -> u32 {
        self.rank.points()
    }
}

impl fmt::Display for Card {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}{}", self.rank.token(), self.suit)
    }
}

#[derive(Debug, Error, PartialEq, Eq)]
#[error("invalid card token: {0}")]
pub struct ParseCardError(pub String);

impl FromStr for Card {
    type Err = ParseCardError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let bad = || ParseCardError(s.to_string());
        let (rank_part, suit_part) = s.split_at(s.len().checked_sub(1).ok_or_else(bad)?);
        let rank = match rank_part {
            "6" => Rank::Six,
            "7" => Rank::Seven,
            "8" => Rank::Eight,
            "9" => Rank::Nine,
            "J" => Rank::Jack,
            "Q" => Rank::Queen,
            "K" => Rank::King,
            "10" | "T" => Rank::Ten,
            "A" => Rank::Ace,
            _ => return Err(bad()),
        };
        let suit = match suit_part {
            "C" => Suit::Clubs,
            "S" => Suit::Spades,
            "D" => Suit::Diamonds,
            "H" => Suit::Hearts,
            _ => return Err(bad()),
        };
        Ok(Card { rank, suit })
    }
}

impl Serialize for Card {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for Card {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        s.parse().map_err(de::Error::custom)
    }
}

/// A full 36-card deck, reshuffled before every deal.
#[derive(Debug)]
pub struct Deck {
    cards: [Card; DECK_SIZE],
}

impl Default for Deck {
    fn default() -> Self {
        let mut cards = [Card::new(Rank::Six, Suit::Clubs); DECK_SIZE];
        let mut i = 0;
        for suit in Suit::ALL {
            for rank in Rank::ALL {
                cards[i] = Card::new(rank, suit);
                i += 1;
            }
        }
        Self { cards }
    }
}

impl Deck {
    /// Uniform-random permutation of the deck.
    pub fn shuffle(&mut self) {
        self.cards.shuffle(&mut thread_rng());
    }

    pub fn cards(&self) -> &[Card] {
        &self.cards
    }
}

/// Sum the fixed point table over a set of cards.
pub fn card_points<'a, I>(cards: I) -> u32
where
    I: IntoIterator<Item = &'a Card>,
{
    cards.into_iter().map(|c| c.points()).sum()
}

/// Enumerate the cards a hand may legally play.
///
/// Leading: trump may not be led until broken, unless the hand is all
/// trump. Following: the lead suit is mandatory if held, otherwise trump
/// is mandatory if held, otherwise anything goes. Never empty for a
/// non-empty hand.
pub fn legal_moves(
    hand: &[Card],
    is_leading: bool,
    lead_suit: Option<Suit>,
    trump: Suit,
    trump_broken: bool,
) -> Vec<Card> {
    if is_leading {
        if trump_broken {
            return hand.to_vec();
        }
        let non_trump: Vec<Card> = hand.iter().copied().filter(|c| c.suit != trump).collect();
        if non_trump.is_empty() {
            // All-trump hand may lead trump even unbroken.
            return hand.to_vec();
        }
        return non_trump;
    }

    let Some(lead) = lead_suit else {
        // Not leading but no lead suit recorded: treat as unconstrained.
        return hand.to_vec();
    };

    let following: Vec<Card> = hand.iter().copied().filter(|c| c.suit == lead).collect();
    if !following.is_empty() {
        return following;
    }
    let trumps: Vec<Card> = hand.iter().copied().filter(|c| c.suit == trump).collect();
    if !trumps.is_empty() {
        return trumps;
    }
    hand.to_vec()
}

/// Index of the winning card in a completed trick.
///
/// Highest trump wins if any trump was played, otherwise the highest
/// card of the lead suit. Ranks within a suit are unique, so there is
/// always a single winner.
pub fn trick_winner(plays: &[Card], lead_suit: Suit, trump: Suit) -> usize {
    let best_of = |suit: Suit| {
        plays
            .iter()
            .enumerate()
            .filter(|(_, c)| c.suit == suit)
            .max_by_key(|(_, c)| c.rank)
            .map(|(i, _)| i)
    };
    best_of(trump)
        .or_else(|| best_of(lead_suit))
        .unwrap_or_default()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn card(s: &str) -> Card {
        s.parse().unwrap()
    }

    #[test]
    fn deck_totals_120_points() {
        let deck = Deck::default();
        assert_eq!(deck.cards().len(), DECK_SIZE);
        assert_eq!(card_points(deck.cards()), TOTAL_CARD_POINTS);
    }

    #[test]
    fn deck_has_no_duplicates() {
        let deck = Deck::default();
        let mut seen = std::collections::HashSet::new();
        for c in deck.cards() {
            assert!(seen.insert(*c), "duplicate card {c}");
        }
    }

    #[test]
    fn card_token_round_trip() {
        for token in ["AH", "10S", "6C", "QD", "JH"] {
            assert_eq!(card(token).to_string(), token);
        }
        assert_eq!(card("TS"), card("10S"));
        assert!("XH".parse::<Card>().is_err());
        assert!("".parse::<Card>().is_err());
    }

    #[test]
    fn ten_outranks_king() {
        assert!(Rank::Ten > Rank::King);
        assert!(Rank::Ace > Rank::Ten);
        assert!(Rank::King > Rank::Queen);
    }

    #[test]
    fn leading_excludes_unbroken_trump() {
        let hand = vec![card("AH"), card("9S"), card("KC")];
        let moves = legal_moves(&hand, true, None, Suit::Hearts, false);
        assert_eq!(moves, vec![card("9S"), card("KC")]);
    }

    #[test]
    fn leading_all_trump_hand_may_lead_trump() {
        let hand = vec![card("AH"), card("7H")];
        let moves = legal_moves(&hand, true, None, Suit::Hearts, false);
        assert_eq!(moves.len(), 2);
    }

    #[test]
    fn following_must_follow_suit() {
        let hand = vec![card("6S"), card("AH"), card("KD")];
        let moves = legal_moves(&hand, false, Some(Suit::Spades), Suit::Hearts, true);
        assert_eq!(moves, vec![card("6S")]);
    }

    #[test]
    fn following_without_suit_must_trump() {
        let hand = vec![card("AH"), card("KD")];
        let moves = legal_moves(&hand, false, Some(Suit::Spades), Suit::Hearts, false);
        assert_eq!(moves, vec![card("AH")]);
    }

    #[test]
    fn following_without_suit_or_trump_plays_anything() {
        let hand = vec![card("KD"), card("6C")];
        let moves = legal_moves(&hand, false, Some(Suit::Spades), Suit::Hearts, false);
        assert_eq!(moves.len(), 2);
    }

    #[test]
    fn highest_lead_suit_wins_without_trump() {
        let plays = vec![card("KS"), card("AS"), card("AD")];
        assert_eq!(trick_winner(&plays, Suit::Spades, Suit::Hearts), 1);
    }

    #[test]
    fn any_trump_beats_lead_suit() {
        let plays = vec![card("AS"), card("6H"), card("10S")];
        assert_eq!(trick_winner(&plays, Suit::Spades, Suit::Hearts), 1);
    }

    #[test]
    fn highest_trump_wins_among_trumps() {
        let plays = vec![card("6H"), card("10H"), card("KH")];
        assert_eq!(trick_winner(&plays, Suit::Hearts, Suit::Hearts), 1);
    }
}
