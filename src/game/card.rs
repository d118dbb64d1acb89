//! Cards and the Deck
//!
//! Twelve cards, six faces, two of each. The deck is dealt in a fixed
//! order and then shuffled in place.

use serde::{Serialize, Deserialize};

use crate::core::rng::DeterministicRng;

/// Card identifier as carried on the wire (1..=12 for a dealt deck).
pub type CardId = u32;

/// Number of distinct faces in a deck.
pub const FACE_COUNT: usize = 6;

/// Number of cards in a full deck.
pub const DECK_SIZE: usize = FACE_COUNT * 2;

// =============================================================================
// FACE
// =============================================================================

/// Face label printed on a card.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum Face {
    /// Face "A"
    A,
    /// Face "B"
    B,
    /// Face "C"
    C,
    /// Face "D"
    D,
    /// Face "E"
    E,
    /// Face "F"
    F,
}

impl Face {
    /// All faces in deal order.
    pub const ALL: [Face; FACE_COUNT] = [Face::A, Face::B, Face::C, Face::D, Face::E, Face::F];
}

// =============================================================================
// CARD
// =============================================================================

/// A single card on the board.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Card {
    /// Unique identifier within the deck.
    pub id: CardId,
    /// Face label.
    #[serde(rename = "name")]
    pub face: Face,
    /// Currently face up.
    pub flipped: bool,
    /// Already paired off.
    pub matched: bool,
}

impl Card {
    /// Create a face-down, unmatched card.
    pub fn new(id: CardId, face: Face) -> Self {
        Self {
            id,
            face,
            flipped: false,
            matched: false,
        }
    }

    /// Face up but not yet paired.
    #[inline]
    pub fn is_pending(&self) -> bool {
        self.flipped && !self.matched
    }
}

// =============================================================================
// DECK
// =============================================================================

/// The board: an ordered list of cards, empty outside a running match.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Deck {
    cards: Vec<Card>,
}

impl Deck {
    /// Empty deck (lobby state).
    pub fn empty() -> Self {
        Self::default()
    }

    /// Full deck in deal order: ids 1,2 are A; 3,4 are B; ... 11,12 are F.
    pub fn ordered() -> Self {
        let cards = Face::ALL
            .iter()
            .enumerate()
            .flat_map(|(i, face)| {
                let first = (i * 2 + 1) as CardId;
                [Card::new(first, *face), Card::new(first + 1, *face)]
            })
            .collect();
        Self { cards }
    }

    /// Full deck in a uniformly random order.
    pub fn shuffled(rng: &mut DeterministicRng) -> Self {
        let mut deck = Self::ordered();
        rng.shuffle(&mut deck.cards);
        deck
    }

    /// Build a deck from explicit cards.
    pub fn from_cards(cards: Vec<Card>) -> Self {
        Self { cards }
    }

    /// Cards in board order.
    pub fn cards(&self) -> &[Card] {
        &self.cards
    }

    /// Number of cards.
    pub fn len(&self) -> usize {
        self.cards.len()
    }

    /// True outside a running match.
    pub fn is_empty(&self) -> bool {
        self.cards.is_empty()
    }

    /// Look up a card by id.
    pub fn get(&self, id: CardId) -> Option<&Card> {
        self.cards.iter().find(|c| c.id == id)
    }

    /// Look up a card by id, mutably.
    pub fn get_mut(&mut self, id: CardId) -> Option<&mut Card> {
        self.cards.iter_mut().find(|c| c.id == id)
    }

    /// Ids of cards that are face up but not yet matched, in board order.
    pub fn pending(&self) -> Vec<CardId> {
        self.cards
            .iter()
            .filter(|c| c.is_pending())
            .map(|c| c.id)
            .collect()
    }

    /// Every card matched. False for an empty deck.
    pub fn all_matched(&self) -> bool {
        !self.cards.is_empty() && self.cards.iter().all(|c| c.matched)
    }

    /// Discard all cards.
    pub fn clear(&mut self) {
        self.cards.clear();
    }

    /// Check the pairing invariant: six distinct faces, exactly two cards each,
    /// unique ids.
    pub fn is_well_formed(&self) -> bool {
        if self.cards.len() != DECK_SIZE {
            return false;
        }
        let mut ids: Vec<CardId> = self.cards.iter().map(|c| c.id).collect();
        ids.sort_unstable();
        ids.dedup();
        if ids.len() != DECK_SIZE {
            return false;
        }
        Face::ALL
            .iter()
            .all(|face| self.cards.iter().filter(|c| c.face == *face).count() == 2)
    }
}
