//! Flip Resolution
//!
//! Validates a single card flip and resolves the face-up pair:
//!
//! 1. Ignore unknown, face-up or matched cards
//! 2. Turn the card face up
//! 3. With exactly two pending cards: score a match, or schedule a
//!    mismatch-reset
//! 4. Check for game over
//!
//! Turn ownership is not checked here; any connection may flip any card.

use serde::{Serialize, Deserialize};

use crate::game::card::CardId;
use crate::game::state::{MatchState, Seat, Winner};

/// A mismatched pair waiting to be turned back over.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct PendingReset {
    /// Deck generation the pair belongs to.
    pub generation: u64,
    /// First card of the pair.
    pub first: CardId,
    /// Second card of the pair.
    pub second: CardId,
}

/// How the face-up pair resolved.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Resolution {
    /// Not exactly two pending cards.
    Unresolved,
    /// Same face: both matched, current player scored.
    Matched {
        /// Seat credited, if the turn pointed at a seated player.
        scorer: Option<Seat>,
    },
    /// Different faces: reset after the delay.
    Mismatched(PendingReset),
}

/// Final result broadcast at game over.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GameResult {
    /// Scores in seat order.
    pub final_scores: Vec<u32>,
    /// Winning seat or draw.
    pub winner: Winner,
}

/// Result of a flip.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum FlipOutcome {
    /// Nothing changed.
    Ignored,
    /// Card turned face up.
    Flipped {
        /// Pair resolution.
        resolution: Resolution,
        /// Set once every card is matched.
        game_over: Option<GameResult>,
    },
}

/// Result of running a pending mismatch-reset.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ResetOutcome {
    /// Deck was cleared or redealt since the pair was flipped.
    Stale,
    /// Cards turned back; turn passed (if a match is running).
    Reset {
        /// New turn.
        turn: Option<Seat>,
    },
}

impl MatchState {
    /// Flip a card face up and resolve.
    pub fn flip(&mut self, card_id: CardId) -> FlipOutcome {
        match self.deck.get_mut(card_id) {
            Some(card) if !card.flipped && !card.matched => card.flipped = true,
            _ => return FlipOutcome::Ignored,
        }

        let resolution = self.resolve_pending();
        let game_over = self.game_result();

        FlipOutcome::Flipped { resolution, game_over }
    }

    fn resolve_pending(&mut self) -> Resolution {
        let pending = self.deck.pending();
        let &[first, second] = pending.as_slice() else {
            return Resolution::Unresolved;
        };

        let same_face = match (self.deck.get(first), self.deck.get(second)) {
            (Some(a), Some(b)) => a.face == b.face,
            _ => return Resolution::Unresolved,
        };

        if !same_face {
            return Resolution::Mismatched(PendingReset {
                generation: self.generation,
                first,
                second,
            });
        }

        for id in [first, second] {
            if let Some(card) = self.deck.get_mut(id) {
                card.matched = true;
            }
        }

        let scorer = self.turn.filter(|seat| seat.index() < self.players.len());
        if let Some(seat) = scorer {
            self.players[seat.index()].score += 1;
        }

        Resolution::Matched { scorer }
    }

    /// Turn a mismatched pair back over and pass the turn.
    ///
    /// A no-op when the deck generation moved on since `pending` was created.
    pub fn apply_reset(&mut self, pending: PendingReset) -> ResetOutcome {
        if pending.generation != self.generation || self.deck.is_empty() {
            return ResetOutcome::Stale;
        }

        for id in [pending.first, pending.second] {
            if let Some(card) = self.deck.get_mut(id) {
                if !card.matched {
                    card.flipped = false;
                }
            }
        }

        self.turn = self.turn.map(Seat::other);
        ResetOutcome::Reset { turn: self.turn }
    }

    /// Final result once every card is matched.
    ///
    /// Missing players count as zero.
    pub fn game_result(&self) -> Option<GameResult> {
        if !self.deck.all_matched() {
            return None;
        }

        let score = |seat: Seat| self.player(seat).map(|p| p.score).unwrap_or(0);
        Some(GameResult {
            final_scores: self.scores(),
            winner: Winner::from_scores(score(Seat::One), score(Seat::Two)),
        })
    }
}
