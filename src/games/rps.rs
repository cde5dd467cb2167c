//! # Rock-Paper-Scissors
//!
//! The referee for a round between the player's recognised gesture and the computer's
//! random throw. Gestures double as the classifier's class ids (0 = rock, 1 = paper,
//! 2 = scissors).

use std::fmt;
use rand::Rng;
use rand::rngs::ThreadRng;
use crate::error::{GameError, Result};
use crate::utils::{ClassId, NUM_CLASSES};

#[derive(Clone, Copy, Eq, PartialEq, Hash)]
pub enum Gesture { Rock, Paper, Scissors }

impl fmt::Debug for Gesture {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Gesture::Rock => write!(f, "Rock"),
            Gesture::Paper => write!(f, "Paper"),
            Gesture::Scissors => write!(f, "Scissors"),
        }
    }
}

impl Gesture {
    pub const ALL: [Gesture; NUM_CLASSES] = [Gesture::Rock, Gesture::Paper, Gesture::Scissors];

    #[inline] pub fn class_id(self) -> ClassId {
        match self { Gesture::Rock => 0, Gesture::Paper => 1, Gesture::Scissors => 2 }
    }

    pub fn from_class_id(id: ClassId) -> Result<Gesture> {
        Gesture::ALL.get(id).copied().ok_or(GameError::UnknownClass(id))
    }

    pub fn as_str(self) -> &'static str {
        match self { Gesture::Rock => "Rock", Gesture::Paper => "Paper", Gesture::Scissors => "Scissors" }
    }

    /// Rock beats Scissors, Scissors beats Paper, Paper beats Rock
    pub fn beats(self, other: Gesture) -> bool {
        matches!((self, other),
            (Gesture::Rock, Gesture::Scissors) |
            (Gesture::Scissors, Gesture::Paper) |
            (Gesture::Paper, Gesture::Rock)
        )
    }

    /// The throw that beats this one
    pub fn counter(self) -> Gesture {
        match self { Gesture::Rock => Gesture::Paper, Gesture::Paper => Gesture::Scissors, Gesture::Scissors => Gesture::Rock }
    }

    /// The throw this one beats
    pub fn victim(self) -> Gesture {
        match self { Gesture::Rock => Gesture::Scissors, Gesture::Paper => Gesture::Rock, Gesture::Scissors => Gesture::Paper }
    }
}

impl std::str::FromStr for Gesture {
    type Err = GameError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "rock" | "r" | "0" => Ok(Gesture::Rock),
            "paper" | "p" | "1" => Ok(Gesture::Paper),
            "scissors" | "s" | "2" => Ok(Gesture::Scissors),
            other => Err(GameError::UnknownClass(other.parse().unwrap_or(usize::MAX))),
        }
    }
}

#[derive(Clone, Copy, Debug, Eq, PartialEq, Hash)]
pub enum Outcome { Player, Computer, Tie }

impl fmt::Display for Outcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Outcome::Player => write!(f, "PLAYER"),
            Outcome::Computer => write!(f, "COMPUTER"),
            Outcome::Tie => write!(f, "TIE"),
        }
    }
}

/// Who takes the round. Total over every pair of gestures.
pub fn decide(player: Gesture, computer: Gesture) -> Outcome {
    if player == computer { return Outcome::Tie; }
    if player.beats(computer) { Outcome::Player } else { Outcome::Computer }
}

/// Running tally; ties leave it untouched
#[derive(Clone, Copy, Debug, Default, Eq, PartialEq)]
pub struct Score {
    pub player: u32,
    pub computer: u32,
}

impl Score {
    pub fn record(&mut self, outcome: Outcome) {
        match outcome {
            Outcome::Player => self.player += 1,
            Outcome::Computer => self.computer += 1,
            Outcome::Tie => {}
        }
    }

    pub fn reset(&mut self) {
        *self = Score::default();
    }
}

/// Where the computer's throw comes from
pub trait MoveSource {
    fn next_move(&mut self) -> Gesture;
}

/// Uniform over the three gestures, independent of history
pub struct RandomMoves<R: Rng = ThreadRng> {
    rng: R,
}

impl RandomMoves<ThreadRng> {
    pub fn new() -> Self {
        Self { rng: rand::rng() }
    }
}

impl Default for RandomMoves<ThreadRng> {
    fn default() -> Self {
        Self::new()
    }
}

impl<R: Rng> RandomMoves<R> {
    pub fn with_rng(rng: R) -> Self {
        Self { rng }
    }
}

impl<R: Rng> MoveSource for RandomMoves<R> {
    fn next_move(&mut self) -> Gesture {
        Gesture::ALL[self.rng.random_range(0..NUM_CLASSES)]
    }
}
