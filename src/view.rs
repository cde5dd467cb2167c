//! Display-only projection of the session, recomputed on every change.

use std::fmt;
use crate::games::rps::Gesture;
use crate::session::SessionState;
use crate::utils::NUM_CLASSES;

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct View {
    pub sample_counts: [String; NUM_CLASSES],
    pub prediction: String,
    pub computer: String,
    pub winner: String,
    pub score: String,
}

impl View {
    pub fn project(counts: &[usize; NUM_CLASSES], state: &SessionState) -> Self {
        let sample_counts = Gesture::ALL.map(|g| format!("{} samples:{}", g.as_str(), counts[g.class_id()]));
        let prediction = state.last_prediction.map(|g| format!("PL {}", g.as_str())).unwrap_or_default();
        let (computer, winner, score) = match state.last_round {
            Some(round) => (
                format!("CP {}", round.computer.as_str()),
                format!("WINNER {}", round.outcome),
                format!("Computer's Score {} / Player's Score {}", state.score.computer, state.score.player),
            ),
            None => Default::default(),
        };
        Self { sample_counts, prediction, computer, winner, score }
    }
}

impl fmt::Display for View {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "{}", self.sample_counts.join(" | "))?;
        for line in [&self.prediction, &self.computer, &self.winner, &self.score] {
            if !line.is_empty() {
                writeln!(f, "{}", line)?;
            }
        }
        Ok(())
    }
}
