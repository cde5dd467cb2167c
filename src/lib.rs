pub mod error;
pub mod utils;
pub mod games;
pub mod camera;
pub mod samples;
pub mod features;
pub mod neural;
pub mod training;
pub mod scheduler;
pub mod prediction;
pub mod session;
pub mod view;

pub use error::{GameError, Result};
pub use games::rps::{decide, Gesture, MoveSource, Outcome, RandomMoves, Score};
pub use session::{Session, SessionConfig, SessionEvent};
