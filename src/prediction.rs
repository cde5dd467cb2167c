//! # Prediction Loop
//!
//! Two-state machine (stopped / running) that classifies the camera on a fixed
//! interval and referees a round whenever the recognised gesture changes. A gesture
//! held across ticks only plays once.

use std::time::{Duration, Instant};
use burn::tensor::backend::Backend;
use crate::camera::Camera;
use crate::error::{GameError, Result};
use crate::features::FeatureExtractor;
use crate::games::rps::{decide, Gesture, MoveSource, Outcome};
use crate::neural::GestureClassifier;
use crate::scheduler::IntervalTimer;

#[derive(Debug, Clone, Copy, Eq, PartialEq)]
pub enum LoopState { Stopped, Running }

/// One refereed round
#[derive(Debug, Clone, Copy, Eq, PartialEq)]
pub struct Round {
    pub player: Gesture,
    pub computer: Gesture,
    pub outcome: Outcome,
}

#[derive(Debug, Clone, Copy, Eq, PartialEq)]
pub enum Tick {
    /// Same gesture as last tick, nothing played
    Unchanged(Gesture),
    Played(Round),
}

pub struct PredictionLoop<H> {
    head: Option<H>,
    timer: IntervalTimer,
    previous: Option<Gesture>,  // debounce cursor, unset until the first tick
}

impl<H: GestureClassifier> PredictionLoop<H> {
    pub fn new(interval: Duration) -> Self {
        Self { head: None, timer: IntervalTimer::new(interval), previous: None }
    }

    /// Swap in a freshly trained head; the old one is dropped
    pub fn install(&mut self, head: H) {
        self.head = Some(head);
    }

    /// Stop and forget the head
    pub fn discard(&mut self) {
        self.stop();
        self.head = None;
    }

    pub fn has_head(&self) -> bool {
        self.head.is_some()
    }

    pub fn head(&self) -> Option<&H> {
        self.head.as_ref()
    }

    pub fn start(&mut self, now: Instant) -> Result<()> {
        if self.head.is_none() {
            return Err(GameError::ModelNotTrained);
        }
        if self.state() == LoopState::Running {
            log::debug!("Prediction loop restarted; previous schedule cancelled");
        }
        self.timer.start(now);
        Ok(())
    }

    pub fn stop(&mut self) {
        self.timer.cancel();
    }

    pub fn state(&self) -> LoopState {
        if self.timer.is_active() { LoopState::Running } else { LoopState::Stopped }
    }

    pub fn previous(&self) -> Option<Gesture> {
        self.previous
    }

    pub fn reset_cursor(&mut self) {
        self.previous = None;
    }

    /// Tick if the interval has elapsed. `Ok(None)` when stopped or not yet due.
    pub fn poll<B, C, M>(&mut self, now: Instant, camera: &mut C, extractor: &FeatureExtractor<B>, moves: &mut M) -> Result<Option<Tick>>
    where
        B: Backend,
        C: Camera,
        M: MoveSource,
    {
        if !self.timer.fire(now) {
            return Ok(None);
        }
        self.tick(camera, extractor, moves).map(Some)
    }

    /// capture -> extract -> classify -> debounce -> referee
    pub fn tick<B, C, M>(&mut self, camera: &mut C, extractor: &FeatureExtractor<B>, moves: &mut M) -> Result<Tick>
    where
        B: Backend,
        C: Camera,
        M: MoveSource,
    {
        let head = self.head.as_ref().ok_or(GameError::ModelNotTrained)?;
        let frame = camera.capture()?;
        let features = extractor.extract(&frame)?;
        let player = head.classify(&features)?;

        let changed = self.previous != Some(player);
        self.previous = Some(player);
        if !changed {
            log::debug!("Still {:?}, no new round", player);
            return Ok(Tick::Unchanged(player));
        }

        let computer = moves.next_move();
        let outcome = decide(player, computer);
        log::info!("Player {:?} vs computer {:?}: {}", player, computer, outcome);
        Ok(Tick::Played(Round { player, computer, outcome }))
    }
}
