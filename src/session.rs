//! # Game Session
//!
//! Owns everything a play session needs: the camera, the frozen extractor, the
//! sample store, the trainer and the prediction loop. The six player actions are
//! methods here, and `poll` drives both recurring timers (guided capture and
//! prediction) from the host's event loop. All state lives on one control thread.

use std::time::{Duration, Instant};
use burn::tensor::backend::AutodiffBackend;
use crate::camera::Camera;
use crate::error::{GameError, Result};
use crate::features::{ExtractorConfig, FeatureExtractor};
use crate::games::rps::{Gesture, MoveSource, Score};
use crate::neural::TrainedHead;
use crate::prediction::{LoopState, PredictionLoop, Round, Tick};
use crate::samples::SampleStore;
use crate::scheduler::CountedTimer;
use crate::training::{BatchProgress, Trainer, TrainingConfig};
use crate::utils::{CAPTURE_INTERVAL_MS, NUM_CLASSES, PREDICT_INTERVAL_MS, REQUIRED_SAMPLES};
use crate::view::View;

/// When training and prediction unlock
#[derive(Debug, Clone, Copy, Eq, PartialEq)]
pub enum EligibilityPolicy {
    /// At least one gesture has the required number of samples
    AnyClass,
    /// Every gesture has the required number of samples
    EveryClass,
}

impl EligibilityPolicy {
    pub fn allows(self, counts: &[usize; NUM_CLASSES], required: usize) -> bool {
        match self {
            EligibilityPolicy::AnyClass => counts.iter().any(|&c| c >= required),
            EligibilityPolicy::EveryClass => counts.iter().all(|&c| c >= required),
        }
    }

    fn describe(self) -> &'static str {
        match self {
            EligibilityPolicy::AnyClass => "for at least one gesture",
            EligibilityPolicy::EveryClass => "for every gesture",
        }
    }
}

#[derive(Debug, Clone)]
pub struct SessionConfig {
    pub required_samples: usize,
    pub predict_interval: Duration,
    pub capture_interval: Duration,
    pub eligibility: EligibilityPolicy,
    pub extractor: ExtractorConfig,
    pub training: TrainingConfig,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            required_samples: REQUIRED_SAMPLES,
            predict_interval: Duration::from_millis(PREDICT_INTERVAL_MS),
            capture_interval: Duration::from_millis(CAPTURE_INTERVAL_MS),
            eligibility: EligibilityPolicy::AnyClass,
            extractor: ExtractorConfig::default(),
            training: TrainingConfig::default(),
        }
    }
}

/// Player actions, for enablement queries
#[derive(Debug, Clone, Copy, Eq, PartialEq)]
pub enum Action {
    CollectSample,
    BeginCapture,
    Train,
    StartPredicting,
    StopPredicting,
    ResetScore,
    ResetAll,
}

impl Action {
    fn name(self) -> &'static str {
        match self {
            Action::CollectSample => "collecting a sample",
            Action::BeginCapture => "guided capture",
            Action::Train => "training",
            Action::StartPredicting => "starting predictions",
            Action::StopPredicting => "stopping predictions",
            Action::ResetScore => "resetting the score",
            Action::ResetAll => "resetting everything",
        }
    }
}

/// Which actions are on offer. Exactly one mode at a time.
#[derive(Debug, Clone, Copy, Eq, PartialEq)]
pub enum Controls {
    Idle,
    /// A guided capture owns the camera; only a full reset may interrupt it
    Capturing(Gesture),
    /// The prediction loop owns the camera for timed ticks
    Predicting,
}

impl Controls {
    pub fn enabled(self, action: Action) -> bool {
        match self {
            Controls::Idle => action != Action::StopPredicting,
            Controls::Capturing(_) => action == Action::ResetAll,
            Controls::Predicting => action != Action::BeginCapture,
        }
    }

    fn mode(self) -> &'static str {
        match self {
            Controls::Idle => "idle",
            Controls::Capturing(_) => "capturing samples",
            Controls::Predicting => "predicting",
        }
    }
}

/// Counters that outlive individual rounds
#[derive(Debug, Clone, Default)]
pub struct SessionState {
    pub score: Score,
    pub last_round: Option<Round>,
    pub last_prediction: Option<Gesture>,
}

/// What a `poll` produced
#[derive(Debug, Clone, PartialEq)]
pub enum SessionEvent {
    SampleCaptured { gesture: Gesture, count: usize },
    CaptureFinished(Gesture),
    Round(Round),
    /// A tick failed without stopping the loop
    TickSkipped(GameError),
}

struct CaptureRun {
    gesture: Gesture,
    timer: CountedTimer,
}

pub struct Session<B: AutodiffBackend, C: Camera, M: MoveSource> {
    config: SessionConfig,
    camera: C,
    moves: M,
    extractor: FeatureExtractor<B::InnerBackend>,
    store: SampleStore,
    trainer: Trainer<B>,
    predictor: PredictionLoop<TrainedHead<B::InnerBackend>>,
    state: SessionState,
    controls: Controls,
    capture: Option<CaptureRun>,
}

impl<B: AutodiffBackend, C: Camera, M: MoveSource> Session<B, C, M> {
    /// Acquire the camera, load the frozen weights and warm the extractor up.
    pub fn start(config: SessionConfig, mut camera: C, moves: M, device: B::Device) -> Result<Self> {
        camera.setup()?;
        let extractor = FeatureExtractor::load(config.extractor.clone(), &device)?;
        extractor.warm_up(&mut camera)?;
        log::info!("Session ready; {} samples per gesture unlock training", config.required_samples);
        Ok(Self {
            trainer: Trainer::new(config.training.clone(), device),
            predictor: PredictionLoop::new(config.predict_interval),
            config,
            camera,
            moves,
            extractor,
            store: SampleStore::new(),
            state: SessionState::default(),
            controls: Controls::Idle,
            capture: None,
        })
    }

    fn ensure_enabled(&self, action: Action) -> Result<()> {
        if self.controls.enabled(action) {
            Ok(())
        } else {
            Err(GameError::ControlsLocked { action: action.name(), mode: self.controls.mode() })
        }
    }

    fn ensure_eligible(&self) -> Result<()> {
        if !self.store.is_empty() && self.config.eligibility.allows(&self.store.counts(), self.config.required_samples) {
            Ok(())
        } else {
            Err(GameError::InsufficientSamples {
                required: self.config.required_samples,
                policy: self.config.eligibility.describe(),
            })
        }
    }

    pub fn is_eligible(&self) -> bool {
        self.ensure_eligible().is_ok()
    }

    fn capture_one(&mut self, gesture: Gesture) -> Result<usize> {
        let frame = self.camera.capture()?;
        let features = self.extractor.extract(&frame)?;
        let count = self.store.add_sample(features, gesture)?;
        log::info!("{} samples: {}", gesture.as_str(), count);
        Ok(count)
    }

    /// Grab a single labelled sample right now
    pub fn collect_sample(&mut self, gesture: Gesture) -> Result<usize> {
        self.ensure_enabled(Action::CollectSample)?;
        self.capture_one(gesture)
    }

    /// Capture on a timer until `gesture` has the required sample count. Returns false
    /// if it already has enough.
    pub fn begin_capture(&mut self, gesture: Gesture, now: Instant) -> Result<bool> {
        self.ensure_enabled(Action::BeginCapture)?;
        let missing = self.config.required_samples.saturating_sub(self.store.count(gesture));
        if missing == 0 {
            log::info!("{} already has {} samples", gesture.as_str(), self.store.count(gesture));
            return Ok(false);
        }
        self.capture = Some(CaptureRun {
            gesture,
            timer: CountedTimer::start(self.config.capture_interval, missing, now),
        });
        self.controls = Controls::Capturing(gesture);
        log::info!("Capturing {} {} samples", missing, gesture.as_str());
        Ok(true)
    }

    /// Fit a fresh head on everything collected so far and hand it to the loop
    pub fn train<F: FnMut(&BatchProgress)>(&mut self, on_batch: F) -> Result<()> {
        self.ensure_enabled(Action::Train)?;
        self.ensure_eligible()?;
        let labels = self.store.encode_labels(NUM_CLASSES)?;
        let head = self.trainer.train(self.store.features(), &labels, on_batch)?;
        self.predictor.install(head);
        log::info!("Training completed");
        Ok(())
    }

    pub fn start_predicting(&mut self, now: Instant) -> Result<()> {
        self.ensure_enabled(Action::StartPredicting)?;
        self.ensure_eligible()?;
        self.predictor.start(now)?;
        self.controls = Controls::Predicting;
        Ok(())
    }

    pub fn stop_predicting(&mut self) -> Result<()> {
        if self.controls != Controls::Predicting {
            return Ok(());
        }
        self.predictor.stop();
        self.controls = Controls::Idle;
        Ok(())
    }

    /// Stop the loop first, then clear the score and the debounce cursor
    pub fn reset_score(&mut self) -> Result<()> {
        self.ensure_enabled(Action::ResetScore)?;
        self.clear_score();
        Ok(())
    }

    fn clear_score(&mut self) {
        self.predictor.stop();
        if self.controls == Controls::Predicting {
            self.controls = Controls::Idle;
        }
        self.predictor.reset_cursor();
        self.state = SessionState::default();
    }

    /// Back to a fresh session: no samples, no head, no score, camera re-acquired
    pub fn reset_all(&mut self) -> Result<()> {
        if let Some(mut run) = self.capture.take() {
            run.timer.cancel();
        }
        self.controls = Controls::Idle;
        self.clear_score();
        self.predictor.discard();
        self.store.reset();
        self.camera.setup()?;
        self.extractor.warm_up(&mut self.camera)?;
        log::info!("Session reset");
        Ok(())
    }

    /// Advance both timers to `now`
    pub fn poll(&mut self, now: Instant) -> Result<Vec<SessionEvent>> {
        let mut events = Vec::new();

        if let Some(mut run) = self.capture.take() {
            if run.timer.fire(now) {
                match self.capture_one(run.gesture) {
                    Ok(count) => events.push(SessionEvent::SampleCaptured { gesture: run.gesture, count }),
                    Err(err) => {
                        // the run is dropped; give the controls back
                        self.controls = Controls::Idle;
                        return Err(err);
                    }
                }
            }
            if run.timer.is_finished() {
                self.controls = Controls::Idle;
                events.push(SessionEvent::CaptureFinished(run.gesture));
            } else {
                self.capture = Some(run);
            }
        }

        match self.predictor.poll(now, &mut self.camera, &self.extractor, &mut self.moves) {
            Ok(None) => {}
            Ok(Some(Tick::Unchanged(gesture))) => self.state.last_prediction = Some(gesture),
            Ok(Some(Tick::Played(round))) => {
                self.state.score.record(round.outcome);
                self.state.last_prediction = Some(round.player);
                self.state.last_round = Some(round);
                events.push(SessionEvent::Round(round));
            }
            Err(err @ GameError::InputShape { .. }) | Err(err @ GameError::Camera(_)) => {
                log::warn!("Prediction tick aborted: {}", err);
                events.push(SessionEvent::TickSkipped(err));
            }
            Err(err) => return Err(err),
        }
        Ok(events)
    }

    pub fn view(&self) -> View {
        View::project(&self.store.counts(), &self.state)
    }

    pub fn controls(&self) -> Controls { self.controls }
    pub fn loop_state(&self) -> LoopState { self.predictor.state() }
    pub fn state(&self) -> &SessionState { &self.state }
    pub fn samples(&self) -> &SampleStore { &self.store }
    pub fn debounce_cursor(&self) -> Option<Gesture> { self.predictor.previous() }
    pub fn is_trained(&self) -> bool { self.predictor.has_head() }
    pub fn head(&self) -> Option<&TrainedHead<B::InnerBackend>> { self.predictor.head() }
    pub fn extractor(&self) -> &FeatureExtractor<B::InnerBackend> { &self.extractor }
    pub fn camera(&self) -> &C { &self.camera }
    pub fn camera_mut(&mut self) -> &mut C { &mut self.camera }
    pub fn config(&self) -> &SessionConfig { &self.config }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::VecDeque;
    use burn::backend::{Autodiff, NdArray};
    use crate::camera::SyntheticCamera;
    use crate::features::WeightSource;
    use crate::games::rps::Outcome;
    use crate::neural::GestureClassifier;

    type TestBackend = Autodiff<NdArray>;

    /// Plays a fixed list of throws, then repeats the last one
    struct Scripted(VecDeque<Gesture>, Gesture);

    impl Scripted {
        fn new(moves: &[Gesture]) -> Self {
            Self(moves.iter().copied().collect(), *moves.last().unwrap_or(&Gesture::Rock))
        }

        fn push(&mut self, g: Gesture) {
            self.0.push_back(g);
        }
    }

    impl MoveSource for Scripted {
        fn next_move(&mut self) -> Gesture {
            let next = self.0.pop_front().unwrap_or(self.1);
            self.1 = next;
            next
        }
    }

    fn config() -> SessionConfig {
        SessionConfig {
            extractor: ExtractorConfig { image_size: 8, grid: 2, channels: 4, weights: WeightSource::Seeded(11) },
            training: TrainingConfig { epochs: 2, shuffle_seed: Some(5), ..TrainingConfig::default() },
            ..SessionConfig::default()
        }
    }

    fn session(moves: &[Gesture]) -> Session<TestBackend, SyntheticCamera, Scripted> {
        Session::start(config(), SyntheticCamera::new(8, 3), Scripted::new(moves), Default::default()).unwrap()
    }

    fn collect(s: &mut Session<TestBackend, SyntheticCamera, Scripted>, gesture: Gesture, n: usize) {
        s.camera_mut().set_pose(Some(gesture));
        for _ in 0..n {
            s.collect_sample(gesture).unwrap();
        }
    }

    #[test]
    fn test_training_needs_samples() {
        let mut s = session(&[Gesture::Rock]);
        assert!(matches!(s.train(|_| {}), Err(GameError::InsufficientSamples { .. })));
        collect(&mut s, Gesture::Rock, 5);
        let err = s.train(|_| {}).unwrap_err();
        assert!(err.is_user_facing());
        assert!(!s.is_trained());
    }

    #[test]
    fn test_predicting_needs_training() {
        let mut s = session(&[Gesture::Rock]);
        collect(&mut s, Gesture::Rock, REQUIRED_SAMPLES);
        assert_eq!(s.start_predicting(Instant::now()), Err(GameError::ModelNotTrained));
        assert_eq!(s.loop_state(), LoopState::Stopped);
        assert_eq!(s.controls(), Controls::Idle);
    }

    #[test]
    fn test_every_class_policy() {
        let policy = EligibilityPolicy::EveryClass;
        assert!(!policy.allows(&[20, 20, 0], 20));
        assert!(policy.allows(&[20, 21, 20], 20));
        assert!(EligibilityPolicy::AnyClass.allows(&[0, 20, 0], 20));
        assert!(!EligibilityPolicy::AnyClass.allows(&[19, 19, 19], 20));
    }

    #[test]
    fn test_collect_train_and_play_a_round() {
        let mut s = session(&[]);
        collect(&mut s, Gesture::Rock, 20);
        collect(&mut s, Gesture::Paper, 20);
        assert_eq!(s.samples().counts(), [20, 20, 0]);

        let mut batches = 0;
        s.train(|_| batches += 1).unwrap();
        assert_eq!(batches, 2 * 2);  // 40 samples in batches of 32, two epochs

        // the camera is noiseless, so the head's verdict on the rock pose is fixed;
        // script the computer to throw whatever that verdict beats
        s.camera_mut().set_pose(Some(Gesture::Rock));
        let frame = s.camera_mut().capture().unwrap();
        let features = s.extractor().extract(&frame).unwrap();
        let predicted = s.head().unwrap().classify(&features).unwrap();
        s.moves.push(predicted.victim());

        let t0 = Instant::now();
        s.start_predicting(t0).unwrap();
        assert_eq!(s.controls(), Controls::Predicting);
        let events = s.poll(t0 + s.config().predict_interval).unwrap();
        assert_eq!(events, vec![SessionEvent::Round(Round {
            player: predicted,
            computer: predicted.victim(),
            outcome: Outcome::Player,
        })]);
        assert_eq!(s.state().score, Score { player: 1, computer: 0 });

        // holding the same pose does not play again
        let events = s.poll(t0 + 2 * s.config().predict_interval).unwrap();
        assert!(events.is_empty());
        assert_eq!(s.state().score, Score { player: 1, computer: 0 });
    }

    #[test]
    fn test_guided_capture_runs_to_threshold() {
        let mut s = session(&[]);
        s.camera_mut().set_pose(Some(Gesture::Scissors));
        let t0 = Instant::now();
        assert!(s.begin_capture(Gesture::Scissors, t0).unwrap());
        assert_eq!(s.controls(), Controls::Capturing(Gesture::Scissors));
        assert!(matches!(s.collect_sample(Gesture::Rock), Err(GameError::ControlsLocked { .. })));
        assert!(matches!(s.train(|_| {}), Err(GameError::ControlsLocked { .. })));

        let step = s.config().capture_interval;
        let mut finished = false;
        for k in 1..=(REQUIRED_SAMPLES as u32 + 5) {
            let events = s.poll(t0 + k * step).unwrap();
            finished |= events.contains(&SessionEvent::CaptureFinished(Gesture::Scissors));
        }
        assert!(finished);
        assert_eq!(s.samples().count(Gesture::Scissors), REQUIRED_SAMPLES);
        assert_eq!(s.controls(), Controls::Idle);
        // already full
        assert!(!s.begin_capture(Gesture::Scissors, t0).unwrap());
    }

    #[test]
    fn test_reset_score_stops_loop() {
        let mut s = session(&[Gesture::Scissors]);
        collect(&mut s, Gesture::Rock, REQUIRED_SAMPLES);
        s.train(|_| {}).unwrap();
        let t0 = Instant::now();
        s.start_predicting(t0).unwrap();
        s.poll(t0 + s.config().predict_interval).unwrap();
        assert!(s.debounce_cursor().is_some());

        s.reset_score().unwrap();
        assert_eq!(s.loop_state(), LoopState::Stopped);
        assert_eq!(s.controls(), Controls::Idle);
        assert_eq!(s.state().score, Score::default());
        assert_eq!(s.debounce_cursor(), None);
        // samples and head survive a score reset
        assert_eq!(s.samples().count(Gesture::Rock), REQUIRED_SAMPLES);
        assert!(s.is_trained());
    }

    #[test]
    fn test_reset_all_returns_to_fresh_session() {
        let mut s = session(&[Gesture::Paper, Gesture::Rock, Gesture::Scissors]);
        collect(&mut s, Gesture::Rock, REQUIRED_SAMPLES);
        collect(&mut s, Gesture::Scissors, 3);
        s.train(|_| {}).unwrap();
        let t0 = Instant::now();
        s.start_predicting(t0).unwrap();
        s.camera_mut().set_pose(Some(Gesture::Rock));
        s.poll(t0 + s.config().predict_interval).unwrap();
        s.camera_mut().set_pose(Some(Gesture::Scissors));
        s.poll(t0 + 2 * s.config().predict_interval).unwrap();

        s.reset_all().unwrap();
        assert_eq!(s.samples().counts(), [0; NUM_CLASSES]);
        assert!(s.samples().is_empty());
        assert_eq!(s.state().score, Score::default());
        assert_eq!(s.debounce_cursor(), None);
        assert_eq!(s.loop_state(), LoopState::Stopped);
        assert!(!s.is_trained());
        assert!(matches!(s.start_predicting(t0), Err(GameError::InsufficientSamples { .. })));
    }

    #[test]
    fn test_reset_all_cancels_capture() {
        let mut s = session(&[]);
        let t0 = Instant::now();
        s.begin_capture(Gesture::Paper, t0).unwrap();
        s.poll(t0 + s.config().capture_interval).unwrap();
        s.reset_all().unwrap();
        assert_eq!(s.controls(), Controls::Idle);
        assert!(s.poll(t0 + 10 * s.config().capture_interval).unwrap().is_empty());
        assert!(s.samples().is_empty());
    }
}
