//! # Errors
//!
//! Every fallible operation in the crate returns [`GameError`]. Some variants are
//! meant for the player (shown as a notice, the session carries on), the rest are
//! setup failures or broken invariants.

use thiserror::Error;
use crate::utils::{ClassId, Shape3};

#[derive(Error, Debug, Clone, PartialEq)]
pub enum GameError {
    #[error("failed to load feature extractor weights from {location}: {reason}")]
    ModelLoad { location: String, reason: String },
    #[error("frame shape {found:?} does not match the expected input {expected:?}")]
    InputShape { expected: Shape3, found: Shape3 },
    #[error("feature vector shape {found:?} does not match {expected:?}")]
    FeatureShape { expected: Shape3, found: Shape3 },
    #[error("no training samples have been collected")]
    EmptyDataset,
    #[error("add training data: at least {required} samples are needed ({policy})")]
    InsufficientSamples { required: usize, policy: &'static str },
    #[error("training data mismatch: {features} feature vectors, {labels} labels of width {width}")]
    TrainingDataShape { features: usize, labels: usize, width: usize },
    #[error("the classifier has not been trained yet")]
    ModelNotTrained,
    #[error("unknown class id {0}")]
    UnknownClass(ClassId),
    #[error("camera error: {0}")]
    Camera(String),
    #[error("invalid configuration: {0}")]
    InvalidConfig(String),
    #[error("{action} is unavailable while {mode}")]
    ControlsLocked { action: &'static str, mode: &'static str },
}

impl GameError {
    /// Errors the player can fix themselves (collect more samples, train first, wait).
    pub fn is_user_facing(&self) -> bool {
        matches!(self,
            GameError::EmptyDataset |
            GameError::InsufficientSamples { .. } |
            GameError::ModelNotTrained |
            GameError::ControlsLocked { .. }
        )
    }
}

pub type Result<T> = std::result::Result<T, GameError>;
