//! # Sample Store
//!
//! Labelled feature vectors gathered while the player holds up each gesture. Every
//! stored vector must have the same activation shape; the first sample fixes it.

use crate::error::{GameError, Result};
use crate::games::rps::Gesture;
use crate::utils::{one_hot, ClassId, Shape3, NUM_CLASSES};

/// Activation map produced by the frozen extractor, kept as plain row-major data
#[derive(Clone, Debug, PartialEq)]
pub struct FeatureVector {
    shape: Shape3,
    values: Vec<f32>,
}

impl FeatureVector {
    pub fn new(shape: Shape3, values: Vec<f32>) -> Result<Self> {
        let expected = shape.iter().product::<usize>();
        if values.len() != expected {
            return Err(GameError::FeatureShape { expected: shape, found: [values.len(), 1, 1] });
        }
        Ok(Self { shape, values })
    }

    pub fn shape(&self) -> Shape3 { self.shape }
    pub fn values(&self) -> &[f32] { &self.values }
    pub fn len(&self) -> usize { self.values.len() }
    pub fn is_empty(&self) -> bool { self.values.is_empty() }
}

#[derive(Clone, Debug, PartialEq)]
pub struct Sample {
    pub features: FeatureVector,
    pub label: Gesture,
}

#[derive(Debug, Default)]
pub struct SampleStore {
    features: Vec<FeatureVector>,
    labels: Vec<ClassId>,
    counts: [usize; NUM_CLASSES],
}

impl SampleStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append one sample. No deduplication; the only limit is memory.
    pub fn add_sample(&mut self, features: FeatureVector, label: Gesture) -> Result<usize> {
        if let Some(expected) = self.feature_shape() {
            if features.shape() != expected {
                return Err(GameError::FeatureShape { expected, found: features.shape() });
            }
        }
        self.features.push(features);
        self.labels.push(label.class_id());
        self.counts[label.class_id()] += 1;
        Ok(self.counts[label.class_id()])
    }

    pub fn reset(&mut self) {
        self.features.clear();
        self.labels.clear();
        self.counts = [0; NUM_CLASSES];
    }

    /// Labels as one-hot rows, rebuilt from scratch on every call
    pub fn encode_labels(&self, num_classes: usize) -> Result<Vec<Vec<f32>>> {
        if self.is_empty() {
            return Err(GameError::EmptyDataset);
        }
        self.labels.iter()
            .map(|&label| {
                if label >= num_classes { return Err(GameError::UnknownClass(label)); }
                Ok(one_hot(label, num_classes))
            })
            .collect()
    }

    pub fn count(&self, label: Gesture) -> usize {
        self.counts[label.class_id()]
    }

    pub fn counts(&self) -> [usize; NUM_CLASSES] {
        self.counts
    }

    pub fn features(&self) -> &[FeatureVector] {
        &self.features
    }

    pub fn labels(&self) -> &[ClassId] {
        &self.labels
    }

    pub fn feature_shape(&self) -> Option<Shape3> {
        self.features.first().map(FeatureVector::shape)
    }

    pub fn samples(&self) -> impl Iterator<Item = Sample> + '_ {
        self.features.iter().zip(&self.labels).filter_map(|(features, &label)| {
            Gesture::from_class_id(label).ok().map(|label| Sample { features: features.clone(), label })
        })
    }

    pub fn len(&self) -> usize {
        self.features.len()
    }

    pub fn is_empty(&self) -> bool {
        self.features.is_empty()
    }
}
