//! # Head Training
//!
//! Fits a fresh [`ClassifierHead`] on the collected feature vectors. Handles:
//! - **Batching**: shuffled mini-batches of features and one-hot labels
//! - **Optimisation**: Adam on categorical cross-entropy for a fixed number of epochs
//! - **Progress**: a callback after every batch with its loss and accuracy
//!
//! There is no validation split and no early stopping. Each call starts from new
//! weights; nothing is carried over from an earlier fit.

use burn::prelude::*;
use burn::module::AutodiffModule;
use burn::optim::{AdamConfig, GradientsParams, Optimizer};
use burn::tensor::{ElementConversion, TensorData};
use burn::tensor::activation::log_softmax;
use burn::tensor::backend::AutodiffBackend;
use rand::SeedableRng;
use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use crate::error::{GameError, Result};
use crate::neural::{ClassifierHead, HeadConfig, TrainedHead};
use crate::samples::FeatureVector;
use crate::utils::{Shape3, NUM_CLASSES};

/// Configuration for training sessions
#[derive(Debug, Clone)]
pub struct TrainingConfig {
    pub epochs: usize,
    pub learning_rate: f64,
    pub batch_size: usize,
    pub hidden_units: usize,
    /// Fixed shuffle order for reproducible runs; `None` draws a fresh one
    pub shuffle_seed: Option<u64>,
}

impl Default for TrainingConfig {
    fn default() -> Self {
        Self {
            epochs: 10,
            learning_rate: 1e-4,
            batch_size: 32,
            hidden_units: 100,
            shuffle_seed: None,
        }
    }
}

/// What the progress callback sees after each batch
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BatchProgress {
    pub epoch: usize,
    pub batch: usize,
    pub loss: f32,
    pub accuracy: f32,
}

pub struct Trainer<B: AutodiffBackend> {
    config: TrainingConfig,
    device: B::Device,
}

impl<B: AutodiffBackend> Trainer<B> {
    pub fn new(config: TrainingConfig, device: B::Device) -> Self {
        Self { config, device }
    }

    pub fn config(&self) -> &TrainingConfig {
        &self.config
    }

    /// Train a new head. `on_batch` runs between optimiser steps, which is where a
    /// host event loop gets a chance to breathe during a long fit.
    pub fn train<F>(&self, features: &[FeatureVector], labels: &[Vec<f32>], mut on_batch: F) -> Result<TrainedHead<B::InnerBackend>>
    where
        F: FnMut(&BatchProgress),
    {
        let shape = Self::check_dataset(features, labels)?;
        let head_config = HeadConfig { input_shape: shape, hidden_units: self.config.hidden_units, num_classes: NUM_CLASSES };
        let mut model = ClassifierHead::<B>::new(&head_config, &self.device);
        let mut optim = AdamConfig::new().init();
        let mut rng = match self.config.shuffle_seed {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::from_rng(&mut rand::rng()),
        };
        let mut order: Vec<usize> = (0..features.len()).collect();
        let batch_size = self.config.batch_size.max(1);

        log::info!("Training head on {} samples of shape {:?} for {} epochs", features.len(), shape, self.config.epochs);
        for epoch in 0..self.config.epochs {
            order.shuffle(&mut rng);
            let mut epoch_loss = 0.0;
            let mut batches = 0;
            for (batch, indices) in order.chunks(batch_size).enumerate() {
                let (inputs, targets) = self.batch(features, labels, indices, shape);
                let logits = model.forward(inputs);

                let accuracy = logits.clone().argmax(1)
                    .equal(targets.clone().argmax(1))
                    .float()
                    .mean()
                    .into_scalar()
                    .elem::<f32>();
                // categorical cross-entropy against the one-hot targets
                let loss = log_softmax(logits, 1)
                    .mul(targets)
                    .sum_dim(1)
                    .mean()
                    .neg();
                let loss_value = loss.clone().into_scalar().elem::<f32>();

                let grads = GradientsParams::from_grads(loss.backward(), &model);
                model = optim.step(self.config.learning_rate, model, grads);

                let progress = BatchProgress { epoch, batch, loss: loss_value, accuracy };
                log::debug!("loss {:.5} accuracy {}", progress.loss, progress.accuracy);
                on_batch(&progress);
                epoch_loss += loss_value;
                batches += 1;
            }
            log::info!("Epoch {}/{}: mean loss {:.5}", epoch + 1, self.config.epochs, epoch_loss / batches.max(1) as f32);
        }

        Ok(TrainedHead::new(model.valid(), shape, self.device.clone()))
    }

    /// Counts must agree, label rows must be class-wide and every vector must share one shape
    fn check_dataset(features: &[FeatureVector], labels: &[Vec<f32>]) -> Result<Shape3> {
        let first = features.first().ok_or(GameError::EmptyDataset)?;
        let width = labels.first().map(Vec::len).unwrap_or(0);
        if features.len() != labels.len() || labels.iter().any(|row| row.len() != NUM_CLASSES) {
            return Err(GameError::TrainingDataShape { features: features.len(), labels: labels.len(), width });
        }
        let shape = first.shape();
        if let Some(odd) = features.iter().find(|f| f.shape() != shape) {
            return Err(GameError::FeatureShape { expected: shape, found: odd.shape() });
        }
        Ok(shape)
    }

    fn batch(&self, features: &[FeatureVector], labels: &[Vec<f32>], indices: &[usize], shape: Shape3) -> (Tensor<B, 4>, Tensor<B, 2>) {
        let [rows, cols, channels] = shape;
        let mut xs = Vec::with_capacity(indices.len() * rows * cols * channels);
        let mut ys = Vec::with_capacity(indices.len() * NUM_CLASSES);
        for &i in indices {
            xs.extend_from_slice(features[i].values());
            ys.extend_from_slice(&labels[i]);
        }
        let n = indices.len();
        (
            Tensor::from_data(TensorData::new(xs, [n, rows, cols, channels]), &self.device),
            Tensor::from_data(TensorData::new(ys, [n, NUM_CLASSES]), &self.device),
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use burn::backend::{Autodiff, NdArray};
    use crate::neural::GestureClassifier;
    use crate::utils::one_hot;

    type TestBackend = Autodiff<NdArray>;

    fn dataset(per_class: usize) -> (Vec<FeatureVector>, Vec<Vec<f32>>) {
        let mut features = Vec::new();
        let mut labels = Vec::new();
        for class in 0..NUM_CLASSES {
            for k in 0..per_class {
                let mut values = vec![0.0; 6];
                values[class * 2] = 1.0 + k as f32 * 0.01;
                features.push(FeatureVector::new([1, 2, 3], values).unwrap());
                labels.push(one_hot(class, NUM_CLASSES));
            }
        }
        (features, labels)
    }

    fn trainer(config: TrainingConfig) -> Trainer<TestBackend> {
        Trainer::new(config, Default::default())
    }

    #[test]
    fn test_empty_dataset_fails() {
        let result = trainer(TrainingConfig::default()).train(&[], &[], |_| {});
        assert_eq!(result.unwrap_err(), GameError::EmptyDataset);
    }

    #[test]
    fn test_label_count_mismatch_fails() {
        let (features, mut labels) = dataset(2);
        labels.pop();
        let result = trainer(TrainingConfig::default()).train(&features, &labels, |_| {});
        assert_eq!(result.unwrap_err(), GameError::TrainingDataShape { features: 6, labels: 5, width: 3 });
    }

    #[test]
    fn test_reports_every_batch() {
        let (features, labels) = dataset(5);  // 15 samples
        let config = TrainingConfig { epochs: 3, batch_size: 4, shuffle_seed: Some(1), ..TrainingConfig::default() };
        let mut seen = Vec::new();
        let head = trainer(config).train(&features, &labels, |p| seen.push(*p)).unwrap();

        // ceil(15 / 4) = 4 batches per epoch
        assert_eq!(seen.len(), 12);
        assert_eq!(seen.last().map(|p| (p.epoch, p.batch)), Some((2, 3)));
        assert!(seen.iter().all(|p| p.loss.is_finite() && (0.0..=1.0).contains(&p.accuracy)));
        assert_eq!(head.input_shape(), [1, 2, 3]);
        let probs = head.probabilities(&features[0]).unwrap();
        assert_eq!(probs.len(), NUM_CLASSES);
    }

    #[test]
    fn test_loss_drops_on_separable_data() {
        let (features, labels) = dataset(8);
        let config = TrainingConfig { epochs: 60, learning_rate: 1e-2, batch_size: 24, shuffle_seed: Some(9), ..TrainingConfig::default() };
        let mut losses = Vec::new();
        trainer(config).train(&features, &labels, |p| losses.push(p.loss)).unwrap();
        let first = losses[0];
        let last = *losses.last().unwrap();
        assert!(last < first, "loss went from {} to {}", first, last);
    }
}
