use burn::prelude::*;
use burn::nn::{Linear, LinearConfig};
use burn::tensor::TensorData;
use burn::tensor::activation::{relu, softmax};
use crate::error::{GameError, Result};
use crate::games::rps::Gesture;
use crate::samples::FeatureVector;
use crate::utils::{argmax, Probability, Shape3, NUM_CLASSES};


/// Small head stacked on the frozen features:
/// flatten -> dense(hidden, relu) -> dense(classes, softmax)
#[derive(Module, Debug)]
pub struct ClassifierHead<B: Backend> {
    hidden: Linear<B>,
    output: Linear<B>,
}

impl<B: Backend> ClassifierHead<B> {
    /// Create a freshly initialised head
    pub fn new(config: &HeadConfig, device: &B::Device) -> Self {
        Self {
            hidden: LinearConfig::new(config.flat_input(), config.hidden_units).init(device),
            output: LinearConfig::new(config.hidden_units, config.num_classes).init(device),
        }
    }

    /// `[batch, rows, cols, channels]` features -> `[batch, classes]` logits.
    /// Softmax is left to the caller so training can use the log-space form.
    pub fn forward(&self, input: Tensor<B, 4>) -> Tensor<B, 2> {
        let x = input.flatten::<2>(1, 3);
        let x = self.hidden.forward(x);
        let x = relu(x);
        self.output.forward(x)
    }

    /// Class probabilities (rows sum to one)
    pub fn forward_probs(&self, input: Tensor<B, 4>) -> Tensor<B, 2> {
        softmax(self.forward(input), 1)
    }
}

/// Configuration for the classifier head
#[derive(Debug, Clone)]
pub struct HeadConfig {
    pub input_shape: Shape3,
    pub hidden_units: usize,
    pub num_classes: usize,
}

impl HeadConfig {
    pub fn new(input_shape: Shape3) -> Self {
        Self { input_shape, ..Self::default() }
    }

    pub fn flat_input(&self) -> usize {
        self.input_shape.iter().product()
    }
}

impl Default for HeadConfig {
    fn default() -> Self {
        Self {
            input_shape: [7, 7, 64],
            hidden_units: 100,
            num_classes: NUM_CLASSES,
        }
    }
}

/// Anything that can turn a feature vector into gesture probabilities
pub trait GestureClassifier {
    fn probabilities(&self, features: &FeatureVector) -> Result<Vec<Probability>>;

    fn classify(&self, features: &FeatureVector) -> Result<Gesture> {
        let probs = self.probabilities(features)?;
        let class = argmax(&probs).ok_or(GameError::UnknownClass(usize::MAX))?;
        Gesture::from_class_id(class)
    }
}

/// A fitted head, detached from autodiff, ready for inference
#[derive(Debug)]
pub struct TrainedHead<B: Backend> {
    model: ClassifierHead<B>,
    input_shape: Shape3,
    device: B::Device,
}

impl<B: Backend> TrainedHead<B> {
    pub fn new(model: ClassifierHead<B>, input_shape: Shape3, device: B::Device) -> Self {
        Self { model, input_shape, device }
    }

    pub fn input_shape(&self) -> Shape3 {
        self.input_shape
    }

    pub fn model(&self) -> &ClassifierHead<B> {
        &self.model
    }
}

impl<B: Backend> GestureClassifier for TrainedHead<B> {
    fn probabilities(&self, features: &FeatureVector) -> Result<Vec<Probability>> {
        if features.shape() != self.input_shape {
            return Err(GameError::FeatureShape { expected: self.input_shape, found: features.shape() });
        }
        let [rows, cols, channels] = self.input_shape;
        let input: Tensor<B, 4> = Tensor::from_data(
            TensorData::new(features.values().to_vec(), [1, rows, cols, channels]),
            &self.device,
        );
        let probs = self.model.forward_probs(input);
        Ok(probs.into_data().iter::<f32>().collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use burn::backend::NdArray;

    type TestBackend = NdArray;

    #[test]
    fn test_head_creation() {
        let device = Default::default();
        let config = HeadConfig::new([2, 2, 4]);
        let head = ClassifierHead::<TestBackend>::new(&config, &device);

        let input = Tensor::<TestBackend, 4>::zeros([5, 2, 2, 4], &device);
        let logits = head.forward(input);
        assert_eq!(logits.shape().dims, [5, 3]);
    }

    #[test]
    fn test_probabilities_sum_to_one() {
        let device = Default::default();
        let config = HeadConfig::new([1, 2, 3]);
        let trained = TrainedHead::new(ClassifierHead::<TestBackend>::new(&config, &device), [1, 2, 3], device);
        let features = FeatureVector::new([1, 2, 3], vec![0.5, -0.1, 2.0, 0.0, 1.0, 0.3]).unwrap();

        let probs = trained.probabilities(&features).unwrap();
        assert_eq!(probs.len(), NUM_CLASSES);
        assert!((probs.iter().sum::<f32>() - 1.0).abs() < 1e-5);
        assert!(trained.classify(&features).is_ok());
    }

    #[test]
    fn test_rejects_foreign_feature_shape() {
        let device = Default::default();
        let config = HeadConfig::new([1, 1, 2]);
        let trained = TrainedHead::new(ClassifierHead::<TestBackend>::new(&config, &device), [1, 1, 2], device);
        let features = FeatureVector::new([1, 2, 1], vec![0.0, 0.0]).unwrap();
        assert!(matches!(trained.probabilities(&features), Err(GameError::FeatureShape { .. })));
    }
}
