//! # Feature Extractor
//!
//! Frozen backbone that maps a camera frame to an activation map. The image is cut
//! into a `grid x grid` lattice of square patches and every patch goes through the
//! same dense projection + ReLU, giving a `[grid, grid, channels]` feature map that
//! the trainable head sits on top of. Weights never change after loading.

use std::path::PathBuf;
use burn::prelude::*;
use burn::module::Param;
use burn::nn::Linear;
use burn::record::{FullPrecisionSettings, NamedMpkFileRecorder};
use burn::tensor::TensorData;
use burn::tensor::activation::relu;
use rand::{Rng, SeedableRng};
use rand::rngs::StdRng;
use crate::camera::{Camera, Frame};
use crate::error::{GameError, Result};
use crate::samples::FeatureVector;
use crate::utils::{Shape3, CHANNELS, IMAGE_SIZE};

/// Where the frozen weights come from
#[derive(Debug, Clone, PartialEq)]
pub enum WeightSource {
    /// Deterministic weights generated from a seed
    Seeded(u64),
    /// A burn record written with `NamedMpkFileRecorder` at full precision
    File(PathBuf),
}

#[derive(Debug, Clone)]
pub struct ExtractorConfig {
    pub image_size: usize,
    pub grid: usize,
    pub channels: usize,
    pub weights: WeightSource,
}

impl Default for ExtractorConfig {
    fn default() -> Self {
        Self {
            image_size: IMAGE_SIZE,
            grid: 7,
            channels: 64,
            weights: WeightSource::Seeded(0x5eed),
        }
    }
}

impl ExtractorConfig {
    pub fn validate(&self) -> Result<()> {
        if self.grid == 0 || self.channels == 0 || self.image_size == 0 {
            return Err(GameError::InvalidConfig("extractor dimensions must be non-zero".to_string()));
        }
        if self.image_size % self.grid != 0 {
            return Err(GameError::InvalidConfig(format!(
                "image size {} is not divisible into a {}x{} grid", self.image_size, self.grid, self.grid
            )));
        }
        Ok(())
    }

    pub fn patch_size(&self) -> usize {
        self.image_size / self.grid
    }

    pub fn input_shape(&self) -> Shape3 {
        [self.image_size, self.image_size, CHANNELS]
    }

    pub fn output_shape(&self) -> Shape3 {
        [self.grid, self.grid, self.channels]
    }
}

#[derive(Module, Debug)]
pub struct PatchBackbone<B: Backend> {
    embed: Linear<B>,
}

impl<B: Backend> PatchBackbone<B> {
    /// Uniform(-1/sqrt(fan_in), 1/sqrt(fan_in)) weights drawn from a seeded rng
    fn seeded(config: &ExtractorConfig, seed: u64, device: &B::Device) -> Self {
        let patch = config.patch_size();
        let fan_in = patch * patch * CHANNELS;
        let bound = 1.0 / (fan_in as f32).sqrt();
        let mut rng = StdRng::seed_from_u64(seed);
        let mut draw = |n: usize| -> Vec<f32> { (0..n).map(|_| rng.random_range(-bound..bound)).collect() };

        let weight = draw(fan_in * config.channels);
        let bias = draw(config.channels);
        Self {
            embed: Linear {
                weight: Param::from_tensor(Tensor::from_data(TensorData::new(weight, [fan_in, config.channels]), device)),
                bias: Some(Param::from_tensor(Tensor::from_data(TensorData::new(bias, [config.channels]), device))),
            },
        }
    }

    /// `[grid * grid, patch * patch * 3]` patches -> `[grid * grid, channels]` activations
    pub fn forward(&self, patches: Tensor<B, 2>) -> Tensor<B, 2> {
        relu(self.embed.forward(patches))
    }
}

pub struct FeatureExtractor<B: Backend> {
    backbone: PatchBackbone<B>,
    config: ExtractorConfig,
    device: B::Device,
}

impl<B: Backend> FeatureExtractor<B> {
    /// Build the backbone and load its frozen weights. Any failure here is fatal for
    /// the session.
    pub fn load(config: ExtractorConfig, device: &B::Device) -> Result<Self> {
        config.validate()?;
        let backbone = match &config.weights {
            WeightSource::Seeded(seed) => PatchBackbone::seeded(&config, *seed, device),
            WeightSource::File(path) => {
                // shapes come from the config; the record overwrites the values
                let template = PatchBackbone::seeded(&config, 0, device);
                let recorder = NamedMpkFileRecorder::<FullPrecisionSettings>::new();
                template.load_file(path.clone(), &recorder, device).map_err(|err| GameError::ModelLoad {
                    location: path.display().to_string(),
                    reason: format!("{:?}", err),
                })?
            }
        };
        log::info!("Feature extractor ready: {:?} -> {:?}", config.input_shape(), config.output_shape());
        Ok(Self { backbone, config, device: device.clone() })
    }

    pub fn config(&self) -> &ExtractorConfig {
        &self.config
    }

    pub fn output_shape(&self) -> Shape3 {
        self.config.output_shape()
    }

    pub fn extract(&self, frame: &Frame) -> Result<FeatureVector> {
        let expected = self.config.input_shape();
        if frame.shape() != expected {
            return Err(GameError::InputShape { expected, found: frame.shape() });
        }
        let (grid, patch) = (self.config.grid, self.config.patch_size());
        let image: Tensor<B, 3> = Tensor::from_data(
            TensorData::new(frame.pixels().to_vec(), expected),
            &self.device,
        );
        // [H, W, C] -> [grid, patch, grid, patch, C] -> [grid, grid, patch, patch, C]
        let patches = image
            .reshape([grid, patch, grid, patch, CHANNELS])
            .swap_dims(1, 2)
            .reshape([grid * grid, patch * patch * CHANNELS]);
        let activations = self.backbone.forward(patches);
        let values: Vec<f32> = activations.into_data().iter::<f32>().collect();
        FeatureVector::new(self.output_shape(), values)
    }

    /// Run one throwaway extraction so the first real capture is not slowed down
    pub fn warm_up<C: Camera>(&self, camera: &mut C) -> Result<()> {
        let frame = camera.capture()?;
        self.extract(&frame).map(|_| ())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use burn::backend::NdArray;
    use crate::camera::SyntheticCamera;
    use crate::games::rps::Gesture;

    type TestBackend = NdArray;

    fn small_config() -> ExtractorConfig {
        ExtractorConfig { image_size: 8, grid: 2, channels: 4, weights: WeightSource::Seeded(3) }
    }

    #[test]
    fn test_extract_shape_and_relu() {
        let device = Default::default();
        let extractor = FeatureExtractor::<TestBackend>::load(small_config(), &device).unwrap();
        let mut camera = SyntheticCamera::new(8, 0);
        camera.setup().unwrap();
        camera.set_pose(Some(Gesture::Paper));

        let features = extractor.extract(&camera.capture().unwrap()).unwrap();
        assert_eq!(features.shape(), [2, 2, 4]);
        assert_eq!(features.len(), 16);
        assert!(features.values().iter().all(|v| *v >= 0.0));
    }

    #[test]
    fn test_extract_is_deterministic() {
        let device = Default::default();
        let a = FeatureExtractor::<TestBackend>::load(small_config(), &device).unwrap();
        let b = FeatureExtractor::<TestBackend>::load(small_config(), &device).unwrap();
        let mut camera = SyntheticCamera::new(8, 0);
        camera.setup().unwrap();
        camera.set_pose(Some(Gesture::Rock));
        let frame = camera.capture().unwrap();
        assert_eq!(a.extract(&frame).unwrap(), b.extract(&frame).unwrap());
        assert_eq!(a.extract(&frame).unwrap(), a.extract(&frame).unwrap());
    }

    #[test]
    fn test_wrong_frame_size_is_rejected() {
        let device = Default::default();
        let extractor = FeatureExtractor::<TestBackend>::load(small_config(), &device).unwrap();
        let mut camera = SyntheticCamera::new(6, 0);
        camera.setup().unwrap();
        let err = extractor.extract(&camera.capture().unwrap()).unwrap_err();
        assert_eq!(err, GameError::InputShape { expected: [8, 8, 3], found: [6, 6, 3] });
    }

    #[test]
    fn test_missing_weights_file_fails_to_load() {
        let device = Default::default();
        let config = ExtractorConfig {
            weights: WeightSource::File(PathBuf::from("/nonexistent/backbone")),
            ..small_config()
        };
        let result = FeatureExtractor::<TestBackend>::load(config, &device);
        assert!(matches!(result, Err(GameError::ModelLoad { .. })));
    }

    #[test]
    fn test_grid_must_divide_image() {
        let config = ExtractorConfig { image_size: 10, grid: 3, ..small_config() };
        assert!(matches!(config.validate(), Err(GameError::InvalidConfig(_))));
        assert!(ExtractorConfig::default().validate().is_ok());
    }
}
