//! # Camera
//!
//! Frames are square `[size, size, 3]` float images normalised to `[-1, 1]`, the layout
//! the feature extractor consumes. A [`Camera`] hands them out one capture at a time.

use rand::{Rng, SeedableRng};
use rand::rngs::StdRng;
use crate::error::{GameError, Result};
use crate::games::rps::Gesture;
use crate::utils::{Shape3, CHANNELS};

#[derive(Clone, Debug, PartialEq)]
pub struct Frame {
    height: usize,
    width: usize,
    pixels: Vec<f32>,  // row-major, rgb interleaved
}

impl Frame {
    pub fn new(height: usize, width: usize, pixels: Vec<f32>) -> Result<Self> {
        if pixels.len() != height * width * CHANNELS {
            return Err(GameError::Camera(format!(
                "{} values cannot fill a {}x{} rgb frame", pixels.len(), height, width
            )));
        }
        Ok(Self { height, width, pixels })
    }

    /// Centre-crop a raw rgb8 image to a square, resize (nearest neighbour) to `size`
    /// and map bytes onto `[-1, 1]`.
    pub fn from_rgb8(width: usize, height: usize, data: &[u8], size: usize) -> Result<Self> {
        if data.len() != width * height * CHANNELS {
            return Err(GameError::Camera(format!(
                "expected {} bytes for a {}x{} image, got {}", width * height * CHANNELS, width, height, data.len()
            )));
        }
        let side = width.min(height);
        if side == 0 || size == 0 {
            return Err(GameError::Camera("empty image".to_string()));
        }
        let top = (height - side) / 2;
        let left = (width - side) / 2;

        let mut pixels = Vec::with_capacity(size * size * CHANNELS);
        for y in 0..size {
            let src_y = top + y * side / size;
            for x in 0..size {
                let src_x = left + x * side / size;
                let offset = (src_y * width + src_x) * CHANNELS;
                for c in 0..CHANNELS {
                    pixels.push(data[offset + c] as f32 / 127.5 - 1.0);
                }
            }
        }
        Ok(Self { height: size, width: size, pixels })
    }

    pub fn shape(&self) -> Shape3 {
        [self.height, self.width, CHANNELS]
    }

    pub fn pixels(&self) -> &[f32] {
        &self.pixels
    }

    pub fn into_pixels(self) -> Vec<f32> {
        self.pixels
    }
}

pub trait Camera {
    /// Acquire (or re-acquire) the device
    fn setup(&mut self) -> Result<()>;
    fn capture(&mut self) -> Result<Frame>;
}

/// Stand-in webcam that renders a distinct pattern for whatever gesture is being
/// "held up", with optional uniform noise on top.
pub struct SyntheticCamera {
    size: usize,
    pose: Option<Gesture>,
    noise: f32,
    rng: StdRng,
    ready: bool,
}

impl SyntheticCamera {
    pub fn new(size: usize, seed: u64) -> Self {
        Self { size, pose: None, noise: 0.0, rng: StdRng::seed_from_u64(seed), ready: false }
    }

    pub fn with_noise(mut self, noise: f32) -> Self {
        self.noise = noise;
        self
    }

    /// Change the gesture in front of the lens; `None` shows an empty scene
    pub fn set_pose(&mut self, pose: Option<Gesture>) {
        self.pose = pose;
    }

    pub fn pose(&self) -> Option<Gesture> {
        self.pose
    }

    fn base_value(&self, y: usize, x: usize, c: usize) -> f32 {
        let n = self.size as f32;
        let (fy, fx) = (y as f32 / n, x as f32 / n);
        let lit = match self.pose {
            None => false,
            // a filled blob in the middle
            Some(Gesture::Rock) => (fy - 0.5).powi(2) + (fx - 0.5).powi(2) < 0.09,
            // flat open hand: horizontal bands
            Some(Gesture::Paper) => (y * 4 / self.size.max(1)) % 2 == 0,
            // two diagonal strokes
            Some(Gesture::Scissors) => (fy - fx).abs() < 0.12 || (fy + fx - 1.0).abs() < 0.12,
        };
        let tint = [0.9, 0.6, 0.3][c % CHANNELS];
        if lit { tint } else { -0.8 }
    }
}

impl Camera for SyntheticCamera {
    fn setup(&mut self) -> Result<()> {
        if self.size == 0 {
            return Err(GameError::Camera("synthetic camera has zero resolution".to_string()));
        }
        self.ready = true;
        Ok(())
    }

    fn capture(&mut self) -> Result<Frame> {
        if !self.ready {
            return Err(GameError::Camera("capture before setup".to_string()));
        }
        let mut pixels = Vec::with_capacity(self.size * self.size * CHANNELS);
        for y in 0..self.size {
            for x in 0..self.size {
                for c in 0..CHANNELS {
                    let jitter = if self.noise > 0.0 { self.rng.random_range(-self.noise..self.noise) } else { 0.0 };
                    pixels.push((self.base_value(y, x, c) + jitter).clamp(-1.0, 1.0));
                }
            }
        }
        Frame::new(self.size, self.size, pixels)
    }
}
