// ---------- Tune-ables ---------- //
pub const NUM_CLASSES: usize = 3;  // rock, paper, scissors
pub const REQUIRED_SAMPLES: usize = 20;  // per-class count that unlocks training/prediction
pub const PREDICT_INTERVAL_MS: u64 = 1000;  // how often the camera is classified while playing
pub const CAPTURE_INTERVAL_MS: u64 = 100;  // spacing between guided sample captures
pub const IMAGE_SIZE: usize = 224;  // square input the extractor expects
pub const CHANNELS: usize = 3;  // rgb

// ---------- Basic types (renamed for pretty) ---------- //
pub type ClassId = usize;
pub type Probability = f32;
/// [rows, cols, channels] of an image frame or an activation map
pub type Shape3 = [usize; 3];

/// Index of the largest entry. Ties resolve to the lowest index, NaN never wins.
pub fn argmax(values: &[Probability]) -> Option<ClassId> {
    let mut best: Option<(ClassId, Probability)> = None;
    for (idx, &value) in values.iter().enumerate() {
        if value.is_nan() { continue; }
        match best {
            Some((_, top)) if top >= value => {}
            _ => best = Some((idx, value)),
        }
    }
    best.map(|(idx, _)| idx)
}

/// Row-major one-hot row for `class` in `width` buckets
pub fn one_hot(class: ClassId, width: usize) -> Vec<f32> {
    let mut row = vec![0.0; width];
    row[class] = 1.0;
    row
}
