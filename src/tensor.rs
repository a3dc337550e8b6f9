//! Flattening the canonical image into the tensor the remote classifier expects

use crate::canonical::CanonicalImage;
use crate::config::SIDE;
use serde::Serialize;

/// Shape of every encoded image: batch, channel, height, width
pub const SHAPE: [usize; 4] = [1, 1, SIDE as usize, SIDE as usize];

/// A `1x1x28x28` tensor of intensities in `[0, 1]`, row-major
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Tensor {
    pub data: Vec<f32>,
    pub shape: [usize; 4],
}

impl From<&CanonicalImage> for Tensor {
    fn from(image: &CanonicalImage) -> Self {
        Tensor {
            data: image.gray().map(|v| f32::from(v) / 255.0).collect(),
            shape: SHAPE,
        }
    }
}
