//! Illustrative perturbation used when no remote service is configured.
//!
//! Each pixel is pushed up or down by `ε·255` with a sign that depends only
//! on its index. This is not an adversarial attack: it never looks at the
//! pixel values or at any model, it only shows what a bounded perturbation
//! looks like.

use crate::canonical::{B64Image, CanonicalImage};
use crate::config::{DEFAULT_EPSILON, MAX_EPSILON};
use crate::{Error, Result};
use serde::Serialize;

/// Perturbation magnitude, a fraction of the full intensity range in
/// `[0, MAX_EPSILON]`
#[derive(Debug, Clone, Copy, PartialEq, PartialOrd, Serialize)]
#[serde(transparent)]
pub struct Epsilon(f64);

impl Default for Epsilon {
    fn default() -> Self {
        Epsilon(DEFAULT_EPSILON)
    }
}

impl Epsilon {
    /// Out-of-range values are clamped; NaN and infinities are rejected
    pub fn new(value: f64) -> Result<Self> {
        if !value.is_finite() {
            return Err(Error::InvalidEpsilon(value));
        }
        Ok(Epsilon(value.clamp(0.0, MAX_EPSILON)))
    }

    pub fn value(self) -> f64 {
        self.0
    }
}

/// 32-bit integer mixer ("lowbias32"). Fixed so that the sign pattern is
/// reproducible everywhere
pub fn index_hash(index: u32) -> u32 {
    let mut x = index;
    x ^= x >> 16;
    x = x.wrapping_mul(0x7feb_352d);
    x ^= x >> 15;
    x = x.wrapping_mul(0x846c_a68b);
    x ^= x >> 16;
    x
}

/// +1 for an even hash, -1 for an odd one
pub fn sign(index: usize) -> f64 {
    if index_hash(index as u32) % 2 == 0 {
        1.0
    } else {
        -1.0
    }
}

/// Shift one gray level by `sign·ε·255`, clamped to the valid range
pub fn perturb_level(level: u8, sign: f64, epsilon: Epsilon) -> u8 {
    let shifted = f64::from(level) + sign * epsilon.value() * 255.0;
    shifted.round().clamp(0.0, 255.0) as u8
}

/// Derive a perturbed image. Pure: the same inputs always give the same
/// output
pub fn synthesize(image: &CanonicalImage, epsilon: Epsilon) -> CanonicalImage {
    let levels: Vec<u8> = image
        .gray()
        .enumerate()
        .map(|(i, level)| perturb_level(level, sign(i), epsilon))
        .collect();
    CanonicalImage::from_index_fn(|i| levels[i])
}

/// The image shown next to the adversarial result
#[derive(Debug, Clone, PartialEq)]
pub enum PerturbedImage {
    /// Computed locally by [`synthesize`]
    Synthesized(CanonicalImage),

    /// Returned verbatim by the remote attack endpoint
    Remote(B64Image),
}

impl PerturbedImage {
    pub fn to_png(&self) -> Result<Vec<u8>> {
        match self {
            PerturbedImage::Synthesized(image) => image.to_png(),
            PerturbedImage::Remote(image) => image.to_png(),
        }
    }

    pub fn data_url(&self) -> Result<String> {
        match self {
            PerturbedImage::Synthesized(image) => image.to_b64()?.data_url(),
            PerturbedImage::Remote(image) => image.data_url(),
        }
    }
}
