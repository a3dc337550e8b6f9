//! The canonical image: a 28x28 grayscale buffer that every other stage of
//! the pipeline operates on. Pixels are stored as RGBA with the three color
//! channels equal and alpha fixed to opaque

use crate::config::{PIXELS, SIDE};
use crate::{Error, Result};
use base64::{engine::general_purpose, Engine as _};
use image::{
    imageops::FilterType, DynamicImage, GenericImageView, ImageFormat, ImageOutputFormat, Rgba,
    RgbaImage,
};
use serde::{Deserialize, Serialize};
use std::fmt::Debug;
use std::io::Cursor;

/// Turns raw upload bytes into pixels
pub trait ImageDecoder: Send + Sync {
    fn decode(&self, bytes: &[u8]) -> Result<DynamicImage>;
}

/// Decodes with the `image` crate, guessing the format from the bytes
#[derive(Debug, Default, Clone, Copy)]
pub struct FormatSniffingDecoder;

impl ImageDecoder for FormatSniffingDecoder {
    fn decode(&self, bytes: &[u8]) -> Result<DynamicImage> {
        image::load_from_memory(bytes).map_err(|e| Error::Decode(e.to_string()))
    }
}

/// A fixed-size grayscale image
#[derive(Clone, PartialEq, Eq)]
pub struct CanonicalImage {
    pixels: RgbaImage,
}

impl Debug for CanonicalImage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "CanonicalImage {{ {SIDE}x{SIDE}, <data> }}")
    }
}

impl CanonicalImage {
    /// Build an image from one gray level per pixel, in row-major order
    pub fn from_gray(values: &[u8]) -> Result<Self> {
        if values.len() != PIXELS {
            return Err(Error::Decode(format!(
                "expected {PIXELS} gray levels, got {}",
                values.len()
            )));
        }
        Ok(Self::from_index_fn(|i| values[i]))
    }

    /// Build an image by asking `level` for the gray level of each pixel index
    pub(crate) fn from_index_fn(level: impl Fn(usize) -> u8) -> Self {
        let pixels = RgbaImage::from_fn(SIDE, SIDE, |x, y| {
            let v = level((y * SIDE + x) as usize);
            Rgba([v, v, v, 255])
        });
        CanonicalImage { pixels }
    }

    /// Gray levels in row-major order
    pub fn gray(&self) -> impl ExactSizeIterator<Item = u8> + '_ {
        self.pixels.pixels().map(|p| p.0[0])
    }

    pub fn as_rgba(&self) -> &RgbaImage {
        &self.pixels
    }

    pub fn to_png(&self) -> Result<Vec<u8>> {
        let mut bytes = Vec::new();
        self.pixels
            .write_to(&mut Cursor::new(&mut bytes), ImageOutputFormat::Png)?;
        Ok(bytes)
    }

    pub fn to_b64(&self) -> Result<B64Image> {
        Ok(B64Image::from_png(&self.to_png()?))
    }
}

/// Luminance of one RGB pixel with the fixed 0.299/0.587/0.114 weights
pub fn luminance(r: u8, g: u8, b: u8) -> u8 {
    let y = 0.299 * f32::from(r) + 0.587 * f32::from(g) + 0.114 * f32::from(b);
    y.round().clamp(0.0, 255.0) as u8
}

/// Stretch `image` to 28x28 and collapse it to gray. Aspect ratio and source
/// alpha are discarded
pub fn normalize(image: &DynamicImage) -> CanonicalImage {
    let resized = image.resize_exact(SIDE, SIDE, FilterType::Triangle).to_rgba8();
    let levels: Vec<u8> = resized
        .pixels()
        .map(|p| luminance(p.0[0], p.0[1], p.0[2]))
        .collect();
    CanonicalImage::from_index_fn(|i| levels[i])
}

/// Decode arbitrary image bytes and normalize them
pub fn normalize_bytes(decoder: &dyn ImageDecoder, bytes: &[u8]) -> Result<CanonicalImage> {
    let image = decoder.decode(bytes)?;
    if image.width() == 0 || image.height() == 0 {
        return Err(Error::Decode("image has no pixels".into()));
    }
    Ok(normalize(&image))
}

/// An encoded image carried as text: either a `data:` URL or bare base 64
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct B64Image(String);

impl Debug for B64Image {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "B64Image {{ {} bytes of <data> }}", self.0.len())
    }
}

impl From<String> for B64Image {
    fn from(text: String) -> Self {
        B64Image(text)
    }
}

impl B64Image {
    pub fn from_png(png: &[u8]) -> Self {
        B64Image(format!(
            "data:image/png;base64,{}",
            general_purpose::STANDARD.encode(png)
        ))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// The base 64 payload with any `data:` header removed
    fn payload(&self) -> &str {
        let payload = match self.0.split_once(',') {
            Some((header, payload)) if header.starts_with("data:") => payload,
            _ => &self.0,
        };
        payload.trim()
    }

    /// The raw encoded image bytes
    pub fn decode(&self) -> Result<Vec<u8>> {
        general_purpose::STANDARD
            .decode(self.payload())
            .map_err(|e| Error::Decode(e.to_string()))
    }

    /// A `data:` URL suitable for direct display
    pub fn data_url(&self) -> Result<String> {
        if self.0.starts_with("data:") {
            return Ok(self.0.clone());
        }
        let mime = match image::guess_format(&self.decode()?) {
            Ok(ImageFormat::Png) => "image/png",
            Ok(ImageFormat::Jpeg) => "image/jpeg",
            Ok(ImageFormat::Gif) => "image/gif",
            Ok(ImageFormat::WebP) => "image/webp",
            Ok(ImageFormat::Bmp) => "image/bmp",
            _ => "application/octet-stream",
        };
        Ok(format!("data:{mime};base64,{}", self.payload()))
    }

    /// Re-encode as PNG, whatever format the payload was in
    pub fn to_png(&self) -> Result<Vec<u8>> {
        let bytes = self.decode()?;
        if let Ok(ImageFormat::Png) = image::guess_format(&bytes) {
            return Ok(bytes);
        }
        let image = FormatSniffingDecoder.decode(&bytes)?;
        let mut png = Vec::new();
        image.write_to(&mut Cursor::new(&mut png), ImageOutputFormat::Png)?;
        Ok(png)
    }
}
