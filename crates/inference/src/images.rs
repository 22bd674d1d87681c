//! Image buffers and their wire formats
//!
//! Nodes pass images around as [`ImageTensor`]s: `batch × height × width ×
//! channels` float samples. Before a request each image is converted to the
//! representation the server accepts, and the conversion products are
//! dropped as soon as the request completes.
//!
//! Two transports exist:
//! - [`ImageTransport::Embedded`]: PNG bytes base64-encoded into the request
//! - [`ImageTransport::TempFile`]: a temporary PNG on disk, read and encoded
//!   at send time, deleted when the [`PreparedImage`] drops

use std::io::Cursor;
use std::path::{Path, PathBuf};

use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use image::{DynamicImage, ImageFormat, RgbImage};
use serde::{Deserialize, Serialize};
use tempfile::NamedTempFile;

use crate::constants::limits;
use crate::error::InferenceError;

/// Side length of the placeholder image nodes emit on failure
pub const BLANK_SIZE: usize = 64;

/// A batch of images as float samples, laid out `[batch, height, width, channels]`
///
/// Samples are either normalized to `[0, 1]` or raw `[0, 255]`; conversion
/// to bytes inspects the maximum to tell which.
///
/// Deserialization goes through [`ImageTensor::new`], so a tensor whose
/// data length disagrees with its shape never exists.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "RawImageTensor")]
pub struct ImageTensor {
    shape: [usize; 4],
    data: Vec<f32>,
}

#[derive(Deserialize)]
struct RawImageTensor {
    shape: [usize; 4],
    data: Vec<f32>,
}

impl TryFrom<RawImageTensor> for ImageTensor {
    type Error = InferenceError;

    fn try_from(raw: RawImageTensor) -> Result<Self, Self::Error> {
        Self::new(raw.shape, raw.data)
    }
}

impl ImageTensor {
    /// Create a tensor, checking that `data` matches `shape`
    pub fn new(shape: [usize; 4], data: Vec<f32>) -> Result<Self, InferenceError> {
        let expected = shape
            .iter()
            .try_fold(1usize, |acc, &dim| acc.checked_mul(dim))
            .ok_or_else(|| InferenceError::image(format!("tensor shape {:?} is too large", shape)))?;
        if data.len() != expected {
            return Err(InferenceError::image(format!(
                "tensor data has {} samples, shape {:?} needs {}",
                data.len(),
                shape,
                expected
            )));
        }
        Ok(Self { shape, data })
    }

    /// A black `1 × height × width × 3` image
    pub fn blank(height: usize, width: usize) -> Self {
        Self {
            shape: [1, height, width, 3],
            data: vec![0.0; height * width * 3],
        }
    }

    /// The placeholder emitted by nodes that failed to produce an image
    pub fn placeholder() -> Self {
        Self::blank(BLANK_SIZE, BLANK_SIZE)
    }

    /// Build a single-image batch from 8-bit RGB, normalized to `[0, 1]`
    pub fn from_rgb8(image: &RgbImage) -> Self {
        let (width, height) = image.dimensions();
        Self {
            shape: [1, height as usize, width as usize, 3],
            data: image.as_raw().iter().map(|&v| v as f32 / 255.0).collect(),
        }
    }

    pub fn shape(&self) -> [usize; 4] {
        self.shape
    }

    pub fn batch(&self) -> usize {
        self.shape[0]
    }

    pub fn height(&self) -> usize {
        self.shape[1]
    }

    pub fn width(&self) -> usize {
        self.shape[2]
    }

    pub fn channels(&self) -> usize {
        self.shape[3]
    }

    pub fn data(&self) -> &[f32] {
        &self.data
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    fn frame_len(&self) -> usize {
        self.height() * self.width() * self.channels()
    }

    /// The `index`th image as a batch of one
    pub fn frame(&self, index: usize) -> Option<ImageTensor> {
        if index >= self.batch() {
            return None;
        }
        let len = self.frame_len();
        let start = index * len;
        Some(Self {
            shape: [1, self.height(), self.width(), self.channels()],
            data: self.data[start..start + len].to_vec(),
        })
    }

    /// Split the batch into single images
    pub fn split(&self) -> Vec<ImageTensor> {
        (0..self.batch()).filter_map(|i| self.frame(i)).collect()
    }

    /// Whether two tensors hold frames of the same size
    pub fn same_frame_shape(&self, other: &ImageTensor) -> bool {
        self.shape[1..] == other.shape[1..]
    }

    /// Concatenate batches along the batch axis
    pub fn concat(batches: &[ImageTensor]) -> Result<ImageTensor, InferenceError> {
        let first = batches
            .first()
            .ok_or_else(|| InferenceError::image("no images to concatenate"))?;

        let mut data = Vec::with_capacity(batches.iter().map(|b| b.data.len()).sum());
        let mut batch = 0;
        for tensor in batches {
            if !first.same_frame_shape(tensor) {
                return Err(InferenceError::image(format!(
                    "frame size {:?} does not match {:?}",
                    &tensor.shape[1..],
                    &first.shape[1..]
                )));
            }
            data.extend_from_slice(&tensor.data);
            batch += tensor.batch();
        }

        Ok(Self {
            shape: [batch, first.height(), first.width(), first.channels()],
            data,
        })
    }

    /// Convert the first image of the batch to 8-bit RGB
    ///
    /// Samples whose maximum is at most 1.0 are scaled by 255. All samples
    /// are rounded and clamped to `[0, 255]`. One channel is replicated to
    /// RGB and a fourth channel is dropped.
    pub fn to_rgb8(&self) -> Result<RgbImage, InferenceError> {
        if self.is_empty() || self.batch() == 0 {
            return Err(InferenceError::image("empty image tensor"));
        }
        let (height, width, channels) = (self.height(), self.width(), self.channels());
        if height < 1 || width < 1 {
            return Err(InferenceError::image(format!(
                "invalid image dimensions: {}x{}",
                height, width
            )));
        }
        if !matches!(channels, 1 | 3 | 4) {
            return Err(InferenceError::image(format!(
                "invalid number of channels: {}",
                channels
            )));
        }
        if self.batch() > 1 {
            log::warn!(
                "Multiple images in batch, using first image. Batch size: {}",
                self.batch()
            );
        }

        let frame = &self.data[..self.frame_len()];
        let max = frame.iter().copied().fold(f32::MIN, f32::max);
        let scale = if max <= 1.0 { 255.0 } else { 1.0 };
        let to_byte = |v: f32| (v * scale).round().clamp(0.0, 255.0) as u8;

        let mut bytes = Vec::with_capacity(height * width * 3);
        for pixel in frame.chunks_exact(channels) {
            match channels {
                1 => bytes.extend([to_byte(pixel[0]); 3]),
                _ => bytes.extend(pixel[..3].iter().map(|&v| to_byte(v))),
            }
        }

        RgbImage::from_raw(width as u32, height as u32, bytes)
            .ok_or_else(|| InferenceError::image("pixel buffer does not match dimensions"))
    }
}

/// Encode an RGB image as PNG bytes
pub fn encode_png(image: &RgbImage) -> Result<Vec<u8>, InferenceError> {
    let mut bytes = Vec::new();
    DynamicImage::ImageRgb8(image.clone()).write_to(&mut Cursor::new(&mut bytes), ImageFormat::Png)?;
    Ok(bytes)
}

/// Encode an RGB image as base64 PNG
pub fn encode_png_base64(image: &RgbImage) -> Result<String, InferenceError> {
    Ok(STANDARD.encode(encode_png(image)?))
}

/// Decode base64 image data back into a single-image tensor
pub fn decode_base64(data: &str) -> Result<ImageTensor, InferenceError> {
    let bytes = STANDARD.decode(data.trim())?;
    let image = image::load_from_memory(&bytes)?;
    Ok(ImageTensor::from_rgb8(&image.to_rgb8()))
}

/// Whether a string looks like inline base64 image data
pub fn is_base64(data: &str) -> bool {
    data.len() >= limits::BASE64_MIN_LEN && STANDARD.decode(data).is_ok()
}

/// How images travel to the server
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ImageTransport {
    /// Base64 PNG embedded in the request
    #[default]
    Embedded,
    /// Temporary PNG file, encoded at send time
    TempFile,
}

impl ImageTransport {
    /// Transport for a connection payload's `use_base64` flag
    pub fn from_use_base64(use_base64: bool) -> Self {
        if use_base64 {
            Self::Embedded
        } else {
            Self::TempFile
        }
    }

    pub fn use_base64(&self) -> bool {
        matches!(self, Self::Embedded)
    }
}

/// An image as handed to an analysis request
#[derive(Debug, Clone, PartialEq)]
pub enum ImagePayload {
    /// In-memory pixels
    Pixels(ImageTensor),
    /// Image file on disk
    Path(PathBuf),
    /// Base64-encoded image bytes
    Base64(String),
}

impl ImagePayload {
    /// Classify a string: an existing path, otherwise base64
    pub fn from_string(value: impl Into<String>) -> Self {
        let value = value.into();
        if Path::new(&value).exists() {
            Self::Path(PathBuf::from(value))
        } else {
            Self::Base64(value)
        }
    }
}

impl From<ImageTensor> for ImagePayload {
    fn from(tensor: ImageTensor) -> Self {
        Self::Pixels(tensor)
    }
}

/// An image converted for one request
///
/// Temporary files are owned here and removed on drop.
#[derive(Debug)]
pub enum PreparedImage {
    /// Base64 data ready to send
    Encoded(String),
    /// A file read and encoded at send time
    File {
        path: PathBuf,
        temp: Option<NamedTempFile>,
    },
}

impl PreparedImage {
    /// Convert a payload for the given transport
    pub fn prepare(payload: &ImagePayload, transport: ImageTransport) -> Result<Self, InferenceError> {
        match payload {
            ImagePayload::Pixels(tensor) => {
                let rgb = tensor.to_rgb8()?;
                match transport {
                    ImageTransport::Embedded => Ok(Self::Encoded(encode_png_base64(&rgb)?)),
                    ImageTransport::TempFile => Self::temp_file(&rgb),
                }
            }
            ImagePayload::Path(path) => {
                if !path.exists() {
                    return Err(InferenceError::image(format!(
                        "file does not exist: {}",
                        path.display()
                    )));
                }
                if image::image_dimensions(path).is_err() {
                    return Err(InferenceError::image(format!(
                        "file exists but is not a valid image: {}",
                        path.display()
                    )));
                }
                match transport {
                    ImageTransport::Embedded => {
                        let rgb = image::open(path)?.to_rgb8();
                        Ok(Self::Encoded(encode_png_base64(&rgb)?))
                    }
                    ImageTransport::TempFile => Ok(Self::File {
                        path: path.clone(),
                        temp: None,
                    }),
                }
            }
            ImagePayload::Base64(data) => {
                if !is_base64(data) {
                    return Err(InferenceError::image(
                        "file does not exist and is not valid base64",
                    ));
                }
                match transport {
                    ImageTransport::Embedded => Ok(Self::Encoded(data.clone())),
                    ImageTransport::TempFile => {
                        let bytes = STANDARD.decode(data)?;
                        let rgb = image::load_from_memory(&bytes)?.to_rgb8();
                        Self::temp_file(&rgb)
                    }
                }
            }
        }
    }

    fn temp_file(image: &RgbImage) -> Result<Self, InferenceError> {
        let mut file = tempfile::Builder::new()
            .prefix("ollama-image-")
            .suffix(".png")
            .tempfile()?;
        DynamicImage::ImageRgb8(image.clone()).write_to(file.as_file_mut(), ImageFormat::Png)?;
        log::debug!("Wrote temporary image {:?}", file.path());
        Ok(Self::File {
            path: file.path().to_path_buf(),
            temp: Some(file),
        })
    }

    /// Path on disk, for file-backed images
    pub fn path(&self) -> Option<&Path> {
        match self {
            Self::Encoded(_) => None,
            Self::File { path, .. } => Some(path),
        }
    }

    /// Base64 string for the request body
    pub async fn to_wire(&self) -> Result<String, InferenceError> {
        match self {
            Self::Encoded(data) => Ok(data.clone()),
            Self::File { path, .. } => {
                let bytes = tokio::fs::read(path).await?;
                Ok(STANDARD.encode(bytes))
            }
        }
    }
}
