//! Preview frame types and pixel transforms

use image::GrayImage;

use crate::CameraError;

/// Orientation code reported by the pool for the device's natural
/// (landscape) orientation. Frames captured in it are rotated before decoding.
pub const NATURAL_ORIENTATION: i32 = 0;

/// Pixel format of a preview buffer
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum PixelFormat {
    /// Luma plane followed by interleaved V/U (the preview default)
    #[default]
    Nv21,
    /// Luma plane followed by interleaved U/V
    Nv12,
    Yuyv,
    Rgb24,
}

impl PixelFormat {
    /// Whether the buffer starts with a full-resolution 8-bit luma plane
    pub fn is_luma_first(self) -> bool {
        matches!(self, PixelFormat::Nv21 | PixelFormat::Nv12)
    }
}

/// One raw preview buffer as delivered by the device
#[derive(Debug, Clone)]
pub struct PreviewFrame {
    /// Raw pixel data (luma plane first for NV21/NV12)
    pub data: Vec<u8>,
    /// Logical frame width
    pub width: u32,
    /// Logical frame height
    pub height: u32,
    /// Pixel format
    pub format: PixelFormat,
    /// Device orientation code at capture
    pub orientation: i32,
}

impl PreviewFrame {
    /// Create a new preview frame from raw NV21 data
    pub fn new(data: Vec<u8>, width: u32, height: u32, orientation: i32) -> Self {
        Self {
            data,
            width,
            height,
            format: PixelFormat::Nv21,
            orientation,
        }
    }

    /// Rotate when the frame was captured in the natural orientation.
    ///
    /// Swaps width and height on rotation; other orientations pass through.
    pub fn upright(self) -> Result<PreviewFrame, CameraError> {
        if self.orientation != NATURAL_ORIENTATION {
            return Ok(self);
        }
        let rotated = rotate_90(&self.data, self.width as usize, self.height as usize)?;
        Ok(PreviewFrame {
            data: rotated,
            width: self.height,
            height: self.width,
            format: self.format,
            orientation: self.orientation,
        })
    }

    /// Copy the luma plane into an 8-bit grey image
    pub fn luma_image(&self) -> Result<GrayImage, CameraError> {
        let plane = (self.width as usize) * (self.height as usize);
        if self.data.len() < plane {
            return Err(CameraError::FrameSize {
                expected: plane,
                actual: self.data.len(),
            });
        }
        GrayImage::from_raw(self.width, self.height, self.data[..plane].to_vec()).ok_or(
            CameraError::FrameSize {
                expected: plane,
                actual: self.data.len(),
            },
        )
    }
}

/// Rotate a luma-first buffer by 90°.
///
/// Source pixel `(x, y)` lands at `x * height + (height - y - 1)`. The output
/// keeps the full source length, so chroma bytes past the luma plane are not
/// carried over; only the luma plane is meaningful afterwards. The rotated
/// frame is `height` wide and `width` tall.
pub fn rotate_90(data: &[u8], width: usize, height: usize) -> Result<Vec<u8>, CameraError> {
    let plane = width * height;
    if data.len() < plane {
        return Err(CameraError::FrameSize {
            expected: plane,
            actual: data.len(),
        });
    }

    let mut rotated = vec![0u8; data.len()];
    for y in 0..height {
        let row = &data[y * width..(y + 1) * width];
        for (x, &value) in row.iter().enumerate() {
            rotated[x * height + height - y - 1] = value;
        }
    }
    Ok(rotated)
}

/// Inverse of [`rotate_90`] for a buffer rotated from a `width`×`height` source
pub fn unrotate_90(rotated: &[u8], width: usize, height: usize) -> Result<Vec<u8>, CameraError> {
    let plane = width * height;
    if rotated.len() < plane {
        return Err(CameraError::FrameSize {
            expected: plane,
            actual: rotated.len(),
        });
    }

    let mut original = vec![0u8; rotated.len()];
    for y in 0..height {
        for x in 0..width {
            original[x + y * width] = rotated[x * height + height - y - 1];
        }
    }
    Ok(original)
}
