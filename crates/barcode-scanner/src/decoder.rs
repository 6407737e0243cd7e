//! Barcode decoder capability

use image::GrayImage;
use tracing::{debug, trace};

use crate::symbol::{DecodedSymbol, Point};
use crate::{format, ScanError};

/// Symbol decoder consuming an 8-bit luma image
pub trait Decoder: Send + Sync {
    /// Whether the decoder's backing resources are ready
    fn is_operational(&self) -> bool;

    /// Decode every symbol found in the image, in decoder order
    fn detect(&self, image: &GrayImage) -> Result<Vec<DecodedSymbol>, ScanError>;

    /// Bitmask of [`format`] codes this decoder can report. The viewfinder
    /// detector targets QR and Data Matrix.
    fn formats(&self) -> i32 {
        format::QR_CODE | format::DATA_MATRIX
    }
}

/// QR code decoder backed by `rqrr`.
///
/// Reports QR codes only; Data Matrix symbols are not detected. Hosts that
/// need them plug in their own [`Decoder`].
#[derive(Debug, Clone, Copy, Default)]
pub struct QrDecoder;

impl QrDecoder {
    pub fn new() -> Self {
        Self
    }
}

impl Decoder for QrDecoder {
    fn is_operational(&self) -> bool {
        true
    }

    fn formats(&self) -> i32 {
        format::QR_CODE
    }

    fn detect(&self, image: &GrayImage) -> Result<Vec<DecodedSymbol>, ScanError> {
        let (width, height) = image.dimensions();
        let mut prepared = rqrr::PreparedImage::prepare_from_greyscale(
            width as usize,
            height as usize,
            |x, y| image.get_pixel(x as u32, y as u32).0[0],
        );

        let grids = prepared.detect_grids();
        trace!("QR grids located: {}", grids.len());

        let mut symbols = Vec::with_capacity(grids.len());
        for grid in grids {
            match grid.decode() {
                Ok((_meta, content)) => symbols.push(DecodedSymbol {
                    raw_value: content,
                    format: format::QR_CODE,
                    corner_points: grid.bounds.iter().map(|p| Point { x: p.x, y: p.y }).collect(),
                }),
                // A located but unreadable grid is not an error for the frame
                Err(e) => debug!("Skipping undecodable QR grid: {}", e),
            }
        }
        Ok(symbols)
    }
}
