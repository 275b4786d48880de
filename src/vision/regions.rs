//! Card region extraction
//!
//! Crops the two bands of an upright card photo that carry identifying text:
//! the name band across the top quarter and the collector-number band across
//! the bottom quarter. Each band gets a fixed linear contrast stretch before
//! OCR; no thresholding or binarization, stylized card fonts survive a
//! stretch much better than a hard black/white cut.

use tracing::debug;

use crate::capture::CapturedFrame;

/// Contrast factor applied to both bands
const CONTRAST_FACTOR: f32 = 1.5;

/// Fraction of the image height covered by each band
const BAND_FRACTION: f32 = 0.25;

/// Which part of the card a region was cropped from
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RegionKind {
    /// Top band, expected to contain the card name
    Name,
    /// Bottom band, expected to contain the collector number
    Number,
}

/// A cropped, contrast-enhanced sub-image of the captured card
#[derive(Debug, Clone)]
pub struct CardRegion {
    /// Which band this is
    pub kind: RegionKind,
    /// The cropped pixel buffer
    pub frame: CapturedFrame,
}

/// The two regions produced together by one extraction pass
#[derive(Debug, Clone)]
pub struct CardRegions {
    /// Top band (card name)
    pub name: CardRegion,
    /// Bottom band (collector number)
    pub number: CardRegion,
}

/// Extract the name and number bands from a captured frame.
///
/// The name band spans rows `[0, 0.25h)`, the number band `[0.75h, h)`,
/// both at full image width. Returns `None` when the frame is unusable
/// (zero-sized or too short to yield non-empty bands); callers then take
/// the whole-image fallback path.
pub fn extract_regions(frame: &CapturedFrame) -> Option<CardRegions> {
    if frame.is_empty() {
        debug!("Region extraction skipped: empty frame");
        return None;
    }

    let band_height = (frame.height as f32 * BAND_FRACTION) as u32;
    if band_height == 0 {
        debug!(
            "Region extraction skipped: frame too short ({} rows)",
            frame.height
        );
        return None;
    }

    let number_top = frame.height - band_height;

    let name = crop_band(frame, 0, band_height)?;
    let number = crop_band(frame, number_top, band_height)?;

    debug!(
        "Extracted name band {}x{} and number band {}x{}",
        name.width, name.height, number.width, number.height
    );

    Some(CardRegions {
        name: CardRegion {
            kind: RegionKind::Name,
            frame: name,
        },
        number: CardRegion {
            kind: RegionKind::Number,
            frame: number,
        },
    })
}

/// Crop a full-width horizontal band and apply the contrast stretch
fn crop_band(frame: &CapturedFrame, top: u32, height: u32) -> Option<CapturedFrame> {
    let row_bytes = (frame.width * 4) as usize;
    let start = top as usize * row_bytes;
    let end = (top + height) as usize * row_bytes;
    if end > frame.data.len() {
        return None;
    }

    let mut data = frame.data[start..end].to_vec();
    apply_contrast(&mut data, CONTRAST_FACTOR);

    Some(CapturedFrame::new(data, frame.width, height))
}

/// Linear contrast stretch around mid-gray on RGBA data.
/// Factor > 1.0 increases contrast; alpha is untouched.
fn apply_contrast(data: &mut [u8], factor: f32) {
    for chunk in data.chunks_exact_mut(4) {
        for channel in chunk.iter_mut().take(3) {
            let val = *channel as f32;
            *channel = ((val - 128.0) * factor + 128.0).clamp(0.0, 255.0) as u8;
        }
    }
}
