//! Frame data structures for captured card images

use std::time::Instant;

/// A single raster image produced by the image source.
///
/// Pixel data is RGBA, row-major, top-left origin. A frame is owned by the
/// pipeline invocation that created it and dropped on retry or teardown.
#[derive(Debug, Clone)]
pub struct CapturedFrame {
    /// Raw RGBA pixel data
    pub data: Vec<u8>,
    /// Frame width in pixels
    pub width: u32,
    /// Frame height in pixels
    pub height: u32,
    /// Timestamp when the frame was acquired
    pub timestamp: Instant,
}

impl CapturedFrame {
    /// Create a new captured frame
    pub fn new(data: Vec<u8>, width: u32, height: u32) -> Self {
        Self {
            data,
            width,
            height,
            timestamp: Instant::now(),
        }
    }

    /// Get frame dimensions as (width, height)
    pub fn dimensions(&self) -> (u32, u32) {
        (self.width, self.height)
    }

    /// Whether the frame holds no usable pixels
    pub fn is_empty(&self) -> bool {
        self.width == 0 || self.height == 0 || self.data.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_dimensions() {
        let frame = CapturedFrame::new(vec![0; 4 * 6], 2, 3);
        assert_eq!(frame.dimensions(), (2, 3));
        assert!(!frame.is_empty());
    }

    #[test]
    fn test_empty_frame() {
        let frame = CapturedFrame::new(vec![], 0, 0);
        assert!(frame.is_empty());
    }
}
