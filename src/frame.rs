use image::RgbImage;
use std::sync::Arc;
use std::time::SystemTime;

/// Raw RGB24 frame as produced by a frame source.
///
/// The pixel buffer is behind an `Arc` so cloning a frame (the slot's
/// copy-out read path does this on every tick) never copies pixel data.
#[derive(Debug, Clone)]
pub struct FrameData {
    /// Sequence number assigned by the producing source, monotonic per session
    pub id: u64,
    /// Wall-clock capture time
    pub timestamp: SystemTime,
    /// Tightly packed RGB24 pixel data, `width * height * 3` bytes
    pub data: Arc<Vec<u8>>,
    pub width: u32,
    pub height: u32,
}

impl FrameData {
    pub fn new(id: u64, timestamp: SystemTime, data: Vec<u8>, width: u32, height: u32) -> Self {
        Self {
            id,
            timestamp,
            data: Arc::new(data),
            width,
            height,
        }
    }

    pub fn expected_size(&self) -> usize {
        self.width as usize * self.height as usize * 3
    }

    pub fn validate_size(&self) -> bool {
        self.data.len() == self.expected_size()
    }

    /// Materialize the buffer as an `RgbImage` for compositing. Returns
    /// `None` when the buffer length does not match the declared dimensions.
    pub fn to_rgb_image(&self) -> Option<RgbImage> {
        RgbImage::from_raw(self.width, self.height, self.data.as_ref().clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_frame_size_validation() {
        let valid = FrameData::new(1, SystemTime::now(), vec![0u8; 64 * 48 * 3], 64, 48);
        assert!(valid.validate_size());

        let invalid = FrameData::new(2, SystemTime::now(), vec![0u8; 100], 64, 48);
        assert!(!invalid.validate_size());
    }

    #[test]
    fn test_to_rgb_image() {
        let frame = FrameData::new(1, SystemTime::now(), vec![7u8; 8 * 4 * 3], 8, 4);
        let img = frame.to_rgb_image().unwrap();
        assert_eq!(img.dimensions(), (8, 4));
        assert_eq!(img.get_pixel(3, 2).0, [7, 7, 7]);

        let bad = FrameData::new(2, SystemTime::now(), vec![0u8; 10], 8, 4);
        assert!(bad.to_rgb_image().is_none());
    }

    #[test]
    fn test_clone_shares_buffer() {
        let frame = FrameData::new(1, SystemTime::now(), vec![0u8; 12], 2, 2);
        let copy = frame.clone();
        assert!(Arc::ptr_eq(&frame.data, &copy.data));
    }
}
