//! Decoded pixel sources for tile textures.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use image::RgbaImage;

/// Bytes per RGBA8 pixel.
const BYTES_PER_PIXEL: u64 = 4;

/// Decoded pixels for one tile.
pub trait Asset {
    fn width(&self) -> u32;

    fn height(&self) -> u32;

    /// Whether the content can change after loading.
    fn is_dynamic(&self) -> bool {
        false
    }

    /// Content version. Increases every time dynamic content changes.
    fn timestamp(&self) -> u64 {
        0
    }

    /// Estimated texture memory for this asset.
    fn byte_size(&self) -> u64 {
        u64::from(self.width()) * u64::from(self.height()) * BYTES_PER_PIXEL
    }
}

/// A static RGBA8 image.
#[derive(Debug, Clone, PartialEq)]
pub struct ImageAsset {
    image: RgbaImage,
}

impl ImageAsset {
    pub fn new(image: RgbaImage) -> Self {
        Self { image }
    }

    pub fn pixels(&self) -> &RgbaImage {
        &self.image
    }

    pub fn into_pixels(self) -> RgbaImage {
        self.image
    }
}

impl Asset for ImageAsset {
    fn width(&self) -> u32 {
        self.image.width()
    }

    fn height(&self) -> u32 {
        self.image.height()
    }
}

/// A shared RGBA8 frame whose content changes over time (video, canvas).
///
/// Clones share the same frame. The producer writes through
/// [`update`](Self::update) or calls [`mark_dirty`](Self::mark_dirty) after
/// writing, and the store refreshes the texture the next time the tile is
/// marked.
#[derive(Debug, Clone)]
pub struct DynamicAsset {
    frame: Arc<Mutex<RgbaImage>>,
    timestamp: Arc<AtomicU64>,
}

impl DynamicAsset {
    pub fn new(frame: RgbaImage) -> Self {
        Self {
            frame: Arc::new(Mutex::new(frame)),
            timestamp: Arc::new(AtomicU64::new(0)),
        }
    }

    /// Bump the content version.
    pub fn mark_dirty(&self) {
        self.timestamp.fetch_add(1, Ordering::AcqRel);
    }

    /// Mutate the frame in place and bump the content version.
    pub fn update(&self, f: impl FnOnce(&mut RgbaImage)) {
        f(&mut self.lock());
        self.mark_dirty();
    }

    /// Replace the whole frame, possibly with different dimensions.
    pub fn replace(&self, frame: RgbaImage) {
        *self.lock() = frame;
        self.mark_dirty();
    }

    /// Read the current frame.
    pub fn with_pixels<R>(&self, f: impl FnOnce(&RgbaImage) -> R) -> R {
        f(&self.lock())
    }

    // A panic while writing leaves at worst a half-written frame, which the
    // next update overwrites.
    fn lock(&self) -> MutexGuard<'_, RgbaImage> {
        self.frame.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl Asset for DynamicAsset {
    fn width(&self) -> u32 {
        self.lock().width()
    }

    fn height(&self) -> u32 {
        self.lock().height()
    }

    fn is_dynamic(&self) -> bool {
        true
    }

    fn timestamp(&self) -> u64 {
        self.timestamp.load(Ordering::Acquire)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::Rgba;

    #[test]
    fn test_image_asset_size() {
        let asset = ImageAsset::new(RgbaImage::new(256, 128));
        assert_eq!(asset.width(), 256);
        assert_eq!(asset.height(), 128);
        assert_eq!(asset.byte_size(), 256 * 128 * 4);
        assert!(!asset.is_dynamic());
        assert_eq!(asset.timestamp(), 0);
    }

    #[test]
    fn test_dynamic_asset_timestamp_advances() {
        let asset = DynamicAsset::new(RgbaImage::new(2, 2));
        assert!(asset.is_dynamic());
        assert_eq!(asset.timestamp(), 0);

        asset.update(|frame| frame.put_pixel(0, 0, Rgba([255, 0, 0, 255])));
        assert_eq!(asset.timestamp(), 1);
        assert_eq!(
            asset.with_pixels(|frame| *frame.get_pixel(0, 0)),
            Rgba([255, 0, 0, 255])
        );

        asset.mark_dirty();
        assert_eq!(asset.timestamp(), 2);
    }

    #[test]
    fn test_dynamic_asset_clones_share_frame() {
        let producer = DynamicAsset::new(RgbaImage::new(2, 2));
        let consumer = producer.clone();
        producer.replace(RgbaImage::new(4, 8));
        assert_eq!(consumer.width(), 4);
        assert_eq!(consumer.height(), 8);
        assert_eq!(consumer.timestamp(), 1);
    }
}
