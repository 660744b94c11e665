#![warn(missing_docs)]
//! # cropform-crop
//!
//! ## Purpose
//! Implements the square crop session shared by every photo slot.
//!
//! ## Responsibilities
//! - Place an initial centred square covering 90% of the shorter edge.
//! - Keep the crop region square and inside the source while it is moved or
//!   resized. There is no zoom.
//! - Render the region to a fixed 512x512 JPEG on commit.
//! - Model the dialog as `Idle -> Loaded -> {Committed | Cancelled} -> Idle`.
//!
//! ## Data flow
//! Decoded [`RasterImage`] -> [`CropDialog::load`] -> user adjusts the
//! [`CropSurface`] -> [`CropDialog::commit`] -> [`EncodedJpeg`] consumed by the
//! file synthesizer.
//!
//! ## Ownership and lifetimes
//! The surface owns its source raster; loading a new image drops the previous
//! surface before the new one is built.
//!
//! ## Error model
//! Invalid regions and codec failures return [`CropError`]. A failed render
//! leaves the dialog loaded so the user can retry.

use cropform_core::{CoreError, EncodedJpeg, RasterImage, encode_jpeg};
use image::imageops::{self, FilterType};
use thiserror::Error;

/// Output edge length of a committed crop.
pub const OUTPUT_SIDE: u32 = 512;

/// Share of the shorter source edge covered by the initial crop square.
pub const AUTO_CROP_AREA: f64 = 0.9;

/// JPEG quality used for committed crops and camera frames.
pub const DEFAULT_JPEG_QUALITY: u8 = 92;

/// Rendering parameters of a crop session.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CropSettings {
    /// Output edge length in pixels.
    pub output_side: u32,
    /// Initial crop square as a share of the shorter source edge.
    pub auto_crop_area: f64,
    /// JPEG quality in `1..=100`.
    pub jpeg_quality: u8,
}

impl Default for CropSettings {
    fn default() -> Self {
        Self {
            output_side: OUTPUT_SIDE,
            auto_crop_area: AUTO_CROP_AREA,
            jpeg_quality: DEFAULT_JPEG_QUALITY,
        }
    }
}

/// Square crop region in source pixel coordinates.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CropRegion {
    /// Left edge.
    pub x: u32,
    /// Top edge.
    pub y: u32,
    /// Edge length.
    pub side: u32,
}

impl CropRegion {
    fn fits(&self, width: u32, height: u32) -> bool {
        self.side > 0
            && self
                .x
                .checked_add(self.side)
                .is_some_and(|right| right <= width)
            && self
                .y
                .checked_add(self.side)
                .is_some_and(|bottom| bottom <= height)
    }
}

/// Computes the centred initial square for a source of the given size.
pub fn initial_region(width: u32, height: u32, area: f64) -> CropRegion {
    let shorter = width.min(height);
    let side = ((shorter as f64 * area.clamp(0.0, 1.0)).round() as u32).clamp(1, shorter.max(1));

    CropRegion {
        x: (width.saturating_sub(side)) / 2,
        y: (height.saturating_sub(side)) / 2,
        side,
    }
}

/// Interactive square crop over one source image.
#[derive(Debug, Clone, PartialEq)]
pub struct CropSurface {
    source: RasterImage,
    region: CropRegion,
}

impl CropSurface {
    /// Creates a surface with the initial centred region.
    pub fn new(source: RasterImage, auto_crop_area: f64) -> Self {
        let region = initial_region(source.width, source.height, auto_crop_area);
        Self { source, region }
    }

    /// Current region.
    pub fn region(&self) -> CropRegion {
        self.region
    }

    /// Source dimensions as `(width, height)`.
    pub fn source_size(&self) -> (u32, u32) {
        (self.source.width, self.source.height)
    }

    /// Moves the region, stopping at the source edges.
    pub fn move_by(&mut self, dx: i64, dy: i64) {
        let max_x = self.source.width - self.region.side;
        let max_y = self.source.height - self.region.side;
        self.region.x = clamp_offset(self.region.x, dx, max_x);
        self.region.y = clamp_offset(self.region.y, dy, max_y);
    }

    /// Resizes the region around its centre, clamped to `1..=shorter edge`
    /// and shifted back inside the source when needed.
    pub fn resize_to(&mut self, side: u32) {
        let shorter = self.source.width.min(self.source.height);
        let side = side.clamp(1, shorter);

        let centre_x = self.region.x as i64 + self.region.side as i64 / 2;
        let centre_y = self.region.y as i64 + self.region.side as i64 / 2;
        let half = side as i64 / 2;

        let max_x = (self.source.width - side) as i64;
        let max_y = (self.source.height - side) as i64;
        self.region = CropRegion {
            x: (centre_x - half).clamp(0, max_x) as u32,
            y: (centre_y - half).clamp(0, max_y) as u32,
            side,
        };
    }

    /// Replaces the region.
    ///
    /// # Errors
    /// Returns [`CropError::RegionOutOfBounds`] when the square is empty or
    /// leaves the source.
    pub fn set_region(&mut self, region: CropRegion) -> Result<(), CropError> {
        if !region.fits(self.source.width, self.source.height) {
            return Err(CropError::RegionOutOfBounds(region));
        }
        self.region = region;
        Ok(())
    }

    /// Renders the region to an `output_side` square JPEG.
    ///
    /// # Errors
    /// Returns [`CropError::Core`] on raster or encoder failures.
    pub fn render(&self, output_side: u32, quality: u8) -> Result<EncodedJpeg, CropError> {
        if output_side == 0 {
            return Err(CropError::InvalidOutputSide);
        }

        let source = self.source.clone().into_rgba_image()?;
        let CropRegion { x, y, side } = self.region;
        let cropped = imageops::crop_imm(&source, x, y, side, side).to_image();
        let scaled = imageops::resize(&cropped, output_side, output_side, FilterType::Lanczos3);

        let raster = RasterImage::from_rgba_image(scaled)?;
        Ok(encode_jpeg(&raster, quality)?)
    }
}

fn clamp_offset(current: u32, delta: i64, max: u32) -> u32 {
    (current as i64 + delta).clamp(0, max as i64) as u32
}

/// Phase of the crop dialog.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CropPhase {
    /// No image loaded; dialog hidden.
    Idle,
    /// Surface initialised; dialog visible.
    Loaded,
}

/// Shared crop dialog holding at most one surface.
#[derive(Debug, Clone)]
pub struct CropDialog {
    settings: CropSettings,
    surface: Option<CropSurface>,
}

impl CropDialog {
    /// Creates an idle dialog.
    pub fn new(settings: CropSettings) -> Self {
        Self {
            settings,
            surface: None,
        }
    }

    /// Current phase.
    pub fn phase(&self) -> CropPhase {
        if self.surface.is_some() {
            CropPhase::Loaded
        } else {
            CropPhase::Idle
        }
    }

    /// Returns `true` while the dialog is shown.
    pub fn is_visible(&self) -> bool {
        self.surface.is_some()
    }

    /// Active settings.
    pub fn settings(&self) -> CropSettings {
        self.settings
    }

    /// Mutable access to the loaded surface.
    pub fn surface_mut(&mut self) -> Option<&mut CropSurface> {
        self.surface.as_mut()
    }

    /// Loaded surface.
    pub fn surface(&self) -> Option<&CropSurface> {
        self.surface.as_ref()
    }

    /// Tears down any loaded surface and initialises a new one over `source`.
    /// Returns `true` when a previous surface was destroyed.
    pub fn load(&mut self, source: RasterImage) -> bool {
        let replaced = self.teardown();
        log::info!(
            target: "crop",
            "loaded source={}x{} replaced={replaced}",
            source.width,
            source.height
        );
        self.surface = Some(CropSurface::new(source, self.settings.auto_crop_area));
        replaced
    }

    /// Renders the loaded surface and returns to `Idle`.
    ///
    /// Returns `Ok(None)` when nothing is loaded.
    ///
    /// # Errors
    /// Returns the render error and stays `Loaded`.
    pub fn commit(&mut self) -> Result<Option<EncodedJpeg>, CropError> {
        let Some(surface) = &self.surface else {
            return Ok(None);
        };

        let jpeg = surface.render(self.settings.output_side, self.settings.jpeg_quality)?;
        self.surface = None;
        log::info!(target: "crop", "committed bytes={}", jpeg.bytes.len());
        Ok(Some(jpeg))
    }

    /// Discards the loaded surface. Returns `true` if one was loaded.
    pub fn cancel(&mut self) -> bool {
        let cancelled = self.teardown();
        if cancelled {
            log::info!(target: "crop", "cancelled");
        }
        cancelled
    }

    fn teardown(&mut self) -> bool {
        self.surface.take().is_some()
    }
}

impl Default for CropDialog {
    fn default() -> Self {
        Self::new(CropSettings::default())
    }
}

/// Error type for crop sessions.
#[derive(Debug, Error)]
pub enum CropError {
    /// Region is empty or leaves the source image.
    #[error("crop region out of bounds: {0:?}")]
    RegionOutOfBounds(CropRegion),
    /// Output edge must be positive.
    #[error("output side must be greater than zero")]
    InvalidOutputSide,
    /// Raster or codec failure.
    #[error("crop render failure: {0}")]
    Core(#[from] CoreError),
}

#[cfg(test)]
mod tests {
    //! Unit tests for region geometry and the dialog lifecycle.

    use cropform_core::decode_image_bytes;

    use super::*;

    fn raster(width: u32, height: u32) -> RasterImage {
        RasterImage::new(width, height, vec![90; (width * height * 4) as usize])
            .expect("raster should be valid")
    }

    #[test]
    fn initial_region_is_centred_square_of_ninety_percent() {
        let region = initial_region(1000, 600, AUTO_CROP_AREA);
        assert_eq!(region.side, 540);
        assert_eq!(region.x, 230);
        assert_eq!(region.y, 30);
    }

    #[test]
    fn initial_region_never_collapses_to_zero() {
        let region = initial_region(1, 1, AUTO_CROP_AREA);
        assert_eq!(region, CropRegion { x: 0, y: 0, side: 1 });
    }

    #[test]
    fn move_stops_at_source_edges() {
        let mut surface = CropSurface::new(raster(100, 50), AUTO_CROP_AREA);
        surface.move_by(-1_000, 1_000);
        assert_eq!(surface.region(), CropRegion { x: 0, y: 5, side: 45 });
        surface.move_by(1_000, -1_000);
        assert_eq!(surface.region(), CropRegion { x: 55, y: 0, side: 45 });
    }

    #[test]
    fn resize_keeps_region_inside_source() {
        let mut surface = CropSurface::new(raster(100, 50), AUTO_CROP_AREA);
        surface.move_by(1_000, 0);
        surface.resize_to(500);
        let region = surface.region();
        assert_eq!(region.side, 50);
        assert!(region.x + region.side <= 100);
        assert_eq!(region.y, 0);
    }

    #[test]
    fn set_region_rejects_out_of_bounds_square() {
        let mut surface = CropSurface::new(raster(10, 10), AUTO_CROP_AREA);
        let result = surface.set_region(CropRegion { x: 5, y: 0, side: 6 });
        assert!(matches!(result, Err(CropError::RegionOutOfBounds(_))));
        surface
            .set_region(CropRegion { x: 4, y: 4, side: 6 })
            .expect("region fits");
    }

    #[test]
    fn commit_renders_fixed_square_jpeg_and_returns_to_idle() {
        let mut dialog = CropDialog::default();
        dialog.load(raster(300, 200));
        assert_eq!(dialog.phase(), CropPhase::Loaded);

        let jpeg = dialog
            .commit()
            .expect("render should work")
            .expect("surface was loaded");
        assert_eq!((jpeg.width, jpeg.height), (OUTPUT_SIDE, OUTPUT_SIDE));
        assert_eq!(dialog.phase(), CropPhase::Idle);

        let decoded = decode_image_bytes(&jpeg.bytes).expect("jpeg decodes");
        assert_eq!((decoded.width, decoded.height), (OUTPUT_SIDE, OUTPUT_SIDE));
    }

    #[test]
    fn configured_output_side_drives_render() {
        let settings = CropSettings {
            output_side: 64,
            ..CropSettings::default()
        };
        let mut dialog = CropDialog::new(settings);
        assert_eq!(dialog.settings().output_side, 64);

        dialog.load(raster(120, 80));
        let jpeg = dialog
            .commit()
            .expect("render should work")
            .expect("surface was loaded");
        assert_eq!((jpeg.width, jpeg.height), (64, 64));
    }

    #[test]
    fn commit_while_idle_is_a_no_op() {
        let mut dialog = CropDialog::default();
        assert!(dialog.commit().expect("no render").is_none());
    }

    #[test]
    fn loading_again_replaces_the_surface() {
        let mut dialog = CropDialog::default();
        assert!(!dialog.load(raster(20, 20)));
        assert!(dialog.load(raster(40, 30)));
        assert_eq!(
            dialog.surface().map(CropSurface::source_size),
            Some((40, 30))
        );
    }

    #[test]
    fn cancel_discards_crop_state() {
        let mut dialog = CropDialog::default();
        dialog.load(raster(20, 20));
        assert!(dialog.cancel());
        assert!(!dialog.is_visible());
        assert!(!dialog.cancel());
    }
}
