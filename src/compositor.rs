//! Pure image compositing: per-stream tiles, status headers, placeholder
//! tiles, horizontal mosaic, and letterbox fitting to the output surface.
//! No I/O and no mutable state beyond the optional header font, so every
//! operation is unit-testable.

use crate::group::StreamSnapshot;
use image::imageops::{self, FilterType};
use image::{Rgb, RgbImage};
use imageproc::drawing::{draw_filled_rect_mut, draw_text_mut};
use imageproc::rect::Rect;
use rusttype::{Font, Scale};
use tracing::warn;

/// Height of the opaque status header drawn across the top of every tile
pub const HEADER_HEIGHT: u32 = 40;

/// Width of the placeholder tile shown for a stream with no frame yet
pub const PLACEHOLDER_WIDTH: u32 = 640;

/// Surface size assumed while the presentation sink cannot report one
pub const FALLBACK_SURFACE: (u32, u32) = (1920, 1080);

const HEADER_COLOR: Rgb<u8> = Rgb([0, 0, 0]);
const PLACEHOLDER_HEADER_COLOR: Rgb<u8> = Rgb([64, 64, 64]);
const TEXT_COLOR: Rgb<u8> = Rgb([255, 255, 255]);
const MARKER_COLOR: Rgb<u8> = Rgb([200, 200, 200]);

pub struct Compositor {
    font: Option<Font<'static>>,
    font_size: f32,
}

impl Compositor {
    /// The font is optional: without one, headers are still drawn as opaque
    /// bars so health remains visible, just without glyphs.
    pub fn new(font: Option<Font<'static>>, font_size: f32) -> Self {
        Self { font, font_size }
    }

    /// Load a TTF font from disk, degrading to `None` with a warning.
    pub fn load_font(path: &str) -> Option<Font<'static>> {
        match std::fs::read(path) {
            Ok(bytes) => match Font::try_from_vec(bytes) {
                Some(font) => Some(font),
                None => {
                    warn!("Failed to parse font file '{}'; headers will be text-free", path);
                    None
                }
            },
            Err(e) => {
                warn!(
                    "Failed to read font file '{}': {}; headers will be text-free",
                    path, e
                );
                None
            }
        }
    }

    /// Uniform scale preserving aspect ratio so the result is exactly
    /// `target_height` tall; width is rounded, never below 1 px. A frame
    /// already at the target height is returned unchanged, which makes the
    /// operation idempotent.
    pub fn tile_to_height(frame: &RgbImage, target_height: u32) -> RgbImage {
        let (w, h) = frame.dimensions();
        if w == 0 || h == 0 {
            return RgbImage::new(1, target_height.max(1));
        }
        if h == target_height {
            return frame.clone();
        }
        let new_w =
            ((w as f64 * target_height as f64 / h as f64).round() as u32).max(1);
        imageops::resize(frame, new_w, target_height, FilterType::Triangle)
    }

    /// Flat tile for a stream that has never produced a frame: gray header
    /// carrying the label, "NO VIDEO" marker in the body. Defined for any
    /// positive width and height.
    pub fn placeholder(&self, label: &str, width: u32, height: u32) -> RgbImage {
        let mut canvas = RgbImage::new(width, height);
        draw_filled_rect_mut(
            &mut canvas,
            Rect::at(0, 0).of_size(width, HEADER_HEIGHT.min(height)),
            PLACEHOLDER_HEADER_COLOR,
        );
        self.draw_text(&mut canvas, label, 12, 8, TEXT_COLOR);
        self.draw_text(&mut canvas, "NO VIDEO", 12, (height / 2) as i32, MARKER_COLOR);
        canvas
    }

    /// Opaque black header across the top of the tile: `LABEL  -  STATUS`,
    /// plus an explicit FROZEN marker when the caller classified the frame
    /// as stale. Staleness is the caller's judgment; the compositor only
    /// renders it.
    pub fn annotate(
        &self,
        mut frame: RgbImage,
        label: &str,
        status_text: &str,
        is_stale: bool,
    ) -> RgbImage {
        let (w, h) = frame.dimensions();
        draw_filled_rect_mut(
            &mut frame,
            Rect::at(0, 0).of_size(w, HEADER_HEIGHT.min(h)),
            HEADER_COLOR,
        );

        let mut text = format!("{}  -  {}", label, status_text);
        if is_stale {
            text.push_str("  -  FROZEN");
        }
        self.draw_text(&mut frame, &text, 12, 8, TEXT_COLOR);
        frame
    }

    /// Build the mosaic for one tick: an annotated tile per stream in the
    /// given (configured) order, all `target_height` tall, concatenated
    /// side by side. Absent streams get placeholders, so the mosaic is never
    /// empty or zero-sized for a non-empty snapshot set.
    pub fn tile_and_annotate_all(
        &self,
        snapshots: &[StreamSnapshot],
        target_height: u32,
    ) -> RgbImage {
        debug_assert!(!snapshots.is_empty(), "compositing requires at least one stream");
        if snapshots.is_empty() {
            return RgbImage::new(PLACEHOLDER_WIDTH, target_height.max(1));
        }

        let tiles: Vec<RgbImage> = snapshots
            .iter()
            .map(|snap| self.tile_for(snap, target_height))
            .collect();

        hstack(&tiles)
    }

    fn tile_for(&self, snap: &StreamSnapshot, target_height: u32) -> RgbImage {
        let image = snap.frame.as_ref().and_then(|frame| match frame.to_rgb_image() {
            Some(img) if img.width() > 0 && img.height() > 0 => Some(img),
            Some(_) => {
                warn!(stream = %snap.label, "Frame has zero dimensions; rendering placeholder");
                None
            }
            None => {
                warn!(
                    stream = %snap.label,
                    "Frame buffer does not match its dimensions; rendering placeholder"
                );
                None
            }
        });

        match image {
            Some(img) => {
                let scaled = Self::tile_to_height(&img, target_height);
                self.annotate(scaled, &snap.label, snap.health.status_text(), snap.stale)
            }
            None => self.placeholder(&snap.label, PLACEHOLDER_WIDTH, target_height),
        }
    }

    /// Scale the mosaic uniformly to fit inside `out_w x out_h` and center
    /// it on a black canvas of exactly that size. The result always matches
    /// the requested dimensions, with no distortion and only black gutters.
    pub fn letterbox_fit(mosaic: &RgbImage, out_w: u32, out_h: u32) -> RgbImage {
        let (w, h) = mosaic.dimensions();
        let out_w = out_w.max(1);
        let out_h = out_h.max(1);

        let scale = (out_w as f64 / w as f64).min(out_h as f64 / h as f64);
        let new_w = (((w as f64 * scale).round() as u32).max(1)).min(out_w);
        let new_h = (((h as f64 * scale).round() as u32).max(1)).min(out_h);

        let resized = if (new_w, new_h) == (w, h) {
            mosaic.clone()
        } else {
            imageops::resize(mosaic, new_w, new_h, FilterType::Triangle)
        };

        let mut canvas = RgbImage::new(out_w, out_h);
        let x = (out_w - new_w) / 2;
        let y = (out_h - new_h) / 2;
        imageops::replace(&mut canvas, &resized, x as i64, y as i64);
        canvas
    }

    fn draw_text(&self, canvas: &mut RgbImage, text: &str, x: i32, y: i32, color: Rgb<u8>) {
        if let Some(font) = &self.font {
            draw_text_mut(
                canvas,
                color,
                x,
                y,
                Scale::uniform(self.font_size),
                font,
                text,
            );
        }
    }
}

/// Concatenate equally tall tiles left to right.
fn hstack(tiles: &[RgbImage]) -> RgbImage {
    let height = tiles.iter().map(|t| t.height()).max().unwrap_or(1);
    let total_width: u32 = tiles.iter().map(|t| t.width()).sum();

    let mut mosaic = RgbImage::new(total_width.max(1), height);
    let mut x: i64 = 0;
    for tile in tiles {
        imageops::replace(&mut mosaic, tile, x, 0);
        x += tile.width() as i64;
    }
    mosaic
}
