//! Draws the three slots, their placeholders and the dividers into one frame.
//!
//! The same frame is shown on screen and written out on export, so both go
//! through [`Compositor::render`].

use std::ops::Range;
use std::path::Path;

use ab_glyph::FontArc;
use eframe::egui::{self, Color32, Pos2, Rect};
use image::{ImageFormat, RgbaImage};
use rayon::prelude::*;

use crate::error::ExportError;
use crate::geometry::{self, Polygon, SLOT_COUNT};
use crate::slot::{SlotState, SlotStatus};
use crate::text;
use crate::viewport;

pub const BACKGROUND: Color32 = Color32::from_rgb(0x1E, 0x29, 0x3B);
pub const PLACEHOLDER: Color32 = Color32::from_rgb(0x33, 0x41, 0x55);
pub const CAPTION: Color32 = Color32::from_rgb(0x94, 0xA3, 0xB8);
pub const CAPTION_HIGHLIGHTED: Color32 = Color32::WHITE;
pub const DIVIDER: Color32 = Color32::from_rgb(0xA8, 0x55, 0xF7);
pub const DIVIDER_WIDTH: f32 = 15.0;
pub const CAPTION_SIZE: f32 = 30.0;

/// Drop-target tint, purple at 40% opacity.
pub fn highlight() -> Color32 {
    Color32::from_rgba_unmultiplied(0xA8, 0x55, 0xF7, 102)
}

/// A 2D drawing target. All coordinates are canvas pixels.
pub trait Surface {
    fn size(&self) -> egui::Vec2;
    fn clear(&mut self, color: Color32);
    /// Restricts subsequent drawing to `clip`, or lifts the restriction.
    fn set_clip(&mut self, clip: Option<&Polygon>);
    fn fill_rect(&mut self, rect: Rect, color: Color32);
    /// Draws the `source` part of `image` stretched over `dest`.
    fn draw_image(&mut self, image: &RgbaImage, source: Rect, dest: Rect);
    fn fill_text(&mut self, text: &str, center_x: f32, baseline_y: f32, size: f32, color: Color32);
    fn stroke_line(&mut self, from: Pos2, to: Pos2, width: f32, color: Color32);
}

/// CPU rasterizer backed by an RGBA buffer.
pub struct RasterSurface<'a> {
    pixels: RgbaImage,
    clip: Option<Polygon>,
    font: Option<&'a FontArc>,
}

impl<'a> RasterSurface<'a> {
    pub fn new(width: u32, height: u32, font: Option<&'a FontArc>) -> Self {
        Self {
            pixels: RgbaImage::new(width, height),
            clip: None,
            font,
        }
    }

    pub fn into_image(self) -> RgbaImage {
        self.pixels
    }

    /// Rows whose pixel centres can fall inside `[top, bottom)`.
    fn rows(&self, top: f32, bottom: f32) -> Range<u32> {
        let h = self.pixels.height();
        let start = (top - 0.5).ceil().clamp(0.0, h as f32) as u32;
        let end = (bottom - 0.5).ceil().clamp(0.0, h as f32) as u32;
        start..end.max(start)
    }

    /// Runs `paint` over each row in `rows` in parallel, handing it the row's
    /// pixels and the clip spans on that row.
    fn paint_rows<F>(&mut self, rows: Range<u32>, paint: F)
    where
        F: Fn(u32, &mut [u8], &RowClip) + Sync,
    {
        let row_bytes = self.pixels.width() as usize * 4;
        if row_bytes == 0 || rows.is_empty() {
            return;
        }
        let clip = self.clip;
        let start = rows.start as usize * row_bytes;
        let end = rows.end as usize * row_bytes;
        let buffer: &mut [u8] = &mut self.pixels;
        buffer[start..end]
            .par_chunks_mut(row_bytes)
            .enumerate()
            .for_each(|(i, row)| {
                let y = rows.start + i as u32;
                let row_clip = RowClip::new(clip.as_ref(), y);
                paint(y, row, &row_clip);
            });
    }
}

/// Which pixels of one row the current clip lets through.
struct RowClip {
    spans: Option<Vec<(f32, f32)>>,
}

impl RowClip {
    fn new(clip: Option<&Polygon>, y: u32) -> Self {
        Self {
            spans: clip.map(|polygon| polygon.spans(y as f32 + 0.5)),
        }
    }

    fn allows(&self, x: u32) -> bool {
        let cx = x as f32 + 0.5;
        match &self.spans {
            None => true,
            Some(spans) => spans.iter().any(|&(a, b)| cx >= a && cx < b),
        }
    }
}

/// Columns whose pixel centres fall inside `[left, right)`.
fn columns(left: f32, right: f32, width: u32) -> Range<u32> {
    let start = (left - 0.5).ceil().clamp(0.0, width as f32) as u32;
    let end = (right - 0.5).ceil().clamp(0.0, width as f32) as u32;
    start..end.max(start)
}

/// Source-over blend of an unmultiplied colour scaled by `coverage`.
fn blend(dst: &mut [u8], src: [u8; 4], coverage: f32) {
    let src_a = src[3] as f32 / 255.0 * coverage.clamp(0.0, 1.0);
    if src_a <= 0.0 {
        return;
    }
    let dst_a = dst[3] as f32 / 255.0;
    let out_a = src_a + dst_a * (1.0 - src_a);
    for c in 0..3 {
        let value = (src[c] as f32 * src_a + dst[c] as f32 * dst_a * (1.0 - src_a)) / out_a;
        dst[c] = value.round().clamp(0.0, 255.0) as u8;
    }
    dst[3] = (out_a * 255.0).round().clamp(0.0, 255.0) as u8;
}

impl Surface for RasterSurface<'_> {
    fn size(&self) -> egui::Vec2 {
        egui::vec2(self.pixels.width() as f32, self.pixels.height() as f32)
    }

    fn clear(&mut self, color: Color32) {
        let rgba = image::Rgba(color.to_srgba_unmultiplied());
        self.pixels.pixels_mut().for_each(|p| *p = rgba);
    }

    fn set_clip(&mut self, clip: Option<&Polygon>) {
        self.clip = clip.copied();
    }

    fn fill_rect(&mut self, rect: Rect, color: Color32) {
        let src = color.to_srgba_unmultiplied();
        let cols = columns(rect.min.x, rect.max.x, self.pixels.width());
        let rows = self.rows(rect.min.y, rect.max.y);
        self.paint_rows(rows, |_, row, clip| {
            for x in cols.clone() {
                if clip.allows(x) {
                    let i = x as usize * 4;
                    blend(&mut row[i..i + 4], src, 1.0);
                }
            }
        });
    }

    fn draw_image(&mut self, image: &RgbaImage, source: Rect, dest: Rect) {
        if image.width() == 0 || image.height() == 0 || dest.width() <= 0.0 || dest.height() <= 0.0 {
            return;
        }
        let scale = source.size() / dest.size();
        let lo_x = source.min.x.floor().max(0.0) as i64;
        let lo_y = source.min.y.floor().max(0.0) as i64;
        let hi_x = ((source.max.x.ceil() as i64) - 1).clamp(lo_x, image.width() as i64 - 1);
        let hi_y = ((source.max.y.ceil() as i64) - 1).clamp(lo_y, image.height() as i64 - 1);
        let stride = image.width() as usize * 4;
        let raw = image.as_raw();
        let texel = |x: i64, y: i64| -> [f32; 4] {
            let i = y as usize * stride + x as usize * 4;
            [
                raw[i] as f32,
                raw[i + 1] as f32,
                raw[i + 2] as f32,
                raw[i + 3] as f32,
            ]
        };

        let cols = columns(dest.min.x, dest.max.x, self.pixels.width());
        let rows = self.rows(dest.min.y, dest.max.y);
        self.paint_rows(rows, |y, row, clip| {
            let sy = source.min.y + (y as f32 + 0.5 - dest.min.y) * scale.y - 0.5;
            let y0 = (sy.floor() as i64).clamp(lo_y, hi_y);
            let y1 = (y0 + 1).min(hi_y);
            let fy = (sy - y0 as f32).clamp(0.0, 1.0);
            for x in cols.clone() {
                if !clip.allows(x) {
                    continue;
                }
                let sx = source.min.x + (x as f32 + 0.5 - dest.min.x) * scale.x - 0.5;
                let x0 = (sx.floor() as i64).clamp(lo_x, hi_x);
                let x1 = (x0 + 1).min(hi_x);
                let fx = (sx - x0 as f32).clamp(0.0, 1.0);

                let (tl, tr, bl, br) = (texel(x0, y0), texel(x1, y0), texel(x0, y1), texel(x1, y1));
                let mut out = [0u8; 4];
                for c in 0..4 {
                    let top = tl[c] + (tr[c] - tl[c]) * fx;
                    let bottom = bl[c] + (br[c] - bl[c]) * fx;
                    out[c] = (top + (bottom - top) * fy).round().clamp(0.0, 255.0) as u8;
                }
                let i = x as usize * 4;
                blend(&mut row[i..i + 4], out, 1.0);
            }
        });
    }

    fn fill_text(&mut self, caption: &str, center_x: f32, baseline_y: f32, size: f32, color: Color32) {
        let Some(font) = self.font else {
            return;
        };
        let src = color.to_srgba_unmultiplied();
        let (w, h) = self.pixels.dimensions();
        let clip = self.clip;
        let pixels = &mut self.pixels;
        text::rasterize_centered(font, caption, size, center_x, baseline_y, |x, y, coverage| {
            if x < 0 || y < 0 || x >= w as i32 || y >= h as i32 {
                return;
            }
            let centre = egui::pos2(x as f32 + 0.5, y as f32 + 0.5);
            if clip.is_some_and(|polygon| !polygon.contains(centre)) {
                return;
            }
            blend(&mut pixels.get_pixel_mut(x as u32, y as u32).0, src, coverage);
        });
    }

    fn stroke_line(&mut self, from: Pos2, to: Pos2, width: f32, color: Color32) {
        let axis = to - from;
        let length = axis.length();
        if length <= 0.0 || width <= 0.0 {
            return;
        }
        let dir = axis / length;
        let half = width / 2.0;
        let src = color.to_srgba_unmultiplied();
        let bounds = Rect::from_two_pos(from, to).expand(half + 1.0);
        let cols = columns(bounds.min.x, bounds.max.x, self.pixels.width());
        let rows = self.rows(bounds.min.y, bounds.max.y);
        self.paint_rows(rows, |y, row, clip| {
            for x in cols.clone() {
                if !clip.allows(x) {
                    continue;
                }
                let rel = egui::pos2(x as f32 + 0.5, y as f32 + 0.5) - from;
                let along = rel.dot(dir);
                let across = (rel.x * dir.y - rel.y * dir.x).abs();
                let coverage = (half + 0.5 - across).clamp(0.0, 1.0)
                    * (along + 0.5).clamp(0.0, 1.0)
                    * (length - along + 0.5).clamp(0.0, 1.0);
                if coverage > 0.0 {
                    let i = x as usize * 4;
                    blend(&mut row[i..i + 4], src, coverage);
                }
            }
        });
    }
}

/// Text shown in a slot that has no image to draw.
pub fn caption(index: usize, slot: &SlotState, highlighted: bool) -> String {
    if highlighted {
        return "Drop Image Here".into();
    }
    match (slot.status(), slot.display_name()) {
        (SlotStatus::Loading, _) => "Loading...".into(),
        (SlotStatus::Failed, name) => format!("Error: {}", name.unwrap_or("Image")),
        (_, Some(name)) => name.to_string(),
        (SlotStatus::Empty, None) if slot.id().is_none() => format!("Slot {} empty", index + 1),
        _ => format!("Slot {}", index + 1),
    }
}

pub struct Compositor {
    width: u32,
    height: u32,
    polygons: [Polygon; SLOT_COUNT],
    font: Option<FontArc>,
}

impl Compositor {
    pub fn new(width: u32, height: u32, font: Option<FontArc>) -> Self {
        Self {
            width,
            height,
            polygons: geometry::compute_polygons(width as f32, height as f32),
            font,
        }
    }

    pub fn size(&self) -> [u32; 2] {
        [self.width, self.height]
    }

    pub fn polygons(&self) -> &[Polygon; SLOT_COUNT] {
        &self.polygons
    }

    /// Paints a complete frame. The surface is cleared first, so calling this
    /// again with the same state yields the same pixels.
    pub fn render(&self, surface: &mut dyn Surface, slots: &[SlotState; SLOT_COUNT], hover: Option<usize>) {
        let height = surface.size().y;
        surface.set_clip(None);
        surface.clear(BACKGROUND);

        for (index, (slot, polygon)) in slots.iter().zip(&self.polygons).enumerate() {
            let bounds = polygon.bounds();
            let highlighted = hover == Some(index);
            surface.set_clip(Some(polygon));

            if highlighted {
                surface.fill_rect(bounds, highlight());
            }

            let placed = slot.image().and_then(|image| {
                let natural = egui::vec2(image.width() as f32, image.height() as f32);
                viewport::place(natural, bounds, slot.zoom, slot.offset).map(|p| (image, p))
            });
            match placed {
                Some((image, placement)) => surface.draw_image(image, placement.source, placement.dest),
                None => {
                    if !highlighted {
                        let column = Rect::from_min_max(
                            egui::pos2(bounds.min.x, 0.0),
                            egui::pos2(bounds.max.x, height),
                        );
                        surface.fill_rect(column, PLACEHOLDER);
                    }
                    let color = if highlighted { CAPTION_HIGHLIGHTED } else { CAPTION };
                    surface.fill_text(
                        &caption(index, slot, highlighted),
                        bounds.center().x,
                        height / 2.0,
                        CAPTION_SIZE,
                        color,
                    );
                }
            }
        }

        surface.set_clip(None);
        let size = surface.size();
        for [top, bottom] in geometry::divider_lines(size.x, size.y) {
            surface.stroke_line(top, bottom, DIVIDER_WIDTH, DIVIDER);
        }
    }

    pub fn frame(&self, slots: &[SlotState; SLOT_COUNT], hover: Option<usize>) -> RgbaImage {
        let mut surface = RasterSurface::new(self.width, self.height, self.font.as_ref());
        self.render(&mut surface, slots, hover);
        surface.into_image()
    }

    /// The composite without any drop-target highlight.
    pub fn snapshot(&self, slots: &[SlotState; SLOT_COUNT]) -> RgbaImage {
        self.frame(slots, None)
    }

    pub fn export_png(&self, slots: &[SlotState; SLOT_COUNT], path: &Path) -> Result<(), ExportError> {
        self.snapshot(slots)
            .save_with_format(path, ImageFormat::Png)
            .map_err(|source| ExportError::Write {
                path: path.to_path_buf(),
                source,
            })?;
        tracing::info!("exported {}x{} thumbnail to {}", self.width, self.height, path.display());
        Ok(())
    }
}
