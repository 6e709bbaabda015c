//! Caption text: font loading, single-line layout and glyph coverage.

use std::borrow::Cow;
use std::path::Path;

use ab_glyph::{Font, FontArc, FontRef, FontVec, GlyphId, PxScale, ScaleFont, point};
use eframe::egui;

/// Loads the caption font from `path`, or falls back to the proportional font
/// bundled with egui.
pub fn load_font(path: Option<&Path>) -> Option<FontArc> {
    if let Some(path) = path {
        match std::fs::read(path).map(FontVec::try_from_vec) {
            Ok(Ok(font)) => return Some(FontArc::new(font)),
            Ok(Err(err)) => tracing::warn!("{} is not a usable font: {err}", path.display()),
            Err(err) => tracing::warn!("could not read font {}: {err}", path.display()),
        }
    }
    let font = default_font();
    if font.is_none() {
        tracing::warn!("no caption font available; slot captions will not be drawn");
    }
    font
}

fn default_font() -> Option<FontArc> {
    let definitions = egui::FontDefinitions::default();
    let family = definitions.families.get(&egui::FontFamily::Proportional)?;
    let data = definitions.font_data.get(family.first()?)?;
    match &data.font {
        Cow::Borrowed(bytes) => FontRef::try_from_slice_and_index(*bytes, data.index)
            .map(FontArc::from)
            .ok(),
        Cow::Owned(bytes) => FontVec::try_from_vec_and_index(bytes.clone(), data.index)
            .map(FontArc::from)
            .ok(),
    }
}

/// Scale for a font size given in CSS pixels per em.
pub fn px_scale(font: &FontArc, size: f32) -> PxScale {
    font.pt_to_px_scale(size * 72.0 / 96.0)
        .unwrap_or(PxScale::from(size))
}

/// Positions each glyph of `text` along a line starting at x = 0 and returns
/// them with the total advance width.
pub fn layout_line(font: &FontArc, text: &str, size: f32) -> (Vec<(GlyphId, f32)>, f32) {
    let scaled = font.as_scaled(px_scale(font, size));
    let mut glyphs = Vec::with_capacity(text.len());
    let mut cursor_x = 0.0f32;
    let mut last: Option<GlyphId> = None;
    for ch in text.chars() {
        let id = font.glyph_id(ch);
        if let Some(prev) = last {
            cursor_x += scaled.kern(prev, id);
        }
        glyphs.push((id, cursor_x));
        cursor_x += scaled.h_advance(id);
        last = Some(id);
    }
    (glyphs, cursor_x)
}

/// Rasterizes `text` horizontally centred on `center_x` with its baseline at
/// `baseline_y`. `plot` receives each covered pixel and its coverage in 0..=1.
pub fn rasterize_centered(
    font: &FontArc,
    text: &str,
    size: f32,
    center_x: f32,
    baseline_y: f32,
    mut plot: impl FnMut(i32, i32, f32),
) {
    let scale = px_scale(font, size);
    let (glyphs, width) = layout_line(font, text, size);
    let left = center_x - width / 2.0;
    for (id, x) in glyphs {
        let glyph = id.with_scale_and_position(scale, point(left + x, baseline_y));
        let Some(outlined) = font.outline_glyph(glyph) else {
            continue;
        };
        let bounds = outlined.px_bounds();
        outlined.draw(|gx, gy, coverage| {
            plot(
                bounds.min.x as i32 + gx as i32,
                bounds.min.y as i32 + gy as i32,
                coverage,
            );
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn bundled_font_is_available() {
        assert!(load_font(None).is_some());
    }

    #[test]
    fn unreadable_font_path_falls_back() {
        let dir = tempfile::tempdir().unwrap();
        let bogus = dir.path().join("bogus.ttf");
        std::fs::write(&bogus, b"not a font").unwrap();
        assert!(load_font(Some(&bogus)).is_some());
        assert!(load_font(Some(&dir.path().join("missing.ttf"))).is_some());
    }

    #[test]
    fn wider_text_lays_out_wider() {
        let font = load_font(None).unwrap();
        let short = layout_line(&font, "Slot 1", 30.0).1;
        let long = layout_line(&font, "Drop Image Here", 30.0).1;
        assert!(short > 0.0);
        assert!(long > short);
        assert!((layout_line(&font, "Slot 1", 60.0).1 - 2.0 * short).abs() < 1.0);
    }

    #[test]
    fn glyphs_sit_around_the_centre_and_above_the_baseline() {
        let font = load_font(None).unwrap();
        let (mut min_x, mut max_x, mut max_y) = (i32::MAX, i32::MIN, i32::MIN);
        let mut hits = 0;
        rasterize_centered(&font, "Slot 1", 30.0, 200.0, 100.0, |x, y, c| {
            if c > 0.0 {
                hits += 1;
                min_x = min_x.min(x);
                max_x = max_x.max(x);
                max_y = max_y.max(y);
            }
        });
        assert!(hits > 0);
        assert!(min_x < 200 && max_x > 200);
        assert!(max_y <= 101);
    }
}
