//! Maps a slot's pan/zoom onto the part of the source image that is drawn.
//!
//! Rendering and panning both go through these functions so that a drag moves
//! the picture by exactly the distance the pointer travelled.

use eframe::egui;

/// The maximal centred crop of `natural` whose aspect ratio matches `dest`:
/// the longer source dimension is cut.
pub fn visible_size(natural: egui::Vec2, dest: egui::Vec2) -> egui::Vec2 {
    if natural.x <= 0.0 || natural.y <= 0.0 || dest.x <= 0.0 || dest.y <= 0.0 {
        return egui::Vec2::ZERO;
    }
    let image_aspect = natural.x / natural.y;
    let dest_aspect = dest.x / dest.y;
    if image_aspect > dest_aspect {
        egui::vec2(natural.y * dest_aspect, natural.y)
    } else {
        egui::vec2(natural.x, natural.x / dest_aspect)
    }
}

/// Size of the sampling window at `zoom`. Zooming in shrinks the window.
pub fn zoomed_size(natural: egui::Vec2, dest: egui::Vec2, zoom: f32) -> egui::Vec2 {
    visible_size(natural, dest) / zoom
}

/// Source pixels per canvas pixel on each axis.
pub fn source_per_canvas(natural: egui::Vec2, dest: egui::Vec2, zoom: f32) -> egui::Vec2 {
    if dest.x <= 0.0 || dest.y <= 0.0 {
        return egui::Vec2::ZERO;
    }
    zoomed_size(natural, dest, zoom) / dest
}

/// Offset after dragging the pointer by `canvas_delta` from where the drag began.
/// Dragging right moves the sampling window left, so the picture follows the pointer.
pub fn panned_offset(
    start_offset: egui::Vec2,
    canvas_delta: egui::Vec2,
    natural: egui::Vec2,
    dest: egui::Vec2,
    zoom: f32,
) -> egui::Vec2 {
    start_offset - canvas_delta * source_per_canvas(natural, dest, zoom)
}

/// Which source pixels land where inside the destination box.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Placement {
    /// Sub-rectangle of the source image, always inside its bounds.
    pub source: egui::Rect,
    /// Where `source` is drawn. Equals the destination box unless the window
    /// is larger than the image (zoom below 1).
    pub dest: egui::Rect,
}

/// Centres the zoomed window, displaces it by `offset`, clamps it against the
/// image edges and finally intersects it with the image bounds.
pub fn place(natural: egui::Vec2, dest: egui::Rect, zoom: f32, offset: egui::Vec2) -> Option<Placement> {
    let window_size = zoomed_size(natural, dest.size(), zoom);
    if window_size.x <= 0.0 || window_size.y <= 0.0 || !window_size.is_finite() {
        return None;
    }

    let mut min = ((natural - window_size) / 2.0 + offset).to_pos2();
    min.x = min.x.min(natural.x - window_size.x).max(0.0);
    min.y = min.y.min(natural.y - window_size.y).max(0.0);
    let window = egui::Rect::from_min_size(min, window_size);

    let image_bounds = egui::Rect::from_min_size(egui::Pos2::ZERO, natural);
    let source = window.intersect(image_bounds);
    if source.width() <= 0.0 || source.height() <= 0.0 {
        return None;
    }

    let scale = dest.size() / window_size;
    let placed = egui::Rect::from_min_max(
        dest.min + (source.min - window.min) * scale,
        dest.min + (source.max - window.min) * scale,
    );
    Some(Placement {
        source,
        dest: placed,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn dest() -> egui::Rect {
        egui::Rect::from_min_size(egui::pos2(100.0, 0.0), egui::vec2(400.0, 300.0))
    }

    fn approx(a: egui::Rect, b: egui::Rect) -> bool {
        (a.min - b.min).length() < 1e-3 && (a.max - b.max).length() < 1e-3
    }

    #[test]
    fn matching_aspect_samples_the_whole_image() {
        let natural = egui::vec2(800.0, 600.0);
        let p = place(natural, dest(), 1.0, egui::Vec2::ZERO).unwrap();
        assert!(approx(p.source, egui::Rect::from_min_size(egui::Pos2::ZERO, natural)));
        assert!(approx(p.dest, dest()));
    }

    #[test]
    fn wide_image_is_cropped_horizontally() {
        let visible = visible_size(egui::vec2(1600.0, 600.0), egui::vec2(400.0, 300.0));
        assert!((visible - egui::vec2(800.0, 600.0)).length() < 1e-3);
        let p = place(egui::vec2(1600.0, 600.0), dest(), 1.0, egui::Vec2::ZERO).unwrap();
        assert!(approx(
            p.source,
            egui::Rect::from_min_size(egui::pos2(400.0, 0.0), egui::vec2(800.0, 600.0))
        ));
    }

    #[test]
    fn tall_image_is_cropped_vertically() {
        let visible = visible_size(egui::vec2(300.0, 900.0), egui::vec2(400.0, 300.0));
        assert!((visible - egui::vec2(300.0, 225.0)).length() < 1e-3);
    }

    #[test]
    fn window_area_shrinks_as_zoom_grows() {
        let natural = egui::vec2(1280.0, 720.0);
        let dest = egui::vec2(700.0, 1080.0);
        let mut zoom = 0.2;
        let mut last_area = f32::INFINITY;
        while zoom <= 5.0 {
            let size = zoomed_size(natural, dest, zoom);
            let area = size.x * size.y;
            assert!(area < last_area, "zoom {zoom}");
            last_area = area;
            zoom *= 1.1;
        }
    }

    #[test]
    fn any_offset_stays_inside_the_image() {
        let natural = egui::vec2(1024.0, 768.0);
        let image = egui::Rect::from_min_size(egui::Pos2::ZERO, natural);
        for zoom in [0.2, 0.5, 1.0, 2.0, 5.0] {
            for offset in [
                egui::vec2(1e6, -1e6),
                egui::vec2(-1e6, 1e6),
                egui::vec2(37.0, -12.0),
                egui::Vec2::ZERO,
            ] {
                let p = place(natural, dest(), zoom, offset).unwrap();
                assert!(image.contains_rect(p.source), "zoom {zoom} offset {offset:?}");
                assert!(dest().expand(1e-3).contains_rect(p.dest));
            }
        }
    }

    #[test]
    fn zoom_below_one_shrinks_destination_proportionally() {
        // Window is twice the image on both axes and clamps to the origin.
        let natural = egui::vec2(400.0, 300.0);
        let p = place(natural, dest(), 0.5, egui::Vec2::ZERO).unwrap();
        assert!(approx(p.source, egui::Rect::from_min_size(egui::Pos2::ZERO, natural)));
        assert!(approx(
            p.dest,
            egui::Rect::from_min_size(egui::pos2(100.0, 0.0), egui::vec2(200.0, 150.0))
        ));
    }

    #[test]
    fn panning_right_moves_window_left() {
        let natural = egui::vec2(800.0, 600.0);
        let dest = egui::vec2(400.0, 300.0);
        let offset = panned_offset(egui::Vec2::ZERO, egui::vec2(10.0, -4.0), natural, dest, 1.0);
        assert!((offset - egui::vec2(-20.0, 8.0)).length() < 1e-3);
        let zoomed = panned_offset(egui::vec2(5.0, 5.0), egui::vec2(10.0, 0.0), natural, dest, 2.0);
        assert!((zoomed - egui::vec2(-5.0, 5.0)).length() < 1e-3);
    }

    #[test]
    fn degenerate_sizes_place_nothing() {
        assert!(place(egui::Vec2::ZERO, dest(), 1.0, egui::Vec2::ZERO).is_none());
        let empty = egui::Rect::from_min_size(egui::Pos2::ZERO, egui::Vec2::ZERO);
        assert!(place(egui::vec2(10.0, 10.0), empty, 1.0, egui::Vec2::ZERO).is_none());
    }
}
