use eframe::egui;

pub const SLOT_COUNT: usize = 3;

/// Horizontal positions of the two dividers, as fractions of the width.
const DIVIDER_BASES: [f32; 2] = [0.30, 0.70];
/// Horizontal shift of each divider end from its base, as a fraction of the width.
const SLANT: f32 = 0.04;

/// A clip region for one slot. Points are in canvas pixels, clockwise from
/// the top-left corner.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Polygon {
    points: [egui::Pos2; 4],
}

impl Polygon {
    pub fn new(points: [egui::Pos2; 4]) -> Self {
        Self { points }
    }

    pub fn points(&self) -> &[egui::Pos2; 4] {
        &self.points
    }

    /// Even-odd ray casting.
    pub fn contains(&self, pos: egui::Pos2) -> bool {
        let pts = &self.points;
        let mut inside = false;
        let mut j = pts.len() - 1;
        for i in 0..pts.len() {
            let (pi, pj) = (pts[i], pts[j]);
            if (pi.y > pos.y) != (pj.y > pos.y)
                && pos.x < (pj.x - pi.x) * (pos.y - pi.y) / (pj.y - pi.y) + pi.x
            {
                inside = !inside;
            }
            j = i;
        }
        inside
    }

    pub fn bounds(&self) -> egui::Rect {
        egui::Rect::from_points(&self.points)
    }

    /// Horizontal intervals `[start, end)` covered by the polygon on the line
    /// `y`, using the same crossing rule as [`Polygon::contains`].
    pub fn spans(&self, y: f32) -> Vec<(f32, f32)> {
        let pts = &self.points;
        let mut crossings = Vec::with_capacity(pts.len());
        let mut j = pts.len() - 1;
        for i in 0..pts.len() {
            let (pi, pj) = (pts[i], pts[j]);
            if (pi.y > y) != (pj.y > y) {
                crossings.push((pj.x - pi.x) * (y - pi.y) / (pj.y - pi.y) + pi.x);
            }
            j = i;
        }
        crossings.sort_by(f32::total_cmp);
        crossings
            .chunks_exact(2)
            .map(|pair| (pair[0], pair[1]))
            .collect()
    }
}

/// Splits a `width` x `height` canvas into the left, middle and right panels.
pub fn compute_polygons(width: f32, height: f32) -> [Polygon; SLOT_COUNT] {
    let [first, second] = divider_lines(width, height);
    let (first_top, first_bottom) = (first[0], first[1]);
    let (second_top, second_bottom) = (second[0], second[1]);
    [
        Polygon::new([
            egui::pos2(0.0, 0.0),
            first_top,
            first_bottom,
            egui::pos2(0.0, height),
        ]),
        Polygon::new([first_top, second_top, second_bottom, first_bottom]),
        Polygon::new([
            second_top,
            egui::pos2(width, 0.0),
            egui::pos2(width, height),
            second_bottom,
        ]),
    ]
}

/// Top and bottom end of each divider. The first leans left, the second right.
pub fn divider_lines(width: f32, height: f32) -> [[egui::Pos2; 2]; 2] {
    let slant = width * SLANT;
    let first = width * DIVIDER_BASES[0];
    let second = width * DIVIDER_BASES[1];
    [
        [
            egui::pos2(first + slant, 0.0),
            egui::pos2(first - slant, height),
        ],
        [
            egui::pos2(second - slant, 0.0),
            egui::pos2(second + slant, height),
        ],
    ]
}

/// Index of the first polygon containing `pos`.
pub fn slot_at(polygons: &[Polygon; SLOT_COUNT], pos: egui::Pos2) -> Option<usize> {
    polygons.iter().position(|polygon| polygon.contains(pos))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn neighbouring_panels_share_their_slant_edge() {
        for (w, h) in [(1920.0, 1080.0), (640.0, 360.0), (100.0, 900.0), (7.0, 3.0)] {
            let polys = compute_polygons(w, h);
            for i in 0..SLOT_COUNT - 1 {
                let left = polys[i].points();
                let right = polys[i + 1].points();
                assert_eq!(left[1], right[0], "top of edge {i} for {w}x{h}");
                assert_eq!(left[2], right[3], "bottom of edge {i} for {w}x{h}");
            }
        }
    }

    #[test]
    fn every_pixel_centre_belongs_to_exactly_one_panel() {
        let (w, h) = (200u32, 90u32);
        let polys = compute_polygons(w as f32, h as f32);
        for y in 0..h {
            for x in 0..w {
                let pos = egui::pos2(x as f32 + 0.5, y as f32 + 0.5);
                let hits = polys.iter().filter(|p| p.contains(pos)).count();
                assert_eq!(hits, 1, "pixel ({x}, {y})");
            }
        }
    }

    #[test]
    fn dividers_slant_by_four_percent() {
        let [first, second] = divider_lines(1000.0, 500.0);
        assert_eq!(first, [egui::pos2(340.0, 0.0), egui::pos2(260.0, 500.0)]);
        assert_eq!(second, [egui::pos2(660.0, 0.0), egui::pos2(740.0, 500.0)]);
    }

    #[test]
    fn bounds_cover_slanted_extent() {
        let polys = compute_polygons(1920.0, 1080.0);
        let middle = polys[1].bounds();
        assert!((middle.min.x - (576.0 - 76.8)).abs() < 1e-3);
        assert!((middle.max.x - (1344.0 + 76.8)).abs() < 1e-3);
        assert_eq!(middle.min.y, 0.0);
        assert_eq!(middle.max.y, 1080.0);
    }

    #[test]
    fn slot_lookup_follows_the_slant() {
        let polys = compute_polygons(1920.0, 1080.0);
        // Near the top the first divider sits at x = 652.8, near the bottom at 499.2.
        assert_eq!(slot_at(&polys, egui::pos2(600.0, 10.0)), Some(0));
        assert_eq!(slot_at(&polys, egui::pos2(600.0, 1070.0)), Some(1));
        assert_eq!(slot_at(&polys, egui::pos2(1900.0, 540.0)), Some(2));
        assert_eq!(slot_at(&polys, egui::pos2(-5.0, 540.0)), None);
    }

    #[test]
    fn spans_agree_with_contains() {
        let polys = compute_polygons(300.0, 120.0);
        for polygon in &polys {
            for y in [0.5, 33.5, 60.0, 119.5] {
                let spans = polygon.spans(y);
                for x in 0..300 {
                    let cx = x as f32 + 0.5;
                    let in_span = spans.iter().any(|&(a, b)| cx >= a && cx < b);
                    assert_eq!(in_span, polygon.contains(egui::pos2(cx, y)), "x {cx} y {y}");
                }
            }
        }
    }
}
