//! Pointer and wheel handling for the canvas: panning, zooming, cursor shape
//! and drop-target hover.
//!
//! Positions are canvas pixels. Wheel deltas follow the browser convention:
//! positive means scrolling down, which zooms out.

use eframe::egui;

use crate::config::Settings;
use crate::geometry::{self, Polygon, SLOT_COUNT};
use crate::slot::SlotState;
use crate::viewport;

#[derive(Clone, Copy, Debug, PartialEq)]
pub struct DragState {
    pub slot: usize,
    pub origin: egui::Pos2,
    pub start_offset: egui::Vec2,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Default)]
pub enum CursorKind {
    #[default]
    Default,
    Grab,
    Grabbing,
}

impl CursorKind {
    pub fn icon(self) -> egui::CursorIcon {
        match self {
            CursorKind::Default => egui::CursorIcon::Default,
            CursorKind::Grab => egui::CursorIcon::Grab,
            CursorKind::Grabbing => egui::CursorIcon::Grabbing,
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq)]
pub struct ZoomLimits {
    pub min: f32,
    pub max: f32,
    pub sensitivity: f32,
}

impl Default for ZoomLimits {
    fn default() -> Self {
        Self {
            min: 0.2,
            max: 5.0,
            sensitivity: 0.001,
        }
    }
}

impl From<&Settings> for ZoomLimits {
    fn from(settings: &Settings) -> Self {
        Self {
            min: settings.min_zoom,
            max: settings.max_zoom,
            sensitivity: settings.zoom_sensitivity,
        }
    }
}

impl ZoomLimits {
    /// Zoom after one wheel step of `delta_y`.
    pub fn apply(&self, zoom: f32, delta_y: f32) -> f32 {
        (zoom * (1.0 - delta_y * self.sensitivity)).clamp(self.min, self.max)
    }
}

/// Transient canvas state. At most one slot is panned at a time.
#[derive(Debug, Default)]
pub struct Interaction {
    drag: Option<DragState>,
    cursor: CursorKind,
    drop_target: Option<usize>,
    limits: ZoomLimits,
}

impl Interaction {
    pub fn new(limits: ZoomLimits) -> Self {
        Self {
            limits,
            ..Self::default()
        }
    }

    pub fn drag(&self) -> Option<&DragState> {
        self.drag.as_ref()
    }

    pub fn is_panning(&self) -> bool {
        self.drag.is_some()
    }

    pub fn cursor(&self) -> CursorKind {
        self.cursor
    }

    /// The slot currently under a drag-and-drop cursor.
    pub fn drop_target(&self) -> Option<usize> {
        self.drop_target
    }

    /// Starts panning the slot under `pos` if it shows an image. The first
    /// polygon containing the point decides, even if it has nothing to pan.
    pub fn pointer_down(
        &mut self,
        pos: egui::Pos2,
        slots: &[SlotState; SLOT_COUNT],
        polygons: &[Polygon; SLOT_COUNT],
    ) -> bool {
        let Some(index) = geometry::slot_at(polygons, pos) else {
            return false;
        };
        if !slots[index].is_ready() {
            return false;
        }
        self.drag = Some(DragState {
            slot: index,
            origin: pos,
            start_offset: slots[index].offset,
        });
        self.cursor = CursorKind::Grabbing;
        tracing::debug!("slot {index}: pan started at ({:.0}, {:.0})", pos.x, pos.y);
        true
    }

    /// Follows the pointer. While panning this rewrites the active slot's
    /// offset; otherwise it only updates the cursor. Returns `true` when a
    /// slot's offset changed.
    pub fn pointer_move(
        &mut self,
        pos: egui::Pos2,
        primary_down: bool,
        slots: &mut [SlotState; SLOT_COUNT],
        polygons: &[Polygon; SLOT_COUNT],
    ) -> bool {
        let Some(drag) = self.drag else {
            self.cursor = hover_cursor(pos, slots, polygons);
            return false;
        };
        if !primary_down {
            self.end_drag();
            return false;
        }
        let slot = &mut slots[drag.slot];
        let Some(natural) = slot.natural_size() else {
            tracing::debug!("slot {}: image went away mid-pan", drag.slot);
            self.end_drag();
            return false;
        };

        self.cursor = CursorKind::Grabbing;
        let dest = polygons[drag.slot].bounds().size();
        let offset = viewport::panned_offset(drag.start_offset, pos - drag.origin, natural, dest, slot.zoom);
        if offset == slot.offset {
            return false;
        }
        slot.offset = offset;
        true
    }

    pub fn pointer_up(&mut self) {
        self.end_drag();
    }

    /// The pointer left the canvas. A pan continues while the button is held.
    pub fn pointer_left(&mut self, primary_down: bool) {
        match self.drag {
            Some(_) if !primary_down => self.end_drag(),
            Some(_) => {}
            None => self.cursor = CursorKind::Default,
        }
    }

    fn end_drag(&mut self) {
        if let Some(drag) = self.drag.take() {
            tracing::debug!("slot {}: pan finished", drag.slot);
            self.cursor = CursorKind::Grab;
        }
    }

    /// Zooms the ready slot under `pos`. Returns the slot that changed.
    pub fn wheel(
        &mut self,
        pos: egui::Pos2,
        delta_y: f32,
        slots: &mut [SlotState; SLOT_COUNT],
        polygons: &[Polygon; SLOT_COUNT],
    ) -> Option<usize> {
        let index = (0..SLOT_COUNT).find(|&i| slots[i].is_ready() && polygons[i].contains(pos))?;
        let slot = &mut slots[index];
        let zoom = self.limits.apply(slot.zoom, delta_y);
        if zoom == slot.zoom {
            return None;
        }
        slot.zoom = zoom;
        Some(index)
    }

    /// Tracks which slot a drag-and-drop hovers. Returns `true` if it changed.
    pub fn drag_over(&mut self, pos: egui::Pos2, polygons: &[Polygon; SLOT_COUNT]) -> bool {
        let target = geometry::slot_at(polygons, pos);
        let changed = target != self.drop_target;
        self.drop_target = target;
        changed
    }

    pub fn drag_leave(&mut self) -> bool {
        self.drop_target.take().is_some()
    }

    /// Ends drop hovering and returns the slot that receives the drop.
    pub fn take_drop_target(&mut self) -> Option<usize> {
        self.drop_target.take()
    }
}

/// `grab` over any ready slot, `default` elsewhere.
fn hover_cursor(pos: egui::Pos2, slots: &[SlotState; SLOT_COUNT], polygons: &[Polygon; SLOT_COUNT]) -> CursorKind {
    let over_image = slots
        .iter()
        .zip(polygons)
        .any(|(slot, polygon)| slot.is_ready() && polygon.contains(pos));
    if over_image {
        CursorKind::Grab
    } else {
        CursorKind::Default
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::RgbaImage;

    const W: f32 = 1920.0;
    const H: f32 = 1080.0;

    fn setup() -> ([SlotState; SLOT_COUNT], [Polygon; SLOT_COUNT]) {
        let mut slots: [SlotState; SLOT_COUNT] = Default::default();
        slots[0] = SlotState::with_image(RgbaImage::new(1280, 720));
        (slots, geometry::compute_polygons(W, H))
    }

    #[test]
    fn pan_moves_window_against_pointer() {
        let (mut slots, polys) = setup();
        let mut interaction = Interaction::default();
        assert!(interaction.pointer_down(egui::pos2(100.0, 500.0), &slots, &polys));
        assert_eq!(interaction.cursor(), CursorKind::Grabbing);

        assert!(interaction.pointer_move(egui::pos2(150.0, 500.0), true, &mut slots, &polys));
        let dest = polys[0].bounds().size();
        let per = viewport::source_per_canvas(egui::vec2(1280.0, 720.0), dest, 1.0);
        assert!((slots[0].offset.x + 50.0 * per.x).abs() < 1e-3);
        assert_eq!(slots[0].offset.y, 0.0);

        interaction.pointer_up();
        assert!(!interaction.is_panning());
        assert_eq!(interaction.cursor(), CursorKind::Grab);
    }

    #[test]
    fn pan_is_relative_to_offset_at_pointer_down() {
        let (mut slots, polys) = setup();
        slots[0].offset = egui::vec2(30.0, 10.0);
        let mut interaction = Interaction::default();
        interaction.pointer_down(egui::pos2(100.0, 500.0), &slots, &polys);
        interaction.pointer_move(egui::pos2(120.0, 480.0), true, &mut slots, &polys);
        interaction.pointer_move(egui::pos2(100.0, 500.0), true, &mut slots, &polys);
        assert!((slots[0].offset - egui::vec2(30.0, 10.0)).length() < 1e-3);
    }

    #[test]
    fn pointer_down_on_placeholder_does_nothing() {
        let (slots, polys) = setup();
        let mut interaction = Interaction::default();
        assert!(!interaction.pointer_down(egui::pos2(960.0, 540.0), &slots, &polys));
        assert!(interaction.drag().is_none());
    }

    #[test]
    fn released_button_ends_pan_without_moving() {
        let (mut slots, polys) = setup();
        let mut interaction = Interaction::default();
        interaction.pointer_down(egui::pos2(100.0, 500.0), &slots, &polys);
        assert!(!interaction.pointer_move(egui::pos2(400.0, 500.0), false, &mut slots, &polys));
        assert!(!interaction.is_panning());
        assert_eq!(slots[0].offset, egui::Vec2::ZERO);
    }

    #[test]
    fn losing_the_image_ends_pan() {
        let (mut slots, polys) = setup();
        let mut interaction = Interaction::default();
        interaction.pointer_down(egui::pos2(100.0, 500.0), &slots, &polys);
        slots[0] = SlotState::default();
        assert!(!interaction.pointer_move(egui::pos2(140.0, 500.0), true, &mut slots, &polys));
        assert!(!interaction.is_panning());
    }

    #[test]
    fn leaving_canvas_keeps_pan_only_while_held() {
        let (slots, polys) = setup();
        let mut interaction = Interaction::default();
        interaction.pointer_down(egui::pos2(100.0, 500.0), &slots, &polys);
        interaction.pointer_left(true);
        assert!(interaction.is_panning());
        interaction.pointer_left(false);
        assert!(!interaction.is_panning());
        interaction.pointer_left(false);
        assert_eq!(interaction.cursor(), CursorKind::Default);
    }

    #[test]
    fn cursor_tracks_ready_slots() {
        let (mut slots, polys) = setup();
        let mut interaction = Interaction::default();
        interaction.pointer_move(egui::pos2(100.0, 500.0), false, &mut slots, &polys);
        assert_eq!(interaction.cursor(), CursorKind::Grab);
        interaction.pointer_move(egui::pos2(960.0, 500.0), false, &mut slots, &polys);
        assert_eq!(interaction.cursor(), CursorKind::Default);
    }

    #[test]
    fn wheel_zoom_is_clamped() {
        let (mut slots, polys) = setup();
        let mut interaction = Interaction::default();
        let pos = egui::pos2(100.0, 500.0);
        for _ in 0..200 {
            interaction.wheel(pos, -100.0, &mut slots, &polys);
            assert!(slots[0].zoom <= 5.0);
        }
        assert_eq!(slots[0].zoom, 5.0);
        for _ in 0..200 {
            interaction.wheel(pos, 100.0, &mut slots, &polys);
            assert!(slots[0].zoom >= 0.2);
        }
        assert_eq!(slots[0].zoom, 0.2);
    }

    #[test]
    fn wheel_only_affects_ready_slot_under_pointer() {
        let (mut slots, polys) = setup();
        let mut interaction = Interaction::default();
        assert_eq!(interaction.wheel(egui::pos2(100.0, 500.0), -100.0, &mut slots, &polys), Some(0));
        assert!((slots[0].zoom - 1.1).abs() < 1e-5);
        assert_eq!(interaction.wheel(egui::pos2(960.0, 500.0), -100.0, &mut slots, &polys), None);
        assert_eq!(slots[1].zoom, 1.0);
    }

    #[test]
    fn drop_hover_follows_polygons() {
        let polys = geometry::compute_polygons(W, H);
        let mut interaction = Interaction::default();
        assert!(interaction.drag_over(egui::pos2(1800.0, 100.0), &polys));
        assert_eq!(interaction.drop_target(), Some(2));
        assert!(!interaction.drag_over(egui::pos2(1810.0, 100.0), &polys));
        assert!(interaction.drag_leave());
        assert_eq!(interaction.drop_target(), None);
        interaction.drag_over(egui::pos2(960.0, 540.0), &polys);
        assert_eq!(interaction.take_drop_target(), Some(1));
        assert_eq!(interaction.drop_target(), None);
    }
}
