use eframe::egui;
use image::RgbaImage;

/// Load progress of a slot's desired image.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Default)]
pub enum SlotStatus {
    #[default]
    Empty,
    Loading,
    Ready,
    Failed,
}

/// Everything the canvas needs to draw one slot. Owned by the image loader;
/// the interaction controller only touches `offset` and `zoom`.
#[derive(Debug)]
pub struct SlotState {
    id: Option<i64>,
    url: Option<String>,
    image: Option<RgbaImage>,
    status: SlotStatus,
    display_name: Option<String>,
    /// Pan in source pixels, applied after centring.
    pub offset: egui::Vec2,
    pub zoom: f32,
    /// Bumped on every new request; completions carrying an older token are stale.
    token: u64,
}

impl Default for SlotState {
    fn default() -> Self {
        Self {
            id: None,
            url: None,
            image: None,
            status: SlotStatus::Empty,
            display_name: None,
            offset: egui::Vec2::ZERO,
            zoom: 1.0,
            token: 0,
        }
    }
}

impl SlotState {
    pub fn id(&self) -> Option<i64> {
        self.id
    }

    pub fn url(&self) -> Option<&str> {
        self.url.as_deref()
    }

    pub fn status(&self) -> SlotStatus {
        self.status
    }

    pub fn display_name(&self) -> Option<&str> {
        self.display_name.as_deref()
    }

    pub fn token(&self) -> u64 {
        self.token
    }

    /// The decoded image, only while the slot is ready.
    pub fn image(&self) -> Option<&RgbaImage> {
        match self.status {
            SlotStatus::Ready => self.image.as_ref(),
            _ => None,
        }
    }

    pub fn is_ready(&self) -> bool {
        self.image().is_some()
    }

    pub fn natural_size(&self) -> Option<egui::Vec2> {
        self.image()
            .map(|img| egui::vec2(img.width() as f32, img.height() as f32))
    }

    pub fn reset_view(&mut self) {
        self.offset = egui::Vec2::ZERO;
        self.zoom = 1.0;
    }

    /// Replaces the slot with a new request. Pan and zoom start over and any
    /// previous image is released.
    pub(crate) fn begin(&mut self, id: i64, name: &str, url: Option<&str>, token: u64) {
        let status = if url.is_some() {
            SlotStatus::Loading
        } else {
            SlotStatus::Failed
        };
        *self = Self {
            id: Some(id),
            url: url.map(str::to_owned),
            image: None,
            status,
            display_name: Some(name.to_owned()),
            offset: egui::Vec2::ZERO,
            zoom: 1.0,
            token,
        };
    }

    pub(crate) fn clear(&mut self, token: u64) {
        *self = Self {
            token,
            ..Self::default()
        };
    }

    pub(crate) fn rename(&mut self, name: &str) {
        self.display_name = Some(name.to_owned());
    }

    /// Whether a completion for `token`/`url` may still be committed.
    pub(crate) fn awaits(&self, token: u64, url: &str) -> bool {
        self.status == SlotStatus::Loading && self.token == token && self.url.as_deref() == Some(url)
    }

    pub(crate) fn commit_ready(&mut self, image: RgbaImage) {
        self.image = Some(image);
        self.status = SlotStatus::Ready;
    }

    pub(crate) fn commit_failed(&mut self) {
        self.image = None;
        self.status = SlotStatus::Failed;
    }

    /// Test-only shortcut that installs an image without going through a load.
    #[cfg(test)]
    pub(crate) fn with_image(image: RgbaImage) -> Self {
        Self {
            id: Some(1),
            url: Some("test://image".into()),
            image: Some(image),
            status: SlotStatus::Ready,
            display_name: Some("test".into()),
            ..Self::default()
        }
    }
}
