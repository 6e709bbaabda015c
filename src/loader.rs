//! Per-slot image loading.
//!
//! Each slot carries a monotonic request token. A decode runs on its own
//! thread and reports back through a channel; the result is committed only if
//! the slot still waits for that token and URL, so an older request finishing
//! late can never overwrite a newer one.

use std::sync::Arc;
use std::sync::mpsc::{self, Receiver, RecvTimeoutError, Sender};
use std::time::{Duration, Instant};

use eframe::egui;
use image::RgbaImage;

use crate::error::LoadError;
use crate::geometry::SLOT_COUNT;
use crate::logging::short_url;
use crate::selection::Selection;
use crate::slot::{SlotState, SlotStatus};
use crate::source::{self, Fetch, FetchMode};

/// Outcome of one background decode.
#[derive(Debug)]
pub struct LoadCompletion {
    pub slot: usize,
    pub token: u64,
    pub url: String,
    pub result: Result<RgbaImage, LoadError>,
}

pub struct ImageLoader {
    slots: [SlotState; SLOT_COUNT],
    fetcher: Arc<dyn Fetch>,
    sender: Sender<LoadCompletion>,
    receiver: Receiver<LoadCompletion>,
    next_token: u64,
    in_flight: usize,
    loads_started: usize,
    repaint: Option<egui::Context>,
}

impl ImageLoader {
    pub fn new(fetcher: Arc<dyn Fetch>) -> Self {
        let (sender, receiver) = mpsc::channel();
        Self {
            slots: Default::default(),
            fetcher,
            sender,
            receiver,
            next_token: 0,
            in_flight: 0,
            loads_started: 0,
            repaint: None,
        }
    }

    /// Wakes the UI whenever a background decode finishes.
    pub fn with_repaint(mut self, ctx: egui::Context) -> Self {
        self.repaint = Some(ctx);
        self
    }

    pub fn slots(&self) -> &[SlotState; SLOT_COUNT] {
        &self.slots
    }

    pub fn slots_mut(&mut self) -> &mut [SlotState; SLOT_COUNT] {
        &mut self.slots
    }

    /// Number of decodes started so far.
    pub fn loads_started(&self) -> usize {
        self.loads_started
    }

    pub fn pending(&self) -> usize {
        self.in_flight
    }

    /// Brings slot `index` in line with `selection`. Returns `true` when the
    /// slot's visible state changed and the canvas needs a redraw.
    pub fn reconcile(&mut self, index: usize, selection: Option<&Selection>) -> bool {
        match selection {
            None => self.clear(index),
            Some(selection) => self.request(index, selection.id, &selection.name, selection.desired_url()),
        }
    }

    /// Points slot `index` at `url` for selection `id`. A changed id or URL
    /// starts a new load and resets pan/zoom; the same pair is a no-op, even
    /// after a failure.
    pub fn request(&mut self, index: usize, id: i64, name: &str, url: Option<&str>) -> bool {
        let Some(slot) = self.slots.get(index) else {
            return false;
        };
        let url = url.filter(|u| !u.is_empty());

        if slot.id() == Some(id) && slot.url() == url {
            if slot.display_name() != Some(name) {
                self.slots[index].rename(name);
                return true;
            }
            return false;
        }

        self.next_token += 1;
        let token = self.next_token;
        self.slots[index].begin(id, name, url, token);

        match url {
            Some(url) => {
                tracing::debug!(
                    "slot {index}: loading {} ({:?}, token {token})",
                    short_url(url),
                    FetchMode::for_url(url)
                );
                self.spawn(index, token, url.to_string());
            }
            None => tracing::warn!("slot {index}: '{name}' has no image URL"),
        }
        true
    }

    /// Empties slot `index`. Any in-flight load for it becomes stale.
    pub fn clear(&mut self, index: usize) -> bool {
        let Some(slot) = self.slots.get(index) else {
            return false;
        };
        if slot.status() == SlotStatus::Empty && slot.id().is_none() {
            return false;
        }
        self.next_token += 1;
        self.slots[index].clear(self.next_token);
        true
    }

    fn spawn(&mut self, slot: usize, token: u64, url: String) {
        let fetcher = Arc::clone(&self.fetcher);
        let sender = self.sender.clone();
        let repaint = self.repaint.clone();
        self.in_flight += 1;
        self.loads_started += 1;

        std::thread::spawn(move || {
            let result = source::load_image(&url, fetcher.as_ref());
            let _ = sender.send(LoadCompletion {
                slot,
                token,
                url,
                result,
            });
            if let Some(ctx) = repaint {
                ctx.request_repaint();
            }
        });
    }

    /// Commits every finished decode. Returns `true` if any slot changed.
    pub fn poll(&mut self) -> bool {
        let mut changed = false;
        while let Ok(completion) = self.receiver.try_recv() {
            self.in_flight = self.in_flight.saturating_sub(1);
            changed |= self.complete(completion);
        }
        changed
    }

    /// Blocks until all started decodes have reported back or `timeout`
    /// passes. Returns `true` if everything finished in time.
    pub fn wait_idle(&mut self, timeout: Duration) -> bool {
        let deadline = Instant::now() + timeout;
        self.poll();
        while self.in_flight > 0 {
            let remaining = deadline.saturating_duration_since(Instant::now());
            match self.receiver.recv_timeout(remaining) {
                Ok(completion) => {
                    self.in_flight = self.in_flight.saturating_sub(1);
                    self.complete(completion);
                }
                Err(RecvTimeoutError::Timeout) => return false,
                Err(RecvTimeoutError::Disconnected) => break,
            }
        }
        true
    }

    /// Applies one completion if it is still current for its slot.
    pub fn complete(&mut self, completion: LoadCompletion) -> bool {
        let LoadCompletion {
            slot: index,
            token,
            url,
            result,
        } = completion;
        let Some(slot) = self.slots.get_mut(index) else {
            return false;
        };
        if !slot.awaits(token, &url) {
            tracing::debug!(
                "slot {index}: discarding stale result for {} (token {token}, current {})",
                short_url(&url),
                slot.token()
            );
            return false;
        }

        match result {
            Ok(image) => {
                tracing::info!(
                    "slot {index}: loaded {} ({}x{})",
                    short_url(&url),
                    image.width(),
                    image.height()
                );
                slot.commit_ready(image);
            }
            Err(err) => {
                tracing::error!(
                    "slot {index}: failed to load '{}' from {}: {err}",
                    slot.display_name().unwrap_or("Image"),
                    short_url(&url)
                );
                slot.commit_failed();
            }
        }
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::selection::Candidate;

    struct Offline;

    impl Fetch for Offline {
        fn fetch(&self, url: &str) -> Result<Vec<u8>, LoadError> {
            Err(LoadError::Fetch {
                url: url.into(),
                reason: "offline".into(),
            })
        }
    }

    fn loader() -> ImageLoader {
        ImageLoader::new(Arc::new(Offline))
    }

    fn pixel(w: u32, h: u32) -> RgbaImage {
        RgbaImage::from_pixel(w, h, image::Rgba([1, 2, 3, 255]))
    }

    #[test]
    fn missing_url_fails_immediately() {
        let mut loader = loader();
        assert!(loader.request(0, 5, "Nothing", None));
        assert_eq!(loader.slots()[0].status(), SlotStatus::Failed);
        assert_eq!(loader.loads_started(), 0);
    }

    #[test]
    fn new_request_enters_loading_and_resets_view() {
        let mut loader = loader();
        loader.slots_mut()[1].offset = egui::vec2(40.0, -3.0);
        loader.slots_mut()[1].zoom = 2.5;
        assert!(loader.request(1, 42, "Portal", Some("https://cdn/a.jpg")));
        let slot = &loader.slots()[1];
        assert_eq!(slot.status(), SlotStatus::Loading);
        assert_eq!(slot.offset, egui::Vec2::ZERO);
        assert_eq!(slot.zoom, 1.0);
        assert_eq!(loader.loads_started(), 1);
    }

    #[test]
    fn matching_completion_commits_ready() {
        let mut loader = loader();
        loader.request(0, 1, "A", Some("https://cdn/a.jpg"));
        let token = loader.slots()[0].token();
        assert!(loader.complete(LoadCompletion {
            slot: 0,
            token,
            url: "https://cdn/a.jpg".into(),
            result: Ok(pixel(4, 4)),
        }));
        assert_eq!(loader.slots()[0].status(), SlotStatus::Ready);
        assert_eq!(loader.slots()[0].natural_size(), Some(egui::vec2(4.0, 4.0)));
    }

    #[test]
    fn superseded_completion_is_ignored() {
        let mut loader = loader();
        loader.request(0, 1, "A", Some("https://cdn/a.jpg"));
        let token_a = loader.slots()[0].token();
        loader.request(0, 1, "A", Some("https://cdn/b.jpg"));
        let token_b = loader.slots()[0].token();

        assert!(loader.complete(LoadCompletion {
            slot: 0,
            token: token_b,
            url: "https://cdn/b.jpg".into(),
            result: Ok(pixel(8, 2)),
        }));
        assert!(!loader.complete(LoadCompletion {
            slot: 0,
            token: token_a,
            url: "https://cdn/a.jpg".into(),
            result: Ok(pixel(1, 1)),
        }));

        let slot = &loader.slots()[0];
        assert_eq!(slot.url(), Some("https://cdn/b.jpg"));
        assert_eq!(slot.natural_size(), Some(egui::vec2(8.0, 2.0)));
    }

    #[test]
    fn failure_is_terminal_for_the_same_url() {
        let mut loader = loader();
        loader.request(2, 9, "Broken", Some("https://cdn/broken.jpg"));
        let token = loader.slots()[2].token();
        loader.complete(LoadCompletion {
            slot: 2,
            token,
            url: "https://cdn/broken.jpg".into(),
            result: Err(LoadError::InvalidDataUri("x".into())),
        });
        assert_eq!(loader.slots()[2].status(), SlotStatus::Failed);
        assert_eq!(loader.slots()[2].display_name(), Some("Broken"));

        assert!(!loader.request(2, 9, "Broken", Some("https://cdn/broken.jpg")));
        assert_eq!(loader.loads_started(), 1);
    }

    #[test]
    fn rename_without_reload() {
        let mut loader = loader();
        loader.request(0, 3, "Old", Some("https://cdn/a.jpg"));
        assert!(loader.request(0, 3, "New", Some("https://cdn/a.jpg")));
        assert_eq!(loader.slots()[0].display_name(), Some("New"));
        assert_eq!(loader.loads_started(), 1);
    }

    #[test]
    fn clearing_invalidates_in_flight_load() {
        let mut loader = loader();
        loader.request(0, 1, "A", Some("https://cdn/a.jpg"));
        let token = loader.slots()[0].token();
        assert!(loader.clear(0));
        assert!(!loader.clear(0));
        assert!(!loader.complete(LoadCompletion {
            slot: 0,
            token,
            url: "https://cdn/a.jpg".into(),
            result: Ok(pixel(1, 1)),
        }));
        assert_eq!(loader.slots()[0].status(), SlotStatus::Empty);
    }

    #[test]
    fn reconcile_follows_the_selection() {
        let mut loader = loader();
        let mut selection = Selection::remote(42, "Portal", "https://cdn/header.jpg");
        selection.set_candidates(vec![
            Candidate::single("0", "https://cdn/header.jpg"),
            Candidate::single("1", "https://cdn/shot.jpg"),
        ]);
        assert!(loader.reconcile(0, Some(&selection)));
        assert_eq!(loader.slots()[0].url(), Some("https://cdn/header.jpg"));

        selection.choose(1);
        assert!(loader.reconcile(0, Some(&selection)));
        assert_eq!(loader.slots()[0].url(), Some("https://cdn/shot.jpg"));

        assert!(loader.reconcile(0, None));
        assert_eq!(loader.slots()[0].id(), None);
    }

    #[test]
    fn background_failure_is_committed_by_poll() {
        let mut loader = loader();
        loader.request(1, 1, "Remote", Some("https://cdn/a.jpg"));
        assert!(loader.wait_idle(Duration::from_secs(5)));
        assert_eq!(loader.slots()[1].status(), SlotStatus::Failed);
        assert_eq!(loader.pending(), 0);
    }
}
