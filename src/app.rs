//! The editor window: per-slot controls on the left, the live canvas in the
//! middle, plus the image picker and notice windows.

use std::collections::HashMap;
use std::path::Path;
use std::sync::Arc;
use std::sync::mpsc::{self, Receiver, Sender};
use std::time::Duration;

use eframe::egui;
use image::{DynamicImage, RgbaImage};

use crate::catalog::{AppSummary, HttpClient, SteamCatalog};
use crate::compositor::Compositor;
use crate::config::Settings;
use crate::drop::{self, DropPayload, DroppedItem};
use crate::error::LoadError;
use crate::geometry::{self, SLOT_COUNT};
use crate::interaction::{Interaction, ZoomLimits};
use crate::loader::ImageLoader;
use crate::logging::short_url;
use crate::search::{ImageSearch, MockImageSearch};
use crate::selection::{Candidate, Selection, SourceKind};
use crate::slot::SlotStatus;
use crate::source::{self, Fetch, HttpFetcher};
use crate::text;

const SEARCH_DEBOUNCE_SECS: f64 = 0.35;
const THUMBNAIL_MAX: [u32; 2] = [160, 90];
const SLOT_LABELS: [&str; SLOT_COUNT] = ["Left", "Middle", "Right"];
const IMAGE_EXTENSIONS: [&str; 6] = ["png", "jpg", "jpeg", "gif", "webp", "bmp"];

/// Results coming back from background work.
enum AppEvent {
    Suggestions {
        slot: usize,
        query: String,
        apps: Vec<AppSummary>,
    },
    FirstPage {
        slot: usize,
        id: i64,
        candidates: Vec<Candidate>,
    },
    NextPage {
        slot: usize,
        id: i64,
        page: u32,
        result: anyhow::Result<Vec<Candidate>>,
    },
    Thumbnail {
        url: String,
        result: Result<RgbaImage, LoadError>,
    },
}

#[derive(Default)]
struct SlotControls {
    query: String,
    /// `ctx.input().time` of the last edit still waiting for its search.
    edited_at: Option<f64>,
    suggestions: Vec<AppSummary>,
    searching: bool,
    page_loading: bool,
}

enum Thumbnail {
    Loading,
    Ready(egui::TextureHandle),
    Failed,
}

pub struct ComposerApp {
    settings: Settings,
    loader: ImageLoader,
    compositor: Compositor,
    interaction: Interaction,
    selections: [Option<Selection>; SLOT_COUNT],
    controls: [SlotControls; SLOT_COUNT],
    catalog: Arc<SteamCatalog>,
    search: Arc<dyn ImageSearch>,
    fetcher: Arc<dyn Fetch>,
    events: Sender<AppEvent>,
    inbox: Receiver<AppEvent>,
    canvas: Option<egui::TextureHandle>,
    dirty: bool,
    picker: Option<usize>,
    thumbnails: HashMap<String, Thumbnail>,
    notice: Option<String>,
}

impl ComposerApp {
    pub fn new(cc: &eframe::CreationContext<'_>, settings: Settings) -> anyhow::Result<Self> {
        let timeout = Duration::from_secs(settings.request_timeout_secs);
        let fetcher: Arc<dyn Fetch> = Arc::new(HttpFetcher::new(timeout)?);
        let catalog = Arc::new(SteamCatalog::new(
            Arc::new(HttpClient::new(timeout)?),
            settings.clone(),
        ));
        let search: Arc<dyn ImageSearch> = Arc::new(MockImageSearch::new(Duration::from_millis(
            settings.mock_search_delay_ms,
        )));

        let font = text::load_font(settings.font_path.as_deref());
        let (events, inbox) = mpsc::channel();

        // The game list is large; start downloading it before the first search.
        let warm = Arc::clone(&catalog);
        std::thread::spawn(move || {
            warm.apps();
        });

        Ok(Self {
            loader: ImageLoader::new(Arc::clone(&fetcher)).with_repaint(cc.egui_ctx.clone()),
            compositor: Compositor::new(settings.canvas_width, settings.canvas_height, font),
            interaction: Interaction::new(ZoomLimits::from(&settings)),
            selections: Default::default(),
            controls: Default::default(),
            catalog,
            search,
            fetcher,
            events,
            inbox,
            canvas: None,
            dirty: true,
            picker: None,
            thumbnails: HashMap::new(),
            notice: None,
            settings,
        })
    }

    fn spawn(&self, ctx: &egui::Context, job: impl FnOnce() -> AppEvent + Send + 'static) {
        let sender = self.events.clone();
        let ctx = ctx.clone();
        std::thread::spawn(move || {
            let _ = sender.send(job());
            ctx.request_repaint();
        });
    }

    /// Replaces what slot `slot` shows. Remote games get their candidates
    /// looked up in the background.
    fn install(&mut self, ctx: &egui::Context, slot: usize, selection: Option<Selection>) {
        let controls = &mut self.controls[slot];
        controls.suggestions.clear();
        controls.edited_at = None;
        controls.searching = false;
        controls.page_loading = false;

        if let Some(selection) = &selection {
            tracing::info!("slot {slot}: selected '{}' ({:?})", selection.name, selection.source);
            controls.query = selection.name.clone();
            if selection.source == SourceKind::Remote && selection.candidates.is_empty() {
                let catalog = Arc::clone(&self.catalog);
                let search = Arc::clone(&self.search);
                let pending = selection.clone();
                self.spawn(ctx, move || AppEvent::FirstPage {
                    slot,
                    id: pending.id,
                    candidates: catalog.first_page(&pending, search.as_ref()),
                });
            }
        } else {
            tracing::info!("slot {slot}: cleared");
        }

        self.selections[slot] = selection;
        self.sync_slot(slot);
    }

    fn sync_slot(&mut self, slot: usize) {
        if self.loader.reconcile(slot, self.selections[slot].as_ref()) {
            self.dirty = true;
        }
    }

    fn drain_events(&mut self, ctx: &egui::Context) {
        while let Ok(event) = self.inbox.try_recv() {
            match event {
                AppEvent::Suggestions { slot, query, apps } => {
                    let controls = &mut self.controls[slot];
                    if controls.query.trim() == query {
                        controls.searching = false;
                        controls.suggestions = apps;
                    }
                }
                AppEvent::FirstPage { slot, id, candidates } => match self.selections[slot].as_mut() {
                    Some(selection) if selection.id == id && selection.source == SourceKind::Remote => {
                        tracing::debug!("slot {slot}: {} candidate(s) for '{}'", candidates.len(), selection.name);
                        selection.set_candidates(candidates);
                        self.sync_slot(slot);
                    }
                    _ => tracing::debug!("slot {slot}: dropping candidates for replaced selection {id}"),
                },
                AppEvent::NextPage { slot, id, page, result } => {
                    let Some(selection) = self.selections[slot].as_mut().filter(|s| s.id == id) else {
                        continue;
                    };
                    self.controls[slot].page_loading = false;
                    match result {
                        Ok(fetched) => {
                            let added = selection.merge_page(page, fetched);
                            tracing::info!(
                                "slot {slot}: page {page} added {added} image(s), more available: {}",
                                selection.more_available
                            );
                        }
                        Err(err) => {
                            tracing::error!("slot {slot}: loading page {page} failed: {err:#}");
                            selection.mark_exhausted();
                        }
                    }
                }
                AppEvent::Thumbnail { url, result } => {
                    let entry = match result {
                        Ok(image) => Thumbnail::Ready(ctx.load_texture(
                            format!("thumb:{}", short_url(&url)),
                            color_image(&image),
                            egui::TextureOptions::LINEAR,
                        )),
                        Err(err) => {
                            tracing::warn!("thumbnail {} failed: {err}", short_url(&url));
                            Thumbnail::Failed
                        }
                    };
                    self.thumbnails.insert(url, entry);
                }
            }
        }
    }

    /// Fires the game search for every box whose debounce has run out.
    fn tick_searches(&mut self, ctx: &egui::Context) {
        let now = ctx.input(|i| i.time);
        for slot in 0..SLOT_COUNT {
            let Some(edited_at) = self.controls[slot].edited_at else {
                continue;
            };
            let wait = edited_at + SEARCH_DEBOUNCE_SECS - now;
            if wait > 0.0 {
                ctx.request_repaint_after(Duration::from_secs_f64(wait));
                continue;
            }
            self.controls[slot].edited_at = None;
            let query = self.controls[slot].query.trim().to_string();
            if query.is_empty() {
                continue;
            }
            self.controls[slot].searching = true;
            let catalog = Arc::clone(&self.catalog);
            self.spawn(ctx, move || {
                let apps = catalog.search(&query);
                AppEvent::Suggestions { slot, query, apps }
            });
        }
    }

    fn slot_controls(&mut self, ui: &mut egui::Ui, slot: usize) {
        let ctx = ui.ctx().clone();
        ui.strong(SLOT_LABELS[slot]);

        let edit = ui.add(
            egui::TextEdit::singleline(&mut self.controls[slot].query)
                .hint_text("Search Steam games...")
                .desired_width(f32::INFINITY),
        );
        if edit.changed() {
            if self.controls[slot].query.trim().is_empty() {
                self.install(&ctx, slot, None);
            } else {
                self.controls[slot].edited_at = Some(ui.input(|i| i.time));
            }
        }

        if self.controls[slot].searching {
            ui.horizontal(|ui| {
                ui.spinner();
                ui.label("Searching...");
            });
        }
        let mut picked = None;
        for app in &self.controls[slot].suggestions {
            if ui.selectable_label(false, &app.name).clicked() {
                picked = Some(app.clone());
            }
        }
        if let Some(app) = picked {
            let selection = self.catalog.selection_for(&app);
            self.install(&ctx, slot, Some(selection));
        }

        let has_candidates = self.selections[slot]
            .as_ref()
            .is_some_and(|s| !s.candidates.is_empty());
        let has_selection = self.selections[slot].is_some();
        let (mut upload, mut clear) = (false, false);
        ui.horizontal(|ui| {
            upload = ui.button("Upload").clicked();
            if ui.add_enabled(has_candidates, egui::Button::new("Images...")).clicked() {
                self.picker = Some(slot);
            }
            clear = ui.add_enabled(has_selection, egui::Button::new("Clear")).clicked();
        });
        if upload {
            self.upload(&ctx, slot);
        }
        if clear {
            self.controls[slot].query.clear();
            self.install(&ctx, slot, None);
        }

        let status = match self.loader.slots()[slot].status() {
            SlotStatus::Empty => "Empty",
            SlotStatus::Loading => "Loading...",
            SlotStatus::Ready => "Ready",
            SlotStatus::Failed => "Failed to load",
        };
        ui.weak(status);
    }

    fn upload(&mut self, ctx: &egui::Context, slot: usize) {
        let Some(path) = rfd::FileDialog::new()
            .add_filter("Image", &IMAGE_EXTENSIONS)
            .pick_file()
        else {
            return;
        };
        match source::read_file_as_data_uri(&path) {
            Ok(data_uri) => {
                let name = file_name(&path);
                self.install(ctx, slot, Some(Selection::local_upload(slot, name.as_deref(), data_uri)));
            }
            Err(err) => {
                tracing::error!("slot {slot}: upload failed: {err}");
                self.notice = Some(format!("Could not load the selected file. {err}"));
            }
        }
    }

    fn download(&mut self) {
        let Some(path) = rfd::FileDialog::new()
            .set_file_name(self.settings.export_file_name.clone())
            .add_filter("PNG", &["png"])
            .save_file()
        else {
            return;
        };
        if let Err(err) = self.compositor.export_png(self.loader.slots(), &path) {
            tracing::error!("{err}");
            self.notice = Some(err.to_string());
        }
    }

    fn canvas(&mut self, ui: &mut egui::Ui) {
        let ctx = ui.ctx().clone();
        let [width, height] = self.compositor.size();
        let size = fit_size(egui::vec2(width as f32, height as f32), ui.available_size());
        let (rect, response) = ui.allocate_exact_size(size, egui::Sense::click_and_drag());
        let scale = width as f32 / rect.width().max(1.0);

        self.handle_pointer(&ctx, &response, rect, scale);
        self.handle_file_drop(&ctx, rect, scale);
        self.handle_paste(&ctx, rect, scale);

        if self.dirty {
            self.refresh_canvas(&ctx);
        }
        if let Some(texture) = &self.canvas {
            ui.painter_at(rect).image(
                texture.id(),
                rect,
                egui::Rect::from_min_max(egui::pos2(0.0, 0.0), egui::pos2(1.0, 1.0)),
                egui::Color32::WHITE,
            );
        }
    }

    fn handle_pointer(&mut self, ctx: &egui::Context, response: &egui::Response, rect: egui::Rect, scale: f32) {
        let (hover, pressed, down, released, scroll) = ctx.input(|i| {
            (
                i.pointer.hover_pos(),
                i.pointer.primary_pressed(),
                i.pointer.primary_down(),
                i.pointer.primary_released(),
                i.raw_scroll_delta.y,
            )
        });
        let polygons = self.compositor.polygons();
        // Windows over the canvas own the pointer while it is on them.
        let inside = hover.filter(|p| response.hovered() && rect.contains(*p));

        if let Some(pos) = canvas_press(response, pressed) {
            self.interaction
                .pointer_down(canvas_pos(pos, rect, scale), self.loader.slots(), polygons);
        }
        match (inside, hover) {
            (Some(pos), _) => {
                let pos = canvas_pos(pos, rect, scale);
                self.dirty |= self
                    .interaction
                    .pointer_move(pos, down, self.loader.slots_mut(), polygons);
                // egui reports scrolling up as positive; zooming follows wheel-down-is-positive.
                if scroll != 0.0 {
                    if let Some(slot) = self
                        .interaction
                        .wheel(pos, -scroll, self.loader.slots_mut(), polygons)
                    {
                        tracing::trace!("slot {slot}: zoom {:.2}", self.loader.slots()[slot].zoom);
                        self.dirty = true;
                    }
                }
            }
            (None, Some(pos)) if self.interaction.is_panning() => {
                let pos = canvas_pos(pos, rect, scale);
                self.dirty |= self
                    .interaction
                    .pointer_move(pos, down, self.loader.slots_mut(), polygons);
            }
            _ => self.interaction.pointer_left(down),
        }
        if released {
            self.interaction.pointer_up();
        }
        if inside.is_some() || self.interaction.is_panning() {
            ctx.set_cursor_icon(self.interaction.cursor().icon());
        }
    }

    fn handle_file_drop(&mut self, ctx: &egui::Context, rect: egui::Rect, scale: f32) {
        let (hovering, dropped, pointer) = ctx.input(|i| {
            (
                !i.raw.hovered_files.is_empty(),
                i.raw.dropped_files.clone(),
                i.pointer.hover_pos(),
            )
        });
        let pointer = pointer
            .filter(|p| rect.contains(*p))
            .map(|p| canvas_pos(p, rect, scale));

        if hovering {
            self.dirty |= match pointer {
                Some(pos) => self.interaction.drag_over(pos, self.compositor.polygons()),
                None => self.interaction.drag_leave(),
            };
        } else if dropped.is_empty() && self.interaction.drop_target().is_some() {
            self.dirty |= self.interaction.drag_leave();
        }
        if dropped.is_empty() {
            return;
        }

        self.dirty = true;
        let target = self
            .interaction
            .take_drop_target()
            .or_else(|| pointer.and_then(|p| geometry::slot_at(self.compositor.polygons(), p)));
        let Some(slot) = target else {
            tracing::debug!("drop outside the slots ignored");
            return;
        };
        let payload = dropped
            .iter()
            .fold(DropPayload::default(), |payload, file| payload.with_file(dropped_item(file)));
        self.apply_drop(ctx, slot, &payload);
    }

    /// Ctrl+V over a slot goes through the same resolver as a drop.
    fn handle_paste(&mut self, ctx: &egui::Context, rect: egui::Rect, scale: f32) {
        if ctx.memory(|m| m.focused().is_some()) {
            return;
        }
        let (pasted, pointer) = ctx.input(|i| {
            let pasted: Vec<String> = i
                .events
                .iter()
                .filter_map(|event| match event {
                    egui::Event::Paste(text) => Some(text.clone()),
                    _ => None,
                })
                .collect();
            (pasted, i.pointer.hover_pos())
        });
        if pasted.is_empty() {
            return;
        }
        let Some(slot) = pointer
            .filter(|p| rect.contains(*p))
            .and_then(|p| geometry::slot_at(self.compositor.polygons(), canvas_pos(p, rect, scale)))
        else {
            return;
        };
        for text in pasted {
            self.apply_drop(ctx, slot, &paste_payload(&text));
        }
    }

    fn apply_drop(&mut self, ctx: &egui::Context, slot: usize, payload: &DropPayload) {
        match drop::selection_for(slot, payload) {
            Ok(Some(selection)) => self.install(ctx, slot, Some(selection)),
            Ok(None) => {}
            Err(err) => self.notice = Some(err.to_string()),
        }
    }

    fn refresh_canvas(&mut self, ctx: &egui::Context) {
        let frame = self
            .compositor
            .frame(self.loader.slots(), self.interaction.drop_target());
        let image = color_image(&frame);
        match &mut self.canvas {
            Some(texture) => texture.set(image, egui::TextureOptions::LINEAR),
            None => self.canvas = Some(ctx.load_texture("canvas", image, egui::TextureOptions::LINEAR)),
        }
        self.dirty = false;
    }

    fn request_thumbnail(&mut self, ctx: &egui::Context, url: String) {
        if self.thumbnails.contains_key(&url) {
            return;
        }
        self.thumbnails.insert(url.clone(), Thumbnail::Loading);
        let fetcher = Arc::clone(&self.fetcher);
        self.spawn(ctx, move || {
            let result = source::load_image(&url, fetcher.as_ref()).map(|image| {
                DynamicImage::ImageRgba8(image)
                    .thumbnail(THUMBNAIL_MAX[0], THUMBNAIL_MAX[1])
                    .to_rgba8()
            });
            AppEvent::Thumbnail { url, result }
        });
    }

    fn load_more(&mut self, ctx: &egui::Context, slot: usize) {
        let Some(selection) = self.selections[slot].as_ref().filter(|s| s.can_load_more()) else {
            return;
        };
        let (id, name, page) = (selection.id, selection.name.clone(), selection.page + 1);
        self.controls[slot].page_loading = true;
        let search = Arc::clone(&self.search);
        self.spawn(ctx, move || AppEvent::NextPage {
            slot,
            id,
            page,
            result: search.search(&name, page),
        });
    }

    fn picker_window(&mut self, ctx: &egui::Context) {
        let Some(slot) = self.picker else {
            return;
        };
        let Some(selection) = self.selections[slot].as_ref() else {
            self.picker = None;
            return;
        };

        let mut open = true;
        let mut chosen = None;
        let mut load_more = false;
        let mut wanted = Vec::new();
        let loading_page = self.controls[slot].page_loading;
        let thumb_size = egui::vec2(THUMBNAIL_MAX[0] as f32, THUMBNAIL_MAX[1] as f32);

        egui::Window::new(format!("{} images: {}", SLOT_LABELS[slot], selection.name))
            .id(egui::Id::new("image_picker"))
            .open(&mut open)
            .default_width(560.0)
            .show(ctx, |ui| {
                egui::ScrollArea::vertical().max_height(420.0).show(ui, |ui| {
                    ui.horizontal_wrapped(|ui| {
                        for (index, candidate) in selection.candidates.iter().enumerate() {
                            let current = index == selection.chosen;
                            let response = match self.thumbnails.get(&candidate.thumbnail_url) {
                                Some(Thumbnail::Ready(texture)) => ui.add(
                                    egui::ImageButton::new(egui::Image::new(egui::load::SizedTexture::new(
                                        texture.id(),
                                        texture.size_vec2(),
                                    )))
                                    .selected(current),
                                ),
                                Some(Thumbnail::Failed) => {
                                    ui.add_sized(thumb_size, egui::SelectableLabel::new(current, "No preview"))
                                }
                                Some(Thumbnail::Loading) => {
                                    ui.add_sized(thumb_size, egui::SelectableLabel::new(current, "Loading..."))
                                }
                                None => {
                                    wanted.push(candidate.thumbnail_url.clone());
                                    ui.add_sized(thumb_size, egui::SelectableLabel::new(current, "Loading..."))
                                }
                            };
                            if response.clicked() {
                                chosen = Some(index);
                            }
                        }
                    });
                });
                if selection.can_load_more() {
                    ui.separator();
                    let label = if loading_page { "Loading..." } else { "Load more" };
                    load_more = ui.add_enabled(!loading_page, egui::Button::new(label)).clicked();
                }
            });

        if !open {
            self.picker = None;
        }
        for url in wanted {
            self.request_thumbnail(ctx, url);
        }
        if let Some(index) = chosen {
            if self.selections[slot].as_mut().is_some_and(|s| s.choose(index)) {
                self.sync_slot(slot);
            }
        }
        if load_more {
            self.load_more(ctx, slot);
        }
    }

    fn notice_window(&mut self, ctx: &egui::Context) {
        let Some(message) = self.notice.as_deref() else {
            return;
        };
        let mut dismissed = false;
        egui::Window::new("Notice")
            .collapsible(false)
            .resizable(false)
            .anchor(egui::Align2::CENTER_CENTER, egui::Vec2::ZERO)
            .show(ctx, |ui| {
                ui.label(message);
                ui.vertical_centered(|ui| {
                    dismissed = ui.button("OK").clicked();
                });
            });
        if dismissed {
            self.notice = None;
        }
    }
}

impl eframe::App for ComposerApp {
    fn update(&mut self, ctx: &egui::Context, _frame: &mut eframe::Frame) {
        if self.loader.poll() {
            self.dirty = true;
        }
        self.drain_events(ctx);
        self.tick_searches(ctx);

        egui::TopBottomPanel::top("top_panel").show(ctx, |ui| {
            ui.horizontal(|ui| {
                ui.heading("Thumbnail Composer");
                ui.separator();
                if ui.button("Download").clicked() {
                    self.download();
                }
                let pending = self.loader.pending();
                if pending > 0 {
                    ui.spinner();
                    ui.label(format!("Loading {pending} image(s)"));
                }
            });
        });

        egui::SidePanel::left("slot_panel")
            .resizable(false)
            .default_width(260.0)
            .show(ctx, |ui| {
                for slot in 0..SLOT_COUNT {
                    self.slot_controls(ui, slot);
                    ui.separator();
                }
            });

        egui::CentralPanel::default().show(ctx, |ui| self.canvas(ui));

        self.picker_window(ctx);
        self.notice_window(ctx);
    }
}

fn color_image(image: &RgbaImage) -> egui::ColorImage {
    let size = [image.width() as _, image.height() as _];
    let pixels = image.as_flat_samples();
    egui::ColorImage::from_rgba_unmultiplied(size, pixels.as_slice())
}

/// Largest size with the canvas's aspect ratio that fits `available`, never
/// upscaled.
fn fit_size(canvas: egui::Vec2, available: egui::Vec2) -> egui::Vec2 {
    let scale = (available.x / canvas.x).min(available.y / canvas.y).clamp(0.0, 1.0);
    canvas * scale
}

/// Screen position to canvas pixels; `scale` is canvas pixels per point.
fn canvas_pos(pos: egui::Pos2, rect: egui::Rect, scale: f32) -> egui::Pos2 {
    ((pos - rect.min) * scale).to_pos2()
}

/// Where a primary press this frame landed on the canvas, if egui routed it
/// there rather than to a window above it.
fn canvas_press(response: &egui::Response, pressed: bool) -> Option<egui::Pos2> {
    if pressed && response.is_pointer_button_down_on() {
        response.interact_pointer_pos()
    } else {
        None
    }
}

fn file_name(path: &Path) -> Option<String> {
    path.file_name().map(|n| n.to_string_lossy().into_owned())
}

/// egui leaves `mime` empty on most native platforms, so fall back to the
/// file extension.
fn dropped_item(file: &egui::DroppedFile) -> DroppedItem {
    let name = if file.name.is_empty() {
        file.path.as_deref().and_then(file_name).unwrap_or_default()
    } else {
        file.name.clone()
    };
    let mime = if file.mime.is_empty() {
        file.path
            .as_deref()
            .and_then(source::mime_for_path)
            .or_else(|| source::mime_for_path(Path::new(&name)))
            .unwrap_or("application/octet-stream")
            .to_string()
    } else {
        file.mime.clone()
    };
    DroppedItem {
        name,
        mime,
        path: file.path.clone(),
        bytes: file.bytes.clone(),
    }
}

fn paste_payload(text: &str) -> DropPayload {
    let payload = DropPayload::default().with_data(drop::PLAIN_TEXT, text);
    if text.to_ascii_lowercase().contains("<img") {
        payload.with_data(drop::HTML, text)
    } else {
        payload
    }
}

#[cfg(test)]
mod tests {
    use std::path::PathBuf;

    use super::*;

    /// Runs one frame with a full-screen canvas, optionally covered by a
    /// fixed window, and returns where the canvas saw a press.
    fn canvas_frame(ctx: &egui::Context, events: Vec<egui::Event>, with_window: bool) -> Option<egui::Pos2> {
        let input = egui::RawInput {
            screen_rect: Some(egui::Rect::from_min_size(egui::Pos2::ZERO, egui::vec2(800.0, 600.0))),
            events,
            ..Default::default()
        };
        let mut press = None;
        let _ = ctx.run(input, |ctx| {
            egui::CentralPanel::default().show(ctx, |ui| {
                let (_, response) = ui.allocate_exact_size(ui.available_size(), egui::Sense::click_and_drag());
                let pressed = ui.input(|i| i.pointer.primary_pressed());
                press = canvas_press(&response, pressed);
            });
            if with_window {
                egui::Window::new("Images")
                    .fixed_pos([100.0, 100.0])
                    .show(ctx, |ui| {
                        ui.label("thumbnails");
                        ui.allocate_space(egui::vec2(300.0, 300.0));
                    });
            }
        });
        press
    }

    fn primary_press(pos: egui::Pos2) -> Vec<egui::Event> {
        vec![
            egui::Event::PointerMoved(pos),
            egui::Event::PointerButton {
                pos,
                button: egui::PointerButton::Primary,
                pressed: true,
                modifiers: egui::Modifiers::NONE,
            },
        ]
    }

    fn press_canvas(with_window: bool, pos: egui::Pos2) -> Option<egui::Pos2> {
        let ctx = egui::Context::default();
        for _ in 0..3 {
            canvas_frame(&ctx, Vec::new(), with_window);
        }
        canvas_frame(&ctx, primary_press(pos), with_window)
    }

    #[test]
    fn press_on_bare_canvas_starts_at_pointer() {
        let pos = egui::pos2(200.0, 250.0);
        assert_eq!(press_canvas(false, pos), Some(pos));
    }

    #[test]
    fn press_on_a_window_over_the_canvas_is_not_a_canvas_press() {
        assert_eq!(press_canvas(true, egui::pos2(200.0, 250.0)), None);
        // Outside the window the canvas still gets the press.
        let beside = egui::pos2(700.0, 550.0);
        assert_eq!(press_canvas(true, beside), Some(beside));
    }

    #[test]
    fn canvas_press_needs_the_button_to_go_down() {
        let ctx = egui::Context::default();
        for _ in 0..3 {
            canvas_frame(&ctx, Vec::new(), false);
        }
        assert_eq!(canvas_frame(&ctx, vec![egui::Event::PointerMoved(egui::pos2(50.0, 50.0))], false), None);
    }

    #[test]
    fn canvas_fits_without_upscaling() {
        let canvas = egui::vec2(1920.0, 1080.0);
        assert_eq!(fit_size(canvas, egui::vec2(960.0, 1000.0)), egui::vec2(960.0, 540.0));
        assert_eq!(fit_size(canvas, egui::vec2(4000.0, 4000.0)), canvas);
    }

    #[test]
    fn screen_positions_map_to_canvas_pixels() {
        let rect = egui::Rect::from_min_size(egui::pos2(100.0, 50.0), egui::vec2(960.0, 540.0));
        assert_eq!(canvas_pos(egui::pos2(580.0, 320.0), rect, 2.0), egui::pos2(960.0, 540.0));
    }

    #[test]
    fn dropped_file_without_mime_uses_extension() {
        let file = egui::DroppedFile {
            path: Some(PathBuf::from("/tmp/cover.JPG")),
            ..Default::default()
        };
        let item = dropped_item(&file);
        assert_eq!(item.name, "cover.JPG");
        assert_eq!(item.mime, "image/jpeg");
        assert!(item.is_image());

        let text = dropped_item(&egui::DroppedFile {
            path: Some(PathBuf::from("/tmp/notes.txt")),
            ..Default::default()
        });
        assert!(!text.is_image());
    }

    #[test]
    fn pasted_markup_is_offered_as_html() {
        let html = paste_payload(r#"<IMG src="https://a.com/b.png">"#);
        assert!(html.get(drop::HTML).is_some());
        let url = paste_payload("https://a.com/b.png");
        assert!(url.get(drop::HTML).is_none());
        assert_eq!(url.get(drop::PLAIN_TEXT), Some("https://a.com/b.png"));
    }
}
