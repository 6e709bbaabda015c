use std::path::{Path, PathBuf};

use anyhow::Context;
use serde::{Deserialize, Serialize};

pub const DEFAULT_SETTINGS_PATH: &str = "settings.json";

/// User settings, stored as pretty-printed JSON. Missing fields fall back to
/// their defaults so older files keep loading.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    pub canvas_width: u32,
    pub canvas_height: u32,
    pub min_zoom: f32,
    pub max_zoom: f32,
    /// Zoom change per wheel point.
    pub zoom_sensitivity: f32,
    pub cors_proxy: String,
    pub app_list_url: String,
    /// `{proxy}` and `{id}` are substituted.
    pub header_image_template: String,
    /// `{proxy}` and `{id}` are substituted.
    pub details_template: String,
    pub max_retries: u32,
    pub retry_delay_ms: u64,
    pub request_timeout_secs: u64,
    pub search_limit: usize,
    /// A first page with this many candidates or fewer also queries web search.
    pub web_fallback_threshold: usize,
    pub mock_search_delay_ms: u64,
    /// TTF/OTF used for slot captions. The bundled UI font is used when unset.
    pub font_path: Option<PathBuf>,
    pub export_file_name: String,
    /// When enabled the logger starts at debug level.
    pub debug_logging: bool,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            canvas_width: 1920,
            canvas_height: 1080,
            min_zoom: 0.2,
            max_zoom: 5.0,
            zoom_sensitivity: 0.001,
            cors_proxy: "https://proxy.cors.sh/".into(),
            app_list_url: "https://api.steampowered.com/ISteamApps/GetAppList/v2/".into(),
            header_image_template: "{proxy}https://shared.cloudflare.steamstatic.com/store_item_assets/steam/apps/{id}/library_600x900_2x.jpg".into(),
            details_template: "{proxy}https://store.steampowered.com/api/appdetails?appids={id}".into(),
            max_retries: 2,
            retry_delay_ms: 1500,
            request_timeout_secs: 30,
            search_limit: 20,
            web_fallback_threshold: 1,
            mock_search_delay_ms: 800,
            font_path: None,
            export_file_name: "youtube_thumbnail.png".into(),
            debug_logging: false,
        }
    }
}

impl Settings {
    pub fn load(path: impl AsRef<Path>) -> anyhow::Result<Self> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path).unwrap_or_default();
        if content.trim().is_empty() {
            return Ok(Self::default());
        }
        let settings: Self = serde_json::from_str(&content)
            .with_context(|| format!("parsing settings file {}", path.display()))?;
        Ok(settings.sanitized())
    }

    pub fn save(&self, path: impl AsRef<Path>) -> anyhow::Result<()> {
        let json = serde_json::to_string_pretty(self)?;
        std::fs::write(path.as_ref(), json)
            .with_context(|| format!("writing settings file {}", path.as_ref().display()))?;
        Ok(())
    }

    pub fn header_image_url(&self, app_id: u32) -> String {
        self.expand(&self.header_image_template, app_id)
    }

    pub fn details_url(&self, app_id: u32) -> String {
        self.expand(&self.details_template, app_id)
    }

    /// The app list is fetched through the proxy as well.
    pub fn proxied_app_list_url(&self) -> String {
        format!("{}{}", self.cors_proxy, self.app_list_url)
    }

    fn expand(&self, template: &str, app_id: u32) -> String {
        template
            .replace("{proxy}", &self.cors_proxy)
            .replace("{id}", &app_id.to_string())
    }

    /// Keeps zoom bounds and canvas size usable even if the file says otherwise.
    fn sanitized(mut self) -> Self {
        let defaults = Self::default();
        if self.canvas_width == 0 || self.canvas_height == 0 {
            tracing::warn!(
                "canvas size {}x{} is invalid; using {}x{}",
                self.canvas_width,
                self.canvas_height,
                defaults.canvas_width,
                defaults.canvas_height
            );
            self.canvas_width = defaults.canvas_width;
            self.canvas_height = defaults.canvas_height;
        }
        if !(self.min_zoom > 0.0 && self.min_zoom <= self.max_zoom) {
            tracing::warn!(
                "zoom bounds [{}, {}] are invalid; using defaults",
                self.min_zoom,
                self.max_zoom
            );
            self.min_zoom = defaults.min_zoom;
            self.max_zoom = defaults.max_zoom;
        }
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_file_yields_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let settings = Settings::load(dir.path().join("nope.json")).unwrap();
        assert_eq!(settings, Settings::default());
    }

    #[test]
    fn partial_file_keeps_other_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("settings.json");
        std::fs::write(&path, r#"{ "max_zoom": 8.0, "debug_logging": true }"#).unwrap();
        let settings = Settings::load(&path).unwrap();
        assert_eq!(settings.max_zoom, 8.0);
        assert!(settings.debug_logging);
        assert_eq!(settings.canvas_width, 1920);
        assert_eq!(settings.min_zoom, 0.2);
    }

    #[test]
    fn save_then_load_preserves_values() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("settings.json");
        let settings = Settings {
            search_limit: 5,
            font_path: Some(PathBuf::from("/fonts/Arial.ttf")),
            ..Settings::default()
        };
        settings.save(&path).unwrap();
        assert_eq!(Settings::load(&path).unwrap(), settings);
    }

    #[test]
    fn inverted_zoom_bounds_are_replaced() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("settings.json");
        std::fs::write(&path, r#"{ "min_zoom": 3.0, "max_zoom": 1.0 }"#).unwrap();
        let settings = Settings::load(&path).unwrap();
        assert_eq!((settings.min_zoom, settings.max_zoom), (0.2, 5.0));
    }

    #[test]
    fn templates_expand_proxy_and_id() {
        let settings = Settings::default();
        assert_eq!(
            settings.details_url(730),
            "https://proxy.cors.sh/https://store.steampowered.com/api/appdetails?appids=730"
        );
        assert!(settings.header_image_url(42).contains("/apps/42/library_600x900_2x.jpg"));
    }
}
