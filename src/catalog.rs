//! Remote game catalog: the Steam app list, per-game details and the
//! candidate images derived from them.
//!
//! Both caches only ever grow. A failed app list download is remembered as an
//! empty list and a failed details lookup as "no details", so neither is
//! retried for the rest of the session.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, PoisonError};
use std::thread;
use std::time::Duration;

use anyhow::{Context, Result, bail};
use once_cell::sync::OnceCell;
use reqwest::blocking::Client;
use serde::{Deserialize, Serialize};

use crate::config::Settings;
use crate::logging::short_url;
use crate::search::ImageSearch;
use crate::selection::{Candidate, Selection};

const NO_IMAGE_THUMB: &str = "https://via.placeholder.com/150/CCCCCC/FFFFFF?Text=No+Image";
const NO_IMAGE_FULL: &str = "https://via.placeholder.com/600x400/CCCCCC/FFFFFF?Text=No+Image+Found";

/// Fetches a text document over HTTP.
pub trait HttpGet: Send + Sync {
    fn get_text(&self, url: &str) -> Result<String>;
}

pub struct HttpClient {
    client: Client,
}

impl HttpClient {
    pub fn new(timeout: Duration) -> Result<Self> {
        let client = Client::builder()
            .user_agent(concat!("thumbnail-composer/", env!("CARGO_PKG_VERSION")))
            .timeout(timeout)
            .build()?;
        Ok(Self { client })
    }
}

impl HttpGet for HttpClient {
    fn get_text(&self, url: &str) -> Result<String> {
        let response = self
            .client
            .get(url)
            .send()
            .with_context(|| format!("requesting {}", short_url(url)))?;
        let status = response.status();
        let body = response.text().unwrap_or_default();
        if !status.is_success() {
            let excerpt: String = body.chars().take(300).collect();
            bail!("{} returned {status}: {excerpt}", short_url(url));
        }
        if body.is_empty() {
            bail!("empty response body from {}", short_url(url));
        }
        Ok(body)
    }
}

/// One searchable game.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct AppSummary {
    pub app_id: u32,
    pub name: String,
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Deserialize)]
pub struct Screenshot {
    pub id: u64,
    pub path_thumbnail: String,
    pub path_full: String,
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct AppDetails {
    pub name: Option<String>,
    pub header_image: Option<String>,
    pub screenshots: Vec<Screenshot>,
}

#[derive(Deserialize)]
struct AppListResponse {
    applist: AppList,
}

#[derive(Deserialize)]
struct AppList {
    apps: Vec<RawApp>,
}

#[derive(Deserialize)]
struct RawApp {
    appid: u32,
    #[serde(default)]
    name: String,
}

#[derive(Deserialize)]
struct DetailsEntry {
    #[serde(default)]
    success: bool,
    data: Option<AppDetails>,
}

pub struct SteamCatalog {
    http: Arc<dyn HttpGet>,
    settings: Settings,
    apps: Mutex<Option<Arc<Vec<AppSummary>>>>,
    /// One cell per app id. Callers asking for an id whose fetch is still
    /// running wait on its cell instead of starting another request.
    details: Mutex<HashMap<u32, Arc<OnceCell<Option<AppDetails>>>>>,
}

impl SteamCatalog {
    pub fn new(http: Arc<dyn HttpGet>, settings: Settings) -> Self {
        Self {
            http,
            settings,
            apps: Mutex::new(None),
            details: Mutex::new(HashMap::new()),
        }
    }

    /// The full app list, downloaded on first use. Concurrent callers wait for
    /// the same download.
    pub fn apps(&self) -> Arc<Vec<AppSummary>> {
        let mut cached = self.apps.lock().unwrap_or_else(PoisonError::into_inner);
        if let Some(apps) = cached.as_ref() {
            return Arc::clone(apps);
        }
        let apps = match self.fetch_app_list() {
            Ok(apps) => {
                tracing::info!("fetched {} games", apps.len());
                apps
            }
            Err(err) => {
                tracing::error!("giving up on the game list: {err:#}; caching an empty list");
                Vec::new()
            }
        };
        let apps = Arc::new(apps);
        *cached = Some(Arc::clone(&apps));
        apps
    }

    fn fetch_app_list(&self) -> Result<Vec<AppSummary>> {
        let url = self.settings.proxied_app_list_url();
        let attempts = self.settings.max_retries + 1;
        let mut attempt = 1;
        loop {
            tracing::info!("fetching game list (attempt {attempt}/{attempts})");
            match self.http.get_text(&url).and_then(|body| parse_app_list(&body)) {
                Ok(apps) => return Ok(apps),
                Err(err) if attempt < attempts => {
                    tracing::warn!("game list attempt {attempt} failed: {err:#}");
                    thread::sleep(self.retry_delay());
                    attempt += 1;
                }
                Err(err) => return Err(err),
            }
        }
    }

    /// Pause between game list attempts; the same before every retry.
    fn retry_delay(&self) -> Duration {
        Duration::from_millis(self.settings.retry_delay_ms)
    }

    /// Games whose name contains `query`, ignoring case.
    pub fn search(&self, query: &str) -> Vec<AppSummary> {
        let query = query.trim().to_lowercase();
        if query.is_empty() {
            return Vec::new();
        }
        self.apps()
            .iter()
            .filter(|app| app.name.to_lowercase().contains(&query))
            .take(self.settings.search_limit)
            .cloned()
            .collect()
    }

    /// Store details for `app_id`, or `None` if the lookup failed. Both
    /// outcomes are cached.
    pub fn details(&self, app_id: u32) -> Option<AppDetails> {
        let cell = Arc::clone(
            self.details
                .lock()
                .unwrap_or_else(PoisonError::into_inner)
                .entry(app_id)
                .or_default(),
        );
        cell.get_or_init(|| self.fetch_details(app_id)).clone()
    }

    fn fetch_details(&self, app_id: u32) -> Option<AppDetails> {
        let url = self.settings.details_url(app_id);
        tracing::debug!("fetching details for app {app_id} from {}", short_url(&url));
        match self
            .http
            .get_text(&url)
            .and_then(|body| parse_details(&body, app_id))
        {
            Ok(Some(details)) => {
                tracing::info!(
                    "fetched details for {}",
                    details.name.as_deref().unwrap_or("unnamed app")
                );
                Some(details)
            }
            Ok(None) => {
                tracing::warn!("no details available for app {app_id}");
                None
            }
            Err(err) => {
                tracing::error!("failed to fetch details for app {app_id}: {err:#}");
                None
            }
        }
    }

    /// The record installed as soon as a game is picked, before its
    /// candidates are known.
    pub fn selection_for(&self, app: &AppSummary) -> Selection {
        Selection::remote(app.app_id, app.name.clone(), self.settings.header_image_url(app.app_id))
    }

    /// Candidate images for page `page` of a game. Page 1 starts with the
    /// header image and the store screenshots; web search tops it up when the
    /// list is short. Later pages come from web search only.
    pub fn candidates(
        &self,
        details: Option<&AppDetails>,
        header_url: &str,
        name: &str,
        page: u32,
        search: &dyn ImageSearch,
    ) -> Vec<Candidate> {
        let mut list = CandidateList::default();

        if page == 1 {
            if !header_url.is_empty() {
                list.push(Candidate::single("0", header_url));
            }
            for shot in details.map(|d| d.screenshots.as_slice()).unwrap_or_default() {
                let full = if shot.path_full.starts_with("http://") || shot.path_full.starts_with("https://") {
                    shot.path_full.clone()
                } else {
                    tracing::warn!("screenshot path for {name} is not absolute; routing through proxy");
                    format!("{}{}", self.settings.cors_proxy, shot.path_full)
                };
                list.push(Candidate::new(shot.id.to_string(), shot.path_thumbnail.clone(), full));
            }
        }

        let wants_web = !name.is_empty() && (page > 1 || list.len() <= self.settings.web_fallback_threshold);
        if wants_web {
            tracing::debug!("querying web images for '{name}' page {page}");
            match search.search(name, page) {
                Ok(found) => found.into_iter().for_each(|c| list.push(c)),
                Err(err) => tracing::error!("web image search failed: {err:#}"),
            }
        }

        if page == 1 && list.is_empty() {
            list.push(Candidate::new("-1", NO_IMAGE_THUMB, NO_IMAGE_FULL));
        }
        list.into_inner()
    }

    /// Details lookup plus page-1 candidates for a freshly picked game.
    pub fn first_page(&self, selection: &Selection, search: &dyn ImageSearch) -> Vec<Candidate> {
        let details = u32::try_from(selection.id).ok().and_then(|id| self.details(id));
        self.candidates(details.as_ref(), &selection.header_url, &selection.name, 1, search)
    }
}

/// Candidates unique by full URL, in insertion order.
#[derive(Default)]
struct CandidateList {
    items: Vec<Candidate>,
}

impl CandidateList {
    fn push(&mut self, candidate: Candidate) {
        if !self.items.iter().any(|c| c.full_url == candidate.full_url) {
            self.items.push(candidate);
        }
    }

    fn len(&self) -> usize {
        self.items.len()
    }

    fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    fn into_inner(self) -> Vec<Candidate> {
        self.items
    }
}

fn parse_app_list(body: &str) -> Result<Vec<AppSummary>> {
    let response: AppListResponse = serde_json::from_str(body).context("unexpected game list structure")?;
    Ok(response
        .applist
        .apps
        .into_iter()
        .filter(|app| !app.name.trim().is_empty())
        .map(|app| AppSummary {
            app_id: app.appid,
            name: app.name,
        })
        .collect())
}

fn parse_details(body: &str, app_id: u32) -> Result<Option<AppDetails>> {
    let mut response: HashMap<String, DetailsEntry> =
        serde_json::from_str(body).context("unexpected app details structure")?;
    Ok(response
        .remove(&app_id.to_string())
        .filter(|entry| entry.success)
        .and_then(|entry| entry.data))
}
