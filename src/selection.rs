use std::time::{SystemTime, UNIX_EPOCH};

use serde::{Deserialize, Serialize};

/// Display names longer than this are shortened to fit the slot caption.
const MAX_NAME_CHARS: usize = 30;
const TRUNCATED_NAME_CHARS: usize = 27;

pub const DEFAULT_UPLOAD_NAME: &str = "Custom Image";
pub const DEFAULT_WEB_NAME: &str = "Web Image";

/// Where a selection came from. Local selections have a negative identifier.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SourceKind {
    Remote,
    Local,
}

/// One selectable image for a slot.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Candidate {
    pub id: String,
    pub thumbnail_url: String,
    pub full_url: String,
}

impl Candidate {
    pub fn new(id: impl Into<String>, thumbnail_url: impl Into<String>, full_url: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            thumbnail_url: thumbnail_url.into(),
            full_url: full_url.into(),
        }
    }

    /// A candidate whose thumbnail and full image are the same URL.
    pub fn single(id: impl Into<String>, url: impl Into<String>) -> Self {
        let url = url.into();
        Self::new(id, url.clone(), url)
    }
}

/// What a slot should show, as decided by the game search, uploads and drops.
#[derive(Clone, Debug, PartialEq)]
pub struct Selection {
    pub id: i64,
    pub name: String,
    /// Shown while candidates are still being looked up, and for local images.
    pub header_url: String,
    pub candidates: Vec<Candidate>,
    pub chosen: usize,
    pub source: SourceKind,
    pub more_available: bool,
    pub page: u32,
}

impl Selection {
    /// A freshly picked game whose candidates have not arrived yet.
    pub fn remote(app_id: u32, name: impl Into<String>, header_url: impl Into<String>) -> Self {
        Self {
            id: i64::from(app_id),
            name: name.into(),
            header_url: header_url.into(),
            candidates: Vec::new(),
            chosen: 0,
            source: SourceKind::Remote,
            more_available: true,
            page: 1,
        }
    }

    /// An uploaded or dropped file, already embedded as a data URI.
    pub fn local_upload(slot: usize, name: Option<&str>, data_url: impl Into<String>) -> Self {
        let stamp = unix_millis();
        Self::local(
            -stamp,
            format!("custom_{slot}_{stamp}"),
            name.filter(|n| !n.trim().is_empty()).unwrap_or(DEFAULT_UPLOAD_NAME),
            data_url.into(),
        )
    }

    /// An image URL dropped or pasted onto a slot.
    pub fn dropped_url(slot: usize, url: impl Into<String>, name: Option<&str>) -> Self {
        let stamp = unix_millis();
        Self::local(
            -stamp - slot as i64,
            format!("web_{slot}_{stamp}"),
            name.filter(|n| !n.trim().is_empty()).unwrap_or(DEFAULT_WEB_NAME),
            url.into(),
        )
    }

    fn local(id: i64, candidate_id: String, name: &str, url: String) -> Self {
        Self {
            id,
            name: truncate_name(name),
            header_url: url.clone(),
            candidates: vec![Candidate::single(candidate_id, url)],
            chosen: 0,
            source: SourceKind::Local,
            more_available: false,
            page: 1,
        }
    }

    /// The URL the canvas should display, if any.
    pub fn desired_url(&self) -> Option<&str> {
        let url = match self.source {
            SourceKind::Local => self.header_url.as_str(),
            SourceKind::Remote => self
                .current_candidate()
                .map_or(self.header_url.as_str(), |c| c.full_url.as_str()),
        };
        (!url.is_empty()).then_some(url)
    }

    pub fn current_candidate(&self) -> Option<&Candidate> {
        self.candidates.get(self.chosen)
    }

    /// Switches to candidate `index`. Out-of-range requests change nothing.
    pub fn choose(&mut self, index: usize) -> bool {
        if index >= self.candidates.len() {
            tracing::debug!(
                "ignoring candidate {index} for '{}': only {} available",
                self.name,
                self.candidates.len()
            );
            return false;
        }
        self.chosen = index;
        true
    }

    /// Installs the first page of candidates once the lookup finishes.
    pub fn set_candidates(&mut self, candidates: Vec<Candidate>) {
        self.candidates = if candidates.is_empty() {
            vec![Candidate::single(format!("header_{}", self.id), self.header_url.clone())]
        } else {
            candidates
        };
        self.chosen = 0;
        self.page = 1;
        self.more_available = true;
    }

    /// Whether the picker may ask for another page.
    pub fn can_load_more(&self) -> bool {
        self.source == SourceKind::Remote && self.more_available
    }

    /// Appends a fetched page. Only candidates with an unseen full URL are kept;
    /// a page without any marks the list as exhausted. Returns how many were added.
    pub fn merge_page(&mut self, page: u32, fetched: Vec<Candidate>) -> usize {
        let mut added = 0;
        for candidate in fetched {
            if self.candidates.iter().any(|c| c.full_url == candidate.full_url) {
                continue;
            }
            self.candidates.push(candidate);
            added += 1;
        }
        self.page = page;
        self.more_available = added > 0;
        added
    }

    /// A page request failed; stop offering more.
    pub fn mark_exhausted(&mut self) {
        self.more_available = false;
    }
}

/// Shortens names longer than 30 characters to 27 plus an ellipsis.
pub fn truncate_name(name: &str) -> String {
    if name.chars().count() > MAX_NAME_CHARS {
        let head: String = name.chars().take(TRUNCATED_NAME_CHARS).collect();
        format!("{head}...")
    } else {
        name.to_string()
    }
}

fn unix_millis() -> i64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis() as i64)
        .unwrap_or(1)
        .max(1)
}
