//! Works out which image a drag-and-drop (or paste) carries.
//!
//! A drop may offer several representations at once. They are tried in a
//! fixed order and the first one that yields something wins: an attached
//! file, a URI list, a legacy single URL, plain text and finally an HTML
//! fragment with an `<img>` tag.

use std::path::PathBuf;
use std::sync::Arc;

use once_cell::sync::Lazy;
use regex::Regex;

use crate::error::{DropError, LoadError};
use crate::logging::short_url;
use crate::selection::{DEFAULT_WEB_NAME, Selection};
use crate::source;

pub const URI_LIST: &str = "text/uri-list";
pub const LEGACY_URL: &str = "URL";
pub const PLAIN_TEXT: &str = "text/plain";
pub const HTML: &str = "text/html";

static IMAGE_EXTENSION: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)\.(?:jpg|jpeg|png|gif|webp|svg)(?:\?.*)?$").expect("valid extension regex")
});
static IMG_TAG: Lazy<Regex> = Lazy::new(|| Regex::new(r"(?is)<img\b[^>]*>").expect("valid img regex"));
static ATTRIBUTE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r#"(?is)\b([a-z-]+)\s*=\s*(?:"([^"]*)"|'([^']*)'|([^\s"'>]+))"#).expect("valid attribute regex")
});

/// A file attached to a drop.
#[derive(Clone, Debug, PartialEq)]
pub struct DroppedItem {
    pub name: String,
    pub mime: String,
    pub path: Option<PathBuf>,
    pub bytes: Option<Arc<[u8]>>,
}

impl DroppedItem {
    pub fn is_image(&self) -> bool {
        self.mime.starts_with("image/")
    }
}

/// Everything a drop offered: attached files and textual representations
/// keyed by MIME type.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct DropPayload {
    pub files: Vec<DroppedItem>,
    pub data: Vec<(String, String)>,
}

impl DropPayload {
    pub fn with_file(mut self, file: DroppedItem) -> Self {
        self.files.push(file);
        self
    }

    pub fn with_data(mut self, mime: impl Into<String>, value: impl Into<String>) -> Self {
        self.data.push((mime.into(), value.into()));
        self
    }

    /// The first non-empty representation of type `mime`.
    pub fn get(&self, mime: &str) -> Option<&str> {
        self.data
            .iter()
            .find(|(kind, value)| kind.eq_ignore_ascii_case(mime) && !value.is_empty())
            .map(|(_, value)| value.as_str())
    }

    pub fn is_empty(&self) -> bool {
        self.files.is_empty() && self.data.is_empty()
    }
}

/// What a drop resolved to.
#[derive(Clone, Debug, PartialEq)]
pub enum Resolved {
    File(DroppedItem),
    Url { url: String, name: String },
}

/// Resolves a drop. `Ok(None)` means nothing usable was offered and the drop
/// is ignored; an error carries the message for the user.
pub fn resolve(payload: &DropPayload) -> Result<Option<Resolved>, DropError> {
    if let Some(file) = payload.files.first() {
        if file.is_image() {
            tracing::debug!("drop resolved to file '{}' ({})", file.name, file.mime);
            return Ok(Some(Resolved::File(file.clone())));
        }
        tracing::warn!("dropped file '{}' is not an image ({})", file.name, file.mime);
        return Err(DropError::NotAnImage {
            name: file.name.clone(),
            mime: file.mime.clone(),
        });
    }

    let found = from_uri_list(payload)
        .map(|url| (url, DEFAULT_WEB_NAME.to_string()))
        .or_else(|| from_legacy_url(payload).map(|url| (url, DEFAULT_WEB_NAME.to_string())))
        .or_else(|| from_plain_text(payload).map(|url| (url, DEFAULT_WEB_NAME.to_string())))
        .or_else(|| from_html(payload));

    let Some((url, name)) = found else {
        tracing::debug!("drop carried no file or image URL");
        return Ok(None);
    };
    if !has_usable_scheme(&url) {
        tracing::warn!("dropped URL is not usable: {}", short_url(&url));
        return Err(DropError::UnusableUrl(url));
    }
    tracing::debug!("drop resolved to URL {} ('{name}')", short_url(&url));
    Ok(Some(Resolved::Url { url, name }))
}

/// The selection a drop onto `slot` installs. `Ok(None)` and errors both
/// leave the slot as it was; the error text is meant for the user.
pub fn selection_for(slot: usize, payload: &DropPayload) -> Result<Option<Selection>, DropError> {
    match resolve(payload)? {
        None => Ok(None),
        Some(Resolved::File(item)) => {
            let data_uri = embed(&item).map_err(|err| {
                tracing::error!("slot {slot}: dropped file '{}' unreadable: {err}", item.name);
                DropError::Unreadable(err.to_string())
            })?;
            Ok(Some(Selection::local_upload(slot, Some(&item.name), data_uri)))
        }
        Some(Resolved::Url { url, name }) => Ok(Some(Selection::dropped_url(slot, url, Some(&name)))),
    }
}

/// Embeds a dropped file as a data URI, reading it from disk when the
/// platform only handed over a path.
pub fn embed(item: &DroppedItem) -> Result<String, LoadError> {
    match (&item.bytes, &item.path) {
        (Some(bytes), _) => {
            source::encode_data_uri(bytes).ok_or_else(|| LoadError::Unrecognized(PathBuf::from(&item.name)))
        }
        (None, Some(path)) => source::read_file_as_data_uri(path),
        (None, None) => Err(LoadError::Unrecognized(PathBuf::from(&item.name))),
    }
}

/// First line of a `text/uri-list`.
pub fn from_uri_list(payload: &DropPayload) -> Option<String> {
    let first = payload.get(URI_LIST)?.lines().next()?.trim();
    (!first.is_empty()).then(|| first.to_string())
}

pub fn from_legacy_url(payload: &DropPayload) -> Option<String> {
    let url = payload.get(LEGACY_URL)?.trim();
    (!url.is_empty()).then(|| url.to_string())
}

/// Plain text that looks like an image address.
pub fn from_plain_text(payload: &DropPayload) -> Option<String> {
    let text = payload.get(PLAIN_TEXT)?.trim();
    looks_like_image_url(text).then(|| text.to_string())
}

/// An http(s) or image data URL that either ends in a known image extension,
/// is a data URI, or has no dot at all.
pub fn looks_like_image_url(text: &str) -> bool {
    let is_data = text.starts_with("data:image/");
    if !(text.starts_with("http://") || text.starts_with("https://") || is_data) {
        return false;
    }
    IMAGE_EXTENSION.is_match(text) || is_data || !text.contains('.')
}

/// Source and best-effort name of the first `<img>` in an HTML fragment.
pub fn from_html(payload: &DropPayload) -> Option<(String, String)> {
    let html = payload.get(HTML)?;
    let tag = IMG_TAG.find(html)?.as_str();

    let mut src = None;
    let mut alt = None;
    for caps in ATTRIBUTE.captures_iter(tag) {
        let value = caps
            .get(2)
            .or_else(|| caps.get(3))
            .or_else(|| caps.get(4))
            .map(|m| decode_entities(m.as_str()));
        match caps[1].to_ascii_lowercase().as_str() {
            "src" if src.is_none() => src = value,
            "alt" if alt.is_none() => alt = value,
            _ => {}
        }
    }

    let src = src.map(|s| s.trim().to_string()).filter(|s| !s.is_empty())?;
    let name = alt
        .map(|a| a.trim().to_string())
        .filter(|a| !a.is_empty())
        .or_else(|| url_file_name(&src))
        .unwrap_or_else(|| DEFAULT_WEB_NAME.to_string());
    Some((src, name))
}

/// Decoded last path segment of a URL, if it has one.
pub fn url_file_name(url: &str) -> Option<String> {
    let parsed = url::Url::parse(url).ok()?;
    let segment = parsed.path_segments()?.next_back()?;
    let decoded = urlencoding::decode(segment).map(|s| s.into_owned()).unwrap_or_else(|_| segment.to_string());
    (!decoded.is_empty()).then_some(decoded)
}

fn decode_entities(value: &str) -> String {
    value
        .replace("&quot;", "\"")
        .replace("&#39;", "'")
        .replace("&lt;", "<")
        .replace("&gt;", ">")
        .replace("&amp;", "&")
}

/// Only web and embedded image sources can be loaded.
pub fn has_usable_scheme(url: &str) -> bool {
    url.starts_with("http:") || url.starts_with("https:") || url.starts_with("data:image/")
}
