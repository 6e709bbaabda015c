use std::path::PathBuf;

use thiserror::Error;

/// Why a slot's desired URL could not be turned into a decoded image.
#[derive(Debug, Error)]
pub enum LoadError {
    #[error("malformed data URI: {0}")]
    InvalidDataUri(String),
    #[error("request for {url} failed: {reason}")]
    Fetch { url: String, reason: String },
    #[error("image decode failed: {0}")]
    Decode(#[from] image::ImageError),
    #[error("{} is not a recognised image", .0.display())]
    Unrecognized(PathBuf),
    #[error("could not read {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

/// A drop that carried nothing usable. The message is shown to the user.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DropError {
    #[error("Please drop an image file (e.g., PNG, JPG, GIF). \"{name}\" is {mime}.")]
    NotAnImage { name: String, mime: String },
    #[error(
        "Could not get a valid image URL from the dropped item. The URL must start with http, https, or be a data URL."
    )]
    UnusableUrl(String),
    #[error("Could not read the dropped file. {0}")]
    Unreadable(String),
}

#[derive(Debug, Error)]
pub enum ExportError {
    #[error("failed to write {}: {source}", path.display())]
    Write {
        path: PathBuf,
        #[source]
        source: image::ImageError,
    },
}
