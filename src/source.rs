//! Turns an image URL into decoded pixels.

use std::path::Path;
use std::time::Duration;

use base64::{Engine as _, engine::general_purpose::STANDARD};
use image::{ImageFormat, RgbaImage};
use reqwest::blocking::Client;

use crate::error::LoadError;

/// How a URL is materialized. Embedded data never touches the network, so
/// only network sources go through the cross-origin-capable client.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum FetchMode {
    Embedded,
    Network,
}

impl FetchMode {
    pub fn for_url(url: &str) -> Self {
        if url.starts_with("data:") {
            FetchMode::Embedded
        } else {
            FetchMode::Network
        }
    }
}

/// Retrieves the raw bytes behind a network URL.
pub trait Fetch: Send + Sync + 'static {
    fn fetch(&self, url: &str) -> Result<Vec<u8>, LoadError>;
}

pub struct HttpFetcher {
    client: Client,
}

impl HttpFetcher {
    pub fn new(timeout: Duration) -> Result<Self, reqwest::Error> {
        let client = Client::builder()
            .user_agent(concat!("thumbnail-composer/", env!("CARGO_PKG_VERSION")))
            .timeout(timeout)
            .build()?;
        Ok(Self { client })
    }
}

impl Fetch for HttpFetcher {
    fn fetch(&self, url: &str) -> Result<Vec<u8>, LoadError> {
        let fail = |reason: String| LoadError::Fetch {
            url: url.to_string(),
            reason,
        };
        let response = self
            .client
            .get(url)
            .send()
            .and_then(|r| r.error_for_status())
            .map_err(|e| fail(e.to_string()))?;
        let bytes = response.bytes().map_err(|e| fail(e.to_string()))?;
        Ok(bytes.to_vec())
    }
}

/// Fetches (or unpacks) `url` and decodes it to RGBA.
pub fn load_image(url: &str, fetcher: &dyn Fetch) -> Result<RgbaImage, LoadError> {
    let bytes = match FetchMode::for_url(url) {
        FetchMode::Embedded => decode_data_uri(url)?.1,
        FetchMode::Network => fetcher.fetch(url)?,
    };
    Ok(image::load_from_memory(&bytes)?.to_rgba8())
}

/// Splits a `data:` URI into its media type and payload.
pub fn decode_data_uri(uri: &str) -> Result<(String, Vec<u8>), LoadError> {
    let invalid = || LoadError::InvalidDataUri(crate::logging::short_url(uri).to_string());
    let rest = uri.strip_prefix("data:").ok_or_else(invalid)?;
    let (header, payload) = rest.split_once(',').ok_or_else(invalid)?;

    let mut params = header.split(';');
    let mime = params.next().filter(|m| !m.is_empty()).unwrap_or("text/plain");
    let is_base64 = params.any(|p| p.eq_ignore_ascii_case("base64"));

    let data = if is_base64 {
        let compact: String = payload.chars().filter(|c| !c.is_ascii_whitespace()).collect();
        STANDARD.decode(compact).map_err(|_| invalid())?
    } else {
        urlencoding::decode_binary(payload.as_bytes()).into_owned()
    };
    Ok((mime.to_string(), data))
}

/// Embeds image bytes as a base64 data URI, or `None` if the bytes are not a
/// recognisable image.
pub fn encode_data_uri(bytes: &[u8]) -> Option<String> {
    let format = image::guess_format(bytes).ok()?;
    Some(format!("data:{};base64,{}", mime_for(format), STANDARD.encode(bytes)))
}

/// Reads an image file from disk into a data URI.
pub fn read_file_as_data_uri(path: &Path) -> Result<String, LoadError> {
    let bytes = std::fs::read(path).map_err(|source| LoadError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    encode_data_uri(&bytes).ok_or_else(|| LoadError::Unrecognized(path.to_path_buf()))
}

/// MIME type for an image file name, judged by its extension.
pub fn mime_for_path(path: &Path) -> Option<&'static str> {
    ImageFormat::from_path(path).ok().map(mime_for)
}

fn mime_for(format: ImageFormat) -> &'static str {
    match format {
        ImageFormat::Png => "image/png",
        ImageFormat::Jpeg => "image/jpeg",
        ImageFormat::Gif => "image/gif",
        ImageFormat::WebP => "image/webp",
        ImageFormat::Bmp => "image/bmp",
        ImageFormat::Ico => "image/x-icon",
        ImageFormat::Tiff => "image/tiff",
        ImageFormat::Tga => "image/x-tga",
        ImageFormat::Avif => "image/avif",
        _ => "application/octet-stream",
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    struct NoNetwork;

    impl Fetch for NoNetwork {
        fn fetch(&self, url: &str) -> Result<Vec<u8>, LoadError> {
            Err(LoadError::Fetch {
                url: url.to_string(),
                reason: "offline".into(),
            })
        }
    }

    fn png_bytes(w: u32, h: u32) -> Vec<u8> {
        let img = RgbaImage::from_pixel(w, h, image::Rgba([10, 20, 30, 255]));
        let mut buf = Vec::new();
        image::DynamicImage::ImageRgba8(img)
            .write_to(&mut Cursor::new(&mut buf), ImageFormat::Png)
            .unwrap();
        buf
    }

    #[test]
    fn data_uri_round_trips_through_decoder() {
        let uri = encode_data_uri(&png_bytes(3, 2)).unwrap();
        assert!(uri.starts_with("data:image/png;base64,"));
        let img = load_image(&uri, &NoNetwork).unwrap();
        assert_eq!(img.dimensions(), (3, 2));
        assert_eq!(img.get_pixel(0, 0).0, [10, 20, 30, 255]);
    }

    #[test]
    fn network_urls_go_through_the_fetcher() {
        let err = load_image("https://example.com/a.png", &NoNetwork).unwrap_err();
        assert!(matches!(err, LoadError::Fetch { .. }));
    }

    #[test]
    fn percent_encoded_payload_is_decoded() {
        let (mime, data) = decode_data_uri("data:text/plain,hello%20world").unwrap();
        assert_eq!(mime, "text/plain");
        assert_eq!(data, b"hello world");
    }

    #[test]
    fn malformed_data_uris_are_rejected() {
        assert!(matches!(
            decode_data_uri("data:image/png;base64"),
            Err(LoadError::InvalidDataUri(_))
        ));
        assert!(matches!(
            decode_data_uri("data:image/png;base64,@@@"),
            Err(LoadError::InvalidDataUri(_))
        ));
    }

    #[test]
    fn corrupt_image_data_fails_to_decode() {
        let uri = format!("data:image/png;base64,{}", STANDARD.encode(b"not a png"));
        assert!(matches!(load_image(&uri, &NoNetwork), Err(LoadError::Decode(_))));
    }

    #[test]
    fn fetch_mode_depends_on_scheme() {
        assert_eq!(FetchMode::for_url("data:image/png;base64,AA"), FetchMode::Embedded);
        assert_eq!(FetchMode::for_url("https://x/y.png"), FetchMode::Network);
    }

    #[test]
    fn file_mime_comes_from_extension() {
        assert_eq!(mime_for_path(Path::new("shot.JPG")), Some("image/jpeg"));
        assert_eq!(mime_for_path(Path::new("notes.txt")), None);
    }
}
