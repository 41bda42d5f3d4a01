//! Asset loading for stylesheets and images referenced by a document.
//!
//! References resolve against the document's base URL. `data:` (base64),
//! `file:` and `bundle:` URLs are readable; anything else, and anything that
//! fails to read or decode, is skipped with a warning.

use std::collections::HashMap;
use std::fs;

use base64::{engine::general_purpose::STANDARD as BASE64_STD, Engine as _};
use url::Url;

use crate::resources::{bundled_bytes, BUNDLE_SCHEME};

/// Resolves and reads references relative to a base URL.
#[derive(Debug, Clone)]
pub struct AssetLoader {
    base: Url,
}

impl AssetLoader {
    pub fn new(base: Url) -> Self {
        Self { base }
    }

    pub fn base(&self) -> &Url {
        &self.base
    }

    pub fn resolve(&self, reference: &str) -> Option<Url> {
        match self.base.join(reference.trim()) {
            Ok(url) => Some(url),
            Err(e) => {
                log::warn!(
                    "Skipping asset {reference:?}: cannot resolve against {}: {e}",
                    self.base
                );
                None
            }
        }
    }

    /// Raw bytes behind `reference`.
    pub fn load(&self, reference: &str) -> Option<Vec<u8>> {
        let url = self.resolve(reference)?;
        let result = match url.scheme() {
            "data" => parse_data_uri(url.as_str()),
            "file" => url
                .to_file_path()
                .map_err(|()| format!("{url} is not a local path"))
                .and_then(|path| fs::read(&path).map_err(|e| format!("{}: {e}", path.display()))),
            scheme if scheme == BUNDLE_SCHEME => bundled_bytes(url.path())
                .map(<[u8]>::to_vec)
                .ok_or_else(|| format!("{url} is not in the bundled resources")),
            other => Err(format!("unsupported scheme {other:?}")),
        };
        match result {
            Ok(bytes) => {
                log::debug!("Loaded {} bytes from {}", bytes.len(), preview(url.as_str()));
                Some(bytes)
            }
            Err(e) => {
                log::warn!("Skipping asset {}: {e}", preview(url.as_str()));
                None
            }
        }
    }

    pub fn load_text(&self, reference: &str) -> Option<String> {
        self.load(reference)
            .map(|bytes| String::from_utf8_lossy(&bytes).into_owned())
    }

    /// Load and decode an image, keeping the encoded bytes for embedding.
    pub fn load_image(&self, reference: &str) -> Option<DecodedImage> {
        let bytes = self.load(reference)?;
        match ::image::load_from_memory(&bytes) {
            Ok(img) if img.width() > 0 && img.height() > 0 => Some(DecodedImage {
                width_px: img.width(),
                height_px: img.height(),
                bytes,
            }),
            Ok(_) => {
                log::warn!("Skipping empty image {}", preview(reference));
                None
            }
            Err(e) => {
                log::warn!("Skipping image {}: decode error: {e}", preview(reference));
                None
            }
        }
    }
}

/// Encoded image data plus its pixel size.
#[derive(Debug, Clone)]
pub struct DecodedImage {
    pub bytes: Vec<u8>,
    pub width_px: u32,
    pub height_px: u32,
}

/// Images of one document, keyed by their `src` attribute as written.
#[derive(Debug, Clone, Default)]
pub struct ImageStore {
    images: HashMap<String, DecodedImage>,
}

impl ImageStore {
    /// Load every source once; failures are left out.
    pub fn load<'a>(loader: &AssetLoader, sources: impl IntoIterator<Item = &'a str>) -> Self {
        let mut images = HashMap::new();
        for src in sources {
            if images.contains_key(src) {
                continue;
            }
            if let Some(image) = loader.load_image(src) {
                images.insert(src.to_string(), image);
            }
        }
        Self { images }
    }

    pub fn get(&self, src: &str) -> Option<&DecodedImage> {
        self.images.get(src)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &DecodedImage)> {
        self.images.iter().map(|(k, v)| (k.as_str(), v))
    }

    pub fn len(&self) -> usize {
        self.images.len()
    }

    pub fn is_empty(&self) -> bool {
        self.images.is_empty()
    }
}

/// Decode a `data:<mime>;base64,<data>` URI.
fn parse_data_uri(src: &str) -> Result<Vec<u8>, String> {
    let rest = src
        .strip_prefix("data:")
        .ok_or_else(|| "not a data URI".to_string())?;
    let (header, data) = rest
        .split_once(',')
        .ok_or_else(|| "invalid data URI: missing `,` separator".to_string())?;
    if !header.ends_with(";base64") {
        return Err("only base64-encoded data URIs are supported".to_string());
    }
    let data: String = data.chars().filter(|c| !c.is_whitespace()).collect();
    BASE64_STD
        .decode(data)
        .map_err(|e| format!("base64 decode error: {e}"))
}

/// Data URIs can be huge; keep log lines short.
fn preview(s: &str) -> &str {
    match s.char_indices().nth(80) {
        Some((idx, _)) => &s[..idx],
        None => s,
    }
}
