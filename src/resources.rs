//! Resource lookup – finds themes, templates and theme assets.
//!
//! Resources are searched through an ordered list of [`ResourceSource`]s and
//! the first source that has the requested path wins. The standard order is
//! the bundled set compiled into the binary, then the working directory.
//! When nothing matches, the error names every location that was tried.

use std::borrow::Cow;
use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};

use include_dir::{include_dir, Dir};
use url::Url;

use crate::error::{Error, Result};

/// Assets compiled into the binary (the `resources/` directory).
static BUNDLED: Dir = include_dir!("$CARGO_MANIFEST_DIR/resources");

/// URL scheme used for bundled resources.
pub const BUNDLE_SCHEME: &str = "bundle";

/// Where a resource was found.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Location {
    /// Relative path inside the bundled set.
    Bundled(String),
    /// Absolute filesystem path.
    File(PathBuf),
}

impl Location {
    /// URL form of the location, used as a base for relative references.
    pub fn url(&self) -> Result<Url> {
        match self {
            Location::Bundled(path) => bundle_url(path),
            Location::File(path) => Url::from_file_path(path).map_err(|()| Error::NotAbsolute {
                path: path.clone(),
            }),
        }
    }

    pub fn read_to_string(&self) -> Result<String> {
        match self {
            Location::Bundled(path) => bundled_bytes(path)
                .map(|bytes| String::from_utf8_lossy(bytes).into_owned())
                .ok_or_else(|| Error::ResourceNotFound {
                    resource: "bundled resource",
                    path: path.clone(),
                    searched: vec![BundledSource.describe(path)],
                }),
            Location::File(path) => {
                fs::read_to_string(path).map_err(|e| Error::io(path.clone(), e))
            }
        }
    }
}

impl fmt::Display for Location {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Location::Bundled(path) => write!(f, "{BUNDLE_SCHEME}:///{path}"),
            Location::File(path) => write!(f, "{}", path.display()),
        }
    }
}

/// Build the `bundle:` URL for a path inside the bundled set.
pub fn bundle_url(path: &str) -> Result<Url> {
    let raw = format!("{BUNDLE_SCHEME}:///{}", path.trim_start_matches('/'));
    Url::parse(&raw).map_err(|source| Error::InvalidUrl { url: raw, source })
}

/// Raw bytes of a bundled file, if present.
pub fn bundled_bytes(path: &str) -> Option<&'static [u8]> {
    BUNDLED
        .get_file(normalize(path).as_ref())
        .map(|file| file.contents())
}

/// Strip leading `./` and `/` so lookups match `include_dir`'s relative keys.
fn normalize(path: &str) -> Cow<'_, str> {
    let trimmed = path.trim_start_matches("./").trim_start_matches('/');
    if trimmed.contains('\\') {
        Cow::Owned(trimmed.replace('\\', "/"))
    } else {
        Cow::Borrowed(trimmed)
    }
}

/// One place resources may live.
pub trait ResourceSource {
    /// Return the location of `relative` if this source has it.
    fn find(&self, relative: &str) -> Option<Location>;

    /// Describe where `relative` was looked for, for error messages.
    fn describe(&self, relative: &str) -> String;
}

/// The read-only resource tree compiled into the binary.
#[derive(Debug, Clone, Copy, Default)]
pub struct BundledSource;

impl ResourceSource for BundledSource {
    fn find(&self, relative: &str) -> Option<Location> {
        let key = normalize(relative);
        BUNDLED
            .get_file(key.as_ref())
            .map(|_| Location::Bundled(key.into_owned()))
    }

    fn describe(&self, relative: &str) -> String {
        format!("the bundled resources ({BUNDLE_SCHEME}:///{})", normalize(relative))
    }
}

/// Files under a root directory.
#[derive(Debug, Clone)]
pub struct DirectorySource {
    root: PathBuf,
}

impl DirectorySource {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    /// The current working directory, made absolute.
    pub fn working_directory() -> Result<Self> {
        let cwd = std::env::current_dir().map_err(|e| Error::io(".", e))?;
        Ok(Self::new(cwd))
    }

    fn candidate(&self, relative: &str) -> PathBuf {
        self.root.join(relative)
    }
}

impl ResourceSource for DirectorySource {
    fn find(&self, relative: &str) -> Option<Location> {
        let path = self.candidate(relative);
        path.is_file().then(|| Location::File(path))
    }

    fn describe(&self, relative: &str) -> String {
        self.candidate(relative).display().to_string()
    }
}

/// Ordered resource search: first source that has the path wins.
pub struct ResourceLocator {
    sources: Vec<Box<dyn ResourceSource>>,
}

impl ResourceLocator {
    pub fn new(sources: Vec<Box<dyn ResourceSource>>) -> Self {
        Self { sources }
    }

    /// Bundled resources, then the current working directory.
    pub fn standard() -> Result<Self> {
        Ok(Self::new(vec![
            Box::new(BundledSource),
            Box::new(DirectorySource::working_directory()?),
        ]))
    }

    /// Bundled resources, then `root`.
    pub fn with_root(root: impl AsRef<Path>) -> Self {
        Self::new(vec![
            Box::new(BundledSource),
            Box::new(DirectorySource::new(root.as_ref())),
        ])
    }

    /// Locate `relative`, reporting every searched location on failure.
    pub fn locate(&self, resource: &'static str, relative: &str) -> Result<Location> {
        let mut searched = Vec::with_capacity(self.sources.len());
        for source in &self.sources {
            if let Some(location) = source.find(relative) {
                log::debug!("{resource} {relative} found at {location}");
                return Ok(location);
            }
            let tried = source.describe(relative);
            log::debug!("{resource} {relative} not in {tried}");
            searched.push(tried);
        }
        Err(Error::ResourceNotFound {
            resource,
            path: relative.to_string(),
            searched,
        })
    }
}

impl fmt::Debug for ResourceLocator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ResourceLocator")
            .field("sources", &self.sources.len())
            .finish()
    }
}
