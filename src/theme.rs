//! Theme lookup.
//!
//! A theme is a directory `themes/<name>/` holding an `index.html` template
//! and any assets it references relatively (stylesheets, images).

use url::Url;

use crate::error::Result;
use crate::resources::{Location, ResourceLocator};

/// Relative template path for a theme name. No validation of the name.
pub fn theme_relative_path(theme_name: &str) -> String {
    format!("themes/{theme_name}/index.html")
}

/// Resolve a theme template path: bundled resources first, then the
/// current working directory.
pub fn resolve_theme_location(relative_path: &str) -> Result<Location> {
    ResourceLocator::standard()?.locate("theme", relative_path)
}

/// A named theme with its template resolved to a concrete location.
#[derive(Debug, Clone)]
pub struct Theme {
    pub name: String,
    pub relative_path: String,
    pub location: Location,
}

impl Theme {
    pub fn resolve(name: &str, locator: &ResourceLocator) -> Result<Self> {
        let relative_path = theme_relative_path(name);
        let location = locator.locate("theme", &relative_path)?;
        log::info!("Using theme '{name}' from {location}");
        Ok(Self {
            name: name.to_string(),
            relative_path,
            location,
        })
    }

    /// Base URL against which the theme's relative assets resolve.
    pub fn base_url(&self) -> Result<Url> {
        self.location.url()
    }
}
