//! Error type shared by every pipeline stage.

use std::io;
use std::path::PathBuf;

use thiserror::Error;

/// Convenience alias used throughout the crate.
pub type Result<T> = std::result::Result<T, Error>;

#[derive(Error, Debug)]
pub enum Error {
    /// A flag that takes a value was the last argument.
    #[error("{flag} cannot be empty: expected a value after it")]
    MissingArgumentValue { flag: String },

    /// A theme, template or asset was absent from every searched location.
    #[error("{resource} \"{path}\" was not found in {}", .searched.join(" nor in "))]
    ResourceNotFound {
        resource: &'static str,
        path: String,
        searched: Vec<String>,
    },

    #[error("file not found: {}", .path.display())]
    InputNotFound { path: PathBuf },

    #[error("cannot parse {} as YAML: {source}", .path.display())]
    Yaml {
        path: PathBuf,
        #[source]
        source: serde_yaml::Error,
    },

    /// The YAML parsed but its root is a scalar or a sequence.
    #[error("{} is not a valid document: the top-level YAML value must be a mapping", .path.display())]
    NotAMapping { path: PathBuf },

    #[error("template {template} has a syntax error: {source}")]
    TemplateSyntax {
        template: String,
        #[source]
        source: Box<handlebars::TemplateError>,
    },

    #[error("template {template} failed to render: {source}")]
    TemplateRender {
        template: String,
        #[source]
        source: Box<handlebars::RenderError>,
    },

    #[error("cannot build the template context: {0}")]
    RenderContext(#[from] serde_json::Error),

    /// The merged template is not well-formed XHTML.
    #[error("malformed markup: {source}")]
    MalformedMarkup {
        #[source]
        source: roxmltree::Error,
    },

    #[error("{} is not an absolute directory", .path.display())]
    NotAbsolute { path: PathBuf },

    #[error("invalid base URL {url:?}: {source}")]
    InvalidUrl {
        url: String,
        #[source]
        source: url::ParseError,
    },

    #[error("layout failed: {0}")]
    Layout(#[from] taffy::TaffyError),

    #[error("I/O error on {}: {source}", .path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
}

impl Error {
    pub(crate) fn io(path: impl Into<PathBuf>, source: io::Error) -> Self {
        Error::Io {
            path: path.into(),
            source,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn not_found_lists_every_location() {
        let err = Error::ResourceNotFound {
            resource: "theme",
            path: "themes/x/index.html".into(),
            searched: vec!["bundled resources".into(), "/tmp/themes/x/index.html".into()],
        };
        assert_eq!(
            err.to_string(),
            "theme \"themes/x/index.html\" was not found in bundled resources nor in /tmp/themes/x/index.html"
        );
    }

    #[test]
    fn missing_value_names_flag() {
        let err = Error::MissingArgumentValue { flag: "-t".into() };
        assert!(err.to_string().starts_with("-t cannot be empty"));
    }
}
