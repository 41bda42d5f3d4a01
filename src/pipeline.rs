//! Pipeline – runs one invocation end to end:
//!
//! ```text
//! arguments ─▶ theme lookup ─▶ YAML load ─▶ template merge ─▶ PDF render
//! ```
//!
//! Stages run strictly in order. The first failure stops the run and is
//! reported together with the stage it happened in.

use std::fmt;
use std::path::{Path, PathBuf};

use crate::args::Invocation;
use crate::document::load_yaml_mapping;
use crate::error::Error;
use crate::pdf::{PdfRenderer, RenderOptions};
use crate::resources::ResourceLocator;
use crate::template::TemplateMerger;
use crate::theme::Theme;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stage {
    Arguments,
    Theme,
    Yaml,
    Template,
    Render,
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Stage::Arguments => "argument resolution",
            Stage::Theme => "theme lookup",
            Stage::Yaml => "YAML loading",
            Stage::Template => "template merge",
            Stage::Render => "PDF rendering",
        })
    }
}

/// An [`Error`] tagged with the stage that produced it.
#[derive(Debug, thiserror::Error)]
#[error("{stage} failed: {source}")]
pub struct StageError {
    pub stage: Stage,
    #[source]
    pub source: Error,
}

impl StageError {
    /// True when the command line itself was unusable.
    pub fn is_usage_error(&self) -> bool {
        matches!(self.source, Error::MissingArgumentValue { .. })
    }
}

fn at(stage: Stage) -> impl FnOnce(Error) -> StageError {
    move |source| StageError { stage, source }
}

/// What a successful run produced.
#[derive(Debug, Clone)]
pub struct Outcome {
    pub theme: String,
    pub input: PathBuf,
    pub output: PathBuf,
    pub bytes: usize,
    pub pages: usize,
}

/// Run against the current working directory.
pub fn run<S: AsRef<str>>(args: &[S]) -> Result<Outcome, StageError> {
    let cwd = std::env::current_dir()
        .map_err(|e| Error::io(".", e))
        .map_err(at(Stage::Arguments))?;
    run_in(args, &cwd)
}

/// Run with relative paths, the filesystem theme fallback and the
/// `workingDirectory` template value all rooted at `working_dir`.
pub fn run_in<S: AsRef<str>>(args: &[S], working_dir: &Path) -> Result<Outcome, StageError> {
    let invocation = Invocation::from_args(args).map_err(at(Stage::Arguments))?;
    log::debug!("Resolved invocation: {invocation:?}");

    let theme = Theme::resolve(&invocation.theme, &ResourceLocator::with_root(working_dir))
        .map_err(at(Stage::Theme))?;

    let input = working_dir.join(&invocation.input_file);
    let data = load_yaml_mapping(&input).map_err(at(Stage::Yaml))?;

    let merger = TemplateMerger::new(ResourceLocator::with_root(working_dir), working_dir);
    let html = merger
        .merge(&theme.relative_path, &data)
        .map_err(at(Stage::Template))?;

    let output = working_dir.join(&invocation.output_file);
    let title = Path::new(&invocation.input_file)
        .file_stem()
        .map(|stem| stem.to_string_lossy().into_owned())
        .unwrap_or_else(|| invocation.input_file.clone());
    let base_url = theme.base_url().map_err(at(Stage::Render))?;
    let rendered = PdfRenderer::new(RenderOptions::default().with_title(title))
        .render_to_file(&html, &output, &base_url)
        .map_err(at(Stage::Render))?;

    Ok(Outcome {
        theme: theme.name,
        input,
        output,
        bytes: rendered.bytes.len(),
        pages: rendered.pages,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn stage_errors_name_the_stage() {
        let err = StageError {
            stage: Stage::Theme,
            source: Error::MissingArgumentValue { flag: "-t".into() },
        };
        assert!(err.to_string().starts_with("theme lookup failed: -t cannot be empty"));
        assert!(err.is_usage_error());
    }

    #[test]
    fn flag_without_value_fails_first() {
        let dir = tempfile::tempdir().unwrap();
        let err = run_in(&["cv.yml", "--theme"], dir.path()).unwrap_err();
        assert_eq!(err.stage, Stage::Arguments);
        assert!(err.is_usage_error());
    }

    #[test]
    fn missing_theme_stops_before_yaml() {
        let dir = tempfile::tempdir().unwrap();
        let err = run_in(&["-t", "nope"], dir.path()).unwrap_err();
        assert_eq!(err.stage, Stage::Theme);
    }

    #[test]
    fn missing_input_is_a_yaml_stage_error() {
        let dir = tempfile::tempdir().unwrap();
        let err = run_in::<&str>(&[], dir.path()).unwrap_err();
        assert_eq!(err.stage, Stage::Yaml);
        assert!(matches!(err.source, Error::InputNotFound { .. }));
        assert!(!dir.path().join("cv.pdf").exists());
    }
}
