//! Template merge – fills a theme's Handlebars template with YAML data.

use std::path::{Path, PathBuf};

use handlebars::Handlebars;
use serde_json::{Map as JsonMap, Value as JsonValue};
use url::Url;

use crate::document::Mapping;
use crate::error::{Error, Result};
use crate::resources::ResourceLocator;

/// Context key holding the working directory URL, so templates can reference
/// files that sit beside the YAML (e.g. `{{workingDirectory}}photo.jpg`).
pub const WORKING_DIRECTORY_KEY: &str = "workingDirectory";

/// Merge the template at `theme_relative_path` with `data`, searching the
/// bundled resources first and the current working directory second.
pub fn merge_template(theme_relative_path: &str, data: &Mapping) -> Result<String> {
    let cwd = std::env::current_dir().map_err(|e| Error::io(".", e))?;
    TemplateMerger::new(ResourceLocator::standard()?, cwd).merge(theme_relative_path, data)
}

/// `file:` URL of `dir`, with a trailing slash so relative names append.
pub fn directory_url(dir: &Path) -> Result<Url> {
    Url::from_directory_path(dir).map_err(|()| Error::NotAbsolute {
        path: dir.to_path_buf(),
    })
}

#[derive(Debug)]
pub struct TemplateMerger {
    locator: ResourceLocator,
    working_dir: PathBuf,
}

impl TemplateMerger {
    pub fn new(locator: ResourceLocator, working_dir: impl Into<PathBuf>) -> Self {
        Self {
            locator,
            working_dir: working_dir.into(),
        }
    }

    pub fn merge(&self, template_path: &str, data: &Mapping) -> Result<String> {
        let location = self.locator.locate("template", template_path)?;
        let source = location.read_to_string()?;
        let context = self.context(data)?;

        let mut engine = Handlebars::new();
        engine
            .register_template_string(template_path, &source)
            .map_err(|e| Error::TemplateSyntax {
                template: location.to_string(),
                source: Box::new(e),
            })?;
        let html = engine
            .render(template_path, &context)
            .map_err(|e| Error::TemplateRender {
                template: location.to_string(),
                source: Box::new(e),
            })?;
        log::info!("Merged {} ({} bytes of HTML)", location, html.len());
        Ok(html)
    }

    /// YAML entries plus the working directory URL. The synthetic key wins
    /// over a same-named YAML key.
    fn context(&self, data: &Mapping) -> Result<JsonValue> {
        let mut context = JsonMap::with_capacity(data.len() + 1);
        for (key, value) in data.iter() {
            context.insert(key.to_string(), serde_json::to_value(value)?);
        }
        let cwd = directory_url(&self.working_dir)?;
        context.insert(WORKING_DIRECTORY_KEY.to_string(), JsonValue::String(cwd.into()));
        Ok(JsonValue::Object(context))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::document::parse_yaml_mapping;
    use std::fs;

    fn theme_dir(body: &str) -> tempfile::TempDir {
        let dir = tempfile::tempdir().unwrap();
        let theme = dir.path().join("themes/anothertheme");
        fs::create_dir_all(&theme).unwrap();
        fs::write(theme.join("index.html"), body).unwrap();
        dir
    }

    fn cv_data() -> Mapping {
        parse_yaml_mapping("cv:\n  test: success\n", Path::new("cv.yml")).unwrap()
    }

    #[test]
    fn substitutes_data_and_working_directory() {
        let dir = theme_dir("{{cv.test}}, {{workingDirectory}}");
        let merger = TemplateMerger::new(ResourceLocator::with_root(dir.path()), dir.path());
        let html = merger.merge("themes/anothertheme/index.html", &cv_data()).unwrap();
        let expected = format!("success, {}", directory_url(dir.path()).unwrap());
        assert_eq!(html, expected);
    }

    #[test]
    fn working_directory_overrides_yaml_key() {
        let dir = theme_dir("{{workingDirectory}}");
        let data = parse_yaml_mapping("workingDirectory: nope\n", Path::new("cv.yml")).unwrap();
        let merger = TemplateMerger::new(ResourceLocator::with_root(dir.path()), dir.path());
        let html = merger.merge("themes/anothertheme/index.html", &data).unwrap();
        assert!(html.starts_with("file://"), "{html}");
    }

    #[test]
    fn yaml_text_is_escaped_for_xhtml() {
        let dir = theme_dir("<p>{{cv.test}}</p>");
        let data = parse_yaml_mapping("cv:\n  test: R&D <lead>\n", Path::new("cv.yml")).unwrap();
        let merger = TemplateMerger::new(ResourceLocator::with_root(dir.path()), dir.path());
        let html = merger.merge("themes/anothertheme/index.html", &data).unwrap();
        assert_eq!(html, "<p>R&amp;D &lt;lead&gt;</p>");
    }

    #[test]
    fn numbers_render_as_written() {
        let dir = theme_dir("{{cv.phone}}|{{cv.zip}}|{{cv.version}}|{{cv.since}}");
        let yaml = "cv:\n  phone: 0612345678\n  zip: 01000\n  version: 1.10\n  since: 2020.0\n";
        let data = parse_yaml_mapping(yaml, Path::new("cv.yml")).unwrap();
        let merger = TemplateMerger::new(ResourceLocator::with_root(dir.path()), dir.path());
        let html = merger.merge("themes/anothertheme/index.html", &data).unwrap();
        assert_eq!(html, "0612345678|01000|1.10|2020.0");
    }

    #[test]
    fn missing_template_fails() {
        let dir = tempfile::tempdir().unwrap();
        let merger = TemplateMerger::new(ResourceLocator::with_root(dir.path()), dir.path());
        let err = merger.merge("pathDoesNotExist", &cv_data()).unwrap_err();
        assert!(matches!(err, Error::ResourceNotFound { resource: "template", .. }));
    }

    #[test]
    fn syntax_errors_name_the_template() {
        let dir = theme_dir("{{#each cv}}unterminated");
        let merger = TemplateMerger::new(ResourceLocator::with_root(dir.path()), dir.path());
        let err = merger.merge("themes/anothertheme/index.html", &cv_data()).unwrap_err();
        assert!(matches!(err, Error::TemplateSyntax { .. }));
        assert!(err.to_string().contains("anothertheme"));
    }
}
