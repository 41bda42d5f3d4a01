//! Integration tests for the cv-forge pipeline.
//!
//! These tests validate:
//! - Argument, theme and YAML resolution as seen from the public API
//! - Template merging against a filesystem theme
//! - End-to-end runs that write a PDF into a scratch working directory
//! - Failures report the stage they happened in

use std::fs;
use std::path::{Path, PathBuf};

use cv_forge::pipeline::{run_in, Stage};
use cv_forge::resources::{Location, ResourceLocator};
use cv_forge::template::{directory_url, TemplateMerger};
use cv_forge::{
    load_yaml_mapping, render_to_pdf, resolve_input_file, resolve_output_file, resolve_theme,
    theme_relative_path, Error, Theme, Value,
};
use tempfile::TempDir;

// =====================================================================
// Helpers
// =====================================================================

fn fixture(relative: &str) -> PathBuf {
    Path::new(env!("CARGO_MANIFEST_DIR")).join("tests/fixtures").join(relative)
}

/// Scratch working directory seeded with files from `tests/fixtures`.
fn workspace(fixtures: &[&str]) -> TempDir {
    let dir = tempfile::tempdir().unwrap();
    for name in fixtures {
        let target = dir.path().join(name);
        fs::create_dir_all(target.parent().unwrap()).unwrap();
        fs::copy(fixture(name), target).unwrap();
    }
    dir
}

fn assert_valid_pdf(path: &Path) {
    let bytes = fs::read(path).unwrap_or_else(|e| panic!("{}: {e}", path.display()));
    assert!(bytes.len() > 100, "PDF too small: {} bytes", bytes.len());
    assert_eq!(&bytes[0..5], b"%PDF-", "Missing PDF header");
}

fn demo_cv() -> String {
    fs::read_to_string(Path::new(env!("CARGO_MANIFEST_DIR")).join("demos/cv.yml")).unwrap()
}

// =====================================================================
// Resolution
// =====================================================================

#[test]
fn theme_flag_is_found_anywhere() {
    for args in [
        vec!["--theme", "mytheme"],
        vec!["-t", "mytheme"],
        vec!["someargs", "andanother", "-t", "mytheme"],
        vec!["--theme", "mytheme", "someargs", "andanother"],
        vec!["someargs", "-t", "mytheme", "andanother"],
    ] {
        assert_eq!(resolve_theme(&args).unwrap(), "mytheme", "{args:?}");
    }
    assert_eq!(resolve_theme(&["--any", "any"]).unwrap(), "default");
    assert!(matches!(resolve_theme(&["--theme"]), Err(Error::MissingArgumentValue { .. })));
}

#[test]
fn input_and_output_defaults() {
    let args = ["any", "another", "mycv.pdf", "mycv.yml", "mycv.xml"];
    assert_eq!(resolve_input_file(&args), "mycv.yml");
    assert_eq!(resolve_output_file(&args, "mycv.yml"), "mycv.pdf");
    assert_eq!(resolve_input_file::<&str>(&[]), "cv.yml");
    assert_eq!(resolve_output_file(&["any", "mycv.xml"], "mycv.yml"), "mycv.pdf");
}

#[test]
fn yaml_fixture_loads_as_mapping() {
    let map = load_yaml_mapping(fixture("cv.yml")).unwrap();
    let cv = map.get("cv").and_then(Value::as_mapping).unwrap();
    assert_eq!(cv.get("test").and_then(Value::as_str), Some("success"));

    let err = load_yaml_mapping(fixture("not_a_mapping.yml")).unwrap_err();
    assert!(matches!(err, Error::NotAMapping { .. }));
    let err = load_yaml_mapping("file_that_does_not_exists.yml").unwrap_err();
    assert!(matches!(err, Error::InputNotFound { .. }));
}

#[test]
fn filesystem_theme_is_found_after_bundled_ones() {
    let dir = workspace(&["themes/anothertheme/index.html"]);
    let locator = ResourceLocator::with_root(dir.path());

    let theme = Theme::resolve("anothertheme", &locator).unwrap();
    let expected = dir.path().join(theme_relative_path("anothertheme"));
    assert_eq!(theme.location, Location::File(expected));

    let bundled = Theme::resolve("default", &locator).unwrap();
    assert!(matches!(bundled.location, Location::Bundled(_)));
    assert_eq!(bundled.base_url().unwrap().scheme(), "bundle");
}

// =====================================================================
// Template merge
// =====================================================================

#[test]
fn merge_substitutes_yaml_and_working_directory() {
    let dir = workspace(&["cv.yml", "themes/anothertheme/index.html"]);
    let data = load_yaml_mapping(dir.path().join("cv.yml")).unwrap();
    let merger = TemplateMerger::new(ResourceLocator::with_root(dir.path()), dir.path());

    let html = merger.merge(&theme_relative_path("anothertheme"), &data).unwrap();
    let cwd = directory_url(dir.path()).unwrap();
    assert_eq!(html, format!("<!DOCTYPE html>\n<html>\n<body>\nsuccess, {cwd}\n</body>\n</html>"));
}

// =====================================================================
// End to end
// =====================================================================

#[test]
fn default_theme_renders_demo_cv() {
    let dir = tempfile::tempdir().unwrap();
    fs::write(dir.path().join("cv.yml"), demo_cv()).unwrap();

    let outcome = run_in::<&str>(&[], dir.path()).unwrap();
    assert_eq!(outcome.theme, "default");
    assert_eq!(outcome.output, dir.path().join("cv.pdf"));
    assert!(outcome.pages >= 1);
    assert_valid_pdf(&outcome.output);
    assert_eq!(fs::metadata(&outcome.output).unwrap().len() as usize, outcome.bytes);
}

#[test]
fn filesystem_theme_renders_to_named_output() {
    let dir = workspace(&["cv.yml", "themes/anothertheme/index.html"]);
    let outcome = run_in(&["cv.yml", "-t", "anothertheme", "result.pdf"], dir.path()).unwrap();
    assert_eq!(outcome.pages, 1);
    assert_valid_pdf(&dir.path().join("result.pdf"));
}

#[test]
fn output_name_follows_input_name() {
    let dir = tempfile::tempdir().unwrap();
    fs::write(dir.path().join("mycv.yml"), demo_cv()).unwrap();
    run_in(&["mycv.yml"], dir.path()).unwrap();
    assert_valid_pdf(&dir.path().join("mycv.pdf"));
}

#[test]
fn photo_beside_the_yaml_is_embedded() {
    let dir = tempfile::tempdir().unwrap();
    image::RgbImage::from_pixel(8, 8, image::Rgb([40, 90, 160]))
        .save(dir.path().join("photo.png"))
        .unwrap();
    let yaml = demo_cv().replace("# photo: photo.png", "photo: photo.png");
    assert!(yaml.contains("\n  photo: photo.png"));
    fs::write(dir.path().join("cv.yml"), yaml).unwrap();

    let with_photo = run_in(&["cv.yml"], dir.path()).unwrap();
    fs::remove_file(dir.path().join("photo.png")).unwrap();
    let without_photo = run_in(&["cv.yml", "nophoto.pdf"], dir.path()).unwrap();
    assert!(with_photo.bytes > without_photo.bytes);
}

#[test]
fn long_cv_spans_several_pages() {
    let mut yaml = String::from("cv:\n  name: Long Career\n  experience:\n");
    for i in 0..30 {
        yaml.push_str(&format!(
            "    - role: Engineer {i}\n      company: Company {i}\n      start: {}\n      highlights:\n        - Shipped feature {i}.\n        - Fixed bug {i}.\n",
            1990 + i
        ));
    }
    let dir = tempfile::tempdir().unwrap();
    fs::write(dir.path().join("cv.yml"), yaml).unwrap();
    let outcome = run_in(&["cv.yml"], dir.path()).unwrap();
    assert!(outcome.pages > 1, "expected several pages, got {}", outcome.pages);
}

#[test]
fn markup_characters_in_yaml_stay_well_formed() {
    let dir = tempfile::tempdir().unwrap();
    fs::write(
        dir.path().join("cv.yml"),
        "cv:\n  name: \"Tom & Jerry <Consulting>\"\n  summary: 'Quotes \" and apostrophes '' survive'\n",
    )
    .unwrap();
    let outcome = run_in(&["cv.yml"], dir.path()).unwrap();
    assert_valid_pdf(&outcome.output);
}

// =====================================================================
// Failures
// =====================================================================

#[test]
fn missing_theme_names_both_locations() {
    let dir = workspace(&["cv.yml"]);
    let err = run_in(&["-t", "themeDoesNotExist"], dir.path()).unwrap_err();
    assert_eq!(err.stage, Stage::Theme);
    let message = err.to_string();
    assert!(message.starts_with("theme lookup failed"), "{message}");
    assert!(message.contains("bundled resources"), "{message}");
    assert!(message.contains("themeDoesNotExist/index.html"), "{message}");
    assert!(!dir.path().join("cv.pdf").exists());
}

#[test]
fn missing_yaml_fails_without_output() {
    let dir = tempfile::tempdir().unwrap();
    let err = run_in(&["absent.yml"], dir.path()).unwrap_err();
    assert_eq!(err.stage, Stage::Yaml);
    assert!(err.to_string().contains("absent.yml"));
    assert!(!dir.path().join("absent.pdf").exists());
}

#[test]
fn non_mapping_yaml_is_rejected() {
    let dir = workspace(&["not_a_mapping.yml"]);
    let err = run_in(&["not_a_mapping.yml"], dir.path()).unwrap_err();
    assert_eq!(err.stage, Stage::Yaml);
    assert!(matches!(err.source, Error::NotAMapping { .. }));
}

#[test]
fn malformed_theme_fails_at_render() {
    let dir = workspace(&["cv.yml"]);
    let theme = dir.path().join("themes/broken");
    fs::create_dir_all(&theme).unwrap();
    fs::write(theme.join("index.html"), "<html><body><p>{{cv.test}}</body></html>").unwrap();

    let err = run_in(&["-t", "broken"], dir.path()).unwrap_err();
    assert_eq!(err.stage, Stage::Render);
    assert!(matches!(err.source, Error::MalformedMarkup { .. }));
}

#[test]
fn template_syntax_errors_fail_at_merge() {
    let dir = workspace(&["cv.yml"]);
    let theme = dir.path().join("themes/typo");
    fs::create_dir_all(&theme).unwrap();
    fs::write(theme.join("index.html"), "<html><body>{{#if cv.test}}</body></html>").unwrap();

    let err = run_in(&["-t", "typo"], dir.path()).unwrap_err();
    assert_eq!(err.stage, Stage::Template);
    assert!(matches!(err.source, Error::TemplateSyntax { .. }));
}

#[test]
fn render_to_pdf_writes_the_file() {
    let dir = tempfile::tempdir().unwrap();
    let out = dir.path().join("direct.pdf");
    render_to_pdf(
        "<!DOCTYPE html><html><head><title>t</title></head><body><p>Direct</p></body></html>",
        &out,
        "bundle:///themes/default/index.html",
    )
    .unwrap();
    assert_valid_pdf(&out);
}
