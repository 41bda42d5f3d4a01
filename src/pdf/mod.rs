//! HTML-to-PDF rendering.
//!
//! The merged template is parsed as strict XHTML, styled with a CSS subset,
//! laid out with Taffy, split into pages and painted with `printpdf`:
//!
//! ```text
//! dom ─▶ css/style ─▶ layout (taffy + text) ─▶ pagination ─▶ paint
//! ```
//!
//! Relative stylesheet and image references resolve against a base URL,
//! normally the theme's location.

pub mod assets;
pub mod css;
pub mod dom;
pub mod fonts;
pub mod layout;
pub mod pagination;
pub mod paint;
pub mod style;
pub mod text;

use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::Path;

use url::Url;

use crate::error::{Error, Result};
use assets::{AssetLoader, ImageStore};
use css::{Declaration, Stylesheet};
use dom::{StyleSource, XhtmlDocument};
pub use pagination::PageGeometry;
use style::{Edges, StyledElement, StyledNode, ROOT_FONT_SIZE};

/// A4 in points.
pub const A4: (f32, f32) = (595.28, 841.89);
pub const LETTER: (f32, f32) = (612.0, 792.0);
const DEFAULT_MARGIN: f32 = 40.0;
const DEFAULT_TITLE: &str = "Document";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Orientation {
    #[default]
    Portrait,
    Landscape,
}

/// Page setup. A theme's `@page` rule takes precedence over these values.
#[derive(Debug, Clone, PartialEq)]
pub struct RenderOptions {
    /// Used when the document has no `<title>`.
    pub title: Option<String>,
    pub page_width: f32,
    pub page_height: f32,
    pub margin: Edges,
    pub orientation: Orientation,
}

impl Default for RenderOptions {
    fn default() -> Self {
        Self {
            title: None,
            page_width: A4.0,
            page_height: A4.1,
            margin: Edges::uniform(DEFAULT_MARGIN),
            orientation: Orientation::Portrait,
        }
    }
}

impl RenderOptions {
    pub fn with_title(mut self, title: impl Into<String>) -> Self {
        self.title = Some(title.into());
        self
    }

    /// Final page geometry after applying `@page` declarations.
    fn geometry(&self, page_rules: &[Declaration]) -> PageGeometry {
        let mut size = (self.page_width, self.page_height);
        let mut orientation = self.orientation;
        let mut margin = self.margin;
        for decl in page_rules {
            let value = decl.value.trim();
            let applied = match decl.property.as_str() {
                "size" => apply_page_size(value, &mut size, &mut orientation),
                "margin" => style::parse_edges(value, ROOT_FONT_SIZE)
                    .map(|edges| margin = edges)
                    .is_some(),
                prop => match prop.strip_prefix("margin-") {
                    Some(side) => {
                        let length = style::parse_length(value, ROOT_FONT_SIZE);
                        match (side, length) {
                            ("top", Some(v)) => margin.top = v,
                            ("right", Some(v)) => margin.right = v,
                            ("bottom", Some(v)) => margin.bottom = v,
                            ("left", Some(v)) => margin.left = v,
                            _ => {}
                        }
                        length.is_some()
                    }
                    None => {
                        log::debug!("Ignoring @page property {prop}");
                        true
                    }
                },
            };
            if !applied {
                log::warn!("Ignoring invalid @page {}: {value:?}", decl.property);
            }
        }
        let (width, height) = match orientation {
            Orientation::Landscape => (size.0.max(size.1), size.0.min(size.1)),
            Orientation::Portrait => size,
        };
        PageGeometry { width, height, margin }
    }
}

/// `size: A4 | letter | landscape | <w> <h> | ...`. False on anything
/// unrecognized, leaving `size` untouched.
fn apply_page_size(value: &str, size: &mut (f32, f32), orientation: &mut Orientation) -> bool {
    let mut named = None;
    let mut portrait = false;
    let mut lengths = Vec::new();
    let mut landscape = None;
    for token in value.split_whitespace() {
        match token.to_ascii_lowercase().as_str() {
            "auto" => {}
            "a3" => named = Some((841.89, 1190.55)),
            "a4" => named = Some(A4),
            "a5" => named = Some((419.53, 595.28)),
            "letter" => named = Some(LETTER),
            "legal" => named = Some((612.0, 1008.0)),
            "landscape" => landscape = Some(true),
            "portrait" => {
                landscape = Some(false);
                portrait = true;
            }
            other => match style::parse_length(other, ROOT_FONT_SIZE) {
                Some(v) if v > 0.0 => lengths.push(v),
                _ => return false,
            },
        }
    }
    let explicit = match lengths[..] {
        [] => named,
        [side] => Some((side, side)),
        [w, h] => Some((w, h)),
        _ => return false,
    };
    if let Some(dims) = explicit {
        *size = dims;
    }
    match landscape {
        Some(true) => *orientation = Orientation::Landscape,
        Some(false) => *orientation = Orientation::Portrait,
        None => {}
    }
    if portrait {
        *size = (size.0.min(size.1), size.0.max(size.1));
    }
    true
}

/// Linked and embedded stylesheets, in document order.
fn collect_stylesheets(document: &XhtmlDocument, loader: &AssetLoader) -> Stylesheet {
    let mut sheet = Stylesheet::default();
    for source in &document.stylesheets {
        match source {
            StyleSource::Embedded(css) => sheet.append(css),
            StyleSource::Linked(href) => {
                if let Some(css) = loader.load_text(href) {
                    sheet.append(&css);
                }
            }
        }
    }
    log::debug!("Loaded {} CSS rule(s)", sheet.rules.len());
    sheet
}

fn image_sources<'a>(element: &'a StyledElement, out: &mut Vec<&'a str>) {
    if element.name == "img" {
        if let Some(src) = element.attr("src") {
            out.push(src);
        }
    }
    for child in &element.children {
        if let StyledNode::Element(e) = child {
            image_sources(e, out);
        }
    }
}

/// Result of a successful render.
#[derive(Debug, Clone)]
pub struct RenderedPdf {
    pub bytes: Vec<u8>,
    pub pages: usize,
}

#[derive(Debug, Clone, Default)]
pub struct PdfRenderer {
    options: RenderOptions,
}

impl PdfRenderer {
    pub fn new(options: RenderOptions) -> Self {
        Self { options }
    }

    pub fn options(&self) -> &RenderOptions {
        &self.options
    }

    /// Render `html` to PDF bytes. Fails only on malformed markup or a
    /// layout engine error; unreadable assets are skipped.
    pub fn render_to_bytes(&self, html: &str, base_url: &Url) -> Result<RenderedPdf> {
        let document = dom::parse_xhtml(html)?;
        let loader = AssetLoader::new(base_url.clone());
        let stylesheet = collect_stylesheets(&document, &loader);
        let geometry = self.options.geometry(&stylesheet.page);

        let styled = style::build_styled_tree(&document.body, stylesheet);
        let mut sources = Vec::new();
        image_sources(&styled, &mut sources);
        let images = ImageStore::load(&loader, sources);

        let root = layout::layout_document(&styled, geometry.content_width(), &images)?;
        let pages = pagination::paginate(&root, &geometry);

        let title = document
            .title
            .as_deref()
            .or(self.options.title.as_deref())
            .unwrap_or(DEFAULT_TITLE);
        let bytes = paint::paint_pdf(title, &geometry, &pages, &images);
        log::info!(
            "Rendered {:?}: {} page(s), {:.0}x{:.0}pt, {} bytes",
            title,
            pages.len(),
            geometry.width,
            geometry.height,
            bytes.len()
        );
        Ok(RenderedPdf {
            bytes,
            pages: pages.len(),
        })
    }

    /// Render and write to `output`, creating or truncating it.
    pub fn render_to_file(&self, html: &str, output: &Path, base_url: &Url) -> Result<RenderedPdf> {
        let rendered = self.render_to_bytes(html, base_url)?;
        let file = File::create(output).map_err(|e| Error::io(output, e))?;
        let mut writer = BufWriter::new(file);
        writer.write_all(&rendered.bytes).map_err(|e| Error::io(output, e))?;
        writer.flush().map_err(|e| Error::io(output, e))?;
        Ok(rendered)
    }
}

/// Render `html` into a PDF at `output_path` with default options.
/// Relative asset references resolve against `base_url`.
pub fn render_to_pdf(html: &str, output_path: impl AsRef<Path>, base_url: &str) -> Result<()> {
    let base = Url::parse(base_url).map_err(|source| Error::InvalidUrl {
        url: base_url.to_string(),
        source,
    })?;
    PdfRenderer::default().render_to_file(html, output_path.as_ref(), &base)?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    const PIXEL_PNG: &str = "iVBORw0KGgoAAAANSUhEUgAAAAEAAAABCAYAAAAfFcSJAAAADUlEQVR42mNkYPhfDwAChwGA60e6kgAAAABJRU5ErkJggg==";

    fn bundle_base() -> Url {
        Url::parse("bundle:///themes/default/index.html").unwrap()
    }

    fn page_rules(css: &str) -> Vec<Declaration> {
        Stylesheet::parse(css).page
    }

    #[test]
    fn renders_simple_document() {
        let html = r#"<?xml version="1.0" encoding="UTF-8"?>
<!DOCTYPE html>
<html xmlns="http://www.w3.org/1999/xhtml">
  <head><title>Jane Doe</title></head>
  <body><h1>Jane Doe</h1><p>Engineer</p></body>
</html>"#;
        let rendered = PdfRenderer::default().render_to_bytes(html, &bundle_base()).unwrap();
        assert_eq!(&rendered.bytes[0..5], b"%PDF-");
        assert!(rendered.bytes.len() > 500);
        assert_eq!(rendered.pages, 1);
    }

    #[test]
    fn malformed_markup_is_rejected() {
        let err = PdfRenderer::default()
            .render_to_bytes("<html><body><p>open</body></html>", &bundle_base())
            .unwrap_err();
        assert!(matches!(err, Error::MalformedMarkup { .. }));
    }

    #[test]
    fn page_rule_overrides_options() {
        let options = RenderOptions::default();
        let g = options.geometry(&page_rules("@page { size: A4 landscape; margin: 1in 2cm }"));
        assert_eq!((g.width, g.height), (A4.1, A4.0));
        assert_eq!(g.margin.top, 72.0);
        assert!((g.margin.left - 56.69).abs() < 0.01);

        let g = options.geometry(&page_rules("@page { size: letter; margin-top: 10pt }"));
        assert_eq!((g.width, g.height), LETTER);
        assert_eq!(g.margin.top, 10.0);
        assert_eq!(g.margin.bottom, DEFAULT_MARGIN);

        let g = options.geometry(&page_rules("@page { size: 100mm 50mm }"));
        assert!((g.width - 283.46).abs() < 0.01 && (g.height - 141.73).abs() < 0.01);
    }

    #[test]
    fn invalid_page_size_keeps_defaults() {
        let g = RenderOptions::default().geometry(&page_rules("@page { size: huge }"));
        assert_eq!((g.width, g.height), A4);
    }

    #[test]
    fn landscape_option_swaps_default_size() {
        let options = RenderOptions {
            orientation: Orientation::Landscape,
            ..RenderOptions::default()
        };
        let g = options.geometry(&[]);
        assert!(g.width > g.height);
    }

    #[test]
    fn stylesheets_load_in_document_order() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("a.css"), "p { color: red }").unwrap();
        let html = r#"<html><head><link rel="stylesheet" href="a.css"/><style>h1 { color: blue }</style><link rel="stylesheet" href="missing.css"/></head><body/></html>"#;
        let document = dom::parse_xhtml(html).unwrap();
        let base = Url::from_file_path(dir.path().join("index.html")).unwrap();
        let sheet = collect_stylesheets(&document, &AssetLoader::new(base));
        assert_eq!(sheet.rules.len(), 2);
        assert_eq!(sheet.rules[0].order, 0);
        assert_eq!(sheet.rules[1].declarations[0].value, "blue");
    }

    #[test]
    fn embeds_data_uri_images() {
        let html = format!(
            r#"<html><body><img src="data:image/png;base64,{PIXEL_PNG}" style="width: 20pt"/><img src="nope.png"/></body></html>"#
        );
        let rendered = PdfRenderer::default().render_to_bytes(&html, &bundle_base()).unwrap();
        assert_eq!(&rendered.bytes[0..5], b"%PDF-");
    }

    #[test]
    fn writes_pdf_file() {
        let dir = tempfile::tempdir().unwrap();
        let out = dir.path().join("out.pdf");
        render_to_pdf(
            "<html><body><p>hi</p></body></html>",
            &out,
            "bundle:///themes/default/index.html",
        )
        .unwrap();
        let bytes = std::fs::read(&out).unwrap();
        assert_eq!(&bytes[0..5], b"%PDF-");
    }

    #[test]
    fn invalid_base_url_is_reported() {
        let dir = tempfile::tempdir().unwrap();
        let err = render_to_pdf("<html/>", dir.path().join("x.pdf"), "not a url").unwrap_err();
        assert!(matches!(err, Error::InvalidUrl { .. }));
    }
}
