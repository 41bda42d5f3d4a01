//! PDF output – turns paginated paint items into a document using the
//! `printpdf` 0.8 ops API and the base-14 fonts.

use std::collections::HashMap;

use printpdf::{
    Color as PdfColor, LinePoint, Mm, Op, PaintMode, PdfDocument, PdfPage, PdfSaveOptions,
    PdfWarnMsg, Point, Polygon, PolygonRing, Pt, RawImage, Rgb, TextItem, WindingOrder,
    XObjectId, XObjectTransform,
};

use super::assets::ImageStore;
use super::fonts::builtin_font;
use super::pagination::{Page, PageGeometry, PaintItem};
use super::style::Color;

const MM_PER_PT: f32 = 0.352778;

struct EmbeddedImage {
    id: XObjectId,
    width_px: u32,
    height_px: u32,
}

fn rgb(color: Color) -> PdfColor {
    PdfColor::Rgb(Rgb {
        r: color.r,
        g: color.g,
        b: color.b,
        icc_profile: None,
    })
}

fn corner(x: f32, y: f32) -> LinePoint {
    LinePoint {
        p: Point { x: Pt(x), y: Pt(y) },
        bezier: false,
    }
}

/// Filled rectangle; `top` is in PDF coordinates (origin bottom-left).
fn fill_rect(ops: &mut Vec<Op>, x: f32, top: f32, width: f32, height: f32, color: Color) {
    ops.push(Op::SetFillColor { col: rgb(color) });
    ops.push(Op::DrawPolygon {
        polygon: Polygon {
            rings: vec![PolygonRing {
                points: vec![
                    corner(x, top - height),
                    corner(x + width, top - height),
                    corner(x + width, top),
                    corner(x, top),
                ],
            }],
            mode: PaintMode::Fill,
            winding_order: WindingOrder::NonZero,
        },
    });
}

/// Re-encode to WinAnsi, the encoding of the base-14 fonts; one byte per
/// glyph, unmappable characters become `?`.
fn to_winlatin(s: &str) -> String {
    let bytes: Vec<u8> = s
        .chars()
        .map(|c| match c {
            '\u{20AC}' => 0x80,
            '\u{201A}' => 0x82,
            '\u{201E}' => 0x84,
            '\u{2026}' => 0x85,
            '\u{2018}' => 0x91,
            '\u{2019}' => 0x92,
            '\u{201C}' => 0x93,
            '\u{201D}' => 0x94,
            '\u{2022}' => 0x95,
            '\u{2013}' => 0x96,
            '\u{2014}' => 0x97,
            '\u{2122}' => 0x99,
            '\u{00A0}' => 0x20,
            c if (c as u32) < 256 => c as u8,
            _ => b'?',
        })
        .collect();
    // SAFETY: the bytes are deliberately not UTF-8 in the 0x80..=0xFF range.
    // printpdf copies builtin-font text into the content stream unchanged.
    #[allow(unsafe_code)]
    unsafe {
        String::from_utf8_unchecked(bytes)
    }
}

fn embed_images(doc: &mut PdfDocument, images: &ImageStore) -> HashMap<String, EmbeddedImage> {
    let mut embedded = HashMap::new();
    let mut warnings: Vec<PdfWarnMsg> = Vec::new();
    for (src, image) in images.iter() {
        match RawImage::decode_from_bytes(&image.bytes, &mut warnings) {
            Ok(raw) => {
                let id = doc.add_image(&raw);
                embedded.insert(
                    src.to_string(),
                    EmbeddedImage {
                        id,
                        width_px: image.width_px,
                        height_px: image.height_px,
                    },
                );
            }
            Err(e) => log::warn!("Skipping image: PDF encode error: {e}"),
        }
    }
    embedded
}

fn page_ops(page: &Page, page_height: f32, images: &HashMap<String, EmbeddedImage>) -> Vec<Op> {
    let mut ops = Vec::new();
    for item in &page.items {
        match item {
            PaintItem::Fill {
                x,
                y,
                width,
                height,
                color,
            } => fill_rect(&mut ops, *x, page_height - y, *width, *height, *color),
            PaintItem::Text { x, baseline, text, style } => {
                let font = builtin_font(style.family, style.bold, style.italic);
                ops.push(Op::StartTextSection);
                ops.push(Op::SetTextCursor {
                    pos: Point {
                        x: Pt(*x),
                        y: Pt(page_height - baseline),
                    },
                });
                ops.push(Op::SetFontSizeBuiltinFont {
                    size: Pt(style.size),
                    font,
                });
                ops.push(Op::SetFillColor { col: rgb(style.color) });
                ops.push(Op::WriteTextBuiltinFont {
                    items: vec![TextItem::Text(to_winlatin(text))],
                    font,
                });
                ops.push(Op::EndTextSection);
            }
            PaintItem::Image {
                src,
                x,
                y,
                width,
                height,
            } => {
                let Some(image) = images.get(src) else { continue };
                // At 72 dpi one pixel is one point.
                ops.push(Op::UseXobject {
                    id: image.id.clone(),
                    transform: XObjectTransform {
                        translate_x: Some(Pt(*x)),
                        translate_y: Some(Pt(page_height - y - height)),
                        dpi: Some(72.0),
                        scale_x: Some(width / image.width_px.max(1) as f32),
                        scale_y: Some(height / image.height_px.max(1) as f32),
                        rotate: None,
                    },
                });
            }
        }
    }
    ops
}

/// Serialize `pages` into PDF bytes.
pub fn paint_pdf(
    title: &str,
    geometry: &PageGeometry,
    pages: &[Page],
    images: &ImageStore,
) -> Vec<u8> {
    let mut doc = PdfDocument::new(title);
    let embedded = embed_images(&mut doc, images);

    let width = Mm(geometry.width * MM_PER_PT);
    let height = Mm(geometry.height * MM_PER_PT);
    let mut pdf_pages: Vec<PdfPage> = pages
        .iter()
        .map(|page| PdfPage::new(width, height, page_ops(page, geometry.height, &embedded)))
        .collect();
    if pdf_pages.is_empty() {
        pdf_pages.push(PdfPage::new(width, height, Vec::new()));
    }

    doc.with_pages(pdf_pages);
    doc.save(&PdfSaveOptions::default(), &mut Vec::new())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pdf::style::{Edges, FontFamily};
    use crate::pdf::text::TextStyle;

    fn geometry() -> PageGeometry {
        PageGeometry {
            width: 595.28,
            height: 841.89,
            margin: Edges::uniform(40.0),
        }
    }

    #[test]
    fn winlatin_maps_typographic_characters() {
        assert_eq!(to_winlatin("abc").as_bytes(), b"abc");
        assert_eq!(to_winlatin("\u{2022}\u{2013}\u{e9}").as_bytes(), &[0x95, 0x96, 0xE9]);
        assert_eq!(to_winlatin("\u{4e2d}").as_bytes(), b"?");
    }

    #[test]
    fn empty_input_still_produces_a_page() {
        let bytes = paint_pdf("Empty", &geometry(), &[], &ImageStore::default());
        assert!(bytes.len() > 100);
        assert_eq!(&bytes[0..5], b"%PDF-");
    }

    #[test]
    fn paints_text_and_fills() {
        let style = TextStyle {
            family: FontFamily::Serif,
            size: 11.0,
            bold: true,
            italic: false,
            color: Color::BLACK,
            underline: false,
            line_height: 14.0,
        };
        let page = Page {
            items: vec![
                PaintItem::Fill {
                    x: 40.0,
                    y: 40.0,
                    width: 100.0,
                    height: 20.0,
                    color: Color::rgb(200, 200, 200),
                },
                PaintItem::Text {
                    x: 40.0,
                    baseline: 55.0,
                    text: "Jane Doe".into(),
                    style,
                },
                PaintItem::Image {
                    src: "missing.png".into(),
                    x: 0.0,
                    y: 0.0,
                    width: 10.0,
                    height: 10.0,
                },
            ],
        };
        let ops = page_ops(&page, 841.89, &HashMap::new());
        assert_eq!(ops.len(), 8);
        let bytes = paint_pdf("CV", &geometry(), &[page.clone(), page], &ImageStore::default());
        assert_eq!(&bytes[0..5], b"%PDF-");
    }
}
