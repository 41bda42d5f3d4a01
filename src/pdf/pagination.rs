//! Splits the laid-out document into pages and flattens it into paint items
//! in page coordinates (points, origin at the page's top-left corner).
//!
//! Text blocks split between lines and block containers between children.
//! Rows, replaced content and `page-break-inside: avoid` boxes move to the
//! next page whole; if they are taller than a page they overflow it.

use super::layout::{BoxContent, LayoutBox, Marker};
use super::style::{Color, Edges, TextAlign};
use super::text::TextStyle;

const EPSILON: f32 = 0.01;

/// Page size and margins, in points.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PageGeometry {
    pub width: f32,
    pub height: f32,
    pub margin: Edges,
}

impl PageGeometry {
    pub fn content_width(&self) -> f32 {
        (self.width - self.margin.horizontal()).max(1.0)
    }

    pub fn content_height(&self) -> f32 {
        (self.height - self.margin.vertical()).max(1.0)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum PaintItem {
    Fill {
        x: f32,
        y: f32,
        width: f32,
        height: f32,
        color: Color,
    },
    Text {
        x: f32,
        baseline: f32,
        text: String,
        style: TextStyle,
    },
    Image {
        src: String,
        x: f32,
        y: f32,
        width: f32,
        height: f32,
    },
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct Page {
    pub items: Vec<PaintItem>,
}

/// Where a box started painting: page index and item count at that point.
#[derive(Clone, Copy)]
struct Mark {
    page: usize,
    index: usize,
}

struct Paginator<'g> {
    geometry: &'g PageGeometry,
    pages: Vec<Page>,
    /// Added to a document y to get its position in the page stream, where
    /// page `k` spans `k * H .. (k + 1) * H`.
    delta: f32,
    /// Nesting depth of boxes that must not break.
    frozen: usize,
    page_has_content: bool,
    break_pending: bool,
    pending_markers: Vec<Marker>,
}

impl<'g> Paginator<'g> {
    fn new(geometry: &'g PageGeometry) -> Self {
        Self {
            geometry,
            pages: vec![Page::default()],
            delta: 0.0,
            frozen: 0,
            page_has_content: false,
            break_pending: false,
            pending_markers: Vec::new(),
        }
    }

    fn page_index(&self) -> usize {
        self.pages.len() - 1
    }

    fn page_start(&self, page: usize) -> f32 {
        page as f32 * self.geometry.content_height()
    }

    fn current_start(&self) -> f32 {
        self.page_start(self.page_index())
    }

    fn current_end(&self) -> f32 {
        self.current_start() + self.geometry.content_height()
    }

    fn stream_y(&self, doc_y: f32) -> f32 {
        doc_y + self.delta
    }

    /// Page-local y of a stream position on `page`.
    fn page_y(&self, stream_y: f32, page: usize) -> f32 {
        stream_y - self.page_start(page) + self.geometry.margin.top
    }

    fn page_x(&self, doc_x: f32) -> f32 {
        doc_x + self.geometry.margin.left
    }

    fn mark(&self) -> Mark {
        let page = self.page_index();
        Mark {
            page,
            index: self.pages[page].items.len(),
        }
    }

    /// Start a new page with `doc_y` at its top.
    fn new_page_at(&mut self, doc_y: f32) {
        self.pages.push(Page::default());
        self.delta = self.current_start() - doc_y;
        self.page_has_content = false;
        log::debug!("Starting page {}", self.pages.len());
    }

    fn push(&mut self, item: PaintItem) {
        let page = self.page_index();
        self.pages[page].items.push(item);
        self.page_has_content = true;
    }

    fn place(&mut self, b: &LayoutBox) {
        if self.frozen == 0 && (b.breaks.before || self.break_pending) && self.page_has_content {
            self.new_page_at(b.y);
        }
        if self.frozen == 0 {
            self.break_pending = false;
        }

        let top = self.stream_y(b.y);
        let fits = top + b.height <= self.current_end() + EPSILON;
        let splittable = !b.is_row
            && !b.breaks.avoid_inside
            && (matches!(b.content, BoxContent::Text { .. })
                || (matches!(b.content, BoxContent::None) && !b.children.is_empty()));

        if !fits
            && !splittable
            && self.frozen == 0
            && top > self.current_start() + EPSILON
            && self.page_has_content
        {
            self.new_page_at(b.y);
        }
        if !fits && !splittable && b.height > self.geometry.content_height() {
            log::warn!(
                "Box of height {:.1}pt does not fit on a page and will be clipped",
                b.height
            );
        }

        let freeze = !splittable;
        if freeze {
            self.frozen += 1;
        }

        let start = self.mark();
        let stream_top = self.stream_y(b.y);
        if let Some(marker) = &b.marker {
            self.pending_markers.push(marker.clone());
        }

        match &b.content {
            BoxContent::Text { block, align } => {
                for line in &block.lines {
                    let doc_top = b.y + line.top;
                    let line_top = self.stream_y(doc_top);
                    if self.frozen == 0
                        && line_top + line.height > self.current_end() + EPSILON
                        && line_top > self.current_start() + EPSILON
                    {
                        self.new_page_at(doc_top);
                    }
                    self.flush_markers();
                    let offset = match align {
                        TextAlign::Center => (b.width - line.width) / 2.0,
                        TextAlign::Right => b.width - line.width,
                        TextAlign::Left | TextAlign::Justify => 0.0,
                    };
                    let baseline =
                        self.page_y(self.stream_y(doc_top + line.baseline), self.page_index());
                    for fragment in &line.fragments {
                        let x = self.page_x(b.x + offset + fragment.x);
                        self.push(PaintItem::Text {
                            x,
                            baseline,
                            text: fragment.text.clone(),
                            style: fragment.style.clone(),
                        });
                        if fragment.style.underline {
                            self.push(PaintItem::Fill {
                                x,
                                y: baseline + fragment.style.size * 0.12,
                                width: fragment.width,
                                height: (fragment.style.size * 0.06).max(0.5),
                                color: fragment.style.color,
                            });
                        }
                    }
                }
            }
            BoxContent::Image { src, inset } => {
                let page = self.page_index();
                self.push(PaintItem::Image {
                    src: src.clone(),
                    x: self.page_x(b.x + inset.left),
                    y: self.page_y(stream_top + inset.top, page),
                    width: b.width - inset.horizontal(),
                    height: b.height - inset.vertical(),
                });
            }
            BoxContent::None => {}
        }

        for child in &b.children {
            self.place(child);
        }
        if b.children.is_empty() && !matches!(b.content, BoxContent::Text { .. }) {
            self.flush_markers();
        }

        let stream_bottom = self.stream_y(b.bottom());
        self.decorate(b, start, stream_top, stream_bottom);

        if freeze {
            self.frozen -= 1;
        }
        if b.breaks.after && self.frozen == 0 {
            self.break_pending = true;
        }
    }

    /// Markers wait for the first line of their item so they share its page.
    fn flush_markers(&mut self) {
        for marker in std::mem::take(&mut self.pending_markers) {
            let baseline = self.page_y(self.stream_y(marker.baseline), self.page_index());
            let x = self.page_x(marker.x);
            self.push(PaintItem::Text {
                x,
                baseline,
                text: marker.text,
                style: marker.style,
            });
        }
    }

    /// Background and borders, one fragment per page the box touches,
    /// inserted beneath everything the box painted.
    fn decorate(&mut self, b: &LayoutBox, start: Mark, stream_top: f32, stream_bottom: f32) {
        let decoration = b.decoration;
        if decoration.background.is_none() && decoration.border_color.is_none() {
            return;
        }
        let x = self.page_x(b.x);
        let last = self.page_index();
        for page in start.page..=last {
            let first = page == start.page;
            let final_page = page == last;
            let top = if first { stream_top } else { self.page_start(page) };
            let bottom = if final_page {
                stream_bottom
            } else {
                self.page_start(page) + self.geometry.content_height()
            };
            if bottom < top {
                continue;
            }
            let y = self.page_y(top, page);
            let height = bottom - top;

            let mut items = Vec::new();
            if let Some(color) = decoration.background {
                items.push(PaintItem::Fill {
                    x,
                    y,
                    width: b.width,
                    height,
                    color,
                });
            }
            if let Some(color) = decoration.border_color {
                let border = decoration.border;
                let mut side = |x: f32, y: f32, width: f32, height: f32| {
                    if width > 0.0 && height > 0.0 {
                        items.push(PaintItem::Fill {
                            x,
                            y,
                            width,
                            height,
                            color,
                        });
                    }
                };
                if first {
                    side(x, y, b.width, border.top);
                }
                if final_page {
                    side(x, y + height - border.bottom, b.width, border.bottom);
                }
                side(x, y, border.left, height);
                side(x + b.width - border.right, y, border.right, height);
            }

            let page_items = &mut self.pages[page].items;
            let index = if first { start.index.min(page_items.len()) } else { 0 };
            let above = page_items.split_off(index);
            page_items.extend(items);
            page_items.extend(above);
        }
    }
}

/// Break `root` into pages. Always yields at least one page.
pub fn paginate(root: &LayoutBox, geometry: &PageGeometry) -> Vec<Page> {
    let mut paginator = Paginator::new(geometry);
    paginator.place(root);
    paginator.flush_markers();
    log::debug!("Paginated into {} page(s)", paginator.pages.len());
    paginator.pages
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pdf::assets::ImageStore;
    use crate::pdf::css::Stylesheet;
    use crate::pdf::dom::parse_xhtml;
    use crate::pdf::layout::layout_document;
    use crate::pdf::style::build_styled_tree;

    fn geometry() -> PageGeometry {
        PageGeometry {
            width: 300.0,
            height: 200.0,
            margin: Edges::uniform(20.0),
        }
    }

    fn pages_for(html: &str, css: &str) -> Vec<Page> {
        let doc = parse_xhtml(html).unwrap();
        let styled = build_styled_tree(&doc.body, Stylesheet::parse(css));
        let g = geometry();
        let root = layout_document(&styled, g.content_width(), &ImageStore::default()).unwrap();
        paginate(&root, &g)
    }

    fn texts(page: &Page) -> Vec<(&str, f32)> {
        page.items
            .iter()
            .filter_map(|item| match item {
                PaintItem::Text { text, baseline, .. } => Some((text.as_str(), *baseline)),
                _ => None,
            })
            .collect()
    }

    #[test]
    fn short_document_fits_one_page() {
        let pages = pages_for("<body><p>Hello</p></body>", "");
        assert_eq!(pages.len(), 1);
        let t = texts(&pages[0]);
        assert_eq!(t.len(), 1);
        assert_eq!(t[0].0, "Hello");
        assert!(t[0].1 > 20.0 && t[0].1 < 40.0);
    }

    #[test]
    fn empty_body_still_yields_a_page() {
        let pages = pages_for("<body></body>", "");
        assert_eq!(pages.len(), 1);
        assert!(pages[0].items.is_empty());
    }

    #[test]
    fn long_documents_flow_onto_more_pages() {
        let paragraphs: String = (0..40).map(|i| format!("<p>Paragraph {i}</p>")).collect();
        let pages = pages_for(&format!("<body>{paragraphs}</body>"), "");
        assert!(pages.len() > 1);
        let mut seen = 0;
        for page in &pages {
            for (_, baseline) in texts(page) {
                assert!(baseline > 20.0 && baseline <= 180.0 + EPSILON, "baseline {baseline}");
                seen += 1;
            }
        }
        assert_eq!(seen, 40);
    }

    #[test]
    fn long_paragraph_splits_between_lines() {
        let words = "word ".repeat(400);
        let pages = pages_for(&format!("<body><p>{words}</p></body>"), "");
        assert!(pages.len() > 1);
        assert!(pages.iter().all(|p| !texts(p).is_empty()));
    }

    #[test]
    fn forced_breaks_start_new_pages() {
        let pages = pages_for(
            r#"<body><p>one</p><p class="next">two</p><p class="last">three</p><p>four</p></body>"#,
            ".next { page-break-before: always } .last { page-break-after: always }",
        );
        assert_eq!(pages.len(), 3);
        assert_eq!(texts(&pages[0])[0].0, "one");
        let second: Vec<&str> = texts(&pages[1]).into_iter().map(|(t, _)| t).collect();
        assert_eq!(second, vec!["two", "three"]);
        assert_eq!(texts(&pages[2])[0].0, "four");
    }

    #[test]
    fn avoid_inside_blocks_move_whole() {
        let pages = pages_for(
            r#"<body><div style="height: 120pt">filler</div><div class="keep"><p>a</p><p>b</p><p>c</p></div></body>"#,
            ".keep { page-break-inside: avoid }",
        );
        assert_eq!(pages.len(), 2);
        let second: Vec<&str> = texts(&pages[1]).into_iter().map(|(t, _)| t).collect();
        assert_eq!(second, vec!["a", "b", "c"]);
    }

    #[test]
    fn backgrounds_paint_beneath_text() {
        let pages = pages_for(
            r#"<body><div class="band">Title</div></body>"#,
            ".band { background-color: #336699; border-bottom: 2pt solid #000000 }",
        );
        let items = &pages[0].items;
        let text_index = items
            .iter()
            .position(|i| matches!(i, PaintItem::Text { .. }))
            .unwrap();
        let fills: Vec<usize> = items
            .iter()
            .enumerate()
            .filter(|(_, i)| matches!(i, PaintItem::Fill { .. }))
            .map(|(n, _)| n)
            .collect();
        assert_eq!(fills.len(), 2);
        assert!(fills.iter().all(|&n| n < text_index));
    }

    #[test]
    fn list_markers_are_painted() {
        let pages = pages_for("<body><ul><li>Rust</li><li>Go</li></ul></body>", "");
        let t: Vec<&str> = texts(&pages[0]).into_iter().map(|(t, _)| t).collect();
        assert_eq!(t, vec!["\u{2022}", "Rust", "\u{2022}", "Go"]);
    }
}
