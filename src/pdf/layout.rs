//! Layout engine – builds a Taffy flexbox tree from the styled document and
//! converts the computed result into positioned boxes in document
//! coordinates (points, origin at the top-left of the content area).
//!
//! Block-level elements become flex columns. Runs of inline content are
//! wrapped into anonymous text leaves at build time, sized from the width
//! the leaf is expected to get.

use std::collections::HashMap;

use taffy::{
    AvailableSpace, LengthPercentage, LengthPercentageAuto, NodeId, Rect, Size, Style, TaffyTree,
};

use super::assets::ImageStore;
use super::fonts::{ascent, text_width};
use super::style::{
    self, ComputedStyle, Dimension, Edges, StyledElement, StyledNode, TextAlign, PT_PER_PX,
};
use super::text::{InlineItem, TextBlock, TextStyle};
use crate::error::Result;

/// Space between a list marker and its item.
const MARKER_GAP: f32 = 6.0;

/// A positioned box, before page splitting.
#[derive(Debug, Clone)]
pub struct LayoutBox {
    pub x: f32,
    pub y: f32,
    pub width: f32,
    pub height: f32,
    pub decoration: Decoration,
    pub content: BoxContent,
    pub marker: Option<Marker>,
    pub breaks: PageBreaks,
    /// Children sit side by side; such boxes are never split across pages.
    pub is_row: bool,
    pub children: Vec<LayoutBox>,
}

impl LayoutBox {
    pub fn bottom(&self) -> f32 {
        self.y + self.height
    }

    /// Absolute baseline of the first line of text inside this box.
    pub fn first_baseline(&self) -> Option<f32> {
        match &self.content {
            BoxContent::Text { block, .. } => {
                block.lines.first().map(|l| self.y + l.top + l.baseline)
            }
            _ => self.children.iter().find_map(LayoutBox::first_baseline),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct Decoration {
    pub background: Option<style::Color>,
    pub border: Edges,
    pub border_color: Option<style::Color>,
}

impl Decoration {
    fn from_style(s: &ComputedStyle) -> Self {
        let has_border = s.border != Edges::ZERO;
        Self {
            background: (!s.background_color.is_transparent()).then_some(s.background_color),
            border: s.border,
            border_color: has_border.then_some(s.border_color),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct PageBreaks {
    pub before: bool,
    pub after: bool,
    pub avoid_inside: bool,
}

#[derive(Debug, Clone, Default)]
pub enum BoxContent {
    #[default]
    None,
    Text {
        block: TextBlock,
        align: TextAlign,
    },
    Image {
        /// Key into the document's [`ImageStore`].
        src: String,
        /// Padding plus border around the picture.
        inset: Edges,
    },
}

/// A list bullet or ordinal, painted left of its item.
#[derive(Debug, Clone, PartialEq)]
pub struct Marker {
    pub text: String,
    pub style: TextStyle,
    pub x: f32,
    pub baseline: f32,
}

#[derive(Debug, Default)]
struct NodeInfo {
    decoration: Decoration,
    content: BoxContent,
    marker: Option<(String, TextStyle)>,
    breaks: PageBreaks,
    is_row: bool,
}

impl NodeInfo {
    fn for_element(s: &ComputedStyle, marker: Option<(String, TextStyle)>, is_row: bool) -> Self {
        Self {
            decoration: Decoration::from_style(s),
            content: BoxContent::None,
            marker,
            breaks: PageBreaks {
                before: s.page_break_before,
                after: s.page_break_after,
                avoid_inside: s.page_break_inside_avoid,
            },
            is_row,
        }
    }
}

struct LayoutBuilder<'a> {
    taffy: TaffyTree<()>,
    info: HashMap<NodeId, NodeInfo>,
    images: &'a ImageStore,
}

fn is_inline_level(el: &StyledElement) -> bool {
    el.name == "br"
        || (el.style.display.is_inline()
            && el.children.iter().all(|c| match c {
                StyledNode::Text { .. } => true,
                StyledNode::Element(e) => is_inline_level(e),
            }))
}

fn collect_inline(el: &StyledElement, items: &mut Vec<InlineItem>) {
    if el.name == "br" {
        items.push(InlineItem::Break(el.style.text_style()));
        return;
    }
    for child in &el.children {
        match child {
            StyledNode::Text { text, style } => {
                items.push(InlineItem::Text(text.clone(), style.clone()))
            }
            StyledNode::Element(e) => collect_inline(e, items),
        }
    }
}

/// Flex containers lay every child element out as its own item.
fn is_flex_container(s: &ComputedStyle) -> bool {
    matches!(s.display, style::Display::Flex | style::Display::TableRow)
}

fn lays_out_in_row(s: &ComputedStyle) -> bool {
    match s.display {
        style::Display::Flex => s.flex_direction == style::FlexDirection::Row,
        style::Display::TableRow => true,
        _ => false,
    }
}

fn inset(s: &ComputedStyle) -> Edges {
    Edges {
        top: s.padding.top + s.border.top,
        right: s.padding.right + s.border.right,
        bottom: s.padding.bottom + s.border.bottom,
        left: s.padding.left + s.border.left,
    }
}

impl<'a> LayoutBuilder<'a> {
    fn new(images: &'a ImageStore) -> Self {
        Self {
            taffy: TaffyTree::new(),
            info: HashMap::new(),
            images,
        }
    }

    /// `containing` resolves percentages; `estimate` is the width an
    /// auto-sized box is expected to get.
    fn build_element(
        &mut self,
        el: &StyledElement,
        containing: f32,
        estimate: f32,
        marker: Option<(String, TextStyle)>,
    ) -> Result<Option<NodeId>> {
        if el.name == "img" {
            return self.build_image(el, containing);
        }
        let s = &el.style;
        let chrome = s.padding.horizontal() + s.border.horizontal();
        let outer = match s.width {
            Dimension::Pt(w) => w + chrome,
            Dimension::Percent(p) => containing * p / 100.0,
            Dimension::Auto => estimate - s.margin.horizontal(),
        };
        let outer = match s.max_width {
            Dimension::Pt(m) => outer.min(m + chrome),
            Dimension::Percent(p) => outer.min(containing * p / 100.0),
            Dimension::Auto => outer,
        };
        let inner = (outer - chrome).max(0.0);

        let flex = is_flex_container(s);
        let is_row = lays_out_in_row(s);
        let child_estimate = if is_row {
            // Auto-width items share what fixed-width items leave over.
            let mut items = 0usize;
            let mut auto_items = 0usize;
            let mut fixed = 0.0;
            for child in &el.children {
                let StyledNode::Element(e) = child else { continue };
                if e.name == "br" {
                    continue;
                }
                items += 1;
                let cs = &e.style;
                match cs.width {
                    Dimension::Pt(w) => {
                        fixed += w
                            + cs.padding.horizontal()
                            + cs.border.horizontal()
                            + cs.margin.horizontal();
                    }
                    Dimension::Percent(p) => fixed += inner * p / 100.0,
                    Dimension::Auto => auto_items += 1,
                }
            }
            let gaps = s.gap * items.saturating_sub(1) as f32;
            ((inner - gaps - fixed) / auto_items.max(1) as f32).max(1.0)
        } else {
            inner
        };

        let mut children = Vec::new();
        let mut pending = Vec::new();
        let mut counter = el
            .attr("start")
            .and_then(|v| v.trim().parse::<u32>().ok())
            .map_or(0, |start| start.saturating_sub(1));
        for child in &el.children {
            match child {
                StyledNode::Text { text, style } => {
                    pending.push(InlineItem::Text(text.clone(), style.clone()));
                }
                StyledNode::Element(e) if e.name == "br" && flex => {}
                StyledNode::Element(e) if !flex && is_inline_level(e) => {
                    collect_inline(e, &mut pending)
                }
                StyledNode::Element(e) => {
                    self.flush_text(&mut pending, s, child_estimate, is_row, &mut children)?;
                    let marker = if e.style.display == style::Display::ListItem {
                        counter += 1;
                        e.style
                            .list_style
                            .marker(counter)
                            .map(|text| (text, e.style.text_style()))
                    } else {
                        None
                    };
                    if let Some(id) = self.build_element(e, inner, child_estimate, marker)? {
                        children.push(id);
                    }
                }
            }
        }
        self.flush_text(&mut pending, s, child_estimate, is_row, &mut children)?;

        let node = self.taffy.new_with_children(to_taffy(s), &children)?;
        self.info.insert(node, NodeInfo::for_element(s, marker, is_row));
        Ok(Some(node))
    }

    /// Turn accumulated inline content into an anonymous text leaf.
    fn flush_text(
        &mut self,
        pending: &mut Vec<InlineItem>,
        parent: &ComputedStyle,
        width: f32,
        in_row: bool,
        children: &mut Vec<NodeId>,
    ) -> Result<()> {
        let items = std::mem::take(pending);
        if InlineItem::all_blank(&items) {
            return Ok(());
        }
        let block = TextBlock::layout(&items, width);
        let mut ts = Style::default();
        ts.size = Size {
            width: taffy::Dimension::Length(block.width),
            height: taffy::Dimension::Length(block.height),
        };
        ts.flex_shrink = 0.0;
        if !in_row {
            ts.align_self = Some(match parent.text_align {
                TextAlign::Center => taffy::AlignSelf::Center,
                TextAlign::Right => taffy::AlignSelf::End,
                TextAlign::Left | TextAlign::Justify => taffy::AlignSelf::Start,
            });
        }
        let node = self.taffy.new_leaf(ts)?;
        self.info.insert(
            node,
            NodeInfo {
                content: BoxContent::Text {
                    block,
                    align: parent.text_align,
                },
                ..NodeInfo::default()
            },
        );
        children.push(node);
        Ok(())
    }

    /// Replaced box: CSS size, else intrinsic size (1px = 0.75pt), keeping
    /// the aspect ratio when only one side is given.
    fn build_image(&mut self, el: &StyledElement, containing: f32) -> Result<Option<NodeId>> {
        let Some(src) = el.attr("src") else {
            log::warn!("Skipping <img> without src");
            return Ok(None);
        };
        let s = &el.style;
        let image = self.images.get(src);
        let intrinsic = image.map(|img| {
            (
                img.width_px as f32 * PT_PER_PX,
                img.height_px as f32 * PT_PER_PX,
            )
        });
        let width = match s.width {
            Dimension::Pt(w) => Some(w),
            Dimension::Percent(p) => Some(containing * p / 100.0),
            Dimension::Auto => None,
        };
        let height = match s.height {
            Dimension::Pt(h) => Some(h),
            _ => None,
        };
        let (mut w, mut h) = match (width, height, intrinsic) {
            (Some(w), Some(h), _) => (w, h),
            (Some(w), None, Some((iw, ih))) => (w, w * ih / iw),
            (None, Some(h), Some((iw, ih))) => (h * iw / ih, h),
            (None, None, Some(size)) => size,
            _ => {
                log::warn!("Skipping image {src:?}: unavailable and not sized by CSS");
                return Ok(None);
            }
        };

        let edges = inset(s);
        let max = match s.max_width {
            Dimension::Pt(m) => m.min(containing),
            Dimension::Percent(p) => containing * p / 100.0,
            Dimension::Auto => containing,
        } - edges.horizontal();
        if w > max && max > 0.0 {
            h *= max / w;
            w = max;
        }

        let mut ts = to_taffy(s);
        ts.size = Size {
            width: taffy::Dimension::Length(w + edges.horizontal()),
            height: taffy::Dimension::Length(h + edges.vertical()),
        };
        ts.min_size = Size::auto();
        ts.flex_shrink = 0.0;
        let node = self.taffy.new_leaf(ts)?;

        let mut info = NodeInfo::for_element(s, None, false);
        if image.is_some() {
            info.content = BoxContent::Image {
                src: src.to_string(),
                inset: edges,
            };
        }
        self.info.insert(node, info);
        Ok(Some(node))
    }

    /// Convert computed layouts into absolute boxes.
    fn extract(&mut self, node: NodeId, offset_x: f32, offset_y: f32) -> Result<LayoutBox> {
        let layout = *self.taffy.layout(node)?;
        let x = offset_x + layout.location.x;
        let y = offset_y + layout.location.y;

        let children = self
            .taffy
            .children(node)?
            .into_iter()
            .map(|child| self.extract(child, x, y))
            .collect::<Result<Vec<_>>>()?;

        let info = self.info.remove(&node).unwrap_or_default();
        let mut lbox = LayoutBox {
            x,
            y,
            width: layout.size.width,
            height: layout.size.height,
            decoration: info.decoration,
            content: info.content,
            marker: None,
            breaks: info.breaks,
            is_row: info.is_row,
            children,
        };
        if let Some((text, style)) = info.marker {
            let width = text_width(&text, &style);
            let baseline = lbox
                .first_baseline()
                .unwrap_or(y + style.size * ascent(style.family));
            lbox.marker = Some(Marker {
                x: x - MARKER_GAP - width,
                baseline,
                text,
                style,
            });
        }
        Ok(lbox)
    }
}

fn dimension(d: Dimension, chrome: f32) -> taffy::Dimension {
    match d {
        Dimension::Auto => taffy::Dimension::Auto,
        Dimension::Pt(v) => taffy::Dimension::Length(v + chrome),
        Dimension::Percent(p) => taffy::Dimension::Percent(p / 100.0),
    }
}

/// Map a computed style onto a Taffy style. Every element is a flex
/// container; block-level ones stack their children in a column.
fn to_taffy(s: &ComputedStyle) -> Style {
    let mut ts = Style::default();
    ts.display = taffy::Display::Flex;

    match s.display {
        style::Display::Flex => {
            ts.flex_direction = match s.flex_direction {
                style::FlexDirection::Row => taffy::FlexDirection::Row,
                style::FlexDirection::Column => taffy::FlexDirection::Column,
            };
            ts.flex_wrap = match s.flex_wrap {
                style::FlexWrap::NoWrap => taffy::FlexWrap::NoWrap,
                style::FlexWrap::Wrap => taffy::FlexWrap::Wrap,
            };
            ts.justify_content = Some(match s.justify_content {
                style::JustifyContent::Start => taffy::JustifyContent::Start,
                style::JustifyContent::End => taffy::JustifyContent::End,
                style::JustifyContent::Center => taffy::JustifyContent::Center,
                style::JustifyContent::SpaceBetween => taffy::JustifyContent::SpaceBetween,
                style::JustifyContent::SpaceAround => taffy::JustifyContent::SpaceAround,
                style::JustifyContent::SpaceEvenly => taffy::JustifyContent::SpaceEvenly,
            });
            ts.align_items = Some(match s.align_items {
                style::AlignItems::Start => taffy::AlignItems::Start,
                style::AlignItems::End => taffy::AlignItems::End,
                style::AlignItems::Center => taffy::AlignItems::Center,
                style::AlignItems::Stretch => taffy::AlignItems::Stretch,
            });
        }
        style::Display::TableRow => {
            ts.flex_direction = taffy::FlexDirection::Row;
            ts.align_items = Some(taffy::AlignItems::Stretch);
        }
        _ => {
            ts.flex_direction = taffy::FlexDirection::Column;
            ts.align_items = Some(taffy::AlignItems::Stretch);
        }
    }

    let chrome_w = s.padding.horizontal() + s.border.horizontal();
    let chrome_h = s.padding.vertical() + s.border.vertical();
    ts.size = Size {
        width: dimension(s.width, chrome_w),
        height: dimension(s.height, chrome_h),
    };
    ts.min_size = Size {
        width: match s.min_width {
            Dimension::Auto => taffy::Dimension::Length(0.0),
            d => dimension(d, chrome_w),
        },
        height: taffy::Dimension::Auto,
    };
    ts.max_size = Size {
        width: dimension(s.max_width, chrome_w),
        height: taffy::Dimension::Auto,
    };

    if s.display == style::Display::TableCell && s.width == Dimension::Auto {
        // Equal-width columns.
        ts.flex_grow = 1.0;
        ts.flex_shrink = 1.0;
        ts.flex_basis = taffy::Dimension::Length(0.0);
    } else {
        ts.flex_grow = s.flex_grow;
        ts.flex_shrink = s.flex_shrink;
        ts.flex_basis = dimension(s.flex_basis, 0.0);
    }
    if s.display == style::Display::TableRow {
        ts.size.width = taffy::Dimension::Percent(1.0);
    }

    ts.margin = Rect {
        top: LengthPercentageAuto::Length(s.margin.top),
        right: LengthPercentageAuto::Length(s.margin.right),
        bottom: LengthPercentageAuto::Length(s.margin.bottom),
        left: LengthPercentageAuto::Length(s.margin.left),
    };
    ts.padding = Rect {
        top: LengthPercentage::Length(s.padding.top),
        right: LengthPercentage::Length(s.padding.right),
        bottom: LengthPercentage::Length(s.padding.bottom),
        left: LengthPercentage::Length(s.padding.left),
    };
    ts.border = Rect {
        top: LengthPercentage::Length(s.border.top),
        right: LengthPercentage::Length(s.border.right),
        bottom: LengthPercentage::Length(s.border.bottom),
        left: LengthPercentage::Length(s.border.left),
    };
    ts.gap = Size {
        width: LengthPercentage::Length(s.gap),
        height: LengthPercentage::Length(s.gap),
    };
    ts
}

/// Lay out `root` inside a content area `content_width` points wide.
/// Returns a synthetic root box whose single child is `root`'s box.
pub fn layout_document(
    root: &StyledElement,
    content_width: f32,
    images: &ImageStore,
) -> Result<LayoutBox> {
    let mut builder = LayoutBuilder::new(images);
    let mut child_ids = Vec::new();
    if let Some(id) = builder.build_element(root, content_width, content_width, None)? {
        child_ids.push(id);
    }

    let mut root_style = Style::default();
    root_style.display = taffy::Display::Flex;
    root_style.flex_direction = taffy::FlexDirection::Column;
    root_style.size = Size {
        width: taffy::Dimension::Length(content_width),
        height: taffy::Dimension::Auto,
    };
    let root_node = builder.taffy.new_with_children(root_style, &child_ids)?;

    builder.taffy.compute_layout(
        root_node,
        Size {
            width: AvailableSpace::Definite(content_width),
            height: AvailableSpace::MaxContent,
        },
    )?;
    log::debug!(
        "Laid out {} nodes ({} images available)",
        builder.taffy.total_node_count(),
        builder.images.len()
    );
    builder.extract(root_node, 0.0, 0.0)
}
