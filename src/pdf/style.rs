//! Style resolution – runs the cascade over the document tree and produces a
//! styled tree with a flat [`ComputedStyle`] per element.
//!
//! Cascade order, lowest to highest: built-in defaults per tag, author
//! stylesheets (by specificity, then source order), the inline `style`
//! attribute, then `!important` author and inline declarations. Text
//! properties inherit from the parent.

use std::collections::HashMap;

use super::css::{parse_declarations, Declaration, ElementKey, Stylesheet};
use super::dom::{Element, Node};
use super::text::TextStyle;

/// Font size of the root element, in points (16px).
pub const ROOT_FONT_SIZE: f32 = 12.0;

/// Points per CSS pixel.
pub const PT_PER_PX: f32 = 0.75;

/// Defaults applied before any author stylesheet.
const USER_AGENT_CSS: &str = r#"
html, body, div, section, article, header, footer, main, aside, nav, address,
blockquote, figure, figcaption, dl, dt, dd, p, h1, h2, h3, h4, h5, h6, ul, ol,
hr, pre, form, fieldset, center { display: block }
li { display: list-item }
table { display: table }
thead, tbody, tfoot { display: table-row-group }
tr { display: table-row }
td, th { display: table-cell; padding: 2pt 4pt }
img { display: inline-block }
head, title, style, script, link, meta, template, noscript { display: none }
h1 { font-size: 2em; font-weight: bold; margin: 0 0 0.4em }
h2 { font-size: 1.5em; font-weight: bold; margin: 0.5em 0 0.3em }
h3 { font-size: 1.17em; font-weight: bold; margin: 0.5em 0 0.25em }
h4 { font-weight: bold; margin: 0.4em 0 0.2em }
h5 { font-size: 0.83em; font-weight: bold; margin: 0.4em 0 0.2em }
h6 { font-size: 0.67em; font-weight: bold; margin: 0.4em 0 0.2em }
p, pre, dl, blockquote, figure { margin: 0 0 0.6em }
blockquote, dd { margin-left: 24pt }
ul, ol { margin: 0 0 0.6em; padding-left: 18pt }
ul { list-style-type: disc }
ul ul, ol ul { list-style-type: circle }
ol { list-style-type: decimal }
li { margin-bottom: 0.15em }
th, strong, b, dt { font-weight: bold }
em, i, cite, var { font-style: italic }
u, a { text-decoration: underline }
a { color: #0645ad }
code, pre, kbd, samp, tt { font-family: monospace }
small, sub, sup { font-size: 0.83em }
center { text-align: center }
hr { border-top: 0.75pt solid #999999; margin: 6pt 0 }
"#;

/// Fully resolved style for a single element.
#[derive(Debug, Clone, PartialEq)]
pub struct ComputedStyle {
    // Box
    pub display: Display,
    pub flex_direction: FlexDirection,
    pub flex_wrap: FlexWrap,
    pub flex_grow: f32,
    pub flex_shrink: f32,
    pub flex_basis: Dimension,
    pub justify_content: JustifyContent,
    pub align_items: AlignItems,
    pub gap: f32,
    pub width: Dimension,
    pub height: Dimension,
    pub min_width: Dimension,
    pub max_width: Dimension,
    pub margin: Edges,
    pub padding: Edges,
    pub border: Edges,
    pub border_color: Color,
    pub background_color: Color,

    // Text (inherited)
    pub font_size: f32,
    pub font_family: FontFamily,
    pub bold: bool,
    pub italic: bool,
    pub color: Color,
    pub text_align: TextAlign,
    /// Multiple of the font size.
    pub line_height: f32,
    pub underline: bool,
    pub text_transform: TextTransform,
    pub list_style: ListStyle,

    // Pagination
    pub page_break_before: bool,
    pub page_break_after: bool,
    pub page_break_inside_avoid: bool,
}

impl Default for ComputedStyle {
    fn default() -> Self {
        Self {
            display: Display::Inline,
            flex_direction: FlexDirection::Row,
            flex_wrap: FlexWrap::NoWrap,
            flex_grow: 0.0,
            flex_shrink: 1.0,
            flex_basis: Dimension::Auto,
            justify_content: JustifyContent::Start,
            align_items: AlignItems::Stretch,
            gap: 0.0,
            width: Dimension::Auto,
            height: Dimension::Auto,
            min_width: Dimension::Auto,
            max_width: Dimension::Auto,
            margin: Edges::ZERO,
            padding: Edges::ZERO,
            border: Edges::ZERO,
            border_color: Color::BLACK,
            background_color: Color::TRANSPARENT,
            font_size: ROOT_FONT_SIZE,
            font_family: FontFamily::Sans,
            bold: false,
            italic: false,
            color: Color::BLACK,
            text_align: TextAlign::Left,
            line_height: 1.25,
            underline: false,
            text_transform: TextTransform::None,
            list_style: ListStyle::Disc,
            page_break_before: false,
            page_break_after: false,
            page_break_inside_avoid: false,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Display {
    Block,
    Flex,
    Inline,
    InlineBlock,
    ListItem,
    Table,
    TableRow,
    TableCell,
    None,
}

impl Display {
    pub fn is_inline(self) -> bool {
        self == Display::Inline
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FlexDirection {
    Row,
    Column,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FlexWrap {
    NoWrap,
    Wrap,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum JustifyContent {
    Start,
    End,
    Center,
    SpaceBetween,
    SpaceAround,
    SpaceEvenly,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AlignItems {
    Start,
    End,
    Center,
    Stretch,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TextAlign {
    Left,
    Center,
    Right,
    Justify,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TextTransform {
    None,
    Uppercase,
    Lowercase,
    Capitalize,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ListStyle {
    Disc,
    Circle,
    Decimal,
    LowerAlpha,
    UpperAlpha,
    None,
}

impl ListStyle {
    /// Marker text for the `index`-th item (1-based).
    pub fn marker(self, index: u32) -> Option<String> {
        let letter = |base: u8| {
            let offset = ((index.max(1) - 1) % 26) as u8;
            char::from(base + offset)
        };
        match self {
            ListStyle::Disc => Some("\u{2022}".to_string()),
            ListStyle::Circle => Some("o".to_string()),
            ListStyle::Decimal => Some(format!("{index}.")),
            ListStyle::LowerAlpha => Some(format!("{}.", letter(b'a'))),
            ListStyle::UpperAlpha => Some(format!("{}.", letter(b'A'))),
            ListStyle::None => None,
        }
    }
}

/// Generic font family, mapped onto the PDF base fonts.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FontFamily {
    Sans,
    Serif,
    Mono,
}

impl FontFamily {
    /// First recognised family in a `font-family` list.
    pub fn from_css(value: &str) -> Option<Self> {
        value.split(',').find_map(|entry| {
            let name = entry.trim().trim_matches(['"', '\'']).to_ascii_lowercase();
            match name.as_str() {
                "monospace" | "courier" | "courier new" | "consolas" | "menlo" | "monaco" => {
                    Some(FontFamily::Mono)
                }
                "serif" | "times" | "times new roman" | "georgia" | "garamond" | "cambria"
                | "palatino" | "book antiqua" => Some(FontFamily::Serif),
                "sans-serif" | "helvetica" | "arial" | "verdana" | "tahoma" | "system-ui"
                | "helvetica neue" | "open sans" | "roboto" | "calibri" => Some(FontFamily::Sans),
                _ => None,
            }
        })
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Dimension {
    Auto,
    Pt(f32),
    Percent(f32),
}

/// Per-side lengths in points.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct Edges {
    pub top: f32,
    pub right: f32,
    pub bottom: f32,
    pub left: f32,
}

impl Edges {
    pub const ZERO: Self = Self {
        top: 0.0,
        right: 0.0,
        bottom: 0.0,
        left: 0.0,
    };

    pub fn uniform(v: f32) -> Self {
        Self {
            top: v,
            right: v,
            bottom: v,
            left: v,
        }
    }

    pub fn horizontal(&self) -> f32 {
        self.left + self.right
    }

    pub fn vertical(&self) -> f32 {
        self.top + self.bottom
    }

    /// CSS 1–4 value shorthand order.
    fn from_values(values: &[f32]) -> Option<Self> {
        let (top, right, bottom, left) = match *values {
            [a] => (a, a, a, a),
            [a, b] => (a, b, a, b),
            [a, b, c] => (a, b, c, b),
            [a, b, c, d] => (a, b, c, d),
            _ => return None,
        };
        Some(Self {
            top,
            right,
            bottom,
            left,
        })
    }

    fn side_mut(&mut self, side: &str) -> Option<&mut f32> {
        match side {
            "top" => Some(&mut self.top),
            "right" => Some(&mut self.right),
            "bottom" => Some(&mut self.bottom),
            "left" => Some(&mut self.left),
            _ => None,
        }
    }
}

/// RGBA colour (0.0 – 1.0).
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Color {
    pub r: f32,
    pub g: f32,
    pub b: f32,
    pub a: f32,
}

impl Color {
    pub const BLACK: Self = Self {
        r: 0.0,
        g: 0.0,
        b: 0.0,
        a: 1.0,
    };
    pub const WHITE: Self = Self {
        r: 1.0,
        g: 1.0,
        b: 1.0,
        a: 1.0,
    };
    pub const TRANSPARENT: Self = Self {
        r: 0.0,
        g: 0.0,
        b: 0.0,
        a: 0.0,
    };

    pub fn rgb(r: u8, g: u8, b: u8) -> Self {
        Self {
            r: r as f32 / 255.0,
            g: g as f32 / 255.0,
            b: b as f32 / 255.0,
            a: 1.0,
        }
    }

    pub fn is_transparent(&self) -> bool {
        self.a < 0.001
    }

    pub fn from_hex(hex: &str) -> Option<Self> {
        let hex = hex.trim_start_matches('#');
        let channel = |s: &str| u8::from_str_radix(s, 16).ok();
        match hex.len() {
            6 => Some(Self::rgb(
                channel(&hex[0..2])?,
                channel(&hex[2..4])?,
                channel(&hex[4..6])?,
            )),
            3 => Some(Self::rgb(
                channel(&hex[0..1].repeat(2))?,
                channel(&hex[1..2].repeat(2))?,
                channel(&hex[2..3].repeat(2))?,
            )),
            _ => None,
        }
    }

    /// Hex, `rgb()`/`rgba()`, a basic named colour or `transparent`.
    pub fn parse(value: &str) -> Option<Self> {
        let value = value.trim().to_ascii_lowercase();
        if value.starts_with('#') {
            return Self::from_hex(&value);
        }
        if let Some(args) = value
            .strip_prefix("rgba(")
            .or_else(|| value.strip_prefix("rgb("))
            .and_then(|rest| rest.strip_suffix(')'))
        {
            let parts: Vec<&str> = args
                .split(|c: char| c == ',' || c == '/' || c.is_whitespace())
                .filter(|p| !p.is_empty())
                .collect();
            if parts.len() < 3 {
                return None;
            }
            let channel = |p: &str| -> Option<f32> {
                match p.strip_suffix('%') {
                    Some(pct) => pct.parse::<f32>().ok().map(|v| v / 100.0),
                    None => p.parse::<f32>().ok().map(|v| v / 255.0),
                }
            };
            let alpha = match parts.get(3) {
                Some(a) => match a.strip_suffix('%') {
                    Some(pct) => pct.parse::<f32>().ok()? / 100.0,
                    None => a.parse::<f32>().ok()?,
                },
                None => 1.0,
            };
            return Some(Self {
                r: channel(parts[0])?.clamp(0.0, 1.0),
                g: channel(parts[1])?.clamp(0.0, 1.0),
                b: channel(parts[2])?.clamp(0.0, 1.0),
                a: alpha.clamp(0.0, 1.0),
            });
        }
        let named = match value.as_str() {
            "transparent" => return Some(Self::TRANSPARENT),
            "black" => Self::BLACK,
            "white" => Self::WHITE,
            "gray" | "grey" => Self::rgb(128, 128, 128),
            "darkgray" | "darkgrey" => Self::rgb(169, 169, 169),
            "dimgray" | "dimgrey" => Self::rgb(105, 105, 105),
            "lightgray" | "lightgrey" => Self::rgb(211, 211, 211),
            "silver" => Self::rgb(192, 192, 192),
            "red" => Self::rgb(255, 0, 0),
            "maroon" => Self::rgb(128, 0, 0),
            "orange" => Self::rgb(255, 165, 0),
            "yellow" => Self::rgb(255, 255, 0),
            "olive" => Self::rgb(128, 128, 0),
            "green" => Self::rgb(0, 128, 0),
            "lime" => Self::rgb(0, 255, 0),
            "teal" => Self::rgb(0, 128, 128),
            "aqua" | "cyan" => Self::rgb(0, 255, 255),
            "blue" => Self::rgb(0, 0, 255),
            "navy" => Self::rgb(0, 0, 128),
            "purple" => Self::rgb(128, 0, 128),
            "fuchsia" | "magenta" => Self::rgb(255, 0, 255),
            "steelblue" => Self::rgb(70, 130, 180),
            "slategray" | "slategrey" => Self::rgb(112, 128, 144),
            _ => return None,
        };
        Some(named)
    }
}

// ---------------------------------------------------------------------------
// Value parsing
// ---------------------------------------------------------------------------

/// Absolute length in points; `em` resolves against `font_size`.
pub fn parse_length(value: &str, font_size: f32) -> Option<f32> {
    let value = value.trim().to_ascii_lowercase();
    if value == "0" {
        return Some(0.0);
    }
    let split = value
        .find(|c: char| !(c.is_ascii_digit() || c == '.' || c == '-' || c == '+'))
        .unwrap_or(value.len());
    let number: f32 = value[..split].parse().ok()?;
    let factor = match &value[split..] {
        "px" => PT_PER_PX,
        "pt" => 1.0,
        "em" => font_size,
        "rem" => ROOT_FONT_SIZE,
        "mm" => 72.0 / 25.4,
        "cm" => 72.0 / 2.54,
        "in" => 72.0,
        "pc" => 12.0,
        _ => return None,
    };
    Some(number * factor)
}

fn parse_dimension(value: &str, font_size: f32) -> Option<Dimension> {
    let value = value.trim();
    if value.eq_ignore_ascii_case("auto") || value.eq_ignore_ascii_case("none") {
        return Some(Dimension::Auto);
    }
    if let Some(pct) = value.strip_suffix('%') {
        return pct.trim().parse().ok().map(Dimension::Percent);
    }
    parse_length(value, font_size).map(Dimension::Pt)
}

pub fn parse_edges(value: &str, font_size: f32) -> Option<Edges> {
    let values: Option<Vec<f32>> = value
        .split_whitespace()
        .map(|v| {
            if v.eq_ignore_ascii_case("auto") {
                Some(0.0)
            } else {
                parse_length(v, font_size)
            }
        })
        .collect();
    Edges::from_values(&values?)
}

fn border_keyword_width(token: &str) -> Option<f32> {
    match token {
        "thin" => Some(1.0 * PT_PER_PX),
        "medium" => Some(3.0 * PT_PER_PX),
        "thick" => Some(5.0 * PT_PER_PX),
        _ => None,
    }
}

fn is_border_style(token: &str) -> bool {
    matches!(
        token,
        "none"
            | "hidden"
            | "solid"
            | "dashed"
            | "dotted"
            | "double"
            | "groove"
            | "ridge"
            | "inset"
            | "outset"
    )
}

fn is_break(value: &str) -> bool {
    matches!(value, "always" | "page" | "left" | "right")
}

// ---------------------------------------------------------------------------
// Declaration application
// ---------------------------------------------------------------------------

impl ComputedStyle {
    /// Initial values with the inherited properties copied from `parent`.
    pub fn inherit_from(parent: &ComputedStyle) -> Self {
        Self {
            font_size: parent.font_size,
            font_family: parent.font_family,
            bold: parent.bold,
            italic: parent.italic,
            color: parent.color,
            text_align: parent.text_align,
            line_height: parent.line_height,
            underline: parent.underline,
            text_transform: parent.text_transform,
            list_style: parent.list_style,
            ..Self::default()
        }
    }

    /// Style of the text runs this element directly contains.
    pub fn text_style(&self) -> TextStyle {
        TextStyle {
            family: self.font_family,
            size: self.font_size,
            bold: self.bold,
            italic: self.italic,
            color: self.color,
            underline: self.underline,
            line_height: self.font_size * self.line_height,
        }
    }

    fn apply_font_size(&mut self, value: &str, parent_size: f32) {
        let value = value.trim().to_ascii_lowercase();
        let size = match value.as_str() {
            "xx-small" => Some(ROOT_FONT_SIZE * 0.6),
            "x-small" => Some(ROOT_FONT_SIZE * 0.75),
            "small" => Some(ROOT_FONT_SIZE * 0.89),
            "medium" => Some(ROOT_FONT_SIZE),
            "large" => Some(ROOT_FONT_SIZE * 1.2),
            "x-large" => Some(ROOT_FONT_SIZE * 1.5),
            "xx-large" => Some(ROOT_FONT_SIZE * 2.0),
            "smaller" => Some(parent_size / 1.2),
            "larger" => Some(parent_size * 1.2),
            v => match v.strip_suffix('%') {
                Some(pct) => pct.parse::<f32>().ok().map(|p| parent_size * p / 100.0),
                None => parse_length(v, parent_size),
            },
        };
        match size {
            Some(size) if size > 0.0 => self.font_size = size,
            _ => log::warn!("Ignoring font-size: {value}"),
        }
    }

    fn apply_line_height(&mut self, value: &str) {
        let value = value.trim();
        if value.eq_ignore_ascii_case("normal") {
            self.line_height = 1.2;
        } else if let Ok(multiple) = value.parse::<f32>() {
            self.line_height = multiple;
        } else if let Some(pct) = value.strip_suffix('%') {
            if let Ok(p) = pct.parse::<f32>() {
                self.line_height = p / 100.0;
            }
        } else if let Some(pt) = parse_length(value, self.font_size) {
            self.line_height = pt / self.font_size;
        }
    }

    /// `font: [style] [weight] size[/line-height] family`.
    fn apply_font_shorthand(&mut self, value: &str, parent_size: f32) {
        let mut tokens = value.split_whitespace();
        self.bold = false;
        self.italic = false;
        for token in tokens.by_ref() {
            let lower = token.to_ascii_lowercase();
            match lower.as_str() {
                "italic" | "oblique" => self.italic = true,
                "bold" | "bolder" | "600" | "700" | "800" | "900" => self.bold = true,
                "normal" | "lighter" | "small-caps" | "100" | "200" | "300" | "400" | "500" => {}
                size => {
                    let (size, line_height) = match size.split_once('/') {
                        Some((s, lh)) => (s, Some(lh)),
                        None => (size, None),
                    };
                    self.apply_font_size(size, parent_size);
                    if let Some(lh) = line_height {
                        self.apply_line_height(lh);
                    }
                    break;
                }
            }
        }
        let family: Vec<&str> = tokens.collect();
        if let Some(family) = FontFamily::from_css(&family.join(" ")) {
            self.font_family = family;
        }
    }

    fn apply_border(&mut self, sides: &[&str], value: &str) {
        let mut width = None;
        let mut visible = true;
        for token in value.split_whitespace() {
            let lower = token.to_ascii_lowercase();
            if is_border_style(&lower) {
                visible = !matches!(lower.as_str(), "none" | "hidden");
            } else if let Some(w) =
                border_keyword_width(&lower).or_else(|| parse_length(&lower, self.font_size))
            {
                width = Some(w);
            } else if let Some(color) = Color::parse(&lower) {
                self.border_color = color;
            }
        }
        let width = if visible {
            width.unwrap_or(3.0 * PT_PER_PX)
        } else {
            0.0
        };
        for side in sides {
            if let Some(slot) = self.border.side_mut(side) {
                *slot = width;
            }
        }
    }

    fn apply_flex_shorthand(&mut self, value: &str) {
        let tokens: Vec<&str> = value.split_whitespace().collect();
        match tokens.as_slice() {
            ["none"] => {
                self.flex_grow = 0.0;
                self.flex_shrink = 0.0;
                self.flex_basis = Dimension::Auto;
            }
            ["auto"] => {
                self.flex_grow = 1.0;
                self.flex_shrink = 1.0;
                self.flex_basis = Dimension::Auto;
            }
            [grow, rest @ ..] => {
                let Ok(grow) = grow.parse::<f32>() else {
                    return;
                };
                self.flex_grow = grow;
                self.flex_shrink = 1.0;
                self.flex_basis = Dimension::Pt(0.0);
                for token in rest {
                    if let Ok(shrink) = token.parse::<f32>() {
                        self.flex_shrink = shrink;
                    } else if let Some(basis) = parse_dimension(token, self.font_size) {
                        self.flex_basis = basis;
                    }
                }
            }
            [] => {}
        }
    }

    /// Apply one declaration. `font-size` em/% resolve against `parent_size`.
    pub fn apply(&mut self, decl: &Declaration, parent_size: f32) {
        let value = decl.value.trim();
        let lower = value.to_ascii_lowercase();
        let em = self.font_size;
        match decl.property.as_str() {
            "display" => {
                self.display = match lower.as_str() {
                    "block"
                    | "table-row-group"
                    | "table-header-group"
                    | "table-footer-group"
                    | "grid" => Display::Block,
                    "flex" | "inline-flex" => Display::Flex,
                    "inline" => Display::Inline,
                    "inline-block" => Display::InlineBlock,
                    "list-item" => Display::ListItem,
                    "table" => Display::Table,
                    "table-row" => Display::TableRow,
                    "table-cell" => Display::TableCell,
                    "none" => Display::None,
                    other => {
                        log::warn!("Ignoring display: {other}");
                        self.display
                    }
                }
            }
            "flex-direction" => {
                self.flex_direction = match lower.as_str() {
                    "column" | "column-reverse" => FlexDirection::Column,
                    _ => FlexDirection::Row,
                }
            }
            "flex-wrap" => {
                self.flex_wrap = match lower.as_str() {
                    "wrap" | "wrap-reverse" => FlexWrap::Wrap,
                    _ => FlexWrap::NoWrap,
                }
            }
            "flex" => self.apply_flex_shorthand(&lower),
            "flex-grow" => self.flex_grow = lower.parse().unwrap_or(self.flex_grow),
            "flex-shrink" => self.flex_shrink = lower.parse().unwrap_or(self.flex_shrink),
            "flex-basis" => {
                if let Some(d) = parse_dimension(&lower, em) {
                    self.flex_basis = d;
                }
            }
            "justify-content" => {
                self.justify_content = match lower.as_str() {
                    "flex-end" | "end" | "right" => JustifyContent::End,
                    "center" => JustifyContent::Center,
                    "space-between" => JustifyContent::SpaceBetween,
                    "space-around" => JustifyContent::SpaceAround,
                    "space-evenly" => JustifyContent::SpaceEvenly,
                    _ => JustifyContent::Start,
                }
            }
            "align-items" => {
                self.align_items = match lower.as_str() {
                    "flex-end" | "end" => AlignItems::End,
                    "center" => AlignItems::Center,
                    "stretch" | "normal" => AlignItems::Stretch,
                    _ => AlignItems::Start,
                }
            }
            "gap" | "column-gap" | "grid-gap" => {
                if let Some(gap) = lower
                    .split_whitespace()
                    .next()
                    .and_then(|v| parse_length(v, em))
                {
                    self.gap = gap;
                }
            }
            "width" | "height" | "min-width" | "max-width" => {
                if let Some(d) = parse_dimension(&lower, em) {
                    match decl.property.as_str() {
                        "width" => self.width = d,
                        "height" => self.height = d,
                        "min-width" => self.min_width = d,
                        _ => self.max_width = d,
                    }
                }
            }
            "margin" => {
                if let Some(edges) = parse_edges(&lower, em) {
                    self.margin = edges;
                }
            }
            "padding" => {
                if let Some(edges) = parse_edges(&lower, em) {
                    self.padding = edges;
                }
            }
            "border" => self.apply_border(&["top", "right", "bottom", "left"], value),
            "border-width" => {
                let widths: Option<Vec<f32>> = lower
                    .split_whitespace()
                    .map(|v| border_keyword_width(v).or_else(|| parse_length(v, em)))
                    .collect();
                if let Some(edges) = widths.as_deref().and_then(Edges::from_values) {
                    self.border = edges;
                }
            }
            "border-color" => {
                if let Some(color) = lower.split_whitespace().next().and_then(Color::parse) {
                    self.border_color = color;
                }
            }
            "border-style" if matches!(lower.as_str(), "none" | "hidden") => {
                self.border = Edges::ZERO
            }
            "background" | "background-color" => {
                match lower.split_whitespace().find_map(Color::parse) {
                    Some(color) => self.background_color = color,
                    None => log::debug!("No usable colour in background: {value}"),
                }
            }
            "color" => match Color::parse(&lower) {
                Some(color) => self.color = color,
                None => log::warn!("Ignoring color: {value}"),
            },
            "font-size" => self.apply_font_size(&lower, parent_size),
            "font" => self.apply_font_shorthand(value, parent_size),
            "font-family" => {
                if let Some(family) = FontFamily::from_css(value) {
                    self.font_family = family;
                }
            }
            "font-weight" => {
                self.bold = match lower.as_str() {
                    "bold" | "bolder" => true,
                    "normal" | "lighter" => false,
                    n => n.parse::<u32>().map(|w| w >= 600).unwrap_or(self.bold),
                }
            }
            "font-style" => self.italic = matches!(lower.as_str(), "italic" | "oblique"),
            "text-align" => {
                self.text_align = match lower.as_str() {
                    "center" => TextAlign::Center,
                    "right" | "end" => TextAlign::Right,
                    "justify" => TextAlign::Justify,
                    _ => TextAlign::Left,
                }
            }
            "line-height" => self.apply_line_height(&lower),
            "text-decoration" | "text-decoration-line" => {
                if lower.contains("underline") {
                    self.underline = true;
                } else if lower.contains("none") {
                    self.underline = false;
                }
            }
            "text-transform" => {
                self.text_transform = match lower.as_str() {
                    "uppercase" => TextTransform::Uppercase,
                    "lowercase" => TextTransform::Lowercase,
                    "capitalize" => TextTransform::Capitalize,
                    _ => TextTransform::None,
                }
            }
            "list-style" | "list-style-type" => {
                let kind = lower.split_whitespace().find_map(|token| match token {
                    "disc" | "square" => Some(ListStyle::Disc),
                    "circle" => Some(ListStyle::Circle),
                    "decimal" | "decimal-leading-zero" => Some(ListStyle::Decimal),
                    "lower-alpha" | "lower-latin" => Some(ListStyle::LowerAlpha),
                    "upper-alpha" | "upper-latin" => Some(ListStyle::UpperAlpha),
                    "none" => Some(ListStyle::None),
                    _ => None,
                });
                if let Some(kind) = kind {
                    self.list_style = kind;
                }
            }
            "page-break-before" | "break-before" => self.page_break_before = is_break(&lower),
            "page-break-after" | "break-after" => self.page_break_after = is_break(&lower),
            "page-break-inside" | "break-inside" => {
                self.page_break_inside_avoid = lower.starts_with("avoid")
            }
            property => {
                if let Some(rest) = property.strip_prefix("margin-") {
                    if let Some(slot) = self.margin.side_mut(rest) {
                        *slot = if lower == "auto" {
                            0.0
                        } else {
                            parse_length(&lower, em).unwrap_or(*slot)
                        };
                    }
                } else if let Some(rest) = property.strip_prefix("padding-") {
                    if let Some(slot) = self.padding.side_mut(rest) {
                        *slot = parse_length(&lower, em).unwrap_or(*slot);
                    }
                } else if let Some(rest) = property.strip_prefix("border-") {
                    self.apply_border_side(rest, value);
                } else {
                    log::debug!("Ignoring unsupported property {property}");
                }
            }
        }
    }

    /// `border-<side>`, `border-<side>-width`, `border-<side>-color`.
    fn apply_border_side(&mut self, rest: &str, value: &str) {
        let (side, part) = rest.split_once('-').unwrap_or((rest, ""));
        if self.border.side_mut(side).is_none() {
            log::debug!("Ignoring unsupported property border-{rest}");
            return;
        }
        let lower = value.trim().to_ascii_lowercase();
        match part {
            "" => self.apply_border(&[side], value),
            "width" => {
                let em = self.font_size;
                if let (Some(w), Some(slot)) = (
                    border_keyword_width(&lower).or_else(|| parse_length(&lower, em)),
                    self.border.side_mut(side),
                ) {
                    *slot = w;
                }
            }
            "color" => {
                if let Some(color) = Color::parse(&lower) {
                    self.border_color = color;
                }
            }
            "style" if matches!(lower.as_str(), "none" | "hidden") => {
                if let Some(slot) = self.border.side_mut(side) {
                    *slot = 0.0;
                }
            }
            _ => {}
        }
    }
}

// ---------------------------------------------------------------------------
// Styled tree
// ---------------------------------------------------------------------------

/// An element annotated with its computed style. `display: none` elements
/// are dropped while building.
#[derive(Debug, Clone)]
pub struct StyledElement {
    pub name: String,
    pub attributes: HashMap<String, String>,
    pub style: ComputedStyle,
    pub children: Vec<StyledNode>,
}

impl StyledElement {
    pub fn attr(&self, name: &str) -> Option<&str> {
        self.attributes.get(name).map(String::as_str)
    }
}

#[derive(Debug, Clone)]
pub enum StyledNode {
    Element(StyledElement),
    Text { text: String, style: TextStyle },
}

struct Cascade {
    user_agent: Stylesheet,
    author: Stylesheet,
}

/// Run the cascade over `body` and its descendants.
pub fn build_styled_tree(body: &Element, author: Stylesheet) -> StyledElement {
    let cascade = Cascade {
        user_agent: Stylesheet::parse(USER_AGENT_CSS),
        author,
    };
    let mut ancestors = Vec::new();
    let root = ComputedStyle::default();
    let mut styled = style_element(body, &root, &cascade, &mut ancestors);
    // The root always generates a box.
    if styled.style.display == Display::None || styled.style.display.is_inline() {
        styled.style.display = Display::Block;
    }
    styled
}

fn style_element<'e>(
    element: &'e Element,
    parent: &ComputedStyle,
    cascade: &Cascade,
    ancestors: &mut Vec<ElementKey<'e>>,
) -> StyledElement {
    let key = ElementKey {
        name: &element.name,
        id: element.id(),
        class: element.attr("class"),
    };
    let style = compute_style(element, &key, parent, cascade, ancestors);

    ancestors.push(key);
    let mut children = Vec::with_capacity(element.children.len());
    for child in &element.children {
        match child {
            Node::Element(e) => {
                let styled = style_element(e, &style, cascade, ancestors);
                if styled.style.display != Display::None {
                    children.push(StyledNode::Element(styled));
                }
            }
            Node::Text(text) => children.push(StyledNode::Text {
                text: transform_text(text, style.text_transform),
                style: style.text_style(),
            }),
        }
    }
    ancestors.pop();

    StyledElement {
        name: element.name.clone(),
        attributes: element.attributes.clone(),
        style,
        children,
    }
}

fn compute_style(
    element: &Element,
    key: &ElementKey<'_>,
    parent: &ComputedStyle,
    cascade: &Cascade,
    ancestors: &[ElementKey<'_>],
) -> ComputedStyle {
    let inline = element.attr("style").map(parse_declarations).unwrap_or_default();
    let user_agent = cascade.user_agent.matching(key, ancestors);
    let author = cascade.author.matching(key, ancestors);

    let author_decls = || author.iter().flat_map(|(_, _, decls)| decls.iter());
    let mut ordered: Vec<&Declaration> = user_agent
        .iter()
        .flat_map(|(_, _, decls)| decls.iter())
        .collect();
    ordered.extend(author_decls().filter(|d| !d.important));
    ordered.extend(inline.iter().filter(|d| !d.important));
    ordered.extend(author_decls().filter(|d| d.important));
    ordered.extend(inline.iter().filter(|d| d.important));

    let mut style = ComputedStyle::inherit_from(parent);
    // Font size first so em lengths in the second pass see the final size.
    for decl in ordered.iter().filter(|d| d.property == "font-size" || d.property == "font") {
        style.apply(decl, parent.font_size);
    }
    for decl in &ordered {
        style.apply(decl, parent.font_size);
    }
    style
}

fn transform_text(text: &str, transform: TextTransform) -> String {
    match transform {
        TextTransform::None => text.to_string(),
        TextTransform::Uppercase => text.to_uppercase(),
        TextTransform::Lowercase => text.to_lowercase(),
        TextTransform::Capitalize => {
            let mut out = String::with_capacity(text.len());
            let mut at_word_start = true;
            for c in text.chars() {
                if at_word_start && c.is_alphabetic() {
                    out.extend(c.to_uppercase());
                } else {
                    out.push(c);
                }
                at_word_start = c.is_whitespace();
            }
            out
        }
    }
}
