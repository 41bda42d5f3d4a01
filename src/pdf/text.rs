//! Inline formatting: whitespace collapsing and greedy line breaking over
//! runs of differently styled text.

use super::fonts::{ascent, text_width};
use super::style::{Color, FontFamily};

/// Text properties of one run.
#[derive(Debug, Clone, PartialEq)]
pub struct TextStyle {
    pub family: FontFamily,
    pub size: f32,
    pub bold: bool,
    pub italic: bool,
    pub color: Color,
    pub underline: bool,
    /// Absolute line height in points.
    pub line_height: f32,
}

/// A piece of inline content, in document order.
#[derive(Debug, Clone)]
pub enum InlineItem {
    Text(String, TextStyle),
    /// `<br/>`; the style sizes an otherwise empty line.
    Break(TextStyle),
}

impl InlineItem {
    /// True when the items would produce no visible text.
    pub fn all_blank(items: &[InlineItem]) -> bool {
        items.iter().all(|item| match item {
            InlineItem::Text(text, _) => text.chars().all(is_collapsible),
            InlineItem::Break(_) => false,
        })
    }
}

/// Same-styled text placed on a line.
#[derive(Debug, Clone, PartialEq)]
pub struct Fragment {
    pub text: String,
    pub style: TextStyle,
    /// Offset from the start of the line.
    pub x: f32,
    pub width: f32,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Line {
    pub fragments: Vec<Fragment>,
    pub width: f32,
    /// Offset of the line box from the top of the block.
    pub top: f32,
    pub height: f32,
    /// Offset of the baseline from the top of the line box.
    pub baseline: f32,
}

/// Wrapped inline content.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct TextBlock {
    pub lines: Vec<Line>,
    /// Widest line.
    pub width: f32,
    pub height: f32,
}

enum Token<'a> {
    Word {
        pieces: Vec<(&'a str, &'a TextStyle)>,
        space_before: bool,
    },
    Break(&'a TextStyle),
}

fn is_collapsible(c: char) -> bool {
    c.is_whitespace() && c != '\u{a0}'
}

/// Split into maximal runs of collapsible whitespace and other text.
fn chunks(text: &str) -> impl Iterator<Item = (bool, &str)> {
    let mut rest = text;
    std::iter::from_fn(move || {
        let first = rest.chars().next()?;
        let space = is_collapsible(first);
        let end = rest
            .find(|c: char| is_collapsible(c) != space)
            .unwrap_or(rest.len());
        let (chunk, tail) = rest.split_at(end);
        rest = tail;
        Some((space, chunk))
    })
}

fn tokenize(items: &[InlineItem]) -> Vec<Token<'_>> {
    let mut tokens = Vec::new();
    let mut gap = false;
    let mut glue = false;
    for item in items {
        match item {
            InlineItem::Break(style) => {
                tokens.push(Token::Break(style));
                gap = false;
                glue = false;
            }
            InlineItem::Text(text, style) => {
                for (space, chunk) in chunks(text) {
                    if space {
                        gap = true;
                        glue = false;
                        continue;
                    }
                    if glue {
                        if let Some(Token::Word { pieces, .. }) = tokens.last_mut() {
                            pieces.push((chunk, style));
                            continue;
                        }
                    }
                    tokens.push(Token::Word {
                        pieces: vec![(chunk, style)],
                        space_before: gap,
                    });
                    gap = false;
                    glue = true;
                }
            }
        }
    }
    tokens
}

#[derive(Default)]
struct LineBuilder {
    fragments: Vec<Fragment>,
    width: f32,
}

impl LineBuilder {
    fn is_empty(&self) -> bool {
        self.fragments.is_empty()
    }

    fn push(&mut self, text: &str, style: &TextStyle, space: f32) {
        let width = text_width(text, style);
        match self.fragments.last_mut() {
            Some(last) if last.style == *style => {
                if space > 0.0 {
                    last.text.push(' ');
                }
                last.text.push_str(text);
                last.width += space + width;
            }
            _ => self.fragments.push(Fragment {
                text: text.to_string(),
                style: style.clone(),
                x: self.width + space,
                width,
            }),
        }
        self.width += space + width;
    }

    fn finish(self, empty_style: &TextStyle) -> Line {
        let height = self
            .fragments
            .iter()
            .map(|f| f.style.line_height)
            .fold(0.0f32, f32::max);
        let (height, size, family) = match self
            .fragments
            .iter()
            .max_by(|a, b| a.style.size.total_cmp(&b.style.size))
        {
            Some(f) => (height, f.style.size, f.style.family),
            None => (empty_style.line_height, empty_style.size, empty_style.family),
        };
        Line {
            fragments: self.fragments,
            width: self.width,
            top: 0.0,
            height,
            baseline: (height - size) / 2.0 + size * ascent(family),
        }
    }
}

impl TextBlock {
    /// Collapse whitespace and break `items` into lines no wider than
    /// `max_width` where possible. A word wider than the line overflows.
    pub fn layout(items: &[InlineItem], max_width: f32) -> Self {
        let mut lines = Vec::new();
        let mut line = LineBuilder::default();
        let mut last_style = None;

        for token in tokenize(items) {
            match token {
                Token::Break(style) => {
                    lines.push(std::mem::take(&mut line).finish(style));
                    last_style = Some(style);
                }
                Token::Word {
                    pieces,
                    space_before,
                } => {
                    let first_style = pieces[0].1;
                    let word_width: f32 = pieces.iter().map(|(t, s)| text_width(t, s)).sum();
                    let mut space = if space_before && !line.is_empty() {
                        text_width(" ", first_style)
                    } else {
                        0.0
                    };
                    if !line.is_empty() && line.width + space + word_width > max_width + 0.01 {
                        lines.push(std::mem::take(&mut line).finish(first_style));
                        space = 0.0;
                    }
                    for (i, (text, style)) in pieces.into_iter().enumerate() {
                        line.push(text, style, if i == 0 { space } else { 0.0 });
                    }
                    last_style = Some(first_style);
                }
            }
        }
        if !line.is_empty() {
            if let Some(style) = last_style {
                lines.push(line.finish(style));
            }
        }

        let mut top = 0.0;
        for line in &mut lines {
            line.top = top;
            top += line.height;
        }
        let width = lines.iter().map(|l| l.width).fold(0.0f32, f32::max);
        TextBlock {
            lines,
            width,
            height: top,
        }
    }
}
