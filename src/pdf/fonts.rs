//! Text measurement against the PDF base-14 fonts.
//!
//! No font files are embedded, so glyph advances come from the Helvetica
//! and Helvetica-Bold AFM width tables. Times is approximated from
//! Helvetica; Courier is monospaced at 600 units.

use printpdf::BuiltinFont;

use super::style::FontFamily;
use super::text::TextStyle;

/// Helvetica advances for ASCII 32..=126, in 1/1000 em.
const HELVETICA: [u16; 95] = [
    278, 278, 355, 556, 556, 889, 667, 191, 333, 333, 389, 584, 278, 333, 278, 278, // ' '..'/'
    556, 556, 556, 556, 556, 556, 556, 556, 556, 556, // '0'..'9'
    278, 278, 584, 584, 584, 556, 1015, // ':'..'@'
    667, 667, 722, 722, 667, 611, 778, 722, 278, 500, 667, 556, 833, // 'A'..'M'
    722, 778, 667, 778, 722, 667, 611, 722, 667, 944, 667, 667, 611, // 'N'..'Z'
    278, 278, 278, 469, 556, 333, // '['..'`'
    556, 556, 500, 556, 556, 278, 556, 556, 222, 222, 500, 222, 833, // 'a'..'m'
    556, 556, 556, 556, 333, 500, 278, 556, 500, 722, 500, 500, 500, // 'n'..'z'
    334, 260, 334, 584, // '{'..'~'
];

/// Helvetica-Bold advances for ASCII 32..=126, in 1/1000 em.
const HELVETICA_BOLD: [u16; 95] = [
    278, 333, 474, 556, 556, 889, 722, 238, 333, 333, 389, 584, 278, 333, 278, 278,
    556, 556, 556, 556, 556, 556, 556, 556, 556, 556,
    333, 333, 584, 584, 584, 611, 975,
    722, 722, 722, 722, 667, 611, 778, 722, 278, 556, 722, 611, 833,
    722, 778, 667, 778, 722, 667, 611, 722, 667, 944, 667, 667, 611,
    333, 278, 333, 584, 556, 333,
    556, 611, 556, 611, 556, 333, 611, 611, 278, 278, 556, 278, 889,
    611, 611, 611, 611, 389, 556, 333, 611, 556, 778, 556, 556, 500,
    389, 280, 389, 584,
];

const COURIER_ADVANCE: f32 = 600.0;
const SERIF_SCALE: f32 = 0.9;

/// Advance of `c` in 1/1000 em.
pub fn char_advance(c: char, family: FontFamily, bold: bool) -> f32 {
    if family == FontFamily::Mono {
        return COURIER_ADVANCE;
    }
    let table = if bold { &HELVETICA_BOLD } else { &HELVETICA };
    let advance = match c as u32 {
        code @ 32..=126 => f32::from(table[(code - 32) as usize]),
        0xA0 => 278.0,
        0xB7 => 278.0,
        0x2022 => 350.0,
        0x2013 => 556.0,
        0x2014 => 1000.0,
        0x2018 | 0x2019 => 222.0,
        0x201C | 0x201D => 333.0,
        0x2026 => 1000.0,
        _ if c.is_uppercase() => 722.0,
        _ if bold => 611.0,
        _ => 556.0,
    };
    match family {
        FontFamily::Serif => advance * SERIF_SCALE,
        _ => advance,
    }
}

/// Width of `text` in points.
pub fn text_width(text: &str, style: &TextStyle) -> f32 {
    let units: f32 = text
        .chars()
        .map(|c| char_advance(c, style.family, style.bold))
        .sum();
    units * style.size / 1000.0
}

/// Distance from the top of the em box to the baseline, as a fraction of
/// the font size.
pub fn ascent(family: FontFamily) -> f32 {
    match family {
        FontFamily::Sans => 0.718,
        FontFamily::Serif => 0.683,
        FontFamily::Mono => 0.629,
    }
}

/// The base-14 font for a family and weight/slant.
pub fn builtin_font(family: FontFamily, bold: bool, italic: bool) -> BuiltinFont {
    match (family, bold, italic) {
        (FontFamily::Sans, false, false) => BuiltinFont::Helvetica,
        (FontFamily::Sans, true, false) => BuiltinFont::HelveticaBold,
        (FontFamily::Sans, false, true) => BuiltinFont::HelveticaOblique,
        (FontFamily::Sans, true, true) => BuiltinFont::HelveticaBoldOblique,
        (FontFamily::Serif, false, false) => BuiltinFont::TimesRoman,
        (FontFamily::Serif, true, false) => BuiltinFont::TimesBold,
        (FontFamily::Serif, false, true) => BuiltinFont::TimesItalic,
        (FontFamily::Serif, true, true) => BuiltinFont::TimesBoldItalic,
        (FontFamily::Mono, false, false) => BuiltinFont::Courier,
        (FontFamily::Mono, true, false) => BuiltinFont::CourierBold,
        (FontFamily::Mono, false, true) => BuiltinFont::CourierOblique,
        (FontFamily::Mono, true, true) => BuiltinFont::CourierBoldOblique,
    }
}
