//! Stylesheet parsing and selector matching for the supported CSS subset.
//!
//! Selectors: type, `.class`, `#id`, `*`, compounds of those, descendant and
//! child (`>`) combinators, comma-separated lists. Anything else (pseudo
//! classes, attribute selectors, sibling combinators) makes the selector
//! unsupported and it is dropped.

/// One `property: value` pair.
#[derive(Debug, Clone, PartialEq)]
pub struct Declaration {
    pub property: String,
    pub value: String,
    pub important: bool,
}

/// A compound selector such as `p.lead#intro`.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Compound {
    pub tag: Option<String>,
    pub id: Option<String>,
    pub classes: Vec<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Combinator {
    Descendant,
    Child,
}

/// A complex selector: compounds left to right, `combinators[i]` sits
/// between `compounds[i]` and `compounds[i + 1]`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Selector {
    compounds: Vec<Compound>,
    combinators: Vec<Combinator>,
}

/// `(ids, classes, types)`, compared lexicographically.
pub type Specificity = (u32, u32, u32);

/// The identity of an element as selectors see it.
#[derive(Debug, Clone, Copy)]
pub struct ElementKey<'a> {
    pub name: &'a str,
    pub id: Option<&'a str>,
    pub class: Option<&'a str>,
}

#[derive(Debug, Clone)]
pub struct Rule {
    pub selectors: Vec<Selector>,
    pub declarations: Vec<Declaration>,
    /// Position in the cascade, across every stylesheet of the document.
    pub order: usize,
}

#[derive(Debug, Clone, Default)]
pub struct Stylesheet {
    pub rules: Vec<Rule>,
    /// Declarations from `@page` blocks.
    pub page: Vec<Declaration>,
}

impl Stylesheet {
    pub fn parse(css: &str) -> Self {
        let mut sheet = Stylesheet::default();
        sheet.append(css);
        sheet
    }

    /// Parse `css` and add its rules after the ones already present.
    pub fn append(&mut self, css: &str) {
        let css = strip_comments(css);
        self.parse_block(&css);
    }

    fn parse_block(&mut self, css: &str) {
        let mut rest = css.trim_start();
        while !rest.is_empty() {
            if let Some(at_rule) = rest.strip_prefix('@') {
                rest = self.parse_at_rule(at_rule);
            } else {
                let Some(open) = rest.find('{') else {
                    log::warn!("Ignoring trailing CSS without a block: {rest:?}");
                    break;
                };
                let prelude = rest[..open].trim();
                let (body, after) = take_block(&rest[open..]);
                self.push_rule(prelude, body);
                rest = after;
            }
            rest = rest.trim_start();
        }
    }

    /// Handle the text after `@`, returning what follows the at-rule.
    fn parse_at_rule<'a>(&mut self, text: &'a str) -> &'a str {
        let name_end = text
            .find(|c: char| !(c.is_ascii_alphanumeric() || c == '-'))
            .unwrap_or(text.len());
        let name = text[..name_end].to_ascii_lowercase();
        let brace = text.find('{');
        let semicolon = text.find(';');
        match (brace, semicolon) {
            (Some(open), semi) if semi.map_or(true, |s| open < s) => {
                let prelude = text[name_end..open].trim().to_ascii_lowercase();
                let (body, after) = take_block(&text[open..]);
                match name.as_str() {
                    "page" => self.page.extend(parse_declarations(body)),
                    "media" if media_applies(&prelude) => self.parse_block(body),
                    "media" => log::debug!("Skipping @media {prelude}"),
                    other => log::warn!("Ignoring unsupported @{other} rule"),
                }
                after
            }
            (_, Some(semi)) => {
                log::warn!("Ignoring unsupported @{name} statement");
                &text[semi + 1..]
            }
            _ => "",
        }
    }

    fn push_rule(&mut self, prelude: &str, body: &str) {
        let selectors: Vec<Selector> = prelude
            .split(',')
            .filter_map(|s| {
                let parsed = Selector::parse(s);
                if parsed.is_none() {
                    log::debug!("Skipping unsupported selector {:?}", s.trim());
                }
                parsed
            })
            .collect();
        if selectors.is_empty() {
            return;
        }
        let order = self.rules.len();
        self.rules.push(Rule {
            selectors,
            declarations: parse_declarations(body),
            order,
        });
    }

    /// Renumber rule order so `self`'s rules come first, then `other`'s.
    pub fn extend(&mut self, other: Stylesheet) {
        let offset = self.rules.len();
        self.rules.extend(other.rules.into_iter().map(|mut rule| {
            rule.order += offset;
            rule
        }));
        self.page.extend(other.page);
    }

    /// Declarations of every rule matching the element, ordered by
    /// specificity then source order (later wins when applied in sequence).
    pub fn matching<'s>(
        &'s self,
        element: &ElementKey<'_>,
        ancestors: &[ElementKey<'_>],
    ) -> Vec<(Specificity, usize, &'s [Declaration])> {
        let mut matched = Vec::new();
        for rule in &self.rules {
            let best = rule
                .selectors
                .iter()
                .filter(|s| s.matches(element, ancestors))
                .map(Selector::specificity)
                .max();
            if let Some(specificity) = best {
                matched.push((specificity, rule.order, rule.declarations.as_slice()));
            }
        }
        matched.sort_by(|a, b| a.0.cmp(&b.0).then(a.1.cmp(&b.1)));
        matched
    }
}

fn media_applies(prelude: &str) -> bool {
    prelude
        .split(',')
        .any(|query| {
            let query = query.trim().trim_start_matches("only ").trim();
            query.is_empty() || query.starts_with("print") || query.starts_with("all")
        })
}

impl Selector {
    pub fn parse(text: &str) -> Option<Self> {
        let spaced = text.replace('>', " > ");
        let mut compounds = Vec::new();
        let mut combinators = Vec::new();
        let mut pending = Combinator::Descendant;
        for token in spaced.split_whitespace() {
            if token == ">" {
                if compounds.is_empty() {
                    return None;
                }
                pending = Combinator::Child;
                continue;
            }
            let compound = Compound::parse(token)?;
            if !compounds.is_empty() {
                combinators.push(pending);
            }
            compounds.push(compound);
            pending = Combinator::Descendant;
        }
        if compounds.is_empty() || combinators.len() + 1 != compounds.len() {
            return None;
        }
        Some(Self {
            compounds,
            combinators,
        })
    }

    pub fn specificity(&self) -> Specificity {
        self.compounds.iter().fold((0, 0, 0), |(a, b, c), compound| {
            (
                a + u32::from(compound.id.is_some()),
                b + compound.classes.len() as u32,
                c + u32::from(compound.tag.is_some()),
            )
        })
    }

    /// `ancestors` runs from the root down to the element's parent.
    pub fn matches(&self, element: &ElementKey<'_>, ancestors: &[ElementKey<'_>]) -> bool {
        let last = self.compounds.len() - 1;
        self.compounds[last].matches(element) && self.matches_from(last, ancestors)
    }

    /// Compounds `0..index` must match among `ancestors`.
    fn matches_from(&self, index: usize, ancestors: &[ElementKey<'_>]) -> bool {
        if index == 0 {
            return true;
        }
        let compound = &self.compounds[index - 1];
        match self.combinators[index - 1] {
            Combinator::Child => match ancestors.split_last() {
                Some((parent, rest)) => {
                    compound.matches(parent) && self.matches_from(index - 1, rest)
                }
                None => false,
            },
            Combinator::Descendant => (0..ancestors.len())
                .rev()
                .any(|i| {
                    compound.matches(&ancestors[i]) && self.matches_from(index - 1, &ancestors[..i])
                }),
        }
    }
}

impl Compound {
    fn parse(token: &str) -> Option<Self> {
        if token.contains(|c: char| matches!(c, ':' | '[' | ']' | '+' | '~' | '(' | ')')) {
            return None;
        }
        let mut compound = Compound::default();
        let mut rest = token;
        let head_end = rest.find(['.', '#']).unwrap_or(rest.len());
        let head = &rest[..head_end];
        match head {
            "" | "*" => {}
            name if is_ident(name) => compound.tag = Some(name.to_ascii_lowercase()),
            _ => return None,
        }
        rest = &rest[head_end..];
        while let Some(marker) = rest.chars().next() {
            let body = &rest[1..];
            let end = body.find(['.', '#']).unwrap_or(body.len());
            let ident = &body[..end];
            if !is_ident(ident) {
                return None;
            }
            if marker == '.' {
                compound.classes.push(ident.to_string());
            } else {
                compound.id = Some(ident.to_string());
            }
            rest = &body[end..];
        }
        Some(compound)
    }

    fn matches(&self, element: &ElementKey<'_>) -> bool {
        if self.tag.as_deref().is_some_and(|tag| tag != element.name) {
            return false;
        }
        if self.id.is_some() && self.id.as_deref() != element.id {
            return false;
        }
        let classes = element.class.unwrap_or("");
        self.classes
            .iter()
            .all(|wanted| classes.split_whitespace().any(|c| c == wanted))
    }
}

fn is_ident(s: &str) -> bool {
    !s.is_empty() && s.chars().all(|c| c.is_alphanumeric() || c == '-' || c == '_')
}

/// Parse the inside of a declaration block (also used for `style=""`).
pub fn parse_declarations(block: &str) -> Vec<Declaration> {
    split_top_level(block, ';')
        .into_iter()
        .filter_map(|decl| {
            let (property, value) = decl.split_once(':')?;
            let property = property.trim().to_ascii_lowercase();
            let mut value = value.trim();
            let mut important = false;
            if let Some(idx) = value.to_ascii_lowercase().rfind("!important") {
                important = true;
                value = value[..idx].trim_end();
            }
            (!property.is_empty() && !value.is_empty()).then(|| Declaration {
                property,
                value: value.to_string(),
                important,
            })
        })
        .collect()
}

/// Split on `sep` outside parentheses and quotes.
fn split_top_level(text: &str, sep: char) -> Vec<&str> {
    let mut parts = Vec::new();
    let mut depth = 0usize;
    let mut quote: Option<char> = None;
    let mut start = 0;
    for (i, c) in text.char_indices() {
        match (quote, c) {
            (Some(q), c) if c == q => quote = None,
            (Some(_), _) => {}
            (None, '"' | '\'') => quote = Some(c),
            (None, '(') => depth += 1,
            (None, ')') => depth = depth.saturating_sub(1),
            (None, c) if c == sep && depth == 0 => {
                parts.push(&text[start..i]);
                start = i + c.len_utf8();
            }
            _ => {}
        }
    }
    parts.push(&text[start..]);
    parts
}

/// `text` starts at `{`. Returns the block content and the text after the
/// matching `}`.
fn take_block(text: &str) -> (&str, &str) {
    let mut depth = 0usize;
    for (i, c) in text.char_indices() {
        match c {
            '{' => depth += 1,
            '}' => {
                depth -= 1;
                if depth == 0 {
                    return (&text[1..i], &text[i + 1..]);
                }
            }
            _ => {}
        }
    }
    (&text[1..], "")
}

fn strip_comments(css: &str) -> String {
    let mut out = String::with_capacity(css.len());
    let mut rest = css;
    while let Some(start) = rest.find("/*") {
        out.push_str(&rest[..start]);
        match rest[start + 2..].find("*/") {
            Some(end) => rest = &rest[start + 2 + end + 2..],
            None => {
                rest = "";
                break;
            }
        }
    }
    out.push_str(rest);
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    fn key<'a>(name: &'a str, id: Option<&'a str>, class: Option<&'a str>) -> ElementKey<'a> {
        ElementKey { name, id, class }
    }

    #[test]
    fn parses_rules_and_lists() {
        let sheet = Stylesheet::parse("h1, h2 { color: red; font-size: 2em } /* c */ p{margin:0}");
        assert_eq!(sheet.rules.len(), 2);
        assert_eq!(sheet.rules[0].selectors.len(), 2);
        assert_eq!(sheet.rules[0].declarations[1].value, "2em");
        assert_eq!(sheet.rules[1].declarations[0].property, "margin");
        assert_eq!(sheet.rules[1].order, 1);
    }

    #[test]
    fn unsupported_selectors_are_dropped() {
        let sheet = Stylesheet::parse(
            "a:hover { color: red } li + li { margin: 0 } p, a:visited { color: blue }",
        );
        assert_eq!(sheet.rules.len(), 1);
        assert_eq!(sheet.rules[0].selectors.len(), 1);
    }

    #[test]
    fn page_and_media_rules() {
        let sheet = Stylesheet::parse(
            "@charset \"utf-8\";\n@page { size: A4; margin: 2cm }\n\
             @media screen { p { color: red } }\n@media print { p { color: blue } }\n\
             @font-face { font-family: x }",
        );
        assert_eq!(sheet.page.len(), 2);
        assert_eq!(sheet.rules.len(), 1);
        assert_eq!(sheet.rules[0].declarations[0].value, "blue");
    }

    #[test]
    fn specificity_counts_ids_classes_types() {
        let s = Selector::parse("div#main > p.lead.big span").unwrap();
        assert_eq!(s.specificity(), (1, 2, 3));
        assert_eq!(Selector::parse("*").unwrap().specificity(), (0, 0, 0));
    }

    #[test]
    fn descendant_and_child_matching() {
        let body = key("body", None, None);
        let section = key("div", None, Some("section experience"));
        let ul = key("ul", None, None);
        let li = key("li", Some("first"), None);

        let descendant = Selector::parse(".section li").unwrap();
        assert!(descendant.matches(&li, &[body, section, ul]));

        let child = Selector::parse(".section > li").unwrap();
        assert!(!child.matches(&li, &[body, section, ul]));
        assert!(Selector::parse("ul > li#first").unwrap().matches(&li, &[body, section, ul]));
        assert!(!Selector::parse("li.first").unwrap().matches(&li, &[body, section, ul]));
    }

    #[test]
    fn descendant_matching_backtracks() {
        let outer = key("div", None, Some("a"));
        let mid = key("div", None, Some("b"));
        let inner = key("div", None, Some("a"));
        let p = key("p", None, None);
        // `.a > .b p` needs the `.a` directly above `.b`, not the nearest `.a`.
        let s = Selector::parse(".a > .b p").unwrap();
        assert!(s.matches(&p, &[outer, mid, inner]));
    }

    #[test]
    fn matching_orders_by_specificity_then_source() {
        let sheet = Stylesheet::parse("p.x { color: red } p { color: blue } p { color: green }");
        let p = key("p", None, Some("x"));
        let matched = sheet.matching(&p, &[]);
        let values: Vec<&str> = matched.iter().map(|(_, _, d)| d[0].value.as_str()).collect();
        assert_eq!(values, vec!["blue", "green", "red"]);
    }

    #[test]
    fn declarations_keep_data_uris_and_important() {
        let decls = parse_declarations(
            "background: url(data:image/png;base64,AAA=); color: red !important;;",
        );
        assert_eq!(decls.len(), 2);
        assert_eq!(decls[0].value, "url(data:image/png;base64,AAA=)");
        assert!(decls[1].important);
        assert_eq!(decls[1].value, "red");
    }

    #[test]
    fn extend_renumbers_rules() {
        let mut first = Stylesheet::parse("p { color: red }");
        first.extend(Stylesheet::parse("p { color: blue } h1 { color: green }"));
        let orders: Vec<usize> = first.rules.iter().map(|r| r.order).collect();
        assert_eq!(orders, vec![0, 1, 2]);
    }
}
