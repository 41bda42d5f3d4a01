//! XHTML parsing – converts the merged template into an owned element tree.
//!
//! Parsing is strict: the input must be well-formed XML. A DOCTYPE is
//! accepted; named entities other than the five XML ones are not.

use std::collections::HashMap;

use roxmltree::{Document, Node as XmlNode, ParsingOptions};

use crate::error::{Error, Result};

/// A node in the document tree.
#[derive(Debug, Clone)]
pub enum Node {
    Element(Element),
    Text(String),
}

/// An element with its (namespace-stripped) name, attributes and children.
#[derive(Debug, Clone, Default)]
pub struct Element {
    pub name: String,
    pub attributes: HashMap<String, String>,
    pub children: Vec<Node>,
}

impl Element {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Self::default()
        }
    }

    pub fn is(&self, name: &str) -> bool {
        self.name == name
    }

    pub fn attr(&self, name: &str) -> Option<&str> {
        self.attributes.get(name).map(String::as_str)
    }

    pub fn id(&self) -> Option<&str> {
        self.attr("id")
    }

    pub fn classes(&self) -> impl Iterator<Item = &str> {
        self.attr("class").unwrap_or("").split_whitespace()
    }
}

/// Where a stylesheet came from, in document order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StyleSource {
    /// Contents of a `<style>` element.
    Embedded(String),
    /// `href` of a `<link rel="stylesheet">`, unresolved.
    Linked(String),
}

/// A parsed XHTML document.
#[derive(Debug, Clone)]
pub struct XhtmlDocument {
    /// The `<body>` element, or the root element when there is no body.
    pub body: Element,
    pub title: Option<String>,
    pub stylesheets: Vec<StyleSource>,
}

/// Parse `html` as well-formed XML.
pub fn parse_xhtml(html: &str) -> Result<XhtmlDocument> {
    let options = ParsingOptions {
        allow_dtd: true,
        ..ParsingOptions::default()
    };
    let doc = Document::parse_with_options(html, options)
        .map_err(|source| Error::MalformedMarkup { source })?;

    let mut title = None;
    let mut stylesheets = Vec::new();
    for node in doc.descendants().filter(XmlNode::is_element) {
        match node.tag_name().name() {
            "title" if title.is_none() => {
                let text = collect_text(node);
                let text = text.split_whitespace().collect::<Vec<_>>().join(" ");
                if !text.is_empty() {
                    title = Some(text);
                }
            }
            "style" => stylesheets.push(StyleSource::Embedded(collect_text(node))),
            "link" => {
                let is_stylesheet = node
                    .attribute("rel")
                    .is_some_and(|rel| {
                        rel.split_whitespace()
                            .any(|r| r.eq_ignore_ascii_case("stylesheet"))
                    });
                if let (true, Some(href)) = (is_stylesheet, node.attribute("href")) {
                    stylesheets.push(StyleSource::Linked(href.to_string()));
                }
            }
            _ => {}
        }
    }

    let root = doc.root_element();
    let body_node = root
        .descendants()
        .find(|n| n.is_element() && n.tag_name().name() == "body")
        .unwrap_or(root);

    Ok(XhtmlDocument {
        body: convert_element(body_node),
        title,
        stylesheets,
    })
}

fn convert_element(node: XmlNode<'_, '_>) -> Element {
    let mut element = Element::new(node.tag_name().name().to_ascii_lowercase());
    for attr in node.attributes() {
        element
            .attributes
            .insert(attr.name().to_ascii_lowercase(), attr.value().to_string());
    }
    for child in node.children() {
        if child.is_element() {
            element.children.push(Node::Element(convert_element(child)));
        } else if let Some(text) = child.text().filter(|_| child.is_text()) {
            element.children.push(Node::Text(text.to_string()));
        }
    }
    element
}

fn collect_text(node: XmlNode<'_, '_>) -> String {
    node.descendants()
        .filter(XmlNode::is_text)
        .filter_map(|n| n.text())
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn doctype_and_namespace_are_accepted() {
        let doc = parse_xhtml(
            r#"<!DOCTYPE html>
<html xmlns="http://www.w3.org/1999/xhtml">
<head><title> My   CV </title></head>
<body><p class="lead intro" id="top">Hello</p></body>
</html>"#,
        )
        .unwrap();
        assert_eq!(doc.title.as_deref(), Some("My CV"));
        assert!(doc.body.is("body"));
        let p = doc
            .body
            .children
            .iter()
            .find_map(|n| match n {
                Node::Element(e) => Some(e),
                Node::Text(_) => None,
            })
            .unwrap();
        assert!(p.is("p"));
        assert_eq!(p.id(), Some("top"));
        assert_eq!(p.classes().collect::<Vec<_>>(), vec!["lead", "intro"]);
    }

    #[test]
    fn loose_html_is_rejected() {
        for html in ["<p>unclosed", "<br>", "<p>a &nbsp; b</p>", "<a></b>"] {
            assert!(
                matches!(parse_xhtml(html), Err(Error::MalformedMarkup { .. })),
                "{html} should be rejected"
            );
        }
    }

    #[test]
    fn stylesheets_are_collected_in_order() {
        let doc = parse_xhtml(
            r#"<html><head>
<link rel="stylesheet" href="style.css"/>
<link rel="icon" href="icon.png"/>
<style>p { color: red }</style>
</head><body/></html>"#,
        )
        .unwrap();
        assert_eq!(
            doc.stylesheets,
            vec![
                StyleSource::Linked("style.css".into()),
                StyleSource::Embedded("p { color: red }".into()),
            ]
        );
    }

    #[test]
    fn document_without_body_uses_root() {
        let doc = parse_xhtml("<div><p>x</p></div>").unwrap();
        assert!(doc.body.is("div"));
        assert_eq!(doc.body.children.len(), 1);
    }
}
