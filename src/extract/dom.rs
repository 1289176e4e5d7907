//! Small DOM helpers shared by the classifier, the extractor and the listing
//! scrapers: selector compilation, scoped lookups, text collection and an HTML
//! serializer that can leave out whole subtrees.

use once_cell::sync::Lazy;
use scraper::node::Node;
use scraper::{ElementRef, Selector};

pub static BODY: Lazy<Selector> = Lazy::new(|| selector("body"));
pub static ANCHOR: Lazy<Selector> = Lazy::new(|| selector("a"));
pub static PARAGRAPH: Lazy<Selector> = Lazy::new(|| selector("p"));

const VOID_ELEMENTS: &[&str] = &[
    "area", "base", "br", "col", "embed", "hr", "img", "input", "link", "meta", "param", "source",
    "track", "wbr",
];

/// Compile a selector known at build time.
pub fn selector(css: &str) -> Selector {
    Selector::parse(css).unwrap_or_else(|e| panic!("invalid built-in selector {css:?}: {e}"))
}

/// Compile an ordered list of selectors, keeping their priority order.
pub fn selectors(list: &[&str]) -> Vec<Selector> {
    list.iter().map(|css| selector(css)).collect()
}

/// All text below `element`, concatenated as-is.
pub fn element_text(element: ElementRef<'_>) -> String {
    element.text().collect()
}

/// All text below `element` with whitespace runs collapsed.
pub fn clean_text(element: ElementRef<'_>) -> String {
    element.text().collect::<Vec<_>>().join(" ").split_whitespace().collect::<Vec<_>>().join(" ")
}

/// First descendant of `scope` (never `scope` itself) matching `selector`.
pub fn find_first<'a>(scope: ElementRef<'a>, selector: &Selector) -> Option<ElementRef<'a>> {
    scope.select(selector).find(|el| el.id() != scope.id())
}

/// Serializes elements back to HTML, dropping subtrees that match any
/// `skip` selector and, when `clean_images` is set, images without a usable
/// source. Comments are dropped.
pub struct Renderer<'s> {
    pub skip: &'s [Selector],
    pub clean_images: bool,
}

impl Renderer<'_> {
    pub fn render(&self, element: ElementRef<'_>) -> String {
        let mut out = String::new();
        self.render_into(element, &mut out);
        out
    }

    pub fn render_children(&self, element: ElementRef<'_>) -> String {
        let mut out = String::new();
        self.render_children_into(element, &mut out);
        out
    }

    fn render_into(&self, element: ElementRef<'_>, out: &mut String) {
        if self.skip.iter().any(|s| s.matches(&element)) {
            return;
        }
        let el = element.value();
        let name = el.name();

        let mut image_src = None;
        if self.clean_images && name == "img" {
            match usable_image_source(element) {
                Some(src) => image_src = Some(src),
                None => return,
            }
        }

        out.push('<');
        out.push_str(name);
        for (attr, value) in el.attrs() {
            if image_src.is_some() && attr == "src" {
                continue;
            }
            push_attr(out, attr, value);
        }
        if let Some(src) = image_src {
            push_attr(out, "src", src);
        }
        out.push('>');

        if VOID_ELEMENTS.contains(&name) {
            return;
        }
        self.render_children_into(element, out);
        out.push_str("</");
        out.push_str(name);
        out.push('>');
    }

    fn render_children_into(&self, element: ElementRef<'_>, out: &mut String) {
        let raw_text = matches!(element.value().name(), "script" | "style");
        for child in element.children() {
            match child.value() {
                Node::Text(text) if raw_text => out.push_str(text),
                Node::Text(text) => escape_into(out, text, false),
                Node::Element(_) => {
                    if let Some(child_el) = ElementRef::wrap(child) {
                        self.render_into(child_el, out);
                    }
                }
                _ => {}
            }
        }
    }
}

/// The source an image would be shown with: `src`, or a lazy-loading
/// attribute. Missing sources and inline `data:image` URIs are not usable.
fn usable_image_source<'a>(img: ElementRef<'a>) -> Option<&'a str> {
    let el = img.value();
    ["src", "data-src", "data-lazy-src"]
        .iter()
        .filter_map(|attr| el.attr(attr))
        .map(str::trim)
        .find(|src| !src.is_empty())
        .filter(|src| !src.contains("data:image"))
}

fn push_attr(out: &mut String, name: &str, value: &str) {
    out.push(' ');
    out.push_str(name);
    out.push_str("=\"");
    escape_into(out, value, true);
    out.push('"');
}

fn escape_into(out: &mut String, text: &str, attribute: bool) {
    for c in text.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' if !attribute => out.push_str("&lt;"),
            '>' if !attribute => out.push_str("&gt;"),
            '"' if attribute => out.push_str("&quot;"),
            '\u{a0}' => out.push_str("&nbsp;"),
            _ => out.push(c),
        }
    }
}
