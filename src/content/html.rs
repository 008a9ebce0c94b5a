use scraper::{ElementRef, Html, Node, Selector};

use crate::util::collapse_whitespace;

/// Elements whose boundaries separate words in rendered text.
const BLOCK_ELEMENTS: &[&str] = &[
    "address", "article", "aside", "blockquote", "br", "dd", "div", "dl", "dt", "figcaption",
    "footer", "h1", "h2", "h3", "h4", "h5", "h6", "header", "hr", "li", "main", "ol", "p", "pre",
    "section", "table", "td", "th", "tr", "ul",
];

/// Converts an HTML fragment to plain text: tags dropped, entities decoded,
/// whitespace collapsed.
///
/// ```
/// use dayfeed::content::html_to_text;
///
/// assert_eq!(html_to_text("<p>Fish &amp; <b>chips</b></p><p>Tea</p>"), "Fish & chips Tea");
/// ```
pub fn html_to_text(html: &str) -> String {
    let fragment = Html::parse_fragment(html);
    let mut out = String::with_capacity(html.len());
    push_text(fragment.root_element(), None, &mut out);
    collapse_whitespace(&out)
}

/// Appends the text below `root` to `out`.
///
/// Text under any element matching `excluded` is skipped. Block-level
/// elements contribute a separating space.
pub(crate) fn push_text(root: ElementRef<'_>, excluded: Option<&Selector>, out: &mut String) {
    for node in root.descendants() {
        match node.value() {
            Node::Text(text) => {
                let hidden = excluded.is_some_and(|selector| {
                    node.ancestors()
                        .filter_map(ElementRef::wrap)
                        .any(|el| selector.matches(&el))
                });
                if !hidden {
                    out.push_str(text);
                }
            }
            Node::Element(el) if BLOCK_ELEMENTS.contains(&el.name()) => out.push(' '),
            _ => {}
        }
    }
}
