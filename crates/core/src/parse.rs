//! HTML parsing and DOM manipulation for the observed feed.
//!
//! This module provides the [`FeedDocument`] and [`Element`] types. A
//! `FeedDocument` is the mutable tree the filter watches: it can be queried
//! with CSS selectors, grown with new fragments (infinite scroll), pruned,
//! and carries a presentation overlay recording which containers are hidden.
//!
//! # Example
//!
//! ```rust
//! use langfilter_core::parse::FeedDocument;
//!
//! let html = r#"
//!     <html>
//!         <body>
//!             <div id="contents"><a href="/watch?v=abc">First</a></div>
//!         </body>
//!     </html>
//! "#;
//!
//! let mut doc = FeedDocument::parse(html).unwrap();
//! doc.append_html("#contents", r#"<a href="/watch?v=def">Second</a>"#).unwrap();
//! assert_eq!(doc.select("a").unwrap().len(), 2);
//! ```

use std::collections::HashSet;

use ego_tree::{NodeId, NodeMut, NodeRef};
use scraper::{ElementRef, Html, Node, Selector};

use crate::{FilterError, Result};

/// Attribute written on hidden containers when rendering.
pub const HIDDEN_MARKER_ATTR: &str = "data-langfilter";

/// Compiles a CSS selector, mapping failures to [`FilterError::InvalidSelector`].
pub fn compile_selector(selector: &str) -> Result<Selector> {
    Selector::parse(selector)
        .map_err(|e| FilterError::InvalidSelector { selector: selector.to_string(), reason: e.to_string() })
}

/// Represents the observed, mutable listing page.
///
/// # Example
///
/// ```rust
/// use langfilter_core::parse::FeedDocument;
///
/// let html = "<html><head><title>Feed</title></head><body><p>Hello</p></body></html>";
/// let doc = FeedDocument::parse(html).unwrap();
/// assert_eq!(doc.title(), Some("Feed".to_string()));
/// ```
pub struct FeedDocument {
    html: Html,
    hidden: HashSet<NodeId>,
}

impl std::fmt::Debug for FeedDocument {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FeedDocument")
            .field("nodes", &self.html.tree.values().count())
            .field("hidden", &self.hidden.len())
            .finish()
    }
}

impl FeedDocument {
    /// Parses a full HTML document.
    pub fn parse(html: &str) -> Result<Self> {
        let html = Html::parse_document(html);
        Ok(Self { html, hidden: HashSet::new() })
    }

    /// Gets the raw HTML representation.
    pub fn html(&self) -> &Html {
        &self.html
    }

    /// Selects elements using a CSS selector string.
    ///
    /// # Errors
    ///
    /// Returns [`FilterError::InvalidSelector`] if the selector is invalid.
    pub fn select(&'_ self, selector: &str) -> Result<Vec<Element<'_>>> {
        let sel = compile_selector(selector)?;
        Ok(self.select_with(&sel))
    }

    /// Selects elements using a precompiled selector.
    ///
    /// Only elements still attached to the document are returned; subtrees
    /// detached by [`FeedDocument::remove`] stay in the arena but are skipped.
    pub fn select_with(&'_ self, selector: &Selector) -> Vec<Element<'_>> {
        self.attached(selector).map(|el| Element { element: el }).collect()
    }

    fn attached<'a, 's>(&'a self, selector: &'s Selector) -> impl Iterator<Item = ElementRef<'a>> {
        self.html.select(selector).filter(|el| self.is_attached(node_id(el)))
    }

    /// Whether `id` is reachable from the document root.
    pub fn is_attached(&self, id: NodeId) -> bool {
        let root = self.html.tree.root().id();
        self.html
            .tree
            .get(id)
            .is_some_and(|node| node.id() == root || node.ancestors().last().is_some_and(|top| top.id() == root))
    }

    /// Looks an element up by node id.
    ///
    /// Returns `None` if the id is unknown or does not refer to an element.
    pub fn element(&'_ self, id: NodeId) -> Option<Element<'_>> {
        self.html.tree.get(id).and_then(ElementRef::wrap).map(|element| Element { element })
    }

    /// Gets the title of the document.
    pub fn title(&self) -> Option<String> {
        let selector = Selector::parse("title").ok()?;
        self.attached(&selector)
            .next()
            .map(|el| el.text().collect::<String>())
    }

    /// Appends an HTML fragment as the last children of the first element
    /// matching `parent_selector`.
    ///
    /// Returns the number of top-level nodes grafted into the tree.
    pub fn append_html(&mut self, parent_selector: &str, fragment: &str) -> Result<usize> {
        let sel = compile_selector(parent_selector)?;
        let parent_id = self
            .attached(&sel)
            .next()
            .map(|el| node_id(&el))
            .ok_or_else(|| FilterError::HtmlParseError(format!("No element matches '{}'", parent_selector)))?;

        let fragment = Html::parse_fragment(fragment);
        let source: NodeRef<'_, Node> = *fragment.root_element();

        let mut parent = self
            .html
            .tree
            .get_mut(parent_id)
            .ok_or_else(|| FilterError::HtmlParseError("Parent node vanished".to_string()))?;

        let mut grafted = 0;
        for child in source.children() {
            graft(&mut parent, child);
            grafted += 1;
        }
        Ok(grafted)
    }

    /// Detaches every element matching `selector` from the tree.
    ///
    /// Hidden marks inside the removed subtrees are dropped. Returns the
    /// number of elements removed.
    pub fn remove(&mut self, selector: &str) -> Result<usize> {
        let sel = compile_selector(selector)?;
        let ids: Vec<NodeId> = self.attached(&sel).map(|el| node_id(&el)).collect();

        for id in &ids {
            let subtree: Vec<NodeId> = self
                .html
                .tree
                .get(*id)
                .map(|node| node.descendants().map(|n| n.id()).collect())
                .unwrap_or_default();
            for node in &subtree {
                self.hidden.remove(node);
            }
            if let Some(mut node) = self.html.tree.get_mut(*id) {
                node.detach();
            }
        }
        Ok(ids.len())
    }

    /// Whether the element is currently marked hidden.
    pub fn is_hidden(&self, id: NodeId) -> bool {
        self.hidden.contains(&id)
    }

    /// Number of elements currently marked hidden.
    pub fn hidden_count(&self) -> usize {
        self.hidden.len()
    }

    /// Sets or clears the hidden mark on an element.
    ///
    /// Returns `None` when `id` is not an element of this document (hiding a
    /// detached element also counts), otherwise whether the presentation
    /// state actually changed.
    pub(crate) fn set_hidden(&mut self, id: NodeId, hidden: bool) -> Option<bool> {
        self.element(id)?;
        if hidden && !self.is_attached(id) {
            return None;
        }
        let changed = if hidden { self.hidden.insert(id) } else { self.hidden.remove(&id) };
        Some(changed)
    }

    /// Serializes the document, writing the presentation overlay out as
    /// `style="display: none"` on hidden elements.
    pub fn render(&self) -> Result<String> {
        let serialized = self.html.html();
        if self.hidden.is_empty() {
            return Ok(serialized);
        }

        // Element start tags come out of the serializer in tree pre-order, so
        // the rewriter can address hidden elements by ordinal.
        let targets: Vec<(usize, String)> = self
            .html
            .tree
            .root()
            .descendants()
            .filter_map(ElementRef::wrap)
            .enumerate()
            .filter(|(_, el)| self.hidden.contains(&node_id(el)))
            .map(|(ordinal, el)| (ordinal, el.value().name().to_lowercase()))
            .collect();

        let mut output = String::new();
        let mut ordinal = 0usize;
        let mut next_target = 0usize;
        let mut rewriter = lol_html::HtmlRewriter::new(
            lol_html::Settings {
                element_content_handlers: vec![lol_html::element!("*", |el| {
                    let current = ordinal;
                    ordinal += 1;

                    let Some((target, tag)) = targets.get(next_target) else {
                        return Ok(());
                    };
                    if *target != current {
                        return Ok(());
                    }
                    next_target += 1;

                    if el.tag_name() != *tag {
                        tracing::warn!(expected = %tag, found = %el.tag_name(), "render drifted from tree order");
                        return Ok(());
                    }

                    let style = match el.get_attribute("style") {
                        Some(existing) if !existing.trim().is_empty() => {
                            format!("{}; display: none", existing.trim().trim_end_matches(';'))
                        }
                        _ => "display: none".to_string(),
                    };
                    el.set_attribute("style", &style).ok();
                    el.set_attribute(HIDDEN_MARKER_ATTR, "hidden").ok();
                    Ok(())
                })],
                ..Default::default()
            },
            |c: &[u8]| {
                output.push_str(&String::from_utf8_lossy(c));
            },
        );

        rewriter
            .write(serialized.as_bytes())
            .map_err(|e| FilterError::HtmlParseError(e.to_string()))?;
        rewriter.end().map_err(|e| FilterError::HtmlParseError(e.to_string()))?;

        Ok(output)
    }
}

fn node_id(element: &ElementRef<'_>) -> NodeId {
    let node: NodeRef<'_, Node> = **element;
    node.id()
}

fn graft(dest: &mut NodeMut<'_, Node>, source: NodeRef<'_, Node>) {
    let mut copy = dest.append(source.value().clone());
    for child in source.children() {
        graft(&mut copy, child);
    }
}

/// A wrapper around scraper's ElementRef for easier DOM navigation.
///
/// # Example
///
/// ```rust
/// use langfilter_core::parse::FeedDocument;
///
/// let html = r#"<a href="/watch?v=abc">Link text</a>"#;
/// let doc = FeedDocument::parse(html).unwrap();
/// let link = &doc.select("a").unwrap()[0];
///
/// assert_eq!(link.text(), "Link text");
/// assert_eq!(link.attr("href"), Some("/watch?v=abc"));
/// ```
#[derive(Clone, Debug)]
pub struct Element<'a> {
    element: ElementRef<'a>,
}

impl<'a> Element<'a> {
    /// Gets the node id of this element.
    ///
    /// Ids stay valid across mutations of unrelated parts of the tree.
    pub fn id(&self) -> NodeId {
        node_id(&self.element)
    }

    /// Gets the outer HTML of this element.
    pub fn outer_html(&self) -> String {
        self.element.html()
    }

    /// Gets the text content of this element.
    pub fn text(&self) -> String {
        self.element.text().collect()
    }

    /// Gets the value of an attribute.
    pub fn attr(&self, name: &str) -> Option<&'a str> {
        self.element.value().attr(name)
    }

    /// Gets the lowercase tag name of this element.
    pub fn tag_name(&self) -> String {
        self.element.value().name().to_lowercase()
    }

    /// Selects descendant elements using a CSS selector string.
    ///
    /// # Errors
    ///
    /// Returns [`FilterError::InvalidSelector`] if the selector is invalid.
    pub fn select(&self, selector: &str) -> Result<Vec<Element<'a>>> {
        let sel = compile_selector(selector)?;
        Ok(self.select_with(&sel))
    }

    /// Selects descendant elements using a precompiled selector.
    pub fn select_with(&self, selector: &Selector) -> Vec<Element<'a>> {
        self.element.select(selector).map(|el| Element { element: el }).collect()
    }

    /// Finds the nearest element, starting with this one and walking up,
    /// that matches `selector`.
    pub fn closest(&self, selector: &Selector) -> Option<Element<'a>> {
        let node: NodeRef<'a, Node> = *self.element;
        std::iter::once(self.element)
            .chain(node.ancestors().filter_map(ElementRef::wrap))
            .find(|el| selector.matches(el))
            .map(|element| Element { element })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const SAMPLE_HTML: &str = r#"
        <!DOCTYPE html>
        <html lang="en">
        <head>
            <meta charset="UTF-8">
            <title>Test Feed</title>
        </head>
        <body>
            <div id="contents">
                <ytd-rich-item-renderer class="card">
                    <h3><a href="/watch?v=abc123">Paragraph 1</a></h3>
                </ytd-rich-item-renderer>
                <ytd-rich-item-renderer class="card" style="color: red;">
                    <h3><a href="/watch?v=def456">Paragraph 2</a></h3>
                </ytd-rich-item-renderer>
            </div>
        </body>
        </html>
    "#;

    #[test]
    fn test_parse_document() {
        let doc = FeedDocument::parse(SAMPLE_HTML).unwrap();
        assert_eq!(doc.title(), Some("Test Feed".to_string()));
    }

    #[test]
    fn test_select_elements() {
        let doc = FeedDocument::parse(SAMPLE_HTML).unwrap();
        let elements = doc.select("a").unwrap();

        assert_eq!(elements.len(), 2);
        assert_eq!(elements[0].text(), "Paragraph 1");
        assert_eq!(elements[1].attr("href"), Some("/watch?v=def456"));
    }

    #[test]
    fn test_invalid_selector() {
        let doc = FeedDocument::parse(SAMPLE_HTML).unwrap();
        let result = doc.select("[[invalid");

        assert!(matches!(result, Err(FilterError::InvalidSelector { .. })));
    }

    #[test]
    fn test_closest_walks_up() {
        let doc = FeedDocument::parse(SAMPLE_HTML).unwrap();
        let link = &doc.select("a").unwrap()[0];
        let container = link.closest(&compile_selector("ytd-rich-item-renderer").unwrap()).unwrap();

        assert_eq!(container.tag_name(), "ytd-rich-item-renderer");
        assert!(link.closest(&compile_selector("ytd-video-renderer").unwrap()).is_none());
    }

    #[test]
    fn test_closest_includes_self() {
        let doc = FeedDocument::parse(SAMPLE_HTML).unwrap();
        let link = &doc.select("a").unwrap()[0];
        let found = link.closest(&compile_selector("a").unwrap()).unwrap();
        assert_eq!(found.id(), link.id());
    }

    #[test]
    fn test_append_html() {
        let mut doc = FeedDocument::parse(SAMPLE_HTML).unwrap();
        let grafted = doc
            .append_html(
                "#contents",
                r#"<ytd-rich-item-renderer><h3><a href="/watch?v=ghi789">Third</a></h3></ytd-rich-item-renderer>"#,
            )
            .unwrap();

        assert_eq!(grafted, 1);
        let links = doc.select("#contents a").unwrap();
        assert_eq!(links.len(), 3);
        assert_eq!(links[2].text(), "Third");
    }

    #[test]
    fn test_append_html_missing_parent() {
        let mut doc = FeedDocument::parse(SAMPLE_HTML).unwrap();
        assert!(doc.append_html("#nope", "<p>x</p>").is_err());
    }

    #[test]
    fn test_remove() {
        let mut doc = FeedDocument::parse(SAMPLE_HTML).unwrap();
        let removed = doc.remove("ytd-rich-item-renderer").unwrap();

        assert_eq!(removed, 2);
        assert!(doc.select("a").unwrap().is_empty());
    }

    #[test]
    fn test_removed_subtree_is_not_selectable() {
        let mut doc = FeedDocument::parse(SAMPLE_HTML).unwrap();
        let card = doc.select("ytd-rich-item-renderer").unwrap()[1].id();
        let link = doc.select("a").unwrap()[1].id();
        doc.set_hidden(card, true);
        doc.set_hidden(link, true);

        assert_eq!(doc.remove("ytd-rich-item-renderer[style]").unwrap(), 1);

        assert!(!doc.is_attached(card));
        assert!(!doc.is_attached(link));
        assert_eq!(doc.select("a").unwrap().len(), 1);
        assert_eq!(doc.hidden_count(), 0);
        assert_eq!(doc.remove("ytd-rich-item-renderer[style]").unwrap(), 0);
    }

    #[test]
    fn test_render_hidden_overlay() {
        let mut doc = FeedDocument::parse(SAMPLE_HTML).unwrap();
        let cards: Vec<NodeId> = doc.select("ytd-rich-item-renderer").unwrap().iter().map(|c| c.id()).collect();

        assert_eq!(doc.set_hidden(cards[1], true), Some(true));
        assert_eq!(doc.set_hidden(cards[1], true), Some(false));

        let rendered = doc.render().unwrap();
        assert!(rendered.contains("color: red; display: none"));
        assert_eq!(rendered.matches("data-langfilter=\"hidden\"").count(), 1);

        let reparsed = FeedDocument::parse(&rendered).unwrap();
        let hidden = reparsed.select("[data-langfilter]").unwrap();
        assert_eq!(hidden.len(), 1);
        assert_eq!(hidden[0].text().trim(), "Paragraph 2");
    }

    #[test]
    fn test_render_without_overlay() {
        let doc = FeedDocument::parse(SAMPLE_HTML).unwrap();
        let rendered = doc.render().unwrap();
        assert!(!rendered.contains("display: none"));
    }
}
