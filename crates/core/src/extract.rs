//! Locating feed items and their titles.
//!
//! An item starts life as a candidate link. The [`Extractor`] walks from
//! the link up to the card that contains it, derives the item identifier
//! from the link target, and resolves the title by trying an ordered list
//! of probes inside the card. Earlier probes are the explicit title slots;
//! later ones are generic fallbacks, so the order must be kept to avoid
//! picking up captions, channel names or badges.

use std::fmt;

use ego_tree::NodeId;
use scraper::Selector;
use serde::Serialize;
use url::Url;

use crate::config::ScanConfig;
use crate::parse::{Element, FeedDocument, compile_selector};
use crate::{FilterError, Result};

/// Base used to resolve relative link targets.
const SITE_BASE: &str = "https://www.youtube.com/";

/// What kind of card an item is.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ItemKind {
    Video,
    Channel,
}

impl fmt::Display for ItemKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ItemKind::Video => f.write_str("video"),
            ItemKind::Channel => f.write_str("channel"),
        }
    }
}

/// Stable identity of a content entity, used as the dedup key.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
pub struct ItemIdentifier {
    pub kind: ItemKind,
    pub id: String,
}

impl ItemIdentifier {
    pub fn new(kind: ItemKind, id: impl Into<String>) -> Self {
        Self { kind, id: id.into() }
    }

    pub fn video(id: impl Into<String>) -> Self {
        Self::new(ItemKind::Video, id)
    }

    pub fn channel(id: impl Into<String>) -> Self {
        Self::new(ItemKind::Channel, id)
    }
}

impl fmt::Display for ItemIdentifier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.kind, self.id)
    }
}

/// Where a title probe reads its text from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TitleSource {
    /// The element's text content.
    Text,
    /// The value of an attribute.
    Attribute(String),
}

/// One structural probe for a title.
#[derive(Debug, Clone)]
pub struct TitleProbe {
    pub selector: String,
    pub source: TitleSource,
}

impl TitleProbe {
    pub fn text(selector: &str) -> Self {
        Self { selector: selector.to_string(), source: TitleSource::Text }
    }

    pub fn attribute(selector: &str, name: &str) -> Self {
        Self { selector: selector.to_string(), source: TitleSource::Attribute(name.to_string()) }
    }
}

/// Structural description of one item kind.
#[derive(Debug, Clone)]
pub struct KindSpec {
    pub kind: ItemKind,
    /// Candidate links.
    pub link_selector: String,
    /// Container shapes, tried as a `closest` match from the link.
    pub container_selector: String,
    /// Title probes in priority order.
    pub title_probes: Vec<TitleProbe>,
}

impl KindSpec {
    /// Video cards on home, search, subscriptions and watch-next lists.
    pub fn videos() -> Self {
        Self {
            kind: ItemKind::Video,
            link_selector: r#"a[href*="/watch?v="], a[href*="/shorts/"]"#.to_string(),
            container_selector:
                "ytd-rich-item-renderer, ytd-video-renderer, ytd-grid-video-renderer, ytd-compact-video-renderer"
                    .to_string(),
            title_probes: vec![
                TitleProbe::text(r#"h3 a[href*="/watch"]"#),
                TitleProbe::text("#video-title"),
                TitleProbe::text("yt-formatted-string#video-title"),
                TitleProbe::text("a#video-title-link"),
                TitleProbe::text(".ytd-video-renderer #video-title"),
                TitleProbe::attribute("#video-title[title]", "title"),
            ],
        }
    }

    /// Channel cards in search results.
    pub fn channels() -> Self {
        Self {
            kind: ItemKind::Channel,
            link_selector: r#"a[href^="/@"], a[href*="/channel/"]"#.to_string(),
            container_selector: "ytd-channel-renderer".to_string(),
            title_probes: vec![
                TitleProbe::text("#channel-title #text"),
                TitleProbe::text("#channel-title"),
                TitleProbe::text("#text.ytd-channel-name"),
            ],
        }
    }

    fn compile(&self) -> Result<CompiledKind> {
        let probes = self
            .title_probes
            .iter()
            .map(|p| Ok((compile_selector(&p.selector)?, p.source.clone())))
            .collect::<Result<Vec<_>>>()?;

        Ok(CompiledKind {
            kind: self.kind,
            link: compile_selector(&self.link_selector)?,
            container: compile_selector(&self.container_selector)?,
            probes,
        })
    }
}

struct CompiledKind {
    kind: ItemKind,
    link: Selector,
    container: Selector,
    probes: Vec<(Selector, TitleSource)>,
}

/// A candidate resolved to its card and identity.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LocatedItem {
    pub container: NodeId,
    pub identifier: ItemIdentifier,
}

/// A fully extracted item.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExtractedItem {
    pub container: NodeId,
    pub identifier: ItemIdentifier,
    pub title: Option<String>,
}

/// Finds candidates, containers, identifiers and titles.
pub struct Extractor {
    kinds: Vec<CompiledKind>,
    min_title_len: usize,
    base: Url,
}

impl Extractor {
    /// Compiles the kind tables of `config`.
    ///
    /// # Errors
    ///
    /// Returns [`FilterError::InvalidSelector`] if any table selector is invalid.
    pub fn new(config: &ScanConfig) -> Result<Self> {
        let kinds = config.kinds.iter().map(KindSpec::compile).collect::<Result<Vec<_>>>()?;
        let base = Url::parse(SITE_BASE).map_err(|e| FilterError::InvalidUrl(e.to_string()))?;
        Ok(Self { kinds, min_title_len: config.min_title_len, base })
    }

    /// Item kinds this extractor knows, in table order.
    pub fn kinds(&self) -> Vec<ItemKind> {
        self.kinds.iter().map(|k| k.kind).collect()
    }

    fn spec(&self, kind: ItemKind) -> Option<&CompiledKind> {
        self.kinds.iter().find(|k| k.kind == kind)
    }

    /// All current candidate links for `kind`, in document order.
    pub fn candidates(&self, doc: &FeedDocument, kind: ItemKind) -> Vec<NodeId> {
        self.spec(kind)
            .map(|spec| doc.select_with(&spec.link).iter().map(Element::id).collect())
            .unwrap_or_default()
    }

    /// Resolves a candidate link to its container and identifier.
    ///
    /// Returns `None` if no container shape encloses the link or the link
    /// target carries no identifier.
    pub fn locate(&self, doc: &FeedDocument, kind: ItemKind, link: NodeId) -> Option<LocatedItem> {
        let spec = self.spec(kind)?;
        let link = doc.element(link)?;
        let identifier = self.identifier(kind, link.attr("href")?)?;
        let container = link.closest(&spec.container)?;
        Some(LocatedItem { container: container.id(), identifier })
    }

    /// Resolves the title inside a container.
    ///
    /// Probes are tried in order; the first non-empty result at least
    /// `min_title_len` characters long wins.
    pub fn title(&self, doc: &FeedDocument, kind: ItemKind, container: NodeId) -> Option<String> {
        let spec = self.spec(kind)?;
        let container = doc.element(container)?;

        spec.probes.iter().find_map(|(selector, source)| {
            let found = container.select_with(selector).into_iter().next()?;
            let raw = match source {
                TitleSource::Text => found.text(),
                TitleSource::Attribute(name) => found.attr(name).unwrap_or_default().to_string(),
            };
            let title = raw.split_whitespace().collect::<Vec<_>>().join(" ");
            (!title.is_empty() && title.chars().count() >= self.min_title_len).then_some(title)
        })
    }

    /// Locates a candidate and resolves its title in one go.
    pub fn extract(&self, doc: &FeedDocument, kind: ItemKind, link: NodeId) -> Option<ExtractedItem> {
        let located = self.locate(doc, kind, link)?;
        let title = self.title(doc, kind, located.container);
        Some(ExtractedItem { container: located.container, identifier: located.identifier, title })
    }

    /// Parses the identifier out of a link target.
    ///
    /// Videos: the `v` query parameter of `/watch`, or the segment after
    /// `/shorts/`. Channels: the `@handle` segment or the segment after
    /// `/channel/`.
    pub fn identifier(&self, kind: ItemKind, href: &str) -> Option<ItemIdentifier> {
        let url = self.base.join(href).ok()?;
        let mut segments = url.path_segments()?.filter(|s| !s.is_empty());
        let first = segments.next()?;

        let id = match kind {
            ItemKind::Video if first == "watch" => {
                url.query_pairs().find(|(key, _)| key == "v").map(|(_, value)| value.into_owned())
            }
            ItemKind::Video if first == "shorts" => segments.next().map(str::to_string),
            ItemKind::Channel if first.starts_with('@') && first.len() > 1 => Some(first.to_string()),
            ItemKind::Channel if first == "channel" => segments.next().map(str::to_string),
            _ => None,
        }?;

        if id.is_empty() { None } else { Some(ItemIdentifier::new(kind, id)) }
    }
}
