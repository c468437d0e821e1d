use foundation::math::{Position, TextureSize};

/// Directed navigational edge from the owning node to `target_id`.
///
/// `position == None` means the link has no visual marker.
#[derive(Debug, Clone, PartialEq)]
pub struct Link {
    pub target_id: String,
    pub position: Option<Position>,
}

impl Link {
    pub fn new(target_id: impl Into<String>, position: Option<Position>) -> Self {
        Self {
            target_id: target_id.into(),
            position,
        }
    }
}

/// Hotspot kind. Only `Link` carries a target, so a target id exists exactly
/// when the hotspot is a link.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum HotspotKind {
    Info,
    Link { target_id: String },
    Custom,
}

#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash)]
pub enum HotspotKindTag {
    Info,
    Link,
    Custom,
}

impl HotspotKind {
    pub fn tag(&self) -> HotspotKindTag {
        match self {
            HotspotKind::Info => HotspotKindTag::Info,
            HotspotKind::Link { .. } => HotspotKindTag::Link,
            HotspotKind::Custom => HotspotKindTag::Custom,
        }
    }

    pub fn target_id(&self) -> Option<&str> {
        match self {
            HotspotKind::Link { target_id } => Some(target_id),
            _ => None,
        }
    }
}

impl std::fmt::Display for HotspotKindTag {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            HotspotKindTag::Info => "info",
            HotspotKindTag::Link => "link",
            HotspotKindTag::Custom => "custom",
        };
        f.write_str(s)
    }
}

/// Presentation hints. Never read by the graph itself.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct HotspotStyle {
    pub icon: Option<String>,
    pub size_px: Option<u32>,
    pub opacity: Option<f64>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Hotspot {
    pub id: String,
    pub kind: HotspotKind,
    pub title: String,
    /// Rendered as-is by the host; not sanitized here.
    pub content: String,
    pub position: Position,
    pub visible: bool,
    pub style: Option<HotspotStyle>,
}

impl Hotspot {
    pub fn info(id: impl Into<String>, title: impl Into<String>, position: Position) -> Self {
        Self {
            id: id.into(),
            kind: HotspotKind::Info,
            title: title.into(),
            content: String::new(),
            position,
            visible: true,
            style: None,
        }
    }

    pub fn link(
        id: impl Into<String>,
        target_id: impl Into<String>,
        title: impl Into<String>,
        position: Position,
    ) -> Self {
        Self {
            kind: HotspotKind::Link {
                target_id: target_id.into(),
            },
            ..Self::info(id, title, position)
        }
    }

    pub fn with_content(mut self, content: impl Into<String>) -> Self {
        self.content = content.into();
        self
    }

    pub fn target_id(&self) -> Option<&str> {
        self.kind.target_id()
    }
}

/// Partial update for a hotspot. `kind` is changed only through the
/// conversion operations.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct HotspotPatch {
    pub title: Option<String>,
    pub content: Option<String>,
    pub position: Option<Position>,
    pub visible: Option<bool>,
    pub style: Option<Option<HotspotStyle>>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct PanoramaNode {
    pub id: String,
    pub image_url: String,
    pub thumbnail_url: String,
    pub display_name: String,
    pub caption: String,
    /// `None` when the source dimensions are unknown; the graph then falls back
    /// to its configured default.
    pub texture: Option<TextureSize>,
    pub links: Vec<Link>,
    pub hotspots: Vec<Hotspot>,
}

impl PanoramaNode {
    pub fn new(id: impl Into<String>, image_url: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            image_url: image_url.into(),
            thumbnail_url: String::new(),
            display_name: String::new(),
            caption: String::new(),
            texture: None,
            links: Vec::new(),
            hotspots: Vec::new(),
        }
    }

    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.display_name = name.into();
        self
    }

    pub fn with_texture(mut self, size: TextureSize) -> Self {
        self.texture = Some(size);
        self
    }

    pub fn link_to(&self, target_id: &str) -> Option<&Link> {
        self.links.iter().find(|l| l.target_id == target_id)
    }

    pub fn hotspot(&self, hotspot_id: &str) -> Option<&Hotspot> {
        self.hotspots.iter().find(|h| h.id == hotspot_id)
    }

    pub(crate) fn link_index(&self, target_id: &str) -> Option<usize> {
        self.links.iter().position(|l| l.target_id == target_id)
    }

    pub(crate) fn hotspot_index(&self, hotspot_id: &str) -> Option<usize> {
        self.hotspots.iter().position(|h| h.id == hotspot_id)
    }

    /// Index of the link-kind hotspot pointing at `target_id`, if any.
    pub(crate) fn link_hotspot_index(&self, target_id: &str) -> Option<usize> {
        self.hotspots
            .iter()
            .position(|h| h.target_id() == Some(target_id))
    }
}

/// Partial update for node metadata. Links and hotspots are not patchable
/// here; they go through the link and hotspot operations.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct NodePatch {
    pub image_url: Option<String>,
    pub thumbnail_url: Option<String>,
    pub display_name: Option<String>,
    pub caption: Option<String>,
    pub texture: Option<Option<TextureSize>>,
}

impl NodePatch {
    pub fn is_empty(&self) -> bool {
        self == &NodePatch::default()
    }
}

#[cfg(test)]
mod tests {
    use super::{Hotspot, HotspotKindTag, Link, PanoramaNode};
    use foundation::math::Position;

    #[test]
    fn link_hotspot_exposes_target() {
        let h = Hotspot::link("h1", "n2", "Go", Position::texture(1.0, 2.0));
        assert_eq!(h.target_id(), Some("n2"));
        assert_eq!(h.kind.tag(), HotspotKindTag::Link);
        assert!(h.visible);

        let info = Hotspot::info("h2", "Note", Position::spherical(0.0, 0.0));
        assert_eq!(info.target_id(), None);
    }

    #[test]
    fn finds_link_hotspot_by_target() {
        let mut node = PanoramaNode::new("n1", "a.jpg");
        node.links.push(Link::new("n2", None));
        node.hotspots
            .push(Hotspot::info("h0", "Note", Position::texture(0.0, 0.0)));
        node.hotspots
            .push(Hotspot::link("h1", "n2", "Go", Position::texture(1.0, 2.0)));

        assert_eq!(node.link_hotspot_index("n2"), Some(1));
        assert_eq!(node.link_hotspot_index("n3"), None);
        assert!(node.link_to("n2").is_some());
    }
}
