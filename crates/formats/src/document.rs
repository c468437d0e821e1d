//! On-disk tour format.
//!
//! A tour is a JSON array of node records. Positions carry no discriminant:
//! `{textureX, textureY}` is a texture position and `{yaw, pitch}` is a
//! spherical one.

use std::fs;
use std::path::Path;

use foundation::math::{Position, TextureSize};
use serde::{Deserialize, Serialize};
use tour::{
    Hotspot, HotspotKind, HotspotStyle, Link, PanoramaGraph, PanoramaNode, TourConfig, TourError,
};
use tracing::warn;

#[derive(Debug, Copy, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TexturePositionRecord {
    pub texture_x: f64,
    pub texture_y: f64,
}

#[derive(Debug, Copy, Clone, PartialEq, Serialize, Deserialize)]
pub struct SphericalPositionRecord {
    pub yaw: f64,
    pub pitch: f64,
}

#[derive(Debug, Copy, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum PositionRecord {
    Texture(TexturePositionRecord),
    Spherical(SphericalPositionRecord),
}

impl From<Position> for PositionRecord {
    fn from(p: Position) -> Self {
        match p {
            Position::Texture(t) => PositionRecord::Texture(TexturePositionRecord {
                texture_x: t.x,
                texture_y: t.y,
            }),
            Position::Spherical(s) => PositionRecord::Spherical(SphericalPositionRecord {
                yaw: s.yaw,
                pitch: s.pitch,
            }),
        }
    }
}

impl From<PositionRecord> for Position {
    fn from(r: PositionRecord) -> Self {
        match r {
            PositionRecord::Texture(t) => Position::texture(t.texture_x, t.texture_y),
            PositionRecord::Spherical(s) => Position::spherical(s.yaw, s.pitch),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LinkRecord {
    pub target_id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub position: Option<PositionRecord>,
}

#[derive(Debug, Copy, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum HotspotKindRecord {
    Info,
    Link,
    Custom,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct StyleRecord {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub icon: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub size: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub opacity: Option<f64>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HotspotRecord {
    pub id: String,
    #[serde(rename = "type")]
    pub kind: HotspotKindRecord,
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub content: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub target_id: Option<String>,
    pub position: PositionRecord,
    #[serde(default = "default_visible")]
    pub visible: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub style: Option<StyleRecord>,
}

fn default_visible() -> bool {
    true
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NodeRecord {
    pub id: String,
    pub panorama: String,
    #[serde(default)]
    pub thumbnail: String,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub caption: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub texture_width: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub texture_height: Option<u32>,
    #[serde(default)]
    pub links: Vec<LinkRecord>,
    #[serde(default)]
    pub hotspots: Vec<HotspotRecord>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TourDocument {
    pub nodes: Vec<NodeRecord>,
}

#[derive(Debug)]
pub enum FormatError {
    Io(std::io::Error),
    Json(serde_json::Error),
    /// A `link` hotspot without `targetId`.
    MissingTarget { node: String, hotspot: String },
    Tour(TourError),
}

impl std::fmt::Display for FormatError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            FormatError::Io(e) => write!(f, "tour io error: {e}"),
            FormatError::Json(e) => write!(f, "tour json error: {e}"),
            FormatError::MissingTarget { node, hotspot } => {
                write!(f, "link hotspot {node}/{hotspot} has no targetId")
            }
            FormatError::Tour(e) => e.fmt(f),
        }
    }
}

impl std::error::Error for FormatError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            FormatError::Io(e) => Some(e),
            FormatError::Json(e) => Some(e),
            FormatError::Tour(e) => Some(e),
            FormatError::MissingTarget { .. } => None,
        }
    }
}

impl From<TourError> for FormatError {
    fn from(e: TourError) -> Self {
        FormatError::Tour(e)
    }
}

/// A node record that could not be loaded.
#[derive(Debug)]
pub struct RecordError {
    pub index: usize,
    pub id: String,
    pub error: FormatError,
}

impl TourDocument {
    pub fn from_json(raw: &str) -> Result<Self, FormatError> {
        serde_json::from_str(raw).map_err(FormatError::Json)
    }

    pub fn to_json_pretty(&self) -> Result<String, FormatError> {
        serde_json::to_string_pretty(self).map_err(FormatError::Json)
    }

    pub fn load(path: impl AsRef<Path>) -> Result<Self, FormatError> {
        let raw = fs::read_to_string(path).map_err(FormatError::Io)?;
        Self::from_json(&raw)
    }

    pub fn from_graph(graph: &PanoramaGraph) -> Self {
        Self {
            nodes: graph.all_nodes().map(NodeRecord::from_node).collect(),
        }
    }

    /// Builds a graph from the records. Bad records are skipped and reported;
    /// the rest still load.
    pub fn into_graph(self, config: TourConfig) -> (PanoramaGraph, Vec<RecordError>) {
        let mut graph = PanoramaGraph::with_config(config);
        let mut errors = Vec::new();
        for (index, record) in self.nodes.into_iter().enumerate() {
            let id = record.id.clone();
            let result = record
                .into_node()
                .and_then(|node| graph.add_node(node).map_err(FormatError::Tour));
            if let Err(error) = result {
                warn!(index, id = %id, %error, "skipping tour record");
                errors.push(RecordError { index, id, error });
            }
        }
        // Loading is not an edit.
        graph.drain_events();
        (graph, errors)
    }
}

impl NodeRecord {
    pub fn from_node(node: &PanoramaNode) -> Self {
        Self {
            id: node.id.clone(),
            panorama: node.image_url.clone(),
            thumbnail: node.thumbnail_url.clone(),
            name: node.display_name.clone(),
            caption: node.caption.clone(),
            texture_width: node.texture.map(|t| t.width),
            texture_height: node.texture.map(|t| t.height),
            links: node
                .links
                .iter()
                .map(|l| LinkRecord {
                    target_id: l.target_id.clone(),
                    position: l.position.map(PositionRecord::from),
                })
                .collect(),
            hotspots: node.hotspots.iter().map(HotspotRecord::from_hotspot).collect(),
        }
    }

    pub fn into_node(self) -> Result<PanoramaNode, FormatError> {
        let texture = match (self.texture_width, self.texture_height) {
            (Some(w), Some(h)) => TextureSize::new(w, h),
            _ => None,
        };
        let hotspots = self
            .hotspots
            .into_iter()
            .map(|h| h.into_hotspot(&self.id))
            .collect::<Result<Vec<_>, _>>()?;

        Ok(PanoramaNode {
            id: self.id,
            image_url: self.panorama,
            thumbnail_url: self.thumbnail,
            display_name: self.name,
            caption: self.caption,
            texture,
            links: self
                .links
                .into_iter()
                .map(|l| Link::new(l.target_id, l.position.map(Position::from)))
                .collect(),
            hotspots,
        })
    }
}

impl HotspotRecord {
    pub fn from_hotspot(h: &Hotspot) -> Self {
        let kind = match h.kind {
            HotspotKind::Info => HotspotKindRecord::Info,
            HotspotKind::Link { .. } => HotspotKindRecord::Link,
            HotspotKind::Custom => HotspotKindRecord::Custom,
        };
        Self {
            id: h.id.clone(),
            kind,
            title: h.title.clone(),
            content: h.content.clone(),
            target_id: h.target_id().map(str::to_string),
            position: h.position.into(),
            visible: h.visible,
            style: h.style.as_ref().map(|s| StyleRecord {
                icon: s.icon.clone(),
                size: s.size_px,
                opacity: s.opacity,
            }),
        }
    }

    pub fn into_hotspot(self, node_id: &str) -> Result<Hotspot, FormatError> {
        let kind = match self.kind {
            HotspotKindRecord::Link => match self.target_id {
                Some(target_id) => HotspotKind::Link { target_id },
                None => {
                    return Err(FormatError::MissingTarget {
                        node: node_id.to_string(),
                        hotspot: self.id,
                    });
                }
            },
            other => {
                if let Some(target) = &self.target_id {
                    warn!(node = node_id, hotspot = %self.id, %target, "ignoring targetId on non-link hotspot");
                }
                if other == HotspotKindRecord::Info {
                    HotspotKind::Info
                } else {
                    HotspotKind::Custom
                }
            }
        };
        Ok(Hotspot {
            id: self.id,
            kind,
            title: self.title,
            content: self.content,
            position: self.position.into(),
            visible: self.visible,
            style: self.style.map(|s| HotspotStyle {
                icon: s.icon,
                size_px: s.size,
                opacity: s.opacity,
            }),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::{FormatError, PositionRecord, TourDocument};
    use foundation::math::Position;
    use pretty_assertions::assert_eq;
    use tour::{HotspotKind, TourConfig};

    const SAMPLE: &str = r#"[
      {
        "id": "n1",
        "panorama": "https://cdn.example/n1.jpg",
        "thumbnail": "https://cdn.example/n1_thumb.jpg",
        "name": "Lobby",
        "caption": "Front desk",
        "textureWidth": 8192,
        "textureHeight": 4096,
        "links": [
          { "targetId": "n2", "position": { "textureX": 2048, "textureY": 1024 } },
          { "targetId": "n3" }
        ],
        "hotspots": [
          {
            "id": "h1",
            "type": "link",
            "title": "To kitchen",
            "content": "<em>this way</em>",
            "targetId": "n2",
            "position": { "textureX": 2048, "textureY": 1024 },
            "visible": true,
            "style": { "icon": "arrow.svg", "size": 32, "opacity": 0.8 }
          },
          {
            "id": "h2",
            "type": "info",
            "title": "Fire exit",
            "content": "",
            "position": { "yaw": 0.5, "pitch": -0.1 },
            "visible": false
          }
        ]
      },
      {
        "id": "n2",
        "panorama": "n2.jpg",
        "thumbnail": "",
        "name": "Kitchen",
        "caption": "",
        "links": [],
        "hotspots": []
      }
    ]"#;

    #[test]
    fn positions_are_detected_by_shape() {
        let t: PositionRecord = serde_json::from_str(r#"{"textureX": 1, "textureY": 2.5}"#).unwrap();
        assert_eq!(Position::from(t), Position::texture(1.0, 2.5));

        let s: PositionRecord = serde_json::from_str(r#"{"yaw": -1.0, "pitch": 0.25}"#).unwrap();
        assert_eq!(Position::from(s), Position::spherical(-1.0, 0.25));

        assert!(serde_json::from_str::<PositionRecord>(r#"{"x": 1, "y": 2}"#).is_err());
    }

    #[test]
    fn load_save_is_lossless() {
        let doc = TourDocument::from_json(SAMPLE).unwrap();
        let (graph, errors) = doc.clone().into_graph(TourConfig::default());
        assert!(errors.is_empty());
        assert_eq!(TourDocument::from_graph(&graph), doc);

        let again = TourDocument::from_json(&doc.to_json_pretty().unwrap()).unwrap();
        assert_eq!(again, doc);
    }

    #[test]
    fn loaded_graph_has_expected_shape() {
        let (graph, _) = TourDocument::from_json(SAMPLE)
            .unwrap()
            .into_graph(TourConfig::default());
        let n1 = graph.get_node("n1").unwrap();
        assert_eq!(n1.links.len(), 2);
        assert_eq!(
            n1.hotspot("h1").unwrap().kind,
            HotspotKind::Link {
                target_id: "n2".into()
            }
        );
        assert!(!n1.hotspot("h2").unwrap().visible);
        assert_eq!(graph.texture_size("n1").width, 8192);
        assert_eq!(graph.dangling_links().len(), 1);
        assert!(graph.pending_events().is_empty());
    }

    #[test]
    fn bad_records_are_reported_not_fatal() {
        let raw = r#"[
          { "id": "a", "panorama": "a.jpg",
            "hotspots": [ { "id": "h", "type": "link", "position": { "yaw": 0, "pitch": 0 } } ] },
          { "id": "b", "panorama": "b.jpg" },
          { "id": "b", "panorama": "b2.jpg" }
        ]"#;
        let (graph, errors) = TourDocument::from_json(raw)
            .unwrap()
            .into_graph(TourConfig::default());

        assert_eq!(graph.len(), 1);
        assert_eq!(errors.len(), 2);
        assert!(matches!(errors[0].error, FormatError::MissingTarget { .. }));
        assert!(matches!(errors[1].error, FormatError::Tour(_)));
        assert_eq!(errors[1].index, 2);
    }
}
