//! Legacy `links`/`markers` format and its one-shot migration.
//!
//! Legacy panoramas carry navigation in two independent lists: `links`
//! (edges with an optional marker position) and `markers` (points of
//! interest, where `data.targetNodeId` marks a navigation marker). Migration
//! funnels both through the graph operations so the result satisfies the
//! link/hotspot invariants.

use std::fs;
use std::path::Path;

use serde::{Deserialize, Serialize};
use tour::{
    Hotspot, HotspotKind, HotspotStyle, PanoramaGraph, PanoramaNode, TourConfig, TourError,
    TourOp,
};
use tracing::{info, warn};

use crate::document::{FormatError, PositionRecord};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LegacyLink {
    pub node_id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub position: Option<PositionRecord>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LegacyMarkerData {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub target_node_id: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LegacyMarker {
    pub id: String,
    #[serde(default)]
    pub tooltip: Option<String>,
    #[serde(default)]
    pub content: Option<String>,
    pub position: PositionRecord,
    #[serde(default)]
    pub data: Option<LegacyMarkerData>,
    #[serde(default)]
    pub image: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LegacyPanorama {
    pub id: String,
    pub panorama: String,
    #[serde(default)]
    pub thumbnail: String,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub caption: String,
    #[serde(default)]
    pub links: Vec<LegacyLink>,
    #[serde(default)]
    pub markers: Vec<LegacyMarker>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct LegacyDocument {
    pub panoramas: Vec<LegacyPanorama>,
}

impl LegacyDocument {
    pub fn from_json(raw: &str) -> Result<Self, FormatError> {
        serde_json::from_str(raw).map_err(FormatError::Json)
    }

    pub fn load(path: impl AsRef<Path>) -> Result<Self, FormatError> {
        let raw = fs::read_to_string(path).map_err(FormatError::Io)?;
        Self::from_json(&raw)
    }
}

/// A legacy record that failed to migrate. `record` names it as
/// `panorama`, `panorama/links/target` or `panorama/markers/id`.
#[derive(Debug, Clone, PartialEq)]
pub struct MigrationError {
    pub record: String,
    pub error: TourError,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct MigrationReport {
    pub nodes: usize,
    pub links: usize,
    pub hotspots: usize,
    pub errors: Vec<MigrationError>,
}

/// Builds a fresh graph from a legacy document. Every record is attempted;
/// failures are collected in the report.
///
/// A panorama whose node cannot be added contributes nothing else, and a
/// marker that cannot be added is not converted, so a rejected record never
/// changes another record that shares its id.
pub fn migrate_legacy(doc: LegacyDocument, config: TourConfig) -> (PanoramaGraph, MigrationReport) {
    let mut graph = PanoramaGraph::with_config(config);
    let mut report = MigrationReport::default();
    let mut attempt = |graph: &mut PanoramaGraph, record: String, op: TourOp| -> bool {
        match graph.apply(op) {
            Ok(()) => true,
            Err(error) => {
                warn!(record = %record, %error, "legacy record skipped");
                report.errors.push(MigrationError { record, error });
                false
            }
        }
    };

    // Nodes first so links and markers can reference any panorama.
    let added: Vec<bool> = doc
        .panoramas
        .iter()
        .map(|pano| {
            let mut node = PanoramaNode::new(pano.id.clone(), pano.panorama.clone());
            node.thumbnail_url = pano.thumbnail.clone();
            node.display_name = pano.name.clone();
            node.caption = pano.caption.clone();
            attempt(&mut graph, pano.id.clone(), TourOp::AddNode(node))
        })
        .collect();

    for (pano, added) in doc.panoramas.into_iter().zip(added) {
        if !added {
            continue;
        }
        for link in pano.links {
            let record = format!("{}/links/{}", pano.id, link.node_id);
            attempt(
                &mut graph,
                record,
                TourOp::AddLink {
                    source: pano.id.clone(),
                    target: link.node_id,
                    position: link.position.map(Into::into),
                },
            );
        }

        for marker in pano.markers {
            let record = format!("{}/markers/{}", pano.id, marker.id);
            let target = marker.data.and_then(|d| d.target_node_id);
            let hotspot = Hotspot {
                id: marker.id.clone(),
                kind: HotspotKind::Info,
                title: marker.tooltip.unwrap_or_default(),
                content: marker.content.unwrap_or_default(),
                position: marker.position.into(),
                visible: true,
                style: marker.image.map(|icon| HotspotStyle {
                    icon: Some(icon),
                    ..HotspotStyle::default()
                }),
            };
            let op = TourOp::AddHotspot {
                node: pano.id.clone(),
                hotspot,
            };
            if !attempt(&mut graph, record.clone(), op) {
                continue;
            }
            if let Some(target) = target {
                let op = TourOp::ConvertHotspotToLink {
                    node: pano.id.clone(),
                    hotspot: marker.id,
                    target,
                };
                attempt(&mut graph, record, op);
            }
        }
    }

    graph.drain_events();
    report.nodes = graph.len();
    report.links = graph.all_nodes().map(|n| n.links.len()).sum();
    report.hotspots = graph.all_nodes().map(|n| n.hotspots.len()).sum();

    info!(
        nodes = report.nodes,
        links = report.links,
        hotspots = report.hotspots,
        errors = report.errors.len(),
        "legacy migration finished"
    );
    (graph, report)
}
