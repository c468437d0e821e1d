use std::collections::{HashMap, HashSet};

use foundation::math::{
    Position, Spherical, TexturePoint, TextureSize, normalize_position, to_texture_display,
    validate_finite, validate_position,
};
use tracing::debug;

use crate::error::{Duplicate, TourError};
use crate::events::{ChangeLog, ChangeRecord, TourEvent};
use crate::node::{HotspotKind, Link, NodePatch, PanoramaNode};

#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub struct TourConfig {
    /// Used for nodes whose texture dimensions are unknown.
    pub default_texture: TextureSize,
}

impl Default for TourConfig {
    fn default() -> Self {
        Self {
            default_texture: TextureSize::EQUIRECT_DEFAULT,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DanglingLink {
    pub source: String,
    pub target: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum InvariantViolation {
    DuplicateLink { node: String, target: String },
    DuplicateHotspot { node: String, hotspot: String },
    /// Link-kind hotspot with no matching `Link`, or more than one.
    UnbackedLinkHotspot { node: String, hotspot: String },
    PositionMismatch { node: String, hotspot: String },
}

impl std::fmt::Display for InvariantViolation {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            InvariantViolation::DuplicateLink { node, target } => {
                write!(f, "{node}: more than one link to {target}")
            }
            InvariantViolation::DuplicateHotspot { node, hotspot } => {
                write!(f, "{node}: duplicate hotspot id {hotspot}")
            }
            InvariantViolation::UnbackedLinkHotspot { node, hotspot } => {
                write!(f, "{node}/{hotspot}: link hotspot without exactly one link")
            }
            InvariantViolation::PositionMismatch { node, hotspot } => {
                write!(f, "{node}/{hotspot}: hotspot and link positions differ")
            }
        }
    }
}

/// Authoritative in-memory collection of panorama nodes.
///
/// Ordering contract:
/// - `all_nodes` yields nodes in insertion order.
/// - Lookups by id are O(1).
///
/// All mutations are synchronous and immediately visible.
#[derive(Debug, Default)]
pub struct PanoramaGraph {
    pub(crate) config: TourConfig,
    pub(crate) nodes: Vec<PanoramaNode>,
    index: HashMap<String, usize>,
    pub(crate) log: ChangeLog,
}

impl PanoramaGraph {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_config(config: TourConfig) -> Self {
        Self {
            config,
            ..Self::default()
        }
    }

    pub fn config(&self) -> TourConfig {
        self.config
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    pub fn contains(&self, id: &str) -> bool {
        self.index.contains_key(id)
    }

    pub fn get_node(&self, id: &str) -> Option<&PanoramaNode> {
        self.index.get(id).map(|&i| &self.nodes[i])
    }

    pub fn all_nodes(&self) -> impl Iterator<Item = &PanoramaNode> {
        self.nodes.iter()
    }

    pub fn revision(&self) -> u64 {
        self.log.revision()
    }

    pub fn pending_events(&self) -> &[ChangeRecord] {
        self.log.records()
    }

    pub fn drain_events(&mut self) -> Vec<ChangeRecord> {
        self.log.drain()
    }

    pub(crate) fn require(&self, id: &str) -> Result<usize, TourError> {
        self.index
            .get(id)
            .copied()
            .ok_or_else(|| TourError::node_not_found(id))
    }

    /// Adds a node.
    ///
    /// Links are de-duplicated by target (the later entry wins) and every
    /// link-kind hotspot gets a link carrying its position.
    pub fn add_node(&mut self, mut node: PanoramaNode) -> Result<(), TourError> {
        if node.id.is_empty() {
            return Err(TourError::EmptyId);
        }
        if self.index.contains_key(&node.id) {
            return Err(TourError::DuplicateId(Duplicate::Node(node.id)));
        }
        normalize_node(&mut node)?;

        let id = node.id.clone();
        self.index.insert(id.clone(), self.nodes.len());
        self.nodes.push(node);
        self.log.emit(TourEvent::NodeAdded { id });
        Ok(())
    }

    /// Removes a node and cleans up every reference to it: links targeting
    /// it are dropped and link hotspots pointing at it are demoted to info.
    pub fn remove_node(&mut self, id: &str) -> Result<PanoramaNode, TourError> {
        let idx = self.require(id)?;
        let removed = self.nodes.remove(idx);
        self.reindex();
        self.log.emit(TourEvent::NodeRemoved { id: id.to_string() });

        let mut dropped = 0usize;
        let mut demoted = 0usize;
        for i in 0..self.nodes.len() {
            if self.drop_link_entry(i, id).is_some() {
                dropped += 1;
            }
            demoted += self.demote_link_hotspots(i, id);
        }
        debug!(node = id, dropped, demoted, "removed node");
        Ok(removed)
    }

    pub fn update_node(&mut self, id: &str, patch: NodePatch) -> Result<(), TourError> {
        let idx = self.require(id)?;
        let node = &mut self.nodes[idx];
        let mut changed = false;

        if let Some(v) = patch.image_url {
            changed |= replace(&mut node.image_url, v);
        }
        if let Some(v) = patch.thumbnail_url {
            changed |= replace(&mut node.thumbnail_url, v);
        }
        if let Some(v) = patch.display_name {
            changed |= replace(&mut node.display_name, v);
        }
        if let Some(v) = patch.caption {
            changed |= replace(&mut node.caption, v);
        }
        if let Some(v) = patch.texture {
            changed |= replace(&mut node.texture, v);
        }

        if changed {
            self.log.emit(TourEvent::NodeUpdated { id: id.to_string() });
        }
        Ok(())
    }

    /// Texture size of `node_id`, falling back to the configured default for
    /// unknown nodes or unknown dimensions.
    pub fn texture_size(&self, node_id: &str) -> TextureSize {
        self.get_node(node_id)
            .and_then(|n| n.texture)
            .unwrap_or(self.config.default_texture)
    }

    pub fn spherical_position(&self, node_id: &str, pos: Position) -> Spherical {
        normalize_position(pos, self.texture_size(node_id))
    }

    pub fn texture_position(&self, node_id: &str, pos: Position) -> TexturePoint {
        to_texture_display(pos, self.texture_size(node_id))
    }

    pub fn validate_position_for(&self, node_id: &str, pos: Position) -> Result<(), TourError> {
        let idx = self.require(node_id)?;
        let size = self.nodes[idx]
            .texture
            .unwrap_or(self.config.default_texture);
        validate_position(pos, size)?;
        Ok(())
    }

    /// Links whose target is not a node of this graph.
    pub fn dangling_links(&self) -> Vec<DanglingLink> {
        self.nodes
            .iter()
            .flat_map(|n| {
                n.links
                    .iter()
                    .filter(|l| !self.contains(&l.target_id))
                    .map(|l| DanglingLink {
                        source: n.id.clone(),
                        target: l.target_id.clone(),
                    })
            })
            .collect()
    }

    /// Ids of nodes with a link to `id`, in node order.
    pub fn inbound_links(&self, id: &str) -> Vec<&str> {
        self.nodes
            .iter()
            .filter(|n| n.link_to(id).is_some())
            .map(|n| n.id.as_str())
            .collect()
    }

    pub fn check_invariants(&self) -> Vec<InvariantViolation> {
        let mut out = Vec::new();
        for node in &self.nodes {
            let mut targets = HashSet::new();
            for link in &node.links {
                if !targets.insert(link.target_id.as_str()) {
                    out.push(InvariantViolation::DuplicateLink {
                        node: node.id.clone(),
                        target: link.target_id.clone(),
                    });
                }
            }

            let mut hotspot_ids = HashSet::new();
            for h in &node.hotspots {
                if !hotspot_ids.insert(h.id.as_str()) {
                    out.push(InvariantViolation::DuplicateHotspot {
                        node: node.id.clone(),
                        hotspot: h.id.clone(),
                    });
                }
                let HotspotKind::Link { target_id } = &h.kind else {
                    continue;
                };
                let mut matching = node.links.iter().filter(|l| &l.target_id == target_id);
                match (matching.next(), matching.next()) {
                    (Some(link), None) => {
                        if link.position != Some(h.position) {
                            out.push(InvariantViolation::PositionMismatch {
                                node: node.id.clone(),
                                hotspot: h.id.clone(),
                            });
                        }
                    }
                    _ => out.push(InvariantViolation::UnbackedLinkHotspot {
                        node: node.id.clone(),
                        hotspot: h.id.clone(),
                    }),
                }
            }
        }
        out
    }

    fn reindex(&mut self) {
        self.index.clear();
        for (i, n) in self.nodes.iter().enumerate() {
            self.index.insert(n.id.clone(), i);
        }
    }
}

fn replace<T: PartialEq>(slot: &mut T, value: T) -> bool {
    if *slot == value {
        return false;
    }
    *slot = value;
    true
}

fn normalize_node(node: &mut PanoramaNode) -> Result<(), TourError> {
    for p in node.links.iter().filter_map(|l| l.position) {
        validate_finite(p)?;
    }
    for h in &node.hotspots {
        validate_finite(h.position)?;
    }

    let mut links = Vec::with_capacity(node.links.len());
    for link in node.links.drain(..) {
        match links
            .iter()
            .position(|l: &Link| l.target_id == link.target_id)
        {
            Some(i) => links[i] = link,
            None => links.push(link),
        }
    }
    node.links = links;

    let mut hotspot_ids = HashSet::new();
    let mut link_targets = HashSet::new();
    for h in &node.hotspots {
        if !hotspot_ids.insert(h.id.as_str()) {
            return Err(TourError::DuplicateId(Duplicate::Hotspot {
                node: node.id.clone(),
                hotspot: h.id.clone(),
            }));
        }
        if let Some(target) = h.target_id()
            && !link_targets.insert(target)
        {
            return Err(TourError::DuplicateId(Duplicate::LinkHotspot {
                node: node.id.clone(),
                target: target.to_string(),
            }));
        }
    }

    for h in &node.hotspots {
        let Some(target) = h.target_id() else {
            continue;
        };
        match node.links.iter_mut().find(|l| l.target_id == target) {
            Some(link) => link.position = Some(h.position),
            None => node.links.push(Link::new(target, Some(h.position))),
        }
    }
    Ok(())
}
