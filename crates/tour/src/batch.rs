use foundation::math::Position;
use tracing::warn;

use crate::error::TourError;
use crate::graph::PanoramaGraph;
use crate::node::{Hotspot, HotspotPatch, NodePatch, PanoramaNode};

/// One graph mutation, as used by bulk entry points (migration, replay).
#[derive(Debug, Clone, PartialEq)]
pub enum TourOp {
    AddNode(PanoramaNode),
    UpdateNode { id: String, patch: NodePatch },
    RemoveNode { id: String },
    AddLink {
        source: String,
        target: String,
        position: Option<Position>,
    },
    RemoveLink { source: String, target: String },
    UpdateLinkPosition {
        source: String,
        target: String,
        position: Position,
    },
    AddHotspot { node: String, hotspot: Hotspot },
    UpdateHotspot {
        node: String,
        hotspot: String,
        patch: HotspotPatch,
    },
    RemoveHotspot { node: String, hotspot: String },
    ConvertHotspotToLink {
        node: String,
        hotspot: String,
        target: String,
    },
    ConvertLinkHotspotToInfo { node: String, hotspot: String },
    ConvertHotspotToCustom { node: String, hotspot: String },
}

#[derive(Debug, Clone, PartialEq)]
pub struct BatchError {
    /// Position of the failed op in the submitted sequence.
    pub index: usize,
    pub error: TourError,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct BatchReport {
    pub applied: usize,
    pub errors: Vec<BatchError>,
}

impl BatchReport {
    pub fn is_clean(&self) -> bool {
        self.errors.is_empty()
    }
}

impl PanoramaGraph {
    pub fn apply(&mut self, op: TourOp) -> Result<(), TourError> {
        match op {
            TourOp::AddNode(node) => self.add_node(node),
            TourOp::UpdateNode { id, patch } => self.update_node(&id, patch),
            TourOp::RemoveNode { id } => self.remove_node(&id).map(drop),
            TourOp::AddLink {
                source,
                target,
                position,
            } => self.add_link(&source, &target, position).map(drop),
            TourOp::RemoveLink { source, target } => self.remove_link(&source, &target).map(drop),
            TourOp::UpdateLinkPosition {
                source,
                target,
                position,
            } => self
                .update_link_position(&source, &target, position)
                .map(drop),
            TourOp::AddHotspot { node, hotspot } => self.add_hotspot(&node, hotspot),
            TourOp::UpdateHotspot {
                node,
                hotspot,
                patch,
            } => self.update_hotspot(&node, &hotspot, patch).map(drop),
            TourOp::RemoveHotspot { node, hotspot } => {
                self.remove_hotspot(&node, &hotspot).map(drop)
            }
            TourOp::ConvertHotspotToLink {
                node,
                hotspot,
                target,
            } => self
                .convert_hotspot_to_link(&node, &hotspot, &target)
                .map(drop),
            TourOp::ConvertLinkHotspotToInfo { node, hotspot } => {
                self.convert_link_hotspot_to_info(&node, &hotspot).map(drop)
            }
            TourOp::ConvertHotspotToCustom { node, hotspot } => {
                self.convert_hotspot_to_custom(&node, &hotspot).map(drop)
            }
        }
    }

    /// Applies every op in order. A failed op is recorded and skipped; the
    /// remaining ops still run.
    pub fn apply_batch(&mut self, ops: impl IntoIterator<Item = TourOp>) -> BatchReport {
        let mut report = BatchReport::default();
        for (index, op) in ops.into_iter().enumerate() {
            match self.apply(op) {
                Ok(()) => report.applied += 1,
                Err(error) => {
                    warn!(index, %error, "batch op failed");
                    report.errors.push(BatchError { index, error });
                }
            }
        }
        report
    }
}

#[cfg(test)]
mod tests {
    use super::TourOp;
    use crate::error::{Duplicate, TourError};
    use crate::graph::PanoramaGraph;
    use crate::node::{Hotspot, PanoramaNode};
    use foundation::math::Position;

    #[test]
    fn batch_continues_past_failures() {
        let mut g = PanoramaGraph::new();
        let ops = vec![
            TourOp::AddNode(PanoramaNode::new("a", "a.jpg")),
            TourOp::AddNode(PanoramaNode::new("a", "dup.jpg")),
            TourOp::AddLink {
                source: "missing".into(),
                target: "a".into(),
                position: None,
            },
            TourOp::AddNode(PanoramaNode::new("b", "b.jpg")),
            TourOp::AddHotspot {
                node: "a".into(),
                hotspot: Hotspot::info("h", "Door", Position::texture(1.0, 1.0)),
            },
            TourOp::ConvertHotspotToLink {
                node: "a".into(),
                hotspot: "h".into(),
                target: "b".into(),
            },
        ];

        let report = g.apply_batch(ops);

        assert_eq!(report.applied, 4);
        assert_eq!(
            report.errors.iter().map(|e| e.index).collect::<Vec<_>>(),
            vec![1, 2]
        );
        assert_eq!(
            report.errors[0].error,
            TourError::DuplicateId(Duplicate::Node("a".into()))
        );
        assert!(g.are_linked("a", "b"));
        assert!(g.check_invariants().is_empty());
    }
}
