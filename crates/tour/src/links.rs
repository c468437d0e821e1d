//! Link consistency operations.
//!
//! A node's link list and its link-kind hotspots describe the same edges.
//! Every operation here keeps them in step: for each hotspot with
//! `HotspotKind::Link { target_id }` there is exactly one `Link` to that
//! target on the same node, and both carry the same position.
//!
//! Mutations on a missing node fail with `NotFound`; queries return empty
//! results instead.

use foundation::math::{Position, validate_finite};
use tracing::debug;

use crate::error::{Duplicate, Missing, TourError};
use crate::events::TourEvent;
use crate::graph::PanoramaGraph;
use crate::node::{Hotspot, HotspotKind, HotspotKindTag, HotspotPatch, Link};

impl PanoramaGraph {
    /// Upserts the link `source -> target`.
    ///
    /// `target` does not need to exist. When the node already has a link to
    /// `target` its position is overwritten. If a link hotspot for `target`
    /// exists, a supplied position moves the hotspot too, and `None` keeps
    /// the hotspot's position on the link. Non-finite positions are
    /// rejected with `InvalidPosition`.
    pub fn add_link(
        &mut self,
        source: &str,
        target: &str,
        position: Option<Position>,
    ) -> Result<Link, TourError> {
        let idx = self.require(source)?;
        if let Some(p) = position {
            validate_finite(p)?;
        }
        let node = &mut self.nodes[idx];

        let hotspot = node.link_hotspot_index(target);
        let effective = match hotspot {
            Some(h) => Some(position.unwrap_or(node.hotspots[h].position)),
            None => position,
        };

        let link = match node.link_index(target) {
            Some(li) => {
                if node.links[li].position != effective {
                    node.links[li].position = effective;
                    self.log.emit(TourEvent::LinkMoved {
                        source: source.to_string(),
                        target: target.to_string(),
                    });
                }
                node.links[li].clone()
            }
            None => {
                let link = Link::new(target, effective);
                node.links.push(link.clone());
                self.log.emit(TourEvent::LinkUpserted {
                    source: source.to_string(),
                    target: target.to_string(),
                });
                link
            }
        };

        if let (Some(h), Some(p)) = (hotspot, effective) {
            self.move_hotspot(idx, h, p);
        }
        Ok(link)
    }

    /// Creates both `a -> b` and `b -> a`. Both nodes must exist; nothing is
    /// changed when either is missing.
    pub fn add_bidirectional_link(
        &mut self,
        a: &str,
        b: &str,
        position_ab: Option<Position>,
        position_ba: Option<Position>,
    ) -> Result<(Link, Link), TourError> {
        self.require(a)?;
        self.require(b)?;
        let ab = self.add_link(a, b, position_ab)?;
        let ba = self.add_link(b, a, position_ba)?;
        Ok((ab, ba))
    }

    /// Removes `source -> target` if present. Removing an absent link is not
    /// an error. A link hotspot for `target` is demoted to info and keeps its
    /// title and content.
    pub fn remove_link(&mut self, source: &str, target: &str) -> Result<Option<Link>, TourError> {
        let idx = self.require(source)?;
        let removed = self.drop_link_entry(idx, target);
        let demoted = self.demote_link_hotspots(idx, target);
        if demoted > 0 {
            debug!(source, target, demoted, "demoted link hotspots");
        }
        Ok(removed)
    }

    /// Moves an existing link and its link hotspot, if any, in one step.
    pub fn update_link_position(
        &mut self,
        source: &str,
        target: &str,
        position: Position,
    ) -> Result<Link, TourError> {
        let idx = self.require(source)?;
        if self.nodes[idx].link_index(target).is_none() {
            return Err(TourError::NotFound(Missing::Link {
                source: source.to_string(),
                target: target.to_string(),
            }));
        }
        self.add_link(source, target, Some(position))
    }

    pub fn are_linked(&self, source: &str, target: &str) -> bool {
        self.get_node(source)
            .is_some_and(|n| n.link_to(target).is_some())
    }

    pub fn links_for(&self, node_id: &str) -> &[Link] {
        self.get_node(node_id)
            .map(|n| n.links.as_slice())
            .unwrap_or(&[])
    }

    pub fn add_hotspot(&mut self, node_id: &str, hotspot: Hotspot) -> Result<(), TourError> {
        let idx = self.require(node_id)?;
        validate_finite(hotspot.position)?;
        let node = &self.nodes[idx];
        if node.hotspot_index(&hotspot.id).is_some() {
            return Err(TourError::DuplicateId(Duplicate::Hotspot {
                node: node_id.to_string(),
                hotspot: hotspot.id,
            }));
        }
        if let Some(target) = hotspot.target_id()
            && node.link_hotspot_index(target).is_some()
        {
            return Err(TourError::DuplicateId(Duplicate::LinkHotspot {
                node: node_id.to_string(),
                target: target.to_string(),
            }));
        }

        let link = hotspot
            .target_id()
            .map(|t| (t.to_string(), hotspot.position));
        let hotspot_id = hotspot.id.clone();
        self.nodes[idx].hotspots.push(hotspot);
        self.log.emit(TourEvent::HotspotAdded {
            node: node_id.to_string(),
            hotspot: hotspot_id,
        });

        if let Some((target, position)) = link {
            self.add_link(node_id, &target, Some(position))?;
        }
        Ok(())
    }

    /// Merges `patch` into the hotspot. A position change on a link hotspot
    /// moves its link as well.
    pub fn update_hotspot(
        &mut self,
        node_id: &str,
        hotspot_id: &str,
        patch: HotspotPatch,
    ) -> Result<Hotspot, TourError> {
        let (idx, h) = self.require_hotspot(node_id, hotspot_id)?;
        if let Some(p) = patch.position {
            validate_finite(p)?;
        }
        let hotspot = &mut self.nodes[idx].hotspots[h];
        let mut changed = false;

        if let Some(v) = patch.title
            && v != hotspot.title
        {
            hotspot.title = v;
            changed = true;
        }
        if let Some(v) = patch.content
            && v != hotspot.content
        {
            hotspot.content = v;
            changed = true;
        }
        if let Some(v) = patch.visible
            && v != hotspot.visible
        {
            hotspot.visible = v;
            changed = true;
        }
        if let Some(v) = patch.style
            && v != hotspot.style
        {
            hotspot.style = v;
            changed = true;
        }
        if changed {
            self.log.emit(TourEvent::HotspotUpdated {
                node: node_id.to_string(),
                hotspot: hotspot_id.to_string(),
            });
        }

        if let Some(p) = patch.position {
            match self.nodes[idx].hotspots[h].target_id().map(str::to_string) {
                Some(target) => {
                    self.add_link(node_id, &target, Some(p))?;
                }
                None => self.move_hotspot(idx, h, p),
            }
        }
        Ok(self.nodes[idx].hotspots[h].clone())
    }

    /// Removes a hotspot. Removing a link hotspot also removes its link.
    /// Removing an absent hotspot is not an error.
    pub fn remove_hotspot(
        &mut self,
        node_id: &str,
        hotspot_id: &str,
    ) -> Result<Option<Hotspot>, TourError> {
        let idx = self.require(node_id)?;
        let Some(h) = self.nodes[idx].hotspot_index(hotspot_id) else {
            return Ok(None);
        };
        let removed = self.nodes[idx].hotspots.remove(h);
        self.log.emit(TourEvent::HotspotRemoved {
            node: node_id.to_string(),
            hotspot: hotspot_id.to_string(),
        });
        if let Some(target) = removed.target_id() {
            self.drop_link_entry(idx, target);
        }
        Ok(Some(removed))
    }

    /// `info | custom | link -> link(target)`. Upserts the link to `target`
    /// at the hotspot's position. Re-targeting a link hotspot drops the link
    /// to the previous target.
    pub fn convert_hotspot_to_link(
        &mut self,
        node_id: &str,
        hotspot_id: &str,
        target: &str,
    ) -> Result<Hotspot, TourError> {
        let (idx, h) = self.require_hotspot(node_id, hotspot_id)?;
        let node = &self.nodes[idx];

        if let Some(other) = node.link_hotspot_index(target)
            && other != h
        {
            return Err(TourError::DuplicateId(Duplicate::LinkHotspot {
                node: node_id.to_string(),
                target: target.to_string(),
            }));
        }

        let previous = node.hotspots[h].target_id().map(str::to_string);
        if previous.as_deref() != Some(target) {
            let new_kind = HotspotKind::Link {
                target_id: target.to_string(),
            };
            self.set_kind(idx, h, new_kind);
            if let Some(previous) = previous {
                self.drop_link_entry(idx, &previous);
            }
        }

        let position = self.nodes[idx].hotspots[h].position;
        self.add_link(node_id, target, Some(position))?;
        Ok(self.nodes[idx].hotspots[h].clone())
    }

    /// `link -> info` removes the hotspot's link. `custom -> info` is a plain
    /// kind change and `info` is left alone.
    pub fn convert_link_hotspot_to_info(
        &mut self,
        node_id: &str,
        hotspot_id: &str,
    ) -> Result<Hotspot, TourError> {
        let (idx, h) = self.require_hotspot(node_id, hotspot_id)?;
        match self.nodes[idx].hotspots[h].target_id().map(str::to_string) {
            Some(target) => {
                self.remove_link(node_id, &target)?;
            }
            None => self.set_kind(idx, h, HotspotKind::Info),
        }
        Ok(self.nodes[idx].hotspots[h].clone())
    }

    /// `info | link -> custom`. Leaving `link` removes the hotspot's link.
    pub fn convert_hotspot_to_custom(
        &mut self,
        node_id: &str,
        hotspot_id: &str,
    ) -> Result<Hotspot, TourError> {
        let (idx, h) = self.require_hotspot(node_id, hotspot_id)?;
        let previous = self.nodes[idx].hotspots[h].target_id().map(str::to_string);
        self.set_kind(idx, h, HotspotKind::Custom);
        if let Some(target) = previous {
            self.drop_link_entry(idx, &target);
        }
        Ok(self.nodes[idx].hotspots[h].clone())
    }

    fn require_hotspot(&self, node_id: &str, hotspot_id: &str) -> Result<(usize, usize), TourError> {
        let idx = self.require(node_id)?;
        let h = self.nodes[idx].hotspot_index(hotspot_id).ok_or_else(|| {
            TourError::NotFound(Missing::Hotspot {
                node: node_id.to_string(),
                hotspot: hotspot_id.to_string(),
            })
        })?;
        Ok((idx, h))
    }

    /// Removes the raw link entry without touching hotspots.
    pub(crate) fn drop_link_entry(&mut self, idx: usize, target: &str) -> Option<Link> {
        let node = &mut self.nodes[idx];
        let li = node.link_index(target)?;
        let link = node.links.remove(li);
        self.log.emit(TourEvent::LinkRemoved {
            source: node.id.clone(),
            target: target.to_string(),
        });
        Some(link)
    }

    /// Demotes link hotspots pointing at `target` to info. Returns how many
    /// were demoted.
    pub(crate) fn demote_link_hotspots(&mut self, idx: usize, target: &str) -> usize {
        let matching: Vec<usize> = self.nodes[idx]
            .hotspots
            .iter()
            .enumerate()
            .filter(|(_, h)| h.target_id() == Some(target))
            .map(|(i, _)| i)
            .collect();
        for &h in &matching {
            self.set_kind(idx, h, HotspotKind::Info);
        }
        matching.len()
    }

    fn set_kind(&mut self, idx: usize, h: usize, kind: HotspotKind) {
        let node = &mut self.nodes[idx];
        let hotspot = &mut node.hotspots[h];
        if hotspot.kind == kind {
            return;
        }
        let from: HotspotKindTag = hotspot.kind.tag();
        let to = kind.tag();
        hotspot.kind = kind;
        self.log.emit(TourEvent::HotspotKindChanged {
            node: node.id.clone(),
            hotspot: hotspot.id.clone(),
            from,
            to,
        });
    }

    fn move_hotspot(&mut self, idx: usize, h: usize, position: Position) {
        let node = &mut self.nodes[idx];
        let hotspot = &mut node.hotspots[h];
        if hotspot.position == position {
            return;
        }
        hotspot.position = position;
        self.log.emit(TourEvent::HotspotUpdated {
            node: node.id.clone(),
            hotspot: hotspot.id.clone(),
        });
    }
}

#[cfg(test)]
mod tests {
    use crate::error::{Duplicate, Missing, TourError};
    use crate::events::TourEvent;
    use crate::graph::PanoramaGraph;
    use crate::node::{Hotspot, HotspotKind, HotspotKindTag, HotspotPatch, Link, PanoramaNode};
    use foundation::math::{Position, TextureSize, normalize_position};
    use pretty_assertions::assert_eq;

    fn graph_with(ids: &[&str]) -> PanoramaGraph {
        let mut g = PanoramaGraph::new();
        for id in ids {
            g.add_node(PanoramaNode::new(*id, format!("{id}.jpg"))).unwrap();
        }
        g
    }

    fn p0() -> Position {
        Position::texture(100.0, 200.0)
    }

    fn p1() -> Position {
        Position::spherical(0.5, -0.25)
    }

    #[test]
    fn basic_graph_build() {
        let mut g = graph_with(&["n1", "n2"]);
        g.add_link("n1", "n2", Some(Position::texture(2048.0, 1024.0)))
            .unwrap();

        assert_eq!(
            g.links_for("n1"),
            &[Link::new("n2", Some(Position::texture(2048.0, 1024.0)))]
        );

        let pos = g.links_for("n1")[0].position.unwrap();
        let s = normalize_position(pos, TextureSize::EQUIRECT_DEFAULT);
        assert!(s.yaw.abs() < 1e-12);
        assert!(s.pitch.abs() < 1e-12);
    }

    #[test]
    fn add_link_is_an_upsert() {
        let mut g = graph_with(&["a", "b"]);
        for _ in 0..3 {
            g.add_link("a", "b", Some(p0())).unwrap();
        }
        assert_eq!(g.links_for("a"), &[Link::new("b", Some(p0()))]);

        g.add_link("a", "b", Some(p1())).unwrap();
        assert_eq!(g.links_for("a"), &[Link::new("b", Some(p1()))]);

        g.add_link("a", "b", None).unwrap();
        assert_eq!(g.links_for("a"), &[Link::new("b", None)]);
    }

    #[test]
    fn add_link_requires_source() {
        let mut g = graph_with(&["a"]);
        assert_eq!(
            g.add_link("zz", "a", None).unwrap_err(),
            TourError::NotFound(Missing::Node("zz".into()))
        );
    }

    #[test]
    fn dangling_target_is_tolerated() {
        let mut g = graph_with(&["n1"]);
        g.add_link("n1", "ghost", Some(p0())).unwrap();
        assert!(g.are_linked("n1", "ghost"));
        assert!(g.get_node("ghost").is_none());
    }

    #[test]
    fn links_are_directed() {
        let mut g = graph_with(&["a", "b"]);
        g.add_link("a", "b", None).unwrap();
        assert!(g.are_linked("a", "b"));
        assert!(!g.are_linked("b", "a"));

        g.add_bidirectional_link("a", "b", None, Some(p1())).unwrap();
        assert!(g.are_linked("b", "a"));
        assert!(g.add_bidirectional_link("a", "zz", None, None).is_err());
        assert!(!g.are_linked("a", "zz"));
    }

    #[test]
    fn remove_link_is_idempotent() {
        let mut g = graph_with(&["a", "b"]);
        g.add_link("a", "b", None).unwrap();

        assert!(g.remove_link("a", "b").unwrap().is_some());
        assert!(!g.are_linked("a", "b"));
        assert!(g.remove_link("a", "b").unwrap().is_none());
        assert!(!g.are_linked("a", "b"));
    }

    #[test]
    fn remove_link_demotes_link_hotspot() {
        let mut g = graph_with(&["a", "b"]);
        g.add_hotspot(
            "a",
            Hotspot::link("h", "b", "Kitchen", p0()).with_content("<b>door</b>"),
        )
        .unwrap();
        assert!(g.are_linked("a", "b"));

        g.remove_link("a", "b").unwrap();

        let h = g.get_node("a").unwrap().hotspot("h").unwrap();
        assert_eq!(h.kind, HotspotKind::Info);
        assert_eq!(h.title, "Kitchen");
        assert_eq!(h.content, "<b>door</b>");
        assert!(g.check_invariants().is_empty());
    }

    #[test]
    fn reposition_moves_link_and_hotspot() {
        let mut g = graph_with(&["n1", "n2"]);
        g.add_hotspot("n1", Hotspot::link("h", "n2", "Go", p0()))
            .unwrap();

        g.update_link_position("n1", "n2", p1()).unwrap();

        let n1 = g.get_node("n1").unwrap();
        assert_eq!(n1.link_to("n2").unwrap().position, Some(p1()));
        assert_eq!(n1.hotspot("h").unwrap().position, p1());
    }

    #[test]
    fn update_missing_link_is_not_found() {
        let mut g = graph_with(&["a"]);
        assert_eq!(
            g.update_link_position("a", "b", p0()).unwrap_err(),
            TourError::NotFound(Missing::Link {
                source: "a".into(),
                target: "b".into()
            })
        );
    }

    #[test]
    fn upsert_without_position_keeps_hotspot_position() {
        let mut g = graph_with(&["a", "b"]);
        g.add_hotspot("a", Hotspot::link("h", "b", "Go", p0()))
            .unwrap();
        let link = g.add_link("a", "b", None).unwrap();
        assert_eq!(link.position, Some(p0()));
        assert!(g.check_invariants().is_empty());
    }

    #[test]
    fn non_finite_positions_are_rejected() {
        let mut g = graph_with(&["a", "b"]);
        g.add_hotspot("a", Hotspot::info("h", "Note", p0())).unwrap();
        let before = g.revision();

        let bad = Position::texture(f64::NAN, 10.0);
        assert!(matches!(
            g.add_link("a", "b", Some(bad)),
            Err(TourError::InvalidPosition(_))
        ));
        assert!(matches!(
            g.add_hotspot("a", Hotspot::info("h2", "x", Position::spherical(f64::INFINITY, 0.0))),
            Err(TourError::InvalidPosition(_))
        ));
        let patch = HotspotPatch {
            title: Some("changed".into()),
            position: Some(bad),
            ..HotspotPatch::default()
        };
        assert!(matches!(
            g.update_hotspot("a", "h", patch),
            Err(TourError::InvalidPosition(_))
        ));

        let mut node = PanoramaNode::new("c", "c.jpg");
        node.links.push(Link::new("a", Some(bad)));
        assert!(matches!(g.add_node(node), Err(TourError::InvalidPosition(_))));

        assert!(!g.are_linked("a", "b"));
        assert_eq!(g.get_node("a").unwrap().hotspot("h").unwrap().title, "Note");
        assert_eq!(g.revision(), before);
    }

    #[test]
    fn links_for_missing_node_is_empty() {
        let g = graph_with(&[]);
        assert!(g.links_for("nobody").is_empty());
        assert!(!g.are_linked("nobody", "x"));
    }

    #[test]
    fn convert_round_trip() {
        let mut g = graph_with(&["a", "b"]);
        g.add_hotspot("a", Hotspot::info("h", "Door", p0())).unwrap();

        let h = g.convert_hotspot_to_link("a", "h", "b").unwrap();
        assert_eq!(h.target_id(), Some("b"));
        assert_eq!(g.links_for("a"), &[Link::new("b", Some(p0()))]);

        // Idempotent.
        g.convert_hotspot_to_link("a", "h", "b").unwrap();
        assert_eq!(g.links_for("a").len(), 1);

        let h = g.convert_link_hotspot_to_info("a", "h").unwrap();
        assert_eq!(h.kind, HotspotKind::Info);
        assert!(g.links_for("a").is_empty());
        assert!(g.check_invariants().is_empty());
    }

    #[test]
    fn retargeting_drops_previous_link() {
        let mut g = graph_with(&["a", "b", "c"]);
        g.add_hotspot("a", Hotspot::link("h", "b", "Go", p0()))
            .unwrap();

        g.convert_hotspot_to_link("a", "h", "c").unwrap();

        assert!(!g.are_linked("a", "b"));
        assert!(g.are_linked("a", "c"));
        assert!(g.check_invariants().is_empty());
    }

    #[test]
    fn second_link_hotspot_for_target_is_rejected() {
        let mut g = graph_with(&["a", "b"]);
        g.add_hotspot("a", Hotspot::link("h1", "b", "Go", p0()))
            .unwrap();
        g.add_hotspot("a", Hotspot::info("h2", "Also go", p1()))
            .unwrap();

        let err = g.convert_hotspot_to_link("a", "h2", "b").unwrap_err();
        assert_eq!(
            err,
            TourError::DuplicateId(Duplicate::LinkHotspot {
                node: "a".into(),
                target: "b".into()
            })
        );
        let err = g
            .add_hotspot("a", Hotspot::link("h3", "b", "Again", p1()))
            .unwrap_err();
        assert!(matches!(err, TourError::DuplicateId(_)));
        assert!(g.check_invariants().is_empty());
    }

    #[test]
    fn custom_transitions() {
        let mut g = graph_with(&["a", "b"]);
        g.add_hotspot("a", Hotspot::info("h", "Note", p0())).unwrap();

        let h = g.convert_hotspot_to_custom("a", "h").unwrap();
        assert_eq!(h.kind, HotspotKind::Custom);
        let h = g.convert_link_hotspot_to_info("a", "h").unwrap();
        assert_eq!(h.kind, HotspotKind::Info);

        g.convert_hotspot_to_link("a", "h", "b").unwrap();
        let h = g.convert_hotspot_to_custom("a", "h").unwrap();
        assert_eq!(h.kind, HotspotKind::Custom);
        assert!(!g.are_linked("a", "b"));
    }

    #[test]
    fn hotspot_crud_keeps_links_in_sync() {
        let mut g = graph_with(&["a", "b"]);
        g.add_hotspot("a", Hotspot::link("h", "b", "Go", p0()))
            .unwrap();
        assert_eq!(
            g.add_hotspot("a", Hotspot::info("h", "dup", p0()))
                .unwrap_err(),
            TourError::DuplicateId(Duplicate::Hotspot {
                node: "a".into(),
                hotspot: "h".into()
            })
        );

        let h = g
            .update_hotspot(
                "a",
                "h",
                HotspotPatch {
                    title: Some("Go on".into()),
                    position: Some(p1()),
                    ..HotspotPatch::default()
                },
            )
            .unwrap();
        assert_eq!(h.title, "Go on");
        assert_eq!(g.links_for("a"), &[Link::new("b", Some(p1()))]);

        assert!(g.remove_hotspot("a", "h").unwrap().is_some());
        assert!(g.links_for("a").is_empty());
        assert!(g.remove_hotspot("a", "h").unwrap().is_none());
    }

    #[test]
    fn kind_change_is_recorded() {
        let mut g = graph_with(&["a", "b"]);
        g.add_hotspot("a", Hotspot::info("h", "Door", p0())).unwrap();
        g.drain_events();

        g.convert_hotspot_to_link("a", "h", "b").unwrap();
        let events: Vec<_> = g.drain_events().into_iter().map(|r| r.event).collect();
        assert_eq!(
            events,
            vec![
                TourEvent::HotspotKindChanged {
                    node: "a".into(),
                    hotspot: "h".into(),
                    from: HotspotKindTag::Info,
                    to: HotspotKindTag::Link,
                },
                TourEvent::LinkUpserted {
                    source: "a".into(),
                    target: "b".into()
                },
            ]
        );

        let before = g.revision();
        g.remove_link("a", "zz").unwrap();
        assert_eq!(g.revision(), before);
    }

    #[test]
    fn mutations_on_missing_hotspot_fail() {
        let mut g = graph_with(&["a"]);
        assert!(
            g.convert_hotspot_to_link("a", "nope", "b")
                .unwrap_err()
                .is_not_found()
        );
        assert!(
            g.convert_link_hotspot_to_info("a", "nope")
                .unwrap_err()
                .is_not_found()
        );
        assert!(
            g.update_hotspot("a", "nope", HotspotPatch::default())
                .unwrap_err()
                .is_not_found()
        );
    }
}
