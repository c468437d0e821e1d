//! Random sequences of link and hotspot operations never break the
//! link/hotspot synchronization invariant.

use foundation::math::Position;
use proptest::prelude::*;
use tour::{Hotspot, HotspotKind, PanoramaGraph, PanoramaNode, TourOp};

const NODES: [&str; 3] = ["a", "b", "c"];
const HOTSPOTS: [&str; 3] = ["h1", "h2", "h3"];

fn node() -> impl Strategy<Value = String> {
    prop::sample::select(NODES.to_vec()).prop_map(str::to_string)
}

fn target() -> impl Strategy<Value = String> {
    // Includes a target that never exists.
    prop::sample::select(vec!["a", "b", "c", "ghost"]).prop_map(str::to_string)
}

fn hotspot_id() -> impl Strategy<Value = String> {
    prop::sample::select(HOTSPOTS.to_vec()).prop_map(str::to_string)
}

fn position() -> impl Strategy<Value = Position> {
    prop_oneof![
        (0.0..4096.0f64, 0.0..2048.0f64).prop_map(|(x, y)| Position::texture(x, y)),
        (-3.0..3.0f64, -1.5..1.5f64).prop_map(|(yaw, pitch)| Position::spherical(yaw, pitch)),
    ]
}

fn op() -> impl Strategy<Value = TourOp> {
    prop_oneof![
        (node(), target(), prop::option::of(position())).prop_map(|(source, target, position)| {
            TourOp::AddLink {
                source,
                target,
                position,
            }
        }),
        (node(), target()).prop_map(|(source, target)| TourOp::RemoveLink { source, target }),
        (node(), target(), position()).prop_map(|(source, target, position)| {
            TourOp::UpdateLinkPosition {
                source,
                target,
                position,
            }
        }),
        (node(), hotspot_id(), position()).prop_map(|(node, id, position)| TourOp::AddHotspot {
            node,
            hotspot: Hotspot::info(id, "spot", position),
        }),
        (node(), hotspot_id(), target()).prop_map(|(node, hotspot, target)| {
            TourOp::ConvertHotspotToLink {
                node,
                hotspot,
                target,
            }
        }),
        (node(), hotspot_id())
            .prop_map(|(node, hotspot)| TourOp::ConvertLinkHotspotToInfo { node, hotspot }),
        (node(), hotspot_id())
            .prop_map(|(node, hotspot)| TourOp::ConvertHotspotToCustom { node, hotspot }),
        (node(), hotspot_id()).prop_map(|(node, hotspot)| TourOp::RemoveHotspot { node, hotspot }),
        node().prop_map(|id| TourOp::RemoveNode { id }),
    ]
}

fn fresh_graph() -> PanoramaGraph {
    let mut g = PanoramaGraph::new();
    for id in NODES {
        g.add_node(PanoramaNode::new(id, format!("{id}.jpg")))
            .expect("fresh ids");
    }
    g
}

proptest! {
    #[test]
    fn link_hotspots_stay_backed(ops in prop::collection::vec(op(), 0..60)) {
        let mut g = fresh_graph();
        g.apply_batch(ops);

        prop_assert!(g.check_invariants().is_empty(), "{:?}", g.check_invariants());

        for node in g.all_nodes() {
            for h in &node.hotspots {
                if let HotspotKind::Link { target_id } = &h.kind {
                    let matching: Vec<_> =
                        node.links.iter().filter(|l| &l.target_id == target_id).collect();
                    prop_assert_eq!(matching.len(), 1);
                    prop_assert_eq!(matching[0].position, Some(h.position));
                }
            }
        }
    }
}

proptest! {
    #[test]
    fn repeated_upsert_leaves_one_edge(pos in position(), repeat in 1usize..8) {
        let mut g = fresh_graph();
        for _ in 0..repeat {
            g.add_link("a", "b", Some(pos)).expect("source exists");
        }
        let to_b: Vec<_> = g.links_for("a").iter().filter(|l| l.target_id == "b").collect();
        prop_assert_eq!(to_b.len(), 1);
        prop_assert_eq!(to_b[0].position, Some(pos));
    }
}
