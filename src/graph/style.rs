//! Stateless presentation mapping from node fields to visual attributes.
//!
//! Nothing here touches layout; the rendering layer receives colors, sizes
//! and borders and positions elements itself.

use serde::Serialize;

use super::{EntityStore, Node, Selection};

const DEPTH_COLORS: [&str; 4] = ["#F08080", "#87CEEB", "#90EE90", "#DDA0DD"];
const DEPTH_SIZES: [u32; 4] = [60, 45, 36, 30];

const HUB_BORDER_COLOR: &str = "#DAA520";
const HUB_BORDER_WIDTH: u32 = 4;
const SELECTED_BORDER_COLOR: &str = "#1E3A8A";
const SELECTED_BORDER_WIDTH: u32 = 5;
const DEFAULT_BORDER_COLOR: &str = "#555555";
const DEFAULT_BORDER_WIDTH: u32 = 1;

/// Visual attributes for one node.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct NodeStyle {
    pub color: &'static str,
    pub size: u32,
    pub border_color: &'static str,
    pub border_width: u32,
    /// Unexpanded nodes render dashed to mark the frontier.
    pub dashed: bool,
}

/// Fill color for a depth; depths past the palette reuse the last entry.
pub fn depth_color(depth: u32) -> &'static str {
    DEPTH_COLORS[(depth as usize).min(DEPTH_COLORS.len() - 1)]
}

pub fn depth_size(depth: u32) -> u32 {
    DEPTH_SIZES[(depth as usize).min(DEPTH_SIZES.len() - 1)]
}

/// A hub has at least `threshold` sitelinks. A threshold of 0 disables hubs.
pub fn is_hub(sitelink_count: u64, threshold: u64) -> bool {
    threshold > 0 && sitelink_count >= threshold
}

pub fn node_style(node: &Node, hub_threshold: u64, selected: bool, expanded: bool) -> NodeStyle {
    let (border_color, border_width) = if selected {
        (SELECTED_BORDER_COLOR, SELECTED_BORDER_WIDTH)
    } else if is_hub(node.sitelink_count, hub_threshold) {
        (HUB_BORDER_COLOR, HUB_BORDER_WIDTH)
    } else {
        (DEFAULT_BORDER_COLOR, DEFAULT_BORDER_WIDTH)
    };

    NodeStyle {
        color: depth_color(node.depth),
        size: depth_size(node.depth),
        border_color,
        border_width,
        dashed: !expanded,
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct RenderedNode {
    pub id: String,
    pub label: String,
    pub depth: u32,
    pub sitelinks: u64,
    pub hub: bool,
    pub selected: bool,
    pub expanded: bool,
    pub style: NodeStyle,
}

#[derive(Debug, Clone, Serialize)]
pub struct RenderedEdge {
    pub id: String,
    pub source: String,
    pub target: String,
    pub label: String,
}

/// Everything a renderer needs for the current graph state.
#[derive(Debug, Clone, Serialize)]
pub struct RenderedGraph {
    pub nodes: Vec<RenderedNode>,
    pub edges: Vec<RenderedEdge>,
}

/// Snapshot the store into styled elements, in insertion order.
pub fn render_elements(store: &EntityStore, selection: &Selection, hub_threshold: u64) -> RenderedGraph {
    let nodes = store
        .nodes()
        .map(|node| {
            let selected = selection.contains(&node.id);
            let expanded = store.is_expanded(&node.id);
            RenderedNode {
                id: node.id.clone(),
                label: node.display_label().to_string(),
                depth: node.depth,
                sitelinks: node.sitelink_count,
                hub: is_hub(node.sitelink_count, hub_threshold),
                selected,
                expanded,
                style: node_style(node, hub_threshold, selected, expanded),
            }
        })
        .collect();

    let edges = store
        .edges()
        .map(|edge| RenderedEdge {
            id: edge.id.clone(),
            source: edge.source.clone(),
            target: edge.target.clone(),
            label: edge.label.clone(),
        })
        .collect();

    RenderedGraph { nodes, edges }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::graph::{Edge, NodeRecord};

    #[test]
    fn test_depth_palette_clamps() {
        assert_eq!(depth_color(0), "#F08080");
        assert_eq!(depth_color(3), "#DDA0DD");
        assert_eq!(depth_color(12), "#DDA0DD");
        assert!(depth_size(0) > depth_size(1));
        assert_eq!(depth_size(7), depth_size(3));
    }

    #[test]
    fn test_hub_threshold() {
        assert!(!is_hub(500, 0));
        assert!(is_hub(100, 100));
        assert!(!is_hub(99, 100));
    }

    #[test]
    fn test_node_style_priorities() {
        let hub = NodeRecord::new("Q30", "United States").with_sitelinks(300).into_node(1);
        let style = node_style(&hub, 200, false, false);
        assert_eq!(style.border_color, HUB_BORDER_COLOR);
        assert_eq!(style.color, depth_color(1));
        assert!(style.dashed);

        let style = node_style(&hub, 200, true, true);
        assert_eq!(style.border_color, SELECTED_BORDER_COLOR);
        assert!(!style.dashed);

        let style = node_style(&hub, 0, false, true);
        assert_eq!(style.border_width, DEFAULT_BORDER_WIDTH);
    }

    #[test]
    fn test_render_elements_reflects_state() {
        let mut store = EntityStore::new();
        store.insert_node(NodeRecord::new("Q1", "Root").into_node(0));
        store.insert_node(NodeRecord::new("Q2", "Hub").with_sitelinks(50).into_node(1));
        store.insert_edge(Edge::new("Q1", "P1", "Q2", "rel"));
        store.mark_expanded("Q1");
        let mut selection = Selection::new();
        selection.toggle("Q2");

        let graph = render_elements(&store, &selection, 10);
        assert_eq!(graph.nodes.len(), 2);
        assert!(graph.nodes[0].expanded);
        assert!(!graph.nodes[0].selected);
        assert!(graph.nodes[1].hub);
        assert!(graph.nodes[1].selected);
        assert_eq!(graph.edges[0].id, "Q1-P1-Q2");

        let json = serde_json::to_value(&graph).unwrap();
        assert_eq!(json["nodes"][1]["style"]["border_color"], SELECTED_BORDER_COLOR);
    }
}
