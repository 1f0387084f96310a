/// Snapshot of the on-screen accessibility tree.
///
/// Nodes live in a flat arena; `NodeId` is an index into it and is only
/// meaningful for the snapshot it came from. Each node also carries the
/// provider's own `handle` so actions can be routed back to the live view.
use serde::{Deserialize, Serialize};

pub type NodeId = usize;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct Bounds {
    pub left: i32,
    pub top: i32,
    pub right: i32,
    pub bottom: i32,
}

impl Bounds {
    pub fn new(left: i32, top: i32, right: i32, bottom: i32) -> Self {
        Self {
            left,
            top,
            right,
            bottom,
        }
    }

    /// Exact centre in screen pixels.
    pub fn center(&self) -> (f32, f32) {
        (
            (self.left + self.right) as f32 / 2.0,
            (self.top + self.bottom) as f32 / 2.0,
        )
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct UiNode {
    /// Opaque provider-side reference to the live node.
    pub handle: u64,
    pub text: Option<String>,
    pub content_description: Option<String>,
    pub bounds: Bounds,
    pub clickable: bool,
    pub editable: bool,
    pub focused: bool,
    pub scrollable: bool,
    #[serde(skip)]
    pub parent: Option<NodeId>,
    #[serde(skip)]
    pub children: Vec<NodeId>,
}

impl UiNode {
    /// Case-insensitive substring match on the visible text or description.
    pub fn text_contains(&self, needle_lower: &str) -> bool {
        [&self.text, &self.content_description]
            .into_iter()
            .flatten()
            .any(|t| t.to_lowercase().contains(needle_lower))
    }
}

#[derive(Debug, Clone)]
pub struct UiTree {
    nodes: Vec<UiNode>,
}

impl UiTree {
    pub fn new(mut root: UiNode) -> Self {
        root.parent = None;
        root.children.clear();
        Self { nodes: vec![root] }
    }

    pub fn root(&self) -> NodeId {
        0
    }

    /// Append `node` under `parent` and return its id.
    pub fn add_child(&mut self, parent: NodeId, mut node: UiNode) -> NodeId {
        let id = self.nodes.len();
        node.parent = Some(parent);
        node.children.clear();
        self.nodes.push(node);
        self.nodes[parent].children.push(id);
        id
    }

    pub fn node(&self, id: NodeId) -> &UiNode {
        &self.nodes[id]
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    pub fn children(&self, id: NodeId) -> &[NodeId] {
        &self.nodes[id].children
    }

    /// Pre-order depth-first walk from the root.
    pub fn depth_first(&self) -> DepthFirst<'_> {
        DepthFirst {
            tree: self,
            stack: vec![self.root()],
        }
    }

    /// First node in depth-first order satisfying `pred`.
    pub fn find_first<F>(&self, mut pred: F) -> Option<NodeId>
    where
        F: FnMut(&UiNode) -> bool,
    {
        self.depth_first().find(|&id| pred(self.node(id)))
    }

    /// All nodes whose text contains `needle`, case-insensitively, in depth-first order.
    pub fn find_by_text(&self, needle: &str) -> Vec<NodeId> {
        let needle = needle.to_lowercase();
        if needle.is_empty() {
            return Vec::new();
        }
        self.depth_first()
            .filter(|&id| self.node(id).text_contains(&needle))
            .collect()
    }

    pub fn contains_text(&self, needle: &str) -> bool {
        !self.find_by_text(needle).is_empty()
    }

    /// True if the node or any of its ancestors accepts clicks.
    pub fn is_actionable(&self, id: NodeId) -> bool {
        let mut cursor = Some(id);
        while let Some(current) = cursor {
            let node = self.node(current);
            if node.clickable {
                return true;
            }
            cursor = node.parent;
        }
        false
    }

    /// The focused editable node, else the first editable one.
    pub fn find_editable(&self) -> Option<NodeId> {
        self.find_first(|n| n.editable && n.focused)
            .or_else(|| self.find_first(|n| n.editable))
    }
}

pub struct DepthFirst<'a> {
    tree: &'a UiTree,
    stack: Vec<NodeId>,
}

impl Iterator for DepthFirst<'_> {
    type Item = NodeId;

    fn next(&mut self) -> Option<NodeId> {
        let id = self.stack.pop()?;
        // Reverse so the first child is visited first.
        self.stack
            .extend(self.tree.children(id).iter().rev().copied());
        Some(id)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TreeEventKind {
    WindowStateChanged,
    WindowContentChanged,
    ViewClicked,
    Other,
}

/// A change notification from the accessibility layer.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TreeEvent {
    pub kind: TreeEventKind,
    pub text: Vec<String>,
}

impl TreeEvent {
    pub fn new(kind: TreeEventKind, text: impl Into<String>) -> Self {
        Self {
            kind,
            text: vec![text.into()],
        }
    }

    /// Whether this event is evidence that an action on `target` took effect.
    pub fn confirms(&self, target: &str) -> bool {
        if self.kind == TreeEventKind::Other {
            return false;
        }
        let target = target.to_lowercase();
        self.text.iter().any(|t| t.to_lowercase().contains(&target))
    }
}
