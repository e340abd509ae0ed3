//! Render-facing mirror of a document tree.
//!
//! The current tree lives behind an [`ArcSwapOption`]: readers take a snapshot
//! with a single atomic load and keep the whole tree alive through its `Arc`s,
//! while the producer builds a replacement off to the side and publishes it
//! with one atomic store. A reader therefore sees either the old tree or the
//! new one, never a mixture, and a superseded tree is freed when its last
//! reader drops it.
//!
//! The engine assumes a single producer thread (`update`,
//! `update_incremental`); any number of threads may read.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicU32, AtomicU64, Ordering};

use arc_swap::ArcSwapOption;
use parking_lot::RwLock;
use tracing::debug;

use crate::document::{Document, Node, NodeKind};

/// Position and size assigned by the renderer's layout pass.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct Rect {
    pub x: f32,
    pub y: f32,
    pub width: f32,
    pub height: f32,
}

impl Rect {
    pub fn new(x: f32, y: f32, width: f32, height: f32) -> Self {
        Rect { x, y, width, height }
    }

    /// Whether the vertical extent touches the band `[top, top + height]`.
    pub fn intersects_band(&self, top: f32, height: f32) -> bool {
        self.y + self.height >= top && self.y <= top + height
    }
}

/// One node of the shadow tree.
///
/// Structure and content are fixed at construction. Layout and render flags
/// use interior mutability so the renderer can update them through a shared
/// reference.
#[derive(Debug)]
pub struct ShadowNode {
    pub kind: NodeKind,
    pub content: String,
    pub children: Vec<Arc<ShadowNode>>,
    /// Global version of the update that created this node.
    pub generation: u64,
    subtree_len: usize,
    layout: RwLock<Rect>,
    needs_layout: AtomicBool,
    visible: AtomicBool,
    dirty: AtomicBool,
    version: AtomicU64,
}

impl ShadowNode {
    /// Copy `node` and its whole subtree.
    pub fn from_node(node: &Node, generation: u64) -> Self {
        let children: Vec<Arc<ShadowNode>> = node
            .children
            .iter()
            .map(|child| Arc::new(ShadowNode::from_node(child, generation)))
            .collect();
        ShadowNode::with_children(node.kind, node.content.clone(), children, generation)
    }

    fn with_children(
        kind: NodeKind,
        content: String,
        children: Vec<Arc<ShadowNode>>,
        generation: u64,
    ) -> Self {
        let subtree_len = 1 + children.iter().map(|c| c.subtree_len).sum::<usize>();
        ShadowNode {
            kind,
            content,
            children,
            generation,
            subtree_len,
            layout: RwLock::new(Rect::default()),
            needs_layout: AtomicBool::new(true),
            visible: AtomicBool::new(false),
            dirty: AtomicBool::new(true),
            version: AtomicU64::new(0),
        }
    }

    /// A copy of this node over new children. The last layout carries over,
    /// but the copy needs layout again, starts dirty and is hidden until then.
    fn copy_with_children(&self, children: Vec<Arc<ShadowNode>>, generation: u64) -> Self {
        let copy = ShadowNode::with_children(self.kind, self.content.clone(), children, generation);
        *copy.layout.write() = self.layout();
        copy.version.store(self.version() + 1, Ordering::Relaxed);
        copy
    }

    /// Number of nodes in this subtree, `self` included.
    pub fn subtree_len(&self) -> usize {
        self.subtree_len
    }

    pub fn layout(&self) -> Rect {
        *self.layout.read()
    }

    /// Record the layout pass result. A changed rect marks the node dirty.
    pub fn set_layout(&self, rect: Rect) {
        let mut layout = self.layout.write();
        if *layout != rect {
            *layout = rect;
            self.dirty.store(true, Ordering::Release);
        }
        self.needs_layout.store(false, Ordering::Release);
    }

    pub fn needs_layout(&self) -> bool {
        self.needs_layout.load(Ordering::Acquire)
    }

    pub fn is_visible(&self) -> bool {
        self.visible.load(Ordering::Acquire)
    }

    pub fn is_dirty(&self) -> bool {
        self.dirty.load(Ordering::Acquire)
    }

    /// Clear the dirty flag, returning whether it was set.
    pub fn take_dirty(&self) -> bool {
        self.dirty.swap(false, Ordering::AcqRel)
    }

    pub fn mark_dirty(&self) {
        self.dirty.store(true, Ordering::Release);
        self.version.fetch_add(1, Ordering::AcqRel);
    }

    pub fn version(&self) -> u64 {
        self.version.load(Ordering::Acquire)
    }

    /// Pre-order traversal of this subtree.
    pub fn walk(self: &Arc<Self>, visitor: &mut dyn FnMut(&Arc<ShadowNode>)) {
        visitor(self);
        for child in &self.children {
            child.walk(visitor);
        }
    }

    /// A node without a layout is never visible.
    fn refresh_visibility(&self, top: f32, height: f32) {
        let now = !self.needs_layout() && self.layout().intersects_band(top, height);
        let was = self.visible.swap(now, Ordering::AcqRel);
        if was != now {
            self.dirty.store(true, Ordering::Release);
        }
        for child in &self.children {
            child.refresh_visibility(top, height);
        }
    }
}

type UpdateCallback = Arc<dyn Fn(&Arc<ShadowNode>) + Send + Sync>;

/// Owner of the current shadow tree.
pub struct ShadowTree {
    root: ArcSwapOption<ShadowNode>,
    /// Generation counter; bumped after every publish.
    version: AtomicU64,
    viewport_y: AtomicU32,
    viewport_height: AtomicU32,
    callbacks: RwLock<Vec<UpdateCallback>>,
}

impl Default for ShadowTree {
    fn default() -> Self {
        Self::new()
    }
}

impl ShadowTree {
    pub fn new() -> Self {
        ShadowTree {
            root: ArcSwapOption::empty(),
            version: AtomicU64::new(0),
            viewport_y: AtomicU32::new(0f32.to_bits()),
            viewport_height: AtomicU32::new(0f32.to_bits()),
            callbacks: RwLock::new(Vec::new()),
        }
    }

    /// Snapshot of the current root.
    pub fn root(&self) -> Option<Arc<ShadowNode>> {
        self.root.load_full()
    }

    pub fn version(&self) -> u64 {
        self.version.load(Ordering::Acquire)
    }

    pub fn viewport(&self) -> (f32, f32) {
        (
            f32::from_bits(self.viewport_y.load(Ordering::SeqCst)),
            f32::from_bits(self.viewport_height.load(Ordering::SeqCst)),
        )
    }

    /// Rebuild the whole tree from `document` and publish it.
    ///
    /// Callbacks run after the new tree is published, in registration order.
    /// A document without a root leaves the current tree in place.
    pub fn update(&self, document: &Document) {
        let Some(source) = document.root() else {
            debug!("shadow update skipped: document has no root");
            return;
        };

        let generation = self.version() + 1;
        let new_root = Arc::new(ShadowNode::from_node(source, generation));
        let (top, height) = self.viewport();
        new_root.refresh_visibility(top, height);

        self.root.store(Some(Arc::clone(&new_root)));
        self.version.fetch_add(1, Ordering::AcqRel);

        // The viewport may have moved while the tree was being built.
        if self.viewport() != (top, height) {
            let (top, height) = self.viewport();
            new_root.refresh_visibility(top, height);
        }

        debug!(
            version = generation,
            nodes = new_root.subtree_len(),
            "shadow tree published"
        );
        self.notify(&new_root);
    }

    /// Replace the subtree at pre-order `index` (root = 0) with a copy of
    /// `node`, sharing every untouched subtree with the current tree.
    ///
    /// The global version is bumped even when nothing could be patched, so
    /// version observers always notice the call. Returns whether a subtree
    /// was replaced; `false` means there was no tree or `index` was out of
    /// range, and a full [`update`](Self::update) is needed instead.
    pub fn update_incremental(&self, node: &Node, index: usize) -> bool {
        let generation = self.version() + 1;
        let patched = match self.root.load_full() {
            Some(current) => {
                let replacement = Arc::new(ShadowNode::from_node(node, generation));
                let (top, height) = self.viewport();
                replacement.refresh_visibility(top, height);
                match replace_at(&current, index, &replacement, generation) {
                    Some(new_root) => {
                        self.root.store(Some(new_root));
                        true
                    }
                    None => false,
                }
            }
            None => false,
        };
        self.version.fetch_add(1, Ordering::AcqRel);
        debug!(index, patched, version = generation, "incremental shadow update");
        patched
    }

    /// Move the viewport and recompute visibility of the current tree.
    pub fn set_viewport(&self, y: f32, height: f32) {
        self.viewport_y.store(y.to_bits(), Ordering::SeqCst);
        self.viewport_height.store(height.to_bits(), Ordering::SeqCst);
        if let Some(root) = self.root.load_full() {
            root.refresh_visibility(y, height);
        }
    }

    /// Visible nodes of one snapshot, in pre-order.
    pub fn visible_nodes(&self) -> Vec<Arc<ShadowNode>> {
        let mut visible = Vec::new();
        if let Some(root) = self.root.load_full() {
            root.walk(&mut |node| {
                if node.is_visible() {
                    visible.push(Arc::clone(node));
                }
            });
        }
        visible
    }

    /// Flag `node` for re-render without rebuilding anything.
    pub fn mark_dirty(&self, node: &ShadowNode) {
        node.mark_dirty();
    }

    /// Register a callback run with the new root after every full update.
    pub fn register_update_callback(&self, callback: impl Fn(&Arc<ShadowNode>) + Send + Sync + 'static) {
        self.callbacks.write().push(Arc::new(callback));
    }

    fn notify(&self, root: &Arc<ShadowNode>) {
        // Cloned so a callback may register further callbacks.
        let callbacks: Vec<UpdateCallback> = self.callbacks.read().clone();
        for callback in &callbacks {
            callback(root);
        }
    }
}

/// Path-copy `node` with the subtree at pre-order `index` swapped for
/// `replacement`. `None` if `index` is outside the subtree.
fn replace_at(
    node: &Arc<ShadowNode>,
    index: usize,
    replacement: &Arc<ShadowNode>,
    generation: u64,
) -> Option<Arc<ShadowNode>> {
    if index == 0 {
        return Some(Arc::clone(replacement));
    }
    let mut remaining = index - 1;
    for (i, child) in node.children.iter().enumerate() {
        if remaining < child.subtree_len {
            let patched = replace_at(child, remaining, replacement, generation)?;
            let mut children = node.children.clone();
            children[i] = patched;
            return Some(Arc::new(node.copy_with_children(children, generation)));
        }
        remaining -= child.subtree_len;
    }
    None
}

#[cfg(test)]
mod tests {
    use super::*;

    fn paragraph(texts: &[&str]) -> Node {
        Node::new(NodeKind::Paragraph).with_children(texts.iter().map(|t| Node::text(*t)).collect())
    }

    #[test]
    fn fresh_nodes_need_layout() {
        let node = ShadowNode::from_node(&paragraph(&["a"]), 1);
        assert!(node.needs_layout());
        assert!(!node.is_visible());
        assert!(node.is_dirty());
        assert_eq!(node.subtree_len(), 2);
    }

    #[test]
    fn set_layout_marks_dirty_only_on_change() {
        let node = ShadowNode::from_node(&paragraph(&[]), 1);
        let rect = Rect::new(0.0, 10.0, 100.0, 20.0);
        node.set_layout(rect);
        assert!(!node.needs_layout());
        assert!(node.take_dirty());
        node.set_layout(rect);
        assert!(!node.is_dirty());
        assert_eq!(node.layout(), rect);
    }

    #[test]
    fn unlaid_node_is_never_visible() {
        let node = ShadowNode::from_node(&paragraph(&[]), 1);
        node.refresh_visibility(0.0, 0.0);
        assert!(!node.is_visible());
        node.refresh_visibility(0.0, 1000.0);
        assert!(!node.is_visible());

        node.set_layout(Rect::new(0.0, 0.0, 10.0, 10.0));
        node.refresh_visibility(0.0, 1000.0);
        assert!(node.is_visible());
    }

    #[test]
    fn band_intersection_is_inclusive() {
        let rect = Rect::new(0.0, 100.0, 10.0, 50.0);
        assert!(rect.intersects_band(150.0, 10.0));
        assert!(rect.intersects_band(0.0, 100.0));
        assert!(!rect.intersects_band(151.0, 10.0));
        assert!(!rect.intersects_band(0.0, 99.0));
    }

    #[test]
    fn replace_at_shares_untouched_siblings() {
        let tree = ShadowTree::new();
        tree.update(&Document::from_root(
            Node::new(NodeKind::Paragraph).with_children(vec![paragraph(&["a"]), paragraph(&["b"])]),
        ));
        let before = tree.root().unwrap();

        // root = 0, first paragraph = 1, "a" = 2, second paragraph = 3
        assert!(tree.update_incremental(&paragraph(&["c", "d"]), 3));
        let after = tree.root().unwrap();

        assert!(Arc::ptr_eq(&before.children[0], &after.children[0]));
        assert_eq!(after.children[1].children.len(), 2);
        assert_eq!(after.children[1].children[0].content, "c");
        assert_eq!(after.subtree_len(), 6);
        // The old snapshot is untouched.
        assert_eq!(before.children[1].children[0].content, "b");
    }
}
