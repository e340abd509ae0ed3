use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::thread;

use inkwell::{Document, Node, NodeKind, Rect, ShadowNode, ShadowTree, parse};
use parking_lot::Mutex;

fn paragraphs(count: usize) -> Document {
    let children = (0..count)
        .map(|i| Node::new(NodeKind::Paragraph).with_children(vec![Node::text(format!("p{}", i))]))
        .collect();
    Document::from_root(Node::new(NodeKind::Paragraph).with_children(children))
}

/// Stack the root's children vertically, `height` units each.
fn lay_out_rows(root: &Arc<ShadowNode>, height: f32) {
    root.set_layout(Rect::new(0.0, 0.0, 100.0, height * root.children.len() as f32));
    for (i, child) in root.children.iter().enumerate() {
        let rect = Rect::new(0.0, i as f32 * height, 100.0, height);
        child.set_layout(rect);
        for grandchild in &child.children {
            grandchild.set_layout(rect);
        }
    }
}

#[test]
fn empty_document_leaves_tree_unset() {
    let tree = ShadowTree::new();
    tree.update(&Document::new());
    assert!(tree.root().is_none());
    assert_eq!(tree.version(), 0);
    assert!(tree.visible_nodes().is_empty());
}

#[test]
fn update_mirrors_document() {
    let tree = ShadowTree::new();
    let document = parse("# Title\n\nSome *text* here.");
    tree.update(&document);

    let root = tree.root().expect("published root");
    let source = document.root().unwrap();
    assert_eq!(root.kind, source.kind);
    assert_eq!(root.children.len(), source.children.len());
    assert_eq!(root.subtree_len(), source.node_count());

    let mut kinds = Vec::new();
    root.walk(&mut |node| kinds.push(node.kind));
    let mut expected = Vec::new();
    source.walk(&mut |node| expected.push(node.kind));
    assert_eq!(kinds, expected);

    root.walk(&mut |node| {
        assert!(node.needs_layout());
        assert!(node.is_dirty());
        assert!(!node.is_visible());
        assert_eq!(node.generation, 1);
    });
}

#[test]
fn every_update_bumps_version() {
    let tree = ShadowTree::new();
    let document = paragraphs(2);
    tree.update(&document);
    tree.update(&document);
    assert_eq!(tree.version(), 2);
    assert_eq!(tree.root().unwrap().generation, 2);
}

#[test]
fn viewport_selects_visible_nodes() {
    let tree = ShadowTree::new();
    tree.update(&paragraphs(10));
    lay_out_rows(&tree.root().unwrap(), 20.0);

    // Rows 0..=2 touch [0, 40]; row 2 starts exactly at 40.
    tree.set_viewport(0.0, 40.0);
    assert_eq!(tree.viewport(), (0.0, 40.0));

    let visible: Vec<String> = tree
        .visible_nodes()
        .iter()
        .filter(|node| node.kind == NodeKind::Text)
        .map(|node| node.content.clone())
        .collect();
    assert_eq!(visible, vec!["p0", "p1", "p2"]);

    tree.set_viewport(1000.0, 10.0);
    assert!(tree.visible_nodes().is_empty());
}

#[test]
fn nodes_without_layout_stay_hidden() {
    let tree = ShadowTree::new();
    tree.set_viewport(0.0, 500.0);
    tree.update(&paragraphs(3));
    assert!(tree.visible_nodes().is_empty());

    let root = tree.root().unwrap();
    root.set_layout(Rect::new(0.0, 0.0, 100.0, 60.0));
    root.children[0].set_layout(Rect::new(0.0, 0.0, 100.0, 20.0));
    tree.set_viewport(0.0, 500.0);

    let visible = tree.visible_nodes();
    assert_eq!(visible.len(), 2);
    assert!(Arc::ptr_eq(&visible[0], &root));
    assert!(Arc::ptr_eq(&visible[1], &root.children[0]));
}

#[test]
fn visibility_change_marks_dirty() {
    let tree = ShadowTree::new();
    tree.update(&paragraphs(2));
    let root = tree.root().unwrap();
    lay_out_rows(&root, 20.0);
    root.walk(&mut |node| {
        node.take_dirty();
    });

    tree.set_viewport(0.0, 10.0);
    assert!(root.children[0].is_dirty());
    assert!(!root.children[1].is_dirty());

    // Same viewport again: nothing flips.
    root.children[0].take_dirty();
    tree.set_viewport(0.0, 10.0);
    assert!(!root.children[0].is_dirty());
}

#[test]
fn mark_dirty_bumps_node_version() {
    let tree = ShadowTree::new();
    tree.update(&paragraphs(1));
    let root = tree.root().unwrap();
    let node = &root.children[0];
    node.take_dirty();

    let before = node.version();
    tree.mark_dirty(node);
    assert!(node.is_dirty());
    assert_eq!(node.version(), before + 1);
    assert_eq!(tree.version(), 1);
}

#[test]
fn callbacks_run_in_registration_order() {
    let tree = ShadowTree::new();
    let calls = Arc::new(Mutex::new(Vec::new()));

    for name in ["first", "second"] {
        let calls = Arc::clone(&calls);
        tree.register_update_callback(move |root| {
            calls.lock().push((name, root.generation));
        });
    }

    tree.update(&paragraphs(1));
    tree.update(&paragraphs(2));

    assert_eq!(
        *calls.lock(),
        vec![("first", 1), ("second", 1), ("first", 2), ("second", 2)]
    );
}

#[test]
fn callback_sees_published_root() {
    let tree = Arc::new(ShadowTree::new());
    let matched = Arc::new(AtomicBool::new(false));
    {
        let tree_ref = Arc::downgrade(&tree);
        let matched = Arc::clone(&matched);
        tree.register_update_callback(move |root| {
            let tree = tree_ref.upgrade().unwrap();
            let current = tree.root().unwrap();
            matched.store(Arc::ptr_eq(&current, root), Ordering::SeqCst);
        });
    }
    tree.update(&paragraphs(3));
    assert!(matched.load(Ordering::SeqCst));
}

#[test]
fn incremental_update_out_of_range() {
    let tree = ShadowTree::new();
    assert!(!tree.update_incremental(&Node::text("x"), 0));
    assert_eq!(tree.version(), 1);

    tree.update(&paragraphs(2));
    let before = tree.root().unwrap();
    assert!(!tree.update_incremental(&Node::text("x"), before.subtree_len()));
    assert!(Arc::ptr_eq(&before, &tree.root().unwrap()));
    assert_eq!(tree.version(), 3);
}

#[test]
fn incremental_update_replaces_root() {
    let tree = ShadowTree::new();
    tree.update(&paragraphs(2));
    assert!(tree.update_incremental(&Node::heading(1, "New"), 0));
    let root = tree.root().unwrap();
    assert_eq!(root.kind, NodeKind::Heading);
    assert_eq!(root.children[0].content, "New");
    assert_eq!(root.generation, 2);
}

#[test]
fn incremental_update_keeps_layout_of_ancestors() {
    let tree = ShadowTree::new();
    tree.update(&paragraphs(3));
    let before = tree.root().unwrap();
    lay_out_rows(&before, 20.0);

    // root = 0, p0 = 1, "p0" = 2, p1 = 3
    assert!(tree.update_incremental(&Node::new(NodeKind::HorizontalRule), 3));
    let after = tree.root().unwrap();

    assert_eq!(after.layout(), before.layout());
    assert!(after.version() > before.version());
    assert_eq!(after.children[1].kind, NodeKind::HorizontalRule);
    assert!(after.children[1].needs_layout());
    assert!(Arc::ptr_eq(&after.children[2], &before.children[2]));
}

#[test]
fn readers_never_see_a_mixed_tree() {
    let tree = Arc::new(ShadowTree::new());
    let small = paragraphs(3);
    let large = paragraphs(40);
    tree.update(&small);

    let done = Arc::new(AtomicBool::new(false));
    let snapshots = Arc::new(AtomicUsize::new(0));

    let readers: Vec<_> = (0..4)
        .map(|_| {
            let tree = Arc::clone(&tree);
            let done = Arc::clone(&done);
            let snapshots = Arc::clone(&snapshots);
            thread::spawn(move || {
                loop {
                    let finished = done.load(Ordering::Acquire);
                    let Some(root) = tree.root() else { continue };
                    let generation = root.generation;
                    let mut count = 0;
                    root.walk(&mut |node| {
                        assert_eq!(node.generation, generation);
                        count += 1;
                    });
                    assert!(count == 7 || count == 81, "unexpected tree size {}", count);
                    let _ = tree.visible_nodes();
                    snapshots.fetch_add(1, Ordering::Relaxed);
                    if finished {
                        break;
                    }
                }
            })
        })
        .collect();

    for i in 0..200 {
        tree.update(if i % 2 == 0 { &large } else { &small });
        if i % 10 == 0 {
            tree.set_viewport(i as f32, 100.0);
        }
    }
    done.store(true, Ordering::Release);

    for reader in readers {
        reader.join().unwrap();
    }
    assert_eq!(tree.version(), 201);
    assert!(snapshots.load(Ordering::Relaxed) >= 4);
}
