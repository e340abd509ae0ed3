use inkwell::document::count_words;
use inkwell::parser::TreeBuilder;
use inkwell::parser::event::{BlockKind, EventSink, SpanKind, TextKind};
use inkwell::{Document, Node, NodeKind, parse};
use proptest::prelude::*;

#[derive(Debug, Clone)]
enum Event {
    EnterBlock(BlockKind),
    LeaveBlock(BlockKind),
    EnterSpan(SpanKind),
    LeaveSpan(SpanKind),
    Text(String),
}

fn block_kind() -> impl Strategy<Value = BlockKind> {
    prop_oneof![
        Just(BlockKind::Paragraph),
        Just(BlockKind::Quote),
        Just(BlockKind::UnorderedList),
        Just(BlockKind::ListItem),
        Just(BlockKind::Rule),
    ]
}

fn span_kind() -> impl Strategy<Value = SpanKind> {
    prop_oneof![
        Just(SpanKind::Emphasis),
        Just(SpanKind::Strong),
        Just(SpanKind::Strikethrough),
    ]
}

fn event() -> impl Strategy<Value = Event> {
    prop_oneof![
        block_kind().prop_map(Event::EnterBlock),
        block_kind().prop_map(Event::LeaveBlock),
        span_kind().prop_map(Event::EnterSpan),
        span_kind().prop_map(Event::LeaveSpan),
        "[a-z ]{0,6}".prop_map(Event::Text),
    ]
}

fn text_nodes(root: &Node) -> String {
    let mut text = String::new();
    root.walk(&mut |node| {
        if node.kind == NodeKind::Text {
            text.push_str(&node.content);
        }
    });
    text
}

proptest! {
    /// Any event order, balanced or not, yields a tree that keeps every
    /// non-empty text in order.
    #[test]
    fn builder_keeps_text_for_any_event_order(events in prop::collection::vec(event(), 0..64)) {
        let mut builder = TreeBuilder::new();
        let mut expected = String::new();
        for (i, event) in events.iter().enumerate() {
            match event {
                Event::EnterBlock(kind) => builder.enter_block(*kind, None, i..i),
                Event::LeaveBlock(kind) => builder.leave_block(*kind, i..i),
                Event::EnterSpan(kind) => builder.enter_span(*kind, None, i..i),
                Event::LeaveSpan(kind) => builder.leave_span(*kind, i..i),
                Event::Text(text) => {
                    builder.text(TextKind::Normal, text, i..i);
                    expected.push_str(text);
                }
            }
            prop_assert!(builder.depth() >= 1);
        }

        let (root, _) = builder.finish();
        prop_assert_eq!(root.kind, NodeKind::Paragraph);
        prop_assert_eq!(text_nodes(&root), expected);
        root.walk(&mut |node| {
            if node.kind == NodeKind::Text {
                assert!(!node.content.is_empty());
                assert!(node.children.is_empty());
            }
        });
    }

    /// Every text node contributes its own words, whatever its neighbours hold.
    #[test]
    fn word_count_sums_text_nodes(chunks in prop::collection::vec("[a-z \t\n]{0,8}", 0..16)) {
        let children = chunks
            .iter()
            .map(|c| Node::new(NodeKind::Paragraph).with_children(vec![Node::text(c.as_str())]))
            .collect();
        let document = Document::from_root(Node::new(NodeKind::Paragraph).with_children(children));
        let expected: usize = chunks.iter().map(|c| count_words(c.as_bytes())).sum();
        prop_assert_eq!(document.word_count(), expected);
        prop_assert_eq!(document.character_count(), chunks.concat().len());
    }

    #[test]
    fn parse_is_deterministic(source in "[#*_`>\\-\\[\\]()a-z \n]{0,80}") {
        let first = parse(&source);
        let second = parse(&source);
        prop_assert_eq!(first.root(), second.root());
        prop_assert_eq!(first.toc(), second.toc());
        prop_assert_eq!(first.word_count(), second.word_count());
        prop_assert_eq!(first.diagnostics(), second.diagnostics());
    }

    #[test]
    fn toc_covers_every_heading(source in "(#{1,6} [a-z]{1,5}\n|[a-z]{1,5}\n\n){0,20}") {
        let document = parse(&source);
        let mut headings = 0;
        document.visit(|node| {
            if node.kind == NodeKind::Heading {
                headings += 1;
            }
        });
        prop_assert_eq!(document.toc().len(), headings);
    }
}
