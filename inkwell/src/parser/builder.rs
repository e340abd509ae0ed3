use std::ops::Range;

use tracing::trace;

use crate::document::{Node, NodeKind};
use crate::parser::error::ParseError;
use crate::parser::event::{BlockKind, Detail, EventSink, SpanKind, TextKind};

// ---------------------------------------------------------------------------
// Build state
// ---------------------------------------------------------------------------

/// Which enter event opened a frame. Leave events are matched against it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Origin {
    Block(BlockKind),
    Span(SpanKind),
}

struct Frame {
    node: Node,
    /// `None` for the synthetic root, which no leave event may close.
    origin: Option<Origin>,
}

/// Builds a [`Node`] tree from tokenizer events.
///
/// The stack of open nodes is seeded with a synthetic root and is never empty
/// until [`finish`](TreeBuilder::finish). A node is attached to its parent when
/// it is closed; since nothing else can be appended to the parent while the
/// node is open, document order is the same as appending on enter.
pub struct TreeBuilder<'cb> {
    stack: Vec<Frame>,
    /// Enter events that were dropped, with the stack depth at the time, so
    /// their leave events are dropped too instead of closing another frame.
    skipped: Vec<(Origin, usize)>,
    diagnostics: Vec<ParseError>,
    on_text: Option<&'cb mut dyn FnMut(&Node)>,
}

impl Default for TreeBuilder<'_> {
    fn default() -> Self {
        Self::new()
    }
}

impl<'cb> TreeBuilder<'cb> {
    pub fn new() -> Self {
        TreeBuilder {
            stack: vec![Frame {
                node: Node::new(NodeKind::Paragraph),
                origin: None,
            }],
            skipped: Vec::new(),
            diagnostics: Vec::new(),
            on_text: None,
        }
    }

    /// Call `callback` with every `Text` node right after it is appended.
    pub fn with_text_callback(mut self, callback: &'cb mut dyn FnMut(&Node)) -> Self {
        self.on_text = Some(callback);
        self
    }

    /// Number of open nodes, the synthetic root included.
    pub fn depth(&self) -> usize {
        self.stack.len()
    }

    /// Close everything still open and return the root with any warnings.
    pub fn finish(mut self) -> (Node, Vec<ParseError>) {
        while self.stack.len() > 1 {
            if let Some(frame) = self.stack.last() {
                let kind = frame.node.kind;
                let span = frame.node.source.clone();
                self.diagnostics
                    .push(ParseError::warning(format!("unclosed {:?} at end of input", kind), span));
            }
            self.close_top();
        }
        let root = match self.stack.pop() {
            Some(frame) => frame.node,
            None => Node::new(NodeKind::Paragraph),
        };
        (root, self.diagnostics)
    }

    // -----------------------------------------------------------------------
    // Stack discipline
    // -----------------------------------------------------------------------

    fn open(&mut self, origin: Origin, node: Node) {
        self.stack.push(Frame {
            node,
            origin: Some(origin),
        });
    }

    fn skip(&mut self, origin: Origin) {
        self.skipped.push((origin, self.stack.len()));
    }

    /// Pop the top frame into its parent. The root is never popped here.
    fn close_top(&mut self) {
        if self.stack.len() <= 1 {
            return;
        }
        if let Some(frame) = self.stack.pop() {
            if let Some(parent) = self.stack.last_mut() {
                parent.node.children.push(frame.node);
            }
        }
    }

    fn close(&mut self, origin: Origin, range: Range<usize>) {
        if let Some(&(skipped, depth)) = self.skipped.last() {
            if skipped == origin && depth == self.stack.len() {
                self.skipped.pop();
                return;
            }
        }

        let Some(index) = self.stack.iter().rposition(|f| f.origin == Some(origin)) else {
            trace!(?origin, ?range, "leave without matching enter dropped");
            return;
        };

        if index + 1 != self.stack.len() {
            self.diagnostics.push(
                ParseError::warning(format!("{:?} closed before its inner nodes", origin), range)
                    .with_note(format!("{} open node(s) closed implicitly", self.stack.len() - index - 1)),
            );
        }
        while self.stack.len() > index {
            self.close_top();
        }
        self.skipped.retain(|&(_, depth)| depth <= self.stack.len());
    }

    fn drop_enter(&mut self, origin: Origin, message: String, range: Range<usize>) {
        trace!(?origin, %message, "enter event dropped");
        self.diagnostics.push(ParseError::warning(message, range));
        self.skip(origin);
    }
}

// ---------------------------------------------------------------------------
// Event handling
// ---------------------------------------------------------------------------

impl EventSink for TreeBuilder<'_> {
    fn enter_block(&mut self, kind: BlockKind, detail: Option<&Detail<'_>>, range: Range<usize>) {
        let origin = Origin::Block(kind);
        let node_kind = match kind {
            BlockKind::Document => {
                // The root already exists; it only takes the document's span.
                if let Some(root) = self.stack.first_mut() {
                    root.node.source = range;
                }
                return;
            }
            BlockKind::Paragraph => NodeKind::Paragraph,
            BlockKind::Heading => {
                let level = match detail {
                    Some(Detail::Heading { level }) => *level,
                    _ => {
                        self.drop_enter(origin, "heading without a level".into(), range);
                        return;
                    }
                };
                if !(1..=6).contains(&level) {
                    self.drop_enter(origin, format!("heading level {} out of range", level), range);
                    return;
                }
                let node = Node {
                    heading_level: level,
                    ..Node::new(NodeKind::Heading)
                };
                self.open(origin, node.with_source(range));
                return;
            }
            BlockKind::Code => {
                let mut node = Node::new(NodeKind::CodeBlock);
                if let Some(Detail::Code { lang, info }) = detail {
                    node.code_language = info.or(*lang).map(str::to_string);
                }
                self.open(origin, node.with_source(range));
                return;
            }
            BlockKind::Quote => NodeKind::BlockQuote,
            BlockKind::UnorderedList => NodeKind::List,
            BlockKind::OrderedList => {
                let start = match detail {
                    Some(Detail::OrderedList { start }) => *start,
                    _ => 1,
                };
                let node = Node {
                    list_ordered: true,
                    list_start: start,
                    ..Node::new(NodeKind::List)
                };
                self.open(origin, node.with_source(range));
                return;
            }
            BlockKind::ListItem => NodeKind::ListItem,
            BlockKind::Rule => NodeKind::HorizontalRule,
            BlockKind::Html => NodeKind::RawMarkup,
            BlockKind::Table => NodeKind::Table,
            BlockKind::TableHead | BlockKind::TableBody | BlockKind::TableRow => NodeKind::TableRow,
            BlockKind::TableHeaderCell | BlockKind::TableCell => {
                let header = match detail {
                    Some(Detail::TableCell { header }) => *header,
                    _ => {
                        self.drop_enter(origin, "table cell without cell detail".into(), range);
                        return;
                    }
                };
                let node = Node {
                    heading_level: u8::from(header),
                    ..Node::new(NodeKind::TableCell)
                };
                self.open(origin, node.with_source(range));
                return;
            }
            BlockKind::Other => {
                trace!(?range, "unsupported block ignored");
                self.skip(origin);
                return;
            }
        };
        self.open(origin, Node::new(node_kind).with_source(range));
    }

    fn leave_block(&mut self, kind: BlockKind, range: Range<usize>) {
        if kind == BlockKind::Document {
            return;
        }
        self.close(Origin::Block(kind), range);
    }

    fn enter_span(&mut self, kind: SpanKind, detail: Option<&Detail<'_>>, range: Range<usize>) {
        let origin = Origin::Span(kind);
        let node = match kind {
            SpanKind::Emphasis => Node::new(NodeKind::Emphasis),
            SpanKind::Strong => Node::new(NodeKind::Strong),
            SpanKind::Code => Node::new(NodeKind::Code),
            SpanKind::Strikethrough => Node::new(NodeKind::Strikethrough),
            SpanKind::Link => match detail {
                Some(Detail::Link { href, title }) => Node {
                    url: Some(href.to_string()),
                    title: non_empty(title),
                    ..Node::new(NodeKind::Link)
                },
                _ => {
                    self.drop_enter(origin, "link without a destination".into(), range);
                    return;
                }
            },
            SpanKind::Image => match detail {
                Some(Detail::Image { src, title }) => Node {
                    url: Some(src.to_string()),
                    title: non_empty(title),
                    ..Node::new(NodeKind::Image)
                },
                _ => {
                    self.drop_enter(origin, "image without a source".into(), range);
                    return;
                }
            },
            SpanKind::Other => {
                trace!(?range, "unsupported span ignored");
                self.skip(origin);
                return;
            }
        };
        self.open(origin, node.with_source(range));
    }

    fn leave_span(&mut self, kind: SpanKind, range: Range<usize>) {
        self.close(Origin::Span(kind), range);
    }

    fn text(&mut self, _kind: TextKind, text: &str, range: Range<usize>) {
        if text.is_empty() {
            return;
        }
        let Some(top) = self.stack.last_mut() else {
            return;
        };
        top.node.children.push(Node::text(text).with_source(range));
        if let Some(callback) = self.on_text.as_mut() {
            if let Some(node) = top.node.children.last() {
                callback(node);
            }
        }
    }
}

fn non_empty(s: &str) -> Option<String> {
    if s.is_empty() { None } else { Some(s.to_string()) }
}
