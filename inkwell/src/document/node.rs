use std::fmt;
use std::ops::Range;

/// The closed set of node kinds a parsed document can contain.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum NodeKind {
    // Block-level
    Paragraph,
    Heading,
    CodeBlock,
    BlockQuote,
    List,
    ListItem,
    Table,
    TableRow,
    TableCell,
    HorizontalRule,

    // Inline
    Image,
    Link,
    Emphasis,
    Strong,
    Code,
    Text,
    LineBreak,
    RawMarkup,
    Strikethrough,
}

/// A single node in the document tree.
///
/// Children are owned exclusively and kept in document order. Attributes that
/// only make sense for some kinds keep their zero value elsewhere.
#[derive(Debug, Clone, PartialEq)]
pub struct Node {
    pub kind: NodeKind,
    /// Text for text-bearing kinds (`Text`).
    pub content: String,
    pub children: Vec<Node>,
    /// 1-6 for headings. A table cell uses 1 to flag a header cell.
    pub heading_level: u8,
    /// Info string of a fenced code block.
    pub code_language: Option<String>,
    /// Target of a link or image.
    pub url: Option<String>,
    pub title: Option<String>,
    pub list_ordered: bool,
    pub list_start: u64,
    /// Byte span in source.
    pub source: Range<usize>,
}

impl Node {
    pub fn new(kind: NodeKind) -> Self {
        Node {
            kind,
            content: String::new(),
            children: Vec::new(),
            heading_level: 0,
            code_language: None,
            url: None,
            title: None,
            list_ordered: false,
            list_start: 1,
            source: 0..0,
        }
    }

    /// A `Text` leaf holding `content`.
    pub fn text(content: impl Into<String>) -> Self {
        Node {
            content: content.into(),
            ..Node::new(NodeKind::Text)
        }
    }

    pub fn heading(level: u8, text: impl Into<String>) -> Self {
        Node {
            heading_level: level,
            children: vec![Node::text(text)],
            ..Node::new(NodeKind::Heading)
        }
    }

    pub fn with_children(mut self, children: Vec<Node>) -> Self {
        self.children = children;
        self
    }

    pub fn with_source(mut self, source: Range<usize>) -> Self {
        self.source = source;
        self
    }

    pub fn is_header_cell(&self) -> bool {
        self.kind == NodeKind::TableCell && self.heading_level > 0
    }

    /// Concatenated content of every `Text` descendant, in document order.
    /// The node itself is included when it is a `Text` node.
    pub fn text_content(&self) -> String {
        let mut text = String::new();
        self.walk(&mut |node| {
            if node.kind == NodeKind::Text {
                text.push_str(&node.content);
            }
        });
        text
    }

    /// Pre-order traversal: a node is visited before its children.
    pub fn walk<'a>(&'a self, visitor: &mut dyn FnMut(&'a Node)) {
        visitor(self);
        for child in &self.children {
            child.walk(visitor);
        }
    }

    /// Number of nodes in this subtree, including `self`.
    pub fn node_count(&self) -> usize {
        1 + self.children.iter().map(Node::node_count).sum::<usize>()
    }

    /// The node at pre-order position `index` (`self` is 0). Visits at most
    /// `index + 1` nodes.
    pub fn nth_preorder(&self, index: usize) -> Option<&Node> {
        let mut remaining = index;
        let mut pending = vec![self];
        while let Some(node) = pending.pop() {
            if remaining == 0 {
                return Some(node);
            }
            remaining -= 1;
            pending.extend(node.children.iter().rev());
        }
        None
    }

    fn fmt_outline(&self, f: &mut fmt::Formatter<'_>, depth: usize) -> fmt::Result {
        write!(f, "{}{:?}", "  ".repeat(depth), self.kind)?;
        match self.kind {
            NodeKind::Heading => write!(f, "(h{})", self.heading_level)?,
            NodeKind::TableCell if self.is_header_cell() => write!(f, "(header)")?,
            NodeKind::List if self.list_ordered => write!(f, "(ordered, start {})", self.list_start)?,
            NodeKind::CodeBlock => {
                if let Some(lang) = &self.code_language {
                    write!(f, "({})", lang)?;
                }
            }
            NodeKind::Link | NodeKind::Image => {
                if let Some(url) = &self.url {
                    write!(f, " -> {}", url)?;
                }
            }
            _ => {}
        }
        if !self.content.is_empty() {
            write!(f, " {:?}", self.content)?;
        }
        writeln!(f, " @{}..{}", self.source.start, self.source.end)?;
        for child in &self.children {
            child.fmt_outline(f, depth + 1)?;
        }
        Ok(())
    }
}

/// Indented outline of the subtree, one node per line.
impl fmt::Display for Node {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.fmt_outline(f, 0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> Node {
        Node::new(NodeKind::Paragraph).with_children(vec![
            Node::heading(1, "Title"),
            Node::new(NodeKind::Paragraph).with_children(vec![
                Node::text("one "),
                Node::new(NodeKind::Strong).with_children(vec![Node::text("two")]),
            ]),
        ])
    }

    #[test]
    fn preorder_addressing() {
        let root = sample();
        assert_eq!(root.node_count(), 7);
        assert_eq!(root.nth_preorder(0).map(|n| n.kind), Some(NodeKind::Paragraph));
        assert_eq!(root.nth_preorder(1).map(|n| n.kind), Some(NodeKind::Heading));
        assert_eq!(root.nth_preorder(2).map(|n| n.content.as_str()), Some("Title"));
        assert_eq!(root.nth_preorder(5).map(|n| n.kind), Some(NodeKind::Strong));
        assert_eq!(root.nth_preorder(6).map(|n| n.content.as_str()), Some("two"));
        assert!(root.nth_preorder(7).is_none());
    }

    #[test]
    fn preorder_index_matches_walk_order() {
        let root = Node::new(NodeKind::Paragraph).with_children(vec![
            Node::new(NodeKind::List).with_children(vec![
                Node::new(NodeKind::ListItem).with_children(vec![sample(), Node::text("a")]),
                Node::new(NodeKind::ListItem).with_children(vec![Node::text("b")]),
            ]),
            sample(),
        ]);
        let mut order = Vec::new();
        root.walk(&mut |node| order.push(node as *const Node));

        for (index, &expected) in order.iter().enumerate() {
            let found = root.nth_preorder(index).map(|n| n as *const Node);
            assert_eq!(found, Some(expected), "index {}", index);
        }
        assert!(root.nth_preorder(order.len()).is_none());
    }

    #[test]
    fn text_content_concatenates_descendants() {
        let root = sample();
        assert_eq!(root.children[1].text_content(), "one two");
        assert_eq!(root.text_content(), "Titleone two");
    }

    #[test]
    fn outline_lists_every_node() {
        let outline = sample().to_string();
        assert_eq!(outline.lines().count(), 7);
        assert!(outline.contains("Heading(h1)"));
        assert!(outline.contains("    Text \"two\""));
    }
}
