pub mod node;

pub use node::{Node, NodeKind};

use std::sync::OnceLock;

use crate::parser::ParseError;
use crate::toc::TableOfContents;

/// A link found in a document.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Link {
    /// Visible text: the `Text` descendants of the link, in order.
    pub text: String,
    pub url: String,
    /// Byte offset of the link in source.
    pub position: usize,
    pub is_wikilink: bool,
}

/// A parsed document: the node tree plus everything derived from it.
///
/// The tree is read-only once set. Word and character counts are computed on
/// first use and cached until the next [`set_root`](Document::set_root).
#[derive(Debug, Default)]
pub struct Document {
    root: Option<Node>,
    toc: TableOfContents,
    word_count: OnceLock<usize>,
    char_count: OnceLock<usize>,
    diagnostics: Vec<ParseError>,
}

impl Document {
    pub fn new() -> Self {
        Document::default()
    }

    pub fn from_root(root: Node) -> Self {
        let mut document = Document::new();
        document.set_root(root);
        document
    }

    /// Replace the tree. Clears the cached counts and rebuilds the table of
    /// contents.
    pub fn set_root(&mut self, root: Node) {
        self.root = Some(root);
        self.word_count = OnceLock::new();
        self.char_count = OnceLock::new();
        self.regenerate_toc();
    }

    pub fn root(&self) -> Option<&Node> {
        self.root.as_ref()
    }

    pub fn is_empty(&self) -> bool {
        self.root.as_ref().is_none_or(|root| root.children.is_empty())
    }

    /// The node at pre-order position `index`, the root being 0. This is how
    /// [`Entry::node_index`](crate::toc::Entry::node_index) is resolved.
    pub fn node_at(&self, index: usize) -> Option<&Node> {
        self.root.as_ref()?.nth_preorder(index)
    }

    pub fn toc(&self) -> &TableOfContents {
        &self.toc
    }

    pub fn regenerate_toc(&mut self) {
        self.toc = TableOfContents::generate(self.root.as_ref());
    }

    /// Warnings recorded while the tree was built.
    pub fn diagnostics(&self) -> &[ParseError] {
        &self.diagnostics
    }

    pub(crate) fn set_diagnostics(&mut self, diagnostics: Vec<ParseError>) {
        self.diagnostics = diagnostics;
    }

    /// Sum of the word counts of every `Text` node, each counted on its own.
    pub fn word_count(&self) -> usize {
        *self.word_count.get_or_init(|| {
            let mut count = 0;
            self.visit(|node| {
                if node.kind == NodeKind::Text {
                    count += count_words(node.content.as_bytes());
                }
            });
            count
        })
    }

    /// Total byte length of all `Text` content.
    pub fn character_count(&self) -> usize {
        *self.char_count.get_or_init(|| {
            let mut count = 0;
            self.visit(|node| {
                if node.kind == NodeKind::Text {
                    count += node.content.len();
                }
            });
            count
        })
    }

    /// Every `Link` node, in document order. Not cached.
    pub fn extract_links(&self) -> Vec<Link> {
        let mut links = Vec::new();
        self.visit(|node| {
            if node.kind == NodeKind::Link {
                links.push(Link {
                    text: node.text_content(),
                    url: node.url.clone().unwrap_or_default(),
                    position: node.source.start,
                    is_wikilink: false,
                });
            }
        });
        links
    }

    /// Pre-order traversal of the whole tree, root included.
    pub fn visit<'a>(&'a self, mut visitor: impl FnMut(&'a Node)) {
        if let Some(root) = &self.root {
            root.walk(&mut visitor);
        }
    }
}

fn is_word_separator(byte: u8) -> bool {
    matches!(byte, b' ' | b'\t' | b'\n' | b'\r')
}

/// Number of maximal runs of bytes other than space, tab, LF and CR.
pub fn count_words(bytes: &[u8]) -> usize {
    let mut count = 0;
    let mut in_word = false;
    for &byte in bytes {
        if is_word_separator(byte) {
            in_word = false;
        } else if !in_word {
            in_word = true;
            count += 1;
        }
    }
    count
}
