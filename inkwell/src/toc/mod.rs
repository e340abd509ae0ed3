use crate::document::{Node, NodeKind};

/// One heading in the outline.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Entry {
    pub text: String,
    pub level: u8,
    /// Pre-order index of the heading node in the document tree (root = 0).
    /// Resolve it with [`Document::node_at`](crate::document::Document::node_at);
    /// it is only meaningful for the tree the outline was built from.
    pub node_index: usize,
    pub children: Vec<Entry>,
}

/// Nested outline of a document's headings.
///
/// An entry is nested under the nearest preceding entry with a smaller level.
/// Skipped levels are not filled in: an H3 right after an H1 becomes the H1's
/// child, so levels within a branch need not be contiguous.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TableOfContents {
    pub entries: Vec<Entry>,
}

impl TableOfContents {
    pub fn generate(root: Option<&Node>) -> Self {
        let Some(root) = root else {
            return TableOfContents::default();
        };

        let mut builder = OutlineBuilder::default();
        let mut index = 0;
        root.walk(&mut |node| {
            if node.kind == NodeKind::Heading && node.heading_level >= 1 {
                builder.push(Entry {
                    text: node.text_content(),
                    level: node.heading_level,
                    node_index: index,
                    children: Vec::new(),
                });
            }
            index += 1;
        });

        TableOfContents {
            entries: builder.finish(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Total number of entries at every depth.
    pub fn len(&self) -> usize {
        fn count(entries: &[Entry]) -> usize {
            entries.iter().map(|e| 1 + count(&e.children)).sum()
        }
        count(&self.entries)
    }

    /// Pre-order list of `(depth, entry)`, top-level entries at depth 0.
    pub fn flatten(&self) -> Vec<(usize, &Entry)> {
        fn collect<'a>(entries: &'a [Entry], depth: usize, out: &mut Vec<(usize, &'a Entry)>) {
            for entry in entries {
                out.push((depth, entry));
                collect(&entry.children, depth + 1, out);
            }
        }
        let mut out = Vec::new();
        collect(&self.entries, 0, &mut out);
        out
    }
}

// ---------------------------------------------------------------------------
// Hierarchy reconstruction
// ---------------------------------------------------------------------------

/// Open entries form a stack ordered by increasing level. An entry is only
/// attached to its parent once it can no longer receive children, so the
/// stack owns its entries instead of pointing into the forest.
#[derive(Default)]
struct OutlineBuilder {
    stack: Vec<Entry>,
    roots: Vec<Entry>,
}

impl OutlineBuilder {
    fn push(&mut self, entry: Entry) {
        // Same-or-shallower headings cannot be nested under these.
        while self.stack.last().is_some_and(|top| top.level >= entry.level) {
            self.close_top();
        }
        self.stack.push(entry);
    }

    fn close_top(&mut self) {
        let Some(entry) = self.stack.pop() else {
            return;
        };
        match self.stack.last_mut() {
            Some(parent) => parent.children.push(entry),
            None => self.roots.push(entry),
        }
    }

    fn finish(mut self) -> Vec<Entry> {
        while !self.stack.is_empty() {
            self.close_top();
        }
        self.roots
    }
}
