pub mod builder;
pub mod error;
pub mod event;
pub mod tokenizer;

pub use builder::TreeBuilder;
pub use error::ParseError;

use tracing::debug;

use crate::document::{Document, Link, Node};
use crate::options::ParserOptions;
use crate::wikilink;

/// Parser entry point.
///
/// Parsing never fails on content: malformed or unsupported constructs are
/// dropped and reported through [`Document::diagnostics`].
#[derive(Debug, Clone, Default)]
pub struct Parser {
    options: ParserOptions,
}

impl Parser {
    pub fn new(options: ParserOptions) -> Self {
        Parser { options }
    }

    pub fn options(&self) -> &ParserOptions {
        &self.options
    }

    /// Options take effect from the next parse.
    pub fn options_mut(&mut self) -> &mut ParserOptions {
        &mut self.options
    }

    /// Parse the source Markdown into a complete Document.
    pub fn parse(&self, input: &str) -> Document {
        self.build(input, TreeBuilder::new())
    }

    /// Parse like [`parse`](Self::parse), handing every `Text` node to
    /// `on_text` as soon as it is appended.
    pub fn parse_incremental(&self, input: &str, mut on_text: impl FnMut(&Node)) -> Document {
        self.build(input, TreeBuilder::new().with_text_callback(&mut on_text))
    }

    /// Find `[[target]]` links in raw text.
    pub fn detect_wikilinks(&self, text: &str) -> Vec<Link> {
        wikilink::detect_wikilinks(text)
    }

    fn build(&self, input: &str, mut builder: TreeBuilder<'_>) -> Document {
        tokenizer::tokenize(input, self.options, &mut builder);
        let (root, diagnostics) = builder.finish();
        debug!(
            bytes = input.len(),
            nodes = root.node_count(),
            warnings = diagnostics.len(),
            "parsed document"
        );
        let mut document = Document::new();
        document.set_root(root);
        document.set_diagnostics(diagnostics);
        document
    }
}
