pub mod document;
pub mod options;
pub mod parser;
pub mod shadow;
pub mod toc;
pub mod wikilink;

pub use document::{Document, Link, Node, NodeKind};
pub use options::{ConfigError, ParserOptions};
pub use parser::{ParseError, Parser};
pub use shadow::{Rect, ShadowNode, ShadowTree};
pub use toc::{Entry, TableOfContents};

/// Parse `input` with the default options.
pub fn parse(input: &str) -> Document {
    Parser::default().parse(input)
}
