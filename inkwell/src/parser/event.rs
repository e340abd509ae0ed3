//! The enter/leave/text event interface between a tokenizer and the tree
//! builder.

use std::ops::Range;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BlockKind {
    /// The whole document. Always the outermost block.
    Document,
    Paragraph,
    Heading,
    Code,
    Quote,
    UnorderedList,
    OrderedList,
    ListItem,
    Rule,
    Html,
    Table,
    TableHead,
    TableBody,
    TableRow,
    TableHeaderCell,
    TableCell,
    /// A block the tree has no representation for.
    Other,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SpanKind {
    Emphasis,
    Strong,
    Code,
    Strikethrough,
    Link,
    Image,
    Other,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TextKind {
    Normal,
    Code,
    Html,
    SoftBreak,
    HardBreak,
}

/// Kind-specific payload attached to an enter event.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Detail<'a> {
    Heading { level: u8 },
    /// `lang` is the first word of `info`; either may be missing.
    Code {
        lang: Option<&'a str>,
        info: Option<&'a str>,
    },
    OrderedList { start: u64 },
    TableCell { header: bool },
    Link { href: &'a str, title: &'a str },
    Image { src: &'a str, title: &'a str },
}

/// Receiver of tokenizer events.
///
/// Calls arrive synchronously and in document order during a single parse of
/// a complete buffer. Ranges are byte offsets into that buffer. Details may be
/// absent or of the wrong shape and must be checked by the receiver.
pub trait EventSink {
    fn enter_block(&mut self, kind: BlockKind, detail: Option<&Detail<'_>>, range: Range<usize>);
    fn leave_block(&mut self, kind: BlockKind, range: Range<usize>);
    fn enter_span(&mut self, kind: SpanKind, detail: Option<&Detail<'_>>, range: Range<usize>);
    fn leave_span(&mut self, kind: SpanKind, range: Range<usize>);
    fn text(&mut self, kind: TextKind, text: &str, range: Range<usize>);
}
