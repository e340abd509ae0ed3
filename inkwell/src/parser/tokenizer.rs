use std::ops::Range;

use pulldown_cmark::{CodeBlockKind, Event, HeadingLevel, Parser as CmarkParser, Tag, TagEnd};

use crate::options::ParserOptions;
use crate::parser::event::{BlockKind, Detail, EventSink, SpanKind, TextKind};

// ---------------------------------------------------------------------------
// Public API
// ---------------------------------------------------------------------------

/// Run pulldown-cmark over `input` and replay its events into `sink`.
///
/// The whole buffer is wrapped in a `Document` block. Inline code, rules and
/// line breaks, which pulldown-cmark reports as single events, are expanded
/// into enter/text/leave sequences. Plain text is passed through as the raw
/// source bytes it covers, so entities and escapes are not decoded.
pub fn tokenize(input: &str, options: ParserOptions, sink: &mut impl EventSink) {
    let whole = 0..input.len();
    sink.enter_block(BlockKind::Document, None, whole.clone());

    let mut state = TokenizerState::new(input);
    let parser = CmarkParser::new_ext(input, options.to_cmark());
    for (event, range) in parser.into_offset_iter() {
        state.replay(event, range, sink);
    }

    sink.leave_block(BlockKind::Document, whole);
}

// ---------------------------------------------------------------------------
// Event translation
// ---------------------------------------------------------------------------

struct TokenizerState<'a> {
    input: &'a str,
    in_table_head: bool,
    in_code_block: bool,
}

impl<'a> TokenizerState<'a> {
    fn new(input: &'a str) -> Self {
        TokenizerState {
            input,
            in_table_head: false,
            in_code_block: false,
        }
    }

    fn replay(&mut self, event: Event<'_>, range: Range<usize>, sink: &mut impl EventSink) {
        match event {
            Event::Start(tag) => self.start(tag, range, sink),
            Event::End(tag) => self.end(tag, range, sink),
            Event::Text(text) => {
                let kind = if self.in_code_block {
                    TextKind::Code
                } else {
                    TextKind::Normal
                };
                let raw = self.input.get(range.clone()).unwrap_or(&*text);
                sink.text(kind, raw, range);
            }
            Event::Code(code) => {
                sink.enter_span(SpanKind::Code, None, range.clone());
                sink.text(TextKind::Code, &code, code_span_body(self.input, range.clone()));
                sink.leave_span(SpanKind::Code, range);
            }
            Event::Html(html) | Event::InlineHtml(html) => sink.text(TextKind::Html, &html, range),
            Event::SoftBreak => sink.text(TextKind::SoftBreak, "\n", range),
            Event::HardBreak => sink.text(TextKind::HardBreak, "\n", range),
            Event::Rule => {
                sink.enter_block(BlockKind::Rule, None, range.clone());
                sink.leave_block(BlockKind::Rule, range);
            }
            // Footnote references, math, task list markers
            _ => {}
        }
    }

    fn start(&mut self, tag: Tag<'_>, range: Range<usize>, sink: &mut impl EventSink) {
        match tag {
            Tag::Paragraph => sink.enter_block(BlockKind::Paragraph, None, range),
            Tag::Heading { level, .. } => {
                let detail = Detail::Heading {
                    level: heading_level_to_u8(&level),
                };
                sink.enter_block(BlockKind::Heading, Some(&detail), range);
            }
            Tag::BlockQuote(_) => sink.enter_block(BlockKind::Quote, None, range),
            Tag::CodeBlock(kind) => {
                self.in_code_block = true;
                let detail = match &kind {
                    CodeBlockKind::Fenced(info) if !info.trim().is_empty() => Detail::Code {
                        lang: info.split_whitespace().next(),
                        info: Some(info.trim()),
                    },
                    _ => Detail::Code {
                        lang: None,
                        info: None,
                    },
                };
                sink.enter_block(BlockKind::Code, Some(&detail), range);
            }
            Tag::HtmlBlock => sink.enter_block(BlockKind::Html, None, range),
            Tag::List(Some(start)) => {
                let detail = Detail::OrderedList { start };
                sink.enter_block(BlockKind::OrderedList, Some(&detail), range);
            }
            Tag::List(None) => sink.enter_block(BlockKind::UnorderedList, None, range),
            Tag::Item => sink.enter_block(BlockKind::ListItem, None, range),
            Tag::Table(_) => sink.enter_block(BlockKind::Table, None, range),
            Tag::TableHead => {
                self.in_table_head = true;
                sink.enter_block(BlockKind::TableHead, None, range);
            }
            Tag::TableRow => sink.enter_block(BlockKind::TableRow, None, range),
            Tag::TableCell => {
                let header = self.in_table_head;
                let detail = Detail::TableCell { header };
                sink.enter_block(cell_kind(header), Some(&detail), range);
            }
            Tag::Emphasis => sink.enter_span(SpanKind::Emphasis, None, range),
            Tag::Strong => sink.enter_span(SpanKind::Strong, None, range),
            Tag::Strikethrough => sink.enter_span(SpanKind::Strikethrough, None, range),
            Tag::Link { dest_url, title, .. } => {
                let detail = Detail::Link {
                    href: &dest_url,
                    title: &title,
                };
                sink.enter_span(SpanKind::Link, Some(&detail), range);
            }
            Tag::Image { dest_url, title, .. } => {
                let detail = Detail::Image {
                    src: &dest_url,
                    title: &title,
                };
                sink.enter_span(SpanKind::Image, Some(&detail), range);
            }
            _ => sink.enter_block(BlockKind::Other, None, range),
        }
    }

    fn end(&mut self, tag: TagEnd, range: Range<usize>, sink: &mut impl EventSink) {
        match tag {
            TagEnd::Paragraph => sink.leave_block(BlockKind::Paragraph, range),
            TagEnd::Heading(_) => sink.leave_block(BlockKind::Heading, range),
            TagEnd::BlockQuote(_) => sink.leave_block(BlockKind::Quote, range),
            TagEnd::CodeBlock => {
                self.in_code_block = false;
                sink.leave_block(BlockKind::Code, range);
            }
            TagEnd::HtmlBlock => sink.leave_block(BlockKind::Html, range),
            TagEnd::List(true) => sink.leave_block(BlockKind::OrderedList, range),
            TagEnd::List(false) => sink.leave_block(BlockKind::UnorderedList, range),
            TagEnd::Item => sink.leave_block(BlockKind::ListItem, range),
            TagEnd::Table => sink.leave_block(BlockKind::Table, range),
            TagEnd::TableHead => {
                self.in_table_head = false;
                sink.leave_block(BlockKind::TableHead, range);
            }
            TagEnd::TableRow => sink.leave_block(BlockKind::TableRow, range),
            TagEnd::TableCell => sink.leave_block(cell_kind(self.in_table_head), range),
            TagEnd::Emphasis => sink.leave_span(SpanKind::Emphasis, range),
            TagEnd::Strong => sink.leave_span(SpanKind::Strong, range),
            TagEnd::Strikethrough => sink.leave_span(SpanKind::Strikethrough, range),
            TagEnd::Link => sink.leave_span(SpanKind::Link, range),
            TagEnd::Image => sink.leave_span(SpanKind::Image, range),
            _ => sink.leave_block(BlockKind::Other, range),
        }
    }
}

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

/// The part of a code span between its backtick fences.
fn code_span_body(input: &str, range: Range<usize>) -> Range<usize> {
    let Some(span) = input.get(range.clone()) else {
        return range;
    };
    let fence = span.bytes().take_while(|&b| b == b'`').count();
    if fence == 0 || span.len() < 2 * fence {
        return range;
    }
    range.start + fence..range.end - fence
}

fn cell_kind(header: bool) -> BlockKind {
    if header {
        BlockKind::TableHeaderCell
    } else {
        BlockKind::TableCell
    }
}

fn heading_level_to_u8(level: &HeadingLevel) -> u8 {
    match level {
        HeadingLevel::H1 => 1,
        HeadingLevel::H2 => 2,
        HeadingLevel::H3 => 3,
        HeadingLevel::H4 => 4,
        HeadingLevel::H5 => 5,
        HeadingLevel::H6 => 6,
    }
}
