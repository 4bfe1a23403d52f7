//! Markdown block model for message rendering.
//!
//! Assistant content is parsed once into UI-agnostic blocks; a renderer maps
//! them to widgets or HTML and picks a highlighter from `Code::language`.
//! [`render_message`] first splits the reasoning spans off so the muted
//! styling applies to whole parts, then parses each part independently.

use pulldown_cmark::{CodeBlockKind, Event, HeadingLevel, Options, Parser, Tag, TagEnd};

use crate::markup::{Segment, split_reasoning};

/// One block-level element of a rendered message.
#[derive(Debug, Clone, PartialEq)]
pub enum Block {
    Paragraph(Vec<Span>),
    Heading { level: u8, spans: Vec<Span> },
    Code { language: Option<String>, text: String },
    Quote(Vec<Block>),
    /// `start` is the first ordinal of an ordered list (`3.` lists exist in
    /// model output); `None` means an unordered list.
    List {
        start: Option<u64>,
        items: Vec<Vec<Block>>,
    },
    /// Header cells plus body rows of cells; cells are inline-only.
    Table {
        header: Vec<Vec<Span>>,
        rows: Vec<Vec<Vec<Span>>>,
    },
    /// Rendered scaled to fit the message width.
    Image { url: String, alt: String },
    Rule,
}

/// A styled run of inline text.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Span {
    pub text: String,
    pub bold: bool,
    pub italic: bool,
    pub strikethrough: bool,
    pub code: bool,
    /// Links open in a new context; the renderer decides how.
    pub link: Option<String>,
}

/// A message split into reasoning / plain parts, each parsed into blocks.
#[derive(Debug, Clone, PartialEq)]
pub struct RenderedMessage {
    pub parts: Vec<MessagePart>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct MessagePart {
    /// Render de-emphasized (muted, indented) when true.
    pub reasoning: bool,
    pub blocks: Vec<Block>,
}

/// Parse one message: reasoning segmentation, then markdown per segment.
pub fn render_message(content: &str) -> RenderedMessage {
    let parts = split_reasoning(content)
        .into_iter()
        .map(|segment| match segment {
            Segment::Text(text) => MessagePart {
                reasoning: false,
                blocks: parse_blocks(&text),
            },
            Segment::Reasoning(text) => MessagePart {
                reasoning: true,
                blocks: parse_blocks(&text),
            },
        })
        .collect();
    RenderedMessage { parts }
}

/// Fold the pulldown-cmark event stream into [`Block`]s.
pub fn parse_blocks(input: &str) -> Vec<Block> {
    let options = Options::ENABLE_STRIKETHROUGH | Options::ENABLE_TABLES;
    let mut builder = BlockBuilder::default();
    for event in Parser::new_ext(input, options) {
        builder.handle(event);
    }
    builder.finish()
}

/// Open nested structure: quotes, lists, and list items stack while their
/// contents accumulate.
#[derive(Debug)]
enum Container {
    Quote(Vec<Block>),
    List {
        start: Option<u64>,
        items: Vec<Vec<Block>>,
    },
    Item(Vec<Block>),
}

/// A table under construction; cell spans land here instead of the
/// paragraph accumulator between `TableCell` boundaries.
#[derive(Debug, Default)]
struct TableState {
    in_head: bool,
    header: Vec<Vec<Span>>,
    rows: Vec<Vec<Vec<Span>>>,
    row: Vec<Vec<Span>>,
}

#[derive(Debug, Default)]
struct BlockBuilder {
    done: Vec<Block>,
    containers: Vec<Container>,
    spans: Vec<Span>,
    bold: bool,
    italic: bool,
    strikethrough: bool,
    link: Option<String>,
    heading: Option<u8>,
    code: Option<(Option<String>, String)>,
    image: Option<(String, String)>,
    table: Option<TableState>,
}

impl BlockBuilder {
    fn handle(&mut self, event: Event) {
        match event {
            Event::Start(tag) => self.start(tag),
            Event::End(tag) => self.end(tag),
            Event::Text(text) => {
                if let Some((_, code_text)) = self.code.as_mut() {
                    code_text.push_str(&text);
                } else if let Some((_, alt)) = self.image.as_mut() {
                    alt.push_str(&text);
                } else {
                    self.push_span(&text, false);
                }
            }
            Event::Code(code) => self.push_span(&code, true),
            Event::SoftBreak => self.push_span(" ", false),
            Event::HardBreak => self.push_span("\n", false),
            Event::Rule => {
                self.flush_paragraph();
                self.push_block(Block::Rule);
            }
            _ => {}
        }
    }

    fn start(&mut self, tag: Tag) {
        match tag {
            Tag::Heading { level, .. } => {
                self.flush_paragraph();
                self.heading = Some(heading_level(level));
            }
            Tag::CodeBlock(kind) => {
                self.flush_paragraph();
                let language = match kind {
                    CodeBlockKind::Fenced(lang) => {
                        let lang = lang.trim().to_owned();
                        (!lang.is_empty()).then_some(lang)
                    }
                    CodeBlockKind::Indented => None,
                };
                self.code = Some((language, String::new()));
            }
            Tag::BlockQuote(_) => {
                self.flush_paragraph();
                self.containers.push(Container::Quote(Vec::new()));
            }
            Tag::List(start) => {
                self.flush_paragraph();
                self.containers.push(Container::List {
                    start,
                    items: Vec::new(),
                });
            }
            Tag::Item => self.containers.push(Container::Item(Vec::new())),
            Tag::Table(_) => {
                self.flush_paragraph();
                self.table = Some(TableState::default());
            }
            Tag::TableHead => {
                if let Some(table) = self.table.as_mut() {
                    table.in_head = true;
                }
            }
            Tag::TableRow | Tag::TableCell => {}
            Tag::Strong => self.bold = true,
            Tag::Emphasis => self.italic = true,
            Tag::Strikethrough => self.strikethrough = true,
            Tag::Link { dest_url, .. } => self.link = Some(dest_url.to_string()),
            Tag::Image { dest_url, .. } => {
                self.image = Some((dest_url.to_string(), String::new()));
            }
            _ => {}
        }
    }

    fn end(&mut self, tag: TagEnd) {
        match tag {
            TagEnd::Paragraph => self.flush_paragraph(),
            TagEnd::Heading(_) => {
                let spans = std::mem::take(&mut self.spans);
                if let Some(level) = self.heading.take() {
                    self.push_block(Block::Heading { level, spans });
                }
            }
            TagEnd::CodeBlock => {
                if let Some((language, text)) = self.code.take() {
                    self.push_block(Block::Code {
                        language,
                        text: text.trim_end_matches('\n').to_owned(),
                    });
                }
            }
            TagEnd::BlockQuote(_) => {
                self.flush_paragraph();
                if let Some(Container::Quote(blocks)) = self.containers.pop() {
                    self.push_block(Block::Quote(blocks));
                }
            }
            TagEnd::Item => {
                self.flush_paragraph();
                if let Some(Container::Item(blocks)) = self.containers.pop() {
                    if let Some(Container::List { items, .. }) = self.containers.last_mut() {
                        items.push(blocks);
                    }
                }
            }
            TagEnd::List(_) => {
                if let Some(Container::List { start, items }) = self.containers.pop() {
                    self.push_block(Block::List { start, items });
                }
            }
            TagEnd::TableCell => {
                let spans = std::mem::take(&mut self.spans);
                if let Some(table) = self.table.as_mut() {
                    if table.in_head {
                        table.header.push(spans);
                    } else {
                        table.row.push(spans);
                    }
                }
            }
            TagEnd::TableRow => {
                if let Some(table) = self.table.as_mut() {
                    if !table.in_head {
                        let row = std::mem::take(&mut table.row);
                        table.rows.push(row);
                    }
                }
            }
            TagEnd::TableHead => {
                if let Some(table) = self.table.as_mut() {
                    table.in_head = false;
                }
            }
            TagEnd::Table => {
                if let Some(table) = self.table.take() {
                    self.push_block(Block::Table {
                        header: table.header,
                        rows: table.rows,
                    });
                }
            }
            TagEnd::Strong => self.bold = false,
            TagEnd::Emphasis => self.italic = false,
            TagEnd::Strikethrough => self.strikethrough = false,
            TagEnd::Link => self.link = None,
            TagEnd::Image => {
                if let Some((url, alt)) = self.image.take() {
                    self.flush_paragraph();
                    self.push_block(Block::Image { url, alt });
                }
            }
            _ => {}
        }
    }

    fn push_span(&mut self, text: &str, code: bool) {
        self.spans.push(Span {
            text: text.to_owned(),
            bold: self.bold,
            italic: self.italic,
            strikethrough: self.strikethrough,
            code,
            link: self.link.clone(),
        });
    }

    fn flush_paragraph(&mut self) {
        if self.spans.is_empty() || self.heading.is_some() {
            return;
        }
        let spans = std::mem::take(&mut self.spans);
        self.push_block(Block::Paragraph(spans));
    }

    fn push_block(&mut self, block: Block) {
        match self.containers.last_mut() {
            Some(Container::Item(blocks)) | Some(Container::Quote(blocks)) => blocks.push(block),
            // A block directly inside a list belongs to its last item.
            Some(Container::List { items, .. }) => match items.last_mut() {
                Some(item) => item.push(block),
                None => items.push(vec![block]),
            },
            None => self.done.push(block),
        }
    }

    fn finish(mut self) -> Vec<Block> {
        self.flush_paragraph();
        self.done
    }
}

fn heading_level(level: HeadingLevel) -> u8 {
    match level {
        HeadingLevel::H1 => 1,
        HeadingLevel::H2 => 2,
        HeadingLevel::H3 => 3,
        HeadingLevel::H4 => 4,
        HeadingLevel::H5 => 5,
        HeadingLevel::H6 => 6,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn plain_paragraph() {
        let blocks = parse_blocks("Hello world");
        assert_eq!(blocks.len(), 1);
        let Block::Paragraph(spans) = &blocks[0] else {
            panic!("expected paragraph");
        };
        assert_eq!(spans[0].text, "Hello world");
        assert!(!spans[0].bold);
    }

    #[test]
    fn bold_and_italic_spans() {
        let blocks = parse_blocks("**bold** and *italic*");
        let Block::Paragraph(spans) = &blocks[0] else {
            panic!("expected paragraph");
        };
        assert!(spans.iter().any(|s| s.bold && s.text == "bold"));
        assert!(spans.iter().any(|s| s.italic && s.text == "italic"));
    }

    #[test]
    fn fenced_code_block_keeps_its_language() {
        let blocks = parse_blocks("```rust\nfn main() {}\n```");
        assert_eq!(
            blocks,
            vec![Block::Code {
                language: Some("rust".into()),
                text: "fn main() {}".into(),
            }]
        );
    }

    #[test]
    fn heading_levels_map_through() {
        let blocks = parse_blocks("## Title");
        assert_eq!(
            blocks,
            vec![Block::Heading {
                level: 2,
                spans: vec![Span {
                    text: "Title".into(),
                    ..Span::default()
                }],
            }]
        );
    }

    #[test]
    fn unordered_list_collects_items() {
        let blocks = parse_blocks("- one\n- two\n- three");
        let Block::List { start, items } = &blocks[0] else {
            panic!("expected list");
        };
        assert!(start.is_none());
        assert_eq!(items.len(), 3);
    }

    #[test]
    fn ordered_list_carries_its_start() {
        let blocks = parse_blocks("1. one\n2. two");
        assert!(matches!(&blocks[0], Block::List { start: Some(1), .. }));
    }

    #[test]
    fn ordered_list_keeps_a_non_one_start() {
        let blocks = parse_blocks("3. first\n4. second");
        let Block::List { start, items } = &blocks[0] else {
            panic!("expected list");
        };
        assert_eq!(*start, Some(3));
        assert_eq!(items.len(), 2);
    }

    #[test]
    fn table_splits_header_and_body_cells() {
        let blocks = parse_blocks("| Name | Age |\n| --- | --- |\n| Bob | 30 |\n| Ada | 36 |");
        let Block::Table { header, rows } = &blocks[0] else {
            panic!("expected table");
        };
        assert_eq!(header.len(), 2);
        assert_eq!(header[0][0].text, "Name");
        assert_eq!(header[1][0].text, "Age");
        assert_eq!(rows.len(), 2);
        assert_eq!(rows[0][0][0].text, "Bob");
        assert_eq!(rows[0][1][0].text, "30");
        assert_eq!(rows[1][0][0].text, "Ada");
    }

    #[test]
    fn table_cells_keep_inline_styling() {
        let blocks = parse_blocks("| a |\n| --- |\n| **bold** |");
        let Block::Table { rows, .. } = &blocks[0] else {
            panic!("expected table");
        };
        assert!(rows[0][0].iter().any(|s| s.bold && s.text == "bold"));
    }

    #[test]
    fn quote_nests_blocks() {
        let blocks = parse_blocks("> quoted text");
        let Block::Quote(inner) = &blocks[0] else {
            panic!("expected quote");
        };
        assert!(matches!(&inner[0], Block::Paragraph(_)));
    }

    #[test]
    fn links_carry_their_destination() {
        let blocks = parse_blocks("[docs](https://example.com)");
        let Block::Paragraph(spans) = &blocks[0] else {
            panic!("expected paragraph");
        };
        assert_eq!(spans[0].link.as_deref(), Some("https://example.com"));
    }

    #[test]
    fn images_become_image_blocks() {
        let blocks = parse_blocks("![a cat](https://example.com/cat.png)");
        assert!(blocks.contains(&Block::Image {
            url: "https://example.com/cat.png".into(),
            alt: "a cat".into(),
        }));
    }

    #[test]
    fn rule_between_paragraphs() {
        let blocks = parse_blocks("above\n\n---\n\nbelow");
        assert!(blocks.iter().any(|b| matches!(b, Block::Rule)));
    }

    #[test]
    fn inline_code_is_marked() {
        let blocks = parse_blocks("Use `foo()` here");
        let Block::Paragraph(spans) = &blocks[0] else {
            panic!("expected paragraph");
        };
        assert!(spans.iter().any(|s| s.code && s.text == "foo()"));
    }

    #[test]
    fn render_message_splits_reasoning_parts() {
        let rendered = render_message("<think>weighing options</think>**Answer**");
        assert_eq!(rendered.parts.len(), 2);
        assert!(rendered.parts[0].reasoning);
        assert!(!rendered.parts[1].reasoning);
        let Block::Paragraph(spans) = &rendered.parts[1].blocks[0] else {
            panic!("expected paragraph");
        };
        assert!(spans[0].bold);
    }

    #[test]
    fn streaming_prefix_with_open_reasoning_parses() {
        let rendered = render_message("<think>partial thought");
        assert_eq!(rendered.parts.len(), 1);
        assert!(rendered.parts[0].reasoning);
    }
}
