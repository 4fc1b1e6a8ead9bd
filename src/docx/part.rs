//! Structured view of a WordprocessingML text part.
//!
//! Only the shape needed for text substitution is modelled: paragraphs made
//! of text runs, and tables whose cells hold further paragraphs and tables.
//! Each run remembers where its `<w:t>` element sits in the source XML so
//! serialisation can splice modified runs back without touching anything else.

use std::ops::Range;

use quick_xml::escape::escape;
use quick_xml::events::Event;
use quick_xml::Reader;

/// One `<w:t>` element.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct TextRun {
    text: String,
    span: Option<Range<usize>>,
    dirty: bool,
}

impl TextRun {
    pub fn new(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            span: None,
            dirty: false,
        }
    }

    pub fn text(&self) -> &str {
        &self.text
    }

    pub fn set_text(&mut self, text: impl Into<String>) {
        let text = text.into();
        if text != self.text {
            self.text = text;
            self.dirty = true;
        }
    }

    pub fn is_modified(&self) -> bool {
        self.dirty
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct Paragraph {
    pub runs: Vec<TextRun>,
}

impl Paragraph {
    /// Paragraph holding a single run with `text`.
    pub fn from_text(text: impl Into<String>) -> Self {
        Self {
            runs: vec![TextRun::new(text)],
        }
    }

    /// Concatenated text of every run.
    pub fn text(&self) -> String {
        self.runs.iter().map(|r| r.text.as_str()).collect()
    }

    /// Put `text` in the first run and blank the others.
    ///
    /// Formatting boundaries between runs are not preserved. Returns false if
    /// the paragraph has no run to write into.
    pub fn set_text(&mut self, text: &str) -> bool {
        let Some((first, rest)) = self.runs.split_first_mut() else {
            return false;
        };
        first.set_text(text);
        for run in rest {
            run.set_text("");
        }
        true
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct TableCell {
    pub blocks: Vec<Block>,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct TableRow {
    pub cells: Vec<TableCell>,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct Table {
    pub rows: Vec<TableRow>,
}

#[derive(Debug, Clone, PartialEq)]
pub enum Block {
    Paragraph(Paragraph),
    Table(Table),
}

/// A parsed text part together with its source XML.
#[derive(Debug, Clone)]
pub struct DocumentPart {
    source: String,
    pub blocks: Vec<Block>,
}

enum Frame {
    Container(Vec<Block>),
    Table(Table),
    Row(TableRow),
    Paragraph(Paragraph),
}

struct PartBuilder {
    stack: Vec<Frame>,
}

impl PartBuilder {
    fn new() -> Self {
        Self {
            stack: vec![Frame::Container(Vec::new())],
        }
    }

    fn push_block(&mut self, block: Block) {
        let container = self.stack.iter_mut().rev().find_map(|f| match f {
            Frame::Container(blocks) => Some(blocks),
            _ => None,
        });
        if let Some(blocks) = container {
            blocks.push(block);
        }
    }

    fn push_run(&mut self, run: TextRun) {
        let paragraph = self.stack.iter_mut().rev().find_map(|f| match f {
            Frame::Paragraph(p) => Some(p),
            _ => None,
        });
        if let Some(p) = paragraph {
            p.runs.push(run);
        }
    }

    fn open(&mut self, name: &[u8]) {
        match name {
            b"w:tbl" => self.stack.push(Frame::Table(Table::default())),
            b"w:tr" => self.stack.push(Frame::Row(TableRow::default())),
            b"w:tc" => self.stack.push(Frame::Container(Vec::new())),
            b"w:p" => self.stack.push(Frame::Paragraph(Paragraph::default())),
            _ => {}
        }
    }

    fn close(&mut self, name: &[u8]) {
        // The root container is never popped.
        if self.stack.len() < 2 {
            return;
        }
        match (name, self.stack.last()) {
            (b"w:tbl", Some(Frame::Table(_))) => {
                if let Some(Frame::Table(table)) = self.stack.pop() {
                    self.push_block(Block::Table(table));
                }
            }
            (b"w:tr", Some(Frame::Row(_))) => {
                if let Some(Frame::Row(row)) = self.stack.pop() {
                    if let Some(Frame::Table(table)) = self.stack.last_mut() {
                        table.rows.push(row);
                    }
                }
            }
            (b"w:tc", Some(Frame::Container(_))) => {
                if let Some(Frame::Container(blocks)) = self.stack.pop() {
                    if let Some(Frame::Row(row)) = self.stack.last_mut() {
                        row.cells.push(TableCell { blocks });
                    }
                }
            }
            (b"w:p", Some(Frame::Paragraph(_))) => {
                if let Some(Frame::Paragraph(p)) = self.stack.pop() {
                    self.push_block(Block::Paragraph(p));
                }
            }
            _ => {}
        }
    }

    fn finish(mut self) -> Vec<Block> {
        while self.stack.len() > 1 {
            self.stack.pop();
        }
        match self.stack.pop() {
            Some(Frame::Container(blocks)) => blocks,
            _ => Vec::new(),
        }
    }
}

impl DocumentPart {
    /// Parse part XML. Errors carry a human-readable message.
    pub fn parse(source: String) -> Result<Self, String> {
        let blocks = {
            let mut reader = Reader::from_str(&source);
            let mut builder = PartBuilder::new();
            // Open `<w:t>`: element start offset and accumulated text.
            let mut open_text: Option<(usize, String)> = None;

            loop {
                let start = reader.buffer_position() as usize;
                match reader.read_event() {
                    Ok(Event::Start(e)) => {
                        if e.name().as_ref() == b"w:t" {
                            open_text = Some((start, String::new()));
                        } else {
                            builder.open(e.name().as_ref());
                        }
                    }
                    Ok(Event::Empty(e)) => match e.name().as_ref() {
                        b"w:t" => {
                            let end = reader.buffer_position() as usize;
                            builder.push_run(TextRun {
                                text: String::new(),
                                span: Some(start..end),
                                dirty: false,
                            });
                        }
                        b"w:p" => builder.push_block(Block::Paragraph(Paragraph::default())),
                        _ => {}
                    },
                    Ok(Event::Text(t)) => {
                        if let Some((_, text)) = open_text.as_mut() {
                            let unescaped = t
                                .unescape()
                                .map_err(|e| format!("bad text at {}: {}", start, e))?;
                            text.push_str(&unescaped);
                        }
                    }
                    Ok(Event::CData(c)) => {
                        if let Some((_, text)) = open_text.as_mut() {
                            text.push_str(&String::from_utf8_lossy(&c.into_inner()));
                        }
                    }
                    Ok(Event::End(e)) => {
                        if e.name().as_ref() == b"w:t" {
                            if let Some((text_start, text)) = open_text.take() {
                                let end = reader.buffer_position() as usize;
                                builder.push_run(TextRun {
                                    text,
                                    span: Some(text_start..end),
                                    dirty: false,
                                });
                            }
                        } else {
                            builder.close(e.name().as_ref());
                        }
                    }
                    Ok(Event::Eof) => break,
                    Ok(_) => {}
                    Err(e) => return Err(format!("at byte {}: {}", start, e)),
                }
            }
            builder.finish()
        };

        Ok(Self { source, blocks })
    }

    /// Text of every paragraph, depth-first, tables included.
    pub fn paragraph_texts(&self) -> Vec<String> {
        let mut out = Vec::new();
        collect_texts(&self.blocks, &mut out);
        out
    }

    /// Serialise back to XML, rewriting only modified runs.
    pub fn to_xml(&self) -> String {
        let mut runs = Vec::new();
        collect_modified_runs(&self.blocks, &mut runs);
        if runs.is_empty() {
            return self.source.clone();
        }
        runs.sort_by_key(|(span, _)| span.start);

        let mut out = String::with_capacity(self.source.len() + 64);
        let mut cursor = 0;
        for (span, text) in runs {
            if span.start < cursor {
                continue;
            }
            out.push_str(&self.source[cursor..span.start]);
            if text.is_empty() {
                out.push_str("<w:t/>");
            } else {
                out.push_str(r#"<w:t xml:space="preserve">"#);
                out.push_str(&escape(text));
                out.push_str("</w:t>");
            }
            cursor = span.end;
        }
        out.push_str(&self.source[cursor..]);
        out
    }
}

fn collect_texts(blocks: &[Block], out: &mut Vec<String>) {
    for block in blocks {
        match block {
            Block::Paragraph(p) => out.push(p.text()),
            Block::Table(t) => {
                for cell in t.rows.iter().flat_map(|r| r.cells.iter()) {
                    collect_texts(&cell.blocks, out);
                }
            }
        }
    }
}

fn collect_modified_runs<'a>(blocks: &'a [Block], out: &mut Vec<(Range<usize>, &'a str)>) {
    for block in blocks {
        match block {
            Block::Paragraph(p) => {
                for run in p.runs.iter().filter(|r| r.dirty) {
                    if let Some(span) = &run.span {
                        out.push((span.clone(), run.text.as_str()));
                    }
                }
            }
            Block::Table(t) => {
                for cell in t.rows.iter().flat_map(|r| r.cells.iter()) {
                    collect_modified_runs(&cell.blocks, out);
                }
            }
        }
    }
}
