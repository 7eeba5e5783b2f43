//! Page model and layout engine for the report.
//!
//! Layout works in millimetres with `y` growing downwards from the top edge
//! of the page. The result is a list of [`Page`]s holding [`DrawOp`]s; the PDF
//! backend only translates them.

use crate::interview::TableField;

/// A4 portrait width.
pub const PAGE_WIDTH: f32 = 210.0;
/// A4 portrait height.
pub const PAGE_HEIGHT: f32 = 297.0;
/// Left, right and top margin.
pub const MARGIN: f32 = 10.0;
/// Distance from the bottom edge at which the body breaks to a new page.
pub const BOTTOM_MARGIN: f32 = 20.0;
/// Height of a column title block.
pub const TITLE_BLOCK_HEIGHT: f32 = 7.0;
/// Line height of column fields.
pub const FIELD_LINE_HEIGHT: f32 = 5.0;
/// Vertical gap between the two table rows.
pub const ROW_GAP: f32 = 4.0;

const PT_TO_MM: f32 = 0.3528;
const CELL_PADDING: f32 = 1.0;
const EPSILON: f32 = 0.01;

const HEADER_TITLE_SIZE: f32 = 16.0;
const HEADER_TITLE_HEIGHT: f32 = 10.0;
const HEADER_DATE_SIZE: f32 = 9.0;
const HEADER_DATE_HEIGHT: f32 = 6.0;
const HEADER_GAP: f32 = 3.0;
const FOOTER_SIZE: f32 = 7.0;
const FOOTER_OFFSET: f32 = 15.0;
const FOOTER_HEIGHT: f32 = 10.0;

const HEADING_SIZE: f32 = 13.0;
const HEADING_HEIGHT: f32 = 8.0;
const COLUMN_TITLE_SIZE: f32 = 11.0;
const FIELD_SIZE: f32 = 9.0;

/// Fill colour of column title blocks.
pub const TITLE_FILL: [u8; 3] = [230, 240, 250];

/// Which edges of a cell get a border.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Borders {
    /// Left edge.
    pub left: bool,
    /// Right edge.
    pub right: bool,
    /// Top edge.
    pub top: bool,
    /// Bottom edge.
    pub bottom: bool,
}

impl Borders {
    /// All four edges.
    pub const ALL: Borders = Borders {
        left: true,
        right: true,
        top: true,
        bottom: true,
    };
    /// Left and right only.
    pub const SIDES: Borders = Borders {
        left: true,
        right: true,
        top: false,
        bottom: false,
    };
}

/// One drawing instruction.
#[derive(Debug, Clone, PartialEq)]
pub enum DrawOp {
    /// Text with its baseline at `y`. `size` is in points.
    Text {
        x: f32,
        y: f32,
        size: f32,
        text: String,
    },
    /// A rectangle with optional fill and per-edge borders.
    Cell {
        x: f32,
        y: f32,
        width: f32,
        height: f32,
        fill: Option<[u8; 3]>,
        borders: Borders,
    },
    /// A horizontal line.
    Rule { x1: f32, x2: f32, y: f32 },
}

/// Drawing instructions of one page.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Page {
    /// Instructions in drawing order.
    pub ops: Vec<DrawOp>,
}

impl Page {
    /// All text drawn on the page, in drawing order.
    pub fn texts(&self) -> impl Iterator<Item = &str> {
        self.ops.iter().filter_map(|op| match op {
            DrawOp::Text { text, .. } => Some(text.as_str()),
            _ => None,
        })
    }
}

/// Fixed content repeated on every page.
#[derive(Debug, Clone)]
pub struct PageDecor {
    /// Text in the header.
    pub title: String,
    /// Date line under the title.
    pub date_line: String,
    /// Text in the footer.
    pub footer: String,
}

/// A titled column of labelled fields.
#[derive(Debug, Clone)]
pub struct ColumnSection {
    /// Column title, e.g. `1. Medical Indications`.
    pub title: String,
    /// Fields listed under the title.
    pub fields: Vec<TableField>,
}

/// Blank bordered space added under a column that ended early.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Filler {
    /// Column index.
    pub column: usize,
    /// Where the column's content ended.
    pub top: f32,
    /// The segment bottom.
    pub bottom: f32,
}

/// The part of a column row that landed on one page.
#[derive(Debug, Clone, PartialEq)]
pub struct Segment {
    /// Page index.
    pub page: usize,
    /// Where the segment starts.
    pub top: f32,
    /// Shared bottom border of the segment.
    pub bottom: f32,
    /// Where each column's own content ended.
    pub column_bottoms: Vec<f32>,
    /// Padding added under short columns.
    pub fillers: Vec<Filler>,
}

/// Flowing page layout with a shared vertical cursor.
#[derive(Debug, Clone)]
pub struct Layout {
    pages: Vec<Page>,
    cursor: f32,
    decor: PageDecor,
}

impl Layout {
    /// Start a layout on its first page.
    pub fn new(decor: PageDecor) -> Self {
        let mut layout = Self {
            pages: Vec::new(),
            cursor: 0.0,
            decor,
        };
        layout.add_page();
        layout
    }

    /// Pages laid out so far.
    pub fn pages(&self) -> &[Page] {
        &self.pages
    }

    /// Consume the layout, returning its pages.
    pub fn into_pages(self) -> Vec<Page> {
        self.pages
    }

    /// Current vertical position on the last page.
    pub fn cursor(&self) -> f32 {
        self.cursor
    }

    /// Top of the body area, below the header.
    pub fn body_top() -> f32 {
        MARGIN + HEADER_TITLE_HEIGHT + HEADER_DATE_HEIGHT + HEADER_GAP
    }

    /// Lowest position body content may reach.
    pub fn body_bottom() -> f32 {
        PAGE_HEIGHT - BOTTOM_MARGIN
    }

    /// Width between the side margins.
    pub fn body_width() -> f32 {
        PAGE_WIDTH - 2.0 * MARGIN
    }

    /// Start a new page with header and footer; the cursor moves to the body top.
    pub fn add_page(&mut self) {
        let mut page = Page::default();
        let width = Self::body_width();

        let title = &self.decor.title;
        page.ops.push(DrawOp::Text {
            x: MARGIN + (width - text_width(title, HEADER_TITLE_SIZE)) / 2.0,
            y: baseline(MARGIN, HEADER_TITLE_HEIGHT, HEADER_TITLE_SIZE),
            size: HEADER_TITLE_SIZE,
            text: title.clone(),
        });

        let date_line = &self.decor.date_line;
        page.ops.push(DrawOp::Text {
            x: MARGIN + width - text_width(date_line, HEADER_DATE_SIZE),
            y: baseline(MARGIN + HEADER_TITLE_HEIGHT, HEADER_DATE_HEIGHT, HEADER_DATE_SIZE),
            size: HEADER_DATE_SIZE,
            text: date_line.clone(),
        });

        let footer = &self.decor.footer;
        page.ops.push(DrawOp::Text {
            x: MARGIN + (width - text_width(footer, FOOTER_SIZE)) / 2.0,
            y: baseline(PAGE_HEIGHT - FOOTER_OFFSET, FOOTER_HEIGHT, FOOTER_SIZE),
            size: FOOTER_SIZE,
            text: footer.clone(),
        });

        self.pages.push(page);
        self.cursor = Self::body_top();
    }

    /// Move the cursor down. Never breaks the page by itself.
    pub fn gap(&mut self, height: f32) {
        self.cursor += height;
    }

    /// A section heading in the full body width.
    pub fn heading(&mut self, text: &str) {
        self.ensure_room(HEADING_HEIGHT);
        let y = baseline(self.cursor, HEADING_HEIGHT, HEADING_SIZE);
        self.push(DrawOp::Text {
            x: MARGIN,
            y,
            size: HEADING_SIZE,
            text: text.to_string(),
        });
        self.cursor += HEADING_HEIGHT;
    }

    /// Word-wrapped text in the full body width, breaking pages per line.
    pub fn paragraph(&mut self, text: &str, size: f32, line_height: f32) {
        for line in wrap_text(text, Self::body_width() - 2.0 * CELL_PADDING, size) {
            self.ensure_room(line_height);
            let y = baseline(self.cursor, line_height, size);
            self.push(DrawOp::Text {
                x: MARGIN + CELL_PADDING,
                y,
                size,
                text: line,
            });
            self.cursor += line_height;
        }
    }

    /// Lay out sections side by side as columns of equal final height.
    ///
    /// All columns start at the shared cursor. Each gets a title block and
    /// its wrapped fields; shorter columns are padded with a bordered filler
    /// down to the lowest column, where a bottom border is drawn across all of
    /// them. A row that does not fit continues on fresh pages, each page
    /// segment balanced the same way. Returns one [`Segment`] per page used.
    pub fn columns(&mut self, sections: &[ColumnSection]) -> Vec<Segment> {
        if sections.is_empty() {
            return Vec::new();
        }

        let count = sections.len();
        let column_width = Self::body_width() / count as f32;
        let left = MARGIN;
        let right = MARGIN + column_width * count as f32;

        let lines: Vec<Vec<String>> = sections
            .iter()
            .map(|section| {
                section
                    .fields
                    .iter()
                    .flat_map(|field| {
                        wrap_text(
                            &field_text(field),
                            column_width - 2.0 * CELL_PADDING,
                            FIELD_SIZE,
                        )
                    })
                    .collect()
            })
            .collect();

        let has_body = lines.iter().any(|l| !l.is_empty());
        let needed = TITLE_BLOCK_HEIGHT + if has_body { FIELD_LINE_HEIGHT } else { 0.0 };
        self.ensure_room(needed);

        let mut next_line = vec![0usize; count];
        let mut segments = Vec::new();
        let mut first_segment = true;

        loop {
            let top = self.cursor;
            let mut column_bottoms = Vec::with_capacity(count);

            if !first_segment {
                self.push(DrawOp::Rule { x1: left, x2: right, y: top });
            }

            for (column, section) in sections.iter().enumerate() {
                let x = left + column_width * column as f32;
                let mut y = top;

                if first_segment {
                    self.push(DrawOp::Cell {
                        x,
                        y,
                        width: column_width,
                        height: TITLE_BLOCK_HEIGHT,
                        fill: Some(TITLE_FILL),
                        borders: Borders::ALL,
                    });
                    self.push(DrawOp::Text {
                        x: x + CELL_PADDING,
                        y: baseline(y, TITLE_BLOCK_HEIGHT, COLUMN_TITLE_SIZE),
                        size: COLUMN_TITLE_SIZE,
                        text: section.title.clone(),
                    });
                    y += TITLE_BLOCK_HEIGHT;
                }

                let column_lines = &lines[column];
                while next_line[column] < column_lines.len()
                    && y + FIELD_LINE_HEIGHT <= Self::body_bottom() + EPSILON
                {
                    self.push(DrawOp::Cell {
                        x,
                        y,
                        width: column_width,
                        height: FIELD_LINE_HEIGHT,
                        fill: None,
                        borders: Borders::SIDES,
                    });
                    self.push(DrawOp::Text {
                        x: x + CELL_PADDING,
                        y: baseline(y, FIELD_LINE_HEIGHT, FIELD_SIZE),
                        size: FIELD_SIZE,
                        text: column_lines[next_line[column]].clone(),
                    });
                    y += FIELD_LINE_HEIGHT;
                    next_line[column] += 1;
                }

                column_bottoms.push(y);
            }

            let bottom = column_bottoms.iter().copied().fold(top, f32::max);
            let mut fillers = Vec::new();
            for (column, column_bottom) in column_bottoms.iter().enumerate() {
                if *column_bottom < bottom {
                    self.push(DrawOp::Cell {
                        x: left + column_width * column as f32,
                        y: *column_bottom,
                        width: column_width,
                        height: bottom - column_bottom,
                        fill: None,
                        borders: Borders::SIDES,
                    });
                    fillers.push(Filler {
                        column,
                        top: *column_bottom,
                        bottom,
                    });
                }
            }
            self.push(DrawOp::Rule { x1: left, x2: right, y: bottom });

            segments.push(Segment {
                page: self.pages.len() - 1,
                top,
                bottom,
                column_bottoms,
                fillers,
            });
            self.cursor = bottom;
            first_segment = false;

            let done = next_line
                .iter()
                .zip(&lines)
                .all(|(next, column_lines)| *next >= column_lines.len());
            if done {
                break;
            }
            self.add_page();
        }

        segments
    }

    fn ensure_room(&mut self, height: f32) {
        if self.cursor + height > Self::body_bottom() + EPSILON {
            self.add_page();
        }
    }

    fn push(&mut self, op: DrawOp) {
        if let Some(page) = self.pages.last_mut() {
            page.ops.push(op);
        }
    }
}

/// `"[label] text"`, or just the text for an unlabelled field.
fn field_text(field: &TableField) -> String {
    if field.label.is_empty() {
        field.text.clone()
    } else {
        format!("[{}] {}", field.label, field.text)
    }
}

/// Baseline for text vertically centred in a box starting at `top`.
fn baseline(top: f32, height: f32, size: f32) -> f32 {
    top + height / 2.0 + size * PT_TO_MM * 0.35
}

/// East Asian wide and full-width characters.
fn is_full_width(c: char) -> bool {
    matches!(c as u32,
        0x1100..=0x115F
        | 0x2E80..=0x303E
        | 0x3041..=0x33FF
        | 0x3400..=0x4DBF
        | 0x4E00..=0x9FFF
        | 0xA000..=0xA4CF
        | 0xAC00..=0xD7A3
        | 0xF900..=0xFAFF
        | 0xFE30..=0xFE4F
        | 0xFF00..=0xFF60
        | 0xFFE0..=0xFFE6
        | 0x20000..=0x3FFFD)
}

/// Helvetica advance widths for `' '..='~'`, in thousandths of an em.
const HELVETICA_WIDTHS: [u16; 95] = [
    278, 278, 355, 556, 556, 889, 667, 191, 333, 333, 389, 584, 278, 333, 278, 278, // ' '..'/'
    556, 556, 556, 556, 556, 556, 556, 556, 556, 556, 278, 278, 584, 584, 584, 556, // '0'..'?'
    1015, 667, 667, 722, 722, 667, 611, 778, 722, 278, 500, 667, 556, 833, 722, 778, // '@'..'O'
    667, 778, 722, 667, 611, 722, 667, 944, 667, 667, 611, 278, 278, 278, 469, 556, // 'P'..'_'
    333, 556, 556, 500, 556, 556, 278, 556, 556, 222, 222, 500, 222, 833, 556, 556, // '`'..'o'
    556, 556, 333, 500, 278, 556, 500, 722, 500, 500, 500, 334, 260, 334, 584, // 'p'..'~'
];

/// Em fraction assumed for glyphs outside the table that are not full width.
const FALLBACK_WIDTH: f32 = 0.6;

fn char_width(c: char, size: f32) -> f32 {
    let em = size * PT_TO_MM;
    if is_full_width(c) {
        return em;
    }
    match c {
        ' '..='~' => em * f32::from(HELVETICA_WIDTHS[c as usize - 0x20]) / 1000.0,
        _ => em * FALLBACK_WIDTH,
    }
}

/// Estimated width of `text` in millimetres at `size` points.
pub fn text_width(text: &str, size: f32) -> f32 {
    text.chars().map(|c| char_width(c, size)).sum()
}

/// Wrap `text` to lines no wider than `width` millimetres.
///
/// Lines break at whitespace; a word wider than the line is broken between
/// characters. Explicit newlines start a new line, and every input line
/// yields at least one output line.
pub fn wrap_text(text: &str, width: f32, size: f32) -> Vec<String> {
    let space = char_width(' ', size);
    let mut lines = Vec::new();

    for paragraph in text.split('\n') {
        let mut line = String::new();
        let mut line_width = 0.0f32;

        for word in paragraph.split_whitespace() {
            let word_width = text_width(word, size);
            let separator = if line.is_empty() { 0.0 } else { space };

            if line_width + separator + word_width <= width + EPSILON {
                if !line.is_empty() {
                    line.push(' ');
                }
                line.push_str(word);
                line_width += separator + word_width;
                continue;
            }

            if !line.is_empty() {
                lines.push(std::mem::take(&mut line));
                line_width = 0.0;
            }

            if word_width <= width + EPSILON {
                line.push_str(word);
                line_width = word_width;
                continue;
            }

            for c in word.chars() {
                let w = char_width(c, size);
                if line_width + w > width + EPSILON && !line.is_empty() {
                    lines.push(std::mem::take(&mut line));
                    line_width = 0.0;
                }
                line.push(c);
                line_width += w;
            }
        }

        lines.push(line);
    }

    lines
}
