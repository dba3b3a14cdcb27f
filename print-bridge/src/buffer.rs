//! Append-only receipt buffer
//!
//! Each record has two renderings: the plain-text one (snapshot, spooler,
//! receipt file) and the ESC/POS one sent to byte-oriented transports.

use receipt_printer::{EncodedCommand, EscPosBuilder, LINE_WIDTH, center_padding, encode_text};
use std::path::PathBuf;

/// One line of styled text
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StyledText {
    pub content: String,
    pub bold: bool,
    pub centered: bool,
}

impl StyledText {
    pub fn new(content: impl Into<String>, bold: bool, centered: bool) -> Self {
        Self {
            content: content.into(),
            bold,
            centered,
        }
    }

    /// Plain-text form: centering spaces, `**` around bold content, newline
    pub fn render(&self) -> String {
        let body = if self.bold {
            format!("**{}**", self.content)
        } else {
            self.content.clone()
        };
        // Padding is computed from the content, not the bold markers
        let spaces = if self.centered {
            center_padding(&self.content, LINE_WIDTH)
        } else {
            0
        };
        format!("{}{}\n", " ".repeat(spaces), body)
    }
}

/// A buffered print record
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Record {
    Text(StyledText),
    Separator,
    QrCode {
        /// Rasterized PNG on disk
        path: PathBuf,
        data: String,
        /// Requested edge length in pixels
        size: u32,
        /// Dots per module for the native printer QR command
        module: u8,
    },
    Barcode {
        data: String,
        height: i64,
    },
    Image {
        width: u32,
        byte_len: usize,
        /// `GS v 0` raster when the payload decoded as an image
        raster: Option<Vec<u8>>,
    },
    Feed(u32),
    Cut,
}

impl Record {
    pub fn render_text(&self) -> String {
        match self {
            Record::Text(text) => text.render(),
            Record::Separator => format!("{}\n", "-".repeat(LINE_WIDTH)),
            Record::QrCode { path, data, .. } => {
                format!("[QR_CODE:{}]\nQR Data: {}\n", path.display(), data)
            }
            Record::Barcode { data, .. } => format!("Barcode: {}\n", data),
            Record::Image { width, .. } => format!("Image printed (width: {})\n", width),
            Record::Feed(lines) => "\n".repeat(*lines as usize),
            Record::Cut => "--- CUT HERE ---\n".to_string(),
        }
    }

    fn encode_into(&self, b: &mut EscPosBuilder) {
        match self {
            Record::Text(text) => {
                b.raw(encode_text(&text.content, text.bold, text.centered).as_bytes());
            }
            Record::Separator => {
                b.sep_single();
            }
            Record::QrCode { data, module, .. } => {
                b.center().qr_code(data, *module).line("").left();
                b.line(&format!("QR Data: {}", data));
            }
            Record::Barcode { data, .. } => {
                b.line(&format!("Barcode: {}", data));
            }
            Record::Image { width, raster, .. } => match raster {
                Some(bytes) => {
                    b.raw(bytes);
                }
                None => {
                    b.line(&format!("Image printed (width: {})", width));
                }
            },
            Record::Feed(lines) => {
                b.feed(*lines);
            }
            Record::Cut => {
                b.cut();
            }
        }
    }
}

/// Ordered receipt content
///
/// Length is the character count of the text snapshot, kept up to date on
/// every append.
#[derive(Debug, Clone, Default)]
pub struct PrintBuffer {
    records: Vec<Record>,
    length: usize,
}

impl PrintBuffer {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn append(&mut self, record: Record) {
        self.length += record.render_text().chars().count();
        self.records.push(record);
    }

    /// Full plain-text content
    pub fn snapshot(&self) -> String {
        self.records.iter().map(Record::render_text).collect()
    }

    /// Full ESC/POS stream, starting with a printer reset
    pub fn encode(&self) -> EncodedCommand {
        let mut b = EscPosBuilder::new(LINE_WIDTH);
        for record in &self.records {
            record.encode_into(&mut b);
        }
        b.build()
    }

    pub fn clear(&mut self) {
        self.records.clear();
        self.length = 0;
    }

    pub fn length(&self) -> usize {
        self.length
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn records(&self) -> &[Record] {
        &self.records
    }
}
