//! ESC/POS command encoder
//!
//! Provides a fluent API for building ESC/POS print data, plus the
//! single-line styled text encoder used for every text record.

/// Character columns of a 58mm receipt at the default font
pub const LINE_WIDTH: usize = 32;

/// An encoded ESC/POS byte sequence
///
/// Immutable once produced; only read access is exposed.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct EncodedCommand(Vec<u8>);

impl EncodedCommand {
    pub fn as_bytes(&self) -> &[u8] {
        &self.0
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn into_bytes(self) -> Vec<u8> {
        self.0
    }
}

impl AsRef<[u8]> for EncodedCommand {
    fn as_ref(&self) -> &[u8] {
        &self.0
    }
}

/// Number of spaces that center `text` on a `width`-column line
///
/// Clamped at zero when the text is wider than the line.
pub fn center_padding(text: &str, width: usize) -> usize {
    width.saturating_sub(text.chars().count()) / 2
}

/// Prepend centering spaces to `text` for a `width`-column line
pub fn pad_center(text: &str, width: usize) -> String {
    format!("{}{}", " ".repeat(center_padding(text, width)), text)
}

/// Encode one line of styled text
///
/// Layout: `ESC @`, `ESC a m`, `ESC E n`, UTF-8 text, `LF`, then
/// `ESC E 0` and `ESC a 0` so no style leaks into the next command.
/// Pure: identical inputs always give identical bytes.
pub fn encode_text(text: &str, bold: bool, centered: bool) -> EncodedCommand {
    let mut b = EscPosBuilder::new(LINE_WIDTH);
    b.align_center_if(centered)
        .emphasis(bold)
        .line(text)
        .bold_off()
        .left();
    b.build()
}

/// ESC/POS command builder
///
/// Builds ESC/POS byte sequences for thermal printers. Text is emitted as
/// raw UTF-8.
pub struct EscPosBuilder {
    buf: Vec<u8>,
    width: usize,
}

impl EscPosBuilder {
    /// Create a new builder with the specified paper width in characters
    ///
    /// Common widths:
    /// - 58mm paper: 32 characters
    /// - 80mm paper: 48 characters
    pub fn new(width: usize) -> Self {
        let mut buf = Vec::with_capacity(256);
        // Initialize printer (ESC @)
        buf.extend_from_slice(&[0x1B, 0x40]);
        Self { buf, width }
    }

    // === Text Output ===

    /// Write raw text
    pub fn text(&mut self, s: &str) -> &mut Self {
        self.buf.extend_from_slice(s.as_bytes());
        self
    }

    /// Write text followed by newline
    pub fn line(&mut self, s: &str) -> &mut Self {
        self.text(s);
        self.buf.push(b'\n');
        self
    }

    /// Print and feed `lines` lines
    ///
    /// `ESC d n` carries a single byte, so larger feeds are split.
    pub fn feed(&mut self, lines: u32) -> &mut Self {
        let mut remaining = lines;
        while remaining > 0 {
            let n = remaining.min(u8::MAX as u32);
            self.buf.extend_from_slice(&[0x1B, 0x64, n as u8]);
            remaining -= n;
        }
        self
    }

    // === Alignment ===

    /// Align text to center
    pub fn center(&mut self) -> &mut Self {
        self.buf.extend_from_slice(&[0x1B, 0x61, 0x01]);
        self
    }

    /// Align text to left (default)
    pub fn left(&mut self) -> &mut Self {
        self.buf.extend_from_slice(&[0x1B, 0x61, 0x00]);
        self
    }

    fn align_center_if(&mut self, centered: bool) -> &mut Self {
        if centered { self.center() } else { self.left() }
    }

    // === Text Style ===

    /// Enable bold text
    pub fn bold(&mut self) -> &mut Self {
        self.buf.extend_from_slice(&[0x1B, 0x45, 0x01]);
        self
    }

    /// Disable bold text
    pub fn bold_off(&mut self) -> &mut Self {
        self.buf.extend_from_slice(&[0x1B, 0x45, 0x00]);
        self
    }

    fn emphasis(&mut self, on: bool) -> &mut Self {
        if on { self.bold() } else { self.bold_off() }
    }

    // === Separators ===

    /// Print a line of '-' characters
    pub fn sep_single(&mut self) -> &mut Self {
        self.line(&"-".repeat(self.width))
    }

    // === Paper Control ===

    /// Cut paper (full cut)
    pub fn cut(&mut self) -> &mut Self {
        // GS V 0 - Full cut
        self.buf.extend_from_slice(&[0x1D, 0x56, 0x00]);
        self
    }

    // === QR Code ===

    /// Print a QR code
    ///
    /// Size: 1-16 (module size in dots)
    pub fn qr_code(&mut self, data: &str, size: u8) -> &mut Self {
        let size = size.clamp(1, 16);

        // Function 165: Select model (Model 2)
        self.buf
            .extend_from_slice(&[0x1D, 0x28, 0x6B, 0x04, 0x00, 0x31, 0x41, 0x32, 0x00]);

        // Function 167: Set module size
        self.buf
            .extend_from_slice(&[0x1D, 0x28, 0x6B, 0x03, 0x00, 0x31, 0x43, size]);

        // Function 169: Set error correction (M)
        self.buf
            .extend_from_slice(&[0x1D, 0x28, 0x6B, 0x03, 0x00, 0x31, 0x45, 0x31]);

        // Function 180: Store data
        let data_bytes = data.as_bytes();
        let len = data_bytes.len() + 3;
        let p_l = (len & 0xFF) as u8;
        let p_h = ((len >> 8) & 0xFF) as u8;
        self.buf
            .extend_from_slice(&[0x1D, 0x28, 0x6B, p_l, p_h, 0x31, 0x50, 0x30]);
        self.buf.extend_from_slice(data_bytes);

        // Function 181: Print
        self.buf
            .extend_from_slice(&[0x1D, 0x28, 0x6B, 0x03, 0x00, 0x31, 0x51, 0x30]);

        self
    }

    // === Raw Commands ===

    /// Write raw bytes directly
    pub fn raw(&mut self, bytes: &[u8]) -> &mut Self {
        self.buf.extend_from_slice(bytes);
        self
    }

    // === Build ===

    /// Finish building
    pub fn build(self) -> EncodedCommand {
        EncodedCommand(self.buf)
    }
}

// ============================================================================
// Image Processing
// ============================================================================

/// Convert an encoded image (PNG, JPEG, ...) into ESC/POS raster data
///
/// The image will be:
/// - Resized to fit `max_width` dots
/// - Converted to 1-bit monochrome
/// - Encoded as GS v 0 raster graphics
#[cfg(feature = "image")]
#[tracing::instrument(skip(bytes), fields(len = bytes.len()))]
pub fn raster_image(bytes: &[u8], max_width: u32) -> crate::PrintResult<Vec<u8>> {
    use crate::PrintError;
    use image::GenericImageView;

    let img = image::load_from_memory(bytes).map_err(|e| PrintError::Image(e.to_string()))?;
    let (w, h) = img.dimensions();

    let max_width = max_width.max(8);
    let (new_w, new_h) = if w > max_width {
        let ratio = max_width as f64 / w as f64;
        (max_width, ((h as f64 * ratio) as u32).max(1))
    } else {
        (w, h)
    };

    if new_w > u16::MAX as u32 * 8 || new_h > u16::MAX as u32 {
        return Err(PrintError::Image(format!(
            "image too large: {}x{}",
            new_w, new_h
        )));
    }

    let resized = img.resize_exact(new_w, new_h, image::imageops::FilterType::Nearest);

    // Raster bit image command GS v 0
    let x_bytes = new_w.div_ceil(8);

    let mut data = Vec::with_capacity(12 + (x_bytes * new_h) as usize);

    // Center align for image
    data.extend_from_slice(&[0x1B, 0x61, 0x01]);

    // GS v 0 m xL xH yL yH
    data.extend_from_slice(&[0x1D, 0x76, 0x30, 0x00]);
    data.push(x_bytes as u8);
    data.push((x_bytes >> 8) as u8);
    data.push(new_h as u8);
    data.push((new_h >> 8) as u8);

    // Convert to RGBA for transparency handling
    let rgba = resized.to_rgba8();

    for y in 0..new_h {
        for x_byte in 0..x_bytes {
            let mut byte = 0u8;
            for bit in 0..8 {
                let x = x_byte * 8 + bit;
                if x < new_w {
                    let pixel = rgba.get_pixel(x, y);

                    // Transparent = white (0)
                    if pixel[3] >= 128 {
                        let luma = (0.299 * pixel[0] as f32
                            + 0.587 * pixel[1] as f32
                            + 0.114 * pixel[2] as f32) as u8;

                        if luma < 128 {
                            byte |= 1 << (7 - bit);
                        }
                    }
                }
            }
            data.push(byte);
        }
    }

    // Back to left, newline after image
    data.extend_from_slice(&[0x1B, 0x61, 0x00]);
    data.push(0x0A);

    Ok(data)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_encode_text_layout() {
        let cmd = encode_text("HI", true, true);
        assert_eq!(
            cmd.as_bytes(),
            &[
                0x1B, 0x40, // reset
                0x1B, 0x61, 0x01, // center
                0x1B, 0x45, 0x01, // bold
                b'H', b'I', 0x0A, // text + LF
                0x1B, 0x45, 0x00, // bold off
                0x1B, 0x61, 0x00, // left
            ]
        );
    }

    #[test]
    fn test_encode_text_plain_uses_zero_modes() {
        let cmd = encode_text("x", false, false);
        assert_eq!(&cmd.as_bytes()[2..8], &[0x1B, 0x61, 0x00, 0x1B, 0x45, 0x00]);
    }

    #[test]
    fn test_encode_text_is_pure() {
        let a = encode_text("Total: 12,50 €", true, false);
        let _ = encode_text("something else", false, true);
        let b = encode_text("Total: 12,50 €", true, false);
        assert_eq!(a, b);
    }

    #[test]
    fn test_encode_text_keeps_utf8_unescaped() {
        let cmd = encode_text("café", false, false);
        let bytes = cmd.as_bytes();
        let text = "café".as_bytes();
        assert!(bytes.windows(text.len()).any(|w| w == text));
    }

    #[test]
    fn test_center_padding() {
        assert_eq!(center_padding("HELLO", LINE_WIDTH), 13);
        assert_eq!(center_padding("", LINE_WIDTH), 16);
        assert_eq!(center_padding("abcd", LINE_WIDTH), 14);
        assert_eq!(center_padding("abc", LINE_WIDTH), 14);
        assert_eq!(center_padding(&"x".repeat(32), LINE_WIDTH), 0);
        assert_eq!(center_padding(&"x".repeat(50), LINE_WIDTH), 0);
    }

    #[test]
    fn test_center_padding_counts_chars_not_bytes() {
        assert_eq!(center_padding("ééé", LINE_WIDTH), 14);
    }

    #[test]
    fn test_pad_center() {
        assert_eq!(pad_center("HELLO", LINE_WIDTH), format!("{}HELLO", " ".repeat(13)));
    }

    #[test]
    fn test_feed_splits_large_counts() {
        let mut b = EscPosBuilder::new(32);
        b.feed(300);
        let data = b.build();
        assert_eq!(
            &data.as_bytes()[2..],
            &[0x1B, 0x64, 255, 0x1B, 0x64, 45]
        );
    }

    #[test]
    fn test_feed_zero_is_noop() {
        let mut b = EscPosBuilder::new(32);
        b.feed(0);
        assert_eq!(b.build().len(), 2);
    }

    #[test]
    fn test_separators() {
        let mut b = EscPosBuilder::new(10);
        b.sep_single();

        let data = b.build();
        let s = String::from_utf8_lossy(data.as_bytes());
        assert!(s.contains("----------\n"));
    }

    #[test]
    fn test_qr_code_store_length() {
        let mut b = EscPosBuilder::new(32);
        b.qr_code("abc", 40);
        let data = b.build();
        let bytes = data.as_bytes();
        // module size clamped to 16
        assert!(bytes.windows(8).any(|w| w == [0x1D, 0x28, 0x6B, 0x03, 0x00, 0x31, 0x43, 16]));
        // store: pL = 3 + 3
        assert!(bytes.windows(8).any(|w| w == [0x1D, 0x28, 0x6B, 6, 0, 0x31, 0x50, 0x30]));
    }

    #[cfg(feature = "image")]
    #[test]
    fn test_raster_image_from_png() {
        let mut img = image::GrayImage::from_pixel(16, 2, image::Luma([255u8]));
        img.put_pixel(0, 0, image::Luma([0u8]));
        let mut png = Vec::new();
        img.write_to(&mut std::io::Cursor::new(&mut png), image::ImageFormat::Png)
            .unwrap();

        let data = raster_image(&png, 384).unwrap();
        // center, GS v 0 header: 2 bytes wide, 2 rows high
        assert_eq!(&data[..11], &[0x1B, 0x61, 0x01, 0x1D, 0x76, 0x30, 0x00, 2, 0, 2, 0]);
        assert_eq!(data[11], 0b1000_0000);
        assert_eq!(data[12], 0);
    }

    #[cfg(feature = "image")]
    #[test]
    fn test_raster_image_rejects_garbage() {
        assert!(raster_image(&[1, 2, 3, 4], 384).is_err());
    }
}
