//! QR code matrices and monochrome rasterization
//!
//! The module matrix comes from the `qrcode` crate; this module only turns it
//! into a square black-on-white image and writes it to disk.

use crate::error::{PrintError, PrintResult};
use qrcode::{Color, EcLevel, QrCode};

/// Quiet-zone width in modules around the symbol
pub const QR_MARGIN: usize = 1;

/// Square boolean matrix of QR modules (`true` = dark)
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QrMatrix {
    width: usize,
    modules: Vec<bool>,
}

impl QrMatrix {
    /// Modules per side, without quiet zone
    pub fn width(&self) -> usize {
        self.width
    }

    /// Whether the module at (x, y) is dark
    pub fn is_dark(&self, x: usize, y: usize) -> bool {
        self.modules[y * self.width + x]
    }

    /// Smallest edge in pixels that keeps one pixel per module
    pub fn min_size(&self) -> u32 {
        (self.width + 2 * QR_MARGIN) as u32
    }

    /// Dots per module when the symbol plus quiet zone spans `size` pixels
    pub fn module_size(&self, size: u32) -> u8 {
        (size / self.min_size()).clamp(1, 16) as u8
    }
}

/// Encode `data` into a QR module matrix; empty payloads are rejected
pub fn qr_matrix(data: &str) -> PrintResult<QrMatrix> {
    if data.is_empty() {
        return Err(PrintError::Encoding("QR payload is empty".to_string()));
    }
    let code = QrCode::with_error_correction_level(data.as_bytes(), EcLevel::M)
        .map_err(|e| PrintError::Encoding(format!("QR encode failed: {}", e)))?;

    let width = code.width();
    let modules = code
        .to_colors()
        .into_iter()
        .map(|c| c == Color::Dark)
        .collect();

    Ok(QrMatrix { width, modules })
}

/// Rasterize a matrix into a `size` x `size` monochrome image
///
/// Each output pixel samples the nearest module, quiet zone included.
/// `size` must be at least [`QrMatrix::min_size`].
#[cfg(feature = "image")]
pub fn rasterize(matrix: &QrMatrix, size: u32) -> PrintResult<image::GrayImage> {
    if size < matrix.min_size() {
        return Err(PrintError::Encoding(format!(
            "QR size {} is below {} pixels for a {}-module symbol",
            size,
            matrix.min_size(),
            matrix.width
        )));
    }

    let total = matrix.width + 2 * QR_MARGIN;
    let img = image::GrayImage::from_fn(size, size, |x, y| {
        let mx = x as usize * total / size as usize;
        let my = y as usize * total / size as usize;
        let inside = (QR_MARGIN..QR_MARGIN + matrix.width).contains(&mx)
            && (QR_MARGIN..QR_MARGIN + matrix.width).contains(&my);

        if inside && matrix.is_dark(mx - QR_MARGIN, my - QR_MARGIN) {
            image::Luma([0u8])
        } else {
            image::Luma([255u8])
        }
    });

    Ok(img)
}

/// Rasterize and write the matrix as a PNG file
#[cfg(feature = "image")]
#[tracing::instrument(skip(matrix, path), fields(path = %path.display()))]
pub fn save_png(matrix: &QrMatrix, size: u32, path: &std::path::Path) -> PrintResult<()> {
    let img = rasterize(matrix, size)?;
    img.save_with_format(path, image::ImageFormat::Png)
        .map_err(|e| PrintError::Image(format!("write {}: {}", path.display(), e)))
}
