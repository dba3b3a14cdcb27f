//! # receipt-printer
//!
//! ESC/POS thermal receipt printing - low-level capabilities only.
//!
//! ## Scope
//!
//! This crate handles HOW to print:
//! - ESC/POS command encoding (styled text lines, QR, feed, cut, raster)
//! - QR module matrices and monochrome rasterization
//! - Ordered fallback delivery through several transports:
//!   platform service, privileged device write, loopback daemon socket
//!   (TCP 9100-9104), OS spooler, raw shell redirection
//!
//! Session state and buffering (WHAT to print and when) live in
//! `print-bridge`.
//!
//! ## Example
//!
//! ```ignore
//! use receipt_printer::{ChainConfig, PrintJob, ServiceRegistry, TokioCommandRunner, TransportChain};
//! use std::sync::Arc;
//!
//! let cmd = receipt_printer::encode_text("HELLO", true, true);
//!
//! let candidates = TransportChain::standard_backends(
//!     &ChainConfig::default(),
//!     ServiceRegistry::new(),
//!     Arc::new(TokioCommandRunner),
//! );
//! let chain = TransportChain::probe(candidates).await;
//! let delivered = chain.deliver(&PrintJob::new(cmd.as_bytes(), "HELLO\n")).await;
//! ```

mod error;
mod escpos;
pub mod qr;
pub mod transport;

// Re-exports
pub use error::{PrintError, PrintResult};
pub use escpos::{EncodedCommand, EscPosBuilder, LINE_WIDTH, center_padding, encode_text, pad_center};
pub use transport::{
    ChainConfig, CommandRunner, Delivery, Outcome, PrintJob, PrinterService, ServiceRegistry,
    TokioCommandRunner, Transport, TransportAttempt, TransportChain,
};

#[cfg(feature = "image")]
pub use escpos::raster_image;
