//! Printer session: state machine, buffer and the cut/flush protocol
//!
//! A session is owned by exactly one worker task (see [`crate::worker`]),
//! so none of its methods need locking.

use crate::buffer::{PrintBuffer, Record, StyledText};
use crate::command::{Command, PrinterStatus, Reply};
use crate::error::{BridgeError, BridgeResult};
use crate::events::{EventNotifier, PrinterEvent};
use crate::outlet::ReceiptOutlet;
use receipt_printer::{PrintJob, TransportChain, qr};
use serde_json::json;
use std::path::PathBuf;
use std::sync::Arc;
use tracing::{debug, error, info, instrument, warn};

/// Largest accepted QR edge length in pixels
pub const MAX_QR_SIZE: u32 = 4096;
/// Largest accepted paper feed per call
pub const MAX_FEED_LINES: u32 = 1000;
/// Name of the persisted snapshot inside the output directory
pub const RECEIPT_FILE: &str = "receipt.txt";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    Uninitialized,
    Initialized,
    Connected,
    Disconnected,
}

#[derive(Debug)]
pub struct PrintSession {
    state: SessionState,
    buffer: PrintBuffer,
    chain: TransportChain,
    outlet: Arc<dyn ReceiptOutlet>,
    events: Arc<EventNotifier>,
    output_dir: PathBuf,
    last_error: Option<String>,
}

impl PrintSession {
    pub fn new(
        chain: TransportChain,
        outlet: Arc<dyn ReceiptOutlet>,
        events: Arc<EventNotifier>,
        output_dir: impl Into<PathBuf>,
    ) -> Self {
        Self {
            state: SessionState::Uninitialized,
            buffer: PrintBuffer::new(),
            chain,
            outlet,
            events,
            output_dir: output_dir.into(),
            last_error: None,
        }
    }

    pub fn state(&self) -> SessionState {
        self.state
    }

    pub fn buffer(&self) -> &PrintBuffer {
        &self.buffer
    }

    pub fn events(&self) -> &Arc<EventNotifier> {
        &self.events
    }

    pub fn last_error(&self) -> Option<&str> {
        self.last_error.as_deref()
    }

    /// Run one command and produce its reply
    pub async fn execute(&mut self, command: Command) -> Reply {
        let ok = match command {
            Command::Initialize => self.initialize(),
            Command::CheckAvailability => self.check_availability(),
            Command::Connect => self.connect(),
            Command::ConnectToMacAddress { mac_address } => self.connect_to_mac_address(&mac_address),
            Command::Disconnect => self.disconnect(),
            Command::PrintText { text, bold, center } => self.print_text(&text, bold, center),
            Command::PrintLine => self.print_line(),
            Command::PrintQrCode { data, size } => self.print_qr_code(&data, size).await,
            Command::PrintBarcode { data, height } => self.print_barcode(&data, height),
            Command::PrintImage { image_data, width } => self.print_image(image_data, width).await,
            Command::FeedPaper { lines } => self.feed_paper(lines),
            Command::CutPaper => self.cut_paper().await,
            Command::Flush => self.flush().await,
            Command::GetPrinterStatus => return Reply::Status(self.status()),
        };
        Reply::Done(ok)
    }

    // === Lifecycle ===

    /// Reset to a fresh, unconnected session; allowed from any state
    pub fn initialize(&mut self) -> bool {
        self.buffer.clear();
        self.last_error = None;
        self.state = SessionState::Initialized;
        info!("Printer session initialized");
        true
    }

    /// Whether any transport survived probing
    pub fn check_availability(&self) -> bool {
        let available = !self.chain.is_empty();
        debug!(backends = ?self.chain.names(), available, "Availability checked");
        available
    }

    pub fn connect(&mut self) -> bool {
        settle("connect", self.try_connect(None))
    }

    pub fn connect_to_mac_address(&mut self, mac_address: &str) -> bool {
        let result = normalize_mac(mac_address).and_then(|address| self.try_connect(Some(address)));
        settle("connectToMacAddress", result)
    }

    fn try_connect(&mut self, address: Option<String>) -> BridgeResult<()> {
        match self.state {
            SessionState::Initialized | SessionState::Disconnected | SessionState::Connected => {}
            SessionState::Uninitialized => {
                return Err(BridgeError::InvalidState {
                    operation: "connect",
                    state: self.state,
                });
            }
        }

        self.state = SessionState::Connected;
        let data = address.as_ref().map(|a| json!({ "address": a }));
        info!(address = ?address, "Printer connected");
        self.events.emit(PrinterEvent::connected(data));
        Ok(())
    }

    /// Always succeeds; discards anything still buffered
    pub fn disconnect(&mut self) -> bool {
        self.buffer.clear();
        if self.state != SessionState::Uninitialized {
            self.state = SessionState::Disconnected;
        }
        info!(state = ?self.state, "Printer disconnected");
        self.events.emit(PrinterEvent::disconnected());
        true
    }

    // === Content ===

    pub fn print_text(&mut self, text: &str, bold: bool, center: bool) -> bool {
        let result = self.require_connected("printText").map(|()| {
            self.buffer
                .append(Record::Text(StyledText::new(text, bold, center)));
        });
        settle("printText", result)
    }

    pub fn print_line(&mut self) -> bool {
        let result = self
            .require_connected("printLine")
            .map(|()| self.buffer.append(Record::Separator));
        settle("printLine", result)
    }

    pub async fn print_qr_code(&mut self, data: &str, size: i64) -> bool {
        let result = self.try_print_qr_code(data, size).await;
        settle("printQRCode", result)
    }

    #[instrument(skip(self, data), fields(chars = data.chars().count()))]
    async fn try_print_qr_code(&mut self, data: &str, size: i64) -> BridgeResult<()> {
        self.require_connected("printQRCode")?;
        let size = u32::try_from(size)
            .ok()
            .filter(|s| (1..=MAX_QR_SIZE).contains(s))
            .ok_or_else(|| BridgeError::InvalidArgument(format!("QR size out of range: {}", size)))?;

        let matrix = qr::qr_matrix(data)?;
        if size < matrix.min_size() {
            return Err(BridgeError::InvalidArgument(format!(
                "QR size {} is smaller than {} modules",
                size,
                matrix.min_size()
            )));
        }
        let module = matrix.module_size(size);

        tokio::fs::create_dir_all(&self.output_dir).await?;
        let path = self.output_dir.join(format!(
            "qr_code_{}.png",
            chrono::Utc::now().timestamp_millis()
        ));

        let target = path.clone();
        tokio::task::spawn_blocking(move || qr::save_png(&matrix, size, &target))
            .await
            .map_err(|e| BridgeError::Io(std::io::Error::other(e)))??;

        info!(path = %path.display(), size, "QR code rasterized");
        self.buffer.append(Record::QrCode {
            path,
            data: data.to_string(),
            size,
            module,
        });
        Ok(())
    }

    pub fn print_barcode(&mut self, data: &str, height: i64) -> bool {
        let result = self.require_connected("printBarcode").map(|()| {
            debug!(height, "Barcode rendered as text placeholder");
            self.buffer.append(Record::Barcode {
                data: data.to_string(),
                height,
            });
        });
        settle("printBarcode", result)
    }

    pub async fn print_image(&mut self, image_data: Vec<u8>, width: i64) -> bool {
        let result = self.try_print_image(image_data, width).await;
        settle("printImage", result)
    }

    #[instrument(skip(self, image_data), fields(bytes = image_data.len()))]
    async fn try_print_image(&mut self, image_data: Vec<u8>, width: i64) -> BridgeResult<()> {
        self.require_connected("printImage")?;
        if image_data.is_empty() {
            return Err(BridgeError::InvalidArgument("empty image payload".to_string()));
        }
        let width = u32::try_from(width)
            .ok()
            .filter(|&w| w > 0)
            .ok_or_else(|| BridgeError::InvalidArgument(format!("image width: {}", width)))?;

        let byte_len = image_data.len();
        let raster = tokio::task::spawn_blocking(move || receipt_printer::raster_image(&image_data, width))
            .await
            .map_err(|e| BridgeError::Io(std::io::Error::other(e)))?;
        let raster = match raster {
            Ok(bytes) => Some(bytes),
            Err(e) => {
                debug!(error = %e, "Payload is not a decodable image, printing placeholder");
                None
            }
        };

        self.buffer.append(Record::Image {
            width,
            byte_len,
            raster,
        });
        Ok(())
    }

    /// Negative counts feed nothing
    pub fn feed_paper(&mut self, lines: i64) -> bool {
        let result = self.require_connected("feedPaper").and_then(|()| {
            let lines = u32::try_from(lines.max(0))
                .ok()
                .filter(|&n| n <= MAX_FEED_LINES)
                .ok_or_else(|| BridgeError::InvalidArgument(format!("feed lines: {}", lines)))?;
            self.buffer.append(Record::Feed(lines));
            Ok(())
        });
        settle("feedPaper", result)
    }

    // === Output ===

    /// Finish the receipt
    ///
    /// Delivers through the transport chain, persists the snapshot, hands it
    /// to the outlet, then clears the buffer. Delivery and outlet failures
    /// are logged; once connected this always returns `true`.
    pub async fn cut_paper(&mut self) -> bool {
        if let Err(e) = self.require_connected("cutPaper") {
            return settle("cutPaper", Err(e));
        }

        self.buffer.append(Record::Cut);
        let text = self.buffer.snapshot();
        let encoded = self.buffer.encode();

        let delivery = self
            .chain
            .deliver_with_report(&PrintJob::new(encoded.as_bytes(), &text))
            .await;
        if delivery.succeeded() {
            self.last_error = None;
        } else {
            let summary = delivery.failure_summary();
            warn!(reason = %summary, "Receipt not delivered to any printer");
            self.last_error = Some(summary);
        }

        match self.persist_receipt(&text).await {
            Ok(path) => {
                if let Err(e) = self.outlet.view(&path).await {
                    warn!(error = %e, "Failed to present receipt");
                }
            }
            Err(e) => warn!(error = %e, "Failed to save receipt"),
        }
        if let Err(e) = self.outlet.share(&text).await {
            warn!(error = %e, "Failed to share receipt");
        }

        self.buffer.clear();
        true
    }

    /// Deliver the buffer as one unit without cutting
    ///
    /// The buffer is cleared only when a transport accepted it.
    pub async fn flush(&mut self) -> bool {
        let result = self.try_flush().await;
        settle("flush", result)
    }

    async fn try_flush(&mut self) -> BridgeResult<()> {
        self.require_connected("flush")?;
        if self.buffer.is_empty() {
            return Ok(());
        }

        let text = self.buffer.snapshot();
        let encoded = self.buffer.encode();
        let delivery = self
            .chain
            .deliver_with_report(&PrintJob::new(encoded.as_bytes(), &text))
            .await;

        if !delivery.succeeded() {
            let summary = delivery.failure_summary();
            self.last_error = Some(summary.clone());
            return Err(BridgeError::DeliveryFailed(summary));
        }
        self.last_error = None;
        self.buffer.clear();
        Ok(())
    }

    async fn persist_receipt(&self, text: &str) -> BridgeResult<PathBuf> {
        tokio::fs::create_dir_all(&self.output_dir).await?;
        let path = self.output_dir.join(RECEIPT_FILE);
        tokio::fs::write(&path, text).await?;
        Ok(path)
    }

    pub fn status(&self) -> PrinterStatus {
        PrinterStatus {
            status: 1,
            connected: self.state == SessionState::Connected,
            initialized: self.state != SessionState::Uninitialized,
            buffer_size: self.buffer.length(),
            last_error: self.last_error.clone(),
            error: None,
        }
    }

    fn require_connected(&self, operation: &'static str) -> BridgeResult<()> {
        if self.state == SessionState::Connected {
            Ok(())
        } else {
            Err(BridgeError::InvalidState {
                operation,
                state: self.state,
            })
        }
    }
}

/// Collapse an operation result into the boolean the host sees
fn settle(operation: &'static str, result: BridgeResult<()>) -> bool {
    match result {
        Ok(()) => true,
        Err(e @ BridgeError::InvalidState { .. }) => {
            warn!(operation, "{}", e);
            false
        }
        Err(e) => {
            error!(operation, error = %e, "Operation failed");
            false
        }
    }
}

/// Validate a six-octet MAC address and normalize it to `AA:BB:CC:DD:EE:FF`
pub fn normalize_mac(input: &str) -> BridgeResult<String> {
    let invalid = || BridgeError::InvalidArgument(format!("invalid MAC address: {:?}", input));

    let octets: Vec<&str> = input.trim().split([':', '-']).collect();
    if octets.len() != 6
        || !octets
            .iter()
            .all(|o| o.len() == 2 && o.chars().all(|c| c.is_ascii_hexdigit()))
    {
        return Err(invalid());
    }
    Ok(octets.join(":").to_ascii_uppercase())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::outlet::LoggingOutlet;

    fn session(dir: &std::path::Path) -> PrintSession {
        PrintSession::new(
            TransportChain::default(),
            Arc::new(LoggingOutlet),
            Arc::new(EventNotifier::new()),
            dir,
        )
    }

    #[test]
    fn test_normalize_mac() {
        assert_eq!(normalize_mac("aa:bb:cc:dd:ee:ff").unwrap(), "AA:BB:CC:DD:EE:FF");
        assert_eq!(normalize_mac("00-1a-2B-3c-4D-5e").unwrap(), "00:1A:2B:3C:4D:5E");
        assert!(normalize_mac("").is_err());
        assert!(normalize_mac("aa:bb:cc:dd:ee").is_err());
        assert!(normalize_mac("aa:bb:cc:dd:ee:gg").is_err());
        assert!(normalize_mac("aabb:cc:dd:ee:ff").is_err());
    }

    #[test]
    fn test_state_transitions() {
        let dir = tempfile::tempdir().unwrap();
        let mut s = session(dir.path());
        assert_eq!(s.state(), SessionState::Uninitialized);

        assert!(!s.connect());
        assert_eq!(s.state(), SessionState::Uninitialized);

        assert!(s.disconnect());
        assert_eq!(s.state(), SessionState::Uninitialized);

        assert!(s.initialize());
        assert!(s.connect());
        assert_eq!(s.state(), SessionState::Connected);

        assert!(s.disconnect());
        assert_eq!(s.state(), SessionState::Disconnected);
        assert!(s.connect());
        assert_eq!(s.state(), SessionState::Connected);
    }

    #[test]
    fn test_connect_to_mac_emits_address() {
        let dir = tempfile::tempdir().unwrap();
        let mut s = session(dir.path());
        let mut rx = s.events().subscribe();
        s.initialize();

        assert!(!s.connect_to_mac_address("not-a-mac"));
        assert_eq!(s.state(), SessionState::Initialized);
        assert!(rx.try_recv().is_err());

        assert!(s.connect_to_mac_address("aa-bb-cc-dd-ee-ff"));
        assert_eq!(
            rx.try_recv().unwrap(),
            PrinterEvent::connected(Some(json!({"address": "AA:BB:CC:DD:EE:FF"})))
        );
    }

    #[tokio::test]
    async fn test_content_ops_require_connection() {
        let dir = tempfile::tempdir().unwrap();
        let mut s = session(dir.path());
        s.initialize();

        assert!(!s.print_text("HELLO", false, false));
        assert!(!s.print_line());
        assert!(!s.print_barcode("123", 100));
        assert!(!s.feed_paper(2));
        assert!(!s.print_qr_code("data", 200).await);
        assert!(!s.print_image(vec![1, 2, 3], 384).await);
        assert!(!s.cut_paper().await);
        assert!(!s.flush().await);

        assert!(s.buffer().is_empty());
        assert_eq!(std::fs::read_dir(dir.path()).unwrap().count(), 0);
    }

    #[test]
    fn test_initialize_resets_buffer_and_error() {
        let dir = tempfile::tempdir().unwrap();
        let mut s = session(dir.path());
        s.initialize();
        s.connect();
        s.print_text("HELLO", true, true);
        assert!(s.status().buffer_size > 0);

        s.last_error = Some("previous failure".into());
        assert!(s.initialize());
        let status = s.status();
        assert_eq!(status.buffer_size, 0);
        assert!(!status.connected);
        assert!(status.initialized);
        assert!(status.last_error.is_none());
    }

    #[test]
    fn test_feed_paper_bounds() {
        let dir = tempfile::tempdir().unwrap();
        let mut s = session(dir.path());
        s.initialize();
        s.connect();

        assert!(s.feed_paper(-3));
        assert_eq!(s.buffer().records(), &[Record::Feed(0)]);
        assert!(!s.feed_paper(MAX_FEED_LINES as i64 + 1));
        assert!(s.feed_paper(3));
        assert_eq!(s.buffer().length(), 3);
    }

    #[tokio::test]
    async fn test_qr_code_writes_png() {
        let dir = tempfile::tempdir().unwrap();
        let mut s = session(dir.path());
        s.initialize();
        s.connect();

        assert!(s.print_qr_code("https://example.com/r/42", 200).await);
        let Record::QrCode { path, data, size, .. } = &s.buffer().records()[0] else {
            panic!("expected a QR record");
        };
        assert_eq!(data, "https://example.com/r/42");
        assert_eq!(*size, 200);
        assert!(path.exists());
        let name = path.file_name().unwrap().to_string_lossy();
        assert!(name.starts_with("qr_code_") && name.ends_with(".png"));
        assert!(s.buffer().snapshot().starts_with("[QR_CODE:"));
    }

    #[tokio::test]
    async fn test_qr_code_rejects_bad_input_without_file() {
        let dir = tempfile::tempdir().unwrap();
        let mut s = session(dir.path());
        s.initialize();
        s.connect();

        assert!(!s.print_qr_code("data", 0).await);
        assert!(!s.print_qr_code("data", -5).await);
        assert!(!s.print_qr_code("data", MAX_QR_SIZE as i64 + 1).await);
        assert!(!s.print_qr_code("data", 5).await);
        assert!(!s.print_qr_code("", 200).await);
        assert!(!s.print_qr_code(&"x".repeat(8000), 200).await);

        assert!(s.buffer().is_empty());
        assert_eq!(std::fs::read_dir(dir.path()).unwrap().count(), 0);
    }

    #[tokio::test]
    async fn test_print_image_payloads() {
        let dir = tempfile::tempdir().unwrap();
        let mut s = session(dir.path());
        s.initialize();
        s.connect();

        assert!(!s.print_image(Vec::new(), 384).await);
        assert!(!s.print_image(vec![1, 2, 3], 0).await);

        assert!(s.print_image(vec![1, 2, 3], 384).await);
        assert_eq!(
            s.buffer().records()[0],
            Record::Image {
                width: 384,
                byte_len: 3,
                raster: None
            }
        );
        assert_eq!(s.buffer().snapshot(), "Image printed (width: 384)\n");
    }

    #[tokio::test]
    async fn test_flush_on_empty_chain_keeps_buffer() {
        let dir = tempfile::tempdir().unwrap();
        let mut s = session(dir.path());
        s.initialize();
        s.connect();

        assert!(s.flush().await);
        s.print_text("KEEP", false, false);
        assert!(!s.flush().await);
        assert_eq!(s.buffer().snapshot(), "KEEP\n");
        assert_eq!(s.last_error(), Some("no transport available"));
    }

    #[tokio::test]
    async fn test_execute_dispatches_status() {
        let dir = tempfile::tempdir().unwrap();
        let mut s = session(dir.path());
        assert_eq!(s.execute(Command::Initialize).await, Reply::Done(true));
        assert_eq!(s.execute(Command::CheckAvailability).await, Reply::Done(false));
        let Reply::Status(status) = s.execute(Command::GetPrinterStatus).await else {
            panic!("expected a status reply");
        };
        assert_eq!(status.status, 1);
        assert!(status.initialized);
    }
}
