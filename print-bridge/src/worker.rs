//! Printer worker
//!
//! One task owns the [`PrintSession`] and runs requests strictly in
//! submission order. [`PrinterHandle`] is the only way in: every method
//! enqueues a request and awaits its reply. Once the worker is cancelled,
//! requests resolve as `false` (or the status error form) instead of hanging.

use crate::command::{Command, PrinterStatus, Reply};
use crate::error::{BridgeError, BridgeResult};
use crate::events::{EventNotifier, PrinterEvent};
use crate::session::PrintSession;
use std::sync::Arc;
use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

/// A queued request and where its reply goes
#[derive(Debug)]
pub struct Envelope {
    pub command: Command,
    pub reply: oneshot::Sender<Reply>,
}

/// Owns the session and drains the request queue
pub struct PrinterWorker {
    session: PrintSession,
}

impl PrinterWorker {
    pub fn new(session: PrintSession) -> Self {
        Self { session }
    }

    /// Spawn the worker and return its handle
    pub fn spawn(session: PrintSession, capacity: usize) -> (PrinterHandle, JoinHandle<()>) {
        let (tx, rx) = mpsc::channel(capacity.max(1));
        let shutdown = CancellationToken::new();
        let handle = PrinterHandle {
            tx,
            events: session.events().clone(),
            shutdown: shutdown.clone(),
        };
        let task = tokio::spawn(Self::new(session).run(rx, shutdown));
        (handle, task)
    }

    /// Run until cancelled or every handle is dropped
    ///
    /// A request in flight at cancellation is abandoned; its caller sees a
    /// failure.
    pub async fn run(mut self, mut rx: mpsc::Receiver<Envelope>, shutdown: CancellationToken) {
        tracing::info!("Printer worker started");

        loop {
            let envelope = tokio::select! {
                biased;
                _ = shutdown.cancelled() => {
                    tracing::info!("Printer worker received shutdown signal");
                    break;
                }
                envelope = rx.recv() => {
                    let Some(envelope) = envelope else {
                        tracing::info!("All printer handles dropped, worker stopping");
                        break;
                    };
                    envelope
                }
            };

            let method = envelope.command.method();
            tracing::debug!(method, "Executing printer command");

            let reply = tokio::select! {
                biased;
                _ = shutdown.cancelled() => {
                    tracing::warn!(method, "Shutdown during printer command, abandoning it");
                    break;
                }
                reply = self.session.execute(envelope.command) => reply,
            };

            if envelope.reply.send(reply).is_err() {
                tracing::debug!(method, "Caller went away before the reply");
            }
        }

        // Queued envelopes are dropped with the receiver; their callers get a
        // closed oneshot.
        rx.close();
    }
}

/// Cloneable entry point to a printer worker
#[derive(Debug, Clone)]
pub struct PrinterHandle {
    tx: mpsc::Sender<Envelope>,
    events: Arc<EventNotifier>,
    shutdown: CancellationToken,
}

impl PrinterHandle {
    async fn request(&self, command: Command) -> BridgeResult<Reply> {
        let (reply, rx) = oneshot::channel();
        self.tx
            .send(Envelope { command, reply })
            .await
            .map_err(|_| BridgeError::WorkerGone)?;
        rx.await.map_err(|_| BridgeError::WorkerGone)
    }

    /// Run a command and return its raw reply
    ///
    /// Worker failures become `Done(false)` or the status error form.
    pub async fn execute(&self, command: Command) -> Reply {
        let is_status = command == Command::GetPrinterStatus;
        let method = command.method();
        match self.request(command).await {
            Ok(reply) => reply,
            Err(e) => {
                tracing::warn!(method, error = %e, "Printer request failed");
                if is_status {
                    Reply::Status(PrinterStatus::unavailable(e.to_string()))
                } else {
                    Reply::Done(false)
                }
            }
        }
    }

    async fn call(&self, command: Command) -> bool {
        match self.execute(command).await {
            Reply::Done(ok) => ok,
            Reply::Status(_) => false,
        }
    }

    pub async fn initialize(&self) -> bool {
        self.call(Command::Initialize).await
    }

    pub async fn check_availability(&self) -> bool {
        self.call(Command::CheckAvailability).await
    }

    pub async fn connect(&self) -> bool {
        self.call(Command::Connect).await
    }

    pub async fn connect_to_mac_address(&self, mac_address: &str) -> bool {
        self.call(Command::ConnectToMacAddress {
            mac_address: mac_address.to_string(),
        })
        .await
    }

    pub async fn disconnect(&self) -> bool {
        self.call(Command::Disconnect).await
    }

    pub async fn print_text(&self, text: &str, bold: bool, center: bool) -> bool {
        self.call(Command::PrintText {
            text: text.to_string(),
            bold,
            center,
        })
        .await
    }

    pub async fn print_line(&self) -> bool {
        self.call(Command::PrintLine).await
    }

    pub async fn print_qr_code(&self, data: &str, size: i64) -> bool {
        self.call(Command::PrintQrCode {
            data: data.to_string(),
            size,
        })
        .await
    }

    pub async fn print_barcode(&self, data: &str, height: i64) -> bool {
        self.call(Command::PrintBarcode {
            data: data.to_string(),
            height,
        })
        .await
    }

    pub async fn print_image(&self, image_data: Vec<u8>, width: i64) -> bool {
        self.call(Command::PrintImage { image_data, width }).await
    }

    pub async fn feed_paper(&self, lines: i64) -> bool {
        self.call(Command::FeedPaper { lines }).await
    }

    pub async fn cut_paper(&self) -> bool {
        self.call(Command::CutPaper).await
    }

    pub async fn flush(&self) -> bool {
        self.call(Command::Flush).await
    }

    pub async fn get_printer_status(&self) -> PrinterStatus {
        match self.execute(Command::GetPrinterStatus).await {
            Reply::Status(status) => status,
            Reply::Done(_) => PrinterStatus::unavailable("unexpected reply"),
        }
    }

    /// Become the single event subscriber, replacing any previous one
    pub fn subscribe(&self) -> mpsc::UnboundedReceiver<PrinterEvent> {
        self.events.subscribe()
    }

    pub fn unsubscribe(&self) {
        self.events.unsubscribe();
    }

    /// Stop the worker; later requests fail fast
    pub fn shutdown(&self) {
        self.shutdown.cancel();
    }

    pub fn is_shut_down(&self) -> bool {
        self.shutdown.is_cancelled()
    }
}
