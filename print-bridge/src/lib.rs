//! # print-bridge
//!
//! Receipt session layer on top of `receipt-printer`.
//!
//! - **buffer**: append-only receipt records with text and ESC/POS renderings
//! - **session**: connection state machine and the cut/flush protocol
//! - **worker**: single task owning the session, reached through [`PrinterHandle`]
//! - **events**: `connected` / `disconnected` notifications to one subscriber
//! - **outlet**: where a finished receipt is shown and shared
//! - **protocol**: JSON-lines requests from the host
//!
//! ```ignore
//! let config = BridgeConfig::from_env();
//! let (printer, _task) = print_bridge::launch(&config, ServiceRegistry::new()).await?;
//!
//! printer.initialize().await;
//! printer.connect().await;
//! printer.print_text("HELLO", true, true).await;
//! printer.cut_paper().await;
//! ```

pub mod buffer;
pub mod command;
pub mod config;
pub mod error;
pub mod events;
pub mod logger;
pub mod outlet;
pub mod protocol;
pub mod session;
pub mod worker;

pub use buffer::{PrintBuffer, Record, StyledText};
pub use command::{Command, PrinterStatus, Reply};
pub use config::BridgeConfig;
pub use error::{BridgeError, BridgeResult};
pub use events::{EventKind, EventNotifier, PrinterEvent};
pub use outlet::{LoggingOutlet, OpenerOutlet, ReceiptOutlet};
pub use session::{PrintSession, SessionState};
pub use worker::{PrinterHandle, PrinterWorker};

use receipt_printer::{CommandRunner, ServiceRegistry, TokioCommandRunner, TransportChain};
use std::sync::Arc;
use tokio::task::JoinHandle;

/// Probe the standard transports and start a printer worker
///
/// `registry` holds the platform print services the host provides; an empty
/// registry simply drops the service backend from the chain.
pub async fn launch(
    config: &BridgeConfig,
    registry: ServiceRegistry,
) -> BridgeResult<(PrinterHandle, JoinHandle<()>)> {
    tokio::fs::create_dir_all(&config.output_dir).await?;

    let runner: Arc<dyn CommandRunner> = Arc::new(TokioCommandRunner);
    let candidates = TransportChain::standard_backends(&config.chain, registry, runner.clone());
    let chain = TransportChain::probe(candidates).await;
    tracing::info!(backends = ?chain.names(), "Transport chain ready");

    let outlet: Arc<dyn ReceiptOutlet> = match &config.opener_command {
        Some(command) => Arc::new(OpenerOutlet::new(command, &config.output_dir, runner)),
        None => Arc::new(LoggingOutlet),
    };

    let session = PrintSession::new(
        chain,
        outlet,
        Arc::new(EventNotifier::new()),
        &config.output_dir,
    );
    Ok(PrinterWorker::spawn(session, config.queue_capacity))
}
