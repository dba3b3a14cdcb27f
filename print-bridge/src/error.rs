//! Bridge error types

use receipt_printer::PrintError;
use thiserror::Error;

use crate::session::SessionState;

/// Errors raised inside the session and worker
///
/// None of these cross [`crate::PrinterHandle`]: every operation settles
/// them into `false` (or the status error variant) at its boundary.
#[derive(Debug, Error)]
pub enum BridgeError {
    #[error("{operation} requires a connected printer (state: {state:?})")]
    InvalidState {
        operation: &'static str,
        state: SessionState,
    },

    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    #[error("Print error: {0}")]
    Print(#[from] PrintError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Delivery failed: {0}")]
    DeliveryFailed(String),

    #[error("Unknown method: {0}")]
    UnknownMethod(String),

    #[error("Printer worker is gone")]
    WorkerGone,
}

pub type BridgeResult<T> = Result<T, BridgeError>;
