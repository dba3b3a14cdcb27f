//! JSON-lines request handling
//!
//! One request per line: `{"id"?, "method", "args"?}`. Every known method
//! answers `{"id"?, "result"}` with a boolean or a status map, even when its
//! arguments are malformed. Only unknown methods and unreadable lines answer
//! with `{"id"?, "error"}`.

use crate::command::{Command, PrinterStatus, Reply};
use crate::error::BridgeError;
use crate::worker::PrinterHandle;
use serde::Deserialize;
use serde_json::{Value, json};

#[derive(Debug, Deserialize)]
struct Request {
    #[serde(default)]
    id: Option<Value>,
    method: String,
    #[serde(default)]
    args: Value,
}

/// Answer one raw input line; blank lines produce no response
pub async fn handle_line(printer: &PrinterHandle, raw: &[u8]) -> Option<Value> {
    let line = match std::str::from_utf8(raw) {
        Ok(line) => line.trim(),
        Err(e) => {
            tracing::warn!(error = %e, "Request line is not UTF-8");
            return Some(json!({ "error": format!("invalid request: {}", e) }));
        }
    };
    if line.is_empty() {
        return None;
    }

    let request: Request = match serde_json::from_str(line) {
        Ok(r) => r,
        Err(e) => return Some(json!({ "error": format!("invalid request: {}", e) })),
    };

    let mut response = match Command::parse(&request.method, &request.args) {
        Ok(command) => json!({ "result": printer.execute(command).await }),
        Err(BridgeError::UnknownMethod(method)) => {
            tracing::debug!(method = %method, "Unknown method");
            json!({ "error": "notImplemented" })
        }
        Err(e) => {
            tracing::warn!(method = %request.method, error = %e, "Rejected request arguments");
            json!({ "result": rejected(&request.method, &e) })
        }
    };

    if let (Some(id), Some(map)) = (request.id, response.as_object_mut()) {
        map.insert("id".to_string(), id);
    }
    Some(response)
}

/// Reply for a known method whose arguments could not be read
fn rejected(method: &str, error: &BridgeError) -> Reply {
    if method == Command::GetPrinterStatus.method() {
        Reply::Status(PrinterStatus::unavailable(error.to_string()))
    } else {
        Reply::Done(false)
    }
}
