//! Host-facing command surface
//!
//! Method names and argument keys follow the host channel
//! (`printQRCode`, `macAddress`, `imageData`, ...). Missing arguments take
//! their documented defaults.

use crate::error::{BridgeError, BridgeResult};
use base64::Engine;
use base64::engine::general_purpose::STANDARD as BASE64;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::Value;

pub const DEFAULT_QR_SIZE: i64 = 200;
pub const DEFAULT_BARCODE_HEIGHT: i64 = 100;
pub const DEFAULT_IMAGE_WIDTH: i64 = 384;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    Initialize,
    CheckAvailability,
    Connect,
    ConnectToMacAddress { mac_address: String },
    Disconnect,
    PrintText { text: String, bold: bool, center: bool },
    PrintLine,
    PrintQrCode { data: String, size: i64 },
    PrintBarcode { data: String, height: i64 },
    PrintImage { image_data: Vec<u8>, width: i64 },
    FeedPaper { lines: i64 },
    CutPaper,
    Flush,
    GetPrinterStatus,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct MacArgs {
    #[serde(default)]
    mac_address: String,
}

#[derive(Deserialize)]
struct TextArgs {
    #[serde(default)]
    text: String,
    #[serde(default)]
    bold: bool,
    #[serde(default)]
    center: bool,
}

#[derive(Deserialize)]
struct QrArgs {
    #[serde(default)]
    data: String,
    #[serde(default = "default_qr_size")]
    size: i64,
}

#[derive(Deserialize)]
struct BarcodeArgs {
    #[serde(default)]
    data: String,
    #[serde(default = "default_barcode_height")]
    height: i64,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct ImageArgs {
    #[serde(default)]
    image_data: String,
    #[serde(default = "default_image_width")]
    width: i64,
}

#[derive(Deserialize)]
struct FeedArgs {
    #[serde(default = "default_feed_lines")]
    lines: i64,
}

fn default_qr_size() -> i64 {
    DEFAULT_QR_SIZE
}

fn default_barcode_height() -> i64 {
    DEFAULT_BARCODE_HEIGHT
}

fn default_image_width() -> i64 {
    DEFAULT_IMAGE_WIDTH
}

fn default_feed_lines() -> i64 {
    1
}

/// Missing or `null` args count as an empty object
fn args<T: DeserializeOwned>(method: &str, args: &Value) -> BridgeResult<T> {
    let value = if args.is_null() {
        Value::Object(Default::default())
    } else {
        args.clone()
    };
    serde_json::from_value(value)
        .map_err(|e| BridgeError::InvalidArgument(format!("{}: {}", method, e)))
}

impl Command {
    /// Build a command from a method name and its JSON arguments
    pub fn parse(method: &str, raw: &Value) -> BridgeResult<Self> {
        let command = match method {
            "initialize" => Command::Initialize,
            "checkAvailability" => Command::CheckAvailability,
            "connect" => Command::Connect,
            "connectToMacAddress" => {
                let a: MacArgs = args(method, raw)?;
                Command::ConnectToMacAddress {
                    mac_address: a.mac_address,
                }
            }
            "disconnect" => Command::Disconnect,
            "printText" => {
                let a: TextArgs = args(method, raw)?;
                Command::PrintText {
                    text: a.text,
                    bold: a.bold,
                    center: a.center,
                }
            }
            "printLine" => Command::PrintLine,
            "printQRCode" => {
                let a: QrArgs = args(method, raw)?;
                Command::PrintQrCode {
                    data: a.data,
                    size: a.size,
                }
            }
            "printBarcode" => {
                let a: BarcodeArgs = args(method, raw)?;
                Command::PrintBarcode {
                    data: a.data,
                    height: a.height,
                }
            }
            "printImage" => {
                let a: ImageArgs = args(method, raw)?;
                let image_data = BASE64
                    .decode(a.image_data.trim())
                    .map_err(|e| BridgeError::InvalidArgument(format!("imageData: {}", e)))?;
                Command::PrintImage {
                    image_data,
                    width: a.width,
                }
            }
            "feedPaper" => {
                let a: FeedArgs = args(method, raw)?;
                Command::FeedPaper { lines: a.lines }
            }
            "cutPaper" => Command::CutPaper,
            "flush" => Command::Flush,
            "getPrinterStatus" => Command::GetPrinterStatus,
            other => return Err(BridgeError::UnknownMethod(other.to_string())),
        };
        Ok(command)
    }

    pub fn method(&self) -> &'static str {
        match self {
            Command::Initialize => "initialize",
            Command::CheckAvailability => "checkAvailability",
            Command::Connect => "connect",
            Command::ConnectToMacAddress { .. } => "connectToMacAddress",
            Command::Disconnect => "disconnect",
            Command::PrintText { .. } => "printText",
            Command::PrintLine => "printLine",
            Command::PrintQrCode { .. } => "printQRCode",
            Command::PrintBarcode { .. } => "printBarcode",
            Command::PrintImage { .. } => "printImage",
            Command::FeedPaper { .. } => "feedPaper",
            Command::CutPaper => "cutPaper",
            Command::Flush => "flush",
            Command::GetPrinterStatus => "getPrinterStatus",
        }
    }
}

/// Point-in-time printer status
///
/// Normal form: `{status: 1, connected, initialized, bufferSize, lastError?}`.
/// Error form: `{status: -1, connected: false, initialized: false,
/// bufferSize: 0, error}`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PrinterStatus {
    pub status: i32,
    pub connected: bool,
    pub initialized: bool,
    pub buffer_size: usize,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_error: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl PrinterStatus {
    pub fn unavailable(error: impl Into<String>) -> Self {
        Self {
            status: -1,
            connected: false,
            initialized: false,
            buffer_size: 0,
            last_error: None,
            error: Some(error.into()),
        }
    }
}

/// Result of one command
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(untagged)]
pub enum Reply {
    Done(bool),
    Status(PrinterStatus),
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_parse_defaults() {
        assert_eq!(
            Command::parse("printText", &json!({"text": "HI"})).unwrap(),
            Command::PrintText {
                text: "HI".into(),
                bold: false,
                center: false
            }
        );
        assert_eq!(
            Command::parse("printQRCode", &Value::Null).unwrap(),
            Command::PrintQrCode {
                data: String::new(),
                size: 200
            }
        );
        assert_eq!(
            Command::parse("printBarcode", &json!({"data": "123"})).unwrap(),
            Command::PrintBarcode {
                data: "123".into(),
                height: 100
            }
        );
        assert_eq!(
            Command::parse("feedPaper", &json!({})).unwrap(),
            Command::FeedPaper { lines: 1 }
        );
    }

    #[test]
    fn test_parse_camel_case_args() {
        assert_eq!(
            Command::parse("connectToMacAddress", &json!({"macAddress": "aa:bb:cc:dd:ee:ff"})).unwrap(),
            Command::ConnectToMacAddress {
                mac_address: "aa:bb:cc:dd:ee:ff".into()
            }
        );
        assert_eq!(
            Command::parse("printImage", &json!({"imageData": "AQID", "width": 200})).unwrap(),
            Command::PrintImage {
                image_data: vec![1, 2, 3],
                width: 200
            }
        );
    }

    #[test]
    fn test_parse_rejects_unknown_and_malformed() {
        assert!(matches!(
            Command::parse("openDrawer", &Value::Null),
            Err(BridgeError::UnknownMethod(m)) if m == "openDrawer"
        ));
        assert!(matches!(
            Command::parse("printText", &json!({"bold": "yes"})),
            Err(BridgeError::InvalidArgument(_))
        ));
        assert!(matches!(
            Command::parse("printImage", &json!({"imageData": "%%%"})),
            Err(BridgeError::InvalidArgument(_))
        ));
    }

    #[test]
    fn test_method_names_round_trip() {
        for method in ["initialize", "printQRCode", "getPrinterStatus", "flush"] {
            assert_eq!(Command::parse(method, &Value::Null).unwrap().method(), method);
        }
    }

    #[test]
    fn test_status_shapes() {
        let status = PrinterStatus {
            status: 1,
            connected: true,
            initialized: true,
            buffer_size: 12,
            last_error: None,
            error: None,
        };
        assert_eq!(
            serde_json::to_value(&status).unwrap(),
            json!({"status": 1, "connected": true, "initialized": true, "bufferSize": 12})
        );
        assert_eq!(
            serde_json::to_value(PrinterStatus::unavailable("worker stopped")).unwrap(),
            json!({
                "status": -1,
                "connected": false,
                "initialized": false,
                "bufferSize": 0,
                "error": "worker stopped"
            })
        );
    }

    #[test]
    fn test_reply_serializes_bare() {
        assert_eq!(serde_json::to_value(Reply::Done(true)).unwrap(), json!(true));
    }
}
