use receipt_printer::ChainConfig;
use std::path::PathBuf;
use std::time::Duration;

/// Bridge configuration
///
/// # Environment variables
///
/// | Variable | Default | Meaning |
/// |----------|---------|---------|
/// | PRINTER_OUTPUT_DIR | $TMPDIR/receipt-printer | receipt.txt and QR images |
/// | PRINTER_STAGING_DIR | $TMPDIR | staging files for shell backends |
/// | PRINTER_LOOPBACK_HOST | localhost | print daemon host |
/// | PRINTER_PORTS | 9100,9101,9102,9103,9104 | print daemon ports |
/// | PRINTER_FALLBACK_PORT | 9100 | last port tried |
/// | PRINTER_CONNECT_TIMEOUT_MS | 1000 | socket connect timeout |
/// | PRINTER_DEVICE_PATHS | /dev/usb/lp0,/dev/lp0,/dev/printer,/dev/ttyS1 | device files |
/// | PRINTER_SERVICES | woyou + sunmi service names | registered print services |
/// | PRINTER_SPOOLER_COMMAND | lp | OS spooler binary |
/// | PRINTER_OPENER_COMMAND | (unset) | viewer for the receipt file |
/// | PRINTER_QUEUE_CAPACITY | 64 | pending requests per worker |
/// | LOG_LEVEL | info | tracing level |
/// | LOG_DIR | (unset) | daily rolling log directory |
#[derive(Debug, Clone)]
pub struct BridgeConfig {
    /// Where the receipt snapshot and QR images are written
    pub output_dir: PathBuf,
    /// Transport chain settings
    pub chain: ChainConfig,
    /// Viewer command for the receipt file; `None` only logs
    pub opener_command: Option<String>,
    /// Bounded queue size in front of the session worker
    pub queue_capacity: usize,
    pub log_level: String,
    pub log_dir: Option<String>,
}

impl BridgeConfig {
    /// Load configuration from the environment
    ///
    /// Unset or unparsable variables fall back to their defaults.
    pub fn from_env() -> Self {
        let defaults = ChainConfig::default();

        let chain = ChainConfig {
            loopback_host: std::env::var("PRINTER_LOOPBACK_HOST")
                .unwrap_or(defaults.loopback_host),
            ports: env_list("PRINTER_PORTS")
                .map(|ports| ports.iter().filter_map(|p| p.parse().ok()).collect())
                .unwrap_or(defaults.ports),
            fallback_port: std::env::var("PRINTER_FALLBACK_PORT")
                .ok()
                .and_then(|p| p.parse().ok())
                .unwrap_or(defaults.fallback_port),
            connect_timeout: std::env::var("PRINTER_CONNECT_TIMEOUT_MS")
                .ok()
                .and_then(|v| v.parse().ok())
                .map(Duration::from_millis)
                .unwrap_or(defaults.connect_timeout),
            device_paths: env_list("PRINTER_DEVICE_PATHS").unwrap_or(defaults.device_paths),
            services: env_list("PRINTER_SERVICES").unwrap_or(defaults.services),
            spooler_command: std::env::var("PRINTER_SPOOLER_COMMAND")
                .unwrap_or(defaults.spooler_command),
            job_title: defaults.job_title,
            staging_dir: std::env::var("PRINTER_STAGING_DIR")
                .map(PathBuf::from)
                .unwrap_or(defaults.staging_dir),
        };

        Self {
            output_dir: std::env::var("PRINTER_OUTPUT_DIR")
                .map(PathBuf::from)
                .unwrap_or_else(|_| std::env::temp_dir().join("receipt-printer")),
            chain,
            opener_command: std::env::var("PRINTER_OPENER_COMMAND")
                .ok()
                .filter(|c| !c.trim().is_empty()),
            queue_capacity: std::env::var("PRINTER_QUEUE_CAPACITY")
                .ok()
                .and_then(|v| v.parse().ok())
                .filter(|&n: &usize| n > 0)
                .unwrap_or(64),
            log_level: std::env::var("LOG_LEVEL").unwrap_or_else(|_| "info".into()),
            log_dir: std::env::var("LOG_DIR").ok(),
        }
    }
}

impl Default for BridgeConfig {
    fn default() -> Self {
        Self::from_env()
    }
}

/// Comma separated list, empty entries dropped
fn env_list(key: &str) -> Option<Vec<String>> {
    let raw = std::env::var(key).ok()?;
    let items: Vec<String> = raw
        .split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(String::from)
        .collect();
    (!items.is_empty()).then_some(items)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_are_usable() {
        let config = BridgeConfig::from_env();
        assert!(config.queue_capacity > 0);
        assert!(!config.output_dir.as_os_str().is_empty());
    }

    #[test]
    fn test_missing_list_is_none() {
        assert!(env_list("PRINT_BRIDGE_TEST_UNSET_LIST").is_none());
    }
}
