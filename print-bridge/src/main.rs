//! JSON-lines front end for the printer worker
//!
//! Reads one request per stdin line (see [`print_bridge::protocol`]) and
//! writes one response line for each. Connection events are written as
//! `{"event": {...}}` lines as they happen.

use print_bridge::{BridgeConfig, logger, protocol};
use receipt_printer::ServiceRegistry;
use serde_json::{Value, json};
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::sync::mpsc;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenv::dotenv().ok();

    let config = BridgeConfig::from_env();
    logger::init_logger_with_file(Some(&config.log_level), config.log_dir.as_deref());

    tracing::info!(output_dir = %config.output_dir.display(), "Print bridge starting...");

    let (printer, worker) = print_bridge::launch(&config, ServiceRegistry::new()).await?;

    // Single writer so responses and events never interleave mid-line
    let (out_tx, mut out_rx) = mpsc::unbounded_channel::<Value>();
    let writer = tokio::spawn(async move {
        let mut stdout = tokio::io::stdout();
        while let Some(value) = out_rx.recv().await {
            let mut line = value.to_string();
            line.push('\n');
            if stdout.write_all(line.as_bytes()).await.is_err() || stdout.flush().await.is_err() {
                break;
            }
        }
    });

    let mut events = printer.subscribe();
    let event_tx = out_tx.clone();
    tokio::spawn(async move {
        while let Some(event) = events.recv().await {
            match serde_json::to_value(&event) {
                Ok(value) => {
                    let _ = event_tx.send(json!({ "event": value }));
                }
                Err(e) => tracing::warn!(error = %e, "Failed to serialize event"),
            }
        }
    });

    // Raw byte lines: a non-UTF-8 line gets an error reply instead of ending input
    let mut lines = BufReader::new(tokio::io::stdin()).split(b'\n');
    loop {
        tokio::select! {
            _ = tokio::signal::ctrl_c() => {
                tracing::info!("Interrupted, shutting down");
                break;
            }
            line = lines.next_segment() => {
                let line = match line {
                    Ok(Some(line)) => line,
                    Ok(None) => {
                        tracing::info!("Input closed, shutting down");
                        break;
                    }
                    Err(e) => {
                        tracing::error!(error = %e, "Failed to read input, shutting down");
                        break;
                    }
                };
                if let Some(response) = protocol::handle_line(&printer, &line).await {
                    let _ = out_tx.send(response);
                }
            }
        }
    }

    printer.shutdown();
    worker.await?;
    // Closes the event stream so the forwarder releases its writer handle
    printer.unsubscribe();
    drop(out_tx);
    writer.await?;

    Ok(())
}
