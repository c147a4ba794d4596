//! Example: Connect to a printer and print text
//!
//! Run with: cargo run --example print_text -- "Hello, printer!"
//!
//! Text is read from the arguments, or from stdin if none are given.
//! Set `PRINTER_NAME` to pick a printer by name instead of signal strength.

use ble_receipt_printer::ble::{DeviceCandidate, NameContains};
use ble_receipt_printer::{BtleplugHost, PrinterConfig, PrinterSession, Result};
use std::io::{BufRead, Write};
use std::sync::Arc;

/// Ask on the terminal which printer to use.
///
/// Choosers are called from inside the async device request, so the blocking
/// stdin read is wrapped in `block_in_place` to keep the runtime's other
/// tasks moving. This needs the multi-threaded runtime `#[tokio::main]` starts.
fn ask_user(candidates: &[DeviceCandidate]) -> Option<DeviceCandidate> {
    tokio::task::block_in_place(|| prompt(candidates))
}

fn prompt(candidates: &[DeviceCandidate]) -> Option<DeviceCandidate> {
    println!("\nSelect a printer:");
    for (i, candidate) in candidates.iter().enumerate() {
        println!(
            "  [{}] {} ({}) RSSI: {:?}",
            i + 1,
            candidate.display_name(),
            candidate.id,
            candidate.rssi
        );
    }
    print!("Number (empty to cancel): ");
    let _ = std::io::stdout().flush();

    let mut line = String::new();
    std::io::stdin().lock().read_line(&mut line).ok()?;
    let index: usize = line.trim().parse().ok()?;
    candidates.get(index.checked_sub(1)?).cloned()
}

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize logging
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive("ble_receipt_printer=info".parse().unwrap()),
        )
        .init();

    let args: Vec<String> = std::env::args().skip(1).collect();
    let text = if args.is_empty() {
        let mut text = String::new();
        for line in std::io::stdin().lock().lines() {
            text.push_str(&line.map_err(|e| ble_receipt_printer::Error::Internal(e.to_string()))?);
            text.push('\n');
        }
        text
    } else {
        args.join(" ")
    };

    let host = BtleplugHost::new().await?;
    let host = match std::env::var("PRINTER_NAME") {
        Ok(name) => host.with_chooser(NameContains(name)),
        Err(_) => host.with_chooser(ask_user),
    };

    let session = PrinterSession::new(Arc::new(host), PrinterConfig::default())?;

    let _status = session.on_status_changed(|status| println!("Status: {}", status));
    let _alerts = session.on_alert(|message| eprintln!("\n!! {}\n", message));

    session.connect().await?;

    if let Err(e) = session.print_text(&text).await {
        eprintln!("Print failed: {}", e);
    }

    session.disconnect().await?;

    // Let the callback tasks drain.
    tokio::time::sleep(std::time::Duration::from_millis(100)).await;

    Ok(())
}
