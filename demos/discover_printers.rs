//! Basic example: Discover nearby BLE receipt printers
//!
//! Run with: cargo run --example discover_printers

use ble_receipt_printer::ble::{BleScanner, PRINTER_SERVICE_UUID};
use ble_receipt_printer::Result;
use std::time::Duration;

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize logging
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive("ble_receipt_printer=debug".parse().unwrap()),
        )
        .init();

    println!("Scanning for receipt printers...");
    println!("Make sure your printer is turned on and in pairing mode!\n");

    let scanner = BleScanner::new().await?;

    let mut rx = scanner.subscribe();
    tokio::spawn(async move {
        while let Ok(event) = rx.recv().await {
            println!(
                "  seen {} ({}) RSSI: {:?} dBm",
                event.candidate.display_name(),
                event.candidate.id,
                event.candidate.rssi
            );
        }
    });

    let printers = scanner
        .scan(&[PRINTER_SERVICE_UUID], Duration::from_secs(10))
        .await?;

    println!("\n--- Scan Complete ---");
    println!("Total printers found: {}", printers.len());

    for printer in printers {
        println!(
            "  {} - {} (RSSI: {:?})",
            printer.display_name(),
            printer.id,
            printer.rssi
        );
        for service in &printer.services {
            println!("      service {}", service);
        }
    }

    Ok(())
}
