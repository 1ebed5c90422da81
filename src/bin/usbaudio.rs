//! USB Audio Forwarding Application
//!
//! Switches an Android device into accessory audio mode and plays its
//! audio on the default output until Ctrl+C.

use anyhow::Result;
use clap::Parser;
use std::path::PathBuf;
use std::sync::Arc;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use usbaudio_forward::{
    accessory::AoaProtocol,
    audio::{list_input_devices, CpalSubsystem},
    config::ForwarderConfig,
    forward::{pick_accessory_input, AudioForwarder},
    transport::AdbTransport,
};

#[derive(Parser, Debug)]
#[command(name = "usbaudio", version, about = "Forward Android device audio over USB")]
struct Args {
    /// Serial of the device to forward audio from (asked to adb if omitted)
    #[arg(short, long)]
    serial: Option<String>,

    /// Configuration file
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// List input audio devices and exit
    #[arg(long)]
    list_devices: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize logging
    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::new(
            std::env::var("RUST_LOG").unwrap_or_else(|_| "info".into()),
        ))
        .with(tracing_subscriber::fmt::layer())
        .init();

    let args = Args::parse();

    if args.list_devices {
        return print_input_devices();
    }

    let config = match &args.config {
        Some(path) => ForwarderConfig::load(path)?,
        None => ForwarderConfig::load_or_default()?,
    };

    let audio = Arc::new(CpalSubsystem::with_queue_capacity(config.output_queue_chunks));
    let transport = AdbTransport::new(config.adb_path.clone());
    let mut forwarder = AudioForwarder::new(
        audio,
        Box::new(AoaProtocol::new()),
        Box::new(transport),
        config,
    );

    // The lifecycle blocks (USB transfers, the settle delay)
    let serial = args.serial.clone();
    let (mut forwarder, started) = tokio::task::spawn_blocking(move || {
        let started = forwarder.start(serial.as_deref());
        (forwarder, started)
    })
    .await?;
    started?;

    tracing::info!(
        "Forwarding audio from {} - press Ctrl+C to stop",
        forwarder.serial().unwrap_or("device")
    );
    tokio::signal::ctrl_c().await?;

    tokio::task::spawn_blocking(move || forwarder.stop()).await?;
    Ok(())
}

fn print_input_devices() -> Result<()> {
    let devices = list_input_devices()?;
    let selected = pick_accessory_input(&devices).map(|d| d.index);

    println!("\n=== Available Input Devices ===");
    for device in &devices {
        let marker = if Some(device.index) == selected {
            " [SELECTED]"
        } else {
            ""
        };
        println!("  {}: {}{}", device.index, device.name, marker);
    }
    println!();
    Ok(())
}
