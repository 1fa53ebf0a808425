//! Voice Bridge Application
//!
//! Bridges a local audio device to one remote peer: inbound compressed
//! frames play back through the output device, and a `start` command on
//! stdin transmits a fixed-length capture from the input device.

use anyhow::Result;
use std::io::BufReader;
use std::sync::Arc;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use voice_bridge::{
    audio::{
        capture::TransmitToken,
        device::{list_devices, AudioDevice, CpalDevice, InputConfig, OutputConfig},
    },
    bridge::AudioBridge,
    config::AppConfig,
    control::run_command_loop,
    lifecycle::RestartHandler,
    session::{PeerSession, StaticSignaling, UdpSession},
};

/// Exit non-zero on terminal peer states; a supervisor does the restart
struct ExitRestart;

impl RestartHandler for ExitRestart {
    fn restart(&self) {
        tracing::error!("peer connection lost, exiting for supervisor restart");
    }
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

    tracing::info!("Starting Voice Bridge");

    let config = AppConfig::load_or_default("voice-bridge.toml")?;

    // List available devices
    println!("\n=== Available Audio Devices ===");
    for device in list_devices() {
        let device_type = match (device.is_input, device.is_output) {
            (true, true) => "Input/Output",
            (true, false) => "Input",
            (false, true) => "Output",
            _ => "Unknown",
        };
        let default_marker = if device.is_default { " [DEFAULT]" } else { "" };
        println!("  {} ({}){}", device.name, device_type, default_marker);
    }
    println!();

    // Peer address from args
    let peer_addr = std::env::args()
        .nth(1)
        .ok_or_else(|| anyhow::anyhow!("usage: bridge <peer-ip:port>"))?;
    tracing::info!("Peer: {}", peer_addr);

    let device = CpalDevice::new(
        device_name(&config.audio.input_device),
        device_name(&config.audio.output_device),
    );
    device.configure_output(OutputConfig {
        sample_rate: config.audio.sample_rate,
        channels: 1,
    })?;
    device.configure_input(InputConfig {
        sample_rate: config.audio.sample_rate,
        channels: 1,
    })?;
    let device: Arc<dyn AudioDevice> = Arc::new(device);

    let session = Arc::new(UdpSession::bind(&config.network.bind_address)?);
    tracing::info!("Media socket: {}", session.local_description()?);
    let signaling = Arc::new(StaticSignaling::for_peer(&peer_addr));

    let peer: Arc<dyn PeerSession> = session.clone();
    let mut bridge = AudioBridge::new(&config, device.clone(), peer.clone(), signaling, Arc::new(ExitRestart))?;
    bridge.start_playback()?;

    // Stdin command reader on its own thread so the pump never blocks on input
    let token: Arc<TransmitToken> = bridge.token();
    let capture_params = bridge.capture_params();
    let command_device = device.clone();
    let command_peer = peer.clone();
    std::thread::Builder::new()
        .name("command-input".to_string())
        .spawn(move || {
            run_command_loop(
                BufReader::new(std::io::stdin()),
                command_device,
                command_peer,
                token,
                capture_params,
            );
        })?;

    peer.create_offer()?;
    tracing::info!("Type 'start' to begin a capture session - press Ctrl+C to stop");

    let mut tick = tokio::time::interval(bridge.tick());
    loop {
        tokio::select! {
            _ = tick.tick() => {
                bridge.pump_once();
                if bridge.restart_requested() {
                    bridge.shutdown();
                    session.close();
                    std::process::exit(1);
                }
            }
            _ = tokio::signal::ctrl_c() => {
                tracing::info!("Shutting down");
                break;
            }
        }
    }

    bridge.shutdown();
    session.close();
    Ok(())
}

fn device_name(configured: &str) -> Option<String> {
    if configured == "default" {
        None
    } else {
        Some(configured.to_string())
    }
}
