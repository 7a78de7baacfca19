use clap::Parser;
use log::info;
use std::time::Duration;
use wyoming_tts::mock_server::{MockServerConfig, MockWyomingServer, Script};

#[derive(Parser)]
#[command(name = "mock_wyoming_server")]
#[command(about = "Wyoming TTS stand-in that answers every request with a test tone")]
struct Args {
    /// Address to listen on
    #[arg(long, default_value = "127.0.0.1:10200")]
    bind: String,

    /// Sample rate of the generated tone
    #[arg(long, default_value = "22050")]
    rate: u32,

    /// Number of channels
    #[arg(long, default_value = "1")]
    channels: u16,

    /// Tone length in milliseconds
    #[arg(long, default_value = "1000")]
    duration_ms: u64,

    /// Split writes into pieces of this many bytes
    #[arg(long)]
    chunk_size: Option<usize>,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    env_logger::init();
    let args = Args::parse();

    let config = MockServerConfig {
        bind_address: args.bind,
        script: Script::tone(
            args.rate,
            args.channels,
            Duration::from_millis(args.duration_ms),
        ),
        write_chunk_size: args.chunk_size,
    };

    let server = MockWyomingServer::start(config).await?;
    println!("🎵 Mock Wyoming server on {}", server.address());
    println!("   Press Ctrl+C to exit");

    tokio::signal::ctrl_c().await?;
    info!("Received Ctrl+C, shutting down...");
    server.stop();
    server.wait().await;
    Ok(())
}
