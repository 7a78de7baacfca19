use anyhow::{Context, Result};
use clap::Parser;
use std::path::PathBuf;
use tokio_util::sync::CancellationToken;
use wyoming_tts::{load_config, SpeakRequest, TtsGateway};

#[derive(Parser)]
#[command(name = "wyoming-tts")]
#[command(about = "Synthesize speech through a Wyoming TTS engine and save it as WAV")]
#[command(long_about = "
Sends text to a Wyoming synthesis engine (e.g. wyoming-piper) and writes the
returned audio as a WAV file.

Defaults come from the environment (or a .env file):
  WYOMING_HOST, WYOMING_PORT, TTS_DEFAULT_VOICE, TTS_TIMEOUT_MS, TTS_MAX_TEXT_LENGTH

EXAMPLES:
  wyoming-tts --text \"Dinner is ready\" --output dinner.wav
  wyoming-tts --host piper.lan --voice en_GB-alan-low --text \"Hello\" -o hello.wav
")]
struct Args {
    /// Text to synthesize
    #[arg(long)]
    text: String,

    /// Voice name (defaults to TTS_DEFAULT_VOICE)
    #[arg(long)]
    voice: Option<String>,

    /// Synthesis engine host
    #[arg(long)]
    host: Option<String>,

    /// Synthesis engine port
    #[arg(long)]
    port: Option<u16>,

    /// Idle timeout in milliseconds
    #[arg(long, value_parser = clap::value_parser!(u64).range(1..))]
    timeout_ms: Option<u64>,

    /// Output WAV file
    #[arg(short, long, default_value = "speech.wav")]
    output: PathBuf,
}

#[tokio::main]
async fn main() -> Result<()> {
    env_logger::init();
    let args = Args::parse();

    let mut config = load_config().context("failed to load configuration")?;
    if let Some(host) = args.host {
        config.wyoming_host = host;
    }
    if let Some(port) = args.port {
        config.wyoming_port = port;
    }
    if let Some(timeout_ms) = args.timeout_ms {
        config.timeout_ms = timeout_ms;
    }

    let gateway = TtsGateway::new(config);
    let request = SpeakRequest {
        text: args.text,
        voice: args.voice,
    };

    let cancel = CancellationToken::new();
    let speech = tokio::select! {
        speech = gateway.speak_with_cancel(&request, cancel.clone()) => speech,
        _ = tokio::signal::ctrl_c() => {
            log::info!("Received Ctrl+C, aborting synthesis...");
            cancel.cancel();
            anyhow::bail!("synthesis aborted");
        }
    };

    let speech = match speech {
        Ok(speech) => speech,
        Err(e) => {
            let body = serde_json::to_string(&e.to_error_body())?;
            eprintln!("❌ {}", body);
            return Err(e).context("speech synthesis failed");
        }
    };

    tokio::fs::write(&args.output, &speech.bytes)
        .await
        .with_context(|| format!("failed to write {}", args.output.display()))?;

    println!(
        "✅ Wrote {} bytes ({}, {}) to {}",
        speech.bytes.len(),
        speech.content_type,
        speech.format,
        args.output.display()
    );
    Ok(())
}
