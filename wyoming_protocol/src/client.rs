use crate::codec::EventCodec;
use crate::protocol::Event;
use crate::session::{SessionError, SessionState, SynthesisResult};
use bytes::BytesMut;
use log::{debug, error, info, trace};
use std::time::Duration;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpStream;
use tokio::time::timeout;
use tokio_util::codec::Decoder;
use tokio_util::sync::CancellationToken;

/// Default Wyoming port used by Piper and friends
pub const DEFAULT_PORT: u16 = 10200;

const READ_BUFFER_SIZE: usize = 8 * 1024;

/// Connection settings for a synthesis engine
#[derive(Debug, Clone)]
pub struct ClientConfig {
    pub host: String,
    pub port: u16,
    /// Inactivity window; reset whenever bytes arrive
    pub idle_timeout: Duration,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            host: "localhost".to_string(),
            port: DEFAULT_PORT,
            idle_timeout: Duration::from_secs(30),
        }
    }
}

/// Wyoming text-to-speech client.
///
/// Every call opens its own connection and drops it when the call finishes,
/// whatever the outcome.
#[derive(Debug, Clone)]
pub struct WyomingClient {
    config: ClientConfig,
}

impl WyomingClient {
    pub fn new(config: ClientConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &ClientConfig {
        &self.config
    }

    /// Synthesize `text`, optionally with a named voice
    pub async fn synthesize(
        &self,
        text: &str,
        voice: Option<&str>,
    ) -> Result<SynthesisResult, SessionError> {
        self.synthesize_with_cancel(text, voice, CancellationToken::new())
            .await
    }

    /// Like [`WyomingClient::synthesize`], aborting early when `cancel` fires
    pub async fn synthesize_with_cancel(
        &self,
        text: &str,
        voice: Option<&str>,
        cancel: CancellationToken,
    ) -> Result<SynthesisResult, SessionError> {
        let address = format!("{}:{}", self.config.host, self.config.port);
        info!(
            "🔊 Synthesizing {} chars via {} (voice: {})",
            text.chars().count(),
            address,
            voice.unwrap_or("default")
        );

        let result = tokio::select! {
            _ = cancel.cancelled() => Err(SessionError::Cancelled),
            result = self.run_session(&address, text, voice) => result,
        };

        match &result {
            Ok(done) => info!(
                "✅ Synthesis finished: {} bytes in {} chunks ({})",
                done.audio.len(),
                done.chunk_count,
                done.format
            ),
            Err(SessionError::Cancelled) => info!("🛑 Synthesis cancelled"),
            Err(e) => error!("❌ Synthesis via {} failed: {}", address, e),
        }
        result
    }

    async fn run_session(
        &self,
        address: &str,
        text: &str,
        voice: Option<&str>,
    ) -> Result<SynthesisResult, SessionError> {
        let idle = self.config.idle_timeout;

        let mut stream = timeout(idle, TcpStream::connect(address))
            .await
            .map_err(|_| SessionError::Timeout(idle))?
            .map_err(SessionError::Transport)?;
        debug!("📡 Connected to {}", address);

        let command = Event::synthesize(text, voice).to_bytes()?;
        timeout(idle, stream.write_all(&command))
            .await
            .map_err(|_| SessionError::Timeout(idle))?
            .map_err(SessionError::Transport)?;
        debug!("📤 Sent synthesize command ({} bytes)", command.len());

        let mut codec = EventCodec::new();
        let mut state = SessionState::new();
        let mut buffer = BytesMut::with_capacity(READ_BUFFER_SIZE);

        loop {
            while let Some(event) = codec.decode(&mut buffer)? {
                if let Some(result) = state.apply(event)? {
                    // Best effort; the socket is dropped either way
                    let _ = stream.shutdown().await;
                    return Ok(result);
                }
            }

            buffer.reserve(READ_BUFFER_SIZE);
            let read = timeout(idle, stream.read_buf(&mut buffer))
                .await
                .map_err(|_| SessionError::Timeout(idle))?
                .map_err(SessionError::Transport)?;

            if read == 0 {
                debug!(
                    "Connection closed with {} audio bytes and {} buffered bytes",
                    state.audio_len(),
                    buffer.len()
                );
                return Err(SessionError::PrematureClose);
            }
            trace!("📥 Read {} bytes", read);
        }
    }
}
