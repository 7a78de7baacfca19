use crate::protocol::{AudioFormat, Event, EventType};
use log::{debug, warn};
use thiserror::Error;

/// Failures of a single synthesis call
#[derive(Error, Debug)]
pub enum SessionError {
    #[error("Protocol error: {0}")]
    Protocol(#[from] crate::protocol::ProtocolError),

    #[error("No data received for {0:?}")]
    Timeout(std::time::Duration),

    #[error("Transport error: {0}")]
    Transport(#[source] std::io::Error),

    #[error("Connection closed before audio-stop was received")]
    PrematureClose,

    #[error("Protocol violation: {0}")]
    ProtocolViolation(String),

    #[error("Session cancelled")]
    Cancelled,
}

impl SessionError {
    /// Stable category name for error responses
    pub fn category(&self) -> &'static str {
        use crate::protocol::ProtocolError;

        match self {
            SessionError::Protocol(ProtocolError::MalformedHeader { .. }) => "malformed_header",
            SessionError::Protocol(ProtocolError::PayloadTooLarge { .. }) => "payload_too_large",
            SessionError::Protocol(ProtocolError::HeaderTooLong { .. }) => "malformed_header",
            SessionError::Protocol(ProtocolError::Io(_)) => "transport_error",
            SessionError::Protocol(ProtocolError::Json(_)) => "protocol_violation",
            SessionError::Timeout(_) => "timeout",
            SessionError::Transport(_) => "transport_error",
            SessionError::PrematureClose => "premature_close",
            SessionError::ProtocolViolation(_) => "protocol_violation",
            SessionError::Cancelled => "cancelled",
        }
    }
}

/// Audio produced by one completed synthesis call
#[derive(Debug, Clone, PartialEq)]
pub struct SynthesisResult {
    pub format: AudioFormat,
    /// Little-endian interleaved PCM, in arrival order
    pub audio: Vec<u8>,
    pub chunk_count: usize,
    /// Non-fatal oddities seen during the session
    pub warnings: Vec<String>,
}

/// Event-driven state of one synthesis exchange.
///
/// Holds no socket: the client feeds decoded events in arrival order and
/// stops as soon as [`SessionState::apply`] returns a result.
#[derive(Debug, Default)]
pub struct SessionState {
    format: Option<AudioFormat>,
    audio: Vec<u8>,
    chunk_count: usize,
    warnings: Vec<String>,
}

impl SessionState {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn format(&self) -> Option<AudioFormat> {
        self.format
    }

    pub fn audio_len(&self) -> usize {
        self.audio.len()
    }

    /// Apply one event. Returns the finished result on `audio-stop`.
    pub fn apply(&mut self, event: Event) -> Result<Option<SynthesisResult>, SessionError> {
        match event.event_type {
            EventType::Info => {
                debug!("Ignoring info event");
            }
            EventType::AudioStart => {
                if let Some(format) = AudioFormat::from_data(&event.data) {
                    debug!("audio-start: {}", format);
                    self.format = Some(format);
                }
            }
            EventType::AudioChunk => {
                if let Some(format) = AudioFormat::from_data(&event.data) {
                    if self.format != Some(format) {
                        debug!("audio-chunk sets format: {}", format);
                    }
                    self.format = Some(format);
                } else if self.format.is_none() {
                    let message = format!(
                        "audio-chunk arrived before any format; assuming {}",
                        AudioFormat::FALLBACK
                    );
                    warn!("{}", message);
                    self.warnings.push(message);
                    self.format = Some(AudioFormat::FALLBACK);
                }

                self.chunk_count += 1;
                self.audio.extend_from_slice(&event.payload);
                debug!(
                    "audio-chunk {}: {} bytes ({} total)",
                    self.chunk_count,
                    event.payload.len(),
                    self.audio.len()
                );
            }
            EventType::AudioStop => {
                let Some(format) = self.format else {
                    return Err(SessionError::ProtocolViolation(
                        "audio-stop received before any audio format was established"
                            .to_string(),
                    ));
                };
                return Ok(Some(SynthesisResult {
                    format,
                    audio: std::mem::take(&mut self.audio),
                    chunk_count: self.chunk_count,
                    warnings: std::mem::take(&mut self.warnings),
                }));
            }
            EventType::Synthesize | EventType::Other(_) => {
                debug!("Ignoring {} event", event.event_type);
            }
        }
        Ok(None)
    }
}
