use crate::config::GatewayConfig;
use crate::error::{GatewayError, Result};
use crate::wav;
use log::{debug, info};
use serde::Deserialize;
use tokio_util::sync::CancellationToken;
use wyoming_protocol::{AudioFormat, WyomingClient};

/// Body of a speak request: `{"text": "...", "voice": "..."}`
#[derive(Debug, Clone, Deserialize, PartialEq)]
pub struct SpeakRequest {
    pub text: String,
    #[serde(default)]
    pub voice: Option<String>,
}

impl SpeakRequest {
    pub fn new(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            voice: None,
        }
    }

    pub fn with_voice(mut self, voice: impl Into<String>) -> Self {
        self.voice = Some(voice.into());
        self
    }
}

/// Encoded speech ready to hand back to the caller
#[derive(Debug, Clone)]
pub struct SpeechAudio {
    pub bytes: Vec<u8>,
    pub content_type: &'static str,
    pub format: AudioFormat,
}

/// Text in, WAV out
pub struct TtsGateway {
    config: GatewayConfig,
    client: WyomingClient,
}

impl TtsGateway {
    pub fn new(config: GatewayConfig) -> Self {
        let client = WyomingClient::new(config.client_config());
        Self { config, client }
    }

    pub fn config(&self) -> &GatewayConfig {
        &self.config
    }

    /// Check a request and resolve the voice to use
    pub fn validate<'a>(&'a self, request: &'a SpeakRequest) -> Result<(&'a str, &'a str)> {
        let text = request.text.trim();
        if text.is_empty() {
            return Err(GatewayError::InvalidRequest(
                "text must not be empty".to_string(),
            ));
        }

        let length = text.chars().count();
        if length > self.config.max_text_length {
            return Err(GatewayError::InvalidRequest(format!(
                "text is {} characters, maximum is {}",
                length, self.config.max_text_length
            )));
        }

        let voice = request
            .voice
            .as_deref()
            .map(str::trim)
            .filter(|v| !v.is_empty())
            .unwrap_or(self.config.default_voice.as_str());

        Ok((text, voice))
    }

    pub async fn speak(&self, request: &SpeakRequest) -> Result<SpeechAudio> {
        self.speak_with_cancel(request, CancellationToken::new())
            .await
    }

    /// Synthesize and encode; `cancel` aborts the upstream session
    pub async fn speak_with_cancel(
        &self,
        request: &SpeakRequest,
        cancel: CancellationToken,
    ) -> Result<SpeechAudio> {
        let (text, voice) = self.validate(request)?;
        debug!("Speak request accepted: {} chars, voice {}", text.len(), voice);

        let result = self
            .client
            .synthesize_with_cancel(text, Some(voice), cancel)
            .await?;

        let bytes = wav::encode_wav(&result.audio, &result.format)?;
        info!(
            "🎵 Encoded {} bytes of WAV ({} bytes of PCM)",
            bytes.len(),
            result.audio.len()
        );

        Ok(SpeechAudio {
            bytes,
            content_type: wav::CONTENT_TYPE,
            format: result.format,
        })
    }
}
