use bytes::Bytes;
use serde_json::{Map, Value};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

/// Upper bound for a single declared data or payload region (16MB)
pub const MAX_REGION_BYTES: usize = 16 * 1024 * 1024;

/// Upper bound for one JSON header line, newline excluded (1MB)
pub const MAX_HEADER_BYTES: usize = 1024 * 1024;

#[derive(Error, Debug)]
pub enum ProtocolError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Malformed event header: {reason} (raw: {raw:?})")]
    MalformedHeader { raw: String, reason: String },

    #[error("Event header exceeds {limit} bytes without a newline")]
    HeaderTooLong { limit: usize },

    #[error("Declared {field} of {declared} bytes exceeds limit of {limit} bytes")]
    PayloadTooLarge {
        field: &'static str,
        declared: u64,
        limit: usize,
    },

    #[error("JSON serialization error: {0}")]
    Json(#[from] serde_json::Error),
}

/// Event type tags understood by this client.
///
/// Unknown tags survive as [`EventType::Other`] so callers can log and skip them.
#[derive(Debug, Clone, PartialEq, Eq, strum::EnumString)]
#[strum(serialize_all = "kebab-case")]
pub enum EventType {
    Info,
    Synthesize,
    AudioStart,
    AudioChunk,
    AudioStop,
    #[strum(default)]
    Other(String),
}

impl EventType {
    pub fn as_str(&self) -> &str {
        match self {
            EventType::Info => "info",
            EventType::Synthesize => "synthesize",
            EventType::AudioStart => "audio-start",
            EventType::AudioChunk => "audio-chunk",
            EventType::AudioStop => "audio-stop",
            EventType::Other(tag) => tag,
        }
    }

    pub fn parse(tag: &str) -> Self {
        EventType::from_str(tag).unwrap_or_else(|_| EventType::Other(tag.to_string()))
    }
}

impl fmt::Display for EventType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// PCM layout negotiated by `audio-start` / `audio-chunk`
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AudioFormat {
    /// Samples per second
    pub rate: u32,
    /// Bytes per sample
    pub width: u16,
    pub channels: u16,
}

impl AudioFormat {
    /// Used when audio arrives before any format was announced
    pub const FALLBACK: AudioFormat = AudioFormat {
        rate: 22050,
        width: 2,
        channels: 1,
    };

    pub fn new(rate: u32, width: u16, channels: u16) -> Self {
        Self {
            rate,
            width,
            channels,
        }
    }

    /// Extract a complete format from inline event data.
    ///
    /// Returns `None` unless `rate`, `width` and `channels` are all present
    /// as positive whole numbers that fit their field types.
    pub fn from_data(data: &Map<String, Value>) -> Option<Self> {
        let rate = u32::try_from(positive_integer(data.get("rate")?)?).ok()?;
        let width = u16::try_from(positive_integer(data.get("width")?)?).ok()?;
        let channels = u16::try_from(positive_integer(data.get("channels")?)?).ok()?;
        Some(Self::new(rate, width, channels))
    }

    /// Bytes per second of interleaved audio, `None` if it overflows `u32`
    pub fn byte_rate(&self) -> Option<u32> {
        self.rate
            .checked_mul(u32::from(self.channels))?
            .checked_mul(u32::from(self.width))
    }

    /// Bytes per interleaved frame, `None` if it overflows `u16`
    pub fn block_align(&self) -> Option<u16> {
        self.channels.checked_mul(self.width)
    }

    pub fn bits_per_sample(&self) -> Option<u16> {
        self.width.checked_mul(8)
    }

    /// Inline data fields as sent on the wire
    pub fn to_data(&self) -> Map<String, Value> {
        let mut data = Map::new();
        data.insert("rate".to_string(), Value::from(self.rate));
        data.insert("width".to_string(), Value::from(self.width));
        data.insert("channels".to_string(), Value::from(self.channels));
        data
    }
}

impl fmt::Display for AudioFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}Hz, {} bytes/sample, {} channel(s)",
            self.rate, self.width, self.channels
        )
    }
}

/// Non-negative whole number, integer or float encoded. Huge floats saturate.
fn whole_number(value: &Value) -> Option<u64> {
    if let Some(n) = value.as_u64() {
        return Some(n);
    }
    let f = value.as_f64()?;
    if !f.is_finite() || f.fract() != 0.0 || f < 0.0 {
        return None;
    }
    Some(f as u64)
}

fn positive_integer(value: &Value) -> Option<u64> {
    whole_number(value).filter(|n| *n > 0)
}

/// One decoded unit of the Wyoming stream
#[derive(Debug, Clone, PartialEq)]
pub struct Event {
    pub event_type: EventType,
    /// Inline JSON data from the header line
    pub data: Map<String, Value>,
    /// Raw payload bytes, exactly `payload_length` long
    pub payload: Bytes,
}

impl Event {
    pub fn new(event_type: EventType) -> Self {
        Self {
            event_type,
            data: Map::new(),
            payload: Bytes::new(),
        }
    }

    pub fn with_data(mut self, data: Map<String, Value>) -> Self {
        self.data = data;
        self
    }

    pub fn with_payload(mut self, payload: impl Into<Bytes>) -> Self {
        self.payload = payload.into();
        self
    }

    /// Build the `synthesize` command sent at the start of a session
    pub fn synthesize(text: &str, voice: Option<&str>) -> Self {
        let mut data = Map::new();
        data.insert("text".to_string(), Value::from(text));
        if let Some(name) = voice {
            data.insert("voice".to_string(), serde_json::json!({ "name": name }));
        }
        Event::new(EventType::Synthesize).with_data(data)
    }

    pub fn audio_start(format: AudioFormat) -> Self {
        Event::new(EventType::AudioStart).with_data(format.to_data())
    }

    pub fn audio_chunk(format: Option<AudioFormat>, samples: impl Into<Bytes>) -> Self {
        let data = format.map(|f| f.to_data()).unwrap_or_default();
        Event::new(EventType::AudioChunk)
            .with_data(data)
            .with_payload(samples)
    }

    pub fn audio_stop() -> Self {
        Event::new(EventType::AudioStop)
    }

    /// Serialize to `<json header>\n<payload>`
    pub fn to_bytes(&self) -> Result<Vec<u8>, ProtocolError> {
        let mut header = Map::new();
        header.insert(
            "type".to_string(),
            Value::from(self.event_type.as_str()),
        );
        header.insert("data".to_string(), Value::Object(self.data.clone()));
        if !self.payload.is_empty() {
            header.insert(
                "payload_length".to_string(),
                Value::from(self.payload.len()),
            );
        }

        let mut bytes = serde_json::to_vec(&Value::Object(header))?;
        bytes.push(b'\n');
        bytes.extend_from_slice(&self.payload);
        Ok(bytes)
    }
}

/// Parsed header line of an event
#[derive(Debug, Clone, PartialEq)]
pub(crate) struct EventHeader {
    pub event_type: EventType,
    pub data: Map<String, Value>,
    pub data_length: usize,
    pub payload_length: usize,
}

impl EventHeader {
    pub(crate) fn parse(line: &[u8]) -> Result<Self, ProtocolError> {
        let malformed = |reason: String| ProtocolError::MalformedHeader {
            raw: String::from_utf8_lossy(line).into_owned(),
            reason,
        };

        let text = std::str::from_utf8(line).map_err(|e| malformed(e.to_string()))?;
        let value: Value = serde_json::from_str(text).map_err(|e| malformed(e.to_string()))?;
        let Value::Object(mut header) = value else {
            return Err(malformed("header is not a JSON object".to_string()));
        };

        let event_type = match header.get("type") {
            Some(Value::String(tag)) => EventType::parse(tag),
            _ => return Err(malformed("missing string field 'type'".to_string())),
        };

        let data = match header.remove("data") {
            None | Some(Value::Null) => Map::new(),
            Some(Value::Object(data)) => data,
            Some(_) => return Err(malformed("field 'data' is not an object".to_string())),
        };

        Ok(Self {
            event_type,
            data,
            data_length: region_length(&header, "data_length")?,
            payload_length: region_length(&header, "payload_length")?,
        })
    }
}

fn region_length(header: &Map<String, Value>, field: &'static str) -> Result<usize, ProtocolError> {
    let declared = header.get(field).and_then(whole_number).unwrap_or(0);
    match usize::try_from(declared) {
        Ok(length) if length <= MAX_REGION_BYTES => Ok(length),
        _ => Err(ProtocolError::PayloadTooLarge {
            field,
            declared,
            limit: MAX_REGION_BYTES,
        }),
    }
}
