//! PCM to WAV container encoding.
//!
//! Produces the canonical 44-byte RIFF/WAVE header followed by the samples and
//! a short tail of silence so players do not clip the last syllable.

use thiserror::Error;
use wyoming_protocol::AudioFormat;

pub const WAV_HEADER_SIZE: usize = 44;

/// Silence appended after the synthesized audio
pub const TRAILING_SILENCE_MS: u32 = 200;

pub const CONTENT_TYPE: &str = "audio/wav";

const PCM_FORMAT_TAG: u16 = 1;

#[derive(Error, Debug)]
pub enum WavError {
    #[error("Audio too large for a WAV container: {0} bytes")]
    TooLarge(usize),

    #[error("Format cannot be represented in a WAV header: {0}")]
    UnrepresentableFormat(AudioFormat),
}

/// `fmt ` fields derived from the format: byte rate, block align, bits per sample
struct DerivedFields {
    byte_rate: u32,
    block_align: u16,
    bits_per_sample: u16,
}

impl DerivedFields {
    fn for_format(format: &AudioFormat) -> Result<Self, WavError> {
        match (
            format.byte_rate(),
            format.block_align(),
            format.bits_per_sample(),
        ) {
            (Some(byte_rate), Some(block_align), Some(bits_per_sample)) => Ok(Self {
                byte_rate,
                block_align,
                bits_per_sample,
            }),
            _ => Err(WavError::UnrepresentableFormat(*format)),
        }
    }
}

/// Number of zero bytes making up the trailing silence for `format`
pub fn silence_len(format: &AudioFormat) -> Result<usize, WavError> {
    let fields = DerivedFields::for_format(format)?;
    Ok(silence_for_byte_rate(fields.byte_rate))
}

fn silence_for_byte_rate(byte_rate: u32) -> usize {
    (u64::from(byte_rate) * u64::from(TRAILING_SILENCE_MS) / 1000) as usize
}

/// Wrap raw little-endian interleaved PCM into a WAV file.
///
/// The output is always `WAV_HEADER_SIZE + pcm.len() + silence_len(format)` bytes.
/// Formats whose derived header fields overflow are rejected before anything
/// is allocated.
pub fn encode_wav(pcm: &[u8], format: &AudioFormat) -> Result<Vec<u8>, WavError> {
    let fields = DerivedFields::for_format(format)?;
    let audio_len = pcm.len() + silence_for_byte_rate(fields.byte_rate);
    let data_size = u32::try_from(audio_len)
        .ok()
        .filter(|size| size.checked_add(36).is_some())
        .ok_or(WavError::TooLarge(audio_len))?;

    let mut wav = Vec::with_capacity(WAV_HEADER_SIZE + audio_len);

    // RIFF chunk
    wav.extend_from_slice(b"RIFF");
    wav.extend_from_slice(&(36 + data_size).to_le_bytes());
    wav.extend_from_slice(b"WAVE");

    // fmt subchunk
    wav.extend_from_slice(b"fmt ");
    wav.extend_from_slice(&16u32.to_le_bytes());
    wav.extend_from_slice(&PCM_FORMAT_TAG.to_le_bytes());
    wav.extend_from_slice(&format.channels.to_le_bytes());
    wav.extend_from_slice(&format.rate.to_le_bytes());
    wav.extend_from_slice(&fields.byte_rate.to_le_bytes());
    wav.extend_from_slice(&fields.block_align.to_le_bytes());
    wav.extend_from_slice(&fields.bits_per_sample.to_le_bytes());

    // data subchunk
    wav.extend_from_slice(b"data");
    wav.extend_from_slice(&data_size.to_le_bytes());
    wav.extend_from_slice(pcm);
    wav.resize(WAV_HEADER_SIZE + audio_len, 0);

    Ok(wav)
}
