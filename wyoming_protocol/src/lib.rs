//! # Wyoming Protocol
//!
//! Event framing and a text-to-speech client for engines speaking the
//! Wyoming protocol (Piper and compatible servers).
//!
//! This crate provides:
//! - Event definitions and serialization
//! - An incremental codec that turns a byte stream into whole events
//! - A per-call synthesis client with idle timeout and cancellation
//!
//! ## Example Usage
//!
//! ```rust,no_run
//! use wyoming_protocol::{ClientConfig, WyomingClient};
//!
//! # async fn run() -> Result<(), Box<dyn std::error::Error>> {
//! let client = WyomingClient::new(ClientConfig {
//!     host: "127.0.0.1".to_string(),
//!     ..Default::default()
//! });
//!
//! let result = client.synthesize("Hello there", Some("en_US-lessac-medium")).await?;
//! println!("Received {} bytes of {}", result.audio.len(), result.format);
//! # Ok(())
//! # }
//! ```

pub mod client;
pub mod codec;
pub mod protocol;
pub mod session;

// Re-export commonly used types
pub use client::{ClientConfig, WyomingClient, DEFAULT_PORT};
pub use codec::EventCodec;
pub use protocol::{AudioFormat, Event, EventType, ProtocolError};
pub use session::{SessionError, SessionState, SynthesisResult};
