pub mod config;
pub mod error;
pub mod gateway;
pub mod mock_server;
pub mod wav;

pub use config::{load_config, GatewayConfig};
pub use error::{GatewayError, Result};
pub use gateway::{SpeakRequest, SpeechAudio, TtsGateway};
