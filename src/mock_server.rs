//! Scriptable Wyoming synthesis server for tests and local development.
//!
//! Every accepted connection gets its `synthesize` command recorded and then
//! receives the configured [`Script`], optionally dribbled out in small writes.

use futures_util::StreamExt;
use log::{debug, info, warn};
use std::f32::consts::PI;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::io::AsyncWriteExt;
use tokio::net::tcp::{OwnedReadHalf, OwnedWriteHalf};
use tokio::net::{TcpListener, TcpStream};
use tokio::task::JoinHandle;
use tokio_util::codec::FramedRead;
use tokio_util::sync::CancellationToken;
use wyoming_protocol::{AudioFormat, Event, EventCodec, EventType};

/// One action of the scripted response
#[derive(Debug, Clone)]
pub enum Step {
    /// Raw bytes, written as-is
    Send(Vec<u8>),
    SendEvent(Event),
    Pause(Duration),
    /// Close the connection immediately
    Close,
    /// Keep the connection open without sending anything
    Hang,
}

#[derive(Debug, Clone, Default)]
pub struct Script {
    steps: Vec<Step>,
}

impl Script {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn send(mut self, bytes: impl Into<Vec<u8>>) -> Self {
        self.steps.push(Step::Send(bytes.into()));
        self
    }

    pub fn event(mut self, event: Event) -> Self {
        self.steps.push(Step::SendEvent(event));
        self
    }

    pub fn pause(mut self, duration: Duration) -> Self {
        self.steps.push(Step::Pause(duration));
        self
    }

    pub fn close(mut self) -> Self {
        self.steps.push(Step::Close);
        self
    }

    pub fn hang(mut self) -> Self {
        self.steps.push(Step::Hang);
        self
    }

    pub fn steps(&self) -> &[Step] {
        &self.steps
    }

    /// A typical exchange: audio-start, a 440Hz tone as 16-bit chunks, audio-stop
    pub fn tone(rate: u32, channels: u16, duration: Duration) -> Self {
        let format = AudioFormat::new(rate, 2, channels);
        let pcm = tone_pcm(rate, channels, duration);

        let mut script = Script::new()
            .event(Event::new(EventType::Info))
            .event(Event::audio_start(format));
        // ~1024 frames per chunk, like Piper
        let chunk_bytes = 1024 * 2 * usize::from(channels);
        for chunk in pcm.chunks(chunk_bytes) {
            script = script.event(Event::audio_chunk(Some(format), chunk.to_vec()));
        }
        script.event(Event::audio_stop())
    }
}

/// 16-bit little-endian 440Hz tone, same sample on every channel
pub fn tone_pcm(rate: u32, channels: u16, duration: Duration) -> Vec<u8> {
    let frames = (rate as f32 * duration.as_secs_f32()) as usize;
    let mut pcm = Vec::with_capacity(frames * 2 * usize::from(channels));
    for i in 0..frames {
        let t = i as f32 / rate as f32;
        let sample = ((2.0 * PI * 440.0 * t).sin() * i16::MAX as f32 * 0.3) as i16;
        for _ in 0..channels {
            pcm.extend_from_slice(&sample.to_le_bytes());
        }
    }
    pcm
}

/// Configuration for the mock Wyoming server
#[derive(Debug, Clone)]
pub struct MockServerConfig {
    /// Address to bind (use "127.0.0.1:0" for a random port)
    pub bind_address: String,
    pub script: Script,
    /// Split every write into pieces of this many bytes
    pub write_chunk_size: Option<usize>,
}

impl Default for MockServerConfig {
    fn default() -> Self {
        Self {
            bind_address: "127.0.0.1:0".to_string(),
            script: Script::tone(22050, 1, Duration::from_millis(250)),
            write_chunk_size: None,
        }
    }
}

#[derive(Debug, Default)]
struct ServerStats {
    requests: Mutex<Vec<Event>>,
    connections: AtomicUsize,
    client_disconnects: AtomicUsize,
}

pub struct MockWyomingServer;

impl MockWyomingServer {
    /// Bind and start accepting connections in the background
    pub async fn start(config: MockServerConfig) -> std::io::Result<MockServerHandle> {
        let listener = TcpListener::bind(&config.bind_address).await?;
        let port = listener.local_addr()?.port();
        info!("🎵 Mock Wyoming server listening on 127.0.0.1:{}", port);

        let stats = Arc::new(ServerStats::default());
        let shutdown = CancellationToken::new();
        let config = Arc::new(config);

        let task = tokio::spawn({
            let stats = Arc::clone(&stats);
            let shutdown = shutdown.clone();
            async move {
                loop {
                    let accepted = tokio::select! {
                        _ = shutdown.cancelled() => break,
                        accepted = listener.accept() => accepted,
                    };
                    match accepted {
                        Ok((stream, addr)) => {
                            let id = stats.connections.fetch_add(1, Ordering::SeqCst) + 1;
                            info!("📡 Client {} connected from {}", id, addr);
                            tokio::spawn(serve_connection(
                                stream,
                                Arc::clone(&config),
                                Arc::clone(&stats),
                                shutdown.clone(),
                            ));
                        }
                        Err(e) => warn!("⚠️ Accept failed: {}", e),
                    }
                }
                debug!("Mock server accept loop stopped");
            }
        });

        Ok(MockServerHandle {
            port,
            stats,
            shutdown,
            task: Some(task),
        })
    }
}

async fn serve_connection(
    stream: TcpStream,
    config: Arc<MockServerConfig>,
    stats: Arc<ServerStats>,
    shutdown: CancellationToken,
) {
    let (read_half, mut write_half) = stream.into_split();
    let mut reader = FramedRead::new(read_half, EventCodec::new());

    match reader.next().await {
        Some(Ok(event)) => {
            debug!("📥 Mock server received {} event", event.event_type);
            stats
                .requests
                .lock()
                .unwrap_or_else(|poisoned| poisoned.into_inner())
                .push(event);
        }
        Some(Err(e)) => {
            warn!("⚠️ Mock server could not read command: {}", e);
            return;
        }
        None => {
            stats.client_disconnects.fetch_add(1, Ordering::SeqCst);
            return;
        }
    }

    for step in config.script.steps() {
        let outcome = match step {
            Step::Send(bytes) => {
                write_bytes(&mut write_half, bytes, config.write_chunk_size).await
            }
            Step::SendEvent(event) => match event.to_bytes() {
                Ok(bytes) => write_bytes(&mut write_half, &bytes, config.write_chunk_size).await,
                Err(e) => {
                    warn!("⚠️ Could not serialize scripted event: {}", e);
                    continue;
                }
            },
            Step::Pause(duration) => {
                tokio::time::sleep(*duration).await;
                Ok(())
            }
            Step::Close => {
                debug!("Mock server closing connection");
                return;
            }
            Step::Hang => {
                wait_for_disconnect(&mut reader, &stats, &shutdown).await;
                return;
            }
        };

        if let Err(e) = outcome {
            debug!("Mock server write failed: {}", e);
            stats.client_disconnects.fetch_add(1, Ordering::SeqCst);
            return;
        }
    }

    // Give the client a chance to hang up first
    wait_for_disconnect(&mut reader, &stats, &shutdown).await;
}

async fn write_bytes(
    writer: &mut OwnedWriteHalf,
    bytes: &[u8],
    chunk_size: Option<usize>,
) -> std::io::Result<()> {
    match chunk_size {
        Some(size) if size > 0 => {
            for piece in bytes.chunks(size) {
                writer.write_all(piece).await?;
                writer.flush().await?;
                tokio::task::yield_now().await;
            }
            Ok(())
        }
        _ => {
            writer.write_all(bytes).await?;
            writer.flush().await
        }
    }
}

async fn wait_for_disconnect(
    reader: &mut FramedRead<OwnedReadHalf, EventCodec>,
    stats: &ServerStats,
    shutdown: &CancellationToken,
) {
    loop {
        tokio::select! {
            _ = shutdown.cancelled() => return,
            next = reader.next() => match next {
                Some(Ok(event)) => debug!("Ignoring extra {} event", event.event_type),
                Some(Err(_)) | None => {
                    debug!("Client disconnected");
                    stats.client_disconnects.fetch_add(1, Ordering::SeqCst);
                    return;
                }
            },
        }
    }
}

/// Running mock server; stops when dropped
pub struct MockServerHandle {
    pub port: u16,
    stats: Arc<ServerStats>,
    shutdown: CancellationToken,
    task: Option<JoinHandle<()>>,
}

impl MockServerHandle {
    pub fn address(&self) -> String {
        format!("127.0.0.1:{}", self.port)
    }

    /// Commands received so far, in arrival order
    pub fn requests(&self) -> Vec<Event> {
        self.stats
            .requests
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .clone()
    }

    pub fn connections(&self) -> usize {
        self.stats.connections.load(Ordering::SeqCst)
    }

    /// Connections the client side closed while the server was still listening
    pub fn client_disconnects(&self) -> usize {
        self.stats.client_disconnects.load(Ordering::SeqCst)
    }

    /// Run until the accept loop ends
    pub async fn wait(mut self) {
        if let Some(task) = self.task.take() {
            let _ = task.await;
        }
    }

    pub fn stop(&self) {
        self.shutdown.cancel();
    }
}

impl Drop for MockServerHandle {
    fn drop(&mut self) {
        self.shutdown.cancel();
    }
}
