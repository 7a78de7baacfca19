//! End-to-end synthesis sessions against the mock Wyoming server over real TCP.

use std::time::{Duration, Instant};
use tokio_util::sync::CancellationToken;
use wyoming_protocol::{
    AudioFormat, ClientConfig, Event, ProtocolError, SessionError, WyomingClient,
};
use wyoming_tts::mock_server::{
    tone_pcm, MockServerConfig, MockServerHandle, MockWyomingServer, Script,
};

async fn start_server(script: Script, write_chunk_size: Option<usize>) -> MockServerHandle {
    MockWyomingServer::start(MockServerConfig {
        script,
        write_chunk_size,
        ..Default::default()
    })
    .await
    .expect("Failed to start mock server")
}

fn client_for(server: &MockServerHandle, idle_timeout: Duration) -> WyomingClient {
    WyomingClient::new(ClientConfig {
        host: "127.0.0.1".to_string(),
        port: server.port,
        idle_timeout,
    })
}

/// Poll until the server notices the client went away
async fn wait_for_disconnects(server: &MockServerHandle, expected: usize) -> bool {
    for _ in 0..100 {
        if server.client_disconnects() >= expected {
            return true;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    false
}

#[test_log::test(tokio::test)]
async fn test_start_chunk_stop() {
    let format = AudioFormat::new(22050, 2, 1);
    let server = start_server(
        Script::new()
            .event(Event::audio_start(format))
            .event(Event::audio_chunk(None, vec![3u8; 4410]))
            .event(Event::audio_stop()),
        None,
    )
    .await;

    let client = client_for(&server, Duration::from_secs(5));
    let result = client
        .synthesize("Dinner is ready", Some("en_US-lessac-medium"))
        .await
        .expect("synthesis failed");

    assert_eq!(result.format, format);
    assert_eq!(result.audio.len(), 4410);
    assert_eq!(result.chunk_count, 1);
    assert!(result.warnings.is_empty());

    let requests = server.requests();
    assert_eq!(requests.len(), 1);
    assert_eq!(requests[0].event_type.as_str(), "synthesize");
    assert_eq!(requests[0].data["text"], "Dinner is ready");
    assert_eq!(requests[0].data["voice"]["name"], "en_US-lessac-medium");

    assert!(wait_for_disconnects(&server, 1).await);
}

#[test_log::test(tokio::test)]
async fn test_chunk_without_format_uses_fallback() {
    let server = start_server(
        Script::new()
            .event(Event::audio_chunk(None, vec![1u8; 100]))
            .event(Event::audio_stop()),
        None,
    )
    .await;

    let client = client_for(&server, Duration::from_secs(5));
    let result = client.synthesize("hi", None).await.unwrap();

    assert_eq!(result.format, AudioFormat::new(22050, 2, 1));
    assert_eq!(result.audio, vec![1u8; 100]);
    assert_eq!(result.warnings.len(), 1);
    assert!(!server.requests()[0].data.contains_key("voice"));
}

#[test_log::test(tokio::test)]
async fn test_one_byte_writes() {
    let script = Script::tone(16000, 1, Duration::from_millis(100));
    let server = start_server(script, Some(1)).await;

    let client = client_for(&server, Duration::from_secs(5));
    let result = client.synthesize("slowly", None).await.unwrap();

    assert_eq!(result.format, AudioFormat::new(16000, 2, 1));
    assert_eq!(result.audio, tone_pcm(16000, 1, Duration::from_millis(100)));
}

#[test_log::test(tokio::test)]
async fn test_side_data_is_skipped() {
    let mut raw = Vec::new();
    raw.extend_from_slice(
        b"{\"type\":\"audio-start\",\"data\":{\"rate\":8000,\"width\":1,\"channels\":1}}\n",
    );
    raw.extend_from_slice(b"{\"type\":\"audio-chunk\",\"data_length\":6,\"payload_length\":3}\n");
    raw.extend_from_slice(b"abcdef");
    raw.extend_from_slice(&[10, 20, 30]);
    raw.extend_from_slice(b"{\"type\":\"audio-stop\"}\n");

    let server = start_server(Script::new().send(raw), Some(5)).await;
    let client = client_for(&server, Duration::from_secs(5));
    let result = client.synthesize("side data", None).await.unwrap();

    assert_eq!(result.format, AudioFormat::new(8000, 1, 1));
    assert_eq!(result.audio, vec![10, 20, 30]);
}

#[test_log::test(tokio::test)]
async fn test_unknown_events_are_ignored() {
    let format = AudioFormat::new(22050, 2, 1);
    let server = start_server(
        Script::new()
            .send(
                b"{\"type\":\"voice-started\",\"data\":{\"x\":1},\"payload_length\":2}\nzz".to_vec(),
            )
            .event(Event::audio_start(format))
            .event(Event::audio_chunk(None, vec![5u8; 8]))
            .event(Event::audio_stop()),
        None,
    )
    .await;

    let client = client_for(&server, Duration::from_secs(5));
    let result = client.synthesize("hi", None).await.unwrap();
    assert_eq!(result.audio, vec![5u8; 8]);
}

#[test_log::test(tokio::test)]
async fn test_idle_timeout() {
    let server = start_server(Script::new().hang(), None).await;
    let client = client_for(&server, Duration::from_millis(200));

    let start = Instant::now();
    let err = client.synthesize("anyone there?", None).await.unwrap_err();
    let elapsed = start.elapsed();

    assert!(matches!(err, SessionError::Timeout(_)), "got {:?}", err);
    assert_eq!(err.category(), "timeout");
    assert!(elapsed >= Duration::from_millis(200));
    assert!(elapsed < Duration::from_secs(3));

    // The socket must be released on timeout
    assert!(wait_for_disconnects(&server, 1).await);
}

#[test_log::test(tokio::test)]
async fn test_timeout_is_inactivity_based() {
    let format = AudioFormat::new(16000, 2, 1);
    let mut script = Script::new().event(Event::audio_start(format));
    for _ in 0..4 {
        script = script
            .pause(Duration::from_millis(150))
            .event(Event::audio_chunk(None, vec![0u8; 320]));
    }
    let server = start_server(script.event(Event::audio_stop()), None).await;

    // Total duration exceeds the idle window, but no single gap does
    let client = client_for(&server, Duration::from_millis(400));
    let result = client.synthesize("steady", None).await.unwrap();
    assert_eq!(result.audio.len(), 1280);
    assert_eq!(result.chunk_count, 4);
}

#[test_log::test(tokio::test)]
async fn test_close_before_stop() {
    let server = start_server(
        Script::new()
            .event(Event::audio_start(AudioFormat::new(22050, 2, 1)))
            .close(),
        None,
    )
    .await;

    let client = client_for(&server, Duration::from_secs(5));
    let err = client.synthesize("cut short", None).await.unwrap_err();
    assert!(matches!(err, SessionError::PrematureClose), "got {:?}", err);
}

#[test_log::test(tokio::test)]
async fn test_malformed_header() {
    let server = start_server(
        Script::new()
            .send(b"{this is not json}\n".to_vec())
            .event(Event::audio_stop()),
        None,
    )
    .await;

    let client = client_for(&server, Duration::from_secs(5));
    let err = client.synthesize("garbage", None).await.unwrap_err();
    match &err {
        SessionError::Protocol(ProtocolError::MalformedHeader { raw, .. }) => {
            assert_eq!(raw, "{this is not json}")
        }
        other => panic!("expected MalformedHeader, got {:?}", other),
    }
    assert_eq!(err.category(), "malformed_header");
}

#[test_log::test(tokio::test)]
async fn test_stop_without_format() {
    let server = start_server(Script::new().event(Event::audio_stop()), None).await;

    let client = client_for(&server, Duration::from_secs(5));
    let err = client.synthesize("nothing", None).await.unwrap_err();
    assert!(matches!(err, SessionError::ProtocolViolation(_)), "got {:?}", err);
}

#[test_log::test(tokio::test)]
async fn test_connection_refused() {
    // Grab a free port, then release it so nothing listens there
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let port = listener.local_addr().unwrap().port();
    drop(listener);

    let client = WyomingClient::new(ClientConfig {
        host: "127.0.0.1".to_string(),
        port,
        idle_timeout: Duration::from_secs(2),
    });
    let err = client.synthesize("hello", None).await.unwrap_err();
    assert!(matches!(err, SessionError::Transport(_)), "got {:?}", err);
    assert_eq!(err.category(), "transport_error");
}

#[test_log::test(tokio::test)]
async fn test_cancellation_releases_socket() {
    let server = start_server(Script::new().hang(), None).await;
    let client = client_for(&server, Duration::from_secs(30));

    let cancel = CancellationToken::new();
    let trigger = cancel.clone();
    tokio::spawn(async move {
        tokio::time::sleep(Duration::from_millis(100)).await;
        trigger.cancel();
    });

    let start = Instant::now();
    let err = client
        .synthesize_with_cancel("never mind", None, cancel)
        .await
        .unwrap_err();

    assert!(matches!(err, SessionError::Cancelled), "got {:?}", err);
    assert!(start.elapsed() < Duration::from_secs(5));
    assert!(wait_for_disconnects(&server, 1).await);
}

#[test_log::test(tokio::test)]
async fn test_each_call_uses_its_own_connection() {
    let server = start_server(Script::tone(22050, 1, Duration::from_millis(50)), None).await;
    let client = client_for(&server, Duration::from_secs(5));

    for text in ["one", "two", "three"] {
        client.synthesize(text, None).await.unwrap();
    }

    assert_eq!(server.connections(), 3);
    let texts: Vec<_> = server
        .requests()
        .iter()
        .map(|r| r.data["text"].as_str().unwrap_or_default().to_string())
        .collect();
    assert_eq!(texts, vec!["one", "two", "three"]);
}

/// Talks to a real engine configured through WYOMING_HOST / WYOMING_PORT
#[cfg(feature = "test-integration")]
#[test_log::test(tokio::test)]
async fn test_live_engine() {
    let config = wyoming_tts::load_config().expect("invalid configuration");
    let client = WyomingClient::new(config.client_config());

    let result = client
        .synthesize("This is a test.", Some(&config.default_voice))
        .await
        .expect("live synthesis failed");
    assert!(!result.audio.is_empty());
    let block_align = result.format.block_align().expect("format fits a WAV header");
    assert_eq!(result.audio.len() % usize::from(block_align), 0);
}
