//! Incremental framing of the Wyoming byte stream.
//!
//! Wire format of one event:
//! ```text
//! <utf-8 json header>\n<data_length bytes><payload_length bytes>
//! ```
//! The data region is skipped byte for byte; only inline header data and the
//! payload are surfaced.

use crate::protocol::{Event, EventHeader, ProtocolError, MAX_HEADER_BYTES};
use bytes::{Buf, BytesMut};
use log::trace;
use tokio_util::codec::{Decoder, Encoder};

/// Header parsed from the buffer while the rest of its event is still in flight
#[derive(Debug)]
struct PendingEvent {
    header: EventHeader,
    /// Header line length, newline excluded
    line_length: usize,
}

impl PendingEvent {
    fn total_length(&self) -> usize {
        self.line_length + 1 + self.header.data_length + self.header.payload_length
    }
}

/// Decoder/encoder for Wyoming events.
///
/// Feed arbitrarily sized reads into a `BytesMut` and call [`Decoder::decode`]
/// until it yields `None`; events come out whole and in arrival order.
#[derive(Debug, Default)]
pub struct EventCodec {
    pending: Option<PendingEvent>,
}

impl EventCodec {
    pub fn new() -> Self {
        Self::default()
    }
}

impl Decoder for EventCodec {
    type Item = Event;
    type Error = ProtocolError;

    fn decode(&mut self, src: &mut BytesMut) -> Result<Option<Event>, ProtocolError> {
        let pending = match self.pending.take() {
            Some(pending) => pending,
            None => {
                let window = src.len().min(MAX_HEADER_BYTES + 1);
                let Some(line_length) = src[..window].iter().position(|b| *b == b'\n') else {
                    if src.len() > MAX_HEADER_BYTES {
                        return Err(ProtocolError::HeaderTooLong {
                            limit: MAX_HEADER_BYTES,
                        });
                    }
                    return Ok(None);
                };
                let header = EventHeader::parse(&src[..line_length])?;
                PendingEvent {
                    header,
                    line_length,
                }
            }
        };

        let total = pending.total_length();
        if src.len() < total {
            src.reserve(total - src.len());
            self.pending = Some(pending);
            return Ok(None);
        }

        let PendingEvent {
            header,
            line_length,
        } = pending;

        src.advance(line_length + 1);
        if header.data_length > 0 {
            trace!("Skipping {} bytes of side data", header.data_length);
            src.advance(header.data_length);
        }
        let payload = src.split_to(header.payload_length).freeze();

        Ok(Some(Event {
            event_type: header.event_type,
            data: header.data,
            payload,
        }))
    }
}

impl Encoder<Event> for EventCodec {
    type Error = ProtocolError;

    fn encode(&mut self, event: Event, dst: &mut BytesMut) -> Result<(), ProtocolError> {
        dst.extend_from_slice(&event.to_bytes()?);
        Ok(())
    }
}
