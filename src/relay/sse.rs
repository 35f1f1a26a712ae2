use std::convert::Infallible;

use axum::http::header::CONNECTION;
use axum::http::{HeaderName, HeaderValue};
use axum::response::sse::{Event, Sse};
use axum::response::{IntoResponse, Response};
use futures::StreamExt;
use tokio::sync::mpsc;
use tokio_stream::wrappers::ReceiverStream;

use crate::relay::envelope::Envelope;

const X_ACCEL_BUFFERING: HeaderName = HeaderName::from_static("x-accel-buffering");

#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum SseError {
    /// The client dropped the response body.
    #[error("transport closed by peer")]
    TransportClosed,

    /// The writer was closed or has already sent a terminal envelope.
    #[error("stream already closed")]
    Closed,
}

/// Writable half of one turn's event stream.
///
/// The readable half is the body of the response returned by [`SseWriter::open`].
#[derive(Debug)]
pub struct SseWriter {
    tx: Option<mpsc::Sender<Event>>,
    terminated: bool,
}

impl SseWriter {
    /// Allocates the channel and builds the `Sse` response around its
    /// receiving end. Headers are fixed here, before any byte is written.
    pub fn open(capacity: usize) -> (Self, Response) {
        let (tx, rx) = mpsc::channel::<Event>(capacity.max(1));
        let stream = ReceiverStream::new(rx).map(Ok::<_, Infallible>);

        // Sse itself sets `Content-Type: text/event-stream` and `Cache-Control: no-cache`.
        let response = (
            [
                (CONNECTION, HeaderValue::from_static("keep-alive")),
                (X_ACCEL_BUFFERING, HeaderValue::from_static("no")),
            ],
            Sse::new(stream),
        )
            .into_response();

        (
            Self {
                tx: Some(tx),
                terminated: false,
            },
            response,
        )
    }

    /// Writes one envelope. Waits only for channel capacity; a dropped body
    /// fails immediately with `TransportClosed`.
    pub async fn write(&mut self, envelope: &Envelope) -> Result<(), SseError> {
        if self.terminated {
            return Err(SseError::Closed);
        }
        let tx = self.tx.as_ref().ok_or(SseError::Closed)?;

        let event = match envelope.to_event() {
            Ok(event) => event,
            Err(e) => {
                log::warn!("Dropping envelope that failed to serialize: {}", e);
                return Ok(());
            }
        };

        if tx.send(event).await.is_err() {
            self.tx = None;
            return Err(SseError::TransportClosed);
        }

        if envelope.is_terminal() {
            self.terminated = true;
        }
        Ok(())
    }

    /// Resolves once the client has dropped the body, or immediately if the
    /// writable half is already gone.
    pub async fn closed(&self) {
        if let Some(tx) = &self.tx {
            tx.closed().await;
        }
    }

    /// Releases the writable half. Safe to call any number of times.
    pub fn close(&mut self) {
        self.tx.take();
    }
}
