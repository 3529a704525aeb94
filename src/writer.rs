//! Dedicated writer task for outgoing frames.
//!
//! The WebSocket write half is owned by a single task that receives frames
//! through an mpsc channel. Each frame carries a one-shot confirmation, so
//! a sender learns whether *its* frame reached the socket rather than just
//! the queue.
//!
//! # Architecture
//!
//! ```text
//! Uploader ─► WriterHandle ─► mpsc::Sender<OutboundFrame> ─► Writer Task ─► WebSocket
//!                  ▲                                              │
//!                  └────────────── oneshot confirmation ◄─────────┘
//! ```
//!
//! Frames leave in the order they were queued. Dropping every handle
//! closes the channel; the task then closes the socket and exits.

use std::fmt::Display;
use std::time::Duration;

use async_trait::async_trait;
use bytes::Bytes;
use futures::{Sink, SinkExt};
use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;
use tokio_tungstenite::tungstenite::Message;

use crate::error::TransportError;
use crate::protocol::Frame;
use crate::upload::FrameSink;

/// Default channel capacity.
pub const DEFAULT_CHANNEL_CAPACITY: usize = 64;

/// Default time to wait for the writer task to confirm a frame.
pub const DEFAULT_SEND_TIMEOUT: Duration = Duration::from_secs(30);

type Confirmation = oneshot::Sender<Result<(), TransportError>>;

/// A frame queued for the writer task, with the sender's confirmation.
#[derive(Debug)]
struct OutboundFrame {
    frame: Frame,
    confirm: Confirmation,
}

impl OutboundFrame {
    fn new(frame: Frame) -> (Self, oneshot::Receiver<Result<(), TransportError>>) {
        let (confirm, rx) = oneshot::channel();
        (Self { frame, confirm }, rx)
    }
}

/// Convert a frame into a WebSocket message.
pub fn to_message(frame: Frame) -> Message {
    match frame {
        Frame::Binary(payload) => Message::binary(payload),
        Frame::Text(text) => Message::text(text),
    }
}

/// Configuration for the writer task.
#[derive(Debug, Clone)]
pub struct WriterConfig {
    /// Channel capacity for the frame queue.
    pub channel_capacity: usize,
    /// How long a sender waits for its frame to be written.
    pub send_timeout: Duration,
}

impl Default for WriterConfig {
    fn default() -> Self {
        Self {
            channel_capacity: DEFAULT_CHANNEL_CAPACITY,
            send_timeout: DEFAULT_SEND_TIMEOUT,
        }
    }
}

/// Handle for sending frames to the writer task.
///
/// Cheaply cloneable. Implements [`FrameSink`], so it can be handed
/// straight to the uploader.
#[derive(Clone)]
pub struct WriterHandle {
    tx: mpsc::Sender<OutboundFrame>,
    send_timeout: Duration,
}

impl WriterHandle {
    /// Queue a frame and wait until the writer task has written it.
    ///
    /// # Errors
    ///
    /// - `ConnectionClosed` if the writer task is gone
    /// - `SendTimeout` if the task does not confirm in time
    /// - the task's own error if writing this frame failed
    pub async fn send(&self, frame: Frame) -> Result<(), TransportError> {
        let (outbound, confirmation) = OutboundFrame::new(frame);

        self.tx
            .send(outbound)
            .await
            .map_err(|_| TransportError::ConnectionClosed)?;

        match tokio::time::timeout(self.send_timeout, confirmation).await {
            Ok(Ok(result)) => result,
            Ok(Err(_)) => Err(TransportError::ConnectionClosed),
            Err(_) => Err(TransportError::SendTimeout(self.send_timeout)),
        }
    }

    /// Check if the writer task has stopped.
    pub fn is_closed(&self) -> bool {
        self.tx.is_closed()
    }
}

#[async_trait]
impl FrameSink for WriterHandle {
    async fn send_binary(&mut self, payload: Bytes) -> Result<(), TransportError> {
        self.send(Frame::Binary(payload)).await
    }

    async fn send_text(&mut self, text: String) -> Result<(), TransportError> {
        self.send(Frame::Text(text)).await
    }
}

/// Spawn the writer task and return a handle for sending frames.
///
/// # Arguments
///
/// * `sink` - The WebSocket write half (or any message sink)
/// * `config` - Writer configuration
///
/// # Returns
///
/// A tuple of `(WriterHandle, JoinHandle)`; the task resolves once every
/// handle is dropped or a write fails.
pub fn spawn_writer_task<S>(
    sink: S,
    config: WriterConfig,
) -> (WriterHandle, JoinHandle<Result<(), TransportError>>)
where
    S: Sink<Message> + Unpin + Send + 'static,
    S::Error: Display,
{
    let (tx, rx) = mpsc::channel(config.channel_capacity);
    let handle = WriterHandle {
        tx,
        send_timeout: config.send_timeout,
    };
    let task = tokio::spawn(writer_loop(rx, sink));
    (handle, task)
}

/// Main writer loop - receives frames and writes them one by one.
///
/// Stops at the first failed write. Frames still queued are dropped, so
/// their senders see `ConnectionClosed`.
async fn writer_loop<S>(
    mut rx: mpsc::Receiver<OutboundFrame>,
    mut sink: S,
) -> Result<(), TransportError>
where
    S: Sink<Message> + Unpin,
    S::Error: Display,
{
    while let Some(outbound) = rx.recv().await {
        let len = outbound.frame.payload_len();
        let result = sink
            .send(to_message(outbound.frame))
            .await
            .map_err(|e| TransportError::Send(e.to_string()));

        let failure = result.as_ref().err().map(ToString::to_string);
        let _ = outbound.confirm.send(result);

        if let Some(reason) = failure {
            tracing::error!("Writer stopped: {}", reason);
            return Err(TransportError::Send(reason));
        }
        tracing::trace!("Wrote frame ({} bytes)", len);
    }

    // Channel closed, clean shutdown
    if let Err(e) = sink.close().await {
        tracing::debug!("Closing sink failed: {}", e);
    }
    Ok(())
}
