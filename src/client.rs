//! Client builder and exchange runner.
//!
//! The [`ClientBuilder`] provides a fluent API for configuring the
//! connection. The [`Client`] runs exchanges:
//! 1. Arm the reply slot
//! 2. Upload header, chunks and end marker through the writer task
//! 3. Wait for the reply (bounded by the reply timeout)
//! 4. Decode it into labeled bitmaps
//!
//! # Example
//!
//! ```ignore
//! use leadwire::{Client, RasterImage};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let client = Client::builder("ws://localhost:9998/ws")
//!         .max_chunk_size(8 * 1024)
//!         .connect()
//!         .await?;
//!
//!     let image = RasterImage::open("scan.png")?;
//!     for bitmap in client.process(&image).await? {
//!         println!("{} at scale {}", bitmap.label, bitmap.scale);
//!     }
//!
//!     client.close().await;
//!     Ok(())
//! }
//! ```

use std::fmt::Display;
use std::time::Duration;

use futures::{Sink, Stream, StreamExt};
use tokio::io::{AsyncRead, AsyncWrite};
use tokio::sync::Mutex;
use tokio::task::JoinHandle;
use tokio_tungstenite::tungstenite::{Error as WsError, Message};
use tokio_tungstenite::WebSocketStream;

use crate::codec::{decode, LabeledBitmap};
use crate::error::{LeadwireError, Result, TransportError, UploadError};
use crate::exchange::ReplySlot;
use crate::protocol::DEFAULT_CHUNK_SIZE;
use crate::raster::RasterImage;
use crate::transport::ws::{self, DEFAULT_MAX_MESSAGE_SIZE};
use crate::upload::Uploader;
use crate::writer::{spawn_writer_task, WriterConfig, WriterHandle};

/// Default time to wait for the processor's reply.
pub const DEFAULT_REPLY_TIMEOUT: Duration = Duration::from_secs(120);

/// Exchange settings shared by every connection style.
#[derive(Debug, Clone)]
pub struct ClientConfig {
    /// Largest pixel chunk per binary frame.
    pub max_chunk_size: usize,
    /// Reply wait limit; `None` waits forever.
    pub reply_timeout: Option<Duration>,
    /// Largest incoming message accepted by the WebSocket layer.
    pub max_message_size: usize,
    pub writer: WriterConfig,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            max_chunk_size: DEFAULT_CHUNK_SIZE,
            reply_timeout: Some(DEFAULT_REPLY_TIMEOUT),
            max_message_size: DEFAULT_MAX_MESSAGE_SIZE,
            writer: WriterConfig::default(),
        }
    }
}

/// Builder for configuring and connecting a client.
pub struct ClientBuilder {
    url: String,
    config: ClientConfig,
}

impl ClientBuilder {
    /// Create a new client builder for the processor at `url`.
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            config: ClientConfig::default(),
        }
    }

    /// Set the largest pixel chunk per frame.
    ///
    /// Default: 8 KiB
    pub fn max_chunk_size(mut self, size: usize) -> Self {
        self.config.max_chunk_size = size;
        self
    }

    /// Set how long to wait for a reply. `None` waits forever.
    ///
    /// Default: 120 seconds
    pub fn reply_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.config.reply_timeout = timeout;
        self
    }

    /// Set the largest accepted reply message.
    ///
    /// Default: 15 MiB
    pub fn max_message_size(mut self, size: usize) -> Self {
        self.config.max_message_size = size;
        self
    }

    /// Set the writer channel capacity.
    ///
    /// Default: 64
    pub fn channel_capacity(mut self, capacity: usize) -> Self {
        self.config.writer.channel_capacity = capacity;
        self
    }

    /// Set how long a single frame send may take.
    ///
    /// Default: 30 seconds
    pub fn send_timeout(mut self, timeout: Duration) -> Self {
        self.config.writer.send_timeout = timeout;
        self
    }

    /// Connect and start the reader and writer tasks.
    pub async fn connect(self) -> Result<Client> {
        let stream = ws::connect(&self.url, self.config.max_message_size).await?;
        Ok(Client::from_websocket(stream, self.config))
    }
}

/// A connected client.
///
/// Exchanges on one client run one at a time; concurrent calls to
/// [`Client::process`] queue behind each other.
///
/// Replies carry no request ID, so a connection is retired after any
/// exchange that leaves the stream out of step: a reply timeout, or an
/// upload that failed after its first frame was queued. Every later
/// exchange then fails with `Transport(ConnectionClosed)`.
pub struct Client {
    writer: WriterHandle,
    slot: ReplySlot,
    uploader: Uploader,
    reply_timeout: Option<Duration>,
    /// Serialises exchanges: the protocol cannot tell replies apart.
    exchange: Mutex<()>,
    reader_task: JoinHandle<()>,
    writer_task: JoinHandle<std::result::Result<(), TransportError>>,
}

impl Client {
    /// Create a new client builder.
    pub fn builder(url: impl Into<String>) -> ClientBuilder {
        ClientBuilder::new(url)
    }

    /// Run over an already-established WebSocket stream.
    ///
    /// Must be called within a Tokio runtime.
    pub fn from_websocket<T>(stream: WebSocketStream<T>, config: ClientConfig) -> Self
    where
        T: AsyncRead + AsyncWrite + Unpin + Send + 'static,
    {
        let (sink, source) = stream.split();
        Self::spawn(sink, source, config)
    }

    /// Start the writer and reader tasks over split connection halves.
    fn spawn<W, R>(sink: W, source: R, config: ClientConfig) -> Self
    where
        W: Sink<Message> + Unpin + Send + 'static,
        W::Error: Display,
        R: Stream<Item = std::result::Result<Message, WsError>> + Unpin + Send + 'static,
    {
        let (writer, writer_task) = spawn_writer_task(sink, config.writer.clone());

        let slot = ReplySlot::new();
        let reader_task = tokio::spawn(ws::read_loop(source, slot.clone()));

        Self {
            writer,
            slot,
            uploader: Uploader::new(config.max_chunk_size),
            reply_timeout: config.reply_timeout,
            exchange: Mutex::new(()),
            reader_task,
            writer_task,
        }
    }

    /// Upload `image`, wait for the reply and decode it.
    ///
    /// # Errors
    ///
    /// - `Upload` if the image is empty or a frame could not be sent
    /// - `ReplyTimeout` / `Transport` if no reply arrives
    /// - `Decode` if the reply is malformed
    pub async fn process(&self, image: &RasterImage) -> Result<Vec<LabeledBitmap>> {
        let _exchange = self.exchange.lock().await;

        // Armed before the first frame goes out, so a fast reply is never
        // mistaken for an unsolicited one.
        let pending = self.slot.arm()?;

        let mut writer = self.writer.clone();
        if let Err(e) = self.uploader.upload(image, &mut writer).await {
            match &e {
                // Rejected before any frame was queued.
                UploadError::Encode(_) => self.slot.disarm(),
                // The processor holds an unterminated upload.
                UploadError::Transport(_) => self.retire("upload aborted"),
            }
            return Err(e.into());
        }
        tracing::info!(
            "Uploaded {}x{} raster, waiting for reply",
            image.width(),
            image.height()
        );

        let message = match pending.wait(self.reply_timeout).await {
            Ok(message) => message,
            Err(e) => {
                // The reply may still arrive and must not answer a later upload.
                if matches!(e, LeadwireError::ReplyTimeout(_)) {
                    self.retire("reply timed out");
                }
                return Err(e);
            }
        };
        tracing::info!("Received reply ({} bytes)", message.len());

        let bitmaps = decode(message)?;
        for bitmap in &bitmaps {
            tracing::debug!(
                "{}: {}x{} at scale {}",
                bitmap.label,
                bitmap.matrix.width(),
                bitmap.matrix.height(),
                bitmap.scale
            );
        }
        Ok(bitmaps)
    }

    /// Stop using this connection: close the reply slot and drop any
    /// frames still queued for the socket.
    fn retire(&self, reason: &str) {
        tracing::warn!("Retiring connection: {}", reason);
        self.slot.close();
        self.writer_task.abort();
    }

    /// Check if the connection has gone away.
    pub fn is_closed(&self) -> bool {
        self.slot.is_closed() || self.writer.is_closed()
    }

    /// Close the connection and wait for the writer to finish.
    pub async fn close(self) {
        let Client {
            writer,
            reader_task,
            writer_task,
            ..
        } = self;

        drop(writer);
        match writer_task.await {
            Ok(Ok(())) => {}
            Ok(Err(e)) => tracing::debug!("Writer ended with error: {}", e),
            Err(e) => tracing::debug!("Writer task failed: {}", e),
        }
        reader_task.abort();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::pin::Pin;
    use std::sync::{Arc, Mutex as StdMutex};
    use std::task::{Context, Poll};

    use futures::channel::mpsc as fmpsc;

    use crate::protocol::{ResponseEnvelope, SubBitmapRecord};

    /// Accepts `limit` messages, then never becomes ready again.
    struct StallingSink {
        sent: Arc<StdMutex<Vec<Message>>>,
        limit: usize,
    }

    impl StallingSink {
        fn new(limit: usize) -> (Self, Arc<StdMutex<Vec<Message>>>) {
            let sent = Arc::new(StdMutex::new(Vec::new()));
            let sink = Self {
                sent: sent.clone(),
                limit,
            };
            (sink, sent)
        }
    }

    impl Sink<Message> for StallingSink {
        type Error = WsError;

        fn poll_ready(self: Pin<&mut Self>, _: &mut Context<'_>) -> Poll<std::result::Result<(), WsError>> {
            if self.sent.lock().unwrap().len() < self.limit {
                Poll::Ready(Ok(()))
            } else {
                Poll::Pending
            }
        }

        fn start_send(self: Pin<&mut Self>, item: Message) -> std::result::Result<(), WsError> {
            self.sent.lock().unwrap().push(item);
            Ok(())
        }

        fn poll_flush(self: Pin<&mut Self>, _: &mut Context<'_>) -> Poll<std::result::Result<(), WsError>> {
            Poll::Ready(Ok(()))
        }

        fn poll_close(self: Pin<&mut Self>, _: &mut Context<'_>) -> Poll<std::result::Result<(), WsError>> {
            Poll::Ready(Ok(()))
        }
    }

    type Replies = fmpsc::UnboundedSender<std::result::Result<Message, WsError>>;

    fn client_over(sink: StallingSink, config: ClientConfig) -> (Client, Replies) {
        let (replies, source) = fmpsc::unbounded();
        (Client::spawn(sink, source, config), replies)
    }

    fn small_image() -> RasterImage {
        RasterImage::new(4, 4, vec![1u8; 16])
    }

    #[test]
    fn test_builder_defaults() {
        let builder = ClientBuilder::new("ws://localhost:9998/ws");

        assert_eq!(builder.url, "ws://localhost:9998/ws");
        assert_eq!(builder.config.max_chunk_size, DEFAULT_CHUNK_SIZE);
        assert_eq!(builder.config.reply_timeout, Some(DEFAULT_REPLY_TIMEOUT));
        assert_eq!(builder.config.max_message_size, DEFAULT_MAX_MESSAGE_SIZE);
    }

    #[test]
    fn test_builder_configuration() {
        let builder = Client::builder("ws://example")
            .max_chunk_size(crate::protocol::LARGE_CHUNK_SIZE)
            .reply_timeout(None)
            .max_message_size(1024)
            .channel_capacity(8)
            .send_timeout(Duration::from_secs(2));

        assert_eq!(builder.config.max_chunk_size, 20 * 1024 * 1024);
        assert_eq!(builder.config.reply_timeout, None);
        assert_eq!(builder.config.max_message_size, 1024);
        assert_eq!(builder.config.writer.channel_capacity, 8);
        assert_eq!(builder.config.writer.send_timeout, Duration::from_secs(2));
    }

    #[tokio::test]
    async fn test_reply_delivered_over_split_halves() {
        let (sink, sent) = StallingSink::new(usize::MAX);
        let (client, replies) = client_over(sink, ClientConfig::default());

        let reply = ResponseEnvelope::new(vec![SubBitmapRecord::new(1_000_000, 4, 4, vec![0xFFFF])]);
        let answer = async {
            // Header, one chunk, end marker.
            while sent.lock().unwrap().len() < 3 {
                tokio::task::yield_now().await;
            }
            replies
                .unbounded_send(Ok(Message::binary(reply.encode().freeze())))
                .unwrap();
        };

        let image = small_image();
        let (result, ()) = tokio::join!(client.process(&image), answer);

        let bitmaps = result.unwrap();
        assert_eq!(bitmaps[0].matrix.count_set(), 16);
        assert!(!client.is_closed());
    }

    #[tokio::test]
    async fn test_late_reply_never_answers_next_exchange() {
        let (sink, _sent) = StallingSink::new(usize::MAX);
        let config = ClientConfig {
            reply_timeout: Some(Duration::from_millis(50)),
            ..ClientConfig::default()
        };
        let (client, replies) = client_over(sink, config);

        let err = client.process(&small_image()).await.unwrap_err();
        assert!(matches!(err, LeadwireError::ReplyTimeout(_)));
        assert!(client.is_closed());

        let late = ResponseEnvelope::new(vec![SubBitmapRecord::new(111, 4, 4, vec![0])]);
        replies
            .unbounded_send(Ok(Message::binary(late.encode().freeze())))
            .unwrap();

        let err = client.process(&small_image()).await.unwrap_err();
        assert!(matches!(
            err,
            LeadwireError::Transport(TransportError::ConnectionClosed)
        ));
    }

    #[tokio::test]
    async fn test_stalled_upload_retires_connection() {
        let (sink, sent) = StallingSink::new(2);
        let config = ClientConfig {
            max_chunk_size: 4,
            writer: WriterConfig {
                send_timeout: Duration::from_millis(50),
                ..WriterConfig::default()
            },
            ..ClientConfig::default()
        };
        let (client, _replies) = client_over(sink, config);

        let err = client.process(&small_image()).await.unwrap_err();
        assert!(matches!(
            err,
            LeadwireError::Upload(UploadError::Transport(TransportError::SendTimeout(_)))
        ));
        assert!(client.is_closed());

        let err = client.process(&small_image()).await.unwrap_err();
        assert!(matches!(
            err,
            LeadwireError::Transport(TransportError::ConnectionClosed)
        ));
        // Header and first chunk only; the refused exchange queued nothing.
        assert_eq!(sent.lock().unwrap().len(), 2);
    }

    #[tokio::test]
    async fn test_empty_image_keeps_connection() {
        let (sink, sent) = StallingSink::new(usize::MAX);
        let (client, _replies) = client_over(sink, ClientConfig::default());

        let err = client
            .process(&RasterImage::new(4, 4, Vec::<u8>::new()))
            .await
            .unwrap_err();

        assert!(matches!(err, LeadwireError::Upload(UploadError::Encode(_))));
        assert!(!client.is_closed());
        assert!(sent.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_connect_refused() {
        // Port 9 (discard) is essentially never listening for WebSockets.
        let result = Client::builder("ws://127.0.0.1:9/ws").connect().await;
        assert!(matches!(result, Err(crate::LeadwireError::Transport(_))));
    }
}
