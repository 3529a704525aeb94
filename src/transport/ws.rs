//! WebSocket transport.
//!
//! - [`connect`] opens the connection with a bounded message size
//! - [`read_loop`] routes incoming messages into the [`ReplySlot`]
//!
//! Fragmented WebSocket messages are reassembled by tungstenite, so every
//! `Message::Binary` seen here is one complete reply.
//!
//! # Example
//!
//! ```ignore
//! use leadwire::transport::ws;
//!
//! let stream = ws::connect("ws://localhost:9998/ws", 15 * 1024 * 1024).await?;
//! ```

use bytes::Bytes;
use futures::{Stream, StreamExt};
use tokio::net::TcpStream;
use tokio_tungstenite::tungstenite::protocol::WebSocketConfig;
use tokio_tungstenite::tungstenite::{Error as WsError, Message};
use tokio_tungstenite::{MaybeTlsStream, WebSocketStream};

use crate::error::TransportError;
use crate::exchange::ReplySlot;

/// Default upper bound for one incoming message (15 MiB).
pub const DEFAULT_MAX_MESSAGE_SIZE: usize = 15 * 1024 * 1024;

/// Connected client stream.
pub type WsStream = WebSocketStream<MaybeTlsStream<TcpStream>>;

/// Open a WebSocket connection to the processor.
///
/// `max_message_size` bounds both whole messages and single frames.
pub async fn connect(url: &str, max_message_size: usize) -> Result<WsStream, TransportError> {
    let mut config = WebSocketConfig::default();
    config.max_message_size = Some(max_message_size);
    config.max_frame_size = Some(max_message_size);

    tracing::debug!("Connecting to {}", url);
    let (stream, response) =
        tokio_tungstenite::connect_async_with_config(url, Some(config), true).await?;
    tracing::info!("Connected to {} (HTTP {})", url, response.status());

    Ok(stream)
}

/// Read loop - delivers binary messages to the reply slot.
///
/// Text frames are logged and ignored. An unsolicited binary message is
/// rejected by the slot and logged. When the stream ends or fails, the
/// pending exchange (if any) is woken with the error and the slot closes.
pub async fn read_loop<R>(mut stream: R, slot: ReplySlot)
where
    R: Stream<Item = Result<Message, WsError>> + Unpin,
{
    while let Some(message) = stream.next().await {
        match message {
            Ok(Message::Binary(data)) => {
                let data = Bytes::from(data);
                tracing::debug!("Received reply ({} bytes)", data.len());
                if let Err(e) = slot.deliver(data) {
                    tracing::warn!("Dropping binary message: {}", e);
                }
            }
            Ok(Message::Text(text)) => {
                tracing::debug!("Ignoring text frame: {}", text.as_str());
            }
            Ok(Message::Close(frame)) => {
                tracing::info!("Connection closed by peer: {:?}", frame);
                break;
            }
            Ok(_) => {}
            Err(e) => {
                tracing::error!("Read loop error: {}", e);
                slot.fail(TransportError::WebSocket(e));
                return;
            }
        }
    }

    slot.fail(TransportError::ConnectionClosed);
}
