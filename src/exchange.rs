//! Reply correlation for one in-flight exchange.
//!
//! The protocol has no request IDs, so a connection can carry exactly one
//! outstanding upload at a time. [`ReplySlot`] is the meeting point between
//! the caller that issued the upload and the read loop that receives the
//! reply:
//!
//! ```text
//! caller: arm() ──► PendingReply ──wait()──► Bytes
//!                        ▲
//! read loop: deliver(bytes) / fail(err)
//! ```
//!
//! A message delivered while nothing is armed is rejected, not stored.

use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use bytes::Bytes;
use tokio::sync::oneshot;

use crate::error::{DecodeError, LeadwireError, Result, TransportError};

type ReplySender = oneshot::Sender<std::result::Result<Bytes, TransportError>>;

#[derive(Debug, Default)]
enum SlotState {
    #[default]
    Idle,
    Pending(ReplySender),
    Closed,
}

/// Single-slot reply correlation point, shared by caller and read loop.
///
/// Cheap to clone; all clones refer to the same slot.
#[derive(Debug, Clone, Default)]
pub struct ReplySlot {
    state: Arc<Mutex<SlotState>>,
}

impl ReplySlot {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, SlotState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Register interest in the next reply.
    ///
    /// A previous waiter that gave up (timed out or dropped) is replaced.
    ///
    /// # Errors
    ///
    /// - `ExchangeInFlight` if another caller is still waiting
    /// - `Transport(ConnectionClosed)` once the connection has gone away
    pub fn arm(&self) -> Result<PendingReply> {
        let mut state = self.lock();
        match &*state {
            SlotState::Pending(tx) if !tx.is_closed() => {
                return Err(LeadwireError::ExchangeInFlight);
            }
            SlotState::Closed => {
                return Err(TransportError::ConnectionClosed.into());
            }
            _ => {}
        }

        let (tx, rx) = oneshot::channel();
        *state = SlotState::Pending(tx);
        Ok(PendingReply { rx })
    }

    /// Hand a received message to the waiting caller.
    ///
    /// # Errors
    ///
    /// `UnexpectedMessage` if nobody is waiting (never armed, already
    /// answered, or the waiter gave up).
    pub fn deliver(&self, message: Bytes) -> std::result::Result<(), DecodeError> {
        let mut state = self.lock();
        match std::mem::take(&mut *state) {
            SlotState::Pending(tx) => tx
                .send(Ok(message))
                .map_err(|_| DecodeError::UnexpectedMessage),
            SlotState::Closed => {
                *state = SlotState::Closed;
                Err(DecodeError::UnexpectedMessage)
            }
            SlotState::Idle => Err(DecodeError::UnexpectedMessage),
        }
    }

    /// Wake the waiting caller with an error and refuse later exchanges.
    pub fn fail(&self, error: TransportError) {
        let mut state = self.lock();
        if let SlotState::Pending(tx) = std::mem::replace(&mut *state, SlotState::Closed) {
            let _ = tx.send(Err(error));
        }
    }

    /// Drop the current waiter without closing the slot.
    pub fn disarm(&self) {
        let mut state = self.lock();
        if matches!(*state, SlotState::Pending(_)) {
            *state = SlotState::Idle;
        }
    }

    /// Refuse every later exchange on this connection.
    ///
    /// A waiting caller is woken with `ConnectionClosed`; a reply that
    /// arrives afterwards is rejected as unsolicited.
    pub fn close(&self) {
        *self.lock() = SlotState::Closed;
    }

    /// Check if a caller is currently waiting.
    pub fn is_pending(&self) -> bool {
        matches!(&*self.lock(), SlotState::Pending(tx) if !tx.is_closed())
    }

    /// Check if the connection behind this slot has gone away.
    pub fn is_closed(&self) -> bool {
        matches!(*self.lock(), SlotState::Closed)
    }
}

/// The caller's half of an armed slot.
#[derive(Debug)]
pub struct PendingReply {
    rx: oneshot::Receiver<std::result::Result<Bytes, TransportError>>,
}

impl PendingReply {
    /// Wait for the reply, optionally bounded by `timeout`.
    ///
    /// # Errors
    ///
    /// - `ReplyTimeout` if the limit passes first
    /// - `Transport` if the connection failed or closed while waiting
    pub async fn wait(self, timeout: Option<Duration>) -> Result<Bytes> {
        let received = match timeout {
            Some(limit) => tokio::time::timeout(limit, self.rx)
                .await
                .map_err(|_| LeadwireError::ReplyTimeout(limit))?,
            None => self.rx.await,
        };

        match received {
            Ok(Ok(message)) => Ok(message),
            Ok(Err(e)) => Err(e.into()),
            Err(_) => Err(TransportError::ConnectionClosed.into()),
        }
    }
}
