//! Synchronous handoff channel between connection tasks and the scheduler
//!
//! Any number of senders, one receiver. A `send` completes only once the
//! receiver has taken the value, so each producer has at most one value in
//! flight and stalls while the scheduler is busy.

use tokio::sync::{mpsc, oneshot};

use crate::error::NetworkError;

type Envelope<T> = (T, oneshot::Sender<()>);

/// Create a connected sender/receiver pair
pub fn handoff<T>() -> (HandoffSender<T>, HandoffReceiver<T>) {
    let (tx, rx) = mpsc::channel(1);
    (HandoffSender { inner: tx }, HandoffReceiver { inner: rx })
}

/// Producer half, cloned into every connection task
pub struct HandoffSender<T> {
    inner: mpsc::Sender<Envelope<T>>,
}

impl<T> Clone for HandoffSender<T> {
    fn clone(&self) -> Self {
        Self {
            inner: self.inner.clone(),
        }
    }
}

impl<T> HandoffSender<T> {
    /// Hand `value` over and wait until the receiver has taken it
    pub async fn send(&self, value: T) -> Result<(), NetworkError> {
        let (ack_tx, ack_rx) = oneshot::channel();
        self.inner
            .send((value, ack_tx))
            .await
            .map_err(|_| NetworkError::ChannelClosed)?;
        ack_rx.await.map_err(|_| NetworkError::ChannelClosed)
    }

    pub fn is_closed(&self) -> bool {
        self.inner.is_closed()
    }
}

/// Consumer half, owned by the frame scheduler
pub struct HandoffReceiver<T> {
    inner: mpsc::Receiver<Envelope<T>>,
}

impl<T> HandoffReceiver<T> {
    /// Take the next value, releasing its sender
    ///
    /// Returns `None` once every sender has been dropped. Cancel safe.
    pub async fn recv(&mut self) -> Option<T> {
        let (value, ack) = self.inner.recv().await?;
        let _ = ack.send(());
        Some(value)
    }

    /// Take a value if one is already waiting
    pub fn try_recv(&mut self) -> Option<T> {
        let (value, ack) = self.inner.try_recv().ok()?;
        let _ = ack.send(());
        Some(value)
    }
}
