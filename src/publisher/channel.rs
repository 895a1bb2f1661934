//! In-process subscriber transport
//!
//! Lets an embedding application (or a test) consume metric frames without
//! a socket. [`channel`] returns the source side, handed to the
//! [`Publisher`](super::Publisher), and a connector that opens client
//! sessions against it.

use async_trait::async_trait;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use tokio::sync::{mpsc, oneshot};

use super::{Subscriber, SubscriberSource};
use crate::constants::publisher::CHANNEL_FRAME_BUFFER;
use crate::error::SubscriberError;
use crate::wire::WireMessage;

/// Create a connected source/connector pair
///
/// `backlog` bounds how many clients may be waiting to be accepted.
#[must_use]
pub fn channel(backlog: usize) -> (ChannelSource, ChannelConnector) {
    let (tx, rx) = mpsc::channel(backlog.max(1));
    (
        ChannelSource { pending: rx },
        ChannelConnector {
            pending: tx,
            next_id: Arc::new(AtomicU64::new(1)),
        },
    )
}

/// Source half: yields one [`ChannelSubscriber`] per `connect` call
#[derive(Debug)]
pub struct ChannelSource {
    pending: mpsc::Receiver<ChannelSubscriber>,
}

#[async_trait]
impl SubscriberSource for ChannelSource {
    type Subscriber = ChannelSubscriber;

    async fn accept(&mut self) -> Result<ChannelSubscriber, SubscriberError> {
        match self.pending.recv().await {
            Some(subscriber) => Ok(subscriber),
            // Every connector is gone, nobody else can ever arrive
            None => std::future::pending().await,
        }
    }
}

/// Opens client sessions against a [`ChannelSource`]
#[derive(Debug, Clone)]
pub struct ChannelConnector {
    pending: mpsc::Sender<ChannelSubscriber>,
    next_id: Arc<AtomicU64>,
}

impl ChannelConnector {
    /// Open a new session
    ///
    /// Fails if the source has been dropped.
    pub async fn connect(&self) -> Result<ChannelClient, SubscriberError> {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        let (probe_tx, probe_rx) = oneshot::channel();
        let (frames_tx, frames_rx) = mpsc::channel(CHANNEL_FRAME_BUFFER);

        self.pending
            .send(ChannelSubscriber {
                id,
                probe: Some(probe_rx),
                frames: Some(frames_tx),
            })
            .await
            .map_err(|_| SubscriberError::Disconnected)?;

        Ok(ChannelClient {
            probe: Some(probe_tx),
            frames: frames_rx,
        })
    }
}

/// Publisher-side end of an in-process session
#[derive(Debug)]
pub struct ChannelSubscriber {
    id: u64,
    probe: Option<oneshot::Receiver<String>>,
    frames: Option<mpsc::Sender<String>>,
}

#[async_trait]
impl Subscriber for ChannelSubscriber {
    async fn handshake(&mut self) -> Result<(), SubscriberError> {
        let probe = self
            .probe
            .take()
            .ok_or_else(|| SubscriberError::Handshake("probe already consumed".to_string()))?;
        probe.await.map(drop).map_err(|_| SubscriberError::Disconnected)
    }

    async fn send(&mut self, frame: String) -> Result<(), SubscriberError> {
        let frames = self.frames.as_ref().ok_or(SubscriberError::Disconnected)?;
        frames
            .send(frame)
            .await
            .map_err(|_| SubscriberError::Disconnected)
    }

    async fn closed(&mut self) -> SubscriberError {
        if let Some(frames) = &self.frames {
            frames.closed().await;
        }
        SubscriberError::Disconnected
    }

    async fn close(&mut self) {
        self.probe = None;
        self.frames = None;
    }

    fn peer(&self) -> String {
        format!("in-process#{}", self.id)
    }
}

/// Client end of an in-process session
///
/// Dropping it disconnects the session.
#[derive(Debug)]
pub struct ChannelClient {
    probe: Option<oneshot::Sender<String>>,
    frames: mpsc::Receiver<String>,
}

impl ChannelClient {
    /// Send the readiness probe; only the first call has any effect
    pub fn send_probe(&mut self, text: impl Into<String>) {
        if let Some(probe) = self.probe.take() {
            let _ = probe.send(text.into());
        }
    }

    /// Next raw frame, or `None` once the publisher closed the session
    pub async fn next_frame(&mut self) -> Option<String> {
        self.frames.recv().await
    }

    /// Next frame decoded as a [`WireMessage`]
    ///
    /// Returns `None` once the session is closed or if a frame does not
    /// decode.
    pub async fn next_message(&mut self) -> Option<WireMessage> {
        let frame = self.next_frame().await?;
        WireMessage::from_json(&frame).ok()
    }
}
