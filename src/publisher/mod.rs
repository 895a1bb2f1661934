//! Publisher: forwards metric samples to one live subscriber
//!
//! The publisher alternates between two states. While awaiting a
//! connection it accepts from a [`SubscriberSource`] and reads the
//! readiness probe. Once a session is open it forwards samples from the
//! output lane, oldest first, one frame per sample. A failed send ends the
//! session without retrying that sample, and the publisher goes back to
//! accepting.
//!
//! Samples queued while nobody was attached are discarded when the next
//! session starts, so a new subscriber only ever sees live samples.

mod channel;
mod websocket;

pub use channel::{ChannelClient, ChannelConnector, ChannelSource, ChannelSubscriber, channel};
pub use websocket::{WsSource, WsSubscriber};

use async_trait::async_trait;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use crate::constants::publisher::{ACCEPT_BACKOFF, PROBE_TIMEOUT};
use crate::error::SubscriberError;
use crate::fabric::{Lane, ReadySignal};
use crate::metrics::PipelineMetrics;
use crate::stats::MetricSample;
use crate::types::SessionId;
use crate::wire;

/// One connected consumer of metric frames
#[async_trait]
pub trait Subscriber: Send {
    /// Wait for the subscriber's readiness probe; its content is ignored
    async fn handshake(&mut self) -> Result<(), SubscriberError>;

    /// Deliver one text frame
    async fn send(&mut self, frame: String) -> Result<(), SubscriberError>;

    /// Resolve once the peer has gone away
    ///
    /// Must be cancel-safe: the publisher polls it alongside the output lane.
    async fn closed(&mut self) -> SubscriberError;

    /// Close the connection from our side
    async fn close(&mut self);

    /// Peer description for logs
    fn peer(&self) -> String;
}

/// Where subscribers come from
#[async_trait]
pub trait SubscriberSource: Send {
    type Subscriber: Subscriber;

    /// Wait for the next connection
    ///
    /// Must be cancel-safe with respect to connections not yet returned.
    async fn accept(&mut self) -> Result<Self::Subscriber, SubscriberError>;
}

/// How a session ended
#[derive(Debug)]
enum SessionEnd {
    Cancelled,
    Lost(SubscriberError),
}

/// Single-subscriber forwarding stage
pub struct Publisher<S: SubscriberSource> {
    source: S,
    output: Arc<Lane<MetricSample>>,
    metrics: Arc<PipelineMetrics>,
    attached: Option<Arc<ReadySignal>>,
}

impl<S: SubscriberSource> Publisher<S> {
    #[must_use]
    pub fn new(source: S, output: Arc<Lane<MetricSample>>, metrics: Arc<PipelineMetrics>) -> Self {
        Self {
            source,
            output,
            metrics,
            attached: None,
        }
    }

    /// Set `signal` once the first subscriber has completed its handshake
    #[must_use]
    pub fn with_attach_signal(mut self, signal: Arc<ReadySignal>) -> Self {
        self.attached = Some(signal);
        self
    }

    /// Accept and serve subscribers, one at a time, until cancelled
    pub async fn run(mut self, cancel: CancellationToken) {
        info!("Publisher awaiting subscriber");

        loop {
            let accepted = tokio::select! {
                biased;
                () = cancel.cancelled() => break,
                accepted = self.source.accept() => accepted,
            };

            let mut subscriber = match accepted {
                Ok(subscriber) => subscriber,
                Err(e) => {
                    warn!("Failed to accept subscriber: {}", e);
                    if e.is_disconnect() {
                        tokio::select! {
                            biased;
                            () = cancel.cancelled() => break,
                            () = tokio::time::sleep(ACCEPT_BACKOFF) => {}
                        }
                    }
                    continue;
                }
            };

            let session = SessionId::new();
            let peer = subscriber.peer();
            let probe = tokio::select! {
                biased;
                () = cancel.cancelled() => {
                    subscriber.close().await;
                    break;
                }
                probe = tokio::time::timeout(PROBE_TIMEOUT, subscriber.handshake()) => probe,
            };
            match probe {
                Ok(Ok(())) => {}
                Ok(Err(e)) => {
                    warn!(%session, %peer, "Subscriber handshake failed: {}", e);
                    continue;
                }
                Err(_) => {
                    warn!(%session, %peer, "No readiness probe within {:?}, closing", PROBE_TIMEOUT);
                    subscriber.close().await;
                    continue;
                }
            }

            self.metrics.record_session_accepted();
            let stale = self.output.discard_backlog();
            if stale > 0 {
                self.metrics.record_samples_discarded(stale as u64);
                info!(%session, stale, "Discarded samples queued before subscriber attached");
            }
            if let Some(attached) = &self.attached {
                attached.set();
            }
            info!(%session, %peer, "Subscriber attached");

            let (end, sent) = self.forward(&mut subscriber, session, &cancel).await;
            self.metrics.record_session_closed();

            match end {
                SessionEnd::Cancelled => {
                    subscriber.close().await;
                    info!(%session, sent, "Subscriber session closed on shutdown");
                    break;
                }
                SessionEnd::Lost(e) => {
                    info!(%session, %peer, sent, "Subscriber disconnected: {}", e);
                    info!("Publisher awaiting subscriber");
                }
            }
        }

        info!("Publisher stopped");
    }

    /// Forward samples to `subscriber` until it goes away or `cancel` fires
    ///
    /// Returns how the session ended and how many frames were delivered.
    async fn forward(
        &mut self,
        subscriber: &mut S::Subscriber,
        session: SessionId,
        cancel: &CancellationToken,
    ) -> (SessionEnd, u64) {
        let mut sent = 0u64;

        loop {
            let sample = tokio::select! {
                biased;
                () = cancel.cancelled() => return (SessionEnd::Cancelled, sent),
                err = subscriber.closed() => return (SessionEnd::Lost(err), sent),
                extra = self.source.accept() => {
                    if let Ok(mut extra) = extra {
                        warn!(%session, peer = %extra.peer(), "Refusing second subscriber while a session is active");
                        extra.close().await;
                    }
                    continue;
                }
                sample = self.output.recv(cancel) => match sample {
                    Some(sample) => sample,
                    None => return (SessionEnd::Cancelled, sent),
                },
            };

            let frame = match wire::encode(&sample) {
                Ok(frame) => frame,
                Err(e) => {
                    error!(seq = sample.sequence_number, "Failed to encode sample: {}", e);
                    self.metrics.record_send_failure();
                    continue;
                }
            };

            match subscriber.send(frame).await {
                Ok(()) => {
                    sent += 1;
                    self.metrics.record_sample_sent();
                    debug!(%session, seq = sample.sequence_number, "Sample sent");
                }
                Err(e) => {
                    // At-most-once: the sample is not retried or re-queued
                    self.metrics.record_send_failure();
                    return (SessionEnd::Lost(e), sent);
                }
            }
        }
    }
}
