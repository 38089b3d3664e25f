use std::sync::Arc;

use bytes::Bytes;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};

use crate::connection::{BusConnection, BusEvent};
use crate::error::HubError;
use crate::router::MessageRouter;

pub const DEFAULT_RECONNECT_ATTEMPTS: u32 = 10;

/// Owns the bus connection lifecycle and feeds messages to the router.
pub struct Hub {
    router: Arc<MessageRouter>,
    max_reconnect_attempts: u32,
}

impl Hub {
    pub fn new(router: Arc<MessageRouter>, max_reconnect_attempts: u32) -> Self {
        Self {
            router,
            max_reconnect_attempts,
        }
    }

    /// Pump the connection until cancelled.
    ///
    /// Messages are handled one at a time in delivery order by a single
    /// worker, so the poll loop keeps servicing keep-alives while a handler
    /// runs. A lost connection is retried immediately, up to
    /// `max_reconnect_attempts` consecutive failures; a successful reconnect
    /// resets the count and renews subscriptions.
    pub async fn run<C: BusConnection>(
        &self,
        mut conn: C,
        cancel: CancellationToken,
    ) -> Result<(), HubError> {
        let (tx, mut rx) = mpsc::unbounded_channel::<(String, Bytes)>();
        let router = self.router.clone();
        let worker = tokio::spawn(async move {
            while let Some((topic, payload)) = rx.recv().await {
                router.route(&topic, &payload).await;
            }
        });

        let result = self.pump(&mut conn, &tx, &cancel).await;

        // Let the worker finish what was already delivered
        drop(tx);
        if let Err(e) = worker.await {
            error!("message worker failed: {}", e);
        }
        result
    }

    async fn pump<C: BusConnection>(
        &self,
        conn: &mut C,
        tx: &mpsc::UnboundedSender<(String, Bytes)>,
        cancel: &CancellationToken,
    ) -> Result<(), HubError> {
        let topics = self.router.topics();
        let mut attempts = 0u32;

        loop {
            let event = tokio::select! {
                _ = cancel.cancelled() => {
                    info!("hub shutting down");
                    conn.disconnect().await;
                    return Ok(());
                }
                event = conn.next_event() => event,
            };

            match event {
                Ok(BusEvent::Connected) => {
                    if attempts > 0 {
                        info!(attempts, "reconnected to bus");
                    } else {
                        info!("connected to bus");
                    }
                    attempts = 0;
                    for topic in &topics {
                        conn.subscribe(topic).await?;
                    }
                }
                Ok(BusEvent::Message { topic, payload }) => {
                    if tx.send((topic, payload)).is_err() {
                        warn!("message worker is gone, dropping message");
                    }
                }
                Ok(BusEvent::Other) => {}
                Err(e) => {
                    if attempts >= self.max_reconnect_attempts {
                        error!("giving up on bus after {} reconnect attempts: {:#}", attempts, e);
                        return Err(HubError::ReconnectExhausted { attempts, last: e });
                    }
                    attempts += 1;
                    warn!(
                        "bus connection error: {:#}. Reconnecting ({}/{})",
                        e, attempts, self.max_reconnect_attempts
                    );
                }
            }
        }
    }
}
