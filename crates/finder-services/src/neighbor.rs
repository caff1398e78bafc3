//! Neighbor clients — one bounded outbound queue and one delivery worker
//! per configured neighbor.
//!
//! Enqueueing never blocks: a full queue drops the new message. The worker
//! drains the queue in FIFO order, opening the transport channel lazily and
//! reopening it on the next message after a send failure. A message whose
//! send failed is not retried. The open channel lives in a slot shared with
//! the client so it is closed on shutdown even when the worker is aborted.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use serde::Serialize;
use tokio::sync::{mpsc, watch};
use tokio::sync::Mutex as AsyncMutex;
use tokio::task::JoinHandle;

use finder_core::config::NeighborConfig;
use finder_core::{NodeId, OverlayMessage};

use crate::transport::{NeighborChannel, NeighborTransport};

type ChannelSlot = Arc<AsyncMutex<Option<Box<dyn NeighborChannel>>>>;

/// Delivery state of one neighbor, for status reporting.
#[derive(Debug, Clone, Serialize)]
pub struct NeighborStatus {
    pub id: NodeId,
    pub endpoint: String,
    pub queued: usize,
    pub capacity: usize,
    pub delivered: u64,
    pub dropped: u64,
    pub failed: u64,
}

#[derive(Default)]
struct Counters {
    delivered: AtomicU64,
    dropped: AtomicU64,
    failed: AtomicU64,
}

pub struct NeighborClient {
    id: NodeId,
    endpoint: String,
    local_id: NodeId,
    tx: mpsc::Sender<OverlayMessage>,
    // Held until `start` hands it to the worker.
    rx: Mutex<Option<mpsc::Receiver<OverlayMessage>>>,
    worker: Mutex<Option<JoinHandle<()>>>,
    shutdown_tx: watch::Sender<bool>,
    transport: Arc<dyn NeighborTransport>,
    channel: ChannelSlot,
    counters: Arc<Counters>,
}

impl NeighborClient {
    pub fn new(
        local_id: NodeId,
        id: NodeId,
        endpoint: impl Into<String>,
        capacity: usize,
        transport: Arc<dyn NeighborTransport>,
    ) -> Self {
        let (tx, rx) = mpsc::channel(capacity.max(1));
        let (shutdown_tx, _) = watch::channel(false);
        Self {
            id,
            endpoint: endpoint.into(),
            local_id,
            tx,
            rx: Mutex::new(Some(rx)),
            worker: Mutex::new(None),
            shutdown_tx,
            transport,
            channel: Arc::new(AsyncMutex::new(None)),
            counters: Arc::new(Counters::default()),
        }
    }

    pub fn id(&self) -> &NodeId {
        &self.id
    }

    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }

    /// Spawn the delivery worker. Calling it again is a no-op.
    pub fn start(&self) {
        let rx = match self.rx.lock() {
            Ok(mut slot) => slot.take(),
            Err(_) => None,
        };
        let Some(rx) = rx else {
            return;
        };

        let worker = DeliveryWorker {
            neighbor: self.id.clone(),
            endpoint: self.endpoint.clone(),
            local_id: self.local_id.clone(),
            transport: self.transport.clone(),
            channel: self.channel.clone(),
            rx,
            shutdown: self.shutdown_tx.subscribe(),
            counters: self.counters.clone(),
        };
        let handle = tokio::spawn(worker.run());
        if let Ok(mut slot) = self.worker.lock() {
            *slot = Some(handle);
        }
    }

    /// Queue a message for delivery. Returns false, dropping the message,
    /// if the queue is full or the client is shut down.
    pub fn enqueue(&self, msg: OverlayMessage) -> bool {
        if *self.shutdown_tx.borrow() {
            return false;
        }
        match self.tx.try_send(msg) {
            Ok(()) => true,
            Err(mpsc::error::TrySendError::Full(msg)) => {
                self.counters.dropped.fetch_add(1, Ordering::Relaxed);
                tracing::warn!(
                    neighbor = %self.id,
                    kind = msg.kind(),
                    msg_id = %msg.msg_id(),
                    "output queue full, message dropped"
                );
                false
            }
            Err(mpsc::error::TrySendError::Closed(_)) => false,
        }
    }

    /// Messages waiting for the worker.
    pub fn queue_len(&self) -> usize {
        self.tx.max_capacity() - self.tx.capacity()
    }

    pub fn capacity(&self) -> usize {
        self.tx.max_capacity()
    }

    pub fn status(&self) -> NeighborStatus {
        NeighborStatus {
            id: self.id.clone(),
            endpoint: self.endpoint.clone(),
            queued: self.queue_len(),
            capacity: self.capacity(),
            delivered: self.counters.delivered.load(Ordering::Relaxed),
            dropped: self.counters.dropped.load(Ordering::Relaxed),
            failed: self.counters.failed.load(Ordering::Relaxed),
        }
    }

    /// Stop the worker and wait up to `timeout` for it to exit, then close
    /// the transport channel. Messages still queued are discarded. Returns
    /// false if the worker had to be aborted.
    pub async fn shutdown(&self, timeout: Duration) -> bool {
        self.shutdown_tx.send_replace(true);
        if let Ok(mut slot) = self.rx.lock() {
            slot.take();
        }

        let handle = match self.worker.lock() {
            Ok(mut slot) => slot.take(),
            Err(_) => None,
        };
        let Some(mut handle) = handle else {
            return true;
        };

        let clean = match tokio::time::timeout(timeout, &mut handle).await {
            Ok(_) => true,
            Err(_) => {
                tracing::warn!(neighbor = %self.id, "delivery worker did not stop in time, aborting");
                handle.abort();
                // wait for the cancelled task to release the channel slot
                let _ = handle.await;
                false
            }
        };

        if let Some(mut ch) = self.channel.lock().await.take() {
            ch.close().await;
        }
        clean
    }
}

struct DeliveryWorker {
    neighbor: NodeId,
    endpoint: String,
    local_id: NodeId,
    transport: Arc<dyn NeighborTransport>,
    channel: ChannelSlot,
    rx: mpsc::Receiver<OverlayMessage>,
    shutdown: watch::Receiver<bool>,
    counters: Arc<Counters>,
}

impl DeliveryWorker {
    async fn run(mut self) {
        tracing::debug!(neighbor = %self.neighbor, endpoint = %self.endpoint, "delivery worker started");
        loop {
            if *self.shutdown.borrow() {
                break;
            }
            let msg = tokio::select! {
                biased;
                _ = self.shutdown.changed() => break,
                msg = self.rx.recv() => match msg {
                    Some(m) => m,
                    None => break,
                },
            };

            let mut channel = self.channel.lock().await;
            if channel.is_none() {
                match self.transport.connect(&self.endpoint).await {
                    Ok(c) => *channel = Some(c),
                    Err(e) => {
                        self.counters.failed.fetch_add(1, Ordering::Relaxed);
                        tracing::warn!(neighbor = %self.neighbor, error = %e, msg_id = %msg.msg_id(), "connect failed, message dropped");
                        continue;
                    }
                }
            }
            let Some(ch) = channel.as_mut() else {
                continue;
            };

            let result = match &msg {
                OverlayMessage::Query(q) => ch.send_query(&self.local_id, q).await,
                OverlayMessage::Reply(r) => ch.send_reply(&self.local_id, r).await,
            };
            match result {
                Ok(()) => {
                    self.counters.delivered.fetch_add(1, Ordering::Relaxed);
                    tracing::debug!(neighbor = %self.neighbor, kind = msg.kind(), msg_id = %msg.msg_id(), "delivered");
                }
                Err(e) => {
                    self.counters.failed.fetch_add(1, Ordering::Relaxed);
                    tracing::warn!(neighbor = %self.neighbor, kind = msg.kind(), msg_id = %msg.msg_id(), error = %e, "send failed, resetting channel");
                    if let Some(mut broken) = channel.take() {
                        broken.close().await;
                    }
                }
            }
        }

        self.rx.close();
        if let Some(mut ch) = self.channel.lock().await.take() {
            ch.close().await;
        }
        tracing::debug!(neighbor = %self.neighbor, "delivery worker stopped");
    }
}

/// All neighbor clients of this node.
pub struct NeighborhoodManager {
    local_id: NodeId,
    clients: HashMap<NodeId, NeighborClient>,
}

impl NeighborhoodManager {
    pub fn new(
        local_id: NodeId,
        neighbors: &[NeighborConfig],
        capacity: usize,
        transport: Arc<dyn NeighborTransport>,
    ) -> Self {
        let clients = neighbors
            .iter()
            .map(|n| {
                let id = NodeId::new(n.id.trim());
                let client = NeighborClient::new(
                    local_id.clone(),
                    id.clone(),
                    n.endpoint.clone(),
                    capacity,
                    transport.clone(),
                );
                (id, client)
            })
            .collect();
        Self { local_id, clients }
    }

    pub fn local_id(&self) -> &NodeId {
        &self.local_id
    }

    pub fn start(&self) {
        for client in self.clients.values() {
            client.start();
        }
        tracing::info!(neighbors = self.clients.len(), "neighbor delivery workers started");
    }

    pub fn is_known(&self, id: &NodeId) -> bool {
        self.clients.contains_key(id)
    }

    pub fn neighbor_ids(&self) -> Vec<NodeId> {
        let mut ids: Vec<_> = self.clients.keys().cloned().collect();
        ids.sort();
        ids
    }

    pub fn len(&self) -> usize {
        self.clients.len()
    }

    pub fn is_empty(&self) -> bool {
        self.clients.is_empty()
    }

    /// Enqueue `msg` to every neighbor except `exclude`. Returns how many
    /// queues accepted it.
    pub fn broadcast(&self, msg: &OverlayMessage, exclude: Option<&NodeId>) -> usize {
        self.clients
            .values()
            .filter(|c| Some(c.id()) != exclude)
            .filter(|c| c.enqueue(msg.clone()))
            .count()
    }

    /// Enqueue `msg` to one neighbor. False if unknown or its queue is full.
    pub fn send_to(&self, msg: OverlayMessage, neighbor: &NodeId) -> bool {
        match self.clients.get(neighbor) {
            Some(client) => client.enqueue(msg),
            None => {
                tracing::debug!(%neighbor, "send to unknown neighbor ignored");
                false
            }
        }
    }

    pub fn statuses(&self) -> Vec<NeighborStatus> {
        let mut all: Vec<_> = self.clients.values().map(|c| c.status()).collect();
        all.sort_by(|a, b| a.id.cmp(&b.id));
        all
    }

    /// Shut every client down, each within `timeout`. Returns false if any
    /// worker had to be aborted.
    pub async fn shutdown(&self, timeout: Duration) -> bool {
        let results =
            futures::future::join_all(self.clients.values().map(|c| c.shutdown(timeout))).await;
        results.into_iter().all(|clean| clean)
    }
}
