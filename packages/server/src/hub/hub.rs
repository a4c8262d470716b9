//! Hub: one topic's fan-out fabric.
//!
//! A single dispatcher task owns the subscriber set. Registration,
//! deregistration and broadcast all arrive as events on queues consumed by
//! that task, so the set is never touched from anywhere else and every
//! subscriber's outbound queue is closed exactly once, when it leaves the set.
//!
//! Two non-blocking send points give the backpressure policy:
//! * the hub's broadcast queue: overflow drops the message for everyone;
//! * each subscriber's outbound queue: overflow evicts that subscriber.
//!
//! Every accepted broadcast carries a sequence number. A subscriber receives
//! exactly the messages sequenced at or after its registration, so a caller
//! that registers and snapshots its history under the same lock it
//! broadcasts under sees neither a gap nor a duplicate.

use std::{
    collections::HashMap,
    fmt,
    sync::{
        Arc,
        atomic::{AtomicBool, AtomicU64, Ordering},
    },
};

use bytes::Bytes;
use serde::Serialize;
use tokio::{
    sync::{
        Mutex,
        mpsc::{self, error::TrySendError},
        watch,
    },
    task::JoinHandle,
};

use crate::domain::{HubError, Message};

/// Capacity of each subscriber's outbound queue.
pub const SEND_BUFFER: usize = 256;

/// Capacity of the hub's central broadcast queue.
pub const BROADCAST_BUFFER: usize = 256;

/// Identity of one subscriber within a hub.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SubscriberId(u64);

impl fmt::Display for SubscriberId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// Registration request: the dispatcher takes ownership of the sending half.
struct Registration {
    id: SubscriberId,
    outbound: mpsc::Sender<Message>,
    /// First broadcast sequence number this subscriber receives
    since: u64,
}

/// A registered subscriber as held by the dispatcher.
struct Outbound {
    queue: mpsc::Sender<Message>,
    since: u64,
}

type Subscribers = HashMap<SubscriberId, Outbound>;

/// Receiving ends of the hub queues, taken by the dispatcher when it starts.
struct Queues {
    register: mpsc::UnboundedReceiver<Registration>,
    unregister: mpsc::UnboundedReceiver<SubscriberId>,
    broadcast: mpsc::Receiver<(u64, Message)>,
}

struct HubInner {
    name: String,
    register_tx: mpsc::UnboundedSender<Registration>,
    unregister_tx: mpsc::UnboundedSender<SubscriberId>,
    broadcast_tx: mpsc::Sender<(u64, Message)>,
    queues: Mutex<Option<Queues>>,
    /// Subscriber count published by the dispatcher after every mutation
    client_count: watch::Sender<usize>,
    stop: watch::Sender<bool>,
    running: AtomicBool,
    stopped: AtomicBool,
    next_id: AtomicU64,
    next_seq: AtomicU64,
}

/// Handle to a broadcast hub. Cloning is cheap and every clone talks to the
/// same dispatcher.
#[derive(Clone)]
pub struct Hub {
    inner: Arc<HubInner>,
}

impl fmt::Debug for Hub {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Hub")
            .field("name", &self.inner.name)
            .field("clients", &self.client_count())
            .field("running", &self.is_running())
            .finish()
    }
}

impl Hub {
    /// Create an idle hub. Nothing is delivered until [`Hub::run`] is driven.
    pub fn new(name: impl Into<String>) -> Self {
        let (register_tx, register) = mpsc::unbounded_channel();
        let (unregister_tx, unregister) = mpsc::unbounded_channel();
        let (broadcast_tx, broadcast) = mpsc::channel(BROADCAST_BUFFER);
        let (client_count, _) = watch::channel(0);
        let (stop, _) = watch::channel(false);

        Self {
            inner: Arc::new(HubInner {
                name: name.into(),
                register_tx,
                unregister_tx,
                broadcast_tx,
                queues: Mutex::new(Some(Queues {
                    register,
                    unregister,
                    broadcast,
                })),
                client_count,
                stop,
                running: AtomicBool::new(false),
                stopped: AtomicBool::new(false),
                next_id: AtomicU64::new(1),
                next_seq: AtomicU64::new(0),
            }),
        }
    }

    pub fn name(&self) -> &str {
        &self.inner.name
    }

    /// Number of currently registered subscribers.
    pub fn client_count(&self) -> usize {
        *self.inner.client_count.borrow()
    }

    /// Watch the subscriber count as the dispatcher publishes it.
    pub fn watch_client_count(&self) -> watch::Receiver<usize> {
        self.inner.client_count.subscribe()
    }

    /// Whether the dispatcher is currently serving.
    pub fn is_running(&self) -> bool {
        self.inner.running.load(Ordering::Acquire)
    }

    /// Spawn the dispatcher onto the current runtime.
    pub fn start(&self) -> JoinHandle<()> {
        let hub = self.clone();
        tokio::spawn(async move { hub.run().await })
    }

    /// Serve the dispatcher loop until [`Hub::stop`] is called.
    ///
    /// Only the first call serves; later calls return immediately.
    pub async fn run(&self) {
        let Some(mut queues) = self.inner.queues.lock().await.take() else {
            tracing::warn!(hub = %self.inner.name, "hub dispatcher already started or stopped");
            return;
        };

        let mut stop = self.inner.stop.subscribe();
        let mut subscribers = Subscribers::new();

        self.inner.running.store(true, Ordering::Release);
        tracing::info!(hub = %self.inner.name, "hub started");

        loop {
            tokio::select! {
                biased;

                _ = stop.wait_for(|stopped| *stopped) => break,

                Some(registration) = queues.register.recv() => {
                    self.add(&mut subscribers, registration);
                }

                Some(id) = queues.unregister.recv() => {
                    // Dropping the sender closes the outbound queue
                    if subscribers.remove(&id).is_some() {
                        self.publish_count(subscribers.len());
                        tracing::info!(
                            hub = %self.inner.name,
                            subscriber = %id,
                            clients = subscribers.len(),
                            "client unregistered"
                        );
                    }
                }

                Some((seq, message)) = queues.broadcast.recv() => {
                    // A registration sent before this message was enqueued
                    // must be in the set before it is dispatched
                    while let Ok(registration) = queues.register.try_recv() {
                        self.add(&mut subscribers, registration);
                    }
                    self.dispatch(&mut subscribers, seq, message);
                }

                else => break,
            }
        }

        self.shutdown(subscribers, queues);
    }

    /// Stop the dispatcher.
    ///
    /// Every outbound queue is closed (write pumps send a Close frame and
    /// exit), pending registrations and broadcasts are discarded, and later
    /// broadcasts are ignored.
    pub fn stop(&self) {
        if self.inner.stopped.swap(true, Ordering::AcqRel) {
            return;
        }
        self.inner.stop.send_replace(true);

        // A dispatcher that never started still holds queued registrations
        if let Ok(mut queues) = self.inner.queues.try_lock() {
            queues.take();
        }
        tracing::info!(hub = %self.inner.name, "hub stop requested");
    }

    /// Enqueue a message for every subscriber without blocking.
    ///
    /// Returns `false` when the message was dropped because the broadcast
    /// queue is full or the hub is stopped.
    pub fn broadcast(&self, message: Message) -> bool {
        if self.inner.stopped.load(Ordering::Acquire) {
            tracing::debug!(hub = %self.inner.name, "hub stopped, ignoring broadcast");
            return false;
        }

        let seq = self.inner.next_seq.fetch_add(1, Ordering::SeqCst);
        match self.inner.broadcast_tx.try_send((seq, message)) {
            Ok(()) => true,
            Err(TrySendError::Full((_, message))) => {
                tracing::warn!(
                    hub = %self.inner.name,
                    size = message.len(),
                    "broadcast queue full, dropping message"
                );
                false
            }
            Err(TrySendError::Closed(_)) => false,
        }
    }

    /// Encode `value` as JSON and broadcast it as a text message.
    ///
    /// Encoding failures are returned and nothing is enqueued. A full
    /// broadcast queue is not reported.
    pub fn broadcast_json<T>(&self, value: &T) -> Result<(), HubError>
    where
        T: Serialize + ?Sized,
    {
        let encoded = serde_json::to_vec(value)?;
        self.broadcast(Message::text(encoded));
        Ok(())
    }

    /// Broadcast raw bytes as a binary message.
    pub fn broadcast_binary(&self, data: impl Into<Bytes>) -> bool {
        self.broadcast(Message::binary(data))
    }

    /// Ask the dispatcher to add a new subscriber.
    ///
    /// Returns the subscriber's id and the receiving end of its outbound
    /// queue, or `None` when the hub is stopped. The queue receives every
    /// message broadcast after this call returns and none broadcast before
    /// it was made.
    pub(crate) fn register(&self) -> Option<(SubscriberId, mpsc::Receiver<Message>)> {
        if self.inner.stopped.load(Ordering::Acquire) {
            return None;
        }

        let id = SubscriberId(self.inner.next_id.fetch_add(1, Ordering::Relaxed));
        let (outbound, receiver) = mpsc::channel(SEND_BUFFER);
        let since = self.inner.next_seq.load(Ordering::SeqCst);
        self.inner
            .register_tx
            .send(Registration { id, outbound, since })
            .ok()?;
        Some((id, receiver))
    }

    /// Ask the dispatcher to remove a subscriber. Removing an absent
    /// subscriber is a no-op.
    pub(crate) fn unregister(&self, id: SubscriberId) {
        if self.inner.unregister_tx.send(id).is_err() {
            tracing::debug!(hub = %self.inner.name, subscriber = %id, "hub gone, skipping unregister");
        }
    }

    fn add(&self, subscribers: &mut Subscribers, registration: Registration) {
        let Registration { id, outbound, since } = registration;
        subscribers.insert(
            id,
            Outbound {
                queue: outbound,
                since,
            },
        );
        self.publish_count(subscribers.len());
        tracing::info!(
            hub = %self.inner.name,
            subscriber = %id,
            clients = subscribers.len(),
            "client registered"
        );
    }

    fn dispatch(&self, subscribers: &mut Subscribers, seq: u64, message: Message) {
        let before = subscribers.len();

        subscribers.retain(|id, outbound| {
            if seq < outbound.since {
                // broadcast before this subscriber registered
                return true;
            }
            match outbound.queue.try_send(message.clone()) {
                Ok(()) => true,
                Err(TrySendError::Full(_)) => {
                    tracing::warn!(hub = %self.inner.name, subscriber = %id, "dropped slow client");
                    false
                }
                Err(TrySendError::Closed(_)) => {
                    tracing::debug!(hub = %self.inner.name, subscriber = %id, "write pump gone, removing client");
                    false
                }
            }
        });

        if subscribers.len() != before {
            self.publish_count(subscribers.len());
        }
    }

    fn shutdown(&self, subscribers: Subscribers, mut queues: Queues) {
        let closed = subscribers.len();
        drop(subscribers);
        self.publish_count(0);

        queues.register.close();
        queues.broadcast.close();
        let mut discarded_registrations = 0usize;
        while queues.register.try_recv().is_ok() {
            discarded_registrations += 1;
        }
        let mut discarded_messages = 0usize;
        while queues.broadcast.try_recv().is_ok() {
            discarded_messages += 1;
        }

        self.inner.running.store(false, Ordering::Release);
        tracing::info!(
            hub = %self.inner.name,
            closed,
            discarded_registrations,
            discarded_messages,
            "hub stopped"
        );
    }

    fn publish_count(&self, count: usize) {
        self.inner.client_count.send_replace(count);
    }
}
