//! Connection manager: the single realtime channel to the assistant backend.
//!
//! State transitions happen under one lock; observer callbacks, timers and
//! event pumps are collected as effects and run after the lock is released,
//! so a handler may call back into the manager.

use crate::client::config::ClientConfig;
use crate::client::queue::OfflineQueue;
use crate::client::retry::{ReconnectState, RetryDecision};
use crate::client::session::SessionIdentity;
use crate::protocol::{decode_inbound, decode_undelivered, encode_outbound, encode_queued};
use crate::traits::{ChatRuntime, KeyValueStore, Transport, TransportEvent, TransportHandle};
use crate::types::{InboundFrame, OutboundFrame, QueuedTurn, SendOptions};
use parking_lot::Mutex;
use std::sync::{Arc, Weak};
use std::time::Duration;
use tracing::{debug, error, info, warn};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionState {
    Connecting,
    Open,
    Closed,
    ReconnectScheduled,
    GivenUp,
}

/// Which path an outbound turn took.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SendOutcome {
    Sent,
    Queued,
}

/// Nudges from the host environment.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HostSignal {
    /// Network connectivity regained.
    Online,
    /// Network connectivity lost.
    Offline,
    /// UI became foreground/visible.
    Visible,
    Hidden,
}

type MessageHandler = Arc<dyn Fn(&InboundFrame) + Send + Sync>;
type StatusHandler = Arc<dyn Fn(bool) + Send + Sync>;

struct Listeners<T> {
    next_id: u64,
    entries: Vec<(u64, T)>,
}

impl<T: Clone> Listeners<T> {
    fn new() -> Self {
        Self {
            next_id: 0,
            entries: Vec::new(),
        }
    }

    fn add(&mut self, handler: T) -> u64 {
        self.next_id += 1;
        self.entries.push((self.next_id, handler));
        self.next_id
    }

    fn remove(&mut self, id: u64) {
        self.entries.retain(|(entry_id, _)| *entry_id != id);
    }

    fn snapshot(&self) -> Vec<T> {
        self.entries.iter().map(|(_, h)| h.clone()).collect()
    }
}

#[derive(Debug, Clone, Copy)]
enum ListenerKind {
    Message,
    Status,
}

/// Registration returned by [`ConnectionManager::on_message`] and
/// [`ConnectionManager::on_status_change`].
#[must_use = "dropping a Subscription keeps the handler registered; call unsubscribe() to remove it"]
pub struct Subscription {
    id: u64,
    kind: ListenerKind,
    inner: Weak<Inner>,
}

impl Subscription {
    pub fn unsubscribe(self) {
        if let Some(inner) = self.inner.upgrade() {
            match self.kind {
                ListenerKind::Message => inner.message_handlers.lock().remove(self.id),
                ListenerKind::Status => inner.status_handlers.lock().remove(self.id),
            }
        }
    }
}

struct ActiveLink {
    id: u64,
    handle: Box<dyn TransportHandle>,
}

struct LinkState {
    state: ConnectionState,
    active: Option<ActiveLink>,
    next_link_id: u64,
    retry: ReconnectState,
    /// Bumped to cancel whichever reconnect timer is pending.
    timer_generation: u64,
    /// Bumped by `disconnect` so host signal listeners stop.
    signal_epoch: u64,
    stopped: bool,
    reported: Option<bool>,
    session: SessionIdentity,
    queue: OfflineQueue,
}

enum Effect {
    Status(bool),
    Schedule {
        generation: u64,
        delay: Duration,
    },
    Pump {
        link_id: u64,
        events: async_channel::Receiver<TransportEvent>,
    },
}

struct Inner {
    config: ClientConfig,
    transport: Arc<dyn Transport>,
    runtime: Arc<dyn ChatRuntime>,
    link: Mutex<LinkState>,
    message_handlers: Mutex<Listeners<MessageHandler>>,
    status_handlers: Mutex<Listeners<StatusHandler>>,
}

/// Owns the socket lifecycle, the session identity and the offline queue.
///
/// Cheap to clone; clones share one connection. Nothing here is global:
/// each manager is constructed and owned explicitly.
#[derive(Clone)]
pub struct ConnectionManager {
    inner: Arc<Inner>,
}

impl ConnectionManager {
    /// Create a manager and start connecting.
    ///
    /// Must be called inside the runtime that `runtime` spawns onto.
    pub fn new(
        config: ClientConfig,
        transport: Arc<dyn Transport>,
        store: Arc<dyn KeyValueStore>,
        runtime: Arc<dyn ChatRuntime>,
    ) -> Self {
        let link = LinkState {
            state: ConnectionState::Connecting,
            active: None,
            next_link_id: 0,
            retry: ReconnectState::new(config.reconnect.clone()),
            timer_generation: 0,
            signal_epoch: 0,
            stopped: false,
            reported: None,
            session: SessionIdentity::new(store.clone(), config.session_key.clone()),
            queue: OfflineQueue::open(store, config.queue_key.clone()),
        };
        let manager = Self {
            inner: Arc::new(Inner {
                config,
                transport,
                runtime,
                link: Mutex::new(link),
                message_handlers: Mutex::new(Listeners::new()),
                status_handlers: Mutex::new(Listeners::new()),
            }),
        };
        manager.connect();
        manager
    }

    /// Open the transport unless it is already open or opening.
    ///
    /// Cancels a pending reconnect timer. From `GivenUp` it also resets the
    /// failure counter. Clears a previous `disconnect`.
    pub fn connect(&self) {
        let mut effects = Vec::new();
        {
            let mut link = self.inner.link.lock();
            link.stopped = false;
            self.inner.open_link(&mut link, &mut effects);
        }
        self.inner.apply(effects);
    }

    /// Send one user turn. Never fails: if the link is not open, or the write
    /// fails, the turn is queued and flushed after the next successful open.
    pub fn send(&self, text: &str, options: &SendOptions) -> SendOutcome {
        let mut link = self.inner.link.lock();
        let session = link.session.get();

        if link.state == ConnectionState::Open {
            if !link.queue.is_empty() {
                Inner::drain(&mut link, &session);
            }
            if link.queue.is_empty() {
                if let Some(active) = &link.active {
                    let frame = OutboundFrame::new(text, session.as_str(), options.clone());
                    match encode_outbound(&frame).and_then(|raw| active.handle.send(&raw)) {
                        Ok(()) => {
                            debug!("[Link] Sent turn ({} bytes)", text.len());
                            return SendOutcome::Sent;
                        }
                        Err(e) => warn!("[Link] Write failed, queueing turn: {}", e),
                    }
                }
            }
        } else {
            debug!("[Link] Not connected ({:?}), queueing turn", link.state);
        }

        let turn = QueuedTurn::new(text, options.clone(), self.inner.runtime.now_ms())
            .with_session(session);
        link.queue.enqueue(turn);
        SendOutcome::Queued
    }

    /// Register a handler for every decoded inbound frame.
    pub fn on_message<F>(&self, handler: F) -> Subscription
    where
        F: Fn(&InboundFrame) + Send + Sync + 'static,
    {
        let id = self.inner.message_handlers.lock().add(Arc::new(handler));
        Subscription {
            id,
            kind: ListenerKind::Message,
            inner: Arc::downgrade(&self.inner),
        }
    }

    /// Register a handler for connectivity changes (`true` = connected).
    pub fn on_status_change<F>(&self, handler: F) -> Subscription
    where
        F: Fn(bool) + Send + Sync + 'static,
    {
        let id = self.inner.status_handlers.lock().add(Arc::new(handler));
        Subscription {
            id,
            kind: ListenerKind::Status,
            inner: Arc::downgrade(&self.inner),
        }
    }

    /// React to a host environment signal.
    ///
    /// Ignored after [`disconnect`](Self::disconnect) until `connect` is called.
    pub fn handle_host_signal(&self, signal: HostSignal) {
        let mut effects = Vec::new();
        {
            let mut link = self.inner.link.lock();
            if link.stopped {
                debug!("[Link] Ignoring {:?} after disconnect", signal);
                return;
            }
            match signal {
                HostSignal::Online => {
                    info!("[Link] Network back, reconnecting");
                    if link.state == ConnectionState::Open {
                        Inner::report(&mut link, &mut effects, true);
                    }
                    self.inner.open_link(&mut link, &mut effects);
                }
                HostSignal::Visible => {
                    if link.state != ConnectionState::Open {
                        info!("[Link] Became visible while {:?}, reconnecting", link.state);
                        self.inner.open_link(&mut link, &mut effects);
                    }
                }
                HostSignal::Offline => {
                    info!("[Link] Network lost");
                    Inner::report(&mut link, &mut effects, false);
                }
                HostSignal::Hidden => debug!("[Link] Became hidden"),
            }
        }
        self.inner.apply(effects);
    }

    /// Forward signals from a broadcast channel until `disconnect`.
    pub fn listen_host_signals(&self, mut signals: tokio::sync::broadcast::Receiver<HostSignal>) {
        let epoch = self.inner.link.lock().signal_epoch;
        let weak = Arc::downgrade(&self.inner);
        self.inner.runtime.spawn(Box::pin(async move {
            loop {
                let signal = match signals.recv().await {
                    Ok(signal) => signal,
                    Err(tokio::sync::broadcast::error::RecvError::Lagged(n)) => {
                        debug!("[Link] Skipped {} host signals", n);
                        continue;
                    }
                    Err(tokio::sync::broadcast::error::RecvError::Closed) => return,
                };
                let Some(inner) = weak.upgrade() else { return };
                if inner.link.lock().signal_epoch != epoch {
                    return;
                }
                ConnectionManager { inner }.handle_host_signal(signal);
            }
        }));
    }

    /// Cancel any pending reconnect, close the transport and stop reacting to
    /// host signals. Nothing reconnects until `connect` is called again.
    pub fn disconnect(&self) {
        let mut effects = Vec::new();
        {
            let mut link = self.inner.link.lock();
            link.stopped = true;
            link.timer_generation += 1;
            link.signal_epoch += 1;
            if let Some(active) = link.active.take() {
                active.handle.close();
            }
            link.state = ConnectionState::Closed;
            Inner::report(&mut link, &mut effects, false);
            info!("[Link] Disconnected");
        }
        self.inner.apply(effects);
    }

    pub fn state(&self) -> ConnectionState {
        self.inner.link.lock().state
    }

    pub fn is_connected(&self) -> bool {
        self.state() == ConnectionState::Open
    }

    pub fn session_id(&self) -> String {
        self.inner.link.lock().session.get()
    }

    /// Start a new logical conversation. Queued turns keep their session.
    pub fn create_new_session(&self) -> String {
        self.inner.link.lock().session.reset()
    }

    pub fn pending_count(&self) -> usize {
        self.inner.link.lock().queue.len()
    }

    /// Drop every queued turn.
    pub fn clear_pending(&self) {
        self.inner.link.lock().queue.clear();
    }

    pub fn config(&self) -> &ClientConfig {
        &self.inner.config
    }
}

impl Inner {
    fn open_link(&self, link: &mut LinkState, effects: &mut Vec<Effect>) {
        match link.state {
            ConnectionState::Open => {
                debug!("[Link] Already connected");
                return;
            }
            ConnectionState::Connecting if link.active.is_some() => {
                debug!("[Link] Connection already in progress");
                return;
            }
            ConnectionState::GivenUp => link.retry.reset(),
            _ => {}
        }

        link.timer_generation += 1;
        link.state = ConnectionState::Connecting;
        link.next_link_id += 1;
        let link_id = link.next_link_id;

        match self.transport.open(&self.config.server_url) {
            Ok((handle, events)) => {
                debug!("[Link] Opening link {} to {}", link_id, self.config.server_url);
                link.active = Some(ActiveLink { id: link_id, handle });
                effects.push(Effect::Pump { link_id, events });
            }
            Err(e) if e.is_retryable() => {
                warn!("[Link] Failed to open transport: {}", e);
                Self::link_down(link, effects);
            }
            Err(e) => {
                error!("[Link] Cannot open transport, not retrying: {}", e);
                link.state = ConnectionState::GivenUp;
                Self::report(link, effects, false);
            }
        }
    }

    fn handle_event(self: &Arc<Self>, link_id: u64, event: TransportEvent) {
        match event {
            TransportEvent::Opened => {
                let mut effects = Vec::new();
                {
                    let mut link = self.link.lock();
                    if !Self::is_active(&link, link_id) || link.state == ConnectionState::Open {
                        return;
                    }
                    info!("[Link] Connected");
                    link.state = ConnectionState::Open;
                    link.retry.reset();
                    link.timer_generation += 1;
                    Self::report(&mut link, &mut effects, true);
                    let session = link.session.get();
                    Self::drain(&mut link, &session);
                }
                self.apply(effects);
            }
            TransportEvent::Message(raw) => {
                if !Self::is_active(&self.link.lock(), link_id) {
                    return;
                }
                match decode_inbound(&raw) {
                    Ok(frame) => {
                        let handlers = self.message_handlers.lock().snapshot();
                        for handler in handlers {
                            handler(&frame);
                        }
                    }
                    Err(e) => warn!("[Link] Dropping undecodable frame: {}", e),
                }
            }
            TransportEvent::Undelivered(frames) => {
                let now = self.runtime.now_ms();
                let turns: Vec<QueuedTurn> = frames
                    .iter()
                    .filter_map(|raw| match decode_undelivered(raw, now) {
                        Ok(turn) => Some(turn),
                        Err(e) => {
                            warn!("[Link] Dropping unreadable undelivered frame: {}", e);
                            None
                        }
                    })
                    .collect();
                let mut link = self.link.lock();
                warn!("[Link] {} turns were not delivered, requeueing", turns.len());
                link.queue.requeue_front(turns);
                // A newer link may already be open.
                if link.state == ConnectionState::Open {
                    let session = link.session.get();
                    Self::drain(&mut link, &session);
                }
            }
            TransportEvent::Closed | TransportEvent::Error(_) => {
                if let TransportEvent::Error(e) = &event {
                    warn!("[Link] Transport error: {}", e);
                }
                let mut effects = Vec::new();
                {
                    let mut link = self.link.lock();
                    if !Self::is_active(&link, link_id) {
                        return;
                    }
                    if let Some(active) = link.active.take() {
                        active.handle.close();
                    }
                    info!("[Link] Link {} closed", link_id);
                    Self::link_down(&mut link, &mut effects);
                }
                self.apply(effects);
            }
        }
    }

    fn on_timer(self: &Arc<Self>, generation: u64) {
        let mut effects = Vec::new();
        {
            let mut link = self.link.lock();
            if link.stopped
                || link.timer_generation != generation
                || link.state != ConnectionState::ReconnectScheduled
            {
                return;
            }
            self.open_link(&mut link, &mut effects);
        }
        self.apply(effects);
    }

    fn link_down(link: &mut LinkState, effects: &mut Vec<Effect>) {
        link.state = ConnectionState::Closed;
        Self::report(link, effects, false);
        if link.stopped {
            return;
        }
        let max = link.retry.config().max_attempts;
        match link.retry.on_failure() {
            RetryDecision::Retry(delay) => {
                info!(
                    "[Link] Reconnecting in {:?} (attempt {}/{})",
                    delay, link.retry.failures, max
                );
                link.state = ConnectionState::ReconnectScheduled;
                link.timer_generation += 1;
                effects.push(Effect::Schedule {
                    generation: link.timer_generation,
                    delay,
                });
            }
            RetryDecision::GiveUp => {
                error!(
                    "[Link] Giving up after {} consecutive failures",
                    link.retry.failures
                );
                link.state = ConnectionState::GivenUp;
            }
        }
    }

    fn drain(link: &mut LinkState, session: &str) {
        let LinkState { active, queue, .. } = link;
        if let Some(active) = active {
            queue.drain_into(|turn| {
                let raw = encode_queued(turn, session)?;
                active.handle.send(&raw)
            });
        }
    }

    fn report(link: &mut LinkState, effects: &mut Vec<Effect>, connected: bool) {
        if link.reported != Some(connected) {
            link.reported = Some(connected);
            effects.push(Effect::Status(connected));
        }
    }

    fn is_active(link: &LinkState, link_id: u64) -> bool {
        link.active.as_ref().is_some_and(|a| a.id == link_id)
    }

    fn apply(self: &Arc<Self>, effects: Vec<Effect>) {
        for effect in effects {
            match effect {
                Effect::Status(connected) => {
                    let handlers = self.status_handlers.lock().snapshot();
                    for handler in handlers {
                        handler(connected);
                    }
                }
                Effect::Schedule { generation, delay } => {
                    let weak = Arc::downgrade(self);
                    let sleep = self.runtime.sleep(delay);
                    self.runtime.spawn(Box::pin(async move {
                        sleep.await;
                        if let Some(inner) = weak.upgrade() {
                            inner.on_timer(generation);
                        }
                    }));
                }
                Effect::Pump { link_id, events } => {
                    let weak = Arc::downgrade(self);
                    self.runtime.spawn(Box::pin(async move {
                        while let Ok(event) = events.recv().await {
                            let Some(inner) = weak.upgrade() else { return };
                            inner.handle_event(link_id, event);
                        }
                        if let Some(inner) = weak.upgrade() {
                            inner.handle_event(link_id, TransportEvent::Closed);
                        }
                    }));
                }
            }
        }
    }
}

impl Drop for Inner {
    fn drop(&mut self) {
        if let Some(active) = self.link.get_mut().active.take() {
            active.handle.close();
        }
    }
}
