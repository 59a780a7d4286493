//! In-memory transport driven by the caller.
//!
//! Every `open` creates a [`ScriptedLink`]; the caller decides when it opens,
//! what it delivers and when it closes. Written frames are recorded.

use crate::error::{LinkError, Result};
use crate::traits::{Transport, TransportEvent, TransportHandle};
use parking_lot::Mutex;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;

#[derive(Clone)]
pub struct ScriptedLink {
    pub url: String,
    events: async_channel::Sender<TransportEvent>,
    closed: Arc<AtomicBool>,
    fail_writes: Arc<AtomicBool>,
    sent: Arc<Mutex<Vec<String>>>,
    written: Arc<Mutex<Vec<String>>>,
}

impl ScriptedLink {
    pub fn open(&self) {
        let _ = self.events.try_send(TransportEvent::Opened);
    }

    pub fn deliver(&self, frame: impl Into<String>) {
        let _ = self.events.try_send(TransportEvent::Message(frame.into()));
    }

    pub fn close(&self) {
        self.closed.store(true, Ordering::SeqCst);
        let _ = self.events.try_send(TransportEvent::Closed);
    }

    pub fn fail(&self, reason: impl Into<String>) {
        let _ = self.events.try_send(TransportEvent::Error(reason.into()));
    }

    /// Make subsequent writes on this link fail.
    pub fn set_fail_writes(&self, fail: bool) {
        self.fail_writes.store(fail, Ordering::SeqCst);
    }

    /// Pretend the last `n` frames written on this link were accepted but
    /// never reached the wire, then fail the link.
    pub fn lose_last_writes(&self, n: usize) {
        let lost = {
            let mut written = self.written.lock();
            let keep = written.len().saturating_sub(n);
            written.split_off(keep)
        };
        {
            let mut sent = self.sent.lock();
            for frame in lost.iter().rev() {
                if let Some(pos) = sent.iter().rposition(|s| s == frame) {
                    sent.remove(pos);
                }
            }
        }
        self.closed.store(true, Ordering::SeqCst);
        let _ = self.events.try_send(TransportEvent::Undelivered(lost));
        let _ = self
            .events
            .try_send(TransportEvent::Error("connection reset".into()));
    }

    /// Whether the manager (or the script) closed this link.
    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::SeqCst)
    }
}

struct ScriptedHandle {
    closed: Arc<AtomicBool>,
    fail_writes: Arc<AtomicBool>,
    sent: Arc<Mutex<Vec<String>>>,
    written: Arc<Mutex<Vec<String>>>,
}

impl TransportHandle for ScriptedHandle {
    fn send(&self, frame: &str) -> Result<()> {
        if self.closed.load(Ordering::SeqCst) {
            return Err(LinkError::Closed);
        }
        if self.fail_writes.load(Ordering::SeqCst) {
            return Err(LinkError::Transport("scripted write failure".into()));
        }
        self.sent.lock().push(frame.to_string());
        self.written.lock().push(frame.to_string());
        Ok(())
    }

    fn close(&self) {
        self.closed.store(true, Ordering::SeqCst);
    }
}

#[derive(Default)]
pub struct ScriptedTransport {
    links: Mutex<Vec<ScriptedLink>>,
    sent: Arc<Mutex<Vec<String>>>,
    refuse: AtomicUsize,
    reject_config: AtomicBool,
}

impl ScriptedTransport {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    /// Make the next `n` calls to `open` fail synchronously.
    pub fn refuse_next(&self, n: usize) {
        self.refuse.store(n, Ordering::SeqCst);
    }

    /// Make every later `open` fail with a configuration error.
    pub fn reject_config(&self) {
        self.reject_config.store(true, Ordering::SeqCst);
    }

    /// Number of transports opened so far.
    pub fn open_count(&self) -> usize {
        self.links.lock().len()
    }

    pub fn link(&self, index: usize) -> Option<ScriptedLink> {
        self.links.lock().get(index).cloned()
    }

    pub fn last(&self) -> Option<ScriptedLink> {
        self.links.lock().last().cloned()
    }

    /// Every frame written, across all links, in write order.
    pub fn sent(&self) -> Vec<String> {
        self.sent.lock().clone()
    }

    /// The `content` field of every frame written.
    pub fn sent_contents(&self) -> Vec<String> {
        self.sent()
            .iter()
            .filter_map(|raw| serde_json::from_str::<serde_json::Value>(raw).ok())
            .filter_map(|v| v["content"].as_str().map(str::to_string))
            .collect()
    }
}

impl Transport for ScriptedTransport {
    fn open(
        &self,
        url: &str,
    ) -> Result<(
        Box<dyn TransportHandle>,
        async_channel::Receiver<TransportEvent>,
    )> {
        let refused = self
            .refuse
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
            .is_ok();
        if self.reject_config.load(Ordering::SeqCst) {
            return Err(LinkError::Config(format!("scripted rejection of {}", url)));
        }
        if refused {
            return Err(LinkError::Transport("scripted open refusal".into()));
        }

        let (tx, rx) = async_channel::unbounded();
        let closed = Arc::new(AtomicBool::new(false));
        let fail_writes = Arc::new(AtomicBool::new(false));
        let written = Arc::new(Mutex::new(Vec::new()));
        self.links.lock().push(ScriptedLink {
            url: url.to_string(),
            events: tx,
            closed: closed.clone(),
            fail_writes: fail_writes.clone(),
            sent: self.sent.clone(),
            written: written.clone(),
        });
        Ok((
            Box::new(ScriptedHandle {
                closed,
                fail_writes,
                sent: self.sent.clone(),
                written,
            }),
            rx,
        ))
    }
}
