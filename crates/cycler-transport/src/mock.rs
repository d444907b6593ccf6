use crate::{
    CanCmd, CanFrame, CanLink, Result, ScpiCmd, ScpiLink, ScpiReply, ScpiRx, TransportError,
};
use std::collections::{HashMap, HashSet, VecDeque};
use std::sync::{Arc, Mutex, MutexGuard};
use tracing::debug;

fn lock<T>(m: &Mutex<T>) -> MutexGuard<'_, T> {
    // Poisoning cannot corrupt these plain queues; keep going.
    m.lock().unwrap_or_else(|e| e.into_inner())
}

#[derive(Default)]
struct CanInner {
    sent: Vec<CanCmd>,
    rx: VecDeque<CanFrame>,
}

/// In-process stand-in for the CAN sniffer. Clones share state, so a test
/// can keep one handle while the detector consumes the other.
#[derive(Clone, Default)]
pub struct MockCanLink {
    inner: Arc<Mutex<CanInner>>,
}

impl MockCanLink {
    pub fn new() -> Self {
        Self::default()
    }

    /// Queue an inbound frame as if the bus had delivered it.
    pub fn push_frame(&self, frame: CanFrame) {
        lock(&self.inner).rx.push_back(frame);
    }

    /// Every command sent so far, in order.
    pub fn sent(&self) -> Vec<CanCmd> {
        lock(&self.inner).sent.clone()
    }
}

impl CanLink for MockCanLink {
    fn send(&mut self, cmd: CanCmd) -> Result<()> {
        debug!(?cmd, "mock can send");
        lock(&self.inner).sent.push(cmd);
        Ok(())
    }

    fn try_recv(&mut self) -> Result<Option<CanFrame>> {
        Ok(lock(&self.inner).rx.pop_front())
    }
}

#[derive(Default)]
struct ScpiInner {
    sent: Vec<ScpiCmd>,
    open: HashSet<String>,
    pending: HashMap<String, VecDeque<ScpiReply>>,
}

/// In-process stand-in for the SCPI sniffer. Replies are queued per channel
/// name and may be staged before the channel is opened.
#[derive(Clone, Default)]
pub struct MockScpiLink {
    inner: Arc<Mutex<ScpiInner>>,
}

impl MockScpiLink {
    pub fn new() -> Self {
        Self::default()
    }

    /// Stage a reply for the named channel.
    pub fn push_reply(&self, chan_name: &str, reply: ScpiReply) {
        lock(&self.inner)
            .pending
            .entry(chan_name.to_string())
            .or_default()
            .push_back(reply);
    }

    /// Every command sent so far, in order.
    pub fn sent(&self) -> Vec<ScpiCmd> {
        lock(&self.inner).sent.clone()
    }

    /// Channel names currently open.
    pub fn open_channels(&self) -> Vec<String> {
        let mut names: Vec<String> = lock(&self.inner).open.iter().cloned().collect();
        names.sort();
        names
    }
}

impl ScpiLink for MockScpiLink {
    type Rx = MockScpiRx;

    fn send(&mut self, cmd: ScpiCmd) -> Result<()> {
        debug!(?cmd, "mock scpi send");
        lock(&self.inner).sent.push(cmd);
        Ok(())
    }

    fn open_rx(&mut self, chan_name: &str) -> Result<Self::Rx> {
        let mut inner = lock(&self.inner);
        if !inner.open.insert(chan_name.to_string()) {
            return Err(TransportError::ChannelInUse(chan_name.to_string()));
        }
        Ok(MockScpiRx {
            name: chan_name.to_string(),
            inner: Arc::clone(&self.inner),
        })
    }
}

/// Receive handle bound to one named mock channel.
pub struct MockScpiRx {
    name: String,
    inner: Arc<Mutex<ScpiInner>>,
}

impl ScpiRx for MockScpiRx {
    fn try_recv(&mut self) -> Result<Option<ScpiReply>> {
        Ok(lock(&self.inner)
            .pending
            .get_mut(&self.name)
            .and_then(VecDeque::pop_front))
    }
}

impl Drop for MockScpiRx {
    fn drop(&mut self) {
        let mut inner = lock(&self.inner);
        inner.open.remove(&self.name);
        inner.pending.remove(&self.name);
    }
}
