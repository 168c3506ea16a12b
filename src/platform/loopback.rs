//! In-process platform for unit tests.
//!
//! Mirrors the native queue contract: the loop blocks on a channel, `post` is
//! fire-and-forget, `send` blocks the caller until the loop thread replies.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::mpsc::{self, Receiver, Sender};
use std::sync::{Arc, Mutex};

use super::{Platform, PlatformWindow, Pumped};
use crate::error::PumpError;
use crate::handler::{Dispatch, Dispatcher};
use crate::message::{WindowHandle, WindowMessage};

enum Entry {
    Posted(WindowMessage),
    Sent(WindowMessage, Sender<isize>),
    Sentinel,
}

#[derive(Default)]
struct Registry {
    queues: Mutex<HashMap<usize, Sender<Entry>>>,
    next: AtomicUsize,
    refuse_create: AtomicBool,
}

#[derive(Clone, Default)]
pub(crate) struct Loopback {
    registry: Arc<Registry>,
}

impl Loopback {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    /// A platform whose window creation always fails.
    pub(crate) fn refusing() -> Self {
        let lb = Self::default();
        lb.registry.refuse_create.store(true, Ordering::SeqCst);
        lb
    }

    fn enqueue(&self, handle: WindowHandle, entry: Entry) -> bool {
        let queues = self.registry.queues.lock().unwrap();
        match queues.get(&handle.as_raw()) {
            Some(tx) => tx.send(entry).is_ok(),
            None => false,
        }
    }

    pub(crate) fn post(
        &self,
        handle: WindowHandle,
        message: u32,
        wparam: usize,
        lparam: isize,
    ) -> bool {
        self.enqueue(
            handle,
            Entry::Posted(WindowMessage::new(handle, message, wparam, lparam)),
        )
    }

    /// Post a thread message to the queue owning `handle`.
    pub(crate) fn post_thread(&self, handle: WindowHandle, message: u32) -> bool {
        self.enqueue(
            handle,
            Entry::Posted(WindowMessage::new(WindowHandle::NULL, message, 0, 0)),
        )
    }

    /// Blocks until the loop thread has handled the message. `None` if the
    /// window is gone or was destroyed before replying.
    pub(crate) fn send(
        &self,
        handle: WindowHandle,
        message: u32,
        wparam: usize,
        lparam: isize,
    ) -> Option<isize> {
        let (tx, rx) = mpsc::channel();
        let msg = WindowMessage::new(handle, message, wparam, lparam);
        if !self.enqueue(handle, Entry::Sent(msg, tx)) {
            return None;
        }
        rx.recv().ok()
    }
}

impl Platform for Loopback {
    type Window = LoopbackWindow;

    fn create_window(&self, dispatcher: Arc<Dispatcher>) -> Result<LoopbackWindow, PumpError> {
        if self.registry.refuse_create.load(Ordering::SeqCst) {
            return Err(PumpError::creation("loopback window", "creation refused"));
        }
        let raw = 0x1000 + 0x10 * self.registry.next.fetch_add(1, Ordering::SeqCst);
        let (tx, rx) = mpsc::channel();
        self.registry.queues.lock().unwrap().insert(raw, tx);
        Ok(LoopbackWindow {
            handle: WindowHandle::from_raw(raw),
            rx,
            dispatcher,
            registry: self.registry.clone(),
            destroyed: false,
        })
    }

    fn post_sentinel(&self, handle: WindowHandle) -> bool {
        self.enqueue(handle, Entry::Sentinel)
    }
}

pub(crate) struct LoopbackWindow {
    handle: WindowHandle,
    rx: Receiver<Entry>,
    dispatcher: Arc<Dispatcher>,
    registry: Arc<Registry>,
    destroyed: bool,
}

impl PlatformWindow for LoopbackWindow {
    fn handle(&self) -> WindowHandle {
        self.handle
    }

    fn pump_one(&mut self) -> Result<Pumped, PumpError> {
        let entry = self
            .rx
            .recv()
            .map_err(|e| PumpError::Retrieval(Box::new(e)))?;
        match entry {
            Entry::Sentinel => Ok(Pumped::Sentinel),
            Entry::Posted(msg) => {
                self.dispatcher.dispatch(&msg);
                Ok(Pumped::Dispatched)
            }
            Entry::Sent(msg, reply) => {
                let value = match self.dispatcher.dispatch(&msg) {
                    Dispatch::Replied(v) => v,
                    Dispatch::Unhandled | Dispatch::Failed => 0,
                };
                let _ = reply.send(value);
                Ok(Pumped::Dispatched)
            }
        }
    }

    fn destroy(&mut self) {
        if self.destroyed {
            return;
        }
        self.destroyed = true;
        self.registry.queues.lock().unwrap().remove(&self.handle.as_raw());
    }
}
