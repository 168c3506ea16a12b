//! `MessageReceived` subscribers and the dispatch step shared by every platform.
//!
//! Handlers run on the loop thread, one message at a time, in registration
//! order. Native delivery expects exactly one reply, so the last non-zero reply
//! wins and zero is returned when every handler answers zero.

use std::any::Any;
use std::panic::{self, AssertUnwindSafe};
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Mutex, PoisonError};

use tracing::{error, trace};

use crate::error::HandlerError;
use crate::message::WindowMessage;
use crate::state::LoopControl;

/// Handler signature: the `Ok` value is the reply seen by a sender.
pub type MessageHandler = dyn Fn(&WindowMessage) -> Result<isize, HandlerError> + Send + Sync;

/// Token returned by `subscribe`, used to unsubscribe.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct HandlerId(u64);

/// Outcome of offering one message to the subscribers.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Dispatch {
    /// Subscribers ran; reply with this value.
    Replied(isize),
    /// Nobody to deliver to (no subscribers, stop requested, or an earlier
    /// failure); the platform default procedure should answer.
    Unhandled,
    /// A handler failed on this message. The platform must wake the loop so it
    /// can exit; the reply is 0.
    Failed,
}

/// First unrecovered handler condition, kept until the loop returns it.
pub(crate) enum Failure {
    Error(HandlerError),
    Panic(Box<dyn Any + Send + 'static>),
}

/// Ordered handler list plus the failure slot, shared by the pump and its window.
pub struct Dispatcher {
    handlers: Mutex<Vec<(HandlerId, Arc<MessageHandler>)>>,
    next_id: AtomicU64,
    control: Arc<LoopControl>,
    failed: AtomicBool,
    failure: Mutex<Option<Failure>>,
}

impl Dispatcher {
    pub(crate) fn new(control: Arc<LoopControl>) -> Self {
        Self {
            handlers: Mutex::new(Vec::new()),
            next_id: AtomicU64::new(1),
            control,
            failed: AtomicBool::new(false),
            failure: Mutex::new(None),
        }
    }

    pub(crate) fn subscribe<F>(&self, handler: F) -> HandlerId
    where
        F: Fn(&WindowMessage) -> Result<isize, HandlerError> + Send + Sync + 'static,
    {
        let handler: Arc<MessageHandler> = Arc::new(handler);
        let id = HandlerId(self.next_id.fetch_add(1, Ordering::Relaxed));
        self.handlers
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push((id, handler));
        id
    }

    pub(crate) fn unsubscribe(&self, id: HandlerId) -> bool {
        let mut list = self.handlers.lock().unwrap_or_else(PoisonError::into_inner);
        let before = list.len();
        list.retain(|(h, _)| *h != id);
        list.len() != before
    }

    /// Offer `msg` to every subscriber. Must be called on the loop thread.
    ///
    /// The list is snapshotted so handlers may subscribe, unsubscribe or send to
    /// their own window without deadlocking.
    pub fn dispatch(&self, msg: &WindowMessage) -> Dispatch {
        if self.has_failed() || self.control.stop_requested() {
            return Dispatch::Unhandled;
        }
        let snapshot: Vec<Arc<MessageHandler>> = self
            .handlers
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .iter()
            .map(|(_, h)| h.clone())
            .collect();
        if snapshot.is_empty() {
            return Dispatch::Unhandled;
        }
        let mut reply = 0isize;
        for handler in snapshot {
            match panic::catch_unwind(AssertUnwindSafe(|| handler(msg))) {
                Ok(Ok(0)) => {}
                Ok(Ok(r)) => reply = r,
                Ok(Err(e)) => {
                    error!(id = msg.message, error = %e, "message handler returned an error");
                    self.record(Failure::Error(e));
                    return Dispatch::Failed;
                }
                Err(payload) => {
                    error!(id = msg.message, "message handler panicked");
                    self.record(Failure::Panic(payload));
                    return Dispatch::Failed;
                }
            }
        }
        trace!(id = msg.message, reply, "message dispatched");
        Dispatch::Replied(reply)
    }

    pub(crate) fn has_failed(&self) -> bool {
        self.failed.load(Ordering::SeqCst)
    }

    pub(crate) fn take_failure(&self) -> Option<Failure> {
        self.failure
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take()
    }

    fn record(&self, failure: Failure) {
        let mut slot = self.failure.lock().unwrap_or_else(PoisonError::into_inner);
        if slot.is_none() {
            *slot = Some(failure);
        }
        self.failed.store(true, Ordering::SeqCst);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::message::WindowHandle;
    use std::sync::atomic::AtomicUsize;

    fn dispatcher() -> Dispatcher {
        let control = Arc::new(LoopControl::new());
        control.begin().unwrap();
        Dispatcher::new(control)
    }

    fn msg(id: u32) -> WindowMessage {
        WindowMessage::new(WindowHandle::from_raw(1), id, 0, 0)
    }

    #[test]
    fn no_subscribers_is_unhandled() {
        assert_eq!(dispatcher().dispatch(&msg(1)), Dispatch::Unhandled);
    }

    #[test]
    fn last_non_zero_reply_wins() {
        let d = dispatcher();
        d.subscribe(|_| Ok(5));
        d.subscribe(|_| Ok(9));
        d.subscribe(|_| Ok(0));
        assert_eq!(d.dispatch(&msg(1)), Dispatch::Replied(9));
    }

    #[test]
    fn handlers_run_in_registration_order() {
        let d = dispatcher();
        let order = Arc::new(Mutex::new(Vec::new()));
        for tag in ["a", "b", "c"] {
            let order = order.clone();
            d.subscribe(move |_| {
                order.lock().unwrap().push(tag);
                Ok(0)
            });
        }
        assert_eq!(d.dispatch(&msg(1)), Dispatch::Replied(0));
        assert_eq!(*order.lock().unwrap(), ["a", "b", "c"]);
    }

    #[test]
    fn unsubscribe_removes_only_that_handler() {
        let d = dispatcher();
        let first = d.subscribe(|_| Ok(1));
        d.subscribe(|_| Ok(0));
        assert!(d.unsubscribe(first));
        assert!(!d.unsubscribe(first));
        assert_eq!(d.dispatch(&msg(1)), Dispatch::Replied(0));
    }

    #[test]
    fn error_fails_and_silences_later_messages() {
        let d = dispatcher();
        let calls = Arc::new(AtomicUsize::new(0));
        let c = calls.clone();
        d.subscribe(move |m| {
            c.fetch_add(1, Ordering::SeqCst);
            if m.message == 2 { Err("boom".into()) } else { Ok(0) }
        });
        assert_eq!(d.dispatch(&msg(1)), Dispatch::Replied(0));
        assert_eq!(d.dispatch(&msg(2)), Dispatch::Failed);
        assert_eq!(d.dispatch(&msg(3)), Dispatch::Unhandled);
        assert_eq!(calls.load(Ordering::SeqCst), 2);
        assert!(matches!(d.take_failure(), Some(Failure::Error(e)) if e.to_string() == "boom"));
    }

    #[test]
    fn panic_is_captured() {
        let d = dispatcher();
        d.subscribe(|_| panic!("handler exploded"));
        assert_eq!(d.dispatch(&msg(1)), Dispatch::Failed);
        assert!(d.has_failed());
        assert!(matches!(d.take_failure(), Some(Failure::Panic(_))));
    }

    #[test]
    fn stop_request_silences_subscribers() {
        let control = Arc::new(LoopControl::new());
        control.begin().unwrap();
        let d = Dispatcher::new(control.clone());
        d.subscribe(|_| Ok(1));
        control.request_stop();
        assert_eq!(d.dispatch(&msg(1)), Dispatch::Unhandled);
    }
}
