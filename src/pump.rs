//! Message loop controller.
//!
//! `start_message_loop` is the only path that creates the native window, so the
//! window always lives on the thread that pumps it. The call blocks until
//! `stop_message_loop` (from any thread) or a failing handler ends the loop, and
//! the window is destroyed before it returns.

use std::panic;
use std::sync::{Arc, Condvar, Mutex, PoisonError};
use std::time::Duration;

use tracing::{debug, error, info, trace, warn};

use crate::error::{HandlerError, PumpError};
use crate::handler::{Dispatcher, Failure, HandlerId};
use crate::message::{WindowHandle, WindowMessage};
use crate::platform::{Platform, PlatformWindow, Pumped};
use crate::state::{LoopControl, LoopState};

/// A message-only window plus the loop that pumps it.
///
/// Share it in an `Arc`: one thread calls [`start_message_loop`], any thread may
/// call [`stop_message_loop`], [`handle`] or [`subscribe`].
///
/// [`start_message_loop`]: MessagePump::start_message_loop
/// [`stop_message_loop`]: MessagePump::stop_message_loop
/// [`handle`]: MessagePump::handle
/// [`subscribe`]: MessagePump::subscribe
pub struct MessagePump<P: Platform> {
    platform: P,
    control: Arc<LoopControl>,
    dispatcher: Arc<Dispatcher>,
    ready: Mutex<()>,
    ready_cv: Condvar,
}

#[cfg(windows)]
impl MessagePump<crate::platform::win32::Win32> {
    /// A pump backed by a Win32 `HWND_MESSAGE` window.
    pub fn new() -> Self {
        Self::with_platform(crate::platform::win32::Win32)
    }
}

#[cfg(windows)]
impl Default for MessagePump<crate::platform::win32::Win32> {
    fn default() -> Self {
        Self::new()
    }
}

impl<P: Platform> MessagePump<P> {
    pub fn with_platform(platform: P) -> Self {
        let control = Arc::new(LoopControl::new());
        Self {
            platform,
            dispatcher: Arc::new(Dispatcher::new(control.clone())),
            control,
            ready: Mutex::new(()),
            ready_cv: Condvar::new(),
        }
    }

    /// Register a `MessageReceived` handler.
    ///
    /// Handlers run on the loop thread in registration order. The reply seen by
    /// a sender is the last non-zero `Ok` value (zero if all return zero). An
    /// `Err` or a panic ends the loop and is surfaced by `start_message_loop`.
    pub fn subscribe<F>(&self, handler: F) -> HandlerId
    where
        F: Fn(&WindowMessage) -> Result<isize, HandlerError> + Send + Sync + 'static,
    {
        self.dispatcher.subscribe(handler)
    }

    /// Remove a handler; false if it was not registered.
    pub fn unsubscribe(&self, id: HandlerId) -> bool {
        self.dispatcher.unsubscribe(id)
    }

    /// The window handle, valid only while the loop is running.
    pub fn handle(&self) -> Result<WindowHandle, PumpError> {
        self.control.handle().ok_or_else(|| match self.control.state() {
            LoopState::Idle | LoopState::Running => {
                PumpError::InvalidState("window not created yet")
            }
            LoopState::StopRequested | LoopState::Stopped => {
                PumpError::InvalidState("window destroyed")
            }
        })
    }

    /// Block until the loop has published its window handle.
    ///
    /// Fails with `InvalidState` on timeout or if the loop already finished.
    pub fn wait_until_running(&self, timeout: Duration) -> Result<WindowHandle, PumpError> {
        let guard = self.ready.lock().unwrap_or_else(PoisonError::into_inner);
        let (_guard, _) = self
            .ready_cv
            .wait_timeout_while(guard, timeout, |_| {
                self.control.handle().is_none() && self.control.state() != LoopState::Stopped
            })
            .unwrap_or_else(PoisonError::into_inner);
        self.handle()
    }

    pub fn is_running(&self) -> bool {
        self.control.state() == LoopState::Running
    }

    pub fn has_stopped(&self) -> bool {
        self.control.state() == LoopState::Stopped
    }

    /// Run the message loop on the calling thread.
    ///
    /// Creates the window, pumps until stopped, destroys the window. A pump's
    /// loop runs at most once; a second call fails with `InvalidOperation`.
    pub fn start_message_loop(&self) -> Result<(), PumpError> {
        self.control.begin()?;
        let finish = FinishGuard(self);
        info!("starting message loop");

        let mut window = self
            .platform
            .create_window(self.dispatcher.clone())
            .inspect_err(|e| error!(error = %e, "message-only window creation failed"))?;
        let handle = window.handle();
        self.control.publish(handle);
        self.notify_ready();
        debug!(?handle, "message-only window ready");

        let outcome = self.pump(&mut window);

        self.control.publish(WindowHandle::NULL);
        window.destroy();
        debug!(?handle, "message-only window destroyed");
        drop(finish);
        info!("message loop stopped");

        match self.dispatcher.take_failure() {
            Some(Failure::Panic(payload)) => panic::resume_unwind(payload),
            Some(Failure::Error(e)) => Err(PumpError::Handler(e)),
            None => outcome,
        }
    }

    /// Ask the loop to exit. Never blocks; a no-op unless the loop is running.
    pub fn stop_message_loop(&self) {
        match self.control.request_stop() {
            Some(handle) => {
                if self.platform.post_sentinel(handle) {
                    debug!(?handle, "shutdown sentinel posted");
                } else {
                    warn!(?handle, "failed to post shutdown sentinel");
                }
            }
            None => trace!(
                state = self.control.state().as_str(),
                "stop request needs no sentinel"
            ),
        }
    }

    fn pump(&self, window: &mut P::Window) -> Result<(), PumpError> {
        loop {
            if self.should_exit() {
                return Ok(());
            }
            match window.pump_one()? {
                Pumped::Dispatched => {}
                Pumped::Sentinel if self.should_exit() => return Ok(()),
                Pumped::Sentinel => trace!("ignoring unrequested shutdown sentinel"),
            }
        }
    }

    fn should_exit(&self) -> bool {
        self.control.stop_requested() || self.dispatcher.has_failed()
    }

    fn notify_ready(&self) {
        let _guard = self.ready.lock().unwrap_or_else(PoisonError::into_inner);
        self.ready_cv.notify_all();
    }
}

/// Moves the pump to `Stopped` however `start_message_loop` exits.
struct FinishGuard<'a, P: Platform>(&'a MessagePump<P>);

impl<P: Platform> Drop for FinishGuard<'_, P> {
    fn drop(&mut self) {
        self.0.control.finish();
        self.0.notify_ready();
    }
}
