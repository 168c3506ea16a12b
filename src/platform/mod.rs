//! Native messaging backends.
//!
//! The pump owns the lifecycle; a platform only knows how to create its
//! thread-affine window, block for the next queued message and wake a blocked
//! loop from another thread.

use std::sync::Arc;

use crate::error::PumpError;
use crate::handler::Dispatcher;
use crate::message::WindowHandle;

#[cfg(test)]
pub(crate) mod loopback;
#[cfg(windows)]
pub mod win32;

/// Result of one blocking retrieval.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Pumped {
    /// A message was retrieved and offered to the subscribers.
    Dispatched,
    /// The shutdown sentinel was retrieved; it was not forwarded.
    Sentinel,
}

/// A messaging backend shared by the loop thread and stopping threads.
pub trait Platform: Send + Sync {
    type Window: PlatformWindow;

    /// Create the window on the calling thread. Every message it receives is
    /// offered to `dispatcher`.
    fn create_window(&self, dispatcher: Arc<Dispatcher>) -> Result<Self::Window, PumpError>;

    /// Enqueue the shutdown sentinel for `handle`. Callable from any thread,
    /// never blocks. Returns false if the window is already gone.
    fn post_sentinel(&self, handle: WindowHandle) -> bool;
}

/// A live window, used only on the thread that created it.
pub trait PlatformWindow {
    fn handle(&self) -> WindowHandle;

    /// Block until the next queued message, dispatching it unless it is the
    /// sentinel. Synchronously sent messages may be handled while blocked.
    fn pump_one(&mut self) -> Result<Pumped, PumpError>;

    /// Release the native window. Idempotent.
    fn destroy(&mut self);
}
