//! Loop lifecycle state shared between the loop thread and stopping threads.
//!
//! The state and the published window handle are the only mutable data the two
//! sides share. Both use `SeqCst` so a stop racing a start either observes the
//! handle (and posts the sentinel) or is observed by the starting thread before
//! it parks in the retrieval call.

use std::sync::atomic::{AtomicU8, AtomicUsize, Ordering};

use crate::error::PumpError;
use crate::message::WindowHandle;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[repr(u8)]
pub(crate) enum LoopState {
    Idle = 0,
    Running = 1,
    StopRequested = 2,
    Stopped = 3,
}

impl LoopState {
    fn from_u8(v: u8) -> Self {
        match v {
            0 => Self::Idle,
            1 => Self::Running,
            2 => Self::StopRequested,
            _ => Self::Stopped,
        }
    }

    pub(crate) fn as_str(self) -> &'static str {
        match self {
            Self::Idle => "idle",
            Self::Running => "running",
            Self::StopRequested => "stopping",
            Self::Stopped => "stopped",
        }
    }
}

/// Atomic state machine: `Idle -> Running -> StopRequested -> Stopped`.
pub(crate) struct LoopControl {
    state: AtomicU8,
    handle: AtomicUsize,
}

impl LoopControl {
    pub(crate) const fn new() -> Self {
        Self {
            state: AtomicU8::new(LoopState::Idle as u8),
            handle: AtomicUsize::new(0),
        }
    }

    pub(crate) fn state(&self) -> LoopState {
        LoopState::from_u8(self.state.load(Ordering::SeqCst))
    }

    /// `Idle -> Running`; any other starting state is a caller error.
    pub(crate) fn begin(&self) -> Result<(), PumpError> {
        self.state
            .compare_exchange(
                LoopState::Idle as u8,
                LoopState::Running as u8,
                Ordering::SeqCst,
                Ordering::SeqCst,
            )
            .map(|_| ())
            .map_err(|cur| PumpError::InvalidOperation(LoopState::from_u8(cur).as_str()))
    }

    /// `Running -> StopRequested`. Returns the handle to wake when this call made
    /// the transition and the window is already published.
    ///
    /// `None` covers both "nothing to do" and "window not published yet"; in the
    /// latter case the loop thread sees the request before blocking.
    pub(crate) fn request_stop(&self) -> Option<WindowHandle> {
        let won = self
            .state
            .compare_exchange(
                LoopState::Running as u8,
                LoopState::StopRequested as u8,
                Ordering::SeqCst,
                Ordering::SeqCst,
            )
            .is_ok();
        if !won {
            return None;
        }
        let raw = self.handle.load(Ordering::SeqCst);
        (raw != 0).then_some(WindowHandle::from_raw(raw))
    }

    pub(crate) fn stop_requested(&self) -> bool {
        self.state() == LoopState::StopRequested
    }

    pub(crate) fn publish(&self, handle: WindowHandle) {
        self.handle.store(handle.as_raw(), Ordering::SeqCst);
    }

    pub(crate) fn handle(&self) -> Option<WindowHandle> {
        let raw = self.handle.load(Ordering::SeqCst);
        (raw != 0).then_some(WindowHandle::from_raw(raw))
    }

    /// Clears the handle and moves to `Stopped`; terminal.
    pub(crate) fn finish(&self) {
        self.handle.store(0, Ordering::SeqCst);
        self.state.store(LoopState::Stopped as u8, Ordering::SeqCst);
    }
}
