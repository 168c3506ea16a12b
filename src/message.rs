//! Message records handed to `MessageReceived` subscribers.

use std::fmt;

/// Opaque native window identifier.
///
/// A plain value: copying it never extends the window's lifetime, and it may be
/// moved to any thread to address messages at the window.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct WindowHandle(usize);

impl WindowHandle {
    /// The null handle (thread messages carry it).
    pub const NULL: WindowHandle = WindowHandle(0);

    pub const fn from_raw(raw: usize) -> Self {
        Self(raw)
    }

    pub const fn as_raw(self) -> usize {
        self.0
    }

    pub const fn is_null(self) -> bool {
        self.0 == 0
    }
}

impl fmt::Debug for WindowHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "WindowHandle(0x{:X})", self.0)
    }
}

#[cfg(windows)]
impl From<windows::Win32::Foundation::HWND> for WindowHandle {
    fn from(hwnd: windows::Win32::Foundation::HWND) -> Self {
        Self(hwnd.0 as usize)
    }
}

#[cfg(windows)]
impl From<WindowHandle> for windows::Win32::Foundation::HWND {
    fn from(handle: WindowHandle) -> Self {
        windows::Win32::Foundation::HWND(handle.0 as *mut core::ffi::c_void)
    }
}

/// One message retrieved by the loop.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct WindowMessage {
    pub hwnd: WindowHandle,
    pub message: u32,
    pub wparam: usize,
    pub lparam: isize,
}

impl WindowMessage {
    pub const fn new(hwnd: WindowHandle, message: u32, wparam: usize, lparam: isize) -> Self {
        Self {
            hwnd,
            message,
            wparam,
            lparam,
        }
    }

    /// True for messages posted to the thread rather than to a window.
    pub const fn is_thread_message(&self) -> bool {
        self.hwnd.is_null()
    }
}
