//! Win32 message-only window (`HWND_MESSAGE` parent) and its retrieval step.
//!
//! The window class is shared by every pump in the process: the first live
//! window registers it and the last one to be destroyed unregisters it. Windows
//! are bound to their dispatcher through a thread-local map, which matches the
//! thread affinity of the windows themselves.

use std::cell::RefCell;
use std::collections::HashMap;
use std::rc::Rc;
use std::sync::{Arc, Mutex, PoisonError};

use once_cell::sync::OnceCell;
use tracing::{debug, trace, warn};
use widestring::U16CString;
use windows::Win32::Foundation::{HINSTANCE, HWND, LPARAM, LRESULT, WPARAM};
use windows::Win32::System::LibraryLoader::GetModuleHandleW;
use windows::Win32::UI::WindowsAndMessaging::{
    CreateWindowExW, DefWindowProcW, DestroyWindow, DispatchMessageW, GetMessageW, HWND_MESSAGE,
    MSG, PostMessageW, RegisterClassExW, RegisterWindowMessageW, TranslateMessage,
    UnregisterClassW, WINDOW_EX_STYLE, WINDOW_STYLE, WNDCLASSEXW,
};
use windows::core::PCWSTR;

use super::{Platform, PlatformWindow, Pumped};
use crate::error::PumpError;
use crate::handler::{Dispatch, Dispatcher};
use crate::message::{WindowHandle, WindowMessage};

const CLASS_NAME: &str = "MsgPump.MessageOnlyWindow";
// Registered rather than picked from the WM_APP range so it can never collide
// with an application's own message ids.
const SENTINEL_NAME: &str = "MsgPump.StopMessageLoop";

static CLASS: OnceCell<U16CString> = OnceCell::new();
static SENTINEL: OnceCell<u32> = OnceCell::new();
static CLASS_USERS: Mutex<usize> = Mutex::new(0);

struct Binding {
    dispatcher: Arc<Dispatcher>,
    sentinel: u32,
}

thread_local! {
    static BOUND: RefCell<HashMap<usize, Rc<Binding>>> = RefCell::new(HashMap::new());
}

/// The Win32 platform. Stateless; all OS state lives in the windows it creates.
#[derive(Clone, Copy, Debug, Default)]
pub struct Win32;

impl Platform for Win32 {
    type Window = MessageOnlyWindow;

    fn create_window(&self, dispatcher: Arc<Dispatcher>) -> Result<MessageOnlyWindow, PumpError> {
        MessageOnlyWindow::create(dispatcher)
    }

    fn post_sentinel(&self, handle: WindowHandle) -> bool {
        let Ok(sentinel) = sentinel_message() else {
            return false;
        };
        unsafe { PostMessageW(Some(handle.into()), sentinel, WPARAM(0), LPARAM(0)) }
            .inspect_err(|e| debug!(?handle, error = %e, "PostMessageW failed"))
            .is_ok()
    }
}

/// Hidden window whose only purpose is to be an addressable message target.
///
/// Thread-affine: it must be pumped and destroyed on the thread that created it.
pub struct MessageOnlyWindow {
    hwnd: HWND,
    sentinel: u32,
    dispatcher: Arc<Dispatcher>,
    destroyed: bool,
}

impl MessageOnlyWindow {
    /// Register the class if needed and create the window on the calling thread.
    pub fn create(dispatcher: Arc<Dispatcher>) -> Result<Self, PumpError> {
        let sentinel = sentinel_message()?;
        let instance = module_instance()?;
        let class = acquire_class(instance)?;
        let created = unsafe {
            CreateWindowExW(
                WINDOW_EX_STYLE(0),
                PCWSTR(class.as_ptr()),
                PCWSTR::null(),
                WINDOW_STYLE(0),
                0,
                0,
                0,
                0,
                Some(HWND_MESSAGE),
                None,
                Some(instance),
                None,
            )
        };
        let hwnd = match created {
            Ok(h) => h,
            Err(e) => {
                release_class(instance);
                return Err(PumpError::creation("CreateWindowExW", e));
            }
        };
        BOUND.with(|b| {
            b.borrow_mut().insert(
                hwnd.0 as usize,
                Rc::new(Binding {
                    dispatcher: dispatcher.clone(),
                    sentinel,
                }),
            )
        });
        debug!(hwnd = ?WindowHandle::from(hwnd), "message-only window created");
        Ok(Self {
            hwnd,
            sentinel,
            dispatcher,
            destroyed: false,
        })
    }
}

impl PlatformWindow for MessageOnlyWindow {
    fn handle(&self) -> WindowHandle {
        self.hwnd.into()
    }

    fn pump_one(&mut self) -> Result<Pumped, PumpError> {
        let mut msg = MSG::default();
        // Sent messages are delivered to the window procedure from inside this call.
        let r = unsafe { GetMessageW(&mut msg, None, 0, 0) };
        if r.0 == -1 {
            return Err(PumpError::Retrieval(Box::new(
                windows::core::Error::from_win32(),
            )));
        }
        if msg.message == self.sentinel {
            return Ok(Pumped::Sentinel);
        }
        if msg.hwnd.is_invalid() {
            // Thread message (WM_QUIT included, r == 0): no window procedure to route through.
            let message =
                WindowMessage::new(WindowHandle::NULL, msg.message, msg.wParam.0, msg.lParam.0);
            self.dispatcher.dispatch(&message);
            return Ok(Pumped::Dispatched);
        }
        unsafe {
            let _ = TranslateMessage(&msg);
            DispatchMessageW(&msg);
        }
        Ok(Pumped::Dispatched)
    }

    fn destroy(&mut self) {
        if self.destroyed {
            return;
        }
        self.destroyed = true;
        // Unbind first: messages generated by DestroyWindow go to DefWindowProcW.
        BOUND.with(|b| b.borrow_mut().remove(&(self.hwnd.0 as usize)));
        if let Err(e) = unsafe { DestroyWindow(self.hwnd) } {
            warn!(error = %e, "DestroyWindow failed");
        }
        match module_instance() {
            Ok(instance) => release_class(instance),
            Err(e) => warn!(error = %e, "cannot release window class"),
        }
        trace!(hwnd = ?WindowHandle::from(self.hwnd), "message-only window destroyed");
    }
}

impl Drop for MessageOnlyWindow {
    fn drop(&mut self) {
        self.destroy();
    }
}

unsafe extern "system" fn message_only_wnd_proc(
    hwnd: HWND,
    msg: u32,
    wparam: WPARAM,
    lparam: LPARAM,
) -> LRESULT {
    let binding = BOUND.with(|b| b.borrow().get(&(hwnd.0 as usize)).cloned());
    let Some(binding) = binding else {
        return unsafe { DefWindowProcW(hwnd, msg, wparam, lparam) };
    };
    if msg == binding.sentinel {
        return LRESULT(0);
    }
    let message = WindowMessage::new(hwnd.into(), msg, wparam.0, lparam.0);
    match binding.dispatcher.dispatch(&message) {
        Dispatch::Replied(v) => LRESULT(v),
        Dispatch::Unhandled => unsafe { DefWindowProcW(hwnd, msg, wparam, lparam) },
        Dispatch::Failed => {
            // A failing sent message leaves GetMessageW blocked; wake it so the loop exits.
            unsafe {
                let _ = PostMessageW(Some(hwnd), binding.sentinel, WPARAM(0), LPARAM(0));
            }
            LRESULT(0)
        }
    }
}

fn class_name() -> Result<&'static U16CString, PumpError> {
    CLASS.get_or_try_init(|| {
        U16CString::from_str(CLASS_NAME).map_err(|e| PumpError::creation("class name", e))
    })
}

fn sentinel_message() -> Result<u32, PumpError> {
    SENTINEL
        .get_or_try_init(|| {
            let name = U16CString::from_str(SENTINEL_NAME)
                .map_err(|e| PumpError::creation("sentinel name", e))?;
            let id = unsafe { RegisterWindowMessageW(PCWSTR(name.as_ptr())) };
            if id == 0 {
                return Err(PumpError::creation(
                    "RegisterWindowMessageW",
                    windows::core::Error::from_win32(),
                ));
            }
            debug!(id = %format!("0x{id:04X}"), "shutdown sentinel registered");
            Ok(id)
        })
        .copied()
}

fn module_instance() -> Result<HINSTANCE, PumpError> {
    let module = unsafe { GetModuleHandleW(PCWSTR::null()) }
        .map_err(|e| PumpError::creation("GetModuleHandleW", e))?;
    Ok(HINSTANCE(module.0))
}

/// Take a reference on the process-wide window class, registering it on first use.
fn acquire_class(instance: HINSTANCE) -> Result<&'static U16CString, PumpError> {
    let name = class_name()?;
    let mut users = CLASS_USERS.lock().unwrap_or_else(PoisonError::into_inner);
    if *users == 0 {
        let wc = WNDCLASSEXW {
            cbSize: std::mem::size_of::<WNDCLASSEXW>() as u32,
            lpfnWndProc: Some(message_only_wnd_proc),
            hInstance: instance,
            lpszClassName: PCWSTR(name.as_ptr()),
            ..Default::default()
        };
        if unsafe { RegisterClassExW(&wc) } == 0 {
            return Err(PumpError::creation(
                "RegisterClassExW",
                windows::core::Error::from_win32(),
            ));
        }
        debug!(class = CLASS_NAME, "window class registered");
    }
    *users += 1;
    Ok(name)
}

fn release_class(instance: HINSTANCE) {
    let mut users = CLASS_USERS.lock().unwrap_or_else(PoisonError::into_inner);
    if *users == 0 {
        return;
    }
    *users -= 1;
    if *users > 0 {
        return;
    }
    let Some(name) = CLASS.get() else {
        return;
    };
    match unsafe { UnregisterClassW(PCWSTR(name.as_ptr()), Some(instance)) } {
        Ok(()) => debug!(class = CLASS_NAME, "window class unregistered"),
        Err(e) => warn!(class = CLASS_NAME, error = %e, "UnregisterClassW failed"),
    }
}
