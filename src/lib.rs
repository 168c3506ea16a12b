//! Thread-hostable message pump around a hidden message-only window.
//!
//! A [`MessagePump`] creates its window on the thread that calls
//! [`MessagePump::start_message_loop`] and pumps it there until another thread
//! calls [`MessagePump::stop_message_loop`]. Every message retrieved for the
//! window is republished to the `MessageReceived` subscribers; for sent
//! messages the subscribers' reply becomes the sender's result.
//!
//! ```no_run
//! # #[cfg(windows)] {
//! use std::sync::Arc;
//! use msgpump::MessagePump;
//!
//! let pump = Arc::new(MessagePump::new());
//! pump.subscribe(|msg| {
//!     println!("0x{:04X}", msg.message);
//!     Ok(0)
//! });
//! let stopper = pump.clone();
//! std::thread::spawn(move || {
//!     std::thread::sleep(std::time::Duration::from_secs(1));
//!     stopper.stop_message_loop();
//! });
//! pump.start_message_loop().unwrap();
//! # }
//! ```

pub mod error;
pub mod handler;
pub mod message;
pub mod platform;
pub mod pump;
mod state;

pub use error::{HandlerError, PumpError};
pub use handler::{Dispatch, Dispatcher, HandlerId, MessageHandler};
pub use message::{WindowHandle, WindowMessage};
pub use platform::{Platform, PlatformWindow, Pumped};
pub use pump::MessagePump;

#[cfg(windows)]
pub use platform::win32::{MessageOnlyWindow, Win32};
