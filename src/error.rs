//! Error taxonomy for the message pump.

use thiserror::Error;

/// Boxed error returned by a `MessageReceived` handler.
pub type HandlerError = Box<dyn std::error::Error + Send + Sync + 'static>;

/// Errors surfaced synchronously by pump operations.
#[derive(Debug, Error)]
pub enum PumpError {
    /// The OS refused to register the window class / sentinel or to create the window.
    #[error("failed to create message-only window ({stage})")]
    WindowCreation {
        stage: &'static str,
        #[source]
        source: HandlerError,
    },
    /// Handle or loop used outside its valid lifetime.
    #[error("invalid state: {0}")]
    InvalidState(&'static str),
    /// Illegal state transition (a pump's loop runs at most once).
    #[error("invalid operation: message loop is {0}")]
    InvalidOperation(&'static str),
    /// Native message retrieval failed.
    #[error("message retrieval failed")]
    Retrieval(#[source] HandlerError),
    /// A subscriber returned an error; the loop ended because of it.
    #[error("message handler failed")]
    Handler(#[source] HandlerError),
}

impl PumpError {
    #[cfg(any(windows, test))]
    pub(crate) fn creation(stage: &'static str, source: impl Into<HandlerError>) -> Self {
        Self::WindowCreation {
            stage,
            source: source.into(),
        }
    }
}
