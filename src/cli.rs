//! Command line interface for the `msgpump` host binary.

use clap::{ArgAction, Parser, ValueEnum};

/// Host a message-only window on the main thread and log what it receives.
#[derive(Parser, Debug)]
#[command(
    version,
    about = concat!(
        env!("CARGO_PKG_NAME"), " v", env!("CARGO_PKG_VERSION"),
        " - Pump a hidden message-only window and log every message it receives.",
    )
)]
pub struct Cli {
    /// Reply value returned to senders for every message.
    #[arg(long, default_value_t = 0, allow_negative_numbers = true)]
    pub reply: isize,
    /// Once the window is up, send N messages (WM_APP + i) to it from a second thread.
    #[arg(long, value_name = "N")]
    pub probe: Option<u32>,
    /// Stop the message loop after this many seconds (default: run until Ctrl+C).
    #[arg(long = "stop-after", value_name = "SECS")]
    pub stop_after: Option<u64>,
    /// Log level when neither -v nor -q is given.
    #[arg(long = "log-level", value_enum)]
    pub log_level: Option<LogLevel>,
    /// Increase verbosity (-v=debug, -vv=trace). Overrides --log-level.
    #[arg(short = 'v', long = "verbose", action = ArgAction::Count)]
    pub verbose: u8,
    /// Quiet mode: only warnings and errors. Overrides -v and --log-level.
    #[arg(short = 'q', long = "quiet")]
    pub quiet: bool,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, ValueEnum)]
pub enum LogLevel {
    Error,
    Warn,
    Info,
    Debug,
    Trace,
}

impl Cli {
    /// Precedence: `-q`, then `-vv` / `-v`, then `--log-level`, then INFO.
    pub fn effective_log_level(&self) -> LogLevel {
        if self.quiet {
            LogLevel::Warn
        } else if self.verbose > 1 {
            LogLevel::Trace
        } else if self.verbose == 1 {
            LogLevel::Debug
        } else {
            self.log_level.unwrap_or(LogLevel::Info)
        }
    }
}
