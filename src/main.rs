//! Message-only window host.
//!
//! Runs a [`msgpump::MessagePump`] on the main thread and logs every message its hidden
//! window receives. The loop ends on Ctrl+C, after `--stop-after` seconds, or when a
//! subscriber fails.
//!
//! High-level flow:
//! 1. Parse CLI and configure tracing (-q / -v / --log-level, RUST_LOG narrows further).
//! 2. Subscribe a logging handler that answers every message with `--reply`.
//! 3. Install the Ctrl+C handler and the optional stop timer; both call stop from their own thread.
//! 4. With `--probe N`, a second thread waits for the window and sends it WM_APP + i.
//! 5. Pump on the main thread until stopped.

mod cli;
mod logging;

use anyhow::Result;
use clap::Parser;
use tracing::info;

use cli::Cli;

fn main() -> Result<()> {
    let cli = Cli::parse();
    logging::configure_logging(cli.effective_log_level())?;

    info!(
        version = env!("CARGO_PKG_VERSION"),
        ?cli,
        "starting msgpump"
    );

    run(cli)
}

#[cfg(windows)]
fn run(cli: Cli) -> Result<()> {
    use anyhow::Context;
    use std::sync::Arc;
    use std::thread;
    use std::time::Duration;

    use msgpump::MessagePump;

    let pump = Arc::new(MessagePump::new());

    let reply = cli.reply;
    pump.subscribe(move |msg| {
        info!(
            hwnd = ?msg.hwnd,
            id = %format!("0x{:04X}", msg.message),
            thread = msg.is_thread_message(),
            wparam = msg.wparam,
            lparam = msg.lparam,
            "message received"
        );
        Ok(reply)
    });

    {
        let pump = pump.clone();
        ctrlc::set_handler(move || {
            info!("Ctrl+C received, stopping message loop");
            pump.stop_message_loop();
        })
        .context("installing Ctrl+C handler")?;
    }

    if let Some(secs) = cli.stop_after {
        let pump = pump.clone();
        thread::Builder::new()
            .name("stop-timer".into())
            .spawn(move || {
                thread::sleep(Duration::from_secs(secs));
                info!(secs, "stop timer elapsed");
                pump.stop_message_loop();
            })
            .context("spawning stop timer")?;
    }

    if let Some(count) = cli.probe {
        let pump = pump.clone();
        thread::Builder::new()
            .name("probe".into())
            .spawn(move || probe(&pump, count))
            .context("spawning probe thread")?;
    }

    pump.start_message_loop().context("message loop failed")?;
    info!("message loop exited");
    Ok(())
}

/// Send `count` application messages to the pump's window and log each reply.
#[cfg(windows)]
fn probe(pump: &msgpump::MessagePump<msgpump::Win32>, count: u32) {
    use std::time::Duration;
    use tracing::warn;
    use windows::Win32::Foundation::{HWND, LPARAM, WPARAM};
    use windows::Win32::UI::WindowsAndMessaging::{SendMessageW, WM_APP};

    let handle = match pump.wait_until_running(Duration::from_secs(5)) {
        Ok(h) => h,
        Err(e) => {
            warn!(error = %e, "probe gave up waiting for the window");
            return;
        }
    };
    let hwnd = HWND::from(handle);
    for i in 0..count {
        let result = unsafe {
            SendMessageW(
                hwnd,
                WM_APP + i,
                Some(WPARAM(i as usize)),
                Some(LPARAM(0)),
            )
        };
        info!(id = %format!("0x{:04X}", WM_APP + i), reply = result.0, "probe reply");
    }
}

#[cfg(not(windows))]
fn run(_cli: Cli) -> Result<()> {
    anyhow::bail!("msgpump needs Windows: message-only windows are a Win32 facility")
}
