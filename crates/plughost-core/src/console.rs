//! Line-oriented console command loop.
//!
//! Reads commands from a blocking reader on its own thread. `exit` or `quit`
//! cancels the shutdown token and ends the loop. Blank lines are ignored. Any
//! other line is split into a command name and its arguments and handed to
//! the caller's handler.

use std::io::BufRead;
use std::thread::JoinHandle;

use tokio_util::sync::CancellationToken;

/// A parsed console line.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConsoleCommand {
    pub name: String,
    pub args: Vec<String>,
}

impl ConsoleCommand {
    /// Split a line on whitespace. Returns `None` for a blank line.
    pub fn parse(line: &str) -> Option<Self> {
        let mut parts = line.split_whitespace();
        let name = parts.next()?.to_string();
        Some(Self {
            name,
            args: parts.map(str::to_string).collect(),
        })
    }

    pub fn is_exit(&self) -> bool {
        matches!(self.name.as_str(), "exit" | "quit")
    }
}

/// Why the loop ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConsoleExit {
    /// `exit` or `quit` was entered; shutdown has been requested.
    ShutdownRequested,
    /// The reader hit end of input or failed. No shutdown was requested.
    InputClosed,
    /// Shutdown was requested elsewhere before the next line was read.
    Cancelled,
}

/// Summary of one loop run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ConsoleReport {
    pub lines_read: usize,
    pub commands_handled: usize,
    pub exit: ConsoleExit,
}

/// Run the command loop until exit, end of input, or cancellation.
pub fn run_command_loop<R, F>(mut reader: R, shutdown: &CancellationToken, mut handler: F) -> ConsoleReport
where
    R: BufRead,
    F: FnMut(ConsoleCommand),
{
    let mut lines_read = 0;
    let mut commands_handled = 0;
    let mut line = String::new();

    let exit = loop {
        if shutdown.is_cancelled() {
            break ConsoleExit::Cancelled;
        }

        line.clear();
        match reader.read_line(&mut line) {
            Ok(0) => break ConsoleExit::InputClosed,
            Ok(_) => lines_read += 1,
            Err(e) => {
                tracing::warn!("Console read failed: {}", e);
                break ConsoleExit::InputClosed;
            }
        }

        let Some(command) = ConsoleCommand::parse(&line) else {
            continue;
        };

        if command.is_exit() {
            tracing::info!("Shutdown requested from console");
            shutdown.cancel();
            break ConsoleExit::ShutdownRequested;
        }

        tracing::debug!(command = %command.name, args = ?command.args, "Console command");
        handler(command);
        commands_handled += 1;
    };

    ConsoleReport {
        lines_read,
        commands_handled,
        exit,
    }
}

/// Run the command loop over stdin on a dedicated thread.
pub fn spawn_stdin_loop<F>(
    shutdown: CancellationToken,
    handler: F,
) -> std::io::Result<JoinHandle<ConsoleReport>>
where
    F: FnMut(ConsoleCommand) + Send + 'static,
{
    std::thread::Builder::new()
        .name("plughost-console".to_string())
        .spawn(move || {
            let stdin = std::io::stdin();
            run_command_loop(stdin.lock(), &shutdown, handler)
        })
}
