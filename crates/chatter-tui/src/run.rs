//! TUI entry point and main event loop.
//!
//! The event loop is single-threaded and cooperative: keyboard input,
//! server traffic, and the redraw tick all arrive as events on one
//! channel, processed in order between draws.
//!
//! # Architecture
//!
//! 1. **Keyboard Task**: Polls for keyboard input and sends events to the main loop
//! 2. **Server Connection Task**: Owns the socket and forwards inbound messages
//! 3. **Main Event Loop**: Processes events, updates state, and renders the UI
//!
//! All tasks respect a shared `CancellationToken` for graceful shutdown.

use std::io::{self, Stdout};
use std::sync::Arc;
use std::time::Duration;

use crossterm::{
    event::{self, Event as CrosstermEvent},
    execute,
    terminal::{disable_raw_mode, enable_raw_mode, EnterAlternateScreen, LeaveAlternateScreen},
};
use ratatui::{backend::CrosstermBackend, Terminal};
use rustls::ClientConfig;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use chatter_protocol::{HexColor, Message};

use crate::app::App;
use crate::client::{self, ServerConnection};
use crate::error::Result as TuiResult;
use crate::error::TuiError;
use crate::input::{handle_key_event, Action, Event};
use crate::ui;

/// Tick interval for periodic UI refresh.
const TICK_RATE: Duration = Duration::from_millis(100);

/// Grace period for background tasks on shutdown.
const TASK_SHUTDOWN_GRACE: Duration = Duration::from_millis(100);

/// Everything the client needs to start.
#[derive(Debug, Clone)]
pub struct UiOptions {
    pub host: String,
    pub port: u16,
    pub tls: Option<Arc<ClientConfig>>,
    pub username: String,
    pub color: HexColor,
}

// ============================================================================
// Terminal Setup / Cleanup
// ============================================================================

/// Initializes the terminal for TUI rendering.
///
/// Sets up raw mode and the alternate screen buffer so the user's
/// shell content survives the session.
fn setup_terminal() -> TuiResult<Terminal<CrosstermBackend<Stdout>>> {
    enable_raw_mode().map_err(|e| TuiError::TerminalInit(e.to_string()))?;

    let mut stdout = io::stdout();
    execute!(stdout, EnterAlternateScreen).map_err(|e| TuiError::TerminalInit(e.to_string()))?;

    let backend = CrosstermBackend::new(stdout);
    Terminal::new(backend).map_err(|e| TuiError::TerminalInit(e.to_string()))
}

/// Restores the terminal to its original state.
///
/// This should always be called before exiting, even on error.
fn cleanup_terminal(terminal: &mut Terminal<CrosstermBackend<Stdout>>) -> TuiResult<()> {
    disable_raw_mode().map_err(|e| TuiError::TerminalCleanup(e.to_string()))?;

    execute!(terminal.backend_mut(), LeaveAlternateScreen)
        .map_err(|e| TuiError::TerminalCleanup(e.to_string()))?;

    terminal
        .show_cursor()
        .map_err(|e| TuiError::TerminalCleanup(e.to_string()))?;

    Ok(())
}

// ============================================================================
// Keyboard Input Task
// ============================================================================

/// Spawns a task that polls for keyboard input and sends events to the
/// channel.
///
/// Runs crossterm's synchronous poll inside `spawn_blocking`, with a
/// short timeout so cancellation is noticed promptly.
fn spawn_keyboard_task(
    event_tx: mpsc::UnboundedSender<Event>,
    cancel_token: CancellationToken,
) -> tokio::task::JoinHandle<()> {
    tokio::spawn(async move {
        loop {
            if cancel_token.is_cancelled() {
                debug!("Keyboard task shutting down");
                break;
            }

            let poll_result = tokio::task::spawn_blocking(|| {
                if event::poll(Duration::from_millis(50)).unwrap_or(false) {
                    event::read().ok()
                } else {
                    None
                }
            })
            .await;

            match poll_result {
                Ok(Some(CrosstermEvent::Key(key))) => {
                    if event_tx.send(Event::Key(key)).is_err() {
                        debug!("Event channel closed, keyboard task exiting");
                        break;
                    }
                }
                Ok(Some(CrosstermEvent::Resize(width, height))) => {
                    if event_tx.send(Event::Resize(width, height)).is_err() {
                        break;
                    }
                }
                Ok(Some(_)) => {
                    // Other events (Mouse, Paste, etc.) - ignore
                }
                Ok(None) => {
                    // No event, continue polling
                }
                Err(e) => {
                    error!(error = %e, "Keyboard polling task panicked");
                    break;
                }
            }
        }
    })
}

// ============================================================================
// Main Event Loop
// ============================================================================

/// Runs the main TUI event loop until quit or disconnect-and-quit.
async fn run_event_loop(
    terminal: &mut Terminal<CrosstermBackend<Stdout>>,
    app: &mut App,
    event_rx: &mut mpsc::UnboundedReceiver<Event>,
    outbound_tx: &mpsc::UnboundedSender<Message>,
    cancel_token: &CancellationToken,
) {
    loop {
        // Render the UI. A draw failure is logged, not fatal; the next
        // tick retries.
        match terminal.draw(|frame| ui::render(frame, app)) {
            Ok(completed) => {
                // Feed the real viewport height back so scroll
                // clamping matches the drawn area.
                let layout = ui::layout::AppLayout::new(completed.area);
                app.history.set_viewport_height(layout.viewport_inner_height());
            }
            Err(e) => {
                error!(error = %e, "Draw failed");
            }
        }

        // Wait for an event with timeout (for tick)
        let event = tokio::time::timeout(TICK_RATE, event_rx.recv()).await;

        match event {
            Ok(Some(received_event)) => match received_event {
                Event::Key(key) => {
                    let action = handle_key_event(key, app);
                    match action {
                        Action::Quit => {
                            info!("User requested quit");
                            cancel_token.cancel();
                            break;
                        }
                        Action::Submit(msg) => {
                            // The line shows up once the server echoes
                            // it back, same as for everyone else.
                            if outbound_tx.send(msg).is_err() {
                                warn!("Connection task gone, cannot send");
                                app.push_system("Not connected".to_string());
                            }
                        }
                        Action::None => {}
                    }
                }
                Event::Resize(_width, _height) => {
                    // Redraw happens on the next iteration; the layout
                    // recomputes from the new frame area.
                    debug!("Terminal resized");
                }
                Event::Inbound(msg) => {
                    app.apply_inbound(msg);
                }
                Event::Disconnected => {
                    warn!("Server disconnected");
                    app.mark_disconnected();
                    app.push_system("Disconnected from server");
                }
            },
            Ok(None) => {
                warn!("Event channel closed");
                break;
            }
            Err(_) => {
                // Timeout expired, just continue to redraw
            }
        }

        if app.should_quit {
            cancel_token.cancel();
            break;
        }

        if cancel_token.is_cancelled() {
            break;
        }
    }
}

// ============================================================================
// Entry Point
// ============================================================================

/// Connects to the server and runs the TUI until the user quits.
///
/// The connection is established before the terminal switches to the
/// alternate screen, so a refused connection surfaces as a normal
/// error message instead of a corrupted display.
pub async fn run(options: UiOptions) -> TuiResult<()> {
    let stream = client::connect(&options.host, options.port, options.tls.clone()).await?;
    info!(host = %options.host, port = options.port, "Connected to server");

    let (event_tx, mut event_rx) = mpsc::unbounded_channel::<Event>();
    let (outbound_tx, outbound_rx) = mpsc::unbounded_channel::<Message>();
    let cancel_token = CancellationToken::new();

    let mut terminal = setup_terminal()?;

    let mut app = App::new(options.username.clone(), options.color.clone());
    app.push_system(format!(
        "Connected to server {}:{}",
        options.host, options.port
    ));

    let hello = Message::join(options.username, options.color);
    let connection = ServerConnection::new(
        event_tx.clone(),
        outbound_rx,
        cancel_token.clone(),
        hello,
    );
    let connection_handle = tokio::spawn(async move {
        connection.run(stream).await;
    });

    let keyboard_handle = spawn_keyboard_task(event_tx, cancel_token.clone());

    run_event_loop(
        &mut terminal,
        &mut app,
        &mut event_rx,
        &outbound_tx,
        &cancel_token,
    )
    .await;

    cancel_token.cancel();

    let _ = tokio::time::timeout(TASK_SHUTDOWN_GRACE, connection_handle).await;
    let _ = tokio::time::timeout(TASK_SHUTDOWN_GRACE, keyboard_handle).await;

    cleanup_terminal(&mut terminal)?;

    info!("Chat client stopped");
    Ok(())
}
