use std::time::{Duration, Instant};

use anyhow::Result;
use crossterm::event::{self, Event, KeyCode, KeyEvent, KeyEventKind, KeyModifiers};
use ratatui::DefaultTerminal;
use tokio::time::MissedTickBehavior;
use tracing::info;

use crate::core::config::ClientConfig;
use crate::games::pong::protocol::Steer;
use crate::games::pong::renderer;
use crate::games::pong::session::Session;

/// Terminals rarely report key releases, so a key counts as held for this
/// long after its last press or auto-repeat.
const HOLD_WINDOW: Duration = Duration::from_millis(150);

#[derive(Debug, Default)]
struct HeldKeys {
    up: Option<Instant>,
    down: Option<Instant>,
}

impl HeldKeys {
    fn record(&mut self, key: KeyEvent, now: Instant) {
        let slot = match key.code {
            KeyCode::Up => &mut self.up,
            KeyCode::Down => &mut self.down,
            _ => return,
        };
        *slot = match key.kind {
            KeyEventKind::Release => None,
            KeyEventKind::Press | KeyEventKind::Repeat => Some(now),
        };
    }

    fn steer(&self, now: Instant) -> Steer {
        let held = |at: Option<Instant>| at.is_some_and(|at| now.duration_since(at) < HOLD_WINDOW);
        Steer::from_keys(held(self.up), held(self.down))
    }
}

fn is_quit(key: &KeyEvent) -> bool {
    match key.code {
        KeyCode::Esc | KeyCode::Char('q') => true,
        KeyCode::Char('c') => key.modifiers.contains(KeyModifiers::CONTROL),
        _ => false,
    }
}

/// Drives a [`Session`] at the configured tick rate until the player quits.
pub async fn run_client(config: ClientConfig, mut terminal: DefaultTerminal) -> Result<()> {
    info!(server = %config.server_addr, trigger = ?config.start_trigger, "client starting");
    let mut interval = tokio::time::interval(config.tick);
    interval.set_missed_tick_behavior(MissedTickBehavior::Skip);
    let mut session = Session::new(config);
    let mut keys = HeldKeys::default();

    'frames: loop {
        interval.tick().await;

        // INPUT (non-blocking)
        while event::poll(Duration::from_millis(0))? {
            if let Event::Key(key) = event::read()? {
                if is_quit(&key) {
                    break 'frames;
                }
                keys.record(key, Instant::now());
            }
        }

        let view = session.on_tick(keys.steer(Instant::now()));
        terminal.draw(|frame| renderer::render(frame, &view))?;
    }

    info!(attempts = session.connect_attempts(), "client quitting");
    session.shutdown();
    Ok(())
}
