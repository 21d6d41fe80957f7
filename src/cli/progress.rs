//! Console spinner
//!
//! Draws a braille spinner with a status message on stderr while a slow
//! operation is in flight. stdout stays clean for the manifest itself.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use console::{Term, style};
use tokio::task::JoinHandle;

use crate::constants::session::{SPINNER_FRAMES, SPINNER_INTERVAL_MS};
use crate::session::ProgressSink;

pub struct ConsoleSpinner {
    active: Arc<AtomicBool>,
    handle: Mutex<Option<JoinHandle<()>>>,
    term: Term,
}

impl ConsoleSpinner {
    pub fn new() -> Self {
        Self {
            active: Arc::new(AtomicBool::new(false)),
            handle: Mutex::new(None),
            term: Term::stderr(),
        }
    }

    /// Start rendering loop (non-blocking)
    fn start_render_loop(&self, message: String) -> JoinHandle<()> {
        let active = self.active.clone();
        let term = self.term.clone();

        tokio::spawn(async move {
            let mut frame = 0usize;
            while active.load(Ordering::SeqCst) {
                let line = render_frame(frame, &message);
                // spinner output is best effort
                let _ = term.clear_line();
                let _ = term.write_str(&line);
                frame = frame.wrapping_add(1);
                tokio::time::sleep(Duration::from_millis(SPINNER_INTERVAL_MS)).await;
            }
        })
    }
}

impl Default for ConsoleSpinner {
    fn default() -> Self {
        Self::new()
    }
}

impl ProgressSink for ConsoleSpinner {
    fn start(&self, message: &str) {
        if !self.term.is_term() {
            return;
        }

        let mut handle = self
            .handle
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        if let Some(previous) = handle.take() {
            previous.abort();
        }

        self.active.store(true, Ordering::SeqCst);
        *handle = Some(self.start_render_loop(message.to_string()));
    }

    fn stop(&self) {
        if !self.active.swap(false, Ordering::SeqCst) {
            return;
        }

        if let Some(handle) = self
            .handle
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .take()
        {
            handle.abort();
        }
        let _ = self.term.clear_line();
    }
}

fn render_frame(frame: usize, message: &str) -> String {
    let glyph = SPINNER_FRAMES[frame % SPINNER_FRAMES.len()];
    format!("{} {}", style(glyph).cyan(), style(message).dim())
}
