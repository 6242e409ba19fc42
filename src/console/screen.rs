use std::{
    io::{self, Write},
    sync::Mutex,
};

use crate::service::ServiceStatus;

const PROMPT: &str = "> ";
const CLEAR_WIDTH: usize = 80;

/// Serializes all writes to the interactive display. Notifications arrive
/// from the service loop while the user may be mid-keystroke, so every
/// clear/write/prompt sequence runs under one lock.
pub struct Screen {
    out: Mutex<Box<dyn Write + Send>>,
}

impl Screen {
    pub fn stdout() -> Self {
        Self::new(Box::new(io::stdout()))
    }

    pub fn new(out: Box<dyn Write + Send>) -> Self {
        Self {
            out: Mutex::new(out),
        }
    }

    fn write(&self, text: &str) {
        let mut out = self.out.lock().unwrap();
        // Display write failures are not actionable, drop them.
        let _ = out.write_all(text.as_bytes());
        let _ = out.flush();
    }

    pub fn println(&self, message: &str) {
        self.write(&format!("{message}\n"));
    }

    pub fn prompt(&self) {
        self.write(PROMPT);
    }

    /// Clears whatever the user typed so far, prints the notification, and
    /// redraws the prompt when the console still expects input.
    pub fn notification(&self, message: &str, redraw_prompt: bool) {
        let mut text = format!("\r{}\r{message}\n", " ".repeat(CLEAR_WIDTH));
        if redraw_prompt {
            text.push_str(PROMPT);
        }
        self.write(&text);
    }

    pub fn help(&self) {
        self.write(concat!(
            "Available commands:\n",
            "  p, pause  - Pause keep-alive (allows system to sleep)\n",
            "  r, resume - Resume keep-alive\n",
            "  t, toggle - Toggle pause/resume\n",
            "  s, status - Show current status\n",
            "  h, help   - Show this help\n",
            "  q, quit   - Exit program\n",
            "\n",
            "Command line usage:\n",
            "  stayawake [method] [interval]\n",
            "\n",
            "Keep-alive methods:\n",
            "  ExecutionState - Asks the OS to stay awake directly (recommended)\n",
            "  MouseJiggle    - Simulates minimal mouse movement\n",
            "  Hybrid         - Combines both methods (default)\n",
            "\n",
            "Examples:\n",
            "  stayawake\n",
            "  stayawake ExecutionState 60\n",
            "  stayawake MouseJiggle 30\n",
            "  stayawake Hybrid 45\n",
            "\n",
        ));
    }

    pub fn status(&self, status: &ServiceStatus) {
        let state = if status.running {
            if status.paused {
                "RUNNING (PAUSED)"
            } else {
                "RUNNING (ACTIVE)"
            }
        } else {
            "STOPPED"
        };

        let mut text = format!(
            "Status: {state}\nMethod: {}\nInterval: {} seconds\n",
            status.method,
            status.interval.as_secs()
        );
        if status.paused {
            text.push_str("System can currently go idle/sleep\n");
        } else if status.running {
            text.push_str("System is being kept awake\n");
        }
        text.push('\n');
        self.write(&text);
    }
}
