//! Interactive command console. Translates single-word commands into service
//! calls and renders service notifications, both running concurrently with
//! the keep-alive loop.

pub mod screen;

use std::sync::{Arc, Mutex};

use tokio::{
    io::{AsyncBufReadExt, BufReader},
    sync::broadcast::{self, error::RecvError},
    task::JoinHandle,
};
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use crate::service::{KeepAliveService, Notification};

use screen::Screen;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Command {
    Pause,
    Resume,
    Toggle,
    Status,
    Help,
    Quit,
    Empty,
    Unknown,
}

fn parse_command(input: &str) -> Command {
    match input.trim().to_lowercase().as_str() {
        "p" | "pause" => Command::Pause,
        "r" | "resume" => Command::Resume,
        "t" | "toggle" => Command::Toggle,
        "s" | "status" => Command::Status,
        "h" | "help" => Command::Help,
        "q" | "quit" | "exit" => Command::Quit,
        "" => Command::Empty,
        _ => Command::Unknown,
    }
}

/// Returns true when the user asked to exit.
async fn dispatch(service: &KeepAliveService, screen: &Screen, input: &str) -> bool {
    match parse_command(input) {
        Command::Pause => service.pause().await,
        Command::Resume => service.resume().await,
        Command::Toggle => service.toggle().await,
        Command::Status => screen.status(&service.status()),
        Command::Help => screen.help(),
        Command::Quit => return true,
        Command::Empty => (),
        Command::Unknown => screen.println("Unknown command. Type 'h' for help."),
    }
    false
}

pub struct Console {
    service: Arc<KeepAliveService>,
    screen: Arc<Screen>,
    cancel: CancellationToken,
    pump_task: Mutex<Option<JoinHandle<()>>>,
    input_task: Mutex<Option<JoinHandle<()>>>,
}

impl Console {
    pub fn new(service: Arc<KeepAliveService>) -> Self {
        Self::with_screen(service, Arc::new(Screen::stdout()))
    }

    pub fn with_screen(service: Arc<KeepAliveService>, screen: Arc<Screen>) -> Self {
        Self {
            service,
            screen,
            cancel: CancellationToken::new(),
            pump_task: Mutex::new(None),
            input_task: Mutex::new(None),
        }
    }

    /// Subscribes to service notifications, shows the help banner, and
    /// launches the input loop.
    pub fn start(&self) {
        let pump = tokio::spawn(pump_notifications(
            self.service.subscribe(),
            self.service.clone(),
            self.screen.clone(),
            self.cancel.clone(),
        ));
        *self.pump_task.lock().unwrap() = Some(pump);

        self.screen.help();

        let input = tokio::spawn(input_loop(
            self.service.clone(),
            self.screen.clone(),
            self.cancel.clone(),
        ));
        *self.input_task.lock().unwrap() = Some(input);
    }

    /// Signals both loops to exit and waits for the notification subscription
    /// to be fully torn down. Idempotent.
    pub async fn stop(&self) {
        self.cancel.cancel();
        let pump = self.pump_task.lock().unwrap().take();
        if let Some(pump) = pump {
            let _ = pump.await;
        }
    }

    /// Suspends the caller until the input loop has fully terminated.
    pub async fn wait_for_exit(&self) {
        let input = self.input_task.lock().unwrap().take();
        if let Some(input) = input {
            let _ = input.await;
        }
    }
}

async fn pump_notifications(
    mut events: broadcast::Receiver<Notification>,
    service: Arc<KeepAliveService>,
    screen: Arc<Screen>,
    cancel: CancellationToken,
) {
    loop {
        tokio::select! {
            _ = cancel.cancelled() => {
                // Drain what the service already sent, without prompt redraws.
                while let Ok(notification) = events.try_recv() {
                    screen.notification(&notification.message, false);
                }
                return;
            }
            received = events.recv() => match received {
                Ok(notification) => {
                    let redraw = service.is_running() && !cancel.is_cancelled();
                    screen.notification(&notification.message, redraw);
                }
                Err(RecvError::Lagged(missed)) => {
                    // A slow display must not affect the service.
                    warn!("Notification pump lagged, skipped {missed} messages");
                }
                Err(RecvError::Closed) => return,
            },
        }
    }
}

async fn input_loop(
    service: Arc<KeepAliveService>,
    screen: Arc<Screen>,
    cancel: CancellationToken,
) {
    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    screen.prompt();

    loop {
        let line = tokio::select! {
            _ = cancel.cancelled() => return,
            line = lines.next_line() => line,
        };

        match line {
            Ok(Some(line)) => {
                if dispatch(&service, &screen, &line).await {
                    info!("Exit requested from console");
                    cancel.cancel();
                    return;
                }
                if !cancel.is_cancelled() {
                    screen.prompt();
                }
            }
            // EOF means there is no terminal left to read from.
            Ok(None) => {
                cancel.cancel();
                return;
            }
            Err(e) => {
                screen.println(&format!("Input error: {e}"));
                screen.prompt();
            }
        }
    }
}

#[cfg(test)]
mod console_tests {
    use std::{
        io::{self, Write},
        sync::{Arc, Mutex},
        time::Duration,
    };

    use crate::{
        platform::MockActivityDriver,
        service::{KeepAliveMethod, KeepAliveService},
        utils::{clock::DefaultClock, logging::TEST_LOGGING},
    };

    use super::{Command, Screen, dispatch, parse_command};

    #[derive(Clone, Default)]
    struct CaptureBuffer(Arc<Mutex<Vec<u8>>>);

    impl CaptureBuffer {
        fn contents(&self) -> String {
            String::from_utf8(self.0.lock().unwrap().clone()).unwrap()
        }
    }

    impl Write for CaptureBuffer {
        fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
            self.0.lock().unwrap().extend_from_slice(buf);
            Ok(buf.len())
        }

        fn flush(&mut self) -> io::Result<()> {
            Ok(())
        }
    }

    fn capture_screen() -> (Screen, CaptureBuffer) {
        let buffer = CaptureBuffer::default();
        (Screen::new(Box::new(buffer.clone())), buffer)
    }

    fn idle_service() -> KeepAliveService {
        let mut driver = MockActivityDriver::new();
        driver.expect_assert_awake().returning(|_| Ok(()));
        driver.expect_reset_awake().returning(|| Ok(()));
        KeepAliveService::new(Box::new(driver), Arc::new(DefaultClock))
    }

    #[test]
    fn commands_parse_trimmed_and_case_folded() {
        assert_eq!(parse_command(" Status "), Command::Status);
        assert_eq!(parse_command("STATUS"), Command::Status);
        assert_eq!(parse_command("s"), Command::Status);
        assert_eq!(parse_command("p"), Command::Pause);
        assert_eq!(parse_command("pause"), Command::Pause);
        assert_eq!(parse_command("r"), Command::Resume);
        assert_eq!(parse_command("Resume"), Command::Resume);
        assert_eq!(parse_command("t"), Command::Toggle);
        assert_eq!(parse_command("toggle"), Command::Toggle);
        assert_eq!(parse_command("h"), Command::Help);
        assert_eq!(parse_command("help"), Command::Help);
        assert_eq!(parse_command("q"), Command::Quit);
        assert_eq!(parse_command("quit"), Command::Quit);
        assert_eq!(parse_command("exit"), Command::Quit);
        assert_eq!(parse_command("   "), Command::Empty);
        assert_eq!(parse_command(""), Command::Empty);
        assert_eq!(parse_command("frobnicate"), Command::Unknown);
    }

    #[tokio::test(start_paused = true)]
    async fn status_command_renders_the_service_snapshot() {
        *TEST_LOGGING;
        let service = idle_service();
        let (screen, buffer) = capture_screen();

        service
            .start(KeepAliveMethod::ExecutionState, Duration::from_secs(45))
            .await;
        assert!(!dispatch(&service, &screen, "status").await);

        let output = buffer.contents();
        assert!(output.contains("Status: RUNNING (ACTIVE)"));
        assert!(output.contains("Method: ExecutionState"));
        assert!(output.contains("Interval: 45 seconds"));
        assert!(output.contains("System is being kept awake"));

        service.pause().await;
        assert!(!dispatch(&service, &screen, "s").await);
        assert!(buffer.contents().contains("Status: RUNNING (PAUSED)"));
        assert!(
            buffer
                .contents()
                .contains("System can currently go idle/sleep")
        );

        service.stop().await;
        assert!(!dispatch(&service, &screen, "s").await);
        assert!(buffer.contents().contains("Status: STOPPED"));
    }

    #[tokio::test]
    async fn quit_requests_exit_without_touching_the_service() {
        let service = idle_service();
        let (screen, buffer) = capture_screen();

        assert!(dispatch(&service, &screen, "q").await);
        assert!(dispatch(&service, &screen, "exit").await);
        assert!(buffer.contents().is_empty());
        assert!(!service.is_running());
    }

    #[tokio::test]
    async fn unknown_input_prints_one_hint_and_does_not_exit() {
        let service = idle_service();
        let (screen, buffer) = capture_screen();

        assert!(!dispatch(&service, &screen, "frobnicate").await);

        let output = buffer.contents();
        assert_eq!(output, "Unknown command. Type 'h' for help.\n");
    }

    #[tokio::test]
    async fn empty_input_is_silently_ignored() {
        let service = idle_service();
        let (screen, buffer) = capture_screen();

        assert!(!dispatch(&service, &screen, "").await);
        assert!(!dispatch(&service, &screen, "   ").await);
        assert!(buffer.contents().is_empty());
    }

    #[tokio::test]
    async fn pause_and_resume_commands_reach_the_service() {
        *TEST_LOGGING;
        let service = idle_service();
        let (screen, _buffer) = capture_screen();

        service
            .start(KeepAliveMethod::ExecutionState, Duration::from_secs(60))
            .await;

        assert!(!dispatch(&service, &screen, "p").await);
        assert!(service.is_paused());

        assert!(!dispatch(&service, &screen, "resume").await);
        assert!(!service.is_paused());

        assert!(!dispatch(&service, &screen, "T").await);
        assert!(service.is_paused());

        service.stop().await;
    }

    #[test]
    fn notification_rendering_clears_the_line_and_optionally_redraws() {
        let (screen, buffer) = capture_screen();

        screen.notification("tick", true);
        let output = buffer.contents();
        assert!(output.starts_with('\r'));
        assert!(output.contains("tick\n"));
        assert!(output.ends_with("> "));

        let (screen, buffer) = capture_screen();
        screen.notification("bye", false);
        assert!(buffer.contents().ends_with("bye\n"));
    }
}
