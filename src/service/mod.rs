//! The keep-alive service. Owns the shared state machine (running/paused,
//! method, interval) and spawns the background [worker::KeepAliveWorker]
//! that asserts activity once per interval. Every state transition and every
//! tick is broadcast as a [Notification] for observers such as the console.

pub mod worker;

use std::{
    fmt,
    str::FromStr,
    sync::{
        Arc,
        atomic::{AtomicBool, Ordering},
    },
    time::Duration,
};

use anyhow::anyhow;
use tokio::sync::{Mutex, broadcast};
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use crate::{platform::ActivityDriver, utils::clock::Clock};

use worker::KeepAliveWorker;

pub const DEFAULT_METHOD: KeepAliveMethod = KeepAliveMethod::Hybrid;
pub const DEFAULT_INTERVAL: Duration = Duration::from_secs(30);

const NOTIFICATION_CAPACITY: usize = 64;

/// Strategy used to keep the system awake during active ticks.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum KeepAliveMethod {
    /// Asks the OS directly to stay awake (recommended).
    ExecutionState,
    /// Simulates minimal mouse movement.
    MouseJiggle,
    /// Combines both methods for maximum effectiveness.
    Hybrid,
}

impl fmt::Display for KeepAliveMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::ExecutionState => "ExecutionState",
            Self::MouseJiggle => "MouseJiggle",
            Self::Hybrid => "Hybrid",
        })
    }
}

impl FromStr for KeepAliveMethod {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "executionstate" => Ok(Self::ExecutionState),
            "mousejiggle" => Ok(Self::MouseJiggle),
            "hybrid" => Ok(Self::Hybrid),
            other => Err(anyhow!("Unknown keep-alive method {other:?}")),
        }
    }
}

/// One-way status message broadcast from the service to its observers.
#[derive(Debug, Clone)]
pub struct Notification {
    pub message: Arc<str>,
}

impl Notification {
    pub fn new(message: impl Into<Arc<str>>) -> Self {
        Self {
            message: message.into(),
        }
    }
}

impl fmt::Display for Notification {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.message)
    }
}

/// Point-in-time view of the service state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ServiceStatus {
    pub running: bool,
    pub paused: bool,
    pub method: KeepAliveMethod,
    pub interval: Duration,
}

pub type SharedDriver = Arc<Mutex<Box<dyn ActivityDriver>>>;

pub struct KeepAliveService {
    driver: SharedDriver,
    clock: Arc<dyn Clock>,
    events: broadcast::Sender<Notification>,
    running: AtomicBool,
    paused: Arc<AtomicBool>,
    /// Method and interval of the current (or last) Start cycle. They are
    /// fixed between Start and Stop, changing them requires a restart.
    settings: std::sync::Mutex<(KeepAliveMethod, Duration)>,
    /// Serializes all state transitions. Holds the cancellation token of the
    /// currently running worker, if any.
    transition: Mutex<Option<CancellationToken>>,
}

impl KeepAliveService {
    pub fn new(driver: Box<dyn ActivityDriver>, clock: Arc<dyn Clock>) -> Self {
        let (events, _) = broadcast::channel(NOTIFICATION_CAPACITY);
        Self {
            driver: Arc::new(Mutex::new(driver)),
            clock,
            events,
            running: AtomicBool::new(false),
            paused: Arc::new(AtomicBool::new(false)),
            settings: std::sync::Mutex::new((DEFAULT_METHOD, DEFAULT_INTERVAL)),
            transition: Mutex::new(None),
        }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<Notification> {
        self.events.subscribe()
    }

    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::SeqCst)
    }

    pub fn is_paused(&self) -> bool {
        self.paused.load(Ordering::SeqCst)
    }

    pub fn status(&self) -> ServiceStatus {
        let (method, interval) = *self.settings.lock().unwrap();
        ServiceStatus {
            running: self.is_running(),
            paused: self.is_paused(),
            method,
            interval,
        }
    }

    fn notify(&self, message: impl Into<Arc<str>>) {
        // Sending fails only when nobody is subscribed, which is fine.
        let _ = self.events.send(Notification::new(message));
    }

    /// Spawns the background loop. Calling this while already running is a
    /// no-op that only reports the fact, the first Start wins.
    pub async fn start(&self, method: KeepAliveMethod, interval: Duration) {
        let mut cancel_slot = self.transition.lock().await;
        if self.is_running() {
            self.notify("Keep-alive service is already running.");
            return;
        }

        *self.settings.lock().unwrap() = (method, interval);
        self.paused.store(false, Ordering::SeqCst);

        let cancel = CancellationToken::new();
        let worker = KeepAliveWorker::new(
            self.driver.clone(),
            self.clock.clone(),
            self.events.clone(),
            self.paused.clone(),
            method,
            interval,
        );
        tokio::spawn(worker.run(cancel.clone()));
        *cancel_slot = Some(cancel);
        self.running.store(true, Ordering::SeqCst);

        info!("Started keep-alive using {method} with an interval of {interval:?}");
        self.notify(format!(
            "Keep-alive service started using {method} method (interval: {}s)",
            interval.as_secs()
        ));
    }

    pub async fn pause(&self) {
        let _cancel_slot = self.transition.lock().await;
        if !self.is_running() {
            self.notify("Keep-alive service is not running.");
            return;
        }
        if self.is_paused() {
            self.notify("Keep-alive service is already paused.");
            return;
        }

        self.paused.store(true, Ordering::SeqCst);
        // Reset right away so pausing takes effect before the next tick.
        self.reset_driver().await;
        self.notify("Keep-alive service PAUSED. System can now go idle/sleep.");
    }

    pub async fn resume(&self) {
        let _cancel_slot = self.transition.lock().await;
        if !self.is_running() {
            self.notify("Keep-alive service is not running.");
            return;
        }
        if !self.is_paused() {
            self.notify("Keep-alive service is already active.");
            return;
        }

        // The next tick re-asserts, no immediate driver call here.
        self.paused.store(false, Ordering::SeqCst);
        self.notify("Keep-alive service RESUMED. System will stay awake.");
    }

    pub async fn toggle(&self) {
        if self.is_paused() {
            self.resume().await;
        } else {
            self.pause().await;
        }
    }

    /// Cancels the background loop. The cancellation is issued before this
    /// returns, the worker's own exit is asynchronous and best-effort.
    pub async fn stop(&self) {
        let mut cancel_slot = self.transition.lock().await;
        if !self.is_running() {
            self.notify("Keep-alive service is not running.");
            return;
        }

        if let Some(cancel) = cancel_slot.take() {
            cancel.cancel();
        }
        self.reset_driver().await;

        self.paused.store(false, Ordering::SeqCst);
        self.running.store(false, Ordering::SeqCst);

        info!("Stopped keep-alive");
        self.notify("Keep-alive service stopped.");
    }

    async fn reset_driver(&self) {
        let result = self.driver.lock().await.reset_awake();
        if let Err(e) = result {
            warn!("Failed to reset stay-awake state {e:?}");
            self.notify("Warning: Failed to reset stay-awake state.");
        }
    }
}

#[cfg(test)]
mod service_tests {
    use std::{sync::Arc, time::Duration};

    use tokio::sync::broadcast;

    use crate::{
        platform::MockActivityDriver,
        utils::{clock::DefaultClock, logging::TEST_LOGGING},
    };

    use super::{KeepAliveMethod, KeepAliveService, Notification};

    fn lenient_driver() -> MockActivityDriver {
        let mut driver = MockActivityDriver::new();
        driver.expect_assert_awake().returning(|_| Ok(()));
        driver.expect_reset_awake().returning(|| Ok(()));
        driver
            .expect_pointer_position()
            .returning(|| Ok(crate::platform::PointerPosition { x: 100, y: 100 }));
        driver.expect_set_pointer_position().returning(|_| Ok(()));
        driver
    }

    fn service_with(driver: MockActivityDriver) -> KeepAliveService {
        KeepAliveService::new(Box::new(driver), Arc::new(DefaultClock))
    }

    fn drain(events: &mut broadcast::Receiver<Notification>) -> Vec<String> {
        let mut messages = vec![];
        while let Ok(notification) = events.try_recv() {
            messages.push(notification.message.to_string());
        }
        messages
    }

    #[test]
    fn method_parsing_is_case_insensitive() {
        assert_eq!(
            "executionstate".parse::<KeepAliveMethod>().unwrap(),
            KeepAliveMethod::ExecutionState
        );
        assert_eq!(
            "MOUSEJIGGLE".parse::<KeepAliveMethod>().unwrap(),
            KeepAliveMethod::MouseJiggle
        );
        assert_eq!(
            "Hybrid".parse::<KeepAliveMethod>().unwrap(),
            KeepAliveMethod::Hybrid
        );
        assert!("jiggle".parse::<KeepAliveMethod>().is_err());
    }

    #[tokio::test(start_paused = true)]
    async fn duplicate_start_changes_nothing() {
        *TEST_LOGGING;
        let service = service_with(lenient_driver());
        let mut events = service.subscribe();

        service
            .start(KeepAliveMethod::MouseJiggle, Duration::from_secs(5))
            .await;
        drain(&mut events);

        service
            .start(KeepAliveMethod::ExecutionState, Duration::from_secs(99))
            .await;

        // Worker tick messages may interleave, transitions are what matters.
        let messages = drain(&mut events)
            .into_iter()
            .filter(|m| !m.starts_with('['))
            .collect::<Vec<_>>();
        assert_eq!(messages, vec!["Keep-alive service is already running."]);

        let status = service.status();
        assert!(status.running);
        assert_eq!(status.method, KeepAliveMethod::MouseJiggle);
        assert_eq!(status.interval, Duration::from_secs(5));

        service.stop().await;
    }

    #[tokio::test]
    async fn transitions_while_stopped_are_single_notification_noops() {
        let service = service_with(MockActivityDriver::new());
        let mut events = service.subscribe();

        service.pause().await;
        service.resume().await;
        service.stop().await;
        // Toggle on a stopped service resolves to pause, which is a no-op too.
        service.toggle().await;

        let messages = drain(&mut events);
        assert_eq!(messages.len(), 4);
        assert!(
            messages
                .iter()
                .all(|m| m == "Keep-alive service is not running.")
        );
        assert!(!service.is_running());
        assert!(!service.is_paused());
    }

    #[tokio::test(start_paused = true)]
    async fn pause_resume_cycle_follows_the_state_machine() {
        *TEST_LOGGING;
        let service = service_with(lenient_driver());
        let mut events = service.subscribe();

        service
            .start(KeepAliveMethod::ExecutionState, Duration::from_secs(60))
            .await;
        assert!(service.is_running());
        assert!(!service.is_paused());

        service.pause().await;
        assert!(service.is_paused());

        service.pause().await;
        service.resume().await;
        assert!(!service.is_paused());

        service.resume().await;
        service.stop().await;
        assert!(!service.is_running());

        let messages = drain(&mut events);
        let transition_messages = messages
            .iter()
            .filter(|m| !m.starts_with('['))
            .cloned()
            .collect::<Vec<_>>();
        assert_eq!(
            transition_messages,
            vec![
                "Keep-alive service started using ExecutionState method (interval: 60s)",
                "Keep-alive service PAUSED. System can now go idle/sleep.",
                "Keep-alive service is already paused.",
                "Keep-alive service RESUMED. System will stay awake.",
                "Keep-alive service is already active.",
                "Keep-alive service stopped.",
            ]
        );
    }

    #[tokio::test(start_paused = true)]
    async fn toggle_matches_pause_and_resume() {
        *TEST_LOGGING;
        let service = service_with(lenient_driver());

        service
            .start(KeepAliveMethod::ExecutionState, Duration::from_secs(60))
            .await;

        service.toggle().await;
        assert!(service.is_paused());

        service.toggle().await;
        assert!(!service.is_paused());

        service.stop().await;
    }

    /// End to end pass through one full lifecycle under warped time.
    #[tokio::test(start_paused = true)]
    async fn lifecycle_emits_ticks_and_goes_quiet_after_stop() {
        *TEST_LOGGING;
        let service = service_with(lenient_driver());
        let mut events = service.subscribe();

        service
            .start(KeepAliveMethod::Hybrid, Duration::from_secs(1))
            .await;

        // The first active tick must name the method.
        let kept_awake = loop {
            let notification = events.recv().await.unwrap();
            if notification.message.contains("System kept awake") {
                break notification.message.to_string();
            }
        };
        assert!(kept_awake.contains("Hybrid"));

        service.pause().await;
        assert!(service.status().paused);

        service.resume().await;
        service.stop().await;

        // Let any in-flight tick and the worker shutdown settle.
        tokio::time::sleep(Duration::from_secs(2)).await;
        let tail = drain(&mut events);
        let terminated = tail
            .iter()
            .filter(|m| *m == "Keep-alive loop terminated.")
            .count();
        assert_eq!(terminated, 1);
        let stopped_at = tail
            .iter()
            .position(|m| m == "Keep-alive service stopped.")
            .unwrap();
        // At most one in-flight tick may race with the cancellation.
        let late_ticks = tail[stopped_at..]
            .iter()
            .filter(|m| m.starts_with('['))
            .count();
        assert!(late_ticks <= 1, "late ticks after stop: {tail:?}");
    }
}
