//! Background tick loop of the keep-alive service. Runs until cancelled,
//! asserting activity once per interval through the configured strategy.

use std::{
    sync::{
        Arc,
        atomic::{AtomicBool, Ordering},
    },
    time::Duration,
};

use anyhow::Result;
use chrono::Local;
use tokio::sync::broadcast;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, warn};

use crate::{
    platform::{AwakeRequest, PointerPosition},
    utils::clock::Clock,
};

use super::{KeepAliveMethod, Notification, SharedDriver};

/// How far the pointer travels away from its origin during one jiggle.
const JIGGLE_DISTANCE: i32 = 500;
/// Size of a single pointer step.
const JIGGLE_STEP: i32 = 30;
/// Pacing delay between pointer steps.
const JIGGLE_PACING: Duration = Duration::from_millis(1);

pub struct KeepAliveWorker {
    driver: SharedDriver,
    clock: Arc<dyn Clock>,
    events: broadcast::Sender<Notification>,
    paused: Arc<AtomicBool>,
    method: KeepAliveMethod,
    interval: Duration,
}

impl KeepAliveWorker {
    pub fn new(
        driver: SharedDriver,
        clock: Arc<dyn Clock>,
        events: broadcast::Sender<Notification>,
        paused: Arc<AtomicBool>,
        method: KeepAliveMethod,
        interval: Duration,
    ) -> Self {
        Self {
            driver,
            clock,
            events,
            paused,
            method,
            interval,
        }
    }

    /// Executes the keep-alive event loop. The interval is measured from the
    /// end of one tick's work to the start of the next, not wall-aligned.
    pub async fn run(mut self, cancel: CancellationToken) {
        loop {
            if let Err(e) = self.tick().await {
                // One failed tick must not take the loop down.
                error!("Keep-alive tick failed {e:?}");
                self.emit(format!("Error in keep-alive loop: {e}"));
            }

            tokio::select! {
                _ = cancel.cancelled() => break,
                _ = self.clock.sleep(self.interval) => (),
            }
        }
        self.emit("Keep-alive loop terminated.");
    }

    fn emit(&self, message: impl Into<Arc<str>>) {
        let _ = self.events.send(Notification::new(message));
    }

    fn stamp(&self) -> String {
        self.clock
            .time()
            .with_timezone(&Local)
            .format("%H:%M:%S")
            .to_string()
    }

    async fn tick(&mut self) -> Result<()> {
        if self.paused.load(Ordering::SeqCst) {
            self.emit(format!(
                "[{}] Keep-alive PAUSED - system can idle",
                self.stamp()
            ));
            return Ok(());
        }

        match self.method {
            KeepAliveMethod::ExecutionState => self.assert_execution_state().await,
            KeepAliveMethod::MouseJiggle => self.jiggle_pointer().await,
            KeepAliveMethod::Hybrid => {
                self.jiggle_pointer().await;
                self.assert_execution_state().await;
            }
        }

        self.emit(format!(
            "[{}] System kept awake using {}",
            self.stamp(),
            self.method
        ));
        Ok(())
    }

    async fn assert_execution_state(&mut self) {
        let result = self
            .driver
            .lock()
            .await
            .assert_awake(AwakeRequest::keep_awake());
        if let Err(e) = result {
            warn!("Stay-awake assertion failed {e:?}");
            self.emit("Warning: Failed to assert stay-awake state.");
        }
    }

    /// Walks the pointer out by [JIGGLE_DISTANCE] and back in fixed steps,
    /// then restores the exact starting position. A failure to read the
    /// starting position skips the whole jiggle for this tick.
    async fn jiggle_pointer(&mut self) {
        let origin = match self.driver.lock().await.pointer_position() {
            Ok(position) => position,
            Err(e) => {
                warn!("Could not read pointer position {e:?}");
                self.emit("Warning: Failed to read pointer position, skipping jiggle.");
                return;
            }
        };

        let mut x = origin.x;
        while x < origin.x + JIGGLE_DISTANCE {
            self.move_pointer(PointerPosition { x, y: origin.y }).await;
            x += JIGGLE_STEP;
        }
        let mut x = origin.x + JIGGLE_DISTANCE;
        while x > origin.x {
            self.move_pointer(PointerPosition { x, y: origin.y }).await;
            x -= JIGGLE_STEP;
        }
        self.move_pointer(origin).await;
    }

    async fn move_pointer(&mut self, position: PointerPosition) {
        // Individual moves are allowed to fail, the next one tries again.
        if let Err(e) = self.driver.lock().await.set_pointer_position(position) {
            debug!("Pointer move to {position:?} failed {e:?}");
        }
        self.clock.sleep(JIGGLE_PACING).await;
    }
}
