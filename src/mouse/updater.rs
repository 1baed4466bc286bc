use crate::mouse::mouse_handle::MouseError;
use crate::mouse::settings::SettingsSource;
use crate::mouse::slot::SlotTable;
use chrono::Local;
use parking_lot::Mutex;
use statum::{machine, state};
use std::sync::Arc;
use std::thread::JoinHandle;
use std::time::{Duration, Instant};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

// Define updater states using statum's state macro
#[state]
#[derive(Debug, Clone)]
pub enum UpdaterState {
    Starting,
    Ticking,
}

#[machine]
pub struct MouseUpdater<S: UpdaterState> {
    // Slot table shared with the event handlers
    table: Arc<Mutex<SlotTable>>,

    // Optional source of externally changed sensitivities
    settings_source: Option<Arc<dyn SettingsSource>>,

    // Fixed tick period
    interval: Duration,

    // Cleared at teardown; no tick starts afterwards
    cancel: CancellationToken,
}

impl<S: UpdaterState> MouseUpdater<S> {
    pub fn interval(&self) -> Duration {
        self.interval
    }
}

impl MouseUpdater<Starting> {
    pub fn create(
        table: Arc<Mutex<SlotTable>>,
        settings_source: Option<Arc<dyn SettingsSource>>,
        interval: Duration,
        cancel: CancellationToken,
    ) -> Self {
        debug!("Creating mouse updater with {:?} interval", interval);
        Self::new(table, settings_source, interval, cancel)
    }

    // Pull the initial settings once and start ticking
    pub fn initialize(self) -> MouseUpdater<Ticking> {
        info!(
            "Initializing mouse updater (settings source: {})",
            if self.settings_source.is_some() {
                "attached"
            } else {
                "none"
            }
        );
        self.refresh_settings();
        self.transition()
    }
}

impl<S: UpdaterState> MouseUpdater<S> {
    // Best effort: a failing source never aborts the tick
    fn refresh_settings(&self) {
        let Some(source) = &self.settings_source else {
            return;
        };
        if self.table.lock().is_configuring() {
            debug!("Configuring, skipping settings refresh");
            return;
        }

        // The source is queried without holding the table lock
        let sensitivities = match source.sensitivities() {
            Ok(sensitivities) => sensitivities,
            Err(e) => {
                warn!("Settings refresh failed: {}", e);
                return;
            }
        };

        let mut table = self.table.lock();
        if table.is_configuring() {
            debug!("Configuration started during refresh, discarding settings");
            return;
        }
        table.apply_sensitivities(&sensitivities);
    }
}

impl MouseUpdater<Ticking> {
    /// Runs one update step and returns the number of tilting slots
    pub fn tick_once(&mut self, elapsed: Duration) -> usize {
        let tilted = self.table.lock().tick(elapsed);
        self.refresh_settings();
        tilted
    }

    // Wait until the next tick is due, returning early on cancellation
    fn wait_until(&self, deadline: Instant) {
        loop {
            if self.cancel.is_cancelled() {
                return;
            }
            let now = Instant::now();
            if now >= deadline {
                return;
            }
            std::thread::park_timeout(deadline - now);
        }
    }

    pub fn run_update_loop(&mut self) {
        info!(
            "Starting mouse update loop with {}ms interval",
            self.interval().as_millis()
        );

        // Stats for performance monitoring
        let mut ticks: u64 = 0;
        let mut tilted_updates: u64 = 0;
        let mut last_stats_time = Local::now();
        let stats_interval = chrono::Duration::seconds(30);

        // Seed one interval back so the first tick integrates a full step
        let mut last_tick = Instant::now()
            .checked_sub(self.interval)
            .unwrap_or_else(Instant::now);
        while !self.cancel.is_cancelled() {
            let tick_start = Instant::now();
            let elapsed = tick_start - last_tick;
            last_tick = tick_start;

            tilted_updates += self.tick_once(elapsed) as u64;
            ticks += 1;

            let now = Local::now();
            if now - last_stats_time > stats_interval {
                info!(
                    "Mouse updater stats: {} ticks, {} tilted slot updates in {} seconds",
                    ticks,
                    tilted_updates,
                    (now - last_stats_time).num_seconds()
                );
                ticks = 0;
                tilted_updates = 0;
                last_stats_time = now;
            }

            self.wait_until(tick_start + self.interval);
        }

        info!("Mouse update loop stopped");
    }
}

/// Owns the updater thread
#[derive(Debug)]
pub struct UpdaterHandle {
    cancel: CancellationToken,
    thread: Option<JoinHandle<()>>,
}

impl UpdaterHandle {
    pub fn spawn(
        table: Arc<Mutex<SlotTable>>,
        settings_source: Option<Arc<dyn SettingsSource>>,
        interval: Duration,
    ) -> Result<Self, MouseError> {
        info!("Spawning mouse updater thread");
        let cancel = CancellationToken::new();
        let updater = MouseUpdater::create(table, settings_source, interval, cancel.clone());

        let thread = std::thread::Builder::new()
            .name("mouse-updater".to_string())
            .spawn(move || {
                let mut ticking = updater.initialize();
                ticking.run_update_loop();
            })
            .map_err(|e| {
                error!("Failed to spawn mouse updater thread: {}", e);
                MouseError::ThreadSpawn(e)
            })?;

        info!("Mouse updater successfully started");
        Ok(Self {
            cancel,
            thread: Some(thread),
        })
    }

    pub fn is_running(&self) -> bool {
        self.thread.is_some() && !self.cancel.is_cancelled()
    }

    /// Stops the loop and joins the thread
    pub fn shutdown(&mut self) -> Result<(), MouseError> {
        let Some(thread) = self.thread.take() else {
            return Err(MouseError::AlreadyShutDown);
        };

        debug!("Sending shutdown signal to mouse updater");
        self.cancel.cancel();
        thread.thread().unpark();

        thread.join().map_err(|_| {
            error!("Mouse updater thread panicked");
            MouseError::ThreadJoin
        })?;
        info!("Mouse updater shut down");
        Ok(())
    }
}

impl Drop for UpdaterHandle {
    fn drop(&mut self) {
        if self.thread.is_some() {
            if let Err(e) = self.shutdown() {
                error!("Failed to stop mouse updater: {}", e);
            }
        }
    }
}
