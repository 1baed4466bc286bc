//! Mouse Handle - Unified API for mouse driven motion emulation
//!
//! Owns the slot table, the status queue and the background updater thread,
//! and exposes the event handlers the capture layer calls. All handlers are
//! synchronous and only hold the slot table lock briefly.

use crate::config::{MouseConfig, TouchArea};
use crate::mouse::motion::{MotionGains, MotionInput, MotionSimulator, SimulatorFactory};
use crate::mouse::settings::SettingsSource;
use crate::mouse::slot::{SlotTable, DEFAULT_SENSITIVITY};
use crate::mouse::status_queue::{status_channel, StatusQueue, StatusSender};
use crate::mouse::types::{MouseButton, MouseData, MouseStatus, BUTTON_COUNT};
use crate::mouse::updater::UpdaterHandle;
use parking_lot::Mutex;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, error, info};

/// Runtime settings for the mouse subsystem
///
/// Usually derived from a [`MouseConfig`]; `Default` matches the defaults of
/// the config file.
#[derive(Clone, Debug, PartialEq)]
pub struct MouseSettings {
    /// Background updater period in milliseconds
    pub update_interval_ms: u64,

    /// Initial pixel-to-tilt scale of each slot, in slot order
    pub sensitivities: [f32; BUTTON_COUNT],

    /// Surface the pointer is normalised against for touch readings
    pub touch_area: TouchArea,

    /// Rate-of-change parameters every slot simulator is built with
    pub motion_gains: MotionGains,
}

impl Default for MouseSettings {
    fn default() -> Self {
        Self {
            update_interval_ms: 10,
            sensitivities: [DEFAULT_SENSITIVITY; BUTTON_COUNT],
            touch_area: TouchArea::default(),
            motion_gains: MotionGains::default(),
        }
    }
}

impl From<&MouseConfig> for MouseSettings {
    fn from(config: &MouseConfig) -> Self {
        Self {
            update_interval_ms: config.update_interval_ms,
            sensitivities: config.sensitivities(),
            touch_area: config.touch_area,
            motion_gains: config.motion_gains,
        }
    }
}

/// Errors that can occur while starting or stopping the mouse subsystem
///
/// Event handlers never fail; only the updater thread lifecycle does.
#[derive(Debug, thiserror::Error)]
pub enum MouseError {
    /// The updater thread could not be created
    #[error("Failed to spawn updater thread: {0}")]
    ThreadSpawn(#[from] std::io::Error),

    /// The updater thread panicked before it could be joined
    #[error("Updater thread panicked")]
    ThreadJoin,

    /// Invalid settings passed at construction
    #[error("Initialization error: {0}")]
    InitializationError(String),

    /// Teardown was requested twice
    #[error("Mouse updater already shut down")]
    AlreadyShutDown,
}

/// Translates pointer events into emulated motion and touch input
///
/// # Threading Model
///
/// ```text
/// capture thread ──press/move/release──► SlotTable ◄──tick── updater thread
///        │                                  │
///        └──► StatusQueue (press only)      └──► mouse_state(index)
/// ```
///
/// The updater is started by [`Mouse::spawn`] and stopped by
/// [`Mouse::shutdown`] or on drop.
pub struct Mouse {
    table: Arc<Mutex<SlotTable>>,
    status_sender: StatusSender,
    status_queue: StatusQueue,
    updater: UpdaterHandle,
}

impl Mouse {
    /// Starts the mouse subsystem with the default [`MotionInput`] simulator
    pub fn spawn(
        settings: Option<MouseSettings>,
        settings_source: Option<Arc<dyn SettingsSource>>,
    ) -> Result<Self, MouseError> {
        let factory: Box<SimulatorFactory> = Box::new(|gains: MotionGains| {
            Box::new(MotionInput::new(gains)) as Box<dyn MotionSimulator>
        });
        Self::spawn_with_simulator(settings, settings_source, &*factory)
    }

    /// Starts the mouse subsystem, building one simulator per slot with `factory`
    pub fn spawn_with_simulator(
        settings: Option<MouseSettings>,
        settings_source: Option<Arc<dyn SettingsSource>>,
        factory: &SimulatorFactory,
    ) -> Result<Self, MouseError> {
        info!("Initializing Mouse system with settings: {:?}", settings);
        let settings = settings.unwrap_or_default();

        if settings.update_interval_ms == 0 {
            return Err(MouseError::InitializationError(
                "update interval must be at least 1ms".to_string(),
            ));
        }

        let mut table = SlotTable::new(settings.motion_gains, settings.touch_area, factory);
        table.apply_sensitivities(&settings.sensitivities);
        let table = Arc::new(Mutex::new(table));
        debug!("Created slot table with {} slots", BUTTON_COUNT);

        let (status_sender, status_queue) = status_channel();

        let updater = UpdaterHandle::spawn(
            table.clone(),
            settings_source,
            Duration::from_millis(settings.update_interval_ms),
        )?;

        info!("Mouse system initialized successfully");
        Ok(Self {
            table,
            status_sender,
            status_queue,
            updater,
        })
    }

    /// Signals that `button` (raw frontend identifier) was pressed at `(x, y)`.
    ///
    /// Unknown identifiers and repeated presses are ignored.
    pub fn press_button(&self, x: i32, y: i32, button: i32) {
        self.press(x, y, MouseButton::from_raw(button));
    }

    pub fn press(&self, x: i32, y: i32, button: MouseButton) {
        let pressed = self.table.lock().press(x, y, button);
        if pressed {
            self.status_sender.push(MouseStatus { button });
        }
    }

    /// Signals that the pointer moved to `(x, y)`
    pub fn mouse_move(&self, x: i32, y: i32) {
        self.table.lock().move_to(x, y);
    }

    /// Signals that a tilt gesture on `button` (raw identifier) ended
    pub fn release_button(&self, button: i32) {
        self.release(MouseButton::from_raw(button));
    }

    pub fn release(&self, button: MouseButton) {
        self.table.lock().release(button);
    }

    /// Consistent snapshot of the slot at `index`, `None` if out of range
    pub fn mouse_state(&self, index: usize) -> Option<MouseData> {
        self.table.lock().data(index)
    }

    pub fn mouse_queue(&self) -> &StatusQueue {
        &self.status_queue
    }

    pub fn pressed_buttons(&self) -> u16 {
        self.table.lock().buttons()
    }

    pub fn is_pressed(&self, button: MouseButton) -> bool {
        self.table.lock().is_pressed(button)
    }

    pub fn last_button(&self) -> MouseButton {
        self.table.lock().last_button()
    }

    /// Enters remapping mode; settings refresh is paused until
    /// [`Mouse::end_configuration`].
    pub fn begin_configuration(&self) {
        info!("Mouse configuration started");
        self.table.lock().set_configuring(true);
    }

    pub fn end_configuration(&self) {
        info!("Mouse configuration ended");
        self.table.lock().set_configuring(false);
    }

    pub fn is_configuring(&self) -> bool {
        self.table.lock().is_configuring()
    }

    pub fn is_running(&self) -> bool {
        self.updater.is_running()
    }

    /// Stops the updater thread and waits for it to finish
    pub fn shutdown(&mut self) -> Result<(), MouseError> {
        info!("Shutting down Mouse system");
        self.updater.shutdown().map_err(|e| {
            error!("Mouse shutdown failed: {}", e);
            e
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mouse::settings::SettingsPortal;
    use crate::mouse::types::MotionStatus;
    use std::time::Instant;

    fn spawn_mouse() -> Mouse {
        Mouse::spawn(None, None).unwrap()
    }

    fn wait_for(mouse: &Mouse, index: usize, condition: impl Fn(&MouseData) -> bool) -> bool {
        let deadline = Instant::now() + Duration::from_secs(2);
        while Instant::now() < deadline {
            if let Some(data) = mouse.mouse_state(index) {
                if condition(&data) {
                    return true;
                }
            }
            std::thread::sleep(Duration::from_millis(2));
        }
        false
    }

    #[test]
    fn test_press_release_mirrors_bitmask() {
        let mouse = spawn_mouse();
        let sequence = [
            (true, 0),
            (true, 0),
            (false, 0),
            (false, 0),
            (true, 2),
            (false, 2),
            (true, 2),
        ];
        for (press, raw) in sequence {
            if press {
                mouse.press_button(0, 0, raw);
            } else {
                mouse.release_button(raw);
            }
            let button = MouseButton::from_raw(raw);
            assert_eq!(mouse.is_pressed(button), press);
        }
        assert_eq!(mouse.pressed_buttons(), MouseButton::Right.mask());
    }

    #[test]
    fn test_axis_is_cumulative_from_origin() {
        let mouse = spawn_mouse();
        mouse.press_button(100, 100, 0);
        mouse.mouse_move(110, 95);
        assert_eq!(mouse.mouse_state(0).unwrap().axis, [10, -5]);

        mouse.mouse_move(113, 98);
        assert_eq!(mouse.mouse_state(0).unwrap().axis, [13, -2]);
    }

    #[test]
    fn test_each_press_queues_one_status() {
        let mouse = spawn_mouse();
        mouse.press(0, 0, MouseButton::Right);
        mouse.press(0, 0, MouseButton::Right);
        mouse.press(0, 0, MouseButton::Left);
        mouse.release(MouseButton::Right);
        mouse.release(MouseButton::Left);
        mouse.press(0, 0, MouseButton::Backward);

        let queued: Vec<MouseButton> = mouse
            .mouse_queue()
            .drain()
            .iter()
            .map(|status| status.button)
            .collect();
        assert_eq!(
            queued,
            vec![MouseButton::Right, MouseButton::Left, MouseButton::Backward]
        );
    }

    #[test]
    fn test_undefined_button_changes_nothing() {
        let mouse = spawn_mouse();
        let before: Vec<MouseData> = (0..BUTTON_COUNT)
            .map(|index| mouse.mouse_state(index).unwrap())
            .collect();

        mouse.press_button(5, 5, 9);
        mouse.press_button(5, 5, -3);
        mouse.release_button(42);

        assert_eq!(mouse.pressed_buttons(), 0);
        assert_eq!(mouse.last_button(), MouseButton::Undefined);
        assert!(mouse.mouse_queue().try_pop().is_none());
        let after: Vec<MouseData> = (0..BUTTON_COUNT)
            .map(|index| mouse.mouse_state(index).unwrap())
            .collect();
        assert_eq!(before, after);
        assert!(mouse.mouse_state(BUTTON_COUNT).is_none());
    }

    #[test]
    fn test_updater_advances_motion_while_tilting() {
        let mouse = spawn_mouse();
        mouse.press(0, 0, MouseButton::Left);
        mouse.mouse_move(0, 40);

        assert!(wait_for(&mouse, 0, |data| data.motion.rotation.x < 0.0));
    }

    #[test]
    fn test_released_slot_settles() {
        let mouse = spawn_mouse();
        mouse.press(0, 0, MouseButton::Left);
        mouse.mouse_move(30, 0);
        assert!(wait_for(&mouse, 0, |data| data.motion.rotation.z < 0.0));

        mouse.release(MouseButton::Left);
        assert!(wait_for(&mouse, 0, |data| data.motion.gyroscope.z == 0.0));
        let settled = mouse.mouse_state(0).unwrap();
        std::thread::sleep(Duration::from_millis(50));
        assert_eq!(mouse.mouse_state(0).unwrap(), settled);
    }

    #[test]
    fn test_configuration_roundtrip_preserves_state() {
        let mouse = spawn_mouse();
        let before: Vec<MouseData> = (0..BUTTON_COUNT)
            .map(|index| mouse.mouse_state(index).unwrap())
            .collect();

        mouse.begin_configuration();
        assert!(mouse.is_configuring());
        mouse.end_configuration();
        assert!(!mouse.is_configuring());

        let after: Vec<MouseData> = (0..BUTTON_COUNT)
            .map(|index| mouse.mouse_state(index).unwrap())
            .collect();
        assert_eq!(before, after);
        assert_eq!(after[0].motion, MotionStatus::default());
    }

    #[test]
    fn test_concurrent_moves_never_tear_output() {
        let mouse = Arc::new(Mouse::spawn(
            Some(MouseSettings {
                update_interval_ms: 1,
                ..MouseSettings::default()
            }),
            None,
        )
        .unwrap());
        mouse.press(0, 0, MouseButton::Left);

        let writer = {
            let mouse = mouse.clone();
            std::thread::spawn(move || {
                for step in 1..=1000 {
                    mouse.mouse_move(step, step);
                }
            })
        };

        // Every snapshot must pair axis and touch from the same move
        let area = TouchArea::default();
        for _ in 0..2000 {
            let data = mouse.mouse_state(0).unwrap();
            let expected_x = (data.axis[0] as f32 / area.width as f32).clamp(0.0, 1.0);
            let expected_y = (data.axis[1] as f32 / area.height as f32).clamp(0.0, 1.0);
            assert_eq!(data.axis[0], data.axis[1]);
            assert_eq!(data.touch.x, expected_x);
            assert_eq!(data.touch.y, expected_y);
            assert!(data.pressed);
        }

        writer.join().unwrap();
        assert_eq!(mouse.mouse_state(0).unwrap().axis, [1000, 1000]);
    }

    #[test]
    fn test_settings_source_updates_sensitivity() {
        let portal = SettingsPortal::new(MouseConfig::default());
        let mouse = Mouse::spawn(None, Some(Arc::new(portal.clone()))).unwrap();

        portal
            .write_sensitivity(MouseButton::Left, Some(1.0))
            .unwrap();
        let deadline = Instant::now() + Duration::from_secs(2);
        while Instant::now() < deadline {
            if mouse.table.lock().slot(MouseButton::Left).unwrap().sensitivity() == 1.0 {
                break;
            }
            std::thread::sleep(Duration::from_millis(2));
        }
        assert_eq!(
            mouse.table.lock().slot(MouseButton::Left).unwrap().sensitivity(),
            1.0
        );
    }

    #[test]
    fn test_shutdown_is_clean_and_single() {
        let mut mouse = spawn_mouse();
        assert!(mouse.is_running());
        mouse.shutdown().unwrap();
        assert!(!mouse.is_running());
        assert!(matches!(mouse.shutdown(), Err(MouseError::AlreadyShutDown)));

        // Handlers stay safe to call after teardown
        mouse.press(0, 0, MouseButton::Left);
        assert!(mouse.is_pressed(MouseButton::Left));
    }

    #[test]
    fn test_zero_interval_is_rejected() {
        let settings = MouseSettings {
            update_interval_ms: 0,
            ..MouseSettings::default()
        };
        assert!(matches!(
            Mouse::spawn(Some(settings), None),
            Err(MouseError::InitializationError(_))
        ));
    }
}
