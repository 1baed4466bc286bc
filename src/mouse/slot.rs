use crate::config::TouchArea;
use crate::mouse::motion::{MotionGains, MotionSimulator, SimulatorFactory};
use crate::mouse::types::{MouseButton, MouseData, TouchStatus, BUTTON_COUNT};
use glam::{IVec2, Vec2};
use std::time::Duration;
use tracing::{debug, warn};

/// Default pixel-to-tilt scale of a slot
pub const DEFAULT_SENSITIVITY: f32 = 0.12;

/// State of one logical button
pub struct MouseInfo {
    motion: Box<dyn MotionSimulator>,
    origin: Option<IVec2>,
    last_position: IVec2,
    tilting: bool,
    sensitivity: f32,
    tilt_speed: f32,
    tilt_direction: Vec2,
    data: MouseData,
}

impl MouseInfo {
    fn new(motion: Box<dyn MotionSimulator>) -> Self {
        let data = MouseData {
            motion: motion.reading(),
            ..MouseData::default()
        };
        Self {
            motion,
            origin: None,
            last_position: IVec2::ZERO,
            tilting: false,
            sensitivity: DEFAULT_SENSITIVITY,
            tilt_speed: 0.0,
            tilt_direction: Vec2::ZERO,
            data,
        }
    }

    pub fn origin(&self) -> Option<IVec2> {
        self.origin
    }

    pub fn last_position(&self) -> IVec2 {
        self.last_position
    }

    pub fn is_tilting(&self) -> bool {
        self.tilting
    }

    pub fn sensitivity(&self) -> f32 {
        self.sensitivity
    }

    pub fn tilt_speed(&self) -> f32 {
        self.tilt_speed
    }

    pub fn tilt_direction(&self) -> Vec2 {
        self.tilt_direction
    }

    pub fn data(&self) -> MouseData {
        self.data
    }

    fn touch(&self, area: TouchArea) -> TouchStatus {
        let normalise = |value: i32, extent: u32| {
            if extent == 0 {
                return 0.0;
            }
            (value as f32 / extent as f32).clamp(0.0, 1.0)
        };
        TouchStatus {
            x: normalise(self.last_position.x, area.width),
            y: normalise(self.last_position.y, area.height),
            pressed: self.tilting,
        }
    }
}

/// Fixed table of the five button slots plus the shared input state
///
/// Everything in here is guarded by a single lock owned by the `Mouse`
/// facade; the updater thread and the capture thread both go through it.
pub struct SlotTable {
    slots: [MouseInfo; BUTTON_COUNT],
    buttons: u16,
    last_button: MouseButton,
    configuring: bool,
    touch_area: TouchArea,
}

impl SlotTable {
    pub fn new(gains: MotionGains, touch_area: TouchArea, factory: &SimulatorFactory) -> Self {
        Self {
            slots: std::array::from_fn(|_| MouseInfo::new(factory(gains))),
            buttons: 0,
            last_button: MouseButton::Undefined,
            configuring: false,
            touch_area,
        }
    }

    pub fn slot(&self, button: MouseButton) -> Option<&MouseInfo> {
        button.index().map(|index| &self.slots[index])
    }

    /// Published state of the slot at `index`
    pub fn data(&self, index: usize) -> Option<MouseData> {
        self.slots.get(index).map(|info| info.data)
    }

    pub fn buttons(&self) -> u16 {
        self.buttons
    }

    pub fn is_pressed(&self, button: MouseButton) -> bool {
        button.mask() != 0 && self.buttons & button.mask() != 0
    }

    pub fn last_button(&self) -> MouseButton {
        self.last_button
    }

    pub fn is_configuring(&self) -> bool {
        self.configuring
    }

    pub fn set_configuring(&mut self, configuring: bool) {
        self.configuring = configuring;
    }

    /// Starts a tilt gesture on `button`.
    ///
    /// Returns `true` only on a released to pressed transition.
    pub fn press(&mut self, x: i32, y: i32, button: MouseButton) -> bool {
        let Some(index) = button.index() else {
            debug!("Ignoring press of undefined button");
            return false;
        };
        if self.is_pressed(button) {
            debug!("Button {:?} already pressed, ignoring repeat", button);
            return false;
        }

        self.buttons |= button.mask();
        self.last_button = button;

        let area = self.touch_area;
        let info = &mut self.slots[index];
        let position = IVec2::new(x, y);
        info.tilting = true;
        info.origin = Some(position);
        info.last_position = position;
        info.data.pressed = true;
        info.data.axis = [0, 0];
        info.data.touch = info.touch(area);

        debug!("Button {:?} pressed at ({}, {})", button, x, y);
        true
    }

    /// Ends the tilt gesture on `button`. Returns `false` if it was not held.
    pub fn release(&mut self, button: MouseButton) -> bool {
        let Some(index) = button.index() else {
            debug!("Ignoring release of undefined button");
            return false;
        };
        if !self.is_pressed(button) {
            debug!("Button {:?} not pressed, ignoring release", button);
            return false;
        }

        self.buttons &= !button.mask();

        let area = self.touch_area;
        let info = &mut self.slots[index];
        info.tilting = false;
        info.origin = None;
        info.tilt_speed = 0.0;
        info.tilt_direction = Vec2::ZERO;
        info.data.pressed = false;
        info.data.axis = [0, 0];
        info.data.touch = info.touch(area);

        debug!("Button {:?} released", button);
        true
    }

    /// Feeds a new absolute pointer position into the slot of `last_button`.
    pub fn move_to(&mut self, x: i32, y: i32) {
        let Some(index) = self.last_button.index() else {
            return;
        };
        let area = self.touch_area;
        let info = &mut self.slots[index];
        if !info.tilting {
            return;
        }
        let Some(origin) = info.origin else {
            return;
        };

        let position = IVec2::new(x, y);
        let delta = position.wrapping_sub(info.last_position).as_vec2();
        info.last_position = position;

        info.tilt_direction = delta.normalize_or_zero();
        info.tilt_speed = delta.length() * info.sensitivity;

        info.data.axis = position.wrapping_sub(origin).to_array();
        info.data.touch = info.touch(area);
    }

    /// Advances every slot's motion simulator by one step of `elapsed`.
    ///
    /// The tilt impulse of a slot is consumed by the step, so a held but
    /// motionless pointer stops rotating on the following tick. A zero-length
    /// step integrates nothing and leaves the impulse in place.
    pub fn tick(&mut self, elapsed: Duration) -> usize {
        let area = self.touch_area;
        let mut tilted = 0;
        for info in self.slots.iter_mut() {
            if info.tilting {
                tilted += 1;
            }
            info.motion.advance(info.tilt_direction, info.tilt_speed, elapsed);
            if !elapsed.is_zero() {
                info.tilt_speed = 0.0;
            }
            info.data.motion = info.motion.reading();
            info.data.touch = info.touch(area);
        }
        tilted
    }

    /// Replaces slot sensitivities, skipping values that are not usable scales.
    pub fn apply_sensitivities(&mut self, sensitivities: &[f32; BUTTON_COUNT]) {
        for (button, (info, &value)) in MouseButton::ALL
            .iter()
            .zip(self.slots.iter_mut().zip(sensitivities.iter()))
        {
            if !value.is_finite() || value <= 0.0 {
                warn!("Ignoring invalid sensitivity {} for {:?}", value, button);
                continue;
            }
            if info.sensitivity != value {
                debug!(
                    "Sensitivity of {:?}: {:.3} -> {:.3}",
                    button, info.sensitivity, value
                );
                info.sensitivity = value;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mouse::motion::MotionInput;
    use crate::mouse::types::MotionStatus;

    const TICK: Duration = Duration::from_millis(10);

    fn table() -> SlotTable {
        let factory: Box<SimulatorFactory> = Box::new(|gains: MotionGains| {
            Box::new(MotionInput::new(gains)) as Box<dyn MotionSimulator>
        });
        SlotTable::new(MotionGains::default(), TouchArea::default(), &*factory)
    }

    #[test]
    fn test_press_sets_bit_and_slot() {
        let mut table = table();
        assert!(table.press(100, 50, MouseButton::Left));

        assert!(table.is_pressed(MouseButton::Left));
        assert_eq!(table.buttons(), 0b1);
        assert_eq!(table.last_button(), MouseButton::Left);

        let info = table.slot(MouseButton::Left).unwrap();
        assert!(info.is_tilting());
        assert_eq!(info.origin(), Some(IVec2::new(100, 50)));
        assert_eq!(info.last_position(), IVec2::new(100, 50));
        assert!(info.data().pressed);
    }

    #[test]
    fn test_repeated_press_and_release_are_idempotent() {
        let mut table = table();
        assert!(table.press(0, 0, MouseButton::Right));
        assert!(!table.press(7, 7, MouseButton::Right));
        assert_eq!(
            table.slot(MouseButton::Right).unwrap().origin(),
            Some(IVec2::ZERO)
        );

        assert!(table.release(MouseButton::Right));
        assert!(!table.release(MouseButton::Right));
        assert!(!table.is_pressed(MouseButton::Right));
        assert_eq!(table.buttons(), 0);
    }

    #[test]
    fn test_undefined_button_is_ignored() {
        let mut table = table();
        assert!(!table.press(1, 2, MouseButton::Undefined));
        assert!(!table.release(MouseButton::Undefined));
        assert_eq!(table.buttons(), 0);
        assert_eq!(table.last_button(), MouseButton::Undefined);
        for index in 0..BUTTON_COUNT {
            assert_eq!(table.data(index).unwrap().pressed, false);
        }
        assert!(table.data(BUTTON_COUNT).is_none());
    }

    #[test]
    fn test_axis_accumulates_from_origin() {
        let mut table = table();
        table.press(200, 200, MouseButton::Left);

        table.move_to(210, 195);
        assert_eq!(table.data(0).unwrap().axis, [10, -5]);

        table.move_to(213, 198);
        assert_eq!(table.data(0).unwrap().axis, [13, -2]);
    }

    #[test]
    fn test_move_derives_tilt() {
        let mut table = table();
        table.press(0, 0, MouseButton::Left);
        table.move_to(3, 4);

        let info = table.slot(MouseButton::Left).unwrap();
        assert!((info.tilt_speed() - 5.0 * DEFAULT_SENSITIVITY).abs() < 1e-6);
        assert!((info.tilt_direction().x - 0.6).abs() < 1e-6);
        assert!((info.tilt_direction().y - 0.8).abs() < 1e-6);

        table.move_to(3, 4);
        let info = table.slot(MouseButton::Left).unwrap();
        assert_eq!(info.tilt_speed(), 0.0);
        assert_eq!(info.tilt_direction(), Vec2::ZERO);
    }

    #[test]
    fn test_move_without_held_button_is_noop() {
        let mut table = table();
        table.move_to(50, 50);
        for index in 0..BUTTON_COUNT {
            assert_eq!(table.data(index).unwrap().axis, [0, 0]);
        }

        table.press(0, 0, MouseButton::Wheel);
        table.release(MouseButton::Wheel);
        table.move_to(50, 50);
        assert_eq!(table.data(1).unwrap().axis, [0, 0]);
        assert_eq!(table.slot(MouseButton::Wheel).unwrap().tilt_speed(), 0.0);
    }

    #[test]
    fn test_move_routes_to_last_pressed_button() {
        let mut table = table();
        table.press(0, 0, MouseButton::Left);
        table.press(0, 0, MouseButton::Right);
        table.move_to(4, 0);

        assert_eq!(table.data(0).unwrap().axis, [0, 0]);
        assert_eq!(table.data(2).unwrap().axis, [4, 0]);
    }

    #[test]
    fn test_tick_advances_motion_and_consumes_impulse() {
        let mut table = table();
        table.press(0, 0, MouseButton::Left);
        table.move_to(10, 0);

        assert_eq!(table.tick(TICK), 1);
        let moved = table.data(0).unwrap().motion;
        assert_ne!(moved, MotionStatus::default());
        assert!(moved.gyroscope.z < 0.0);
        assert_eq!(table.slot(MouseButton::Left).unwrap().tilt_speed(), 0.0);

        table.tick(TICK);
        assert_eq!(table.data(0).unwrap().motion.gyroscope.z, 0.0);
    }

    #[test]
    fn test_zero_length_tick_keeps_impulse() {
        let mut table = table();
        table.press(0, 0, MouseButton::Left);
        table.move_to(10, 0);

        table.tick(Duration::ZERO);
        let speed = table.slot(MouseButton::Left).unwrap().tilt_speed();
        assert!((speed - 10.0 * DEFAULT_SENSITIVITY).abs() < 1e-6);
        assert_eq!(table.data(0).unwrap().motion.rotation.z, 0.0);

        table.tick(TICK);
        assert!(table.data(0).unwrap().motion.rotation.z < 0.0);
        assert_eq!(table.slot(MouseButton::Left).unwrap().tilt_speed(), 0.0);
    }

    #[test]
    fn test_release_settles_motion() {
        let mut table = table();
        table.press(0, 0, MouseButton::Left);
        table.move_to(0, 25);
        table.release(MouseButton::Left);

        let info = table.slot(MouseButton::Left).unwrap();
        assert!(!info.is_tilting());
        assert_eq!(info.tilt_speed(), 0.0);
        assert_eq!(info.origin(), None);

        table.tick(TICK);
        let settled = table.data(0).unwrap();
        for _ in 0..20 {
            table.tick(TICK);
        }
        assert_eq!(table.data(0).unwrap(), settled);
        assert!(!settled.pressed);
        assert_eq!(settled.axis, [0, 0]);
    }

    #[test]
    fn test_touch_reading_follows_pointer() {
        let mut table = table();
        table.press(640, 360, MouseButton::Left);
        let touch = table.data(0).unwrap().touch;
        assert!((touch.x - 0.5).abs() < 1e-6);
        assert!((touch.y - 0.5).abs() < 1e-6);
        assert!(touch.pressed);

        table.move_to(5000, -20);
        let touch = table.data(0).unwrap().touch;
        assert_eq!(touch.x, 1.0);
        assert_eq!(touch.y, 0.0);

        table.release(MouseButton::Left);
        assert!(!table.data(0).unwrap().touch.pressed);
    }

    #[test]
    fn test_apply_sensitivities_skips_invalid() {
        let mut table = table();
        table.apply_sensitivities(&[0.5, -1.0, f32::NAN, 0.0, 0.3]);

        assert_eq!(table.slot(MouseButton::Left).unwrap().sensitivity(), 0.5);
        assert_eq!(
            table.slot(MouseButton::Wheel).unwrap().sensitivity(),
            DEFAULT_SENSITIVITY
        );
        assert_eq!(
            table.slot(MouseButton::Right).unwrap().sensitivity(),
            DEFAULT_SENSITIVITY
        );
        assert_eq!(
            table.slot(MouseButton::Forward).unwrap().sensitivity(),
            DEFAULT_SENSITIVITY
        );
        assert_eq!(table.slot(MouseButton::Backward).unwrap().sensitivity(), 0.3);
    }
}
