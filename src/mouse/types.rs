use glam::Vec3;
use serde::{Deserialize, Serialize};

/// Number of addressable mouse button slots
pub const BUTTON_COUNT: usize = 5;

// Logical mouse button
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Default, Serialize, Deserialize,
)]
pub enum MouseButton {
    Left,
    Wheel,
    Right,
    Forward,
    Backward,
    #[default]
    Undefined,
}

impl MouseButton {
    /// All buttons that own a slot, in slot order
    pub const ALL: [MouseButton; BUTTON_COUNT] = [
        MouseButton::Left,
        MouseButton::Wheel,
        MouseButton::Right,
        MouseButton::Forward,
        MouseButton::Backward,
    ];

    /// Maps a raw frontend button identifier to a logical button.
    ///
    /// Anything outside `0..BUTTON_COUNT` becomes `Undefined`.
    pub fn from_raw(raw: i32) -> MouseButton {
        usize::try_from(raw)
            .ok()
            .and_then(|index| Self::ALL.get(index).copied())
            .unwrap_or(MouseButton::Undefined)
    }

    /// Slot index of this button, `None` for `Undefined`
    pub fn index(self) -> Option<usize> {
        match self {
            MouseButton::Left => Some(0),
            MouseButton::Wheel => Some(1),
            MouseButton::Right => Some(2),
            MouseButton::Forward => Some(3),
            MouseButton::Backward => Some(4),
            MouseButton::Undefined => None,
        }
    }

    /// Bit of this button inside the pressed bitmask
    pub fn mask(self) -> u16 {
        self.index().map(|index| 1u16 << index).unwrap_or(0)
    }
}

// Discrete press notification carried by the status queue
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct MouseStatus {
    pub button: MouseButton,
}

// Emulated sensor reading produced by the motion simulator
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct MotionStatus {
    pub accelerometer: Vec3,
    pub gyroscope: Vec3,
    pub rotation: Vec3,
    pub orientation: [Vec3; 3],
}

impl Default for MotionStatus {
    fn default() -> Self {
        Self {
            accelerometer: Vec3::NEG_Z,
            gyroscope: Vec3::ZERO,
            rotation: Vec3::ZERO,
            orientation: [Vec3::X, Vec3::Y, Vec3::Z],
        }
    }
}

// Touch reading in normalised surface coordinates
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct TouchStatus {
    pub x: f32,
    pub y: f32,
    pub pressed: bool,
}

/// Per-slot state published to consumers
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct MouseData {
    pub pressed: bool,
    pub axis: [i32; 2],
    pub motion: MotionStatus,
    pub touch: TouchStatus,
}
