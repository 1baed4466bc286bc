//! Mouse subsystem for motion and touch emulation
//!
//! Turns button-hold-and-drag gestures into a continuously updated simulated
//! tilt, one slot per logical button:
//!
//! 1. [`mouse_handle`] - Event handlers, accessors and lifecycle
//! 2. [`slot`] - Slot table shared by the handlers and the updater
//! 3. [`updater`] - Fixed-cadence background update thread
//! 4. [`status_queue`] - Press notifications for UI consumers
//!
//! # Architecture
//!
//! ```text
//! Capture ──► Mouse ──► SlotTable ◄── Updater ──► MotionSimulator
//!               │        (5 slots)      │
//!               ▼                       ▼
//!          StatusQueue            SettingsSource
//! ```
//!
//! Motion only advances on updater ticks, so irregular pointer event rates
//! never change the cadence consumers observe.

pub mod motion;
pub mod mouse_handle;
pub mod settings;
pub mod slot;
pub mod status_queue;
pub mod types;
pub mod updater;

pub use motion::{MotionGains, MotionInput, MotionSimulator, SimulatorFactory};
pub use mouse_handle::{Mouse, MouseError, MouseSettings};
pub use settings::{SettingsError, SettingsPortal, SettingsSource};
pub use status_queue::StatusQueue;
pub use types::{MotionStatus, MouseButton, MouseData, MouseStatus, TouchStatus, BUTTON_COUNT};
