//! Motion simulation behind each mouse slot
//!
//! A slot never talks to an integration scheme directly. It feeds a 2-D tilt
//! (unit direction plus angular speed) into a [`MotionSimulator`] and reads
//! back a [`MotionStatus`]. [`MotionInput`] is the default simulator: it turns
//! the tilt into an angular rate, integrates it into an orientation quaternion
//! and optionally pulls the orientation back to rest with a PID term.

use crate::mouse::types::MotionStatus;
use glam::{Quat, Vec2, Vec3};
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Gravity in the rest frame, in g
const GRAVITY: Vec3 = Vec3::NEG_Z;

/// Initial rate-of-change parameters of a simulator
///
/// `kp`, `ki` and `kd` weigh the proportional, integral and derivative pull of
/// the orientation back towards rest. All zero means pure integration.
#[derive(Deserialize, Serialize, Clone, Copy, Debug, Default, PartialEq)]
pub struct MotionGains {
    pub kp: f32,
    pub ki: f32,
    pub kd: f32,
}

impl MotionGains {
    pub fn is_zero(&self) -> bool {
        self.kp == 0.0 && self.ki == 0.0 && self.kd == 0.0
    }
}

/// Capability interface for anything that can emulate a motion sensor
///
/// One instance is owned by each slot; calls for the same slot are serialised
/// by the slot table lock.
pub trait MotionSimulator: Send + 'static {
    /// Advances the simulation by `elapsed` with the given tilt
    fn advance(&mut self, direction: Vec2, speed: f32, elapsed: Duration);

    /// Current emulated sensor reading
    fn reading(&self) -> MotionStatus;
}

/// Builds one simulator per slot at construction time
pub type SimulatorFactory = dyn Fn(MotionGains) -> Box<dyn MotionSimulator> + Send + Sync;

/// Default gyroscope/orientation integrator
#[derive(Debug, Clone)]
pub struct MotionInput {
    gains: MotionGains,
    gyro: Vec3,
    rotation: Vec3,
    orientation: Quat,
    integral: Vec3,
    last_error: Vec3,
}

impl MotionInput {
    pub fn new(gains: MotionGains) -> Self {
        Self {
            gains,
            gyro: Vec3::ZERO,
            rotation: Vec3::ZERO,
            orientation: Quat::IDENTITY,
            integral: Vec3::ZERO,
            last_error: Vec3::ZERO,
        }
    }

    pub fn orientation(&self) -> Quat {
        self.orientation
    }

    /// Maps a screen-space tilt onto an angular rate.
    ///
    /// Vertical pointer motion tilts about X, horizontal motion about Z.
    fn angular_rate(direction: Vec2, speed: f32) -> Vec3 {
        Vec3::new(-direction.y, 0.0, -direction.x) * speed
    }

    // Small-angle rotation vector of the current orientation
    fn orientation_error(&self) -> Vec3 {
        let sign = if self.orientation.w < 0.0 { -1.0 } else { 1.0 };
        self.orientation.xyz() * (2.0 * sign)
    }

    fn correction(&mut self, dt: f32) -> Vec3 {
        if self.gains.is_zero() {
            return Vec3::ZERO;
        }

        let error = self.orientation_error();
        self.integral = self.integral + error * dt;
        let derivative = (error - self.last_error) * (1.0 / dt);
        self.last_error = error;

        -(error * self.gains.kp + self.integral * self.gains.ki + derivative * self.gains.kd)
    }
}

impl Default for MotionInput {
    fn default() -> Self {
        Self::new(MotionGains::default())
    }
}

impl MotionSimulator for MotionInput {
    fn advance(&mut self, direction: Vec2, speed: f32, elapsed: Duration) {
        self.gyro = Self::angular_rate(direction, speed);

        let dt = elapsed.as_secs_f32();
        if dt <= 0.0 {
            return;
        }

        self.rotation = self.rotation + self.gyro * dt;

        let rate = self.gyro + self.correction(dt);
        if rate == Vec3::ZERO {
            return;
        }

        let magnitude = rate.length();
        let step = Quat::from_axis_angle(rate / magnitude, magnitude * dt);
        self.orientation = (self.orientation * step).normalize();
    }

    fn reading(&self) -> MotionStatus {
        MotionStatus {
            accelerometer: self.orientation.conjugate().mul_vec3(GRAVITY),
            gyroscope: self.gyro,
            rotation: self.rotation,
            orientation: [
                self.orientation.mul_vec3(Vec3::X),
                self.orientation.mul_vec3(Vec3::Y),
                self.orientation.mul_vec3(Vec3::Z),
            ],
        }
    }
}
