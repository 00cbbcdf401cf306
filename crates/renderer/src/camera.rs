//! Free-fly camera used to build the per-frame ray basis.
//!
//! World axes follow a Z-up convention: forward is +Y, right is +X, up is +Z.
//! Orientation is yaw about up followed by pitch about right, recomputed from
//! the scalar angles every frame so no rotation error accumulates.

use std::f32::consts::FRAC_PI_2;
use std::time::Duration;

use glam::{Mat3, Vec3};

pub const CAM_FORWARD: Vec3 = Vec3::Y;
pub const CAM_RIGHT: Vec3 = Vec3::X;
pub const CAM_UP: Vec3 = Vec3::Z;

/// Distance from the eye to the image plane spanned by the UV quad.
pub const FOCAL_LENGTH: f32 = 1.0;

const PITCH_LIMIT: f32 = FRAC_PI_2;

/// Signed movement directions bound to held keys.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MoveAxis {
    Forward,
    Backward,
    Right,
    Left,
    Up,
    Down,
}

impl MoveAxis {
    pub fn direction(self) -> Vec3 {
        match self {
            MoveAxis::Forward => CAM_FORWARD,
            MoveAxis::Backward => -CAM_FORWARD,
            MoveAxis::Right => CAM_RIGHT,
            MoveAxis::Left => -CAM_RIGHT,
            MoveAxis::Up => CAM_UP,
            MoveAxis::Down => -CAM_UP,
        }
    }

    fn bit(self) -> u8 {
        1 << (self as u8)
    }
}

/// World-space vectors handed to the shader each frame.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RayBasis {
    pub origin: Vec3,
    /// Ray through the screen centre, scaled by the focal length.
    pub direction: Vec3,
    pub right: Vec3,
    pub up: Vec3,
}

#[derive(Debug, Clone)]
pub struct Camera {
    position: Vec3,
    yaw: f32,
    pitch: f32,
    velocity: Vec3,
    speed: f32,
    held: u8,
}

impl Camera {
    pub fn new(speed: f32) -> Self {
        Self {
            position: Vec3::ZERO,
            yaw: 0.0,
            pitch: 0.0,
            velocity: Vec3::ZERO,
            speed,
            held: 0,
        }
    }

    pub fn position(&self) -> Vec3 {
        self.position
    }

    pub fn yaw(&self) -> f32 {
        self.yaw
    }

    pub fn pitch(&self) -> f32 {
        self.pitch
    }

    pub fn velocity(&self) -> Vec3 {
        self.velocity
    }

    pub fn speed(&self) -> f32 {
        self.speed
    }

    /// Adds the axis to the velocity. A press of an already-held axis is
    /// ignored so auto-repeat can never double count. Returns whether the
    /// velocity changed.
    pub fn press(&mut self, axis: MoveAxis) -> bool {
        if self.held & axis.bit() != 0 {
            return false;
        }
        self.held |= axis.bit();
        self.velocity += axis.direction();
        true
    }

    /// Removes a held axis from the velocity; releases of axes that are not
    /// held are ignored.
    pub fn release(&mut self, axis: MoveAxis) -> bool {
        if self.held & axis.bit() == 0 {
            return false;
        }
        self.held &= !axis.bit();
        self.velocity -= axis.direction();
        true
    }

    /// Turns the camera by pointer deltas expressed in degrees.
    pub fn look(&mut self, yaw_degrees: f32, pitch_degrees: f32) {
        self.yaw -= yaw_degrees.to_radians();
        self.pitch = (self.pitch - pitch_degrees.to_radians()).clamp(-PITCH_LIMIT, PITCH_LIMIT);
    }

    /// Scales speed geometrically so repeated wheel ticks compound.
    pub fn scale_speed(&mut self, wheel_delta: f32, factor: f32) {
        self.speed *= (wheel_delta * factor).exp();
    }

    /// Returns to the origin looking down the forward axis.
    pub fn recenter(&mut self) {
        self.position = Vec3::ZERO;
        self.yaw = 0.0;
        self.pitch = 0.0;
    }

    pub fn orientation(&self) -> Mat3 {
        Mat3::from_axis_angle(CAM_UP, self.yaw) * Mat3::from_axis_angle(CAM_RIGHT, self.pitch)
    }

    /// Advances the position by one variable-length frame.
    pub fn integrate(&mut self, delta: Duration) {
        let seconds = delta.as_millis() as f32 / 1000.0;
        self.position += self.orientation() * (self.velocity * self.speed * seconds);
    }

    pub fn ray_basis(&self) -> RayBasis {
        let orientation = self.orientation();
        RayBasis {
            origin: self.position,
            direction: orientation * CAM_FORWARD * FOCAL_LENGTH,
            right: orientation * CAM_RIGHT,
            up: orientation * CAM_UP,
        }
    }
}
