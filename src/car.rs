//! Car kinematics and its ray-sensor fan.

use std::f64::consts::{FRAC_PI_2, FRAC_PI_4};

use crate::config::CarConfig;
use crate::geometry::normalize_angle;
use crate::track::Track;
use crate::{Point, Vector};

/// Sensor directions relative to the heading: a symmetric fan from the left
/// flank to the right flank.
pub const SENSOR_ANGLES: [f64; 5] = [-FRAC_PI_2, -FRAC_PI_4, 0.0, FRAC_PI_4, FRAC_PI_2];

/// The simulated car.
///
/// Holds continuous kinematic state only; every control operation is a total
/// function of the current state.
#[derive(Debug, Clone)]
pub struct Car {
    position: Point,
    heading: f64,
    speed: f64,
    config: CarConfig,
}

impl Car {
    /// Places a new car at `position`, facing along +x, standing still.
    pub fn new(position: Point, config: CarConfig) -> Self {
        Car {
            position,
            heading: 0.0,
            speed: 0.0,
            config,
        }
    }

    pub fn position(&self) -> Point {
        self.position
    }

    pub fn heading(&self) -> f64 {
        self.heading
    }

    pub fn speed(&self) -> f64 {
        self.speed
    }

    pub fn config(&self) -> &CarConfig {
        &self.config
    }

    /// Speeds up toward the forward cap, never past it.
    pub fn accelerate_forward(&mut self) {
        self.speed = (self.speed + self.config.acceleration).min(self.config.max_speed);
        if let Some(floor) = self.config.speed_floor {
            if self.speed < floor {
                self.speed = floor;
            }
        }
    }

    /// Slows down toward the reverse cap, which is half the forward cap.
    pub fn accelerate_backward(&mut self) {
        self.speed = (self.speed - self.config.acceleration).max(-self.config.max_speed / 2.0);
        if let Some(floor) = self.config.speed_floor {
            if self.speed > -floor {
                self.speed = -floor;
            }
        }
    }

    pub fn turn_left(&mut self) {
        self.heading = normalize_angle(self.heading - self.config.turn_rate);
    }

    pub fn turn_right(&mut self) {
        self.heading = normalize_angle(self.heading + self.config.turn_rate);
    }

    /// Moves one step along the heading at the current speed.
    pub fn advance(&mut self) {
        let dir = Vector::new(self.heading.cos(), self.heading.sin());
        self.position += dir * self.speed;
        self.heading = normalize_angle(self.heading);
    }

    /// Reads the sensor fan against the track, one clamped distance per ray.
    pub fn sense(&self, track: &Track) -> Vec<f64> {
        SENSOR_ANGLES
            .iter()
            .map(|offset| track.sense(&self.position, self.heading + offset))
            .collect()
    }

    /// Puts the car back at `position`, facing +x, standing still.
    pub fn reset(&mut self, position: Point) {
        self.position = position;
        self.heading = 0.0;
        self.speed = 0.0;
    }
}
