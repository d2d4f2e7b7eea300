//! The drawn track: collision layout, start/end points, sensing.

use nalgebra as na;
use thiserror::Error;

use crate::config::TrackConfig;
use crate::geometry::{cast_ray, distance_to_segment};
use crate::Point;

/// A free-standing obstacle segment.
#[derive(Debug, Clone, Copy)]
pub struct Segment {
    pub a: Point,
    pub b: Point,
}

/// Which collision layout a track is built with.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TrackKind {
    /// Two drawn polylines forming the left and right edges of a road.
    Boundary,
    /// Loose obstacle segments anywhere on the playfield.
    Obstacles,
}

/// Collision geometry for a track, one variant per [`TrackKind`].
#[derive(Debug, Clone)]
pub enum Layout {
    Boundary { left: Vec<Point>, right: Vec<Point> },
    Obstacles { segments: Vec<Segment> },
}

/// Why a track cannot host a learning run yet.
#[derive(Error, Debug, PartialEq, Eq)]
pub enum TrackError {
    #[error("no start point set")]
    MissingStart,
    #[error("no end point set")]
    MissingEnd,
    #[error("each road boundary needs at least two points")]
    IncompleteBoundary,
}

/// A user-drawn track with optional start and end points.
///
/// The collision policy is fixed at construction: either the drawn road
/// boundaries block the car, or free-standing obstacle segments do. All
/// queries go through the same surface regardless of variant.
#[derive(Debug, Clone)]
pub struct Track {
    layout: Layout,
    start: Option<Point>,
    end: Option<Point>,
    config: TrackConfig,
}

impl Track {
    /// Constructs an empty track of the given kind.
    pub fn new(kind: TrackKind, config: TrackConfig) -> Self {
        let layout = match kind {
            TrackKind::Boundary => Layout::Boundary {
                left: Vec::new(),
                right: Vec::new(),
            },
            TrackKind::Obstacles => Layout::Obstacles {
                segments: Vec::new(),
            },
        };
        Track {
            layout,
            start: None,
            end: None,
            config,
        }
    }

    pub fn layout(&self) -> &Layout {
        &self.layout
    }

    pub fn start(&self) -> Option<Point> {
        self.start
    }

    pub fn end(&self) -> Option<Point> {
        self.end
    }

    pub fn config(&self) -> &TrackConfig {
        &self.config
    }

    /// True if `p` lies within the collision margin of the track geometry.
    ///
    /// A boundary with fewer than two points has no segments yet and never
    /// collides, leaving the track open while it is being drawn.
    pub fn is_collision(&self, p: &Point) -> bool {
        let margin = self.config.margin;
        match &self.layout {
            Layout::Boundary { left, right } => {
                polyline_hit(p, left, margin) || polyline_hit(p, right, margin)
            }
            Layout::Obstacles { segments } => segments
                .iter()
                .any(|s| distance_to_segment(p, &s.a, &s.b) < margin),
        }
    }

    /// Distance from `origin` along `angle` to the first obstruction,
    /// clamped to the sensor range.
    pub fn sense(&self, origin: &Point, angle: f64) -> f64 {
        cast_ray(
            origin,
            angle,
            self.config.sensor_range,
            self.config.ray_step,
            |p| self.is_collision(p),
        )
    }

    /// True if `p` is within the goal radius of the end point.
    pub fn reached_goal(&self, p: &Point) -> bool {
        match self.end {
            Some(end) => na::distance(p, &end) < self.config.goal_radius,
            None => false,
        }
    }

    /// Appends a point to the left boundary. Ignored on an obstacle track.
    pub fn add_left_point(&mut self, p: Point) {
        match &mut self.layout {
            Layout::Boundary { left, .. } => left.push(p),
            Layout::Obstacles { .. } => {
                tracing::debug!("boundary point ignored on obstacle track")
            }
        }
    }

    /// Appends a point to the right boundary. Ignored on an obstacle track.
    pub fn add_right_point(&mut self, p: Point) {
        match &mut self.layout {
            Layout::Boundary { right, .. } => right.push(p),
            Layout::Obstacles { .. } => {
                tracing::debug!("boundary point ignored on obstacle track")
            }
        }
    }

    /// Appends an obstacle segment. Ignored on a boundary track.
    pub fn add_obstacle(&mut self, segment: Segment) {
        match &mut self.layout {
            Layout::Obstacles { segments } => segments.push(segment),
            Layout::Boundary { .. } => {
                tracing::debug!("obstacle segment ignored on boundary track")
            }
        }
    }

    pub fn set_start(&mut self, p: Point) {
        self.start = Some(p);
    }

    pub fn set_end(&mut self, p: Point) {
        self.end = Some(p);
    }

    /// Wipes all drawn geometry and both endpoints.
    pub fn clear(&mut self) {
        match &mut self.layout {
            Layout::Boundary { left, right } => {
                left.clear();
                right.clear();
            }
            Layout::Obstacles { segments } => segments.clear(),
        }
        self.start = None;
        self.end = None;
    }

    /// Checks that the track can host a learning run: start and end points
    /// are set, and a boundary track has both edges drawn.
    pub fn validate(&self) -> Result<(), TrackError> {
        if self.start.is_none() {
            return Err(TrackError::MissingStart);
        }
        if self.end.is_none() {
            return Err(TrackError::MissingEnd);
        }
        if let Layout::Boundary { left, right } = &self.layout {
            if left.len() < 2 || right.len() < 2 {
                return Err(TrackError::IncompleteBoundary);
            }
        }
        Ok(())
    }
}

fn polyline_hit(p: &Point, points: &[Point], margin: f64) -> bool {
    points
        .windows(2)
        .any(|w| distance_to_segment(p, &w[0], &w[1]) < margin)
}
