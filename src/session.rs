//! Session state and the per-frame learning loop.
//!
//! One `step()` call is one rendered frame: encode, act, advance, reward,
//! remember, train. Everything the UI pokes at (draw gestures, the mode
//! selector, the start/reset/clear controls, the status readout) lives
//! here as plain state, so any frontend can drive it.

use std::path::Path;

use nalgebra as na;
use rand::rngs::StdRng;
use rand::SeedableRng;

use crate::agent::{encode, Action, DqnAgent, Transition};
use crate::car::Car;
use crate::config::SimConfig;
use crate::nn::{Mlp, ValueModel};
use crate::track::{Segment, Track, TrackError, TrackKind};
use crate::Point;

/// What the pointer is currently placing.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DrawMode {
    /// Road edges; strokes alternate between the left and right boundary.
    Boundary,
    /// A free obstacle segment per stroke.
    Obstacle,
    Start,
    End,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum BoundarySide {
    Left,
    Right,
}

/// Result of one simulation frame.
#[derive(Debug, Clone, Copy)]
pub struct StepOutcome {
    pub action: Action,
    pub reward: f64,
    pub done: bool,
}

/// Snapshot for the status display, refreshed on terminal transitions.
#[derive(Debug, Clone, Copy)]
pub struct Status {
    pub episode: u32,
    pub fitness: f64,
    pub epsilon: f64,
    pub learning: bool,
}

/// A drawing-and-learning session over one track, one car, one agent.
pub struct Session<M: ValueModel + Clone> {
    track: Track,
    car: Option<Car>,
    agent: DqnAgent<M>,
    config: SimConfig,
    mode: DrawMode,
    drawing: bool,
    stroke: Option<(Point, Point)>,
    side: BoundarySide,
    learning: bool,
    episode: u32,
    episode_return: f64,
    last_return: f64,
    pending_reset: Option<u32>,
}

impl Session<Mlp> {
    /// Builds a session with the default network-backed agent.
    pub fn new(kind: TrackKind, config: SimConfig, seed: u64) -> Self {
        let agent = DqnAgent::new(config.agent.clone(), seed);
        Self::with_agent(agent, kind, config)
    }
}

impl<M: ValueModel + Clone> Session<M> {
    /// Builds a session around a caller-supplied model, e.g. a test stub.
    pub fn with_model(model: M, kind: TrackKind, config: SimConfig, seed: u64) -> Self {
        let agent =
            DqnAgent::with_model(model, config.agent.clone(), StdRng::seed_from_u64(seed));
        Self::with_agent(agent, kind, config)
    }

    fn with_agent(agent: DqnAgent<M>, kind: TrackKind, config: SimConfig) -> Self {
        Session {
            track: Track::new(kind, config.track.clone()),
            car: None,
            agent,
            config,
            mode: DrawMode::Boundary,
            drawing: false,
            stroke: None,
            side: BoundarySide::Left,
            learning: false,
            episode: 0,
            episode_return: 0.0,
            last_return: 0.0,
            pending_reset: None,
        }
    }

    pub fn track(&self) -> &Track {
        &self.track
    }

    pub fn car(&self) -> Option<&Car> {
        self.car.as_ref()
    }

    pub fn mode(&self) -> DrawMode {
        self.mode
    }

    pub fn set_mode(&mut self, mode: DrawMode) {
        self.mode = mode;
    }

    pub fn status(&self) -> Status {
        Status {
            episode: self.episode,
            fitness: self.last_return,
            epsilon: self.agent.epsilon(),
            learning: self.learning,
        }
    }

    /// Pointer pressed: anchor a stroke or place a point, per mode.
    pub fn begin_stroke(&mut self, p: Point) {
        self.drawing = true;
        match self.mode {
            DrawMode::Boundary => self.add_boundary_point(p),
            DrawMode::Obstacle => self.stroke = Some((p, p)),
            DrawMode::Start => self.track.set_start(p),
            DrawMode::End => self.track.set_end(p),
        }
    }

    /// Pointer moved while pressed: extend the boundary or move the
    /// obstacle preview endpoint.
    pub fn extend_stroke(&mut self, p: Point) {
        if !self.drawing {
            return;
        }
        match self.mode {
            DrawMode::Boundary => self.add_boundary_point(p),
            DrawMode::Obstacle => {
                if let Some((_, end)) = &mut self.stroke {
                    *end = p;
                }
            }
            DrawMode::Start | DrawMode::End => {}
        }
    }

    /// Pointer released (or left the surface): finish the gesture.
    pub fn end_stroke(&mut self) {
        if !self.drawing {
            return;
        }
        self.drawing = false;
        match self.mode {
            DrawMode::Boundary => {
                self.side = match self.side {
                    BoundarySide::Left => BoundarySide::Right,
                    BoundarySide::Right => BoundarySide::Left,
                };
            }
            DrawMode::Obstacle => {
                if let Some((a, b)) = self.stroke.take() {
                    self.track.add_obstacle(Segment { a, b });
                }
            }
            DrawMode::Start | DrawMode::End => {}
        }
    }

    /// The obstacle segment being previewed mid-gesture, if any.
    pub fn stroke_preview(&self) -> Option<Segment> {
        self.stroke.map(|(a, b)| Segment { a, b })
    }

    fn add_boundary_point(&mut self, p: Point) {
        match self.side {
            BoundarySide::Left => self.track.add_left_point(p),
            BoundarySide::Right => self.track.add_right_point(p),
        }
    }

    /// Begins learning on the drawn track.
    ///
    /// Fails with the track's validation error when the drawing is not
    /// usable yet; nothing changes in that case. A car is spawned at the
    /// start point if none exists.
    pub fn start(&mut self) -> Result<(), TrackError> {
        self.track.validate()?;
        let origin = match self.track.start() {
            Some(p) => p,
            None => return Err(TrackError::MissingStart),
        };
        if self.car.is_none() {
            self.car = Some(Car::new(origin, self.config.car.clone()));
        }
        self.learning = true;
        self.episode = 0;
        self.episode_return = 0.0;
        self.pending_reset = None;
        tracing::info!("learning started");
        Ok(())
    }

    /// Puts an existing car back on the start point; learned state stays.
    pub fn reset_car(&mut self) {
        if let (Some(car), Some(start)) = (self.car.as_mut(), self.track.start()) {
            car.reset(start);
        }
    }

    /// Wipes the track and the car and halts learning.
    pub fn clear(&mut self) {
        self.track.clear();
        self.car = None;
        self.learning = false;
        self.drawing = false;
        self.stroke = None;
        self.pending_reset = None;
    }

    /// Runs one frame with the agent choosing the action.
    pub fn step(&mut self) -> Option<StepOutcome> {
        self.run_frame(None)
    }

    /// Runs one frame with a caller-chosen action, for scripted control.
    pub fn step_with(&mut self, action: Action) -> Option<StepOutcome> {
        self.run_frame(Some(action))
    }

    fn run_frame(&mut self, forced: Option<Action>) -> Option<StepOutcome> {
        if !self.learning {
            return None;
        }
        if self.tick_pending_reset() {
            return None;
        }
        let car = match self.car.as_mut() {
            Some(car) => car,
            None => return None,
        };

        let obs = encode(car, &self.track);
        let action = match forced {
            Some(action) => action,
            None => self.agent.select_action(&obs),
        };

        // Shaping reward compares the distance to the goal before the
        // action with the distance after the car has advanced.
        let goal_before = goal_distance(car, &self.track);
        action.apply(car);
        car.advance();

        let pos = car.position();
        let on_field = pos.x >= 0.0
            && pos.x <= self.config.width
            && pos.y >= 0.0
            && pos.y <= self.config.height;
        let (reward, done) = if self.track.reached_goal(&pos) {
            (self.config.goal_reward, true)
        } else if self.track.is_collision(&pos) || !on_field {
            (self.config.crash_penalty, true)
        } else {
            (goal_before - goal_distance(car, &self.track), false)
        };

        let next_obs = encode(car, &self.track);
        self.agent.remember(Transition {
            obs,
            action,
            reward,
            next_obs,
            done,
        });
        self.agent.train();

        self.episode_return += reward;
        if done {
            self.episode += 1;
            self.last_return = self.episode_return;
            self.episode_return = 0.0;
            tracing::info!(
                episode = self.episode,
                fitness = self.last_return,
                epsilon = self.agent.epsilon(),
                "episode finished"
            );
            if self.episode % self.config.target_sync_episodes == 0 {
                self.agent.sync_target();
            }
            match self.config.reset_delay_frames {
                None => self.reset_car(),
                Some(frames) => self.pending_reset = Some(frames),
            }
        }

        Some(StepOutcome {
            action,
            reward,
            done,
        })
    }

    /// Counts down a deferred reset. Returns true while the car should be
    /// left where it ended its episode.
    fn tick_pending_reset(&mut self) -> bool {
        match self.pending_reset {
            Some(0) => {
                self.pending_reset = None;
                self.reset_car();
                false
            }
            Some(frames) => {
                self.pending_reset = Some(frames - 1);
                true
            }
            None => false,
        }
    }

    /// Writes the agent's online network to the save slot.
    pub fn save_model(&self, path: &Path) -> anyhow::Result<()> {
        self.agent.save_model(path)
    }

    /// Best-effort restore from the save slot; a missing snapshot is fine.
    pub fn load_model(&mut self, path: &Path) {
        self.agent.load_model(path)
    }
}

fn goal_distance(car: &Car, track: &Track) -> f64 {
    match track.end() {
        Some(end) => na::distance(&car.position(), &end),
        None => 0.0,
    }
}
