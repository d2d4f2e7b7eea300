use nalgebra as na;

pub type Point = na::Point2<f64>;
pub type Vector = na::Vector2<f64>;

pub mod agent;
pub mod car;
pub mod config;
pub mod geometry;
pub mod nn;
pub mod session;
pub mod track;

pub use agent::{Action, DqnAgent, Transition};
pub use car::Car;
pub use config::{AgentConfig, CarConfig, SimConfig, TrackConfig};
pub use nn::{Mlp, ModelWeights, ValueModel};
pub use session::{DrawMode, Session, Status, StepOutcome};
pub use track::{Segment, Track, TrackError, TrackKind};
