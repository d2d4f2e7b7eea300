//! Tuning constants for the simulation, gathered into plain config structs.

/// Collision and sensing constants of the drawn track.
#[derive(Debug, Clone)]
pub struct TrackConfig {
    /// Distance within which a point counts as touching a segment.
    pub margin: f64,
    /// Maximum length of a sensor ray.
    pub sensor_range: f64,
    /// Ray-march increment; must not exceed `margin`.
    pub ray_step: f64,
    /// Radius around the end point that counts as reaching the goal.
    pub goal_radius: f64,
}

impl Default for TrackConfig {
    fn default() -> Self {
        TrackConfig {
            margin: 5.0,
            sensor_range: 200.0,
            ray_step: 1.0,
            goal_radius: 10.0,
        }
    }
}

/// Kinematic constants of the car.
#[derive(Debug, Clone)]
pub struct CarConfig {
    /// Top forward speed; reverse is capped at half of it.
    pub max_speed: f64,
    /// Speed change per accelerate call.
    pub acceleration: f64,
    /// Heading change per turn call, in radians.
    pub turn_rate: f64,
    /// Body length, for rendering.
    pub length: f64,
    /// Body width, for rendering.
    pub width: f64,
    /// Minimum speed magnitude enforced after an accelerate call, so the
    /// car cannot stall in place. `None` lets the speed settle at zero.
    pub speed_floor: Option<f64>,
}

impl Default for CarConfig {
    fn default() -> Self {
        CarConfig {
            max_speed: 4.0,
            acceleration: 0.2,
            turn_rate: 0.1,
            length: 30.0,
            width: 15.0,
            speed_floor: Some(0.1),
        }
    }
}

/// Learning constants of the value-function agent.
#[derive(Debug, Clone)]
pub struct AgentConfig {
    /// Width of each hidden layer.
    pub hidden_size: usize,
    /// Adam learning rate.
    pub learning_rate: f64,
    /// Discount factor for bootstrapped targets.
    pub gamma: f64,
    /// Initial exploration rate.
    pub epsilon_start: f64,
    /// Exploration rate floor.
    pub epsilon_min: f64,
    /// Multiplicative exploration decay applied after each training step.
    pub epsilon_decay: f64,
    /// Replay buffer capacity; oldest transitions are evicted first.
    pub memory_capacity: usize,
    /// Number of transitions sampled per training step.
    pub batch_size: usize,
}

impl Default for AgentConfig {
    fn default() -> Self {
        AgentConfig {
            hidden_size: 24,
            learning_rate: 0.001,
            gamma: 0.95,
            epsilon_start: 1.0,
            epsilon_min: 0.01,
            epsilon_decay: 0.995,
            memory_capacity: 10_000,
            batch_size: 32,
        }
    }
}

/// Session-level constants: playfield bounds, rewards, cadences.
#[derive(Debug, Clone)]
pub struct SimConfig {
    /// Playfield width in world units.
    pub width: f64,
    /// Playfield height in world units.
    pub height: f64,
    /// Reward granted on reaching the goal.
    pub goal_reward: f64,
    /// Reward granted on collision or leaving the playfield.
    pub crash_penalty: f64,
    /// Target network sync cadence, in completed episodes.
    pub target_sync_episodes: u32,
    /// Frames to hold the car in place after a terminal step before it
    /// resets to the start point. `None` resets immediately.
    pub reset_delay_frames: Option<u32>,
    pub track: TrackConfig,
    pub car: CarConfig,
    pub agent: AgentConfig,
}

impl Default for SimConfig {
    fn default() -> Self {
        SimConfig {
            width: 800.0,
            height: 600.0,
            goal_reward: 1000.0,
            crash_penalty: -100.0,
            target_sync_episodes: 10,
            reset_delay_frames: None,
            track: TrackConfig::default(),
            car: CarConfig::default(),
            agent: AgentConfig::default(),
        }
    }
}
