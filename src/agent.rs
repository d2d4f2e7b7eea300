//! The learning agent: observation encoding, exploration, replay memory,
//! and the value-function training step.

use std::collections::VecDeque;
use std::fs;
use std::fs::File;
use std::io::BufWriter;
use std::path::Path;

use anyhow::Context;
use nalgebra::DVector;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

use crate::car::{Car, SENSOR_ANGLES};
use crate::config::AgentConfig;
use crate::geometry::normalize_angle;
use crate::nn::{Mlp, ModelWeights, ValueModel};
use crate::track::Track;

/// Length of the observation vector: one sensor reading per ray, plus the
/// signed angle to the goal and the distance to the goal.
pub const OBSERVATION_LEN: usize = SENSOR_ANGLES.len() + 2;

/// The discrete controls the agent chooses between, exactly one per step.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Action {
    Forward,
    Backward,
    TurnLeft,
    TurnRight,
}

impl Action {
    pub const ALL: [Action; 4] = [
        Action::Forward,
        Action::Backward,
        Action::TurnLeft,
        Action::TurnRight,
    ];

    /// Stable position of this action in the network's output vector.
    pub fn index(self) -> usize {
        match self {
            Action::Forward => 0,
            Action::Backward => 1,
            Action::TurnLeft => 2,
            Action::TurnRight => 3,
        }
    }

    /// Applies this action's kinematic effect to the car.
    pub fn apply(self, car: &mut Car) {
        match self {
            Action::Forward => car.accelerate_forward(),
            Action::Backward => car.accelerate_backward(),
            Action::TurnLeft => car.turn_left(),
            Action::TurnRight => car.turn_right(),
        }
    }
}

/// One step of experience.
#[derive(Debug, Clone)]
pub struct Transition {
    pub obs: DVector<f64>,
    pub action: Action,
    pub reward: f64,
    pub next_obs: DVector<f64>,
    pub done: bool,
}

/// Bounded experience store; the oldest entry makes room for the newest.
#[derive(Debug)]
struct ReplayBuffer {
    entries: VecDeque<Transition>,
    capacity: usize,
}

impl ReplayBuffer {
    fn new(capacity: usize) -> Self {
        ReplayBuffer {
            entries: VecDeque::with_capacity(capacity),
            capacity,
        }
    }

    fn push(&mut self, transition: Transition) {
        if self.entries.len() == self.capacity {
            self.entries.pop_front();
        }
        self.entries.push_back(transition);
    }

    fn len(&self) -> usize {
        self.entries.len()
    }

    fn get(&self, index: usize) -> &Transition {
        &self.entries[index]
    }
}

/// Encodes the simulation state the agent sees: the sensor fan, then the
/// signed angle from the heading to the goal direction, then the distance
/// to the goal. Both goal features are zero while no end point is set.
pub fn encode(car: &Car, track: &Track) -> DVector<f64> {
    let readings = car.sense(track);
    let (angle, dist) = match track.end() {
        Some(end) => {
            let to_goal = end - car.position();
            let angle = normalize_angle(to_goal.y.atan2(to_goal.x) - car.heading());
            (angle, to_goal.norm())
        }
        None => (0.0, 0.0),
    };
    let len = readings.len() + 2;
    DVector::from_iterator(len, readings.into_iter().chain([angle, dist]))
}

/// A fitted-Q agent over a fixed action set, with an online network, a
/// periodically synced frozen target copy, and FIFO replay memory.
pub struct DqnAgent<M: ValueModel> {
    online: M,
    target: M,
    replay: ReplayBuffer,
    epsilon: f64,
    config: AgentConfig,
    rng: StdRng,
}

impl DqnAgent<Mlp> {
    /// Builds the default agent: a fixed-topology perceptron sized from the
    /// observation and action widths.
    pub fn new(config: AgentConfig, seed: u64) -> Self {
        let mut rng = StdRng::seed_from_u64(seed);
        let sizes = [
            OBSERVATION_LEN,
            config.hidden_size,
            config.hidden_size,
            Action::ALL.len(),
        ];
        let model = Mlp::new(&sizes, config.learning_rate, &mut rng);
        Self::with_model(model, config, rng)
    }
}

impl<M: ValueModel + Clone> DqnAgent<M> {
    /// Wraps an existing model; the target starts as an exact copy.
    pub fn with_model(model: M, config: AgentConfig, rng: StdRng) -> Self {
        let target = model.clone();
        DqnAgent {
            online: model,
            target,
            replay: ReplayBuffer::new(config.memory_capacity),
            epsilon: config.epsilon_start,
            config,
            rng,
        }
    }

    pub fn epsilon(&self) -> f64 {
        self.epsilon
    }

    pub fn memory_len(&self) -> usize {
        self.replay.len()
    }

    /// Picks an action: uniformly random with probability epsilon, else the
    /// argmax of the online network, first index winning ties.
    pub fn select_action(&mut self, obs: &DVector<f64>) -> Action {
        if self.rng.gen::<f64>() < self.epsilon {
            return Action::ALL[self.rng.gen_range(0..Action::ALL.len())];
        }
        let q = self.online.predict(obs);
        let mut best = 0;
        for i in 1..q.len() {
            if q[i] > q[best] {
                best = i;
            }
        }
        Action::ALL[best]
    }

    /// Stores one transition, evicting the oldest once at capacity.
    pub fn remember(&mut self, transition: Transition) {
        self.replay.push(transition);
    }

    /// Runs one training step from replay memory.
    ///
    /// Samples uniformly with replacement, regresses the taken action's
    /// value onto `reward` (terminal) or `reward + gamma * max` of the
    /// target network's estimate (non-terminal), leaves every other output
    /// at the online prediction, and fits once. Returns false when the
    /// buffer is still below one batch.
    pub fn train(&mut self) -> bool {
        let batch_size = self.config.batch_size;
        if self.replay.len() < batch_size {
            return false;
        }

        let picks: Vec<usize> = (0..batch_size)
            .map(|_| self.rng.gen_range(0..self.replay.len()))
            .collect();
        let inputs: Vec<DVector<f64>> = picks
            .iter()
            .map(|&i| self.replay.get(i).obs.clone())
            .collect();
        let next_inputs: Vec<DVector<f64>> = picks
            .iter()
            .map(|&i| self.replay.get(i).next_obs.clone())
            .collect();

        let mut targets = self.online.predict_batch(&inputs);
        let next_q = self.target.predict_batch(&next_inputs);
        for (row, &pick) in picks.iter().enumerate() {
            let transition = self.replay.get(pick);
            let value = if transition.done {
                transition.reward
            } else {
                transition.reward + self.config.gamma * max_value(&next_q[row])
            };
            targets[row][transition.action.index()] = value;
        }

        self.online.fit(&inputs, &targets);
        self.epsilon = (self.epsilon * self.config.epsilon_decay).max(self.config.epsilon_min);
        true
    }

    /// Copies the online parameters into the target network verbatim.
    pub fn sync_target(&mut self) {
        self.target = self.online.clone();
    }

    /// Writes the online network's parameters to `path` as JSON.
    pub fn save_model(&self, path: &Path) -> anyhow::Result<()> {
        let file = File::create(path)
            .with_context(|| format!("creating model file {}", path.display()))?;
        serde_json::to_writer(BufWriter::new(file), &self.online.weights())
            .context("serializing model weights")?;
        Ok(())
    }

    /// Best-effort restore of the online parameters from `path`.
    ///
    /// A missing or unreadable snapshot keeps the freshly initialized
    /// network; a successful restore also re-syncs the target copy.
    pub fn load_model(&mut self, path: &Path) {
        let weights: ModelWeights = match fs::read_to_string(path) {
            Ok(json) => match serde_json::from_str(&json) {
                Ok(weights) => weights,
                Err(e) => {
                    tracing::warn!("saved model at {} is unreadable: {e}", path.display());
                    return;
                }
            },
            Err(e) => {
                tracing::warn!("no saved model at {}: {e}", path.display());
                return;
            }
        };
        match self.online.set_weights(&weights) {
            Ok(()) => {
                self.sync_target();
                tracing::info!("restored model from {}", path.display());
            }
            Err(e) => {
                tracing::warn!("saved model at {} does not fit this network: {e}", path.display())
            }
        }
    }
}

fn max_value(q: &DVector<f64>) -> f64 {
    q.iter().copied().fold(f64::NEG_INFINITY, f64::max)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::nn::ModelError;

    /// Deterministic stand-in for the network: constant predictions, with
    /// every fit call recorded.
    #[derive(Clone)]
    struct Stub {
        q: DVector<f64>,
        fitted: Vec<(Vec<DVector<f64>>, Vec<DVector<f64>>)>,
    }

    impl Stub {
        fn constant(q: Vec<f64>) -> Self {
            Stub {
                q: DVector::from_vec(q),
                fitted: Vec::new(),
            }
        }
    }

    impl ValueModel for Stub {
        fn predict(&self, _obs: &DVector<f64>) -> DVector<f64> {
            self.q.clone()
        }

        fn fit(&mut self, inputs: &[DVector<f64>], targets: &[DVector<f64>]) {
            self.fitted.push((inputs.to_vec(), targets.to_vec()));
        }

        fn weights(&self) -> ModelWeights {
            ModelWeights { layers: Vec::new() }
        }

        fn set_weights(&mut self, _weights: &ModelWeights) -> Result<(), ModelError> {
            Ok(())
        }
    }

    fn stub_agent(q: Vec<f64>) -> DqnAgent<Stub> {
        let config = AgentConfig {
            batch_size: 4,
            ..AgentConfig::default()
        };
        DqnAgent::with_model(Stub::constant(q), config, StdRng::seed_from_u64(7))
    }

    fn transition(reward: f64, done: bool) -> Transition {
        Transition {
            obs: DVector::zeros(OBSERVATION_LEN),
            action: Action::TurnLeft,
            reward,
            next_obs: DVector::zeros(OBSERVATION_LEN),
            done,
        }
    }

    #[test]
    fn replay_keeps_only_the_most_recent_entries() {
        let mut buffer = ReplayBuffer::new(3);
        for i in 0..5 {
            buffer.push(transition(i as f64, false));
        }
        assert_eq!(buffer.len(), 3);
        let rewards: Vec<f64> = (0..3).map(|i| buffer.get(i).reward).collect();
        assert_eq!(rewards, vec![2.0, 3.0, 4.0]);
    }

    #[test]
    fn exploration_rate_matches_epsilon_empirically() {
        let mut agent = stub_agent(vec![1.0, 0.0, 0.0, 0.0]);
        agent.epsilon = 0.3;
        let obs = DVector::zeros(OBSERVATION_LEN);

        let trials = 20_000;
        let mut greedy = 0;
        for _ in 0..trials {
            if agent.select_action(&obs) == Action::Forward {
                greedy += 1;
            }
        }
        // Greedy action comes up when not exploring, plus a quarter of the
        // random draws.
        let expected = (1.0 - 0.3) + 0.3 / 4.0;
        let observed = greedy as f64 / trials as f64;
        assert!((observed - expected).abs() < 0.02, "observed {}", observed);
    }

    #[test]
    fn greedy_ties_break_toward_the_first_index() {
        let mut agent = stub_agent(vec![2.0, 2.0, 2.0, 2.0]);
        agent.epsilon = 0.0;
        assert_eq!(
            agent.select_action(&DVector::zeros(OBSERVATION_LEN)),
            Action::Forward
        );
    }

    #[test]
    fn terminal_transitions_regress_onto_the_raw_reward() {
        let mut agent = stub_agent(vec![0.5, 0.5, 0.5, 0.5]);
        for _ in 0..4 {
            agent.remember(transition(-100.0, true));
        }
        assert!(agent.train());

        let (_, targets) = &agent.online.fitted[0];
        for row in targets {
            assert_eq!(row[Action::TurnLeft.index()], -100.0);
            assert_eq!(row[Action::Forward.index()], 0.5);
        }
    }

    #[test]
    fn bootstrapped_targets_use_the_target_network() {
        let mut agent = stub_agent(vec![0.0, 0.0, 0.0, 0.0]);
        // Make the frozen copy disagree with the online network so the
        // bootstrap source is observable.
        agent.target = Stub::constant(vec![1.0, 8.0, 2.0, 3.0]);
        for _ in 0..4 {
            agent.remember(transition(2.0, false));
        }
        assert!(agent.train());

        let expected = 2.0 + agent.config.gamma * 8.0;
        let (_, targets) = &agent.online.fitted[0];
        for row in targets {
            assert_eq!(row[Action::TurnLeft.index()], expected);
        }
    }

    #[test]
    fn target_network_is_isolated_until_synced() {
        let mut agent = DqnAgent::new(
            AgentConfig {
                batch_size: 4,
                ..AgentConfig::default()
            },
            11,
        );
        let probe = DVector::from_element(OBSERVATION_LEN, 0.5);
        let frozen = agent.target.predict(&probe);

        for _ in 0..8 {
            agent.remember(transition(1.0, false));
        }
        for _ in 0..5 {
            assert!(agent.train());
        }
        assert_eq!(agent.target.predict(&probe), frozen);
        assert_ne!(agent.online.predict(&probe), frozen);

        agent.sync_target();
        assert_eq!(agent.target.predict(&probe), agent.online.predict(&probe));
    }

    #[test]
    fn epsilon_decays_to_its_floor_and_stays_there() {
        let mut agent = stub_agent(vec![0.0; 4]);
        agent.epsilon = 0.02;
        agent.config.epsilon_min = 0.01;
        for _ in 0..4 {
            agent.remember(transition(0.0, false));
        }
        for _ in 0..500 {
            agent.train();
        }
        assert_eq!(agent.epsilon(), 0.01);
    }

    #[test]
    fn training_waits_for_a_full_batch() {
        let mut agent = stub_agent(vec![0.0; 4]);
        agent.remember(transition(0.0, false));
        assert!(!agent.train());
        assert!(agent.online.fitted.is_empty());
    }

    #[test]
    fn observation_without_a_goal_zeroes_the_goal_features() {
        use crate::config::{CarConfig, TrackConfig};
        use crate::track::TrackKind;
        use crate::Point;

        let track = Track::new(TrackKind::Obstacles, TrackConfig::default());
        let car = Car::new(Point::new(100.0, 100.0), CarConfig::default());
        let obs = encode(&car, &track);
        assert_eq!(obs.len(), OBSERVATION_LEN);
        assert_eq!(obs[OBSERVATION_LEN - 2], 0.0);
        assert_eq!(obs[OBSERVATION_LEN - 1], 0.0);
    }

    #[test]
    fn observation_reports_signed_angle_and_distance_to_goal() {
        use crate::config::{CarConfig, TrackConfig};
        use crate::track::TrackKind;
        use crate::Point;

        let mut track = Track::new(TrackKind::Obstacles, TrackConfig::default());
        track.set_end(Point::new(100.0, 40.0));
        let car = Car::new(Point::new(100.0, 100.0), CarConfig::default());
        let obs = encode(&car, &track);
        // Goal is straight "up" (negative y), a quarter turn left of the
        // +x heading.
        assert!((obs[OBSERVATION_LEN - 2] + std::f64::consts::FRAC_PI_2).abs() < 1e-12);
        assert!((obs[OBSERVATION_LEN - 1] - 60.0).abs() < 1e-12);
    }
}
