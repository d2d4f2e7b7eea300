//! Value-function approximators: the capability seam and the dense-network
//! backend behind it.

use nalgebra::{DMatrix, DVector};
use rand::Rng;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// A parameterized mapping from observation vectors to action-value vectors.
///
/// The learning agent only talks to this surface, so the numerical backend
/// can be swapped out, or stubbed deterministically in tests.
pub trait ValueModel {
    /// Evaluates one observation.
    fn predict(&self, obs: &DVector<f64>) -> DVector<f64>;

    /// Evaluates a batch of observations.
    fn predict_batch(&self, obs: &[DVector<f64>]) -> Vec<DVector<f64>> {
        obs.iter().map(|o| self.predict(o)).collect()
    }

    /// Runs one gradient step regressing `inputs` onto `targets`.
    fn fit(&mut self, inputs: &[DVector<f64>], targets: &[DVector<f64>]);

    /// Snapshots all parameters.
    fn weights(&self) -> ModelWeights;

    /// Restores parameters from a snapshot of the same topology.
    fn set_weights(&mut self, weights: &ModelWeights) -> Result<(), ModelError>;
}

#[derive(Error, Debug)]
pub enum ModelError {
    #[error("weight shape mismatch: {0}")]
    ShapeMismatch(&'static str),
}

/// Serializable parameter snapshot of a dense network.
///
/// Weight elements are stored column-major; the shape fields make the
/// encoding unambiguous.
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
pub struct ModelWeights {
    pub layers: Vec<LayerWeights>,
}

#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
pub struct LayerWeights {
    pub rows: usize,
    pub cols: usize,
    pub w: Vec<f64>,
    pub b: Vec<f64>,
}

/// A small fully connected network: ReLU hidden layers, linear output,
/// trained by Adam on mean-squared error.
#[derive(Debug, Clone)]
pub struct Mlp {
    layers: Vec<Dense>,
    optimizer: Adam,
}

#[derive(Debug, Clone)]
struct Dense {
    w: DMatrix<f64>,
    b: DVector<f64>,
}

impl Dense {
    fn random(in_dim: usize, out_dim: usize, rng: &mut impl Rng) -> Self {
        // Glorot-style uniform init keeps early activations in range.
        let limit = (6.0 / (in_dim + out_dim) as f64).sqrt();
        Dense {
            w: DMatrix::from_fn(out_dim, in_dim, |_, _| rng.gen_range(-limit..limit)),
            b: DVector::zeros(out_dim),
        }
    }
}

impl Mlp {
    /// Builds a network with the given layer sizes, input first.
    pub fn new(sizes: &[usize], learning_rate: f64, rng: &mut impl Rng) -> Self {
        assert!(sizes.len() >= 2, "need an input and an output layer");
        let layers: Vec<Dense> = sizes
            .windows(2)
            .map(|pair| Dense::random(pair[0], pair[1], rng))
            .collect();
        let optimizer = Adam::new(&layers, learning_rate);
        Mlp { layers, optimizer }
    }

    /// Forward pass keeping per-layer pre-activations and activations.
    fn forward_trace(&self, x: &DVector<f64>) -> (Vec<DVector<f64>>, Vec<DVector<f64>>) {
        let last = self.layers.len() - 1;
        let mut activations = vec![x.clone()];
        let mut pre = Vec::with_capacity(self.layers.len());
        let mut current = x.clone();
        for (i, layer) in self.layers.iter().enumerate() {
            let z = &layer.w * &current + &layer.b;
            current = if i < last { z.map(relu) } else { z.clone() };
            pre.push(z);
            activations.push(current.clone());
        }
        (activations, pre)
    }
}

fn relu(z: f64) -> f64 {
    if z > 0.0 {
        z
    } else {
        0.0
    }
}

impl ValueModel for Mlp {
    fn predict(&self, obs: &DVector<f64>) -> DVector<f64> {
        let last = self.layers.len() - 1;
        let mut current = obs.clone();
        for (i, layer) in self.layers.iter().enumerate() {
            current = &layer.w * &current + &layer.b;
            if i < last {
                current = current.map(relu);
            }
        }
        current
    }

    fn fit(&mut self, inputs: &[DVector<f64>], targets: &[DVector<f64>]) {
        assert_eq!(inputs.len(), targets.len());
        if inputs.is_empty() {
            return;
        }
        let batch = inputs.len() as f64;
        let out_dim = targets[0].len() as f64;
        let mut grads_w: Vec<DMatrix<f64>> = self
            .layers
            .iter()
            .map(|l| DMatrix::zeros(l.w.nrows(), l.w.ncols()))
            .collect();
        let mut grads_b: Vec<DVector<f64>> = self
            .layers
            .iter()
            .map(|l| DVector::zeros(l.b.len()))
            .collect();

        for (x, t) in inputs.iter().zip(targets) {
            let (activations, pre) = self.forward_trace(x);
            let y = &activations[self.layers.len()];
            // d(MSE)/dy, averaged over the batch and output width.
            let mut delta = (y - t) * (2.0 / (batch * out_dim));
            for l in (0..self.layers.len()).rev() {
                grads_w[l] += &delta * activations[l].transpose();
                grads_b[l] += &delta;
                if l > 0 {
                    let back = self.layers[l].w.transpose() * &delta;
                    delta = back.zip_map(&pre[l - 1], |d, z| if z > 0.0 { d } else { 0.0 });
                }
            }
        }

        self.optimizer.step(&mut self.layers, &grads_w, &grads_b);
    }

    fn weights(&self) -> ModelWeights {
        ModelWeights {
            layers: self
                .layers
                .iter()
                .map(|l| LayerWeights {
                    rows: l.w.nrows(),
                    cols: l.w.ncols(),
                    w: l.w.as_slice().to_vec(),
                    b: l.b.as_slice().to_vec(),
                })
                .collect(),
        }
    }

    fn set_weights(&mut self, weights: &ModelWeights) -> Result<(), ModelError> {
        if weights.layers.len() != self.layers.len() {
            return Err(ModelError::ShapeMismatch("layer count"));
        }
        for (layer, lw) in self.layers.iter().zip(&weights.layers) {
            if lw.rows != layer.w.nrows() || lw.cols != layer.w.ncols() {
                return Err(ModelError::ShapeMismatch("layer dimensions"));
            }
            if lw.w.len() != lw.rows * lw.cols || lw.b.len() != lw.rows {
                return Err(ModelError::ShapeMismatch("element count"));
            }
        }
        for (layer, lw) in self.layers.iter_mut().zip(&weights.layers) {
            layer.w = DMatrix::from_column_slice(lw.rows, lw.cols, &lw.w);
            layer.b = DVector::from_column_slice(&lw.b);
        }
        Ok(())
    }
}

/// Adam optimizer with per-parameter first and second moments.
#[derive(Debug, Clone)]
struct Adam {
    lr: f64,
    beta1: f64,
    beta2: f64,
    eps: f64,
    t: i32,
    m: Vec<(DMatrix<f64>, DVector<f64>)>,
    v: Vec<(DMatrix<f64>, DVector<f64>)>,
}

impl Adam {
    fn new(layers: &[Dense], lr: f64) -> Self {
        let zeros = |l: &Dense| {
            (
                DMatrix::zeros(l.w.nrows(), l.w.ncols()),
                DVector::zeros(l.b.len()),
            )
        };
        Adam {
            lr,
            beta1: 0.9,
            beta2: 0.999,
            eps: 1e-8,
            t: 0,
            m: layers.iter().map(zeros).collect(),
            v: layers.iter().map(zeros).collect(),
        }
    }

    fn step(
        &mut self,
        layers: &mut [Dense],
        grads_w: &[DMatrix<f64>],
        grads_b: &[DVector<f64>],
    ) {
        self.t += 1;
        let lr_t =
            self.lr * (1.0 - self.beta2.powi(self.t)).sqrt() / (1.0 - self.beta1.powi(self.t));
        for (i, layer) in layers.iter_mut().enumerate() {
            let (mw, mb) = &mut self.m[i];
            let (vw, vb) = &mut self.v[i];

            *mw = &*mw * self.beta1 + &grads_w[i] * (1.0 - self.beta1);
            *vw = &*vw * self.beta2 + grads_w[i].component_mul(&grads_w[i]) * (1.0 - self.beta2);
            layer.w -= mw.component_div(&vw.map(f64::sqrt).add_scalar(self.eps)) * lr_t;

            *mb = &*mb * self.beta1 + &grads_b[i] * (1.0 - self.beta1);
            *vb = &*vb * self.beta2 + grads_b[i].component_mul(&grads_b[i]) * (1.0 - self.beta2);
            layer.b -= mb.component_div(&vb.map(f64::sqrt).add_scalar(self.eps)) * lr_t;
        }
    }
}
