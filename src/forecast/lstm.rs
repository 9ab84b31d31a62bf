use std::path::Path;

use anyhow::{Context, Result};
use ndarray::{s, Array1, Array2};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use serde::{Deserialize, Serialize};

use crate::error::ForecastError;
use crate::forecast::sequence::RecurrentCore;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LstmConfig {
    pub hidden_size: usize,
    pub num_layers: usize,
    pub projection_size: usize,
}

impl Default for LstmConfig {
    fn default() -> Self {
        Self {
            hidden_size: 256,
            num_layers: 2,
            projection_size: 128,
        }
    }
}

/// One LSTM layer. Gate rows are stacked as input, forget, cell, output.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LstmLayerWeights {
    // (4H, D)
    pub w_ih: Array2<f64>,
    // (4H, H)
    pub w_hh: Array2<f64>,
    pub b_ih: Array1<f64>,
    pub b_hh: Array1<f64>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LinearWeights {
    // (out, in)
    pub weight: Array2<f64>,
    pub bias: Array1<f64>,
}

impl LinearWeights {
    fn forward(&self, x: &Array1<f64>) -> Array1<f64> {
        self.weight.dot(x) + &self.bias
    }
}

/// Parameters of the stacked LSTM plus the two projection heads.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LstmWeights {
    pub layers: Vec<LstmLayerWeights>,
    pub projection: LinearWeights,
    pub output: LinearWeights,
}

impl LstmWeights {
    /// Uniform(-1/sqrt(fan), 1/sqrt(fan)) initialisation from a fixed seed.
    pub fn seeded(config: LstmConfig, seed: u64) -> Self {
        let mut rng = StdRng::seed_from_u64(seed);
        let h = config.hidden_size.max(1);
        let p = config.projection_size.max(1);
        let k = 1.0 / (h as f64).sqrt();

        let layers = (0..config.num_layers.max(1))
            .map(|idx| {
                let input = if idx == 0 { 1 } else { h };
                LstmLayerWeights {
                    w_ih: uniform_matrix(&mut rng, 4 * h, input, k),
                    w_hh: uniform_matrix(&mut rng, 4 * h, h, k),
                    b_ih: uniform_vector(&mut rng, 4 * h, k),
                    b_hh: uniform_vector(&mut rng, 4 * h, k),
                }
            })
            .collect();

        let kp = 1.0 / (p as f64).sqrt();
        Self {
            layers,
            projection: LinearWeights {
                weight: uniform_matrix(&mut rng, p, h, k),
                bias: uniform_vector(&mut rng, p, k),
            },
            output: LinearWeights {
                weight: uniform_matrix(&mut rng, 1, p, kp),
                bias: uniform_vector(&mut rng, 1, kp),
            },
        }
    }

    pub fn from_json_file(path: &Path) -> Result<Self> {
        let payload = std::fs::read_to_string(path)
            .with_context(|| format!("failed to read {}", path.display()))?;
        let weights: LstmWeights = serde_json::from_str(&payload)
            .with_context(|| format!("failed to parse LSTM weights in {}", path.display()))?;
        weights
            .validate()
            .with_context(|| format!("LSTM weights in {} have invalid shapes", path.display()))?;
        Ok(weights)
    }

    pub fn hidden_size(&self) -> usize {
        self.layers.first().map(|l| l.w_hh.ncols()).unwrap_or(0)
    }

    pub fn validate(&self) -> Result<(), ForecastError> {
        let h = self.hidden_size();
        if self.layers.is_empty() || h == 0 {
            return Err(invalid("at least one layer with a non-empty hidden state is required"));
        }
        for (idx, layer) in self.layers.iter().enumerate() {
            let input = if idx == 0 { 1 } else { h };
            if layer.w_ih.dim() != (4 * h, input) {
                return Err(invalid(&format!(
                    "layer {} w_ih is {:?}, expected {:?}",
                    idx,
                    layer.w_ih.dim(),
                    (4 * h, input)
                )));
            }
            if layer.w_hh.dim() != (4 * h, h) {
                return Err(invalid(&format!(
                    "layer {} w_hh is {:?}, expected {:?}",
                    idx,
                    layer.w_hh.dim(),
                    (4 * h, h)
                )));
            }
            if layer.b_ih.len() != 4 * h || layer.b_hh.len() != 4 * h {
                return Err(invalid(&format!("layer {} biases must have length {}", idx, 4 * h)));
            }
        }
        let p = self.projection.bias.len();
        if self.projection.weight.dim() != (p, h) {
            return Err(invalid("projection weight must be (projection_size, hidden_size)"));
        }
        if self.output.weight.dim() != (1, p) || self.output.bias.len() != 1 {
            return Err(invalid("output head must map projection_size -> 1"));
        }
        Ok(())
    }
}

fn invalid(msg: &str) -> ForecastError {
    ForecastError::InvalidParameter(format!("LSTM weights: {}", msg))
}

fn uniform_matrix(rng: &mut StdRng, rows: usize, cols: usize, bound: f64) -> Array2<f64> {
    Array2::from_shape_fn((rows, cols), |_| rng.gen_range(-bound..bound))
}

fn uniform_vector(rng: &mut StdRng, len: usize, bound: f64) -> Array1<f64> {
    Array1::from_shape_fn(len, |_| rng.gen_range(-bound..bound))
}

fn sigmoid(x: f64) -> f64 {
    1.0 / (1.0 + (-x).exp())
}

/// Inference-only stacked LSTM. Hidden and cell state start at zero on every
/// call and never outlive it.
#[derive(Debug, Clone)]
pub struct LstmCore {
    weights: LstmWeights,
}

impl LstmCore {
    pub fn new(weights: LstmWeights) -> Result<Self, ForecastError> {
        weights.validate()?;
        Ok(Self { weights })
    }

    pub fn seeded(config: LstmConfig, seed: u64) -> Self {
        Self {
            weights: LstmWeights::seeded(config, seed),
        }
    }

    pub fn weights(&self) -> &LstmWeights {
        &self.weights
    }

    fn step(
        layer: &LstmLayerWeights,
        x: &Array1<f64>,
        h_prev: &Array1<f64>,
        c_prev: &Array1<f64>,
    ) -> (Array1<f64>, Array1<f64>) {
        let h = h_prev.len();
        let z = layer.w_ih.dot(x) + layer.w_hh.dot(h_prev) + &layer.b_ih + &layer.b_hh;
        let i = z.slice(s![0..h]).mapv(sigmoid);
        let f = z.slice(s![h..2 * h]).mapv(sigmoid);
        let g = z.slice(s![2 * h..3 * h]).mapv(f64::tanh);
        let o = z.slice(s![3 * h..4 * h]).mapv(sigmoid);
        let c_t = &f * c_prev + &i * &g;
        let h_t = &o * &c_t.mapv(f64::tanh);
        (h_t, c_t)
    }
}

impl RecurrentCore for LstmCore {
    fn next_value(&self, window: &[f64]) -> f64 {
        let hidden = self.weights.hidden_size();
        let mut sequence: Vec<Array1<f64>> =
            window.iter().map(|&x| Array1::from_elem(1, x)).collect();
        let mut last_hidden = Array1::zeros(hidden);

        for layer in &self.weights.layers {
            let mut h = Array1::zeros(hidden);
            let mut c = Array1::zeros(hidden);
            let mut outputs = Vec::with_capacity(sequence.len());
            for x in &sequence {
                let (h_t, c_t) = Self::step(layer, x, &h, &c);
                outputs.push(h_t.clone());
                h = h_t;
                c = c_t;
            }
            last_hidden = h;
            sequence = outputs;
        }

        let embedding = self.weights.projection.forward(&last_hidden);
        let out = self.weights.output.forward(&embedding);
        out[0]
    }
}
