// Neural network
// Fully connected perceptron: ReLU hidden layers, softmax output, trained by per-sample backpropagation

use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::Rng;
use serde::{Deserialize, Serialize};

use super::monitor::{should_report, TrainingMonitor};

/// One dense layer, weights stored row-major (one row per output)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Layer {
    inputs: usize,
    outputs: usize,
    weights: Vec<f64>,
    biases: Vec<f64>,
}

impl Layer {
    /// He-uniform initialization, suited to ReLU
    fn new(inputs: usize, outputs: usize, rng: &mut StdRng) -> Self {
        let limit = (6.0 / inputs.max(1) as f64).sqrt();
        Layer {
            inputs,
            outputs,
            weights: (0..inputs * outputs)
                .map(|_| rng.gen_range(-limit..limit))
                .collect(),
            biases: vec![0.0; outputs],
        }
    }

    fn forward(&self, input: &[f64]) -> Vec<f64> {
        (0..self.outputs)
            .map(|o| {
                let row = &self.weights[o * self.inputs..(o + 1) * self.inputs];
                self.biases[o] + row.iter().zip(input).map(|(w, x)| w * x).sum::<f64>()
            })
            .collect()
    }

    fn is_finite(&self) -> bool {
        self.weights.iter().chain(&self.biases).all(|v| v.is_finite())
    }
}

/// Gradient descent settings
#[derive(Debug, Clone)]
pub struct TrainingParams {
    pub learning_rate: f64,
    pub momentum: f64,
    pub l2: f64,
    pub max_epochs: usize,
    pub max_error: f64,
}

/// How a training run ended
#[derive(Debug, Clone, PartialEq)]
pub struct TrainingOutcome {
    pub epochs: usize,
    /// Mean negative log-likelihood of the last epoch
    pub error: f64,
    pub cancelled: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NeuralNetwork {
    input_labels: Vec<String>,
    output_labels: Vec<String>,
    layers: Vec<Layer>,
}

fn softmax(values: &mut [f64]) {
    let max = values.iter().copied().fold(f64::NEG_INFINITY, f64::max);
    let mut sum = 0.0;
    for v in values.iter_mut() {
        *v = (*v - max).exp();
        sum += *v;
    }
    for v in values.iter_mut() {
        *v /= sum;
    }
}

impl NeuralNetwork {
    /// Network with the given hidden layer sizes and random weights
    pub fn new(
        input_labels: Vec<String>,
        hidden: &[usize],
        output_labels: Vec<String>,
        rng: &mut StdRng,
    ) -> Self {
        let mut sizes = vec![input_labels.len()];
        sizes.extend_from_slice(hidden);
        sizes.push(output_labels.len());

        let layers = sizes
            .windows(2)
            .map(|pair| Layer::new(pair[0], pair[1], rng))
            .collect();

        NeuralNetwork {
            input_labels,
            output_labels,
            layers,
        }
    }

    pub fn input_labels(&self) -> &[String] {
        &self.input_labels
    }

    pub fn output_labels(&self) -> &[String] {
        &self.output_labels
    }

    pub fn input_size(&self) -> usize {
        self.input_labels.len()
    }

    pub fn output_size(&self) -> usize {
        self.output_labels.len()
    }

    /// Whether the layer sizes chain from inputs to outputs
    pub fn is_consistent(&self) -> bool {
        let mut size = self.input_size();
        for layer in &self.layers {
            if layer.inputs != size
                || layer.weights.len() != layer.inputs * layer.outputs
                || layer.biases.len() != layer.outputs
            {
                return false;
            }
            size = layer.outputs;
        }
        size == self.output_size()
    }

    /// Activations of every layer, input first, softmax output last
    fn activations(&self, input: &[f64]) -> Vec<Vec<f64>> {
        let mut activations = Vec::with_capacity(self.layers.len() + 1);
        activations.push(input.to_vec());

        for (i, layer) in self.layers.iter().enumerate() {
            let mut out = layer.forward(&activations[i]);
            if i + 1 == self.layers.len() {
                softmax(&mut out);
            } else {
                out.iter_mut().for_each(|v| *v = v.max(0.0));
            }
            activations.push(out);
        }

        activations
    }

    /// Class probabilities for an input vector
    pub fn forward(&self, input: &[f64]) -> Vec<f64> {
        self.activations(input).pop().unwrap_or_default()
    }

    /// Train on inputs and target output indices
    pub fn train(
        &mut self,
        inputs: &[Vec<f64>],
        targets: &[usize],
        params: &TrainingParams,
        rng: &mut StdRng,
        monitor: Option<&dyn TrainingMonitor>,
    ) -> TrainingOutcome {
        let mut velocities: Vec<Layer> = self
            .layers
            .iter()
            .map(|l| Layer {
                inputs: l.inputs,
                outputs: l.outputs,
                weights: vec![0.0; l.weights.len()],
                biases: vec![0.0; l.biases.len()],
            })
            .collect();

        let mut order: Vec<usize> = (0..inputs.len()).collect();
        let mut outcome = TrainingOutcome {
            epochs: 0,
            error: f64::INFINITY,
            cancelled: false,
        };

        for epoch in 0..params.max_epochs {
            if monitor.is_some_and(|m| m.is_cancelled()) {
                log::info!("Training cancelled after {} epochs", epoch);
                outcome.cancelled = true;
                break;
            }

            order.shuffle(rng);
            let mut total = 0.0;
            for &i in &order {
                total += self.step(&inputs[i], targets[i], params, &mut velocities);
            }

            outcome.epochs = epoch + 1;
            outcome.error = total / inputs.len().max(1) as f64;

            if let Some(monitor) = monitor {
                if should_report(monitor, epoch) {
                    monitor.epoch_completed(epoch, outcome.error);
                }
            }

            if !outcome.error.is_finite() {
                log::warn!("Training diverged at epoch {}", epoch);
                break;
            }
            if outcome.error < params.max_error {
                log::debug!("Training converged at epoch {}", epoch);
                break;
            }
        }

        outcome
    }

    /// One backpropagation step, returns the sample loss
    fn step(
        &mut self,
        input: &[f64],
        target: usize,
        params: &TrainingParams,
        velocities: &mut [Layer],
    ) -> f64 {
        let activations = self.activations(input);
        let Some(output) = activations.last() else {
            return 0.0;
        };
        let loss = -output[target].max(f64::MIN_POSITIVE).ln();

        // Softmax with negative log-likelihood: gradient is p - onehot
        let mut delta = output.clone();
        delta[target] -= 1.0;

        for l in (0..self.layers.len()).rev() {
            let input = &activations[l];

            // Error propagated to the previous layer, before its ReLU
            let previous = if l > 0 {
                let layer = &self.layers[l];
                let mut back = vec![0.0; layer.inputs];
                for (o, d) in delta.iter().enumerate() {
                    let row = &layer.weights[o * layer.inputs..(o + 1) * layer.inputs];
                    for (b, w) in back.iter_mut().zip(row) {
                        *b += w * d;
                    }
                }
                for (b, a) in back.iter_mut().zip(input) {
                    if *a <= 0.0 {
                        *b = 0.0;
                    }
                }
                Some(back)
            } else {
                None
            };

            let layer = &mut self.layers[l];
            let velocity = &mut velocities[l];
            for (o, d) in delta.iter().enumerate() {
                let base = o * layer.inputs;
                for (k, x) in input.iter().enumerate() {
                    let w = &mut layer.weights[base + k];
                    let v = &mut velocity.weights[base + k];
                    *v = params.momentum * *v - params.learning_rate * (d * x + params.l2 * *w);
                    *w += *v;
                }
                let v = &mut velocity.biases[o];
                *v = params.momentum * *v - params.learning_rate * d;
                layer.biases[o] += *v;
            }

            match previous {
                Some(back) => delta = back,
                None => break,
            }
        }

        loss
    }

    pub fn is_finite(&self) -> bool {
        self.layers.iter().all(Layer::is_finite)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;
    use rand::SeedableRng;

    fn labels(prefix: &str, n: usize) -> Vec<String> {
        (0..n).map(|i| format!("{}{}", prefix, i)).collect()
    }

    fn params() -> TrainingParams {
        TrainingParams {
            learning_rate: 0.05,
            momentum: 0.2,
            l2: 1e-4,
            max_epochs: 300,
            max_error: 1e-3,
        }
    }

    #[test]
    fn test_topology() {
        let mut rng = StdRng::seed_from_u64(6);
        let network = NeuralNetwork::new(labels("in", 4), &[5, 5], labels("out", 3), &mut rng);

        assert!(network.is_consistent());
        assert_eq!(network.input_size(), 4);
        assert_eq!(network.output_size(), 3);

        let output = network.forward(&[0.1, -0.2, 0.3, 0.4]);
        assert_eq!(output.len(), 3);
        assert_abs_diff_eq!(output.iter().sum::<f64>(), 1.0, epsilon = 1e-12);
    }

    #[test]
    fn test_seeded_init_is_reproducible() {
        let a = NeuralNetwork::new(labels("in", 3), &[4], labels("out", 2), &mut StdRng::seed_from_u64(6));
        let b = NeuralNetwork::new(labels("in", 3), &[4], labels("out", 2), &mut StdRng::seed_from_u64(6));
        assert_eq!(a, b);
    }

    #[test]
    fn test_learns_separable_classes() {
        let mut rng = StdRng::seed_from_u64(6);
        let mut network = NeuralNetwork::new(labels("in", 2), &[8, 8], labels("out", 3), &mut rng);

        let centers = [(-1.0, -1.0), (1.0, -1.0), (0.0, 1.0)];
        let mut inputs = Vec::new();
        let mut targets = Vec::new();
        for (class, (cx, cy)) in centers.iter().enumerate() {
            for k in 0..6 {
                let jitter = (k as f64 - 2.5) * 0.05;
                inputs.push(vec![cx + jitter, cy - jitter]);
                targets.push(class);
            }
        }

        let outcome = network.train(&inputs, &targets, &params(), &mut rng, None);
        assert!(outcome.error < 0.1, "error {}", outcome.error);
        assert!(network.is_finite());

        for (class, (cx, cy)) in centers.iter().enumerate() {
            let output = network.forward(&[*cx, *cy]);
            let best = output
                .iter()
                .enumerate()
                .max_by(|a, b| a.1.total_cmp(b.1))
                .map(|(i, _)| i);
            assert_eq!(best, Some(class));
        }
    }

    #[test]
    fn test_cancelled_before_first_epoch() {
        let flag = crate::classifier::monitor::CancelFlag::new();
        flag.cancel();

        let mut rng = StdRng::seed_from_u64(6);
        let mut network = NeuralNetwork::new(labels("in", 2), &[3], labels("out", 2), &mut rng);
        let before = network.clone();

        let outcome = network.train(&[vec![0.0, 1.0]], &[1], &params(), &mut rng, Some(&flag));
        assert!(outcome.cancelled);
        assert_eq!(outcome.epochs, 0);
        assert_eq!(network, before);
    }
}
