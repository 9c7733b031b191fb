use crate::error::ForecastError;
use crate::forecast::window::TrainingWindow;
use ndarray::linalg::general_mat_mul;
use ndarray::{s, Array1, Array2, ArrayViewD, ArrayViewMutD, Axis, Zip};
use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::Rng;

const ADAM_BETA1: f64 = 0.9;
const ADAM_BETA2: f64 = 0.999;
const ADAM_EPSILON: f64 = 1e-7;

fn sigmoid(x: f64) -> f64 {
    1.0 / (1.0 + (-x).exp())
}

fn glorot_uniform(
    rows: usize,
    cols: usize,
    fan_in: usize,
    fan_out: usize,
    rng: &mut StdRng,
) -> Array2<f64> {
    let limit = (6.0 / (fan_in + fan_out) as f64).sqrt();
    Array2::from_shape_fn((rows, cols), |_| rng.gen_range(-limit..limit))
}

/// Adds `a ⊗ b` into `out`.
fn add_outer(out: &mut Array2<f64>, a: &Array1<f64>, b: &Array1<f64>) {
    let a = a.view().insert_axis(Axis(1));
    let b = b.view().insert_axis(Axis(0));
    general_mat_mul(1.0, &a, &b, 1.0, out);
}

/// Gate rows are stacked as input, forget, cell, output.
#[derive(Debug, Clone)]
struct LstmLayer {
    hidden: usize,
    w: Array2<f64>,
    u: Array2<f64>,
    b: Array1<f64>,
}

struct StepCache {
    x: Array1<f64>,
    h_prev: Array1<f64>,
    c_prev: Array1<f64>,
    i: Array1<f64>,
    f: Array1<f64>,
    g: Array1<f64>,
    o: Array1<f64>,
    tanh_c: Array1<f64>,
}

impl LstmLayer {
    fn new(input: usize, hidden: usize, rng: &mut StdRng) -> Self {
        let w = glorot_uniform(4 * hidden, input, input, 4 * hidden, rng);
        let u = glorot_uniform(4 * hidden, hidden, hidden, 4 * hidden, rng);
        let mut b = Array1::zeros(4 * hidden);
        b.slice_mut(s![hidden..2 * hidden]).fill(1.0);
        Self { hidden, w, u, b }
    }

    fn zeros_like(&self) -> Self {
        Self {
            hidden: self.hidden,
            w: Array2::zeros(self.w.raw_dim()),
            u: Array2::zeros(self.u.raw_dim()),
            b: Array1::zeros(self.b.raw_dim()),
        }
    }

    fn forward(&self, xs: &[Array1<f64>]) -> (Vec<Array1<f64>>, Vec<StepCache>) {
        let n = self.hidden;
        let mut h = Array1::<f64>::zeros(n);
        let mut c = Array1::<f64>::zeros(n);
        let mut outputs = Vec::with_capacity(xs.len());
        let mut caches = Vec::with_capacity(xs.len());

        for x in xs {
            let z = self.w.dot(x) + self.u.dot(&h) + &self.b;
            let i = z.slice(s![0..n]).mapv(sigmoid);
            let f = z.slice(s![n..2 * n]).mapv(sigmoid);
            let g = z.slice(s![2 * n..3 * n]).mapv(f64::tanh);
            let o = z.slice(s![3 * n..4 * n]).mapv(sigmoid);

            let c_next = &f * &c + &i * &g;
            let tanh_c = c_next.mapv(f64::tanh);
            let h_next = &o * &tanh_c;

            outputs.push(h_next.clone());
            caches.push(StepCache {
                x: x.clone(),
                h_prev: h,
                c_prev: c,
                i,
                f,
                g,
                o,
                tanh_c,
            });
            h = h_next;
            c = c_next;
        }

        (outputs, caches)
    }

    /// Backpropagation through time. `dh_out[t]` is the loss gradient w.r.t. this layer's
    /// output at step `t`; returns the gradient w.r.t. each step's input.
    fn backward(
        &self,
        caches: &[StepCache],
        dh_out: &[Array1<f64>],
        grads: &mut LstmLayer,
    ) -> Vec<Array1<f64>> {
        let n = self.hidden;
        let mut dh_next = Array1::<f64>::zeros(n);
        let mut dc_next = Array1::<f64>::zeros(n);
        let mut dxs = vec![Array1::<f64>::zeros(0); caches.len()];

        for t in (0..caches.len()).rev() {
            let cache = &caches[t];
            let dh = &dh_out[t] + &dh_next;

            let d_o = &dh * &cache.tanh_c;
            let dc = &dh * &cache.o * &cache.tanh_c.mapv(|v| 1.0 - v * v) + &dc_next;
            let d_i = &dc * &cache.g;
            let d_g = &dc * &cache.i;
            let d_f = &dc * &cache.c_prev;
            dc_next = &dc * &cache.f;

            let mut dz = Array1::<f64>::zeros(4 * n);
            dz.slice_mut(s![0..n])
                .assign(&(&d_i * &cache.i.mapv(|v| v * (1.0 - v))));
            dz.slice_mut(s![n..2 * n])
                .assign(&(&d_f * &cache.f.mapv(|v| v * (1.0 - v))));
            dz.slice_mut(s![2 * n..3 * n])
                .assign(&(&d_g * &cache.g.mapv(|v| 1.0 - v * v)));
            dz.slice_mut(s![3 * n..4 * n])
                .assign(&(&d_o * &cache.o.mapv(|v| v * (1.0 - v))));

            add_outer(&mut grads.w, &dz, &cache.x);
            add_outer(&mut grads.u, &dz, &cache.h_prev);
            grads.b += &dz;

            dxs[t] = self.w.t().dot(&dz);
            dh_next = self.u.t().dot(&dz);
        }

        dxs
    }
}

/// Stacked LSTM layers over a univariate sequence, read out by one linear unit on the
/// final hidden state of the top layer.
#[derive(Debug, Clone)]
pub struct SequenceModel {
    layers: Vec<LstmLayer>,
    dense_w: Array1<f64>,
    dense_b: Array1<f64>,
}

impl SequenceModel {
    pub fn new(layer_widths: &[usize], rng: &mut StdRng) -> Self {
        let mut layers = Vec::with_capacity(layer_widths.len());
        let mut input = 1;
        for &width in layer_widths {
            layers.push(LstmLayer::new(input, width, rng));
            input = width;
        }

        let dense_w = glorot_uniform(input, 1, input, 1, rng).column(0).to_owned();
        Self {
            layers,
            dense_w,
            dense_b: Array1::zeros(1),
        }
    }

    fn zeros_like(&self) -> Self {
        Self {
            layers: self.layers.iter().map(LstmLayer::zeros_like).collect(),
            dense_w: Array1::zeros(self.dense_w.raw_dim()),
            dense_b: Array1::zeros(1),
        }
    }

    fn tensors(&self) -> Vec<ArrayViewD<'_, f64>> {
        let mut out = Vec::with_capacity(self.layers.len() * 3 + 2);
        for layer in &self.layers {
            out.push(layer.w.view().into_dyn());
            out.push(layer.u.view().into_dyn());
            out.push(layer.b.view().into_dyn());
        }
        out.push(self.dense_w.view().into_dyn());
        out.push(self.dense_b.view().into_dyn());
        out
    }

    fn tensors_mut(&mut self) -> Vec<ArrayViewMutD<'_, f64>> {
        let mut out = Vec::with_capacity(self.layers.len() * 3 + 2);
        for layer in &mut self.layers {
            out.push(layer.w.view_mut().into_dyn());
            out.push(layer.u.view_mut().into_dyn());
            out.push(layer.b.view_mut().into_dyn());
        }
        out.push(self.dense_w.view_mut().into_dyn());
        out.push(self.dense_b.view_mut().into_dyn());
        out
    }

    fn inputs(window: &[f64]) -> Vec<Array1<f64>> {
        window.iter().map(|&v| Array1::from_elem(1, v)).collect()
    }

    pub fn predict(&self, window: &[f64]) -> f64 {
        let mut seq = Self::inputs(window);
        for layer in &self.layers {
            seq = layer.forward(&seq).0;
        }
        match seq.last() {
            Some(h) => self.dense_w.dot(h) + self.dense_b[0],
            None => self.dense_b[0],
        }
    }

    /// Runs one example forward and backward, adding `scale * d(err^2)/dθ` into `grads`.
    /// Returns the squared error.
    fn accumulate_gradients(
        &self,
        example: &TrainingWindow,
        scale: f64,
        grads: &mut SequenceModel,
    ) -> f64 {
        let mut seq = Self::inputs(&example.inputs);
        let mut caches = Vec::with_capacity(self.layers.len());
        for layer in &self.layers {
            let (out, cache) = layer.forward(&seq);
            caches.push(cache);
            seq = out;
        }

        let Some(h_last) = seq.last() else {
            return 0.0;
        };
        let y = self.dense_w.dot(h_last) + self.dense_b[0];
        let err = y - example.label;
        let dy = 2.0 * err * scale;

        grads.dense_w.scaled_add(dy, h_last);
        grads.dense_b[0] += dy;

        let steps = seq.len();
        let mut dh: Vec<Array1<f64>> = (0..steps)
            .map(|_| Array1::zeros(h_last.len()))
            .collect();
        dh[steps - 1] = &self.dense_w * dy;

        for (idx, layer) in self.layers.iter().enumerate().rev() {
            dh = layer.backward(&caches[idx], &dh, &mut grads.layers[idx]);
        }

        err * err
    }

    /// Minibatch Adam on mean squared error. Examples are reshuffled every epoch.
    /// Returns the mean training loss of each epoch.
    pub fn train(
        &mut self,
        examples: &[TrainingWindow],
        epochs: usize,
        batch_size: usize,
        learning_rate: f64,
        rng: &mut StdRng,
    ) -> Result<Vec<f64>, ForecastError> {
        if examples.is_empty() {
            return Err(ForecastError::fit("no training examples"));
        }

        let mut adam = Adam::new(self, learning_rate);
        let mut grads = self.zeros_like();
        let mut order: Vec<usize> = (0..examples.len()).collect();
        let mut losses = Vec::with_capacity(epochs);

        for epoch in 0..epochs {
            order.shuffle(rng);
            let mut total = 0.0;

            for batch in order.chunks(batch_size.max(1)) {
                for mut t in grads.tensors_mut() {
                    t.fill(0.0);
                }
                let scale = 1.0 / batch.len() as f64;
                for &idx in batch {
                    total += self.accumulate_gradients(&examples[idx], scale, &mut grads);
                }
                adam.step(self, &grads);
            }

            let loss = total / examples.len() as f64;
            if !loss.is_finite() {
                return Err(ForecastError::fit(format!(
                    "training loss became non-finite at epoch {}",
                    epoch + 1
                )));
            }
            tracing::debug!(epoch = epoch + 1, epochs, loss, "sequence model epoch");
            losses.push(loss);
        }

        Ok(losses)
    }
}

struct Adam {
    learning_rate: f64,
    step: i32,
    m: SequenceModel,
    v: SequenceModel,
}

impl Adam {
    fn new(model: &SequenceModel, learning_rate: f64) -> Self {
        Self {
            learning_rate,
            step: 0,
            m: model.zeros_like(),
            v: model.zeros_like(),
        }
    }

    fn step(&mut self, params: &mut SequenceModel, grads: &SequenceModel) {
        self.step += 1;
        let lr = self.learning_rate * (1.0 - ADAM_BETA2.powi(self.step)).sqrt()
            / (1.0 - ADAM_BETA1.powi(self.step));

        let slots = params
            .tensors_mut()
            .into_iter()
            .zip(grads.tensors())
            .zip(self.m.tensors_mut())
            .zip(self.v.tensors_mut());

        for (((p, g), m), v) in slots {
            Zip::from(p).and(&g).and(m).and(v).for_each(|p, &g, m, v| {
                *m = ADAM_BETA1 * *m + (1.0 - ADAM_BETA1) * g;
                *v = ADAM_BETA2 * *v + (1.0 - ADAM_BETA2) * g * g;
                *p -= lr * *m / (v.sqrt() + ADAM_EPSILON);
            });
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::SeedableRng;

    fn example(len: usize, phase: f64) -> TrainingWindow {
        let inputs = (0..len)
            .map(|i| 0.5 + 0.4 * ((i as f64 + phase) * 0.7).sin())
            .collect();
        TrainingWindow {
            inputs,
            label: 0.5 + 0.4 * ((len as f64 + phase) * 0.7).sin(),
        }
    }

    fn squared_error(model: &SequenceModel, ex: &TrainingWindow) -> f64 {
        let e = model.predict(&ex.inputs) - ex.label;
        e * e
    }

    #[test]
    fn analytic_gradients_match_finite_differences() {
        let mut rng = StdRng::seed_from_u64(11);
        let mut model = SequenceModel::new(&[3, 2], &mut rng);
        let ex = example(5, 0.3);

        let mut grads = model.zeros_like();
        let loss = model.accumulate_gradients(&ex, 1.0, &mut grads);
        assert!((loss - squared_error(&model, &ex)).abs() < 1e-12);

        let analytic: Vec<Vec<f64>> = grads
            .tensors()
            .iter()
            .map(|t| t.iter().copied().collect())
            .collect();

        let eps = 1e-6;
        for tensor in 0..analytic.len() {
            for idx in 0..analytic[tensor].len() {
                let nudge = |model: &mut SequenceModel, delta: f64| {
                    let mut views = model.tensors_mut();
                    if let Some(p) = views[tensor].iter_mut().nth(idx) {
                        *p += delta;
                    }
                };

                nudge(&mut model, eps);
                let up = squared_error(&model, &ex);
                nudge(&mut model, -2.0 * eps);
                let down = squared_error(&model, &ex);
                nudge(&mut model, eps);

                let numeric = (up - down) / (2.0 * eps);
                let a = analytic[tensor][idx];
                assert!(
                    (numeric - a).abs() <= 1e-6 + 1e-4 * a.abs().max(numeric.abs()),
                    "tensor {tensor} index {idx}: analytic {a} vs numeric {numeric}"
                );
            }
        }
    }

    #[test]
    fn training_reduces_loss() {
        let mut rng = StdRng::seed_from_u64(3);
        let mut model = SequenceModel::new(&[6, 6], &mut rng);
        let examples: Vec<TrainingWindow> = (0..24).map(|k| example(8, k as f64)).collect();

        let losses = model.train(&examples, 40, 8, 0.01, &mut rng).unwrap();
        assert_eq!(losses.len(), 40);
        assert!(losses.iter().all(|l| l.is_finite()));
        assert!(losses[39] < losses[0], "losses: {losses:?}");
    }

    #[test]
    fn same_seed_same_model() {
        let examples: Vec<TrainingWindow> = (0..10).map(|k| example(6, k as f64)).collect();
        let run = || {
            let mut rng = StdRng::seed_from_u64(99);
            let mut model = SequenceModel::new(&[4], &mut rng);
            model.train(&examples, 3, 4, 0.001, &mut rng).unwrap();
            model.predict(&examples[0].inputs)
        };
        assert_eq!(run(), run());
    }

    #[test]
    fn forget_gate_bias_starts_at_one() {
        let mut rng = StdRng::seed_from_u64(1);
        let model = SequenceModel::new(&[4], &mut rng);
        let b = &model.layers[0].b;
        assert!(b.slice(s![0..4]).iter().all(|&v| v == 0.0));
        assert!(b.slice(s![4..8]).iter().all(|&v| v == 1.0));
        assert!(b.slice(s![8..16]).iter().all(|&v| v == 0.0));
    }

    #[test]
    fn rejects_empty_training_set() {
        let mut rng = StdRng::seed_from_u64(1);
        let mut model = SequenceModel::new(&[4], &mut rng);
        let err = model.train(&[], 1, 1, 0.001, &mut rng).unwrap_err();
        assert!(matches!(err, ForecastError::ModelFitError(_)));
    }
}
