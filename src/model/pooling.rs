//! Stochastic 2x2 pooling.
//!
//! Downsamples by drawing one value per 2x2 cell from the softmax
//! distribution over the cell's values, instead of taking a fixed statistic.
//! The draw is a training-time regularizer: two passes over the same input
//! may differ. All randomness enters through an explicit RNG handed to
//! `forward_sampled`; the plain `forward` is the deterministic inference
//! path (probability-weighted average over each cell), so evaluation of a
//! frozen model is reproducible.

use burn::module::Module;
use burn::tensor::{activation, backend::Backend, Tensor, TensorData};
use rand::Rng;
use rand_chacha::ChaCha8Rng;

/// Stochastic pooling over non-overlapping 2x2 cells.
///
/// Input `[N, C, H, W]`, output `[N, C, H/2, W/2]`. A trailing row or
/// column of odd-sized inputs is dropped, never padded.
#[derive(Module, Clone, Debug, Default)]
pub struct StochasticPool2d {}

impl StochasticPool2d {
    /// Create the pooling unit
    pub fn new() -> Self {
        Self {}
    }

    /// Deterministic path: expected value of the per-cell distribution.
    ///
    /// Used at evaluation time, where sampled pooling would make metrics
    /// non-reproducible.
    pub fn forward<B: Backend>(&self, input: Tensor<B, 4>) -> Tensor<B, 4> {
        let cells = Self::cells(input);
        let [n, c, h2, w2, _] = cells.dims();

        let probs = activation::softmax(cells.clone(), 4);
        (probs * cells).sum_dim(4).reshape([n, c, h2, w2])
    }

    /// Sampling path: draw one value per (sample, channel, cell).
    ///
    /// Sampling uses the Gumbel-max trick: adding Gumbel noise to the raw
    /// cell values and taking the argmax draws an index exactly from the
    /// softmax distribution over those values. The gradient flows through
    /// the gather of the selected element; the index itself is a discrete
    /// decision.
    pub fn forward_sampled<B: Backend>(
        &self,
        input: Tensor<B, 4>,
        rng: &mut ChaCha8Rng,
    ) -> Tensor<B, 4> {
        let device = input.device();
        let cells = Self::cells(input);
        let [n, c, h2, w2, k] = cells.dims();

        let count = n * c * h2 * w2 * k;
        let gumbel: Vec<f32> = (0..count)
            .map(|_| {
                let u: f32 = rng.gen_range(1e-7f32..1.0);
                -(-u.ln()).ln()
            })
            .collect();
        let gumbel = Tensor::<B, 1>::from_data(TensorData::new(gumbel, [count]), &device)
            .reshape([n, c, h2, w2, k]);

        let indices = (cells.clone() + gumbel).argmax(4);
        cells.gather(4, indices).reshape([n, c, h2, w2])
    }

    /// Regroup `[N, C, H, W]` into `[N, C, H/2, W/2, 4]` cell values.
    fn cells<B: Backend>(input: Tensor<B, 4>) -> Tensor<B, 5> {
        let [n, c, h, w] = input.dims();
        let (h2, w2) = (h / 2, w / 2);

        // Integer division truncates: odd trailing rows/columns are dropped.
        let input = input.slice([0..n, 0..c, 0..h2 * 2, 0..w2 * 2]);

        input
            .reshape([n, c, h2, 2, w2, 2])
            .swap_dims(3, 4)
            .reshape([n, c, h2, w2, 4])
    }
}
