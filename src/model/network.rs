//! The severity backbone: an enhanced ResNeXt-50 variant.
//!
//! Stem (7x7/2 convolution, BN, Swish, stochastic pooling) followed by four
//! stages of cardinality blocks, global average pooling, and a linear
//! classifier head. The network produces raw logits; callers apply softmax
//! when they need probabilities.

use burn::{
    module::Module,
    nn::{
        conv::{Conv2d, Conv2dConfig},
        pool::{AdaptiveAvgPool2d, AdaptiveAvgPool2dConfig},
        BatchNorm, BatchNormConfig, Linear, LinearConfig, PaddingConfig2d,
    },
    tensor::{activation, backend::Backend, Tensor},
};
use rand_chacha::ChaCha8Rng;
use serde::{Deserialize, Serialize};

use super::activation::Swish;
use super::block::CardinalityBlock;
use super::pooling::StochasticPool2d;
use crate::utils::error::{Error, Result};

/// Configuration for the severity backbone
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SeverityNetConfig {
    /// Number of output classes (3 severity levels)
    pub num_classes: usize,

    /// Number of parallel branches per block
    pub cardinality: usize,

    /// Stem output channels
    pub stem_channels: usize,

    /// Bottleneck width of each stage
    pub stage_widths: [usize; 4],

    /// Block count of each stage
    pub stage_depths: [usize; 4],
}

impl Default for SeverityNetConfig {
    fn default() -> Self {
        Self {
            num_classes: crate::NUM_CLASSES,
            cardinality: 32,
            stem_channels: 64,
            stage_widths: [128, 256, 512, 1024],
            stage_depths: [3, 4, 6, 3],
        }
    }
}

impl SeverityNetConfig {
    /// Create a configuration with a custom class count
    pub fn new(num_classes: usize) -> Self {
        Self {
            num_classes,
            ..Default::default()
        }
    }

    /// Validate the configuration
    pub fn validate(&self) -> Result<()> {
        if self.num_classes == 0 {
            return Err(Error::Model("num_classes must be greater than 0".to_string()));
        }
        if self.cardinality == 0 {
            return Err(Error::Model("cardinality must be greater than 0".to_string()));
        }
        if self.stem_channels == 0 {
            return Err(Error::Model("stem_channels must be greater than 0".to_string()));
        }
        for (idx, &width) in self.stage_widths.iter().enumerate() {
            if width % self.cardinality != 0 {
                return Err(Error::Model(format!(
                    "stage {} width {} is not divisible by cardinality {}",
                    idx + 1,
                    width,
                    self.cardinality
                )));
            }
        }
        if self.stage_depths.iter().any(|&depth| depth == 0) {
            return Err(Error::Model("every stage needs at least one block".to_string()));
        }
        Ok(())
    }

    /// Feature width entering the classifier head
    pub fn feature_channels(&self) -> usize {
        self.stage_widths[3] * super::block::EXPANSION
    }

    /// Save configuration to a JSON file
    pub fn save(&self, path: &std::path::Path) -> Result<()> {
        let json = serde_json::to_string_pretty(self)?;
        std::fs::write(path, json)?;
        Ok(())
    }

    /// Load configuration from a JSON file
    pub fn load(path: &std::path::Path) -> Result<Self> {
        let json = std::fs::read_to_string(path)?;
        Ok(serde_json::from_str(&json)?)
    }
}

/// Severity classification backbone
#[derive(Module, Debug)]
pub struct SeverityNet<B: Backend> {
    stem: Conv2d<B>,
    stem_bn: BatchNorm<B, 2>,
    stem_pool: StochasticPool2d,

    stage1: Vec<CardinalityBlock<B>>,
    stage2: Vec<CardinalityBlock<B>>,
    stage3: Vec<CardinalityBlock<B>>,
    stage4: Vec<CardinalityBlock<B>>,

    avgpool: AdaptiveAvgPool2d,
    fc: Linear<B>,
    activation: Swish,

    num_classes: usize,
}

impl<B: Backend> SeverityNet<B> {
    /// Build the backbone from a configuration.
    ///
    /// Stage construction threads a running input-channel counter: the
    /// first block of each stage carries the stride and a downsample
    /// projection, the remaining blocks run at stride 1 with channel counts
    /// already aligned.
    pub fn new(config: &SeverityNetConfig, device: &B::Device) -> Result<Self> {
        config.validate()?;

        let stem = Conv2dConfig::new([3, config.stem_channels], [7, 7])
            .with_stride([2, 2])
            .with_padding(PaddingConfig2d::Explicit(3, 3))
            .with_bias(false)
            .init(device);
        let stem_bn = BatchNormConfig::new(config.stem_channels).init(device);
        let stem_pool = StochasticPool2d::new();

        let mut in_channels = config.stem_channels;
        let stage1 = Self::make_stage(
            &mut in_channels,
            config.stage_widths[0],
            config.stage_depths[0],
            1,
            config.cardinality,
            device,
        )?;
        let stage2 = Self::make_stage(
            &mut in_channels,
            config.stage_widths[1],
            config.stage_depths[1],
            2,
            config.cardinality,
            device,
        )?;
        let stage3 = Self::make_stage(
            &mut in_channels,
            config.stage_widths[2],
            config.stage_depths[2],
            2,
            config.cardinality,
            device,
        )?;
        let stage4 = Self::make_stage(
            &mut in_channels,
            config.stage_widths[3],
            config.stage_depths[3],
            2,
            config.cardinality,
            device,
        )?;

        let avgpool = AdaptiveAvgPool2dConfig::new([1, 1]).init();
        let fc = LinearConfig::new(in_channels, config.num_classes).init(device);

        Ok(Self {
            stem,
            stem_bn,
            stem_pool,
            stage1,
            stage2,
            stage3,
            stage4,
            avgpool,
            fc,
            activation: Swish::new(),
            num_classes: config.num_classes,
        })
    }

    /// Build one stage and advance the running input-channel counter.
    fn make_stage(
        in_channels: &mut usize,
        out_channels: usize,
        depth: usize,
        stride: usize,
        cardinality: usize,
        device: &B::Device,
    ) -> Result<Vec<CardinalityBlock<B>>> {
        let mut blocks = Vec::with_capacity(depth);

        // First block: carries the stride and the sized downsample projection.
        blocks.push(CardinalityBlock::new(
            *in_channels,
            out_channels,
            cardinality,
            stride,
            true,
            device,
        )?);
        *in_channels = out_channels * super::block::EXPANSION;

        for _ in 1..depth {
            blocks.push(CardinalityBlock::new(
                *in_channels,
                out_channels,
                cardinality,
                1,
                false,
                device,
            )?);
        }

        Ok(blocks)
    }

    /// Deterministic forward pass (evaluation/inference).
    ///
    /// # Arguments
    /// * `input` - Image batch of shape `[batch, 3, height, width]`
    ///
    /// # Returns
    /// * Logits of shape `[batch, num_classes]`
    pub fn forward(&self, input: Tensor<B, 4>) -> Tensor<B, 2> {
        let x = self.stem_features(input);
        let x = self.stem_pool.forward(x);
        self.trunk(x)
    }

    /// Training forward pass with sampled stochastic pooling.
    ///
    /// The RNG is supplied by the caller so runs are reproducible from a
    /// seed; there is no hidden global random state.
    pub fn forward_train(&self, input: Tensor<B, 4>, rng: &mut ChaCha8Rng) -> Tensor<B, 2> {
        let x = self.stem_features(input);
        let x = self.stem_pool.forward_sampled(x, rng);
        self.trunk(x)
    }

    /// Forward pass with softmax applied, for probability consumers.
    pub fn predict(&self, input: Tensor<B, 4>) -> Tensor<B, 2> {
        activation::softmax(self.forward(input), 1)
    }

    fn stem_features(&self, input: Tensor<B, 4>) -> Tensor<B, 4> {
        let x = self.stem.forward(input);
        let x = self.stem_bn.forward(x);
        self.activation.forward(x)
    }

    fn trunk(&self, x: Tensor<B, 4>) -> Tensor<B, 2> {
        let mut x = x;
        for block in &self.stage1 {
            x = block.forward(x);
        }
        for block in &self.stage2 {
            x = block.forward(x);
        }
        for block in &self.stage3 {
            x = block.forward(x);
        }
        for block in &self.stage4 {
            x = block.forward(x);
        }

        let x = self.avgpool.forward(x);
        let [batch, channels, _, _] = x.dims();
        let x = x.reshape([batch, channels]);

        self.fc.forward(x)
    }

    /// Number of output classes
    pub fn num_classes(&self) -> usize {
        self.num_classes
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use burn::tensor::Distribution;
    use burn_ndarray::NdArray;
    use rand::SeedableRng;

    type TestBackend = NdArray;

    /// Narrow configuration so forward passes stay cheap in tests.
    fn tiny_config() -> SeverityNetConfig {
        SeverityNetConfig {
            num_classes: 3,
            cardinality: 2,
            stem_channels: 4,
            stage_widths: [4, 4, 4, 4],
            stage_depths: [1, 1, 1, 1],
        }
    }

    #[test]
    fn test_default_config_is_valid() {
        let config = SeverityNetConfig::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.num_classes, 3);
        assert_eq!(config.stage_depths, [3, 4, 6, 3]);
        assert_eq!(config.feature_channels(), 2048);
    }

    #[test]
    fn test_config_validation_rejects_bad_widths() {
        let mut config = SeverityNetConfig::default();
        config.stage_widths = [130, 256, 512, 1024];
        assert!(config.validate().is_err());

        config = SeverityNetConfig::default();
        config.num_classes = 0;
        assert!(config.validate().is_err());

        config = SeverityNetConfig::default();
        config.stage_depths = [3, 0, 6, 3];
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_config_save_load_round_trip() {
        let config = SeverityNetConfig::default();
        let path = std::env::temp_dir().join("severity_net_config_test.json");

        config.save(&path).unwrap();
        let loaded = SeverityNetConfig::load(&path).unwrap();

        assert_eq!(loaded.num_classes, config.num_classes);
        assert_eq!(loaded.stage_widths, config.stage_widths);
        std::fs::remove_file(&path).ok();
    }

    #[test]
    fn test_tiny_network_output_shape() {
        let device = Default::default();
        let model = SeverityNet::<TestBackend>::new(&tiny_config(), &device).unwrap();

        let input =
            Tensor::<TestBackend, 4>::random([2, 3, 32, 32], Distribution::Default, &device);
        assert_eq!(model.forward(input).dims(), [2, 3]);
    }

    #[test]
    fn test_full_network_output_shape_at_224() {
        let device = Default::default();
        let config = SeverityNetConfig::default();
        let model = SeverityNet::<TestBackend>::new(&config, &device).unwrap();

        let input =
            Tensor::<TestBackend, 4>::random([1, 3, 224, 224], Distribution::Default, &device);
        let output = model.forward(input);

        assert_eq!(output.dims(), [1, 3]);
    }

    #[test]
    fn test_train_forward_matches_shape_and_is_seeded() {
        let device = Default::default();
        let model = SeverityNet::<TestBackend>::new(&tiny_config(), &device).unwrap();
        let input =
            Tensor::<TestBackend, 4>::random([2, 3, 32, 32], Distribution::Default, &device);

        let mut rng_a = rand_chacha::ChaCha8Rng::seed_from_u64(11);
        let mut rng_b = rand_chacha::ChaCha8Rng::seed_from_u64(11);

        let a: Vec<f32> = model
            .forward_train(input.clone(), &mut rng_a)
            .into_data()
            .to_vec()
            .unwrap();
        let b: Vec<f32> = model
            .forward_train(input, &mut rng_b)
            .into_data()
            .to_vec()
            .unwrap();

        assert_eq!(a.len(), 6);
        assert_eq!(a, b);
    }

    #[test]
    fn test_predict_rows_sum_to_one() {
        let device = Default::default();
        let model = SeverityNet::<TestBackend>::new(&tiny_config(), &device).unwrap();
        let input =
            Tensor::<TestBackend, 4>::random([2, 3, 32, 32], Distribution::Default, &device);

        let probs: Vec<f32> = model.predict(input).into_data().to_vec().unwrap();
        for row in probs.chunks(3) {
            let sum: f32 = row.iter().sum();
            assert!((sum - 1.0).abs() < 1e-5);
        }
    }

    #[test]
    fn test_invalid_config_rejected_at_construction() {
        let device = Default::default();
        let mut config = tiny_config();
        config.stage_widths = [5, 4, 4, 4]; // not divisible by cardinality 2

        assert!(SeverityNet::<TestBackend>::new(&config, &device).is_err());
    }
}
