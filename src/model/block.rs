//! Cardinality blocks: the backbone's repeating residual unit.
//!
//! Each block runs `cardinality` independent bottleneck branches, then
//! concatenates them along the channel axis and adds a residual identity
//! path. Shape compatibility between the concatenation and the identity
//! path is validated when the block is constructed; the forward pass never
//! has to discover a mismatch.

use burn::{
    module::Module,
    nn::{
        conv::{Conv2d, Conv2dConfig},
        BatchNorm, BatchNormConfig, PaddingConfig2d,
    },
    tensor::{backend::Backend, Tensor},
};

use super::activation::Swish;
use crate::utils::error::{Error, Result};

/// Channel multiplier applied by each branch's expansion convolution.
pub const EXPANSION: usize = 2;

/// One bottleneck branch of a cardinality block.
///
/// 1x1 reduce -> BN -> Swish -> 3x3 (block stride) -> BN -> Swish ->
/// 1x1 expand -> BN. No activation after the expansion; the block applies
/// Swish once after the residual addition.
#[derive(Module, Debug)]
pub struct Branch<B: Backend> {
    reduce: Conv2d<B>,
    reduce_bn: BatchNorm<B, 2>,
    spatial: Conv2d<B>,
    spatial_bn: BatchNorm<B, 2>,
    expand: Conv2d<B>,
    expand_bn: BatchNorm<B, 2>,
    activation: Swish,
}

impl<B: Backend> Branch<B> {
    fn new(
        in_channels: usize,
        width: usize,
        out_width: usize,
        stride: usize,
        device: &B::Device,
    ) -> Self {
        let reduce = Conv2dConfig::new([in_channels, width], [1, 1])
            .with_bias(false)
            .init(device);
        let reduce_bn = BatchNormConfig::new(width).init(device);

        let spatial = Conv2dConfig::new([width, width], [3, 3])
            .with_stride([stride, stride])
            .with_padding(PaddingConfig2d::Explicit(1, 1))
            .with_bias(false)
            .init(device);
        let spatial_bn = BatchNormConfig::new(width).init(device);

        let expand = Conv2dConfig::new([width, out_width], [1, 1])
            .with_bias(false)
            .init(device);
        let expand_bn = BatchNormConfig::new(out_width).init(device);

        Self {
            reduce,
            reduce_bn,
            spatial,
            spatial_bn,
            expand,
            expand_bn,
            activation: Swish::new(),
        }
    }

    fn forward(&self, input: Tensor<B, 4>) -> Tensor<B, 4> {
        let x = self.reduce.forward(input);
        let x = self.reduce_bn.forward(x);
        let x = self.activation.forward(x);

        let x = self.spatial.forward(x);
        let x = self.spatial_bn.forward(x);
        let x = self.activation.forward(x);

        let x = self.expand.forward(x);
        self.expand_bn.forward(x)
    }
}

/// Identity-path projection for blocks that change stride or channel count.
#[derive(Module, Debug)]
pub struct Downsample<B: Backend> {
    conv: Conv2d<B>,
    bn: BatchNorm<B, 2>,
}

impl<B: Backend> Downsample<B> {
    fn new(in_channels: usize, out_channels: usize, stride: usize, device: &B::Device) -> Self {
        let conv = Conv2dConfig::new([in_channels, out_channels], [1, 1])
            .with_stride([stride, stride])
            .with_bias(false)
            .init(device);
        let bn = BatchNormConfig::new(out_channels).init(device);
        Self { conv, bn }
    }

    fn forward(&self, input: Tensor<B, 4>) -> Tensor<B, 4> {
        self.bn.forward(self.conv.forward(input))
    }
}

/// Multi-branch residual unit.
///
/// The branches are a homogeneous, runtime-sized collection: `cardinality`
/// is a constructor argument, not a set of named fields. Output channel
/// count is `out_channels * EXPANSION`.
#[derive(Module, Debug)]
pub struct CardinalityBlock<B: Backend> {
    branches: Vec<Branch<B>>,
    downsample: Option<Downsample<B>>,
    activation: Swish,
}

impl<B: Backend> CardinalityBlock<B> {
    /// Build a block, validating the residual-shape invariant.
    ///
    /// Fails when `out_channels` is not divisible by `cardinality`, or when
    /// the identity path could not match the concatenated branch output
    /// (stride != 1 or a channel-count change) and no downsample projection
    /// was requested. The projection itself is sized here, so a supplied
    /// projection always matches the branch concatenation exactly.
    pub fn new(
        in_channels: usize,
        out_channels: usize,
        cardinality: usize,
        stride: usize,
        with_downsample: bool,
        device: &B::Device,
    ) -> Result<Self> {
        if cardinality == 0 {
            return Err(Error::Model("cardinality must be at least 1".to_string()));
        }
        if out_channels % cardinality != 0 {
            return Err(Error::Model(format!(
                "out_channels {} is not divisible by cardinality {}",
                out_channels, cardinality
            )));
        }

        let expanded = out_channels * EXPANSION;
        let needs_projection = stride != 1 || in_channels != expanded;
        if needs_projection && !with_downsample {
            return Err(Error::Model(format!(
                "block with stride {} mapping {} -> {} channels requires a downsample projection",
                stride, in_channels, expanded
            )));
        }

        let width = out_channels / cardinality;
        let out_width = width * EXPANSION;

        let branches = (0..cardinality)
            .map(|_| Branch::new(in_channels, width, out_width, stride, device))
            .collect();

        let downsample =
            with_downsample.then(|| Downsample::new(in_channels, expanded, stride, device));

        Ok(Self {
            branches,
            downsample,
            activation: Swish::new(),
        })
    }

    /// Number of parallel branches
    pub fn cardinality(&self) -> usize {
        self.branches.len()
    }

    /// Forward pass: concatenated branches plus the identity path.
    pub fn forward(&self, input: Tensor<B, 4>) -> Tensor<B, 4> {
        let identity = match &self.downsample {
            Some(projection) => projection.forward(input.clone()),
            None => input.clone(),
        };

        let branch_outputs: Vec<Tensor<B, 4>> = self
            .branches
            .iter()
            .map(|branch| branch.forward(input.clone()))
            .collect();
        let merged = Tensor::cat(branch_outputs, 1);

        self.activation.forward(merged + identity)
    }
}
