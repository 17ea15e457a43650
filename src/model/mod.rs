//! Model architecture: activation, pooling, blocks, and the backbone.
//!
//! The backbone is an enhanced ResNeXt-50 variant: stochastic pooling after
//! the stem, Swish activations throughout, and 32-way cardinality blocks
//! with residual fusion.

pub mod activation;
pub mod block;
pub mod network;
pub mod pooling;

pub use activation::Swish;
pub use block::{CardinalityBlock, EXPANSION};
pub use network::{SeverityNet, SeverityNetConfig};
pub use pooling::StochasticPool2d;
