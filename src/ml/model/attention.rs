// ============================================================
// Layer 5 — Feature-Splitting Attention
// ============================================================
// Splits one backbone feature map into an age component and an
// identity component with two independent gating branches:
//
//   channel branch: avg-SPP + max-SPP descriptor -> 1x1 conv
//     bottleneck (/16) -> BN -> sigmoid  => gate (N, C, 1, 1)
//   spatial branch: per-pixel channel max + mean -> 7x7 conv
//     -> BN -> sigmoid                   => gate (N, 1, H, W)
//
//   age      = 0.5 * (x ⊙ channel_gate + x ⊙ spatial_gate)
//   identity = x − age
//
// The 0.5 average keeps either branch from dominating, and the
// identity component is the exact residual, so identity + age
// reconstructs the input feature map.
//
// Reference: Woo et al. (2018) CBAM (channel + spatial gating)

use burn::module::Module;
use burn::nn::conv::Conv2d;
use burn::nn::{BatchNorm, BatchNormConfig, PaddingConfig2d};
use burn::prelude::Config;
use burn::tensor::activation::{relu, sigmoid};
use burn::tensor::backend::Backend;
use burn::tensor::Tensor;

use super::init;
use super::spp::{PoolMode, SpatialPyramidPooling};

/// Pyramid sizes used by both pooling branches. Σ s² = 14, so the
/// channel descriptor is 14·C wide.
const POOL_SIZES: [usize; 3] = [1, 2, 3];
const SPATIAL_KERNEL: usize = 7;

#[derive(Config, Debug)]
pub struct AttentionModuleConfig {
    /// Channel count of the feature map this instance will gate.
    pub channels: usize,
    /// Bottleneck divisor for the channel branch.
    #[config(default = 16)]
    pub reduction: usize,
}

impl AttentionModuleConfig {
    pub fn init<B: Backend>(&self, device: &B::Device) -> AttentionModule<B> {
        let pooled = self.channels * POOL_SIZES.iter().map(|s| s * s).sum::<usize>();
        let padding = (SPATIAL_KERNEL - 1) / 2;

        AttentionModule {
            avg_spp: SpatialPyramidPooling::new(PoolMode::Average, POOL_SIZES),
            max_spp: SpatialPyramidPooling::new(PoolMode::Max, POOL_SIZES),
            channel_reduce: init::conv2d(
                [pooled, pooled / self.reduction],
                [1, 1],
                [1, 1],
                PaddingConfig2d::Explicit(0, 0),
                device,
            ),
            channel_expand: init::conv2d(
                [pooled / self.reduction, self.channels],
                [1, 1],
                [1, 1],
                PaddingConfig2d::Explicit(0, 0),
                device,
            ),
            channel_norm: BatchNormConfig::new(self.channels)
                .with_momentum(0.01)
                .init(device),
            spatial_conv: init::conv2d(
                [2, 1],
                [SPATIAL_KERNEL, SPATIAL_KERNEL],
                [1, 1],
                PaddingConfig2d::Explicit(padding, padding),
                device,
            ),
            spatial_norm: BatchNormConfig::new(1).with_momentum(0.01).init(device),
            channels: self.channels,
        }
    }
}

/// Decomposes a feature tensor into identity- and age-correlated
/// components. Both outputs are shape-identical to the input.
#[derive(Module, Debug)]
pub struct AttentionModule<B: Backend> {
    avg_spp: SpatialPyramidPooling,
    max_spp: SpatialPyramidPooling,
    channel_reduce: Conv2d<B>,
    channel_expand: Conv2d<B>,
    channel_norm: BatchNorm<B>,
    spatial_conv: Conv2d<B>,
    spatial_norm: BatchNorm<B>,
    channels: usize,
}

impl<B: Backend> AttentionModule<B> {
    /// Per-channel gate in [0,1], shape (N, C, 1, 1).
    pub fn channel_gate(&self, x: &Tensor<B, 4>) -> Tensor<B, 4> {
        let descriptor = self.avg_spp.forward(x.clone()) + self.max_spp.forward(x.clone());
        let z = relu(self.channel_reduce.forward(descriptor));
        let z = self.channel_expand.forward(z);
        sigmoid(self.channel_norm.forward(z))
    }

    /// Per-pixel gate in [0,1], shape (N, 1, H, W).
    pub fn spatial_gate(&self, x: &Tensor<B, 4>) -> Tensor<B, 4> {
        let stacked = Tensor::cat(
            vec![x.clone().max_dim(1), x.clone().mean_dim(1)],
            1,
        );
        sigmoid(self.spatial_norm.forward(self.spatial_conv.forward(stacked)))
    }

    /// Returns (identity, age). The channel count must match the
    /// count this module was built for.
    pub fn forward(&self, x: Tensor<B, 4>) -> (Tensor<B, 4>, Tensor<B, 4>) {
        debug_assert_eq!(
            x.dims()[1],
            self.channels,
            "attention module built for {} channels",
            self.channels,
        );

        let channel_gate = self.channel_gate(&x);
        let spatial_gate = self.spatial_gate(&x);

        let age = (x.clone() * channel_gate + x.clone() * spatial_gate).mul_scalar(0.5);
        let identity = x - age.clone();

        (identity, age)
    }
}

// ─── Unit Tests ───────────────────────────────────────────────────────────────
#[cfg(test)]
mod tests {
    use super::*;
    use burn::tensor::Distribution;
    use burn::prelude::ElementConversion;

    type TestBackend = burn::backend::NdArray;

    fn random_features(n: usize, c: usize, h: usize, w: usize) -> Tensor<TestBackend, 4> {
        let device = Default::default();
        Tensor::random([n, c, h, w], Distribution::Uniform(-2.0, 2.0), &device)
    }

    #[test]
    fn outputs_match_input_shape() {
        let device = Default::default();
        let module = AttentionModuleConfig::new(16).init::<TestBackend>(&device);

        let x = random_features(2, 16, 7, 7);
        let (identity, age) = module.forward(x.clone());

        assert_eq!(identity.dims(), x.dims());
        assert_eq!(age.dims(), x.dims());
    }

    #[test]
    fn identity_plus_age_reconstructs_the_input() {
        let device = Default::default();
        let module = AttentionModuleConfig::new(16).init::<TestBackend>(&device);

        let x = random_features(2, 16, 6, 6);
        let (identity, age) = module.forward(x.clone());

        // identity is the exact residual x − age; adding age back can
        // round at most once per element
        let max_err = (identity + age - x)
            .abs()
            .max()
            .into_scalar()
            .elem::<f32>();
        assert!(max_err <= 1e-6, "reconstruction error {max_err}");
    }

    #[test]
    fn gates_are_bounded_to_unit_interval() {
        let device = Default::default();
        let module = AttentionModuleConfig::new(16).init::<TestBackend>(&device);

        // Large-magnitude input to push the sigmoids toward saturation
        let x = random_features(1, 16, 5, 5).mul_scalar(50.0);

        let cg = module.channel_gate(&x).into_data().to_vec::<f32>().unwrap();
        let sg = module.spatial_gate(&x).into_data().to_vec::<f32>().unwrap();
        assert!(cg.iter().all(|g| (0.0..=1.0).contains(g)));
        assert!(sg.iter().all(|g| (0.0..=1.0).contains(g)));
    }

    #[test]
    fn gate_shapes_broadcast_over_their_free_axes() {
        let device = Default::default();
        let module = AttentionModuleConfig::new(8).init::<TestBackend>(&device);

        let x = random_features(3, 8, 9, 9);
        assert_eq!(module.channel_gate(&x).dims(), [3, 8, 1, 1]);
        assert_eq!(module.spatial_gate(&x).dims(), [3, 1, 9, 9]);
    }
}
