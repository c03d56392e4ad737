// ============================================================
// Layer 5 — Output Heads
// ============================================================
// EmbeddingHead: identity tensor -> 512-d recognition embedding.
// AgeEstimationModule: age tensor -> per-year age logits (101)
// plus coarse age-group logits. Neither head applies softmax;
// the loss functions own normalisation.

use burn::module::Module;
use burn::nn::{BatchNorm, BatchNormConfig, Dropout, DropoutConfig, Linear};
use burn::prelude::Config;
use burn::tensor::activation::{leaky_relu, relu};
use burn::tensor::backend::Backend;
use burn::tensor::Tensor;

use super::init;
use crate::domain::face::AGE_CLASSES;

// ─── EmbeddingHead ────────────────────────────────────────────────────────────

#[derive(Config, Debug)]
pub struct EmbeddingHeadConfig {
    /// Channel count of the identity tensor this head consumes.
    pub channels: usize,
    /// Spatial side length of that tensor (input_size / backbone stride).
    pub spatial: usize,
    #[config(default = 0.5)]
    pub drop_rate: f64,
    #[config(default = 512)]
    pub embedding_size: usize,
}

impl EmbeddingHeadConfig {
    pub fn init<B: Backend>(&self, device: &B::Device) -> EmbeddingHead<B> {
        EmbeddingHead {
            norm_in: BatchNormConfig::new(self.channels).init(device),
            dropout: DropoutConfig::new(self.drop_rate).init(),
            fc: init::linear(
                self.channels * self.spatial * self.spatial,
                self.embedding_size,
                device,
            ),
            norm_out: BatchNormConfig::new(self.embedding_size).init(device),
            embedding_size: self.embedding_size,
        }
    }
}

/// BatchNorm -> dropout -> flatten -> Linear -> BatchNorm.
///
/// The flatten width is fixed at construction, so the spatial
/// extent of the identity tensor must match the configured
/// `input_size` of the model.
#[derive(Module, Debug)]
pub struct EmbeddingHead<B: Backend> {
    norm_in: BatchNorm<B>,
    dropout: Dropout,
    fc: Linear<B>,
    norm_out: BatchNorm<B>,
    embedding_size: usize,
}

impl<B: Backend> EmbeddingHead<B> {
    pub fn forward(&self, identity: Tensor<B, 4>) -> Tensor<B, 2> {
        let x = self.norm_in.forward(identity);
        let x = self.dropout.forward(x);

        let [n, c, h, w] = x.dims();
        let x = x.reshape([n, c * h * w]);
        let x = self.fc.forward(x);

        // BatchNorm reduces over every non-channel axis, so the
        // vector is viewed as (N, 512, 1) around the norm.
        let x: Tensor<B, 3> = self.norm_out.forward(x.reshape([n, self.embedding_size, 1]));
        x.reshape([n, self.embedding_size])
    }
}

// ─── AgeEstimationModule ──────────────────────────────────────────────────────

#[derive(Config, Debug)]
pub struct AgeEstimationConfig {
    /// Feature width of the age tensor. Fixed per instance: an age
    /// head built for the 1024-channel dense backbone cannot read a
    /// 512-channel residual feature map.
    pub channels: usize,
    /// Spatial side length of the age tensor.
    pub spatial: usize,
    /// Number of coarse age buckets.
    pub age_group: usize,
    /// Adversarial/distributed training mode: swaps the hidden
    /// rectifier for a leaky one.
    #[config(default = false)]
    pub dist: bool,
}

impl AgeEstimationConfig {
    pub fn init<B: Backend>(&self, device: &B::Device) -> AgeEstimationModule<B> {
        AgeEstimationModule {
            norm_in: BatchNormConfig::new(self.channels).init(device),
            fc_hidden: init::linear(self.channels * self.spatial * self.spatial, 512, device),
            fc_age: init::linear(512, AGE_CLASSES, device),
            fc_group: init::linear(AGE_CLASSES, self.age_group, device),
            dist: self.dist,
        }
    }
}

/// Age tensor -> (age logits (N, 101), group logits (N, age_group)).
/// The group projection reads the age logits, not the hidden state.
#[derive(Module, Debug)]
pub struct AgeEstimationModule<B: Backend> {
    norm_in: BatchNorm<B>,
    fc_hidden: Linear<B>,
    fc_age: Linear<B>,
    fc_group: Linear<B>,
    dist: bool,
}

impl<B: Backend> AgeEstimationModule<B> {
    pub fn forward(&self, age: Tensor<B, 4>) -> (Tensor<B, 2>, Tensor<B, 2>) {
        let x = self.norm_in.forward(age);

        let [n, c, h, w] = x.dims();
        let x = x.reshape([n, c * h * w]);

        let x = self.fc_hidden.forward(x);
        let x = if self.dist {
            leaky_relu(x, 0.2)
        } else {
            relu(x)
        };

        let age_logits = self.fc_age.forward(x);
        let group_logits = self.fc_group.forward(age_logits.clone());
        (age_logits, group_logits)
    }
}

// ─── Unit Tests ───────────────────────────────────────────────────────────────
#[cfg(test)]
mod tests {
    use super::*;
    use burn::tensor::Distribution;

    type TestBackend = burn::backend::NdArray;

    #[test]
    fn embedding_is_always_512_wide() {
        let device = Default::default();
        let head = EmbeddingHeadConfig::new(32, 4).init::<TestBackend>(&device);

        let x = Tensor::random([3, 32, 4, 4], Distribution::Default, &device);
        assert_eq!(head.forward(x).dims(), [3, 512]);
    }

    #[test]
    fn age_head_output_shapes() {
        let device = Default::default();
        let head = AgeEstimationConfig::new(32, 2, 7).init::<TestBackend>(&device);

        let x = Tensor::random([4, 32, 2, 2], Distribution::Default, &device);
        let (age_logits, group_logits) = head.forward(x);
        assert_eq!(age_logits.dims(), [4, AGE_CLASSES]);
        assert_eq!(group_logits.dims(), [4, 7]);
    }

    #[test]
    fn dist_flag_changes_activation_not_shapes() {
        let device = Default::default();
        let plain = AgeEstimationConfig::new(16, 2, 5).init::<TestBackend>(&device);
        let dist = AgeEstimationConfig::new(16, 2, 5)
            .with_dist(true)
            .init::<TestBackend>(&device);

        let x = Tensor::<TestBackend, 4>::random([2, 16, 2, 2], Distribution::Default, &device);
        let (a0, g0) = plain.forward(x.clone());
        let (a1, g1) = dist.forward(x);
        assert_eq!(a0.dims(), a1.dims());
        assert_eq!(g0.dims(), g1.dims());
    }
}
