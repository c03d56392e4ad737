// ============================================================
// Layer 5 — Dense-Connectivity Feature Backbone
// ============================================================
// A DenseNet-121 feature extractor: 7x7/2 stem with a 3x3/2
// max-pool, four dense blocks of [6, 12, 24, 16] layers
// (growth 32, 4x growth bottleneck), transitions that halve
// both width and resolution, and a final BN + ReLU. Output is
// 1024 channels at 1/32 of the input resolution.
//
// There is no bundled pretrained file; warm-starting from a
// saved checkpoint is handled by the training harness.

use burn::module::Module;
use burn::nn::conv::Conv2d;
use burn::nn::{BatchNorm, BatchNormConfig, PaddingConfig2d};
use burn::tensor::activation::relu;
use burn::tensor::backend::Backend;
use burn::tensor::module::max_pool2d;
use burn::tensor::Tensor;

use super::init;
use super::spp::{adaptive_pool2d, PoolMode};

const GROWTH_RATE: usize = 32;
const BOTTLENECK: usize = 4 * GROWTH_RATE;
const BLOCK_LAYERS: [usize; 4] = [6, 12, 24, 16];
const STEM_CHANNELS: usize = 64;

/// Output channel count of the extractor.
pub const DENSE_FEATURE_CHANNELS: usize = 1024;

/// One bottlenecked dense layer: BN -> ReLU -> 1x1 conv (4k) ->
/// BN -> ReLU -> 3x3 conv (k), concatenated onto its input.
#[derive(Module, Debug)]
struct DenseLayer<B: Backend> {
    norm1: BatchNorm<B>,
    conv1: Conv2d<B>,
    norm2: BatchNorm<B>,
    conv2: Conv2d<B>,
}

impl<B: Backend> DenseLayer<B> {
    fn new(in_channels: usize, device: &B::Device) -> Self {
        Self {
            norm1: BatchNormConfig::new(in_channels).init(device),
            conv1: init::conv2d(
                [in_channels, BOTTLENECK],
                [1, 1],
                [1, 1],
                PaddingConfig2d::Explicit(0, 0),
                device,
            ),
            norm2: BatchNormConfig::new(BOTTLENECK).init(device),
            conv2: init::conv2d(
                [BOTTLENECK, GROWTH_RATE],
                [3, 3],
                [1, 1],
                PaddingConfig2d::Explicit(1, 1),
                device,
            ),
        }
    }

    fn forward(&self, x: Tensor<B, 4>) -> Tensor<B, 4> {
        let y = self.conv1.forward(relu(self.norm1.forward(x.clone())));
        let y = self.conv2.forward(relu(self.norm2.forward(y)));
        Tensor::cat(vec![x, y], 1)
    }
}

#[derive(Module, Debug)]
struct DenseBlock<B: Backend> {
    layers: Vec<DenseLayer<B>>,
}

impl<B: Backend> DenseBlock<B> {
    fn new(in_channels: usize, layers: usize, device: &B::Device) -> Self {
        let layers = (0..layers)
            .map(|i| DenseLayer::new(in_channels + i * GROWTH_RATE, device))
            .collect();
        Self { layers }
    }

    fn out_channels(in_channels: usize, layers: usize) -> usize {
        in_channels + layers * GROWTH_RATE
    }

    fn forward(&self, mut x: Tensor<B, 4>) -> Tensor<B, 4> {
        for layer in &self.layers {
            x = layer.forward(x);
        }
        x
    }
}

/// Transition: BN -> ReLU -> 1x1 conv (halve channels) -> 2x2
/// average pool (halve resolution).
#[derive(Module, Debug)]
struct Transition<B: Backend> {
    norm: BatchNorm<B>,
    conv: Conv2d<B>,
}

impl<B: Backend> Transition<B> {
    fn new(in_channels: usize, device: &B::Device) -> Self {
        Self {
            norm: BatchNormConfig::new(in_channels).init(device),
            conv: init::conv2d(
                [in_channels, in_channels / 2],
                [1, 1],
                [1, 1],
                PaddingConfig2d::Explicit(0, 0),
                device,
            ),
        }
    }

    fn forward(&self, x: Tensor<B, 4>) -> Tensor<B, 4> {
        let x = self.conv.forward(relu(self.norm.forward(x)));
        let [_, _, h, _] = x.dims();
        adaptive_pool2d(x, h / 2, PoolMode::Average)
    }
}

/// DenseNet-121 feature extractor. The internal block structure
/// is opaque to callers: only the final feature map is exposed,
/// unlike the residual backbone's per-stage activations.
#[derive(Module, Debug)]
pub struct DenseNetFeatures<B: Backend> {
    stem_conv: Conv2d<B>,
    stem_norm: BatchNorm<B>,
    block1: DenseBlock<B>,
    trans1: Transition<B>,
    block2: DenseBlock<B>,
    trans2: Transition<B>,
    block3: DenseBlock<B>,
    trans3: Transition<B>,
    block4: DenseBlock<B>,
    final_norm: BatchNorm<B>,
}

impl<B: Backend> DenseNetFeatures<B> {
    pub fn new(device: &B::Device) -> Self {
        let c1 = DenseBlock::<B>::out_channels(STEM_CHANNELS, BLOCK_LAYERS[0]); // 256
        let c2 = DenseBlock::<B>::out_channels(c1 / 2, BLOCK_LAYERS[1]); // 512
        let c3 = DenseBlock::<B>::out_channels(c2 / 2, BLOCK_LAYERS[2]); // 1024
        let c4 = DenseBlock::<B>::out_channels(c3 / 2, BLOCK_LAYERS[3]); // 1024
        debug_assert_eq!(c4, DENSE_FEATURE_CHANNELS);

        Self {
            stem_conv: init::conv2d(
                [3, STEM_CHANNELS],
                [7, 7],
                [2, 2],
                PaddingConfig2d::Explicit(3, 3),
                device,
            ),
            stem_norm: BatchNormConfig::new(STEM_CHANNELS).init(device),
            block1: DenseBlock::new(STEM_CHANNELS, BLOCK_LAYERS[0], device),
            trans1: Transition::new(c1, device),
            block2: DenseBlock::new(c1 / 2, BLOCK_LAYERS[1], device),
            trans2: Transition::new(c2, device),
            block3: DenseBlock::new(c2 / 2, BLOCK_LAYERS[2], device),
            trans3: Transition::new(c3, device),
            block4: DenseBlock::new(c3 / 2, BLOCK_LAYERS[3], device),
            final_norm: BatchNormConfig::new(DENSE_FEATURE_CHANNELS).init(device),
        }
    }

    /// Final 1024-channel feature map at 1/32 resolution.
    pub fn forward(&self, images: Tensor<B, 4>) -> Tensor<B, 4> {
        let x = relu(self.stem_norm.forward(self.stem_conv.forward(images)));
        let x = max_pool2d(x, [3, 3], [2, 2], [1, 1], [1, 1], false);

        let x = self.trans1.forward(self.block1.forward(x));
        let x = self.trans2.forward(self.block2.forward(x));
        let x = self.trans3.forward(self.block3.forward(x));
        let x = self.block4.forward(x);

        relu(self.final_norm.forward(x))
    }
}

// ─── Unit Tests ───────────────────────────────────────────────────────────────
#[cfg(test)]
mod tests {
    use super::*;
    use burn::tensor::Distribution;

    type TestBackend = burn::backend::NdArray;

    #[test]
    fn channel_plan_matches_densenet_121() {
        assert_eq!(DenseBlock::<TestBackend>::out_channels(64, 6), 256);
        assert_eq!(DenseBlock::<TestBackend>::out_channels(128, 12), 512);
        assert_eq!(DenseBlock::<TestBackend>::out_channels(256, 24), 1024);
        assert_eq!(DenseBlock::<TestBackend>::out_channels(512, 16), 1024);
    }

    #[test]
    fn dense_layer_appends_growth_channels() {
        let device = Default::default();
        let layer = DenseLayer::<TestBackend>::new(64, &device);

        let x = Tensor::random([1, 64, 4, 4], Distribution::Default, &device);
        assert_eq!(layer.forward(x).dims(), [1, 64 + GROWTH_RATE, 4, 4]);
    }

    #[test]
    fn extractor_emits_1024_channels_at_stride_32() {
        let device = Default::default();
        let net = DenseNetFeatures::<TestBackend>::new(&device);

        let x = Tensor::random([1, 3, 64, 64], Distribution::Default, &device);
        assert_eq!(net.forward(x).dims(), [1, 1024, 2, 2]);
    }
}
