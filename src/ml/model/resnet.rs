// ============================================================
// Layer 5 — Improved-Residual Face Backbone
// ============================================================
// The residual feature extractor used for face embeddings:
// a 3x3 stem (stride 1) followed by four stages of IR blocks,
// channels 64 -> 64 -> 128 -> 256 -> 512, each stage opening
// with a stride-2 block, for a total spatial stride of 16.
//
// IR block: BN -> 3x3 conv -> PReLU -> 3x3 conv (stride) -> BN,
// added to a shortcut (identity, 1x1-kernel max-pool when only
// the stride changes, 1x1 conv + BN when the width changes).
// The SE variant rescales the residual with a squeeze-excite
// gate before the add.
//
// Reference: He et al. (2016) Deep Residual Learning
//            Hu et al. (2018) Squeeze-and-Excitation Networks

use burn::module::Module;
use burn::nn::conv::Conv2d;
use burn::nn::{BatchNorm, BatchNormConfig, PRelu, PReluConfig, PaddingConfig2d};
use burn::tensor::activation::{relu, sigmoid};
use burn::tensor::backend::Backend;
use burn::tensor::module::max_pool2d;
use burn::tensor::Tensor;

use super::init;

const STEM_CHANNELS: usize = 64;
const STAGE_CHANNELS: [usize; 4] = [64, 128, 256, 512];
const SE_REDUCTION: usize = 16;

/// Squeeze-excite channel gate: global average pool -> 1x1 conv
/// bottleneck -> sigmoid -> rescale.
#[derive(Module, Debug)]
pub struct SqueezeExcite<B: Backend> {
    reduce: Conv2d<B>,
    expand: Conv2d<B>,
}

impl<B: Backend> SqueezeExcite<B> {
    fn new(channels: usize, device: &B::Device) -> Self {
        Self {
            reduce: init::conv2d(
                [channels, channels / SE_REDUCTION],
                [1, 1],
                [1, 1],
                PaddingConfig2d::Explicit(0, 0),
                device,
            ),
            expand: init::conv2d(
                [channels / SE_REDUCTION, channels],
                [1, 1],
                [1, 1],
                PaddingConfig2d::Explicit(0, 0),
                device,
            ),
        }
    }

    fn forward(&self, x: Tensor<B, 4>) -> Tensor<B, 4> {
        let squeezed = x.clone().mean_dim(3).mean_dim(2);
        let scale = sigmoid(self.expand.forward(relu(self.reduce.forward(squeezed))));
        x * scale
    }
}

#[derive(Module, Debug)]
pub struct IrBlock<B: Backend> {
    norm_in: BatchNorm<B>,
    conv1: Conv2d<B>,
    prelu: PRelu<B>,
    conv2: Conv2d<B>,
    norm_out: BatchNorm<B>,
    se: Option<SqueezeExcite<B>>,
    downsample: Option<(Conv2d<B>, BatchNorm<B>)>,
    stride: usize,
}

impl<B: Backend> IrBlock<B> {
    fn new(
        in_channels: usize,
        out_channels: usize,
        stride: usize,
        se: bool,
        device: &B::Device,
    ) -> Self {
        let downsample = (in_channels != out_channels).then(|| {
            (
                init::conv2d(
                    [in_channels, out_channels],
                    [1, 1],
                    [stride, stride],
                    PaddingConfig2d::Explicit(0, 0),
                    device,
                ),
                BatchNormConfig::new(out_channels).init(device),
            )
        });

        Self {
            norm_in: BatchNormConfig::new(in_channels).init(device),
            conv1: init::conv2d(
                [in_channels, out_channels],
                [3, 3],
                [1, 1],
                PaddingConfig2d::Explicit(1, 1),
                device,
            ),
            prelu: PReluConfig::new()
                .with_num_parameters(out_channels)
                .init(device),
            conv2: init::conv2d(
                [out_channels, out_channels],
                [3, 3],
                [stride, stride],
                PaddingConfig2d::Explicit(1, 1),
                device,
            ),
            norm_out: BatchNormConfig::new(out_channels).init(device),
            se: se.then(|| SqueezeExcite::new(out_channels, device)),
            downsample,
            stride,
        }
    }

    fn forward(&self, x: Tensor<B, 4>) -> Tensor<B, 4> {
        let shortcut = match &self.downsample {
            Some((conv, norm)) => norm.forward(conv.forward(x.clone())),
            // Same width but a stride: subsample with a 1x1-kernel pool
            None if self.stride > 1 => max_pool2d(
                x.clone(),
                [1, 1],
                [self.stride, self.stride],
                [0, 0],
                [1, 1],
                false,
            ),
            None => x.clone(),
        };

        let mut out = self.norm_in.forward(x);
        out = self.conv1.forward(out);
        out = self.prelu.forward(out);
        out = self.conv2.forward(out);
        out = self.norm_out.forward(out);
        if let Some(se) = &self.se {
            out = se.forward(out);
        }
        out + shortcut
    }
}

/// The four-stage residual feature extractor. Output feature map
/// has 512 channels at 1/16 of the input resolution.
#[derive(Module, Debug)]
pub struct IrResNet<B: Backend> {
    stem_conv: Conv2d<B>,
    stem_norm: BatchNorm<B>,
    stem_prelu: PRelu<B>,
    stage1: Vec<IrBlock<B>>,
    stage2: Vec<IrBlock<B>>,
    stage3: Vec<IrBlock<B>>,
    stage4: Vec<IrBlock<B>>,
}

impl<B: Backend> IrResNet<B> {
    /// `units` is the block count per stage (e.g. [3, 4, 14, 3] for
    /// the 50-layer preset); `se` selects squeeze-excite blocks.
    pub fn new(units: [usize; 4], se: bool, device: &B::Device) -> Self {
        let mut stages: Vec<Vec<IrBlock<B>>> = Vec::with_capacity(4);
        let mut in_channels = STEM_CHANNELS;

        for (stage_idx, &out_channels) in STAGE_CHANNELS.iter().enumerate() {
            let mut blocks = Vec::with_capacity(units[stage_idx]);
            for block_idx in 0..units[stage_idx] {
                let stride = if block_idx == 0 { 2 } else { 1 };
                blocks.push(IrBlock::new(in_channels, out_channels, stride, se, device));
                in_channels = out_channels;
            }
            stages.push(blocks);
        }

        let stage4 = stages.pop().unwrap();
        let stage3 = stages.pop().unwrap();
        let stage2 = stages.pop().unwrap();
        let stage1 = stages.pop().unwrap();

        Self {
            stem_conv: init::conv2d(
                [3, STEM_CHANNELS],
                [3, 3],
                [1, 1],
                PaddingConfig2d::Explicit(1, 1),
                device,
            ),
            stem_norm: BatchNormConfig::new(STEM_CHANNELS).init(device),
            stem_prelu: PReluConfig::new()
                .with_num_parameters(STEM_CHANNELS)
                .init(device),
            stage1,
            stage2,
            stage3,
            stage4,
        }
    }

    /// Final 512-channel feature map.
    pub fn forward(&self, images: Tensor<B, 4>) -> Tensor<B, 4> {
        let [_, _, _, _, features] = self.forward_stages(images);
        features
    }

    /// Every intermediate activation: [stem, stage1..4]. The last
    /// entry is the feature map the attention module consumes.
    pub fn forward_stages(&self, images: Tensor<B, 4>) -> [Tensor<B, 4>; 5] {
        let mut x = self.stem_conv.forward(images);
        x = self.stem_norm.forward(x);
        x = self.stem_prelu.forward(x);
        let stem = x.clone();

        let mut outputs = Vec::with_capacity(4);
        for stage in [&self.stage1, &self.stage2, &self.stage3, &self.stage4] {
            for block in stage {
                x = block.forward(x);
            }
            outputs.push(x.clone());
        }

        let stage4 = outputs.pop().unwrap();
        let stage3 = outputs.pop().unwrap();
        let stage2 = outputs.pop().unwrap();
        let stage1 = outputs.pop().unwrap();
        [stem, stage1, stage2, stage3, stage4]
    }
}

// ─── Unit Tests ───────────────────────────────────────────────────────────────
#[cfg(test)]
mod tests {
    use super::*;
    use burn::tensor::Distribution;

    type TestBackend = burn::backend::NdArray;

    #[test]
    fn ir_block_preserves_shape_at_stride_one() {
        let device = Default::default();
        let block = IrBlock::<TestBackend>::new(16, 16, 1, false, &device);

        let x = Tensor::random([2, 16, 8, 8], Distribution::Default, &device);
        assert_eq!(block.forward(x).dims(), [2, 16, 8, 8]);
    }

    #[test]
    fn ir_block_downsamples_and_widens() {
        let device = Default::default();
        let block = IrBlock::<TestBackend>::new(16, 32, 2, false, &device);

        let x = Tensor::random([1, 16, 8, 8], Distribution::Default, &device);
        assert_eq!(block.forward(x).dims(), [1, 32, 4, 4]);
    }

    #[test]
    fn se_block_matches_plain_block_shape() {
        let device = Default::default();
        let block = IrBlock::<TestBackend>::new(16, 16, 2, true, &device);

        let x = Tensor::random([1, 16, 8, 8], Distribution::Default, &device);
        assert_eq!(block.forward(x).dims(), [1, 16, 4, 4]);
    }

    #[test]
    fn backbone_stride_is_sixteen() {
        let device = Default::default();
        // Minimal one-block stages: the stride comes from the stage
        // structure, not the block count
        let net = IrResNet::<TestBackend>::new([1, 1, 1, 1], false, &device);

        let x = Tensor::random([1, 3, 32, 32], Distribution::Default, &device);
        let stages = net.forward_stages(x);

        assert_eq!(stages[0].dims(), [1, 64, 32, 32]);
        assert_eq!(stages[1].dims(), [1, 64, 16, 16]);
        assert_eq!(stages[2].dims(), [1, 128, 8, 8]);
        assert_eq!(stages[3].dims(), [1, 256, 4, 4]);
        assert_eq!(stages[4].dims(), [1, 512, 2, 2]);
    }
}
