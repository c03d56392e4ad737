// ============================================================
// Layer 5 — Weight Initialization Policy
// ============================================================
// Single source of truth for how every learned layer in the
// model starts out:
//
//   - convolutions and linear layers: Glorot/Xavier uniform
//   - linear biases: zero
//   - batch norm: gamma = 1, beta = 0 (Burn's construction
//     default, relied on here and asserted in tests)
//
// Every layer in the model tree is built through these helpers,
// so the policy is applied exactly once per construction and a
// new layer kind only needs a new entry here — no type-matching
// sweep over the finished module tree.

use burn::nn::conv::{Conv2d, Conv2dConfig};
use burn::nn::{Initializer, Linear, LinearConfig, PaddingConfig2d};
use burn::tensor::backend::Backend;

/// Capability tag for a learned layer, used to look up its
/// initializer. Norm layers are absent on purpose: their 1/0
/// affine start is not sampled.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LayerKind {
    Convolution,
    Linear,
}

/// The initializer for a given layer kind.
pub fn initializer(kind: LayerKind) -> Initializer {
    match kind {
        LayerKind::Convolution | LayerKind::Linear => Initializer::XavierUniform { gain: 1.0 },
    }
}

/// Build a bias-free 2D convolution with policy initialization.
/// None of the model's convolutions carry a bias; the batch norm
/// that follows each one owns the shift.
pub fn conv2d<B: Backend>(
    channels: [usize; 2],
    kernel:   [usize; 2],
    stride:   [usize; 2],
    padding:  PaddingConfig2d,
    device:   &B::Device,
) -> Conv2d<B> {
    Conv2dConfig::new(channels, kernel)
        .with_stride(stride)
        .with_padding(padding)
        .with_bias(false)
        .with_initializer(initializer(LayerKind::Convolution))
        .init(device)
}

/// Build a linear layer: Glorot uniform weight, zero bias.
pub fn linear<B: Backend>(d_input: usize, d_output: usize, device: &B::Device) -> Linear<B> {
    let mut layer = LinearConfig::new(d_input, d_output)
        .with_initializer(initializer(LayerKind::Linear))
        .init(device);
    layer.bias = layer.bias.map(|bias| bias.map(|t| t.zeros_like()));
    layer
}

// ─── Unit Tests ───────────────────────────────────────────────────────────────
#[cfg(test)]
mod tests {
    use super::*;

    type TestBackend = burn::backend::NdArray;

    /// Glorot uniform bound for a layer with the given fan-in/out.
    fn xavier_bound(fan_in: usize, fan_out: usize) -> f32 {
        (6.0 / (fan_in + fan_out) as f32).sqrt()
    }

    #[test]
    fn linear_weights_within_xavier_bounds_and_bias_zero() {
        let device = Default::default();
        let layer = linear::<TestBackend>(64, 32, &device);

        let bound = xavier_bound(64, 32);
        let weights = layer.weight.val().into_data().to_vec::<f32>().unwrap();
        assert!(weights.iter().all(|w| w.abs() <= bound));
        // A degenerate all-zero draw would mean the initializer never ran
        assert!(weights.iter().any(|w| w.abs() > 0.0));

        let bias = layer.bias.unwrap().val().into_data().to_vec::<f32>().unwrap();
        assert!(bias.iter().all(|b| *b == 0.0));
    }

    #[test]
    fn conv_weights_within_xavier_bounds_and_no_bias() {
        let device = Default::default();
        let conv = conv2d::<TestBackend>(
            [8, 16],
            [3, 3],
            [1, 1],
            PaddingConfig2d::Explicit(1, 1),
            &device,
        );

        // Conv fans count the kernel receptive field
        let bound = xavier_bound(8 * 9, 16 * 9);
        let weights = conv.weight.val().into_data().to_vec::<f32>().unwrap();
        assert!(weights.iter().all(|w| w.abs() <= bound));
        assert!(conv.bias.is_none());
    }

    #[test]
    fn batch_norm_starts_at_identity_affine() {
        use burn::nn::BatchNormConfig;

        let device = Default::default();
        let bn = BatchNormConfig::new(8).init::<TestBackend>(&device);

        let gamma = bn.gamma.val().into_data().to_vec::<f32>().unwrap();
        let beta = bn.beta.val().into_data().to_vec::<f32>().unwrap();
        assert!(gamma.iter().all(|g| *g == 1.0));
        assert!(beta.iter().all(|b| *b == 0.0));
    }

    #[test]
    fn reinitialization_samples_fresh_weights() {
        let device = Default::default();
        let a = linear::<TestBackend>(32, 32, &device);
        let b = linear::<TestBackend>(32, 32, &device);

        let wa = a.weight.val().into_data().to_vec::<f32>().unwrap();
        let wb = b.weight.val().into_data().to_vec::<f32>().unwrap();
        assert_ne!(wa, wb);
    }
}
