// ============================================================
// Layer 4 — Face Batcher
// ============================================================
// Implements Burn's Batcher trait to convert a Vec<FaceSample>
// into GPU-ready tensors.
//
// How batching works here:
//   Input:  Vec of N FaceSamples, each with a 3·S·S pixel buffer
//   Output: FaceBatch with an image tensor of shape [N, 3, S, S]
//           and three Int label tensors of shape [N]
//
// All pixel buffers already have identical length (the
// preprocessor resizes every image), so batching is a plain
// flatten-then-reshape with no dynamic padding.

use burn::{
    data::dataloader::batcher::Batcher,
    prelude::*,
};

use crate::data::dataset::FaceSample;

// ─── FaceBatch ────────────────────────────────────────────────────────────────
/// A batch of face samples ready for the model forward pass.
/// B is the Burn Backend (e.g. Wgpu, NdArray) — generic so the
/// same batcher works on any device.
#[derive(Debug, Clone)]
pub struct FaceBatch<B: Backend> {
    /// Normalised images — shape: [batch_size, 3, size, size]
    pub images: Tensor<B, 4>,

    /// Identity indices — shape: [batch_size]
    pub identities: Tensor<B, 1, Int>,

    /// Integer ages — shape: [batch_size]
    pub ages: Tensor<B, 1, Int>,

    /// Coarse age buckets — shape: [batch_size]
    pub age_groups: Tensor<B, 1, Int>,
}

// ─── FaceBatcher ──────────────────────────────────────────────────────────────
/// Holds the target device so tensors are created where the
/// model runs, plus the image side length for the reshape.
#[derive(Clone, Debug)]
pub struct FaceBatcher<B: Backend> {
    pub device:     B::Device,
    pub input_size: usize,
}

impl<B: Backend> FaceBatcher<B> {
    pub fn new(device: B::Device, input_size: usize) -> Self {
        Self { device, input_size }
    }
}

impl<B: Backend> Batcher<B, FaceSample, FaceBatch<B>> for FaceBatcher<B> {
    fn batch(&self, items: Vec<FaceSample>, _device: &B::Device) -> FaceBatch<B> {
        let batch_size = items.len();
        let side       = self.input_size;

        // ── Flatten pixel buffers ─────────────────────────────────────────────
        // Vec<Vec<f32>> → one long Vec<f32>, then reshape to NCHW
        let pixel_flat: Vec<f32> = items
            .iter()
            .flat_map(|s| s.pixels.iter().copied())
            .collect();

        // ── Collect labels ────────────────────────────────────────────────────
        let ids: Vec<i32> = items.iter().map(|s| s.identity as i32).collect();
        let ages: Vec<i32> = items.iter().map(|s| s.age as i32).collect();
        let groups: Vec<i32> = items.iter().map(|s| s.age_group as i32).collect();

        // ── Create tensors ────────────────────────────────────────────────────
        let images = Tensor::<B, 1>::from_floats(pixel_flat.as_slice(), &self.device)
            .reshape([batch_size, 3, side, side]);

        let identities = Tensor::<B, 1, Int>::from_ints(ids.as_slice(), &self.device);
        let ages       = Tensor::<B, 1, Int>::from_ints(ages.as_slice(), &self.device);
        let age_groups = Tensor::<B, 1, Int>::from_ints(groups.as_slice(), &self.device);

        FaceBatch {
            images,
            identities,
            ages,
            age_groups,
        }
    }
}

// ─── Unit Tests ───────────────────────────────────────────────────────────────
#[cfg(test)]
mod tests {
    use super::*;

    type TestBackend = burn::backend::NdArray;

    fn sample(identity: usize, age: usize, fill: f32, side: usize) -> FaceSample {
        FaceSample {
            pixels: vec![fill; 3 * side * side],
            identity,
            age,
            age_group: age / 10,
        }
    }

    #[test]
    fn batch_shapes() {
        let device = Default::default();
        let batcher = FaceBatcher::<TestBackend>::new(device, 4);

        let batch = batcher.batch(vec![sample(0, 23, 0.1, 4), sample(1, 54, -0.2, 4)], &Default::default());

        assert_eq!(batch.images.dims(), [2, 3, 4, 4]);
        assert_eq!(batch.identities.dims(), [2]);
        assert_eq!(batch.ages.dims(), [2]);
        assert_eq!(batch.age_groups.dims(), [2]);
    }

    #[test]
    fn labels_survive_batching() {
        let device = Default::default();
        let batcher = FaceBatcher::<TestBackend>::new(device, 2);

        let batch = batcher.batch(vec![sample(3, 41, 0.0, 2), sample(7, 68, 0.0, 2)], &Default::default());

        // NdArray's Int element is i64
        let ids = batch.identities.into_data().to_vec::<i64>().unwrap();
        let groups = batch.age_groups.into_data().to_vec::<i64>().unwrap();
        assert_eq!(ids, vec![3, 7]);
        assert_eq!(groups, vec![4, 6]);
    }
}
