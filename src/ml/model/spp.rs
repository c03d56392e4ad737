// ============================================================
// Layer 5 — Spatial Pyramid Pooling
// ============================================================
// Reduces a feature map to a fixed-length descriptor by pooling
// it to several small grids (e.g. 1x1, 2x2, 3x3), flattening
// each grid and concatenating. The output length depends only
// on the channel count and the configured sizes, never on the
// input's spatial extent.
//
// Reference: He et al. (2015) Spatial Pyramid Pooling

use std::str::FromStr;

use burn::module::{Ignored, Module};
use burn::tensor::backend::Backend;
use burn::tensor::Tensor;
use serde::{Deserialize, Serialize};

/// How each pyramid cell reduces its input window.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PoolMode {
    Average,
    Max,
}

impl FromStr for PoolMode {
    type Err = anyhow::Error;

    /// Accepts `avg`/`average` and `max`. Anything else is rejected
    /// here, before a pooling module can ever be built with it.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "avg" | "average" => Ok(PoolMode::Average),
            "max" => Ok(PoolMode::Max),
            other => Err(anyhow::anyhow!("unsupported pooling mode '{other}'")),
        }
    }
}

/// Pools `x` down to an `out`×`out` grid with PyTorch adaptive
/// semantics: cell i covers input rows floor(i·H/out) to
/// ceil((i+1)·H/out), so edge cells may span unequal extents
/// when the input does not divide evenly.
pub(crate) fn adaptive_pool2d<B: Backend>(
    x: Tensor<B, 4>,
    out: usize,
    mode: PoolMode,
) -> Tensor<B, 4> {
    let [n, c, h, w] = x.dims();

    let mut rows = Vec::with_capacity(out);
    for i in 0..out {
        let (h0, h1) = cell_bounds(h, out, i);
        let mut cells = Vec::with_capacity(out);
        for j in 0..out {
            let (w0, w1) = cell_bounds(w, out, j);
            let window = x.clone().slice([0..n, 0..c, h0..h1, w0..w1]);
            let cell = match mode {
                PoolMode::Average => window.mean_dim(3).mean_dim(2),
                PoolMode::Max     => window.max_dim(3).max_dim(2),
            };
            cells.push(cell);
        }
        rows.push(Tensor::cat(cells, 3));
    }
    Tensor::cat(rows, 2)
}

fn cell_bounds(extent: usize, cells: usize, index: usize) -> (usize, usize) {
    let start = index * extent / cells;
    let end = ((index + 1) * extent).div_ceil(cells);
    (start, end)
}

/// Spatial pyramid pooling over a fixed ladder of grid sizes.
///
/// `forward` maps (N, C, H, W) to (N, K, 1, 1) with
/// K = C · Σ sizeᵢ², ready for 1×1 convolutions downstream.
#[derive(Module, Debug, Clone)]
pub struct SpatialPyramidPooling {
    mode:  Ignored<PoolMode>,
    sizes: Ignored<Vec<usize>>,
}

impl SpatialPyramidPooling {
    pub fn new(mode: PoolMode, sizes: impl Into<Vec<usize>>) -> Self {
        Self {
            mode:  Ignored(mode),
            sizes: Ignored(sizes.into()),
        }
    }

    /// Descriptor length for a given channel count.
    pub fn output_len(&self, channels: usize) -> usize {
        channels * self.sizes.0.iter().map(|s| s * s).sum::<usize>()
    }

    pub fn forward<B: Backend>(&self, x: Tensor<B, 4>) -> Tensor<B, 4> {
        let [batch, channels, _, _] = x.dims();

        let pooled: Vec<Tensor<B, 2>> = self
            .sizes
            .0
            .iter()
            .map(|&size| {
                adaptive_pool2d(x.clone(), size, self.mode.0)
                    .reshape([batch, channels * size * size])
            })
            .collect();

        let k = self.output_len(channels);
        Tensor::cat(pooled, 1).reshape([batch, k, 1, 1])
    }
}

// ─── Unit Tests ───────────────────────────────────────────────────────────────
#[cfg(test)]
mod tests {
    use super::*;

    type TestBackend = burn::backend::NdArray;

    #[test]
    fn descriptor_width_is_channels_times_sum_of_squares() {
        let device = Default::default();
        let spp = SpatialPyramidPooling::new(PoolMode::Average, [1, 2, 3]);

        // C=512, sizes (1,2,3) -> 512 * 14 = 7168
        assert_eq!(spp.output_len(512), 7168);

        let x = Tensor::<TestBackend, 4>::ones([2, 8, 6, 6], &device);
        let out = spp.forward(x);
        assert_eq!(out.dims(), [2, 8 * 14, 1, 1]);
    }

    #[test]
    fn output_is_independent_of_input_spatial_size() {
        let device = Default::default();
        let spp = SpatialPyramidPooling::new(PoolMode::Max, [1, 2]);

        let small = spp.forward(Tensor::<TestBackend, 4>::ones([1, 4, 5, 5], &device));
        let large = spp.forward(Tensor::<TestBackend, 4>::ones([1, 4, 17, 17], &device));
        assert_eq!(small.dims(), large.dims());
        assert_eq!(small.dims(), [1, 20, 1, 1]);
    }

    #[test]
    fn adaptive_cells_partition_uneven_extents() {
        // 5 rows into 3 cells: bounds (0,2), (1,4), (3,5) — every row covered
        assert_eq!(cell_bounds(5, 3, 0), (0, 2));
        assert_eq!(cell_bounds(5, 3, 1), (1, 4));
        assert_eq!(cell_bounds(5, 3, 2), (3, 5));
        // Even split stays exact
        assert_eq!(cell_bounds(6, 3, 1), (2, 4));
    }

    #[test]
    fn average_pool_of_constant_input_is_constant() {
        let device = Default::default();
        let x = Tensor::<TestBackend, 4>::ones([1, 2, 7, 7], &device).mul_scalar(3.0);
        let pooled = adaptive_pool2d(x, 2, PoolMode::Average);

        assert_eq!(pooled.dims(), [1, 2, 2, 2]);
        let values = pooled.into_data().to_vec::<f32>().unwrap();
        assert!(values.iter().all(|v| (v - 3.0).abs() < 1e-6));
    }

    #[test]
    fn unsupported_mode_fails_at_parse_time() {
        assert!("avg".parse::<PoolMode>().is_ok());
        assert!("max".parse::<PoolMode>().is_ok());
        let err = "bilinear".parse::<PoolMode>().unwrap_err();
        assert!(err.to_string().contains("bilinear"));
    }
}
