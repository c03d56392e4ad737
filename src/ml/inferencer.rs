// ============================================================
// Layer 5 — Inferencer
// ============================================================
// Loads a trained checkpoint and serves the two heads:
//
//   estimate — expected age (softmax expectation over the 101
//              year classes) plus the coarse age bucket
//   verify   — cosine similarity between two face embeddings
//
// The backbone variant is rebuilt from the saved train config,
// so the checkpoint record always matches the topology.
//
// Reference: Rothe et al. (2018) DEX (expected-value age)

use anyhow::{Context, Result};
use burn::prelude::*;
use std::path::Path;

use crate::data::preprocessor::ImagePreprocessor;
use crate::infra::checkpoint::CheckpointManager;
use crate::ml::model::{AifrForward, BackbonePreset, DenseAifr, IrAifr};
use crate::ml::trainer::expected_age;

type InferBackend = burn::backend::Wgpu;

/// The checkpointed model, whichever variant it was trained as.
/// Dispatch happens in the small methods below; callers never
/// see the variant.
enum LoadedModel {
    Ir(IrAifr<InferBackend>),
    Dense(DenseAifr<InferBackend>),
}

impl LoadedModel {
    fn embed(&self, images: Tensor<InferBackend, 4>) -> Tensor<InferBackend, 2> {
        match self {
            LoadedModel::Ir(m) => m.forward(images),
            LoadedModel::Dense(m) => m.forward(images),
        }
    }

    /// (age logits, group logits) for a batch of images.
    fn age_outputs(
        &self,
        images: Tensor<InferBackend, 4>,
    ) -> (Tensor<InferBackend, 2>, Tensor<InferBackend, 2>) {
        match self {
            LoadedModel::Ir(m) => {
                let (_, _, age) = m.forward_with_age(images);
                m.estimate_age(age)
            }
            LoadedModel::Dense(m) => {
                let (_, _, age) = m.forward_with_age(images);
                m.estimate_age(age)
            }
        }
    }
}

/// One age estimate for a single image.
#[derive(Debug, Clone, Copy)]
pub struct AgeEstimate {
    /// Softmax-expectation age in years
    pub age: f32,
    /// Coarse bucket index, argmax over the group logits
    pub group: usize,
}

pub struct Inferencer {
    model:        LoadedModel,
    preprocessor: ImagePreprocessor,
    input_size:   usize,
    device:       burn::backend::wgpu::WgpuDevice,
}

impl Inferencer {
    pub fn from_checkpoint(ckpt_manager: &CheckpointManager) -> Result<Self> {
        let device = burn::backend::wgpu::WgpuDevice::default();
        let cfg = ckpt_manager.load_config()?;
        let model_cfg = cfg.model_config();

        let model = match model_cfg.validate()? {
            BackbonePreset::DenseNet => {
                let model = model_cfg.init_dense::<InferBackend>(&device)?;
                LoadedModel::Dense(ckpt_manager.load_model(model, &device)?)
            }
            _ => {
                let model = model_cfg.init_ir::<InferBackend>(&device)?;
                LoadedModel::Ir(ckpt_manager.load_model(model, &device)?)
            }
        };
        tracing::info!("Model loaded from checkpoint (backbone '{}')", cfg.backbone);

        Ok(Self {
            model,
            preprocessor: ImagePreprocessor::new(cfg.input_size),
            input_size: cfg.input_size,
            device,
        })
    }

    /// Estimate the subject's age from one image.
    pub fn estimate(&self, image: &Path) -> Result<AgeEstimate> {
        let input = self.load_tensor(image)?;

        let (age_logits, group_logits) = self.model.age_outputs(input);
        let age = expected_age(age_logits).into_scalar().elem::<f32>();
        let group = group_logits
            .argmax(1)
            .flatten::<1>(0, 1)
            .into_scalar()
            .elem::<i64>() as usize;

        Ok(AgeEstimate { age, group })
    }

    /// Cosine similarity between the embeddings of two face images.
    /// Close to 1.0 means the same person.
    pub fn verify(&self, image_a: &Path, image_b: &Path) -> Result<f32> {
        let emb_a = self.model.embed(self.load_tensor(image_a)?);
        let emb_b = self.model.embed(self.load_tensor(image_b)?);

        let dot = (emb_a.clone() * emb_b.clone()).sum().into_scalar().elem::<f32>();
        let norm_a = (emb_a.clone() * emb_a).sum().into_scalar().elem::<f32>().sqrt();
        let norm_b = (emb_b.clone() * emb_b).sum().into_scalar().elem::<f32>().sqrt();

        Ok(dot / (norm_a * norm_b).max(f32::EPSILON))
    }

    fn load_tensor(&self, image: &Path) -> Result<Tensor<InferBackend, 4>> {
        let pixels = self
            .preprocessor
            .load(image)
            .with_context(|| format!("Cannot preprocess '{}'", image.display()))?;

        let side = self.input_size;
        Ok(Tensor::<InferBackend, 1>::from_floats(pixels.as_slice(), &self.device)
            .reshape([1, 3, side, side]))
    }
}
