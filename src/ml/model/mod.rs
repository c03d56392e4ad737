// ============================================================
// Layer 5 — Model Architecture
// ============================================================
// The face model jointly learns who a face belongs to and how
// old it looks. A backbone turns the image into one feature
// map; the attention module splits that map into an identity
// component and an age component; the embedding head reads the
// identity part and the age head reads the age part.
//
//   image → backbone → feature ─→ attention ─→ (identity, age)
//                                               │          │
//                                     embedding head   age head
//
// Two interchangeable backbones exist behind the AifrForward
// trait — a residual one (512 channels, stride 16) and a dense
// one (1024 channels, stride 32) — selected by preset name at
// construction. Every configuration problem (unknown preset,
// incompatible input size, mismatched head width) is rejected
// here, before any tensor work starts.

/// Channel and spatial gating that splits a feature map
pub mod attention;

/// DenseNet-121 feature extractor
pub mod densenet;

/// Embedding and age-estimation output heads
pub mod heads;

/// Weight initialization policy
pub mod init;

/// Improved-residual face backbone
pub mod resnet;

/// Spatial pyramid pooling
pub mod spp;

use anyhow::{bail, Result};
use burn::module::Module;
use burn::nn::Linear;
use burn::tensor::backend::Backend;
use burn::tensor::Tensor;
use serde::{Deserialize, Serialize};

use crate::domain::face::AGE_CLASSES;
use attention::{AttentionModule, AttentionModuleConfig};
use densenet::{DenseNetFeatures, DENSE_FEATURE_CHANNELS};
use heads::{AgeEstimationConfig, AgeEstimationModule, EmbeddingHead, EmbeddingHeadConfig};
use resnet::IrResNet;

pub const EMBEDDING_SIZE: usize = 512;

// ─── Backbone presets ─────────────────────────────────────────────────────────

/// The recognised backbone architectures. Residual presets differ
/// only in per-stage block counts (and squeeze-excite for irse101).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BackbonePreset {
    Ir34,
    Ir50,
    Ir64,
    Ir101,
    IrSe101,
    DenseNet,
}

impl BackbonePreset {
    /// Resolve a preset by name; unknown names are a configuration
    /// error raised before any model is built.
    pub fn parse(name: &str) -> Result<Self> {
        match name {
            "ir34" => Ok(Self::Ir34),
            "ir50" => Ok(Self::Ir50),
            "ir64" => Ok(Self::Ir64),
            "ir101" => Ok(Self::Ir101),
            "irse101" => Ok(Self::IrSe101),
            "densenet" => Ok(Self::DenseNet),
            other => bail!(
                "unknown backbone preset '{other}' \
                 (expected one of: ir34, ir50, ir64, ir101, irse101, densenet)"
            ),
        }
    }

    /// Residual block counts per stage; None for the dense variant.
    pub fn ir_units(&self) -> Option<[usize; 4]> {
        match self {
            Self::Ir34 => Some([3, 4, 6, 3]),
            Self::Ir50 => Some([3, 4, 14, 3]),
            Self::Ir64 => Some([3, 4, 10, 3]),
            Self::Ir101 | Self::IrSe101 => Some([3, 13, 30, 3]),
            Self::DenseNet => None,
        }
    }

    pub fn uses_squeeze_excite(&self) -> bool {
        matches!(self, Self::IrSe101)
    }

    /// Channel count of the feature map this backbone emits.
    pub fn feature_channels(&self) -> usize {
        match self {
            Self::DenseNet => DENSE_FEATURE_CHANNELS,
            _ => 512,
        }
    }

    /// Total spatial downscale between image and feature map.
    pub fn feature_stride(&self) -> usize {
        match self {
            Self::DenseNet => 32,
            _ => 16,
        }
    }
}

// ─── Model configuration ──────────────────────────────────────────────────────

/// Everything needed to (re)build a model. Serialised alongside
/// checkpoints so inference can reconstruct the exact topology.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ModelConfig {
    /// Backbone preset name, e.g. "ir50" or "densenet"
    pub backbone: String,
    /// Image side length; the flatten layers are sized for it
    pub input_size: usize,
    /// Number of coarse age buckets
    pub age_group: usize,
    /// Leaky rectifier in the age head (adversarial training mode)
    pub dist: bool,
    /// Embedding-head dropout; None picks the per-variant default
    /// (0.5 residual, 0.4 dense)
    pub drop_rate: Option<f64>,
    /// Age-head feature width override; None follows the backbone.
    /// Kept explicit because the age head is not shape-polymorphic:
    /// a 1024-wide head cannot read a 512-channel feature map.
    pub age_channels: Option<usize>,
    /// Identity count for the training classifier head; None builds
    /// an inference-only model without one
    pub num_identities: Option<usize>,
}

impl Default for ModelConfig {
    fn default() -> Self {
        Self {
            backbone:       "ir50".to_string(),
            input_size:     112,
            age_group:      7,
            dist:           false,
            drop_rate:      None,
            age_channels:   None,
            num_identities: None,
        }
    }
}

impl ModelConfig {
    pub fn preset(&self) -> Result<BackbonePreset> {
        BackbonePreset::parse(&self.backbone)
    }

    /// Reject every invalid combination before any tensor work.
    /// Error messages name the offending parameter.
    pub fn validate(&self) -> Result<BackbonePreset> {
        let preset = self.preset()?;
        let stride = preset.feature_stride();

        if self.input_size == 0 || self.input_size % stride != 0 {
            bail!(
                "input_size {} is not a positive multiple of {} (backbone '{}')",
                self.input_size,
                stride,
                self.backbone,
            );
        }
        if self.age_group == 0 || self.age_group > AGE_CLASSES {
            bail!(
                "age_group {} must be between 1 and {}",
                self.age_group,
                AGE_CLASSES,
            );
        }
        if let Some(rate) = self.drop_rate {
            if !(0.0..1.0).contains(&rate) {
                bail!("drop_rate {rate} must lie in [0, 1)");
            }
        }
        if let Some(channels) = self.age_channels {
            if channels != preset.feature_channels() {
                bail!(
                    "age_channels {} does not match the {}-channel feature map of backbone '{}'",
                    channels,
                    preset.feature_channels(),
                    self.backbone,
                );
            }
        }
        if self.num_identities == Some(0) {
            bail!("num_identities must be positive when set");
        }

        Ok(preset)
    }

    /// Build the residual-backbone model. Fails on any configuration
    /// problem, including asking for the dense preset.
    pub fn init_ir<B: Backend>(&self, device: &B::Device) -> Result<IrAifr<B>> {
        let preset = self.validate()?;
        let Some(units) = preset.ir_units() else {
            bail!("backbone '{}' is not a residual preset", self.backbone);
        };

        let channels = preset.feature_channels();
        let spatial = self.input_size / preset.feature_stride();

        Ok(IrAifr {
            backbone: IrResNet::new(units, preset.uses_squeeze_excite(), device),
            attention: AttentionModuleConfig::new(channels).init(device),
            embedding: EmbeddingHeadConfig::new(channels, spatial)
                .with_drop_rate(self.drop_rate.unwrap_or(0.5))
                .init(device),
            age_head: AgeEstimationConfig::new(channels, spatial, self.age_group)
                .with_dist(self.dist)
                .init(device),
            id_head: self
                .num_identities
                .map(|n| init::linear(EMBEDDING_SIZE, n, device)),
        })
    }

    /// Build the dense-backbone model.
    pub fn init_dense<B: Backend>(&self, device: &B::Device) -> Result<DenseAifr<B>> {
        let preset = self.validate()?;
        if preset != BackbonePreset::DenseNet {
            bail!("backbone '{}' is not the dense preset", self.backbone);
        }

        let channels = preset.feature_channels();
        let spatial = self.input_size / preset.feature_stride();

        Ok(DenseAifr {
            backbone: DenseNetFeatures::new(device),
            attention: AttentionModuleConfig::new(channels).init(device),
            embedding: EmbeddingHeadConfig::new(channels, spatial)
                .with_drop_rate(self.drop_rate.unwrap_or(0.4))
                .init(device),
            age_head: AgeEstimationConfig::new(channels, spatial, self.age_group)
                .with_dist(self.dist)
                .init(device),
            id_head: self
                .num_identities
                .map(|n| init::linear(EMBEDDING_SIZE, n, device)),
        })
    }
}

// ─── Forward surface ──────────────────────────────────────────────────────────

/// Every intermediate activation of one forward pass. Stage slots
/// are optional on purpose: the residual backbone fills all of
/// them, the dense backbone only exposes its final feature map,
/// and that asymmetry is part of the contract rather than a
/// silent omission.
#[derive(Debug, Clone)]
pub struct StageActivations<B: Backend> {
    pub stem:     Option<Tensor<B, 4>>,
    pub stage1:   Option<Tensor<B, 4>>,
    pub stage2:   Option<Tensor<B, 4>>,
    pub stage3:   Option<Tensor<B, 4>>,
    pub feature:  Tensor<B, 4>,
    pub identity: Tensor<B, 4>,
    pub age:      Tensor<B, 4>,
}

/// The one capability both backbone variants implement. The
/// training loop and the inference engine only ever talk to this
/// trait; which concrete model sits behind it is decided once,
/// by preset, at construction.
pub trait AifrForward<B: Backend> {
    /// Recognition embedding, shape (N, 512).
    fn forward(&self, images: Tensor<B, 4>) -> Tensor<B, 2>;

    /// (embedding, identity tensor, age tensor); the two tensors are
    /// shape-identical to the backbone feature map.
    fn forward_with_age(
        &self,
        images: Tensor<B, 4>,
    ) -> (Tensor<B, 2>, Tensor<B, 4>, Tensor<B, 4>);

    /// Diagnostic pass returning every available activation.
    fn forward_shortcuts(&self, images: Tensor<B, 4>) -> StageActivations<B>;

    /// (age logits (N, 101), group logits (N, age_group)) from an
    /// age tensor produced by this same model.
    fn estimate_age(&self, age: Tensor<B, 4>) -> (Tensor<B, 2>, Tensor<B, 2>);

    /// Identity-classification logits; None when the model was built
    /// without a training head.
    fn identity_logits(&self, embedding: Tensor<B, 2>) -> Option<Tensor<B, 2>>;
}

// ─── Residual variant ─────────────────────────────────────────────────────────

#[derive(Module, Debug)]
pub struct IrAifr<B: Backend> {
    backbone: IrResNet<B>,
    attention: AttentionModule<B>,
    embedding: EmbeddingHead<B>,
    age_head: AgeEstimationModule<B>,
    id_head: Option<Linear<B>>,
}

impl<B: Backend> AifrForward<B> for IrAifr<B> {
    fn forward(&self, images: Tensor<B, 4>) -> Tensor<B, 2> {
        let (embedding, _, _) = self.forward_with_age(images);
        embedding
    }

    fn forward_with_age(
        &self,
        images: Tensor<B, 4>,
    ) -> (Tensor<B, 2>, Tensor<B, 4>, Tensor<B, 4>) {
        let feature = self.backbone.forward(images);
        let (identity, age) = self.attention.forward(feature);
        let embedding = self.embedding.forward(identity.clone());
        (embedding, identity, age)
    }

    fn forward_shortcuts(&self, images: Tensor<B, 4>) -> StageActivations<B> {
        let [stem, stage1, stage2, stage3, feature] = self.backbone.forward_stages(images);
        let (identity, age) = self.attention.forward(feature.clone());
        StageActivations {
            stem: Some(stem),
            stage1: Some(stage1),
            stage2: Some(stage2),
            stage3: Some(stage3),
            feature,
            identity,
            age,
        }
    }

    fn estimate_age(&self, age: Tensor<B, 4>) -> (Tensor<B, 2>, Tensor<B, 2>) {
        self.age_head.forward(age)
    }

    fn identity_logits(&self, embedding: Tensor<B, 2>) -> Option<Tensor<B, 2>> {
        self.id_head.as_ref().map(|head| head.forward(embedding))
    }
}

// ─── Dense variant ────────────────────────────────────────────────────────────

#[derive(Module, Debug)]
pub struct DenseAifr<B: Backend> {
    backbone: DenseNetFeatures<B>,
    attention: AttentionModule<B>,
    embedding: EmbeddingHead<B>,
    age_head: AgeEstimationModule<B>,
    id_head: Option<Linear<B>>,
}

impl<B: Backend> AifrForward<B> for DenseAifr<B> {
    fn forward(&self, images: Tensor<B, 4>) -> Tensor<B, 2> {
        let (embedding, _, _) = self.forward_with_age(images);
        embedding
    }

    fn forward_with_age(
        &self,
        images: Tensor<B, 4>,
    ) -> (Tensor<B, 2>, Tensor<B, 4>, Tensor<B, 4>) {
        let feature = self.backbone.forward(images);
        let (identity, age) = self.attention.forward(feature);
        let embedding = self.embedding.forward(identity.clone());
        (embedding, identity, age)
    }

    fn forward_shortcuts(&self, images: Tensor<B, 4>) -> StageActivations<B> {
        // The dense blocks are not stage-addressable; only the final
        // feature map and the split tensors are available.
        let feature = self.backbone.forward(images);
        let (identity, age) = self.attention.forward(feature.clone());
        StageActivations {
            stem: None,
            stage1: None,
            stage2: None,
            stage3: None,
            feature,
            identity,
            age,
        }
    }

    fn estimate_age(&self, age: Tensor<B, 4>) -> (Tensor<B, 2>, Tensor<B, 2>) {
        self.age_head.forward(age)
    }

    fn identity_logits(&self, embedding: Tensor<B, 2>) -> Option<Tensor<B, 2>> {
        self.id_head.as_ref().map(|head| head.forward(embedding))
    }
}

// ─── Unit Tests ───────────────────────────────────────────────────────────────
#[cfg(test)]
mod tests {
    use super::*;
    use burn::tensor::Distribution;
    use burn::prelude::ElementConversion;

    type TestBackend = burn::backend::NdArray;

    fn small_config(backbone: &str, input_size: usize) -> ModelConfig {
        ModelConfig {
            backbone: backbone.to_string(),
            input_size,
            ..ModelConfig::default()
        }
    }

    #[test]
    fn unknown_preset_is_rejected_by_name() {
        let err = small_config("vgg16", 112).validate().unwrap_err();
        assert!(err.to_string().contains("vgg16"));
    }

    #[test]
    fn input_size_must_match_backbone_stride() {
        // 100 is not a multiple of 16
        let err = small_config("ir50", 100).validate().unwrap_err();
        assert!(err.to_string().contains("input_size"));

        // 112 divides by 16 but not by 32, so the dense preset rejects it
        assert!(small_config("ir50", 112).validate().is_ok());
        let err = small_config("densenet", 112).validate().unwrap_err();
        assert!(err.to_string().contains("input_size"));
    }

    #[test]
    fn age_channel_override_must_match_backbone_width() {
        let mut cfg = small_config("ir50", 112);
        cfg.age_channels = Some(1024);
        let err = cfg.validate().unwrap_err();
        assert!(err.to_string().contains("age_channels"));

        cfg.age_channels = Some(512);
        assert!(cfg.validate().is_ok());
    }

    #[test]
    fn residual_config_refuses_dense_builder() {
        let device = Default::default();
        assert!(small_config("densenet", 64)
            .init_ir::<TestBackend>(&device)
            .is_err());
        assert!(small_config("ir34", 64)
            .init_dense::<TestBackend>(&device)
            .is_err());
    }

    #[test]
    fn dense_variant_embeds_and_reports_capability_gap() {
        let device = Default::default();
        let model = small_config("densenet", 64)
            .init_dense::<TestBackend>(&device)
            .unwrap();

        let x = Tensor::random([1, 3, 64, 64], Distribution::Default, &device);
        let acts = model.forward_shortcuts(x);

        assert!(acts.stem.is_none());
        assert!(acts.stage1.is_none());
        assert!(acts.stage2.is_none());
        assert!(acts.stage3.is_none());
        assert_eq!(acts.feature.dims(), [1, 1024, 2, 2]);
        assert_eq!(acts.identity.dims(), [1, 1024, 2, 2]);

        let embedding = model.forward(Tensor::random(
            [1, 3, 64, 64],
            Distribution::Default,
            &device,
        ));
        assert_eq!(embedding.dims(), [1, EMBEDDING_SIZE]);
    }

    #[test]
    fn identity_head_only_exists_when_configured() {
        let device = Default::default();
        let mut cfg = small_config("ir34", 32);

        let bare = cfg.init_ir::<TestBackend>(&device).unwrap();
        let x = Tensor::random([1, 3, 32, 32], Distribution::Default, &device);
        assert!(bare.identity_logits(bare.forward(x.clone())).is_none());

        cfg.num_identities = Some(10);
        let trainable = cfg.init_ir::<TestBackend>(&device).unwrap();
        let logits = trainable.identity_logits(trainable.forward(x)).unwrap();
        assert_eq!(logits.dims(), [1, 10]);
    }

    #[test]
    fn end_to_end_ir50_at_224() {
        let device = Default::default();
        let model = small_config("ir50", 224)
            .init_ir::<TestBackend>(&device)
            .unwrap();

        let x = Tensor::<TestBackend, 4>::random(
            [2, 3, 224, 224],
            Distribution::Uniform(-1.0, 1.0),
            &device,
        );
        let (embedding, identity, age) = model.forward_with_age(x);

        assert_eq!(embedding.dims(), [2, EMBEDDING_SIZE]);
        // 224 / 16 = 14
        assert_eq!(identity.dims(), [2, 512, 14, 14]);
        assert_eq!(age.dims(), [2, 512, 14, 14]);

        let (age_logits, group_logits) = model.estimate_age(age);
        assert_eq!(age_logits.dims(), [2, AGE_CLASSES]);
        assert_eq!(group_logits.dims(), [2, 7]);
    }

    #[test]
    fn split_reconstructs_backbone_feature() {
        let device = Default::default();
        let model = small_config("ir34", 32)
            .init_ir::<TestBackend>(&device)
            .unwrap();

        let x = Tensor::random([1, 3, 32, 32], Distribution::Uniform(-1.0, 1.0), &device);
        let acts = model.forward_shortcuts(x);

        let max_err = (acts.identity + acts.age - acts.feature)
            .abs()
            .max()
            .into_scalar()
            .elem::<f32>();
        assert!(max_err <= 1e-5, "reconstruction error {max_err}");
    }
}
