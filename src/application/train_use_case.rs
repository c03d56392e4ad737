// ============================================================
// Layer 2 — TrainUseCase
// ============================================================
// Orchestrates the full training pipeline in order:
//
//   Step 1: Validate the model configuration  (Layer 5 - ml)
//   Step 2: Scan the image directory          (Layer 4 - data)
//   Step 3: Build the identity label table    (Layer 6 - infra)
//   Step 4: Decode + normalise every image    (Layer 4 - data)
//   Step 5: Split train/validation            (Layer 4 - data)
//   Step 6: Build datasets                    (Layer 4 - data)
//   Step 7: Save config + labels              (Layer 6 - infra)
//   Step 8: Run the training loop             (Layer 5 - ml)
//
// Validation runs first on purpose: a bad backbone name or an
// input size the flatten layers can't accept must surface
// before minutes of pixel decoding, not after.

use anyhow::{bail, Context, Result};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

use crate::data::{
    dataset::{FaceDataset, FaceSample},
    loader::FaceDirectoryLoader,
    preprocessor::ImagePreprocessor,
    splitter::split_train_val,
};
use crate::domain::traits::ImageSource;
use crate::infra::{
    checkpoint::CheckpointManager,
    label_store::LabelStore,
    metrics::MetricsLogger,
};
use crate::ml::model::ModelConfig;
use crate::ml::trainer::run_training;

const TRAIN_FRACTION: f64 = 0.8;

// ─── Training Configuration ──────────────────────────────────────────────────
// All hyperparameters for a training run. Serialisable so it can
// be saved next to the checkpoints and reloaded for inference;
// num_identities is discovered from the data, not configured.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TrainConfig {
    pub data_dir:       String,
    pub checkpoint_dir: String,
    pub backbone:       String,
    pub input_size:     usize,
    pub age_group:      usize,
    pub dist:           bool,
    pub drop_rate:      Option<f64>,
    pub age_channels:   Option<usize>,
    pub warm_start:     Option<String>,
    pub batch_size:     usize,
    pub epochs:         usize,
    pub lr:             f64,
    pub num_identities: usize,
}

impl Default for TrainConfig {
    fn default() -> Self {
        Self {
            data_dir:       "data/faces".to_string(),
            checkpoint_dir: "checkpoints".to_string(),
            backbone:       "ir50".to_string(),
            input_size:     112,
            age_group:      7,
            dist:           false,
            drop_rate:      None,
            age_channels:   None,
            warm_start:     None,
            batch_size:     16,
            epochs:         10,
            lr:             1e-4,
            num_identities: 0,
        }
    }
}

impl TrainConfig {
    /// The architecture slice of this config, for the ml layer.
    pub fn model_config(&self) -> ModelConfig {
        ModelConfig {
            backbone:       self.backbone.clone(),
            input_size:     self.input_size,
            age_group:      self.age_group,
            dist:           self.dist,
            drop_rate:      self.drop_rate,
            age_channels:   self.age_channels,
            num_identities: (self.num_identities > 0).then_some(self.num_identities),
        }
    }
}

// ─── TrainUseCase ─────────────────────────────────────────────────────────────
pub struct TrainUseCase {
    config: TrainConfig,
}

impl TrainUseCase {
    pub fn new(config: TrainConfig) -> Self {
        Self { config }
    }

    /// Execute the full training pipeline end to end.
    pub fn execute(&self) -> Result<()> {
        let mut cfg = self.config.clone();

        // ── Step 1: Validate the architecture before any pixel work ───────────
        cfg.model_config().validate()?;

        // ── Step 2: Scan the dataset directory ────────────────────────────────
        tracing::info!("Scanning face images in '{}'", cfg.data_dir);
        let loader = FaceDirectoryLoader::new(&cfg.data_dir);
        let images = loader.scan()?;
        if images.is_empty() {
            bail!("No labelled face images found in '{}'", cfg.data_dir);
        }

        // ── Step 3: Build the identity label table ────────────────────────────
        // Sorted unique names; an identity's index is its position.
        let identities: Vec<String> = images
            .iter()
            .map(|img| img.identity.clone())
            .collect::<BTreeSet<_>>()
            .into_iter()
            .collect();
        cfg.num_identities = identities.len();
        tracing::info!(
            "{} images across {} identities",
            images.len(),
            identities.len()
        );

        // ── Step 4: Decode + normalise every image ────────────────────────────
        // Decode failures are skipped with a warning; one corrupt
        // file must not abort hours of training.
        let preprocessor = ImagePreprocessor::new(cfg.input_size);
        let mut samples = Vec::with_capacity(images.len());
        for img in &images {
            let identity = identities
                .binary_search(&img.identity)
                .ok()
                .context("identity table lookup cannot fail for a scanned image")?;

            match preprocessor.load(&img.path) {
                Ok(pixels) => samples.push(FaceSample {
                    pixels,
                    identity,
                    age: img.age,
                    age_group: img.age_group(cfg.age_group),
                }),
                Err(e) => tracing::warn!("Skipping '{}': {:#}", img.path.display(), e),
            }
        }
        if samples.is_empty() {
            bail!("No face image in '{}' could be decoded", cfg.data_dir);
        }
        tracing::info!("Prepared {} training samples", samples.len());

        // ── Step 5: Train / validation split (80/20) ──────────────────────────
        let (train_samples, val_samples) = split_train_val(samples, TRAIN_FRACTION);
        tracing::info!(
            "Split: {} train, {} validation",
            train_samples.len(),
            val_samples.len()
        );

        // ── Step 6: Build Burn datasets ───────────────────────────────────────
        let train_dataset = FaceDataset::new(train_samples);
        let val_dataset   = FaceDataset::new(val_samples);

        // ── Step 7: Save config + labels for inference ────────────────────────
        let ckpt_manager = CheckpointManager::new(&cfg.checkpoint_dir);
        ckpt_manager.save_config(&cfg)?;
        LabelStore::new(&cfg.checkpoint_dir).save(&identities)?;

        // ── Step 8: Run the training loop (Layer 5) ───────────────────────────
        let metrics = MetricsLogger::new(&cfg.checkpoint_dir)?;
        run_training(&cfg, train_dataset, val_dataset, ckpt_manager, metrics)?;

        Ok(())
    }
}
