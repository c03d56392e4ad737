// ============================================================
// Layer 2 — InferUseCase
// ============================================================
// Wraps the two inference flows behind one loaded checkpoint:
//
//   estimate — one image in, estimated age + bucket label out
//   verify   — two images in, cosine similarity out
//
// The use case owns translating the model's raw outputs into
// something printable (bucket index → human-readable range);
// the CLI layer only formats.

use anyhow::Result;
use std::path::Path;

use crate::infra::checkpoint::CheckpointManager;
use crate::ml::inferencer::Inferencer;

/// Two embeddings closer than this are reported as a match.
/// Untuned default; calibrate on a validation split for real use.
const MATCH_THRESHOLD: f32 = 0.5;

/// A fully resolved age estimate, ready for display.
#[derive(Debug, Clone)]
pub struct AgeReport {
    pub age:   f32,
    pub group: usize,
    /// Human-readable bucket, e.g. "30-39" or "60+"
    pub group_label: String,
}

/// Outcome of comparing two face images.
#[derive(Debug, Clone)]
pub struct VerifyReport {
    pub similarity: f32,
    pub same_person: bool,
}

pub struct InferUseCase {
    inferencer: Inferencer,
    age_group:  usize,
}

impl InferUseCase {
    /// Load the model and its config from a checkpoint directory.
    pub fn new(checkpoint_dir: impl Into<String>) -> Result<Self> {
        let ckpt_manager = CheckpointManager::new(checkpoint_dir);
        let age_group = ckpt_manager.load_config()?.age_group;
        let inferencer = Inferencer::from_checkpoint(&ckpt_manager)?;

        Ok(Self { inferencer, age_group })
    }

    pub fn estimate(&self, image: &Path) -> Result<AgeReport> {
        let estimate = self.inferencer.estimate(image)?;

        Ok(AgeReport {
            age: estimate.age,
            group: estimate.group,
            group_label: group_label(estimate.group, self.age_group),
        })
    }

    pub fn verify(&self, image_a: &Path, image_b: &Path) -> Result<VerifyReport> {
        let similarity = self.inferencer.verify(image_a, image_b)?;

        Ok(VerifyReport {
            similarity,
            same_person: similarity >= MATCH_THRESHOLD,
        })
    }
}

/// Render a decade bucket as a label. The final bucket is
/// open-ended, matching the bucketing used at training time.
fn group_label(group: usize, age_group: usize) -> String {
    if group + 1 >= age_group {
        format!("{}+", group * 10)
    } else {
        format!("{}-{}", group * 10, group * 10 + 9)
    }
}

// ─── Unit Tests ───────────────────────────────────────────────────────────────
#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn bucket_labels() {
        assert_eq!(group_label(0, 7), "0-9");
        assert_eq!(group_label(3, 7), "30-39");
        assert_eq!(group_label(6, 7), "60+");
    }
}
