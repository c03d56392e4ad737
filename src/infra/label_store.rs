// ============================================================
// Layer 6 — Identity Label Store
// ============================================================
// The classifier head predicts dense identity indices, so the
// mapping index → identity name must be pinned down once at
// training time and reused verbatim afterwards. This store
// persists the table as identities.json next to the checkpoints.
//
// The table is just the sorted identity names; an identity's
// index is its position in the list.

use anyhow::{Context, Result};
use std::{fs, path::PathBuf};

pub struct LabelStore {
    path: PathBuf,
}

impl LabelStore {
    pub fn new(dir: impl Into<String>) -> Self {
        let dir = PathBuf::from(dir.into());
        fs::create_dir_all(&dir).ok();
        Self { path: dir.join("identities.json") }
    }

    /// Persist the identity table. `identities` must already be in
    /// index order (the training pipeline sorts them).
    pub fn save(&self, identities: &[String]) -> Result<()> {
        let json = serde_json::to_string_pretty(identities)?;
        fs::write(&self.path, json)
            .with_context(|| format!("Cannot write '{}'", self.path.display()))?;

        tracing::debug!("Saved {} identity labels", identities.len());
        Ok(())
    }

    /// Load the identity table saved during training.
    pub fn load(&self) -> Result<Vec<String>> {
        let json = fs::read_to_string(&self.path)
            .with_context(|| {
                format!(
                    "Cannot read '{}'. Have you run 'train' first?",
                    self.path.display()
                )
            })?;

        Ok(serde_json::from_str(&json)?)
    }
}

// ─── Unit Tests ───────────────────────────────────────────────────────────────
#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn round_trips_the_table() {
        let dir = std::env::temp_dir().join("aifr_label_store_test");
        let store = LabelStore::new(dir.to_string_lossy().to_string());

        let labels = vec!["alice".to_string(), "bob".to_string()];
        store.save(&labels).unwrap();
        assert_eq!(store.load().unwrap(), labels);
    }
}
