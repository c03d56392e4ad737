// ============================================================
// Layer 6 — Metrics Logger
// ============================================================
// Records training metrics to a CSV file after each epoch.
//
// Metrics recorded per epoch:
//   - epoch:      the epoch number (1, 2, 3, ...)
//   - train_loss: average joint loss on the training set
//   - val_loss:   average joint loss on the validation set
//   - age_mae:    mean absolute error of the expected-value age
//                 estimate, in years
//   - group_acc:  fraction of age buckets predicted correctly
//   - id_acc:     fraction of identities predicted correctly
//
// Output file: checkpoints/metrics.csv
//
// How to read the metrics:
//   - Losses should fall; val_loss rising while train_loss falls
//     means overfitting
//   - age_mae should approach single digits on a decent dataset
//   - id_acc climbing while age_mae stalls (or vice versa) means
//     one loss term is drowning the other

use anyhow::Result;
use serde::{Deserialize, Serialize};
use std::{
    fs::{self, OpenOptions},
    io::Write,
    path::PathBuf,
};

/// One row of metrics data for a single training epoch
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EpochMetrics {
    pub epoch:      usize,
    pub train_loss: f64,
    pub val_loss:   f64,
    /// Mean absolute age error in years, from the softmax expectation
    pub age_mae:    f64,
    /// Range [0.0, 1.0]
    pub group_acc:  f64,
    /// Range [0.0, 1.0]
    pub id_acc:     f64,
}

impl EpochMetrics {
    pub fn new(
        epoch:      usize,
        train_loss: f64,
        val_loss:   f64,
        age_mae:    f64,
        group_acc:  f64,
        id_acc:     f64,
    ) -> Self {
        Self { epoch, train_loss, val_loss, age_mae, group_acc, id_acc }
    }

    /// True if this epoch improved over the previous best val_loss
    pub fn is_improvement(&self, best_val_loss: f64) -> bool {
        self.val_loss < best_val_loss
    }
}

/// Logs epoch metrics to a CSV file for later analysis.
pub struct MetricsLogger {
    csv_path: PathBuf,
}

impl MetricsLogger {
    /// Create a new MetricsLogger, writing the CSV header if the
    /// file doesn't exist yet (appending keeps multi-run history).
    pub fn new(dir: impl Into<String>) -> Result<Self> {
        let dir = PathBuf::from(dir.into());
        fs::create_dir_all(&dir)?;

        let csv_path = dir.join("metrics.csv");

        if !csv_path.exists() {
            let mut f = fs::File::create(&csv_path)?;
            writeln!(f, "epoch,train_loss,val_loss,age_mae,group_acc,id_acc")?;
            tracing::debug!("Created metrics CSV: '{}'", csv_path.display());
        }

        Ok(Self { csv_path })
    }

    /// Append one epoch's metrics as a new CSV row.
    pub fn log(&self, m: &EpochMetrics) -> Result<()> {
        let mut f = OpenOptions::new()
            .append(true)
            .open(&self.csv_path)?;

        writeln!(
            f,
            "{},{:.6},{:.6},{:.6},{:.6},{:.6}",
            m.epoch,
            m.train_loss,
            m.val_loss,
            m.age_mae,
            m.group_acc,
            m.id_acc,
        )?;

        tracing::debug!(
            "Logged epoch {} metrics: train_loss={:.4}, val_loss={:.4}, age_mae={:.2}",
            m.epoch,
            m.train_loss,
            m.val_loss,
            m.age_mae,
        );

        Ok(())
    }

    pub fn csv_path(&self) -> &PathBuf {
        &self.csv_path
    }
}

// ─── Unit Tests ───────────────────────────────────────────────────────────────
#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_is_improvement() {
        let m = EpochMetrics::new(2, 2.5, 2.3, 8.4, 0.4, 0.2);
        assert!(m.is_improvement(3.0));
        assert!(!m.is_improvement(2.0));
    }
}
