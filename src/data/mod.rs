// ============================================================
// Layer 4 — Data Pipeline
// ============================================================
// Everything from raw image files to GPU-ready tensor batches.
//
// The pipeline flows in this order:
//
//   face image directory
//       │
//       ▼
//   FaceDirectoryLoader  → finds files, parses identity + age labels
//       │
//       ▼
//   ImagePreprocessor    → decode, resize, normalise to CHW floats
//       │
//       ▼
//   FaceDataset          → implements Burn's Dataset trait
//       │
//       ▼
//   FaceBatcher          → stacks samples into tensor batches
//       │
//       ▼
//   DataLoader           → feeds batches to the training loop
//
// Each module is responsible for exactly one step, so each step
// is independently testable and replaceable.

/// Scans an identity-per-directory image tree
pub mod loader;

/// Decodes and normalises images into flat CHW pixel buffers
pub mod preprocessor;

/// Implements Burn's Dataset trait for face samples
pub mod dataset;

/// Implements Burn's Batcher trait to create tensor batches
pub mod batcher;

/// Shuffles and splits data into train/validation sets
pub mod splitter;
