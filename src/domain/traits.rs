// ============================================================
// Layer 3 — Core Traits (Abstractions)
// ============================================================
// By programming against traits instead of concrete types the
// application layer can swap implementations without changes:
//
//   - FaceDirectoryLoader implements ImageSource
//   - a future manifest/CSV loader could implement it too
//
// This is the Dependency Inversion Principle applied with
// Rust's trait system.

use anyhow::Result;
use crate::domain::face::FaceImage;

// ─── ImageSource ──────────────────────────────────────────────────────────────
/// Any component that can enumerate labelled face images.
///
/// Implementations:
///   - FaceDirectoryLoader → one subdirectory per identity,
///     file names prefixed with the subject's age
pub trait ImageSource {
    /// Scan the source and return metadata for every usable image.
    /// Unusable entries are skipped, not fatal.
    fn scan(&self) -> Result<Vec<FaceImage>>;
}
