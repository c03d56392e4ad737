// ============================================================
// Layer 4 — Face Directory Loader
// ============================================================
// Scans a dataset laid out as one subdirectory per identity,
// with each file name carrying the subject's age as a prefix:
//
//   faces/
//     alice/
//       23_0.jpg      ← alice at age 23
//       31_vacation.png
//     bob/
//       54_1.jpg
//
// Only the labels are read here. Pixel decoding is deferred to
// the preprocessor so a scan over a large dataset stays cheap.

use anyhow::{Context, Result};
use std::{fs, path::Path};

use crate::domain::face::FaceImage;
use crate::domain::traits::ImageSource;

const IMAGE_EXTENSIONS: [&str; 3] = ["jpg", "jpeg", "png"];

/// Loads face image metadata from an identity-per-directory tree.
/// Implements the ImageSource trait from Layer 3.
pub struct FaceDirectoryLoader {
    /// Path to the dataset root
    dir: String,
}

impl FaceDirectoryLoader {
    pub fn new(dir: impl Into<String>) -> Self {
        Self { dir: dir.into() }
    }
}

impl ImageSource for FaceDirectoryLoader {
    fn scan(&self) -> Result<Vec<FaceImage>> {
        let root = Path::new(&self.dir);

        // A missing directory returns an empty set rather than crashing,
        // so the binary can still start in a fresh workspace.
        if !root.exists() {
            tracing::warn!(
                "Image directory '{}' does not exist — returning empty dataset",
                self.dir
            );
            return Ok(Vec::new());
        }

        let mut images = Vec::new();

        for entry in fs::read_dir(root)
            .with_context(|| format!("Cannot read directory '{}'", self.dir))?
        {
            let entry = entry?;
            let identity_dir = entry.path();
            if !identity_dir.is_dir() {
                continue;
            }

            // The directory name is the identity label
            let identity = match identity_dir.file_name().and_then(|n| n.to_str()) {
                Some(name) => name.to_string(),
                None => continue,
            };

            for file in fs::read_dir(&identity_dir)
                .with_context(|| format!("Cannot read '{}'", identity_dir.display()))?
            {
                let path = file?.path();
                match parse_age(&path) {
                    Some(age) => images.push(FaceImage::new(path, identity.clone(), age)),
                    // Log and continue — one mislabelled file must not
                    // abort a whole dataset scan
                    None => tracing::warn!("Skipping '{}': no age prefix", path.display()),
                }
            }
        }

        tracing::info!("Found {} labelled face images", images.len());
        Ok(images)
    }
}

/// Parse the integer age from a file name of the form `<age>_<anything>.<ext>`.
/// Returns None for non-image extensions or a missing/invalid prefix.
fn parse_age(path: &Path) -> Option<usize> {
    let ext = path.extension()?.to_str()?.to_ascii_lowercase();
    if !IMAGE_EXTENSIONS.contains(&ext.as_str()) {
        return None;
    }

    let stem = path.file_stem()?.to_str()?;
    let prefix = stem.split('_').next()?;
    prefix.parse::<usize>().ok()
}

// ─── Unit Tests ───────────────────────────────────────────────────────────────
#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;

    #[test]
    fn parses_age_prefix() {
        assert_eq!(parse_age(&PathBuf::from("faces/alice/23_0.jpg")), Some(23));
        assert_eq!(parse_age(&PathBuf::from("faces/bob/7_x.PNG")), Some(7));
    }

    #[test]
    fn rejects_missing_or_bad_prefix() {
        assert_eq!(parse_age(&PathBuf::from("faces/alice/portrait.jpg")), None);
        assert_eq!(parse_age(&PathBuf::from("faces/alice/23_0.txt")), None);
        assert_eq!(parse_age(&PathBuf::from("faces/alice/.hidden")), None);
    }

    #[test]
    fn missing_directory_yields_empty_scan() {
        let loader = FaceDirectoryLoader::new("definitely/not/a/real/path");
        let images = loader.scan().unwrap();
        assert!(images.is_empty());
    }
}
