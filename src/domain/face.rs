use std::path::PathBuf;

/// Oldest age the model can represent. Age logits cover the
/// integer years 0..=MAX_AGE, so the age head has MAX_AGE + 1 outputs.
pub const MAX_AGE: usize = 100;

/// Number of discrete age classes (one logit per year 0..=100).
pub const AGE_CLASSES: usize = MAX_AGE + 1;

/// One face image found on disk, before any pixel work.
///
/// `identity` is the subject's directory name; `age` is the integer
/// age parsed from the file name prefix.
#[derive(Debug, Clone)]
pub struct FaceImage {
    pub path:     PathBuf,
    pub identity: String,
    pub age:      usize,
}

impl FaceImage {
    pub fn new(path: PathBuf, identity: impl Into<String>, age: usize) -> Self {
        Self {
            path,
            identity: identity.into(),
            // Out-of-range labels are clamped rather than rejected;
            // a 103-year-old sample is still a valid face.
            age: age.min(MAX_AGE),
        }
    }

    /// Coarse age bucket for this image given `age_group` buckets.
    pub fn age_group(&self, age_group: usize) -> usize {
        age_to_group(self.age, age_group)
    }
}

/// Map an integer age to a coarse decade bucket.
///
/// Buckets are ten years wide ([0,10), [10,20), ...) and the last
/// bucket is open-ended, so with 7 groups every age of 60+ lands
/// in group 6.
pub fn age_to_group(age: usize, age_group: usize) -> usize {
    debug_assert!(age_group > 0, "age_group must be positive");
    (age.min(MAX_AGE) / 10).min(age_group - 1)
}

// ─── Unit Tests ───────────────────────────────────────────────────────────────
#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn decade_buckets() {
        assert_eq!(age_to_group(0, 7), 0);
        assert_eq!(age_to_group(9, 7), 0);
        assert_eq!(age_to_group(10, 7), 1);
        assert_eq!(age_to_group(35, 7), 3);
        assert_eq!(age_to_group(59, 7), 5);
    }

    #[test]
    fn last_bucket_is_open_ended() {
        assert_eq!(age_to_group(60, 7), 6);
        assert_eq!(age_to_group(85, 7), 6);
        assert_eq!(age_to_group(100, 7), 6);
    }

    #[test]
    fn age_clamps_to_max() {
        let img = FaceImage::new(PathBuf::from("x/103_0.jpg"), "x", 103);
        assert_eq!(img.age, MAX_AGE);
        assert_eq!(img.age_group(7), 6);
    }
}
