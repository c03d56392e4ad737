use burn::data::dataset::Dataset;

/// One fully preprocessed training sample: normalised CHW pixels
/// plus the three labels the joint loss needs.
#[derive(Debug, Clone)]
pub struct FaceSample {
    /// Planar CHW pixel buffer, length 3 · input_size²
    pub pixels:    Vec<f32>,
    /// Dense identity index (row in the saved label table)
    pub identity:  usize,
    /// Integer age in years, 0..=100
    pub age:       usize,
    /// Coarse age bucket derived from `age`
    pub age_group: usize,
}

pub struct FaceDataset {
    samples: Vec<FaceSample>,
}

impl FaceDataset {
    pub fn new(samples: Vec<FaceSample>) -> Self {
        Self { samples }
    }

    pub fn sample_count(&self) -> usize {
        self.samples.len()
    }
}

impl Dataset<FaceSample> for FaceDataset {
    fn get(&self, index: usize) -> Option<FaceSample> {
        self.samples.get(index).cloned()
    }

    fn len(&self) -> usize {
        self.samples.len()
    }
}
