// ============================================================
// Layer 1 — CLI Commands and Arguments
// ============================================================
// Defines the three subcommands — `train`, `estimate`, `verify` —
// and all their configurable flags.
//
// clap's derive macros generate the help text, error messages
// for missing args, and string → number conversion.

use clap::{Args, Subcommand};
use crate::application::train_use_case::TrainConfig;

/// The top-level subcommands available to the user
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Train the face recognition + age estimation model
    Train(TrainArgs),

    /// Estimate a subject's age from one image
    Estimate(EstimateArgs),

    /// Compare two face images by embedding similarity
    Verify(VerifyArgs),
}

/// All arguments for the `train` command.
/// Each field becomes a --flag on the command line.
#[derive(Args, Debug)]
pub struct TrainArgs {
    /// Dataset root: one subdirectory per identity, file names
    /// prefixed with the subject's age (e.g. alice/23_0.jpg)
    #[arg(long, default_value = "data/faces")]
    pub data_dir: String,

    /// Directory to save model checkpoints and the label table
    #[arg(long, default_value = "checkpoints")]
    pub checkpoint_dir: String,

    /// Backbone preset: ir34, ir50, ir64, ir101, irse101, densenet
    #[arg(long, default_value = "ir50")]
    pub backbone: String,

    /// Image side length. Must be a multiple of 16 for residual
    /// backbones and 32 for densenet — the flatten layers are
    /// sized for it
    #[arg(long, default_value_t = 112)]
    pub input_size: usize,

    /// Number of coarse age buckets for the group head
    #[arg(long, default_value_t = 7)]
    pub age_group: usize,

    /// Use a leaky rectifier in the age head (adversarial /
    /// distributed training mode)
    #[arg(long)]
    pub dist: bool,

    /// Embedding-head dropout rate; defaults to 0.5 (residual)
    /// or 0.4 (densenet) when omitted
    #[arg(long)]
    pub drop_rate: Option<f64>,

    /// Age-head feature width override; must match the backbone's
    /// channel count, omit to follow the backbone
    #[arg(long)]
    pub age_channels: Option<usize>,

    /// Checkpoint file to warm-start the weights from
    #[arg(long)]
    pub warm_start: Option<String>,

    /// Number of samples processed together in one forward pass
    #[arg(long, default_value_t = 16)]
    pub batch_size: usize,

    /// Number of full passes through the training data
    #[arg(long, default_value_t = 10)]
    pub epochs: usize,

    /// Adam learning rate
    #[arg(long, default_value_t = 1e-4)]
    pub lr: f64,
}

/// Convert CLI TrainArgs into the application-layer TrainConfig.
/// This is the boundary between Layer 1 and Layer 2 — the
/// application layer never sees clap types.
impl From<TrainArgs> for TrainConfig {
    fn from(a: TrainArgs) -> Self {
        TrainConfig {
            data_dir:       a.data_dir,
            checkpoint_dir: a.checkpoint_dir,
            backbone:       a.backbone,
            input_size:     a.input_size,
            age_group:      a.age_group,
            dist:           a.dist,
            drop_rate:      a.drop_rate,
            age_channels:   a.age_channels,
            warm_start:     a.warm_start,
            batch_size:     a.batch_size,
            epochs:         a.epochs,
            lr:             a.lr,
            // Discovered from the data during the pipeline
            num_identities: 0,
        }
    }
}

/// All arguments for the `estimate` command
#[derive(Args, Debug)]
pub struct EstimateArgs {
    /// The face image to estimate an age for
    #[arg(long)]
    pub image: String,

    /// Directory where checkpoints were saved during training
    #[arg(long, default_value = "checkpoints")]
    pub checkpoint_dir: String,
}

/// All arguments for the `verify` command
#[derive(Args, Debug)]
pub struct VerifyArgs {
    /// First face image
    #[arg(long)]
    pub image_a: String,

    /// Second face image
    #[arg(long)]
    pub image_b: String,

    /// Directory where checkpoints were saved during training
    #[arg(long, default_value = "checkpoints")]
    pub checkpoint_dir: String,
}
