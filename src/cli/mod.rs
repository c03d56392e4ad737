// ============================================================
// Layer 1 — CLI / Presentation Layer
// ============================================================
// Entry point for all user interaction, built on clap.
// All business logic is delegated to Layer 2 (application).
//
// Three commands are supported:
//   1. `train`    — trains the joint identity/age model
//   2. `estimate` — loads a checkpoint and estimates an age
//   3. `verify`   — compares two faces by embedding similarity

pub mod commands;

use anyhow::Result;
use clap::Parser;
use std::path::Path;

use commands::{Commands, EstimateArgs, TrainArgs, VerifyArgs};

/// The main CLI struct — clap reads the fields and generates
/// argument parsing automatically via the Parser derive macro.
#[derive(Parser, Debug)]
#[command(
    name = "aifr",
    version = "0.1.0",
    about = "Train an age-invariant face recognition model, then estimate age or verify identity."
)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,
}

impl Cli {
    /// Match on the subcommand and dispatch to the correct use case.
    /// This keeps the CLI layer thin — it only routes, never computes.
    pub fn run(self) -> Result<()> {
        match self.command {
            Commands::Train(args)    => Self::run_train(args),
            Commands::Estimate(args) => Self::run_estimate(args),
            Commands::Verify(args)   => Self::run_verify(args),
        }
    }

    fn run_train(args: TrainArgs) -> Result<()> {
        use crate::application::train_use_case::TrainUseCase;

        tracing::info!("Starting training on images in: {}", args.data_dir);

        let use_case = TrainUseCase::new(args.into());
        use_case.execute()?;

        println!("Training complete. Checkpoint saved.");
        Ok(())
    }

    fn run_estimate(args: EstimateArgs) -> Result<()> {
        use crate::application::infer_use_case::InferUseCase;

        let use_case = InferUseCase::new(args.checkpoint_dir.clone())?;
        let report = use_case.estimate(Path::new(&args.image))?;

        println!(
            "\nEstimated age: {:.1} years (bucket {}: {})",
            report.age, report.group, report.group_label,
        );
        Ok(())
    }

    fn run_verify(args: VerifyArgs) -> Result<()> {
        use crate::application::infer_use_case::InferUseCase;

        let use_case = InferUseCase::new(args.checkpoint_dir.clone())?;
        let report = use_case.verify(Path::new(&args.image_a), Path::new(&args.image_b))?;

        println!(
            "\nSimilarity: {:.4} — {}",
            report.similarity,
            if report.same_person { "likely the same person" } else { "likely different people" },
        );
        Ok(())
    }
}
