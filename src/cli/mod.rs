// ============================================================
// Layer 1 — CLI / Presentation Layer
// ============================================================
// Entry point for all user interaction. Parses arguments with
// clap and hands each subcommand to its Layer 2 use case.
//
//   1. `train`   — train, evaluate and publish a checkpoint
//   2. `serve`   — run the inference HTTP service
//   3. `monitor` — post-deployment smoke test / evaluation
//
// Reference: Rust Book §7 (Modules), §12 (CLI programs)

pub mod commands;

use anyhow::Result;
use clap::Parser;
use commands::{Commands, MonitorArgs, ServeArgs, TrainArgs};

#[derive(Parser, Debug)]
#[command(
    name = "catdog",
    version,
    about = "Train, serve and monitor a cat-vs-dog image classifier."
)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,
}

impl Cli {
    /// Dispatch to the matching use case. The CLI layer only routes.
    pub fn run(self) -> Result<()> {
        match self.command {
            Commands::Train(args)   => run_train(args),
            Commands::Serve(args)   => run_serve(args),
            Commands::Monitor(args) => run_monitor(args),
        }
    }
}

fn run_train(args: TrainArgs) -> Result<()> {
    use crate::application::train_use_case::TrainUseCase;

    tracing::info!("Starting training on images in: {}", args.data_dir.display());
    let summary = TrainUseCase::new(args.into()).execute()?;

    println!(
        "Training complete. test_accuracy={:.4} test_loss={:.4}. Checkpoint saved to {}",
        summary.test.accuracy,
        summary.test.loss,
        summary.model_path.display()
    );
    Ok(())
}

fn run_serve(args: ServeArgs) -> Result<()> {
    use crate::application::serve_use_case::ServeUseCase;

    ServeUseCase::new(args.into()).execute()
}

fn run_monitor(args: MonitorArgs) -> Result<()> {
    use crate::application::monitor_use_case::MonitorUseCase;

    MonitorUseCase::new(args.into()).execute()
}
