use clap::{Parser, Subcommand};
use std::path::PathBuf;
use tracing::error;

use lead_prep::config::Config;
use lead_prep::logging;
use lead_prep::pipeline::{self, TransformationStageResult, ValidationStageResult};

#[derive(Parser)]
#[command(name = "lead_prep")]
#[command(about = "Lead-scoring data preparation pipeline")]
#[command(version = "0.1.0")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Validate the raw dataset against its declared schema
    Validate {
        /// Path to the run configuration
        #[arg(long, default_value = "config.toml")]
        config: PathBuf,
    },
    /// Split the validated dataset and fit/apply the preprocessing pipeline
    Transform {
        /// Path to the run configuration
        #[arg(long, default_value = "config.toml")]
        config: PathBuf,
    },
    /// Run validation and transformation sequentially
    Run {
        /// Path to the run configuration
        #[arg(long, default_value = "config.toml")]
        config: PathBuf,
    },
}

fn print_validation(result: &ValidationStageResult) {
    println!("\n📊 Validation Results:");
    println!("   Rows: {}", result.rows);
    println!("   Columns: {}", result.columns);
    println!("   Findings: {}", result.finding_count);
    if !result.dropped_columns.is_empty() {
        println!("   Dropped unique columns: {:?}", result.dropped_columns);
    }
    println!("   Report: {}", result.report_path.display());
    println!("   Profile: {}", result.profile_path.display());
    match &result.validated_data_path {
        Some(path) => println!("   ✅ Validated data: {}", path.display()),
        None => println!("   ❌ Validation failed, validated data not written"),
    }
}

fn print_transformation(result: &TransformationStageResult) {
    println!("\n📊 Transformation Results:");
    println!(
        "   Partitions: train={} val={} test={} ({} classes)",
        result.train_rows, result.val_rows, result.test_rows, result.class_count
    );
    println!("   Features after preprocessing: {}", result.feature_count);
    println!("   Preprocessor: {}", result.preprocessor_path.display());
    println!("   Output dir: {}", result.output_dir.display());
}

fn main() -> anyhow::Result<()> {
    // Initialize logging
    logging::init_logging();

    let cli = Cli::parse();

    match cli.command {
        Commands::Validate { config } => {
            println!("🔍 Running validation stage...");
            let config = Config::load(&config)?;

            match pipeline::run_validation(&config) {
                Ok(result) => print_validation(&result),
                Err(e) => {
                    error!("Validation stage failed: {}", e);
                    println!("❌ Validation stage failed: {}", e);
                    std::process::exit(1);
                }
            }
        }
        Commands::Transform { config } => {
            println!("🔧 Running transformation stage...");
            let config = Config::load(&config)?;

            match pipeline::run_transformation(&config) {
                Ok(result) => print_transformation(&result),
                Err(e) => {
                    error!("Transformation stage failed: {}", e);
                    println!("❌ Transformation stage failed: {}", e);
                    std::process::exit(1);
                }
            }
        }
        Commands::Run { config } => {
            println!("🚀 Running full pipeline (validation + transformation)...");
            let config = Config::load(&config)?;

            match pipeline::run_all(&config) {
                Ok(result) => {
                    print_validation(&result.validation);
                    print_transformation(&result.transformation);
                    println!("\n✅ Full pipeline completed (run {})", result.run_id);
                }
                Err(e) => {
                    error!("Pipeline run failed: {}", e);
                    println!("❌ Pipeline run failed: {}", e);
                    std::process::exit(1);
                }
            }
        }
    }
    Ok(())
}
