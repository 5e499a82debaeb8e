use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use fmaprep::analyzer;
use fmaprep::reorganize::ReorganizeOptions;
use std::path::PathBuf;

#[derive(Parser)]
#[command(name = "fmaprep", version, about = "Genre dataset preparation for audio collections")]
struct Cli {
    /// Verbosity (-v, -vv, -vvv)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Move audio files into per-genre folders using the track metadata table
    Reorganize {
        /// Path to tracks.csv (defaults to config file, then fma_metadata/tracks.csv)
        #[arg(long)]
        metadata: Option<PathBuf>,

        /// Directory of audio files (defaults to config file, then fma_datasets/fma_small)
        #[arg(long)]
        audio_dir: Option<PathBuf>,

        /// Output directory (default: <audio_dir>_genres)
        #[arg(long)]
        output_dir: Option<PathBuf>,

        /// Only report what would be moved
        #[arg(long)]
        dry_run: bool,
    },

    /// Extract the feature vector of a single audio file
    Extract {
        /// Audio file to analyze
        file: PathBuf,

        /// Print as a JSON object of column name to value
        #[arg(long)]
        json: bool,
    },

    /// Print the feature column names, one per line
    Columns,

    /// Extract features for a genre-organized tree and write a labelled CSV
    Dataset {
        /// Root of the genre folders (e.g. fma_small_genres)
        dir: PathBuf,

        /// Output CSV path
        #[arg(short, long, default_value = "features.csv")]
        output: PathBuf,
    },
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    // Set up logging based on verbosity
    let log_level = match cli.verbose {
        0 => "warn",
        1 => "info",
        2 => "debug",
        _ => "trace",
    };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(log_level))
        .format_timestamp(None)
        .init();

    // Load config file (optional, defaults if missing)
    let config = fmaprep::config::AppConfig::load();

    match cli.command {
        Commands::Reorganize {
            metadata,
            audio_dir,
            output_dir,
            dry_run,
        } => {
            if dry_run {
                println!("DRY RUN: no files will be moved");
            }

            // CLI > config > defaults
            let mut options = ReorganizeOptions::new(
                metadata.unwrap_or(config.metadata_path),
                audio_dir.unwrap_or(config.audio_dir),
            );
            options.output_dir = output_dir.or(config.output_dir);
            options.extension = config.extension;
            options.dry_run = dry_run;

            let result = fmaprep::reorganize::reorganize(&options)
                .context("Reorganize failed")?;

            println!(
                "Reorganize complete: {} scanned, {} moved, {} not in metadata, {} without genre, {} errors",
                result.scanned, result.moved, result.not_found, result.no_genre, result.errors
            );
        }

        Commands::Extract { file, json } => {
            let vector = analyzer::try_extract(&file)
                .with_context(|| format!("Failed to extract features from {}", file.display()))?;
            let names = analyzer::column_names();

            if json {
                let map: serde_json::Map<String, serde_json::Value> = names
                    .into_iter()
                    .zip(vector)
                    .map(|(name, v)| (name, serde_json::Value::from(v)))
                    .collect();
                println!("{}", serde_json::to_string_pretty(&map)?);
            } else {
                for (name, v) in names.iter().zip(&vector) {
                    println!("{:<18} {:>14.6}", name, v);
                }
            }
        }

        Commands::Columns => {
            for name in analyzer::column_names() {
                println!("{}", name);
            }
        }

        Commands::Dataset { dir, output } => {
            let result = fmaprep::dataset::build_dataset(&dir, &output, &config.extension)
                .context("Dataset build failed")?;
            println!(
                "Dataset complete: {} rows written to {}, {} files failed",
                result.written,
                output.display(),
                result.failed
            );
            if result.written == 0 {
                anyhow::bail!("No files could be analyzed under {}", dir.display());
            }
        }
    }

    Ok(())
}
