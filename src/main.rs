// SPDX-License-Identifier: MIT
// SPDX-FileCopyrightText: 2025 Jonathan D. A. Jewell <hyperpolymath>

//! Vista: Local AI Image Sorter
//!
//! Extracts images from a directory tree and files them into category
//! folders chosen by a local vision model.

use clap::{Parser, Subcommand};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use tracing::{info, warn};

use vista::classify::{CategorySet, Classifier};
use vista::config::AppConfig;
use vista::detect::SignatureTable;
use vista::extract::Extractor;
use vista::janitor::remove_empty_directories;
use vista::ollama::OllamaClient;
use vista::sorter::{ProgressUpdate, SortReport, SortRequest, Sorter};
use vista::{Result, VistaError};

/// Vista CLI - Local AI Image Sorter
#[derive(Parser, Debug)]
#[command(name = "vista")]
#[command(author = "Jonathan D. A. Jewell <hyperpolymath>")]
#[command(version = "1.0.0")]
#[command(about = "Local AI-powered image extractor and category sorter", long_about = None)]
#[command(propagate_version = true)]
struct Cli {
    /// Path to configuration file (JSON format)
    #[arg(short, long, default_value = "config.json", global = true)]
    config: PathBuf,

    /// Enable verbose logging (debug level)
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Enable trace logging (most verbose)
    #[arg(long, global = true)]
    trace: bool,

    /// Output format for results
    #[arg(long, global = true, default_value = "text", value_parser = ["text", "json", "jsonl"])]
    format: String,

    /// Suppress non-essential output (quiet mode)
    #[arg(short, long, global = true)]
    quiet: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Extract images from a directory tree and sort them into category folders
    Sort {
        /// Directory to scan
        source: PathBuf,

        /// Output directory (default: the source directory)
        #[arg(short, long)]
        dest: Option<PathBuf>,

        /// Minimum width and height in pixels (overrides config)
        #[arg(long)]
        min_size: Option<u32>,

        /// Category labels in priority order (repeatable, overrides config)
        #[arg(short = 'C', long = "category")]
        categories: Vec<String>,

        /// Vision model to use (overrides config)
        #[arg(short, long)]
        model: Option<String>,

        /// Classify and count without moving anything
        #[arg(long)]
        dry_run: bool,

        /// Keep empty folders in the source tree
        #[arg(long)]
        no_cleanup: bool,

        /// Skip Ollama health check on startup
        #[arg(long)]
        skip_health_check: bool,
    },

    /// Classify a single image without moving it
    Classify {
        /// Image file
        path: PathBuf,

        /// Category labels in priority order (repeatable, overrides config)
        #[arg(short = 'C', long = "category")]
        categories: Vec<String>,

        /// Vision model to use (overrides config)
        #[arg(short, long)]
        model: Option<String>,
    },

    /// Remove empty folders below a directory
    Cleanup {
        /// Directory to clean
        dir: PathBuf,
    },

    /// Show AI engine status
    Status,

    /// Configuration management
    Config {
        #[command(subcommand)]
        action: ConfigCommands,
    },
}

#[derive(Subcommand, Debug)]
enum ConfigCommands {
    /// Show current configuration
    Show,

    /// Generate default configuration file
    Generate {
        /// Output file path
        #[arg(short, long, default_value = "config.json")]
        output: PathBuf,

        /// Overwrite an existing file
        #[arg(long)]
        force: bool,
    },

    /// Validate configuration file
    Validate,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // Initialize tracing
    let filter = if cli.trace {
        "trace"
    } else if cli.verbose {
        "debug"
    } else if cli.quiet {
        "warn"
    } else {
        "info"
    };

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .init();

    if !cli.quiet {
        info!("Vista v1.0.0 - Local AI Image Sorter");
    }

    let config = AppConfig::load(&cli.config)?;

    match cli.command {
        Commands::Sort {
            source,
            dest,
            min_size,
            categories,
            model,
            dry_run,
            no_cleanup,
            skip_health_check,
        } => {
            let options = SortOptions {
                source,
                dest,
                min_size,
                categories,
                model,
                dry_run,
                cleanup: !no_cleanup,
                skip_health_check,
            };
            run_sort(config, options, &cli.format).await
        }
        Commands::Classify { path, categories, model } => {
            run_classify(config, path, categories, model, &cli.format).await
        }
        Commands::Cleanup { dir } => run_cleanup(&dir),
        Commands::Status => run_status(config).await,
        Commands::Config { action } => run_config_command(config, action, &cli.config),
    }
}

/// Sort command arguments after parsing
struct SortOptions {
    source: PathBuf,
    dest: Option<PathBuf>,
    min_size: Option<u32>,
    categories: Vec<String>,
    model: Option<String>,
    dry_run: bool,
    cleanup: bool,
    skip_health_check: bool,
}

/// Fold CLI overrides into the loaded configuration
fn apply_overrides(mut config: AppConfig, categories: Vec<String>, model: Option<String>, min_size: Option<u32>) -> Result<AppConfig> {
    if !categories.is_empty() {
        config.sorting.categories = categories;
    }
    if let Some(model) = model {
        config.ai_engine.models.vision = model;
    }
    if let Some(min_size) = min_size {
        config.sorting.min_size = min_size;
    }
    config.validate()?;
    Ok(config)
}

fn build_client(config: &AppConfig) -> Result<Arc<OllamaClient>> {
    let client = OllamaClient::new(
        &config.ai_engine.url,
        Duration::from_secs(config.ai_engine.timeout_secs),
    )?;
    Ok(Arc::new(client))
}

/// Run the extract + classify pipeline
async fn run_sort(config: AppConfig, options: SortOptions, format: &str) -> Result<()> {
    if !options.source.is_dir() {
        return Err(VistaError::Config(format!(
            "Source directory not found: {}",
            options.source.display()
        )));
    }

    let config = apply_overrides(config, options.categories, options.model, options.min_size)?;
    let client = build_client(&config)?;

    if !options.skip_health_check {
        info!("Checking Ollama availability...");
        client.health_check().await?;
        info!("Ollama is running");

        let vision_model = &config.ai_engine.models.vision;
        match client.model_available(vision_model).await {
            Ok(true) => info!("Vision model '{}' available", vision_model),
            Ok(false) => warn!("Vision model '{}' not found, run: ollama pull {}", vision_model, vision_model),
            Err(e) => warn!("Could not list models: {}", e),
        }
    } else {
        warn!("Skipping Ollama health check");
    }

    if options.dry_run {
        warn!("DRY RUN MODE - files will be classified but not moved");
    }

    let categories = CategorySet::from_config(&config);
    let extractor = Extractor::new(SignatureTable::default())
        .with_staging_dir(config.sorting.staging_dir.clone());
    let classifier = Classifier::from_config(client, &config);
    let sorter = Sorter::new(extractor, classifier);

    let destination = options.dest.unwrap_or_else(|| options.source.clone());
    let request = SortRequest::new(&options.source, categories)
        .with_destination(destination)
        .with_min_size(config.sorting.min_size)
        .with_dry_run(options.dry_run);

    let progress = |update: &ProgressUpdate<'_>| {
        info!(
            "[{:>3}%] {} ({} remaining)",
            update.percent, update.current, update.remaining
        );
    };

    let mut report = sorter.run_with_report(&request, &progress).await;

    if options.cleanup && config.sorting.cleanup_empty_dirs && !options.dry_run {
        report.removed_dirs = remove_empty_directories(&options.source);
    }

    print_report(&report, format)
}

fn print_report(report: &SortReport, format: &str) -> Result<()> {
    match format {
        "json" => println!("{}", serde_json::to_string_pretty(report)?),
        "jsonl" => println!("{}", serde_json::to_string(report)?),
        _ => {
            let prefix = if report.dry_run { "[DRY RUN] " } else { "" };
            println!(
                "{}Complete! Sorted {} images ({} of {} files extracted).",
                prefix,
                report.counts.total(),
                report.extraction.staged,
                report.extraction.total_files
            );
            for (label, count) in report.counts.iter() {
                println!("  {}: {}", label, count);
            }
            if report.move_failed > 0 {
                println!("  failed to move: {}", report.move_failed);
            }
            if report.removed_dirs > 0 {
                println!("Removed {} empty folders", report.removed_dirs);
            }
        }
    }

    Ok(())
}

/// Classify one file and print the label
async fn run_classify(
    config: AppConfig,
    path: PathBuf,
    categories: Vec<String>,
    model: Option<String>,
    format: &str,
) -> Result<()> {
    let config = apply_overrides(config, categories, model, None)?;
    let client = build_client(&config)?;
    let classifier = Classifier::from_config(client, &config);
    let categories = CategorySet::from_config(&config);

    let label = classifier.classify(&path, &categories).await;

    match format {
        "json" | "jsonl" => {
            let line = serde_json::json!({
                "path": path.to_string_lossy(),
                "category": label,
                "model": classifier.model(),
            });
            println!("{}", serde_json::to_string(&line)?);
        }
        _ => println!("{}: {}", path.display(), label),
    }

    Ok(())
}

fn run_cleanup(dir: &Path) -> Result<()> {
    if !dir.is_dir() {
        return Err(VistaError::Config(format!("Not a directory: {}", dir.display())));
    }
    let removed = remove_empty_directories(dir);
    println!("Removed {} empty folders", removed);
    Ok(())
}

/// Run status check
async fn run_status(config: AppConfig) -> Result<()> {
    let client = build_client(&config)?;

    println!("Vista v1.0.0 Status");
    println!("===================");

    match client.health_check().await {
        Ok(()) => println!("Ollama: Running ({})", client.base_url()),
        Err(e) => println!("Ollama: Error - {}", e),
    }

    match client.list_models().await {
        Ok(models) => {
            println!("\nAvailable models:");
            for m in &models {
                let marker = if m.starts_with(config.ai_engine.models.vision.as_str()) {
                    "→"
                } else {
                    " "
                };
                println!("  {} {}", marker, m);
            }
        }
        Err(e) => println!("  Error listing models: {}", e),
    }

    println!("\nConfiguration:");
    println!("  Vision model: {}", config.ai_engine.models.vision);
    println!("  Categories: {}", config.sorting.categories.join(", "));
    println!("  Fallback: {}", config.sorting.fallback_category);
    println!("  Min size: {}px", config.sorting.min_size);

    Ok(())
}

/// Run config commands
fn run_config_command(config: AppConfig, action: ConfigCommands, config_path: &Path) -> Result<()> {
    match action {
        ConfigCommands::Show => {
            let json = serde_json::to_string_pretty(&config)?;
            println!("{}", json);
        }
        ConfigCommands::Generate { output, force } => {
            if output.exists() && !force {
                return Err(VistaError::Config(format!(
                    "{} already exists. Use --force to overwrite",
                    output.display()
                )));
            }
            AppConfig::default().save(&output)?;
            println!("Generated config at {:?}", output);
        }
        ConfigCommands::Validate => {
            config.validate()?;
            println!("Configuration at {:?} is valid", config_path);
            println!("  Vision model: {}", config.ai_engine.models.vision);
            println!("  Categories: {:?}", config.sorting.categories);
        }
    }

    Ok(())
}
