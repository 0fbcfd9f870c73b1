use airfare::artifacts::load_all_models;
use airfare::cleaning::clean_data;
use airfare::config::AppConfig;
use airfare::features::generate_features;
use airfare::runner::run_pipeline;
use airfare::serving::Predictor;
use airfare::source::{load_dataset, load_raw_data, save_dataset};
use anyhow::{Context as _, Result};
use clap::{Parser, Subcommand};
use std::path::{Path, PathBuf};

const DEFAULT_CONFIG: &str = "config/default-config.yaml";

#[derive(Parser)]
#[command(name = "airfare", about = "Airline ticket price pipeline")]
pub struct Cli {
    /// Log filter, e.g. `debug` or `airfare=trace` (defaults to RUST_LOG, then info)
    #[arg(long, global = true)]
    pub log_level: Option<String>,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Run the full pipeline: load, clean, generate features, train and save
    Run {
        /// Pipeline configuration (YAML or JSON)
        #[arg(short, long, default_value = DEFAULT_CONFIG, env = "AIRFARE_CONFIG")]
        config: PathBuf,

        /// Override the output directory of the run
        #[arg(short, long)]
        output: Option<PathBuf>,
    },
    /// Clean the raw data files and save the clean table
    Clean {
        #[arg(short, long, default_value = DEFAULT_CONFIG, env = "AIRFARE_CONFIG")]
        config: PathBuf,

        /// Output CSV path
        #[arg(short, long, default_value = "clean_data.csv")]
        output: PathBuf,
    },
    /// Generate features from a clean table
    Features {
        #[arg(short, long, default_value = DEFAULT_CONFIG, env = "AIRFARE_CONFIG")]
        config: PathBuf,

        /// Clean CSV produced by `clean`
        #[arg(short, long)]
        input: PathBuf,

        /// Output CSV path
        #[arg(short, long, default_value = "features.csv")]
        output: PathBuf,
    },
    /// Predict a price with saved models
    Predict {
        /// Directory holding the `<model>.json` pipelines of a run
        #[arg(short, long)]
        models: PathBuf,

        /// Request body, e.g. '{"Model": "linear_regression", "Data": {...}}'
        #[arg(short, long, conflicts_with = "request_file")]
        request: Option<String>,

        /// File holding the request body
        #[arg(long)]
        request_file: Option<PathBuf>,
    },
}

pub fn run_command(command: Commands) -> Result<()> {
    match command {
        Commands::Run { config, output } => handle_run(&config, output),
        Commands::Clean { config, output } => handle_clean(&config, &output),
        Commands::Features {
            config,
            input,
            output,
        } => handle_features(&config, &input, &output),
        Commands::Predict {
            models,
            request,
            request_file,
        } => handle_predict(&models, request, request_file),
    }
}

fn load_config(path: &Path) -> Result<AppConfig> {
    AppConfig::from_file(path).with_context(|| format!("Failed to load config {}", path.display()))
}

fn handle_run(config_path: &Path, output: Option<PathBuf>) -> Result<()> {
    let mut config = load_config(config_path)?;
    if let Some(output) = output {
        config.run_config.output = output;
    }

    let report = run_pipeline(&config)?;
    println!("Run written to {}", report.run_dir.display());
    println!("{}", serde_yaml::to_string(&report.results)?);
    if let Some(best) = &report.best_model {
        println!("Best model: {best}");
    }
    if let Ok(log) = airfare::logging::get_current_log_path() {
        println!("Log: {}", log.display());
    }
    Ok(())
}

fn handle_clean(config_path: &Path, output: &Path) -> Result<()> {
    let config = load_config(config_path)?;
    let raw = load_raw_data(&config.raw_data.files)?;
    let mut clean = clean_data(&raw, &config.clean_data)?;
    save_dataset(&mut clean, output)?;
    println!(
        "Cleaned {} rows into {} ({} columns)",
        clean.height(),
        output.display(),
        clean.width()
    );
    Ok(())
}

fn handle_features(config_path: &Path, input: &Path, output: &Path) -> Result<()> {
    let config = load_config(config_path)?;
    let clean = load_dataset(input)?;
    let (mut features, report) = generate_features(&clean, &config.generate_features)?;
    save_dataset(&mut features, output)?;
    println!("{}", serde_yaml::to_string(&report)?);
    println!("Features written to {}", output.display());
    Ok(())
}

fn handle_predict(
    models_dir: &Path,
    request: Option<String>,
    request_file: Option<PathBuf>,
) -> Result<()> {
    let body = match (request, request_file) {
        (Some(body), _) => body,
        (None, Some(path)) => std::fs::read_to_string(&path)
            .with_context(|| format!("Failed to read request {}", path.display()))?,
        (None, None) => anyhow::bail!("Provide a request with --request or --request-file"),
    };

    let predictor = Predictor::new(load_all_models(models_dir)?);
    tracing::debug!("Loaded models: {:?}", predictor.model_names());

    let reply = predictor.handle_json(&body);
    println!("{}", serde_json::to_string(&reply.body)?);
    if reply.status != 200 {
        anyhow::bail!("Prediction request failed with status {}", reply.status);
    }
    Ok(())
}
