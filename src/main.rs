use clap::Parser;
use colored::*;
use eyre::{Context, Result};
use log::{info, warn};
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio_util::sync::CancellationToken;

mod cli;

use callpipe::analysis::{LlmAnalysisClient, RetryingAnalyzer, is_valid};
use callpipe::batch::BatchCoordinator;
use callpipe::config::Config;
use callpipe::domain::{BatchResult, CallRecord};
use callpipe::error::BatchError;
use callpipe::llm::OpenAiClient;
use callpipe::prompt::PromptLoader;
use callpipe::storage::{ArtifactSink, LocalArtifactSink, PersistReport};
use callpipe::transcript;
use cli::Cli;
use cli::commands::Commands;

fn setup_logging(default_filter: &str) -> Result<()> {
    // Create log directory
    let log_dir = dirs::data_local_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("callpipe")
        .join("logs");

    fs::create_dir_all(&log_dir).context("Failed to create log directory")?;

    let log_file = log_dir.join("callpipe.log");

    let target = Box::new(
        fs::OpenOptions::new()
            .create(true)
            .append(true)
            .open(&log_file)
            .context("Failed to open log file")?,
    );

    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(default_filter))
        .target(env_logger::Target::Pipe(target))
        .init();

    info!("Logging initialized, writing to: {}", log_file.display());
    Ok(())
}

/// Overrides given on the command line
struct AnalyzeArgs<'a> {
    inputs: &'a [PathBuf],
    workers: Option<usize>,
    max_attempts: Option<u32>,
    prompt: Option<&'a PathBuf>,
    output_dir: Option<&'a PathBuf>,
    remove_sources: bool,
    deadline_secs: Option<u64>,
}

impl AnalyzeArgs<'_> {
    fn apply(&self, config: &mut Config) {
        if let Some(workers) = self.workers {
            config.batch.max_workers = workers;
        }
        if let Some(max_attempts) = self.max_attempts {
            config.analysis.max_attempts = max_attempts;
        }
        if let Some(prompt) = self.prompt {
            config.analysis.prompt_path = prompt.clone();
        }
        if let Some(output_dir) = self.output_dir {
            config.output.root = output_dir.clone();
        }
        if self.remove_sources {
            config.output.remove_sources = true;
        }
        if let Some(deadline) = self.deadline_secs {
            config.batch.deadline_secs = Some(deadline);
        }
    }
}

async fn run_application(cli: &Cli, mut config: Config) -> Result<()> {
    info!("Starting application");

    if cli.is_verbose() {
        println!("{}", "Verbose mode enabled".yellow());
    }

    match &cli.command {
        Commands::Analyze {
            inputs,
            workers,
            max_attempts,
            prompt,
            output_dir,
            remove_sources,
            deadline_secs,
        } => {
            let args = AnalyzeArgs {
                inputs,
                workers: *workers,
                max_attempts: *max_attempts,
                prompt: prompt.as_ref(),
                output_dir: output_dir.as_ref(),
                remove_sources: *remove_sources,
                deadline_secs: *deadline_secs,
            };
            args.apply(&mut config);
            config.validate().context("Invalid configuration")?;
            handle_analyze_command(args.inputs, &config, cli.is_verbose()).await
        }
        Commands::Check { file } => handle_check_command(file),
    }
}

/// Expand directories into the transcript files they contain
fn collect_transcripts(inputs: &[PathBuf]) -> Result<Vec<PathBuf>> {
    let mut files = Vec::new();
    for input in inputs {
        if input.is_dir() {
            let mut entries: Vec<PathBuf> = fs::read_dir(input)
                .context(format!("Failed to read directory {}", input.display()))?
                .filter_map(|entry| entry.ok().map(|e| e.path()))
                .filter(|path| path.is_file() && path.extension().is_some_and(|ext| ext == "json"))
                .collect();
            entries.sort();
            files.extend(entries);
        } else {
            files.push(input.clone());
        }
    }

    Ok(files
        .into_iter()
        .filter(|path| {
            let report = transcript::is_report(&path.to_string_lossy());
            if report {
                info!("Skipping transcription report {}", path.display());
            }
            !report
        })
        .collect())
}

fn load_records(paths: &[PathBuf]) -> Vec<CallRecord> {
    let mut records = Vec::with_capacity(paths.len());
    for path in paths {
        match transcript::read(path) {
            Ok(record) => records.push(record),
            Err(e) => {
                warn!("Skipping unreadable transcript {}: {}", path.display(), e);
                println!("{} {}: {}", "Skipping:".yellow(), path.display(), e);
            }
        }
    }
    records
}

async fn handle_analyze_command(inputs: &[PathBuf], config: &Config, verbose: bool) -> Result<()> {
    let paths = collect_transcripts(inputs)?;
    let records = load_records(&paths);
    if records.is_empty() {
        println!("{}", "No transcripts to analyze".yellow());
        return Ok(());
    }

    let prompt = PromptLoader::new(".")
        .load_analysis_prompt(&config.analysis.prompt_path, &config.analysis.system_instruction)
        .context("Failed to load analysis prompt")?;

    let llm = OpenAiClient::from_env(&config.llm.api_key_env, config.llm.to_openai_config())
        .context("Failed to create analysis client")?;
    let mut client = LlmAnalysisClient::new(Arc::new(llm), prompt);
    if let Some(max_tokens) = config.llm.max_tokens {
        client = client.with_max_tokens(max_tokens);
    }

    let coordinator = BatchCoordinator::new(
        RetryingAnalyzer::new(Arc::new(client), config.analysis.retry_policy()),
        config.result_assembler(),
        config.batch.batch_config(),
    );

    let cancel = CancellationToken::new();
    let ctrl_c = {
        let cancel = cancel.clone();
        tokio::spawn(async move {
            if tokio::signal::ctrl_c().await.is_ok() {
                warn!("Interrupted, cancelling batch");
                cancel.cancel();
            }
        })
    };

    println!(
        "{} {} record(s) with {} worker(s)",
        "Analyzing:".cyan(),
        records.len(),
        coordinator.config().pool_size(records.len())
    );

    let outcome = coordinator.run_batch_with_cancel(records, cancel).await;
    ctrl_c.abort();

    let sink = LocalArtifactSink::new(&config.output.root).with_remove_sources(config.output.remove_sources);

    let (result, batch_failed) = match outcome {
        Ok(result) => (result, false),
        Err(BatchError::BatchFailed { partial }) => (partial, true),
    };

    // Report record failures first so storage trouble cannot hide them
    print_summary(&result);
    for failure in &result.failures {
        println!("  {} {}", "Failed:".red(), failure);
    }

    let report = save_artifacts(&sink, &result, verbose);

    if batch_failed {
        eyre::bail!(
            "{} of {} record(s) failed, {} artifact(s) not saved",
            result.failures.len(),
            result.total(),
            report.failures.len()
        );
    }
    if !report.is_complete() {
        eyre::bail!("{} artifact(s) could not be saved", report.failures.len());
    }
    Ok(())
}

/// Persist every artifact, listing the ones that could not be saved
fn save_artifacts(sink: &dyn ArtifactSink, result: &BatchResult, verbose: bool) -> PersistReport {
    let report = sink.persist_all(&result.artifacts);
    if verbose {
        for path in &report.saved {
            println!("  {} {}", "Saved:".green(), path.display());
        }
    }
    for failure in &report.failures {
        warn!("Failed to save artifact {}", failure);
        println!("  {} {}", "Not saved:".red(), failure);
    }
    report
}

fn print_summary(result: &BatchResult) {
    println!(
        "{} {} succeeded, {} failed, {} tokens in {:.1}s",
        "Done:".green(),
        result.artifacts.len(),
        result.failures.len(),
        result.tokens_used(),
        result.elapsed().num_milliseconds() as f64 / 1000.0
    );
}

fn handle_check_command(file: &Path) -> Result<()> {
    let content = fs::read_to_string(file).context(format!("Failed to read {}", file.display()))?;
    if is_valid(&content) {
        println!("{} {}", "Valid:".green(), file.display());
        Ok(())
    } else {
        println!("{} {}", "Invalid:".red(), file.display());
        eyre::bail!("{} is not a well-formed JSON object", file.display())
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    // Parse CLI arguments
    let cli = Cli::parse();

    // Load configuration; it decides the default log filter
    let config = Config::load(cli.config.as_ref()).context("Failed to load configuration")?;

    // RUST_LOG still takes precedence over the configured level
    setup_logging(config.log_filter()).context("Failed to setup logging")?;

    info!("Starting with config from: {:?}", cli.config);

    run_application(&cli, config).await.context("Application failed")?;

    Ok(())
}
