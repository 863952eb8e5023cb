//! Docsweep CLI

use anyhow::Context;
use clap::{Args, Parser, Subcommand};
use console::style;
use docsweep_artifacts::ReportWriter;
use docsweep_core::{DocGenerator, DocsweepError, Pipeline, PipelineConfig, RunState};
use docsweep_openai::{ClientConfig, OpenAIDocGenerator, DEFAULT_API_KEY_ENV};
use indicatif::{ProgressBar, ProgressStyle};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "docsweep")]
#[command(about = "Sandboxed header checks, secret scanning and per-file documentation")]
#[command(version)]
struct Cli {
    /// Enable debug logging
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run the full pipeline and generate documentation
    Run(RunArgs),

    /// Check headers and scan for secrets without generating docs
    Check(CheckArgs),
}

#[derive(Args)]
struct CommonArgs {
    /// Source root (read-only)
    #[arg(value_name = "ROOT")]
    root: PathBuf,

    /// Pipeline config file (TOML)
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Compare "Date last modified" with each file's modification time
    #[arg(long)]
    check_dates: bool,
}

#[derive(Args)]
struct RunArgs {
    #[command(flatten)]
    common: CommonArgs,

    /// Output directory for generated docs and reports
    #[arg(short, long, default_value = "./docsweep-output")]
    out: PathBuf,

    /// What the documentation should emphasize
    #[arg(short, long, default_value = "")]
    request: String,

    /// Model name
    #[arg(short, long)]
    model: Option<String>,

    /// OpenAI-compatible base URL
    #[arg(long)]
    base_url: Option<String>,

    /// Environment variable holding the API key
    #[arg(long, default_value = DEFAULT_API_KEY_ENV)]
    api_key_env: String,

    /// Generator calls in flight at once
    #[arg(long)]
    concurrency: Option<usize>,

    /// Timeout in seconds for each generator call
    #[arg(long)]
    timeout: Option<u64>,

    /// Maximum tokens per generated document
    #[arg(long)]
    max_tokens: Option<u32>,
}

#[derive(Args)]
struct CheckArgs {
    #[command(flatten)]
    common: CommonArgs,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let default_level = if cli.verbose { "debug" } else { "info" };
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();

    match cli.command {
        Commands::Run(args) => run_docs(args).await,
        Commands::Check(args) => check_root(args),
    }
}

/// CLI flag, then `--config`, then the user config file, then defaults
fn load_config(common: &CommonArgs) -> anyhow::Result<PipelineConfig> {
    let mut config = match &common.config {
        Some(path) => PipelineConfig::from_toml_file(path)
            .with_context(|| format!("Failed to load config {}", path.display()))?,
        None => match user_config_path().filter(|p| p.exists()) {
            Some(path) => {
                debug!("Using config {}", path.display());
                PipelineConfig::from_toml_file(&path)
                    .with_context(|| format!("Failed to load config {}", path.display()))?
            }
            None => PipelineConfig::default(),
        },
    };

    if common.check_dates {
        config.header.check_modified_date = true;
    }
    Ok(config)
}

fn user_config_path() -> Option<PathBuf> {
    dirs::config_dir().map(|d| d.join("docsweep").join("config.toml"))
}

fn spinner(message: &str) -> ProgressBar {
    let pb = ProgressBar::new_spinner();
    pb.set_style(
        ProgressStyle::default_spinner()
            .template("{spinner:.cyan} {msg}")
            .unwrap_or_else(|_| ProgressStyle::default_spinner()),
    );
    pb.enable_steady_tick(Duration::from_millis(120));
    pb.set_message(message.to_string());
    pb
}

async fn run_docs(args: RunArgs) -> anyhow::Result<()> {
    let mut config = load_config(&args.common)?;
    if let Some(concurrency) = args.concurrency {
        config.generation.max_concurrency = concurrency;
    }
    if let Some(timeout) = args.timeout {
        config.generation.timeout_seconds = timeout;
    }
    config.validate()?;

    let mut client_config = ClientConfig::default().with_api_key_from_env(&args.api_key_env);
    if let Some(base_url) = args.base_url {
        client_config.base_url = base_url;
    }
    if let Some(model) = args.model {
        client_config.default_model = model;
    }
    if let Some(max_tokens) = args.max_tokens {
        client_config.max_tokens = max_tokens;
    }
    // Leave headroom so the pipeline timeout fires first
    client_config.timeout_seconds = client_config
        .timeout_seconds
        .max(config.generation.timeout_seconds + 5);

    println!("{}", style("📚 Docsweep Run").bold().cyan());
    println!("  Root: {}", args.common.root.display());
    println!("  Output: {}", args.out.display());
    println!("  Model: {}", client_config.default_model);
    if !args.request.trim().is_empty() {
        println!("  Request: {}", args.request.trim());
    }
    println!();

    let generator = OpenAIDocGenerator::from_config(client_config).map_err(abort)?;
    if generator.prepare().await.is_err() {
        println!(
            "{}",
            style(format!("❌ No API key found in ${}", args.api_key_env))
                .red()
                .bold()
        );
        std::process::exit(2);
    }

    let token = CancellationToken::new();
    spawn_ctrl_c_handler(token.clone());

    let pipeline = Pipeline::new(&args.common.root, config)
        .map_err(abort)?
        .with_generator(Arc::new(generator))
        .with_cancellation(token);

    let pb = spinner("Running pipeline...");
    let result = pipeline.run(&args.request, &args.out).await;
    pb.finish_and_clear();

    let state = result.map_err(abort)?;

    println!("{}", style("📁 Writing report...").bold());
    let paths = ReportWriter::new(&state.out_dir).write_all(&state).await?;

    print_state(&state);

    println!("\n{}", style("📄 Artifacts:").bold());
    println!("  {}", paths.report_json.display());
    println!("  {}", paths.report_md.display());

    println!("\n{}", style("✅ Done!").green().bold());
    Ok(())
}

fn check_root(args: CheckArgs) -> anyhow::Result<()> {
    let config = load_config(&args.common)?;

    println!("{}", style("🔍 Docsweep Check").bold().cyan());
    println!("  Root: {}", args.common.root.display());
    println!();

    let pipeline = Pipeline::new(&args.common.root, config).map_err(abort)?;
    let state = pipeline.check(pipeline.store().root()).map_err(abort)?;

    print_state(&state);

    let clean = state.header_issues.is_empty()
        && state.secret_findings.is_empty()
        && state.failures.is_empty();
    if !clean {
        println!("\n{}", style("❌ Issues found").red().bold());
        std::process::exit(1);
    }

    println!("\n{}", style("✅ No issues found").green().bold());
    Ok(())
}

/// Exit code for errors that end the process without a report
fn abort_code(err: &DocsweepError) -> Option<i32> {
    match err {
        DocsweepError::Cancelled => Some(130),
        e if e.is_structural() => Some(2),
        _ => None,
    }
}

/// Exit on cancellation or a structural error, otherwise hand the error back
fn abort(err: DocsweepError) -> anyhow::Error {
    match abort_code(&err) {
        Some(130) => {
            println!("{}", style("⏹  Run cancelled, nothing recorded").yellow());
            std::process::exit(130);
        }
        Some(code) => {
            println!("{}", style(format!("❌ Run aborted: {err}")).red().bold());
            std::process::exit(code);
        }
        None => err.into(),
    }
}

fn spawn_ctrl_c_handler(token: CancellationToken) {
    tokio::spawn(async move {
        match tokio::signal::ctrl_c().await {
            Ok(()) => {
                warn!("Interrupt received, cancelling run");
                token.cancel();
            }
            Err(e) => warn!("Cannot listen for Ctrl-C: {}", e),
        }
    });
}

fn print_state(state: &RunState) {
    println!("{}", style("📊 Summary").bold().green());
    if let Some(summary) = &state.summary {
        for line in summary.lines() {
            println!("  {line}");
        }
    }

    if !state.header_issues.is_empty() {
        println!("\n{}", style("⚠️  Header issues:").yellow());
        for (file, verdict) in &state.header_issues {
            println!("  - {}: {}", style(file).bold(), verdict.message);
        }
    }

    if !state.secret_findings.is_empty() {
        println!("\n{}", style("🔐 Secret findings:").red());
        for (file, findings) in &state.secret_findings {
            println!("  {}", style(file).bold());
            for finding in findings {
                println!(
                    "    line {}: {} [{}] {}",
                    finding.line,
                    finding.kind,
                    finding.identifier,
                    style(&finding.excerpt).dim()
                );
            }
        }
    }

    if !state.failures.is_empty() {
        println!("\n{}", style("⚠️  Failures:").yellow());
        for failure in &state.failures {
            println!(
                "  - [{}] {}: {}",
                failure.stage, failure.file, failure.message
            );
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn test_cli_definition_is_valid() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_run_args_parse() {
        let cli = Cli::try_parse_from([
            "docsweep",
            "run",
            "./src",
            "--out",
            "./docs",
            "--request",
            "Focus on the public API",
            "--concurrency",
            "2",
            "--check-dates",
        ])
        .unwrap();

        match cli.command {
            Commands::Run(args) => {
                assert_eq!(args.common.root, PathBuf::from("./src"));
                assert_eq!(args.out, PathBuf::from("./docs"));
                assert_eq!(args.request, "Focus on the public API");
                assert_eq!(args.concurrency, Some(2));
                assert_eq!(args.api_key_env, DEFAULT_API_KEY_ENV);
                assert!(args.common.check_dates);
            }
            Commands::Check(_) => panic!("expected run"),
        }
    }

    #[test]
    fn test_missing_root_aborts_with_structural_code() {
        let Err(err) = Pipeline::new("/definitely/missing/docsweep-root", PipelineConfig::default())
        else {
            panic!("missing root accepted");
        };
        assert!(matches!(err, DocsweepError::RootNotFound { .. }), "{err}");
        assert_eq!(abort_code(&err), Some(2));
    }

    #[test]
    fn test_invalid_base_url_aborts_with_structural_code() {
        let config = ClientConfig {
            base_url: "not a url".to_string(),
            ..ClientConfig::default()
        };
        let err = OpenAIDocGenerator::from_config(config).unwrap_err();
        assert_eq!(abort_code(&err), Some(2));
    }

    #[test]
    fn test_abort_codes() {
        assert_eq!(abort_code(&DocsweepError::Cancelled), Some(130));
        assert_eq!(
            abort_code(&DocsweepError::Transport("unreachable".to_string())),
            Some(2)
        );
        assert_eq!(abort_code(&DocsweepError::Config("bad".to_string())), None);
        assert_eq!(abort_code(&DocsweepError::Generation("empty".to_string())), None);
    }

    #[test]
    fn test_load_config_from_file_with_flag_override() -> anyhow::Result<()> {
        let temp = tempfile::TempDir::new()?;
        let path = temp.path().join("docsweep.toml");
        std::fs::write(&path, "[secrets]\nmax_findings = 5\n")?;

        let common = CommonArgs {
            root: temp.path().to_path_buf(),
            config: Some(path),
            check_dates: true,
        };
        let config = load_config(&common)?;
        assert_eq!(config.secrets.max_findings, 5);
        assert!(config.header.check_modified_date);
        Ok(())
    }
}
