use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use colored::Colorize;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use flowdbt_core::{BuildReport, Config, Diagnostic, FlowError, Severity, StageStatus};
use flowdbt_engine::{DbtCliAdapter, DuckDbInspector, EngineSession, ResultMode, ResultSet};
use flowdbt_graph::Selector;
use flowdbt_project::{Project, ProjectError};

const DEFAULT_CONFIG: &str = "flowdbt.toml";

/// flowdbt - compile node graphs into dbt models and drive the build
#[derive(Parser)]
#[command(name = "flowdbt")]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Path to config file (default: flowdbt.toml)
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Node declarations file, overriding the config
    #[arg(short, long, global = true)]
    nodes: Option<PathBuf>,

    /// Enable verbose output
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Check node declarations without writing anything
    Validate,

    /// Compile every node and write the model files
    Compile,

    /// Show execution order, or what a selector expands to
    Plan {
        /// Selector such as `+orders+`
        #[arg(short, long)]
        select: Option<Selector>,
    },

    /// Load base data through the engine
    Seed,

    /// Compile, write and execute models
    Run {
        #[arg(short, long)]
        select: Option<Selector>,
    },

    /// Seed, compile, write and run, stopping at the first failed stage
    Build {
        #[arg(short, long)]
        select: Option<Selector>,

        /// Write the build report as JSON
        #[arg(short, long)]
        report: Option<PathBuf>,
    },

    /// Remove generated model files and the engine's build products
    Clean,

    /// Print the materialized rows of a node
    Show {
        node: String,

        /// Fetch every row instead of a preview
        #[arg(long)]
        all: bool,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();

    let cli = Cli::parse();
    init_tracing(cli.verbose);

    let mut config = load_config(cli.config.as_deref(), cli.verbose)?;
    if let Some(nodes) = cli.nodes {
        config.nodes = nodes;
    }

    let mut project = match Project::load(config) {
        Ok(project) => project,
        Err(e) => fail(e),
    };

    match cli.command {
        Commands::Validate => validate_command(&mut project),
        Commands::Compile => compile_command(&mut project),
        Commands::Plan { select } => plan_command(&mut project, select.as_ref()),
        Commands::Seed => seed_command(&project).await,
        Commands::Run { select } => run_command(&mut project, select.as_ref()).await,
        Commands::Build { select, report } => {
            build_command(&mut project, select.as_ref(), report.as_deref()).await
        }
        Commands::Clean => clean_command(&mut project).await,
        Commands::Show { node, all } => show_command(&project, &node, all).await,
    }
}

fn init_tracing(verbose: bool) {
    let default = if verbose { "debug" } else { "warn" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));

    tracing_subscriber::registry()
        .with(fmt::layer().with_writer(std::io::stderr))
        .with(filter)
        .init();
}

fn load_config(path: Option<&Path>, verbose: bool) -> Result<Config> {
    let config = if let Some(path) = path {
        Config::from_file(path).with_context(|| format!("loading {}", path.display()))?
    } else if Path::new(DEFAULT_CONFIG).exists() {
        Config::from_file(Path::new(DEFAULT_CONFIG))?
    } else {
        if verbose {
            eprintln!("{}", "No config file found, using defaults".yellow());
        }
        Config::default()
    };

    Ok(config)
}

/// Open the dbt adapter; `FLOWDBT_DBT` overrides the configured executable
async fn open_session(config: &Config) -> Result<EngineSession, FlowError> {
    let mut adapter = DbtCliAdapter::from_config(config);
    if let Ok(executable) = std::env::var("FLOWDBT_DBT") {
        adapter = adapter.with_executable(executable);
    }

    let session = EngineSession::open(adapter, Duration::from_secs(config.engine.timeout_secs)).await?;

    let token = session.cancellation_token();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            eprintln!("{}", "Interrupted, cancelling engine call...".yellow());
            token.cancel();
        }
    });

    Ok(session)
}

fn validate_command(project: &mut Project) -> Result<()> {
    let models = project.compile().unwrap_or_else(|e| fail(e)).len();

    println!(
        "{} {} models, {} sources",
        "✓ Valid:".green().bold(),
        models,
        project.catalog().len()
    );
    Ok(())
}

fn compile_command(project: &mut Project) -> Result<()> {
    let summary = project.write_artifacts().unwrap_or_else(|e| fail(e));

    println!(
        "{} {} models to {}",
        "✓ Compiled".green().bold(),
        summary.written.len(),
        project.config().output_path().display()
    );
    for path in &summary.pruned {
        println!("  {} {}", "pruned".yellow(), path.display());
    }
    Ok(())
}

fn plan_command(project: &mut Project, select: Option<&Selector>) -> Result<()> {
    let plan = project.compile().unwrap_or_else(|e| fail(e));

    match select {
        None => {
            println!("{}", "Execution order:".bold());
            for (i, name) in plan.order().iter().enumerate() {
                println!("  {}. {}", i + 1, name);
            }
        }
        Some(selector) => {
            let selection = plan
                .select(selector)
                .unwrap_or_else(|e| fail(FlowError::from(e)));

            println!("{} {}", "Selector:".bold(), selection.selector.cyan());
            for node in &selection.nodes {
                let marker = if selection.models.contains(node) { "model" } else { "source" };
                println!("  {} ({})", node, marker.dimmed());
            }
        }
    }
    Ok(())
}

async fn seed_command(project: &Project) -> Result<()> {
    let session = open_session(project.config()).await.unwrap_or_else(|e| fail(e));
    let output = project.seed(&session).await.unwrap_or_else(|e| fail(e));
    session.close().await?;

    print_engine_output(&output);
    println!("{}", "✓ Seed complete".green().bold());
    Ok(())
}

async fn run_command(project: &mut Project, select: Option<&Selector>) -> Result<()> {
    let session = open_session(project.config()).await.unwrap_or_else(|e| fail(e));
    let executed = project.run(&session, select).await.unwrap_or_else(|e| fail(e));
    session.close().await?;

    println!("{} {} models", "✓ Ran".green().bold(), executed.len());
    Ok(())
}

async fn build_command(
    project: &mut Project,
    select: Option<&Selector>,
    report_path: Option<&Path>,
) -> Result<()> {
    let session = open_session(project.config()).await.unwrap_or_else(|e| fail(e));
    let report = project.build(&session, select).await;
    session.close().await?;

    if let Some(path) = report_path {
        report.save_to_file(path)?;
        eprintln!("{} {}", "Report saved to:".green(), path.display());
    }

    print_build_report(&report);

    if report.has_errors() {
        std::process::exit(1);
    }
    Ok(())
}

async fn clean_command(project: &mut Project) -> Result<()> {
    let session = open_session(project.config()).await.unwrap_or_else(|e| fail(e));
    let removed = project.full_clean(&session).await.unwrap_or_else(|e| fail(e));
    session.close().await?;

    println!("{} removed {} files", "✓ Clean:".green().bold(), removed.len());
    Ok(())
}

async fn show_command(project: &Project, node: &str, all: bool) -> Result<()> {
    let mode = if all {
        ResultMode::All
    } else {
        ResultMode::Preview(project.config().inspect.preview_rows)
    };

    let inspector = DuckDbInspector::from_config(project.config());
    let result = project
        .inspect(&inspector, node, mode)
        .await
        .unwrap_or_else(|e| fail(e));

    print_result_set(node, &result);
    Ok(())
}

/// Print the error and exit with status 1
fn fail(err: impl Into<ProjectError>) -> ! {
    print_diagnostic(&err.into().to_diagnostic());
    std::process::exit(1);
}

fn print_diagnostic(diag: &Diagnostic) {
    let severity = match diag.severity {
        Severity::Error => "ERROR".red().bold(),
        Severity::Warn => "WARN".yellow().bold(),
        Severity::Info => "INFO".cyan(),
    };

    eprintln!("[{}] {}: {}", severity, diag.code, diag.message);

    if let Some(node) = &diag.node {
        eprintln!("    node: {}", node);
    }
    if let (Some(expected), Some(actual)) = (&diag.expected, &diag.actual) {
        eprintln!("    expected: {}", expected);
        eprintln!("    actual:   {}", actual);
    }
    if let Some(payload) = &diag.payload {
        print_engine_output(payload);
    }
}

fn print_engine_output(output: &str) {
    for line in output.lines().filter(|l| !l.trim().is_empty()) {
        eprintln!("    {}", line.dimmed());
    }
}

fn print_build_report(report: &BuildReport) {
    println!("\n{}", "=".repeat(60).bright_blue());
    println!("{}", "Build Report".bold().bright_blue());
    println!("{}", "=".repeat(60).bright_blue());
    println!();

    println!("Version: {}", report.version);
    println!("Timestamp: {}", report.timestamp);
    println!();

    println!("{}", "Stages:".bold());
    for outcome in &report.stages {
        let status = match outcome.status {
            StageStatus::Succeeded => "ok".green(),
            StageStatus::Failed => "FAILED".red().bold(),
        };
        println!("  {:<8} {} ({} models)", outcome.stage.to_string(), status, outcome.models.len());
    }
    println!();

    println!("{}", "Summary:".bold());
    println!("  Models compiled: {}", report.summary.models_compiled);
    println!("  Models executed: {}", report.summary.models_executed);
    if report.summary.errors > 0 {
        println!("  Errors:   {}", report.summary.errors.to_string().red().bold());
    } else {
        println!("  Errors:   {}", report.summary.errors.to_string().green());
    }
    if report.summary.warnings > 0 {
        println!("  Warnings: {}", report.summary.warnings.to_string().yellow());
    }
    if report.summary.info > 0 {
        println!("  Info:     {}", report.summary.info);
    }
    println!();

    for diag in &report.diagnostics {
        print_diagnostic(diag);
    }
    if !report.has_errors() {
        println!("{}", "✓ Build succeeded".green().bold());
    }

    println!("{}", "=".repeat(60).bright_blue());
}

fn print_result_set(node: &str, result: &ResultSet) {
    println!("{} {} ({} rows)", "Result:".bold(), node.green(), result.len());

    if result.columns.is_empty() {
        return;
    }

    println!("  {}", result.columns.join(" | ").bold());
    for row in &result.rows {
        let cells: Vec<String> = row
            .iter()
            .map(|v| match v {
                serde_json::Value::String(s) => s.clone(),
                serde_json::Value::Null => "NULL".to_string(),
                other => other.to_string(),
            })
            .collect();
        println!("  {}", cells.join(" | "));
    }
}
