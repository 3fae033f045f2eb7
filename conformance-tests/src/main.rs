use anyhow::{Context, Result};
use clap::{Parser, Subcommand, ValueEnum};
use colored::Colorize;
use std::path::PathBuf;
use std::process::ExitCode;
use tracing_subscriber::EnvFilter;

use station_conformance::report::{ConformanceReport, ReportSink, StepReport, StepStatus, VERDICT_STEPS};
use station_conformance::{CliProbe, HarnessConfig, Sequencer, SessionClient};

#[derive(Parser)]
#[command(name = "station-conformance")]
#[command(about = "Station MCP resources-vs-tools conformance runner", long_about = None)]
#[command(version = env!("CARGO_PKG_VERSION"))]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run the conformance steps against a server
    Run {
        /// MCP endpoint (overrides config)
        #[arg(long, short)]
        endpoint: Option<String>,

        /// TOML configuration file
        #[arg(long, short)]
        config: Option<PathBuf>,

        /// Report format
        #[arg(long, short, value_enum, default_value_t = OutputFormat::Text)]
        output: OutputFormat,

        /// Also probe the command-line surface
        #[arg(long)]
        cli_probe: bool,

        /// Request timeout in seconds (overrides config)
        #[arg(long)]
        timeout: Option<u64>,

        /// Show verbose output
        #[arg(long, short)]
        verbose: bool,
    },

    /// List the steps in execution order
    Steps,
}

#[derive(Clone, Copy, PartialEq, Eq, ValueEnum)]
enum OutputFormat {
    Text,
    Json,
}

#[tokio::main]
async fn main() -> Result<ExitCode> {
    let cli = Cli::parse();

    match cli.command {
        Commands::Run {
            endpoint,
            config,
            output,
            cli_probe,
            timeout,
            verbose,
        } => {
            init_logging(verbose);

            let mut config = match config {
                Some(path) => HarnessConfig::from_file(&path)
                    .context(format!("Failed to load config: {}", path.display()))?,
                None => HarnessConfig::from_env().context("Failed to read environment configuration")?,
            };
            if let Some(endpoint) = endpoint {
                config.endpoint = endpoint;
            }
            if let Some(timeout) = timeout {
                config.timeout_secs = timeout;
            }
            if cli_probe {
                config.cli.enabled = true;
            }
            config.validate().context("Invalid configuration")?;

            let report = run_conformance(config, output).await?;
            Ok(if report.is_trustworthy() {
                ExitCode::SUCCESS
            } else {
                ExitCode::FAILURE
            })
        }
        Commands::Steps => {
            list_steps();
            Ok(ExitCode::SUCCESS)
        }
    }
}

fn init_logging(verbose: bool) {
    let default_level = if verbose { "debug" } else { "info" };
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(format!("station_conformance={default_level},warn")));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();
}

async fn run_conformance(config: HarnessConfig, output: OutputFormat) -> Result<ConformanceReport> {
    let mut session =
        SessionClient::new(config.session_options()).context("Failed to create HTTP client")?;
    let sequencer = Sequencer::standard(config.agent.clone());

    let mut report = match output {
        OutputFormat::Text => {
            println!(
                "{} {}",
                "ℹ".blue(),
                format!("Testing Station MCP endpoint: {}", config.endpoint).bold()
            );
            sequencer.run_with_sink(&mut session, &mut ConsoleSink).await
        }
        OutputFormat::Json => sequencer.run(&mut session).await,
    };

    if config.cli.enabled {
        if output == OutputFormat::Text {
            println!();
            println!("{} Probing command-line surface...", "ℹ".blue());
        }
        report.cli_probes = CliProbe::new(config.cli.clone()).run().await;
        if output == OutputFormat::Text {
            for probe in &report.cli_probes {
                ConsoleSink.step_finished(probe);
            }
        }
    }

    match output {
        OutputFormat::Text => print_summary(&report),
        OutputFormat::Json => println!(
            "{}",
            serde_json::to_string_pretty(&report).context("Failed to serialize report")?
        ),
    }

    Ok(report)
}

struct ConsoleSink;

impl ReportSink for ConsoleSink {
    fn step_finished(&mut self, report: &StepReport) {
        let marker = match report.outcome.status() {
            StepStatus::Passed => "✓".green(),
            StepStatus::Failed => "✗".red(),
            StepStatus::Skipped => "⚠".yellow(),
        };
        println!(
            "{} {} ({} ms)",
            marker,
            report.description.bold(),
            report.duration_ms
        );
        println!("    {}", report.outcome.summary());
    }
}

fn print_summary(report: &ConformanceReport) {
    let tally = report.tally();

    println!();
    println!("{} Test Summary:", "ℹ".blue());
    match &report.server_info {
        Some(info) => println!("  Server: {} {}", info.name, info.version),
        None => println!("  Server: unknown"),
    }
    if let Some(version) = &report.protocol_version {
        println!("  Protocol: {version}");
    }
    if !report.capabilities.is_empty() {
        println!("  Capabilities: {}", report.capabilities.join(", "));
    }
    println!("  Total Steps: {}", tally.total());
    println!("  {} Passed: {}", "✓".green(), tally.passed);
    println!("  {} Failed: {}", "✗".red(), tally.failed);
    println!("  {} Skipped: {}", "⚠".yellow(), tally.skipped);

    if !report.cli_probes.is_empty() {
        let probes = report.probe_tally();
        println!(
            "  CLI probes: {} passed, {} failed (informational)",
            probes.passed, probes.failed
        );
    }
    println!();

    if report.is_trustworthy() {
        println!("{} Conformance run is trustworthy", "✓".green());
    } else {
        println!(
            "{} Conformance run is not trustworthy (handshake: {})",
            "✗".red(),
            if report.initialized { "ok" } else { "failed" }
        );
    }
}

fn list_steps() {
    println!("{} Conformance steps:", "ℹ".blue());

    let sequencer = Sequencer::standard(Default::default());
    for step in sequencer.steps() {
        let id = step.id();
        let mut line = format!("  {} - {}", id.name().green(), id.description());
        if let Some(dependency) = step.dependency() {
            line.push_str(&format!(" (needs {dependency})"));
        }
        if VERDICT_STEPS.contains(&id) {
            line.push_str(&format!(" {}", "[verdict]".bold()));
        }
        println!("{line}");
    }
}
