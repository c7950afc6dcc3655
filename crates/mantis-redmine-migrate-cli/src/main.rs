//! mantis-redmine-migrate CLI - MantisBT to Redmine data migration.

mod console;

use clap::{Parser, Subcommand};
use mantis_redmine_migrate::{AutoConfirmConsole, Config, MigrateError, Orchestrator};
use std::path::PathBuf;
use std::process::ExitCode;
use tracing::{info, Level};
use tracing_subscriber::fmt::format::FmtSpan;

#[derive(Parser)]
#[command(name = "mantis-redmine-migrate")]
#[command(about = "Migrate a MantisBT tracker into an existing Redmine database")]
#[command(version)]
struct Cli {
    /// Path to YAML configuration file
    #[arg(short, long, default_value = "config.yaml")]
    config: PathBuf,

    /// Output the final JSON report to stdout
    #[arg(long)]
    output_json: bool,

    /// Log format: text or json
    #[arg(long, default_value = "text")]
    log_format: String,

    /// Log verbosity: debug, info, warn, error
    #[arg(long, default_value = "info")]
    verbosity: String,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Start a migration run
    Run {
        /// Resolve mappings and report tallies without writing to Redmine
        #[arg(long)]
        preview: bool,

        /// Reuse persisted mapping units and skip already-applied records
        #[arg(long)]
        resume: bool,

        /// Accept every proposed mapping without prompting
        #[arg(long)]
        non_interactive: bool,
    },

    /// Test database connections
    HealthCheck,
}

#[tokio::main]
async fn main() -> ExitCode {
    match run().await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("{}", e.format_detailed());
            ExitCode::from(e.exit_code())
        }
    }
}

async fn run() -> Result<(), MigrateError> {
    let cli = Cli::parse();

    setup_logging(&cli.verbosity, &cli.log_format)
        .map_err(MigrateError::Config)?;

    let config = Config::load(&cli.config)?;
    info!("Loaded configuration from {:?}", cli.config);

    match cli.command {
        Commands::Run {
            preview,
            resume,
            non_interactive,
        } => {
            let mut orchestrator = Orchestrator::connect(config)
                .await?
                .with_preview(preview)
                .with_resume(resume);

            orchestrator = if non_interactive {
                orchestrator.with_console(Box::new(AutoConfirmConsole))
            } else {
                orchestrator.with_console(Box::new(console::TerminalConsole::new()))
            };

            let report = orchestrator.run().await?;

            if cli.output_json {
                println!("{}", report.to_json()?);
            } else {
                println!("\n{}", report.render_text());
            }
        }

        Commands::HealthCheck => {
            let orchestrator = Orchestrator::connect(config).await?;
            orchestrator.health_check().await?;
            println!("Health Check Results:");
            println!("  Source (MySQL): OK");
            println!("  Target (PostgreSQL): OK");
        }
    }

    Ok(())
}

fn setup_logging(verbosity: &str, format: &str) -> Result<(), String> {
    let level = match verbosity.to_lowercase().as_str() {
        "debug" => Level::DEBUG,
        "info" => Level::INFO,
        "warn" => Level::WARN,
        "error" => Level::ERROR,
        _ => Level::INFO,
    };

    let subscriber = tracing_subscriber::fmt()
        .with_max_level(level)
        .with_span_events(FmtSpan::CLOSE)
        .with_target(false)
        .with_writer(std::io::stderr);

    if format == "json" {
        subscriber.json().init();
    } else {
        subscriber.init();
    }

    Ok(())
}
