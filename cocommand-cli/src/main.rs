use clap::{Parser, Subcommand, ValueEnum};
use cocommand_cli::{CliError, LogConfig, Result, SimulationConfig, run_simulation, write_schemas};
use std::path::PathBuf;
use std::time::Duration;
use tracing::info;

#[derive(Parser)]
#[command(name = "cocommand")]
#[command(
    version,
    about = "Co-command session toolkit - simulate approval rounds and export wire schemas"
)]
struct Cli {
    /// Log verbosity preset
    #[arg(long, value_enum, default_value_t = LogPreset::Default, global = true)]
    log: LogPreset,

    /// Emit logs as JSON
    #[arg(long, global = true)]
    log_json: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Clone, Copy, ValueEnum)]
enum LogPreset {
    Default,
    Dev,
    Quiet,
    Off,
}

#[derive(Subcommand)]
enum Commands {
    /// Run an in-memory co-command session end to end
    Simulate {
        /// Number of commanders in the session
        #[arg(short = 'c', long, default_value_t = 3)]
        commanders: usize,

        /// Action commander 0 asks to perform
        #[arg(short = 'a', long, default_value = "BUILD")]
        action: String,

        /// Index of a commander that vetoes
        #[arg(long)]
        veto: Option<usize>,

        /// Index of a commander that never answers
        #[arg(long)]
        silent: Option<usize>,

        /// Approval timeout in milliseconds
        #[arg(long, default_value_t = 2000)]
        timeout_ms: u64,

        /// Print the report as JSON
        #[arg(long)]
        json: bool,
    },

    /// Write JSON schemas of the wire types
    Schema {
        /// Output directory
        #[arg(short = 'o', long, default_value = "schemas")]
        out: PathBuf,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let mut log_config = match cli.log {
        LogPreset::Default => LogConfig::default(),
        LogPreset::Dev => LogConfig::dev(),
        LogPreset::Quiet => LogConfig::quiet(),
        LogPreset::Off => LogConfig::default().without_logs(),
    };
    if cli.log_json {
        log_config = log_config.with_json();
    }
    log_config.init().map_err(CliError::Logging)?;

    match cli.command {
        Commands::Simulate {
            commanders,
            action,
            veto,
            silent,
            timeout_ms,
            json,
        } => {
            let config = SimulationConfig {
                commanders,
                action,
                veto,
                silent,
                approval_timeout: Duration::from_millis(timeout_ms),
                ..Default::default()
            };

            let report = run_simulation(config).await?;

            if json {
                println!("{}", serde_json::to_string_pretty(&report)?);
            } else {
                println!("Session:   {}", report.session_id);
                println!("Action:    {}", report.action);
                println!("Decision:  {}", report.decision);
                println!("Approved:  {}", report.approved);
                if let Some(version) = report.published_version {
                    println!("Published: state v{}", version);
                }
                println!("Ticks:     {}", report.ticks);
                for commander in &report.commanders {
                    println!(
                        "  {:<14} watermark v{:<3} requests {} responses {}",
                        commander.actor_id,
                        commander.watermark,
                        commander.requests_sent,
                        commander.responses_sent
                    );
                }
            }
        }
        Commands::Schema { out } => {
            let written = write_schemas(&out)?;
            info!("Wrote {} schema file(s) to {}", written.len(), out.display());
            for path in written {
                println!("{}", path.display());
            }
        }
    }

    Ok(())
}
