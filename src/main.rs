// Powerflow: runs one power operation against a host through the power CLI
use clap::{Parser, Subcommand};
use color_eyre::eyre::Result;
use powerflow_power::{Operation, PowerParam};
use std::io::stderr;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info};
use tracing_subscriber::{fmt, prelude::*, registry, EnvFilter};

mod cmd;

use cmd::config::{AgentConfig, ConfigOverrides};
use cmd::power::{exit_code, RunArgs, TargetArgs};

#[derive(Parser, Debug)]
#[command(author, version, about = "Out-of-band power management", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    #[command(flatten)]
    overrides: ConfigOverrides,

    /// Verbose output - shows more detailed logs
    #[arg(short, long, default_value_t = false, global = true)]
    verbose: bool,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Power a host on
    On(TargetArgs),
    /// Power a host off
    Off(TargetArgs),
    /// Power cycle a host
    Cycle(TargetArgs),
    /// Query the power state of a host
    Status(TargetArgs),
    /// Run a JSON power request (system_id, action, params, power_type)
    Run(RunArgs),
}

impl Commands {
    fn into_param(self) -> Result<PowerParam> {
        Ok(match self {
            Commands::On(target) => target.into_param(Operation::On),
            Commands::Off(target) => target.into_param(Operation::Off),
            Commands::Cycle(target) => target.into_param(Operation::Cycle),
            Commands::Status(target) => target.into_param(Operation::Status),
            Commands::Run(args) => args.load()?,
        })
    }
}

fn init_logging(verbose: bool) {
    let level = if verbose { "debug" } else { "info" };
    let default_directives = format!("powerflow={level},powerflow_power={level}", level = level);
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_directives));

    registry().with(filter).with(fmt::layer().with_writer(stderr)).init();
}

#[tokio::main]
async fn main() -> Result<()> {
    color_eyre::install()?;

    let cli = Cli::parse();
    init_logging(cli.verbose);

    let config = AgentConfig::load(cli.overrides.config.as_deref())?.with_overrides(&cli.overrides);
    debug!(?config, "Resolved configuration");

    let params = cli.command.into_param()?;
    let workflow = config.workflow();

    // Ctrl+C kills the running power CLI instead of leaving it behind
    let cancel = CancellationToken::new();
    let cancel_on_signal = cancel.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            info!("Ctrl+C received, cancelling power operation");
            cancel_on_signal.cancel();
        }
    });

    match workflow.execute(&cancel, params).await {
        Ok(result) => {
            println!("{}", serde_json::to_string(&result)?);
            Ok(())
        }
        Err(e) => {
            error!(error = %e, "Power operation failed");
            eprintln!("Error: {}", e);
            std::process::exit(exit_code(e.kind()));
        }
    }
}
