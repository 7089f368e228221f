mod cli;
mod commands;
mod error;
mod output;

use clap::Parser;
use tracing_subscriber::EnvFilter;

use ootb_config::Config;
use ootb_core::{DeviceSync, SyncConfig};

use crate::cli::{Cli, Command, GlobalOpts};
use crate::error::CliError;
use crate::output::Printer;

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    init_tracing(cli.global.verbose);

    if let Err(err) = run(cli).await {
        let code = err.exit_code();
        eprintln!("{:?}", miette::Report::new(err));
        std::process::exit(code);
    }
}

fn init_tracing(verbosity: u8) {
    let filter = match verbosity {
        0 => "warn",
        1 => "info",
        2 => "debug",
        _ => "trace",
    };

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(filter)),
        )
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();
}

async fn run(cli: Cli) -> Result<(), CliError> {
    match cli.command {
        // Config commands don't need the device
        Command::Config(args) => commands::config_cmd::handle(args, &cli.global),

        Command::Completions(args) => {
            use clap::CommandFactory;
            use clap_complete::generate;

            let mut cmd = Cli::command();
            generate(args.shell, &mut cmd, "ootb", &mut std::io::stdout());
            Ok(())
        }

        cmd => {
            let cfg = load_config(&cli.global)?;
            let printer = Printer::new(
                output::resolve_format(cli.global.output, &cfg.defaults.output),
                cli.global.quiet,
            );
            let sync = DeviceSync::connect(build_sync_config(&cfg, &cli.global)?)?;

            tracing::debug!(command = ?cmd, device = %sync.config().base_url, "dispatching command");
            let result = commands::dispatch(cmd, &sync, &printer).await;
            sync.shutdown().await;
            result
        }
    }
}

/// Load the config file named by `--config`, or the platform default.
pub(crate) fn load_config(global: &GlobalOpts) -> Result<Config, CliError> {
    let cfg = match global.config {
        Some(ref path) => ootb_config::load_config_from(path)?,
        None => ootb_config::load_config()?,
    };
    Ok(cfg)
}

/// Build the engine configuration from the config file plus CLI overrides.
pub(crate) fn build_sync_config(cfg: &Config, global: &GlobalOpts) -> Result<SyncConfig, CliError> {
    let mut cfg = cfg.clone();
    if let Some(ref device) = global.device {
        cfg.device.url.clone_from(device);
    }
    if let Some(timeout) = global.timeout {
        cfg.device.timeout = timeout;
    }
    Ok(cfg.to_sync_config()?)
}
