//! Config subcommand handlers.

use ootb_config::Config;

use crate::cli::{ConfigArgs, ConfigCommand, GlobalOpts};
use crate::error::CliError;
use crate::output;

pub fn handle(args: ConfigArgs, global: &GlobalOpts) -> Result<(), CliError> {
    let path = global
        .config
        .clone()
        .unwrap_or_else(ootb_config::config_path);

    match args.command {
        ConfigCommand::Show => {
            let mut cfg = crate::load_config(global)?;
            // Show what a command would actually use.
            if let Some(ref device) = global.device {
                cfg.device.url.clone_from(device);
            }
            if let Some(timeout) = global.timeout {
                cfg.device.timeout = timeout;
            }
            let rendered = toml::to_string_pretty(&cfg).map_err(|e| CliError::Render {
                message: e.to_string(),
            })?;
            output::print_output(rendered.trim_end(), global.quiet);
            Ok(())
        }

        ConfigCommand::Path => {
            output::print_output(&path.display().to_string(), global.quiet);
            Ok(())
        }

        ConfigCommand::Init { force } => {
            if path.exists() && !force {
                return Err(CliError::ConfigExists {
                    path: path.display().to_string(),
                });
            }
            ootb_config::save_config_to(&Config::default(), &path)?;
            if !global.quiet {
                eprintln!("Wrote default configuration to {}", path.display());
            }
            Ok(())
        }
    }
}
