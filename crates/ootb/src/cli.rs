//! Clap derive structures for the `ootb` CLI.
//!
//! Defines the command tree, global flags, and shared types.

use std::path::PathBuf;

use clap::{Args, Parser, Subcommand, ValueEnum};
use strum::IntoEnumIterator;

use ootb_core::{Mutation, Resource};

// ── Top-Level CLI ────────────────────────────────────────────────────

/// ootb -- provisioning console for out-of-box devices
#[derive(Debug, Parser)]
#[command(
    name = "ootb",
    version,
    about = "Provision an out-of-box device from the command line",
    long_about = "Reads and configures a device through its local HTTP API.\n\n\
        Reads go through a de-duplicating cache; writes refetch whatever they\n\
        change; scans and firmware updates are polled until they finish.",
    propagate_version = true,
    subcommand_required = true,
    arg_required_else_help = true
)]
pub struct Cli {
    #[command(flatten)]
    pub global: GlobalOpts,

    #[command(subcommand)]
    pub command: Command,
}

// ── Global Options ───────────────────────────────────────────────────

#[derive(Debug, Args)]
pub struct GlobalOpts {
    /// Device API base URL (overrides config)
    #[arg(long, short = 'd', env = "OOTB_DEVICE", global = true)]
    pub device: Option<String>,

    /// Config file to read instead of the platform default
    #[arg(long, env = "OOTB_CONFIG", global = true)]
    pub config: Option<PathBuf>,

    /// Request timeout in seconds (overrides config)
    #[arg(long, env = "OOTB_TIMEOUT", global = true)]
    pub timeout: Option<u64>,

    /// Output format (defaults to the config file's choice)
    #[arg(long, short = 'o', env = "OOTB_OUTPUT", global = true)]
    pub output: Option<OutputFormat>,

    /// Increase verbosity (-v, -vv, -vvv)
    #[arg(long, short = 'v', action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Suppress non-error output
    #[arg(long, short = 'q', global = true)]
    pub quiet: bool,
}

// ── Output Enum ──────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum OutputFormat {
    /// Pretty-printed JSON
    Json,
    /// Compact single-line JSON
    JsonCompact,
    /// YAML
    Yaml,
    /// Plain text: scalars bare, one array element per line (scripting)
    Plain,
}

// ── Top-Level Command Enum ───────────────────────────────────────────

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Read a resource once
    Get(ReadArgs),

    /// Subscribe to a resource and print every change until interrupted
    Watch(WatchArgs),

    /// Run a mutation and report which cached reads it refreshed
    Set(SetArgs),

    /// Scan for wireless networks and wait for the results
    Scan(ScanArgs),

    /// Firmware operations
    #[command(subcommand)]
    Firmware(FirmwareCommand),

    /// Manage the configuration file
    Config(ConfigArgs),

    /// Generate shell completions
    Completions(CompletionsArgs),
}

// ── Reads ────────────────────────────────────────────────────────────

#[derive(Debug, Args)]
pub struct ReadArgs {
    /// Resource to read (e.g. board, hostname, networks, firmware-update)
    #[arg(value_parser = parse_resource)]
    pub resource: Resource,

    /// Read argument as key=value; repeatable
    #[arg(long = "arg", short = 'a', value_name = "KEY=VALUE")]
    pub args: Vec<String>,
}

#[derive(Debug, Args)]
pub struct WatchArgs {
    #[command(flatten)]
    pub read: ReadArgs,

    /// Refetch at this interval in seconds (0 = only print pushed changes)
    #[arg(long, short = 'i', default_value = "0")]
    pub interval: u64,

    /// Stop after this many snapshots
    #[arg(long, short = 'n')]
    pub count: Option<usize>,
}

// ── Writes ───────────────────────────────────────────────────────────

#[derive(Debug, Args)]
pub struct SetArgs {
    /// Mutation to run (e.g. set-hostname, configure-wlan)
    #[arg(value_parser = parse_mutation)]
    pub mutation: Mutation,

    /// JSON request body
    #[arg(long, short = 'b', default_value = "null")]
    pub body: String,
}

#[derive(Debug, Args)]
pub struct ScanArgs {
    /// Wireless interface to scan on
    #[arg(long, short = 'i')]
    pub interface: Option<String>,
}

#[derive(Debug, Subcommand)]
pub enum FirmwareCommand {
    /// Download and install a firmware image, following its progress
    Update {
        /// Image URL the device downloads from
        #[arg(long)]
        url: String,

        /// Expected md5 of the image
        #[arg(long)]
        md5: String,
    },
}

// ── Config ───────────────────────────────────────────────────────────

#[derive(Debug, Args)]
pub struct ConfigArgs {
    #[command(subcommand)]
    pub command: ConfigCommand,
}

#[derive(Debug, Subcommand)]
pub enum ConfigCommand {
    /// Display current resolved configuration
    Show,

    /// Print the config file path
    Path,

    /// Write a default config file
    Init {
        /// Overwrite an existing file
        #[arg(long)]
        force: bool,
    },
}

#[derive(Debug, Args)]
pub struct CompletionsArgs {
    /// Shell to generate completions for
    pub shell: clap_complete::Shell,
}

// ── Value parsers ────────────────────────────────────────────────────

fn parse_resource(s: &str) -> Result<Resource, String> {
    s.parse()
        .map_err(|_| format!("unknown resource '{s}' (expected one of: {})", names::<Resource>()))
}

fn parse_mutation(s: &str) -> Result<Mutation, String> {
    s.parse()
        .map_err(|_| format!("unknown mutation '{s}' (expected one of: {})", names::<Mutation>()))
}

fn names<T: IntoEnumIterator + std::fmt::Display>() -> String {
    T::iter().map(|v| v.to_string()).collect::<Vec<_>>().join(", ")
}
